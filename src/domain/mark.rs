/// Cscope symbol marks.
///
/// Every symbol record in the database is prefixed by a tab plus a
/// one-character mark telling cscope what kind of reference it is. Unmarked
/// symbols (plain reads of a name) carry no prefix at all, which the rest of
/// the engine models as `Option<Mark>`.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Start of a file's chunk, also used for the end-of-symbols marker.
    File,
    /// Function definition.
    FuncDef,
    /// Function call.
    FuncCall,
    /// End of a function body.
    FuncEnd,
    /// Imported module path.
    Include,
    /// Assignment target.
    Assign,
    /// Class definition.
    Class,
    /// Name listed in a `global` declaration.
    Global,
    /// Local definition. Recognized by cscope but never produced here.
    Local,
}

impl Mark {
    /// The one-character code cscope stores after the tab.
    pub fn code(&self) -> char {
        match self {
            Mark::File => '@',
            Mark::FuncDef => '$',
            Mark::FuncCall => '`',
            Mark::FuncEnd => '}',
            Mark::Include => '~',
            Mark::Assign => '=',
            Mark::Class => 'c',
            Mark::Global => 'g',
            Mark::Local => 'l',
        }
    }
}

impl fmt::Display for Mark {
    /// Renders the on-disk form: a tab followed by the mark code.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\t{}", self.code())
    }
}
