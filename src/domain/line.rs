//! Source-line model for the cross-reference database.
//!
//! Cscope wants each indexed source line broken into alternating runs of
//! symbol and non-symbol text, with symbols on their own physical lines in
//! the database. A [`Line`] collects [`Run`]s as the tree walk emits tokens
//! and renders itself into that layout once the walk moves past it.

use crate::domain::error::IndexError;
use crate::domain::mark::Mark;

/// One run of output text: a classified symbol or the plain text between
/// symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Symbol { mark: Option<Mark>, text: String },
    NonSymbol { text: String },
}

impl Run {
    pub fn symbol(text: impl Into<String>, mark: Option<Mark>) -> Self {
        Run::Symbol {
            mark,
            text: text.into(),
        }
    }

    pub fn non_symbol(text: impl Into<String>) -> Self {
        Run::NonSymbol { text: text.into() }
    }

    /// The function-end marker is the one symbol with no text of its own.
    pub fn func_end() -> Self {
        Run::Symbol {
            mark: Some(Mark::FuncEnd),
            text: String::new(),
        }
    }

    fn is_symbol(&self) -> bool {
        matches!(self, Run::Symbol { .. })
    }

    fn is_func_end(&self) -> bool {
        matches!(
            self,
            Run::Symbol {
                mark: Some(Mark::FuncEnd),
                ..
            }
        )
    }

    fn same_kind(&self, other: &Run) -> bool {
        matches!(
            (self, other),
            (Run::Symbol { .. }, Run::Symbol { .. })
                | (Run::NonSymbol { .. }, Run::NonSymbol { .. })
        )
    }

    /// Folds `other` into this run. Adjacent symbols concatenate directly and
    /// must carry the same mark; adjacent non-symbol runs join with a single
    /// space.
    fn merge(&mut self, other: Run) -> Result<(), IndexError> {
        match (self, other) {
            (
                Run::Symbol { mark, text },
                Run::Symbol {
                    mark: other_mark,
                    text: other_text,
                },
            ) => {
                if *mark != other_mark {
                    return Err(IndexError::MarkConflict {
                        what: format!("{}/{}", text, other_text),
                        line: 0,
                    });
                }
                text.push_str(&other_text);
                Ok(())
            }
            (Run::NonSymbol { text }, Run::NonSymbol { text: other_text }) => {
                text.push(' ');
                text.push_str(&other_text);
                Ok(())
            }
            // Kind mismatches never merge; append handles them by pushing.
            _ => Ok(()),
        }
    }

    /// Database form of the run: an optional tab-mark prefix, then the text.
    fn render(&self) -> String {
        match self {
            Run::Symbol {
                mark: Some(mark),
                text,
            } => format!("{}{}", mark, text),
            Run::Symbol { mark: None, text } => text.clone(),
            Run::NonSymbol { text } => text.clone(),
        }
    }
}

/// One line of source, accumulated run by run during the tree walk.
#[derive(Debug, Clone)]
pub struct Line {
    number: usize,
    runs: Vec<Run>,
    has_symbol: bool,
}

impl Line {
    pub fn new(number: usize) -> Self {
        Line {
            number,
            runs: Vec::new(),
            has_symbol: false,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Appends a run, keeping the strict symbol / non-symbol alternation the
    /// database format wants.
    ///
    /// A function-end marker arriving after a symbol gets a single-space
    /// non-symbol spacer first. Any other run of the same kind as the last
    /// one is merged into it instead of appended.
    pub fn append(&mut self, run: Run) -> Result<(), IndexError> {
        if run.is_func_end() && !self.runs.is_empty() {
            if self.runs.last().is_some_and(Run::is_symbol) {
                self.runs.push(Run::non_symbol(" "));
            }
            self.has_symbol = true;
            self.runs.push(run);
            return Ok(());
        }
        match self.runs.last_mut() {
            Some(last) if last.same_kind(&run) => {
                let number = self.number;
                last.merge(run).map_err(|e| e.with_line(number))
            }
            _ => {
                if run.is_symbol() {
                    self.has_symbol = true;
                }
                self.runs.push(run);
                Ok(())
            }
        }
    }

    /// Renders the line as its database records, or an empty string when the
    /// line holds no symbol and is skipped outright.
    ///
    /// Layout: the line number opens the first record (sharing it with
    /// leading non-symbol text, or standing alone with a trailing blank when
    /// a symbol comes first), every symbol gets its own record, and the whole
    /// group ends with a blank line.
    pub fn render(&self) -> String {
        if !self.has_symbol {
            return String::new();
        }

        let mut buff: Vec<String> = Vec::new();
        let mut runs = self.runs.iter();
        match runs.next() {
            Some(first @ Run::Symbol { .. }) => {
                buff.push(format!("{} ", self.number));
                buff.push(first.render());
            }
            Some(first @ Run::NonSymbol { .. }) => {
                buff.push(format!("{} {}", self.number, first.render()));
            }
            None => return String::new(),
        }

        for run in runs {
            match run {
                Run::Symbol { .. } => {
                    // Pad the preceding record so cscope displays the
                    // symbol detached from it, unless it is already bare
                    // padding.
                    if let Some(prev) = buff.last_mut() {
                        if prev != " " {
                            prev.push(' ');
                        }
                    }
                    buff.push(run.render());
                }
                Run::NonSymbol { .. } => {
                    let mut s = run.render();
                    if s != " " {
                        s.insert(0, ' ');
                    }
                    buff.push(s);
                }
            }
        }

        buff.join("\n") + "\n\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_symbols_concatenate() {
        let mut line = Line::new(1);
        line.append(Run::symbol("os", Some(Mark::Include))).unwrap();
        line.append(Run::symbol(".", Some(Mark::Include))).unwrap();
        line.append(Run::symbol("path", Some(Mark::Include))).unwrap();
        assert_eq!(line.render(), "1 \n\t~os.path\n\n");
    }

    #[test]
    fn test_adjacent_non_symbols_join_with_space() {
        let mut line = Line::new(2);
        line.append(Run::non_symbol("(")).unwrap();
        line.append(Run::non_symbol(")")).unwrap();
        line.append(Run::symbol("x", None)).unwrap();
        assert_eq!(line.render(), "2 ( ) \nx\n\n");
    }

    #[test]
    fn test_mark_mismatch_is_a_conflict() {
        let mut line = Line::new(3);
        line.append(Run::symbol("a", Some(Mark::Include))).unwrap();
        let err = line.append(Run::symbol("b", Some(Mark::Assign)));
        assert_eq!(
            err,
            Err(IndexError::MarkConflict {
                what: "a/b".into(),
                line: 3,
            })
        );
    }

    #[test]
    fn test_func_end_after_symbol_gets_spacer() {
        let mut line = Line::new(4);
        line.append(Run::non_symbol("return")).unwrap();
        line.append(Run::symbol("x", None)).unwrap();
        line.append(Run::func_end()).unwrap();
        assert_eq!(line.render(), "4 return \nx\n \n\t}\n\n");
    }

    #[test]
    fn test_func_end_on_empty_line_stands_alone() {
        let mut line = Line::new(5);
        line.append(Run::func_end()).unwrap();
        assert_eq!(line.render(), "5 \n\t}\n\n");
    }

    #[test]
    fn test_line_without_symbol_renders_empty() {
        let mut line = Line::new(6);
        line.append(Run::non_symbol("pass")).unwrap();
        assert_eq!(line.render(), "");
    }

    #[test]
    fn test_symbol_first_layout() {
        let mut line = Line::new(7);
        line.append(Run::symbol("x", Some(Mark::Assign))).unwrap();
        line.append(Run::non_symbol("=")).unwrap();
        line.append(Run::symbol("y", None)).unwrap();
        assert_eq!(line.render(), "7 \n\t=x\n = \ny\n\n");
    }
}
