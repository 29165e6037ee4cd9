//! Per-file traversal state.
//!
//! The classifier runs ahead of the terminal processor: when it recognizes a
//! construct it records marks for tokens the walk has not reached yet, keyed
//! by node identity. [`FileContext`] owns that lookaside state together with
//! the output buffer, the open [`Line`], and the indentation bookkeeping
//! that detects function ends.

use std::collections::{HashMap, HashSet};

use crate::domain::cst::NodeId;
use crate::domain::error::IndexError;
use crate::domain::line::{Line, Run};
use crate::domain::mark::Mark;

/// Write-once / read-once mark storage.
///
/// Registering a node twice is a conflict, and a strict take of an absent
/// node is an error; both turn silent bookkeeping bugs into reported ones.
/// The engine's normal read path is [`MarkTable::claim`], which tolerates
/// absence because most tokens are never marked.
#[derive(Debug, Default)]
pub struct MarkTable {
    marks: HashMap<NodeId, Mark>,
}

impl MarkTable {
    pub fn register(&mut self, id: NodeId, mark: Mark, what: &str) -> Result<(), IndexError> {
        if let Some(existing) = self.marks.get(&id) {
            return Err(IndexError::MarkConflict {
                what: format!("{} ({}/{})", what, existing.code(), mark.code()),
                line: 0,
            });
        }
        self.marks.insert(id, mark);
        Ok(())
    }

    /// Removes and returns the mark for `id`, if one was registered.
    pub fn claim(&mut self, id: NodeId) -> Option<Mark> {
        self.marks.remove(&id)
    }

    /// Strict variant of [`MarkTable::claim`] for callers that know a mark
    /// must be present.
    pub fn take(&mut self, id: NodeId) -> Result<Mark, IndexError> {
        self.marks.remove(&id).ok_or(IndexError::MissingMark { line: 0 })
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Mutable state carried through the walk of one file's tree.
pub struct FileContext {
    /// Rendered database records for every committed line with a symbol.
    buff: Vec<String>,
    /// The source line currently being accumulated. `None` only after the
    /// end-of-file commit.
    line: Option<Line>,
    marks: MarkTable,
    /// Assignment targets registered by the classifier, waiting for their
    /// `Test` / `StarExpr` node to come up in the walk.
    pending: HashSet<NodeId>,
    /// Set when a pending target was reached; the next `Power` node
    /// resolves it.
    resolving: bool,
    /// Current block nesting depth, maintained from Indent/Dedent tokens.
    pub indent_lvl: usize,
    /// Depth at which the innermost marked function was defined; `None`
    /// while no function definition is open.
    pub func_def_lvl: Option<usize>,
    /// Number of dotted names still expected by an `import` statement.
    pub import_cnt: usize,
    /// True between an `import` statement and its last dotted name.
    pub import_name: bool,
    /// Treat string literals that look like identifiers as symbols.
    pub strings_as_symbols: bool,
}

impl FileContext {
    pub fn new(strings_as_symbols: bool) -> Self {
        FileContext {
            buff: Vec::new(),
            line: Some(Line::new(1)),
            marks: MarkTable::default(),
            pending: HashSet::new(),
            resolving: false,
            indent_lvl: 0,
            func_def_lvl: None,
            import_cnt: 0,
            import_name: false,
            strings_as_symbols,
        }
    }

    /// Line number of the line currently being accumulated.
    pub fn line_number(&self) -> Option<usize> {
        self.line.as_ref().map(Line::number)
    }

    /// Appends a run to the open line.
    pub fn push_run(&mut self, run: Run) -> Result<(), IndexError> {
        match self.line.as_mut() {
            Some(line) => line.append(run),
            None => Err(IndexError::ShapeViolation {
                construct: "token after end of input",
                line: 0,
            }),
        }
    }

    /// Closes the open line, keeping its records when it held a symbol, and
    /// opens a fresh line at `next` (or none at end of file).
    pub fn commit(&mut self, next: Option<usize>) {
        if let Some(line) = self.line.take() {
            let rendered = line.render();
            if !rendered.is_empty() {
                self.buff.push(rendered);
            }
        }
        self.line = next.map(Line::new);
    }

    pub fn register_mark(&mut self, id: NodeId, mark: Mark, what: &str) -> Result<(), IndexError> {
        self.marks.register(id, mark, what)
    }

    pub fn claim_mark(&mut self, id: NodeId) -> Option<Mark> {
        self.marks.claim(id)
    }

    pub fn register_pending(&mut self, id: NodeId) {
        self.pending.insert(id);
    }

    /// Removes `id` from the pending-assignment set, reporting whether it
    /// was there.
    pub fn take_pending(&mut self, id: NodeId) -> bool {
        self.pending.remove(&id)
    }

    /// Arms assignment resolution for the next `power` node.
    ///
    /// At most one resolution may be outstanding at a time.
    pub fn begin_assignment_resolution(&mut self) -> Result<(), IndexError> {
        if self.resolving {
            return Err(IndexError::ShapeViolation {
                construct: "assignment target (resolution already armed)",
                line: 0,
            });
        }
        self.resolving = true;
        Ok(())
    }

    /// Consumes the resolution flag, reporting whether it was armed.
    pub fn take_assignment_resolution(&mut self) -> bool {
        std::mem::take(&mut self.resolving)
    }

    /// Ends the file: verifies no assignment state was left dangling and
    /// hands back the accumulated records.
    pub fn finish(self) -> Result<Vec<String>, IndexError> {
        let outstanding = self.pending.len() + usize::from(self.resolving);
        if outstanding > 0 {
            return Err(IndexError::UnresolvedPending {
                outstanding,
                line: 0,
            });
        }
        Ok(self.buff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cst::{SyntaxTree, TokenKind};

    fn node_ids(n: usize) -> Vec<NodeId> {
        let mut tree = SyntaxTree::new();
        (0..n)
            .map(|i| tree.push_terminal(TokenKind::Name, format!("n{}", i), 1))
            .collect()
    }

    #[test]
    fn test_mark_table_is_read_once() {
        let ids = node_ids(1);
        let mut table = MarkTable::default();
        table.register(ids[0], Mark::FuncCall, "f").unwrap();
        assert_eq!(table.claim(ids[0]), Some(Mark::FuncCall));
        assert_eq!(table.claim(ids[0]), None);
    }

    #[test]
    fn test_mark_table_rejects_conflicting_rewrite() {
        let ids = node_ids(1);
        let mut table = MarkTable::default();
        table.register(ids[0], Mark::FuncCall, "f").unwrap();
        let err = table.register(ids[0], Mark::Assign, "f");
        assert!(matches!(err, Err(IndexError::MarkConflict { .. })));
    }

    #[test]
    fn test_mark_table_strict_take() {
        let ids = node_ids(1);
        let mut table = MarkTable::default();
        assert_eq!(table.take(ids[0]), Err(IndexError::MissingMark { line: 0 }));
        table.register(ids[0], Mark::Global, "g").unwrap();
        assert_eq!(table.take(ids[0]), Ok(Mark::Global));
    }

    #[test]
    fn test_commit_keeps_only_symbol_lines() {
        let mut ctx = FileContext::new(false);
        ctx.push_run(Run::non_symbol("pass")).unwrap();
        ctx.commit(Some(2));
        ctx.push_run(Run::symbol("x", None)).unwrap();
        ctx.commit(None);

        let buff = ctx.finish().unwrap();
        assert_eq!(buff, vec!["2 \nx\n\n".to_string()]);
    }

    #[test]
    fn test_resolution_flag_cannot_be_armed_twice() {
        let mut ctx = FileContext::new(false);
        ctx.begin_assignment_resolution().unwrap();
        assert!(ctx.begin_assignment_resolution().is_err());
        assert!(ctx.take_assignment_resolution());
        assert!(!ctx.take_assignment_resolution());
    }

    #[test]
    fn test_finish_reports_dangling_assignment_state() {
        let ids = node_ids(2);
        let mut ctx = FileContext::new(false);
        ctx.register_pending(ids[0]);
        ctx.register_pending(ids[1]);
        assert_eq!(
            ctx.finish(),
            Err(IndexError::UnresolvedPending {
                outstanding: 2,
                line: 0,
            })
        );
    }

    #[test]
    fn test_pending_set_is_identity_keyed() {
        let ids = node_ids(2);
        let mut ctx = FileContext::new(false);
        ctx.register_pending(ids[0]);
        assert!(!ctx.take_pending(ids[1]));
        assert!(ctx.take_pending(ids[0]));
        assert!(!ctx.take_pending(ids[0]));
    }
}
