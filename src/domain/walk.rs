//! Single-pass tree walk.
//!
//! Visits every node of the concrete syntax tree iteratively, depth-first
//! and left to right. Non-terminals go through the classifier before any of
//! their tokens are reached; terminals drive line commits, indentation
//! depth and the emission of text runs. One walk per file, no revisits.

use crate::domain::classify;
use crate::domain::context::FileContext;
use crate::domain::cst::{Node, NodeId, SyntaxTree, TokenKind};
use crate::domain::error::IndexError;
use crate::domain::line::Run;

/// Python reserved words. Keywords never become symbols, whatever the
/// classifier thought of them.
pub(crate) fn is_reserved_word(text: &str) -> bool {
    matches!(
        text,
        "False"
            | "None"
            | "True"
            | "and"
            | "as"
            | "assert"
            | "async"
            | "await"
            | "break"
            | "class"
            | "continue"
            | "def"
            | "del"
            | "elif"
            | "else"
            | "except"
            | "finally"
            | "for"
            | "from"
            | "global"
            | "if"
            | "import"
            | "in"
            | "is"
            | "lambda"
            | "nonlocal"
            | "not"
            | "or"
            | "pass"
            | "raise"
            | "return"
            | "try"
            | "while"
            | "with"
            | "yield"
    )
}

/// Walks a file's tree and returns its database records, one string per
/// indexed source line.
pub fn index_tree(tree: &SyntaxTree, strings_as_symbols: bool) -> Result<Vec<String>, IndexError> {
    let mut ctx = FileContext::new(strings_as_symbols);
    let root = match tree.root() {
        Some(root) => root,
        None => return ctx.finish(),
    };
    let last_line = walk(&mut ctx, tree, root)?;
    ctx.finish().map_err(|e| e.with_line(last_line))
}

/// Iterative depth-first traversal; children are pushed in reverse so they
/// pop in source order. Returns the line of the last terminal seen, which
/// is also attached to any error coming out of the node handlers.
fn walk(ctx: &mut FileContext, tree: &SyntaxTree, root: NodeId) -> Result<usize, IndexError> {
    let mut lineno = 1usize;
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        match tree.node(id) {
            Node::NonTerminal { children, .. } => {
                classify::process_non_terminal(ctx, tree, id)
                    .map_err(|e| e.with_line(lineno))?;
                stack.extend(children.iter().rev().copied());
            }
            Node::Terminal { kind, text, line } => {
                lineno = process_terminal(ctx, id, *kind, text, *line)
                    .map_err(|e| e.with_line(lineno))?;
            }
        }
    }
    Ok(lineno)
}

/// Handles one terminal token, returning its line number for the walk to
/// carry forward.
fn process_terminal(
    ctx: &mut FileContext,
    id: NodeId,
    kind: TokenKind,
    text: &str,
    lineno: usize,
) -> Result<usize, IndexError> {
    if kind == TokenKind::Dedent {
        // Dedents run before the line-number commit below so a function
        // end lands on the line that closed the body, not on the next
        // statement.
        ctx.indent_lvl = ctx.indent_lvl.saturating_sub(1);
        if ctx.func_def_lvl == Some(ctx.indent_lvl) {
            ctx.func_def_lvl = None;
            ctx.push_run(Run::func_end())?;
        }
        return Ok(lineno);
    }

    if ctx.line_number() != Some(lineno) && kind != TokenKind::Str {
        // A token on a new line commits the previous one; this is what
        // ends backslash-continued lines, which never get a Newline
        // token. Strings are exempt so multi-line literals stay attached
        // to the line that opened them.
        ctx.commit(Some(lineno));
    }

    match kind {
        TokenKind::Newline => {
            // Line commits are driven by the line-number change above.
        }
        TokenKind::Indent => {
            ctx.indent_lvl += 1;
        }
        TokenKind::Str => {
            if ctx.strings_as_symbols && is_quoted_identifier(text) {
                // Bracket the quoted name so it reads as a reference in
                // the cscope display.
                ctx.push_run(Run::non_symbol("[["))?;
                ctx.push_run(Run::symbol(text, None))?;
                ctx.push_run(Run::non_symbol("]]"))?;
            } else {
                ctx.push_run(Run::non_symbol(text.replace('\n', "\\n")))?;
            }
        }
        TokenKind::Name => {
            if is_reserved_word(text) {
                // A stray mark on a keyword is dropped, never emitted.
                let _ = ctx.claim_mark(id);
                ctx.push_run(Run::non_symbol(text))?;
            } else {
                let mark = ctx.claim_mark(id);
                ctx.push_run(Run::symbol(text, mark))?;
            }
        }
        TokenKind::Dot => match ctx.claim_mark(id) {
            // A marked dot joins the dotted-name symbol being built up.
            Some(mark) => ctx.push_run(Run::symbol(text, Some(mark)))?,
            None => ctx.push_run(Run::non_symbol(text))?,
        },
        TokenKind::EndMarker => {
            ctx.commit(None);
        }
        _ => {
            ctx.push_run(Run::non_symbol(text))?;
        }
    }
    Ok(lineno)
}

/// A string literal whose body is a plain identifier, like `"foo"` or
/// `'''Bar'''`.
fn is_quoted_identifier(text: &str) -> bool {
    for quote in ["'''", "\"\"\"", "'", "\""] {
        if let Some(body) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            let mut chars = body.chars();
            return chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        }
    }
    false
}
