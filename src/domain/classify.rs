//! Grammar-pattern classification.
//!
//! Runs once per non-terminal during the walk, before any of the node's
//! tokens are emitted. Recognized constructs register marks (or pending
//! assignment targets) for tokens deeper in the tree; everything not
//! matched here passes through untouched and its names come out as
//! unmarked symbols.

use crate::domain::context::FileContext;
use crate::domain::cst::{GrammarKind, NodeId, SyntaxTree, TokenKind};
use crate::domain::error::IndexError;
use crate::domain::mark::Mark;

fn shape(construct: &'static str) -> IndexError {
    IndexError::ShapeViolation { construct, line: 0 }
}

/// Registers a mark, enforcing that only `Name` and `Dot` tokens can carry
/// one.
fn register_symbol_mark(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
    mark: Mark,
) -> Result<(), IndexError> {
    match tree.token_kind(id) {
        Some(TokenKind::Name) | Some(TokenKind::Dot) => {
            let what = tree.terminal_text(id).unwrap_or("").to_string();
            ctx.register_mark(id, mark, &what)
        }
        _ => Err(shape("symbol token")),
    }
}

/// Classifies one non-terminal node.
pub fn process_non_terminal(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let Some(kind) = tree.grammar_kind(id) else {
        return Ok(());
    };
    match kind {
        GrammarKind::GlobalStmt => mark_global_declaration(ctx, tree, id),
        GrammarKind::FuncDef => mark_function_definition(ctx, tree, id),
        GrammarKind::Decorated => mark_function_decorators(ctx, tree, id),
        GrammarKind::ImportFrom => mark_from_import(ctx, tree, id),
        GrammarKind::ImportName => {
            // Dotted names that follow belong to an import statement.
            ctx.import_name = true;
            Ok(())
        }
        GrammarKind::DottedAsNames if ctx.import_name => {
            // One dotted name per "a as b" clause; counting them up front
            // lets the walk skip the aliases without a second pass.
            ctx.import_cnt = (tree.children(id).len() + 1) / 2;
            Ok(())
        }
        GrammarKind::DottedName if ctx.import_name => mark_imported_path(ctx, tree, id),
        GrammarKind::ExprStmt => track_assignment_targets(ctx, tree, id),
        GrammarKind::Test | GrammarKind::StarExpr => {
            if ctx.take_pending(id) {
                // Somewhere inside this subtree sits the power node that is
                // the assignment target; arm the flag so it marks itself.
                ctx.begin_assignment_resolution()?;
            }
            Ok(())
        }
        GrammarKind::ClassDef => mark_class_definition(ctx, tree, id),
        GrammarKind::Power => classify_power(ctx, tree, id),
        _ => Ok(()),
    }
}

/// `global a, b, c` marks every listed name.
fn mark_global_declaration(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    // Children alternate keyword/name/comma/name/..., names at the odd
    // positions.
    for &child in tree.children(id).iter().skip(1).step_by(2) {
        register_symbol_mark(ctx, tree, child, Mark::Global)?;
    }
    Ok(())
}

/// Marks the name of an outermost `def`. Nested definitions are left
/// unmarked because cscope cannot represent them, and the enclosing
/// function stays open until its own dedent.
fn mark_function_definition(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    if ctx.func_def_lvl.is_some() {
        return Ok(());
    }
    ctx.func_def_lvl = Some(ctx.indent_lvl);
    let children = tree.children(id);
    // `async def` carries an extra leading keyword, so locate `def` and
    // take the token after it.
    let name = children
        .iter()
        .position(|&c| tree.is_keyword(c, "def"))
        .and_then(|at| children.get(at + 1))
        .copied();
    match name {
        Some(name) if tree.is_token(name, TokenKind::Name) => {
            register_symbol_mark(ctx, tree, name, Mark::FuncDef)
        }
        _ => Err(shape("function definition")),
    }
}

/// Marks decorator names on decorated function definitions as calls.
///
/// Dotted decorators only mark their last component; the bare builtins
/// `property` and `classmethod` are not calls worth recording. Decorated
/// classes are skipped entirely.
fn mark_function_decorators(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let children = tree.children(id);
    if children.len() != 2
        || !tree.is_grammar(children[0], GrammarKind::Decorators)
        || !tree.is_grammar(children[1], GrammarKind::FuncDef)
    {
        return Ok(());
    }
    for &decorator in tree.children(children[0]) {
        let dc = tree.children(decorator);
        let well_formed = tree.is_grammar(decorator, GrammarKind::Decorator)
            && dc.len() >= 2
            && tree.is_token(dc[0], TokenKind::At)
            && tree.is_grammar(dc[1], GrammarKind::DottedName);
        if !well_formed {
            return Err(shape("decorator"));
        }
        let dotted = tree.children(dc[1]);
        match dotted {
            [] => return Err(shape("decorator")),
            [single] => {
                let text = tree.terminal_text(*single).unwrap_or("");
                if text != "property" && text != "classmethod" {
                    register_symbol_mark(ctx, tree, *single, Mark::FuncCall)?;
                }
            }
            [.., last] => register_symbol_mark(ctx, tree, *last, Mark::FuncCall)?,
        }
    }
    Ok(())
}

/// `from a.b import ...` marks the dotted module path; relative dots and
/// the imported names themselves stay unmarked.
fn mark_from_import(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let children = tree.children(id);
    let mut idx = 1;
    while idx < children.len()
        && matches!(
            tree.token_kind(children[idx]),
            Some(TokenKind::Dot) | Some(TokenKind::Ellipsis)
        )
    {
        idx += 1;
    }
    if let Some(&dn) = children.get(idx) {
        if tree.is_grammar(dn, GrammarKind::DottedName) {
            // Every component shares the mark, so the walk merges them
            // back into one a.b.c symbol.
            for &tok in tree.children(dn) {
                register_symbol_mark(ctx, tree, tok, Mark::Include)?;
            }
        }
    }
    Ok(())
}

/// One dotted name of an `import` statement; aliases after `as` are not
/// part of the symbol.
fn mark_imported_path(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    if ctx.import_cnt == 0 {
        return Err(shape("import statement"));
    }
    for &tok in tree.children(id) {
        register_symbol_mark(ctx, tree, tok, Mark::Include)?;
    }
    ctx.import_cnt -= 1;
    if ctx.import_cnt == 0 {
        ctx.import_name = false;
    }
    Ok(())
}

/// Finds assignment statements and queues their target expressions.
///
/// Targets cannot be marked here: the walk still has to descend through
/// the `test` wrapper to the `power` that actually holds the name. The
/// pending set bridges that gap.
fn track_assignment_targets(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let children = tree.children(id);
    if children.len() < 3 {
        return Ok(());
    }
    let lhs = children[0];
    if !tree.is_grammar(lhs, GrammarKind::TestList) {
        return Err(shape("assignment statement"));
    }
    let rhs_ok = matches!(
        tree.grammar_kind(children[2]),
        Some(GrammarKind::TestList) | Some(GrammarKind::YieldExpr)
    );
    if tree.is_grammar(children[1], GrammarKind::AugAssign) && rhs_ok {
        // Augmented assignment has exactly one target.
        match tree.children(lhs).first() {
            Some(&first) if tree.is_grammar(first, GrammarKind::Test) => {
                ctx.register_pending(first);
                Ok(())
            }
            _ => Err(shape("augmented assignment")),
        }
    } else if tree.is_token(children[1], TokenKind::Equal) {
        // Plain (possibly chained) assignment: every testlist except the
        // final one names targets.
        queue_testlist_targets(ctx, tree, lhs);
        for &child in &children[2..children.len() - 1] {
            if tree.is_token(child, TokenKind::Equal) {
                continue;
            }
            if !tree.is_grammar(child, GrammarKind::TestList) {
                break;
            }
            queue_testlist_targets(ctx, tree, child);
        }
        Ok(())
    } else {
        Ok(())
    }
}

/// Queues each element of a target testlist. Anything that is not a plain
/// element (unpacking oddities and the like) stops the scan.
fn queue_testlist_targets(ctx: &mut FileContext, tree: &SyntaxTree, id: NodeId) {
    for &child in tree.children(id) {
        if tree.is_token(child, TokenKind::Comma) {
            continue;
        }
        match tree.grammar_kind(child) {
            Some(GrammarKind::Test) | Some(GrammarKind::StarExpr) => ctx.register_pending(child),
            _ => break,
        }
    }
}

/// `class Foo(...)` marks the class name. Base classes are plain reads,
/// not calls, so they stay unmarked.
fn mark_class_definition(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let children = tree.children(id);
    if children.len() < 2 || !tree.is_keyword(children[0], "class") {
        return Err(shape("class definition"));
    }
    register_symbol_mark(ctx, tree, children[1], Mark::Class)
}

/// Classifies a `power` node: resolves an armed assignment target first,
/// then recognizes function calls.
fn classify_power(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<(), IndexError> {
    let children = tree.children(id);
    if ctx.take_assignment_resolution() {
        resolve_assignment_target(ctx, tree, children)?;
    }
    if let Some(name) = named_call_target(tree, children) {
        register_symbol_mark(ctx, tree, name, Mark::FuncCall)?;
    }
    for pair in children.windows(2) {
        if let Some(name) = trailer_call_target(tree, pair[0], pair[1]) {
            register_symbol_mark(ctx, tree, name, Mark::FuncCall)?;
        }
    }
    Ok(())
}

/// Applies the assignment mark to whichever target shape this power node
/// has. Shapes outside the recognized set are left unmarked on purpose.
fn resolve_assignment_target(
    ctx: &mut FileContext,
    tree: &SyntaxTree,
    children: &[NodeId],
) -> Result<(), IndexError> {
    if let [atom] = children {
        // Bare atom: either a plain name or a parenthesized/bracketed
        // target list whose elements get queued in turn.
        if !tree.is_grammar(*atom, GrammarKind::Atom) {
            return Ok(());
        }
        match tree.children(*atom) {
            [name] if tree.is_token(*name, TokenKind::Name) => {
                register_symbol_mark(ctx, tree, *name, Mark::Assign)?;
            }
            [open, inner, close]
                if matches!(
                    tree.token_kind(*open),
                    Some(TokenKind::Lpar) | Some(TokenKind::Lsqb)
                ) && tree.is_grammar(*inner, GrammarKind::TestListComp)
                    && matches!(
                        tree.token_kind(*close),
                        Some(TokenKind::Rpar) | Some(TokenKind::Rsqb)
                    ) =>
            {
                for &element in tree.children(*inner) {
                    if tree.is_token(element, TokenKind::Comma) {
                        continue;
                    }
                    // Starred elements end the scan; cscope has no way to
                    // express them.
                    if !tree.is_grammar(element, GrammarKind::Test) {
                        break;
                    }
                    ctx.register_pending(element);
                }
            }
            _ => {}
        }
        return Ok(());
    }

    // name[...] subscript target marks the base name.
    if let [atom, trailer] = children {
        if let Some(name) = simple_name_atom(tree, *atom) {
            if is_subscript_trailer(tree, *trailer) {
                return register_symbol_mark(ctx, tree, name, Mark::Assign);
            }
        }
    }

    // name.attr targets mark the final attribute...
    if children.len() >= 2 {
        if let Some(&last) = children.last() {
            if let Some(attr) = dot_name_trailer(tree, last) {
                return register_symbol_mark(ctx, tree, attr, Mark::Assign);
            }
        }
    }
    // ...and name.attr[...] targets mark the attribute before the
    // subscript.
    if children.len() >= 3 {
        let second_last = children[children.len() - 2];
        let last = children[children.len() - 1];
        if let Some(attr) = dot_name_trailer(tree, second_last) {
            if is_subscript_trailer(tree, last) {
                return register_symbol_mark(ctx, tree, attr, Mark::Assign);
            }
        }
    }
    Ok(())
}

/// Atom wrapping exactly one name token, yielding that token.
fn simple_name_atom(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    if !tree.is_grammar(id, GrammarKind::Atom) {
        return None;
    }
    match tree.children(id) {
        [name] if tree.is_token(*name, TokenKind::Name) => Some(*name),
        _ => None,
    }
}

/// `trailer` of the form `[ ... ]`.
fn is_subscript_trailer(tree: &SyntaxTree, id: NodeId) -> bool {
    if !tree.is_grammar(id, GrammarKind::Trailer) {
        return false;
    }
    let children = tree.children(id);
    children.len() >= 3
        && tree.is_token(children[0], TokenKind::Lsqb)
        && children
            .last()
            .is_some_and(|&c| tree.is_token(c, TokenKind::Rsqb))
}

/// `trailer` of the form `.name`, yielding the attribute token.
fn dot_name_trailer(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    if !tree.is_grammar(id, GrammarKind::Trailer) {
        return None;
    }
    match tree.children(id) {
        [dot, name]
            if tree.is_token(*dot, TokenKind::Dot) && tree.is_token(*name, TokenKind::Name) =>
        {
            Some(*name)
        }
        _ => None,
    }
}

/// `name(...)` at the head of a power node, yielding the called name.
fn named_call_target(tree: &SyntaxTree, children: &[NodeId]) -> Option<NodeId> {
    let (&atom, &trailer) = (children.first()?, children.get(1)?);
    if !tree.is_grammar(atom, GrammarKind::Atom) || !tree.is_grammar(trailer, GrammarKind::Trailer)
    {
        return None;
    }
    let name = *tree.children(atom).first()?;
    if !tree.is_token(name, TokenKind::Name) {
        return None;
    }
    let args = tree.children(trailer);
    let called = tree.is_token(*args.first()?, TokenKind::Lpar)
        && tree.is_token(*args.last()?, TokenKind::Rpar);
    called.then_some(name)
}

/// `.name(...)` pair of adjacent trailers, yielding the called attribute.
fn trailer_call_target(tree: &SyntaxTree, first: NodeId, second: NodeId) -> Option<NodeId> {
    let attr = dot_name_trailer(tree, first)?;
    if !tree.is_grammar(second, GrammarKind::Trailer) {
        return None;
    }
    let args = tree.children(second);
    let called = tree.is_token(*args.first()?, TokenKind::Lpar)
        && tree.is_token(*args.last()?, TokenKind::Rpar);
    called.then_some(attr)
}
