/// Recursive-descent parser for Python source.
///
/// Builds the concrete syntax tree the indexing walk consumes. The grammar
/// here is deliberately shallower than Python's: singleton production
/// chains are collapsed, expression precedence levels are flattened into a
/// run of operand and operator children inside each `test` node, and the
/// keyword statements keep their tokens inline. What it preserves exactly
/// are the productions the classifier inspects structurally: `funcdef`,
/// `decorated`, the import statements, `expr_stmt` with its assignment
/// layout, `testlist`/`test` nesting, and `power`/`atom`/`trailer` chains.
///
/// The parser is also lenient on purpose. It accepts some token sequences
/// CPython would reject; a cross-reference of slightly broken code is more
/// useful than no cross-reference at all.

use std::borrow::Cow;

use crate::domain::cst::{GrammarKind, NodeId, SyntaxTree, TokenKind};
use crate::domain::error::ParseError;
use crate::infrastructure::tokenizer::{tokenize, Tok};
use crate::ports::CstParser;

/// Hard cap on statement and expression nesting.
const MAX_NESTING: usize = 200;

const AUGMENTED_OPS: [&str; 13] = [
    "+=", "-=", "*=", "/=", "//=", "%=", "**=", ">>=", "<<=", "&=", "|=", "^=", "@=",
];

const BINARY_OPS: [&str; 19] = [
    "+", "-", "*", "/", "//", "%", "**", "<<", ">>", "&", "|", "^", "<", ">", "<=", ">=", "==",
    "!=", ":=",
];

/// How much expression grammar a `test` position allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestFlavor {
    /// Ternary conditionals and keyword operators.
    Full,
    /// Keyword operators but no ternary; operands of a comprehension
    /// clause, where a following `if` or `else` belongs to the clause.
    NoCond,
    /// Arithmetic operators only; `for` targets, where a following `in`
    /// belongs to the loop.
    Target,
}

pub struct PythonCstParser;

impl PythonCstParser {
    pub fn new() -> Self {
        PythonCstParser
    }
}

impl Default for PythonCstParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CstParser for PythonCstParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError> {
        let source: Cow<'_, str> = if source.contains('\r') {
            Cow::Owned(source.replace("\r\n", "\n").replace('\r', "\n"))
        } else {
            Cow::Borrowed(source)
        };
        let toks = tokenize(&source)?;
        Parser::new(&toks).run()
    }
}

struct Parser<'t> {
    toks: &'t [Tok],
    at: usize,
    depth: usize,
    tree: SyntaxTree,
}

impl<'t> Parser<'t> {
    fn new(toks: &'t [Tok]) -> Self {
        Parser { toks, at: 0, depth: 0, tree: SyntaxTree::new() }
    }

    fn run(mut self) -> Result<SyntaxTree, ParseError> {
        let mut children = Vec::new();
        while self.kind() != TokenKind::EndMarker {
            children.push(self.parse_stmt()?);
        }
        children.push(self.advance());
        let root = self.tree.push_non_terminal(GrammarKind::FileInput, children);
        self.tree.set_root(root);
        Ok(self.tree)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token access
    // ═══════════════════════════════════════════════════════════════════════

    fn cur(&self) -> &Tok {
        // The token stream always ends with ENDMARKER, so clamping keeps
        // every lookahead in bounds.
        &self.toks[self.at.min(self.toks.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn text(&self) -> &str {
        &self.cur().text
    }

    fn line(&self) -> usize {
        self.cur().line
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.kind() == TokenKind::Name && self.text() == word
    }

    fn at_op(&self, op: &str) -> bool {
        self.kind() == TokenKind::Op && self.text() == op
    }

    fn advance(&mut self) -> NodeId {
        let tok = self.cur().clone();
        self.at += 1;
        self.tree.push_terminal(tok.kind, tok.text, tok.line)
    }

    fn expect(&mut self, kind: TokenKind, what: &'static str) -> Result<NodeId, ParseError> {
        if self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_keyword(&mut self, word: &'static str) -> Result<NodeId, ParseError> {
        if self.at_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn unexpected(&self, what: &str) -> ParseError {
        let got = match self.kind() {
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EndMarker => "end of file".to_string(),
            _ => format!("{:?}", self.text()),
        };
        ParseError::new(format!("expected {what}, found {got}"), self.line())
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::new("nesting too deep", self.line()));
        }
        Ok(())
    }

    /// Whether the current token can open an expression. Keywords that only
    /// ever continue an enclosing construct are excluded so trailing commas
    /// terminate cleanly.
    fn can_start_test(&self) -> bool {
        match self.kind() {
            TokenKind::Number
            | TokenKind::Str
            | TokenKind::Lpar
            | TokenKind::Lsqb
            | TokenKind::Lbrace
            | TokenKind::Ellipsis => true,
            TokenKind::Op => matches!(self.text(), "-" | "+" | "~" | "*" | "**"),
            TokenKind::Name => !matches!(
                self.text(),
                "for" | "in" | "if" | "else" | "elif" | "and" | "or" | "is" | "as" | "from"
                    | "import" | "async"
            ),
            _ => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_stmt(&mut self) -> Result<NodeId, ParseError> {
        self.descend()?;
        let node = match self.kind() {
            TokenKind::At => self.parse_decorated(),
            TokenKind::Name => match self.text() {
                "def" => self.parse_funcdef(),
                "class" => self.parse_classdef(),
                "if" | "while" | "for" | "try" | "with" => self.parse_compound_stmt(),
                "async" => self.parse_async_stmt(),
                _ => self.parse_simple_stmt(),
            },
            TokenKind::Indent | TokenKind::Dedent => Err(self.unexpected("statement")),
            _ => self.parse_simple_stmt(),
        }?;
        self.depth -= 1;
        Ok(node)
    }

    fn parse_async_stmt(&mut self) -> Result<NodeId, ParseError> {
        match self.toks.get(self.at + 1) {
            Some(t) if t.kind == TokenKind::Name && t.text == "def" => self.parse_funcdef(),
            Some(t) if t.kind == TokenKind::Name && (t.text == "for" || t.text == "with") => {
                self.parse_compound_stmt()
            }
            _ => Err(ParseError::new("expected def, for or with after async", self.line())),
        }
    }

    fn parse_funcdef(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        if self.at_keyword("async") {
            children.push(self.advance());
        }
        children.push(self.expect_keyword("def")?);
        children.push(self.expect(TokenKind::Name, "function name")?);
        children.push(self.parse_parameters()?);
        if self.at_op("->") {
            children.push(self.advance());
            children.push(self.parse_test()?);
        }
        children.push(self.expect(TokenKind::Colon, "':'")?);
        children.push(self.parse_suite()?);
        Ok(self.tree.push_non_terminal(GrammarKind::FuncDef, children))
    }

    fn parse_parameters(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect(TokenKind::Lpar, "'('")?];
        while self.kind() != TokenKind::Rpar {
            match self.kind() {
                // Parameter names, separators and the bare * ** / markers
                // stay inline; only annotation and default values need
                // expression structure.
                TokenKind::Name | TokenKind::Comma | TokenKind::Op => {
                    children.push(self.advance());
                }
                TokenKind::Colon | TokenKind::Equal => {
                    children.push(self.advance());
                    children.push(self.parse_test()?);
                }
                _ => return Err(self.unexpected("parameter")),
            }
        }
        children.push(self.advance());
        Ok(self.tree.push_non_terminal(GrammarKind::Parameters, children))
    }

    fn parse_suite(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        if self.kind() == TokenKind::Newline {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Indent, "an indented block")?);
            while !matches!(self.kind(), TokenKind::Dedent | TokenKind::EndMarker) {
                children.push(self.parse_stmt()?);
            }
            children.push(self.expect(TokenKind::Dedent, "dedent")?);
        } else {
            children.push(self.parse_simple_stmt()?);
        }
        Ok(self.tree.push_non_terminal(GrammarKind::Suite, children))
    }

    fn parse_compound_stmt(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        if self.at_keyword("async") {
            children.push(self.advance());
        }
        if self.at_keyword("if") || self.at_keyword("while") {
            children.push(self.advance());
            children.push(self.parse_test()?);
            children.push(self.expect(TokenKind::Colon, "':'")?);
            children.push(self.parse_suite()?);
            while self.at_keyword("elif") {
                children.push(self.advance());
                children.push(self.parse_test()?);
                children.push(self.expect(TokenKind::Colon, "':'")?);
                children.push(self.parse_suite()?);
            }
            self.parse_else_clause(&mut children)?;
        } else if self.at_keyword("for") {
            children.push(self.advance());
            children.push(self.parse_target_list()?);
            children.push(self.expect_keyword("in")?);
            children.push(self.parse_testlist()?);
            children.push(self.expect(TokenKind::Colon, "':'")?);
            children.push(self.parse_suite()?);
            self.parse_else_clause(&mut children)?;
        } else if self.at_keyword("try") {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Colon, "':'")?);
            children.push(self.parse_suite()?);
            while self.at_keyword("except") {
                children.push(self.advance());
                if self.at_op("*") {
                    children.push(self.advance());
                }
                if self.kind() != TokenKind::Colon {
                    children.push(self.parse_test()?);
                    if self.at_keyword("as") {
                        children.push(self.advance());
                        children.push(self.expect(TokenKind::Name, "exception alias")?);
                    }
                }
                children.push(self.expect(TokenKind::Colon, "':'")?);
                children.push(self.parse_suite()?);
            }
            self.parse_else_clause(&mut children)?;
            if self.at_keyword("finally") {
                children.push(self.advance());
                children.push(self.expect(TokenKind::Colon, "':'")?);
                children.push(self.parse_suite()?);
            }
        } else if self.at_keyword("with") {
            children.push(self.advance());
            loop {
                children.push(self.parse_test()?);
                if self.at_keyword("as") {
                    children.push(self.advance());
                    children.push(self.parse_test()?);
                }
                if self.kind() == TokenKind::Comma {
                    children.push(self.advance());
                } else {
                    break;
                }
            }
            children.push(self.expect(TokenKind::Colon, "':'")?);
            children.push(self.parse_suite()?);
        } else {
            return Err(self.unexpected("statement"));
        }
        Ok(self.tree.push_non_terminal(GrammarKind::CompoundStmt, children))
    }

    fn parse_else_clause(&mut self, children: &mut Vec<NodeId>) -> Result<(), ParseError> {
        if self.at_keyword("else") {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Colon, "':'")?);
            children.push(self.parse_suite()?);
        }
        Ok(())
    }

    fn parse_classdef(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect_keyword("class")?];
        children.push(self.expect(TokenKind::Name, "class name")?);
        if self.kind() == TokenKind::Lpar {
            children.push(self.advance());
            if self.kind() != TokenKind::Rpar {
                children.push(self.parse_arglist()?);
            }
            children.push(self.expect(TokenKind::Rpar, "')'")?);
        }
        children.push(self.expect(TokenKind::Colon, "':'")?);
        children.push(self.parse_suite()?);
        Ok(self.tree.push_non_terminal(GrammarKind::ClassDef, children))
    }

    fn parse_decorated(&mut self) -> Result<NodeId, ParseError> {
        let mut decorators = Vec::new();
        while self.kind() == TokenKind::At {
            decorators.push(self.parse_decorator()?);
        }
        let decorators = self.tree.push_non_terminal(GrammarKind::Decorators, decorators);
        let target = if self.at_keyword("def") || self.at_keyword("async") {
            self.parse_funcdef()?
        } else if self.at_keyword("class") {
            self.parse_classdef()?
        } else {
            return Err(self.unexpected("function or class definition"));
        };
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::Decorated, vec![decorators, target]))
    }

    fn parse_decorator(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect(TokenKind::At, "'@'")?];
        children.push(self.parse_dotted_name()?);
        if self.kind() == TokenKind::Lpar {
            children.push(self.advance());
            if self.kind() != TokenKind::Rpar {
                children.push(self.parse_arglist()?);
            }
            children.push(self.expect(TokenKind::Rpar, "')'")?);
        }
        children.push(self.expect(TokenKind::Newline, "end of line")?);
        Ok(self.tree.push_non_terminal(GrammarKind::Decorator, children))
    }

    fn parse_dotted_name(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect(TokenKind::Name, "name")?];
        while self.kind() == TokenKind::Dot {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Name, "name")?);
        }
        Ok(self.tree.push_non_terminal(GrammarKind::DottedName, children))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Simple statements
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_simple_stmt(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            self.parse_small_stmt(&mut children)?;
            if self.kind() == TokenKind::Semi {
                children.push(self.advance());
                if self.kind() == TokenKind::Newline {
                    break;
                }
                continue;
            }
            break;
        }
        children.push(self.expect(TokenKind::Newline, "end of line")?);
        Ok(self.tree.push_non_terminal(GrammarKind::SimpleStmt, children))
    }

    fn parse_small_stmt(&mut self, children: &mut Vec<NodeId>) -> Result<(), ParseError> {
        if self.kind() != TokenKind::Name {
            children.push(self.parse_expr_stmt()?);
            return Ok(());
        }
        match self.text() {
            "global" => children.push(self.parse_global_stmt()?),
            "import" => children.push(self.parse_import_name()?),
            "from" => children.push(self.parse_import_from()?),
            "pass" | "break" | "continue" => children.push(self.advance()),
            "return" => {
                children.push(self.advance());
                if self.can_start_test() {
                    children.push(self.parse_testlist()?);
                }
            }
            "del" => {
                children.push(self.advance());
                children.push(self.parse_testlist()?);
            }
            "raise" => {
                children.push(self.advance());
                if self.can_start_test() {
                    children.push(self.parse_test()?);
                    if self.at_keyword("from") {
                        children.push(self.advance());
                        children.push(self.parse_test()?);
                    }
                }
            }
            "assert" => {
                children.push(self.advance());
                children.push(self.parse_test()?);
                if self.kind() == TokenKind::Comma {
                    children.push(self.advance());
                    children.push(self.parse_test()?);
                }
            }
            "nonlocal" => {
                children.push(self.advance());
                children.push(self.expect(TokenKind::Name, "name")?);
                while self.kind() == TokenKind::Comma {
                    children.push(self.advance());
                    children.push(self.expect(TokenKind::Name, "name")?);
                }
            }
            _ => children.push(self.parse_expr_stmt()?),
        }
        Ok(())
    }

    fn parse_global_stmt(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect_keyword("global")?];
        children.push(self.expect(TokenKind::Name, "name")?);
        while self.kind() == TokenKind::Comma {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Name, "name")?);
        }
        Ok(self.tree.push_non_terminal(GrammarKind::GlobalStmt, children))
    }

    fn parse_import_name(&mut self) -> Result<NodeId, ParseError> {
        let kw = self.expect_keyword("import")?;
        let names = self.parse_dotted_as_names()?;
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::ImportName, vec![kw, names]))
    }

    fn parse_dotted_as_names(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.parse_dotted_as_name()?];
        while self.kind() == TokenKind::Comma {
            children.push(self.advance());
            children.push(self.parse_dotted_as_name()?);
        }
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::DottedAsNames, children))
    }

    fn parse_dotted_as_name(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.parse_dotted_name()?];
        if self.at_keyword("as") {
            children.push(self.advance());
            children.push(self.expect(TokenKind::Name, "import alias")?);
        }
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::DottedAsName, children))
    }

    fn parse_import_from(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect_keyword("from")?];
        while matches!(self.kind(), TokenKind::Dot | TokenKind::Ellipsis) {
            children.push(self.advance());
        }
        if !self.at_keyword("import") {
            children.push(self.parse_dotted_name()?);
        }
        children.push(self.expect_keyword("import")?);
        if self.at_op("*") {
            children.push(self.advance());
        } else if self.kind() == TokenKind::Lpar {
            children.push(self.advance());
            children.push(self.parse_import_as_names()?);
            children.push(self.expect(TokenKind::Rpar, "')'")?);
        } else {
            children.push(self.parse_import_as_names()?);
        }
        Ok(self.tree.push_non_terminal(GrammarKind::ImportFrom, children))
    }

    fn parse_import_as_names(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            children.push(self.expect(TokenKind::Name, "import name")?);
            if self.at_keyword("as") {
                children.push(self.advance());
                children.push(self.expect(TokenKind::Name, "import alias")?);
            }
            if self.kind() == TokenKind::Comma {
                children.push(self.advance());
                if self.kind() != TokenKind::Name {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::ImportAsNames, children))
    }

    fn parse_expr_stmt(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        if self.at_keyword("yield") {
            children.push(self.parse_yield_expr()?);
        } else {
            children.push(self.parse_testlist()?);
        }
        if self.kind() == TokenKind::Colon {
            let mut ann = vec![self.advance()];
            ann.push(self.parse_test()?);
            if self.kind() == TokenKind::Equal {
                ann.push(self.advance());
                if self.at_keyword("yield") {
                    ann.push(self.parse_yield_expr()?);
                } else {
                    ann.push(self.parse_testlist()?);
                }
            }
            children.push(self.tree.push_non_terminal(GrammarKind::AnnAssign, ann));
        } else if self.kind() == TokenKind::Op && AUGMENTED_OPS.contains(&self.text()) {
            let op = self.advance();
            children.push(self.tree.push_non_terminal(GrammarKind::AugAssign, vec![op]));
            if self.at_keyword("yield") {
                children.push(self.parse_yield_expr()?);
            } else {
                children.push(self.parse_testlist()?);
            }
        } else {
            while self.kind() == TokenKind::Equal {
                children.push(self.advance());
                if self.at_keyword("yield") {
                    children.push(self.parse_yield_expr()?);
                } else {
                    children.push(self.parse_testlist()?);
                }
            }
        }
        Ok(self.tree.push_non_terminal(GrammarKind::ExprStmt, children))
    }

    fn parse_yield_expr(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.expect_keyword("yield")?];
        if self.at_keyword("from") {
            children.push(self.advance());
            children.push(self.parse_test()?);
        } else if self.can_start_test() {
            children.push(self.parse_testlist()?);
        }
        Ok(self.tree.push_non_terminal(GrammarKind::YieldExpr, children))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_testlist(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            children.push(self.parse_testlist_item(TestFlavor::Full)?);
            if self.kind() == TokenKind::Comma {
                children.push(self.advance());
                if !self.can_start_test() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(self.tree.push_non_terminal(GrammarKind::TestList, children))
    }

    /// Targets of a `for` clause: `in` ends the list instead of becoming a
    /// comparison operator.
    fn parse_target_list(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            children.push(self.parse_testlist_item(TestFlavor::Target)?);
            if self.kind() == TokenKind::Comma {
                children.push(self.advance());
                if !self.can_start_test() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(self.tree.push_non_terminal(GrammarKind::TestList, children))
    }

    fn parse_testlist_item(&mut self, flavor: TestFlavor) -> Result<NodeId, ParseError> {
        if self.at_op("*") {
            let mut children = vec![self.advance()];
            children.push(self.parse_test_with(flavor)?);
            Ok(self.tree.push_non_terminal(GrammarKind::StarExpr, children))
        } else {
            self.parse_test_with(flavor)
        }
    }

    fn parse_test(&mut self) -> Result<NodeId, ParseError> {
        self.parse_test_with(TestFlavor::Full)
    }

    fn parse_test_with(&mut self, flavor: TestFlavor) -> Result<NodeId, ParseError> {
        self.descend()?;
        let mut children = Vec::new();
        if self.at_keyword("lambda") {
            self.parse_lambda(&mut children, flavor)?;
        } else {
            self.parse_operand_run(&mut children, flavor)?;
            if flavor == TestFlavor::Full && self.at_keyword("if") {
                children.push(self.advance());
                self.parse_operand_run(&mut children, flavor)?;
                children.push(self.expect_keyword("else")?);
                children.push(self.parse_test_with(TestFlavor::Full)?);
            }
        }
        self.depth -= 1;
        Ok(self.tree.push_non_terminal(GrammarKind::Test, children))
    }

    /// One or more power nodes joined by operator tokens, with any unary
    /// prefixes kept inline before their operand.
    fn parse_operand_run(
        &mut self,
        children: &mut Vec<NodeId>,
        flavor: TestFlavor,
    ) -> Result<(), ParseError> {
        loop {
            while self.at_prefix_op() {
                children.push(self.advance());
            }
            children.push(self.parse_power()?);
            let mut continued = false;
            while self.at_binary_op(flavor) {
                children.push(self.advance());
                continued = true;
            }
            if !continued {
                break;
            }
        }
        Ok(())
    }

    fn at_prefix_op(&self) -> bool {
        match self.kind() {
            TokenKind::Op => matches!(self.text(), "-" | "+" | "~" | "*" | "**"),
            TokenKind::Name => matches!(self.text(), "not" | "await"),
            _ => false,
        }
    }

    fn at_binary_op(&self, flavor: TestFlavor) -> bool {
        match self.kind() {
            TokenKind::Op => BINARY_OPS.contains(&self.text()),
            // Matrix multiplication.
            TokenKind::At => true,
            TokenKind::Name if flavor != TestFlavor::Target => {
                matches!(self.text(), "and" | "or" | "in" | "is" | "not")
            }
            _ => false,
        }
    }

    fn parse_lambda(
        &mut self,
        children: &mut Vec<NodeId>,
        flavor: TestFlavor,
    ) -> Result<(), ParseError> {
        children.push(self.advance());
        while self.kind() != TokenKind::Colon {
            match self.kind() {
                TokenKind::Name | TokenKind::Comma | TokenKind::Op => {
                    children.push(self.advance());
                }
                TokenKind::Equal => {
                    children.push(self.advance());
                    children.push(self.parse_test()?);
                }
                _ => return Err(self.unexpected("lambda parameter")),
            }
        }
        children.push(self.advance());
        children.push(self.parse_test_with(flavor)?);
        Ok(())
    }

    fn parse_power(&mut self) -> Result<NodeId, ParseError> {
        let mut children = vec![self.parse_atom()?];
        loop {
            match self.kind() {
                TokenKind::Lpar => {
                    let mut t = vec![self.advance()];
                    if self.kind() != TokenKind::Rpar {
                        t.push(self.parse_arglist()?);
                    }
                    t.push(self.expect(TokenKind::Rpar, "')'")?);
                    children.push(self.tree.push_non_terminal(GrammarKind::Trailer, t));
                }
                TokenKind::Lsqb => {
                    let mut t = vec![self.advance()];
                    t.push(self.parse_subscript_list()?);
                    t.push(self.expect(TokenKind::Rsqb, "']'")?);
                    children.push(self.tree.push_non_terminal(GrammarKind::Trailer, t));
                }
                TokenKind::Dot => {
                    let dot = self.advance();
                    let name = self.expect(TokenKind::Name, "attribute name")?;
                    children.push(
                        self.tree
                            .push_non_terminal(GrammarKind::Trailer, vec![dot, name]),
                    );
                }
                _ => break,
            }
        }
        Ok(self.tree.push_non_terminal(GrammarKind::Power, children))
    }

    fn parse_atom(&mut self) -> Result<NodeId, ParseError> {
        self.descend()?;
        let children = match self.kind() {
            TokenKind::Name | TokenKind::Number | TokenKind::Ellipsis => vec![self.advance()],
            TokenKind::Str => {
                // Adjacent literals concatenate into one atom.
                let mut parts = vec![self.advance()];
                while self.kind() == TokenKind::Str {
                    parts.push(self.advance());
                }
                parts
            }
            TokenKind::Lpar => {
                let mut c = vec![self.advance()];
                if self.kind() != TokenKind::Rpar {
                    if self.at_keyword("yield") {
                        c.push(self.parse_yield_expr()?);
                    } else {
                        c.push(self.parse_testlist_comp(false)?);
                    }
                }
                c.push(self.expect(TokenKind::Rpar, "')'")?);
                c
            }
            TokenKind::Lsqb => {
                let mut c = vec![self.advance()];
                if self.kind() != TokenKind::Rsqb {
                    c.push(self.parse_testlist_comp(false)?);
                }
                c.push(self.expect(TokenKind::Rsqb, "']'")?);
                c
            }
            TokenKind::Lbrace => {
                let mut c = vec![self.advance()];
                if self.kind() != TokenKind::Rbrace {
                    c.push(self.parse_testlist_comp(true)?);
                }
                c.push(self.expect(TokenKind::Rbrace, "'}'")?);
                c
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.depth -= 1;
        Ok(self.tree.push_non_terminal(GrammarKind::Atom, children))
    }

    /// Bracketed element list, optionally a dict/set display (`braces`) or
    /// a comprehension. Dict colons and comprehension clauses are kept
    /// inline; elements keep full `test` structure so calls inside them
    /// classify normally.
    fn parse_testlist_comp(&mut self, braces: bool) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            if self.at_op("*") || (braces && self.at_op("**")) {
                let mut star = vec![self.advance()];
                star.push(self.parse_test()?);
                children.push(self.tree.push_non_terminal(GrammarKind::StarExpr, star));
            } else {
                children.push(self.parse_test()?);
            }
            if braces && self.kind() == TokenKind::Colon {
                children.push(self.advance());
                children.push(self.parse_test()?);
            }
            if self.at_keyword("for") || self.at_keyword("async") {
                self.parse_comp_tail(&mut children)?;
                break;
            }
            if self.kind() == TokenKind::Comma {
                children.push(self.advance());
                if !self.can_start_test() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::TestListComp, children))
    }

    fn parse_comp_tail(&mut self, children: &mut Vec<NodeId>) -> Result<(), ParseError> {
        loop {
            if self.at_keyword("async") || self.at_keyword("for") {
                if self.at_keyword("async") {
                    children.push(self.advance());
                }
                children.push(self.expect_keyword("for")?);
                children.push(self.parse_target_list()?);
                children.push(self.expect_keyword("in")?);
                children.push(self.parse_test_with(TestFlavor::NoCond)?);
            } else if self.at_keyword("if") {
                children.push(self.advance());
                children.push(self.parse_test_with(TestFlavor::NoCond)?);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_subscript_list(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Colon | TokenKind::Comma => children.push(self.advance()),
                _ if self.can_start_test() => children.push(self.parse_test()?),
                _ => break,
            }
        }
        Ok(self
            .tree
            .push_non_terminal(GrammarKind::SubscriptList, children))
    }

    fn parse_arglist(&mut self) -> Result<NodeId, ParseError> {
        let mut children = Vec::new();
        loop {
            if self.at_op("*") || self.at_op("**") {
                children.push(self.advance());
                children.push(self.parse_test()?);
            } else {
                children.push(self.parse_test()?);
                if self.kind() == TokenKind::Equal {
                    children.push(self.advance());
                    children.push(self.parse_test()?);
                }
            }
            if self.at_keyword("for") || self.at_keyword("async") {
                self.parse_comp_tail(&mut children)?;
            }
            if self.kind() == TokenKind::Comma {
                children.push(self.advance());
                if self.kind() == TokenKind::Rpar {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(self.tree.push_non_terminal(GrammarKind::ArgList, children))
    }
}
