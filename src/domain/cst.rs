//! Concrete syntax tree for Python source.
//!
//! Nodes live in a flat arena and reference each other through [`NodeId`].
//! The tree is fully concrete: every token of the source appears as a
//! terminal, including `Newline`, `Indent`, `Dedent` and the final
//! `EndMarker`, in left-to-right source order. Classification keys its
//! lookaside tables on node identity, which the arena ids provide for free.

use serde::Serialize;

/// Identity of one node within its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Token classes produced by the tokenizer.
///
/// Only `Name` and `Dot` can ever carry a mark. Structural tokens that the
/// classifier matches on get their own kind; all remaining operators share
/// `Op` and keep their text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Op,
    Dot,
    Ellipsis,
    Equal,
    Comma,
    At,
    Lpar,
    Rpar,
    Lsqb,
    Rsqb,
    Lbrace,
    Rbrace,
    Colon,
    Semi,
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Name => "NAME",
            TokenKind::Number => "NUMBER",
            TokenKind::Str => "STRING",
            TokenKind::Op => "OP",
            TokenKind::Dot => "DOT",
            TokenKind::Ellipsis => "ELLIPSIS",
            TokenKind::Equal => "EQUAL",
            TokenKind::Comma => "COMMA",
            TokenKind::At => "AT",
            TokenKind::Lpar => "LPAR",
            TokenKind::Rpar => "RPAR",
            TokenKind::Lsqb => "LSQB",
            TokenKind::Rsqb => "RSQB",
            TokenKind::Lbrace => "LBRACE",
            TokenKind::Rbrace => "RBRACE",
            TokenKind::Colon => "COLON",
            TokenKind::Semi => "SEMI",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::EndMarker => "ENDMARKER",
        }
    }
}

/// Grammar productions the parser materializes.
///
/// The classifier dispatches on a subset of these; the rest exist so the
/// tree keeps recognizable statement structure for dumping and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrammarKind {
    FileInput,
    SimpleStmt,
    CompoundStmt,
    Suite,
    Parameters,
    GlobalStmt,
    FuncDef,
    Decorated,
    Decorators,
    Decorator,
    ClassDef,
    ImportName,
    ImportFrom,
    DottedAsNames,
    DottedAsName,
    ImportAsNames,
    DottedName,
    ExprStmt,
    AugAssign,
    AnnAssign,
    YieldExpr,
    TestList,
    Test,
    StarExpr,
    TestListComp,
    Power,
    Atom,
    Trailer,
    SubscriptList,
    ArgList,
}

impl GrammarKind {
    pub fn name(&self) -> &'static str {
        match self {
            GrammarKind::FileInput => "file_input",
            GrammarKind::SimpleStmt => "simple_stmt",
            GrammarKind::CompoundStmt => "compound_stmt",
            GrammarKind::Suite => "suite",
            GrammarKind::Parameters => "parameters",
            GrammarKind::GlobalStmt => "global_stmt",
            GrammarKind::FuncDef => "funcdef",
            GrammarKind::Decorated => "decorated",
            GrammarKind::Decorators => "decorators",
            GrammarKind::Decorator => "decorator",
            GrammarKind::ClassDef => "classdef",
            GrammarKind::ImportName => "import_name",
            GrammarKind::ImportFrom => "import_from",
            GrammarKind::DottedAsNames => "dotted_as_names",
            GrammarKind::DottedAsName => "dotted_as_name",
            GrammarKind::ImportAsNames => "import_as_names",
            GrammarKind::DottedName => "dotted_name",
            GrammarKind::ExprStmt => "expr_stmt",
            GrammarKind::AugAssign => "augassign",
            GrammarKind::AnnAssign => "annassign",
            GrammarKind::YieldExpr => "yield_expr",
            GrammarKind::TestList => "testlist",
            GrammarKind::Test => "test",
            GrammarKind::StarExpr => "star_expr",
            GrammarKind::TestListComp => "testlist_comp",
            GrammarKind::Power => "power",
            GrammarKind::Atom => "atom",
            GrammarKind::Trailer => "trailer",
            GrammarKind::SubscriptList => "subscriptlist",
            GrammarKind::ArgList => "arglist",
        }
    }
}

/// A single tree node.
#[derive(Debug, Clone)]
pub enum Node {
    Terminal {
        kind: TokenKind,
        text: String,
        line: usize,
    },
    NonTerminal {
        kind: GrammarKind,
        children: Vec<NodeId>,
    },
}

/// Arena-backed concrete syntax tree for one source file.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        SyntaxTree::default()
    }

    pub fn push_terminal(&mut self, kind: TokenKind, text: impl Into<String>, line: usize) -> NodeId {
        self.nodes.push(Node::Terminal {
            kind,
            text: text.into(),
            line,
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn push_non_terminal(&mut self, kind: GrammarKind, children: Vec<NodeId>) -> NodeId {
        self.nodes.push(Node::NonTerminal { kind, children });
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Root of the tree, once [`Self::set_root`] has fixed it.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_opt(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a non-terminal; terminals yield an empty slice.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::NonTerminal { children, .. } => children,
            Node::Terminal { .. } => &[],
        }
    }

    pub fn grammar_kind(&self, id: NodeId) -> Option<GrammarKind> {
        match self.node(id) {
            Node::NonTerminal { kind, .. } => Some(*kind),
            Node::Terminal { .. } => None,
        }
    }

    pub fn token_kind(&self, id: NodeId) -> Option<TokenKind> {
        match self.node(id) {
            Node::Terminal { kind, .. } => Some(*kind),
            Node::NonTerminal { .. } => None,
        }
    }

    pub fn terminal_text(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::Terminal { text, .. } => Some(text),
            Node::NonTerminal { .. } => None,
        }
    }

    pub fn is_grammar(&self, id: NodeId, kind: GrammarKind) -> bool {
        self.grammar_kind(id) == Some(kind)
    }

    pub fn is_token(&self, id: NodeId, kind: TokenKind) -> bool {
        self.token_kind(id) == Some(kind)
    }

    /// True for a terminal of the given kind whose text matches exactly.
    /// Keywords are plain `Name` tokens, so this is how the parser and
    /// classifier test for them.
    pub fn is_keyword(&self, id: NodeId, word: &str) -> bool {
        self.is_token(id, TokenKind::Name) && self.terminal_text(id) == Some(word)
    }

    /// Snapshot of the whole tree for the debug dump.
    pub fn dump(&self) -> CstDump {
        match self.root.and_then(|id| self.node_opt(id).map(|_| id)) {
            Some(id) => self.dump_node(id),
            None => CstDump {
                kind: "empty",
                text: None,
                line: None,
                children: Vec::new(),
            },
        }
    }

    fn dump_node(&self, id: NodeId) -> CstDump {
        match self.node(id) {
            Node::Terminal { kind, text, line } => CstDump {
                kind: kind.name(),
                text: Some(text.clone()),
                line: Some(*line),
                children: Vec::new(),
            },
            Node::NonTerminal { kind, children } => CstDump {
                kind: kind.name(),
                text: None,
                line: None,
                children: children.iter().map(|&c| self.dump_node(c)).collect(),
            },
        }
    }
}

/// Serializable rendering of a tree, used by the `--dump-cst` flag.
#[derive(Debug, Serialize)]
pub struct CstDump {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CstDump>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_round_trip() {
        let mut tree = SyntaxTree::new();
        let name = tree.push_terminal(TokenKind::Name, "x", 1);
        let atom = tree.push_non_terminal(GrammarKind::Atom, vec![name]);
        tree.set_root(atom);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.root(), Some(atom));
        assert_eq!(tree.token_kind(name), Some(TokenKind::Name));
        assert_eq!(tree.terminal_text(name), Some("x"));
        assert_eq!(tree.grammar_kind(atom), Some(GrammarKind::Atom));
        assert_eq!(tree.children(atom), &[name]);
        assert!(tree.children(name).is_empty());
    }

    #[test]
    fn test_keyword_check_requires_name_token() {
        let mut tree = SyntaxTree::new();
        let kw = tree.push_terminal(TokenKind::Name, "def", 1);
        let op = tree.push_terminal(TokenKind::Op, "def", 1);
        assert!(tree.is_keyword(kw, "def"));
        assert!(!tree.is_keyword(kw, "class"));
        assert!(!tree.is_keyword(op, "def"));
    }

    #[test]
    fn test_dump_shapes() {
        let mut tree = SyntaxTree::new();
        let name = tree.push_terminal(TokenKind::Name, "x", 3);
        let atom = tree.push_non_terminal(GrammarKind::Atom, vec![name]);
        tree.set_root(atom);

        let dump = tree.dump();
        assert_eq!(dump.kind, "atom");
        assert_eq!(dump.children.len(), 1);
        assert_eq!(dump.children[0].kind, "NAME");
        assert_eq!(dump.children[0].text.as_deref(), Some("x"));
        assert_eq!(dump.children[0].line, Some(3));

        let json = serde_json::to_string(&dump).expect("dump serializes");
        assert!(json.contains("\"atom\""));
        assert!(!json.contains("\"line\":null"));
    }

    #[test]
    fn test_empty_tree_dump() {
        let tree = SyntaxTree::new();
        assert_eq!(tree.dump().kind, "empty");
        assert!(tree.is_empty());
    }

    #[test]
    fn test_tree_without_root_reports_none() {
        let mut tree = SyntaxTree::new();
        tree.push_terminal(TokenKind::Name, "x", 1);
        assert_eq!(tree.root(), None);
    }
}
