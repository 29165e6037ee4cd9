use std::path::Path;

use crate::domain::cst::SyntaxTree;
use crate::domain::error::ParseError;

/// Turns one file's source text into a concrete syntax tree.
pub trait CstParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseError>;
}

/// Writes the finished database stream to its destination.
pub trait IndexExporter {
    fn export(&self, database: &str, path: &Path) -> anyhow::Result<()>;
}
