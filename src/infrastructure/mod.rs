// Infrastructure implementations for pyxref.

pub mod exporter;
pub mod parser;
pub mod source_walker;
pub(crate) mod tokenizer;

pub use exporter::DatabaseExporter;
pub use parser::PythonCstParser;
pub use source_walker::{collect_sources, read_source, read_source_list};
