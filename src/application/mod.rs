//! Indexing use case: drive the parser and walk over a file list and hand
//! the finished database to the exporter.

use std::path::Path;

use anyhow::Result;

use crate::domain::encode::{encode_database, file_entry};
use crate::domain::walk::index_tree;
use crate::infrastructure::read_source;
use crate::ports::{CstParser, IndexExporter};

pub struct IndexUsecase<'a> {
    pub parser: &'a dyn CstParser,
    pub exporter: &'a dyn IndexExporter,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Emit quoted identifier strings as symbols (`-S`).
    pub strings_as_symbols: bool,
    /// Print each file's concrete syntax tree as JSON (`-D`).
    pub dump_cst: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub indexed: usize,
    pub skipped: usize,
}

impl<'a> IndexUsecase<'a> {
    /// Index `files` (paths relative to `basepath`) into a cscope database
    /// at `out_path`.
    ///
    /// A file that cannot be read or parsed is reported on stderr and left
    /// out of the database entirely; one broken file never poisons the
    /// rest of the run.
    pub fn run(
        &self,
        basepath: &Path,
        files: &[String],
        out_path: &Path,
        opts: &RunOptions,
    ) -> Result<RunSummary> {
        let mut records = Vec::new();
        let mut fnames = Vec::new();
        let mut skipped = 0usize;

        for relpath in files {
            let fullpath = basepath.join(relpath);
            match self.index_file(&fullpath, opts) {
                Ok(lines) => {
                    fnames.push(relpath.clone());
                    records.push(file_entry(relpath));
                    records.extend(lines);
                }
                Err(err) => {
                    eprintln!("[pyxref] {}: {}", fullpath.display(), err);
                    skipped += 1;
                }
            }
        }

        let database = encode_database(&basepath.to_string_lossy(), &records, &fnames);
        self.exporter.export(&database, out_path)?;
        Ok(RunSummary {
            indexed: fnames.len(),
            skipped,
        })
    }

    fn index_file(&self, fullpath: &Path, opts: &RunOptions) -> Result<Vec<String>> {
        let source = read_source(fullpath)?;
        if source.is_empty() {
            // Empty files still appear in the database, entry only.
            return Ok(Vec::new());
        }
        let tree = self.parser.parse(&source)?;
        if opts.dump_cst {
            println!("{}", serde_json::to_string_pretty(&tree.dump())?);
        }
        Ok(index_tree(&tree, opts.strings_as_symbols)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::PythonCstParser;
    use std::cell::RefCell;
    use std::fs;

    struct CaptureExporter(RefCell<String>);

    impl CaptureExporter {
        fn new() -> Self {
            CaptureExporter(RefCell::new(String::new()))
        }
    }

    impl IndexExporter for CaptureExporter {
        fn export(&self, database: &str, _path: &Path) -> Result<()> {
            *self.0.borrow_mut() = database.to_string();
            Ok(())
        }
    }

    #[test]
    fn test_run_skips_broken_files_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("broken.py"), "def f(:\n").unwrap();

        let parser = PythonCstParser::new();
        let exporter = CaptureExporter::new();
        let usecase = IndexUsecase {
            parser: &parser,
            exporter: &exporter,
        };
        let summary = usecase
            .run(
                dir.path(),
                &["good.py".to_string(), "broken.py".to_string()],
                &dir.path().join("cscope.out"),
                &RunOptions::default(),
            )
            .unwrap();

        assert_eq!(summary, RunSummary { indexed: 1, skipped: 1 });
        let database = exporter.0.borrow();
        assert!(database.contains("\t@good.py\n"));
        assert!(!database.contains("broken.py"));
    }

    #[test]
    fn test_empty_file_gets_entry_without_line_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.py"), "").unwrap();

        let parser = PythonCstParser::new();
        let exporter = CaptureExporter::new();
        let usecase = IndexUsecase {
            parser: &parser,
            exporter: &exporter,
        };
        let summary = usecase
            .run(
                dir.path(),
                &["empty.py".to_string()],
                &dir.path().join("cscope.out"),
                &RunOptions::default(),
            )
            .unwrap();

        assert_eq!(summary.indexed, 1);
        let database = exporter.0.borrow();
        // Entry immediately followed by the closing sentinel.
        assert!(database.contains("\t@empty.py\n\n\n\t@\n"));
    }

    #[test]
    fn test_missing_file_is_counted_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let parser = PythonCstParser::new();
        let exporter = CaptureExporter::new();
        let usecase = IndexUsecase {
            parser: &parser,
            exporter: &exporter,
        };
        let summary = usecase
            .run(
                dir.path(),
                &["ghost.py".to_string()],
                &dir.path().join("cscope.out"),
                &RunOptions::default(),
            )
            .unwrap();
        assert_eq!(summary, RunSummary { indexed: 0, skipped: 1 });
    }
}
