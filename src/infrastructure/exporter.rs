/// Index file output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::ports::IndexExporter;

/// Writes the finished database to disk in one shot.
pub struct DatabaseExporter;

impl DatabaseExporter {
    pub fn new() -> Self {
        DatabaseExporter
    }
}

impl Default for DatabaseExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexExporter for DatabaseExporter {
    fn export(&self, database: &str, path: &Path) -> Result<()> {
        fs::write(path, database)
            .with_context(|| format!("failed to write index {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cscope.out");
        DatabaseExporter::new().export("cscope 15 /x -c 0000000000", &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "cscope 15 /x -c 0000000000");
    }

    #[test]
    fn test_export_into_missing_directory_fails_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("cscope.out");
        let err = DatabaseExporter::new().export("", &path).unwrap_err();
        assert!(err.to_string().contains("failed to write index"));
    }
}
