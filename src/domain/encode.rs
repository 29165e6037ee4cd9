//! Cscope database serialization.
//!
//! The database is a single text stream: a fixed-width header whose size
//! field covers itself plus the symbol data, one chunk per indexed file,
//! a bare file mark closing the symbol section, and a trailer listing the
//! indexed file names. All lengths are byte counts.

use crate::domain::mark::Mark;

/// Length of the header line that the size field must account for:
/// `cscope 15 <basepath> -c <10-digit size>` is the base path plus 25
/// bytes of fixed text.
const HEADER_OVERHEAD: usize = 25;

/// Opening record of one file's chunk in the symbol section.
pub fn file_entry(relpath: &str) -> String {
    format!("\n{}{}\n\n", Mark::File, relpath)
}

/// Assembles the complete database stream.
///
/// `records` holds the per-file entries and line records in emission
/// order; the end-of-symbols mark and the trailer are appended here.
pub fn encode_database(basepath: &str, records: &[String], fnames: &[String]) -> String {
    let mut body = records.concat();
    // Symbol data ends with a file mark carrying no path.
    body.push('\n');
    body.push_str(&Mark::File.to_string());

    let total = basepath.len() + HEADER_OVERHEAD + body.len();
    let mut out = format!("cscope 15 {} -c {:010}", basepath, total);
    out.push_str(&body);

    // Trailer: unused-argument stanza, file count, then the name list
    // preceded by its byte length.
    let names = fnames.join("\n") + "\n";
    out.push_str("\n1\n.\n0\n");
    out.push_str(&format!("{}\n", fnames.len()));
    out.push_str(&format!("{}\n", names.len()));
    out.push_str(&names);
    out
}
