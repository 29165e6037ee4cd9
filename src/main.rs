// Command-line entry point for pyxref.

use std::env;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use pyxref::application::{IndexUsecase, RunOptions, RunSummary};
use pyxref::infrastructure::{
    collect_sources, read_source_list, DatabaseExporter, PythonCstParser,
};

/// Generate a cscope-compatible cross-reference database for Python code.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files and directories to index (defaults to the current directory)
    paths: Vec<String>,

    /// Recurse into subdirectories
    #[arg(short = 'R', long)]
    recurse: bool,

    /// Index identifier-like string literals as symbols
    #[arg(short = 'S', long)]
    strings_as_symbols: bool,

    /// Dump each file's concrete syntax tree to stdout as JSON
    #[arg(short = 'D', long)]
    dump_cst: bool,

    /// Output database file, relative to the current directory
    #[arg(short = 'f', long, default_value = "cscope.out")]
    reffile: String,

    /// Read additional source paths from this file, one per line
    #[arg(short = 'i', long)]
    namefile: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(summary) => {
            println!("[pyxref] wrote {} ({} files)", cli.reffile, summary.indexed);
            if summary.skipped > 0 {
                eprintln!("[pyxref] skipped {} file(s) with errors", summary.skipped);
            }
        }
        Err(err) => {
            eprintln!("[pyxref] error: {err:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let basepath = env::current_dir().context("cannot determine working directory")?;

    let mut args = cli.paths.clone();
    if let Some(namefile) = &cli.namefile {
        args.extend(read_source_list(Path::new(namefile))?);
    }
    if args.is_empty() {
        args.push(".".to_string());
    }
    let files = collect_sources(&basepath, &args, cli.recurse);

    let parser = PythonCstParser::new();
    let exporter = DatabaseExporter::new();
    let usecase = IndexUsecase {
        parser: &parser,
        exporter: &exporter,
    };
    let opts = RunOptions {
        strings_as_symbols: cli.strings_as_symbols,
        dump_cst: cli.dump_cst,
    };
    usecase.run(&basepath, &files, &basepath.join(&cli.reffile), &opts)
}
