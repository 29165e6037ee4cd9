/// Benchmarks for the pyxref indexing pipeline.
///
/// Run with: `cargo bench`
///
/// Covers the stages separately and together:
/// - Parsing synthetic Python sources of various sizes
/// - The classifying tree walk on a pre-built tree
/// - Database assembly from prepared records
/// - A full run over files on disk

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use tempfile::tempdir;

use pyxref::application::{IndexUsecase, RunOptions};
use pyxref::domain::encode::{encode_database, file_entry};
use pyxref::domain::walk::index_tree;
use pyxref::infrastructure::{DatabaseExporter, PythonCstParser};
use pyxref::ports::CstParser;

// ═══════════════════════════════════════════════════════════════════════════
// Synthetic Source Generators
// ═══════════════════════════════════════════════════════════════════════════

/// Build a module with the shapes the classifier works hardest on:
/// imports, function definitions, assignments and call chains.
fn synthetic_module(num_funcs: usize, stmts_per_func: usize) -> String {
    let mut src = String::from("import os.path\nfrom collections import defaultdict\n\n");
    for f in 0..num_funcs {
        src.push_str(&format!("def handler_{}(payload, registry):\n", f));
        for s in 0..stmts_per_func {
            src.push_str(&format!(
                "    value_{} = registry.lookup(payload, {})\n",
                s, s
            ));
            src.push_str(&format!(
                "    total_{} = value_{} + scale_{}(value_{})\n",
                s, s, f, s
            ));
        }
        src.push_str("    return total_0\n\n");
    }
    src
}

// ═══════════════════════════════════════════════════════════════════════════
// Stage Benchmarks
// ═══════════════════════════════════════════════════════════════════════════

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyxref/parse");
    let parser = PythonCstParser::new();

    for num_funcs in [10, 50, 200].iter() {
        let source = synthetic_module(*num_funcs, 5);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("funcs", num_funcs),
            &source,
            |b, source| b.iter(|| parser.parse(black_box(source)).unwrap()),
        );
    }

    group.finish();
}

fn bench_tree_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyxref/walk");
    let parser = PythonCstParser::new();

    for num_funcs in [10, 50, 200].iter() {
        let source = synthetic_module(*num_funcs, 5);
        let tree = parser.parse(&source).unwrap();
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("funcs", num_funcs), &tree, |b, tree| {
            b.iter(|| index_tree(black_box(tree), false).unwrap())
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let parser = PythonCstParser::new();
    let source = synthetic_module(50, 5);
    let tree = parser.parse(&source).unwrap();
    let lines = index_tree(&tree, false).unwrap();

    // One hundred identical chunks approximates a mid-sized project.
    let mut records = Vec::new();
    let mut fnames = Vec::new();
    for i in 0..100 {
        let relpath = format!("pkg/mod_{}.py", i);
        records.push(file_entry(&relpath));
        records.extend(lines.iter().cloned());
        fnames.push(relpath);
    }

    c.bench_function("pyxref/encode/100_files", |b| {
        b.iter(|| encode_database(black_box("/work"), &records, &fnames))
    });
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyxref/full_run");

    for num_files in [10, 50].iter() {
        let dir = tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..*num_files {
            let name = format!("mod_{}.py", i);
            fs::write(dir.path().join(&name), synthetic_module(5, 3)).unwrap();
            files.push(name);
        }
        let out = dir.path().join("cscope.out");

        group.throughput(Throughput::Elements(*num_files as u64));
        group.bench_with_input(
            BenchmarkId::new("files", num_files),
            &(dir, files, out),
            |b, (dir, files, out)| {
                b.iter(|| {
                    let parser = PythonCstParser::new();
                    let exporter = DatabaseExporter::new();
                    let usecase = IndexUsecase {
                        parser: &parser,
                        exporter: &exporter,
                    };
                    usecase
                        .run(dir.path(), files, out, &RunOptions::default())
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_tree_walk,
    bench_encode,
    bench_full_run
);
criterion_main!(benches);
