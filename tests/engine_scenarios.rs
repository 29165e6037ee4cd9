/// End-to-end indexing scenarios: Python source in, database line records out.
///
/// Every test drives the real tokenizer, parser and tree walk and pins the
/// exact record bytes, since cscope is unforgiving about the layout.

use pyxref::domain::walk::index_tree;
use pyxref::infrastructure::PythonCstParser;
use pyxref::ports::CstParser;

fn index(source: &str) -> Vec<String> {
    let tree = PythonCstParser::new()
        .parse(source)
        .expect("source should parse");
    index_tree(&tree, false).expect("walk should succeed")
}

fn index_with_string_symbols(source: &str) -> Vec<String> {
    let tree = PythonCstParser::new()
        .parse(source)
        .expect("source should parse");
    index_tree(&tree, true).expect("walk should succeed")
}

// ═══════════════════════════════════════════════════════════════════════════
// Definitions and function ends
// ═══════════════════════════════════════════════════════════════════════════

/// A function definition marks its name, and the dedent closing the body
/// appends a function-end record to the last body line.
#[test]
fn test_function_definition_and_end() {
    let records = index("def foo():\n    return 1\n");
    assert_eq!(
        records,
        vec![
            "1 def \n\t$foo\n ( ) :\n\n".to_string(),
            "2 return 1 \n\t}\n\n".to_string(),
        ]
    );
}

#[test]
fn test_async_function_definition() {
    let records = index("async def fetch():\n    pass\n");
    assert_eq!(
        records,
        vec![
            "1 async def \n\t$fetch\n ( ) :\n\n".to_string(),
            "2 pass \n\t}\n\n".to_string(),
        ]
    );
}

/// Only the outermost def is a definition; nested ones stay plain symbols.
#[test]
fn test_nested_function_marks_outer_only() {
    let records = index("def outer():\n    def inner():\n        pass\n    return inner\n");
    assert_eq!(records.len(), 3, "pass-only line should not be indexed");
    assert_eq!(records[0], "1 def \n\t$outer\n ( ) :\n\n");
    assert_eq!(records[1], "2 def \ninner\n ( ) :\n\n");
    assert_eq!(records[2], "4 return \ninner\n \n\t}\n\n");
}

#[test]
fn test_class_definition_marks_name_only() {
    let records = index("class Foo(Base): pass");
    assert_eq!(records, vec!["1 class \n\tcFoo\n ( \nBase\n ) : pass\n\n".to_string()]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Imports
// ═══════════════════════════════════════════════════════════════════════════

/// Dots fuse a dotted module path into one include symbol.
#[test]
fn test_dotted_import_merges_into_one_symbol() {
    let records = index("import os.path");
    assert_eq!(records, vec!["1 import \n\t~os.path\n\n".to_string()]);
}

/// Aliases and extra names: every dotted name is an include, the alias is a
/// plain symbol.
#[test]
fn test_import_aliases_count_dotted_names() {
    let records = index("import numpy as np, sys\n");
    assert_eq!(
        records,
        vec!["1 import \n\t~numpy\n as \nnp\n , \n\t~sys\n\n".to_string()]
    );
}

#[test]
fn test_from_import_marks_module_only() {
    let records = index("from os.path import join\n");
    assert_eq!(
        records,
        vec!["1 from \n\t~os.path\n import \njoin\n\n".to_string()]
    );
}

/// A purely relative import has no module path to mark.
#[test]
fn test_relative_import_without_module() {
    let records = index("from . import x\n");
    assert_eq!(records, vec!["1 from . import \nx\n\n".to_string()]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Assignments and calls
// ═══════════════════════════════════════════════════════════════════════════

/// The canonical line: target marked as assignment, callee as call, both on
/// the same record group.
#[test]
fn test_assignment_and_call_on_one_line() {
    let records = index("x = compute()");
    assert_eq!(
        records,
        vec!["1 \n\t=x\n = \n\t`compute\n ( )\n\n".to_string()]
    );
}

#[test]
fn test_chained_assignment_marks_every_target() {
    let records = index("a = b = 1\n");
    assert_eq!(records, vec!["1 \n\t=a\n = \n\t=b\n = 1\n\n".to_string()]);
}

#[test]
fn test_tuple_targets_resolve_both_names() {
    let records = index("x, y = f()\n");
    assert_eq!(
        records,
        vec!["1 \n\t=x\n , \n\t=y\n = \n\t`f\n ( )\n\n".to_string()]
    );
}

/// Subscripted and dotted targets mark the base name and the attribute
/// respectively.
#[test]
fn test_subscript_and_attribute_targets() {
    let records = index("d['k'] = 1\nobj.attr = 2\n");
    assert_eq!(records[0], "1 \n\t=d\n [ 'k' ] = 1\n\n");
    assert_eq!(records[1], "2 \nobj\n . \n\t=attr\n = 2\n\n");
}

#[test]
fn test_augmented_assignment_keeps_target() {
    let records = index("total += n\n");
    assert_eq!(records, vec!["1 \n\t=total\n += \nn\n\n".to_string()]);
}

/// A call in a trailer chain marks the attribute being called, not the base
/// or the final attribute.
#[test]
fn test_method_call_in_trailer_chain() {
    let records = index("obj.method(1).count\n");
    assert_eq!(
        records,
        vec!["1 \nobj\n . \n\t`method\n ( 1 ) . \ncount\n\n".to_string()]
    );
}

/// Comprehension targets are ordinary symbols, and the walk finishes with no
/// assignment state left over.
#[test]
fn test_comprehension_targets_stay_plain() {
    let records = index("names = [x for x in rows if x]\n");
    assert_eq!(
        records,
        vec!["1 \n\t=names\n = [ \nx\n for \nx\n in \nrows\n if \nx\n ]\n\n".to_string()]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Globals and decorators
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_global_statement_inside_function() {
    let records = index("def f():\n    global counter\n    counter = 1\n");
    assert_eq!(
        records,
        vec![
            "1 def \n\t$f\n ( ) :\n\n".to_string(),
            "2 global \n\tgcounter\n\n".to_string(),
            "3 \n\t=counter\n = 1 \n\t}\n\n".to_string(),
        ]
    );
}

#[test]
fn test_decorator_reference_is_a_call() {
    let records = index("@cached\ndef get():\n    pass\n");
    assert_eq!(records[0], "1 @ \n\t`cached\n\n");
    assert_eq!(records[1], "2 def \n\t$get\n ( ) :\n\n");
    assert_eq!(records[2], "3 pass \n\t}\n\n");
}

/// property and classmethod change what the decorated name means, so they
/// are left as plain symbols.
#[test]
fn test_property_decorator_is_not_marked() {
    let records = index("@property\ndef size(self):\n    return 0\n");
    assert_eq!(records[0], "1 @ \nproperty\n\n");
    assert!(!records[0].contains("\t`property"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Lines, strings and degenerate input
// ═══════════════════════════════════════════════════════════════════════════

/// Lines made of keywords and punctuation alone never reach the database.
#[test]
fn test_keyword_only_lines_are_skipped() {
    assert!(index("if True:\n    pass\n").is_empty());
}

#[test]
fn test_empty_and_comment_only_sources_yield_no_records() {
    assert!(index("").is_empty());
    assert!(index("# just a comment\n").is_empty());
    assert!(index("\n\n\n").is_empty());
}

/// A backslash continuation splits the statement across two physical lines,
/// each with its own record.
#[test]
fn test_backslash_continuation_splits_records() {
    let records = index("total = a + \\\nb\n");
    assert_eq!(
        records,
        vec![
            "1 \n\t=total\n = \na\n +\n\n".to_string(),
            "2 \nb\n\n".to_string(),
        ]
    );
}

/// Multi-line strings stay attached to the line that opened them, with
/// newlines escaped.
#[test]
fn test_multiline_string_stays_on_opening_line() {
    let records = index("s = '''a\nb'''\n");
    assert_eq!(records, vec!["1 \n\t=s\n = '''a\\nb'''\n\n".to_string()]);
}

#[test]
fn test_identifier_strings_become_symbols_when_enabled() {
    let records = index_with_string_symbols("x = 'name'\n");
    assert_eq!(records, vec!["1 \n\t=x\n = [[ \n'name'\n ]]\n\n".to_string()]);
}

#[test]
fn test_identifier_strings_stay_text_by_default() {
    let records = index("x = 'name'\n");
    assert_eq!(records, vec!["1 \n\t=x\n = 'name'\n\n".to_string()]);
}

#[test]
fn test_non_identifier_strings_stay_text_even_when_enabled() {
    let records = index_with_string_symbols("x = 'two words'\n");
    assert_eq!(records, vec!["1 \n\t=x\n = 'two words'\n\n".to_string()]);
}
