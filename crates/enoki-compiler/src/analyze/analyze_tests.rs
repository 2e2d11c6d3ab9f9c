use indoc::indoc;

use enoki_ir::node::{DeclFlags, Kind};

use crate::diagnostics::Diagnostics;
use crate::test_utils::{contains_kind, function, parse};

use super::{analyse_symbols, analyse_tail_recursion, process_closures};

#[test]
fn tail_recursive_return_becomes_assign_and_restart() {
    let (mut cx, diags) = parse(indoc! {"
        public int sum(int n, int acc) {
            if (n == 0) return acc;
            else return sum(n - 1, acc + n);
        }
    "});
    assert!(diags.is_empty());

    let sum = function(&cx, "sum");
    let before = cx.arena[sum].decl().use_count;

    let mut diags = Diagnostics::new();
    let changed = analyse_tail_recursion(&mut cx, sum, &mut diags);
    assert!(changed);

    let body = cx.arena.child(sum, 0).unwrap();
    assert!(contains_kind(&cx, body, Kind::Restart));
    assert!(!contains_kind(&cx, body, Kind::Call));
    assert_eq!(cx.arena[sum].decl().use_count, before - 1);
}

#[test]
fn symbols_flatten_block_tables_into_the_function() {
    let (mut cx, diags) = parse(indoc! {"
        public int f(int a) {
            int b = a;
            if (a > 0) {
                int c = b + 1;
                b = c;
            }
            return b;
        }
    "});
    assert!(diags.is_empty());

    let f = function(&cx, "f");
    let mut diags = Diagnostics::new();
    analyse_symbols(&mut cx, f, &mut diags);

    let table = &cx.arena[f].func().table;
    for name in ["a", "b", "c"] {
        let found = table
            .keys()
            .any(|sym| cx.interner.resolve(*sym) == name);
        assert!(found, "'{name}' missing from the function table");
    }
}

#[test]
fn enclosed_variables_are_copied_into_the_closure() {
    let (mut cx, diags) =
        parse("public int make_adder(int k) { return lambda(int x) { return x + k; }; }");
    assert!(diags.is_empty());

    let mut diags = Diagnostics::new();
    let make_adder = function(&cx, "make_adder");
    let closure = function(&cx, "closure0");
    analyse_symbols(&mut cx, make_adder, &mut diags);
    analyse_symbols(&mut cx, closure, &mut diags);

    let enclosed = cx.arena[closure]
        .func()
        .table
        .iter()
        .find(|(sym, _)| cx.interner.resolve(**sym) == "k")
        .map(|(_, decl)| *decl)
        .expect("'k' enclosed in the closure");
    assert!(cx.arena[enclosed].decl().flags.contains(DeclFlags::ENCLOSED));
}

#[test]
fn closure_conversion_builds_the_make_closure_call() {
    let (mut cx, diags) =
        parse("public int make_adder(int k) { return lambda(int x) { return x + k; }; }");
    assert!(diags.is_empty());

    let make_adder = function(&cx, "make_adder");
    let closure = function(&cx, "closure0");
    let mut diags = Diagnostics::new();
    analyse_symbols(&mut cx, make_adder, &mut diags);
    analyse_symbols(&mut cx, closure, &mut diags);
    process_closures(&mut cx, make_adder, &mut diags);
    process_closures(&mut cx, closure, &mut diags);

    // The closure's environment becomes its leading argument.
    let args = cx.arena.child(closure, 1).unwrap();
    let first = cx.arena.child(args, 0).unwrap();
    assert_eq!(cx.interner.resolve(cx.arena[first].decl().name), "k");
    assert!(cx.arena[first]
        .decl()
        .flags
        .contains(DeclFlags::ARGUMENT | DeclFlags::ENCLOSED));

    // make_adder's body now calls make_closure(4, k, closure0).
    let body = cx.arena.child(make_adder, 0).unwrap();
    assert!(!contains_kind(&cx, body, Kind::Closure));
    assert!(contains_kind(&cx, body, Kind::Call));

    let ret = find_return(&cx, body).expect("return statement");
    let call = cx.arena.child_req(ret, 0);
    assert!(cx.arena[call].is(Kind::Call));
    let callee = cx.arena.child_req(call, 0);
    assert_eq!(
        cx.interner.resolve(cx.arena[callee].var().name),
        "make_closure"
    );
    let call_args = cx.arena.child_req(call, 1);
    let size = cx.arena.child_req(call_args, 0);
    assert_eq!(cx.arena[size].int_value(), 4);

    // The generated function is referenced once more now.
    assert!(cx.arena[closure].decl().use_count >= 1);
}

fn find_return(cx: &crate::Cx, block: enoki_ir::node::NodeId) -> Option<enoki_ir::node::NodeId> {
    for i in 0..cx.arena.num_children(block) {
        let Some(stmt) = cx.arena.child(block, i) else {
            continue;
        };
        if cx.arena[stmt].is(Kind::Return) {
            return Some(stmt);
        }
        if cx.arena[stmt].is(Kind::Block) {
            if let Some(found) = find_return(cx, stmt) {
                return Some(found);
            }
        }
    }
    None
}
