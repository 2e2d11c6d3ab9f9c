use indoc::indoc;

use enoki_ir::node::{DeclFlags, Kind};

use crate::test_utils::{contains_kind, function, parse};

#[test]
fn parses_a_function_with_arguments() {
    let (cx, diags) = parse("public int add(int a, int b) { return a + b; }");
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");

    let add = function(&cx, "add");
    assert!(cx.arena[add].decl().flags.contains(DeclFlags::PUBLIC));

    let args = cx.arena.child(add, 1).unwrap();
    assert_eq!(cx.arena.num_children(args), 2);
    let first = cx.arena.child(args, 0).unwrap();
    assert!(cx.arena[first].decl().flags.contains(DeclFlags::ARGUMENT));

    let body = cx.arena.child(add, 0).expect("function body");
    assert!(contains_kind(&cx, body, Kind::Return));
}

#[test]
fn resolves_locals_and_counts_uses() {
    let (cx, diags) = parse(indoc! {"
        public int twice(int x) {
            int y = x + x;
            return y;
        }
    "});
    assert!(diags.is_empty());

    let twice = function(&cx, "twice");
    let args = cx.arena.child(twice, 1).unwrap();
    let x = cx.arena.child(args, 0).unwrap();
    assert_eq!(cx.arena[x].decl().use_count, 2);
}

#[test]
fn undefined_variable_is_an_error() {
    let (_cx, diags) = parse("public int f(int a) { return a + b; }");
    assert!(diags.has_errors());
    assert!(diags.iter().any(|d| d.message.contains("undefined variable 'b'")));
}

#[test]
fn call_position_may_stay_unresolved() {
    // Runtime helpers are linked in later; calling them is not an error.
    let (_cx, diags) = parse("public int f(int a) { output(a); return a; }");
    assert!(!diags.has_errors(), "unexpected errors: {diags:?}");
}

#[test]
fn for_loops_desugar_into_while() {
    let (cx, diags) = parse(indoc! {"
        public int sum_to(int n) {
            int total = 0;
            for (int i = 0; i < n; i = i + 1) {
                total = total + i;
            }
            return total;
        }
    "});
    assert!(diags.is_empty());

    let body = cx.arena.child(function(&cx, "sum_to"), 0).unwrap();
    assert!(contains_kind(&cx, body, Kind::While));
    assert!(!contains_kind(&cx, body, Kind::For));
}

#[test]
fn lambda_becomes_a_module_function() {
    let (cx, diags) = parse("public int make_adder(int k) { return lambda(int x) { return x + k; }; }");
    assert!(diags.is_empty());

    // The closure function is registered in the module next to make_adder.
    let closure = function(&cx, "closure0");
    assert!(cx.arena[closure].is(Kind::Function));

    let body = cx.arena.child(function(&cx, "make_adder"), 0).unwrap();
    assert!(contains_kind(&cx, body, Kind::Closure));
}

#[test]
fn duplicate_declaration_is_an_error() {
    let (_cx, diags) = parse("public int f(int a) { int b = 1; int b = 2; return b; }");
    assert!(diags.iter().any(|d| d.message.contains("duplicate declaration")));
}

#[test]
fn comments_are_skipped() {
    let (cx, diags) = parse(indoc! {"
        // line comment
        public int f(int a) {
            /* block
               comment */
            return a; // trailing
        }
    "});
    assert!(diags.is_empty());
    function(&cx, "f");
}

#[test]
fn tuple_assignment_parses() {
    let (cx, diags) = parse(indoc! {"
        public int f(int a, int b) {
            int x;
            int y;
            (x, y) = (b, a);
            return x;
        }
    "});
    assert!(diags.is_empty());
    let body = cx.arena.child(function(&cx, "f"), 0).unwrap();
    assert!(contains_kind(&cx, body, Kind::Tuple));
}
