use indoc::indoc;

use enoki_ir::graph::EdgeKind;
use enoki_ir::node::{Kind, NodeId};

use crate::test_utils::{compile, contains_kind, function, vertices};
use crate::Cx;

fn graph<'a>(cx: &'a Cx, func: NodeId) -> &'a enoki_ir::graph::Graph {
    cx.arena[func].func().graph.as_ref().expect("function has no graph")
}

/// Count vertices whose expression tree contains the kind.
fn vertices_containing(cx: &Cx, func: NodeId, kind: Kind) -> usize {
    vertices(cx, func)
        .into_iter()
        .filter(|v| contains_kind(cx, *v, kind))
        .count()
}

fn decl_by_name(cx: &Cx, func: NodeId, name: &str) -> NodeId {
    cx.arena[func]
        .func()
        .table
        .iter()
        .find(|(sym, _)| cx.interner.resolve(**sym) == name)
        .map(|(_, decl)| *decl)
        .unwrap_or_else(|| panic!("no declaration '{name}'"))
}

#[test]
fn identity_function_gets_a_register() {
    let compilation = compile("public int id(int x) { return x; }");
    let cx = &compilation.cx;
    let id = function(cx, "id");

    // No temporaries were needed.
    let temps = cx.arena[id]
        .func()
        .table
        .keys()
        .filter(|sym| cx.interner.resolve(**sym).starts_with("$t"))
        .count();
    assert_eq!(temps, 0);

    // enter, return, exit - and x coloured into the first register.
    let kinds: Vec<Kind> = vertices(cx, id)
        .into_iter()
        .map(|v| cx.arena[v].kind())
        .collect();
    assert!(kinds.contains(&Kind::Return));
    assert_eq!(cx.arena[decl_by_name(cx, id, "x")].decl().colour, 1);
}

#[test]
fn graph_invariants_hold_after_the_pipeline() {
    let compilation = compile(indoc! {"
        public int classify(int a, int b) {
            int r = 0;
            while (a > 0) {
                if (b > a) r = r + 1;
                else r = r - 1;
                a = a - 1;
            }
            return r;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "classify");
    let graph = graph(cx, func);

    // Edge symmetry: every forward edge has a backward twin with the same
    // flags.
    for (from, succs) in graph.forward_iter() {
        for (to, kind) in succs {
            let twin = graph.predecessors(*to).and_then(|m| m.get(&from)).copied();
            assert_eq!(twin, Some(*kind));
        }
    }

    // Enter and exit hold labels 0 and 1.
    assert!(cx.arena[graph.vertex_at(0).unwrap()].is(Kind::Enter));
    assert!(cx.arena[graph.vertex_at(1).unwrap()].is(Kind::Exit));

    // No pass or join vertices survive cleanup, and every test has its two
    // branch arms.
    for vertex in vertices(cx, func) {
        let kind = cx.arena[vertex].kind();
        assert_ne!(kind, Kind::Pass);
        assert_ne!(kind, Kind::Join);
        if kind == Kind::Test {
            let succs = graph.successors(vertex).unwrap();
            assert_eq!(succs.len(), 2);
            assert!(succs.values().any(|k| k.contains(EdgeKind::YES)));
            assert!(succs.values().any(|k| k.contains(EdgeKind::NO)));
        }
    }
}

#[test]
fn short_circuit_becomes_two_tests() {
    let compilation = compile(indoc! {"
        public int f(int a, int b) {
            if (a > 0 && b > 0) return 1;
            else return 0;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "f");

    let tests = vertices(cx, func)
        .into_iter()
        .filter(|v| cx.arena[*v].is(Kind::Test))
        .count();
    assert_eq!(tests, 2);

    let returns = vertices(cx, func)
        .into_iter()
        .filter(|v| cx.arena[*v].is(Kind::Return))
        .count();
    assert_eq!(returns, 2);

    // The AND operator itself is gone from the graph.
    assert_eq!(vertices_containing(cx, func, Kind::And), 0);
}

#[test]
fn tail_recursion_becomes_a_back_edge() {
    let compilation = compile(indoc! {"
        public int sum(int n, int acc) {
            if (n == 0) return acc;
            else return sum(n - 1, acc + n);
        }
    "});
    let cx = &compilation.cx;
    let sum = function(cx, "sum");
    let graph = graph(cx, sum);

    // No recursive call remains.
    assert_eq!(vertices_containing(cx, sum, Kind::Call), 0);

    // Some back edge targets the entry's successor.
    let enter = graph.vertex_at(0).unwrap();
    let (entry_succ, _) = graph.first_successor(enter).unwrap();
    let has_back = graph
        .predecessors(entry_succ)
        .is_some_and(|preds| preds.values().any(|k| k.contains(EdgeKind::BACK)));
    assert!(has_back);

    // The eliminated self-reference brought the use count to zero.
    assert_eq!(cx.arena[sum].decl().use_count, 0);
}

#[test]
fn reduction_leaves_only_simple_expressions() {
    let compilation = compile(indoc! {"
        public int poly(int x) {
            return x * x + 3 * x + 1;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "poly");

    fn is_atom(cx: &Cx, expr: NodeId) -> bool {
        matches!(
            cx.arena[expr].kind(),
            Kind::Integer | Kind::Str | Kind::Variable | Kind::Closure
        ) || (cx.arena[expr].is(Kind::Tuple)
            && (0..cx.arena.num_children(expr))
                .all(|i| is_atom(cx, cx.arena.child(expr, i).unwrap())))
    }

    for vertex in vertices(cx, func) {
        let expr = match cx.arena[vertex].kind() {
            Kind::Assign => cx.arena.child_req(vertex, 1),
            Kind::Return | Kind::Test => cx.arena.child_req(vertex, 0),
            _ => continue,
        };
        let kind = cx.arena[expr].kind();
        let simple = is_atom(cx, expr)
            || (enoki_ir::ops::is_binary_op(kind)
                && is_atom(cx, cx.arena.child_req(expr, 0))
                && is_atom(cx, cx.arena.child_req(expr, 1)))
            || (enoki_ir::ops::is_unary_op(kind) && is_atom(cx, cx.arena.child_req(expr, 0)))
            || (kind == Kind::Call && is_atom(cx, cx.arena.child_req(expr, 1)));
        assert!(simple, "vertex expression is not simple");
    }
}

#[test]
fn i386_form_destination_equals_first_operand() {
    let compilation = compile(indoc! {"
        public int f(int a, int b) {
            int c = a * 2 + b * 3;
            return c - a;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "f");

    for vertex in vertices(cx, func) {
        if !cx.arena[vertex].is(Kind::Assign) {
            continue;
        }
        let Some(dest) = cx.arena.child(vertex, 0) else {
            continue;
        };
        let expr = cx.arena.child_req(vertex, 1);
        if !enoki_ir::ops::is_binary_op(cx.arena[expr].kind()) {
            continue;
        }
        let first = cx.arena.child_req(expr, 0);
        assert!(cx.arena[dest].is(Kind::Variable));
        assert!(cx.arena[first].is(Kind::Variable));
        assert_eq!(cx.arena[dest].var().name, cx.arena[first].var().name);
    }
}

#[test]
fn interference_neighbours_get_distinct_registers() {
    let compilation = compile(indoc! {"
        public int f(int a, int b) {
            int c = a + b;
            return c * a;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "f");

    // a stays live across the assignment to c, so they must not share.
    let a = cx.arena[decl_by_name(cx, func, "a")].decl().colour;
    let c = cx.arena[decl_by_name(cx, func, "c")].decl().colour;
    assert_ne!(a, 0);
    assert_ne!(c, 0);
    assert_ne!(a, c);
}

#[test]
fn liveness_records_arguments_live_into_the_body() {
    let compilation = compile("public int id(int x) { return x; }");
    let cx = &compilation.cx;
    let func = function(cx, "id");

    let info = cx.arena[func].func().liveness.as_ref().expect("cached liveness");
    let x_live_somewhere = info.inputs.values().flatten().any(|set| {
        set.borrow()
            .vars
            .keys()
            .any(|sym| cx.interner.resolve(*sym) == "x")
    });
    assert!(x_live_somewhere);
}

#[test]
fn eight_live_values_spill() {
    let compilation = compile(indoc! {"
        public int spill(int a) {
            int b = a + 1;
            int c = a + 2;
            int d = a + 3;
            int e = a + 4;
            int f = a + 5;
            int g = a + 6;
            int h = a + 7;
            return a + b + c + d + e + f + g + h;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "spill");

    let spilled = ["a", "b", "c", "d", "e", "f", "g", "h"]
        .iter()
        .filter(|name| cx.arena[decl_by_name(cx, func, name)].decl().colour == 0)
        .count();
    assert!(spilled >= 2, "expected at least two spills, got {spilled}");
}

#[test]
fn leaf_calls_are_inlined() {
    let compilation = compile(indoc! {"
        public int leaf(int x) {
            return x + 1;
        }

        public int caller(int a) {
            int p = leaf(a);
            int q = leaf(p);
            return q;
        }
    "});
    let cx = &compilation.cx;
    let caller = function(cx, "caller");
    let leaf = function(cx, "leaf");

    // Both call sites were replaced by renamed copies of the body.
    assert_eq!(vertices_containing(cx, caller, Kind::Call), 0);
    assert_eq!(cx.arena[leaf].decl().use_count, 0);

    let renamed = cx.arena[caller]
        .func()
        .table
        .keys()
        .filter(|sym| cx.interner.resolve(**sym).starts_with("$n"))
        .count();
    assert!(renamed >= 2, "expected renamed callee locals, got {renamed}");
}

#[test]
fn constant_tests_fold_away() {
    let compilation = compile(indoc! {"
        public int f(int a) {
            if (1) return a;
            else return 0;
        }
    "});
    let cx = &compilation.cx;
    let func = function(cx, "f");

    for vertex in vertices(cx, func) {
        if cx.arena[vertex].is(Kind::Test) {
            let expr = cx.arena.child_req(vertex, 0);
            assert!(!cx.arena[expr].is(Kind::Integer), "literal test survived");
        }
    }

    // Only the taken branch remains.
    let returns = vertices(cx, func)
        .into_iter()
        .filter(|v| cx.arena[*v].is(Kind::Return))
        .count();
    assert_eq!(returns, 1);
}

#[test]
fn dot_dump_renders_the_identity_graph() {
    let compilation = compile("public int id(int x) { return x; }");
    let dot = crate::compile::driver::print_graphs(&compilation.cx);
    insta::assert_snapshot!(dot, @r#"
    digraph G {
    subgraph cluster_id_1 {
        label="id"; labelloc="t";
        ranksep=0.1
        node [shape="box", style="filled"];
        id_1_0 [label=<0. enter>];
        id_1_1 [label=<1. exit>];
        id_1_2 [label=<2. return x>];
        id_1_0 -> id_1_2 [label=<>];
        id_1_2 -> id_1_1 [label=<>];
    }
    }
    "#);
}

#[test]
fn break_outside_a_loop_stops_before_code_generation() {
    let result = crate::compile_source(
        "<test>",
        "public int f(int a) { break; return a; }",
    );
    match result {
        Err(crate::Error::Analyze(diags)) => {
            assert!(diags.iter().any(|d| d.message.contains("break outside loop")));
        }
        Err(crate::Error::Parse(_)) => panic!("rejected at parse time"),
        Ok(_) => panic!("ill-formed program reached code generation"),
    }
}

#[test]
fn use_before_definition_is_reported() {
    let compilation = compile(indoc! {"
        public int f(int a) {
            int b;
            if (a > 0) b = 1;
            return b;
        }
    "});
    assert!(compilation
        .diagnostics
        .iter()
        .any(|d| d.message.contains("may not be defined")));
}

#[test]
fn closure_body_compiles_with_environment_argument() {
    let compilation =
        compile("public int make_adder(int k) { return lambda(int x) { return x + k; }; }");
    let cx = &compilation.cx;

    // make_adder now calls the runtime helper.
    let make_adder = function(cx, "make_adder");
    let calls_helper = vertices(cx, make_adder).into_iter().any(|v| {
        contains_kind(cx, v, Kind::Call) && {
            fn has_helper(cx: &Cx, node: NodeId) -> bool {
                if cx.arena[node].is(Kind::Call) {
                    let callee = cx.arena.child_req(node, 0);
                    if cx.interner.resolve(cx.arena[callee].var().name) == "make_closure" {
                        return true;
                    }
                }
                (0..cx.arena.num_children(node)).any(|i| {
                    cx.arena
                        .child(node, i)
                        .is_some_and(|child| has_helper(cx, child))
                })
            }
            has_helper(cx, v)
        }
    });
    assert!(calls_helper);

    // The closure function's first argument is the lifted k.
    let closure = function(cx, "closure0");
    let args = cx.arena.child(closure, 1).unwrap();
    let first = cx.arena.child(args, 0).unwrap();
    assert_eq!(cx.interner.resolve(cx.arena[first].decl().name), "k");
}
