//! Graphviz rendering of control-flow graphs.
//!
//! Each graph becomes one `subgraph cluster_<name>_<seq>`; vertices are
//! labelled with their printable form, edges with their Y/N/B/L flags.
//! Symmetrical (interference) edges are not drawn.

use std::fmt::Write;

use enoki_core::interner::Interner;

use crate::graph::{EdgeKind, Graph};
use crate::node::{Arena, Kind, NodeId};
use crate::ops;

fn colour_name(num: i32) -> &'static str {
    match num {
        1 => "red",
        2 => "green",
        3 => "blue",
        4 => "brown",
        5 => "yellow",
        6 => "orange",
        7 => "purple",
        _ => "gray",
    }
}

/// Operator symbol with HTML entities for the label markup.
fn escaped_op_symbol(kind: Kind) -> &'static str {
    match kind {
        Kind::Leq => "&lt;=",
        Kind::Geq => "&gt;=",
        Kind::Lt => "&lt;",
        Kind::Gt => "&gt;",
        Kind::And => "&amp;&amp;",
        _ => ops::op_symbol(kind),
    }
}

fn write_expr(out: &mut String, arena: &Arena, interner: &Interner, expr: NodeId) {
    let node = &arena[expr];
    let kind = node.kind();
    match kind {
        Kind::Variable => {
            out.push_str(interner.resolve(node.var().name));
        }
        Kind::Integer => {
            let _ = write!(out, "{}", node.int_value());
        }
        Kind::Str => {
            let _ = write!(out, "\"{}\"", interner.resolve(node.str_value()));
        }
        Kind::Tuple => {
            out.push('(');
            for i in 0..arena.num_children(expr) {
                if i > 0 {
                    out.push_str(", ");
                }
                if let Some(child) = arena.child(expr, i) {
                    write_expr(out, arena, interner, child);
                }
            }
            out.push(')');
        }
        _ if ops::is_unary_op(kind) => {
            out.push_str(escaped_op_symbol(kind));
            write_expr(out, arena, interner, arena.child_req(expr, 0));
        }
        _ if ops::is_binary_op(kind) => {
            write_expr(out, arena, interner, arena.child_req(expr, 0));
            let _ = write!(out, " {} ", escaped_op_symbol(kind));
            write_expr(out, arena, interner, arena.child_req(expr, 1));
        }
        Kind::Assign => {
            out.push_str("assign ");
            write_opt_expr(out, arena, interner, arena.child(expr, 0));
            out.push_str(" = ");
            write_expr(out, arena, interner, arena.child_req(expr, 1));
        }
        Kind::Test => {
            out.push_str("test ");
            write_expr(out, arena, interner, arena.child_req(expr, 0));
        }
        Kind::Call => {
            let callee = arena.child_req(expr, 0);
            out.push_str(interner.resolve(arena[callee].var().name));
            out.push('(');
            write_expr(out, arena, interner, arena.child_req(expr, 1));
            out.push(')');
        }
        _ => out.push_str("?expr?"),
    }
}

/// An assignment destination may be empty (bare expression statements).
fn write_opt_expr(out: &mut String, arena: &Arena, interner: &Interner, expr: Option<NodeId>) {
    match expr {
        Some(expr) => write_expr(out, arena, interner, expr),
        None => out.push_str("?expr?"),
    }
}

/// Printable form of an expression.
pub fn expr_text(arena: &Arena, interner: &Interner, expr: NodeId) -> String {
    let mut out = String::new();
    write_expr(&mut out, arena, interner, expr);
    out
}

/// Printable form of a graph vertex.
pub fn vertex_text(arena: &Arena, interner: &Interner, vertex: NodeId) -> String {
    let mut out = String::new();
    let node = &arena[vertex];
    match node.kind() {
        Kind::Assign => {
            write_opt_expr(&mut out, arena, interner, arena.child(vertex, 0));
            out.push_str(" = ");
            write_expr(&mut out, arena, interner, arena.child_req(vertex, 1));
        }
        Kind::Return => {
            out.push_str("return ");
            write_expr(&mut out, arena, interner, arena.child_req(vertex, 0));
        }
        Kind::Test => {
            out.push_str("test ");
            write_expr(&mut out, arena, interner, arena.child_req(vertex, 0));
        }
        Kind::Pass => out.push_str("pass"),
        Kind::Join => out.push_str("join"),
        Kind::Enter => out.push_str("enter"),
        Kind::Exit => out.push_str("exit"),
        Kind::VarDecl => out.push_str(interner.resolve(node.decl().name)),
        kind => {
            let _ = write!(out, "?{}?", kind.name());
        }
    }
    out
}

/// Render one graph as a `subgraph` cluster.
pub fn print_graph(
    out: &mut String,
    arena: &Arena,
    interner: &Interner,
    graph: &Graph,
    name: &str,
    seq: u32,
) {
    let _ = writeln!(out, "subgraph cluster_{name}_{seq} {{");
    let _ = writeln!(out, "    label=\"{name}\"; labelloc=\"t\";");
    let _ = writeln!(out, "    ranksep=0.1");
    let _ = writeln!(out, "    node [shape=\"box\", style=\"filled\"];");

    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        let _ = write!(
            out,
            "    {name}_{seq}_{label} [label=<{label}. {}>",
            vertex_text(arena, interner, vertex)
        );
        if arena[vertex].is(Kind::VarDecl) {
            let _ = write!(out, ", fillcolor={}", colour_name(arena[vertex].decl().colour));
        }
        let _ = writeln!(out, "];");
    }

    for label in 0..graph.vertex_count() {
        let Some(from) = graph.vertex_at(label) else {
            continue;
        };
        let Some(succs) = graph.successors(from) else {
            continue;
        };
        for (to, kind) in succs {
            if *kind == EdgeKind::SYMMETRICAL {
                continue;
            }
            let Some(to_label) = graph.label_of(*to) else {
                continue;
            };
            let _ = write!(out, "    {name}_{seq}_{label} -> {name}_{seq}_{to_label} [label=<");
            if kind.contains(EdgeKind::YES) {
                out.push('Y');
            }
            if kind.contains(EdgeKind::NO) {
                out.push('N');
            }
            if kind.contains(EdgeKind::BACK) {
                out.push('B');
            }
            if kind.contains(EdgeKind::LOOP) {
                out.push('L');
            }
            let _ = writeln!(out, ">];");
        }
    }

    let _ = writeln!(out, "}}");
}
