//! Closure conversion.
//!
//! Each closure expression becomes a call to the runtime primitive
//! `make_closure(size, values..., fn)`: the environment size in bytes, the
//! current values of the enclosed variables, and the closure function
//! itself. The enclosed declarations are flagged ARGUMENT and prepended to
//! the closure function's argument list, so the generated code receives its
//! environment as ordinary leading parameters.

use enoki_ir::node::{DeclFlags, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

pub fn process_closures(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(body) = cx.arena.child(func, 0) else {
        return false;
    };
    analyse_block(cx, func, body)
}

/// Prepend the closure's enclosed declarations to its argument list and
/// return them (the environment, in table order).
fn build_closure_args(cx: &mut Cx, closure: NodeId) -> Vec<NodeId> {
    let mut env = Vec::new();
    let decls: Vec<NodeId> = cx.arena[closure].func().table.values().copied().collect();
    for decl in decls {
        if cx.arena[decl].decl().flags.contains(DeclFlags::ENCLOSED) {
            cx.arena[decl].decl_mut().flags |= DeclFlags::ARGUMENT;
            env.push(decl);
        }
    }

    let line = cx.arena[closure].line;
    let old_args = cx.arena.child_req(closure, 1);
    let new_args = cx.arena.alloc_simple(Kind::Args, line);
    for &decl in &env {
        cx.arena.add_child(new_args, Some(decl));
    }
    for i in 0..cx.arena.num_children(old_args) {
        let child = cx.arena.child(old_args, i);
        cx.arena.add_child(new_args, child);
    }
    cx.arena.set_child(closure, 1, Some(new_args));

    env
}

fn analyse_block(cx: &mut Cx, func: NodeId, block: NodeId) -> bool {
    let mut changed = false;

    for i in 0..cx.arena.num_children(block) {
        let Some(stmt) = cx.arena.child(block, i) else {
            continue;
        };
        match cx.arena[stmt].kind() {
            Kind::Block => {
                changed |= analyse_block(cx, func, stmt);
            }
            Kind::If => {
                changed |= analyse_child(cx, func, stmt, 0);
                if let Some(then_block) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, then_block);
                }
                if let Some(else_block) = cx.arena.child(stmt, 2) {
                    changed |= analyse_block(cx, func, else_block);
                }
            }
            Kind::While => {
                changed |= analyse_child(cx, func, stmt, 0);
                if let Some(body) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, body);
                }
            }
            Kind::Return => {
                changed |= analyse_child(cx, func, stmt, 0);
            }
            Kind::Assign => {
                changed |= analyse_child(cx, func, stmt, 1);
            }
            _ => {}
        }
    }

    changed
}

fn analyse_child(cx: &mut Cx, func: NodeId, stmt: NodeId, index: usize) -> bool {
    let Some(expr) = cx.arena.child(stmt, index) else {
        return false;
    };
    let new_expr = analyse_expression(cx, func, expr);
    if new_expr != expr {
        cx.arena.set_child(stmt, index, Some(new_expr));
        return true;
    }
    false
}

fn analyse_expression(cx: &mut Cx, func: NodeId, expr: NodeId) -> NodeId {
    if cx.arena[expr].is(Kind::Closure) {
        let closure = cx.arena.child_req(expr, 0);
        let env = build_closure_args(cx, closure);
        let line = cx.arena[expr].line;

        // Replace the closure expression with the make_closure call.
        let make_closure = cx.interner.intern("make_closure");
        let fvar = cx.make_variable(make_closure, line);
        cx.arena[fvar].ty = cx.arena[closure].decl().ty;

        let args = cx.arena.alloc_simple(Kind::Tuple, line);
        let size = cx.make_integer_direct(4 * env.len() as i32, line);
        cx.arena.add_child(args, Some(size));
        for &decl in &env {
            let name = cx.arena[decl].decl().name;
            let var = cx.make_variable(name, line);
            cx.arena[var].var_mut().decl = Some(decl);
            cx.arena[var].ty = cx.arena[decl].decl().ty;
            cx.arena.add_child(args, Some(var));
        }
        let closure_name = cx.arena[closure].decl().name;
        let closure_var = cx.make_variable(closure_name, line);
        cx.arena[closure_var].var_mut().decl = Some(closure);
        cx.arena[closure_var].ty = cx.arena[closure].decl().ty;
        cx.arena.add_child(args, Some(closure_var));

        let call = cx.make_call(fvar, args, line);
        cx.arena[closure].decl_mut().use_count += 1;
        return call;
    }

    for i in 0..cx.arena.num_children(expr) {
        let Some(child) = cx.arena.child(expr, i) else {
            continue;
        };
        let new_child = analyse_expression(cx, func, child);
        if new_child != child {
            cx.arena.set_child(expr, i, Some(new_child));
        }
    }
    expr
}
