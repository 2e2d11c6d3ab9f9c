//! Symbol analysis.
//!
//! Flattens block-local symbol tables into a single per-function table
//! (name uniqueness within a function is a parser invariant) and discovers
//! enclosed uses: a variable whose name is neither in the function's table
//! nor the module's belongs to an enclosing function. Such a use gets a
//! private copy of the declaration, flagged ENCLOSED, for the closure pass
//! to lift into an argument.

use enoki_core::interner::Symbol;
use enoki_ir::node::{DeclFlags, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

pub fn analyse_symbols(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(body) = cx.arena.child(func, 0) else {
        return false;
    };
    analyse_block(cx, func, body, 1)
}

fn analyse_block(cx: &mut Cx, func: NodeId, block: NodeId, depth: i32) -> bool {
    let mut changed = false;

    let entries: Vec<(Symbol, NodeId)> = cx.arena[block]
        .block_table()
        .iter()
        .map(|(name, decl)| (*name, *decl))
        .collect();
    for (name, decl) in entries {
        cx.arena[func].func_mut().table.insert(name, decl);
        cx.arena[decl].decl_mut().depth = depth;
    }

    for i in 0..cx.arena.num_children(block) {
        let Some(stmt) = cx.arena.child(block, i) else {
            continue;
        };
        match cx.arena[stmt].kind() {
            Kind::Block => {
                changed |= analyse_block(cx, func, stmt, depth);
            }
            Kind::If => {
                changed |= analyse_expression(cx, func, cx.arena.child(stmt, 0), depth);
                if let Some(then_block) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, then_block, depth);
                }
                if let Some(else_block) = cx.arena.child(stmt, 2) {
                    changed |= analyse_block(cx, func, else_block, depth);
                }
            }
            Kind::While => {
                changed |= analyse_expression(cx, func, cx.arena.child(stmt, 0), depth);
                if let Some(body) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, body, depth);
                }
            }
            Kind::Return => {
                changed |= analyse_expression(cx, func, cx.arena.child(stmt, 0), depth);
            }
            Kind::Assign => {
                changed |= analyse_expression(cx, func, cx.arena.child(stmt, 1), depth);
            }
            _ => {}
        }
    }

    changed
}

fn analyse_expression(cx: &mut Cx, func: NodeId, expr: Option<NodeId>, depth: i32) -> bool {
    let Some(expr) = expr else {
        return false;
    };
    let mut changed = false;

    if cx.arena[expr].is(Kind::Variable) {
        let name = cx.arena[expr].var().name;
        let in_function = cx.arena[func].func().table.contains_key(&name);
        let in_module = cx.arena[cx.module].module().table.contains_key(&name);
        if !in_function && !in_module {
            if let Some(original) = cx.arena[expr].var().decl {
                let copy = cx.arena.copy(original);
                cx.arena[copy].decl_mut().flags |= DeclFlags::ENCLOSED;
                cx.arena[expr].var_mut().decl = Some(copy);
                cx.arena[func].func_mut().table.insert(name, copy);
            }
        }

        if let Some(&current) = cx.arena[func].func().table.get(&name) {
            if cx.arena[expr].var().decl != Some(current) {
                cx.arena[expr].var_mut().decl = Some(current);
            }
        }
    }

    for i in 0..cx.arena.num_children(expr) {
        changed |= analyse_expression(cx, func, cx.arena.child(expr, i), depth);
    }

    changed
}
