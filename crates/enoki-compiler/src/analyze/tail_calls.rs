//! Tail-call rewriting.
//!
//! A self-recursive tail call in `f(x)` has the form `return f(y);` and is
//! replaced by `x = y; restart;`: flattening later turns the restart into a
//! back edge to the function's entry successor. The eliminated call site
//! decrements the function's use count.

use enoki_ir::node::{Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

pub fn analyse_tail_recursion(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(body) = cx.arena.child(func, 0) else {
        return false;
    };
    analyse_block(cx, func, body)
}

fn analyse_block(cx: &mut Cx, func: NodeId, block: NodeId) -> bool {
    let mut changed = false;

    let mut i = 0;
    while i < cx.arena.num_children(block) {
        let Some(stmt) = cx.arena.child(block, i) else {
            i += 1;
            continue;
        };

        match cx.arena[stmt].kind() {
            Kind::Block => {
                changed |= analyse_block(cx, func, stmt);
            }
            Kind::If => {
                if let Some(then_block) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, then_block);
                }
                if let Some(else_block) = cx.arena.child(stmt, 2) {
                    changed |= analyse_block(cx, func, else_block);
                }
            }
            Kind::While => {
                if let Some(body) = cx.arena.child(stmt, 1) {
                    changed |= analyse_block(cx, func, body);
                }
            }
            Kind::Return => {
                let expr = cx.arena.child_req(stmt, 0);
                if cx.arena[expr].is(Kind::Call) {
                    let callee = cx.arena.child_req(expr, 0);
                    if cx.arena[callee].var().name == cx.arena[func].decl().name {
                        let line = cx.arena[stmt].line;
                        let args = cx.arena.child_req(expr, 1);
                        let input = cx.input_tuple(func);
                        let assign = cx.make_assignment(Some(input), args, line);
                        let restart = cx.arena.alloc_simple(Kind::Restart, line);

                        // The assignment lands where the return was; the
                        // return itself becomes the restart.
                        cx.arena.insert_before(block, assign, stmt);
                        cx.arena.set_child(block, i + 1, Some(restart));
                        cx.arena[func].decl_mut().use_count -= 1;

                        eprintln!(
                            "Tail call in '{}' optimised",
                            cx.interner.resolve(cx.arena[func].decl().name)
                        );
                        changed = true;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    changed
}
