//! Function frame sizing.
//!
//! The input size is the size of the argument type; the stack covers the
//! arguments followed by every local, one 4-byte slot each; the output size
//! is the size of the function type's codomain. Each declaration records
//! its stack position for the emitter.

use enoki_core::ice;
use enoki_ir::node::{type_size, DeclFlags, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

pub fn analyse_function_size(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let args = cx.arena.child(func, 1);

    let input_size = args
        .and_then(|args| cx.arena[args].ty)
        .map_or(0, |ty| type_size(&cx.arena, ty));

    let mut stack_size = 0;
    if let Some(args) = args {
        for i in 0..cx.arena.num_children(args) {
            let Some(decl) = cx.arena.child(args, i) else {
                continue;
            };
            cx.arena[decl].decl_mut().stack_position = stack_size;
            stack_size += 4;
        }
    }

    let decls: Vec<NodeId> = cx.arena[func].func().table.values().copied().collect();
    for decl in decls {
        if cx.arena[decl].decl().flags.contains(DeclFlags::ARGUMENT) {
            continue;
        }
        cx.arena[decl].decl_mut().stack_position = stack_size;
        stack_size += 4;
    }

    let Some(fn_ty) = cx.arena[func].decl().ty else {
        ice!("function without a type");
    };
    if !cx.arena[fn_ty].is(Kind::MapType) {
        ice!("function type is not a map type");
    }
    let output_ty = cx.arena.child_req(fn_ty, 1);
    let output_size = type_size(&cx.arena, output_ty);

    let data = cx.arena[func].func_mut();
    data.input_size = input_size;
    data.stack_size = stack_size;
    data.output_size = output_size;
    true
}
