//! Operator classification over node kinds.

use enoki_core::ice;

use crate::node::Kind;

pub fn is_unary_op(kind: Kind) -> bool {
    matches!(kind, Kind::Negation | Kind::Not)
}

pub fn is_comparison_op(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Leq | Kind::Lt | Kind::Geq | Kind::Gt | Kind::Eq | Kind::Neq
    )
}

pub fn is_binary_op(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Sum | Kind::Product | Kind::Difference | Kind::Ratio | Kind::And | Kind::Or
    ) || is_comparison_op(kind)
}

/// Operators whose operands may be swapped without changing the result.
pub fn is_commutable_op(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Sum | Kind::Product | Kind::Eq | Kind::Neq | Kind::And | Kind::Or
    )
}

/// The comparison testing the opposite outcome.
pub fn negate_comparison(kind: Kind) -> Kind {
    match kind {
        Kind::Gt => Kind::Leq,
        Kind::Lt => Kind::Geq,
        Kind::Geq => Kind::Lt,
        Kind::Leq => Kind::Gt,
        Kind::Eq => Kind::Neq,
        Kind::Neq => Kind::Eq,
        _ => ice!("negation of non-comparison operator {}", kind.name()),
    }
}

pub fn op_symbol(kind: Kind) -> &'static str {
    match kind {
        Kind::Eq => "==",
        Kind::Neq => "!=",
        Kind::Leq => "<=",
        Kind::Geq => ">=",
        Kind::Lt => "<",
        Kind::Gt => ">",
        Kind::And => "&&",
        Kind::Or => "||",
        Kind::Product => "*",
        Kind::Sum => "+",
        Kind::Difference => "-",
        Kind::Ratio => "/",
        Kind::Negation => "-",
        Kind::Not => "!",
        _ => "?",
    }
}
