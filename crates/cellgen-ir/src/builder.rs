/*! Typed constructors for IR nodes.
 *
 * Generators build code through these helpers instead of spelling out nested enum literals, which
 * keeps call sites close to the shape of the emitted code.
 */

use crate::expr::{AugmentedOp, BinaryOp, Expr, UnaryOp};
use crate::stmt::{Conditional, ElseBranch, Stmt};
use crate::types::FuncType;
use num_bigint::BigInt;

pub fn id(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn int(value: impl Into<BigInt>) -> Expr {
    Expr::Int(value.into())
}

pub fn bool_lit(value: bool) -> Expr {
    Expr::Bool(value)
}

pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: callee.into(),
        args,
    }
}

/// `receiver.method(args)`
pub fn method(receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: name.into(),
        args,
        modifying: false,
    }
}

/// `receiver~method(args)`
pub fn modify(receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: name.into(),
        args,
        modifying: true,
    }
}

pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Assign {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn augmented(lhs: Expr, op: AugmentedOp, rhs: Expr) -> Expr {
    Expr::AugmentedAssign {
        lhs: Box::new(lhs),
        op,
        rhs: Box::new(rhs),
    }
}

pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    binary(lhs, BinaryOp::Eq, rhs)
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

/// Bitwise `~`, which is also logical negation on the canonical `-1`/`0` booleans.
pub fn not(operand: Expr) -> Expr {
    unary(UnaryOp::BitNot, operand)
}

pub fn ternary(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::Ternary {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

pub fn tensor(items: Vec<Expr>) -> Expr {
    Expr::Tensor(items)
}

pub fn unit() -> Expr {
    Expr::Tensor(Vec::new())
}

pub fn tuple(items: Vec<Expr>) -> Expr {
    Expr::Tuple(items)
}

pub fn null() -> Expr {
    call("null", vec![])
}

pub fn is_null(value: Expr) -> Expr {
    call("null?", vec![value])
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value))
}

pub fn ret_void() -> Stmt {
    Stmt::Return(None)
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn assign_stmt(lhs: Expr, rhs: Expr) -> Stmt {
    Stmt::Expr(assign(lhs, rhs))
}

/// `var binding = init;`
pub fn var(binding: Expr, init: Expr) -> Stmt {
    Stmt::VarDef {
        ty: None,
        binding,
        init: Some(init),
    }
}

/// `ty name = init;`
pub fn typed_var(ty: FuncType, name: impl Into<String>, init: Expr) -> Stmt {
    Stmt::VarDef {
        ty: Some(ty),
        binding: id(name),
        init: Some(init),
    }
}

pub fn if_then(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::If(Conditional {
        cond,
        body,
        otherwise: None,
        negated: false,
    })
}

pub fn if_else(cond: Expr, body: Vec<Stmt>, otherwise: Vec<Stmt>) -> Stmt {
    Stmt::If(Conditional {
        cond,
        body,
        otherwise: Some(ElseBranch::Else(otherwise)),
        negated: false,
    })
}

pub fn throw_unless(code: u32, cond: Expr) -> Stmt {
    expr_stmt(call("throw_unless", vec![int(code), cond]))
}

pub fn throw_if(code: u32, cond: Expr) -> Stmt {
    expr_stmt(call("throw_if", vec![int(code), cond]))
}
