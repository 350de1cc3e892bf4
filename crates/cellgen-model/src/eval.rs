use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::types::TypeTable;
use crate::value::{Address, Value};
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Decides whether an expression is a compile-time constant.
///
/// Returning `None` means "not constant", never "error": the backend then lowers the expression
/// structurally.
pub trait ConstEvaluator {
    fn evaluate(&self, expr: &Expr) -> Option<Value>;
}

/// Treats nothing as constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstants;

impl ConstEvaluator for NoConstants {
    fn evaluate(&self, _expr: &Expr) -> Option<Value> {
        None
    }
}

/// Folds literals, named constants, `address("...")` and integer arithmetic over them.
#[derive(Debug, Clone, Copy)]
pub struct LiteralEvaluator<'a> {
    table: &'a TypeTable,
}

impl<'a> LiteralEvaluator<'a> {
    pub fn new(table: &'a TypeTable) -> Self {
        Self { table }
    }

    fn binary(&self, op: BinaryOp, lhs: Value, rhs: Value) -> Option<Value> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_binary(op, &a, &b),
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinaryOp::And => Some(Value::Bool(a && b)),
                BinaryOp::Or => Some(Value::Bool(a || b)),
                BinaryOp::Eq => Some(Value::Bool(a == b)),
                BinaryOp::Ne => Some(Value::Bool(a != b)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl ConstEvaluator for LiteralEvaluator<'_> {
    fn evaluate(&self, expr: &Expr) -> Option<Value> {
        match &expr.kind {
            ExprKind::Number { value } => Some(Value::Int(value.clone())),
            ExprKind::Boolean { value } => Some(Value::Bool(*value)),
            ExprKind::Null => Some(Value::Null),
            ExprKind::String { value } => Some(Value::String(value.clone())),
            ExprKind::Id { name } => self.table.constant(name).map(|c| c.value.clone()),
            ExprKind::StaticCall { name, args } if name == "address" && args.len() == 1 => {
                match self.evaluate(&args[0])? {
                    Value::String(raw) => raw.parse::<Address>().ok().map(Value::Address),
                    _ => None,
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                self.binary(*op, lhs, rhs)
            }
            ExprKind::Unary { op, operand } => match (op, self.evaluate(operand)?) {
                (UnaryOp::Neg, Value::Int(v)) => in_range(-v),
                (UnaryOp::BitNot, Value::Int(v)) => in_range(-v - BigInt::one()),
                (UnaryOp::Not, Value::Bool(v)) => Some(Value::Bool(!v)),
                _ => None,
            },
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => match self.evaluate(cond)? {
                Value::Bool(true) => self.evaluate(then),
                Value::Bool(false) => self.evaluate(otherwise),
                _ => None,
            },
            ExprKind::StructInstance { type_name, fields } => {
                let desc = self.table.types.get(type_name)?;
                let mut values = IndexMap::new();
                for field in &desc.fields {
                    let value = match fields.iter().find(|f| f.name == field.name) {
                        Some(init) => self.evaluate(&init.value)?,
                        None => field.default.clone()?,
                    };
                    values.insert(field.name.clone(), value);
                }
                Some(Value::Struct {
                    type_name: type_name.clone(),
                    fields: values,
                })
            }
            ExprKind::FieldAccess { .. }
            | ExprKind::StaticCall { .. }
            | ExprKind::MethodCall { .. }
            | ExprKind::StaticMethodCall { .. }
            | ExprKind::InitOf { .. } => None,
        }
    }
}

fn int_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Option<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => floor_div(a, b)?,
        BinaryOp::Mod => a - b * floor_div(a, b)?,
        BinaryOp::Shl => a << shift_amount(b)?,
        BinaryOp::Shr => a >> shift_amount(b)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Eq => return Some(Value::Bool(a == b)),
        BinaryOp::Ne => return Some(Value::Bool(a != b)),
        BinaryOp::Lt => return Some(Value::Bool(a < b)),
        BinaryOp::Le => return Some(Value::Bool(a <= b)),
        BinaryOp::Gt => return Some(Value::Bool(a > b)),
        BinaryOp::Ge => return Some(Value::Bool(a >= b)),
        BinaryOp::And | BinaryOp::Or => return None,
    };
    in_range(result)
}

/// Division rounding toward negative infinity, as the target VM does.
fn floor_div(a: &BigInt, b: &BigInt) -> Option<BigInt> {
    if b.is_zero() {
        return None;
    }
    let quotient = a / b;
    let remainder = a % b;
    if !remainder.is_zero() && (remainder.is_negative() != b.is_negative()) {
        Some(quotient - BigInt::one())
    } else {
        Some(quotient)
    }
}

fn shift_amount(b: &BigInt) -> Option<usize> {
    b.to_usize().filter(|shift| *shift <= 256)
}

/// Results outside the 257-bit signed range would overflow at runtime, so they are left unfolded.
fn in_range(value: BigInt) -> Option<Value> {
    let limit = BigInt::one() << 256usize;
    if value >= -limit.clone() && value < limit {
        Some(Value::Int(value))
    } else {
        None
    }
}
