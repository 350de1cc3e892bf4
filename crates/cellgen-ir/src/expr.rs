use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Int(BigInt),
    Bool(bool),
    Ident(String),
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// `receiver.method(args)` or, when `modifying`, `receiver~method(args)`.
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        modifying: bool,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    AugmentedAssign {
        lhs: Box<Expr>,
        op: AugmentedOp,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Tensor(Vec<Expr>),
    Tuple(Vec<Expr>),
    Hole,
}

impl Expr {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// True for names and tensors of names, the only shapes the target accepts on the left of `=`
    /// and as the receiver of a modifying call.
    pub fn is_lvalue(&self) -> bool {
        match self {
            Expr::Ident(_) | Expr::Hole => true,
            Expr::Tensor(items) => items.iter().all(Expr::is_lvalue),
            _ => false,
        }
    }

    /// Every identifier bound by an lvalue pattern, left to right.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_names(self, &mut out);
        out
    }
}

fn collect_names<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Ident(name) => out.push(name),
        Expr::Tensor(items) | Expr::Tuple(items) => {
            for item in items {
                collect_names(item, out);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AugmentedOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

impl AugmentedOp {
    pub fn binary(self) -> BinaryOp {
        match self {
            AugmentedOp::Add => BinaryOp::Add,
            AugmentedOp::Sub => BinaryOp::Sub,
            AugmentedOp::Mul => BinaryOp::Mul,
            AugmentedOp::Div => BinaryOp::Div,
            AugmentedOp::Mod => BinaryOp::Mod,
            AugmentedOp::Shl => BinaryOp::Shl,
            AugmentedOp::Shr => BinaryOp::Shr,
            AugmentedOp::And => BinaryOp::And,
            AugmentedOp::Or => BinaryOp::Or,
            AugmentedOp::Xor => BinaryOp::Xor,
        }
    }
}
