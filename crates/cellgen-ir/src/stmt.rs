use crate::expr::Expr;
use crate::types::FuncType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Expr(Expr),
    /// `ty binding = init;`, with `var` when `ty` is `None`. `binding` is a name or a tensor of
    /// names when destructuring.
    VarDef {
        ty: Option<FuncType>,
        binding: Expr,
        init: Option<Expr>,
    },
    If(Conditional),
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `do { body } until (cond);`
    Until {
        body: Vec<Stmt>,
        cond: Expr,
    },
    TryCatch {
        body: Vec<Stmt>,
        catch_binding: Expr,
        catch_body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conditional {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub otherwise: Option<ElseBranch>,
    /// Renders as `ifnot` / `elseifnot`.
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElseBranch {
    Else(Vec<Stmt>),
    ElseIf(Box<Conditional>),
}

impl Stmt {
    pub fn is_return(&self) -> bool {
        matches!(self, Stmt::Return(_))
    }
}
