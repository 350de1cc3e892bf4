/*! Typed source tree handed over by the type checker.
 *
 * Every expression node carries its resolved static type, so the backend never has to infer
 * anything; it only dispatches on `kind` and `ty`. Kinds are closed enums and every consumer
 * matches them exhaustively.
 */

use crate::types::TypeRef;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuit `&&`.
    And,
    /// Short-circuit `||`.
    Or,
}

impl BinaryOp {
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    /// `!!`, asserts the operand is not null.
    NotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AugmentedOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AugmentedOp {
    pub fn binary(self) -> BinaryOp {
        match self {
            AugmentedOp::Add => BinaryOp::Add,
            AugmentedOp::Sub => BinaryOp::Sub,
            AugmentedOp::Mul => BinaryOp::Mul,
            AugmentedOp::Div => BinaryOp::Div,
            AugmentedOp::Mod => BinaryOp::Mod,
            AugmentedOp::BitAnd => BinaryOp::BitAnd,
            AugmentedOp::BitOr => BinaryOp::BitOr,
            AugmentedOp::BitXor => BinaryOp::BitXor,
            AugmentedOp::Shl => BinaryOp::Shl,
            AugmentedOp::Shr => BinaryOp::Shr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprKind {
    Number {
        value: BigInt,
    },
    Boolean {
        value: bool,
    },
    Null,
    String {
        value: String,
    },
    Id {
        name: String,
    },
    FieldAccess {
        target: Box<Expr>,
        field: String,
    },
    StaticCall {
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// `Type.method(args)`, as in `Point.fromCell(c)`.
    StaticMethodCall {
        type_name: String,
        method: String,
        args: Vec<Expr>,
    },
    StructInstance {
        type_name: String,
        fields: Vec<FieldInit>,
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
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    InitOf {
        contract: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    pub ty: TypeRef,
    #[serde(default)]
    pub loc: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef) -> Self {
        Self {
            kind,
            ty,
            loc: SourceLocation::default(),
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = loc;
        self
    }

    pub fn number(value: impl Into<BigInt>) -> Self {
        Self::new(
            ExprKind::Number {
                value: value.into(),
            },
            TypeRef::named("Int"),
        )
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Boolean { value }, TypeRef::named("Bool"))
    }

    pub fn null() -> Self {
        Self::new(ExprKind::Null, TypeRef::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(
            ExprKind::String {
                value: value.into(),
            },
            TypeRef::named("String"),
        )
    }

    pub fn id(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(ExprKind::Id { name: name.into() }, ty)
    }

    pub fn field(target: Expr, field: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::FieldAccess {
                target: Box::new(target),
                field: field.into(),
            },
            ty,
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::StaticCall {
                name: name.into(),
                args,
            },
            ty,
        )
    }

    pub fn method(receiver: Expr, method: impl Into<String>, args: Vec<Expr>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::MethodCall {
                receiver: Box::new(receiver),
                method: method.into(),
                args,
            },
            ty,
        )
    }

    pub fn static_method(
        type_name: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Expr>,
        ty: TypeRef,
    ) -> Self {
        Self::new(
            ExprKind::StaticMethodCall {
                type_name: type_name.into(),
                method: method.into(),
                args,
            },
            ty,
        )
    }

    pub fn instance(type_name: impl Into<String>, fields: Vec<(&str, Expr)>) -> Self {
        let type_name = type_name.into();
        let fields = fields
            .into_iter()
            .map(|(name, value)| FieldInit {
                name: name.to_string(),
                value,
            })
            .collect();
        Self::new(
            ExprKind::StructInstance {
                type_name: type_name.clone(),
                fields,
            },
            TypeRef::named(type_name),
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn conditional(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        let ty = then.ty.clone();
        Self::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            ty,
        )
    }

    pub fn init_of(contract: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::InitOf {
                contract: contract.into(),
                args,
            },
            TypeRef::named("StateInit"),
        )
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Null)
    }

    /// Identifier or a chain of field accesses rooted at one.
    pub fn is_path(&self) -> bool {
        match &self.kind {
            ExprKind::Id { .. } => true,
            ExprKind::FieldAccess { target, .. } => target.is_path(),
            _ => false,
        }
    }

    /// Segments of a path expression, root first.
    pub fn path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Id { name } => Some(vec![name.as_str()]),
            ExprKind::FieldAccess { target, field } => {
                let mut segments = target.path()?;
                segments.push(field);
                Some(segments)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ElseClause {
    Block(Vec<Stmt>),
    /// `else if`, always a `Condition` statement.
    If(Box<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StmtKind {
    Let {
        name: String,
        ty: TypeRef,
        value: Expr,
    },
    Assign {
        path: Expr,
        value: Expr,
    },
    AugmentedAssign {
        path: Expr,
        op: AugmentedOp,
        value: Expr,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Expression {
        expr: Expr,
    },
    Condition {
        cond: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        otherwise: Option<ElseClause>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Until {
        body: Vec<Stmt>,
        cond: Expr,
    },
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
    },
    TryCatch {
        body: Vec<Stmt>,
        #[serde(default)]
        catch_name: Option<String>,
        #[serde(default)]
        catch_body: Vec<Stmt>,
    },
    Foreach {
        key: String,
        value: String,
        map: Expr,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(default)]
    pub loc: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            loc: SourceLocation::default(),
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = loc;
        self
    }

    pub fn let_(name: impl Into<String>, ty: TypeRef, value: Expr) -> Self {
        Self::new(StmtKind::Let {
            name: name.into(),
            ty,
            value,
        })
    }

    pub fn assign(path: Expr, value: Expr) -> Self {
        Self::new(StmtKind::Assign { path, value })
    }

    pub fn augmented(path: Expr, op: AugmentedOp, value: Expr) -> Self {
        Self::new(StmtKind::AugmentedAssign { path, op, value })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return { value })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expression { expr })
    }

    pub fn condition(cond: Expr, body: Vec<Stmt>, otherwise: Option<ElseClause>) -> Self {
        Self::new(StmtKind::Condition {
            cond,
            body,
            otherwise,
        })
    }

    pub fn foreach(key: impl Into<String>, value: impl Into<String>, map: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Foreach {
            key: key.into(),
            value: value.into(),
            map,
            body,
        })
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return { .. })
    }
}
