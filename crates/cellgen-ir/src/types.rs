use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuncType {
    Int,
    Cell,
    Slice,
    Builder,
    Cont,
    /// `tuple` when empty, `[a, b]` otherwise.
    Tuple(Vec<FuncType>),
    /// `()` when empty, `(a, b)` otherwise.
    Tensor(Vec<FuncType>),
    Hole,
    Var(String),
}

impl FuncType {
    pub fn unit() -> Self {
        FuncType::Tensor(Vec::new())
    }

    pub fn tuple() -> Self {
        FuncType::Tuple(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, FuncType::Tensor(items) if items.is_empty())
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, FuncType::Tensor(_))
    }

    /// Number of stack entries a value of this type occupies.
    pub fn stack_width(&self) -> usize {
        match self {
            FuncType::Tensor(items) => items.iter().map(FuncType::stack_width).sum(),
            _ => 1,
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncType::Int => write!(f, "int"),
            FuncType::Cell => write!(f, "cell"),
            FuncType::Slice => write!(f, "slice"),
            FuncType::Builder => write!(f, "builder"),
            FuncType::Cont => write!(f, "cont"),
            FuncType::Tuple(items) if items.is_empty() => write!(f, "tuple"),
            FuncType::Tuple(items) => write!(f, "[{}]", join(items)),
            FuncType::Tensor(items) => write!(f, "({})", join(items)),
            FuncType::Hole => write!(f, "_"),
            FuncType::Var(name) => write!(f, "{}", name),
        }
    }
}

fn join(items: &[FuncType]) -> String {
    items
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
