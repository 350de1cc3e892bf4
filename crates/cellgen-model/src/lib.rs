/*! Input model for the cellgen backend.
 *
 * The backend sits after parsing and type checking. Everything those stages hand over lives here:
 * the resolved type table, the typed source tree, per-type storage allocation plans and the
 * compile-time values the constant evaluator produces. The bit-exact cell model is here as well,
 * because literal constants, comment pseudo-opcodes and tests all need real cells.
 */

pub mod allocation;
pub mod allocator;
pub mod ast;
pub mod cell;
pub mod eval;
pub mod types;
pub mod value;

pub use allocation::{
    Allocation, AllocationCell, AllocationOperation, Allocations, Format, Header, OpKind,
};
pub use ast::{Expr, ExprKind, SourceLocation, Stmt, StmtKind};
pub use cell::{Cell, CellBuilder, CellError, CellSlice};
pub use eval::{ConstEvaluator, LiteralEvaluator, NoConstants};
pub use types::{
    FieldDescription, FunctionBody, FunctionDescription, MessageSelector, PrimitiveKind,
    ReceiverDescription, ReceiverSelector, TypeDescription, TypeKind, TypeRef, TypeTable,
};
pub use value::{Address, Value};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("No allocation plan for {0}")]
    MissingAllocation(String),

    #[error("Invalid allocation for {type_name}: {reason}")]
    InvalidAllocation { type_name: String, reason: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Cell(#[from] CellError),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Everything the backend compiles in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub types: TypeTable,
    #[serde(default)]
    pub allocations: Allocations,
}

impl Program {
    pub fn new(types: TypeTable, allocations: Allocations) -> Self {
        Self { types, allocations }
    }

    /// Program whose allocation plans come from the reference planner.
    pub fn planned(types: TypeTable) -> Result<Self> {
        let allocations = allocator::plan_program(&types)?;
        Ok(Self { types, allocations })
    }

    /// Fills in plans for every type that arrived without one, leaving supplied plans untouched.
    pub fn complete_allocations(&mut self) -> Result<()> {
        let planned = allocator::plan_program(&self.types)?;
        for (name, allocation) in planned.types {
            self.allocations.types.entry(name).or_insert(allocation);
        }
        for (name, allocation) in planned.init_args {
            self.allocations.init_args.entry(name).or_insert(allocation);
        }
        self.allocations.validate()
    }
}
