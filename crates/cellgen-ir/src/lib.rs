/*! Target IR for the cell-oriented stack language.
 *
 * The backend never formats target source text and re-parses it. Every construct it emits is built
 * from these node types, so later stages (and tests) can inspect generated code structurally and a
 * printer only has to walk a closed set of variants.
 */

pub mod builder;
pub mod expr;
pub mod module;
pub mod stmt;
pub mod types;

pub use expr::{AugmentedOp, BinaryOp, Expr, UnaryOp};
pub use module::{
    AsmFunction, ConstantDef, FunctionAttribute, FunctionDeclaration, FunctionDefinition,
    FunctionSignature, GlobalVar, ModuleItem, Param,
};
pub use stmt::{Conditional, ElseBranch, Stmt};
pub use types::FuncType;

#[cfg(test)]
mod tests;
