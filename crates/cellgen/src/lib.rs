/*! Unified interface for the contract backend.
 *
 * One import for the whole pipeline: the program model handed over by the type checker, the
 * generator that lowers it, and the target IR it produces.
 */

pub use cellgen_codegen as codegen;
pub use cellgen_ir as ir;
pub use cellgen_model as model;

pub use cellgen_ir::{Expr, FuncType, ModuleItem, Stmt};

pub use cellgen_model::{
    Address, Cell, ConstEvaluator, LiteralEvaluator, NoConstants, Program, TypeTable, Value,
};

pub use cellgen_codegen::{
    generate, generate_contract, generate_library, CodegenConfig, CodegenError, EmissionOutput,
    EmittedFunction, Location,
};
