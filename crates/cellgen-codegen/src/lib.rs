/*! Backend from type-checked contract programs to the cell-oriented stack IR.
 *
 * The target machine has no records, no maps and no dynamic dispatch: values are stack entries,
 * persistent data is a tree of bit cells and a contract is a pair of entrypoints. Source programs
 * have all three. This crate bridges the gap by generating, per program, the codecs that move
 * structs in and out of cells, the accessors that move them between stack representations, the
 * lowered functions and receivers, and the routing glue around them.
 *
 * Generators never write target text. They register IR items with an [`EmissionContext`]
 * together with the names each item calls, and [`EmissionContext::finalize`] turns that registry
 * into a dependency-ordered module.
 */

pub mod backend;
pub mod codec;
pub mod config;
pub mod context;
pub mod contract;
pub mod errors;
pub mod exit_codes;
pub mod functions;
pub mod intrinsics;
pub mod layout;
pub mod literals;
pub mod lower;
pub mod naming;
pub mod runtime;

pub use backend::{Backend, Deps};
pub use config::CodegenConfig;
pub use context::{EmissionContext, EmissionOutput, EmittedFunction, FunctionKind, Location};
pub use errors::{CodegenError, Result};
pub use layout::Layout;

use cellgen_model::{ConstEvaluator, Program};
use indexmap::IndexMap;
use tracing::{info, instrument};

/// Compiles every contract of `program`, each into its own module.
#[instrument(skip_all, fields(types = program.types.types.len()))]
pub fn generate(
    program: &Program,
    evaluator: &dyn ConstEvaluator,
    config: &CodegenConfig,
) -> Result<IndexMap<String, EmissionOutput>> {
    let mut modules = IndexMap::new();
    for desc in program.types.contracts() {
        let output = generate_contract(program, evaluator, config, &desc.name)?;
        modules.insert(desc.name.clone(), output);
    }
    info!(contracts = modules.len(), "program compiled");
    Ok(modules)
}

/// Compiles one contract together with everything of the program it can call.
#[instrument(skip(program, evaluator, config))]
pub fn generate_contract(
    program: &Program,
    evaluator: &dyn ConstEvaluator,
    config: &CodegenConfig,
    contract: &str,
) -> Result<EmissionOutput> {
    let desc = program.types.get(contract)?;
    let mut backend = Backend::new(program, evaluator, config);
    emit_shared(&mut backend)?;
    let roots = contract::emit_contract(&mut backend, desc)?;
    let emission = backend.into_emission();
    if config.prune_unused {
        emission.finalize_reachable(roots.iter().map(String::as_str))
    } else {
        emission.finalize()
    }
}

/// Compiles the parts of `program` that do not belong to a contract: struct codecs and accessors,
/// global functions, extension methods and child-deploy support.
#[instrument(skip_all)]
pub fn generate_library(
    program: &Program,
    evaluator: &dyn ConstEvaluator,
    config: &CodegenConfig,
) -> Result<EmissionOutput> {
    let mut backend = Backend::new(program, evaluator, config);
    emit_shared(&mut backend)?;
    backend.into_emission().finalize()
}

fn emit_shared(backend: &mut Backend<'_>) -> Result<()> {
    let table = backend.table();
    for desc in table.structs() {
        codec::emit_struct_codecs(backend, desc)?;
        functions::emit_struct_accessors(backend, desc)?;
    }
    for function in table.functions.values() {
        functions::emit_function(backend, function)?;
    }
    for desc in table.types.values().filter(|desc| !desc.is_contract()) {
        for function in desc.functions.values() {
            functions::emit_function(backend, function)?;
        }
    }
    for desc in table.contracts() {
        contract::emit_child_support(backend, desc)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
