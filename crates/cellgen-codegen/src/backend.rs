use crate::config::CodegenConfig;
use crate::context::EmissionContext;
use crate::errors::Result;
use crate::layout::Layout;
use crate::runtime;
use cellgen_model::allocation::Allocation;
use cellgen_model::types::TypeTable;
use cellgen_model::{ConstEvaluator, Program};
use std::collections::BTreeSet;

/// State of one backend run: read-only inputs plus the emission registry.
pub struct Backend<'a> {
    pub program: &'a Program,
    pub evaluator: &'a dyn ConstEvaluator,
    pub config: &'a CodegenConfig,
    pub layout: Layout<'a>,
    pub emission: EmissionContext,
}

impl<'a> Backend<'a> {
    pub fn new(
        program: &'a Program,
        evaluator: &'a dyn ConstEvaluator,
        config: &'a CodegenConfig,
    ) -> Self {
        Self {
            program,
            evaluator,
            config,
            layout: Layout::new(&program.types),
            emission: EmissionContext::new(),
        }
    }

    pub fn table(&self) -> &'a TypeTable {
        &self.program.types
    }

    pub fn allocation(&self, type_name: &str) -> Result<&'a Allocation> {
        Ok(self.program.allocations.get(type_name)?)
    }

    pub fn init_allocation(&self, contract: &str) -> Result<&'a Allocation> {
        Ok(self.program.allocations.init_args(contract)?)
    }

    /// Makes sure the runtime helper exists and records it as used.
    pub fn helper(&mut self, deps: &mut Deps, name: &str) -> Result<String> {
        runtime::ensure(self, name)?;
        Ok(deps.used(name))
    }

    pub fn into_emission(self) -> EmissionContext {
        self.emission
    }
}

/// Names a function under construction calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deps(BTreeSet<String>);

impl Deps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` and hands it back, so call sites read `call(deps.used(name), args)`.
    pub fn used(&mut self, name: impl Into<String>) -> String {
        let name = name.into();
        self.0.insert(name.clone());
        name
    }

    pub fn extend(&mut self, other: Deps) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn into_set(self) -> BTreeSet<String> {
        self.0
    }
}

impl IntoIterator for Deps {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
