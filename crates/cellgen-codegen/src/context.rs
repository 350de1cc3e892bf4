/*! Emission context: the registry every generator writes into.
 *
 * Functions are keyed by their emitted name and carry the names they call. Nothing is inferred
 * from bodies; generators record what they use while they build. Finalizing checks that every
 * recorded name resolves and orders the output so callees come before callers, with ties kept in
 * registration order so two runs over the same input agree byte for byte.
 */

use crate::errors::{CodegenError, Result};
use cellgen_ir::{ConstantDef, FuncType, GlobalVar, ModuleItem};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Generic,
    Asm,
    /// Supplied by the runtime library; a valid dependency that is never emitted.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "section", content = "name", rename_all = "snake_case")]
pub enum Location {
    Stdlib,
    /// Free functions declared at the top level of the program.
    Functions,
    Type(String),
    Contract(String),
    Constants,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Stdlib => write!(f, "stdlib"),
            Location::Functions => write!(f, "functions"),
            Location::Type(name) => write!(f, "type:{}", name),
            Location::Contract(name) => write!(f, "contract:{}", name),
            Location::Constants => write!(f, "constants"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedFunction {
    pub name: String,
    /// `None` only for skipped names.
    pub definition: Option<ModuleItem>,
    pub kind: FunctionKind,
    pub location: Location,
    pub depends: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct EmissionContext {
    functions: IndexMap<String, EmittedFunction>,
    constants: IndexMap<String, ConstantDef>,
    globals: IndexMap<String, GlobalVar>,
    header: Vec<ModuleItem>,
}

impl EmissionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function or asm item. Registering a name twice is an internal error.
    pub fn register<I, S>(&mut self, item: ModuleItem, location: Location, depends: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = match &item {
            ModuleItem::Function(_) | ModuleItem::Declaration(_) => FunctionKind::Generic,
            ModuleItem::Asm(_) => FunctionKind::Asm,
            other => {
                return Err(CodegenError::internal(format!(
                    "only functions can be registered, got {:?}",
                    other
                )))
            }
        };
        let name = item
            .name()
            .ok_or_else(|| CodegenError::internal("function item without a name"))?
            .to_string();
        if self.functions.contains_key(&name) {
            return Err(CodegenError::DuplicateFunction(name));
        }
        debug!(function = %name, location = %location, "registered");
        self.functions.insert(
            name.clone(),
            EmittedFunction {
                name,
                definition: Some(item),
                kind,
                location,
                depends: depends.into_iter().map(Into::into).collect(),
            },
        );
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EmittedFunction> {
        self.functions.get(name)
    }

    /// Marks `name` as supplied externally. Repeated calls are harmless.
    pub fn skip(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.functions
            .entry(name.clone())
            .or_insert_with(|| EmittedFunction {
                name,
                definition: None,
                kind: FunctionKind::Skip,
                location: Location::Stdlib,
                depends: BTreeSet::new(),
            });
    }

    pub fn constant(&mut self, ty: FuncType, name: impl Into<String>, value: cellgen_ir::Expr) {
        let name = name.into();
        self.constants
            .entry(name.clone())
            .or_insert(ConstantDef { ty, name, value });
    }

    pub fn global(&mut self, ty: FuncType, name: impl Into<String>) {
        let name = name.into();
        self.globals
            .entry(name.clone())
            .or_insert(GlobalVar { ty, name });
    }

    pub fn header(&mut self, item: ModuleItem) {
        if !self.header.contains(&item) {
            self.header.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Checks every dependency and orders all registered functions.
    pub fn finalize(self) -> Result<EmissionOutput> {
        self.check_dependencies()?;
        let order = self.sort(self.functions.keys().map(String::as_str))?;
        Ok(self.into_output(order))
    }

    /// Like [`finalize`](Self::finalize) but keeps only what `roots` can reach.
    pub fn finalize_reachable<'r>(self, roots: impl IntoIterator<Item = &'r str>) -> Result<EmissionOutput> {
        self.check_dependencies()?;
        let mut roots: Vec<&str> = roots.into_iter().collect();
        for root in &roots {
            if !self.functions.contains_key(*root) {
                return Err(CodegenError::MissingDependencies(vec![root.to_string()]));
            }
        }
        roots.sort_by_key(|name| self.functions.get_index_of(*name));
        let order = self.sort(roots.into_iter())?;
        Ok(self.into_output(order))
    }

    fn check_dependencies(&self) -> Result<()> {
        let mut missing = IndexSet::new();
        for function in self.functions.values() {
            for dep in &function.depends {
                if !self.functions.contains_key(dep) {
                    missing.insert(dep.clone());
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CodegenError::MissingDependencies(missing.into_iter().collect()))
        }
    }

    /// Depth-first post-order from each start name, dependencies visited in registration order.
    fn sort<'x>(&self, starts: impl Iterator<Item = &'x str>) -> Result<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'s>(
            ctx: &'s EmissionContext,
            name: &str,
            marks: &mut HashMap<&'s str, Mark>,
            stack: &mut Vec<&'s str>,
            out: &mut Vec<&'s str>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(name.to_string());
                    return Err(CodegenError::DependencyCycle(cycle));
                }
                None => {}
            }
            let (_, key, function) = ctx
                .functions
                .get_full(name)
                .ok_or_else(|| CodegenError::MissingDependencies(vec![name.to_string()]))?;
            let key = key.as_str();
            marks.insert(key, Mark::Visiting);
            stack.push(key);

            let mut deps: Vec<&'s str> = function
                .depends
                .iter()
                .map(String::as_str)
                .filter(|dep| *dep != key)
                .collect();
            deps.sort_by_key(|dep| ctx.functions.get_index_of(*dep));
            for dep in deps {
                visit(ctx, dep, marks, stack, out)?;
            }

            stack.pop();
            marks.insert(key, Mark::Done);
            out.push(key);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut out = Vec::new();
        for name in starts {
            visit(self, name, &mut marks, &mut stack, &mut out)?;
        }
        Ok(out.into_iter().map(str::to_string).collect())
    }

    fn into_output(self, order: Vec<String>) -> EmissionOutput {
        let mut functions = self.functions;
        let ordered: Vec<EmittedFunction> = order
            .iter()
            .filter_map(|name| functions.swap_remove(name))
            .filter(|f| f.kind != FunctionKind::Skip)
            .collect();

        info!(
            functions = ordered.len(),
            constants = self.constants.len(),
            globals = self.globals.len(),
            "emission finalized"
        );
        EmissionOutput {
            header: self.header,
            globals: self.globals.into_values().map(ModuleItem::Global).collect(),
            constants: self.constants.into_values().map(ModuleItem::Constant).collect(),
            functions: ordered,
        }
    }
}

/// Ordered result of one run, split into the sections a printer writes out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionOutput {
    pub header: Vec<ModuleItem>,
    pub globals: Vec<ModuleItem>,
    pub constants: Vec<ModuleItem>,
    pub functions: Vec<EmittedFunction>,
}

impl EmissionOutput {
    pub fn function(&self, name: &str) -> Option<&EmittedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    /// Functions grouped by location, each group in output order.
    pub fn sections(&self) -> IndexMap<&Location, Vec<&EmittedFunction>> {
        let mut sections: IndexMap<&Location, Vec<&EmittedFunction>> = IndexMap::new();
        for function in &self.functions {
            sections.entry(&function.location).or_default().push(function);
        }
        sections
    }

    /// Every item in printing order: header, globals, constants, then functions.
    pub fn items(&self) -> Vec<&ModuleItem> {
        self.header
            .iter()
            .chain(&self.globals)
            .chain(&self.constants)
            .chain(self.functions.iter().filter_map(|f| f.definition.as_ref()))
            .collect()
    }
}
