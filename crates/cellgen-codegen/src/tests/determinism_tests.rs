use super::fixtures;
use crate::config::CodegenConfig;
use crate::{generate, EmissionOutput};
use cellgen_model::types::TypeTable;
use cellgen_model::LiteralEvaluator;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn merged() -> TypeTable {
    let mut table = fixtures::counter_table();
    for extra in [fixtures::vault_table(), fixtures::pair_table()] {
        for (name, desc) in extra.types {
            table.types.entry(name).or_insert(desc);
        }
    }
    table
}

fn compile(config: &CodegenConfig) -> IndexMap<String, EmissionOutput> {
    let program = fixtures::program(merged());
    let evaluator = LiteralEvaluator::new(&program.types);
    generate(&program, &evaluator, config).unwrap()
}

#[test]
fn test_repeated_runs_are_identical() {
    for config in [CodegenConfig::default(), CodegenConfig::default().pruned()] {
        let first = compile(&config);
        let second = compile(&config);
        assert_eq!(first, second);

        let first = serde_json::to_vec(&first).unwrap();
        let second = serde_json::to_vec(&second).unwrap();
        assert!(first == second, "serialized modules differ");
    }
}

#[test]
fn test_every_name_is_emitted_once() {
    for (contract, module) in compile(&CodegenConfig::default()) {
        let mut names = module.names();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate function in {}", contract);
    }
}

#[test]
fn test_callees_precede_callers() {
    for (contract, module) in compile(&CodegenConfig::default()) {
        let position: IndexMap<&str, usize> = module
            .names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name, index))
            .collect();
        for function in &module.functions {
            for dep in &function.depends {
                // Skipped runtime primitives and self-recursion have no position to compare.
                if let Some(&at) = position.get(dep.as_str()) {
                    if dep != &function.name {
                        assert!(
                            at < position[function.name.as_str()],
                            "{}: {} is emitted after its caller {}",
                            contract,
                            dep,
                            function.name
                        );
                    }
                }
            }
        }
    }
}
