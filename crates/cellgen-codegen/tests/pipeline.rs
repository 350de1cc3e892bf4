use cellgen_codegen::{generate, generate_library, naming, CodegenConfig, CodegenError, Location};
use cellgen_model::allocation::Allocations;
use cellgen_model::ast::{BinaryOp, Expr, Stmt};
use cellgen_model::types::{
    FieldDescription, FunctionDescription, MessageSelector, ReceiverDescription, TypeDescription,
    TypeRef, TypeTable,
};
use cellgen_model::{LiteralEvaluator, NoConstants, Program, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn int() -> TypeRef {
    TypeRef::named("Int")
}

fn wallet() -> TypeTable {
    let mut table = TypeTable::with_primitives();
    table.add_type(TypeDescription::message(
        "Deposit",
        0x7362_d09c,
        vec![FieldDescription::new("amount", 0, int()).with_format("coins")],
    ));
    let mut wallet = TypeDescription::contract(
        "Wallet",
        vec![FieldDescription::new("balance", 0, int())
            .with_format("coins")
            .with_default(Value::int(0))],
    );
    let this = Expr::id("self", TypeRef::named("Wallet"));
    let balance = Expr::field(this, "balance", int());
    let amount = Expr::field(
        Expr::id("msg", TypeRef::named("Deposit")),
        "amount",
        int(),
    );
    wallet.receivers.push(ReceiverDescription::internal(
        MessageSelector::Binary {
            type_name: "Deposit".into(),
        },
        Some("msg"),
        vec![Stmt::assign(
            balance.clone(),
            Expr::binary(BinaryOp::Add, balance.clone(), amount, int()),
        )],
    ));
    let getter = FunctionDescription::new("balance", int(), vec![Stmt::ret(Some(balance))])
        .with_self(TypeRef::named("Wallet"))
        .getter(None);
    wallet.functions.insert(getter.name.clone(), getter);
    table.add_type(wallet);
    table
}

#[test]
fn test_program_survives_json_transport() {
    let program = Program::planned(wallet()).unwrap();
    let text = serde_json::to_string(&program).unwrap();
    let restored: Program = serde_json::from_str(&text).unwrap();
    assert_eq!(restored, program);

    let config = CodegenConfig::default();
    let direct = generate(&program, &LiteralEvaluator::new(&program.types), &config).unwrap();
    let transported =
        generate(&restored, &LiteralEvaluator::new(&restored.types), &config).unwrap();
    assert_eq!(direct, transported);

    let module = &direct["Wallet"];
    for name in [
        naming::RECV_INTERNAL.to_string(),
        naming::router_internal("Wallet"),
        naming::getter_method("balance"),
        naming::reader("Deposit"),
    ] {
        assert!(module.function(&name).is_some(), "missing {}", name);
    }
    assert!(module.function(naming::RECV_EXTERNAL).is_none());
}

#[test]
fn test_missing_plans_are_completed() {
    let mut program = Program::new(wallet(), Allocations::default());
    program.complete_allocations().unwrap();
    let modules = generate(&program, &NoConstants, &CodegenConfig::default()).unwrap();
    assert_eq!(modules.keys().collect::<Vec<_>>(), vec!["Wallet"]);
}

#[test]
fn test_handwritten_struct_library() {
    let mut table = TypeTable::with_primitives();
    let point: TypeDescription = serde_json::from_value(json!({
        "name": "Point",
        "kind": "struct",
        "partial_field_count": 2,
        "fields": [
            { "name": "x", "index": 0, "ty": { "kind": "ref", "name": "Int" }, "as": "int16" },
            { "name": "y", "index": 1, "ty": { "kind": "ref", "name": "Int" }, "as": "int16" }
        ]
    }))
    .unwrap();
    table.add_type(point);
    let program = Program::planned(table).unwrap();

    let output = generate_library(&program, &NoConstants, &CodegenConfig::default()).unwrap();
    let sections = output.sections();
    let point = &sections[&Location::Type("Point".into())];
    let names: Vec<&str> = point.iter().map(|f| f.name.as_str()).collect();
    for expected in [
        naming::writer("Point"),
        naming::reader("Point"),
        naming::getter("Point", "x"),
        naming::to_external("Point"),
    ] {
        assert!(names.contains(&expected.as_str()), "missing {}", expected);
    }
}

#[test]
fn test_unknown_contract_type_in_receiver_is_reported() {
    let mut table = wallet();
    if let Some(wallet) = table.types.get_mut("Wallet") {
        wallet.receivers.push(ReceiverDescription::internal(
            MessageSelector::Binary {
                type_name: "Withdraw".into(),
            },
            Some("msg"),
            vec![],
        ));
    }
    let program = Program::planned(table).unwrap();
    let result = generate(&program, &NoConstants, &CodegenConfig::default());
    assert!(matches!(result, Err(CodegenError::UnknownType(name)) if name == "Withdraw"));
}
