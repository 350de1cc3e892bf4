use super::fixtures::{self, int};
use super::vm::{Fault, Val, Vm};
use crate::config::CodegenConfig;
use crate::errors::CodegenError;
use crate::{exit_codes, generate_library, naming, runtime, EmissionOutput};
use cellgen_ir::builder::id;
use cellgen_ir::{Expr as Ir, ModuleItem, Stmt as IrStmt};
use cellgen_model::ast::{AugmentedOp, BinaryOp, Expr, Stmt, StmtKind, UnaryOp};
use cellgen_model::types::{FunctionDescription, TypeRef, TypeTable};
use cellgen_model::LiteralEvaluator;
use pretty_assertions::assert_eq;

fn pair() -> TypeRef {
    TypeRef::named("Pair")
}

fn pair_literal(a: Expr) -> Expr {
    Expr::instance("Pair", vec![("a", a), ("b", Expr::null())])
}

/// `mutates fun bump(self: Pair): Int { self.a = self.a + 1; return self.a; }`
fn with_bump(mut table: TypeTable) -> TypeTable {
    let this = Expr::id("self", pair());
    let a = Expr::field(this, "a", int());
    let bump = FunctionDescription::new(
        "bump",
        int(),
        vec![
            Stmt::assign(
                a.clone(),
                Expr::binary(BinaryOp::Add, a.clone(), Expr::number(1), int()),
            ),
            Stmt::ret(Some(a)),
        ],
    )
    .with_self(pair())
    .mutating();
    if let Some(desc) = table.types.get_mut("Pair") {
        desc.functions.insert(bump.name.clone(), bump);
    }
    table
}

fn library_of(functions: Vec<FunctionDescription>) -> EmissionOutput {
    let mut table = with_bump(fixtures::pair_table());
    for function in functions {
        table.add_function(function);
    }
    fixtures::library(table)
}

fn body<'o>(output: &'o EmissionOutput, name: &str) -> &'o [IrStmt] {
    match output.function(name).and_then(|f| f.definition.as_ref()) {
        Some(ModuleItem::Function(def)) => &def.body,
        other => panic!("{} is not a defined function: {:?}", name, other),
    }
}

fn callees(expr: &Ir, out: &mut Vec<String>) {
    match expr {
        Ir::Call { callee, args } => {
            out.push(callee.clone());
            args.iter().for_each(|arg| callees(arg, out));
        }
        Ir::MethodCall {
            receiver,
            method,
            args,
            ..
        } => {
            out.push(method.clone());
            callees(receiver, out);
            args.iter().for_each(|arg| callees(arg, out));
        }
        Ir::Assign { lhs, rhs } | Ir::AugmentedAssign { lhs, rhs, .. } | Ir::Binary { lhs, rhs, .. } => {
            callees(lhs, out);
            callees(rhs, out);
        }
        Ir::Ternary {
            cond,
            then,
            otherwise,
        } => {
            callees(cond, out);
            callees(then, out);
            callees(otherwise, out);
        }
        Ir::Unary { operand, .. } => callees(operand, out),
        Ir::Tensor(items) | Ir::Tuple(items) => items.iter().for_each(|item| callees(item, out)),
        Ir::Int(_) | Ir::Bool(_) | Ir::Ident(_) | Ir::Hole => {}
    }
}

/// Every name a function body calls, in source order.
fn called(stmts: &[IrStmt]) -> Vec<String> {
    let mut out = Vec::new();
    for stmt in stmts {
        match stmt {
            IrStmt::Return(Some(expr)) | IrStmt::Expr(expr) => callees(expr, &mut out),
            IrStmt::VarDef { init: Some(expr), .. } => callees(expr, &mut out),
            IrStmt::Block(inner) => out.extend(called(inner)),
            IrStmt::While { cond, body } | IrStmt::Until { body, cond } => {
                callees(cond, &mut out);
                out.extend(called(body));
            }
            IrStmt::TryCatch {
                body, catch_body, ..
            } => {
                out.extend(called(body));
                out.extend(called(catch_body));
            }
            _ => {}
        }
    }
    out
}

#[test]
fn test_mutating_method_on_temporary_uses_wrapper() {
    let bumped = FunctionDescription::new(
        "bumped",
        int(),
        vec![Stmt::ret(Some(Expr::method(
            pair_literal(Expr::number(1)),
            "bump",
            vec![],
            int(),
        )))],
    );
    let output = library_of(vec![bumped]);

    let bump = naming::method("Pair", "bump");
    let calls = called(body(&output, &naming::global_function("bumped")));
    // The literal receiver is folded, its null field included.
    assert_eq!(calls, vec![naming::not_mut(&bump), "null".to_string()]);

    let mut vm = Vm::new(&output);
    assert_eq!(
        vm.call(&naming::global_function("bumped"), vec![]).unwrap(),
        Val::int(2)
    );
}

#[test]
fn test_mutating_method_on_local_writes_back() {
    // let p: Pair = Pair { a: 5, b: null }; let r: Int = p.bump(); return r + p.a;
    let p = Expr::id("p", pair());
    let function = FunctionDescription::new(
        "bump_local",
        int(),
        vec![
            Stmt::let_("p", pair(), pair_literal(Expr::number(5))),
            Stmt::let_("r", int(), Expr::method(p.clone(), "bump", vec![], int())),
            Stmt::ret(Some(Expr::binary(
                BinaryOp::Add,
                Expr::id("r", int()),
                Expr::field(p, "a", int()),
                int(),
            ))),
        ],
    );
    let output = library_of(vec![function]);
    let name = naming::global_function("bump_local");

    match &body(&output, &name)[1] {
        IrStmt::VarDef {
            init: Some(Ir::MethodCall {
                receiver,
                method,
                modifying,
                ..
            }),
            ..
        } => {
            assert!(*modifying);
            assert_eq!(method, &naming::method("Pair", "bump"));
            assert_eq!(**receiver, Ir::Tensor(vec![id("$p'a"), id("$p'b")]));
        }
        other => panic!("unexpected lowering {:?}", other),
    }

    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&name, vec![]).unwrap(), Val::int(12));
}

#[test]
fn test_field_of_temporary_goes_through_getter() {
    let function = FunctionDescription::new(
        "first",
        int(),
        vec![Stmt::ret(Some(Expr::field(
            pair_literal(Expr::id("x", int())),
            "a",
            int(),
        )))],
    )
    .with_param("x", int());
    let output = library_of(vec![function]);
    let name = naming::global_function("first");

    assert_eq!(called(body(&output, &name)), vec![naming::getter("Pair", "a"), "null".to_string()]);
    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&name, vec![Val::int(9)]).unwrap(), Val::int(9));
}

#[test]
fn test_non_null_assertion_on_optional_struct() {
    // fun unwrap(p: Pair?): Int { return p!!.a; }
    let unwrapped = Expr::unary(UnaryOp::NotNull, Expr::id("p", TypeRef::optional("Pair")), pair());
    let function = FunctionDescription::new(
        "unwrap",
        int(),
        vec![Stmt::ret(Some(Expr::field(unwrapped, "a", int())))],
    )
    .with_param("p", TypeRef::optional("Pair"));
    let output = library_of(vec![function]);
    let name = naming::global_function("unwrap");

    assert_eq!(
        called(body(&output, &name)),
        vec![naming::getter("Pair", "a"), naming::not_null("Pair")]
    );
    let mut vm = Vm::new(&output);
    assert_eq!(
        vm.call(&name, vec![Val::Tuple(vec![Val::int(3), Val::Null])])
            .unwrap(),
        Val::int(3)
    );
    assert_eq!(
        vm.call(&name, vec![Val::Null]),
        Err(Fault::Exit(exit_codes::NULL_REFERENCE))
    );
}

#[test]
fn test_non_null_assertion_on_scalar_uses_runtime_helper() {
    let function = FunctionDescription::new(
        "force",
        int(),
        vec![Stmt::ret(Some(Expr::unary(
            UnaryOp::NotNull,
            Expr::id("x", TypeRef::optional("Int")),
            int(),
        )))],
    )
    .with_param("x", TypeRef::optional("Int"));
    let output = library_of(vec![function]);
    let name = naming::global_function("force");

    assert_eq!(called(body(&output, &name)), vec![runtime::NOT_NULL.to_string()]);
    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&name, vec![Val::int(4)]).unwrap(), Val::int(4));
    assert_eq!(
        vm.call(&name, vec![Val::Null]),
        Err(Fault::Exit(exit_codes::NULL_REFERENCE))
    );
}

#[test]
fn test_try_catch_binds_exit_code() {
    // try { return a / b; } catch (e) { return -e; }
    let try_catch = Stmt::new(StmtKind::TryCatch {
        body: vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::Div,
            Expr::id("a", int()),
            Expr::id("b", int()),
            int(),
        )))],
        catch_name: Some("e".into()),
        catch_body: vec![Stmt::ret(Some(Expr::unary(
            UnaryOp::Neg,
            Expr::id("e", int()),
            int(),
        )))],
    });
    let function = FunctionDescription::new("safe_div", int(), vec![try_catch])
        .with_param("a", int())
        .with_param("b", int());
    let output = library_of(vec![function]);
    let name = naming::global_function("safe_div");

    match &body(&output, &name)[0] {
        IrStmt::TryCatch { catch_binding, .. } => {
            assert_eq!(*catch_binding, Ir::Tensor(vec![Ir::Hole, id("$e")]));
        }
        other => panic!("unexpected lowering {:?}", other),
    }

    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&name, vec![Val::int(7), Val::int(2)]).unwrap(), Val::int(3));
    assert_eq!(vm.call(&name, vec![Val::int(-7), Val::int(2)]).unwrap(), Val::int(-4));
    assert_eq!(vm.call(&name, vec![Val::int(7), Val::int(0)]).unwrap(), Val::int(-4));
}

#[test]
fn test_loops_and_augmented_assignment() {
    // let s: Int = 0; repeat (n) { s += 3; } while (s > 10) { s -= 4; } return s;
    let s = Expr::id("s", int());
    let function = FunctionDescription::new(
        "loops",
        int(),
        vec![
            Stmt::let_("s", int(), Expr::number(0)),
            Stmt::new(StmtKind::Repeat {
                count: Expr::id("n", int()),
                body: vec![Stmt::augmented(s.clone(), AugmentedOp::Add, Expr::number(3))],
            }),
            Stmt::new(StmtKind::While {
                cond: Expr::binary(BinaryOp::Gt, s.clone(), Expr::number(10), TypeRef::named("Bool")),
                body: vec![Stmt::augmented(s.clone(), AugmentedOp::Sub, Expr::number(4))],
            }),
            Stmt::ret(Some(s)),
        ],
    )
    .with_param("n", int());
    let output = library_of(vec![function]);
    let mut vm = Vm::new(&output);
    let name = naming::global_function("loops");

    assert_eq!(vm.call(&name, vec![Val::int(2)]).unwrap(), Val::int(6));
    assert_eq!(vm.call(&name, vec![Val::int(5)]).unwrap(), Val::int(7));
}

#[test]
fn test_require_uses_message_derived_code() {
    let function = FunctionDescription::new(
        "check",
        TypeRef::Void,
        vec![Stmt::expr(Expr::call(
            "require",
            vec![
                Expr::binary(
                    BinaryOp::Gt,
                    Expr::id("x", int()),
                    Expr::number(0),
                    TypeRef::named("Bool"),
                ),
                Expr::string("positive"),
            ],
            TypeRef::Void,
        ))],
    )
    .with_param("x", int());
    let output = library_of(vec![function]);
    let name = naming::global_function("check");

    // Bodies without a result still end in an explicit return.
    assert!(matches!(body(&output, &name).last(), Some(IrStmt::Return(_))));

    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&name, vec![Val::int(1)]).unwrap(), Val::unit());
    assert_eq!(
        vm.call(&name, vec![Val::int(0)]),
        Err(Fault::Exit(exit_codes::require_exit_code("positive")))
    );
}

#[test]
fn test_nullable_equality_picks_helper() {
    // fun same(a: Int?, b: Int): Bool { return a == b; }
    let function = FunctionDescription::new(
        "same",
        TypeRef::named("Bool"),
        vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::Eq,
            Expr::id("a", TypeRef::optional("Int")),
            Expr::id("b", int()),
            TypeRef::named("Bool"),
        )))],
    )
    .with_param("a", TypeRef::optional("Int"))
    .with_param("b", int());
    // fun differs(a: Int, b: Int?): Bool { return a != b; }
    let differs = FunctionDescription::new(
        "differs",
        TypeRef::named("Bool"),
        vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::Ne,
            Expr::id("a", int()),
            Expr::id("b", TypeRef::optional("Int")),
            TypeRef::named("Bool"),
        )))],
    )
    .with_param("a", int())
    .with_param("b", TypeRef::optional("Int"));
    let output = library_of(vec![function, differs]);
    let same = naming::global_function("same");
    let differs = naming::global_function("differs");

    assert_eq!(
        called(body(&output, &same)),
        vec![runtime::INT_EQ_NULLABLE_ONE.to_string()]
    );
    // The nullable operand always goes first.
    match &body(&output, &differs)[0] {
        IrStmt::Return(Some(Ir::Unary { operand, .. })) => match &**operand {
            Ir::Call { callee, args } => {
                assert_eq!(callee, runtime::INT_EQ_NULLABLE_ONE);
                assert_eq!(args, &vec![id("$b"), id("$a")]);
            }
            other => panic!("unexpected comparison {:?}", other),
        },
        other => panic!("unexpected lowering {:?}", other),
    }

    let mut vm = Vm::new(&output);
    assert_eq!(vm.call(&same, vec![Val::int(1), Val::int(1)]).unwrap(), Val::bool(true));
    assert_eq!(vm.call(&same, vec![Val::Null, Val::int(1)]).unwrap(), Val::bool(false));
    assert_eq!(vm.call(&differs, vec![Val::int(1), Val::Null]).unwrap(), Val::bool(true));
    assert_eq!(vm.call(&differs, vec![Val::int(2), Val::int(2)]).unwrap(), Val::bool(false));
}

#[test]
fn test_short_circuit_operators_become_conditionals() {
    let bool_ty = TypeRef::named("Bool");
    let function = FunctionDescription::new(
        "both",
        bool_ty.clone(),
        vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::And,
            Expr::id("x", bool_ty.clone()),
            Expr::binary(
                BinaryOp::Eq,
                Expr::binary(BinaryOp::Div, Expr::number(10), Expr::id("y", int()), int()),
                Expr::number(5),
                bool_ty.clone(),
            ),
            bool_ty.clone(),
        )))],
    )
    .with_param("x", bool_ty)
    .with_param("y", int());
    let output = library_of(vec![function]);
    let name = naming::global_function("both");

    assert!(matches!(
        &body(&output, &name)[0],
        IrStmt::Return(Some(Ir::Ternary { .. }))
    ));
    let mut vm = Vm::new(&output);
    // The right operand is never evaluated, so the division by zero does not happen.
    assert_eq!(vm.call(&name, vec![Val::bool(false), Val::int(0)]).unwrap(), Val::bool(false));
    assert_eq!(vm.call(&name, vec![Val::bool(true), Val::int(2)]).unwrap(), Val::bool(true));
}

fn small_map() -> TypeRef {
    TypeRef::Map {
        key: "Int".into(),
        key_as: Some("uint8".into()),
        value: "Int".into(),
        value_as: Some("uint32".into()),
    }
}

#[test]
fn test_map_methods_lower_to_runtime_primitives() {
    let m = Expr::id("m", small_map());
    let get = FunctionDescription::new(
        "lookup",
        TypeRef::optional("Int"),
        vec![Stmt::ret(Some(Expr::method(
            m.clone(),
            "get",
            vec![Expr::id("k", int())],
            TypeRef::optional("Int"),
        )))],
    )
    .with_param("m", small_map())
    .with_param("k", int());
    let set = FunctionDescription::new(
        "put",
        small_map(),
        vec![
            Stmt::expr(Expr::method(
                m.clone(),
                "set",
                vec![Expr::id("k", int()), Expr::number(7)],
                TypeRef::Void,
            )),
            Stmt::ret(Some(m)),
        ],
    )
    .with_param("m", small_map())
    .with_param("k", int());
    let output = library_of(vec![get, set]);

    match &body(&output, &naming::global_function("lookup"))[0] {
        IrStmt::Return(Some(Ir::Call { callee, args })) => {
            assert_eq!(callee, "__tact_dict_get_uint_uint");
            assert_eq!(
                args,
                &vec![id("$m"), Ir::Int(8.into()), id("$k"), Ir::Int(32.into())]
            );
        }
        other => panic!("unexpected lowering {:?}", other),
    }
    match &body(&output, &naming::global_function("put"))[0] {
        IrStmt::Expr(Ir::MethodCall {
            receiver,
            method,
            modifying,
            ..
        }) => {
            assert!(*modifying);
            assert_eq!(method, "__tact_dict_set_uint_uint");
            assert_eq!(**receiver, id("$m"));
        }
        other => panic!("unexpected lowering {:?}", other),
    }

    // Runtime primitives are satisfied without being emitted.
    assert!(output.function("__tact_dict_get_uint_uint").is_none());
    assert!(output.function("__tact_dict_set_uint_uint").is_none());
}

#[test]
fn test_struct_map_values_go_through_cells() {
    let ty = TypeRef::map("Int", "Pair");
    let function = FunctionDescription::new(
        "pair_at",
        TypeRef::optional("Pair"),
        vec![Stmt::ret(Some(Expr::method(
            Expr::id("m", ty.clone()),
            "get",
            vec![Expr::number(1)],
            TypeRef::optional("Pair"),
        )))],
    )
    .with_param("m", ty);
    let output = library_of(vec![function]);

    assert_eq!(
        called(body(&output, &naming::global_function("pair_at"))),
        vec![naming::reader_cell_opt("Pair"), "__tact_dict_get_int_cell".to_string()]
    );
}

#[test]
fn test_foreach_walks_min_then_next() {
    // let s: Int = 0; foreach (k, v in m) { s += v; } return s;
    let s = Expr::id("s", int());
    let function = FunctionDescription::new(
        "total",
        int(),
        vec![
            Stmt::let_("s", int(), Expr::number(0)),
            Stmt::foreach(
                "k",
                "v",
                Expr::id("m", small_map()),
                vec![Stmt::augmented(s.clone(), AugmentedOp::Add, Expr::id("v", int()))],
            ),
            Stmt::ret(Some(s)),
        ],
    )
    .with_param("m", small_map());
    let output = library_of(vec![function]);
    let stmts = body(&output, &naming::global_function("total"));

    match &stmts[1] {
        IrStmt::VarDef {
            binding,
            init: Some(Ir::Call { callee, .. }),
            ..
        } => {
            assert_eq!(callee, "__tact_dict_min_uint_uint");
            assert_eq!(*binding, Ir::Tensor(vec![id("$k"), id("$v"), id("fc_0")]));
        }
        other => panic!("unexpected lowering {:?}", other),
    }
    match &stmts[2] {
        IrStmt::While { cond, body } => {
            assert_eq!(*cond, id("fc_0"));
            assert_eq!(
                called(&body[body.len() - 1..]),
                vec!["__tact_dict_next_uint_uint".to_string()]
            );
        }
        other => panic!("unexpected lowering {:?}", other),
    }
}

#[test]
fn test_method_on_optional_receiver_is_rejected() {
    let function = FunctionDescription::new(
        "bad",
        int(),
        vec![Stmt::ret(Some(Expr::method(
            Expr::id("p", TypeRef::optional("Pair")),
            "bump",
            vec![],
            int(),
        )))],
    )
    .with_param("p", TypeRef::optional("Pair"));
    let mut table = with_bump(fixtures::pair_table());
    table.add_function(function);
    let program = fixtures::program(table);
    let evaluator = LiteralEvaluator::new(&program.types);

    match generate_library(&program, &evaluator, &CodegenConfig::default()) {
        Err(CodegenError::Compilation { message, .. }) => {
            assert!(message.contains("null"), "{}", message);
        }
        other => panic!("expected a compilation error, got {:?}", other.map(|o| o.names().len())),
    }
}

#[test]
fn test_constants_fold_to_literals() {
    let mut table = with_bump(fixtures::pair_table());
    table.add_constant("LIMIT", int(), cellgen_model::Value::int(40));
    table.add_function(FunctionDescription::new(
        "limit",
        int(),
        vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::Add,
            Expr::id("LIMIT", int()),
            Expr::number(2),
            int(),
        )))],
    ));
    let output = fixtures::library(table);
    assert_eq!(
        body(&output, &naming::global_function("limit")),
        &[IrStmt::Return(Some(Ir::Int(42.into())))]
    );
}
