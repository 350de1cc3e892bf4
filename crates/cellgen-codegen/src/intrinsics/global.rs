use crate::errors::{CodegenError, Result};
use crate::exit_codes;
use crate::literals;
use crate::lower::Lowerer;
use crate::runtime;
use cellgen_ir::builder::{call, int, method, null};
use cellgen_ir::Expr;
use cellgen_model::ast::{self, ExprKind};
use cellgen_model::types::PrimitiveKind;
use cellgen_model::{Address, Value};
use tracing::trace;

/// Lowers a free-standing intrinsic call, or returns `None` when `name` is not one.
pub fn lower(
    lowerer: &mut Lowerer<'_, '_>,
    name: &str,
    args: &[ast::Expr],
    expr: &ast::Expr,
) -> Result<Option<Expr>> {
    let lowered = match name {
        "require" => {
            expect_args(name, args, 2, expr)?;
            let message = constant_string(lowerer, &args[1]).ok_or_else(|| {
                CodegenError::compilation(
                    "require() expects a constant string message",
                    &args[1].loc,
                )
            })?;
            let cond = lowerer.expression(&args[0])?;
            call(
                "throw_unless",
                vec![int(exit_codes::require_exit_code(&message)), cond],
            )
        }
        "throw" => {
            expect_args(name, args, 1, expr)?;
            let code = lowerer.expression(&args[0])?;
            call("throw", vec![code])
        }
        "throwIf" | "throwUnless" => {
            expect_args(name, args, 2, expr)?;
            let code = lowerer.expression(&args[0])?;
            let cond = lowerer.expression(&args[1])?;
            let primitive = if name == "throwIf" {
                "throw_if"
            } else {
                "throw_unless"
            };
            call(primitive, vec![code, cond])
        }
        "emptyMap" => null(),
        "emptyCell" => method(call("begin_cell", vec![]), "end_cell", vec![]),
        "emptySlice" => method(
            method(call("begin_cell", vec![]), "end_cell", vec![]),
            "begin_parse",
            vec![],
        ),
        "beginCell" => call("begin_cell", vec![]),
        "sender" => {
            let getter = lowerer.helper(runtime::CONTEXT_GET_SENDER)?;
            call(getter, vec![])
        }
        "myAddress" => call("my_address", vec![]),
        "now" => call("now", vec![]),
        "min" | "max" => {
            expect_args(name, args, 2, expr)?;
            let a = lowerer.expression(&args[0])?;
            let b = lowerer.expression(&args[1])?;
            call(name, vec![a, b])
        }
        "abs" => {
            expect_args(name, args, 1, expr)?;
            let a = lowerer.expression(&args[0])?;
            call("abs", vec![a])
        }
        "sha256" => {
            expect_args(name, args, 1, expr)?;
            if let Some(text) = constant_string(lowerer, &args[0]) {
                int(literals::string_hash(&text))
            } else {
                let hasher = match lowerer.backend.layout.primitive_of(&args[0].ty)? {
                    Some(PrimitiveKind::String) => "string_hash",
                    Some(PrimitiveKind::Slice) => "slice_hash",
                    _ => {
                        return Err(CodegenError::compilation(
                            format!("sha256() cannot hash {}", args[0].ty),
                            &args[0].loc,
                        ))
                    }
                };
                let value = lowerer.expression(&args[0])?;
                call(hasher, vec![value])
            }
        }
        "address" => {
            expect_args(name, args, 1, expr)?;
            let raw = constant_string(lowerer, &args[0]).ok_or_else(|| {
                CodegenError::compilation("address() expects a constant string", &args[0].loc)
            })?;
            let address: Address = raw
                .parse()
                .map_err(|e| CodegenError::compilation(format!("{}", e), &args[0].loc))?;
            lowerer.literal(&Value::Address(address), &expr.ty)?
        }
        _ => return Ok(None),
    };
    trace!(intrinsic = name, "global intrinsic");
    Ok(Some(lowered))
}

fn constant_string(lowerer: &Lowerer<'_, '_>, expr: &ast::Expr) -> Option<String> {
    if let ExprKind::String { value } = &expr.kind {
        return Some(value.clone());
    }
    match lowerer.backend.evaluator.evaluate(expr)? {
        Value::String(text) => Some(text),
        _ => None,
    }
}

fn expect_args(name: &str, args: &[ast::Expr], count: usize, expr: &ast::Expr) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(CodegenError::internal_at(
            format!("{}() takes {} arguments, got {}", name, count, args.len()),
            &expr.loc,
        ))
    }
}
