use crate::errors::{CodegenError, Result};
use crate::lower::Lowerer;
use crate::naming;
use cellgen_ir::builder::{call, method};
use cellgen_ir::Expr;
use cellgen_model::ast;
use cellgen_model::types::TypeDescription;

/// `value.toCell()` and `value.toSlice()` on a struct or message.
pub fn instance(
    lowerer: &mut Lowerer<'_, '_>,
    desc: &TypeDescription,
    receiver: &ast::Expr,
    name: &str,
    args: &[ast::Expr],
) -> Result<Option<Expr>> {
    let cell = match name {
        "toCell" | "toSlice" => {
            no_args(name, args, receiver)?;
            let value = lowerer.expression(receiver)?;
            call(lowerer.deps.used(naming::writer_cell(&desc.name)), vec![value])
        }
        _ => return Ok(None),
    };
    if name == "toSlice" {
        Ok(Some(method(cell, "begin_parse", vec![])))
    } else {
        Ok(Some(cell))
    }
}

/// `Type.fromCell(c)` and `Type.fromSlice(s)`, which reject trailing data.
pub fn static_call(
    lowerer: &mut Lowerer<'_, '_>,
    desc: &TypeDescription,
    name: &str,
    args: &[ast::Expr],
    expr: &ast::Expr,
) -> Result<Option<Expr>> {
    let source = match (name, args) {
        ("fromCell", [cell]) => method(lowerer.expression(cell)?, "begin_parse", vec![]),
        ("fromSlice", [slice]) => lowerer.expression(slice)?,
        ("fromCell" | "fromSlice", _) => {
            return Err(CodegenError::internal_at(
                format!("{}.{}() takes one argument", desc.name, name),
                &expr.loc,
            ))
        }
        _ => return Ok(None),
    };
    let reader = lowerer.deps.used(naming::reader_not_mut(&desc.name));
    Ok(Some(call(reader, vec![source])))
}

fn no_args(name: &str, args: &[ast::Expr], receiver: &ast::Expr) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CodegenError::internal_at(
            format!("{}() takes no arguments", name),
            &receiver.loc,
        ))
    }
}
