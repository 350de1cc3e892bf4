/*! Literal values as target expressions.
 *
 * Scalars become inline literals. Strings, addresses, cells and slices cannot be written inline,
 * so each distinct one becomes an asm constant that pushes an embedded bag of cells. The constant
 * is named after the cell hash, which makes equal literals share one definition no matter where
 * they appear.
 */

use crate::backend::{Backend, Deps};
use crate::context::Location;
use crate::errors::{CodegenError, Result};
use crate::naming;
use cellgen_ir::builder::{bool_lit, call, int, null, tensor};
use cellgen_ir::{Expr, FuncType, FunctionSignature};
use cellgen_model::cell::{Cell, CellBuilder};
use cellgen_model::types::TypeRef;
use cellgen_model::Value;
use num_bigint::{BigInt, Sign};
use sha2::{Digest, Sha256};

pub fn write_value(
    backend: &mut Backend<'_>,
    deps: &mut Deps,
    value: &Value,
    ty: &TypeRef,
) -> Result<Expr> {
    match value {
        Value::Int(v) => Ok(int(v.clone())),
        Value::Bool(v) => Ok(bool_lit(*v)),
        Value::Null => Ok(null()),
        Value::String(text) => {
            let cell = string_cell(text)?;
            slice_constant(backend, deps, "string", &cell)
        }
        Value::Address(address) => {
            let cell = address.to_cell()?;
            slice_constant(backend, deps, "address", &cell)
        }
        Value::Slice(cell) => slice_constant(backend, deps, "slice", cell),
        Value::Cell(cell) => cell_constant(backend, deps, cell),
        Value::Struct { type_name, fields } => {
            let desc = backend.table().get(type_name)?;
            if desc.fields.is_empty() {
                return Ok(call("empty_tuple", vec![]));
            }
            let mut items = Vec::with_capacity(desc.fields.len());
            for field in &desc.fields {
                let field_value = fields
                    .get(&field.name)
                    .or(field.default.as_ref())
                    .ok_or_else(|| {
                        CodegenError::internal(format!(
                            "constant {} has no value for field {}",
                            type_name, field.name
                        ))
                    })?;
                items.push(write_value(backend, deps, field_value, &field.ty)?);
            }
            let product = tensor(items);
            if ty.is_optional() {
                Ok(call(deps.used(naming::as_optional(type_name)), vec![product]))
            } else {
                Ok(product)
            }
        }
    }
}

/// A string as the target stores it: raw UTF-8 continued through tail references.
pub fn string_cell(text: &str) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    builder.store_string_tail(text.as_bytes())?;
    Ok(builder.build()?)
}

/// Body of a text message: `uint32 0` followed by the text.
pub fn comment_cell(text: &str) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    builder.store_uint(&BigInt::from(0u8), 32)?;
    builder.store_string_tail(text.as_bytes())?;
    Ok(builder.build()?)
}

/// Value a text receiver is dispatched on: the hash of its [`comment_cell`].
pub fn comment_opcode(text: &str) -> Result<BigInt> {
    let cell = comment_cell(text)?;
    Ok(BigInt::from_bytes_be(Sign::Plus, &cell.hash()))
}

/// `sha256` of a compile-time string, as an unsigned 256-bit integer.
pub fn string_hash(text: &str) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &Sha256::digest(text.as_bytes()))
}

fn slice_constant(
    backend: &mut Backend<'_>,
    deps: &mut Deps,
    kind: &str,
    cell: &Cell,
) -> Result<Expr> {
    let name = format!("__gen_slice_{}_{}", kind, cell.hash_hex());
    embed(backend, &name, FuncType::Slice, cell, "<s PUSHSLICE")?;
    Ok(call(deps.used(name), vec![]))
}

fn cell_constant(backend: &mut Backend<'_>, deps: &mut Deps, cell: &Cell) -> Result<Expr> {
    let name = format!("__gen_cell_cell_{}", cell.hash_hex());
    embed(backend, &name, FuncType::Cell, cell, "PUSHREF")?;
    Ok(call(deps.used(name), vec![]))
}

fn embed(
    backend: &mut Backend<'_>,
    name: &str,
    ty: FuncType,
    cell: &Cell,
    push: &str,
) -> Result<()> {
    if backend.emission.has(name) {
        return Ok(());
    }
    let item = FunctionSignature::new(name)
        .returns(ty)
        .asm([format!("B{{{}}} B>boc {}", cell.to_boc_hex(), push)]);
    backend
        .emission
        .register(item, Location::Constants, Vec::<String>::new())
}
