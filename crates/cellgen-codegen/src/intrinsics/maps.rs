/*! Map methods.
 *
 * Maps are dictionary cells, and the runtime library provides one primitive per combination of key
 * and value encoding: `__tact_dict_get_uint_cell`, `__tact_dict_set_int_int` and so on. Choosing
 * the primitive is therefore a question of how the key and value are serialized, which is what
 * [`MapKinds`] answers.
 */

use crate::errors::{CodegenError, Result};
use crate::layout::Layout;
use crate::lower::Lowerer;
use crate::naming;
use cellgen_ir::builder::{call, int, is_null, modify, not};
use cellgen_ir::Expr;
use cellgen_model::allocation::OpKind;
use cellgen_model::allocator::int_kind;
use cellgen_model::ast::{self, SourceLocation};
use cellgen_model::types::{PrimitiveKind, TypeRef};
use tracing::trace;

const ADDRESS_KEY_BITS: u16 = 267;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Int { bits: u16, signed: bool },
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Int { bits: u16, signed: bool },
    Bool,
    Cell,
    Address,
    /// Stored as the cell its writer produces.
    Struct(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapKinds {
    pub key: KeyKind,
    pub value: ValueKind,
}

impl MapKinds {
    pub fn of(layout: &Layout<'_>, ty: &TypeRef, loc: &SourceLocation) -> Result<Self> {
        let (key, key_as, value, value_as) = match ty {
            TypeRef::Map {
                key,
                key_as,
                value,
                value_as,
            } => (key, key_as.as_deref(), value, value_as.as_deref()),
            other => {
                return Err(CodegenError::internal_at(
                    format!("expected a map, got {}", other),
                    loc,
                ))
            }
        };
        let unsupported =
            |what: String| CodegenError::compilation(format!("unsupported map {}", what), loc);

        let key_desc = layout.table().get(key)?;
        let key = match key_desc.primitive_kind() {
            Some(PrimitiveKind::Int) => match int_kind(key_as) {
                Some(OpKind::Int { bits }) => KeyKind::Int { bits, signed: true },
                Some(OpKind::Uint { bits }) => KeyKind::Int {
                    bits,
                    signed: false,
                },
                _ => return Err(unsupported(format!("key format {:?}", key_as))),
            },
            Some(PrimitiveKind::Address) => KeyKind::Address,
            _ => return Err(unsupported(format!("key type {}", key))),
        };

        let value_desc = layout.table().get(value)?;
        let value = match value_desc.primitive_kind() {
            Some(PrimitiveKind::Int) => match int_kind(value_as) {
                Some(OpKind::Int { bits }) => ValueKind::Int { bits, signed: true },
                Some(OpKind::Uint { bits }) => ValueKind::Int {
                    bits,
                    signed: false,
                },
                _ => return Err(unsupported(format!("value format {:?}", value_as))),
            },
            Some(PrimitiveKind::Bool) => ValueKind::Bool,
            Some(PrimitiveKind::Cell) => ValueKind::Cell,
            Some(PrimitiveKind::Address) => ValueKind::Address,
            Some(_) => return Err(unsupported(format!("value type {}", value))),
            None => ValueKind::Struct(value_desc.name.clone()),
        };
        Ok(Self { key, value })
    }

    fn key_prefix(&self) -> &'static str {
        match self.key {
            KeyKind::Int { signed: true, .. } => "int",
            KeyKind::Int { signed: false, .. } => "uint",
            KeyKind::Address => "slice",
        }
    }

    pub fn key_bits(&self) -> u16 {
        match self.key {
            KeyKind::Int { bits, .. } => bits,
            KeyKind::Address => ADDRESS_KEY_BITS,
        }
    }

    fn value_prefix(&self) -> &'static str {
        match self.value {
            ValueKind::Int { signed: true, .. } | ValueKind::Bool => "int",
            ValueKind::Int { signed: false, .. } => "uint",
            ValueKind::Cell | ValueKind::Struct(_) => "cell",
            ValueKind::Address => "slice",
        }
    }

    /// Width argument for integer values, which the primitives take last.
    pub fn value_bits(&self) -> Option<u16> {
        match self.value {
            ValueKind::Int { bits, .. } => Some(bits),
            ValueKind::Bool => Some(1),
            _ => None,
        }
    }

    /// `__tact_dict_{op}_{key}_{value}`.
    pub fn primitive(&self, op: &str) -> String {
        format!(
            "__tact_dict_{}_{}_{}",
            op,
            self.key_prefix(),
            self.value_prefix()
        )
    }

    /// `__tact_dict_{op}_{key}`, for primitives that never touch the value.
    pub fn key_primitive(&self, op: &str) -> String {
        format!("__tact_dict_{}_{}", op, self.key_prefix())
    }

    pub fn with_value_bits(&self, mut args: Vec<Expr>) -> Vec<Expr> {
        if let Some(bits) = self.value_bits() {
            args.push(int(bits));
        }
        args
    }
}

/// Lowers `map.method(args)`. Unknown methods are reported at the call site.
pub fn lower(
    lowerer: &mut Lowerer<'_, '_>,
    receiver: &ast::Expr,
    name: &str,
    args: &[ast::Expr],
    expr: &ast::Expr,
) -> Result<Expr> {
    let kinds = MapKinds::of(&lowerer.backend.layout, &receiver.ty, &receiver.loc)?;
    let key_bits = int(kinds.key_bits());
    trace!(method = name, kinds = ?kinds, "map intrinsic");

    let lowered = match (name, args) {
        ("get", [key]) => {
            let map = lowerer.expression(receiver)?;
            let key = lowerer.expression(key)?;
            let primitive = lowerer.deps.used(kinds.primitive("get"));
            lowerer.backend.emission.skip(primitive.as_str());
            let raw = call(primitive, kinds.with_value_bits(vec![map, key_bits, key]));
            match &kinds.value {
                ValueKind::Struct(type_name) => {
                    call(lowerer.deps.used(naming::reader_cell_opt(type_name)), vec![raw])
                }
                _ => raw,
            }
        }
        ("exists", [key]) => {
            let map = lowerer.expression(receiver)?;
            let key = lowerer.expression(key)?;
            let primitive = lowerer.deps.used(kinds.primitive("get"));
            lowerer.backend.emission.skip(primitive.as_str());
            not(is_null(call(
                primitive,
                kinds.with_value_bits(vec![map, key_bits, key]),
            )))
        }
        ("set" | "replace", [key, value]) => {
            let map = mutable_receiver(lowerer, receiver, name)?;
            let key = lowerer.expression(key)?;
            let value = map_value(lowerer, &kinds, value)?;
            let primitive = lowerer.deps.used(kinds.primitive(name));
            lowerer.backend.emission.skip(primitive.as_str());
            modify(map, primitive, kinds.with_value_bits(vec![key_bits, key, value]))
        }
        ("del", [key]) => {
            let map = mutable_receiver(lowerer, receiver, name)?;
            let key = lowerer.expression(key)?;
            let primitive = lowerer.deps.used(kinds.key_primitive("delete"));
            lowerer.backend.emission.skip(primitive.as_str());
            modify(map, primitive, vec![key_bits, key])
        }
        ("isEmpty", []) => is_null(lowerer.expression(receiver)?),
        ("asCell", []) => lowerer.expression(receiver)?,
        ("get" | "exists" | "set" | "replace" | "del" | "isEmpty" | "asCell", _) => {
            return Err(CodegenError::internal_at(
                format!("wrong number of arguments for map method {}", name),
                &expr.loc,
            ))
        }
        _ => {
            return Err(CodegenError::compilation(
                format!("unknown map method {}", name),
                &expr.loc,
            ))
        }
    };
    Ok(lowered)
}

/// Methods that rewrite the dictionary root need a binding to write it back to.
fn mutable_receiver(
    lowerer: &mut Lowerer<'_, '_>,
    receiver: &ast::Expr,
    name: &str,
) -> Result<Expr> {
    if !receiver.is_path() {
        return Err(CodegenError::compilation(
            format!("map method {} needs a variable or field as receiver", name),
            &receiver.loc,
        ));
    }
    lowerer.lvalue(receiver)
}

fn map_value(lowerer: &mut Lowerer<'_, '_>, kinds: &MapKinds, value: &ast::Expr) -> Result<Expr> {
    let type_name = match &kinds.value {
        ValueKind::Struct(type_name) => type_name,
        _ => return lowerer.expression(value),
    };
    if value.is_null_literal() {
        return lowerer.expression(value);
    }
    let lowered = lowerer.expression(value)?;
    let writer = if value.ty.is_optional() {
        naming::writer_cell_opt(type_name)
    } else {
        naming::writer_cell(type_name)
    };
    Ok(call(lowerer.deps.used(writer), vec![lowered]))
}
