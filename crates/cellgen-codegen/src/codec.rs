/*! Storage codecs.
 *
 * A value is persisted by walking its allocation plan: every operation stores one field into the
 * current builder, and a continuation cell is filled in its own builder and attached as the last
 * reference of its parent. The reader walks the same plan over slices, so the two functions are
 * inverse by construction as long as each operation kind has a matching store and load primitive,
 * which is what `store_op` and `load_op` pair up.
 *
 * Codecs work on a [`Shape`] rather than a type description so that records without a declared
 * type, such as the arguments a contract keeps until its init runs, share the same generator.
 */

use crate::backend::{Backend, Deps};
use crate::context::Location;
use crate::errors::{CodegenError, Result};
use crate::exit_codes;
use crate::layout::Layout;
use crate::naming;
use crate::runtime;
use cellgen_ir::builder::*;
use cellgen_ir::{Expr, FuncType, FunctionSignature, Stmt};
use cellgen_model::allocation::{
    Allocation, AllocationCell, AllocationOperation, Format, OpKind,
};
use cellgen_model::types::{TypeDescription, TypeRef};
use tracing::debug;

/// A record with a storage plan: the unit codecs are generated for.
#[derive(Debug, Clone)]
pub struct Shape<'a> {
    /// Name the codec functions are derived from.
    pub name: String,
    pub fields: Vec<(&'a str, &'a TypeRef)>,
    /// Fields that survive a bounce, counted from the first.
    pub partial: usize,
    pub allocation: &'a Allocation,
    pub location: Location,
}

impl<'a> Shape<'a> {
    pub fn of_type(backend: &Backend<'a>, desc: &'a TypeDescription) -> Result<Self> {
        let location = if desc.is_contract() {
            Location::Contract(desc.name.clone())
        } else {
            Location::Type(desc.name.clone())
        };
        Ok(Self {
            name: desc.name.clone(),
            fields: desc.fields.iter().map(|f| (f.name.as_str(), &f.ty)).collect(),
            partial: desc.partial_field_count.min(desc.fields.len()),
            allocation: backend.allocation(&desc.name)?,
            location,
        })
    }

    /// The arguments of a contract's init, persisted until the first message runs it.
    pub fn init_args(backend: &Backend<'a>, contract: &'a TypeDescription) -> Result<Self> {
        let params = contract
            .init
            .as_ref()
            .map(|init| init.params.as_slice())
            .unwrap_or_default();
        Ok(Self {
            name: naming::init_args(&contract.name),
            fields: params.iter().map(|p| (p.name.as_str(), &p.ty)).collect(),
            partial: params.len(),
            allocation: backend.init_allocation(&contract.name)?,
            location: Location::Contract(contract.name.clone()),
        })
    }

    fn field_type(&self, name: &str) -> Result<&'a TypeRef> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| {
                CodegenError::internal(format!(
                    "allocation of {} names unknown field {}",
                    self.name, name
                ))
            })
    }

    fn representation(&self, layout: &Layout<'_>, bounced: bool) -> Result<FuncType> {
        layout.fields_representation(&self.visible(bounced))
    }

    fn unpack(&self, layout: &Layout<'_>, bounced: bool) -> Result<Expr> {
        layout.fields_unpack(&self.visible(bounced), "v")
    }

    fn visible(&self, bounced: bool) -> Vec<(&'a str, &'a TypeRef)> {
        if bounced {
            self.fields[..self.partial].to_vec()
        } else {
            self.fields.clone()
        }
    }

    fn is_boxed(&self, bounced: bool) -> bool {
        self.visible(bounced).is_empty()
    }
}

/// Emits every codec a struct or message needs.
pub fn emit_struct_codecs(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let shape = Shape::of_type(backend, desc)?;
    emit_writer(backend, &shape, false)?;
    emit_reader(backend, &shape, false)?;
    if desc.header.is_some() {
        emit_bounced_reader(backend, &shape, false)?;
    }
    emit_optional_wrappers(backend, &shape)?;
    debug!(ty = %desc.name, ops = shape.allocation.op_count(), "codecs emitted");
    Ok(())
}

fn is_inline(backend: &Backend<'_>, shape: &Shape<'_>, force_inline: bool) -> bool {
    force_inline || shape.allocation.op_count() <= backend.config.small_struct_fields
}

fn with_inline(signature: FunctionSignature, inline: bool) -> FunctionSignature {
    if inline {
        signature.inline()
    } else {
        signature
    }
}

/// `$S$_store` and `$S$_store_cell`, which always travel together.
pub fn emit_writer(backend: &mut Backend<'_>, shape: &Shape<'_>, force_inline: bool) -> Result<()> {
    let inline = is_inline(backend, shape, force_inline);
    let layout = backend.layout;
    let repr = shape.representation(&layout, false)?;
    let mut deps = Deps::new();

    let mut body = Vec::new();
    if !shape.is_boxed(false) {
        body.push(var(shape.unpack(&layout, false)?, id("v")));
    }
    if let Some(header) = shape.allocation.header {
        body.push(assign_stmt(
            id("build_0"),
            method(
                id("build_0"),
                "store_uint",
                vec![int(header.value), int(header.bits)],
            ),
        ));
    }
    let mut writer = CellWriter {
        backend: &mut *backend,
        shape,
        deps: &mut deps,
    };
    body.extend(writer.write_cell(&shape.allocation.root, 0)?);
    body.push(ret(id("build_0")));

    let name = naming::writer(&shape.name);
    let item = with_inline(
        FunctionSignature::new(&name)
            .param(FuncType::Builder, "build_0")
            .param(repr.clone(), "v")
            .returns(FuncType::Builder),
        inline,
    )
    .define(body);
    backend.emission.register(item, shape.location.clone(), deps)?;

    let cell_name = naming::writer_cell(&shape.name);
    let item = with_inline(
        FunctionSignature::new(&cell_name)
            .param(repr, "v")
            .returns(FuncType::Cell),
        inline,
    )
    .define(vec![ret(method(
        call(&name, vec![call("begin_cell", vec![]), id("v")]),
        "end_cell",
        vec![],
    ))]);
    backend.emission.register(item, shape.location.clone(), [name])
}

struct CellWriter<'b, 'a, 's> {
    backend: &'b mut Backend<'a>,
    shape: &'s Shape<'s>,
    deps: &'b mut Deps,
}

impl CellWriter<'_, '_, '_> {
    fn write_cell(&mut self, cell: &AllocationCell, generation: usize) -> Result<Vec<Stmt>> {
        let builder = format!("build_{}", generation);
        let mut out = Vec::new();
        for op in &cell.ops {
            let ty = self.shape.field_type(&op.name)?;
            let value = self.backend.layout.unpack(ty, &naming::tick("v", &op.name))?;
            let stored = self.store_field(id(&builder), op, value)?;
            out.push(assign_stmt(id(&builder), stored));
        }
        if let Some(next) = &cell.next {
            let child = format!("build_{}", generation + 1);
            out.push(var(id(&child), call("begin_cell", vec![])));
            out.extend(self.write_cell(next, generation + 1)?);
            out.push(assign_stmt(
                id(&builder),
                method(
                    id(&builder),
                    "store_ref",
                    vec![method(id(&child), "end_cell", vec![])],
                ),
            ));
        }
        Ok(out)
    }

    fn store_field(&mut self, b: Expr, op: &AllocationOperation, value: Expr) -> Result<Expr> {
        if !op.optional {
            return self.store_op(b, &op.kind, value);
        }
        if let OpKind::Struct {
            type_name,
            by_ref: false,
        } = &op.kind
        {
            let name = self.deps.used(naming::writer_opt(type_name));
            return Ok(call(name, vec![b, value]));
        }

        let present = match &op.kind {
            OpKind::Struct { type_name, .. } => {
                call(self.deps.used(naming::not_null(type_name)), vec![value.clone()])
            }
            _ => value.clone(),
        };
        let flagged = method(b.clone(), "store_int", vec![bool_lit(true), int(1)]);
        Ok(ternary(
            not(is_null(value)),
            self.store_op(flagged, &op.kind, present)?,
            method(b, "store_int", vec![bool_lit(false), int(1)]),
        ))
    }

    fn store_op(&mut self, b: Expr, kind: &OpKind, x: Expr) -> Result<Expr> {
        let boxed_slice = |x: Expr| {
            method(
                method(call("begin_cell", vec![]), "store_slice", vec![x]),
                "end_cell",
                vec![],
            )
        };
        Ok(match kind {
            OpKind::Int { bits } => method(b, "store_int", vec![x, int(*bits)]),
            OpKind::Uint { bits } => method(b, "store_uint", vec![x, int(*bits)]),
            OpKind::Coins => method(b, "store_coins", vec![x]),
            OpKind::Boolean => method(b, "store_int", vec![x, int(1)]),
            OpKind::Address => {
                let name = self.backend.helper(self.deps, runtime::STORE_ADDRESS)?;
                call(name, vec![b, x])
            }
            OpKind::Cell { format } => match format {
                Format::Default => method(b, "store_ref", vec![x]),
                Format::Remainder => {
                    method(b, "store_slice", vec![method(x, "begin_parse", vec![])])
                }
            },
            OpKind::Slice { format } => match format {
                Format::Default => method(b, "store_ref", vec![boxed_slice(x)]),
                Format::Remainder => method(b, "store_slice", vec![x]),
            },
            OpKind::Builder { format } => match format {
                Format::Default => method(b, "store_ref", vec![method(x, "end_cell", vec![])]),
                Format::Remainder => method(b, "store_builder", vec![x]),
            },
            OpKind::String => method(b, "store_ref", vec![boxed_slice(x)]),
            OpKind::FixedBytes { .. } => method(b, "store_slice", vec![x]),
            OpKind::Map => method(b, "store_dict", vec![x]),
            OpKind::Struct {
                type_name,
                by_ref: false,
            } => call(self.deps.used(naming::writer(type_name)), vec![b, x]),
            OpKind::Struct {
                type_name,
                by_ref: true,
            } => {
                let cell = call(self.deps.used(naming::writer_cell(type_name)), vec![x]);
                method(b, "store_ref", vec![cell])
            }
        })
    }
}

/// `$S$_load` and `$S$_load_not_mut`.
pub fn emit_reader(backend: &mut Backend<'_>, shape: &Shape<'_>, force_inline: bool) -> Result<()> {
    let inline = is_inline(backend, shape, force_inline);
    let name = naming::reader(&shape.name);
    emit_reader_as(backend, shape, &name, false, inline)?;

    let repr = shape.representation(&backend.layout, false)?;
    let not_mut = naming::reader_not_mut(&shape.name);
    let item = with_inline(
        FunctionSignature::new(&not_mut)
            .param(FuncType::Slice, "sc_0")
            .returns(repr),
        inline,
    )
    .define(vec![
        var(id("v"), modify(id("sc_0"), &name, vec![])),
        expr_stmt(method(id("sc_0"), "end_parse", vec![])),
        ret(id("v")),
    ]);
    backend.emission.register(item, shape.location.clone(), [name])
}

/// `$S$_load_bounced`: the reader cut at the fields a bounced body still carries.
pub fn emit_bounced_reader(
    backend: &mut Backend<'_>,
    shape: &Shape<'_>,
    force_inline: bool,
) -> Result<()> {
    let inline = is_inline(backend, shape, force_inline);
    let name = naming::reader_bounced(&shape.name);
    emit_reader_as(backend, shape, &name, true, inline)
}

fn emit_reader_as(
    backend: &mut Backend<'_>,
    shape: &Shape<'_>,
    name: &str,
    bounced: bool,
    inline: bool,
) -> Result<()> {
    let layout = backend.layout;
    let repr = shape.representation(&layout, bounced)?;
    let mut deps = Deps::new();

    let mut body = Vec::new();
    if let Some(header) = shape.allocation.header {
        body.push(throw_unless(
            exit_codes::INVALID_PREFIX,
            eq(
                modify(id("sc_0"), "load_uint", vec![int(header.bits)]),
                int(header.value),
            ),
        ));
    }
    let limit = if bounced {
        shape.partial
    } else {
        shape.allocation.op_count()
    };
    let mut reader = CellReader {
        backend: &mut *backend,
        shape,
        deps: &mut deps,
        remaining: limit,
    };
    body.extend(reader.read_cell(&shape.allocation.root, 0)?);

    let value = if shape.is_boxed(bounced) {
        call("empty_tuple", vec![])
    } else {
        shape.unpack(&layout, bounced)?
    };
    body.push(ret(tensor(vec![id("sc_0"), value])));

    let item = with_inline(
        FunctionSignature::new(name)
            .param(FuncType::Slice, "sc_0")
            .returns(FuncType::Tensor(vec![FuncType::Slice, repr])),
        inline,
    )
    .define(body);
    backend.emission.register(item, shape.location.clone(), deps)
}

struct CellReader<'b, 'a, 's> {
    backend: &'b mut Backend<'a>,
    shape: &'s Shape<'s>,
    deps: &'b mut Deps,
    /// Operations still to decode; zero stops the walk.
    remaining: usize,
}

impl CellReader<'_, '_, '_> {
    fn read_cell(&mut self, cell: &AllocationCell, generation: usize) -> Result<Vec<Stmt>> {
        let sc = format!("sc_{}", generation);
        let mut out = Vec::new();
        for op in &cell.ops {
            if self.remaining == 0 {
                return Ok(out);
            }
            self.remaining -= 1;
            let ty = self.shape.field_type(&op.name)?;
            let target = self.backend.layout.unpack(ty, &naming::tick("v", &op.name))?;
            out.extend(self.load_field(&sc, op, target)?);
        }
        if let Some(next) = &cell.next {
            if self.remaining == 0 {
                return Ok(out);
            }
            let child = format!("sc_{}", generation + 1);
            out.push(var(
                id(&child),
                method(modify(id(&sc), "load_ref", vec![]), "begin_parse", vec![]),
            ));
            out.extend(self.read_cell(next, generation + 1)?);
        }
        Ok(out)
    }

    fn load_field(
        &mut self,
        sc: &str,
        op: &AllocationOperation,
        target: Expr,
    ) -> Result<Vec<Stmt>> {
        if op.kind.is_remainder() {
            return self.load_remainder(sc, &op.kind, target);
        }
        let value = if !op.optional {
            self.load_op(sc, &op.kind)?
        } else if let OpKind::Struct {
            type_name,
            by_ref: false,
        } = &op.kind
        {
            modify(id(sc), self.deps.used(naming::reader_opt(type_name)), vec![])
        } else {
            let loaded = self.load_op(sc, &op.kind)?;
            let loaded = match &op.kind {
                OpKind::Struct { type_name, .. } => {
                    call(self.deps.used(naming::as_optional(type_name)), vec![loaded])
                }
                _ => loaded,
            };
            ternary(
                modify(id(sc), "load_int", vec![int(1)]),
                loaded,
                null(),
            )
        };
        Ok(vec![var(target, value)])
    }

    fn load_remainder(&mut self, sc: &str, kind: &OpKind, target: Expr) -> Result<Vec<Stmt>> {
        let value = match kind {
            OpKind::Cell { .. } => method(
                method(call("begin_cell", vec![]), "store_slice", vec![id(sc)]),
                "end_cell",
                vec![],
            ),
            OpKind::Slice { .. } => id(sc),
            OpKind::Builder { .. } => {
                method(call("begin_cell", vec![]), "store_slice", vec![id(sc)])
            }
            other => {
                return Err(CodegenError::internal(format!(
                    "{:?} cannot use the remainder format",
                    other
                )))
            }
        };
        let empty = self.backend.helper(self.deps, runtime::EMPTY_SLICE)?;
        Ok(vec![
            var(target, value),
            assign_stmt(id(sc), call(empty, vec![])),
        ])
    }

    fn load_op(&mut self, sc: &str, kind: &OpKind) -> Result<Expr> {
        let sc = id(sc);
        let referenced = |sc: Expr| method(modify(sc, "load_ref", vec![]), "begin_parse", vec![]);
        Ok(match kind {
            OpKind::Int { bits } => modify(sc, "load_int", vec![int(*bits)]),
            OpKind::Uint { bits } => modify(sc, "load_uint", vec![int(*bits)]),
            OpKind::Coins => modify(sc, "load_coins", vec![]),
            OpKind::Boolean => modify(sc, "load_int", vec![int(1)]),
            OpKind::Address => {
                let name = self.backend.helper(self.deps, runtime::LOAD_ADDRESS)?;
                modify(sc, name, vec![])
            }
            OpKind::Cell { .. } => modify(sc, "load_ref", vec![]),
            OpKind::Slice { .. } | OpKind::String => referenced(sc),
            OpKind::Builder { .. } => method(
                call("begin_cell", vec![]),
                "store_slice",
                vec![referenced(sc)],
            ),
            OpKind::FixedBytes { bytes } => {
                modify(sc, "load_bits", vec![int(u32::from(*bytes) * 8)])
            }
            OpKind::Map => modify(sc, "load_dict", vec![]),
            OpKind::Struct {
                type_name,
                by_ref: false,
            } => modify(sc, self.deps.used(naming::reader(type_name)), vec![]),
            OpKind::Struct {
                type_name,
                by_ref: true,
            } => call(
                self.deps.used(naming::reader_not_mut(type_name)),
                vec![referenced(sc)],
            ),
        })
    }
}

/// `_store_opt`, `_store_cell_opt`, `_load_opt` and `_load_cell_opt` over the boxed form.
pub fn emit_optional_wrappers(backend: &mut Backend<'_>, shape: &Shape<'_>) -> Result<()> {
    let ty = &shape.name;
    let writer = naming::writer(ty);
    let writer_cell = naming::writer_cell(ty);
    let reader = naming::reader(ty);
    let reader_not_mut = naming::reader_not_mut(ty);
    let not_null = naming::not_null(ty);
    let as_optional = naming::as_optional(ty);
    let location = shape.location.clone();

    let item = FunctionSignature::new(naming::writer_opt(ty))
        .param(FuncType::Builder, "b")
        .param(FuncType::tuple(), "v")
        .returns(FuncType::Builder)
        .inline()
        .define(vec![
            if_then(
                is_null(id("v")),
                vec![ret(method(id("b"), "store_int", vec![bool_lit(false), int(1)]))],
            ),
            assign_stmt(
                id("b"),
                method(id("b"), "store_int", vec![bool_lit(true), int(1)]),
            ),
            ret(call(&writer, vec![id("b"), call(&not_null, vec![id("v")])])),
        ]);
    backend
        .emission
        .register(item, location.clone(), [writer.clone(), not_null.clone()])?;

    let item = FunctionSignature::new(naming::writer_cell_opt(ty))
        .param(FuncType::tuple(), "v")
        .returns(FuncType::Cell)
        .inline()
        .define(vec![
            if_then(is_null(id("v")), vec![ret(null())]),
            ret(call(&writer_cell, vec![call(&not_null, vec![id("v")])])),
        ]);
    backend
        .emission
        .register(item, location.clone(), [writer_cell, not_null])?;

    let item = FunctionSignature::new(naming::reader_opt(ty))
        .param(FuncType::Slice, "sc")
        .returns(FuncType::Tensor(vec![FuncType::Slice, FuncType::tuple()]))
        .inline()
        .define(vec![if_else(
            modify(id("sc"), "load_int", vec![int(1)]),
            vec![
                var(id("v"), modify(id("sc"), &reader, vec![])),
                ret(tensor(vec![id("sc"), call(&as_optional, vec![id("v")])])),
            ],
            vec![ret(tensor(vec![id("sc"), null()]))],
        )]);
    backend
        .emission
        .register(item, location.clone(), [reader, as_optional.clone()])?;

    let item = FunctionSignature::new(naming::reader_cell_opt(ty))
        .param(FuncType::Cell, "cl")
        .returns(FuncType::tuple())
        .inline()
        .define(vec![
            if_then(is_null(id("cl")), vec![ret(null())]),
            var(id("sc"), method(id("cl"), "begin_parse", vec![])),
            ret(call(
                &as_optional,
                vec![call(&reader_not_mut, vec![id("sc")])],
            )),
        ]);
    backend
        .emission
        .register(item, location, [reader_not_mut, as_optional])
}
