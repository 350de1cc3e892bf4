/*! Functions and per-struct accessors.
 *
 * Source functions keep their shape: a method takes `self` as its first parameter and, when it
 * mutates, returns the updated `self` next to its result so callers can rebind it with `~`.
 * Parameters arrive in their calling-convention representation and a prologue spreads struct
 * parameters into their field bindings, which is the form lowered bodies refer to.
 *
 * Struct values cross three boundaries that need conversions: into a boxed tuple when they become
 * optional, into nested tuples when they are handed to a get-method caller, and back. Those
 * conversions are plain generated functions named after the struct.
 */

use crate::backend::{Backend, Deps};
use crate::context::Location;
use crate::errors::{CodegenError, Result};
use crate::exit_codes;
use crate::layout::{Layout, LayoutMode};
use crate::lower::{Lowerer, Scope};
use crate::naming;
use crate::runtime;
use cellgen_ir::builder::*;
use cellgen_ir::{Expr, FuncType, FunctionSignature, ModuleItem, Stmt};
use cellgen_model::ast;
use cellgen_model::types::{
    FieldDescription, FunctionBody, FunctionDescription, PrimitiveKind, TypeDescription, TypeRef,
};
use tracing::debug;

/// Emitted name of a source function.
pub fn function_name(desc: &FunctionDescription) -> Result<String> {
    match &desc.self_type {
        Some(ty) => {
            let owner = ty.name().ok_or_else(|| {
                CodegenError::internal(format!("method {} is declared on {}", desc.name, ty))
            })?;
            Ok(naming::method(owner, &desc.name))
        }
        None => Ok(naming::global_function(&desc.name)),
    }
}

fn function_location(backend: &Backend<'_>, desc: &FunctionDescription) -> Result<Location> {
    let owner = match desc.self_type.as_ref().and_then(TypeRef::name) {
        Some(owner) => owner,
        None => return Ok(Location::Functions),
    };
    if backend.table().get(owner)?.is_contract() {
        Ok(Location::Contract(owner.to_string()))
    } else {
        Ok(Location::Type(owner.to_string()))
    }
}

/// Parameter prologue, lowered statements and, for bodies without a result, the trailing return.
pub(crate) fn lower_body(
    backend: &mut Backend<'_>,
    scope: Scope,
    params: &[(String, &TypeRef)],
    stmts: &[ast::Stmt],
) -> Result<(Vec<Stmt>, Deps)> {
    let layout = backend.layout;
    let mut body = Vec::new();
    for (name, ty) in params {
        if layout.is_unpacked(ty)? {
            body.push(var(layout.unpack(ty, name)?, id(name)));
        }
    }
    let void = scope.returns == TypeRef::Void;
    let mut lowerer = Lowerer::new(backend, scope);
    body.extend(lowerer.statements(stmts)?);
    if void && !stmts.last().map_or(false, ast::Stmt::is_return) {
        body.push(ret(lowerer.returned(None)?));
    }
    Ok((body, lowerer.into_deps()))
}

/// Emits a source function, plus its non-modifying wrapper when it is a mutating method.
pub fn emit_function(backend: &mut Backend<'_>, desc: &FunctionDescription) -> Result<()> {
    let stmts = match &desc.body {
        FunctionBody::Statements { stmts } => stmts,
        FunctionBody::Native { name } => {
            backend.emission.skip(name.as_str());
            return Ok(());
        }
        FunctionBody::Abstract => return Ok(()),
    };
    let name = function_name(desc)?;
    let location = function_location(backend, desc)?;
    let layout = backend.layout;

    let mut params: Vec<(String, &TypeRef)> = Vec::with_capacity(desc.params.len() + 1);
    if let Some(self_ty) = &desc.self_type {
        params.push((naming::self_name(), self_ty));
    }
    for param in &desc.params {
        params.push((naming::local(&param.name), &param.ty));
    }
    let mut signature = FunctionSignature::new(&name).impure();
    for (param, ty) in &params {
        signature = signature.param(layout.representation(ty)?, param);
    }
    let result = layout.representation(&desc.returns)?;
    let returns = match (&desc.self_type, desc.mutates) {
        (Some(self_ty), true) => FuncType::Tensor(vec![layout.representation(self_ty)?, result]),
        _ => result,
    };
    if desc.inline {
        signature = signature.inline();
    }

    let scope = match &desc.self_type {
        Some(self_ty) => Scope::method(self_ty.clone(), desc.mutates, desc.returns.clone()),
        None => Scope::function(desc.returns.clone()),
    };
    let (body, deps) = lower_body(backend, scope, &params, stmts)?;
    backend
        .emission
        .register(signature.returns(returns).define(body), location.clone(), deps)?;
    debug!(function = %name, location = %location, "function emitted");

    if desc.mutates && desc.self_type.is_some() {
        emit_not_mut(backend, desc, &name, &params, location)?;
    }
    Ok(())
}

/// `f$not_mut(self, args)`: runs `self~f(args)` on a copy and returns only the result.
fn emit_not_mut(
    backend: &mut Backend<'_>,
    desc: &FunctionDescription,
    name: &str,
    params: &[(String, &TypeRef)],
    location: Location,
) -> Result<()> {
    let layout = backend.layout;
    let mut signature = FunctionSignature::new(naming::not_mut(name)).impure();
    for (param, ty) in params {
        signature = signature.param(layout.representation(ty)?, param);
    }
    let args: Vec<Expr> = params.iter().skip(1).map(|(param, _)| id(param)).collect();
    let item = signature
        .returns(layout.representation(&desc.returns)?)
        .inline()
        .define(vec![
            var(id("res"), modify(id(naming::self_name()), name, args)),
            ret(id("res")),
        ]);
    backend.emission.register(item, location, [name])
}

/// Representation of a struct as a get-method hands it out: its fields, with nested structs as
/// tuples.
pub fn external_representation(layout: &Layout<'_>, desc: &TypeDescription) -> Result<FuncType> {
    if desc.fields.is_empty() {
        return Ok(FuncType::tuple());
    }
    let mut items = Vec::with_capacity(desc.fields.len());
    for field in &desc.fields {
        if layout.struct_of(&field.ty)?.is_some() {
            items.push(FuncType::tuple());
        } else {
            items.push(layout.representation(&field.ty)?);
        }
    }
    Ok(FuncType::Tensor(items))
}

/// A struct arriving from outside the contract, as a tuple of its external form, converted to its
/// calling-convention representation with every address field verified.
pub fn from_external_value(
    backend: &mut Backend<'_>,
    deps: &mut Deps,
    desc: &TypeDescription,
    optional: bool,
    value: Expr,
) -> Result<Expr> {
    if optional {
        return Ok(call(deps.used(naming::from_opt_external(&desc.name)), vec![value]));
    }
    let from_external = deps.used(naming::from_external(&desc.name));
    if desc.fields.is_empty() {
        return Ok(call(from_external, vec![value]));
    }
    let destroy = backend.helper(deps, &runtime::tuple_destroy(desc.fields.len()))?;
    Ok(call(from_external, vec![call(destroy, vec![value])]))
}

/// Everything generated code uses to move a struct between its representations.
pub fn emit_struct_accessors(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let mut accessors = Accessors::new(backend, desc)?;
    accessors.getters()?;
    accessors.tensor_cast()?;
    accessors.not_null()?;
    accessors.as_optional()?;
    accessors.to_tuple()?;
    accessors.to_opt_tuple()?;
    accessors.from_tuple()?;
    accessors.from_opt_tuple()?;
    accessors.to_external()?;
    accessors.to_opt_external()?;
    accessors.from_external()?;
    accessors.from_opt_external()?;
    debug!(ty = %desc.name, "accessors emitted");
    Ok(())
}

struct Accessors<'b, 'a, 'd> {
    backend: &'b mut Backend<'a>,
    desc: &'d TypeDescription,
    layout: Layout<'a>,
    /// Calling-convention representation of the struct.
    repr: FuncType,
    /// `(v'a, v'b, ...)`, or `v` when the struct is boxed.
    unpacked: Expr,
    /// Leaf bindings of `unpacked`, the entries of the optional box.
    flat: Vec<Expr>,
}

impl<'b, 'a, 'd> Accessors<'b, 'a, 'd> {
    fn new(backend: &'b mut Backend<'a>, desc: &'d TypeDescription) -> Result<Self> {
        let layout = backend.layout;
        let ty = TypeRef::named(desc.name.clone());
        Ok(Self {
            repr: layout.representation(&ty)?,
            unpacked: layout.unpack(&ty, "v")?,
            flat: layout
                .flatten_with(&ty, LayoutMode::forced_optional(false), "v")?
                .into_iter()
                .map(|(name, _)| id(name))
                .collect(),
            backend,
            desc,
            layout,
        })
    }

    fn ty(&self) -> &str {
        &self.desc.name
    }

    fn is_empty(&self) -> bool {
        self.desc.fields.is_empty()
    }

    fn register(&mut self, item: ModuleItem, deps: Deps) -> Result<()> {
        self.backend
            .emission
            .register(item, Location::Type(self.desc.name.clone()), deps)
    }

    fn field_value(&self, field: &FieldDescription) -> Result<Expr> {
        self.layout.unpack(&field.ty, &naming::tick("v", &field.name))
    }

    fn field_name(field: &FieldDescription) -> Expr {
        id(naming::tick("v", &field.name))
    }

    fn getters(&mut self) -> Result<()> {
        for field in &self.desc.fields {
            let item = FunctionSignature::new(naming::getter(self.ty(), &field.name))
                .param(self.repr.clone(), "v")
                .returns(self.layout.representation(&field.ty)?)
                .inline()
                .define(vec![
                    var(self.unpacked.clone(), id("v")),
                    ret(self.field_value(field)?),
                ]);
            self.register(item, Deps::new())?;
        }
        Ok(())
    }

    fn tensor_cast(&mut self) -> Result<()> {
        let item = FunctionSignature::new(naming::tensor_cast(self.ty()))
            .param(self.repr.clone(), "v")
            .returns(self.repr.clone())
            .asm(["NOP"]);
        self.register(item, Deps::new())
    }

    fn not_null(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let mut body = vec![throw_if(exit_codes::NULL_REFERENCE, is_null(id("v")))];
        if self.is_empty() {
            body.push(ret(id("v")));
        } else {
            let destroy = self
                .backend
                .helper(&mut deps, &runtime::tuple_destroy(self.flat.len()))?;
            body.push(var(tensor(self.flat.clone()), call(destroy, vec![id("v")])));
            body.push(ret(self.unpacked.clone()));
        }
        let item = FunctionSignature::new(naming::not_null(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(self.repr.clone())
            .inline()
            .define(body);
        self.register(item, deps)
    }

    fn as_optional(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let create = self
                .backend
                .helper(&mut deps, &runtime::tuple_create(self.flat.len()))?;
            vec![
                var(self.unpacked.clone(), id("v")),
                ret(call(create, vec![tensor(self.flat.clone())])),
            ]
        };
        let item = FunctionSignature::new(naming::as_optional(self.ty()))
            .param(self.repr.clone(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(body);
        self.register(item, deps)
    }

    /// A field on its way out: nested structs become tuples.
    fn tuple_field(&self, field: &FieldDescription, deps: &mut Deps) -> Result<Expr> {
        match self.layout.struct_of(&field.ty)? {
            Some(nested) if field.ty.is_optional() => Ok(call(
                deps.used(naming::to_opt_tuple(&nested.name)),
                vec![Self::field_name(field)],
            )),
            Some(nested) => Ok(call(
                deps.used(naming::to_tuple(&nested.name)),
                vec![self.field_value(field)?],
            )),
            None => self.field_value(field),
        }
    }

    /// A field on its way in from a tuple.
    fn untuple_field(&self, field: &FieldDescription, deps: &mut Deps) -> Result<Expr> {
        let raw = Self::field_name(field);
        match self.layout.struct_of(&field.ty)? {
            Some(nested) if field.ty.is_optional() => Ok(call(
                deps.used(naming::from_opt_tuple(&nested.name)),
                vec![raw],
            )),
            Some(nested) => Ok(call(
                deps.used(naming::from_tuple(&nested.name)),
                vec![raw],
            )),
            None => Ok(raw),
        }
    }

    fn destructured_fields(&self) -> Expr {
        tensor(self.desc.fields.iter().map(Self::field_name).collect())
    }

    fn to_tuple(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let mut items = Vec::with_capacity(self.desc.fields.len());
            for field in &self.desc.fields {
                items.push(self.tuple_field(field, &mut deps)?);
            }
            let create = self
                .backend
                .helper(&mut deps, &runtime::tuple_create(items.len()))?;
            vec![
                var(self.unpacked.clone(), id("v")),
                ret(call(create, vec![tensor(items)])),
            ]
        };
        let item = FunctionSignature::new(naming::to_tuple(self.ty()))
            .param(self.repr.clone(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(body);
        self.register(item, deps)
    }

    fn to_opt_tuple(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let to_tuple = deps.used(naming::to_tuple(self.ty()));
        let not_null = deps.used(naming::not_null(self.ty()));
        let item = FunctionSignature::new(naming::to_opt_tuple(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(vec![
                if_then(is_null(id("v")), vec![ret(null())]),
                ret(call(to_tuple, vec![call(not_null, vec![id("v")])])),
            ]);
        self.register(item, deps)
    }

    fn from_tuple(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let destroy = self
                .backend
                .helper(&mut deps, &runtime::tuple_destroy(self.desc.fields.len()))?;
            let mut items = Vec::with_capacity(self.desc.fields.len());
            for field in &self.desc.fields {
                items.push(self.untuple_field(field, &mut deps)?);
            }
            vec![
                var(self.destructured_fields(), call(destroy, vec![id("v")])),
                ret(tensor(items)),
            ]
        };
        let item = FunctionSignature::new(naming::from_tuple(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(self.repr.clone())
            .inline()
            .define(body);
        self.register(item, deps)
    }

    fn from_opt_tuple(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let from_tuple = deps.used(naming::from_tuple(self.ty()));
        let as_optional = deps.used(naming::as_optional(self.ty()));
        let item = FunctionSignature::new(naming::from_opt_tuple(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(vec![
                if_then(is_null(id("v")), vec![ret(null())]),
                ret(call(as_optional, vec![call(from_tuple, vec![id("v")])])),
            ]);
        self.register(item, deps)
    }

    fn to_external(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let mut items = Vec::with_capacity(self.desc.fields.len());
            for field in &self.desc.fields {
                items.push(self.tuple_field(field, &mut deps)?);
            }
            vec![var(self.unpacked.clone(), id("v")), ret(tensor(items))]
        };
        let item = FunctionSignature::new(naming::to_external(self.ty()))
            .param(self.repr.clone(), "v")
            .returns(external_representation(&self.layout, self.desc)?)
            .inline()
            .define(body);
        self.register(item, deps)
    }

    fn to_opt_external(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let to_opt_tuple = deps.used(naming::to_opt_tuple(self.ty()));
        let item = FunctionSignature::new(naming::to_opt_external(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(vec![ret(call(to_opt_tuple, vec![id("v")]))]);
        self.register(item, deps)
    }

    fn from_external(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let mut items = Vec::with_capacity(self.desc.fields.len());
            for field in &self.desc.fields {
                let raw = Self::field_name(field);
                let item = if let Some(nested) = self.layout.struct_of(&field.ty)? {
                    from_external_value(
                        self.backend,
                        &mut deps,
                        nested,
                        field.ty.is_optional(),
                        raw,
                    )?
                } else if self.layout.primitive_of(&field.ty)? == Some(PrimitiveKind::Address) {
                    let verify = self.backend.helper(&mut deps, runtime::VERIFY_ADDRESS)?;
                    let verified = call(verify, vec![raw.clone()]);
                    if field.ty.is_optional() {
                        ternary(is_null(raw), null(), verified)
                    } else {
                        verified
                    }
                } else {
                    raw
                };
                items.push(item);
            }
            vec![var(self.destructured_fields(), id("v")), ret(tensor(items))]
        };
        let item = FunctionSignature::new(naming::from_external(self.ty()))
            .param(external_representation(&self.layout, self.desc)?, "v")
            .returns(self.repr.clone())
            .inline()
            .define(body);
        self.register(item, deps)
    }

    fn from_opt_external(&mut self) -> Result<()> {
        let mut deps = Deps::new();
        let body = if self.is_empty() {
            vec![ret(id("v"))]
        } else {
            let destroy = self
                .backend
                .helper(&mut deps, &runtime::tuple_destroy(self.desc.fields.len()))?;
            let from_external = deps.used(naming::from_external(self.ty()));
            let as_optional = deps.used(naming::as_optional(self.ty()));
            vec![
                if_then(is_null(id("v")), vec![ret(null())]),
                ret(call(
                    as_optional,
                    vec![call(from_external, vec![call(destroy, vec![id("v")])])],
                )),
            ]
        };
        let item = FunctionSignature::new(naming::from_opt_external(self.ty()))
            .param(FuncType::tuple(), "v")
            .returns(FuncType::tuple())
            .inline()
            .define(body);
        self.register(item, deps)
    }
}
