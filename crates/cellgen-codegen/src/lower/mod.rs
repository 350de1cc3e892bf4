/*! Lowering of typed source expressions and statements.
 *
 * Every source node arrives with its static type resolved, so lowering is a dispatch on the node
 * kind followed by a dispatch on the operand types. Struct values never exist as single values at
 * runtime: a local of struct type is the tensor of its field bindings, so most of the work here is
 * choosing between that unpacked form, the boxed tuple of optional structs and plain scalars.
 *
 * A [`Lowerer`] lowers one function body. It records every function the body calls in its
 * [`Deps`], which the caller hands to the emission context together with the finished function.
 */

mod expression;
mod statement;

use crate::backend::{Backend, Deps};
use crate::errors::{CodegenError, Result};
use crate::naming;
use cellgen_ir::builder::{call, id, null, tensor, var};
use cellgen_ir::{Expr, Stmt};
use cellgen_model::ast;
use cellgen_model::types::TypeRef;

/// What a body is being lowered inside of.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// Type bound to `self`, for methods, receivers and contract init.
    pub self_type: Option<TypeRef>,
    /// Returns carry the (possibly modified) `self` as their first component.
    pub mutates: bool,
    pub returns: TypeRef,
    /// Contract init: a bare `return` hands back the state built so far.
    pub init: bool,
}

impl Scope {
    pub fn function(returns: TypeRef) -> Self {
        Self {
            self_type: None,
            mutates: false,
            returns,
            init: false,
        }
    }

    pub fn method(self_type: TypeRef, mutates: bool, returns: TypeRef) -> Self {
        Self {
            self_type: Some(self_type),
            mutates,
            returns,
            init: false,
        }
    }

    pub fn init(contract: &str) -> Self {
        Self {
            init: true,
            ..Self::method(TypeRef::named(contract), false, TypeRef::Void)
        }
    }

    /// Receiver handlers: `self` is threaded out with a unit result.
    pub fn handler(contract: &str) -> Self {
        Self::method(TypeRef::named(contract), true, TypeRef::Void)
    }
}

pub struct Lowerer<'b, 'a> {
    pub(crate) backend: &'b mut Backend<'a>,
    pub(crate) scope: Scope,
    pub(crate) deps: Deps,
    temps: usize,
}

impl<'b, 'a> Lowerer<'b, 'a> {
    pub fn new(backend: &'b mut Backend<'a>, scope: Scope) -> Self {
        Self {
            backend,
            scope,
            deps: Deps::new(),
            temps: 0,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Names the body called so far.
    pub fn into_deps(self) -> Deps {
        self.deps
    }

    /// The current `self`, bound field by field.
    pub fn self_binding(&self) -> Result<Expr> {
        let ty = self
            .scope
            .self_type
            .as_ref()
            .ok_or_else(|| CodegenError::internal("self used outside of a method"))?;
        self.backend.layout.unpack(ty, &naming::self_name())
    }

    /// Fresh name no source identifier can clash with.
    pub(crate) fn temp(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.temps);
        self.temps += 1;
        name
    }

    pub(crate) fn helper(&mut self, name: &str) -> Result<String> {
        self.backend.helper(&mut self.deps, name)
    }

    /// Lowers `expr` for a slot of type `target`, boxing a plain struct where an optional one
    /// is expected.
    pub fn cast(&mut self, expr: &ast::Expr, target: &TypeRef) -> Result<Expr> {
        if expr.is_null_literal() {
            return Ok(null());
        }
        let lowered = self.expression(expr)?;
        self.cast_lowered(lowered, &expr.ty, target)
    }

    pub(crate) fn cast_lowered(
        &mut self,
        lowered: Expr,
        from: &TypeRef,
        target: &TypeRef,
    ) -> Result<Expr> {
        if !target.is_optional() || from.is_optional() || from.is_null() {
            return Ok(lowered);
        }
        match self.backend.layout.struct_of(from)? {
            Some(desc) => Ok(call(
                self.deps.used(naming::as_optional(&desc.name)),
                vec![lowered],
            )),
            None => Ok(lowered),
        }
    }

    /// Lowers a path expression as an assignment target.
    pub fn lvalue(&mut self, path: &ast::Expr) -> Result<Expr> {
        let segments = path.path().ok_or_else(|| {
            CodegenError::internal_at("assignment target is not a path", &path.loc)
        })?;
        let base = path_name(&segments);
        self.backend.layout.unpack(&path.ty, &base)
    }

    /// Lowers the arguments of a call against the callee's declared parameter types.
    pub(crate) fn arguments<'t>(
        &mut self,
        args: &[ast::Expr],
        params: impl IntoIterator<Item = &'t TypeRef>,
    ) -> Result<Vec<Expr>> {
        let params: Vec<&TypeRef> = params.into_iter().collect();
        let mut out = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let lowered = match params.get(index) {
                Some(param) => self.cast(arg, param)?,
                None => self.expression(arg)?,
            };
            out.push(lowered);
        }
        Ok(out)
    }

    /// A temp binding for `expr` when it is not already a plain name, so it is evaluated once.
    pub(crate) fn bind_once(&mut self, prefix: &str, expr: Expr, out: &mut Vec<Stmt>) -> Expr {
        if expr.as_ident().is_some() {
            return expr;
        }
        let name = self.temp(prefix);
        out.push(var(id(&name), expr));
        id(name)
    }

    /// `(self, value)` for returns of mutating bodies, `value` otherwise.
    pub(crate) fn returned(&self, value: Option<Expr>) -> Result<Expr> {
        if self.scope.init {
            return self.self_binding();
        }
        let value = value.unwrap_or_else(|| tensor(Vec::new()));
        if self.scope.mutates {
            Ok(tensor(vec![self.self_binding()?, value]))
        } else {
            Ok(value)
        }
    }
}

/// `$self'a'b` for `self.a.b`, `$x'a` for `x.a`.
pub(crate) fn path_name(segments: &[&str]) -> String {
    let mut name = match segments.first() {
        Some(&"self") => naming::self_name(),
        Some(root) => naming::local(root),
        None => String::new(),
    };
    for field in &segments[1.min(segments.len())..] {
        name = naming::tick(&name, field);
    }
    name
}
