use super::{path_name, Lowerer};
use crate::errors::{CodegenError, Result};
use crate::intrinsics::{global, maps, structs};
use crate::literals;
use crate::naming;
use crate::runtime;
use cellgen_ir::builder::{
    binary, bool_lit, call, id, int, is_null, modify, not, null, ternary, unary,
};
use cellgen_ir::{BinaryOp, Expr, UnaryOp};
use cellgen_model::ast::{self, ExprKind, FieldInit, SourceLocation};
use cellgen_model::types::{
    FunctionBody, FunctionDescription, PrimitiveKind, TypeDescription, TypeRef,
};
use cellgen_model::Value;
use tracing::trace;

/// Operand class of `==` and `!=`, which picks the comparison primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compared {
    Int,
    Address,
    Cell,
    Slice,
    Map,
}

impl Lowerer<'_, '_> {
    pub fn expression(&mut self, expr: &ast::Expr) -> Result<Expr> {
        if let Some(value) = self.backend.evaluator.evaluate(expr) {
            trace!(ty = %expr.ty, "folded constant");
            return self.literal(&value, &expr.ty);
        }

        match &expr.kind {
            ExprKind::Number { value } => Ok(int(value.clone())),
            ExprKind::Boolean { value } => Ok(bool_lit(*value)),
            ExprKind::Null => Ok(null()),
            ExprKind::String { value } => self.literal(&Value::String(value.clone()), &expr.ty),
            ExprKind::Id { name } => self.identifier(name, &expr.ty),
            ExprKind::FieldAccess { target, field } => self.field_access(expr, target, field),
            ExprKind::StaticCall { name, args } => self.static_call(name, args, expr),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.method_call(receiver, method, args, expr),
            ExprKind::StaticMethodCall {
                type_name,
                method,
                args,
            } => {
                let desc = self.backend.table().get(type_name)?;
                let lowered = if desc.is_struct_like() {
                    structs::static_call(self, desc, method, args, expr)?
                } else {
                    None
                };
                lowered.ok_or_else(|| {
                    CodegenError::compilation(
                        format!("unknown static method {}.{}", type_name, method),
                        &expr.loc,
                    )
                })
            }
            ExprKind::StructInstance { type_name, fields } => {
                self.struct_instance(type_name, fields, &expr.loc)
            }
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, &expr.loc),
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expression(cond)?;
                let then = self.cast(then, &expr.ty)?;
                let otherwise = self.cast(otherwise, &expr.ty)?;
                Ok(ternary(cond, then, otherwise))
            }
            ExprKind::InitOf { contract, args } => self.init_of(contract, args, &expr.loc),
        }
    }

    pub(crate) fn literal(&mut self, value: &Value, ty: &TypeRef) -> Result<Expr> {
        literals::write_value(self.backend, &mut self.deps, value, ty)
    }

    fn identifier(&mut self, name: &str, ty: &TypeRef) -> Result<Expr> {
        if name == "self" {
            return self.self_binding();
        }
        if let Some(constant) = self.backend.table().constant(name) {
            return self.literal(&constant.value, &constant.ty);
        }
        self.backend.layout.unpack(ty, &naming::local(name))
    }

    fn is_local_path(&self, expr: &ast::Expr) -> bool {
        match expr.path() {
            Some(segments) => segments
                .first()
                .map_or(false, |root| self.backend.table().constant(root).is_none()),
            None => false,
        }
    }

    fn field_access(&mut self, expr: &ast::Expr, target: &ast::Expr, field: &str) -> Result<Expr> {
        if self.is_local_path(expr) {
            if let Some(segments) = expr.path() {
                return self.backend.layout.unpack(&expr.ty, &path_name(&segments));
            }
        }
        let desc = self.backend.layout.struct_of(&target.ty)?.ok_or_else(|| {
            CodegenError::internal_at(
                format!("field {} accessed on {}", field, target.ty),
                &expr.loc,
            )
        })?;
        let value = self.expression(target)?;
        Ok(call(
            self.deps.used(naming::getter(&desc.name, field)),
            vec![value],
        ))
    }

    fn static_call(&mut self, name: &str, args: &[ast::Expr], expr: &ast::Expr) -> Result<Expr> {
        if let Some(lowered) = global::lower(self, name, args, expr)? {
            return Ok(lowered);
        }
        let function = self.backend.table().function(name).ok_or_else(|| {
            CodegenError::internal_at(format!("unknown function {}", name), &expr.loc)
        })?;
        let params = function.params.iter().map(|p| &p.ty);
        match &function.body {
            FunctionBody::Native { name: native } => {
                let args = self.arguments(args, params)?;
                self.backend.emission.skip(native.as_str());
                Ok(call(self.deps.used(native.as_str()), args))
            }
            FunctionBody::Statements { .. } => {
                let args = self.arguments(args, params)?;
                Ok(call(self.deps.used(naming::global_function(name)), args))
            }
            FunctionBody::Abstract => Err(CodegenError::internal_at(
                format!("abstract function {} has no body", name),
                &expr.loc,
            )),
        }
    }

    fn method_call(
        &mut self,
        receiver: &ast::Expr,
        name: &str,
        args: &[ast::Expr],
        expr: &ast::Expr,
    ) -> Result<Expr> {
        if receiver.ty.is_map() {
            return maps::lower(self, receiver, name, args, expr);
        }
        if receiver.ty.is_optional() {
            return Err(CodegenError::compilation(
                format!(
                    "cannot call {} on a value of type {} before checking it for null",
                    name, receiver.ty
                ),
                &receiver.loc,
            ));
        }
        let type_name = receiver.ty.name().ok_or_else(|| {
            CodegenError::internal_at(
                format!("method {} called on {}", name, receiver.ty),
                &receiver.loc,
            )
        })?;
        let desc = self.backend.table().get(type_name)?;
        if desc.is_struct_like() {
            if let Some(lowered) = structs::instance(self, desc, receiver, name, args)? {
                return Ok(lowered);
            }
        }
        let function = desc.functions.get(name).ok_or_else(|| {
            CodegenError::compilation(
                format!("unknown method {} on {}", name, type_name),
                &expr.loc,
            )
        })?;
        trace!(ty = %type_name, method = name, mutates = function.mutates, "method call");
        self.extension_call(desc, function, receiver, args, &expr.loc)
    }

    fn extension_call(
        &mut self,
        desc: &TypeDescription,
        function: &FunctionDescription,
        receiver: &ast::Expr,
        args: &[ast::Expr],
        loc: &SourceLocation,
    ) -> Result<Expr> {
        let params = function.params.iter().map(|p| &p.ty);
        let callee = match &function.body {
            FunctionBody::Native { name } => {
                self.backend.emission.skip(name.as_str());
                name.clone()
            }
            FunctionBody::Statements { .. } => naming::method(&desc.name, &function.name),
            FunctionBody::Abstract => {
                return Err(CodegenError::internal_at(
                    format!("abstract method {} has no body", function.name),
                    loc,
                ))
            }
        };

        if !function.mutates {
            let mut lowered = vec![self.expression(receiver)?];
            lowered.extend(self.arguments(args, params)?);
            return Ok(call(self.deps.used(callee), lowered));
        }

        if receiver.is_path() {
            let target = self.lvalue(receiver)?;
            let mut lowered = self.arguments(args, params)?;
            if let ([arg], [value]) = (args, lowered.as_mut_slice()) {
                if let Some(cast) = self.tensor_cast(&arg.ty)? {
                    let inner = std::mem::replace(value, Expr::Hole);
                    *value = call(self.deps.used(cast), vec![inner]);
                }
            }
            return Ok(modify(target, self.deps.used(callee), lowered));
        }

        if function.native_name().is_some() {
            return Err(CodegenError::compilation(
                format!(
                    "{} modifies its receiver, which must be a variable or a field",
                    function.name
                ),
                loc,
            ));
        }
        let mut lowered = vec![self.expression(receiver)?];
        lowered.extend(self.arguments(args, params)?);
        trace!(method = %function.name, "transient receiver, using the non-modifying wrapper");
        Ok(call(self.deps.used(naming::not_mut(&callee)), lowered))
    }

    /// The identity cast a lone struct argument needs so a one-field product keeps its shape.
    fn tensor_cast(&self, ty: &TypeRef) -> Result<Option<String>> {
        if ty.is_optional() {
            return Ok(None);
        }
        Ok(self
            .backend
            .layout
            .struct_of(ty)?
            .filter(|desc| !desc.fields.is_empty())
            .map(|desc| naming::tensor_cast(&desc.name)))
    }

    fn struct_instance(
        &mut self,
        type_name: &str,
        fields: &[FieldInit],
        loc: &SourceLocation,
    ) -> Result<Expr> {
        let desc = self.backend.table().get(type_name)?;
        if desc.fields.is_empty() {
            return Ok(call("empty_tuple", vec![]));
        }
        let mut items = Vec::with_capacity(desc.fields.len());
        for field in &desc.fields {
            let item = match fields.iter().find(|init| init.name == field.name) {
                Some(init) => self.cast(&init.value, &field.ty)?,
                None => match &field.default {
                    Some(value) => self.literal(value, &field.ty)?,
                    None => {
                        return Err(CodegenError::internal_at(
                            format!("{} is built without field {}", type_name, field.name),
                            loc,
                        ))
                    }
                },
            };
            items.push(item);
        }
        Ok(Expr::Tensor(items))
    }

    fn binary(
        &mut self,
        op: ast::BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        loc: &SourceLocation,
    ) -> Result<Expr> {
        if op.is_equality() {
            return self.equality(op == ast::BinaryOp::Ne, lhs, rhs, loc);
        }
        let l = self.expression(lhs)?;
        let r = self.expression(rhs)?;
        let op = match op {
            ast::BinaryOp::And => return Ok(ternary(l, r, bool_lit(false))),
            ast::BinaryOp::Or => return Ok(ternary(l, bool_lit(true), r)),
            ast::BinaryOp::Add => BinaryOp::Add,
            ast::BinaryOp::Sub => BinaryOp::Sub,
            ast::BinaryOp::Mul => BinaryOp::Mul,
            ast::BinaryOp::Div => BinaryOp::Div,
            ast::BinaryOp::Mod => BinaryOp::Mod,
            ast::BinaryOp::Shl => BinaryOp::Shl,
            ast::BinaryOp::Shr => BinaryOp::Shr,
            ast::BinaryOp::BitAnd => BinaryOp::And,
            ast::BinaryOp::BitOr => BinaryOp::Or,
            ast::BinaryOp::BitXor => BinaryOp::Xor,
            ast::BinaryOp::Lt => BinaryOp::Lt,
            ast::BinaryOp::Le => BinaryOp::Le,
            ast::BinaryOp::Gt => BinaryOp::Gt,
            ast::BinaryOp::Ge => BinaryOp::Ge,
            ast::BinaryOp::Eq | ast::BinaryOp::Ne => {
                return Err(CodegenError::internal_at("equality reached generic lowering", loc))
            }
        };
        Ok(binary(l, op, r))
    }

    fn equality(
        &mut self,
        negate: bool,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        loc: &SourceLocation,
    ) -> Result<Expr> {
        let lhs_null = lhs.is_null_literal() || lhs.ty.is_null();
        let rhs_null = rhs.is_null_literal() || rhs.ty.is_null();
        if lhs_null && rhs_null {
            return Ok(bool_lit(!negate));
        }
        if lhs_null || rhs_null {
            let other = if lhs_null { rhs } else { lhs };
            let tested = is_null(self.expression(other)?);
            return Ok(if negate { not(tested) } else { tested });
        }

        let kind = self.compared(&lhs.ty, loc)?;
        let l = self.expression(lhs)?;
        let r = self.expression(rhs)?;
        let lhs_opt = lhs.ty.is_optional() || kind == Compared::Map;
        let rhs_opt = rhs.ty.is_optional() || kind == Compared::Map;
        trace!(?kind, lhs_opt, rhs_opt, negate, "equality");

        let (plain, one, both) = match kind {
            Compared::Int => {
                if !lhs_opt && !rhs_opt {
                    let op = if negate { BinaryOp::Ne } else { BinaryOp::Eq };
                    return Ok(binary(l, op, r));
                }
                ("", runtime::INT_EQ_NULLABLE_ONE, runtime::INT_EQ_NULLABLE)
            }
            Compared::Address => (
                runtime::SLICE_EQ_BITS,
                runtime::SLICE_EQ_BITS_NULLABLE_ONE,
                runtime::SLICE_EQ_BITS_NULLABLE,
            ),
            Compared::Cell | Compared::Map => (
                runtime::CELL_EQ,
                runtime::CELL_EQ_NULLABLE_ONE,
                runtime::CELL_EQ_NULLABLE,
            ),
            Compared::Slice => (
                runtime::SLICE_EQ,
                runtime::SLICE_EQ_NULLABLE_ONE,
                runtime::SLICE_EQ_NULLABLE,
            ),
        };
        // The `_one` helpers take the nullable operand first.
        let compared = match (lhs_opt, rhs_opt) {
            (false, false) => call(self.helper(plain)?, vec![l, r]),
            (true, false) => call(self.helper(one)?, vec![l, r]),
            (false, true) => call(self.helper(one)?, vec![r, l]),
            (true, true) => call(self.helper(both)?, vec![l, r]),
        };
        Ok(if negate { not(compared) } else { compared })
    }

    fn compared(&self, ty: &TypeRef, loc: &SourceLocation) -> Result<Compared> {
        if ty.is_map() {
            return Ok(Compared::Map);
        }
        match self.backend.layout.primitive_of(ty)? {
            Some(PrimitiveKind::Int | PrimitiveKind::Bool) => Ok(Compared::Int),
            Some(PrimitiveKind::Address) => Ok(Compared::Address),
            Some(PrimitiveKind::Cell) => Ok(Compared::Cell),
            Some(PrimitiveKind::Slice | PrimitiveKind::String) => Ok(Compared::Slice),
            _ => Err(CodegenError::compilation(
                format!("values of type {} cannot be compared", ty),
                loc,
            )),
        }
    }

    fn unary(&mut self, op: ast::UnaryOp, operand: &ast::Expr) -> Result<Expr> {
        match op {
            ast::UnaryOp::Neg => Ok(unary(UnaryOp::Neg, self.expression(operand)?)),
            ast::UnaryOp::Not | ast::UnaryOp::BitNot => Ok(not(self.expression(operand)?)),
            ast::UnaryOp::NotNull => {
                let value = self.expression(operand)?;
                match self.backend.layout.struct_of(&operand.ty)? {
                    Some(desc) if operand.ty.is_optional() => Ok(call(
                        self.deps.used(naming::not_null(&desc.name)),
                        vec![value],
                    )),
                    _ => Ok(call(self.helper(runtime::NOT_NULL)?, vec![value])),
                }
            }
        }
    }

    /// `initOf C(args)`: the `(code, data)` pair a child contract is deployed with.
    fn init_of(&mut self, contract: &str, args: &[ast::Expr], loc: &SourceLocation) -> Result<Expr> {
        let desc = self.backend.table().get(contract)?;
        if !desc.is_contract() {
            return Err(CodegenError::internal_at(
                format!("initOf applied to {}, which is not a contract", contract),
                loc,
            ));
        }
        runtime::declare_context_globals(self.backend);
        let params = desc
            .init
            .as_ref()
            .map(|init| init.params.as_slice())
            .unwrap_or_default();
        let mut lowered = vec![id(runtime::CONTEXT_SYS)];
        lowered.extend(self.arguments(args, params.iter().map(|p| &p.ty))?);
        Ok(call(self.deps.used(naming::init_child(contract)), lowered))
    }
}
