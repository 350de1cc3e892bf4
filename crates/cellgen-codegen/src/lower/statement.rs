use super::Lowerer;
use crate::errors::{CodegenError, Result};
use crate::intrinsics::maps::{MapKinds, ValueKind};
use crate::naming;
use cellgen_ir::builder::{assign_stmt, augmented, call, expr_stmt, id, int, ret, tensor, typed_var, var};
use cellgen_ir::{AugmentedOp, Conditional, ElseBranch, Expr, Stmt};
use cellgen_model::ast::{self, ElseClause, SourceLocation, StmtKind};
use cellgen_model::types::TypeRef;
use tracing::trace;

impl Lowerer<'_, '_> {
    pub fn statements(&mut self, stmts: &[ast::Stmt]) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            out.extend(self.statement(stmt)?);
        }
        Ok(out)
    }

    /// One source statement, which may expand to several target statements.
    pub fn statement(&mut self, stmt: &ast::Stmt) -> Result<Vec<Stmt>> {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                let init = self.cast(value, ty)?;
                let layout = self.backend.layout;
                if layout.is_unpacked(ty)? {
                    Ok(vec![var(layout.unpack(ty, &naming::local(name))?, init)])
                } else {
                    Ok(vec![typed_var(
                        layout.representation(ty)?,
                        naming::local(name),
                        init,
                    )])
                }
            }
            StmtKind::Assign { path, value } => {
                let target = self.lvalue(path)?;
                let value = self.cast(value, &path.ty)?;
                Ok(vec![assign_stmt(target, value)])
            }
            StmtKind::AugmentedAssign { path, op, value } => {
                let target = self.lvalue(path)?;
                let value = self.expression(value)?;
                Ok(vec![expr_stmt(augmented(target, augmented_op(*op), value))])
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(value) => {
                        let returns = self.scope.returns.clone();
                        Some(self.cast(value, &returns)?)
                    }
                    None => None,
                };
                Ok(vec![ret(self.returned(value)?)])
            }
            StmtKind::Expression { expr } => Ok(vec![expr_stmt(self.expression(expr)?)]),
            StmtKind::Condition {
                cond,
                body,
                otherwise,
            } => Ok(vec![Stmt::If(self.conditional(
                cond,
                body,
                otherwise.as_ref(),
            )?)]),
            StmtKind::While { cond, body } => Ok(vec![Stmt::While {
                cond: self.expression(cond)?,
                body: self.statements(body)?,
            }]),
            StmtKind::Until { body, cond } => Ok(vec![Stmt::Until {
                body: self.statements(body)?,
                cond: self.expression(cond)?,
            }]),
            StmtKind::Repeat { count, body } => Ok(vec![Stmt::Repeat {
                count: self.expression(count)?,
                body: self.statements(body)?,
            }]),
            StmtKind::TryCatch {
                body,
                catch_name,
                catch_body,
            } => {
                let code = match catch_name {
                    Some(name) => id(naming::local(name)),
                    None => Expr::Hole,
                };
                Ok(vec![Stmt::TryCatch {
                    body: self.statements(body)?,
                    catch_binding: tensor(vec![Expr::Hole, code]),
                    catch_body: self.statements(catch_body)?,
                }])
            }
            StmtKind::Foreach {
                key,
                value,
                map,
                body,
            } => self.foreach(key, value, map, body, &stmt.loc),
        }
    }

    fn conditional(
        &mut self,
        cond: &ast::Expr,
        body: &[ast::Stmt],
        otherwise: Option<&ElseClause>,
    ) -> Result<Conditional> {
        let cond = self.expression(cond)?;
        let body = self.statements(body)?;
        let otherwise = match otherwise {
            None => None,
            Some(ElseClause::Block(stmts)) => Some(ElseBranch::Else(self.statements(stmts)?)),
            Some(ElseClause::If(stmt)) => match &stmt.kind {
                StmtKind::Condition {
                    cond,
                    body,
                    otherwise,
                } => Some(ElseBranch::ElseIf(Box::new(self.conditional(
                    cond,
                    body,
                    otherwise.as_ref(),
                )?))),
                _ => {
                    return Err(CodegenError::internal_at(
                        "else-if branch is not a condition",
                        &stmt.loc,
                    ))
                }
            },
        };
        Ok(Conditional {
            cond,
            body,
            otherwise,
            negated: false,
        })
    }

    /// Walks a map with its `min`/`next` primitives:
    ///
    /// ```text
    /// var ($k, $v, fc_0) = __tact_dict_min_K_V(m, kbits);
    /// while (fc_0) {
    ///     ...
    ///     ($k, $v, fc_0) = __tact_dict_next_K_V(m, kbits, $k);
    /// }
    /// ```
    fn foreach(
        &mut self,
        key: &str,
        value: &str,
        map: &ast::Expr,
        body: &[ast::Stmt],
        loc: &SourceLocation,
    ) -> Result<Vec<Stmt>> {
        let kinds = MapKinds::of(&self.backend.layout, &map.ty, loc)?;
        trace!(kinds = ?kinds, "foreach");
        let mut out = Vec::new();
        let lowered = self.expression(map)?;
        let source = self.bind_once("fm", lowered, &mut out);
        let flag = self.temp("fc");
        let key_name = naming::local(key);

        // Struct values come out of the dictionary as cells and are decoded per iteration.
        let (raw_value, decode) = match &kinds.value {
            ValueKind::Struct(type_name) => {
                let raw = self.temp("fv");
                let value_ty = TypeRef::named(type_name.clone());
                let pattern = self
                    .backend
                    .layout
                    .unpack(&value_ty, &naming::local(value))?;
                let loaded = call(
                    self.deps.used(naming::reader_cell_opt(type_name)),
                    vec![id(&raw)],
                );
                let decoded = call(self.deps.used(naming::not_null(type_name)), vec![loaded]);
                (raw, Some(var(pattern, decoded)))
            }
            _ => (naming::local(value), None),
        };

        let min = self.deps.used(kinds.primitive("min"));
        let next = self.deps.used(kinds.primitive("next"));
        self.backend.emission.skip(min.as_str());
        self.backend.emission.skip(next.as_str());
        let key_bits = int(kinds.key_bits());
        let cursor = || tensor(vec![id(&key_name), id(&raw_value), id(&flag)]);

        out.push(var(
            cursor(),
            call(min, kinds.with_value_bits(vec![source.clone(), key_bits.clone()])),
        ));
        let mut looped = Vec::new();
        looped.extend(decode);
        looped.extend(self.statements(body)?);
        looped.push(assign_stmt(
            cursor(),
            call(
                next,
                kinds.with_value_bits(vec![source, key_bits, id(&key_name)]),
            ),
        ));
        out.push(Stmt::While {
            cond: id(&flag),
            body: looped,
        });
        Ok(out)
    }
}

fn augmented_op(op: ast::AugmentedOp) -> AugmentedOp {
    match op {
        ast::AugmentedOp::Add => AugmentedOp::Add,
        ast::AugmentedOp::Sub => AugmentedOp::Sub,
        ast::AugmentedOp::Mul => AugmentedOp::Mul,
        ast::AugmentedOp::Div => AugmentedOp::Div,
        ast::AugmentedOp::Mod => AugmentedOp::Mod,
        ast::AugmentedOp::BitAnd => AugmentedOp::And,
        ast::AugmentedOp::BitOr => AugmentedOp::Or,
        ast::AugmentedOp::BitXor => AugmentedOp::Xor,
        ast::AugmentedOp::Shl => AugmentedOp::Shl,
        ast::AugmentedOp::Shr => AugmentedOp::Shr,
    }
}
