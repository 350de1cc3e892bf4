/*! Type layout: how source values travel through the target calling convention.
 *
 * A non-optional struct with fields is passed as a flat product of its fields, one stack slot per
 * scalar. Optional and zero-field structs are boxed into a single tuple. Representation, local
 * unpacking, flattening and null initialization all follow that rule, so they are leaf visitors of
 * one fold and cannot disagree on where the recursion stops.
 */

use crate::errors::Result;
use crate::naming;
use cellgen_ir::builder::{id, null, tensor, unit};
use cellgen_ir::{Expr, FuncType};
use cellgen_model::types::{
    FieldDescription, PrimitiveKind, TypeDescription, TypeKind, TypeRef, TypeTable,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutMode {
    /// Overrides the optional marker carried by the type reference.
    pub optional: Option<bool>,
    /// Cut structs at their partial field count.
    pub bounced: bool,
}

impl LayoutMode {
    pub fn bounced() -> Self {
        Self {
            optional: None,
            bounced: true,
        }
    }

    pub fn forced_optional(optional: bool) -> Self {
        Self {
            optional: Some(optional),
            bounced: false,
        }
    }
}

/// Where the fold stops descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    Scalar(PrimitiveKind),
    /// Optional or zero-field struct, carried as one tuple.
    Boxed,
    Map,
    Void,
    Null,
}

impl Leaf {
    pub fn representation(self) -> FuncType {
        match self {
            Leaf::Scalar(kind) => primitive_representation(kind),
            Leaf::Boxed => FuncType::tuple(),
            Leaf::Map => FuncType::Cell,
            Leaf::Void => FuncType::unit(),
            Leaf::Null => FuncType::Hole,
        }
    }
}

pub fn primitive_representation(kind: PrimitiveKind) -> FuncType {
    match kind {
        PrimitiveKind::Int | PrimitiveKind::Bool => FuncType::Int,
        PrimitiveKind::Cell => FuncType::Cell,
        PrimitiveKind::Slice | PrimitiveKind::Address | PrimitiveKind::String => FuncType::Slice,
        PrimitiveKind::Builder => FuncType::Builder,
        PrimitiveKind::StringBuilder => FuncType::tuple(),
    }
}

pub trait LayoutVisitor {
    type Output;

    fn leaf(&mut self, path: &str, leaf: Leaf) -> Self::Output;

    fn product(&mut self, path: &str, fields: Vec<Self::Output>) -> Self::Output;
}

struct Representation;

impl LayoutVisitor for Representation {
    type Output = FuncType;

    fn leaf(&mut self, _path: &str, leaf: Leaf) -> FuncType {
        leaf.representation()
    }

    fn product(&mut self, _path: &str, fields: Vec<FuncType>) -> FuncType {
        FuncType::Tensor(fields)
    }
}

struct Unpack;

impl LayoutVisitor for Unpack {
    type Output = Expr;

    fn leaf(&mut self, path: &str, _leaf: Leaf) -> Expr {
        id(path)
    }

    fn product(&mut self, _path: &str, fields: Vec<Expr>) -> Expr {
        tensor(fields)
    }
}

struct Flatten;

impl LayoutVisitor for Flatten {
    type Output = Vec<(String, FuncType)>;

    fn leaf(&mut self, path: &str, leaf: Leaf) -> Self::Output {
        vec![(path.to_string(), leaf.representation())]
    }

    fn product(&mut self, _path: &str, fields: Vec<Self::Output>) -> Self::Output {
        fields.into_iter().flatten().collect()
    }
}

struct NullPattern;

impl LayoutVisitor for NullPattern {
    type Output = Expr;

    fn leaf(&mut self, _path: &str, leaf: Leaf) -> Expr {
        match leaf {
            Leaf::Void => unit(),
            _ => null(),
        }
    }

    fn product(&mut self, _path: &str, fields: Vec<Expr>) -> Expr {
        tensor(fields)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    table: &'a TypeTable,
}

impl<'a> Layout<'a> {
    pub fn new(table: &'a TypeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'a TypeTable {
        self.table
    }

    pub fn fold<V: LayoutVisitor>(
        &self,
        ty: &TypeRef,
        mode: LayoutMode,
        path: &str,
        visitor: &mut V,
    ) -> Result<V::Output> {
        let (name, optional, bounced) = match ty {
            TypeRef::Void => return Ok(visitor.leaf(path, Leaf::Void)),
            TypeRef::Null => return Ok(visitor.leaf(path, Leaf::Null)),
            TypeRef::Map { .. } => return Ok(visitor.leaf(path, Leaf::Map)),
            TypeRef::Ref { name, optional } => {
                (name, mode.optional.unwrap_or(*optional), mode.bounced)
            }
            TypeRef::Bounced { name } => (name, mode.optional.unwrap_or(false), true),
        };

        let desc = self.table.get(name)?;
        match desc.kind {
            TypeKind::Primitive(kind) => Ok(visitor.leaf(path, Leaf::Scalar(kind))),
            TypeKind::Struct | TypeKind::Contract => {
                if optional {
                    return Ok(visitor.leaf(path, Leaf::Boxed));
                }
                let fields = visible_fields(desc, bounced);
                let fields: Vec<(&str, &TypeRef)> =
                    fields.iter().map(|f| (f.name.as_str(), &f.ty)).collect();
                self.fold_fields(&fields, path, visitor)
            }
        }
    }

    /// Folds an ad-hoc record, such as a contract's init arguments, with struct rules.
    pub fn fold_fields<V: LayoutVisitor>(
        &self,
        fields: &[(&str, &TypeRef)],
        path: &str,
        visitor: &mut V,
    ) -> Result<V::Output> {
        if fields.is_empty() {
            return Ok(visitor.leaf(path, Leaf::Boxed));
        }
        let mut parts = Vec::with_capacity(fields.len());
        for (name, ty) in fields {
            let child = naming::tick(path, name);
            parts.push(self.fold(ty, LayoutMode::default(), &child, visitor)?);
        }
        Ok(visitor.product(path, parts))
    }

    pub fn representation(&self, ty: &TypeRef) -> Result<FuncType> {
        self.representation_with(ty, LayoutMode::default())
    }

    pub fn representation_with(&self, ty: &TypeRef, mode: LayoutMode) -> Result<FuncType> {
        self.fold(ty, mode, "", &mut Representation)
    }

    pub fn unpack(&self, ty: &TypeRef, base: &str) -> Result<Expr> {
        self.unpack_with(ty, LayoutMode::default(), base)
    }

    pub fn unpack_with(&self, ty: &TypeRef, mode: LayoutMode, base: &str) -> Result<Expr> {
        self.fold(ty, mode, base, &mut Unpack)
    }

    pub fn flatten(&self, ty: &TypeRef, base: &str) -> Result<Vec<(String, FuncType)>> {
        self.flatten_with(ty, LayoutMode::default(), base)
    }

    pub fn flatten_with(
        &self,
        ty: &TypeRef,
        mode: LayoutMode,
        base: &str,
    ) -> Result<Vec<(String, FuncType)>> {
        self.fold(ty, mode, base, &mut Flatten)
    }

    pub fn null_pattern(&self, ty: &TypeRef) -> Result<Expr> {
        self.fold(ty, LayoutMode::default(), "", &mut NullPattern)
    }

    pub fn fields_representation(&self, fields: &[(&str, &TypeRef)]) -> Result<FuncType> {
        self.fold_fields(fields, "", &mut Representation)
    }

    pub fn fields_unpack(&self, fields: &[(&str, &TypeRef)], base: &str) -> Result<Expr> {
        self.fold_fields(fields, base, &mut Unpack)
    }

    /// Struct description behind `ty`, if `ty` names a struct or contract.
    pub fn struct_of(&self, ty: &TypeRef) -> Result<Option<&'a TypeDescription>> {
        let name = match ty {
            TypeRef::Ref { name, .. } | TypeRef::Bounced { name } => name,
            _ => return Ok(None),
        };
        let desc = self.table.get(name)?;
        Ok(desc.is_struct_like().then_some(desc))
    }

    /// Primitive kind behind `ty`, ignoring optionality.
    pub fn primitive_of(&self, ty: &TypeRef) -> Result<Option<PrimitiveKind>> {
        match ty {
            TypeRef::Ref { name, .. } => Ok(self.table.get(name)?.primitive_kind()),
            _ => Ok(None),
        }
    }

    /// True when locals of this type are bound field by field.
    pub fn is_unpacked(&self, ty: &TypeRef) -> Result<bool> {
        Ok(matches!(self.representation(ty)?, FuncType::Tensor(items) if !items.is_empty()))
    }
}

pub fn visible_fields(desc: &TypeDescription, bounced: bool) -> &[FieldDescription] {
    if bounced {
        &desc.fields[..desc.partial_field_count.min(desc.fields.len())]
    } else {
        &desc.fields
    }
}
