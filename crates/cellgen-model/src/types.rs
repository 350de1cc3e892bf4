use crate::ast::Stmt;
use crate::value::Value;
use crate::ModelError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of a source expression, binding or field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    Ref {
        name: String,
        #[serde(default)]
        optional: bool,
    },
    Map {
        key: String,
        #[serde(default)]
        key_as: Option<String>,
        value: String,
        #[serde(default)]
        value_as: Option<String>,
    },
    /// Truncated view of a message as it arrives in a bounce.
    Bounced {
        name: String,
    },
    Void,
    Null,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Ref {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        TypeRef::Ref {
            name: name.into(),
            optional: true,
        }
    }

    pub fn map(key: impl Into<String>, value: impl Into<String>) -> Self {
        TypeRef::Map {
            key: key.into(),
            key_as: None,
            value: value.into(),
            value_as: None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeRef::Ref { optional: true, .. })
    }

    pub fn is_map(&self) -> bool {
        matches!(self, TypeRef::Map { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeRef::Null)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Ref { name, .. } | TypeRef::Bounced { name } => Some(name),
            _ => None,
        }
    }

    /// Same type with the optional marker removed.
    pub fn non_optional(&self) -> TypeRef {
        match self {
            TypeRef::Ref { name, .. } => TypeRef::named(name.clone()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Ref { name, optional } => {
                write!(f, "{}{}", name, if *optional { "?" } else { "" })
            }
            TypeRef::Map {
                key,
                key_as,
                value,
                value_as,
            } => {
                write!(f, "map<{}", key)?;
                if let Some(k) = key_as {
                    write!(f, " as {}", k)?;
                }
                write!(f, ", {}", value)?;
                if let Some(v) = value_as {
                    write!(f, " as {}", v)?;
                }
                write!(f, ">")
            }
            TypeRef::Bounced { name } => write!(f, "bounced<{}>", name),
            TypeRef::Void => write!(f, "<void>"),
            TypeRef::Null => write!(f, "<null>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Int,
    Bool,
    Cell,
    Slice,
    Builder,
    Address,
    String,
    StringBuilder,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Int,
        PrimitiveKind::Bool,
        PrimitiveKind::Cell,
        PrimitiveKind::Slice,
        PrimitiveKind::Builder,
        PrimitiveKind::Address,
        PrimitiveKind::String,
        PrimitiveKind::StringBuilder,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::Cell => "Cell",
            PrimitiveKind::Slice => "Slice",
            PrimitiveKind::Builder => "Builder",
            PrimitiveKind::Address => "Address",
            PrimitiveKind::String => "String",
            PrimitiveKind::StringBuilder => "StringBuilder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Struct,
    Contract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescription {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
    /// Number of leading fields that survive the truncation of a bounced message.
    #[serde(default)]
    pub partial_field_count: usize,
    /// Message opcode, present on message types only.
    #[serde(default)]
    pub header: Option<u32>,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDescription>,
    #[serde(default)]
    pub receivers: Vec<ReceiverDescription>,
    #[serde(default)]
    pub init: Option<InitDescription>,
    #[serde(default)]
    pub uid: u16,
}

impl TypeDescription {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(kind.type_name(), TypeKind::Primitive(kind))
    }

    pub fn structure(name: impl Into<String>, fields: Vec<FieldDescription>) -> Self {
        let mut desc = Self::new(name, TypeKind::Struct);
        desc.partial_field_count = fields.len();
        desc.fields = fields;
        desc
    }

    pub fn message(name: impl Into<String>, header: u32, fields: Vec<FieldDescription>) -> Self {
        let mut desc = Self::structure(name, fields);
        desc.header = Some(header);
        desc
    }

    pub fn contract(name: impl Into<String>, fields: Vec<FieldDescription>) -> Self {
        let mut desc = Self::new(name, TypeKind::Contract);
        desc.partial_field_count = fields.len();
        desc.fields = fields;
        desc
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            partial_field_count: 0,
            header: None,
            functions: IndexMap::new(),
            receivers: Vec::new(),
            init: None,
            uid: 0,
        }
    }

    pub fn is_struct_like(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Contract)
    }

    pub fn is_contract(&self) -> bool {
        matches!(self.kind, TypeKind::Contract)
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn getters(&self) -> impl Iterator<Item = &FunctionDescription> {
        self.functions.values().filter(|f| f.is_getter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub index: usize,
    pub ty: TypeRef,
    /// Serialization override such as `uint8`, `coins` or `remaining`.
    #[serde(default, rename = "as")]
    pub as_format: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, index: usize, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            index,
            ty,
            as_format: None,
            default: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.as_format = Some(format.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescription {
    pub name: String,
    pub ty: TypeRef,
}

impl ParamDescription {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionBody {
    Statements { stmts: Vec<Stmt> },
    /// Bound to a function supplied by the target runtime under `name`.
    Native { name: String },
    /// Declared on a trait and never emitted on its own.
    Abstract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    #[serde(default)]
    pub self_type: Option<TypeRef>,
    #[serde(default)]
    pub params: Vec<ParamDescription>,
    pub returns: TypeRef,
    #[serde(default)]
    pub mutates: bool,
    #[serde(default)]
    pub is_getter: bool,
    #[serde(default)]
    pub method_id: Option<u32>,
    #[serde(default)]
    pub inline: bool,
    pub body: FunctionBody,
}

impl FunctionDescription {
    pub fn new(name: impl Into<String>, returns: TypeRef, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            self_type: None,
            params: Vec::new(),
            returns,
            mutates: false,
            is_getter: false,
            method_id: None,
            inline: false,
            body: FunctionBody::Statements { stmts: body },
        }
    }

    pub fn native(name: impl Into<String>, native: impl Into<String>, returns: TypeRef) -> Self {
        let mut desc = Self::new(name, returns, Vec::new());
        desc.body = FunctionBody::Native {
            name: native.into(),
        };
        desc
    }

    pub fn with_self(mut self, ty: TypeRef) -> Self {
        self.self_type = Some(ty);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(ParamDescription::new(name, ty));
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutates = true;
        self
    }

    pub fn getter(mut self, method_id: Option<u32>) -> Self {
        self.is_getter = true;
        self.method_id = method_id;
        self
    }

    pub fn is_method(&self) -> bool {
        self.self_type.is_some()
    }

    pub fn native_name(&self) -> Option<&str> {
        match &self.body {
            FunctionBody::Native { name } => Some(name),
            FunctionBody::Statements { .. } | FunctionBody::Abstract => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDescription {
    #[serde(default)]
    pub params: Vec<ParamDescription>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageSelector {
    Binary { type_name: String },
    Empty,
    Comment { text: String },
    CommentFallback,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum ReceiverSelector {
    Internal { selector: MessageSelector },
    External { selector: MessageSelector },
    /// `bounced` is set when the handler receives the truncated `bounced<T>` view.
    BounceBinary { type_name: String, bounced: bool },
    BounceFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverDescription {
    pub selector: ReceiverSelector,
    /// Binding name of the payload parameter, if the handler takes one.
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl ReceiverDescription {
    pub fn new(selector: ReceiverSelector, param: Option<&str>, body: Vec<Stmt>) -> Self {
        Self {
            selector,
            param: param.map(str::to_string),
            body,
        }
    }

    pub fn internal(selector: MessageSelector, param: Option<&str>, body: Vec<Stmt>) -> Self {
        Self::new(ReceiverSelector::Internal { selector }, param, body)
    }

    pub fn external(selector: MessageSelector, param: Option<&str>, body: Vec<Stmt>) -> Self {
        Self::new(ReceiverSelector::External { selector }, param, body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDescription {
    pub name: String,
    pub ty: TypeRef,
    pub value: Value,
}

/// Immutable table of resolved declarations handed over by the type checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTable {
    #[serde(default)]
    pub types: IndexMap<String, TypeDescription>,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDescription>,
    #[serde(default)]
    pub constants: IndexMap<String, ConstantDescription>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primitives() -> Self {
        let mut table = Self::new();
        for kind in PrimitiveKind::ALL {
            table.add_type(TypeDescription::primitive(kind));
        }
        table
    }

    pub fn add_type(&mut self, desc: TypeDescription) {
        self.types.insert(desc.name.clone(), desc);
    }

    pub fn add_function(&mut self, desc: FunctionDescription) {
        self.functions.insert(desc.name.clone(), desc);
    }

    pub fn add_constant(&mut self, name: impl Into<String>, ty: TypeRef, value: Value) {
        let name = name.into();
        self.constants.insert(
            name.clone(),
            ConstantDescription { name, ty, value },
        );
    }

    pub fn get(&self, name: &str) -> Result<&TypeDescription, ModelError> {
        self.types
            .get(name)
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDescription> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantDescription> {
        self.constants.get(name)
    }

    pub fn structs(&self) -> impl Iterator<Item = &TypeDescription> {
        self.types
            .values()
            .filter(|t| matches!(t.kind, TypeKind::Struct))
    }

    pub fn contracts(&self) -> impl Iterator<Item = &TypeDescription> {
        self.types
            .values()
            .filter(|t| matches!(t.kind, TypeKind::Contract))
    }
}
