use crate::expr::Expr;
use crate::stmt::Stmt;
use crate::types::FuncType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleItem {
    Function(FunctionDefinition),
    Declaration(FunctionDeclaration),
    Asm(AsmFunction),
    Constant(ConstantDef),
    Global(GlobalVar),
    Comment(Vec<String>),
    Include(String),
    Pragma(String),
}

impl ModuleItem {
    pub fn name(&self) -> Option<&str> {
        match self {
            ModuleItem::Function(f) => Some(&f.signature.name),
            ModuleItem::Declaration(d) => Some(&d.signature.name),
            ModuleItem::Asm(a) => Some(&a.signature.name),
            ModuleItem::Constant(c) => Some(&c.name),
            ModuleItem::Global(g) => Some(&g.name),
            ModuleItem::Comment(_) | ModuleItem::Include(_) | ModuleItem::Pragma(_) => None,
        }
    }

    pub fn signature(&self) -> Option<&FunctionSignature> {
        match self {
            ModuleItem::Function(f) => Some(&f.signature),
            ModuleItem::Declaration(d) => Some(&d.signature),
            ModuleItem::Asm(a) => Some(&a.signature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionAttribute {
    Impure,
    Inline,
    InlineRef,
    MethodId(Option<u32>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub ty: FuncType,
    pub name: String,
}

impl Param {
    pub fn new(ty: FuncType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub forall: Vec<String>,
    pub params: Vec<Param>,
    pub returns: FuncType,
    pub attributes: Vec<FunctionAttribute>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            forall: Vec::new(),
            params: Vec::new(),
            returns: FuncType::unit(),
            attributes: Vec::new(),
        }
    }

    pub fn param(mut self, ty: FuncType, name: impl Into<String>) -> Self {
        self.params.push(Param::new(ty, name));
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn returns(mut self, ty: FuncType) -> Self {
        self.returns = ty;
        self
    }

    pub fn forall(mut self, vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.forall.extend(vars.into_iter().map(Into::into));
        self
    }

    pub fn attribute(mut self, attr: FunctionAttribute) -> Self {
        if !self.attributes.contains(&attr) {
            self.attributes.push(attr);
        }
        self
    }

    pub fn impure(self) -> Self {
        self.attribute(FunctionAttribute::Impure)
    }

    pub fn inline(self) -> Self {
        self.attribute(FunctionAttribute::Inline)
    }

    pub fn inline_ref(self) -> Self {
        self.attribute(FunctionAttribute::InlineRef)
    }

    pub fn method_id(self, id: Option<u32>) -> Self {
        self.attribute(FunctionAttribute::MethodId(id))
    }

    pub fn has(&self, attr: FunctionAttribute) -> bool {
        self.attributes.contains(&attr)
    }

    pub fn is_inline(&self) -> bool {
        self.has(FunctionAttribute::Inline)
    }

    pub fn define(self, body: Vec<Stmt>) -> ModuleItem {
        ModuleItem::Function(FunctionDefinition {
            signature: self,
            body,
        })
    }

    pub fn declare(self) -> ModuleItem {
        ModuleItem::Declaration(FunctionDeclaration { signature: self })
    }

    pub fn asm(self, instructions: impl IntoIterator<Item = impl Into<String>>) -> ModuleItem {
        ModuleItem::Asm(AsmFunction {
            signature: self,
            instructions: instructions.into_iter().map(Into::into).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub signature: FunctionSignature,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub signature: FunctionSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AsmFunction {
    pub signature: FunctionSignature,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstantDef {
    pub ty: FuncType,
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalVar {
    pub ty: FuncType,
    pub name: String,
}
