use crate::cell::{Cell, CellBuilder, CellError, CellSlice};
use crate::ModelError;
use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compile-time value produced by the constant evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(BigInt),
    Bool(bool),
    Null,
    String(String),
    Address(Address),
    Cell(Cell),
    Slice(Cell),
    Struct {
        type_name: String,
        fields: IndexMap<String, Value>,
    },
}

impl Value {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Value::Int(value.into())
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Standard internal address: 8-bit workchain and 256-bit account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

pub const ADDRESS_BITS: usize = 267;

impl Address {
    pub fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    pub fn is_basechain(&self) -> bool {
        self.workchain == 0
    }

    /// `addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256`
    pub fn store(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        builder.store_uint(&BigInt::from(2u8), 2)?;
        builder.store_bit(false)?;
        builder.store_int(&BigInt::from(self.workchain), 8)?;
        builder.store_bytes(&self.hash)?;
        Ok(())
    }

    pub fn load(slice: &mut CellSlice) -> Result<Self, ModelError> {
        let tag = slice.load_uint(2)?;
        let anycast = slice.load_bit()?;
        if tag != BigInt::from(2u8) || anycast {
            return Err(ModelError::InvalidAddress(
                "not a standard address without anycast".to_string(),
            ));
        }
        let workchain = slice.load_int(8)?;
        let workchain = i8::try_from(workchain)
            .map_err(|_| ModelError::InvalidAddress("workchain out of range".to_string()))?;
        let bytes = slice.load_bytes(32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self { workchain, hash })
    }

    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        self.store(&mut builder)?;
        builder.build()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, crate::cell::hex(&self.hash))
    }
}

impl FromStr for Address {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidAddress(format!("expected wc:hex, got {}", s)))?;
        let workchain = wc
            .parse::<i8>()
            .map_err(|e| ModelError::InvalidAddress(format!("bad workchain {}: {}", wc, e)))?;
        if hash_hex.len() != 64 {
            return Err(ModelError::InvalidAddress(format!(
                "account id must be 64 hex digits, got {}",
                hash_hex.len()
            )));
        }
        let mut hash = [0u8; 32];
        for (i, byte) in hash.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hash_hex[2 * i..2 * i + 2], 16)
                .map_err(|e| ModelError::InvalidAddress(format!("bad account id: {}", e)))?;
        }
        Ok(Self { workchain, hash })
    }
}

impl TryFrom<String> for Address {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}
