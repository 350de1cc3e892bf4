/*! Storage allocation plans.
 *
 * A plan fixes, per type, which field lands in which cell and with which encoding. The codec
 * generator consumes plans as-is, so the bit and reference budgets are checked here, once, instead
 * of being rediscovered while emitting code.
 */

use crate::cell::{MAX_CELL_BITS, MAX_CELL_REFS};
use crate::value::ADDRESS_BITS;
use crate::ModelError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Largest encoding `store_coins` can produce: 4-bit length plus 15 bytes.
pub const COINS_MAX_BITS: usize = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    pub value: u32,
    pub bits: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Stored behind a reference.
    #[default]
    Default,
    /// Inlined as the trailing bits and refs of the last cell.
    Remainder,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpKind {
    Int {
        bits: u16,
    },
    Uint {
        bits: u16,
    },
    Coins,
    Boolean,
    Address,
    Cell {
        #[serde(default)]
        format: Format,
    },
    Slice {
        #[serde(default)]
        format: Format,
    },
    Builder {
        #[serde(default)]
        format: Format,
    },
    String,
    FixedBytes {
        bytes: u16,
    },
    Map,
    Struct {
        type_name: String,
        #[serde(default)]
        by_ref: bool,
    },
}

impl OpKind {
    pub fn format(&self) -> Format {
        match self {
            OpKind::Cell { format } | OpKind::Slice { format } | OpKind::Builder { format } => {
                *format
            }
            _ => Format::Default,
        }
    }

    pub fn is_remainder(&self) -> bool {
        self.format() == Format::Remainder
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationOperation {
    pub name: String,
    #[serde(flatten)]
    pub kind: OpKind,
    #[serde(default)]
    pub optional: bool,
}

impl AllocationOperation {
    pub fn new(name: impl Into<String>, kind: OpKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellUsage {
    pub bits: usize,
    pub refs: usize,
}

impl CellUsage {
    pub fn new(bits: usize, refs: usize) -> Self {
        Self { bits, refs }
    }

    pub fn add(self, other: CellUsage) -> Self {
        Self {
            bits: self.bits + other.bits,
            refs: self.refs + other.refs,
        }
    }

    pub fn fits(&self) -> bool {
        self.bits <= MAX_CELL_BITS && self.refs <= MAX_CELL_REFS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AllocationCell {
    #[serde(default)]
    pub ops: Vec<AllocationOperation>,
    #[serde(default)]
    pub next: Option<Box<AllocationCell>>,
}

impl AllocationCell {
    pub fn new(ops: Vec<AllocationOperation>) -> Self {
        Self { ops, next: None }
    }

    pub fn with_next(mut self, next: AllocationCell) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// This cell followed by every continuation cell.
    pub fn chain(&self) -> Vec<&AllocationCell> {
        let mut out = vec![self];
        let mut cursor = self.next.as_deref();
        while let Some(cell) = cursor {
            out.push(cell);
            cursor = cell.next.as_deref();
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(default)]
    pub header: Option<Header>,
    pub root: AllocationCell,
    /// Every operation of the chain in declaration order.
    pub ops: Vec<AllocationOperation>,
}

impl Allocation {
    pub fn new(header: Option<Header>, root: AllocationCell) -> Self {
        let ops = root
            .chain()
            .into_iter()
            .flat_map(|cell| cell.ops.iter().cloned())
            .collect();
        Self { header, root, ops }
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Whether reading this value consumes everything left in its slice, because its last field
    /// is a remainder or an inline struct that is itself open-ended.
    pub fn is_open_ended(&self, all: &Allocations) -> Result<bool, ModelError> {
        match self.ops.last().map(|op| &op.kind) {
            Some(kind) if kind.is_remainder() => Ok(true),
            Some(OpKind::Struct {
                type_name,
                by_ref: false,
            }) => all.get(type_name)?.is_open_ended(all),
            _ => Ok(false),
        }
    }

    /// Usage of the root cell alone, which is what an inline embedding costs its host.
    pub fn root_usage(&self, all: &Allocations) -> Result<CellUsage, ModelError> {
        self.cell_usage(&self.root, true, all)
    }

    fn cell_usage(
        &self,
        cell: &AllocationCell,
        is_root: bool,
        all: &Allocations,
    ) -> Result<CellUsage, ModelError> {
        let mut usage = CellUsage::default();
        if is_root {
            if let Some(header) = self.header {
                usage.bits += header.bits as usize;
            }
        }
        for op in &cell.ops {
            usage = usage.add(op_usage(op, all)?);
        }
        if cell.next.is_some() {
            usage.refs += 1;
        }
        Ok(usage)
    }

    /// Checks the per-cell budget and the structural rules every codec relies on.
    pub fn validate(&self, type_name: &str, all: &Allocations) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidAllocation {
            type_name: type_name.to_string(),
            reason,
        };

        let chain = self.root.chain();
        let flat: Vec<&AllocationOperation> = chain.iter().flat_map(|c| c.ops.iter()).collect();
        if flat.len() != self.ops.len() || flat.iter().zip(&self.ops).any(|(a, b)| *a != b) {
            return Err(invalid(
                "flat operation list does not match the cell chain".to_string(),
            ));
        }

        for (index, cell) in chain.iter().enumerate() {
            let usage = self.cell_usage(cell, index == 0, all)?;
            if !usage.fits() {
                return Err(invalid(format!(
                    "cell {} uses {} bits and {} refs",
                    index, usage.bits, usage.refs
                )));
            }
        }

        for (position, op) in flat.iter().enumerate() {
            if op.kind.is_remainder() {
                if op.optional {
                    return Err(invalid(format!(
                        "field {} cannot be both optional and remainder",
                        op.name
                    )));
                }
                if position + 1 != flat.len() {
                    return Err(invalid(format!(
                        "remainder field {} must be the last field",
                        op.name
                    )));
                }
            }
            if let OpKind::Struct { type_name: nested, by_ref } = &op.kind {
                let nested = all.get(nested)?;
                if !by_ref && position + 1 != flat.len() && nested.is_open_ended(all)? {
                    return Err(invalid(format!(
                        "inline struct field {} ends with a remainder and must be the last field",
                        op.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Worst-case space taken by one operation in its host cell.
pub fn op_usage(op: &AllocationOperation, all: &Allocations) -> Result<CellUsage, ModelError> {
    let base = match &op.kind {
        OpKind::Int { bits } | OpKind::Uint { bits } => CellUsage::new(*bits as usize, 0),
        OpKind::Coins => CellUsage::new(COINS_MAX_BITS, 0),
        OpKind::Boolean => CellUsage::new(1, 0),
        OpKind::Address => CellUsage::new(ADDRESS_BITS, 0),
        OpKind::Cell { format } | OpKind::Slice { format } | OpKind::Builder { format } => {
            match format {
                Format::Default => CellUsage::new(0, 1),
                Format::Remainder => CellUsage::default(),
            }
        }
        OpKind::String => CellUsage::new(0, 1),
        OpKind::FixedBytes { bytes } => CellUsage::new(*bytes as usize * 8, 0),
        OpKind::Map => CellUsage::new(1, 1),
        OpKind::Struct { by_ref: true, .. } => CellUsage::new(0, 1),
        OpKind::Struct {
            type_name,
            by_ref: false,
        } => all.get(type_name)?.root_usage(all)?,
    };
    Ok(if op.optional {
        base.add(CellUsage::new(1, 0))
    } else {
        base
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocations {
    #[serde(default)]
    pub types: IndexMap<String, Allocation>,
    /// Layout of the arguments persisted by a contract that has not run its init yet.
    #[serde(default)]
    pub init_args: IndexMap<String, Allocation>,
}

impl Allocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, allocation: Allocation) {
        self.types.insert(name.into(), allocation);
    }

    pub fn get(&self, name: &str) -> Result<&Allocation, ModelError> {
        self.types
            .get(name)
            .ok_or_else(|| ModelError::MissingAllocation(name.to_string()))
    }

    pub fn init_args(&self, contract: &str) -> Result<&Allocation, ModelError> {
        self.init_args
            .get(contract)
            .ok_or_else(|| ModelError::MissingAllocation(format!("{} init arguments", contract)))
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, allocation) in self.types.iter().chain(self.init_args.iter()) {
            allocation.validate(name, self)?;
        }
        Ok(())
    }
}
