/*! Reference allocation planner.
 *
 * Real front ends ship their own plans. This greedy planner produces valid ones from a type table
 * so tests and the command-line driver can run without one: fields are placed in declaration
 * order, and a field that does not fit (keeping one reference free for the continuation while
 * more fields follow) opens a fresh cell.
 */

use crate::allocation::{
    op_usage, Allocation, AllocationCell, AllocationOperation, Allocations, CellUsage, Format,
    Header, OpKind,
};
use crate::types::{FieldDescription, ParamDescription, PrimitiveKind, TypeRef, TypeTable};
use crate::ModelError;

pub const HEADER_BITS: u16 = 32;
const DEFAULT_INT_BITS: u16 = 257;

/// Plans every struct, message and contract of `table`, plus the init arguments of each contract.
pub fn plan_program(table: &TypeTable) -> Result<Allocations, ModelError> {
    let mut planner = Planner::new(table);
    for desc in table.types.values() {
        if desc.is_struct_like() {
            planner.plan_type(&desc.name)?;
        }
    }
    for contract in table.contracts() {
        let params = contract
            .init
            .as_ref()
            .map(|init| init.params.as_slice())
            .unwrap_or_default();
        let mut ops = params
            .iter()
            .map(|p| param_op(&contract.name, p, table))
            .collect::<Result<Vec<_>, _>>()?;
        planner.close_open_structs(&mut ops)?;
        let root = planner.allocate(&contract.name, &ops, 0)?;
        planner
            .allocations
            .init_args
            .insert(contract.name.clone(), Allocation::new(None, root));
    }
    Ok(planner.allocations)
}

struct Planner<'a> {
    table: &'a TypeTable,
    allocations: Allocations,
    in_progress: Vec<String>,
}

impl<'a> Planner<'a> {
    fn new(table: &'a TypeTable) -> Self {
        Self {
            table,
            allocations: Allocations::new(),
            in_progress: Vec::new(),
        }
    }

    fn plan_type(&mut self, name: &str) -> Result<(), ModelError> {
        if self.allocations.types.contains_key(name) {
            return Ok(());
        }
        if self.in_progress.iter().any(|n| n == name) {
            return Err(ModelError::InvalidAllocation {
                type_name: name.to_string(),
                reason: "type embeds itself".to_string(),
            });
        }
        self.in_progress.push(name.to_string());

        let table = self.table;
        let desc = table.get(name)?;
        let mut ops = desc
            .fields
            .iter()
            .map(|f| field_op(name, f, table))
            .collect::<Result<Vec<_>, _>>()?;
        for op in &ops {
            if let OpKind::Struct { type_name, .. } = &op.kind {
                self.plan_type(type_name)?;
            }
        }
        self.close_open_structs(&mut ops)?;

        let header = desc.header.map(|value| Header {
            value,
            bits: HEADER_BITS,
        });
        let reserved = header.map(|h| h.bits as usize).unwrap_or(0);
        let root = self.allocate(name, &ops, reserved)?;

        self.in_progress.pop();
        self.allocations
            .insert(name.to_string(), Allocation::new(header, root));
        Ok(())
    }

    /// An inline struct that reads to the end of its slice would swallow the fields after it, so
    /// anywhere but last it goes behind a reference.
    fn close_open_structs(&self, ops: &mut [AllocationOperation]) -> Result<(), ModelError> {
        let last = ops.len().saturating_sub(1);
        for op in &mut ops[..last] {
            if let OpKind::Struct { type_name, by_ref } = &mut op.kind {
                if !*by_ref && self.allocations.get(type_name)?.is_open_ended(&self.allocations)? {
                    *by_ref = true;
                }
            }
        }
        Ok(())
    }

    fn allocate(
        &self,
        type_name: &str,
        ops: &[AllocationOperation],
        reserved_bits: usize,
    ) -> Result<AllocationCell, ModelError> {
        let mut used = CellUsage::new(reserved_bits, 0);
        let mut placed = Vec::new();

        for (index, op) in ops.iter().enumerate() {
            let reserve = CellUsage::new(0, usize::from(index + 1 < ops.len()));
            let mut candidate = op.clone();
            let mut usage = op_usage(&candidate, &self.allocations)?;

            if !used.add(usage).add(reserve).fits() {
                if let OpKind::Struct { by_ref, .. } = &mut candidate.kind {
                    *by_ref = true;
                    usage = op_usage(&candidate, &self.allocations)?;
                }
            }

            if used.add(usage).add(reserve).fits() {
                used = used.add(usage);
                placed.push(candidate);
                continue;
            }

            if placed.is_empty() {
                return Err(ModelError::InvalidAllocation {
                    type_name: type_name.to_string(),
                    reason: format!("field {} does not fit in an empty cell", op.name),
                });
            }
            let next = self.allocate(type_name, &ops[index..], 0)?;
            return Ok(AllocationCell::new(placed).with_next(next));
        }
        Ok(AllocationCell::new(placed))
    }
}

fn field_op(
    owner: &str,
    field: &FieldDescription,
    table: &TypeTable,
) -> Result<AllocationOperation, ModelError> {
    type_op(owner, &field.name, &field.ty, field.as_format.as_deref(), table)
}

fn param_op(
    owner: &str,
    param: &ParamDescription,
    table: &TypeTable,
) -> Result<AllocationOperation, ModelError> {
    type_op(owner, &param.name, &param.ty, None, table)
}

fn type_op(
    owner: &str,
    name: &str,
    ty: &TypeRef,
    format: Option<&str>,
    table: &TypeTable,
) -> Result<AllocationOperation, ModelError> {
    let unsupported = |what: String| ModelError::InvalidAllocation {
        type_name: owner.to_string(),
        reason: format!("field {}: {}", name, what),
    };

    let (type_name, optional) = match ty {
        TypeRef::Ref { name, optional } => (name.as_str(), *optional),
        TypeRef::Map { .. } => return Ok(AllocationOperation::new(name, OpKind::Map)),
        other => return Err(unsupported(format!("type {} is not serializable", other))),
    };

    let desc = table.get(type_name)?;
    let kind = match desc.primitive_kind() {
        Some(PrimitiveKind::Int) => int_kind(format).ok_or_else(|| {
            unsupported(format!("unknown integer format {}", format.unwrap_or("")))
        })?,
        Some(PrimitiveKind::Bool) => OpKind::Boolean,
        Some(PrimitiveKind::Address) => OpKind::Address,
        Some(PrimitiveKind::Cell) => OpKind::Cell {
            format: remainder_format(format),
        },
        Some(PrimitiveKind::Builder) => OpKind::Builder {
            format: remainder_format(format),
        },
        Some(PrimitiveKind::Slice) => match format {
            Some("bytes32") => OpKind::FixedBytes { bytes: 32 },
            Some("bytes64") => OpKind::FixedBytes { bytes: 64 },
            _ => OpKind::Slice {
                format: remainder_format(format),
            },
        },
        Some(PrimitiveKind::String) => match remainder_format(format) {
            Format::Remainder => OpKind::Slice {
                format: Format::Remainder,
            },
            Format::Default => OpKind::String,
        },
        Some(PrimitiveKind::StringBuilder) => {
            return Err(unsupported("StringBuilder is not serializable".to_string()))
        }
        None => OpKind::Struct {
            type_name: desc.name.clone(),
            by_ref: false,
        },
    };

    if optional && kind.is_remainder() {
        return Err(unsupported(
            "optional fields cannot use the remaining format".to_string(),
        ));
    }
    Ok(AllocationOperation {
        name: name.to_string(),
        kind,
        optional,
    })
}

fn remainder_format(format: Option<&str>) -> Format {
    match format {
        Some("remaining") => Format::Remainder,
        _ => Format::Default,
    }
}

/// `int<N>`, `uint<N>` and `coins`; a missing format is a full 257-bit signed integer.
pub fn int_kind(format: Option<&str>) -> Option<OpKind> {
    let format = match format {
        None => return Some(OpKind::Int {
            bits: DEFAULT_INT_BITS,
        }),
        Some(f) => f,
    };
    if format == "coins" {
        return Some(OpKind::Coins);
    }
    if let Some(bits) = format.strip_prefix("uint") {
        let bits: u16 = bits.parse().ok()?;
        return (1..=256).contains(&bits).then_some(OpKind::Uint { bits });
    }
    if let Some(bits) = format.strip_prefix("int") {
        let bits: u16 = bits.parse().ok()?;
        return (1..=257).contains(&bits).then_some(OpKind::Int { bits });
    }
    None
}
