/*! Bit-exact model of the VM's cells, builders and slices.
 *
 * Constant cells embedded in generated code are keyed by their representation hash, and comment
 * receivers dispatch on the hash of a prefixed string cell, so the backend needs the same hashing
 * and bag-of-cells encoding the VM uses. The same model backs the round-trip tests of the codecs.
 */

use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const MAX_CELL_BITS: usize = 1023;
pub const MAX_CELL_REFS: usize = 4;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("Cell overflow: {bits} bits and {refs} refs exceed the cell budget")]
    Overflow { bits: usize, refs: usize },
    #[error("Cell underflow: requested {requested} bits, {available} available")]
    BitUnderflow { requested: usize, available: usize },
    #[error("Cell underflow: no references left")]
    RefUnderflow,
    #[error("Integer {value} does not fit in {bits} bits")]
    IntegerOutOfRange { value: BigInt, bits: usize },
    #[error("Slice is not empty: {bits} bits and {refs} refs left")]
    NotConsumed { bits: usize, refs: usize },
    #[error("Malformed bag of cells: {0}")]
    InvalidBoc(String),
}

pub type Result<T> = std::result::Result<T, CellError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    bits: Vec<bool>,
    refs: Vec<Cell>,
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn refs(&self) -> &[Cell] {
        &self.refs
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    pub fn parse(&self) -> CellSlice {
        CellSlice::new(self.clone())
    }

    pub fn depth(&self) -> u16 {
        self.refs
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    fn descriptors(&self) -> [u8; 2] {
        let bits = self.bits.len();
        let d1 = self.refs.len() as u8;
        let d2 = (bits / 8 + bits.div_ceil(8)) as u8;
        [d1, d2]
    }

    /// Data bits padded to a byte boundary with the `1 0*` completion tag.
    fn padded_data(&self) -> Vec<u8> {
        let mut bits = self.bits.clone();
        if bits.len() % 8 != 0 {
            bits.push(true);
            while bits.len() % 8 != 0 {
                bits.push(false);
            }
        }
        bits_to_bytes(&bits)
    }

    /// Standard representation hash of an ordinary cell.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.descriptors());
        hasher.update(self.padded_data());
        for r in &self.refs {
            hasher.update(r.depth().to_be_bytes());
        }
        for r in &self.refs {
            hasher.update(r.hash());
        }
        hasher.finalize().into()
    }

    pub fn hash_hex(&self) -> String {
        hex(&self.hash())
    }

    /// Serializes the cell tree as a single-root bag of cells without index or checksum.
    pub fn to_boc(&self) -> Vec<u8> {
        let mut order: Vec<&Cell> = Vec::new();
        let mut seen = HashSet::new();
        post_order(self, &mut order, &mut seen);
        order.reverse();

        let index: HashMap<[u8; 32], usize> = order
            .iter()
            .enumerate()
            .map(|(i, c)| (c.hash(), i))
            .collect();

        let size_bytes = bytes_for(order.len());
        let mut cells_data = Vec::new();
        for cell in &order {
            cells_data.extend_from_slice(&cell.descriptors());
            cells_data.extend_from_slice(&cell.padded_data());
            for r in &cell.refs {
                let idx = index[&r.hash()];
                cells_data.extend_from_slice(&be_bytes(idx, size_bytes));
            }
        }
        let off_bytes = bytes_for(cells_data.len());

        let mut out = Vec::with_capacity(cells_data.len() + 16);
        out.extend_from_slice(&BOC_MAGIC);
        out.push(size_bytes as u8);
        out.push(off_bytes as u8);
        out.extend_from_slice(&be_bytes(order.len(), size_bytes));
        out.extend_from_slice(&be_bytes(1, size_bytes));
        out.extend_from_slice(&be_bytes(0, size_bytes));
        out.extend_from_slice(&be_bytes(cells_data.len(), off_bytes));
        out.extend_from_slice(&be_bytes(0, size_bytes));
        out.extend_from_slice(&cells_data);
        out
    }

    pub fn to_boc_hex(&self) -> String {
        hex(&self.to_boc()).to_uppercase()
    }

    /// Reads back a single-root bag of cells as written by [`to_boc`](Self::to_boc).
    pub fn from_boc(bytes: &[u8]) -> Result<Cell> {
        let mut reader = BocReader { bytes, pos: 0 };
        if reader.take(4)? != BOC_MAGIC {
            return Err(CellError::InvalidBoc("bad magic".to_string()));
        }
        let size_bytes = reader.take(1)?[0] as usize & 0x07;
        let off_bytes = reader.take(1)?[0] as usize;
        let count = reader.number(size_bytes)?;
        let roots = reader.number(size_bytes)?;
        if roots != 1 {
            return Err(CellError::InvalidBoc(format!("{} roots", roots)));
        }
        reader.number(size_bytes)?;
        reader.number(off_bytes)?;
        let root = reader.number(size_bytes)?;

        let mut raw: Vec<(Vec<bool>, Vec<usize>)> = Vec::with_capacity(count);
        for _ in 0..count {
            let d1 = reader.take(1)?[0];
            let d2 = reader.take(1)?[0] as usize;
            let data = reader.take(d2.div_ceil(2))?;
            let mut bits: Vec<bool> = data
                .iter()
                .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
                .collect();
            if d2 % 2 == 1 {
                while bits.last() == Some(&false) {
                    bits.pop();
                }
                bits.pop();
            }
            let mut refs = Vec::with_capacity(d1 as usize);
            for _ in 0..(d1 & 0x07) {
                refs.push(reader.number(size_bytes)?);
            }
            raw.push((bits, refs));
        }

        let mut built: Vec<Option<Cell>> = vec![None; count];
        for index in (0..count).rev() {
            let (bits, refs) = &raw[index];
            let mut children = Vec::with_capacity(refs.len());
            for r in refs {
                let child = built
                    .get(*r)
                    .and_then(Option::clone)
                    .ok_or_else(|| CellError::InvalidBoc(format!("bad reference {}", r)))?;
                children.push(child);
            }
            built[index] = Some(Cell {
                bits: bits.clone(),
                refs: children,
            });
        }
        built
            .get(root)
            .and_then(Option::clone)
            .ok_or_else(|| CellError::InvalidBoc("missing root".to_string()))
    }

    pub fn from_boc_hex(text: &str) -> Result<Cell> {
        if text.len() % 2 != 0 {
            return Err(CellError::InvalidBoc("odd hex length".to_string()));
        }
        let bytes = (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&text[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|e| CellError::InvalidBoc(e.to_string()))?;
        Cell::from_boc(&bytes)
    }
}

struct BocReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BocReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let chunk = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| CellError::InvalidBoc("truncated".to_string()))?;
        self.pos = end;
        Ok(chunk)
    }

    fn number(&mut self, width: usize) -> Result<usize> {
        Ok(self
            .take(width)?
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize))
    }
}

fn post_order<'a>(cell: &'a Cell, out: &mut Vec<&'a Cell>, seen: &mut HashSet<[u8; 32]>) {
    if !seen.insert(cell.hash()) {
        return;
    }
    for r in &cell.refs {
        post_order(r, out, seen);
    }
    out.push(cell);
}

fn bytes_for(mut n: usize) -> usize {
    let mut bytes = 1;
    while n > 0xff {
        n >>= 8;
        bytes += 1;
    }
    bytes
}

fn be_bytes(value: usize, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|i| ((value >> (8 * i)) & 0xff) as u8)
        .collect()
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, b)| if *b { acc | (0x80 >> i) } else { acc })
        })
        .collect()
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellBuilder {
    bits: Vec<bool>,
    refs: Vec<Cell>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    pub fn ref_len(&self) -> usize {
        self.refs.len()
    }

    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bits.len()
    }

    fn ensure(&self, bits: usize, refs: usize) -> Result<()> {
        let total_bits = self.bits.len() + bits;
        let total_refs = self.refs.len() + refs;
        if total_bits > MAX_CELL_BITS || total_refs > MAX_CELL_REFS {
            return Err(CellError::Overflow {
                bits: total_bits,
                refs: total_refs,
            });
        }
        Ok(())
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure(1, 0)?;
        self.bits.push(bit);
        Ok(self)
    }

    pub fn store_uint(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        if value.sign() == Sign::Minus || value.bits() > bits as u64 {
            return Err(CellError::IntegerOutOfRange {
                value: value.clone(),
                bits,
            });
        }
        self.store_raw(value, bits)
    }

    pub fn store_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        let fits = if bits == 0 {
            value.is_zero()
        } else {
            let bound = BigInt::one() << (bits - 1);
            value >= &-bound.clone() && value < &bound
        };
        if !fits {
            return Err(CellError::IntegerOutOfRange {
                value: value.clone(),
                bits,
            });
        }
        self.store_raw(value, bits)
    }

    fn store_raw(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        self.ensure(bits, 0)?;
        for i in (0..bits).rev() {
            self.bits.push(value.bit(i as u64));
        }
        Ok(self)
    }

    /// Variable-length unsigned amount: a 4-bit byte length followed by that many bytes.
    pub fn store_coins(&mut self, value: &BigInt) -> Result<&mut Self> {
        if value.is_negative() || value.bits() > 120 {
            return Err(CellError::IntegerOutOfRange {
                value: value.clone(),
                bits: 120,
            });
        }
        let len = (value.bits() as usize).div_ceil(8);
        self.store_uint(&BigInt::from(len), 4)?;
        self.store_uint(value, len * 8)
    }

    pub fn store_ref(&mut self, cell: Cell) -> Result<&mut Self> {
        self.ensure(0, 1)?;
        self.refs.push(cell);
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure(bytes.len() * 8, 0)?;
        for byte in bytes {
            for i in (0..8).rev() {
                self.bits.push((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    pub fn store_slice(&mut self, slice: &CellSlice) -> Result<&mut Self> {
        let bits = slice.remaining_bit_values();
        let refs = slice.remaining_ref_values();
        self.ensure(bits.len(), refs.len())?;
        self.bits.extend_from_slice(bits);
        self.refs.extend(refs.iter().cloned());
        Ok(self)
    }

    pub fn store_builder(&mut self, other: &CellBuilder) -> Result<&mut Self> {
        self.ensure(other.bits.len(), other.refs.len())?;
        self.bits.extend_from_slice(&other.bits);
        self.refs.extend(other.refs.iter().cloned());
        Ok(self)
    }

    /// Stores as many bytes as fit and chains the rest through single-reference tail cells.
    pub fn store_string_tail(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        if bytes.is_empty() {
            return Ok(self);
        }
        let fit = self.available_bits() / 8;
        if bytes.len() > fit {
            let (head, tail) = bytes.split_at(fit);
            self.store_bytes(head)?;
            let mut next = CellBuilder::new();
            next.store_string_tail(tail)?;
            self.store_ref(next.build()?)?;
        } else {
            self.store_bytes(bytes)?;
        }
        Ok(self)
    }

    pub fn build(&self) -> Result<Cell> {
        self.ensure(0, 0)?;
        Ok(Cell {
            bits: self.bits.clone(),
            refs: self.refs.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSlice {
    cell: Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl CellSlice {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bits.len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs.len() - self.ref_pos
    }

    pub fn remaining_bit_values(&self) -> &[bool] {
        &self.cell.bits[self.bit_pos..]
    }

    pub fn remaining_ref_values(&self) -> &[Cell] {
        &self.cell.refs[self.ref_pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    pub fn end_parse(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CellError::NotConsumed {
                bits: self.remaining_bits(),
                refs: self.remaining_refs(),
            })
        }
    }

    fn take(&mut self, bits: usize) -> Result<&[bool]> {
        if bits > self.remaining_bits() {
            return Err(CellError::BitUnderflow {
                requested: bits,
                available: self.remaining_bits(),
            });
        }
        let start = self.bit_pos;
        self.bit_pos += bits;
        Ok(&self.cell.bits[start..start + bits])
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        Ok(self.take(1)?[0])
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<BigInt> {
        let taken = self.take(bits)?;
        Ok(taken.iter().fold(BigInt::zero(), |acc, b| {
            (acc << 1u32) + if *b { BigInt::one() } else { BigInt::zero() }
        }))
    }

    pub fn preload_uint(&self, bits: usize) -> Result<BigInt> {
        self.clone().load_uint(bits)
    }

    pub fn load_int(&mut self, bits: usize) -> Result<BigInt> {
        let value = self.load_uint(bits)?;
        if bits > 0 && value.bit(bits as u64 - 1) {
            Ok(value - (BigInt::one() << bits))
        } else {
            Ok(value)
        }
    }

    pub fn load_coins(&mut self) -> Result<BigInt> {
        let len = self
            .load_uint(4)?
            .to_usize()
            .unwrap_or_default();
        self.load_uint(len * 8)
    }

    pub fn load_ref(&mut self) -> Result<Cell> {
        if self.remaining_refs() == 0 {
            return Err(CellError::RefUnderflow);
        }
        let cell = self.cell.refs[self.ref_pos].clone();
        self.ref_pos += 1;
        Ok(cell)
    }

    /// Splits off the next `bits` bits as a reference-free slice.
    pub fn load_bits(&mut self, bits: usize) -> Result<CellSlice> {
        let taken = self.take(bits)?.to_vec();
        Ok(CellSlice::new(Cell {
            bits: taken,
            refs: Vec::new(),
        }))
    }

    pub fn skip_bits(&mut self, bits: usize) -> Result<()> {
        self.take(bits).map(|_| ())
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(bits_to_bytes(self.take(len * 8)?))
    }

    /// The unread remainder as a standalone cell.
    pub fn to_cell(&self) -> Cell {
        Cell {
            bits: self.remaining_bit_values().to_vec(),
            refs: self.remaining_ref_values().to_vec(),
        }
    }
}
