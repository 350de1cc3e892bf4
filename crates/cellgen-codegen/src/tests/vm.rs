//! A small interpreter for emitted modules, enough to run codecs, accessors and routers on real
//! cells. Target primitives are modelled on their stack-machine behaviour; dictionary primitives
//! are not.

use crate::context::EmissionOutput;
use crate::naming;
use cellgen_ir::{AugmentedOp, BinaryOp, Conditional, ElseBranch, Expr, ModuleItem, Stmt, UnaryOp};
use cellgen_model::{Address, Cell, CellBuilder, CellError, CellSlice};
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::HashMap;

const STEP_LIMIT: usize = 200_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Null,
    Int(BigInt),
    Cell(Cell),
    Slice(CellSlice),
    Builder(CellBuilder),
    Tuple(Vec<Val>),
    Tensor(Vec<Val>),
}

impl Val {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Val::Int(value.into())
    }

    pub fn bool(value: bool) -> Self {
        if value {
            Val::int(-1)
        } else {
            Val::int(0)
        }
    }

    pub fn address(address: &Address) -> Self {
        Val::Slice(address.to_cell().unwrap().parse())
    }

    pub fn tensor(items: Vec<Val>) -> Self {
        Val::Tensor(items)
    }

    pub fn unit() -> Self {
        Val::Tensor(Vec::new())
    }

    pub fn as_int(&self) -> Result<&BigInt, Fault> {
        match self {
            Val::Int(v) => Ok(v),
            other => Err(Fault::type_check("int", other)),
        }
    }

    pub fn as_cell(&self) -> Result<&Cell, Fault> {
        match self {
            Val::Cell(c) => Ok(c),
            other => Err(Fault::type_check("cell", other)),
        }
    }

    pub fn as_slice(&self) -> Result<&CellSlice, Fault> {
        match self {
            Val::Slice(s) => Ok(s),
            other => Err(Fault::type_check("slice", other)),
        }
    }

    pub fn as_builder(&self) -> Result<&CellBuilder, Fault> {
        match self {
            Val::Builder(b) => Ok(b),
            other => Err(Fault::type_check("builder", other)),
        }
    }

    pub fn truthy(&self) -> Result<bool, Fault> {
        Ok(!self.as_int()?.is_zero())
    }

    fn flatten_into(self, out: &mut Vec<Val>) {
        match self {
            Val::Tensor(items) => items.into_iter().for_each(|item| item.flatten_into(out)),
            leaf => out.push(leaf),
        }
    }

    fn flatten(self) -> Vec<Val> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The program stopped with this exit code.
    Exit(u32),
    /// The interpreter met something it cannot run; always a test or generator bug.
    Bug(String),
}

impl Fault {
    fn bug(message: impl Into<String>) -> Self {
        Fault::Bug(message.into())
    }

    fn type_check(expected: &str, got: &Val) -> Self {
        Fault::Bug(format!("expected {}, got {:?}", expected, got))
    }
}

impl From<CellError> for Fault {
    fn from(err: CellError) -> Self {
        match err {
            CellError::Overflow { .. } => Fault::Exit(8),
            CellError::BitUnderflow { .. }
            | CellError::RefUnderflow
            | CellError::NotConsumed { .. } => Fault::Exit(9),
            CellError::IntegerOutOfRange { .. } => Fault::Exit(5),
            CellError::InvalidBoc(reason) => Fault::Bug(reason),
        }
    }
}

type Frame = HashMap<String, Val>;

pub struct Vm<'m> {
    functions: HashMap<&'m str, &'m ModuleItem>,
    constants: HashMap<&'m str, &'m Expr>,
    globals: HashMap<String, Val>,
    pub data: Cell,
    pub now: u32,
    pub self_address: Address,
    steps: usize,
}

impl<'m> Vm<'m> {
    pub fn new(output: &'m EmissionOutput) -> Self {
        let functions = output
            .functions
            .iter()
            .filter_map(|f| f.definition.as_ref().map(|item| (f.name.as_str(), item)))
            .collect();
        let constants = output
            .constants
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Constant(c) => Some((c.name.as_str(), &c.value)),
                _ => None,
            })
            .collect();
        let globals = output
            .globals
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Global(g) => Some((g.name.clone(), Val::Null)),
                _ => None,
            })
            .collect();
        Self {
            functions,
            constants,
            globals,
            data: Cell::empty(),
            now: 1_700_000_000,
            self_address: Address::new(0, [0x11; 32]),
            steps: 0,
        }
    }

    /// Persistent data of a freshly deployed `contract` that has not run its initializer yet.
    pub fn deploy(&mut self, contract: &str, args: Vec<Val>) -> Result<(), Fault> {
        let mut b = CellBuilder::new();
        b.store_ref(Cell::empty())?;
        b.store_bit(false)?;
        let args = if args.is_empty() {
            Val::Tuple(Vec::new())
        } else {
            Val::Tensor(args)
        };
        let b = self.call(&naming::writer(&naming::init_args(contract)), vec![Val::Builder(b), args])?;
        self.data = b.as_builder()?.build()?;
        Ok(())
    }

    pub fn recv_internal(
        &mut self,
        sender: &Address,
        value: u64,
        body: Cell,
        bounced: bool,
    ) -> Result<(), Fault> {
        let mut envelope = CellBuilder::new();
        envelope.store_uint(&BigInt::from(0b0110 | u8::from(bounced)), 4)?;
        sender.store(&mut envelope)?;
        let envelope = envelope.build()?;
        let in_msg = body.parse();
        self.call(
            naming::RECV_INTERNAL,
            vec![
                Val::int(value),
                Val::Cell(envelope),
                Val::Slice(in_msg),
            ],
        )?;
        Ok(())
    }

    pub fn recv_external(&mut self, body: Cell) -> Result<(), Fault> {
        self.call(naming::RECV_EXTERNAL, vec![Val::Slice(body.parse())])?;
        Ok(())
    }

    pub fn get(&mut self, getter: &str, args: Vec<Val>) -> Result<Val, Fault> {
        self.call(&naming::getter_method(getter), args)
    }

    pub fn global(&self, name: &str) -> Option<&Val> {
        self.globals.get(name)
    }

    pub fn call(&mut self, name: &str, args: Vec<Val>) -> Result<Val, Fault> {
        self.tick()?;
        match self.functions.get(name).copied() {
            Some(ModuleItem::Function(def)) => {
                if def.signature.params.len() != args.len() {
                    return Err(Fault::bug(format!(
                        "{} takes {} arguments, got {}",
                        name,
                        def.signature.params.len(),
                        args.len()
                    )));
                }
                let mut frame = Frame::new();
                for (param, arg) in def.signature.params.iter().zip(args) {
                    frame.insert(param.name.clone(), arg);
                }
                Ok(self.block(&mut frame, &def.body)?.unwrap_or_else(Val::unit))
            }
            Some(ModuleItem::Asm(asm)) => asm_call(&asm.instructions, args),
            Some(other) => Err(Fault::bug(format!("{} is not callable: {:?}", name, other))),
            None => self.builtin(name, args),
        }
    }

    fn tick(&mut self) -> Result<(), Fault> {
        self.steps += 1;
        if self.steps > STEP_LIMIT {
            return Err(Fault::bug("step limit exceeded"));
        }
        Ok(())
    }

    fn block(&mut self, frame: &mut Frame, stmts: &[Stmt]) -> Result<Option<Val>, Fault> {
        for stmt in stmts {
            if let Some(value) = self.stmt(frame, stmt)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn stmt(&mut self, frame: &mut Frame, stmt: &Stmt) -> Result<Option<Val>, Fault> {
        self.tick()?;
        match stmt {
            Stmt::Block(stmts) => self.block(frame, stmts),
            Stmt::Return(value) => Ok(Some(match value {
                Some(expr) => self.eval(frame, expr)?,
                None => Val::unit(),
            })),
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(None)
            }
            Stmt::VarDef { binding, init, .. } => {
                let value = match init {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Val::Null,
                };
                self.bind(frame, binding, value, true)?;
                Ok(None)
            }
            Stmt::If(cond) => self.conditional(frame, cond),
            Stmt::Repeat { count, body } => {
                let count = self.eval(frame, count)?;
                let count = count.as_int()?.to_usize().unwrap_or(0);
                for _ in 0..count {
                    if let Some(value) = self.block(frame, body)? {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            Stmt::While { cond, body } => {
                while self.eval(frame, cond)?.truthy()? {
                    if let Some(value) = self.block(frame, body)? {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            Stmt::Until { body, cond } => loop {
                if let Some(value) = self.block(frame, body)? {
                    return Ok(Some(value));
                }
                if self.eval(frame, cond)?.truthy()? {
                    return Ok(None);
                }
            },
            Stmt::TryCatch {
                body,
                catch_binding,
                catch_body,
            } => match self.block(frame, body) {
                Err(Fault::Exit(code)) => {
                    let caught = Val::Tensor(vec![Val::Null, Val::int(code)]);
                    self.bind(frame, catch_binding, caught, true)?;
                    self.block(frame, catch_body)
                }
                other => other,
            },
        }
    }

    fn conditional(&mut self, frame: &mut Frame, cond: &Conditional) -> Result<Option<Val>, Fault> {
        let hit = self.eval(frame, &cond.cond)?.truthy()? != cond.negated;
        if hit {
            return self.block(frame, &cond.body);
        }
        match &cond.otherwise {
            None => Ok(None),
            Some(ElseBranch::Else(stmts)) => self.block(frame, stmts),
            Some(ElseBranch::ElseIf(next)) => self.conditional(frame, next),
        }
    }

    fn eval_all(&mut self, frame: &mut Frame, exprs: &[Expr]) -> Result<Vec<Val>, Fault> {
        exprs.iter().map(|expr| self.eval(frame, expr)).collect()
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> Result<Val, Fault> {
        self.tick()?;
        match expr {
            Expr::Int(v) => Ok(Val::Int(v.clone())),
            Expr::Bool(v) => Ok(Val::bool(*v)),
            Expr::Ident(name) => self.lookup(frame, name),
            Expr::Hole => Err(Fault::bug("hole used as a value")),
            Expr::Call { callee, args } => {
                let args = self.eval_all(frame, args)?;
                self.call(callee, args)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                modifying,
            } => {
                let mut all = vec![self.eval(frame, receiver)?];
                all.extend(self.eval_all(frame, args)?);
                if !modifying {
                    return self.call(method, all);
                }
                let (updated, result) = if self.functions.contains_key(method.as_str()) {
                    split(self.call(method, all)?)?
                } else {
                    modifying_builtin(method, all)?
                };
                self.bind(frame, receiver, updated, false)?;
                Ok(result)
            }
            Expr::Assign { lhs, rhs } => {
                let value = self.eval(frame, rhs)?;
                self.bind(frame, lhs, value.clone(), false)?;
                Ok(value)
            }
            Expr::AugmentedAssign { lhs, op, rhs } => {
                let current = self.eval(frame, lhs)?;
                let operand = self.eval(frame, rhs)?;
                let value = binary(augmented(*op), &current, &operand)?;
                self.bind(frame, lhs, value.clone(), false)?;
                Ok(value)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, cond)?.truthy()? {
                    self.eval(frame, then)
                } else {
                    self.eval(frame, otherwise)
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                let value = value.as_int()?;
                Ok(Val::Int(match op {
                    UnaryOp::Neg => -value,
                    UnaryOp::BitNot => -value - BigInt::one(),
                }))
            }
            Expr::Tensor(items) => Ok(Val::Tensor(self.eval_all(frame, items)?)),
            Expr::Tuple(items) => Ok(Val::Tuple(self.eval_all(frame, items)?)),
        }
    }

    fn lookup(&mut self, frame: &mut Frame, name: &str) -> Result<Val, Fault> {
        if let Some(value) = frame.get(name).or_else(|| self.globals.get(name)) {
            return Ok(value.clone());
        }
        match self.constants.get(name).copied() {
            Some(expr) => self.eval(&mut Frame::new(), expr),
            None => Err(Fault::bug(format!("unbound name {}", name))),
        }
    }

    fn bind(&mut self, frame: &mut Frame, pattern: &Expr, value: Val, declare: bool) -> Result<(), Fault> {
        match pattern {
            Expr::Hole => Ok(()),
            Expr::Ident(name) => {
                if !declare && !frame.contains_key(name) && self.globals.contains_key(name) {
                    self.globals.insert(name.clone(), value);
                } else {
                    frame.insert(name.clone(), value);
                }
                Ok(())
            }
            Expr::Tensor(patterns) => match value {
                Val::Tensor(values) if values.len() == patterns.len() => {
                    for (pattern, value) in patterns.iter().zip(values) {
                        self.bind(frame, pattern, value, declare)?;
                    }
                    Ok(())
                }
                value if patterns.len() == 1 => self.bind(frame, &patterns[0], value, declare),
                value => {
                    let mut targets = Vec::new();
                    leaf_patterns(pattern, &mut targets);
                    let leaves = value.flatten();
                    if leaves.len() != targets.len() {
                        return Err(Fault::bug(format!(
                            "cannot spread {} values over {:?}",
                            leaves.len(),
                            pattern
                        )));
                    }
                    for (target, leaf) in targets.into_iter().zip(leaves) {
                        self.bind(frame, target, leaf, declare)?;
                    }
                    Ok(())
                }
            },
            other => Err(Fault::bug(format!("cannot assign to {:?}", other))),
        }
    }

    fn builtin(&mut self, name: &str, args: Vec<Val>) -> Result<Val, Fault> {
        let unit = Val::unit;
        match (name, args.as_slice()) {
            ("begin_cell", []) => Ok(Val::Builder(CellBuilder::new())),
            ("empty_tuple", []) => Ok(Val::Tuple(Vec::new())),
            ("null", []) => Ok(Val::Null),
            ("null?", [v]) => Ok(Val::bool(*v == Val::Null)),
            ("throw", [code]) => Err(Fault::Exit(exit_code(code)?)),
            ("throw_if", [code, cond]) => {
                if cond.truthy()? {
                    Err(Fault::Exit(exit_code(code)?))
                } else {
                    Ok(unit())
                }
            }
            ("throw_unless", [code, cond]) => {
                if cond.truthy()? {
                    Ok(unit())
                } else {
                    Err(Fault::Exit(exit_code(code)?))
                }
            }
            ("get_data", []) => Ok(Val::Cell(self.data.clone())),
            ("set_data", [c]) => {
                self.data = c.as_cell()?.clone();
                Ok(unit())
            }
            ("my_address", []) => Ok(Val::address(&self.self_address)),
            ("now", []) => Ok(Val::int(self.now)),
            ("min", [a, b]) => Ok(Val::Int(a.as_int()?.min(b.as_int()?).clone())),
            ("max", [a, b]) => Ok(Val::Int(a.as_int()?.max(b.as_int()?).clone())),
            ("abs", [a]) => Ok(Val::Int(a.as_int()?.abs())),
            ("store_uint", [b, x, n]) => {
                let mut b = b.as_builder()?.clone();
                b.store_uint(x.as_int()?, bits(n)?)?;
                Ok(Val::Builder(b))
            }
            ("store_int", [b, x, n]) => {
                let mut b = b.as_builder()?.clone();
                b.store_int(x.as_int()?, bits(n)?)?;
                Ok(Val::Builder(b))
            }
            ("store_coins", [b, x]) => {
                let mut b = b.as_builder()?.clone();
                b.store_coins(x.as_int()?)?;
                Ok(Val::Builder(b))
            }
            ("store_ref", [b, c]) => {
                let mut b = b.as_builder()?.clone();
                b.store_ref(c.as_cell()?.clone())?;
                Ok(Val::Builder(b))
            }
            ("store_slice", [b, s]) => {
                let mut b = b.as_builder()?.clone();
                b.store_slice(s.as_slice()?)?;
                Ok(Val::Builder(b))
            }
            ("store_builder", [b, other]) => {
                let mut b = b.as_builder()?.clone();
                b.store_builder(other.as_builder()?)?;
                Ok(Val::Builder(b))
            }
            ("store_dict", [b, d]) => {
                let mut b = b.as_builder()?.clone();
                match d {
                    Val::Null => {
                        b.store_bit(false)?;
                    }
                    other => {
                        b.store_bit(true)?;
                        b.store_ref(other.as_cell()?.clone())?;
                    }
                }
                Ok(Val::Builder(b))
            }
            ("end_cell", [b]) => Ok(Val::Cell(b.as_builder()?.build()?)),
            ("begin_parse", [c]) => Ok(Val::Slice(c.as_cell()?.parse())),
            ("slice_bits", [s]) => Ok(Val::int(s.as_slice()?.remaining_bits() as u64)),
            ("slice_refs", [s]) => Ok(Val::int(s.as_slice()?.remaining_refs() as u64)),
            ("preload_uint", [s, n]) => Ok(Val::Int(s.as_slice()?.preload_uint(bits(n)?)?)),
            ("skip_bits", [s, n]) => {
                let mut s = s.as_slice()?.clone();
                s.skip_bits(bits(n)?)?;
                Ok(Val::Slice(s))
            }
            ("end_parse", [s]) => {
                s.as_slice()?.end_parse()?;
                Ok(unit())
            }
            ("cell_hash", [c]) => Ok(hash_value(&c.as_cell()?.hash())),
            ("slice_hash", [s]) => Ok(hash_value(&s.as_slice()?.to_cell().hash())),
            ("equal_slice_bits", [a, b]) => Ok(Val::bool(
                a.as_slice()?.remaining_bit_values() == b.as_slice()?.remaining_bit_values(),
            )),
            _ => Err(Fault::bug(format!(
                "unsupported primitive {} with {} arguments",
                name,
                args.len()
            ))),
        }
    }
}

fn leaf_patterns<'e>(pattern: &'e Expr, out: &mut Vec<&'e Expr>) {
    match pattern {
        Expr::Tensor(items) => items.iter().for_each(|item| leaf_patterns(item, out)),
        leaf => out.push(leaf),
    }
}

fn split(value: Val) -> Result<(Val, Val), Fault> {
    match value {
        Val::Tensor(mut items) if items.len() == 2 => {
            let result = items.pop().unwrap_or(Val::Null);
            let updated = items.pop().unwrap_or(Val::Null);
            Ok((updated, result))
        }
        other => Err(Fault::bug(format!(
            "modifying call returned {:?} instead of a pair",
            other
        ))),
    }
}

fn modifying_builtin(name: &str, args: Vec<Val>) -> Result<(Val, Val), Fault> {
    let (receiver, rest) = args
        .split_first()
        .ok_or_else(|| Fault::bug(format!("{} without a receiver", name)))?;
    let mut s = receiver.as_slice()?.clone();
    let value = match (name, rest) {
        ("load_uint", [n]) => Val::Int(s.load_uint(bits(n)?)?),
        ("load_int", [n]) => Val::Int(s.load_int(bits(n)?)?),
        ("load_coins", []) => Val::Int(s.load_coins()?),
        ("load_ref", []) => Val::Cell(s.load_ref()?),
        ("load_bits", [n]) => Val::Slice(s.load_bits(bits(n)?)?),
        ("skip_bits", [n]) => {
            s.skip_bits(bits(n)?)?;
            Val::unit()
        }
        ("load_dict", []) => {
            if s.load_bit()? {
                Val::Cell(s.load_ref()?)
            } else {
                Val::Null
            }
        }
        ("load_msg_addr", []) => Val::Slice(load_msg_addr(&mut s)?),
        _ => {
            return Err(Fault::bug(format!(
                "unsupported modifying primitive {} with {} arguments",
                name,
                rest.len()
            )))
        }
    };
    Ok((Val::Slice(s), value))
}

/// `addr_none` and `addr_std` without anycast, the only forms the tests send.
fn load_msg_addr(s: &mut CellSlice) -> Result<CellSlice, Fault> {
    match s.preload_uint(2)?.to_u8() {
        Some(0b00) => Ok(s.load_bits(2)?),
        Some(0b10) => Ok(s.load_bits(267)?),
        other => Err(Fault::bug(format!("unsupported address tag {:?}", other))),
    }
}

fn asm_call(instructions: &[String], args: Vec<Val>) -> Result<Val, Fault> {
    let program = instructions.join(" ");
    let words: Vec<&str> = program.split_whitespace().collect();
    let single = |mut args: Vec<Val>| {
        if args.len() == 1 {
            args.pop().unwrap_or(Val::Null)
        } else {
            Val::Tensor(args)
        }
    };
    match words.as_slice() {
        ["NOP"] => Ok(single(args)),
        [arity, "TUPLE"] => {
            let arity: usize = arity.parse().map_err(|_| Fault::bug(program.clone()))?;
            let leaves = Val::Tensor(args).flatten();
            if leaves.len() != arity {
                return Err(Fault::bug(format!("{} over {} values", program, leaves.len())));
            }
            Ok(Val::Tuple(leaves))
        }
        [arity, "UNTUPLE"] => {
            let arity: usize = arity.parse().map_err(|_| Fault::bug(program.clone()))?;
            match single(args) {
                Val::Tuple(items) if items.len() == arity => Ok(Val::Tensor(items)),
                _ => Err(Fault::Exit(7)),
            }
        }
        ["<b", "b>", "<s", "PUSHSLICE"] => Ok(Val::Slice(Cell::empty().parse())),
        [boc, "B>boc", "<s", "PUSHSLICE"] => Ok(Val::Slice(embedded(boc)?.parse())),
        [boc, "B>boc", "PUSHREF"] => Ok(Val::Cell(embedded(boc)?)),
        _ => Err(Fault::bug(format!("unsupported asm body {}", program))),
    }
}

fn embedded(word: &str) -> Result<Cell, Fault> {
    let hex = word
        .strip_prefix("B{")
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| Fault::bug(format!("not a bag literal: {}", word)))?;
    Ok(Cell::from_boc_hex(hex)?)
}

fn augmented(op: AugmentedOp) -> BinaryOp {
    match op {
        AugmentedOp::Add => BinaryOp::Add,
        AugmentedOp::Sub => BinaryOp::Sub,
        AugmentedOp::Mul => BinaryOp::Mul,
        AugmentedOp::Div => BinaryOp::Div,
        AugmentedOp::Mod => BinaryOp::Mod,
        AugmentedOp::Shl => BinaryOp::Shl,
        AugmentedOp::Shr => BinaryOp::Shr,
        AugmentedOp::And => BinaryOp::And,
        AugmentedOp::Or => BinaryOp::Or,
        AugmentedOp::Xor => BinaryOp::Xor,
    }
}

fn binary(op: BinaryOp, lhs: &Val, rhs: &Val) -> Result<Val, Fault> {
    let (a, b) = (lhs.as_int()?, rhs.as_int()?);
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => floor_div(a, b)?,
        BinaryOp::Mod => a - b * floor_div(a, b)?,
        BinaryOp::Shl => a << shift(b)?,
        BinaryOp::Shr => a >> shift(b)?,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Eq => return Ok(Val::bool(a == b)),
        BinaryOp::Ne => return Ok(Val::bool(a != b)),
        BinaryOp::Lt => return Ok(Val::bool(a < b)),
        BinaryOp::Le => return Ok(Val::bool(a <= b)),
        BinaryOp::Gt => return Ok(Val::bool(a > b)),
        BinaryOp::Ge => return Ok(Val::bool(a >= b)),
    };
    Ok(Val::Int(value))
}

fn floor_div(a: &BigInt, b: &BigInt) -> Result<BigInt, Fault> {
    if b.is_zero() {
        return Err(Fault::Exit(4));
    }
    let quotient = a / b;
    let exact = &quotient * b == *a;
    if !exact && (a.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        Ok(quotient - BigInt::one())
    } else {
        Ok(quotient)
    }
}

fn shift(amount: &BigInt) -> Result<usize, Fault> {
    amount.to_usize().filter(|v| *v <= 1023).ok_or(Fault::Exit(5))
}

fn bits(value: &Val) -> Result<usize, Fault> {
    value
        .as_int()?
        .to_usize()
        .ok_or_else(|| Fault::bug(format!("bad width {:?}", value)))
}

fn exit_code(value: &Val) -> Result<u32, Fault> {
    value
        .as_int()?
        .to_u32()
        .ok_or_else(|| Fault::bug(format!("bad exit code {:?}", value)))
}

fn hash_value(hash: &[u8; 32]) -> Val {
    Val::Int(BigInt::from_bytes_be(Sign::Plus, hash))
}
