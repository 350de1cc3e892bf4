/*! Runtime helpers called by generated code.
 *
 * Helpers are emitted on first use into the stdlib section. Dictionary primitives are provided by
 * the runtime library that ships with the target toolchain and are only marked as skipped.
 */

use crate::backend::Backend;
use crate::context::Location;
use crate::errors::{CodegenError, Result};
use crate::exit_codes;
use cellgen_ir::builder::*;
use cellgen_ir::{BinaryOp, Expr, FuncType, FunctionSignature, ModuleItem, Stmt};

pub const VERIFY_ADDRESS: &str = "__tact_verify_address";
pub const LOAD_ADDRESS: &str = "__tact_load_address";
pub const STORE_ADDRESS: &str = "__tact_store_address";
pub const NOT_NULL: &str = "__tact_not_null";
pub const EMPTY_SLICE: &str = "__tact_empty_slice";
pub const CONTEXT_GET_SENDER: &str = "__tact_context_get_sender";
pub const DICT_GET_CODE: &str = "__tact_dict_get_code";

pub const SLICE_EQ_BITS: &str = "__tact_slice_eq_bits";
pub const SLICE_EQ_BITS_NULLABLE: &str = "__tact_slice_eq_bits_nullable";
pub const SLICE_EQ_BITS_NULLABLE_ONE: &str = "__tact_slice_eq_bits_nullable_one";
pub const CELL_EQ: &str = "__tact_cell_eq";
pub const CELL_EQ_NULLABLE: &str = "__tact_cell_eq_nullable";
pub const CELL_EQ_NULLABLE_ONE: &str = "__tact_cell_eq_nullable_one";
pub const SLICE_EQ: &str = "__tact_slice_eq";
pub const SLICE_EQ_NULLABLE: &str = "__tact_slice_eq_nullable";
pub const SLICE_EQ_NULLABLE_ONE: &str = "__tact_slice_eq_nullable_one";
pub const INT_EQ_NULLABLE: &str = "__tact_int_eq_nullable";
pub const INT_EQ_NULLABLE_ONE: &str = "__tact_int_eq_nullable_one";

pub const CONTEXT: &str = "__tact_context";
pub const CONTEXT_SENDER: &str = "__tact_context_sender";
pub const CONTEXT_SYS: &str = "__tact_context_sys";

const TUPLE_CREATE: &str = "__tact_tuple_create_";
const TUPLE_DESTROY: &str = "__tact_tuple_destroy_";
const DICT_PREFIX: &str = "__tact_dict_";

pub fn tuple_create(arity: usize) -> String {
    format!("{}{}", TUPLE_CREATE, arity)
}

pub fn tuple_destroy(arity: usize) -> String {
    format!("{}{}", TUPLE_DESTROY, arity)
}

/// Registers the helper `name` unless it is already there.
pub fn ensure(backend: &mut Backend<'_>, name: &str) -> Result<()> {
    if backend.emission.has(name) {
        return Ok(());
    }
    if name.starts_with(DICT_PREFIX) && name != DICT_GET_CODE {
        backend.emission.skip(name);
        return Ok(());
    }
    if name == CONTEXT_GET_SENDER {
        declare_context_globals(backend);
    }

    let (item, depends) = define(name)?;
    for dep in &depends {
        ensure(backend, dep)?;
    }
    backend.emission.register(item, Location::Stdlib, depends)
}

pub fn declare_context_globals(backend: &mut Backend<'_>) {
    backend.emission.global(
        FuncType::Tensor(vec![
            FuncType::Int,
            FuncType::Slice,
            FuncType::Int,
            FuncType::Slice,
        ]),
        CONTEXT,
    );
    backend.emission.global(FuncType::Slice, CONTEXT_SENDER);
    backend.emission.global(FuncType::Cell, CONTEXT_SYS);
}

fn define(name: &str) -> Result<(ModuleItem, Vec<String>)> {
    if let Some(arity) = arity(name, TUPLE_CREATE) {
        let vars = type_vars(arity);
        let item = FunctionSignature::new(name)
            .forall(vars.clone())
            .param(FuncType::Tensor(vars.into_iter().map(FuncType::Var).collect()), "v")
            .returns(FuncType::tuple())
            .asm([format!("{} TUPLE", arity)]);
        return Ok((item, vec![]));
    }
    if let Some(arity) = arity(name, TUPLE_DESTROY) {
        let vars = type_vars(arity);
        let item = FunctionSignature::new(name)
            .forall(vars.clone())
            .param(FuncType::tuple(), "v")
            .returns(FuncType::Tensor(vars.into_iter().map(FuncType::Var).collect()))
            .asm([format!("{} UNTUPLE", arity)]);
        return Ok((item, vec![]));
    }

    let item = match name {
        VERIFY_ADDRESS => FunctionSignature::new(name)
            .param(FuncType::Slice, "address")
            .returns(FuncType::Slice)
            .inline()
            .define(vec![
                throw_unless(
                    exit_codes::INVALID_ADDRESS,
                    eq(method(id("address"), "slice_bits", vec![]), int(267)),
                ),
                var(id("h"), method(id("address"), "preload_uint", vec![int(11)])),
                throw_unless(
                    exit_codes::INVALID_ADDRESS,
                    eq(binary(id("h"), BinaryOp::Shr, int(8)), int(4)),
                ),
                throw_unless(exit_codes::NOT_BASECHAIN, eq(id("h"), int(1024))),
                ret(id("address")),
            ]),
        LOAD_ADDRESS => FunctionSignature::new(name)
            .param(FuncType::Slice, "cs")
            .returns(FuncType::Tensor(vec![FuncType::Slice, FuncType::Slice]))
            .inline()
            .define(vec![
                typed_var(FuncType::Slice, "raw", modify(id("cs"), "load_msg_addr", vec![])),
                ret(tensor(vec![id("cs"), call(VERIFY_ADDRESS, vec![id("raw")])])),
            ]),
        STORE_ADDRESS => FunctionSignature::new(name)
            .param(FuncType::Builder, "b")
            .param(FuncType::Slice, "address")
            .returns(FuncType::Builder)
            .inline()
            .define(vec![ret(method(
                id("b"),
                "store_slice",
                vec![call(VERIFY_ADDRESS, vec![id("address")])],
            ))]),
        NOT_NULL => FunctionSignature::new(name)
            .forall(["X"])
            .param(FuncType::Var("X".into()), "x")
            .returns(FuncType::Var("X".into()))
            .inline()
            .define(vec![
                throw_if(exit_codes::NULL_REFERENCE, is_null(id("x"))),
                ret(id("x")),
            ]),
        EMPTY_SLICE => FunctionSignature::new(name)
            .returns(FuncType::Slice)
            .asm(["<b b> <s PUSHSLICE"]),
        CONTEXT_GET_SENDER => FunctionSignature::new(name)
            .returns(FuncType::Slice)
            .inline()
            .define(vec![ret(id(CONTEXT_SENDER))]),
        DICT_GET_CODE => FunctionSignature::new(name)
            .param(FuncType::Cell, "dict")
            .param(FuncType::Int, "id")
            .returns(FuncType::Cell)
            .inline()
            .define(vec![
                var(
                    tensor(vec![id("data"), id("ok")]),
                    method(id("dict"), "udict_get_ref?", vec![int(16), id("id")]),
                ),
                throw_unless(exit_codes::CODE_NOT_FOUND, id("ok")),
                ret(id("data")),
            ]),
        SLICE_EQ_BITS => plain(name, FuncType::Slice, bits_equal),
        SLICE_EQ_BITS_NULLABLE_ONE => nullable_one(name, FuncType::Slice, bits_equal),
        SLICE_EQ_BITS_NULLABLE => nullable_both(name, FuncType::Slice, bits_equal),
        CELL_EQ => plain(name, FuncType::Cell, hash_equal("cell_hash")),
        CELL_EQ_NULLABLE_ONE => nullable_one(name, FuncType::Cell, hash_equal("cell_hash")),
        CELL_EQ_NULLABLE => nullable_both(name, FuncType::Cell, hash_equal("cell_hash")),
        SLICE_EQ => plain(name, FuncType::Slice, hash_equal("slice_hash")),
        SLICE_EQ_NULLABLE_ONE => nullable_one(name, FuncType::Slice, hash_equal("slice_hash")),
        SLICE_EQ_NULLABLE => nullable_both(name, FuncType::Slice, hash_equal("slice_hash")),
        INT_EQ_NULLABLE_ONE => nullable_one(name, FuncType::Int, native_equal),
        INT_EQ_NULLABLE => nullable_both(name, FuncType::Int, native_equal),
        other => {
            return Err(CodegenError::internal(format!(
                "unknown runtime helper {}",
                other
            )))
        }
    };

    let depends = match name {
        LOAD_ADDRESS | STORE_ADDRESS => vec![VERIFY_ADDRESS.to_string()],
        _ => vec![],
    };
    Ok((item, depends))
}

fn arity(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}

fn type_vars(arity: usize) -> Vec<String> {
    (0..arity).map(|i| format!("X{}", i)).collect()
}

fn bits_equal(a: Expr, b: Expr) -> Expr {
    call("equal_slice_bits", vec![a, b])
}

fn native_equal(a: Expr, b: Expr) -> Expr {
    eq(a, b)
}

fn hash_equal(hasher: &'static str) -> impl Fn(Expr, Expr) -> Expr {
    move |a, b| eq(method(a, hasher, vec![]), method(b, hasher, vec![]))
}

fn plain(name: &str, ty: FuncType, compare: impl Fn(Expr, Expr) -> Expr) -> ModuleItem {
    comparator(name, ty).define(vec![ret(compare(id("a"), id("b")))])
}

/// `a` may be null, `b` may not.
fn nullable_one(name: &str, ty: FuncType, compare: impl Fn(Expr, Expr) -> Expr) -> ModuleItem {
    comparator(name, ty).define(vec![ret(ternary(
        is_null(id("a")),
        bool_lit(false),
        compare(id("a"), id("b")),
    ))])
}

fn nullable_both(name: &str, ty: FuncType, compare: impl Fn(Expr, Expr) -> Expr) -> ModuleItem {
    let body: Vec<Stmt> = vec![
        var(id("a_is_null"), is_null(id("a"))),
        var(id("b_is_null"), is_null(id("b"))),
        ret(ternary(
            binary(id("a_is_null"), BinaryOp::And, id("b_is_null")),
            bool_lit(true),
            ternary(
                binary(not(id("a_is_null")), BinaryOp::And, not(id("b_is_null"))),
                compare(id("a"), id("b")),
                bool_lit(false),
            ),
        )),
    ];
    comparator(name, ty).define(body)
}

fn comparator(name: &str, ty: FuncType) -> FunctionSignature {
    FunctionSignature::new(name)
        .param(ty.clone(), "a")
        .param(ty, "b")
        .returns(FuncType::Int)
        .inline()
}
