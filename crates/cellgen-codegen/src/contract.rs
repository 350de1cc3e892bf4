/*! Contract assembly.
 *
 * A contract compiles to a fixed set of functions around its receivers. Persistent data is a cell
 * holding the system cell reference, an "initialized" bit and then either the contract state or,
 * before the first message, the arguments its init was deployed with. `contract_load` turns that
 * cell into `self`, running the init on first use, and `contract_store` writes it back.
 *
 * Incoming messages go through a router per direction. The router owns the whole dispatch order
 * (bounced bodies, then opcodes, then empty and text bodies, then the fallback), so the entrypoints
 * only set up the context globals, load, route and store. Every handler is a mutating method
 * returning `(self, ())`, which lets the router thread `self` through with `~`.
 */

use crate::backend::{Backend, Deps};
use crate::codec::{self, Shape};
use crate::context::Location;
use crate::errors::{CodegenError, Result};
use crate::exit_codes;
use crate::functions::{self, external_representation};
use crate::literals;
use crate::lower::{Lowerer, Scope};
use crate::naming;
use crate::runtime;
use cellgen_ir::builder::*;
use cellgen_ir::{BinaryOp, Expr, FuncType, FunctionSignature, ModuleItem, Stmt, UnaryOp};
use cellgen_model::types::{
    FunctionBody, FunctionDescription, MessageSelector, ParamDescription, PrimitiveKind,
    ReceiverDescription, ReceiverSelector, TypeDescription, TypeRef,
};
use tracing::{debug, info};

/// Emits everything a deployable contract consists of and returns the names that form its
/// external interface: the entrypoints and the get-methods.
pub fn emit_contract(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<Vec<String>> {
    if !desc.is_contract() {
        return Err(CodegenError::internal(format!(
            "{} is not a contract",
            desc.name
        )));
    }
    if backend.config.debug_comments {
        backend
            .emission
            .header(ModuleItem::Comment(vec![format!("Contract {}", desc.name)]));
    }
    runtime::declare_context_globals(backend);

    let shape = Shape::of_type(backend, desc)?;
    codec::emit_writer(backend, &shape, false)?;
    codec::emit_reader(backend, &shape, false)?;

    for function in desc.functions.values() {
        functions::emit_function(backend, function)?;
    }
    emit_init(backend, desc)?;
    emit_load(backend, desc)?;
    emit_store(backend, desc)?;

    let mut handlers = Vec::with_capacity(desc.receivers.len());
    for receiver in &desc.receivers {
        let name = emit_receiver(backend, desc, receiver)?;
        handlers.push(Handler { receiver, name });
    }

    let mut roots = vec![naming::RECV_INTERNAL.to_string()];
    emit_router(backend, desc, &handlers, Direction::Internal)?;
    emit_recv_internal(backend, desc)?;
    if handlers.iter().any(|h| h.direction() == Direction::External) {
        emit_router(backend, desc, &handlers, Direction::External)?;
        emit_recv_external(backend, desc)?;
        roots.push(naming::RECV_EXTERNAL.to_string());
    }

    for getter in desc.getters() {
        roots.push(emit_getter(backend, desc, getter)?);
    }
    info!(contract = %desc.name, receivers = handlers.len(), roots = roots.len(), "contract emitted");
    Ok(roots)
}

/// What another contract needs to deploy this one: the init-argument codecs and `init_child`.
pub fn emit_child_support(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let shape = Shape::init_args(backend, desc)?;
    codec::emit_writer(backend, &shape, false)?;
    codec::emit_reader(backend, &shape, false)?;
    emit_init_child(backend, desc)
}

/// `(crc16(name) & 0xffff) | 0x10000`, the id a get-method gets unless it declares one.
pub fn default_method_id(name: &str) -> u32 {
    (u32::from(crc16(name.as_bytes())) & 0xffff) | 0x10000
}

/// CRC-16/XMODEM.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn init_params(desc: &TypeDescription) -> &[ParamDescription] {
    desc.init
        .as_ref()
        .map(|init| init.params.as_slice())
        .unwrap_or_default()
}

fn location(desc: &TypeDescription) -> Location {
    Location::Contract(desc.name.clone())
}

fn self_type(desc: &TypeDescription) -> TypeRef {
    TypeRef::named(desc.name.clone())
}

/// `$C$_contract_init(params) -> self`: field defaults, then the init body.
fn emit_init(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let layout = backend.layout;
    let params = init_params(desc);
    let mut signature = FunctionSignature::new(naming::contract_init(&desc.name))
        .impure()
        .inline();
    let mut body = Vec::new();
    for param in params {
        let name = naming::local(&param.name);
        signature = signature.param(layout.representation(&param.ty)?, &name);
        if layout.is_unpacked(&param.ty)? {
            body.push(var(layout.unpack(&param.ty, &name)?, id(&name)));
        }
    }

    let stmts = desc
        .init
        .as_ref()
        .map(|init| init.body.as_slice())
        .unwrap_or_default();
    let mut lowerer = Lowerer::new(backend, Scope::init(&desc.name));
    let initial = if desc.fields.is_empty() {
        call("empty_tuple", vec![])
    } else {
        let mut values = Vec::with_capacity(desc.fields.len());
        for field in &desc.fields {
            values.push(match &field.default {
                Some(value) => lowerer.literal(value, &field.ty)?,
                None => layout.null_pattern(&field.ty)?,
            });
        }
        tensor(values)
    };
    body.push(var(lowerer.self_binding()?, initial));
    body.extend(lowerer.statements(stmts)?);
    if !stmts.last().map_or(false, |stmt| stmt.is_return()) {
        body.push(ret(lowerer.returned(None)?));
    }
    let deps = lowerer.into_deps();

    let item = signature
        .returns(layout.representation(&self_type(desc))?)
        .define(body);
    backend.emission.register(item, location(desc), deps)
}

/// `$C$_init_child(sys', params) -> (code, data)`: the state a deploy message carries.
///
/// The child's code is looked up by uid in the dictionary the parent's system cell holds, and the
/// same system cell becomes the first reference of the child's data.
fn emit_init_child(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let layout = backend.layout;
    let params = init_params(desc);
    let mut deps = Deps::new();
    let get_code = backend.helper(&mut deps, runtime::DICT_GET_CODE)?;
    let store = deps.used(naming::writer(&naming::init_args(&desc.name)));

    let mut signature = FunctionSignature::new(naming::init_child(&desc.name))
        .param(FuncType::Cell, "sys'")
        .returns(FuncType::Tensor(vec![FuncType::Cell, FuncType::Cell]))
        .inline();
    for param in params {
        signature = signature.param(layout.representation(&param.ty)?, naming::local(&param.name));
    }
    let args = if params.is_empty() {
        call("empty_tuple", vec![])
    } else {
        tensor(params.iter().map(|p| id(naming::local(&p.name))).collect())
    };

    let body = vec![
        var(id("sc'"), method(id("sys'"), "begin_parse", vec![])),
        var(id("source"), modify(id("sc'"), "load_dict", vec![])),
        typed_var(
            FuncType::Cell,
            "code",
            call(get_code, vec![id("source"), int(desc.uid)]),
        ),
        var(
            id("data"),
            method(
                method(call("begin_cell", vec![]), "store_ref", vec![id("sys'")]),
                "store_int",
                vec![bool_lit(false), int(1)],
            ),
        ),
        assign_stmt(id("data"), call(store, vec![id("data"), args])),
        ret(tensor(vec![
            id("code"),
            method(id("data"), "end_cell", vec![]),
        ])),
    ];
    backend
        .emission
        .register(signature.define(body), location(desc), deps)
}

/// `$C$_contract_load() -> self`, running the init when the data still holds its arguments.
fn emit_load(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let layout = backend.layout;
    let params = init_params(desc);
    let mut deps = Deps::new();
    let reader = deps.used(naming::reader(&desc.name));
    let args_reader = deps.used(naming::reader(&naming::init_args(&desc.name)));
    let init = deps.used(naming::contract_init(&desc.name));

    let sc = || id("$sc");
    let mut body = vec![
        var(sc(), method(call("get_data", vec![]), "begin_parse", vec![])),
        assign_stmt(id(runtime::CONTEXT_SYS), modify(sc(), "load_ref", vec![])),
        var(id("$loaded"), modify(sc(), "load_int", vec![int(1)])),
        if_then(id("$loaded"), vec![ret(modify(sc(), reader, vec![]))]),
    ];
    let mut init_args = Vec::with_capacity(params.len());
    if params.is_empty() {
        body.push(expr_stmt(modify(sc(), args_reader, vec![])));
    } else {
        let fields: Vec<(&str, &TypeRef)> =
            params.iter().map(|p| (p.name.as_str(), &p.ty)).collect();
        body.push(var(
            layout.fields_unpack(&fields, "args")?,
            modify(sc(), args_reader, vec![]),
        ));
        for param in params {
            init_args.push(layout.unpack(&param.ty, &naming::tick("args", &param.name))?);
        }
    }
    body.push(expr_stmt(method(sc(), "end_parse", vec![])));
    body.push(ret(call(init, init_args)));

    let item = FunctionSignature::new(naming::contract_load(&desc.name))
        .returns(layout.representation(&self_type(desc))?)
        .impure()
        .inline()
        .define(body);
    backend.emission.register(item, location(desc), deps)
}

/// `$C$_contract_store(v)`: marks the data initialized and persists the state after it.
fn emit_store(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let layout = backend.layout;
    let mut deps = Deps::new();
    let writer = deps.used(naming::writer(&desc.name));
    let body = vec![
        var(id("b"), call("begin_cell", vec![])),
        assign_stmt(
            id("b"),
            method(id("b"), "store_ref", vec![id(runtime::CONTEXT_SYS)]),
        ),
        assign_stmt(
            id("b"),
            method(id("b"), "store_int", vec![bool_lit(true), int(1)]),
        ),
        assign_stmt(id("b"), call(writer, vec![id("b"), id("v")])),
        expr_stmt(call("set_data", vec![method(id("b"), "end_cell", vec![])])),
    ];
    let item = FunctionSignature::new(naming::contract_store(&desc.name))
        .param(layout.representation(&self_type(desc))?, "v")
        .impure()
        .inline()
        .define(body);
    backend.emission.register(item, location(desc), deps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Internal,
    External,
    Bounced,
}

struct Handler<'d> {
    receiver: &'d ReceiverDescription,
    name: String,
}

impl Handler<'_> {
    fn direction(&self) -> Direction {
        match &self.receiver.selector {
            ReceiverSelector::Internal { .. } => Direction::Internal,
            ReceiverSelector::External { .. } => Direction::External,
            ReceiverSelector::BounceBinary { .. } | ReceiverSelector::BounceFallback => {
                Direction::Bounced
            }
        }
    }

    fn message(&self, direction: Direction) -> Option<&MessageSelector> {
        match (&self.receiver.selector, direction) {
            (ReceiverSelector::Internal { selector }, Direction::Internal)
            | (ReceiverSelector::External { selector }, Direction::External) => Some(selector),
            _ => None,
        }
    }

    /// `$self~handler(args); return ($self, true);`
    fn dispatch(&self, args: Vec<Expr>) -> Vec<Stmt> {
        vec![
            expr_stmt(modify(id(naming::self_name()), &self.name, args)),
            handled(true),
        ]
    }
}

fn handled(value: bool) -> Stmt {
    ret(tensor(vec![id(naming::self_name()), bool_lit(value)]))
}

/// Emitted name of a receiver: direction plus a selector that is unique per direction.
pub fn receiver_name(contract: &str, selector: &ReceiverSelector) -> Result<String> {
    let (direction, message) = match selector {
        ReceiverSelector::Internal { selector } => ("internal", selector),
        ReceiverSelector::External { selector } => ("external", selector),
        ReceiverSelector::BounceBinary { type_name, .. } => {
            return Ok(naming::receiver(
                contract,
                "bounced",
                &format!("binary_{}", type_name),
            ))
        }
        ReceiverSelector::BounceFallback => {
            return Ok(naming::receiver(contract, "bounced", "fallback"))
        }
    };
    let selector = match message {
        MessageSelector::Binary { type_name } => format!("binary_{}", type_name),
        MessageSelector::Empty => "empty".to_string(),
        MessageSelector::Comment { text } => {
            format!("comment_{}", literals::comment_cell(text)?.hash_hex())
        }
        MessageSelector::CommentFallback => "comment_fallback".to_string(),
        MessageSelector::Fallback => "fallback".to_string(),
    };
    Ok(naming::receiver(contract, direction, &selector))
}

/// Type of the value a handler is called with, if any.
fn payload_type(selector: &ReceiverSelector) -> Option<TypeRef> {
    let slice = || Some(TypeRef::named(PrimitiveKind::Slice.type_name()));
    match selector {
        ReceiverSelector::Internal { selector } | ReceiverSelector::External { selector } => {
            match selector {
                MessageSelector::Binary { type_name } => Some(TypeRef::named(type_name.clone())),
                MessageSelector::Empty | MessageSelector::Comment { .. } => None,
                MessageSelector::CommentFallback | MessageSelector::Fallback => slice(),
            }
        }
        ReceiverSelector::BounceBinary {
            type_name,
            bounced: true,
        } => Some(TypeRef::Bounced {
            name: type_name.clone(),
        }),
        ReceiverSelector::BounceBinary { type_name, .. } => Some(TypeRef::named(type_name.clone())),
        ReceiverSelector::BounceFallback => slice(),
    }
}

fn emit_receiver(
    backend: &mut Backend<'_>,
    desc: &TypeDescription,
    receiver: &ReceiverDescription,
) -> Result<String> {
    let layout = backend.layout;
    let name = receiver_name(&desc.name, &receiver.selector)?;
    let self_ty = self_type(desc);
    let payload = payload_type(&receiver.selector);

    let mut params: Vec<(String, &TypeRef)> = vec![(naming::self_name(), &self_ty)];
    if let Some(ty) = &payload {
        let binding = receiver.param.as_deref().unwrap_or("_");
        params.push((naming::local(binding), ty));
    }
    let mut signature = FunctionSignature::new(&name).impure().inline();
    for (param, ty) in &params {
        signature = signature.param(layout.representation(ty)?, param);
    }
    let returns = FuncType::Tensor(vec![layout.representation(&self_ty)?, FuncType::unit()]);

    let (body, deps) =
        functions::lower_body(backend, Scope::handler(&desc.name), &params, &receiver.body)?;
    backend
        .emission
        .register(signature.returns(returns).define(body), location(desc), deps)?;
    debug!(receiver = %name, "receiver emitted");
    Ok(name)
}

fn opcode_of(backend: &Backend<'_>, type_name: &str) -> Result<u32> {
    backend.table().get(type_name)?.header.ok_or_else(|| {
        CodegenError::internal(format!("{} is received as a message but has no opcode", type_name))
    })
}

/// `$C$_contract_router_{internal,external}(self, [msg_bounced,] in_msg) -> (self, handled)`.
fn emit_router(
    backend: &mut Backend<'_>,
    desc: &TypeDescription,
    handlers: &[Handler<'_>],
    direction: Direction,
) -> Result<()> {
    let layout = backend.layout;
    let opcode_bits = backend.config.opcode_bits;
    let mut deps = Deps::new();
    for handler in handlers {
        deps.used(handler.name.as_str());
    }
    let in_msg = || id("in_msg");
    let mut body = Vec::new();

    if direction == Direction::Internal {
        body.push(if_then(
            id("msg_bounced"),
            bounce_stage(backend, handlers, &mut deps)?,
        ));
    }

    let messages: Vec<(&Handler<'_>, &MessageSelector)> = handlers
        .iter()
        .filter_map(|h| h.message(direction).map(|m| (h, m)))
        .collect();

    // Opcode
    body.push(typed_var(FuncType::Int, "op", int(0)));
    body.push(if_then(
        binary(
            method(in_msg(), "slice_bits", vec![]),
            BinaryOp::Ge,
            int(opcode_bits),
        ),
        vec![assign_stmt(
            id("op"),
            method(in_msg(), "preload_uint", vec![int(opcode_bits)]),
        )],
    ));

    for (handler, message) in &messages {
        if let MessageSelector::Binary { type_name } = message {
            let opcode = opcode_of(backend, type_name)?;
            let reader = deps.used(naming::reader(type_name));
            let mut branch = vec![var(id("msg"), modify(in_msg(), reader, vec![]))];
            branch.extend(handler.dispatch(vec![id("msg")]));
            body.push(if_then(eq(id("op"), int(opcode)), branch));
        }
    }

    for (handler, message) in &messages {
        if let MessageSelector::Empty = message {
            let empty = binary(
                eq(id("op"), int(0)),
                BinaryOp::And,
                binary(
                    method(in_msg(), "slice_bits", vec![]),
                    BinaryOp::Le,
                    int(opcode_bits),
                ),
            );
            body.push(if_then(empty, handler.dispatch(vec![])));
        }
    }

    // Text
    let mut text = Vec::new();
    for (handler, message) in &messages {
        if let MessageSelector::Comment { text: comment } = message {
            let opcode = literals::comment_opcode(comment)?;
            text.push(if_then(eq(id("text_op"), int(opcode)), handler.dispatch(vec![])));
        }
    }
    for (handler, message) in &messages {
        if let MessageSelector::CommentFallback = message {
            text.push(if_then(
                binary(
                    method(in_msg(), "slice_bits", vec![]),
                    BinaryOp::Ge,
                    int(opcode_bits),
                ),
                handler.dispatch(vec![method(in_msg(), "skip_bits", vec![int(opcode_bits)])]),
            ));
        }
    }
    if !text.is_empty() {
        let mut branch = vec![var(id("text_op"), call("slice_hash", vec![in_msg()]))];
        branch.extend(text);
        body.push(if_then(eq(id("op"), int(0)), branch));
    }

    for (handler, message) in &messages {
        if let MessageSelector::Fallback = message {
            body.extend(handler.dispatch(vec![in_msg()]));
        }
    }
    body.push(handled(false));

    let self_repr = layout.representation(&self_type(desc))?;
    let (name, signature) = match direction {
        Direction::External => (
            naming::router_external(&desc.name),
            FunctionSignature::new(naming::router_external(&desc.name))
                .param(self_repr.clone(), naming::self_name()),
        ),
        _ => (
            naming::router_internal(&desc.name),
            FunctionSignature::new(naming::router_internal(&desc.name))
                .param(self_repr.clone(), naming::self_name())
                .param(FuncType::Int, "msg_bounced"),
        ),
    };
    let item = signature
        .param(FuncType::Slice, "in_msg")
        .returns(FuncType::Tensor(vec![self_repr, FuncType::Int]))
        .impure()
        .inline()
        .define(body);
    backend.emission.register(item, location(desc), deps)?;
    debug!(router = %name, "router emitted");
    Ok(())
}

/// Bounced bodies: skip the marker, match typed handlers by opcode, then the fallback. A bounce
/// nobody handles is still accepted.
fn bounce_stage(
    backend: &Backend<'_>,
    handlers: &[Handler<'_>],
    deps: &mut Deps,
) -> Result<Vec<Stmt>> {
    let opcode_bits = backend.config.opcode_bits;
    let in_msg = || id("in_msg");
    let mut stage = vec![expr_stmt(modify(
        in_msg(),
        "skip_bits",
        vec![int(backend.config.bounce_prefix_bits)],
    ))];

    let typed: Vec<(&Handler<'_>, &str, bool)> = handlers
        .iter()
        .filter_map(|h| match &h.receiver.selector {
            ReceiverSelector::BounceBinary { type_name, bounced } => {
                Some((h, type_name.as_str(), *bounced))
            }
            _ => None,
        })
        .collect();
    if !typed.is_empty() {
        stage.push(typed_var(FuncType::Int, "bounce_op", int(0)));
        stage.push(if_then(
            binary(
                method(in_msg(), "slice_bits", vec![]),
                BinaryOp::Ge,
                int(opcode_bits),
            ),
            vec![assign_stmt(
                id("bounce_op"),
                method(in_msg(), "preload_uint", vec![int(opcode_bits)]),
            )],
        ));
    }
    for (handler, type_name, bounced) in typed {
        let opcode = opcode_of(backend, type_name)?;
        let reader = if bounced {
            naming::reader_bounced(type_name)
        } else {
            naming::reader(type_name)
        };
        let mut branch = vec![var(id("msg"), modify(in_msg(), deps.used(reader), vec![]))];
        branch.extend(handler.dispatch(vec![id("msg")]));
        stage.push(if_then(eq(id("bounce_op"), int(opcode)), branch));
    }

    for handler in handlers {
        if let ReceiverSelector::BounceFallback = handler.receiver.selector {
            stage.push(expr_stmt(modify(
                id(naming::self_name()),
                &handler.name,
                vec![in_msg()],
            )));
        }
    }
    stage.push(handled(true));
    Ok(stage)
}

/// `recv_internal`: sets up the message context, then load, route, store.
fn emit_recv_internal(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let mut deps = Deps::new();
    let verify = backend.helper(&mut deps, runtime::VERIFY_ADDRESS)?;
    let load = deps.used(naming::contract_load(&desc.name));
    let store = deps.used(naming::contract_store(&desc.name));
    let router = deps.used(naming::router_internal(&desc.name));
    let this = || id(naming::self_name());

    let body = vec![
        var(id("cs"), method(id("in_msg_cell"), "begin_parse", vec![])),
        var(id("msg_flags"), modify(id("cs"), "load_uint", vec![int(4)])),
        var(
            id("msg_bounced"),
            unary(
                UnaryOp::Neg,
                binary(id("msg_flags"), BinaryOp::And, int(1)),
            ),
        ),
        typed_var(
            FuncType::Slice,
            "msg_sender_addr",
            call(verify, vec![modify(id("cs"), "load_msg_addr", vec![])]),
        ),
        assign_stmt(
            id(runtime::CONTEXT),
            tensor(vec![
                id("msg_bounced"),
                id("msg_sender_addr"),
                id("msg_value"),
                id("cs"),
            ]),
        ),
        assign_stmt(id(runtime::CONTEXT_SENDER), id("msg_sender_addr")),
        var(this(), call(load, vec![])),
        var(
            id("handled"),
            modify(this(), router, vec![id("msg_bounced"), id("in_msg")]),
        ),
        throw_unless(exit_codes::INVALID_MESSAGE, id("handled")),
        expr_stmt(call(store, vec![this()])),
    ];
    let item = FunctionSignature::new(naming::RECV_INTERNAL)
        .param(FuncType::Int, "msg_value")
        .param(FuncType::Cell, "in_msg_cell")
        .param(FuncType::Slice, "in_msg")
        .impure()
        .define(body);
    backend.emission.register(item, location(desc), deps)
}

fn emit_recv_external(backend: &mut Backend<'_>, desc: &TypeDescription) -> Result<()> {
    let mut deps = Deps::new();
    let load = deps.used(naming::contract_load(&desc.name));
    let store = deps.used(naming::contract_store(&desc.name));
    let router = deps.used(naming::router_external(&desc.name));
    let this = || id(naming::self_name());
    let body = vec![
        var(this(), call(load, vec![])),
        var(id("handled"), modify(this(), router, vec![id("in_msg")])),
        throw_unless(exit_codes::INVALID_MESSAGE, id("handled")),
        expr_stmt(call(store, vec![this()])),
    ];
    let item = FunctionSignature::new(naming::RECV_EXTERNAL)
        .param(FuncType::Slice, "in_msg")
        .impure()
        .define(body);
    backend.emission.register(item, location(desc), deps)
}

/// `%name`: a get-method wrapping the contract method of the same name. Struct arguments and
/// results cross the boundary as tuples, address arguments are verified.
fn emit_getter(
    backend: &mut Backend<'_>,
    desc: &TypeDescription,
    function: &FunctionDescription,
) -> Result<String> {
    if matches!(function.body, FunctionBody::Abstract) {
        return Err(CodegenError::internal(format!(
            "get-method {} has no body",
            function.name
        )));
    }
    let layout = backend.layout;
    let name = naming::getter_method(&function.name);
    let method_id = function
        .method_id
        .unwrap_or_else(|| default_method_id(&function.name));
    let mut deps = Deps::new();
    let load = deps.used(naming::contract_load(&desc.name));
    let callee = deps.used(functions::function_name(function)?);

    let mut signature = FunctionSignature::new(&name).method_id(Some(method_id));
    let mut args = Vec::with_capacity(function.params.len());
    for param in &function.params {
        let binding = naming::local(&param.name);
        match layout.struct_of(&param.ty)? {
            Some(nested) => {
                signature = signature.param(FuncType::tuple(), &binding);
                args.push(functions::from_external_value(
                    backend,
                    &mut deps,
                    nested,
                    param.ty.is_optional(),
                    id(&binding),
                )?);
            }
            None => {
                signature = signature.param(layout.representation(&param.ty)?, &binding);
                let arg = if layout.primitive_of(&param.ty)? == Some(PrimitiveKind::Address) {
                    let verified = call(
                        backend.helper(&mut deps, runtime::VERIFY_ADDRESS)?,
                        vec![id(&binding)],
                    );
                    if param.ty.is_optional() {
                        ternary(is_null(id(&binding)), null(), verified)
                    } else {
                        verified
                    }
                } else {
                    id(&binding)
                };
                args.push(arg);
            }
        }
    }

    let this = || id(naming::self_name());
    let result = if function.mutates {
        modify(this(), callee, args)
    } else {
        let mut all = vec![this()];
        all.extend(args);
        call(callee, all)
    };
    let (returns, value) = match layout.struct_of(&function.returns)? {
        Some(nested) if function.returns.is_optional() => (
            FuncType::tuple(),
            call(
                deps.used(naming::to_opt_external(&nested.name)),
                vec![id("res")],
            ),
        ),
        Some(nested) => (
            external_representation(&layout, nested)?,
            call(deps.used(naming::to_external(&nested.name)), vec![id("res")]),
        ),
        None => (layout.representation(&function.returns)?, id("res")),
    };

    let body = vec![
        var(this(), call(load, vec![])),
        var(id("res"), result),
        ret(value),
    ];
    let item = signature.returns(returns).define(body);
    backend.emission.register(item, location(desc), deps)?;
    debug!(getter = %name, method_id, "get-method emitted");
    Ok(name)
}
