//! Names of everything the backend emits.
//!
//! Source identifiers are prefixed with `$` and struct fields are joined with `'`, neither of
//! which a source identifier can contain, so generated names never collide with user names.

pub fn local(name: &str) -> String {
    format!("${}", name)
}

pub fn tick(base: &str, field: &str) -> String {
    format!("{}'{}", base, field)
}

pub fn self_name() -> String {
    local("self")
}

pub fn writer(ty: &str) -> String {
    format!("${}$_store", ty)
}

pub fn writer_cell(ty: &str) -> String {
    format!("${}$_store_cell", ty)
}

pub fn writer_opt(ty: &str) -> String {
    format!("${}$_store_opt", ty)
}

pub fn writer_cell_opt(ty: &str) -> String {
    format!("${}$_store_cell_opt", ty)
}

pub fn reader(ty: &str) -> String {
    format!("${}$_load", ty)
}

pub fn reader_not_mut(ty: &str) -> String {
    format!("${}$_load_not_mut", ty)
}

pub fn reader_bounced(ty: &str) -> String {
    format!("${}$_load_bounced", ty)
}

pub fn reader_opt(ty: &str) -> String {
    format!("${}$_load_opt", ty)
}

pub fn reader_cell_opt(ty: &str) -> String {
    format!("${}$_load_cell_opt", ty)
}

pub fn getter(ty: &str, field: &str) -> String {
    format!("${}$_get_{}", ty, field)
}

pub fn tensor_cast(ty: &str) -> String {
    format!("${}$_tensor_cast", ty)
}

pub fn not_null(ty: &str) -> String {
    format!("${}$_not_null", ty)
}

pub fn as_optional(ty: &str) -> String {
    format!("${}$_as_optional", ty)
}

pub fn to_tuple(ty: &str) -> String {
    format!("${}$_to_tuple", ty)
}

pub fn to_opt_tuple(ty: &str) -> String {
    format!("${}$_to_opt_tuple", ty)
}

pub fn from_tuple(ty: &str) -> String {
    format!("${}$_from_tuple", ty)
}

pub fn from_opt_tuple(ty: &str) -> String {
    format!("${}$_from_opt_tuple", ty)
}

pub fn to_external(ty: &str) -> String {
    format!("${}$_to_external", ty)
}

pub fn to_opt_external(ty: &str) -> String {
    format!("${}$_to_opt_external", ty)
}

pub fn from_external(ty: &str) -> String {
    format!("${}$_from_external", ty)
}

pub fn from_opt_external(ty: &str) -> String {
    format!("${}$_from_opt_external", ty)
}

/// Pseudo-type under which a contract's init arguments are serialized.
pub fn init_args(contract: &str) -> String {
    format!("{}$init", contract)
}

/// Emitted name of a method declared on `ty`.
pub fn method(ty: &str, name: &str) -> String {
    format!("${}$_fun_{}", ty, name)
}

pub fn global_function(name: &str) -> String {
    format!("$global_{}", name)
}

/// Wrapper that runs a mutating method on a value that has no binding to write back to.
pub fn not_mut(function: &str) -> String {
    format!("{}$not_mut", function)
}

pub fn getter_method(name: &str) -> String {
    format!("%{}", name)
}

pub fn contract_init(contract: &str) -> String {
    format!("${}$_contract_init", contract)
}

pub fn init_child(contract: &str) -> String {
    format!("${}$_init_child", contract)
}

pub fn contract_load(contract: &str) -> String {
    format!("${}$_contract_load", contract)
}

pub fn contract_store(contract: &str) -> String {
    format!("${}$_contract_store", contract)
}

pub fn router_internal(contract: &str) -> String {
    format!("${}$_contract_router_internal", contract)
}

pub fn router_external(contract: &str) -> String {
    format!("${}$_contract_router_external", contract)
}

/// `$C$_internal_binary_Msg`, `$C$_external_empty`, ...
pub fn receiver(contract: &str, direction: &str, selector: &str) -> String {
    format!("${}$_{}_{}", contract, direction, selector)
}

pub const RECV_INTERNAL: &str = "recv_internal";
pub const RECV_EXTERNAL: &str = "recv_external";
