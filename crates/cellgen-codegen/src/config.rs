use serde::{Deserialize, Serialize};

/// Field-operation count up to which codecs are always inlined.
pub const DEFAULT_SMALL_STRUCT_FIELDS: usize = 5;
/// Width of the `0xFFFFFFFF` marker that prefixes every bounced body.
pub const DEFAULT_BOUNCE_PREFIX_BITS: u32 = 32;
pub const DEFAULT_OPCODE_BITS: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    pub small_struct_fields: usize,
    pub bounce_prefix_bits: u32,
    pub opcode_bits: u32,
    /// Drop functions unreachable from the entrypoints and get-methods.
    pub prune_unused: bool,
    /// Head each contract section with a comment item.
    pub debug_comments: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            small_struct_fields: DEFAULT_SMALL_STRUCT_FIELDS,
            bounce_prefix_bits: DEFAULT_BOUNCE_PREFIX_BITS,
            opcode_bits: DEFAULT_OPCODE_BITS,
            prune_unused: false,
            debug_comments: false,
        }
    }
}

impl CodegenConfig {
    pub fn pruned(mut self) -> Self {
        self.prune_unused = true;
        self
    }
}
