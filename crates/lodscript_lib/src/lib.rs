use serde::{Deserialize, Serialize};
use thiserror::Error;

mod tables {
    include!(concat!(env!("OUT_DIR"), "/script_tables.rs"));
}

pub use tables::{OpInfo, OpType, ParamClass, ParamInfo, ParamType};

mod catalog;
pub use catalog::{opcode_info, param_info, Flow};

mod state;
pub use state::Cursor;

mod meta;
pub use meta::*;

mod script;
pub use script::*;

mod disassembler;
pub use disassembler::{Disassembler, MAX_ENTRYPOINTS};

pub mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    Listing,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassembleOptions {
    pub mode: OutputMode,
    /// Prefix every listing line with the raw words backing the token
    pub hex_dump: bool,
}

impl Default for DisassembleOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Listing,
            hex_dump: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("word read out of bounds at 0x{offset:x} (length=0x{len:x})")]
    OutOfBounds { offset: usize, len: usize },

    #[error("misaligned word read at 0x{0:x}")]
    Misaligned(usize),

    #[error("CALL {index} at 0x{offset:x} has wrong number of args! {expected}/{actual}")]
    CallArgCount { offset: usize, index: u16, expected: usize, actual: usize },

    #[error("CALL {index} at 0x{offset:x} targets a method missing from the script metadata")]
    UnknownMethod { offset: usize, index: u16 },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn disassemble(bytes: &[u8], meta: &ScriptMeta) -> Result<Script, ScriptError> {
    Disassembler::new(meta).disassemble(bytes)
}

pub fn disassemble_with_options(
    bytes: &[u8],
    meta: &ScriptMeta,
    options: DisassembleOptions,
) -> Result<String, ScriptError> {
    let script = disassemble(bytes, meta)?;
    match options.mode {
        OutputMode::Listing => render::listing(&script, bytes, meta, options),
        OutputMode::Yaml => Ok(serde_yaml::to_string(&script)?),
    }
}
