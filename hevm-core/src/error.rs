use std::fmt;

use crate::vm::SlotId;

/// Fatal conditions raised while a script slot executes.
///
/// Every variant is fatal to the slot that raised it and to that slot only.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid opcode 0x{opcode:02X}")]
    InvalidOpcode { opcode: u8 },

    #[error("opcode 0x{opcode:02X} ({name}) is not supported by this core")]
    UnsupportedOpcode { opcode: u8, name: String },

    #[error("invalid sub-opcode {sub} (0x{sub:02X}) for {family}")]
    InvalidSubOpcode { family: &'static str, sub: u8 },

    #[error("pc out of range: pc=0x{pc:X}, bytecode_len=0x{len:X}")]
    PcOutOfRange { pc: u32, len: u32 },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow (limit={limit})")]
    StackOverflow { limit: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown variable id {id} (0x{id:04X})")]
    UnknownVariable { id: u16 },

    #[error("reference to zeroed array pointer (var {var})")]
    NullArrayRef { var: u16 },

    #[error("unknown array handle {handle}")]
    UnknownArray { handle: i32 },

    #[error("out of array handles (max={max})")]
    NoFreeArray { max: usize },

    #[error("array {handle} index out of bounds: row={row}, col={col} (dim2={dim2:?}, dim1={dim1:?})")]
    ArrayOutOfBounds {
        handle: i32,
        row: i32,
        col: i32,
        dim1: (i32, i32),
        dim2: (i32, i32),
    },

    #[error("invalid array bounds dim2={dim2:?} dim1={dim1:?}")]
    BadBounds { dim1: (i32, i32), dim2: (i32, i32) },

    #[error("array {handle} redim mismatch: {old} elements, requested {new}")]
    RedimMismatch { handle: i32, old: usize, new: usize },

    #[error("stack list of {count} items exceeds {max}")]
    TooManyItems { count: i32, max: usize },

    #[error("pick index {index} out of range (len={len})")]
    PickOutOfRange { index: i32, len: usize },

    #[error("timer {timer} out of range")]
    BadTimer { timer: i32 },

    #[error("freeze depth of slot {slot} would go negative")]
    NegativeFreezeDepth { slot: SlotId },

    #[error("slot {slot} is not waiting")]
    NotWaiting { slot: SlotId },

    #[error("no free script slot")]
    NoFreeSlot,

    #[error("too many nested scripts (max={max})")]
    NestingTooDeep { max: usize },

    #[error("missing resource {key}")]
    ResourceMissing { key: String },

    #[error("{0}")]
    InvalidState(String),
}

pub type VmResult<T> = std::result::Result<T, VmError>;

/// A fatal error attributed to the slot, script and program counter that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    pub slot: SlotId,
    pub script: i32,
    pub pc: u32,
    pub opcode: Option<u8>,
    pub error: VmError,
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(op) => write!(
                f,
                "script {} (slot {}) faulted at pc=0x{:X} opcode=0x{:02X}: {}",
                self.script, self.slot, self.pc, op, self.error
            ),
            None => write!(
                f,
                "script {} (slot {}) faulted at pc=0x{:X}: {}",
                self.script, self.slot, self.pc, self.error
            ),
        }
    }
}

impl std::error::Error for ScriptFault {}
