//! Bytecode core for HE-era adventure game scripts.
//!
//! This covers the operand stack, variables and arrays, the opcode table,
//! the cooperative slot scheduler and snapshots. Everything that draws,
//! plays or loads goes through [`host::Host`].

#![allow(clippy::uninlined_format_args)]

pub mod asm;
pub mod config;
pub mod error;
pub mod host;
pub mod opcode;
pub mod registry;
pub mod save;
pub mod trace;
pub mod vm;

pub use config::VmConfig;
pub use error::{ScriptFault, VmError, VmResult};
pub use host::{AssetKey, Host, MemoryHost, NullHost, VmEvent};
pub use registry::CallbackRegistry;
pub use vm::{SlotId, SlotState, StartFlags, Vm};
