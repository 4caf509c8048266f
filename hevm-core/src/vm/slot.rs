use std::sync::Arc;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{VmError, VmResult};
use crate::host::AssetKey;
use crate::registry::CallbackBinding;

use super::stack::OperandStack;

pub type SlotId = usize;

bitflags! {
    /// Start options decoded from the flags byte of the start opcodes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StartFlags: u8 {
        const RECURSIVE = 0x01;
        const FREEZE_RESISTANT = 0x02;
    }
}

impl StartFlags {
    pub fn from_script_byte(b: u8) -> Self {
        match b {
            195 => StartFlags::RECURSIVE,
            199 => StartFlags::FREEZE_RESISTANT,
            200 => StartFlags::RECURSIVE | StartFlags::FREEZE_RESISTANT,
            _ => StartFlags::empty(),
        }
    }
}

/// Scheduling state, without the freeze counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
    WaitingOnTimer { wake: u64 },
}

/// State as observed from outside: a frozen slot reports `Frozen` whatever
/// its underlying run state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Stopped,
    Running,
    Paused,
    Frozen,
    WaitingOnTimer { wake: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotOwner {
    Global,
    Room,
    Object { object: i32, entry: i32 },
}

/// Where a slot's bytecode came from, so it can be fetched again after a load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeSource {
    Asset(AssetKey),
    Inline(Vec<u8>),
}

/// Everything needed to bind a script to a slot.
#[derive(Clone, Debug)]
pub struct ScriptLaunch {
    pub script: i32,
    pub owner: SlotOwner,
    pub source: CodeSource,
    pub code: Arc<[u8]>,
    pub entry: u32,
    pub flags: StartFlags,
}

#[derive(Clone, Debug)]
pub struct Slot {
    pub id: SlotId,
    pub script: i32,
    pub owner: SlotOwner,
    pub source: CodeSource,
    code: Arc<[u8]>,
    pub pc: u32,
    run: RunState,
    freeze_depth: u32,
    pub flags: StartFlags,
    pub cutscene_depth: u32,
    /// First tick on which the scheduler may pick this slot up.
    pub eligible_from: u64,
    pub did_exec: bool,
    pub yield_requested: bool,
    pub locals: Vec<i32>,
    pub stack: OperandStack,
    pub messages: Vec<Vec<u8>>,
    pub callbacks: Vec<CallbackBinding>,
    generation: u64,
}

impl Slot {
    pub fn empty(id: SlotId, local_count: usize, stack_limit: usize) -> Self {
        Self {
            id,
            script: 0,
            owner: SlotOwner::Global,
            source: CodeSource::Inline(Vec::new()),
            code: Arc::from(Vec::new()),
            pc: 0,
            run: RunState::Stopped,
            freeze_depth: 0,
            flags: StartFlags::empty(),
            cutscene_depth: 0,
            eligible_from: 0,
            did_exec: false,
            yield_requested: false,
            locals: vec![0; local_count],
            stack: OperandStack::new(stack_limit),
            messages: Vec::new(),
            callbacks: Vec::new(),
            generation: 0,
        }
    }

    /// Binds new code and marks the slot running. Locals are cleared and the
    /// start arguments copied into them.
    pub fn start(&mut self, launch: ScriptLaunch, args: &[i32]) {
        self.script = launch.script;
        self.owner = launch.owner;
        self.source = launch.source;
        self.code = launch.code;
        self.pc = launch.entry;
        self.run = RunState::Running;
        self.freeze_depth = 0;
        self.flags = launch.flags;
        self.cutscene_depth = 0;
        self.did_exec = false;
        self.yield_requested = false;
        self.locals.iter_mut().for_each(|v| *v = 0);
        for (l, a) in self.locals.iter_mut().zip(args) {
            *l = *a;
        }
        self.stack.clear();
        self.messages.clear();
        self.callbacks.clear();
        self.generation += 1;
    }

    /// Bumped on every start, so a reused slot can be told apart from the
    /// run that preceded it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub(crate) fn set_code(&mut self, code: Arc<[u8]>) {
        self.code = code;
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub(crate) fn set_run_state(&mut self, run: RunState) {
        self.run = run;
    }

    pub fn state(&self) -> SlotState {
        match self.run {
            RunState::Stopped => SlotState::Stopped,
            _ if self.freeze_depth > 0 => SlotState::Frozen,
            RunState::Running => SlotState::Running,
            RunState::Paused => SlotState::Paused,
            RunState::WaitingOnTimer { wake } => SlotState::WaitingOnTimer { wake },
        }
    }

    pub fn is_active(&self) -> bool {
        self.run != RunState::Stopped
    }

    pub fn is_runnable(&self) -> bool {
        self.run == RunState::Running && self.freeze_depth == 0
    }

    pub fn freeze_depth(&self) -> u32 {
        self.freeze_depth
    }

    pub(crate) fn set_freeze_depth(&mut self, depth: u32) {
        self.freeze_depth = depth;
    }

    pub fn freeze(&mut self) {
        self.freeze_depth += 1;
    }

    pub fn unfreeze(&mut self) -> VmResult<()> {
        if self.freeze_depth == 0 {
            return Err(VmError::NegativeFreezeDepth { slot: self.id });
        }
        self.freeze_depth -= 1;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.run = RunState::Stopped;
        self.freeze_depth = 0;
        self.cutscene_depth = 0;
        self.yield_requested = false;
        self.stack.clear();
        self.messages.clear();
        self.locals.iter_mut().for_each(|v| *v = 0);
    }

    fn ensure_pc(&self, need: u32) -> VmResult<()> {
        let len = self.code.len() as u32;
        if self.pc.saturating_add(need) > len {
            return Err(VmError::PcOutOfRange { pc: self.pc, len });
        }
        Ok(())
    }

    pub fn at_end(&self) -> bool {
        self.pc as usize >= self.code.len()
    }

    pub fn fetch_u8(&mut self) -> VmResult<u8> {
        self.ensure_pc(1)?;
        let b = self.code[self.pc as usize];
        self.pc += 1;
        Ok(b)
    }

    pub fn fetch_u16(&mut self) -> VmResult<u16> {
        self.ensure_pc(2)?;
        let off = self.pc as usize;
        let v = LittleEndian::read_u16(&self.code[off..off + 2]);
        self.pc += 2;
        Ok(v)
    }

    pub fn fetch_i16(&mut self) -> VmResult<i16> {
        Ok(self.fetch_u16()? as i16)
    }

    pub fn fetch_i32(&mut self) -> VmResult<i32> {
        self.ensure_pc(4)?;
        let off = self.pc as usize;
        let v = LittleEndian::read_i32(&self.code[off..off + 4]);
        self.pc += 4;
        Ok(v)
    }

    /// Inline NUL-terminated string; the pc ends up past the terminator.
    pub fn fetch_cstring(&mut self) -> VmResult<Vec<u8>> {
        let start = self.pc as usize;
        let rest = self.code.get(start..).unwrap_or_default();
        let len = rest.iter().position(|b| *b == 0).ok_or(VmError::PcOutOfRange {
            pc: self.code.len() as u32,
            len: self.code.len() as u32,
        })?;
        let s = rest[..len].to_vec();
        self.pc += len as u32 + 1;
        Ok(s)
    }

    /// Relative jump from the current pc.
    pub fn jump(&mut self, offset: i16) -> VmResult<()> {
        let target = self.pc as i64 + offset as i64;
        if target < 0 || target > self.code.len() as i64 {
            return Err(VmError::PcOutOfRange {
                pc: target.max(0) as u32,
                len: self.code.len() as u32,
            });
        }
        self.pc = target as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn launch(script: i32, code: &[u8], flags: StartFlags) -> ScriptLaunch {
        ScriptLaunch {
            script,
            owner: SlotOwner::Global,
            source: CodeSource::Inline(code.to_vec()),
            code: Arc::from(code),
            entry: 0,
            flags,
        }
    }

    fn slot_with(code: &[u8]) -> Slot {
        let mut s = Slot::empty(0, 4, 16);
        s.start(launch(1, code, StartFlags::empty()), &[]);
        s
    }

    #[test]
    fn fetch_helpers_are_little_endian() {
        let mut s = slot_with(&[0x7F, 0x34, 0x12, 0xFE, 0xFF, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(s.fetch_u8(), Ok(0x7F));
        assert_eq!(s.fetch_u16(), Ok(0x1234));
        assert_eq!(s.fetch_i16(), Ok(-2));
        assert_eq!(s.fetch_i32(), Ok(0x12345678));
        assert_eq!(s.fetch_u8(), Err(VmError::PcOutOfRange { pc: 9, len: 9 }));
    }

    #[test]
    fn cstring_skips_terminator() {
        let mut s = slot_with(b"abc\0\x05");
        assert_eq!(s.fetch_cstring(), Ok(b"abc".to_vec()));
        assert_eq!(s.fetch_u8(), Ok(5));
    }

    #[test]
    fn jump_is_relative_and_checked() {
        let mut s = slot_with(&[0; 8]);
        s.pc = 3;
        s.jump(4).unwrap();
        assert_eq!(s.pc, 7);
        s.jump(-7).unwrap();
        assert_eq!(s.pc, 0);
        assert!(s.jump(-1).is_err());
    }

    #[test]
    fn freeze_nesting_is_balanced() {
        let mut s = slot_with(&[0]);
        s.freeze();
        s.freeze();
        s.unfreeze().unwrap();
        assert_eq!(s.state(), SlotState::Frozen);
        assert!(!s.is_runnable());
        s.unfreeze().unwrap();
        assert_eq!(s.state(), SlotState::Running);
        assert!(s.is_runnable());
        assert_eq!(s.unfreeze(), Err(VmError::NegativeFreezeDepth { slot: 0 }));
    }

    #[test]
    fn start_copies_args_into_locals() {
        let mut s = Slot::empty(2, 4, 16);
        s.locals[3] = 99;
        s.start(launch(5, &[], StartFlags::RECURSIVE), &[7, 8]);
        assert_eq!(s.locals, vec![7, 8, 0, 0]);
        assert_eq!(s.state(), SlotState::Running);
    }

    #[test]
    fn start_flag_bytes() {
        assert_eq!(StartFlags::from_script_byte(195), StartFlags::RECURSIVE);
        assert_eq!(StartFlags::from_script_byte(199), StartFlags::FREEZE_RESISTANT);
        assert_eq!(StartFlags::from_script_byte(200), StartFlags::all());
        assert_eq!(StartFlags::from_script_byte(1), StartFlags::empty());
    }
}
