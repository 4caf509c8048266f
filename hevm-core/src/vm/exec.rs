use rand::Rng;

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::host::Host;

use super::array::{Array, ArrayOwner, ElementType};
use super::scheduler::OverrideMark;
use super::slot::{SlotId, SlotOwner, StartFlags};
use super::stack::BinaryOp;
use super::{Vm, TIMER_COUNT};

/// What a start request launches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTarget {
    Script(i32),
    Object { object: i32, entry: i32 },
}

/// Scheduling mutations emitted by handlers and applied once the opcode has
/// returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotRequest {
    Start {
        target: StartTarget,
        args: Vec<i32>,
        flags: StartFlags,
        quick: bool,
    },
    /// stop the executing slot
    StopCurrent,
    StopScript(i32),
    StopObject(i32),
    /// yield until the next tick
    Break,
    Delay(u64),
    FreezeAll(i32),
    UnfreezeAll,
    BeginCutscene(Vec<i32>),
    EndCutscene,
    LoadRoom(i32),
}

/// Execution context handed to every opcode handler.
///
/// Only the executing slot's stack and bytecode are reachable from here.
pub struct Exec<'a> {
    vm: &'a mut Vm,
    host: &'a mut dyn Host,
    slot: SlotId,
    opcode_pc: u32,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(vm: &'a mut Vm, host: &'a mut dyn Host, slot: SlotId, opcode_pc: u32) -> Self {
        Self {
            vm,
            host,
            slot,
            opcode_pc,
        }
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    pub fn config(&self) -> &VmConfig {
        &self.vm.config
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    pub fn script(&self) -> i32 {
        self.vm.slots[self.slot].script
    }

    pub fn tick(&self) -> u64 {
        self.vm.tick
    }

    /// Offset of the opcode byte being executed.
    pub fn opcode_pc(&self) -> u32 {
        self.opcode_pc
    }

    pub fn pc(&self) -> u32 {
        self.vm.slots[self.slot].pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.vm.slots[self.slot].pc = pc;
    }

    pub fn request(&mut self, req: SlotRequest) {
        self.vm.requests.push_back(req);
    }

    // operand fetch

    pub fn fetch_u8(&mut self) -> VmResult<u8> {
        self.vm.slots[self.slot].fetch_u8()
    }

    pub fn fetch_u16(&mut self) -> VmResult<u16> {
        self.vm.slots[self.slot].fetch_u16()
    }

    pub fn fetch_i16(&mut self) -> VmResult<i16> {
        self.vm.slots[self.slot].fetch_i16()
    }

    pub fn fetch_i32(&mut self) -> VmResult<i32> {
        self.vm.slots[self.slot].fetch_i32()
    }

    pub fn fetch_cstring(&mut self) -> VmResult<Vec<u8>> {
        self.vm.slots[self.slot].fetch_cstring()
    }

    pub fn jump(&mut self, offset: i16) -> VmResult<()> {
        self.vm.slots[self.slot].jump(offset)
    }

    // stack

    pub fn push(&mut self, v: i32) -> VmResult<()> {
        self.vm.slots[self.slot].stack.push(v)
    }

    pub fn pop(&mut self) -> VmResult<i32> {
        self.vm.slots[self.slot].stack.pop()
    }

    pub fn dup(&mut self) -> VmResult<()> {
        self.vm.slots[self.slot].stack.dup()
    }

    pub fn binary(&mut self, op: BinaryOp) -> VmResult<()> {
        self.vm.slots[self.slot].stack.binary(op)
    }

    pub fn unary(&mut self, f: impl FnOnce(i32) -> i32) -> VmResult<()> {
        self.vm.slots[self.slot].stack.unary(f)
    }

    pub fn pop_list(&mut self, max: usize) -> VmResult<Vec<i32>> {
        self.vm.slots[self.slot].stack.pop_list(max)
    }

    // variables

    pub fn read_var(&self, id: u16) -> VmResult<i32> {
        self.vm.read_var_in(Some(self.slot), id)
    }

    pub fn write_var(&mut self, id: u16, value: i32) -> VmResult<()> {
        self.vm.write_var_in(Some(self.slot), id, value)
    }

    pub fn write_well_known(&mut self, pick: fn(&VmConfig) -> Option<u16>, value: i32) {
        let id = pick(&self.vm.config);
        self.vm.write_well_known(id, value);
    }

    // arrays

    pub fn array_handle(&self, var: u16) -> VmResult<i32> {
        self.vm.array_handle_in(Some(self.slot), var)
    }

    pub fn array(&self, handle: i32) -> VmResult<&Array> {
        self.vm.arrays.get(handle)
    }

    pub fn has_array(&self, handle: i32) -> bool {
        self.vm.arrays.contains(handle)
    }

    pub fn read_array(&self, var: u16, row: i32, col: i32) -> VmResult<i32> {
        let handle = self.array_handle(var)?;
        self.vm.arrays.read(handle, row, col)
    }

    pub fn write_array(&mut self, var: u16, row: i32, col: i32, value: i32) -> VmResult<()> {
        let handle = self.array_handle(var)?;
        self.vm.arrays.write(handle, row, col, value)
    }

    pub fn define_array(&mut self, var: u16, element: ElementType, dim1: (i32, i32), dim2: (i32, i32)) -> VmResult<i32> {
        self.vm.define_array_in(Some(self.slot), var, element, dim1, dim2)
    }

    /// Binds a fresh string array holding `bytes` to `var`.
    pub fn define_string(&mut self, var: u16, bytes: &[u8]) -> VmResult<i32> {
        let array = Array::from_bytes(bytes)?;
        self.vm.bind_array_in(Some(self.slot), var, array)
    }

    pub fn nuke_array(&mut self, var: u16) -> VmResult<()> {
        self.vm.nuke_array_in(Some(self.slot), var)
    }

    pub fn redim_array(&mut self, var: u16, element: ElementType, dim1: (i32, i32), dim2: (i32, i32)) -> VmResult<()> {
        let handle = self.array_handle(var)?;
        self.vm.arrays.redim(handle, element, dim1, dim2)
    }

    pub fn localize_to_room(&mut self, handle: i32) -> VmResult<()> {
        self.vm.arrays.localize(handle, ArrayOwner::Room)
    }

    pub fn localize_to_script(&mut self, handle: i32) -> VmResult<()> {
        self.vm.arrays.localize(handle, ArrayOwner::Script(self.slot))
    }

    pub fn shuffle_array(&mut self, var: u16, lo: i32, hi: i32) -> VmResult<()> {
        let handle = self.array_handle(var)?;
        let Vm { arrays, rng, .. } = &mut *self.vm;
        arrays.shuffle(handle, lo, hi, rng)
    }

    pub fn num_free_arrays(&self) -> usize {
        self.vm.arrays.num_free()
    }

    // strings

    pub fn push_message(&mut self, msg: Vec<u8>) {
        self.vm.slots[self.slot].messages.push(msg);
    }

    /// Pops a string selector: -1 takes the pending message, anything else
    /// is a string array handle.
    pub fn copy_script_string(&mut self) -> VmResult<Vec<u8>> {
        let sel = self.pop()?;
        if sel == -1 {
            return Ok(self.vm.slots[self.slot].messages.pop().unwrap_or_default());
        }
        match self.vm.arrays.get(sel) {
            Ok(a) => Ok(a.c_bytes()),
            Err(_) => {
                log::warn!("copyScriptString: no string array {}", sel);
                Ok(Vec::new())
            }
        }
    }

    // randomness

    pub fn random_range(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.vm.rng.gen_range(lo..=hi)
    }

    // timers

    fn timer_index(timer: i32) -> VmResult<usize> {
        if timer < 1 || timer as usize >= TIMER_COUNT {
            return Err(VmError::BadTimer { timer });
        }
        Ok(timer as usize)
    }

    pub fn timer_elapsed_ms(&self, timer: i32) -> VmResult<i32> {
        let idx = Self::timer_index(timer)?;
        let ticks = self.vm.tick.saturating_sub(self.vm.timers[idx]);
        let tps = self.vm.config.ticks_per_second.max(1) as u64;
        Ok((ticks * 1000 / tps).min(i32::MAX as u64) as i32)
    }

    pub fn reset_timer(&mut self, timer: i32) -> VmResult<()> {
        let idx = Self::timer_index(timer)?;
        self.vm.timers[idx] = self.vm.tick;
        Ok(())
    }

    // scheduler queries

    pub fn is_script_running(&self, script: i32) -> bool {
        self.vm.slots.iter().any(|s| {
            s.is_active() && s.script == script && matches!(s.owner, SlotOwner::Global | SlotOwner::Room)
        })
    }

    pub fn is_room_script_running(&self, script: i32) -> bool {
        self.vm
            .slots
            .iter()
            .any(|s| s.is_active() && s.script == script && s.owner == SlotOwner::Room)
    }

    pub fn begin_override(&mut self) -> VmResult<()> {
        let pc = self.pc();
        self.vm.override_mark = Some(OverrideMark { slot: self.slot, pc });
        // skip the jump that an interrupt will take
        self.fetch_u8()?;
        self.fetch_u16()?;
        self.write_well_known(|c| c.vars.override_hit, 0);
        Ok(())
    }

    pub fn end_override(&mut self) {
        self.vm.override_mark = None;
        self.write_well_known(|c| c.vars.override_hit, 0);
    }

    // engine-side state mirrored into variables

    pub fn cursor_state(&mut self) -> &mut i32 {
        &mut self.vm.cursor_state
    }

    pub fn userput(&mut self) -> &mut i32 {
        &mut self.vm.userput
    }

    pub fn selected_sound(&mut self) -> &mut i32 {
        &mut self.vm.selected_sound
    }
}
