//! The script machine: slots, operand stacks, variables and arrays.

pub mod array;
pub mod exec;
pub mod scheduler;
pub mod slot;
pub mod stack;
pub mod vars;

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::VmConfig;
use crate::error::VmResult;
use crate::registry::CallbackRegistry;

pub use array::{Array, ArrayOwner, ArrayStore, ElementType, VarBinding};
pub use exec::{Exec, SlotRequest, StartTarget};
pub use scheduler::{CutsceneFrame, OverrideMark};
pub use slot::{CodeSource, RunState, ScriptLaunch, Slot, SlotId, SlotOwner, SlotState, StartFlags};
pub use stack::{BinaryOp, OperandStack};
pub use vars::{VarRef, VarStore, LOCAL_VAR_BIT, ROOM_VAR_BIT};

pub const TIMER_COUNT: usize = 16;

pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) slots: Vec<Slot>,
    pub(crate) vars: VarStore,
    pub(crate) arrays: ArrayStore,
    pub(crate) rng: SmallRng,
    pub(crate) tick: u64,
    pub(crate) current: Option<SlotId>,
    pub(crate) nesting: usize,
    pub(crate) cutscenes: Vec<CutsceneFrame>,
    pub(crate) override_mark: Option<OverrideMark>,
    pub(crate) timers: [u64; TIMER_COUNT],
    pub(crate) requests: VecDeque<SlotRequest>,
    pub(crate) cursor_state: i32,
    pub(crate) userput: i32,
    pub(crate) selected_sound: i32,
    pub(crate) room: i32,
    pub(crate) registry: CallbackRegistry,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        let slots = (0..config.slot_count)
            .map(|id| Slot::empty(id, config.local_vars, config.stack_limit))
            .collect();
        Self {
            vars: VarStore::new(config.global_vars, config.room_vars),
            arrays: ArrayStore::new(config.max_arrays),
            rng: SmallRng::seed_from_u64(config.rng_seed),
            slots,
            tick: 0,
            current: None,
            nesting: 0,
            cutscenes: Vec::new(),
            override_mark: None,
            timers: [0; TIMER_COUNT],
            requests: VecDeque::new(),
            cursor_state: 0,
            userput: 0,
            selected_sound: 0,
            room: 0,
            registry: CallbackRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn room(&self) -> i32 {
        self.room
    }

    pub fn current_slot(&self) -> Option<SlotId> {
        self.current
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    pub fn arrays(&self) -> &ArrayStore {
        &self.arrays
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.registry
    }

    pub fn cutscene_depth(&self) -> usize {
        self.cutscenes.len()
    }

    pub fn override_mark(&self) -> Option<OverrideMark> {
        self.override_mark
    }

    /// Reads a global or room variable.
    pub fn read_var(&self, id: u16) -> VmResult<i32> {
        self.vars.read_global(id)
    }

    pub fn write_var(&mut self, id: u16, value: i32) -> VmResult<()> {
        self.vars.write_global(id, value)
    }

    /// Defines an array bound to a global or room variable.
    pub fn define_array(&mut self, var: u16, element: ElementType, dim1: (i32, i32), dim2: (i32, i32)) -> VmResult<i32> {
        self.define_array_in(None, var, element, dim1, dim2)
    }

    pub fn read_array(&self, var: u16, row: i32, col: i32) -> VmResult<i32> {
        let handle = self.array_handle_in(None, var)?;
        self.arrays.read(handle, row, col)
    }

    pub fn write_array(&mut self, var: u16, row: i32, col: i32, value: i32) -> VmResult<()> {
        let handle = self.array_handle_in(None, var)?;
        self.arrays.write(handle, row, col, value)
    }

    pub fn localize_array(&mut self, var: u16, owner: ArrayOwner) -> VmResult<()> {
        let handle = self.array_handle_in(None, var)?;
        self.arrays.localize(handle, owner)
    }

    pub fn nuke_array(&mut self, var: u16) -> VmResult<()> {
        self.nuke_array_in(None, var)
    }

    pub(crate) fn read_var_in(&self, slot: Option<SlotId>, id: u16) -> VmResult<i32> {
        match slot {
            Some(s) => self.vars.read(id, &self.slots[s].locals),
            None => self.vars.read_global(id),
        }
    }

    pub(crate) fn write_var_in(&mut self, slot: Option<SlotId>, id: u16, value: i32) -> VmResult<()> {
        match slot {
            Some(s) => self.vars.write(id, value, &mut self.slots[s].locals),
            None => self.vars.write_global(id, value),
        }
    }

    /// Writes one of the configured well-known variables, if mapped.
    pub(crate) fn write_well_known(&mut self, id: Option<u16>, value: i32) {
        if let Some(id) = id {
            if let Err(e) = self.vars.write_global(id, value) {
                log::warn!("well-known variable {} not writable: {}", id, e);
            }
        }
    }

    /// Creates an array and binds its handle to `var`, releasing the array the
    /// variable previously pointed at.
    pub(crate) fn define_array_in(
        &mut self,
        slot: Option<SlotId>,
        var: u16,
        element: ElementType,
        dim1: (i32, i32),
        dim2: (i32, i32),
    ) -> VmResult<i32> {
        let array = Array::new(element, dim1, dim2)?;
        self.bind_array_in(slot, var, array)
    }

    pub(crate) fn bind_array_in(&mut self, slot: Option<SlotId>, var: u16, mut array: Array) -> VmResult<i32> {
        self.nuke_array_in(slot, var)?;
        let local = matches!(VarRef::decode(var), VarRef::Local(_));
        array.binding = Some(VarBinding {
            var,
            slot: if local { slot } else { None },
        });
        let handle = self.arrays.alloc(array)?;
        self.write_var_in(slot, var, handle)?;
        crate::trace::array(format_args!(
            "define var={} handle={} free={}",
            var,
            handle,
            self.arrays.num_free()
        ));
        Ok(handle)
    }

    /// Frees the array bound to `var` and zeroes the variable.
    pub(crate) fn nuke_array_in(&mut self, slot: Option<SlotId>, var: u16) -> VmResult<()> {
        let handle = self.read_var_in(slot, var)?;
        if handle == 0 {
            return Ok(());
        }
        let bound_here = self
            .arrays
            .get(handle)
            .map(|a| a.binding.is_some_and(|b| b.var == var))
            .unwrap_or(false);
        if bound_here {
            self.arrays.free(handle);
        }
        self.write_var_in(slot, var, 0)
    }

    /// Releases every array with the given owner and clears the variables
    /// that still point at them.
    pub(crate) fn release_arrays(&mut self, owner: ArrayOwner) {
        for (handle, binding) in self.arrays.release_owned(owner) {
            crate::trace::array(format_args!("release handle={} owner={:?}", handle, owner));
            let Some(binding) = binding else { continue };
            let held = self.read_var_in(binding.slot, binding.var).ok();
            if held == Some(handle) {
                if let Err(e) = self.write_var_in(binding.slot, binding.var, 0) {
                    log::warn!("released handle {} but var {} not cleared: {}", handle, binding.var, e);
                }
            }
        }
    }

    /// Resolves the array handle held by `var`. A zero handle is fatal.
    pub(crate) fn array_handle_in(&self, slot: Option<SlotId>, var: u16) -> VmResult<i32> {
        let handle = self.read_var_in(slot, var)?;
        if handle == 0 {
            return Err(crate::error::VmError::NullArrayRef { var });
        }
        Ok(handle)
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("tick", &self.tick)
            .field("current", &self.current)
            .field("active_slots", &self.slots.iter().filter(|s| s.is_active()).count())
            .field("free_arrays", &self.arrays.num_free())
            .field("cutscenes", &self.cutscenes.len())
            .finish()
    }
}
