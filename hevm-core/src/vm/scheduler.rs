use serde::{Deserialize, Serialize};

use crate::error::{ScriptFault, VmError, VmResult};
use crate::host::{AssetKey, Host, VmEvent};
use crate::opcode;
use crate::registry::{CallbackBinding, StopNotice};
use crate::trace;

use super::array::ArrayOwner;
use super::exec::{Exec, SlotRequest, StartTarget};
use super::slot::{CodeSource, RunState, ScriptLaunch, SlotId, SlotOwner, SlotState, StartFlags};
use super::Vm;

/// Position of the jump taken when the user interrupts an overridable cutscene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideMark {
    pub slot: SlotId,
    pub pc: u32,
}

/// Saved scheduler state restored by `end_cutscene`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutsceneFrame {
    pub slot: Option<SlotId>,
    /// `(generation, freeze depth)` of every slot when the cutscene began
    pub freeze_depths: Vec<(u64, u32)>,
    pub override_mark: Option<OverrideMark>,
    pub args: Vec<i32>,
}

impl Vm {
    pub fn slot_state(&self, id: SlotId) -> Option<SlotState> {
        self.slots.get(id).map(|s| s.state())
    }

    /// Slots currently bound to `script`.
    pub fn slots_running(&self, script: i32) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|s| s.is_active() && s.script == script)
            .map(|s| s.id)
            .collect()
    }

    fn slot_mut(&mut self, id: SlotId) -> VmResult<&mut super::Slot> {
        self.slots
            .get_mut(id)
            .ok_or_else(|| VmError::InvalidState(format!("no slot {id}")))
    }

    /// Starts a script fetched through the resource mediator.
    ///
    /// A quick start runs the new slot until it suspends before returning;
    /// otherwise the slot becomes eligible on the next tick. A missing script
    /// is logged and starts nothing.
    pub fn start_script(
        &mut self,
        host: &mut dyn Host,
        script: i32,
        args: &[i32],
        flags: StartFlags,
        quick: bool,
    ) -> VmResult<Option<SlotId>> {
        self.start_target(host, StartTarget::Script(script), args, flags, quick)
    }

    pub fn start_object(
        &mut self,
        host: &mut dyn Host,
        object: i32,
        entry: i32,
        args: &[i32],
        flags: StartFlags,
        quick: bool,
    ) -> VmResult<Option<SlotId>> {
        self.start_target(host, StartTarget::Object { object, entry }, args, flags, quick)
    }

    /// Starts bytecode supplied directly by the embedder.
    pub fn start_inline(
        &mut self,
        host: &mut dyn Host,
        script: i32,
        code: Vec<u8>,
        args: &[i32],
        quick: bool,
    ) -> VmResult<SlotId> {
        let launch = ScriptLaunch {
            script,
            owner: SlotOwner::Global,
            code: code.clone().into(),
            source: CodeSource::Inline(code),
            entry: 0,
            flags: StartFlags::RECURSIVE,
        };
        self.launch(host, launch, args, quick)
    }

    pub(crate) fn start_target(
        &mut self,
        host: &mut dyn Host,
        target: StartTarget,
        args: &[i32],
        flags: StartFlags,
        quick: bool,
    ) -> VmResult<Option<SlotId>> {
        let (key, owner, script) = match target {
            StartTarget::Script(n) => {
                let owner = if n >= self.config.global_scripts {
                    SlotOwner::Room
                } else {
                    SlotOwner::Global
                };
                (AssetKey::Script(n), owner, n)
            }
            StartTarget::Object { object, entry } => (
                AssetKey::ObjectVerb { object, verb: entry },
                SlotOwner::Object { object, entry },
                object,
            ),
        };

        let Some(code) = host.request_asset(&key) else {
            log::warn!("start: {} not found, nothing started", key);
            return Ok(None);
        };

        if !flags.contains(StartFlags::RECURSIVE) {
            let same: Vec<SlotId> = self
                .slots
                .iter()
                .filter(|s| s.is_active() && s.script == script && s.owner == owner)
                .map(|s| s.id)
                .collect();
            for id in same {
                self.stop_slot(host, id);
            }
        }

        let launch = ScriptLaunch {
            script,
            owner,
            source: CodeSource::Asset(key),
            code,
            entry: 0,
            flags,
        };
        self.launch(host, launch, args, quick).map(Some)
    }

    fn launch(&mut self, host: &mut dyn Host, launch: ScriptLaunch, args: &[i32], quick: bool) -> VmResult<SlotId> {
        if quick && self.nesting >= self.config.max_nested_scripts {
            return Err(VmError::NestingTooDeep {
                max: self.config.max_nested_scripts,
            });
        }
        let id = self
            .slots
            .iter()
            .position(|s| !s.is_active())
            .ok_or(VmError::NoFreeSlot)?;

        let tick = self.tick;
        let slot = &mut self.slots[id];
        slot.start(launch, args);
        slot.eligible_from = if quick { tick } else { tick + 1 };
        trace::sched(format_args!(
            "start slot={} script={} owner={:?} quick={} tick={}",
            id, slot.script, slot.owner, quick, tick
        ));

        if quick {
            self.nesting += 1;
            self.run_slot(host, id);
            self.nesting -= 1;
        }
        Ok(id)
    }

    /// Stops every slot running `script`.
    pub fn stop_script(&mut self, host: &mut dyn Host, script: i32) {
        for id in self.slots_running(script) {
            if matches!(self.slots[id].owner, SlotOwner::Global | SlotOwner::Room) {
                self.stop_slot(host, id);
            }
        }
    }

    pub fn stop_object_script(&mut self, host: &mut dyn Host, object: i32) {
        let ids: Vec<SlotId> = self
            .slots
            .iter()
            .filter(|s| s.is_active() && matches!(s.owner, SlotOwner::Object { object: o, .. } if o == object))
            .map(|s| s.id)
            .collect();
        for id in ids {
            self.stop_slot(host, id);
        }
    }

    /// Moves a slot to `Stopped`: its wait is cancelled, its script-localized
    /// arrays are released and its stop callbacks fire.
    pub fn stop_slot(&mut self, host: &mut dyn Host, id: SlotId) {
        let Some(slot) = self.slots.get_mut(id) else { return };
        if !slot.is_active() {
            return;
        }
        let script = slot.script;
        let callbacks = std::mem::take(&mut slot.callbacks);
        slot.reset();
        trace::sched(format_args!("stop slot={} script={}", id, script));

        self.release_arrays(ArrayOwner::Script(id));
        if self.override_mark.is_some_and(|m| m.slot == id) {
            self.override_mark = None;
        }
        for CallbackBinding { name, data } in callbacks {
            match self.registry.get(&name).cloned() {
                Some(cb) => cb(&StopNotice { slot: id, script, data }, host),
                None => log::warn!("slot {} stop callback {:?} is not registered", id, name),
            }
        }
        host.event(VmEvent::SlotStopped { slot: id, script });
    }

    /// Attaches a named stop callback to an active slot.
    pub fn attach_callback(&mut self, id: SlotId, name: &str, data: i32) -> anyhow::Result<()> {
        if !self.registry.contains(name) {
            anyhow::bail!("unknown slot callback {:?}", name);
        }
        let slot = self.slot_mut(id)?;
        if !slot.is_active() {
            anyhow::bail!("slot {} is not running", id);
        }
        slot.callbacks.push(CallbackBinding {
            name: name.to_string(),
            data,
        });
        Ok(())
    }

    pub fn pause(&mut self, id: SlotId) -> VmResult<()> {
        let slot = self.slot_mut(id)?;
        if !slot.is_active() {
            return Err(VmError::InvalidState(format!("cannot pause stopped slot {id}")));
        }
        slot.set_run_state(RunState::Paused);
        Ok(())
    }

    pub fn resume(&mut self, id: SlotId) -> VmResult<()> {
        let slot = self.slot_mut(id)?;
        if slot.run_state() != RunState::Paused {
            return Err(VmError::InvalidState(format!("slot {id} is not paused")));
        }
        slot.set_run_state(RunState::Running);
        Ok(())
    }

    pub fn freeze_slot(&mut self, id: SlotId) -> VmResult<()> {
        self.slot_mut(id)?.freeze();
        Ok(())
    }

    pub fn unfreeze_slot(&mut self, id: SlotId) -> VmResult<()> {
        self.slot_mut(id)?.unfreeze()
    }

    /// Freezes every active slot except the executing one. Freeze-resistant
    /// slots are skipped unless `flag >= 0x80`.
    pub fn freeze_all(&mut self, flag: i32) {
        let current = self.current;
        for slot in self.slots.iter_mut() {
            if Some(slot.id) == current || !slot.is_active() {
                continue;
            }
            if slot.flags.contains(StartFlags::FREEZE_RESISTANT) && flag < 0x80 {
                continue;
            }
            slot.freeze();
        }
    }

    /// Decrements the freeze depth of every frozen slot.
    pub fn unfreeze_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot.freeze_depth() > 0 {
                let _ = slot.unfreeze();
            }
        }
    }

    /// Suspends a slot for `ticks` ticks; it resumes on tick `now + ticks`.
    pub fn delay_slot(&mut self, id: SlotId, ticks: u64) -> VmResult<()> {
        let wake = self.tick + ticks;
        let slot = self.slot_mut(id)?;
        if !slot.is_active() {
            return Err(VmError::InvalidState(format!("cannot delay stopped slot {id}")));
        }
        slot.set_run_state(RunState::WaitingOnTimer { wake });
        Ok(())
    }

    /// Ends a timed wait early.
    pub fn wake_slot(&mut self, id: SlotId) -> VmResult<()> {
        let slot = self.slot_mut(id)?;
        match slot.run_state() {
            RunState::WaitingOnTimer { .. } => {
                slot.set_run_state(RunState::Running);
                Ok(())
            }
            _ => Err(VmError::NotWaiting { slot: id }),
        }
    }

    pub fn begin_cutscene(&mut self, host: &mut dyn Host, args: &[i32]) -> VmResult<()> {
        let frame = CutsceneFrame {
            slot: self.current,
            freeze_depths: self.slots.iter().map(|s| (s.generation(), s.freeze_depth())).collect(),
            override_mark: self.override_mark.take(),
            args: args.to_vec(),
        };
        if let Some(id) = self.current {
            self.slots[id].cutscene_depth += 1;
        }
        self.cutscenes.push(frame);
        let vars = self.config.vars.clone();
        self.write_well_known(vars.override_hit, 0);
        trace::sched(format_args!("cutscene begin depth={}", self.cutscenes.len()));

        self.run_hook_script(host, vars.cutscene_start_script, args)
    }

    pub fn end_cutscene(&mut self, host: &mut dyn Host) -> VmResult<()> {
        let frame = self
            .cutscenes
            .pop()
            .ok_or_else(|| VmError::InvalidState("endCutscene without cutscene".into()))?;
        // a slot restarted since the cutscene began keeps its own depth
        for (slot, &(generation, depth)) in self.slots.iter_mut().zip(&frame.freeze_depths) {
            if slot.is_active() && slot.generation() == generation {
                slot.set_freeze_depth(depth);
            }
        }
        self.override_mark = frame.override_mark;
        if let Some(slot) = frame.slot.and_then(|id| self.slots.get_mut(id)) {
            slot.cutscene_depth = slot.cutscene_depth.saturating_sub(1);
        }
        let vars = self.config.vars.clone();
        self.write_well_known(vars.override_hit, 0);
        trace::sched(format_args!("cutscene end depth={}", self.cutscenes.len()));

        self.run_hook_script(host, vars.cutscene_end_script, &frame.args)
    }

    fn run_hook_script(&mut self, host: &mut dyn Host, var: Option<u16>, args: &[i32]) -> VmResult<()> {
        let Some(var) = var else { return Ok(()) };
        let script = self.vars.read_global(var)?;
        if script != 0 {
            self.start_script(host, script, args, StartFlags::empty(), true)?;
        }
        Ok(())
    }

    /// Delivers a user interrupt (skip key).
    ///
    /// An armed override jumps its slot to the recorded position; inside a
    /// cutscene without an override the interrupt is dropped; otherwise the
    /// host receives [`VmEvent::UserInterrupt`].
    pub fn interrupt_user(&mut self, host: &mut dyn Host) {
        if let Some(mark) = self.override_mark.take() {
            if let Some(slot) = self.slots.get_mut(mark.slot) {
                if slot.is_active() {
                    slot.pc = mark.pc;
                    slot.set_run_state(RunState::Running);
                    slot.set_freeze_depth(0);
                    slot.cutscene_depth = slot.cutscene_depth.saturating_sub(1);
                }
            }
            let id = self.config.vars.override_hit;
            self.write_well_known(id, 1);
            trace::sched(format_args!("override taken slot={} pc=0x{:X}", mark.slot, mark.pc));
            return;
        }
        if !self.cutscenes.is_empty() {
            log::debug!("user interrupt ignored inside cutscene");
            return;
        }
        host.event(VmEvent::UserInterrupt);
    }

    /// Leaves the current room: room arrays and variables are discarded and
    /// room and object scripts stop.
    pub fn change_room(&mut self, host: &mut dyn Host, room: i32) {
        self.release_arrays(ArrayOwner::Room);
        self.vars.reset_room();
        let ids: Vec<SlotId> = self
            .slots
            .iter()
            .filter(|s| s.is_active() && matches!(s.owner, SlotOwner::Room | SlotOwner::Object { .. }))
            .map(|s| s.id)
            .collect();
        for id in ids {
            self.stop_slot(host, id);
        }
        self.room = room;
        let id = self.config.vars.room;
        self.write_well_known(id, room);
        trace::sched(format_args!("room change -> {}", room));
    }

    /// Runs one scheduler tick.
    ///
    /// Expired timers are woken first, then every runnable slot is visited
    /// once in id order and runs until it suspends.
    pub fn run_tick(&mut self, host: &mut dyn Host) {
        let tick = self.tick;
        for slot in self.slots.iter_mut() {
            slot.did_exec = false;
            if let RunState::WaitingOnTimer { wake } = slot.run_state() {
                if wake <= tick {
                    slot.set_run_state(RunState::Running);
                }
            }
        }

        for id in 0..self.slots.len() {
            let slot = &self.slots[id];
            if slot.is_runnable() && !slot.did_exec && slot.eligible_from <= tick {
                self.run_slot(host, id);
            }
        }

        self.tick += 1;
    }

    pub(crate) fn run_slot(&mut self, host: &mut dyn Host, id: SlotId) {
        let prev = self.current.replace(id);
        let generation = self.slots[id].generation();
        self.slots[id].did_exec = true;
        self.slots[id].yield_requested = false;
        let mut budget = self.config.max_ops_per_slot;

        loop {
            let slot = &self.slots[id];
            if slot.generation() != generation || slot.run_state() != RunState::Running || slot.yield_requested {
                break;
            }
            if slot.at_end() {
                self.stop_slot(host, id);
                break;
            }
            if budget == 0 {
                log::warn!(
                    "slot {} (script {}) used its {} opcode budget, forcing a yield",
                    id,
                    slot.script,
                    self.config.max_ops_per_slot
                );
                break;
            }
            budget -= 1;

            let pc = slot.pc;
            let op = match self.slots[id].fetch_u8() {
                Ok(op) => op,
                Err(e) => {
                    self.fault(host, id, pc, None, e);
                    break;
                }
            };
            trace::vm(format_args!(
                "slot={} pc=0x{:04X} op=0x{:02X} {}",
                id,
                pc,
                op,
                opcode::entry(op).name
            ));

            let result = {
                let mut exec = Exec::new(self, host, id, pc);
                opcode::dispatch(op, &mut exec)
            };
            let result = result.and_then(|()| self.apply_requests(host, id));
            if let Err(e) = result {
                self.requests.clear();
                self.fault(host, id, pc, Some(op), e);
                break;
            }
        }

        if self.slots[id].generation() == generation {
            self.slots[id].yield_requested = false;
        }
        self.current = prev;
    }

    fn apply_requests(&mut self, host: &mut dyn Host, id: SlotId) -> VmResult<()> {
        let pending: Vec<SlotRequest> = self.requests.drain(..).collect();
        for req in pending {
            match req {
                SlotRequest::Start {
                    target,
                    args,
                    flags,
                    quick,
                } => {
                    self.start_target(host, target, &args, flags, quick)?;
                }
                SlotRequest::StopCurrent => self.stop_slot(host, id),
                SlotRequest::StopScript(script) => self.stop_script(host, script),
                SlotRequest::StopObject(object) => self.stop_object_script(host, object),
                SlotRequest::Break => self.slots[id].yield_requested = true,
                SlotRequest::Delay(ticks) => {
                    let wake = self.tick + ticks;
                    if self.slots[id].is_active() {
                        self.slots[id].set_run_state(RunState::WaitingOnTimer { wake });
                        trace::sched(format_args!("slot={} delay until tick {}", id, wake));
                    }
                }
                SlotRequest::FreezeAll(flag) => self.freeze_all(flag),
                SlotRequest::UnfreezeAll => self.unfreeze_all(),
                SlotRequest::BeginCutscene(args) => self.begin_cutscene(host, &args)?,
                SlotRequest::EndCutscene => self.end_cutscene(host)?,
                SlotRequest::LoadRoom(room) => self.change_room(host, room),
            }
        }
        Ok(())
    }

    fn fault(&mut self, host: &mut dyn Host, id: SlotId, pc: u32, opcode: Option<u8>, error: VmError) {
        let fault = ScriptFault {
            slot: id,
            script: self.slots[id].script,
            pc,
            opcode,
            error,
        };
        log::error!("{}", fault);
        self.stop_slot(host, id);
        host.event(VmEvent::Fault(fault));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::VmConfig;
    use crate::host::MemoryHost;

    // breakHere; jump -4
    const LOOP: [u8; 4] = [0x6C, 0x73, 0xFC, 0xFF];

    fn vm() -> Vm {
        Vm::new(VmConfig::default())
    }

    #[test]
    fn freeze_unfreeze_pairs_nest() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        let id = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        vm.freeze_slot(id).unwrap();
        vm.freeze_slot(id).unwrap();
        vm.unfreeze_slot(id).unwrap();
        assert_eq!(vm.slot_state(id), Some(SlotState::Frozen));
        vm.unfreeze_slot(id).unwrap();
        assert_eq!(vm.slot_state(id), Some(SlotState::Running));
        assert_eq!(vm.unfreeze_slot(id), Err(VmError::NegativeFreezeDepth { slot: id }));
    }

    #[test]
    fn frozen_slots_are_skipped() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        let id = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        vm.run_tick(&mut host);
        vm.freeze_slot(id).unwrap();
        let pc = vm.slots[id].pc;
        vm.run_tick(&mut host);
        assert_eq!(vm.slots[id].pc, pc);
        vm.unfreeze_slot(id).unwrap();
        vm.run_tick(&mut host);
        assert_ne!(vm.slots[id].pc, pc);
    }

    #[test]
    fn waking_a_running_slot_is_an_error() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        let id = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        assert_eq!(vm.wake_slot(id), Err(VmError::NotWaiting { slot: id }));
        vm.delay_slot(id, 10).unwrap();
        vm.wake_slot(id).unwrap();
        assert_eq!(vm.slot_state(id), Some(SlotState::Running));
    }

    #[test]
    fn paused_slots_wait_for_resume() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        let id = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        vm.pause(id).unwrap();
        vm.run_tick(&mut host);
        vm.run_tick(&mut host);
        assert_eq!(vm.slots[id].pc, 0);
        vm.resume(id).unwrap();
        vm.run_tick(&mut host);
        assert_eq!(vm.slots[id].pc, 1);
        assert!(vm.resume(id).is_err());
    }

    #[test]
    fn end_cutscene_leaves_reused_slots_alone() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        let old = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        vm.freeze_slot(old).unwrap();
        vm.begin_cutscene(&mut host, &[]).unwrap();

        vm.stop_slot(&mut host, old);
        let new = vm.start_inline(&mut host, 2, LOOP.to_vec(), &[], false).unwrap();
        assert_eq!(new, old);
        vm.end_cutscene(&mut host).unwrap();

        assert_eq!(vm.slot_state(new), Some(SlotState::Running));
        assert_eq!(vm.slots[new].freeze_depth(), 0);
        assert_eq!(vm.slots[new].script, 2);
    }

    #[test]
    fn freeze_all_spares_resistant_slots_below_0x80() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Script(3), LOOP.to_vec());
        host.insert(AssetKey::Script(4), LOOP.to_vec());
        let plain = vm.start_script(&mut host, 3, &[], StartFlags::empty(), false).unwrap().unwrap();
        let resistant = vm
            .start_script(&mut host, 4, &[], StartFlags::FREEZE_RESISTANT, false)
            .unwrap()
            .unwrap();

        vm.freeze_all(1);
        assert_eq!(vm.slots[plain].freeze_depth(), 1);
        assert_eq!(vm.slots[resistant].freeze_depth(), 0);

        vm.freeze_all(0x80);
        assert_eq!(vm.slots[plain].freeze_depth(), 2);
        assert_eq!(vm.slots[resistant].freeze_depth(), 1);

        vm.unfreeze_all();
        vm.unfreeze_all();
        vm.unfreeze_all();
        assert_eq!(vm.slots[plain].freeze_depth(), 0);
        assert_eq!(vm.slots[resistant].freeze_depth(), 0);
    }

    #[test]
    fn non_recursive_start_replaces_running_instance() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Script(3), LOOP.to_vec());
        let first = vm.start_script(&mut host, 3, &[], StartFlags::empty(), false).unwrap().unwrap();
        vm.start_script(&mut host, 3, &[], StartFlags::empty(), false).unwrap();
        assert_eq!(vm.slots_running(3).len(), 1);
        assert_eq!(vm.slots_running(3)[0], first);

        vm.start_script(&mut host, 3, &[], StartFlags::RECURSIVE, false).unwrap();
        assert_eq!(vm.slots_running(3).len(), 2);
    }

    #[test]
    fn missing_script_starts_nothing() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        assert_eq!(vm.start_script(&mut host, 9, &[], StartFlags::empty(), true), Ok(None));
        assert!(vm.slots.iter().all(|s| !s.is_active()));
    }

    #[test]
    fn room_change_stops_room_scripts_only() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Script(3), LOOP.to_vec());
        host.insert(AssetKey::Script(250), LOOP.to_vec());
        host.insert(AssetKey::ObjectVerb { object: 12, verb: 1 }, LOOP.to_vec());
        let global = vm.start_script(&mut host, 3, &[], StartFlags::empty(), false).unwrap().unwrap();
        let room = vm.start_script(&mut host, 250, &[], StartFlags::empty(), false).unwrap().unwrap();
        let object = vm.start_object(&mut host, 12, 1, &[], StartFlags::empty(), false).unwrap().unwrap();

        vm.change_room(&mut host, 7);
        assert!(vm.slots[global].is_active());
        assert!(!vm.slots[room].is_active());
        assert!(!vm.slots[object].is_active());
        assert_eq!(vm.read_var(4), Ok(7));
    }

    #[test]
    fn stop_releases_script_arrays_and_fires_callbacks() {
        let mut vm = vm();
        let mut host = MemoryHost::new();
        vm.registry_mut().register("done", |n: &StopNotice, h: &mut dyn Host| {
            h.event(VmEvent::Trace {
                slot: n.slot,
                value: n.data,
                message: "done".into(),
            });
        });
        let id = vm.start_inline(&mut host, 1, LOOP.to_vec(), &[], false).unwrap();
        let h = vm
            .define_array_in(Some(id), 0x4000, super::super::ElementType::Byte, (0, 3), (0, 0))
            .unwrap();
        vm.arrays.localize(h, ArrayOwner::Script(id)).unwrap();
        vm.attach_callback(id, "done", 77).unwrap();
        assert!(vm.attach_callback(id, "missing", 0).is_err());

        vm.stop_slot(&mut host, id);
        assert!(!vm.arrays.contains(h));
        assert_eq!(
            host.events,
            vec![
                VmEvent::Trace {
                    slot: id,
                    value: 77,
                    message: "done".into()
                },
                VmEvent::SlotStopped { slot: id, script: 1 },
            ]
        );
    }
}
