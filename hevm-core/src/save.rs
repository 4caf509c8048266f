//! Snapshots of the whole machine between ticks.
//!
//! Layout: `b"HEVM"`, `u16` version, `u32` payload length (all little
//! endian), then the bincode payload. Bytecode fetched from assets is not
//! stored; it is requested again from the host on load. Inline code is saved
//! as-is.

use std::io::{Cursor, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bincode::Options;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::VmConfig;
use crate::host::Host;
use crate::registry::{CallbackBinding, CallbackRegistry};
use crate::trace;
use crate::vm::{
    ArrayOwner, ArrayStore, CodeSource, CutsceneFrame, OperandStack, OverrideMark, RunState, SlotId, SlotOwner, StartFlags,
    VarStore, Vm, TIMER_COUNT,
};

pub const SAVE_MAGIC: [u8; 4] = *b"HEVM";
pub const SAVE_VERSION: u16 = 1;
const HEADER_LEN: usize = 10;
const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub script: i32,
    pub owner: SlotOwner,
    pub source: CodeSource,
    pub pc: u32,
    /// includes the wake tick of a waiting slot
    pub run: RunState,
    pub freeze_depth: u32,
    pub flags: StartFlags,
    pub cutscene_depth: u32,
    pub eligible_from: u64,
    pub locals: Vec<i32>,
    pub stack: OperandStack,
    pub messages: Vec<Vec<u8>>,
    pub callbacks: Vec<CallbackBinding>,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub room: i32,
    pub slots: Vec<SlotSnapshot>,
    pub vars: VarStore,
    pub arrays: ArrayStore,
    pub cutscenes: Vec<CutsceneFrame>,
    pub override_mark: Option<OverrideMark>,
    pub timers: Vec<u64>,
    pub cursor_state: i32,
    pub userput: i32,
    pub selected_sound: i32,
}

fn bincode_opts() -> impl bincode::Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_PAYLOAD_BYTES as u64)
}

impl Snapshot {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode_opts().serialize(self).context("serialize Snapshot")?;
        let len: u32 = payload.len().try_into().context("payload length overflow")?;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&SAVE_MAGIC);
        out.write_u16::<LittleEndian>(SAVE_VERSION)?;
        out.write_u32::<LittleEndian>(len)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("save data too short: {} bytes", bytes.len());
        }
        let mut rd = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        rd.read_exact(&mut magic)?;
        if magic != SAVE_MAGIC {
            bail!("bad save magic {:02X?}", magic);
        }
        let version = rd.read_u16::<LittleEndian>()?;
        if version != SAVE_VERSION {
            bail!("unsupported save version {} (expected {})", version, SAVE_VERSION);
        }
        let len = rd.read_u32::<LittleEndian>()? as usize;
        if len > MAX_PAYLOAD_BYTES {
            bail!("save payload length {} exceeds max {}", len, MAX_PAYLOAD_BYTES);
        }
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != len {
            bail!("save payload is {} bytes, header says {}", payload.len(), len);
        }
        bincode_opts().deserialize(payload).context("deserialize Snapshot")
    }
}

/// Every slot id the snapshot refers to outside its own slot list must exist
/// in a machine with `slot_count` slots.
fn check_slot_refs(snap: &Snapshot, slot_count: usize) -> Result<()> {
    let check = |id: SlotId, what: &str| -> Result<()> {
        if id >= slot_count {
            bail!("{} refers to slot {}, config has {} slots", what, id, slot_count);
        }
        Ok(())
    };

    for (depth, frame) in snap.cutscenes.iter().enumerate() {
        if let Some(id) = frame.slot {
            check(id, "cutscene frame")?;
        }
        if let Some(mark) = frame.override_mark {
            check(mark.slot, "cutscene override")?;
        }
        if frame.freeze_depths.len() != slot_count {
            bail!(
                "cutscene frame {} saved {} freeze depths, config has {} slots",
                depth,
                frame.freeze_depths.len(),
                slot_count
            );
        }
    }
    if let Some(mark) = snap.override_mark {
        check(mark.slot, "override")?;
    }
    for (handle, array) in snap.arrays.live() {
        if let ArrayOwner::Script(id) = array.owner {
            check(id, &format!("array {} owner", handle))?;
        }
        if let Some(id) = array.binding.and_then(|b| b.slot) {
            check(id, &format!("array {} binding", handle))?;
        }
    }
    Ok(())
}

impl Vm {
    /// Captures the machine. Only valid between ticks.
    pub fn snapshot(&self) -> Result<Snapshot> {
        if let Some(id) = self.current {
            bail!("cannot save while slot {} is executing", id);
        }
        let slots = self
            .slots
            .iter()
            .filter(|s| s.is_active())
            .map(|s| SlotSnapshot {
                id: s.id,
                script: s.script,
                owner: s.owner,
                source: s.source.clone(),
                pc: s.pc,
                run: s.run_state(),
                freeze_depth: s.freeze_depth(),
                flags: s.flags,
                cutscene_depth: s.cutscene_depth,
                eligible_from: s.eligible_from,
                locals: s.locals.clone(),
                stack: s.stack.clone(),
                messages: s.messages.clone(),
                callbacks: s.callbacks.clone(),
                generation: s.generation(),
            })
            .collect::<Vec<_>>();
        trace::save(format_args!("snapshot tick={} slots={}", self.tick, slots.len()));

        Ok(Snapshot {
            tick: self.tick,
            room: self.room,
            slots,
            vars: self.vars.clone(),
            arrays: self.arrays.clone(),
            cutscenes: self.cutscenes.clone(),
            override_mark: self.override_mark,
            timers: self.timers.to_vec(),
            cursor_state: self.cursor_state,
            userput: self.userput,
            selected_sound: self.selected_sound,
        })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        self.snapshot()?.encode()
    }

    /// Rebuilds a machine from [`Vm::save`] output.
    ///
    /// Every callback name must resolve in `registry`, and every asset-backed
    /// slot must be fetchable from `host`. The random generator is reseeded
    /// from the configured seed and the saved tick.
    pub fn load(bytes: &[u8], config: VmConfig, registry: CallbackRegistry, host: &mut dyn Host) -> Result<Vm> {
        let snap = Snapshot::decode(bytes)?;
        Vm::restore(snap, config, registry, host)
    }

    pub fn restore(snap: Snapshot, config: VmConfig, registry: CallbackRegistry, host: &mut dyn Host) -> Result<Vm> {
        let bindings: Vec<CallbackBinding> = snap.slots.iter().flat_map(|s| s.callbacks.iter().cloned()).collect();
        registry.check(&bindings).context("resolve saved slot callbacks")?;

        if snap.vars.global_count() != config.global_vars || snap.vars.room_count() != config.room_vars {
            bail!(
                "saved variable table ({} global, {} room) does not match config ({}, {})",
                snap.vars.global_count(),
                snap.vars.room_count(),
                config.global_vars,
                config.room_vars
            );
        }
        if snap.arrays.capacity() != config.max_arrays {
            bail!(
                "saved array pool holds {} handles, config allows {}",
                snap.arrays.capacity(),
                config.max_arrays
            );
        }
        if snap.timers.len() != TIMER_COUNT {
            bail!("saved {} timers, expected {}", snap.timers.len(), TIMER_COUNT);
        }
        check_slot_refs(&snap, config.slot_count)?;

        let mut vm = Vm::new(config);
        vm.registry = registry;
        vm.rng = SmallRng::seed_from_u64(vm.config.rng_seed ^ snap.tick);

        vm.arrays = snap.arrays;
        vm.vars = snap.vars;
        vm.tick = snap.tick;
        vm.room = snap.room;
        vm.cutscenes = snap.cutscenes;
        vm.override_mark = snap.override_mark;
        vm.timers.copy_from_slice(&snap.timers);
        vm.cursor_state = snap.cursor_state;
        vm.userput = snap.userput;
        vm.selected_sound = snap.selected_sound;

        let local_vars = vm.config.local_vars;
        for s in snap.slots {
            let code: Arc<[u8]> = match &s.source {
                CodeSource::Asset(key) => host
                    .request_asset(key)
                    .with_context(|| format!("reload {} for slot {}", key, s.id))?,
                CodeSource::Inline(bytes) => Arc::from(bytes.as_slice()),
            };
            if s.pc as usize > code.len() {
                bail!("slot {} pc 0x{:X} is past the end of its code ({} bytes)", s.id, s.pc, code.len());
            }
            if s.locals.len() != local_vars {
                bail!("slot {} saved {} locals, config has {}", s.id, s.locals.len(), local_vars);
            }
            let Some(slot) = vm.slots.get_mut(s.id) else {
                bail!("saved slot {} exceeds slot_count", s.id);
            };
            trace::save(format_args!("restore slot={} script={} pc=0x{:X}", s.id, s.script, s.pc));
            slot.script = s.script;
            slot.owner = s.owner;
            slot.source = s.source;
            slot.set_code(code);
            slot.pc = s.pc;
            slot.set_run_state(s.run);
            slot.set_freeze_depth(s.freeze_depth);
            slot.flags = s.flags;
            slot.cutscene_depth = s.cutscene_depth;
            slot.eligible_from = s.eligible_from;
            slot.locals = s.locals;
            slot.stack = s.stack;
            slot.messages = s.messages;
            slot.callbacks = s.callbacks;
            slot.set_generation(s.generation);
        }

        log::debug!("loaded snapshot at tick {}", vm.tick);
        Ok(vm)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::asm::Asm;
    use crate::host::{AssetKey, MemoryHost};
    use crate::vm::SlotState;

    fn counter() -> Vec<u8> {
        // var10 += 1 every tick, forever
        Asm::new().label("top").var_inc(10).break_here().jump("top").finish()
    }

    #[test]
    fn header_is_validated() {
        let vm = Vm::new(VmConfig::default());
        let mut bytes = vm.save().unwrap();
        assert_eq!(&bytes[..4], b"HEVM");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), SAVE_VERSION);

        let mut host = MemoryHost::new();
        bytes[4] = 9;
        let err = Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut host).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported save version 9"));

        bytes[0] = b'X';
        assert!(Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut host).is_err());
        assert!(Vm::load(&bytes[..6], VmConfig::default(), CallbackRegistry::new(), &mut host).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = Vm::new(VmConfig::default()).save().unwrap();
        bytes.push(0);
        let mut host = MemoryHost::new();
        assert!(Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut host).is_err());
    }

    #[test]
    fn round_trip_resumes_identically() {
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Script(7), counter());
        let mut vm = Vm::new(VmConfig::default());
        let id = vm
            .start_script(&mut host, 7, &[], StartFlags::empty(), false)
            .unwrap()
            .unwrap();
        for _ in 0..3 {
            vm.run_tick(&mut host);
        }
        vm.delay_slot(id, 5).unwrap();

        let bytes = vm.save().unwrap();
        let mut loaded = Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut host).unwrap();
        assert_eq!(loaded.tick(), vm.tick());
        assert_eq!(loaded.slot_state(id), vm.slot_state(id));
        assert_eq!(loaded.slot_state(id), Some(SlotState::WaitingOnTimer { wake: 8 }));
        assert_eq!(loaded.snapshot().unwrap(), vm.snapshot().unwrap());

        for _ in 0..10 {
            vm.run_tick(&mut host);
            loaded.run_tick(&mut host);
        }
        assert_eq!(loaded.read_var(10), vm.read_var(10));
        assert_eq!(loaded.slot(id).map(|s| s.pc), vm.slot(id).map(|s| s.pc));
    }

    #[test]
    fn missing_asset_fails_the_load() {
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Script(7), counter());
        let mut vm = Vm::new(VmConfig::default());
        vm.start_script(&mut host, 7, &[], StartFlags::empty(), true).unwrap();
        let bytes = vm.save().unwrap();

        let mut empty = MemoryHost::new();
        let err = Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut empty).unwrap_err();
        assert!(format!("{err:#}").contains("script 7"));
    }

    #[test]
    fn callbacks_must_resolve_by_name() {
        let mut host = MemoryHost::new();
        let mut vm = Vm::new(VmConfig::default());
        vm.registry_mut().register("on-stop", |_, _| {});
        let id = vm.start_inline(&mut host, 1, counter(), &[], true).unwrap();
        vm.attach_callback(id, "on-stop", 3).unwrap();
        let bytes = vm.save().unwrap();

        let err = Vm::load(&bytes, VmConfig::default(), CallbackRegistry::new(), &mut host).unwrap_err();
        assert!(format!("{err:#}").contains("on-stop"));

        let mut registry = CallbackRegistry::new();
        registry.register("on-stop", |_, _| {});
        let loaded = Vm::load(&bytes, VmConfig::default(), registry, &mut host).unwrap();
        assert_eq!(loaded.slot(id).unwrap().callbacks[0].data, 3);
    }

    #[test]
    fn dangling_slot_references_are_rejected() {
        let mut host = MemoryHost::new();
        let mut vm = Vm::new(VmConfig::default());
        let id = vm.start_inline(&mut host, 1, counter(), &[], false).unwrap();
        let h = vm
            .define_array_in(Some(id), 0x4000, crate::vm::ElementType::Byte, (0, 3), (0, 0))
            .unwrap();
        vm.arrays.localize(h, ArrayOwner::Script(id)).unwrap();
        vm.begin_cutscene(&mut host, &[]).unwrap();
        let snap = vm.snapshot().unwrap();
        assert!(Vm::restore(snap.clone(), VmConfig::default(), CallbackRegistry::new(), &mut host).is_ok());

        let mut bad = snap.clone();
        bad.cutscenes[0].slot = Some(30 + VmConfig::default().slot_count);
        let err = Vm::restore(bad, VmConfig::default(), CallbackRegistry::new(), &mut host).unwrap_err();
        assert!(format!("{err:#}").contains("cutscene frame"), "{err:#}");

        let mut bad = snap.clone();
        bad.cutscenes[0].freeze_depths.pop();
        assert!(Vm::restore(bad, VmConfig::default(), CallbackRegistry::new(), &mut host).is_err());

        let mut bad = snap.clone();
        bad.override_mark = Some(OverrideMark { slot: 500, pc: 0 });
        assert!(Vm::restore(bad, VmConfig::default(), CallbackRegistry::new(), &mut host).is_err());

        let mut bad = snap;
        bad.arrays.get_mut(h).unwrap().owner = ArrayOwner::Script(500);
        let err = Vm::restore(bad, VmConfig::default(), CallbackRegistry::new(), &mut host).unwrap_err();
        assert!(format!("{err:#}").contains("slot 500"), "{err:#}");
    }

    #[test]
    fn config_mismatch_is_reported() {
        let bytes = Vm::new(VmConfig::default()).save().unwrap();
        let config = VmConfig {
            global_vars: 10,
            ..VmConfig::default()
        };
        let mut host = MemoryHost::new();
        assert!(Vm::load(&bytes, config, CallbackRegistry::new(), &mut host).is_err());
    }
}
