use pretty_assertions::assert_eq;

use hevm_core::asm::Asm;
use hevm_core::save::Snapshot;
use hevm_core::vm::ElementType;
use hevm_core::{AssetKey, CallbackRegistry, MemoryHost, SlotState, StartFlags, Vm, VmConfig};

fn cutscene_with_override() -> Vec<u8> {
    Asm::new()
        .list(&[4, 5])
        .cutscene()
        .begin_override("skip")
        .label("wait")
        .var_inc(100)
        .break_here()
        .jump("wait")
        .label("skip")
        .end_override()
        .end_cutscene()
        .push_word(777)
        .write_var(101)
        .finish()
}

fn counter() -> Vec<u8> {
    Asm::new().label("top").var_inc(10).break_here().jump("top").finish()
}

fn registry() -> CallbackRegistry {
    let mut r = CallbackRegistry::new();
    r.register("noop", |_, _| {});
    r
}

#[test]
fn mid_cutscene_state_survives_a_reload() {
    let mut host = MemoryHost::new();
    host.insert(AssetKey::Script(10), cutscene_with_override());

    let mut vm = Vm::new(VmConfig::default());
    *vm.registry_mut() = registry();
    vm.define_array(50, ElementType::Word, (0, 3), (0, 1)).unwrap();
    vm.write_array(50, 1, 2, -42).unwrap();

    let scene = vm.start_script(&mut host, 10, &[], StartFlags::empty(), true).unwrap().unwrap();
    let bg = vm.start_inline(&mut host, 99, counter(), &[], false).unwrap();
    vm.attach_callback(bg, "noop", 3).unwrap();
    for _ in 0..3 {
        vm.run_tick(&mut host);
    }

    let bytes = vm.save().unwrap();
    assert_eq!(&bytes[..4], b"HEVM");
    let mut loaded = Vm::load(&bytes, VmConfig::default(), registry(), &mut host).unwrap();

    assert_eq!(loaded.snapshot().unwrap(), vm.snapshot().unwrap());
    assert_eq!(loaded.read_array(50, 1, 2), Ok(-42));
    assert_eq!(loaded.cutscene_depth(), 1);
    assert_eq!(loaded.override_mark(), vm.override_mark());
    assert_eq!(loaded.slot_state(bg), Some(SlotState::Running));

    for m in [&mut vm, &mut loaded] {
        m.interrupt_user(&mut host);
        m.run_tick(&mut host);
        m.run_tick(&mut host);
    }
    for m in [&vm, &loaded] {
        assert_eq!(m.read_var(101), Ok(777));
        assert_eq!(m.cutscene_depth(), 0);
        assert_eq!(m.slot_state(scene), Some(SlotState::Stopped));
    }
    assert_eq!(loaded.read_var(100), vm.read_var(100));
    assert_eq!(loaded.read_var(10), vm.read_var(10));
    assert_eq!(loaded.tick(), vm.tick());
}

#[test]
fn snapshots_skip_idle_slots_and_reject_tampering() {
    let mut host = MemoryHost::new();
    let mut vm = Vm::new(VmConfig::default());
    vm.start_inline(&mut host, 1, counter(), &[], false).unwrap();

    let snap = vm.snapshot().unwrap();
    assert_eq!(snap.slots.len(), 1);
    assert_eq!(snap.slots[0].script, 1);

    let mut bytes = snap.encode().unwrap();
    assert_eq!(Snapshot::decode(&bytes).unwrap(), snap);

    bytes[4] = 9;
    let err = Snapshot::decode(&bytes).unwrap_err();
    assert!(err.to_string().contains("version"), "{err:#}");
}

#[test]
fn saves_from_a_larger_machine_do_not_load_into_a_smaller_one() {
    let mut host = MemoryHost::new();
    host.insert(AssetKey::Script(10), cutscene_with_override());
    let mut vm = Vm::new(VmConfig::default());
    vm.start_script(&mut host, 10, &[], StartFlags::empty(), true).unwrap();
    assert_eq!(vm.cutscene_depth(), 1);
    let bytes = vm.save().unwrap();

    let small = VmConfig {
        slot_count: 10,
        ..VmConfig::default()
    };
    let err = Vm::load(&bytes, small, CallbackRegistry::new(), &mut host).unwrap_err();
    assert!(format!("{err:#}").contains("freeze depths"), "{err:#}");

    let mut snap = Snapshot::decode(&bytes).unwrap();
    snap.cutscenes[0].slot = Some(30);
    snap.cutscenes[0].freeze_depths.truncate(10);
    let small = VmConfig {
        slot_count: 10,
        ..VmConfig::default()
    };
    let err = Vm::restore(snap, small, CallbackRegistry::new(), &mut host).unwrap_err();
    assert!(format!("{err:#}").contains("slot 30"), "{err:#}");
}
