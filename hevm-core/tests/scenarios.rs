use pretty_assertions::assert_eq;

use hevm_core::asm::Asm;
use hevm_core::opcode::{self, Handler};
use hevm_core::vm::{ElementType, OperandStack};
use hevm_core::{AssetKey, MemoryHost, StartFlags, Vm, VmConfig, VmError, VmEvent};

fn vm() -> Vm {
    Vm::new(VmConfig::default())
}

#[test]
fn push_add_write() {
    let mut vm = vm();
    let mut host = MemoryHost::new();
    let code = Asm::new().push_byte(5).push_byte(3).add().write_var(100).finish();
    assert_eq!(code, vec![0x00, 5, 0x00, 3, 0x14, 0x43, 100, 0]);
    vm.start_inline(&mut host, 1, code, &[], true).unwrap();
    assert_eq!(vm.read_var(100), Ok(8));
    assert!(host.faults().is_empty());
}

#[test]
fn stack_is_lifo_and_underflow_fails() {
    let mut s = OperandStack::new(150);
    for v in 0..20 {
        s.push(v).unwrap();
    }
    for v in (0..20).rev() {
        assert_eq!(s.pop(), Ok(v));
    }
    assert_eq!(s.pop(), Err(VmError::StackUnderflow));
}

#[test]
fn quick_start_runs_before_returning() {
    let mut host = MemoryHost::new();
    let script = Asm::new()
        .push_byte(1)
        .write_var(300)
        .break_here()
        .push_byte(2)
        .write_var(300)
        .finish();
    host.insert(AssetKey::Script(7), script);

    let mut vm = vm();
    vm.start_script(&mut host, 7, &[], StartFlags::empty(), true).unwrap();
    assert_eq!(vm.read_var(300), Ok(1));

    let mut vm = Vm::new(VmConfig::default());
    vm.run_tick(&mut host);
    let t = vm.tick();
    vm.start_script(&mut host, 7, &[], StartFlags::empty(), false).unwrap();
    assert_eq!(vm.read_var(300), Ok(0));
    // still tick T
    vm.run_tick(&mut host);
    assert_eq!(vm.read_var(300), Ok(0));
    assert_eq!(vm.tick(), t + 1);
    vm.run_tick(&mut host);
    assert_eq!(vm.read_var(300), Ok(1));
}

#[test]
fn array_bounds_are_checked() {
    let mut vm = vm();
    vm.define_array(50, ElementType::Word, (1, 10), (0, 0)).unwrap();
    assert!(matches!(
        vm.write_array(50, 0, 11, 9),
        Err(VmError::ArrayOutOfBounds { col: 11, .. })
    ));
    assert!(matches!(
        vm.read_array(50, 0, 0),
        Err(VmError::ArrayOutOfBounds { col: 0, .. })
    ));
    vm.write_array(50, 0, 10, 1234).unwrap();
    assert_eq!(vm.read_array(50, 0, 10), Ok(1234));
    vm.write_array(50, 0, 1, -5).unwrap();
    assert_eq!(vm.read_array(50, 0, 1), Ok(-5));
}

#[test]
fn cutscene_restores_freeze_depths() {
    let mut host = MemoryHost::new();
    let idle = Asm::new().label("top").break_here().jump("top").finish();
    host.insert(AssetKey::Script(20), idle.clone());
    host.insert(AssetKey::Script(21), idle);
    host.insert(
        AssetKey::Script(10),
        Asm::new()
            .list(&[])
            .cutscene()
            .push_byte(1)
            .freeze_unfreeze()
            .break_here()
            .end_cutscene()
            .finish(),
    );
    host.insert(AssetKey::Script(30), Asm::new().push_byte(1).write_var(100).finish());

    let mut vm = vm();
    vm.write_var(36, 30).unwrap();
    let a = vm.start_script(&mut host, 20, &[], StartFlags::empty(), true).unwrap().unwrap();
    let b = vm.start_script(&mut host, 21, &[], StartFlags::empty(), true).unwrap().unwrap();
    vm.freeze_slot(b).unwrap();

    let c = vm.start_script(&mut host, 10, &[], StartFlags::empty(), true).unwrap().unwrap();
    assert_eq!(vm.cutscene_depth(), 1);
    assert_eq!(vm.slot(a).unwrap().freeze_depth(), 1);
    assert_eq!(vm.slot(b).unwrap().freeze_depth(), 2);
    assert_eq!(vm.slot(c).unwrap().freeze_depth(), 0);

    vm.run_tick(&mut host);
    assert!(host.faults().is_empty());
    assert_eq!(vm.cutscene_depth(), 0);
    assert_eq!(vm.slot(a).unwrap().freeze_depth(), 0);
    assert_eq!(vm.slot(b).unwrap().freeze_depth(), 1);
    // the end hook ran
    assert_eq!(vm.read_var(100), Ok(1));
}

#[test]
fn dispatch_is_total() {
    let mut invalid = 0;
    for op in 0..=u8::MAX {
        let e = opcode::entry(op);
        assert_eq!(e.opcode, op);
        if matches!(e.handler, Handler::Invalid) {
            invalid += 1;
        }
    }
    assert!(invalid > 0);

    let mut vm = vm();
    let mut host = MemoryHost::new();
    vm.start_inline(&mut host, 1, vec![0x05], &[], true).unwrap();
    vm.start_inline(&mut host, 1, vec![0x61], &[], true).unwrap();
    let errors: Vec<VmError> = host.faults().into_iter().map(|f| f.error.clone()).collect();
    assert_eq!(
        errors,
        vec![
            VmError::InvalidOpcode { opcode: 0x05 },
            VmError::UnsupportedOpcode {
                opcode: 0x61,
                name: "drawObject".into()
            },
        ]
    );
}

#[test]
fn faults_stop_only_the_offending_slot() {
    let mut vm = vm();
    let mut host = MemoryHost::new();
    let counter = Asm::new().label("top").var_inc(10).break_here().jump("top").finish();
    let crash = Asm::new().break_here().push_byte(1).push_byte(0).div().finish();
    let good = vm.start_inline(&mut host, 1, counter, &[], false).unwrap();
    let bad = vm.start_inline(&mut host, 2, crash, &[], false).unwrap();

    for _ in 0..4 {
        vm.run_tick(&mut host);
    }
    assert_eq!(vm.read_var(10), Ok(3));
    assert!(vm.slot(good).unwrap().is_active());
    assert!(!vm.slot(bad).unwrap().is_active());

    let faults = host.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].slot, bad);
    assert_eq!(faults[0].script, 2);
    assert_eq!(faults[0].pc, 5);
    assert_eq!(faults[0].error, VmError::DivisionByZero);
    assert!(host
        .events
        .iter()
        .any(|e| *e == VmEvent::SlotStopped { slot: bad, script: 2 }));
}
