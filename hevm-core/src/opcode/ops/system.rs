use crate::error::{VmError, VmResult};
use crate::host::{AssetKey, IniKey, IniValue, VmEvent};
use crate::opcode::family::{decode, ConfigValue, CursorOp, ResourceKind, SoundOp, SubOpcode, SystemOp};
use crate::trace;
use crate::vm::Exec;

const MAX_CHARSET_COLORS: usize = 16;

pub(super) fn create_sound(e: &mut Exec<'_>) -> VmResult<()> {
    let sub = e.fetch_u8()?;
    match SoundOp::from_byte(sub) {
        Some(SoundOp::Discard) => {
            e.pop()?;
        }
        Some(SoundOp::Nop) => {}
        Some(SoundOp::Select) => {
            let id = e.pop()?;
            *e.selected_sound() = id;
        }
        Some(SoundOp::Queue) => {
            let id = *e.selected_sound();
            e.host().queue_sound(id);
        }
        None => log::warn!("createSound: unknown sub-opcode {}", sub),
    }
    Ok(())
}

pub(super) fn get_sound_status(e: &mut Exec<'_>) -> VmResult<()> {
    let sub = e.pop()?;
    let sound = e.pop()?;
    let running = e.host().is_sound_running(sound);
    let v = match sub {
        0 => !running as i32,
        1 => running as i32,
        _ => {
            log::warn!("getSoundStatus: unknown query {} for sound {}", sub, sound);
            0
        }
    };
    e.push(v)
}

pub(super) fn stop_sound(e: &mut Exec<'_>) -> VmResult<()> {
    let sound = e.pop()?;
    e.host().stop_sound(sound);
    Ok(())
}

pub(super) fn is_sound_running(e: &mut Exec<'_>) -> VmResult<()> {
    let sound = e.pop()?;
    let running = sound != 0 && e.host().is_sound_running(sound);
    e.push(running as i32)
}

fn set_cursor_image(e: &mut Exec<'_>, inventory_state: bool) -> VmResult<()> {
    let image = e.pop()?;
    if e.host().request_asset(&AssetKey::Image(image)).is_none() {
        log::warn!("cursorCommand: cursor image {} not found", image);
        return Ok(());
    }
    e.host().set_cursor_image(image, inventory_state);
    Ok(())
}

pub(super) fn cursor_command(e: &mut Exec<'_>) -> VmResult<()> {
    let sub: CursorOp = decode(e.fetch_u8()?)?;
    match sub {
        CursorOp::InventoryImage => set_cursor_image(e, false)?,
        CursorOp::InventoryImageAlt => set_cursor_image(e, true)?,
        CursorOp::On => *e.cursor_state() = 1,
        CursorOp::Off => *e.cursor_state() = 0,
        CursorOp::UserputOn => *e.userput() = 1,
        CursorOp::UserputOff => *e.userput() = 0,
        CursorOp::SoftOn => {
            let state = e.cursor_state();
            *state += 1;
            if *state > 1 {
                return Err(VmError::InvalidState("cursor state greater than 1 in script".into()));
            }
        }
        CursorOp::SoftOff => *e.cursor_state() -= 1,
        CursorOp::UserputSoftOn => *e.userput() += 1,
        CursorOp::UserputSoftOff => *e.userput() -= 1,
        CursorOp::ImageById => log::warn!("cursorCommand: cursors cannot be set by id, use images"),
        CursorOp::Charset => {
            let id = e.pop()?;
            e.host().set_charset(id);
        }
        CursorOp::CharsetColors => {
            let colors: Vec<u8> = e.pop_list(MAX_CHARSET_COLORS)?.into_iter().map(|c| c as u8).collect();
            e.host().set_charset_colors(&colors);
        }
    }

    let cursor = *e.cursor_state();
    let userput = *e.userput();
    e.write_well_known(|c| c.vars.cursor_state, cursor);
    e.write_well_known(|c| c.vars.userput, userput);
    Ok(())
}

fn script_string(e: &mut Exec<'_>) -> VmResult<String> {
    let bytes = e.copy_script_string()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Pushes the value stored under `key`: a number, or the handle of a fresh
/// string array. Missing entries read as 0 or the empty string.
fn push_config_value(e: &mut Exec<'_>, kind: ConfigValue, key: &IniKey) -> VmResult<()> {
    let stored = e.host().read_ini(key);
    match kind {
        ConfigValue::Number => {
            let v = match stored {
                Some(IniValue::Number(n)) => n,
                Some(IniValue::Text(t)) => t.trim().parse().unwrap_or(0),
                None => 0,
            };
            e.push(v)
        }
        ConfigValue::Text => {
            let text = match stored {
                Some(IniValue::Text(t)) => t,
                Some(IniValue::Number(n)) => n.to_string(),
                None => String::new(),
            };
            // var 0 is scratch: clear it so the previous result survives
            e.write_var(0, 0)?;
            let handle = e.define_string(0, text.as_bytes())?;
            e.push(handle)
        }
    }
}

fn pop_config_value(e: &mut Exec<'_>, kind: ConfigValue) -> VmResult<IniValue> {
    Ok(match kind {
        ConfigValue::Number => IniValue::Number(e.pop()?),
        ConfigValue::Text => IniValue::Text(script_string(e)?),
    })
}

pub(super) fn read_config_file(e: &mut Exec<'_>) -> VmResult<()> {
    let section = script_string(e)?;
    let key = script_string(e)?;
    let file = script_string(e)?;
    let kind: ConfigValue = decode(e.fetch_u8()?)?;
    log::debug!("readConfigFile: {} [{}] {}", file, section, key);
    push_config_value(e, kind, &IniKey { file, section, key })
}

pub(super) fn write_config_file(e: &mut Exec<'_>) -> VmResult<()> {
    let kind: ConfigValue = decode(e.fetch_u8()?)?;
    let value = pop_config_value(e, kind)?;
    let section = script_string(e)?;
    let key = script_string(e)?;
    let file = script_string(e)?;
    log::debug!("writeConfigFile: {} [{}] {} = {:?}", file, section, key, value);
    e.host().write_ini(&IniKey { file, section, key }, value);
    Ok(())
}

fn ini_option(key: String) -> IniKey {
    IniKey {
        file: String::new(),
        section: String::new(),
        key,
    }
}

pub(super) fn read_ini(e: &mut Exec<'_>) -> VmResult<()> {
    let option = script_string(e)?;
    let kind: ConfigValue = decode(e.fetch_u8()?)?;
    push_config_value(e, kind, &ini_option(option))
}

pub(super) fn write_ini(e: &mut Exec<'_>) -> VmResult<()> {
    let kind: ConfigValue = decode(e.fetch_u8()?)?;
    let value = pop_config_value(e, kind)?;
    let option = script_string(e)?;
    e.host().write_ini(&ini_option(option), value);
    Ok(())
}

pub(super) fn quit_pause_restart(e: &mut Exec<'_>) -> VmResult<()> {
    let sub = e.fetch_u8()?;
    match SystemOp::from_byte(sub) {
        Some(SystemOp::Restart) => e.host().event(VmEvent::Restart),
        Some(SystemOp::Quit) => e.host().event(VmEvent::Quit),
        None => log::warn!("quitPauseRestart: unknown sub-opcode {}", sub),
    }
    Ok(())
}

pub(super) fn get_resource_size(e: &mut Exec<'_>) -> VmResult<()> {
    let id = e.pop()?;
    let kind: ResourceKind = decode(e.fetch_u8()?)?;
    let key = match kind {
        ResourceKind::Sound => AssetKey::Sound(id),
        ResourceKind::Room => AssetKey::Room(id),
        ResourceKind::Image => AssetKey::Image(id),
        ResourceKind::Costume => AssetKey::Costume(id),
        ResourceKind::Script => AssetKey::Script(id),
    };
    let size = match e.host().request_asset(&key) {
        Some(bytes) => bytes.len() as i32,
        None => {
            log::warn!("getResourceSize: {} not found", key);
            0
        }
    };
    e.push(size)
}

pub(super) fn trace_status(e: &mut Exec<'_>) -> VmResult<()> {
    let message = script_string(e)?;
    let value = e.pop()?;
    let slot = e.slot_id();
    trace::vm(format_args!("traceStatus slot={} value={} {}", slot, value, message));
    log::debug!("script {} trace: {} ({})", e.script(), message, value);
    e.host().event(VmEvent::Trace { slot, value, message });
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::asm::Asm;
    use crate::config::VmConfig;
    use crate::error::VmError;
    use crate::host::{AssetKey, IniKey, IniValue, MemoryHost, VmEvent};
    use crate::vm::Vm;

    fn run_with(host: &mut MemoryHost, code: Vec<u8>) -> Vm {
        let mut vm = Vm::new(VmConfig::default());
        vm.start_inline(host, 1, code, &[], true).unwrap();
        vm
    }

    fn option(key: &str) -> IniKey {
        IniKey {
            file: String::new(),
            section: String::new(),
            key: key.to_string(),
        }
    }

    #[test]
    fn sound_select_then_queue() {
        let mut host = MemoryHost::new();
        let code = Asm::new()
            .push_byte(42)
            .sound_op(232)
            .sound_op(255)
            .sound_op(99)
            .push_byte(42)
            .push_byte(1)
            .sound_status()
            .write_var(10)
            .push_byte(42)
            .stop_sound()
            .push_byte(42)
            .is_sound_running()
            .write_var(11)
            .finish();
        let vm = run_with(&mut host, code);
        assert!(host.faults().is_empty());
        assert_eq!(host.queued_sounds, vec![42]);
        assert_eq!(host.stopped_sounds, vec![42]);
        assert_eq!(vm.read_var(10), Ok(1));
        assert_eq!(vm.read_var(11), Ok(0));
    }

    #[test]
    fn cursor_command_mirrors_state_into_vars() {
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Image(7), vec![1u8]);
        let code = Asm::new()
            .cursor(0x90)
            .cursor(0x92)
            .cursor(0x97)
            .push_byte(7)
            .cursor(0x14)
            .push_byte(8)
            .cursor(0x13)
            .push_byte(3)
            .cursor(0x9C)
            .list(&[1, 2, 300])
            .cursor(0x9D)
            .finish();
        let vm = run_with(&mut host, code);
        assert!(host.faults().is_empty());
        assert_eq!(vm.read_var(52), Ok(1));
        assert_eq!(vm.read_var(53), Ok(0));
        assert_eq!(host.cursor_images, vec![(7, true)]);
        assert_eq!(host.charset, Some(3));
        assert_eq!(host.charset_colors, vec![1, 2, 44]);
    }

    #[test]
    fn soft_cursor_above_one_is_fatal() {
        let mut host = MemoryHost::new();
        let code = Asm::new().cursor(0x94).cursor(0x94).finish();
        run_with(&mut host, code);
        assert!(matches!(host.faults()[0].error, VmError::InvalidState(_)));
        assert_eq!(host.faults()[0].pc, 2);
    }

    #[test]
    fn unknown_cursor_sub_opcode_is_fatal() {
        let mut host = MemoryHost::new();
        run_with(&mut host, Asm::new().cursor(0x50).finish());
        assert_eq!(
            host.faults()[0].error,
            VmError::InvalidSubOpcode {
                family: "cursor",
                sub: 0x50
            }
        );
    }

    #[test]
    fn ini_values_round_trip_through_the_host() {
        let mut host = MemoryHost::new();
        host.ini.insert(option("Volume"), IniValue::Number(80));
        host.ini.insert(option("Name"), IniValue::Text("Pajama".into()));
        let code = Asm::new()
            .message(b"Volume")
            .read_ini(6)
            .write_var(10)
            .message(b"Name")
            .read_ini(7)
            .write_var(11)
            .message(b"Missing")
            .read_ini(6)
            .write_var(12)
            .message(b"Speed")
            .push_byte(5)
            .write_ini(6)
            .finish();
        let vm = run_with(&mut host, code);
        assert!(host.faults().is_empty());
        assert_eq!(vm.read_var(10), Ok(80));
        assert_eq!(vm.read_var(12), Ok(0));
        let h = vm.read_var(11).unwrap();
        assert_eq!(vm.arrays().get(h).unwrap().c_bytes(), b"Pajama".to_vec());
        assert_eq!(host.ini.get(&option("Speed")), Some(&IniValue::Number(5)));
    }

    #[test]
    fn config_file_strings_survive_a_second_read() {
        let mut host = MemoryHost::new();
        let key = |k: &str| IniKey {
            file: "game.ini".into(),
            section: "Prefs".into(),
            key: k.into(),
        };
        host.ini.insert(key("A"), IniValue::Text("one".into()));
        host.ini.insert(key("B"), IniValue::Text("two".into()));
        let code = Asm::new()
            .message(b"game.ini")
            .message(b"A")
            .message(b"Prefs")
            .read_config_file(7)
            .write_var(10)
            .message(b"game.ini")
            .message(b"B")
            .message(b"Prefs")
            .read_config_file(7)
            .write_var(11)
            .message(b"game.ini")
            .message(b"C")
            .message(b"Prefs")
            .message(b"three")
            .write_config_file(7)
            .finish();
        let vm = run_with(&mut host, code);
        assert!(host.faults().is_empty());
        let a = vm.read_var(10).unwrap();
        let b = vm.read_var(11).unwrap();
        assert_ne!(a, b);
        assert_eq!(vm.arrays().get(a).unwrap().c_bytes(), b"one".to_vec());
        assert_eq!(vm.arrays().get(b).unwrap().c_bytes(), b"two".to_vec());
        assert_eq!(host.ini.get(&key("C")), Some(&IniValue::Text("three".into())));
    }

    #[test]
    fn resource_size_pushes_zero_on_miss() {
        let mut host = MemoryHost::new();
        host.insert(AssetKey::Sound(4), vec![0u8; 1234]);
        let code = Asm::new()
            .push_byte(4)
            .resource_size(13)
            .write_var(10)
            .push_byte(5)
            .resource_size(13)
            .write_var(11)
            .finish();
        let vm = run_with(&mut host, code);
        assert_eq!(vm.read_var(10), Ok(1234));
        assert_eq!(vm.read_var(11), Ok(0));
    }

    #[test]
    fn trace_and_quit_reach_the_host() {
        let mut host = MemoryHost::new();
        let code = Asm::new().push_byte(9).message(b"hello").trace_status().system(160).finish();
        run_with(&mut host, code);
        assert_eq!(
            host.events[..2].to_vec(),
            vec![
                VmEvent::Trace {
                    slot: 0,
                    value: 9,
                    message: "hello".into()
                },
                VmEvent::Quit,
            ]
        );
    }
}
