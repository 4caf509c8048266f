use crate::error::{VmError, VmResult};
use crate::host::{AssetKey, WaitCondition};
use crate::opcode::family::{decode, GetTimer, SetTimer, WaitOp};
use crate::vm::{Exec, SlotRequest, StartFlags, StartTarget};

use super::MAX_SCRIPT_ARGS;

pub(super) fn jump(e: &mut Exec<'_>) -> VmResult<()> {
    let offset = e.fetch_i16()?;
    e.jump(offset)
}

fn branch(e: &mut Exec<'_>, when: bool) -> VmResult<()> {
    let cond = e.pop()? != 0;
    let offset = e.fetch_i16()?;
    if cond == when {
        e.jump(offset)?;
    }
    Ok(())
}

pub(super) fn if_true(e: &mut Exec<'_>) -> VmResult<()> {
    branch(e, true)
}

pub(super) fn if_not(e: &mut Exec<'_>) -> VmResult<()> {
    branch(e, false)
}

fn start(e: &mut Exec<'_>, target: StartTarget, args: Vec<i32>, flags: StartFlags, quick: bool) {
    e.request(SlotRequest::Start {
        target,
        args,
        flags,
        quick,
    });
}

pub(super) fn start_script(e: &mut Exec<'_>) -> VmResult<()> {
    let flags = StartFlags::from_script_byte(e.fetch_u8()?);
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    let script = e.pop()?;
    start(e, StartTarget::Script(script), args, flags, false);
    Ok(())
}

pub(super) fn start_script_quick(e: &mut Exec<'_>) -> VmResult<()> {
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    let script = e.pop()?;
    start(e, StartTarget::Script(script), args, StartFlags::RECURSIVE, true);
    Ok(())
}

pub(super) fn start_object(e: &mut Exec<'_>) -> VmResult<()> {
    let flags = StartFlags::from_script_byte(e.fetch_u8()?);
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    let entry = e.pop()?;
    let object = e.pop()?;
    start(e, StartTarget::Object { object, entry }, args, flags, false);
    Ok(())
}

pub(super) fn start_object_quick(e: &mut Exec<'_>) -> VmResult<()> {
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    let entry = e.pop()?;
    let object = e.pop()?;
    start(e, StartTarget::Object { object, entry }, args, StartFlags::RECURSIVE, true);
    Ok(())
}

pub(super) fn jump_to_script(e: &mut Exec<'_>) -> VmResult<()> {
    let flags = StartFlags::from_script_byte(e.fetch_u8()?);
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    let script = e.pop()?;
    e.request(SlotRequest::StopCurrent);
    start(e, StartTarget::Script(script), args, flags, true);
    Ok(())
}

pub(super) fn stop_object_code(e: &mut Exec<'_>) -> VmResult<()> {
    e.request(SlotRequest::StopCurrent);
    Ok(())
}

pub(super) fn stop_script(e: &mut Exec<'_>) -> VmResult<()> {
    let script = e.pop()?;
    e.request(if script == 0 {
        SlotRequest::StopCurrent
    } else {
        SlotRequest::StopScript(script)
    });
    Ok(())
}

pub(super) fn stop_object_script(e: &mut Exec<'_>) -> VmResult<()> {
    let object = e.pop()?;
    e.request(SlotRequest::StopObject(object));
    Ok(())
}

pub(super) fn is_script_running(e: &mut Exec<'_>) -> VmResult<()> {
    let script = e.pop()?;
    let running = e.is_script_running(script);
    e.push(running as i32)
}

pub(super) fn is_room_script_running(e: &mut Exec<'_>) -> VmResult<()> {
    let script = e.pop()?;
    let running = e.is_room_script_running(script);
    e.push(running as i32)
}

pub(super) fn cutscene(e: &mut Exec<'_>) -> VmResult<()> {
    let args = e.pop_list(MAX_SCRIPT_ARGS)?;
    e.request(SlotRequest::BeginCutscene(args));
    Ok(())
}

pub(super) fn end_cutscene(e: &mut Exec<'_>) -> VmResult<()> {
    e.request(SlotRequest::EndCutscene);
    Ok(())
}

pub(super) fn freeze_unfreeze(e: &mut Exec<'_>) -> VmResult<()> {
    let flag = e.pop()?;
    e.request(if flag != 0 {
        SlotRequest::FreezeAll(flag)
    } else {
        SlotRequest::UnfreezeAll
    });
    Ok(())
}

pub(super) fn break_here(e: &mut Exec<'_>) -> VmResult<()> {
    e.request(SlotRequest::Break);
    Ok(())
}

fn sleep(e: &mut Exec<'_>, ticks_per_unit: u64) -> VmResult<()> {
    let n = e.pop()?;
    let ticks = (n.max(0) as u64).saturating_mul(ticks_per_unit);
    e.request(SlotRequest::Delay(ticks));
    Ok(())
}

pub(super) fn delay(e: &mut Exec<'_>) -> VmResult<()> {
    sleep(e, 1)
}

pub(super) fn delay_frames(e: &mut Exec<'_>) -> VmResult<()> {
    sleep(e, 1)
}

pub(super) fn delay_seconds(e: &mut Exec<'_>) -> VmResult<()> {
    let tps = e.config().ticks_per_second as u64;
    sleep(e, tps)
}

pub(super) fn delay_minutes(e: &mut Exec<'_>) -> VmResult<()> {
    let tps = e.config().ticks_per_second as u64;
    sleep(e, 60 * tps)
}

/// Polls a host condition. While it holds, the slot yields and re-runs the
/// wait on the next tick: the actor forms branch by their offset, the plain
/// forms rewind to the opcode byte.
pub(super) fn wait(e: &mut Exec<'_>) -> VmResult<()> {
    let sub: WaitOp = decode(e.fetch_u8()?)?;
    let (cond, offset) = match sub {
        WaitOp::ActorMoving | WaitOp::ActorAnimating | WaitOp::ActorTurning => {
            let offset = e.fetch_i16()?;
            let actor = e.pop()?;
            let cond = match sub {
                WaitOp::ActorMoving => WaitCondition::ActorMoving(actor),
                WaitOp::ActorAnimating => WaitCondition::ActorAnimating(actor),
                _ => WaitCondition::ActorTurning(actor),
            };
            (cond, Some(offset))
        }
        WaitOp::Message => (WaitCondition::Message, None),
        WaitOp::Camera => (WaitCondition::Camera, None),
        WaitOp::Sentence => (WaitCondition::Sentence, None),
    };

    if e.host().wait_done(cond) {
        return Ok(());
    }
    match offset {
        Some(offset) => e.jump(offset)?,
        None => {
            let pc = e.opcode_pc();
            e.set_pc(pc);
        }
    }
    e.request(SlotRequest::Break);
    Ok(())
}

pub(super) fn begin_override(e: &mut Exec<'_>) -> VmResult<()> {
    e.begin_override()
}

pub(super) fn end_override(e: &mut Exec<'_>) -> VmResult<()> {
    e.end_override();
    Ok(())
}

pub(super) fn load_room(e: &mut Exec<'_>) -> VmResult<()> {
    let room = e.pop()?;
    let key = AssetKey::Room(room);
    if e.host().request_asset(&key).is_none() {
        return Err(VmError::ResourceMissing { key: key.to_string() });
    }
    e.request(SlotRequest::LoadRoom(room));
    Ok(())
}

pub(super) fn get_timer(e: &mut Exec<'_>) -> VmResult<()> {
    let timer = e.pop()?;
    let _: GetTimer = decode(e.fetch_u8()?)?;
    let ms = e.timer_elapsed_ms(timer)?;
    e.push(ms)
}

pub(super) fn set_timer(e: &mut Exec<'_>) -> VmResult<()> {
    let timer = e.pop()?;
    let _: SetTimer = decode(e.fetch_u8()?)?;
    e.reset_timer(timer)
}
