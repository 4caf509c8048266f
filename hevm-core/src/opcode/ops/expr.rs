use crate::error::{VmError, VmResult};
use crate::vm::{BinaryOp, Exec};

/// Longest list the pick and membership opcodes accept.
const MAX_LIST: usize = 128;

pub(super) fn push_byte(e: &mut Exec<'_>) -> VmResult<()> {
    let v = e.fetch_u8()?;
    e.push(v as i32)
}

pub(super) fn push_word(e: &mut Exec<'_>) -> VmResult<()> {
    let v = e.fetch_i16()?;
    e.push(v as i32)
}

pub(super) fn push_dword(e: &mut Exec<'_>) -> VmResult<()> {
    let v = e.fetch_i32()?;
    e.push(v)
}

pub(super) fn push_word_var(e: &mut Exec<'_>) -> VmResult<()> {
    let var = e.fetch_u16()?;
    let v = e.read_var(var)?;
    e.push(v)
}

pub(super) fn write_word_var(e: &mut Exec<'_>) -> VmResult<()> {
    let var = e.fetch_u16()?;
    let v = e.pop()?;
    e.write_var(var, v)
}

fn add_to_var(e: &mut Exec<'_>, delta: i32) -> VmResult<()> {
    let var = e.fetch_u16()?;
    let v = e.read_var(var)?;
    e.write_var(var, v.wrapping_add(delta))
}

pub(super) fn word_var_inc(e: &mut Exec<'_>) -> VmResult<()> {
    add_to_var(e, 1)
}

pub(super) fn word_var_dec(e: &mut Exec<'_>) -> VmResult<()> {
    add_to_var(e, -1)
}

pub(super) fn word_array_read(e: &mut Exec<'_>) -> VmResult<()> {
    let col = e.pop()?;
    let var = e.fetch_u16()?;
    let v = e.read_array(var, 0, col)?;
    e.push(v)
}

pub(super) fn word_array_indexed_read(e: &mut Exec<'_>) -> VmResult<()> {
    let col = e.pop()?;
    let row = e.pop()?;
    let var = e.fetch_u16()?;
    let v = e.read_array(var, row, col)?;
    e.push(v)
}

pub(super) fn word_array_write(e: &mut Exec<'_>) -> VmResult<()> {
    let v = e.pop()?;
    let col = e.pop()?;
    let var = e.fetch_u16()?;
    e.write_array(var, 0, col, v)
}

pub(super) fn word_array_indexed_write(e: &mut Exec<'_>) -> VmResult<()> {
    let v = e.pop()?;
    let col = e.pop()?;
    let row = e.pop()?;
    let var = e.fetch_u16()?;
    e.write_array(var, row, col, v)
}

fn add_to_array(e: &mut Exec<'_>, delta: i32) -> VmResult<()> {
    let col = e.pop()?;
    let var = e.fetch_u16()?;
    let v = e.read_array(var, 0, col)?;
    e.write_array(var, 0, col, v.wrapping_add(delta))
}

pub(super) fn word_array_inc(e: &mut Exec<'_>) -> VmResult<()> {
    add_to_array(e, 1)
}

pub(super) fn word_array_dec(e: &mut Exec<'_>) -> VmResult<()> {
    add_to_array(e, -1)
}

pub(super) fn dup(e: &mut Exec<'_>) -> VmResult<()> {
    e.dup()
}

pub(super) fn pop(e: &mut Exec<'_>) -> VmResult<()> {
    e.pop().map(drop)
}

pub(super) fn not(e: &mut Exec<'_>) -> VmResult<()> {
    e.unary(|a| (a == 0) as i32)
}

pub(super) fn abs(e: &mut Exec<'_>) -> VmResult<()> {
    e.unary(i32::wrapping_abs)
}

pub(super) fn eq(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Eq)
}

pub(super) fn neq(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Neq)
}

pub(super) fn gt(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Gt)
}

pub(super) fn lt(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Lt)
}

pub(super) fn le(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Le)
}

pub(super) fn ge(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Ge)
}

pub(super) fn add(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Add)
}

pub(super) fn sub(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Sub)
}

pub(super) fn mul(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Mul)
}

pub(super) fn div(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::Div)
}

pub(super) fn land(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::LogicalAnd)
}

pub(super) fn lor(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::LogicalOr)
}

pub(super) fn band(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::BitAnd)
}

pub(super) fn bor(e: &mut Exec<'_>) -> VmResult<()> {
    e.binary(BinaryOp::BitOr)
}

pub(super) fn is_any_of(e: &mut Exec<'_>) -> VmResult<()> {
    let list = e.pop_list(MAX_LIST)?;
    let value = e.pop()?;
    e.push(list.contains(&value) as i32)
}

pub(super) fn get_random_number(e: &mut Exec<'_>) -> VmResult<()> {
    let max = e.pop()?;
    let v = e.random_range(0, max.max(0));
    e.write_well_known(|c| c.vars.random_nr, v);
    e.push(v)
}

pub(super) fn get_random_number_range(e: &mut Exec<'_>) -> VmResult<()> {
    let max = e.pop()?;
    let min = e.pop()?;
    let v = e.random_range(min, max);
    e.write_well_known(|c| c.vars.random_nr, v);
    e.push(v)
}

fn pick(list: &[i32], index: i32) -> Option<i32> {
    usize::try_from(index).ok().and_then(|i| list.get(i)).copied()
}

pub(super) fn pick_one_of(e: &mut Exec<'_>) -> VmResult<()> {
    let list = e.pop_list(MAX_LIST)?;
    let index = e.pop()?;
    let v = pick(&list, index).ok_or(VmError::PickOutOfRange {
        index,
        len: list.len(),
    })?;
    e.push(v)
}

pub(super) fn pick_one_of_default(e: &mut Exec<'_>) -> VmResult<()> {
    let default = e.pop()?;
    let list = e.pop_list(MAX_LIST)?;
    let index = e.pop()?;
    e.push(pick(&list, index).unwrap_or(default))
}
