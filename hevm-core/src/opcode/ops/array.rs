use crate::error::{VmError, VmResult};
use crate::opcode::family::{decode, ArrayOp, DimOp, DimSizeOp, SubOpcode};
use crate::vm::{ElementType, Exec, LOCAL_VAR_BIT, ROOM_VAR_BIT};

const MAX_LIST: usize = 128;
const MAX_DECK: usize = 100;

impl DimOp {
    fn element(self) -> Option<ElementType> {
        ElementType::from_repr(self.value())
    }
}

fn dim_element(sub: u8) -> VmResult<ElementType> {
    let op: DimOp = decode(sub)?;
    op.element().ok_or(VmError::InvalidSubOpcode {
        family: DimOp::FAMILY.name(),
        sub,
    })
}

pub(super) fn add_message_to_stack(e: &mut Exec<'_>) -> VmResult<()> {
    let msg = e.fetch_cstring()?;
    e.push_message(msg);
    Ok(())
}

/// Leading integer of a string, `atoi` style: optional blanks and sign, then
/// digits up to the first non-digit.
fn leading_int(bytes: &[u8]) -> i32 {
    let mut it = bytes.iter().skip_while(|b| b.is_ascii_whitespace()).peekable();
    let negative = match it.peek() {
        Some(b'-') => {
            it.next();
            true
        }
        Some(b'+') => {
            it.next();
            false
        }
        _ => false,
    };
    let mut v: i32 = 0;
    for b in it.take_while(|b| b.is_ascii_digit()) {
        v = v.wrapping_mul(10).wrapping_add((b - b'0') as i32);
    }
    if negative {
        v.wrapping_neg()
    } else {
        v
    }
}

pub(super) fn string_to_int(e: &mut Exec<'_>) -> VmResult<()> {
    let handle = e.pop()?;
    if handle == 0 {
        return Err(VmError::NullArrayRef { var: 0 });
    }
    let v = leading_int(&e.array(handle)?.c_bytes());
    e.push(v)
}

pub(super) fn string_len(e: &mut Exec<'_>) -> VmResult<()> {
    let handle = e.pop()?;
    let len = e.array(handle).map(|a| a.c_bytes().len() as i32).unwrap_or(0);
    e.push(len)
}

pub(super) fn localize_array_to_room(e: &mut Exec<'_>) -> VmResult<()> {
    let handle = e.pop()?;
    e.localize_to_room(handle)
}

pub(super) fn localize_array_to_script(e: &mut Exec<'_>) -> VmResult<()> {
    let handle = e.pop()?;
    e.localize_to_script(handle)
}

pub(super) fn get_num_free_arrays(e: &mut Exec<'_>) -> VmResult<()> {
    let n = e.num_free_arrays() as i32;
    e.push(n)
}

pub(super) fn get_array_dim_size(e: &mut Exec<'_>) -> VmResult<()> {
    let sub: DimSizeOp = decode(e.fetch_u8()?)?;
    let var = e.fetch_u16()?;
    let handle = e.read_var(var)?;
    let dims = e.array(handle).ok().map(|a| (a.dim1, a.dim2));
    let Some((d1, d2)) = dims else {
        return e.push(0);
    };
    let v = match sub {
        DimSizeOp::Dim1Size | DimSizeOp::Dim1SizeAlt => d1.1 - d1.0 + 1,
        DimSizeOp::Dim2Size => d2.1 - d2.0 + 1,
        DimSizeOp::Dim1Start => d1.0,
        DimSizeOp::Dim1End => d1.1,
        DimSizeOp::Dim2Start => d2.0,
        DimSizeOp::Dim2End => d2.1,
    };
    e.push(v)
}

pub(super) fn dim_array(e: &mut Exec<'_>) -> VmResult<()> {
    let sub = e.fetch_u8()?;
    if decode::<DimOp>(sub)? == DimOp::Undim {
        let var = e.fetch_u16()?;
        return e.nuke_array(var);
    }
    let element = dim_element(sub)?;
    let var = e.fetch_u16()?;
    let dim1_end = e.pop()?;
    e.define_array(var, element, (0, dim1_end), (0, 0)).map(drop)
}

pub(super) fn dim2dim_array(e: &mut Exec<'_>) -> VmResult<()> {
    let element = dim_element(e.fetch_u8()?)?;
    let dim1_end = e.pop()?;
    let dim2_end = e.pop()?;
    let var = e.fetch_u16()?;
    e.define_array(var, element, (0, dim1_end), (0, dim2_end)).map(drop)
}

pub(super) fn redim_array(e: &mut Exec<'_>) -> VmResult<()> {
    let element = dim_element(e.fetch_u8()?)?;
    let dim1_end = e.pop()?;
    let dim2_end = e.pop()?;
    let var = e.fetch_u16()?;
    e.redim_array(var, element, (0, dim1_end), (0, dim2_end))
}

pub(super) fn array_ops(e: &mut Exec<'_>) -> VmResult<()> {
    let sub: ArrayOp = decode(e.fetch_u8()?)?;
    let var = e.fetch_u16()?;
    match sub {
        ArrayOp::AssignString => {
            let s = e.fetch_cstring()?;
            e.define_string(var, &s)?;
        }
        ArrayOp::AssignList => {
            let offset = e.pop()?;
            let list = e.pop_list(MAX_LIST)?;
            if e.read_var(var)? == 0 {
                let end = (offset + list.len() as i32 - 1).max(0);
                e.define_array(var, ElementType::Dword, (0, end), (0, 0))?;
            }
            for (i, v) in list.into_iter().enumerate() {
                e.write_array(var, 0, offset + i as i32, v)?;
            }
        }
        ArrayOp::AssignRow => {
            let list = e.pop_list(MAX_LIST)?;
            let row = e.pop()?;
            e.array_handle(var)?;
            for (i, v) in list.into_iter().enumerate() {
                e.write_array(var, row, i as i32, v)?;
            }
        }
    }
    Ok(())
}

pub(super) fn shuffle(e: &mut Exec<'_>) -> VmResult<()> {
    let max = e.pop()?;
    let min = e.pop()?;
    let var = e.fetch_u16()?;
    e.shuffle_array(var, min, max)
}

/// Deals the next element of a shuffled deck stored in `var`.
///
/// Element 0 holds the index of the next card. When the deck runs out it is
/// reshuffled, avoiding an immediate repeat of the last card dealt.
pub(super) fn pick_var_random(e: &mut Exec<'_>) -> VmResult<()> {
    let cards = e.pop_list(MAX_DECK)?;
    let var = e.fetch_u16()?;

    if e.read_var(var)? == 0 {
        let num = cards.len() as i32;
        let handle = e.define_array(var, ElementType::Dword, (0, num), (0, 0))?;
        if var & ROOM_VAR_BIT != 0 {
            e.localize_to_room(handle)?;
        } else if var & LOCAL_VAR_BIT != 0 {
            e.localize_to_script(handle)?;
        }
        for (i, v) in cards.into_iter().enumerate() {
            e.write_array(var, 0, i as i32 + 1, v)?;
        }
        e.shuffle_array(var, 1, num)?;
        e.write_array(var, 0, 0, 2)?;
        let v = e.read_array(var, 0, 1)?;
        return e.push(v);
    }

    let mut next = e.read_array(var, 0, 0)?;
    let handle = e.array_handle(var)?;
    let dim1_end = e.array(handle)?.dim1.1;
    if dim1_end < next {
        // remembered as a 16-bit value
        let last = e.read_array(var, 0, next - 1)? as i16 as i32;
        e.shuffle_array(var, 1, dim1_end)?;
        next = 1;
        if e.read_array(var, 0, 1)? == last && dim1_end >= 3 {
            let second = e.read_array(var, 0, 2)? as i16 as i32;
            e.write_array(var, 0, 1, second)?;
            e.write_array(var, 0, 2, last)?;
        }
    }
    e.write_array(var, 0, 0, next + 1)?;
    let v = e.read_array(var, 0, next)?;
    e.push(v)
}
