//! A small bytecode builder for tests and tooling.
//!
//! Each method appends one instruction with its inline operands. Jumps take
//! label names that are resolved by [`Asm::finish`].

use std::collections::HashMap;

use byteorder::{LittleEndian, WriteBytesExt};

#[derive(Debug, Default, Clone)]
pub struct Asm {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    /// (operand position, label)
    fixups: Vec<(usize, String)>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn op(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    pub fn byte(mut self, b: u8) -> Self {
        self.code.push(b);
        self
    }

    pub fn word(mut self, w: i16) -> Self {
        // writes into a Vec cannot fail
        let _ = self.code.write_i16::<LittleEndian>(w);
        self
    }

    pub fn dword(mut self, d: i32) -> Self {
        let _ = self.code.write_i32::<LittleEndian>(d);
        self
    }

    pub fn var(self, var: u16) -> Self {
        self.word(var as i16)
    }

    pub fn cstring(mut self, s: &[u8]) -> Self {
        self.code.extend_from_slice(s);
        self.code.push(0);
        self
    }

    pub fn label(mut self, name: &str) -> Self {
        self.labels.insert(name.to_string(), self.code.len());
        self
    }

    fn target(mut self, name: &str) -> Self {
        self.fixups.push((self.code.len(), name.to_string()));
        self.word(0)
    }

    /// Resolves label offsets and returns the bytecode.
    ///
    /// # Panics
    ///
    /// Panics if a jump names a label that was never placed, or if the
    /// offset does not fit in 16 bits.
    pub fn finish(mut self) -> Vec<u8> {
        for (at, name) in &self.fixups {
            let Some(&dest) = self.labels.get(name) else {
                panic!("undefined label {name:?}");
            };
            let offset = dest as i64 - (*at as i64 + 2);
            let offset = i16::try_from(offset).unwrap_or_else(|_| panic!("jump to {name:?} out of range"));
            self.code[*at..*at + 2].copy_from_slice(&offset.to_le_bytes());
        }
        self.code
    }

    // stack and variables

    /// Pushes `v` with the smallest encoding that holds it.
    pub fn push(self, v: i32) -> Self {
        if let Ok(b) = u8::try_from(v) {
            self.push_byte(b)
        } else if let Ok(w) = i16::try_from(v) {
            self.push_word(w)
        } else {
            self.push_dword(v)
        }
    }

    pub fn push_byte(self, v: u8) -> Self {
        self.op(0x00).byte(v)
    }

    pub fn push_word(self, v: i16) -> Self {
        self.op(0x01).word(v)
    }

    pub fn push_dword(self, v: i32) -> Self {
        self.op(0x02).dword(v)
    }

    pub fn push_var(self, var: u16) -> Self {
        self.op(0x03).var(var)
    }

    pub fn write_var(self, var: u16) -> Self {
        self.op(0x43).var(var)
    }

    pub fn var_inc(self, var: u16) -> Self {
        self.op(0x4F).var(var)
    }

    pub fn var_dec(self, var: u16) -> Self {
        self.op(0x57).var(var)
    }

    /// Pushes the items followed by their count.
    pub fn list(self, items: &[i32]) -> Self {
        let n = items.len() as i32;
        items.iter().fold(self, |a, &v| a.push(v)).push(n)
    }

    /// Pushes an inline string onto the message stack and selects it with -1.
    pub fn message(self, s: &[u8]) -> Self {
        self.op(0x04).cstring(s).push_word(-1)
    }

    pub fn dup(self) -> Self {
        self.op(0x0C)
    }

    pub fn pop(self) -> Self {
        self.op(0x1A)
    }

    pub fn not(self) -> Self {
        self.op(0x0D)
    }

    pub fn eq(self) -> Self {
        self.op(0x0E)
    }

    pub fn neq(self) -> Self {
        self.op(0x0F)
    }

    pub fn gt(self) -> Self {
        self.op(0x10)
    }

    pub fn lt(self) -> Self {
        self.op(0x11)
    }

    pub fn le(self) -> Self {
        self.op(0x12)
    }

    pub fn ge(self) -> Self {
        self.op(0x13)
    }

    pub fn add(self) -> Self {
        self.op(0x14)
    }

    pub fn sub(self) -> Self {
        self.op(0x15)
    }

    pub fn mul(self) -> Self {
        self.op(0x16)
    }

    pub fn div(self) -> Self {
        self.op(0x17)
    }

    pub fn land(self) -> Self {
        self.op(0x18)
    }

    pub fn lor(self) -> Self {
        self.op(0x19)
    }

    pub fn band(self) -> Self {
        self.op(0xD6)
    }

    pub fn bor(self) -> Self {
        self.op(0xD7)
    }

    pub fn abs(self) -> Self {
        self.op(0xC4)
    }

    pub fn is_any_of(self) -> Self {
        self.op(0xAD)
    }

    pub fn pick_one_of(self) -> Self {
        self.op(0xCB)
    }

    pub fn pick_one_of_default(self) -> Self {
        self.op(0xCC)
    }

    pub fn get_random_number(self) -> Self {
        self.op(0x87)
    }

    pub fn get_random_number_range(self) -> Self {
        self.op(0x88)
    }

    // control flow

    pub fn jump(self, label: &str) -> Self {
        self.op(0x73).target(label)
    }

    pub fn if_true(self, label: &str) -> Self {
        self.op(0x5C).target(label)
    }

    pub fn if_not(self, label: &str) -> Self {
        self.op(0x5D).target(label)
    }

    pub fn break_here(self) -> Self {
        self.op(0x6C)
    }

    pub fn delay(self) -> Self {
        self.op(0xB0)
    }

    pub fn delay_seconds(self) -> Self {
        self.op(0xB1)
    }

    pub fn delay_minutes(self) -> Self {
        self.op(0xB2)
    }

    pub fn delay_frames(self) -> Self {
        self.op(0xCA)
    }

    pub fn wait_message(self) -> Self {
        self.op(0xA9).byte(169)
    }

    /// Waits while the popped actor is moving; `label` is where the wait
    /// branches back to.
    pub fn wait_actor_moving(self, label: &str) -> Self {
        self.op(0xA9).byte(168).target(label)
    }

    pub fn get_timer(self) -> Self {
        self.op(0x58).byte(10)
    }

    pub fn set_timer(self) -> Self {
        self.op(0x59).byte(158)
    }

    pub fn start_script(self, flags: u8) -> Self {
        self.op(0x5E).byte(flags)
    }

    pub fn start_script_quick(self) -> Self {
        self.op(0x5F)
    }

    pub fn start_object(self, flags: u8) -> Self {
        self.op(0x60).byte(flags)
    }

    pub fn start_object_quick(self) -> Self {
        self.op(0xBE)
    }

    pub fn jump_to_script(self, flags: u8) -> Self {
        self.op(0xD5).byte(flags)
    }

    pub fn stop_object_code(self) -> Self {
        self.op(0x65)
    }

    pub fn stop_script(self) -> Self {
        self.op(0x7C)
    }

    pub fn stop_object_script(self) -> Self {
        self.op(0x77)
    }

    pub fn is_script_running(self) -> Self {
        self.op(0x8B)
    }

    pub fn is_room_script_running(self) -> Self {
        self.op(0xD8)
    }

    pub fn cutscene(self) -> Self {
        self.op(0x68)
    }

    pub fn end_cutscene(self) -> Self {
        self.op(0x67)
    }

    pub fn freeze_unfreeze(self) -> Self {
        self.op(0x6A)
    }

    /// Arms the override; an interrupt resumes at the jump to `label`.
    pub fn begin_override(self, label: &str) -> Self {
        self.op(0x95).jump(label)
    }

    pub fn end_override(self) -> Self {
        self.op(0x96)
    }

    pub fn load_room(self) -> Self {
        self.op(0x7B)
    }

    // arrays

    pub fn array_read(self, var: u16) -> Self {
        self.op(0x07).var(var)
    }

    pub fn array_write(self, var: u16) -> Self {
        self.op(0x47).var(var)
    }

    pub fn array_indexed_read(self, var: u16) -> Self {
        self.op(0x0B).var(var)
    }

    pub fn array_indexed_write(self, var: u16) -> Self {
        self.op(0x4B).var(var)
    }

    pub fn array_inc(self, var: u16) -> Self {
        self.op(0x53).var(var)
    }

    pub fn array_dec(self, var: u16) -> Self {
        self.op(0x5B).var(var)
    }

    pub fn dim_array(self, element: u8, var: u16) -> Self {
        self.op(0xBC).byte(element).var(var)
    }

    pub fn undim(self, var: u16) -> Self {
        self.op(0xBC).byte(204).var(var)
    }

    pub fn dim2dim_array(self, element: u8, var: u16) -> Self {
        self.op(0xC0).byte(element).var(var)
    }

    pub fn redim_array(self, element: u8, var: u16) -> Self {
        self.op(0xEA).byte(element).var(var)
    }

    pub fn dim_size(self, sub: u8, var: u16) -> Self {
        self.op(0x63).byte(sub).var(var)
    }

    pub fn assign_string(self, var: u16, s: &[u8]) -> Self {
        self.op(0xA4).byte(7).var(var).cstring(s)
    }

    pub fn assign_list(self, var: u16) -> Self {
        self.op(0xA4).byte(208).var(var)
    }

    pub fn assign_row(self, var: u16) -> Self {
        self.op(0xA4).byte(212).var(var)
    }

    pub fn string_len(self) -> Self {
        self.op(0xEE)
    }

    pub fn string_to_int(self) -> Self {
        self.op(0x48)
    }

    pub fn shuffle(self, var: u16) -> Self {
        self.op(0xD4).var(var)
    }

    pub fn pick_var_random(self, var: u16) -> Self {
        self.op(0xE3).var(var)
    }

    pub fn localize_to_room(self) -> Self {
        self.op(0x4A)
    }

    pub fn localize_to_script(self) -> Self {
        self.op(0xE2)
    }

    pub fn num_free_arrays(self) -> Self {
        self.op(0x64)
    }

    // host services

    pub fn sound_op(self, sub: u8) -> Self {
        self.op(0x45).byte(sub)
    }

    pub fn sound_status(self) -> Self {
        self.op(0x49)
    }

    pub fn stop_sound(self) -> Self {
        self.op(0x75)
    }

    pub fn is_sound_running(self) -> Self {
        self.op(0x98)
    }

    pub fn cursor(self, sub: u8) -> Self {
        self.op(0x6B).byte(sub)
    }

    pub fn read_config_file(self, kind: u8) -> Self {
        self.op(0x4D).byte(kind)
    }

    pub fn write_config_file(self, kind: u8) -> Self {
        self.op(0x4E).byte(kind)
    }

    pub fn read_ini(self, kind: u8) -> Self {
        self.op(0xF3).byte(kind)
    }

    pub fn write_ini(self, kind: u8) -> Self {
        self.op(0xF4).byte(kind)
    }

    pub fn system(self, sub: u8) -> Self {
        self.op(0xAE).byte(sub)
    }

    pub fn resource_size(self, kind: u8) -> Self {
        self.op(0xF8).byte(kind)
    }

    pub fn trace_status(self) -> Self {
        self.op(0xC1)
    }
}
