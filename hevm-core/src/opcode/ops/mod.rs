//! Native opcode handlers.

mod array;
mod expr;
mod flow;
mod system;

use super::family::Family;
use super::{NativeFn, Operand};

/// Longest argument list a start opcode accepts.
pub(crate) const MAX_SCRIPT_ARGS: usize = 25;

pub(super) struct Native {
    pub handler: NativeFn,
    pub operands: &'static [Operand],
    pub summary: &'static str,
}

macro_rules! natives {
    ($opcode:expr => { $( $code:literal => $handler:path, [$($arg:expr),*], $summary:literal; )+ }) => {
        match $opcode {
            $(
                $code => Some(Native {
                    handler: $handler,
                    operands: {
                        const OPERANDS: &[Operand] = &[$($arg),*];
                        OPERANDS
                    },
                    summary: $summary,
                }),
            )+
            _ => None,
        }
    };
}

use super::Operand::String as Str;
use super::Operand::{Byte, DWord, Flags, Jump, Var, Word};

pub(super) fn native(opcode: u8) -> Option<Native> {
    natives!(opcode => {
        0x00 => expr::push_byte, [Byte], "push unsigned byte";
        0x01 => expr::push_word, [Word], "push signed word";
        0x02 => expr::push_dword, [DWord], "push dword";
        0x03 => expr::push_word_var, [Var], "push var";
        0x04 => array::add_message_to_stack, [Str], "push inline string onto the message stack";
        0x07 => expr::word_array_read, [Var], "col = pop; push arr[0][col]";
        0x0B => expr::word_array_indexed_read, [Var], "col = pop, row = pop; push arr[row][col]";
        0x0C => expr::dup, [], "duplicate top";
        0x0D => expr::not, [], "push pop == 0";
        0x0E => expr::eq, [], "b = pop, a = pop; push a == b";
        0x0F => expr::neq, [], "b = pop, a = pop; push a != b";
        0x10 => expr::gt, [], "b = pop, a = pop; push a > b";
        0x11 => expr::lt, [], "b = pop, a = pop; push a < b";
        0x12 => expr::le, [], "b = pop, a = pop; push a <= b";
        0x13 => expr::ge, [], "b = pop, a = pop; push a >= b";
        0x14 => expr::add, [], "wrapping add";
        0x15 => expr::sub, [], "wrapping subtract";
        0x16 => expr::mul, [], "wrapping multiply";
        0x17 => expr::div, [], "divide, fatal on zero";
        0x18 => expr::land, [], "logical and";
        0x19 => expr::lor, [], "logical or";
        0x1A => expr::pop, [], "discard top";
        0x1B => expr::is_any_of, [], "list, value = pop; push value in list";
        0x43 => expr::write_word_var, [Var], "var = pop";
        0x45 => system::create_sound, [Operand::Sub(Family::Sound)], "sound queue operations";
        0x47 => expr::word_array_write, [Var], "v = pop, col = pop; arr[0][col] = v";
        0x48 => array::string_to_int, [], "pop string handle; push its leading integer";
        0x49 => system::get_sound_status, [], "sub = pop, sound = pop; push status";
        0x4A => array::localize_array_to_room, [], "pop handle; tie the array to the room";
        0x4B => expr::word_array_indexed_write, [Var], "v = pop, col = pop, row = pop; arr[row][col] = v";
        0x4D => system::read_config_file, [Operand::Sub(Family::ConfigValue)], "read a config file value";
        0x4E => system::write_config_file, [Operand::Sub(Family::ConfigValue)], "write a config file value";
        0x4F => expr::word_var_inc, [Var], "var += 1";
        0x53 => expr::word_array_inc, [Var], "col = pop; arr[0][col] += 1";
        0x57 => expr::word_var_dec, [Var], "var -= 1";
        0x58 => flow::get_timer, [Operand::Sub(Family::GetTimer)], "timer = pop; push elapsed ms";
        0x59 => flow::set_timer, [Operand::Sub(Family::SetTimer)], "timer = pop; restart it";
        0x5B => expr::word_array_dec, [Var], "col = pop; arr[0][col] -= 1";
        0x5C => flow::if_true, [Jump], "jump if pop != 0";
        0x5D => flow::if_not, [Jump], "jump if pop == 0";
        0x5E => flow::start_script, [Flags], "list, script = pop; scheduled start";
        0x5F => flow::start_script_quick, [], "list, script = pop; quick recursive start";
        0x60 => flow::start_object, [Flags], "list, entry = pop, object = pop; scheduled start";
        0x63 => array::get_array_dim_size, [Operand::Sub(Family::DimSize)], "push an array dimension";
        0x64 => array::get_num_free_arrays, [], "push free array handle count";
        0x65 => flow::stop_object_code, [], "stop the current slot";
        0x67 => flow::end_cutscene, [], "leave the innermost cutscene";
        0x68 => flow::cutscene, [], "list; enter a cutscene";
        0x6A => flow::freeze_unfreeze, [], "flag = pop; 0 unfreezes all, else freezes all";
        0x6B => system::cursor_command, [Operand::Sub(Family::Cursor)], "cursor and charset state";
        0x6C => flow::break_here, [], "yield until the next tick";
        0x73 => flow::jump, [Jump], "relative jump";
        0x75 => system::stop_sound, [], "sound = pop; stop it";
        0x77 => flow::stop_object_script, [], "object = pop; stop its scripts";
        0x7B => flow::load_room, [], "room = pop; change room";
        0x7C => flow::stop_script, [], "script = pop; stop it, 0 stops the current slot";
        0x87 => expr::get_random_number, [], "max = pop; push random in [0, max]";
        0x88 => expr::get_random_number_range, [], "max = pop, min = pop; push random in [min, max]";
        0x8B => flow::is_script_running, [], "script = pop; push running";
        0x95 => flow::begin_override, [], "arm the override at the following jump";
        0x96 => flow::end_override, [], "disarm the override";
        0x98 => system::is_sound_running, [], "sound = pop; push running";
        0xA4 => array::array_ops, [Operand::Sub(Family::Array)], "bulk array assignment";
        0xA9 => flow::wait, [Operand::Sub(Family::Wait)], "yield until a host condition clears";
        0xAD => expr::is_any_of, [], "list, value = pop; push value in list";
        0xAE => system::quit_pause_restart, [Operand::Sub(Family::System)], "restart or quit";
        0xB0 => flow::delay, [], "ticks = pop; sleep";
        0xB1 => flow::delay_seconds, [], "seconds = pop; sleep";
        0xB2 => flow::delay_minutes, [], "minutes = pop; sleep";
        0xBC => array::dim_array, [Operand::Sub(Family::Dim)], "define or free a 1-D array";
        0xBE => flow::start_object_quick, [], "list, entry = pop, object = pop; quick start";
        0xBF => flow::start_script_quick, [], "list, script = pop; quick recursive start";
        0xC0 => array::dim2dim_array, [Operand::Sub(Family::Dim)], "define a 2-D array";
        0xC1 => system::trace_status, [], "string, value = pop; emit a trace event";
        0xC4 => expr::abs, [], "push |pop|";
        0xCA => flow::delay_frames, [], "frames = pop; sleep";
        0xCB => expr::pick_one_of, [], "list, i = pop; push list[i]";
        0xCC => expr::pick_one_of_default, [], "default = pop, list, i = pop; push list[i] or default";
        0xD4 => array::shuffle, [Var], "max = pop, min = pop; shuffle arr[0][min..=max]";
        0xD5 => flow::jump_to_script, [Flags], "list, script = pop; stop the current slot and start";
        0xD6 => expr::band, [], "bitwise and";
        0xD7 => expr::bor, [], "bitwise or";
        0xD8 => flow::is_room_script_running, [], "script = pop; push running as a room script";
        0xE2 => array::localize_array_to_script, [], "pop handle; tie the array to the current slot";
        0xE3 => array::pick_var_random, [Var], "list; push the next element of a shuffled deck";
        0xEA => array::redim_array, [Operand::Sub(Family::Dim)], "change array bounds in place";
        0xEE => array::string_len, [], "pop handle; push string length";
        0xF3 => system::read_ini, [Operand::Sub(Family::ConfigValue)], "read an INI option";
        0xF4 => system::write_ini, [Operand::Sub(Family::ConfigValue)], "write an INI option";
        0xF8 => system::get_resource_size, [Operand::Sub(Family::ResourceKind)], "id = pop; push asset size";
    })
}
