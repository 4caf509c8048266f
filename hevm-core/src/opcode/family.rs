//! Second-level opcode families.
//!
//! A family opcode reads one more byte after the opcode and switches on it.
//! Every family is a `repr(u8)` enum so the byte values are listed exactly
//! once, next to the effect they select.

use serde::Serialize;
use strum::{EnumIter, FromRepr, IntoEnumIterator, IntoStaticStr};

use crate::error::{VmError, VmResult};

use super::Operand;

/// The families reachable from the primary table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, EnumIter, IntoStaticStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Family {
    Sound,
    Cursor,
    ConfigValue,
    Array,
    Wait,
    DimSize,
    Dim,
    System,
    ResourceKind,
    GetTimer,
    SetTimer,
}

/// One documented sub-opcode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubOpDoc {
    pub value: u8,
    pub name: &'static str,
    pub effect: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<Operand>,
}

pub trait SubOpcode: Copy + Into<&'static str> + IntoEnumIterator + 'static {
    const FAMILY: Family;

    fn from_byte(b: u8) -> Option<Self>;

    fn value(self) -> u8;

    fn effect(self) -> &'static str;

    /// Inline operands that follow the sub-opcode byte.
    fn operands(self) -> &'static [Operand];
}

macro_rules! sub_opcodes {
    (
        $(#[$meta:meta])*
        $name:ident in $family:ident {
            $( $variant:ident = $value:literal [$($op:ident),*] => $effect:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, FromRepr, IntoStaticStr)]
        #[strum(serialize_all = "camelCase")]
        #[repr(u8)]
        pub enum $name {
            $( $variant = $value, )+
        }

        impl SubOpcode for $name {
            const FAMILY: Family = Family::$family;

            fn from_byte(b: u8) -> Option<Self> {
                Self::from_repr(b)
            }

            fn value(self) -> u8 {
                self as u8
            }

            fn effect(self) -> &'static str {
                match self {
                    $( Self::$variant => $effect, )+
                }
            }

            fn operands(self) -> &'static [Operand] {
                match self {
                    $( Self::$variant => &[$(Operand::$op),*], )+
                }
            }
        }
    };
}

/// Decodes a sub-opcode byte, failing with `InvalidSubOpcode`.
pub fn decode<T: SubOpcode>(b: u8) -> VmResult<T> {
    T::from_byte(b).ok_or(VmError::InvalidSubOpcode {
        family: T::FAMILY.name(),
        sub: b,
    })
}

sub_opcodes! {
    SoundOp in Sound {
        Discard = 27 [] => "pop and discard a value",
        Nop = 217 [] => "no effect",
        Select = 232 [] => "select sound = pop",
        Queue = 255 [] => "queue the selected sound",
    }
}

sub_opcodes! {
    CursorOp in Cursor {
        InventoryImage = 0x13 [] => "cursor image = pop, inventory state 0",
        InventoryImageAlt = 0x14 [] => "cursor image = pop, inventory state 1",
        On = 0x90 [] => "cursor state = 1",
        Off = 0x91 [] => "cursor state = 0",
        UserputOn = 0x92 [] => "userput = 1",
        UserputOff = 0x93 [] => "userput = 0",
        SoftOn = 0x94 [] => "cursor state += 1, fatal above 1",
        SoftOff = 0x95 [] => "cursor state -= 1",
        UserputSoftOn = 0x96 [] => "userput += 1",
        UserputSoftOff = 0x97 [] => "userput -= 1",
        ImageById = 0x99 [] => "unsupported, warns",
        Charset = 0x9C [] => "charset = pop",
        CharsetColors = 0x9D [] => "charset colors = list",
    }
}

sub_opcodes! {
    ConfigValue in ConfigValue {
        Number = 6 [] => "integer value",
        Text = 7 [] => "string value",
    }
}

sub_opcodes! {
    ArrayOp in Array {
        AssignString = 7 [Var, String] => "define a string array holding the inline string",
        AssignList = 208 [Var] => "offset = pop, list; write the list into row 0 from offset",
        AssignRow = 212 [Var] => "list, row = pop; write the list into that row",
    }
}

sub_opcodes! {
    WaitOp in Wait {
        ActorMoving = 168 [Jump] => "actor = pop; branch and yield while it walks",
        Message = 169 [] => "yield while a message is shown",
        Camera = 170 [] => "yield while the camera moves",
        Sentence = 171 [] => "yield while a sentence is pending",
        ActorAnimating = 226 [Jump] => "actor = pop; branch and yield while it animates",
        ActorTurning = 232 [Jump] => "actor = pop; branch and yield while it turns",
    }
}

sub_opcodes! {
    DimSizeOp in DimSize {
        Dim1Size = 1 [Var] => "dim1 element count",
        Dim1SizeAlt = 2 [Var] => "dim1 element count",
        Dim2Size = 3 [Var] => "dim2 element count",
        Dim1Start = 4 [Var] => "dim1 start bound",
        Dim1End = 5 [Var] => "dim1 end bound",
        Dim2Start = 6 [Var] => "dim2 start bound",
        Dim2End = 7 [Var] => "dim2 end bound",
    }
}

sub_opcodes! {
    DimOp in Dim {
        Bit = 2 [Var] => "bit elements",
        Nibble = 3 [Var] => "nibble elements",
        Byte = 4 [Var] => "byte elements",
        Int16 = 5 [Var] => "16-bit elements",
        Int32 = 6 [Var] => "32-bit elements",
        String = 7 [Var] => "string elements",
        Undim = 204 [Var] => "free the array bound to the variable",
    }
}

sub_opcodes! {
    SystemOp in System {
        Restart = 158 [] => "ask the host to restart",
        Quit = 160 [] => "ask the host to quit",
    }
}

sub_opcodes! {
    ResourceKind in ResourceKind {
        Sound = 13 [] => "sound",
        Room = 14 [] => "room",
        Image = 15 [] => "image",
        Costume = 16 [] => "costume",
        Script = 17 [] => "script",
    }
}

sub_opcodes! {
    GetTimer in GetTimer {
        Elapsed = 10 [] => "elapsed milliseconds",
        ElapsedAlt = 50 [] => "elapsed milliseconds",
    }
}

sub_opcodes! {
    SetTimer in SetTimer {
        Reset = 158 [] => "restart the timer",
        ResetAlt = 61 [] => "restart the timer",
    }
}

fn docs<T: SubOpcode>() -> Vec<SubOpDoc> {
    T::iter()
        .map(|s| SubOpDoc {
            value: s.value(),
            name: s.into(),
            effect: s.effect(),
            operands: s.operands().to_vec(),
        })
        .collect()
}

impl Family {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn sub_ops(self) -> Vec<SubOpDoc> {
        match self {
            Family::Sound => docs::<SoundOp>(),
            Family::Cursor => docs::<CursorOp>(),
            Family::ConfigValue => docs::<ConfigValue>(),
            Family::Array => docs::<ArrayOp>(),
            Family::Wait => docs::<WaitOp>(),
            Family::DimSize => docs::<DimSizeOp>(),
            Family::Dim => docs::<DimOp>(),
            Family::System => docs::<SystemOp>(),
            Family::ResourceKind => docs::<ResourceKind>(),
            Family::GetTimer => docs::<GetTimer>(),
            Family::SetTimer => docs::<SetTimer>(),
        }
    }

    /// Inline operands of the sub-opcode `b`, or `None` if `b` is not a member.
    pub fn operands_of(self, b: u8) -> Option<Vec<Operand>> {
        self.sub_ops()
            .into_iter()
            .find(|d| d.value == b)
            .map(|d| d.operands)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sub_opcode_values_round_trip() {
        assert_eq!(CursorOp::from_byte(0x94), Some(CursorOp::SoftOn));
        assert_eq!(DimOp::Undim.value(), 204);
        let name: &'static str = WaitOp::ActorTurning.into();
        assert_eq!(name, "actorTurning");
    }

    #[test]
    fn unknown_sub_opcode_names_family() {
        assert_eq!(
            decode::<ArrayOp>(9),
            Err(VmError::InvalidSubOpcode { family: "array", sub: 9 })
        );
    }

    #[test]
    fn every_family_documents_distinct_values() {
        for family in Family::iter() {
            let docs = family.sub_ops();
            assert!(!docs.is_empty(), "{family:?}");
            let mut values: Vec<u8> = docs.iter().map(|d| d.value).collect();
            values.sort_unstable();
            values.dedup();
            assert_eq!(values.len(), docs.len(), "{family:?}");
        }
    }

    #[test]
    fn wait_operands_follow_the_sub_opcode() {
        assert_eq!(Family::Wait.operands_of(168), Some(vec![Operand::Jump]));
        assert_eq!(Family::Wait.operands_of(169), Some(vec![]));
        assert_eq!(Family::Wait.operands_of(1), None);
    }
}
