//! The 256-entry primary opcode table.
//!
//! Every byte resolves to an [`OpcodeEntry`]. Entries are either natively
//! implemented, named but [`Handler::Unsupported`] (their effect belongs to a
//! subsystem outside this core), or [`Handler::Invalid`] holes.

pub mod disasm;
pub mod family;
mod names;
mod ops;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::{VmError, VmResult};
use crate::vm::Exec;

pub use family::{Family, SubOpDoc, SubOpcode};

pub type NativeFn = fn(&mut Exec<'_>) -> VmResult<()>;

#[derive(Clone, Copy)]
pub enum Handler {
    Native(NativeFn),
    Unsupported,
    Invalid,
}

impl Handler {
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Native(_) => "native",
            Handler::Unsupported => "unsupported",
            Handler::Invalid => "invalid",
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Inline operand layout, in bytecode order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operand {
    Byte,
    /// signed 16-bit immediate
    Word,
    DWord,
    /// 16-bit variable id
    Var,
    /// signed 16-bit offset relative to the end of the operand
    Jump,
    /// NUL-terminated bytes
    String,
    /// start flags byte (195, 199, 200)
    Flags,
    Sub(Family),
}

#[derive(Debug)]
pub struct OpcodeEntry {
    pub opcode: u8,
    pub name: &'static str,
    /// The entry this one duplicates, if it is a documented alias.
    pub alias_of: Option<u8>,
    pub handler: Handler,
    /// `None` when the layout is unknown to this core.
    pub operands: Option<&'static [Operand]>,
    pub summary: &'static str,
}

/// Duplicate table slots that share one handler.
pub const ALIASES: &[(u8, u8)] = &[(0x66, 0x65), (0xBD, 0x65), (0xA7, 0x1A)];

fn build_entry(opcode: u8) -> OpcodeEntry {
    let name = names::NAMES[opcode as usize];
    let alias_of = ALIASES.iter().find(|(a, _)| *a == opcode).map(|(_, t)| *t);
    let native = ops::native(alias_of.unwrap_or(opcode));

    let (handler, operands, summary) = match native {
        Some(n) => (Handler::Native(n.handler), Some(n.operands), n.summary),
        None if name.is_empty() => (Handler::Invalid, None, "invalid opcode"),
        None => (Handler::Unsupported, None, "outside this core"),
    };

    OpcodeEntry {
        opcode,
        name: if name.is_empty() { "invalid" } else { name },
        alias_of,
        handler,
        operands,
        summary,
    }
}

lazy_static! {
    static ref TABLE: Vec<OpcodeEntry> = (0..=u8::MAX).map(build_entry).collect();
}

pub fn entry(opcode: u8) -> &'static OpcodeEntry {
    &TABLE[opcode as usize]
}

pub fn catalog() -> impl Iterator<Item = &'static OpcodeEntry> {
    TABLE.iter()
}

/// Runs the handler for `opcode` against the executing slot.
pub fn dispatch(opcode: u8, exec: &mut Exec<'_>) -> VmResult<()> {
    let e = entry(opcode);
    match e.handler {
        Handler::Native(f) => f(exec),
        Handler::Unsupported => Err(VmError::UnsupportedOpcode {
            opcode,
            name: e.name.to_string(),
        }),
        Handler::Invalid => Err(VmError::InvalidOpcode { opcode }),
    }
}

/// Serializable view of one catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryDoc {
    pub opcode: String,
    pub name: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operands: Option<Vec<Operand>>,
    pub summary: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_ops: Vec<SubOpDoc>,
}

impl OpcodeEntry {
    pub fn family(&self) -> Option<Family> {
        self.operands?.iter().find_map(|o| match o {
            Operand::Sub(f) => Some(*f),
            _ => None,
        })
    }

    pub fn doc(&self) -> EntryDoc {
        EntryDoc {
            opcode: format!("0x{:02X}", self.opcode),
            name: self.name,
            kind: self.handler.kind(),
            alias_of: self.alias_of.map(|a| format!("0x{:02X}", a)),
            operands: self.operands.map(<[Operand]>::to_vec),
            summary: self.summary,
            sub_ops: self.family().map(Family::sub_ops).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn table_is_total() {
        assert_eq!(catalog().count(), 256);
        for (i, e) in catalog().enumerate() {
            assert_eq!(e.opcode as usize, i);
        }
    }

    #[test]
    fn holes_are_invalid_and_named_gaps_unsupported() {
        assert!(matches!(entry(0x05).handler, Handler::Invalid));
        assert_eq!(entry(0x05).name, "invalid");
        assert!(matches!(entry(0x61).handler, Handler::Unsupported));
        assert_eq!(entry(0x61).name, "drawObject");
        assert!(matches!(entry(0x14).handler, Handler::Native(_)));
    }

    #[test]
    fn aliases_share_their_target_handler() {
        for (alias, target) in ALIASES {
            let a = entry(*alias);
            let t = entry(*target);
            assert_eq!(a.alias_of, Some(*target));
            assert_eq!(a.name, t.name);
            match (a.handler, t.handler) {
                (Handler::Native(x), Handler::Native(y)) => assert!(x as usize == y as usize),
                other => panic!("alias {alias:02X} not native: {other:?}"),
            }
        }
    }

    #[test]
    fn family_entries_document_sub_ops() {
        let doc = entry(0x6B).doc();
        assert_eq!(doc.name, "cursorCommand");
        assert_eq!(doc.sub_ops.len(), 13);
        assert_eq!(entry(0x00).doc().sub_ops, vec![]);
    }
}
