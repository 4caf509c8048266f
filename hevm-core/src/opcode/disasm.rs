//! Linear disassembly driven by the operand layouts in the opcode table.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use super::{entry, Handler, Operand};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inst {
    pub address: u32,
    pub opcode: u8,
    pub mnemonic: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub insts: Vec<Inst>,
    /// Address of the first byte whose layout is unknown, if decoding stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<u32>,
}

pub struct Disassembler<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Disassembler<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(code),
        }
    }

    fn get_pc(&self) -> u32 {
        self.cursor.position() as u32
    }

    fn at_end(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }

    fn read_u8(&mut self) -> Result<u8> {
        let pc = self.get_pc();
        self.cursor.read_u8().with_context(|| format!("truncated byte at 0x{:X}", pc))
    }

    fn read_i16(&mut self) -> Result<i16> {
        let pc = self.get_pc();
        self.cursor
            .read_i16::<LittleEndian>()
            .with_context(|| format!("truncated word at 0x{:X}", pc))
    }

    fn read_string(&mut self) -> Result<String> {
        let start = self.get_pc() as usize;
        let code = *self.cursor.get_ref();
        let Some(len) = code[start..].iter().position(|&b| b == 0) else {
            bail!("unterminated string at 0x{:X}", start);
        };
        self.cursor.set_position((start + len + 1) as u64);
        Ok(String::from_utf8_lossy(&code[start..start + len]).into_owned())
    }

    /// Decodes one operand. Returns `None` when a sub-opcode byte has no
    /// known layout.
    fn operand(&mut self, op: Operand, out: &mut Vec<String>) -> Result<Option<()>> {
        match op {
            Operand::Byte => out.push(self.read_u8()?.to_string()),
            Operand::Word => out.push(self.read_i16()?.to_string()),
            Operand::DWord => {
                let pc = self.get_pc();
                let v = self
                    .cursor
                    .read_i32::<LittleEndian>()
                    .with_context(|| format!("truncated dword at 0x{:X}", pc))?;
                out.push(v.to_string());
            }
            Operand::Var => out.push(format!("var{}", self.read_i16()? as u16)),
            Operand::Jump => {
                let offset = self.read_i16()?;
                let target = self.get_pc() as i64 + offset as i64;
                out.push(format!("0x{:X}", target));
            }
            Operand::String => out.push(format!("{:?}", self.read_string()?)),
            Operand::Flags => out.push(format!("flags={}", self.read_u8()?)),
            Operand::Sub(family) => {
                let sub = self.read_u8()?;
                let Some(layout) = family.operands_of(sub) else {
                    log::warn!("{}: unknown sub-opcode {} at 0x{:X}", family.name(), sub, self.get_pc() - 1);
                    return Ok(None);
                };
                out.push(format!("{}.{}", family.name(), sub_name(family, sub)));
                for op in layout {
                    if self.operand(op, out)?.is_none() {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(()))
    }

    pub fn disassemble(mut self) -> Result<Listing> {
        let mut insts = Vec::new();
        while !self.at_end() {
            let address = self.get_pc();
            let opcode = self.read_u8()?;
            let e = entry(opcode);
            let layout = match (e.handler, e.operands) {
                (Handler::Native(_), Some(layout)) => layout,
                _ => {
                    log::debug!("stopping at 0x{:X}: {} ({})", address, e.name, e.handler.kind());
                    return Ok(Listing {
                        insts,
                        stopped_at: Some(address),
                    });
                }
            };

            let mut operands = Vec::new();
            for op in layout {
                if self.operand(*op, &mut operands)?.is_none() {
                    return Ok(Listing {
                        insts,
                        stopped_at: Some(address),
                    });
                }
            }
            insts.push(Inst {
                address,
                opcode,
                mnemonic: e.name.to_string(),
                operands,
            });
        }

        Ok(Listing {
            insts,
            stopped_at: None,
        })
    }
}

fn sub_name(family: super::Family, sub: u8) -> String {
    family
        .sub_ops()
        .into_iter()
        .find(|d| d.value == sub)
        .map(|d| d.name.to_string())
        .unwrap_or_else(|| sub.to_string())
}

pub fn disassemble(code: &[u8]) -> Result<Listing> {
    Disassembler::new(code).disassemble()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::asm::Asm;

    fn mnemonics(l: &Listing) -> Vec<&str> {
        l.insts.iter().map(|i| i.mnemonic.as_str()).collect()
    }

    #[test]
    fn decodes_operands_and_jump_targets() {
        let code = Asm::new()
            .label("top")
            .push_byte(3)
            .write_var(10)
            .push_var(10)
            .if_true("top")
            .break_here()
            .finish();
        let listing = disassemble(&code).unwrap();
        assert_eq!(listing.stopped_at, None);
        assert_eq!(mnemonics(&listing), vec!["pushByte", "writeWordVar", "pushWordVar", "if", "breakHere"]);
        assert_eq!(listing.insts[1].operands, vec!["var10".to_string()]);
        assert_eq!(listing.insts[3].address, 8);
        assert_eq!(listing.insts[3].operands, vec!["0x0".to_string()]);
    }

    #[test]
    fn decodes_sub_opcode_operands() {
        let code = Asm::new().assign_string(20, b"hi").dim_array(5, 21).finish();
        let listing = disassemble(&code).unwrap();
        assert_eq!(
            listing.insts[0].operands,
            vec!["array.assignString".to_string(), "var20".to_string(), "\"hi\"".to_string()]
        );
        assert_eq!(listing.insts[1].operands, vec!["dim.int16".to_string(), "var21".to_string()]);
    }

    #[test]
    fn stops_at_unknown_layouts() {
        let code = [0x00, 0x01, 0x61, 0x00];
        let listing = disassemble(&code).unwrap();
        assert_eq!(listing.insts.len(), 1);
        assert_eq!(listing.stopped_at, Some(2));

        let listing = disassemble(&[0x6B, 0x50]).unwrap();
        assert_eq!(listing.stopped_at, Some(0));
    }

    #[test]
    fn truncated_operands_are_errors() {
        assert!(disassemble(&[0x01, 0x01]).is_err());
        assert!(disassemble(&[0x04, b'a']).is_err());
    }
}
