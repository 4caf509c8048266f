use serde::{Deserialize, Serialize};

use crate::error::{VmError, VmResult};

pub const ROOM_VAR_BIT: u16 = 0x8000;
pub const LOCAL_VAR_BIT: u16 = 0x4000;

/// Scope class encoded in a variable id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarRef {
    Global(usize),
    Room(usize),
    Local(usize),
}

impl VarRef {
    pub fn decode(id: u16) -> Self {
        if id & ROOM_VAR_BIT != 0 {
            VarRef::Room((id & !ROOM_VAR_BIT) as usize)
        } else if id & LOCAL_VAR_BIT != 0 {
            VarRef::Local((id & !LOCAL_VAR_BIT) as usize)
        } else {
            VarRef::Global(id as usize)
        }
    }
}

/// Global and room scalar variables. Script-local variables live on the slot
/// and are passed in by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarStore {
    globals: Vec<i32>,
    room: Vec<i32>,
}

impl VarStore {
    pub fn new(global_count: usize, room_count: usize) -> Self {
        Self {
            globals: vec![0; global_count],
            room: vec![0; room_count],
        }
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    pub fn room_count(&self) -> usize {
        self.room.len()
    }

    pub fn read(&self, id: u16, locals: &[i32]) -> VmResult<i32> {
        let v = match VarRef::decode(id) {
            VarRef::Global(i) => self.globals.get(i),
            VarRef::Room(i) => self.room.get(i),
            VarRef::Local(i) => locals.get(i),
        };
        v.copied().ok_or(VmError::UnknownVariable { id })
    }

    pub fn write(&mut self, id: u16, value: i32, locals: &mut [i32]) -> VmResult<()> {
        let v = match VarRef::decode(id) {
            VarRef::Global(i) => self.globals.get_mut(i),
            VarRef::Room(i) => self.room.get_mut(i),
            VarRef::Local(i) => locals.get_mut(i),
        };
        let v = v.ok_or(VmError::UnknownVariable { id })?;
        *v = value;
        Ok(())
    }

    /// Read without a slot context. Script-local ids are rejected.
    pub fn read_global(&self, id: u16) -> VmResult<i32> {
        self.read(id, &[])
    }

    pub fn write_global(&mut self, id: u16, value: i32) -> VmResult<()> {
        self.write(id, value, &mut [])
    }

    pub fn reset_room(&mut self) {
        self.room.iter_mut().for_each(|v| *v = 0);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn id_bits_select_scope() {
        assert_eq!(VarRef::decode(100), VarRef::Global(100));
        assert_eq!(VarRef::decode(0x8003), VarRef::Room(3));
        assert_eq!(VarRef::decode(0x4002), VarRef::Local(2));
    }

    #[test]
    fn scopes_do_not_alias() {
        let mut vars = VarStore::new(8, 4);
        let mut locals = vec![0; 4];
        vars.write(3, 30, &mut locals).unwrap();
        vars.write(0x8003, 31, &mut locals).unwrap();
        vars.write(0x4003, 32, &mut locals).unwrap();
        assert_eq!(vars.read(3, &locals), Ok(30));
        assert_eq!(vars.read(0x8003, &locals), Ok(31));
        assert_eq!(vars.read(0x4003, &locals), Ok(32));
    }

    #[test]
    fn out_of_range_ids_fail() {
        let mut vars = VarStore::new(8, 4);
        assert_eq!(vars.read_global(8), Err(VmError::UnknownVariable { id: 8 }));
        assert_eq!(vars.write_global(0x8004, 1), Err(VmError::UnknownVariable { id: 0x8004 }));
        assert_eq!(vars.read_global(0x4000), Err(VmError::UnknownVariable { id: 0x4000 }));
    }

    #[test]
    fn room_reset_leaves_globals() {
        let mut vars = VarStore::new(8, 4);
        vars.write_global(1, 5).unwrap();
        vars.write_global(0x8001, 6).unwrap();
        vars.reset_room();
        assert_eq!(vars.read_global(1), Ok(5));
        assert_eq!(vars.read_global(0x8001), Ok(0));
    }
}
