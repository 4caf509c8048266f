use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

use crate::error::{VmError, VmResult};

use super::SlotId;

/// Element type codes as stored in array headers and used by the dim sub-opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, FromRepr)]
#[repr(u8)]
pub enum ElementType {
    Bit = 2,
    Nibble = 3,
    Byte = 4,
    Word = 5,
    Dword = 6,
    String = 7,
}

impl ElementType {
    /// Truncate a value to what the element can hold.
    pub fn store(self, v: i32) -> i32 {
        match self {
            ElementType::Bit => v & 1,
            ElementType::Nibble => v & 0xF,
            ElementType::Byte | ElementType::String => v & 0xFF,
            ElementType::Word => v as i16 as i32,
            ElementType::Dword => v,
        }
    }
}

/// Who is responsible for releasing an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayOwner {
    Global,
    Room,
    Script(SlotId),
}

/// The variable an array handle was written into by `define`.
///
/// `slot` is set when the variable is script-local.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarBinding {
    pub var: u16,
    pub slot: Option<SlotId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Array {
    pub element: ElementType,
    /// Column bounds, inclusive.
    pub dim1: (i32, i32),
    /// Row bounds, inclusive.
    pub dim2: (i32, i32),
    pub owner: ArrayOwner,
    pub binding: Option<VarBinding>,
    data: Vec<i32>,
}

fn extent(bounds: (i32, i32)) -> Option<usize> {
    let n = (bounds.1 as i64) - (bounds.0 as i64) + 1;
    if n <= 0 {
        None
    } else {
        usize::try_from(n).ok()
    }
}

impl Array {
    pub fn new(element: ElementType, dim1: (i32, i32), dim2: (i32, i32)) -> VmResult<Self> {
        let len = Self::element_count(dim1, dim2)?;
        Ok(Self {
            element,
            dim1,
            dim2,
            owner: ArrayOwner::Global,
            binding: None,
            data: vec![0; len],
        })
    }

    /// A NUL-terminated string array holding `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> VmResult<Self> {
        let mut a = Self::new(ElementType::String, (0, bytes.len() as i32), (0, 0))?;
        for (slot, b) in a.data.iter_mut().zip(bytes) {
            *slot = *b as i32;
        }
        Ok(a)
    }

    fn element_count(dim1: (i32, i32), dim2: (i32, i32)) -> VmResult<usize> {
        match (extent(dim1), extent(dim2)) {
            (Some(w), Some(h)) => Ok(w * h),
            _ => Err(VmError::BadBounds { dim1, dim2 }),
        }
    }

    pub fn width(&self) -> usize {
        extent(self.dim1).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        extent(self.dim2).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.data
    }

    fn offset(&self, row: i32, col: i32) -> Option<usize> {
        if row < self.dim2.0 || row > self.dim2.1 || col < self.dim1.0 || col > self.dim1.1 {
            return None;
        }
        let r = (row as i64 - self.dim2.0 as i64) as usize;
        let c = (col as i64 - self.dim1.0 as i64) as usize;
        Some(r * self.width() + c)
    }

    /// Bytes of row 0 up to the first NUL.
    pub fn c_bytes(&self) -> Vec<u8> {
        self.data
            .iter()
            .take(self.width())
            .take_while(|v| **v != 0)
            .map(|v| *v as u8)
            .collect()
    }
}

/// Handle-indexed pool of live arrays. Handles run from 1 to `max`; 0 is the
/// null handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayStore {
    arrays: Vec<Option<Array>>,
}

impl ArrayStore {
    pub fn new(max: usize) -> Self {
        Self {
            arrays: vec![None; max],
        }
    }

    pub fn capacity(&self) -> usize {
        self.arrays.len()
    }

    pub fn num_free(&self) -> usize {
        self.arrays.iter().filter(|a| a.is_none()).count()
    }

    pub fn live(&self) -> impl Iterator<Item = (i32, &Array)> + '_ {
        self.arrays
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.as_ref().map(|a| (i as i32 + 1, a)))
    }

    fn index(&self, handle: i32) -> VmResult<usize> {
        if handle <= 0 || handle as usize > self.arrays.len() {
            return Err(VmError::UnknownArray { handle });
        }
        Ok(handle as usize - 1)
    }

    pub fn alloc(&mut self, array: Array) -> VmResult<i32> {
        let idx = self
            .arrays
            .iter()
            .position(|a| a.is_none())
            .ok_or(VmError::NoFreeArray { max: self.arrays.len() })?;
        self.arrays[idx] = Some(array);
        Ok(idx as i32 + 1)
    }

    pub fn get(&self, handle: i32) -> VmResult<&Array> {
        let idx = self.index(handle)?;
        self.arrays[idx].as_ref().ok_or(VmError::UnknownArray { handle })
    }

    pub fn get_mut(&mut self, handle: i32) -> VmResult<&mut Array> {
        let idx = self.index(handle)?;
        self.arrays[idx].as_mut().ok_or(VmError::UnknownArray { handle })
    }

    pub fn contains(&self, handle: i32) -> bool {
        self.get(handle).is_ok()
    }

    pub fn free(&mut self, handle: i32) -> Option<Array> {
        let idx = self.index(handle).ok()?;
        self.arrays[idx].take()
    }

    pub fn read(&self, handle: i32, row: i32, col: i32) -> VmResult<i32> {
        let a = self.get(handle)?;
        let off = a.offset(row, col).ok_or(VmError::ArrayOutOfBounds {
            handle,
            row,
            col,
            dim1: a.dim1,
            dim2: a.dim2,
        })?;
        Ok(a.data[off])
    }

    pub fn write(&mut self, handle: i32, row: i32, col: i32, value: i32) -> VmResult<()> {
        let a = self.get_mut(handle)?;
        let off = a.offset(row, col).ok_or(VmError::ArrayOutOfBounds {
            handle,
            row,
            col,
            dim1: a.dim1,
            dim2: a.dim2,
        })?;
        a.data[off] = a.element.store(value);
        Ok(())
    }

    pub fn localize(&mut self, handle: i32, owner: ArrayOwner) -> VmResult<()> {
        self.get_mut(handle)?.owner = owner;
        Ok(())
    }

    /// Changes bounds and element type in place; the element count must not change.
    pub fn redim(
        &mut self,
        handle: i32,
        element: ElementType,
        dim1: (i32, i32),
        dim2: (i32, i32),
    ) -> VmResult<()> {
        let new = Array::element_count(dim1, dim2)?;
        let a = self.get_mut(handle)?;
        if new != a.data.len() {
            return Err(VmError::RedimMismatch {
                handle,
                old: a.data.len(),
                new,
            });
        }
        a.element = element;
        a.dim1 = dim1;
        a.dim2 = dim2;
        for v in a.data.iter_mut() {
            *v = element.store(*v);
        }
        Ok(())
    }

    /// Frees every array whose owner matches, returning the released handles
    /// with the variables they were bound to.
    pub fn release_owned(&mut self, owner: ArrayOwner) -> Vec<(i32, Option<VarBinding>)> {
        let mut released = Vec::new();
        for (i, entry) in self.arrays.iter_mut().enumerate() {
            if entry.as_ref().is_some_and(|a| a.owner == owner) {
                if let Some(a) = entry.take() {
                    released.push((i as i32 + 1, a.binding));
                }
            }
        }
        released
    }

    /// Permutes row 0, columns `lo..=hi`.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, handle: i32, lo: i32, hi: i32, rng: &mut R) -> VmResult<()> {
        if lo > hi {
            return Ok(());
        }
        let a = self.get_mut(handle)?;
        let (dim1, dim2) = (a.dim1, a.dim2);
        let oob = |col| VmError::ArrayOutOfBounds {
            handle,
            row: 0,
            col,
            dim1,
            dim2,
        };
        let start = a.offset(0, lo).ok_or_else(|| oob(lo))?;
        let end = a.offset(0, hi).ok_or_else(|| oob(hi))?;
        a.data[start..=end].shuffle(rng);
        Ok(())
    }
}
