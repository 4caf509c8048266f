use serde::{Deserialize, Serialize};

use crate::error::{VmError, VmResult};

/// Binary reducers: pop `b`, pop `a`, push `a OP b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Gt,
    Lt,
    Le,
    Ge,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
}

impl BinaryOp {
    pub fn apply(self, a: i32, b: i32) -> VmResult<i32> {
        use BinaryOp::*;
        let v = match self {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            Div => {
                if b == 0 {
                    return Err(VmError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            Eq => (a == b) as i32,
            Neq => (a != b) as i32,
            Gt => (a > b) as i32,
            Lt => (a < b) as i32,
            Le => (a <= b) as i32,
            Ge => (a >= b) as i32,
            LogicalAnd => (a != 0 && b != 0) as i32,
            LogicalOr => (a != 0 || b != 0) as i32,
            BitAnd => a & b,
            BitOr => a | b,
        };
        Ok(v)
    }
}

/// Per-slot operand stack of `i32`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandStack {
    values: Vec<i32>,
    limit: usize,
}

impl OperandStack {
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn push(&mut self, v: i32) -> VmResult<()> {
        if self.values.len() >= self.limit {
            return Err(VmError::StackOverflow { limit: self.limit });
        }
        self.values.push(v);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<i32> {
        self.values.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> VmResult<i32> {
        self.values.last().copied().ok_or(VmError::StackUnderflow)
    }

    pub fn dup(&mut self) -> VmResult<()> {
        let v = self.peek()?;
        self.push(v)
    }

    pub fn binary(&mut self, op: BinaryOp) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(op.apply(a, b)?)
    }

    pub fn unary(&mut self, f: impl FnOnce(i32) -> i32) -> VmResult<()> {
        let a = self.pop()?;
        self.push(f(a))
    }

    /// Pops a count, then that many values; returns them in push order.
    pub fn pop_list(&mut self, max: usize) -> VmResult<Vec<i32>> {
        let count = self.pop()?;
        if count < 0 || count as usize > max {
            return Err(VmError::TooManyItems { count, max });
        }
        let count = count as usize;
        let mut list = vec![0; count];
        for i in (0..count).rev() {
            list[i] = self.pop()?;
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pops_in_lifo_order() {
        let mut s = OperandStack::new(150);
        for v in [1, -2, 3, 400_000] {
            s.push(v).unwrap();
        }
        assert_eq!(s.pop(), Ok(400_000));
        assert_eq!(s.pop(), Ok(3));
        assert_eq!(s.pop(), Ok(-2));
        assert_eq!(s.pop(), Ok(1));
        assert_eq!(s.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn pop_on_empty_never_yields_zero() {
        let mut s = OperandStack::new(4);
        assert_eq!(s.pop(), Err(VmError::StackUnderflow));
        assert_eq!(s.dup(), Err(VmError::StackUnderflow));
        assert_eq!(s.binary(BinaryOp::Add), Err(VmError::StackUnderflow));
    }

    #[test]
    fn overflow_respects_limit() {
        let mut s = OperandStack::new(2);
        s.push(1).unwrap();
        s.push(2).unwrap();
        assert_eq!(s.push(3), Err(VmError::StackOverflow { limit: 2 }));
    }

    #[test]
    fn reducers_take_lhs_from_second_pop() {
        let mut s = OperandStack::new(16);
        s.push(10).unwrap();
        s.push(3).unwrap();
        s.binary(BinaryOp::Sub).unwrap();
        assert_eq!(s.peek(), Ok(7));

        s.push(2).unwrap();
        s.binary(BinaryOp::Gt).unwrap();
        assert_eq!(s.pop(), Ok(1));
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(BinaryOp::Add.apply(i32::MAX, 1), Ok(i32::MIN));
        assert_eq!(BinaryOp::Mul.apply(i32::MIN, -1), Ok(i32::MIN));
        assert_eq!(BinaryOp::Div.apply(i32::MIN, -1), Ok(i32::MIN));
        assert_eq!(BinaryOp::Div.apply(-7, 2), Ok(-3));
    }

    #[test]
    fn division_by_zero_fails() {
        assert_eq!(BinaryOp::Div.apply(5, 0), Err(VmError::DivisionByZero));
    }

    #[test]
    fn comparisons_push_zero_or_one() {
        for (op, a, b, want) in [
            (BinaryOp::Eq, 3, 3, 1),
            (BinaryOp::Neq, 3, 3, 0),
            (BinaryOp::Lt, -1, 0, 1),
            (BinaryOp::Le, 0, 0, 1),
            (BinaryOp::Ge, -5, 0, 0),
            (BinaryOp::LogicalAnd, 7, 0, 0),
            (BinaryOp::LogicalOr, 0, -9, 1),
        ] {
            assert_eq!(op.apply(a, b), Ok(want), "{op:?}");
        }
    }

    #[test]
    fn pop_list_restores_push_order() {
        let mut s = OperandStack::new(16);
        for v in [42, 7, 8, 9, 3] {
            s.push(v).unwrap();
        }
        assert_eq!(s.pop_list(16), Ok(vec![7, 8, 9]));
        assert_eq!(s.pop(), Ok(42));

        s.push(30).unwrap();
        assert_eq!(s.pop_list(25), Err(VmError::TooManyItems { count: 30, max: 25 }));
    }
}
