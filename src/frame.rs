//! Call frames and the frame stack: per-invocation program counter,
//! argument cursor and return-id slot.
use crate::data::Id;
use crate::error::{InterpError, Result};
use crate::value::Value;

/// One activation record. Pushed on `OpFunctionCall`, popped on
/// `OpReturn`/`OpReturnValue`.
#[derive(Clone, Debug)]
pub struct Frame {
    pc: usize,
    args: Vec<Value>,
    arg_cursor: usize,
    /// Id the return value should be written to; `0` means the call site
    /// expects no result (a void call).
    pub ret_at: Id,
    /// The label id of the block currently executing, set by `OpLabel`.
    cur_block: Option<Id>,
    /// The label id of the block branched from, read by `OpPhi` to pick the
    /// incoming value whose parent matches.
    prev_block: Option<Id>,
}
impl Frame {
    pub fn new(pc: usize, args: Vec<Value>, ret_at: Id) -> Self {
        Frame {
            pc,
            args,
            arg_cursor: 0,
            ret_at,
            cur_block: None,
            prev_block: None,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Called when `OpLabel` executes: the block just left becomes
    /// `prev_block`, visible to this block's `OpPhi`s.
    pub fn enter_block(&mut self, label_id: Id) {
        self.prev_block = self.cur_block.take();
        self.cur_block = Some(label_id);
    }

    pub fn prev_block(&self) -> Option<Id> {
        self.prev_block
    }

    fn all_args_consumed(&self) -> bool {
        self.arg_cursor == self.args.len()
    }

    /// Consumes the next declared parameter. Each argument opcode advances
    /// `pc` by one alongside the cursor.
    pub fn get_arg(&mut self, inst_idx: usize) -> Result<&Value> {
        if self.arg_cursor >= self.args.len() {
            return Err(InterpError::underconsumed(
                Some(inst_idx),
                "no more arguments were passed to this call",
            ));
        }
        let i = self.arg_cursor;
        self.arg_cursor += 1;
        self.pc += 1;
        Ok(&self.args[i])
    }

    /// Advances `pc` by one. Fails unless every declared parameter has been
    /// consumed first.
    pub fn inc_pc(&mut self, inst_idx: usize) -> Result<()> {
        if !self.all_args_consumed() {
            return Err(InterpError::underconsumed(
                Some(inst_idx),
                "advanced past a call's parameters without reading them all",
            ));
        }
        self.pc += 1;
        Ok(())
    }

    /// Sets `pc` directly (branch targets). Same consumption requirement as
    /// `inc_pc`.
    pub fn set_pc(&mut self, inst_idx: usize, pc: usize) -> Result<()> {
        if !self.all_args_consumed() {
            return Err(InterpError::underconsumed(
                Some(inst_idx),
                "branched before reading all of the call's parameters",
            ));
        }
        self.pc = pc;
        Ok(())
    }
}

/// A LIFO stack of frames for one invocation.
#[derive(Clone, Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}
impl FrameStack {
    pub fn new() -> Self {
        FrameStack { frames: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pops the current frame, returning it to the caller so `OpReturnValue`
    /// can route its payload into `ret_at`.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }
    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_pc_fails_until_all_args_are_read() {
        let mut f = Frame::new(0, vec![Value::from_u32(1), Value::from_u32(2)], 0);
        assert!(f.inc_pc(0).is_err());
        f.get_arg(0).unwrap();
        assert!(f.inc_pc(0).is_err());
        f.get_arg(0).unwrap();
        assert!(f.inc_pc(0).is_ok());
    }

    #[test]
    fn get_arg_advances_pc_alongside_cursor() {
        let mut f = Frame::new(10, vec![Value::from_u32(7)], 0);
        f.get_arg(0).unwrap();
        assert_eq!(f.pc(), 11);
    }

    #[test]
    fn get_arg_past_the_end_is_underconsumed_error() {
        let mut f: Frame = Frame::new(0, vec![], 0);
        assert!(f.get_arg(0).is_err());
    }

    #[test]
    fn stack_pops_in_lifo_order() {
        let mut stack = FrameStack::new();
        stack.push(Frame::new(0, vec![], 0));
        stack.push(Frame::new(5, vec![], 1));
        assert_eq!(stack.pop().unwrap().pc(), 5);
        assert_eq!(stack.pop().unwrap().pc(), 0);
        assert!(stack.is_empty());
    }
}
