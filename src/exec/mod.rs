//! The executor: drives a single invocation's frame stack to completion,
//! per opcode, against a `DataView` layered over the module's globals.
pub mod dispatch;
pub mod load;

use std::rc::Rc;

use crate::console::WarnSink;
use crate::data::{Data, DataView, Entity, Id};
use crate::error::{InterpError, Result};
use crate::frame::{Frame, FrameStack};
use crate::parse::InstList;
use crate::value::Value;

/// One cooperative single-threaded run of a SPIR-V function. Siblings of a
/// workgroup each get their own `Invocation` layered over shared, read-only
/// globals; nothing here mutates `globals` once constructed.
pub struct Invocation {
    view: DataView,
    frames: FrameStack,
}
impl Invocation {
    pub fn new(globals: Rc<DataView>, entry_location: usize, args: Vec<Value>, ret_at: Id) -> Self {
        let mut frames = FrameStack::new();
        frames.push(Frame::new(entry_location, args, ret_at));
        Invocation {
            view: DataView::new_child(globals),
            frames,
        }
    }

    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn view(&self) -> &DataView {
        &self.view
    }
    pub fn view_mut(&mut self) -> &mut DataView {
        &mut self.view
    }

    /// Runs one opcode, matching §4.7's four-step loop: fetch, dispatch,
    /// handle call/return, step `pc` unless the opcode already moved it.
    fn step(&mut self, insts: &InstList, warn: &dyn WarnSink) -> Result<()> {
        let frame = match self.frames.current_mut() {
            Some(f) => f,
            None => return Ok(()),
        };
        let pc = frame.pc();
        let instr = insts
            .get(pc)
            .ok_or_else(|| InterpError::malformed(Some(pc), "program counter ran past the instruction list"))?;
        let instr = instr.clone();

        let control = dispatch::execute_one(&instr, &mut self.view, frame, pc, warn)?;
        match control {
            dispatch::Control::Advance => {
                self.frames.current_mut().unwrap().inc_pc(pc)?;
            }
            dispatch::Control::AlreadySet => {}
            dispatch::Control::Branch(target) => {
                self.frames.current_mut().unwrap().set_pc(pc, target)?;
            }
            dispatch::Control::Call { location, args, ret_at } => {
                self.frames.current_mut().unwrap().inc_pc(pc)?;
                self.frames.push(Frame::new(location, args, ret_at));
            }
            dispatch::Control::Return(value) => {
                let finished = self.frames.pop().unwrap();
                if let (Some(v), true) = (value, finished.ret_at != 0) {
                    self.view.set(finished.ret_at, Data::owned(Entity::Value(v)));
                }
            }
        }
        Ok(())
    }

    /// Runs to completion (empty frame stack), an error, or cancellation.
    /// `should_cancel` is polled once per opcode, at the top of the loop, per
    /// the cooperative cancellation model.
    pub fn run(
        &mut self,
        insts: &InstList,
        warn: &dyn WarnSink,
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<()> {
        while !self.is_done() {
            if should_cancel() {
                let pc = self.frames.current().map(Frame::pc);
                return Err(InterpError::cancelled(pc));
            }
            self.step(insts, warn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{Instr, Instruction, InstructionBuilder};
    use crate::ty::Type;
    use spirv::Op;

    fn instrs(ops: Vec<Instruction>) -> InstList {
        InstList::new(ops, Vec::new())
    }

    fn iadd(result_ty: u32, result: u32, a: u32, b: u32) -> Instruction {
        InstructionBuilder::new(Op::IAdd)
            .push(result_ty)
            .push(result)
            .push(a)
            .push(b)
            .build()
    }
    fn op_return() -> Instruction {
        InstructionBuilder::new(Op::Return).build()
    }

    #[test]
    fn adds_two_values_and_returns() {
        let list = instrs(vec![iadd(100, 3, 1, 2), op_return()]);

        let mut globals = DataView::new_root(200);
        globals.set(100, Data::owned(Entity::Type(Type::uint32())));
        let globals = Rc::new(globals);

        let mut inv = Invocation::new(globals, 0, vec![], 0);
        inv.view_mut().set(1, Data::owned(Entity::Value(Value::from_u32(7))));
        inv.view_mut().set(2, Data::owned(Entity::Value(Value::from_u32(5))));

        let warn = crate::console::NullWarnSink;
        inv.run(&list, &warn, &|| false).unwrap();

        assert!(inv.is_done());
        let sum = inv.view_mut().at(3).unwrap().borrow().as_value().unwrap().as_u32().unwrap();
        assert_eq!(sum, 12);
    }

    #[test]
    fn cancellation_is_observed_before_dispatch() {
        let list = instrs(vec![iadd(100, 3, 1, 2)]);
        let globals = Rc::new(DataView::new_root(200));
        let mut inv = Invocation::new(globals, 0, vec![], 0);
        let warn = crate::console::NullWarnSink;
        let err = inv.run(&list, &warn, &|| true).unwrap_err();
        assert!(matches!(err, InterpError::Cancelled { .. }));
    }

    #[allow(dead_code)]
    fn silence_unused(_: &Instr) {}
}
