//! Top-level facade tying decode, load and execute together: binds a
//! module's named `Input` interface variables from JSON, runs one entry
//! point to completion, and reads its `Output` interface variables back out
//! by name, per the external interface's structured-document boundary.
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as Json;

use crate::codec;
use crate::console::WarnSink;
use crate::data::Id;
use crate::error::{InterpError, Result};
use crate::exec::load::load_module;
use crate::exec::Invocation;
use crate::func::EntryPoint;
use crate::parse::{InstList, SpirvBinary};
use crate::ty::{StorageClass, Type};

/// A decoded SPIR-V module, ready to run any of its entry points.
pub struct Module {
    insts: InstList,
    bound: Id,
    entry_points: Vec<EntryPoint>,
}
impl Module {
    /// Decodes a SPIR-V word stream (little- or big-endian byte order, per
    /// the leading magic number) and runs the load phase once to discover
    /// the module's entry points.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bin = SpirvBinary::from(bytes);
        let header = bin
            .header()
            .ok_or_else(|| InterpError::malformed(None, "binary is shorter than a SPIR-V header"))?;
        let insts =
            InstList::from_binary(&bin).map_err(|e| InterpError::malformed(None, e.to_string()))?;
        let (_, entry_points) = load_module(&insts, header.bound)?;
        Ok(Module {
            insts,
            bound: header.bound,
            entry_points,
        })
    }

    #[cfg(test)]
    fn from_insts(insts: InstList, bound: Id) -> Result<Self> {
        let (_, entry_points) = load_module(&insts, bound)?;
        Ok(Module { insts, bound, entry_points })
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    fn entry_point(&self, name: &str) -> Result<&EntryPoint> {
        self.entry_points
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| InterpError::malformed(None, format!("no entry point named {:?}", name)))
    }

    /// Binds `inputs` onto `entry_name`'s `Input`-class interface variables
    /// (matched by debug name), runs the entry point to completion, and
    /// returns every `Output`-class interface variable, keyed by name.
    ///
    /// Reloads the module's declarations fresh for this run, so an entry
    /// point with side effects on its own globals can be run repeatedly
    /// from a clean slate.
    pub fn run(
        &self,
        entry_name: &str,
        inputs: &HashMap<String, Json>,
        warn: &dyn WarnSink,
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<HashMap<String, Json>> {
        let entry = self.entry_point(entry_name)?;
        let (mut globals, _) = load_module(&self.insts, self.bound)?;

        for &id in &entry.interface {
            let pointee_ty = {
                let data = globals.at(id)?;
                let entity = data.borrow();
                let var = match entity.as_variable() {
                    Some(v) if v.store_cls == StorageClass::Input => v,
                    _ => continue,
                };
                match var.name.clone().and_then(|name| inputs.get(&name).cloned()) {
                    Some(json) => Some((pointee_type_of(var), json)),
                    None => None,
                }
            };
            if let Some((ty, json)) = pointee_ty {
                let value = codec::from_json(&ty, &json)?;
                let data = globals.at(id)?;
                let mut entity = data.borrow_mut();
                let var = entity.as_variable_mut().unwrap();
                var.init_value(true);
                var.set_value(value);
            }
        }

        let location = {
            let data = globals.at(entry.func_id)?;
            let entity = data.borrow();
            entity
                .as_function()
                .ok_or_else(|| InterpError::malformed(None, "entry point does not name a function"))?
                .location
        };

        let globals = Rc::new(globals);
        let mut invocation = Invocation::new(globals, location, vec![], 0);
        invocation.run(&self.insts, warn, should_cancel)?;

        let mut outputs = HashMap::new();
        for &id in &entry.interface {
            let data = invocation.view_mut().at(id)?;
            let entity = data.borrow();
            let var = match entity.as_variable() {
                Some(v) if v.store_cls == StorageClass::Output => v,
                _ => continue,
            };
            if let (Some(name), Some(value)) = (&var.name, var.value()) {
                outputs.insert(name.clone(), codec::to_json(value));
            }
        }
        Ok(outputs)
    }
}

fn pointee_type_of(var: &crate::var::Variable) -> Type {
    match var.ty() {
        Type::Pointer(p) => (*p.pointee_ty).clone(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{Instruction, InstructionBuilder};
    use spirv::Op;

    // ids: 1=void 2=fn-void() 3=uint32 4=ptr-Input-uint 5=ptr-Output-uint
    //      6=x (Input var) 7=y (Output var) 8=main func 9=entry label
    //      10=loaded value
    fn passthrough_module() -> (InstList, Id) {
        let instrs: Vec<Instruction> = vec![
            InstructionBuilder::new(Op::Name).push(6).push_str("x").build(),
            InstructionBuilder::new(Op::Name).push(7).push_str("y").build(),
            InstructionBuilder::new(Op::TypeVoid).push(1).build(),
            InstructionBuilder::new(Op::TypeFunction).push(2).push(1).build(),
            InstructionBuilder::new(Op::TypeInt).push(3).push(32).push(0).build(),
            InstructionBuilder::new(Op::TypePointer)
                .push(4)
                .push(StorageClass::Input as u32)
                .push(3)
                .build(),
            InstructionBuilder::new(Op::TypePointer)
                .push(5)
                .push(StorageClass::Output as u32)
                .push(3)
                .build(),
            InstructionBuilder::new(Op::Variable)
                .push(4)
                .push(6)
                .push(StorageClass::Input as u32)
                .build(),
            InstructionBuilder::new(Op::Variable)
                .push(5)
                .push(7)
                .push(StorageClass::Output as u32)
                .build(),
            InstructionBuilder::new(Op::Function).push(1).push(8).push(0).push(2).build(),
            InstructionBuilder::new(Op::Label).push(9).build(),
            InstructionBuilder::new(Op::Load).push(3).push(10).push(6).build(),
            InstructionBuilder::new(Op::Store).push(7).push(10).build(),
            InstructionBuilder::new(Op::Return).build(),
            InstructionBuilder::new(Op::FunctionEnd).build(),
            InstructionBuilder::new(Op::EntryPoint)
                .push(0)
                .push(8)
                .push_str("main")
                .push(6)
                .push(7)
                .build(),
        ];
        (InstList::new(instrs, Vec::new()), 11)
    }

    #[test]
    fn binds_runs_and_reads_back_interface_variables() {
        let (insts, bound) = passthrough_module();
        let module = Module::from_insts(insts, bound).unwrap();
        assert_eq!(module.entry_points().len(), 1);

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), serde_json::json!(42));

        let warn = crate::console::NullWarnSink;
        let outputs = module.run("main", &inputs, &warn, &|| false).unwrap();
        assert_eq!(outputs.get("y"), Some(&serde_json::json!(42)));
    }
}
