//! `Function` and `EntryPoint`: the other two module entity kinds.
use crate::ty::{FunctionType, Type};
use crate::value::{StructVal, Value};

/// A defined SPIR-V function: its type plus the instruction index its body
/// starts at. Unlike the teacher's reflection-only `Function` (which tracked
/// `accessed_vars`/`callees` for static analysis), the interpreter only
/// needs to know where to start executing.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<String>,
    pub ty: FunctionType,
    pub location: usize,
}
impl Function {
    pub fn new(name: Option<String>, ty: FunctionType, location: usize) -> Self {
        Function { name, ty, location }
    }

    /// `{name?, types, location}`.
    pub fn as_value(&self) -> StructVal {
        let mut fields = Vec::new();
        if let Some(name) = &self.name {
            fields.push(("name".to_string(), Value::from_string(name.clone())));
        }
        fields.push((
            "types".to_string(),
            Value::from_string(Type::Function(self.ty.clone()).to_string()),
        ));
        fields.push(("location".to_string(), Value::from_u32(self.location as u32)));
        StructVal::new(fields)
    }
}

/// Names a function and the interface variables (inputs and outputs) an
/// invocation of it should be bound against.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    pub name: String,
    pub func_id: u32,
    pub interface: Vec<u32>,
}
impl EntryPoint {
    pub fn new(name: String, func_id: u32, interface: Vec<u32>) -> Self {
        EntryPoint {
            name,
            func_id,
            interface,
        }
    }
}
