//! Load phase: a single forward walk over an [`InstList`] that populates a
//! fresh global [`DataView`] with every `Type`, `Variable`, `Function` and
//! `EntryPoint` declaration, per §4.7's "declarations are resolved once,
//! during load; the dispatcher passes over them during execute" split.
use std::collections::HashMap as StdHashMap;

use spirv::Op;

use crate::data::{Data, DataView, Entity, Id};
use crate::error::{InterpError, Result};
use crate::func::{EntryPoint, Function};
use crate::parse::InstList;
use crate::ty::{ArrayType, FunctionType, PointerType, StorageClass, StructMember, StructType, Type};
use crate::value::Value;
use crate::var::Variable;

fn rd_id(ops: &mut crate::parse::Operands, inst_idx: usize) -> Result<Id> {
    ops.read_id().map_err(|e| InterpError::malformed(Some(inst_idx), e.to_string()))
}
fn rd_u32(ops: &mut crate::parse::Operands, inst_idx: usize) -> Result<u32> {
    ops.read_u32().map_err(|e| InterpError::malformed(Some(inst_idx), e.to_string()))
}
fn rd_str<'a>(ops: &mut crate::parse::Operands<'a>, inst_idx: usize) -> Result<&'a str> {
    ops.read_str().map_err(|e| InterpError::malformed(Some(inst_idx), e.to_string()))
}

/// Debug names collected in a pre-pass, since `OpName`/`OpMemberName`
/// precede the declarations they name in a well-formed module.
#[derive(Default)]
struct Names {
    by_id: StdHashMap<Id, String>,
    members: StdHashMap<Id, StdHashMap<u32, String>>,
}

fn collect_names(insts: &InstList) -> Names {
    let mut names = Names::default();
    for idx in 0..insts.len() {
        let instr = match insts.get(idx) {
            Some(i) => i,
            None => continue,
        };
        let mut ops = instr.operands();
        match instr.op() {
            Op::Name => {
                if let (Ok(id), Ok(name)) = (ops.read_id(), ops.read_str()) {
                    names.by_id.insert(id, name.to_string());
                }
            }
            Op::MemberName => {
                if let (Ok(id), Ok(member), Ok(name)) = (ops.read_id(), ops.read_u32(), ops.read_str()) {
                    names.members.entry(id).or_default().insert(member, name.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

/// Walks `insts` once, writing every load-phase declaration into a fresh
/// `DataView` bounded by `bound` (the module's SPIR-V id bound), and
/// returns the entry points declared along the way (also written into the
/// view, keyed by function id, for anyone walking the table directly).
pub fn load_module(insts: &InstList, bound: Id) -> Result<(DataView, Vec<EntryPoint>)> {
    let names = collect_names(insts);
    let mut view = DataView::new_root(bound);
    let mut entry_points = Vec::new();

    let mut idx = 0usize;
    while idx < insts.len() {
        let instr = insts
            .get(idx)
            .ok_or_else(|| InterpError::malformed(Some(idx), "instruction list ended unexpectedly"))?;
        let op = instr.op();
        let mut ops = instr.operands();

        match op {
            Op::TypeVoid => {
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Type(Type::Void)));
            }
            Op::TypeBool => {
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Type(Type::Bool)));
            }
            Op::TypeInt => {
                let id = rd_id(&mut ops, idx)?;
                let bits = rd_u32(&mut ops, idx)?;
                let signed = rd_u32(&mut ops, idx)? != 0;
                let ty = if signed { Type::Int { bits } } else { Type::Uint { bits } };
                view.set(id, Data::owned(Entity::Type(ty)));
            }
            Op::TypeFloat => {
                let id = rd_id(&mut ops, idx)?;
                let bits = rd_u32(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Type(Type::Float { bits })));
            }
            Op::TypePointer => {
                let id = rd_id(&mut ops, idx)?;
                let store_cls: StorageClass = ops
                    .read_enum()
                    .map_err(|e| InterpError::malformed(Some(idx), e.to_string()))?;
                let pointee_id = rd_id(&mut ops, idx)?;
                let pointee_ty = resolve_type(&mut view, pointee_id, idx)?;
                view.set(
                    id,
                    Data::owned(Entity::Type(Type::Pointer(PointerType {
                        pointee_ty: Box::new(pointee_ty),
                        store_cls,
                    }))),
                );
            }
            Op::TypeArray => {
                let id = rd_id(&mut ops, idx)?;
                let element_id = rd_id(&mut ops, idx)?;
                let length_id = rd_id(&mut ops, idx)?;
                let element_ty = resolve_type(&mut view, element_id, idx)?;
                let length = view
                    .at(length_id)?
                    .borrow()
                    .as_value()
                    .and_then(Value::as_u32)
                    .ok_or_else(|| InterpError::shape_mismatch(Some(idx), "array length is not a constant uint"))?;
                view.set(
                    id,
                    Data::owned(Entity::Type(Type::Array(ArrayType {
                        element_ty: Box::new(element_ty),
                        element_count: Some(length),
                    }))),
                );
            }
            Op::TypeRuntimeArray => {
                let id = rd_id(&mut ops, idx)?;
                let element_id = rd_id(&mut ops, idx)?;
                let element_ty = resolve_type(&mut view, element_id, idx)?;
                view.set(
                    id,
                    Data::owned(Entity::Type(Type::Array(ArrayType {
                        element_ty: Box::new(element_ty),
                        element_count: None,
                    }))),
                );
            }
            Op::TypeStruct => {
                let id = rd_id(&mut ops, idx)?;
                let member_names = names.members.get(&id);
                let mut members = Vec::new();
                let mut i = 0u32;
                while let Ok(member_id) = ops.read_id() {
                    let ty = resolve_type(&mut view, member_id, idx)?;
                    let name = member_names.and_then(|m| m.get(&i)).cloned();
                    members.push(StructMember { name, ty });
                    i += 1;
                }
                view.set(
                    id,
                    Data::owned(Entity::Type(Type::Struct(StructType {
                        name: names.by_id.get(&id).cloned(),
                        members,
                    }))),
                );
            }
            Op::TypeFunction => {
                let id = rd_id(&mut ops, idx)?;
                let return_id = rd_id(&mut ops, idx)?;
                let return_ty = resolve_type(&mut view, return_id, idx)?;
                let mut param_tys = Vec::new();
                while let Ok(param_id) = ops.read_id() {
                    param_tys.push(resolve_type(&mut view, param_id, idx)?);
                }
                view.set(
                    id,
                    Data::owned(Entity::Type(Type::Function(FunctionType {
                        ret_ty: Box::new(return_ty),
                        param_tys,
                    }))),
                );
            }
            Op::Constant => {
                let ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                let ty = resolve_type(&mut view, ty_id, idx)?;
                let bits = rd_u32(&mut ops, idx)?;
                let value = match &ty {
                    t if t.is_float() => Value::from_f32(f32::from_bits(bits)),
                    t if t.is_int() => Value::from_i32(bits as i32),
                    _ => Value::from_u32(bits),
                };
                view.set(id, Data::owned(Entity::Value(value)));
            }
            Op::ConstantTrue => {
                let _ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Value(Value::from_bool(true))));
            }
            Op::ConstantFalse => {
                let _ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Value(Value::from_bool(false))));
            }
            Op::ConstantComposite => {
                let ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                let ty = resolve_type(&mut view, ty_id, idx)?;
                let mut elements = Vec::new();
                while let Ok(member_id) = ops.read_id() {
                    let entity = view.at(member_id)?.borrow();
                    let v = entity
                        .as_value()
                        .cloned()
                        .ok_or_else(|| InterpError::shape_mismatch(Some(idx), "composite member is not a constant value"))?;
                    elements.push(v);
                }
                let value = match &ty {
                    Type::Array(a) => Value::array((*a.element_ty).clone(), elements),
                    Type::Struct(s) => {
                        let fields = s
                            .members
                            .iter()
                            .zip(elements)
                            .enumerate()
                            .map(|(i, (m, v))| (m.name.clone().unwrap_or_else(|| i.to_string()), v))
                            .collect();
                        Value::struct_of(ty.clone(), fields)
                    }
                    _ => {
                        return Err(InterpError::unsupported(
                            Some(idx),
                            "ConstantComposite into a non-aggregate type",
                        ))
                    }
                };
                view.set(id, Data::owned(Entity::Value(value)));
            }
            Op::Variable => {
                let ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                let store_cls: StorageClass = ops
                    .read_enum()
                    .map_err(|e| InterpError::malformed(Some(idx), e.to_string()))?;
                let ty = resolve_type(&mut view, ty_id, idx)?;
                let ptr_ty = match ty {
                    Type::Pointer(p) => p,
                    other => {
                        return Err(InterpError::shape_mismatch(
                            Some(idx),
                            format!("OpVariable result type {} is not a Pointer", other),
                        ))
                    }
                };
                let mut var = Variable::new(names.by_id.get(&id).cloned(), ptr_ty, store_cls);
                if let Ok(init_id) = ops.read_id() {
                    let init = view.at(init_id)?.borrow().as_value().cloned();
                    if let Some(init) = init {
                        var.init_value(true);
                        var.set_value(init);
                    }
                }
                view.set(id, Data::owned(Entity::Variable(var)));
            }
            Op::Function => {
                let _ret_ty_id = rd_id(&mut ops, idx)?;
                let id = rd_id(&mut ops, idx)?;
                let _control = rd_u32(&mut ops, idx)?;
                let ty_id = rd_id(&mut ops, idx)?;
                let ty = resolve_type(&mut view, ty_id, idx)?;
                let fn_ty = match ty {
                    Type::Function(f) => f,
                    other => {
                        return Err(InterpError::shape_mismatch(
                            Some(idx),
                            format!("OpFunction type {} is not a Function type", other),
                        ))
                    }
                };
                let location = idx + 1;
                let func = Function::new(names.by_id.get(&id).cloned(), fn_ty, location);
                view.set(id, Data::owned(Entity::Function(func)));
            }
            // A ray query is modeled as an acceleration-structure handle
            // whose traversal is run to completion eagerly rather than
            // stepped shader-side; both opaque handle types share one
            // runtime representation.
            Op::TypeAccelerationStructureKHR | Op::TypeRayQueryKHR => {
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Type(Type::AccelStruct)));
            }
            Op::Label => {
                let id = rd_id(&mut ops, idx)?;
                view.set(id, Data::owned(Entity::Label(idx)));
            }
            Op::EntryPoint => {
                let _exec_model = rd_u32(&mut ops, idx)?;
                let func_id = rd_id(&mut ops, idx)?;
                let name = rd_str(&mut ops, idx)?.to_string();
                let mut interface = Vec::new();
                while let Ok(iface_id) = ops.read_id() {
                    interface.push(iface_id);
                }
                let entry = EntryPoint::new(name, func_id, interface);
                view.set(func_id, Data::owned(Entity::EntryPoint(entry.clone())));
                entry_points.push(entry);
            }
            // Annotations, debug info, capabilities and extension imports
            // carry no runtime meaning for the core; skip silently.
            Op::Decorate
            | Op::MemberDecorate
            | Op::Name
            | Op::MemberName
            | Op::Source
            | Op::SourceExtension
            | Op::Extension
            | Op::ExtInstImport
            | Op::MemoryModel
            | Op::Capability
            | Op::ExecutionMode
            | Op::FunctionEnd => {}
            _ => {}
        }
        idx += 1;
    }

    Ok((view, entry_points))
}

fn resolve_type(view: &mut DataView, id: Id, inst_idx: usize) -> Result<Type> {
    view.at(id)?
        .borrow()
        .as_type()
        .cloned()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), format!("id {} does not name a Type", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::InstructionBuilder;

    fn type_void(id: u32) -> crate::parse::Instruction {
        InstructionBuilder::new(Op::TypeVoid).push(id).build()
    }
    fn type_int(id: u32, bits: u32, signed: bool) -> crate::parse::Instruction {
        InstructionBuilder::new(Op::TypeInt).push(id).push(bits).push(signed as u32).build()
    }
    fn type_ptr(id: u32, store_cls: u32, pointee: u32) -> crate::parse::Instruction {
        InstructionBuilder::new(Op::TypePointer).push(id).push(store_cls).push(pointee).build()
    }

    #[test]
    fn resolves_scalar_and_pointer_types() {
        let list = InstList::new(
            vec![type_void(1), type_int(2, 32, true), type_ptr(3, StorageClass::Function as u32, 2)],
            Vec::new(),
        );
        let (mut view, entries) = load_module(&list, 10).unwrap();
        assert!(entries.is_empty());
        assert!(matches!(view.at(1).unwrap().borrow().as_type(), Some(Type::Void)));
        let ptr = view.at(3).unwrap().borrow().as_type().cloned().unwrap();
        match ptr {
            Type::Pointer(p) => assert!(matches!(*p.pointee_ty, Type::Int { bits: 32 })),
            _ => panic!("expected a pointer type"),
        }
    }
}
