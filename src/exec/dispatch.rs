//! Per-opcode dispatch: reads operands from the id table, computes, writes
//! the result id's slot. Grouped the way the constant-folding evaluator
//! groups its arms, generalised from compile-time constants to live
//! `Value`s read out of a [`DataView`].
use spirv::Op;

use crate::accel::{Ray, RayFlags, StepResult};
use crate::console::WarnSink;
use crate::data::{Data, DataView, Entity, Id};
use crate::error::{InterpError, Result};
use crate::frame::Frame;
use crate::parse::Instr;
use crate::ty::Type;
use crate::value::Value;
use crate::parse::Operands;

/// What the caller (the executor's main loop) should do with `pc` after
/// this opcode ran.
pub enum Control {
    /// Step `pc` by one (the common case).
    Advance,
    /// The opcode already moved `pc` itself (`OpFunctionParameter` via
    /// `Frame::get_arg`, or a branch).
    AlreadySet,
    Branch(usize),
    Call {
        location: usize,
        args: Vec<Value>,
        ret_at: Id,
    },
    Return(Option<Value>),
}


fn rd_id(ops: &mut Operands, inst_idx: usize) -> Result<Id> {
    ops.read_id().map_err(|e| InterpError::malformed(Some(inst_idx), e.to_string()))
}
fn read_value(view: &mut DataView, id: Id, inst_idx: usize) -> Result<Value> {
    let data = view.at(id)?;
    {
        let mut entity = data.borrow_mut();
        if let Some(v) = entity.as_value_mut() {
            // This executor runs one invocation per `Invocation`, so a
            // cooperative matrix's whole `rows*cols` share belongs to it —
            // same single-invocation degenerate case `OpControlBarrier`
            // already assumes below.
            v.enforce_coop_matrix_sizes(0, 1);
        }
    }
    let entity = data.borrow();
    entity
        .as_value()
        .cloned()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), format!("id {} is not a value", id)))
}

fn write_value(view: &mut DataView, id: Id, value: Value) {
    view.set(id, Data::owned(Entity::Value(value)));
}

/// Resolves an `OpLabel` result id to the instruction index it names. Branch
/// targets are ids, not raw offsets — they're only guaranteed stable
/// relative to each other via the id table, never via their numeric value.
fn resolve_label(view: &mut DataView, id: Id, inst_idx: usize) -> Result<usize> {
    view.at(id)?
        .borrow()
        .as_label()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), format!("id {} does not name a Label", id)))
}

fn read_u32_operand(view: &mut DataView, id: Id, inst_idx: usize) -> Result<u32> {
    read_value(view, id, inst_idx)?
        .as_u32()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a scalar operand"))
}

/// Binary arithmetic/bitwise/comparison ops all share this shape: read two
/// operand ids, compute per result type, write the result id.
fn binary_numeric(
    view: &mut DataView,
    instr: &Instr,
    inst_idx: usize,
    f: impl Fn(&Value, &Value, &Type) -> Result<Value>,
) -> Result<Control> {
    let mut ops = instr.operands();
    let result_ty_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result type"))?;
    let result_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result id"))?;
    let a_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing operand 1"))?;
    let b_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing operand 2"))?;

    let result_ty = view
        .at(result_ty_id)?
        .borrow()
        .as_type()
        .cloned()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "result type id does not name a Type"))?;
    let a = read_value(view, a_id, inst_idx)?;
    let b = read_value(view, b_id, inst_idx)?;
    let result = f(&a, &b, &result_ty)?;
    write_value(view, result_id, result);
    Ok(Control::Advance)
}

/// `OpIAddCarry`-shaped ops: two operands in, a two-member struct out (the
/// arithmetic result and a carry/borrow/high-word), per each opcode's
/// defined result type.
fn extended_pair(
    view: &mut DataView,
    instr: &Instr,
    inst_idx: usize,
    f: impl Fn(&Value, &Value) -> Result<(Value, Value)>,
) -> Result<Control> {
    let mut ops = instr.operands();
    let result_ty_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result type"))?;
    let result_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result id"))?;
    let a_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing operand 1"))?;
    let b_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing operand 2"))?;

    let result_ty = view
        .at(result_ty_id)?
        .borrow()
        .as_type()
        .cloned()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "result type id does not name a Type"))?;
    let struct_ty = match &result_ty {
        Type::Struct(s) if s.members.len() == 2 => s.clone(),
        _ => {
            return Err(InterpError::shape_mismatch(
                Some(inst_idx),
                "extended-arithmetic result type must be a 2-member struct",
            ))
        }
    };
    let a = read_value(view, a_id, inst_idx)?;
    let b = read_value(view, b_id, inst_idx)?;
    let (lo, hi) = f(&a, &b)?;
    let fields = vec![
        (struct_ty.members[0].name.clone().unwrap_or_else(|| "0".to_string()), lo),
        (struct_ty.members[1].name.clone().unwrap_or_else(|| "1".to_string()), hi),
    ];
    write_value(view, result_id, Value::struct_of(result_ty, fields));
    Ok(Control::Advance)
}

fn unary_numeric(
    view: &mut DataView,
    instr: &Instr,
    inst_idx: usize,
    f: impl Fn(&Value, &Type) -> Result<Value>,
) -> Result<Control> {
    let mut ops = instr.operands();
    let result_ty_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result type"))?;
    let result_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing result id"))?;
    let a_id = ops.read_id().map_err(|_| InterpError::malformed(Some(inst_idx), "missing operand"))?;

    let result_ty = view
        .at(result_ty_id)?
        .borrow()
        .as_type()
        .cloned()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "result type id does not name a Type"))?;
    let a = read_value(view, a_id, inst_idx)?;
    let result = f(&a, &result_ty)?;
    write_value(view, result_id, result);
    Ok(Control::Advance)
}

/// Reads both operands' raw 32-bit storage. `PrimitiveWord` never encodes
/// signedness itself, so this is the only read needed for bitwise ops and
/// operations that are sign-agnostic mod 2^32 (add/sub/mul); ops that care
/// about signedness (div/rem/shift-right/compare) reinterpret the bits
/// themselves rather than calling this twice.
fn bits_pair(a: &Value, b: &Value, inst_idx: usize) -> Result<(u32, u32)> {
    match (a.as_u32(), b.as_u32()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(InterpError::shape_mismatch(Some(inst_idx), "expected integer operands")),
    }
}

fn signed_pair(a: &Value, b: &Value, inst_idx: usize) -> Result<(i32, i32)> {
    let (x, y) = bits_pair(a, b, inst_idx)?;
    Ok((x as i32, y as i32))
}

fn bool_result(b: bool) -> Value {
    Value::from_bool(b)
}

/// Reinterprets `bits` as the result type's signedness; never changes the
/// bit pattern, only how it is displayed/compared downstream.
fn wrap_int(result_ty: &Type, bits: u32) -> Value {
    if result_ty.is_int() {
        Value::from_i32(bits as i32)
    } else {
        Value::from_u32(bits)
    }
}

/// Runs one instruction against `view`/`frame`. `inst_idx` is the frame's
/// `pc` before this call, used for error reporting.
pub fn execute_one(
    instr: &Instr,
    view: &mut DataView,
    frame: &mut Frame,
    inst_idx: usize,
    warn: &dyn WarnSink,
) -> Result<Control> {
    let op = instr.op();
    match op {
        Op::Nop | Op::Line | Op::NoLine | Op::SelectionMerge | Op::LoopMerge => Ok(Control::Advance),
        Op::Label => {
            let mut ops = instr.operands();
            let id = rd_id(&mut ops, inst_idx)?;
            frame.enter_block(id);
            Ok(Control::Advance)
        }
        Op::Phi => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let prev = frame.prev_block();
            let mut chosen = None;
            while let (Ok(value_id), Ok(parent_id)) = (ops.read_id(), ops.read_id()) {
                if Some(parent_id) == prev {
                    chosen = Some(value_id);
                }
            }
            let value_id = chosen.ok_or_else(|| {
                InterpError::shape_mismatch(Some(inst_idx), "OpPhi has no incoming value for the block branched from")
            })?;
            let value = read_value(view, value_id, inst_idx)?;
            write_value(view, result_id, value);
            Ok(Control::Advance)
        }

        // --- Arithmetic -------------------------------------------------
        Op::IAdd => binary_numeric(view, instr, inst_idx, |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x.wrapping_add(y)))
        }),
        Op::ISub => binary_numeric(view, instr, inst_idx, |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x.wrapping_sub(y)))
        }),
        Op::IMul => binary_numeric(view, instr, inst_idx, |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x.wrapping_mul(y)))
        }),
        Op::UDiv => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            if y == 0 {
                return Err(InterpError::shape_mismatch(Some(inst_idx), "division by zero"));
            }
            Ok(wrap_int(ty, x / y))
        }),
        Op::SDiv => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            if y == 0 {
                return Err(InterpError::shape_mismatch(Some(inst_idx), "division by zero"));
            }
            Ok(wrap_int(ty, x.wrapping_div(y) as u32))
        }),
        Op::UMod => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            if y == 0 {
                return Err(InterpError::shape_mismatch(Some(inst_idx), "division by zero"));
            }
            Ok(wrap_int(ty, x % y))
        }),
        Op::SRem => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            if y == 0 {
                return Err(InterpError::shape_mismatch(Some(inst_idx), "division by zero"));
            }
            Ok(wrap_int(ty, x.wrapping_rem(y) as u32))
        }),
        Op::SMod => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            if y == 0 {
                return Err(InterpError::shape_mismatch(Some(inst_idx), "division by zero"));
            }
            let r = x.wrapping_rem(y);
            let r = if r != 0 && (r < 0) != (y < 0) { r.wrapping_add(y) } else { r };
            Ok(wrap_int(ty, r as u32))
        }),
        Op::SNegate => unary_numeric(view, instr, inst_idx, move |a, ty| {
            let x = a
                .as_u32()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected an integer"))?;
            Ok(wrap_int(ty, (x as i32).wrapping_neg() as u32))
        }),
        Op::FAdd => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x + y))
        }),
        Op::FSub => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x - y))
        }),
        Op::FMul => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x * y))
        }),
        Op::FDiv => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x / y))
        }),
        Op::FRem => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x % y))
        }),
        Op::FMod => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| Value::from_f32(x.rem_euclid(y)))
        }),
        Op::FNegate => unary_numeric(view, instr, inst_idx, move |a, _| {
            let x = a
                .as_f32()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float"))?;
            Ok(Value::from_f32(-x))
        }),

        // --- Bitwise ------------------------------------------------------
        Op::ShiftRightLogical => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (base, shift) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, base >> (shift & 31)))
        }),
        Op::ShiftRightArithmetic => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (base, shift) = signed_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, (base >> (shift & 31)) as u32))
        }),
        Op::ShiftLeftLogical => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (base, shift) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, base << (shift & 31)))
        }),
        Op::BitwiseOr => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x | y))
        }),
        Op::BitwiseXor => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x ^ y))
        }),
        Op::BitwiseAnd => binary_numeric(view, instr, inst_idx, move |a, b, ty| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(wrap_int(ty, x & y))
        }),
        Op::Not => unary_numeric(view, instr, inst_idx, move |a, ty| {
            let x = a.as_u32().ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected an integer"))?;
            Ok(wrap_int(ty, !x))
        }),

        // --- Logical --------------------------------------------------
        Op::LogicalAnd => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            Ok(bool_result(read_bool(a, inst_idx)? && read_bool(b, inst_idx)?))
        }),
        Op::LogicalOr => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            Ok(bool_result(read_bool(a, inst_idx)? || read_bool(b, inst_idx)?))
        }),
        Op::LogicalEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            Ok(bool_result(read_bool(a, inst_idx)? == read_bool(b, inst_idx)?))
        }),
        Op::LogicalNotEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            Ok(bool_result(read_bool(a, inst_idx)? != read_bool(b, inst_idx)?))
        }),
        Op::LogicalNot => unary_numeric(view, instr, inst_idx, move |a, _| {
            Ok(bool_result(!read_bool(a, inst_idx)?))
        }),

        // --- Comparison -------------------------------------------------
        Op::IEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x == y))
        }),
        Op::INotEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x != y))
        }),
        Op::UGreaterThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x > y))
        }),
        Op::SGreaterThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            Ok(bool_result(x > y))
        }),
        Op::UGreaterThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x >= y))
        }),
        Op::SGreaterThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            Ok(bool_result(x >= y))
        }),
        Op::ULessThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x < y))
        }),
        Op::SLessThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            Ok(bool_result(x < y))
        }),
        Op::ULessThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            Ok(bool_result(x <= y))
        }),
        Op::SLessThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            Ok(bool_result(x <= y))
        }),
        Op::FOrdEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x == y))
        }),
        Op::FOrdNotEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x != y))
        }),
        Op::FOrdLessThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x < y))
        }),
        Op::FOrdGreaterThan => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x > y))
        }),
        Op::FOrdLessThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x <= y))
        }),
        Op::FOrdGreaterThanEqual => binary_numeric(view, instr, inst_idx, move |a, b, _| {
            float_pair(a, b, inst_idx).map(|(x, y)| bool_result(x >= y))
        }),

        // --- Conversions --------------------------------------------------
        Op::ConvertSToF => unary_numeric(view, instr, inst_idx, move |a, _| {
            let x = a.as_i32().ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected an int"))?;
            Ok(Value::from_f32(x as f32))
        }),
        Op::ConvertUToF => unary_numeric(view, instr, inst_idx, move |a, _| {
            let x = a.as_u32().ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a uint"))?;
            Ok(Value::from_f32(x as f32))
        }),
        Op::ConvertFToS => unary_numeric(view, instr, inst_idx, move |a, _| {
            let x = a.as_f32().ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float"))?;
            Ok(Value::from_i32(x as i32))
        }),
        Op::ConvertFToU => unary_numeric(view, instr, inst_idx, move |a, _| {
            let x = a.as_f32().ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float"))?;
            Ok(Value::from_u32(x as u32))
        }),
        Op::Bitcast => unary_numeric(view, instr, inst_idx, move |a, ty| {
            let bits = read_bits(a, inst_idx)?;
            Ok(match ty {
                t if t.is_float() => Value::from_f32(f32::from_bits(bits)),
                t if t.is_int() => Value::from_i32(bits as i32),
                _ => Value::from_u32(bits),
            })
        }),
        Op::FConvert | Op::SConvert | Op::UConvert => unary_numeric(view, instr, inst_idx, move |a, ty| {
            let mut v = Value::construct(ty, false);
            v.copy_reinterp(a, Some(inst_idx))?;
            Ok(v)
        }),

        // --- Memory -------------------------------------------------------
        Op::Load => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let pointer_id = rd_id(&mut ops, inst_idx)?;
            let value = read_value(view, pointer_id, inst_idx)?;
            write_value(view, result_id, value);
            Ok(Control::Advance)
        }
        Op::Store => {
            let mut ops = instr.operands();
            let pointer_id = rd_id(&mut ops, inst_idx)?;
            let object_id = rd_id(&mut ops, inst_idx)?;
            let object = read_value(view, object_id, inst_idx)?;
            let dst = view.at(pointer_id)?;
            let mut entity = dst.borrow_mut();
            match entity.as_variable_mut() {
                Some(var) => {
                    var.init_value(true);
                    let pointee = var.value_mut().unwrap();
                    pointee.copy_from(&object, Some(inst_idx))?;
                }
                None => match entity.as_value_mut() {
                    Some(v) => v.copy_from(&object, Some(inst_idx))?,
                    None => {
                        return Err(InterpError::shape_mismatch(
                            Some(inst_idx),
                            "OpStore target is neither a Variable nor a Value",
                        ))
                    }
                },
            }
            Ok(Control::Advance)
        }
        Op::AccessChain | Op::InBoundsAccessChain => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let base_id = rd_id(&mut ops, inst_idx)?;
            let mut value = read_value(view, base_id, inst_idx)?;
            while let Ok(index_id) = ops.read_id() {
                let index = read_u32_operand(view, index_id, inst_idx)? as usize;
                value = match value.as_array() {
                    Some(a) => a
                        .elements
                        .get(index)
                        .cloned()
                        .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "array index out of range"))?,
                    None => match value.as_struct() {
                        Some(s) => s
                            .fields
                            .get(index)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "field index out of range"))?,
                        None => {
                            return Err(InterpError::shape_mismatch(
                                Some(inst_idx),
                                "access chain indexed into a non-aggregate value",
                            ))
                        }
                    },
                };
            }
            write_value(view, result_id, value);
            Ok(Control::Advance)
        }

        // --- Composite ------------------------------------------------
        Op::CompositeExtract => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let composite_id = rd_id(&mut ops, inst_idx)?;
            let mut value = read_value(view, composite_id, inst_idx)?;
            while let Ok(index) = ops.read_u32() {
                value = extract_index(&value, index as usize, inst_idx)?;
            }
            write_value(view, result_id, value);
            Ok(Control::Advance)
        }
        Op::CompositeInsert => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let object_id = rd_id(&mut ops, inst_idx)?;
            let composite_id = rd_id(&mut ops, inst_idx)?;
            let object = read_value(view, object_id, inst_idx)?;
            let mut composite = read_value(view, composite_id, inst_idx)?;
            let indices: Vec<u32> = std::iter::from_fn(|| ops.read_u32().ok()).collect();
            insert_at(&mut composite, &indices, object, inst_idx)?;
            write_value(view, result_id, composite);
            Ok(Control::Advance)
        }
        Op::CompositeConstruct => {
            let mut ops = instr.operands();
            let result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let result_ty = view
                .at(result_ty_id)?
                .borrow()
                .as_type()
                .cloned()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "result type id does not name a Type"))?;
            let mut elements = Vec::new();
            while let Ok(id) = ops.read_id() {
                elements.push(read_value(view, id, inst_idx)?);
            }
            let value = match &result_ty {
                Type::Array(a) => Value::array((*a.element_ty).clone(), elements),
                Type::Struct(s) => {
                    let fields = s
                        .members
                        .iter()
                        .zip(elements)
                        .enumerate()
                        .map(|(i, (m, v))| (m.name.clone().unwrap_or_else(|| i.to_string()), v))
                        .collect();
                    Value::struct_of(result_ty.clone(), fields)
                }
                _ => {
                    return Err(InterpError::unsupported(
                        Some(inst_idx),
                        format!("CompositeConstruct into {} is not supported", result_ty),
                    ))
                }
            };
            write_value(view, result_id, value);
            Ok(Control::Advance)
        }

        // --- Extended-precision arithmetic --------------------------------
        // Each of these produces a two-member struct { result, carry/borrow }
        // over the base scalar type, per SPIR-V's defined result shape.
        Op::IAddCarry => extended_pair(view, instr, inst_idx, |a, b| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            let (result, carry) = crate::value::primitive::u_add_carry(x, y);
            Ok((Value::from_u32(result), Value::from_u32(carry)))
        }),
        Op::ISubBorrow => extended_pair(view, instr, inst_idx, |a, b| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            let (result, borrow) = crate::value::primitive::u_sub_borrow(x, y);
            Ok((Value::from_u32(result), Value::from_u32(borrow)))
        }),
        Op::UMulExtended => extended_pair(view, instr, inst_idx, |a, b| {
            let (x, y) = bits_pair(a, b, inst_idx)?;
            let (lo, hi) = crate::value::primitive::u_mul_extended(x, y);
            Ok((Value::from_u32(lo), Value::from_u32(hi)))
        }),
        Op::SMulExtended => extended_pair(view, instr, inst_idx, |a, b| {
            let (x, y) = signed_pair(a, b, inst_idx)?;
            let (lo, hi) = crate::value::primitive::s_mul_extended(x, y);
            Ok((Value::from_u32(lo), Value::from_i32(hi)))
        }),

        // --- Memory (bulk) -------------------------------------------------
        Op::CopyMemory => {
            let mut ops = instr.operands();
            let target_id = rd_id(&mut ops, inst_idx)?;
            let source_id = rd_id(&mut ops, inst_idx)?;
            let source = read_value(view, source_id, inst_idx)?;
            let dst = view.at(target_id)?;
            let mut entity = dst.borrow_mut();
            match entity.as_variable_mut() {
                Some(var) => {
                    var.init_value(true);
                    var.value_mut().unwrap().copy_from(&source, Some(inst_idx))?;
                }
                None => match entity.as_value_mut() {
                    Some(v) => v.copy_from(&source, Some(inst_idx))?,
                    None => {
                        return Err(InterpError::shape_mismatch(
                            Some(inst_idx),
                            "OpCopyMemory target is neither a Variable nor a Value",
                        ))
                    }
                },
            }
            Ok(Control::Advance)
        }

        // --- Synchronization ------------------------------------------------
        // This core runs one invocation at a time cooperatively; barriers
        // have nothing else to synchronize against, so they're observed and
        // skipped rather than acted on.
        Op::ControlBarrier => {
            warn.warn("OpControlBarrier is a no-op outside a multi-invocation workgroup");
            Ok(Control::Advance)
        }
        Op::MemoryBarrier => {
            warn.warn("OpMemoryBarrier is a no-op outside a multi-invocation workgroup");
            Ok(Control::Advance)
        }

        // --- Images ---------------------------------------------------------
        Op::ImageRead => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let image_id = rd_id(&mut ops, inst_idx)?;
            let coord_id = rd_id(&mut ops, inst_idx)?;
            let image = read_value(view, image_id, inst_idx)?;
            let img = image
                .as_image()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "OpImageRead operand is not an Image"))?;
            let coord = read_value(view, coord_id, inst_idx)?;
            let coord = coord
                .as_array()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image coordinate is not a vector"))?;
            let [x, y, z] = int_coords(coord, inst_idx)?;
            let texel = img.read(x, y, z);
            write_value(view, result_id, Value::array(Type::uint32(), texel.elements));
            Ok(Control::Advance)
        }
        Op::ImageWrite => {
            let mut ops = instr.operands();
            let image_id = rd_id(&mut ops, inst_idx)?;
            let coord_id = rd_id(&mut ops, inst_idx)?;
            let texel_id = rd_id(&mut ops, inst_idx)?;
            let coord = read_value(view, coord_id, inst_idx)?;
            let coord = coord
                .as_array()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image coordinate is not a vector"))?;
            let [x, y, z] = int_coords(coord, inst_idx)?;
            let texel = read_value(view, texel_id, inst_idx)?;
            let texel = texel
                .as_array()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image texel is not a vector"))?
                .clone();
            let data = view.at(image_id)?;
            let mut entity = data.borrow_mut();
            let img = entity
                .as_value_mut()
                .and_then(Value::as_image_mut)
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "OpImageWrite operand is not an Image"))?;
            if !img.write(x, y, z, &texel) {
                warn.warn("OpImageWrite coordinate was out of bounds, write dropped");
            }
            Ok(Control::Advance)
        }
        Op::ImageFetch => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let image_id = rd_id(&mut ops, inst_idx)?;
            let coord_id = rd_id(&mut ops, inst_idx)?;
            let sampled = read_value(view, image_id, inst_idx)?;
            let img = sampled
                .as_image()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "OpImageFetch operand is not an Image"))?;
            let coord = read_value(view, coord_id, inst_idx)?;
            let coord = coord
                .as_array()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image coordinate is not a vector"))?;
            let [x, y, z] = int_coords(coord, inst_idx)?;
            let texel = img.read(x, y, z);
            write_value(view, result_id, Value::array(Type::uint32(), texel.elements));
            Ok(Control::Advance)
        }
        Op::ImageSampleImplicitLod | Op::ImageSampleExplicitLod => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let sampled_image_id = rd_id(&mut ops, inst_idx)?;
            let coord_id = rd_id(&mut ops, inst_idx)?;
            let sampled_image = read_value(view, sampled_image_id, inst_idx)?;
            let si = sampled_image.as_sampled_image().ok_or_else(|| {
                InterpError::shape_mismatch(Some(inst_idx), "OpImageSample operand is not a SampledImage")
            })?;
            let coord = read_value(view, coord_id, inst_idx)?;
            let coord = coord
                .as_array()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image coordinate is not a vector"))?;
            let texels = crate::value::image::ImageVal::extract_coords(coord, false);
            let [w, h] = [si.image.extent[0] as f32, si.image.extent[1] as f32];
            let x = (texels.first().copied().unwrap_or(0.0) * w) as u32;
            let y = (texels.get(1).copied().unwrap_or(0.0) * h) as u32;
            let texel = si.image.read(x.min(si.image.extent[0].saturating_sub(1)), y.min(si.image.extent[1].saturating_sub(1)), 0);
            write_value(view, result_id, Value::array(Type::float32(), texel.elements));
            Ok(Control::Advance)
        }

        // --- Control flow -----------------------------------------------
        Op::Branch => {
            let mut ops = instr.operands();
            let target_id = rd_id(&mut ops, inst_idx)?;
            Ok(Control::Branch(resolve_label(view, target_id, inst_idx)?))
        }
        Op::BranchConditional => {
            let mut ops = instr.operands();
            let cond_id = rd_id(&mut ops, inst_idx)?;
            let true_label_id = rd_id(&mut ops, inst_idx)?;
            let false_label_id = rd_id(&mut ops, inst_idx)?;
            let cond = read_value(view, cond_id, inst_idx)?
                .as_bool()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "branch condition is not a bool"))?;
            let target_id = if cond { true_label_id } else { false_label_id };
            Ok(Control::Branch(resolve_label(view, target_id, inst_idx)?))
        }
        Op::FunctionParameter => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let value = frame.get_arg(inst_idx)?.clone();
            write_value(view, result_id, value);
            Ok(Control::AlreadySet)
        }
        Op::FunctionCall => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let function_id = rd_id(&mut ops, inst_idx)?;
            let location = view
                .at(function_id)?
                .borrow()
                .as_function()
                .map(|f| f.location)
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "call target is not a Function"))?;
            let mut args = Vec::new();
            while let Ok(id) = ops.read_id() {
                args.push(read_value(view, id, inst_idx)?);
            }
            Ok(Control::Call { location, args, ret_at: result_id })
        }
        Op::Return => Ok(Control::Return(None)),
        Op::ReturnValue => {
            let mut ops = instr.operands();
            let value_id = rd_id(&mut ops, inst_idx)?;
            let value = read_value(view, value_id, inst_idx)?;
            Ok(Control::Return(Some(value)))
        }
        Op::Kill | Op::Unreachable | Op::Terminate => Ok(Control::Return(None)),

        // --- Ray tracing --------------------------------------------------
        Op::TraceRayKHR => {
            let mut ops = instr.operands();
            let accel_id = rd_id(&mut ops, inst_idx)?;
            let flags_id = rd_id(&mut ops, inst_idx)?;
            let flags = read_u32_operand(view, flags_id, inst_idx)?;
            // Skip the cull-mask / sbt-offset / sbt-stride / miss-index
            // operands; this core models traversal, not shader-table
            // indexing.
            for _ in 0..4 {
                let _ = ops.read_id();
            }
            let origin = read_vec3(view, &mut ops, inst_idx)?;
            let t_min = {
                let id = rd_id(&mut ops, inst_idx)?;
                read_value(view, id, inst_idx)?
                    .as_f32()
                    .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float t_min"))?
            };
            let direction = read_vec3(view, &mut ops, inst_idx)?;
            let t_max = {
                let id = rd_id(&mut ops, inst_idx)?;
                read_value(view, id, inst_idx)?
                    .as_f32()
                    .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float t_max"))?
            };
            let payload_id = ops.read_id().ok();

            let data = view.at(accel_id)?;
            let mut entity = data.borrow_mut();
            let accel = entity
                .as_value_mut()
                .and_then(Value::as_accel_struct_mut)
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "operand is not an AccelStruct"))?;
            accel.begin_trace(RayFlags(flags));
            let ray = Ray { origin, direction, t_min, t_max };
            let result = accel.trace.trace_ray(&accel.pool, &ray, false);
            drop(entity);

            if let Some(payload_id) = payload_id {
                let hit = matches!(result, StepResult::Yes);
                write_value(view, payload_id, Value::from_bool(hit));
            } else {
                warn.warn("OpTraceRayKHR had no payload operand to write a hit flag into");
            }
            Ok(Control::Advance)
        }

        // A ray query is run to completion eagerly at `Initialize`, the same
        // way `OpTraceRayKHR` resolves its whole traversal in one dispatch
        // step rather than stepping per shader-driven candidate; `Proceed`
        // just reports whether that eager traversal produced a commit.
        Op::RayQueryInitializeKHR => {
            let mut ops = instr.operands();
            let query_ptr_id = rd_id(&mut ops, inst_idx)?;
            let accel_id = rd_id(&mut ops, inst_idx)?;
            let flags_id = rd_id(&mut ops, inst_idx)?;
            let flags = read_u32_operand(view, flags_id, inst_idx)?;
            let _cull_mask_id = rd_id(&mut ops, inst_idx)?;
            let origin = read_vec3(view, &mut ops, inst_idx)?;
            let t_min = {
                let id = rd_id(&mut ops, inst_idx)?;
                read_value(view, id, inst_idx)?
                    .as_f32()
                    .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float t_min"))?
            };
            let direction = read_vec3(view, &mut ops, inst_idx)?;
            let t_max = {
                let id = rd_id(&mut ops, inst_idx)?;
                read_value(view, id, inst_idx)?
                    .as_f32()
                    .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a float t_max"))?
            };

            let mut accel = read_value(view, accel_id, inst_idx)?
                .as_accel_struct()
                .cloned()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "operand is not an AccelStruct"))?;
            accel.begin_trace(RayFlags(flags));
            let ray = Ray { origin, direction, t_min, t_max };
            accel.trace.trace_ray(&accel.pool, &ray, false);

            let dst = view.at(query_ptr_id)?;
            let mut entity = dst.borrow_mut();
            match entity.as_variable_mut() {
                Some(var) => {
                    var.init_value(true);
                    var.set_value(Value::accel_struct(accel));
                }
                None => {
                    return Err(InterpError::shape_mismatch(
                        Some(inst_idx),
                        "OpRayQueryInitializeKHR target is not a Variable",
                    ))
                }
            }
            Ok(Control::Advance)
        }
        Op::RayQueryProceedKHR => {
            let mut ops = instr.operands();
            let _result_ty_id = rd_id(&mut ops, inst_idx)?;
            let result_id = rd_id(&mut ops, inst_idx)?;
            let query_ptr_id = rd_id(&mut ops, inst_idx)?;
            let accel = read_value(view, query_ptr_id, inst_idx)?;
            let has_commit = accel
                .as_accel_struct()
                .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "operand is not an AccelStruct"))?
                .trace
                .committed
                .is_some();
            write_value(view, result_id, Value::from_bool(has_commit));
            Ok(Control::Advance)
        }

        // --- Declarations handled during load -----------------------------
        Op::Variable | Op::Function | Op::FunctionEnd | Op::TypeVoid | Op::TypeBool | Op::TypeInt
        | Op::TypeFloat | Op::TypePointer | Op::TypeArray | Op::TypeRuntimeArray | Op::TypeStruct
        | Op::TypeFunction | Op::Constant | Op::ConstantTrue | Op::ConstantFalse | Op::ConstantComposite
        | Op::EntryPoint | Op::ExecutionMode | Op::Capability | Op::ExtInstImport | Op::MemoryModel
        | Op::Decorate | Op::MemberDecorate | Op::Name | Op::MemberName | Op::Source
        | Op::SourceExtension | Op::Extension | Op::TypeAccelerationStructureKHR
        | Op::TypeRayQueryKHR => Ok(Control::Advance),

        other => Err(InterpError::unsupported(Some(inst_idx), format!("opcode {:?} is not implemented", other))),
    }
}

fn float_pair(a: &Value, b: &Value, inst_idx: usize) -> Result<(f32, f32)> {
    match (a.as_f32(), b.as_f32()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(InterpError::shape_mismatch(Some(inst_idx), "expected float operands")),
    }
}
fn read_bits(a: &Value, inst_idx: usize) -> Result<u32> {
    a.as_u32()
        .or_else(|| a.as_i32().map(|x| x as u32))
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected an integer operand"))
}
fn read_bool(a: &Value, inst_idx: usize) -> Result<bool> {
    a.as_bool()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a bool operand"))
}

fn extract_index(value: &Value, index: usize, inst_idx: usize) -> Result<Value> {
    if let Some(a) = value.as_array() {
        return a
            .elements
            .get(index)
            .cloned()
            .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "array index out of range"));
    }
    if let Some(s) = value.as_struct() {
        return s
            .fields
            .get(index)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "field index out of range"));
    }
    Err(InterpError::shape_mismatch(Some(inst_idx), "cannot extract from a non-aggregate value"))
}

fn insert_at(composite: &mut Value, indices: &[u32], object: Value, inst_idx: usize) -> Result<()> {
    let (head, rest) = match indices.split_first() {
        Some(x) => x,
        None => {
            *composite = object;
            return Ok(());
        }
    };
    let head = *head as usize;
    if let Some(a) = composite.as_array_mut() {
        let slot = a
            .elements
            .get_mut(head)
            .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "array index out of range"))?;
        return insert_at(slot, rest, object, inst_idx);
    }
    if let Some(s) = composite.as_struct_mut() {
        let slot = s
            .fields
            .get_mut(head)
            .map(|(_, v)| v)
            .ok_or_else(|| InterpError::out_of_bounds(Some(inst_idx), "field index out of range"))?;
        return insert_at(slot, rest, object, inst_idx);
    }
    Err(InterpError::shape_mismatch(Some(inst_idx), "cannot insert into a non-aggregate value"))
}

/// Integer coordinates for `OpImageRead`/`OpImageWrite`/`OpImageFetch`,
/// padding unused trailing axes with 0.
fn int_coords(coord: &crate::value::ArrayVal, inst_idx: usize) -> Result<[u32; 3]> {
    let mut out = [0u32; 3];
    for (o, e) in out.iter_mut().zip(coord.elements.iter()) {
        *o = e
            .as_u32()
            .or_else(|| e.as_i32().map(|x| x as u32))
            .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "image coordinate component is not an integer"))?;
    }
    Ok(out)
}

fn read_vec3(view: &mut DataView, ops: &mut Operands, inst_idx: usize) -> Result<[f32; 3]> {
    let id = rd_id(ops, inst_idx)?;
    let v = read_value(view, id, inst_idx)?;
    let a = v
        .as_array()
        .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "expected a 3-component vector"))?;
    if a.elements.len() != 3 {
        return Err(InterpError::shape_mismatch(Some(inst_idx), "expected a 3-component vector"));
    }
    let mut out = [0.0f32; 3];
    for (o, e) in out.iter_mut().zip(a.elements.iter()) {
        *o = e
            .as_f32()
            .ok_or_else(|| InterpError::shape_mismatch(Some(inst_idx), "vector component is not a float"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::InstructionBuilder;
    use crate::ty::{StructMember, StructType};

    fn view(bound: Id) -> DataView {
        DataView::new_root(bound)
    }

    #[test]
    fn branch_resolves_through_the_label_id_not_the_raw_operand() {
        // Label id 9 names instruction index 4, nowhere near its own id.
        let mut v = view(16);
        v.set(9, Data::owned(Entity::Label(4)));
        let instr = InstructionBuilder::new(Op::Branch).push(9).build();
        let mut frame = Frame::new(0, vec![], 0);
        let warn = crate::console::NullWarnSink;
        let control = execute_one(&instr, &mut v, &mut frame, 0, &warn).unwrap();
        assert!(matches!(control, Control::Branch(4)));
    }

    #[test]
    fn branch_conditional_picks_the_true_label_when_condition_holds() {
        let mut v = view(16);
        v.set(1, Data::owned(Entity::Value(Value::from_bool(true))));
        v.set(10, Data::owned(Entity::Label(20)));
        v.set(11, Data::owned(Entity::Label(30)));
        let instr = InstructionBuilder::new(Op::BranchConditional).push(1).push(10).push(11).build();
        let mut frame = Frame::new(0, vec![], 0);
        let warn = crate::console::NullWarnSink;
        let control = execute_one(&instr, &mut v, &mut frame, 0, &warn).unwrap();
        assert!(matches!(control, Control::Branch(20)));
    }

    #[test]
    fn phi_picks_the_value_whose_parent_matches_the_block_branched_from() {
        let mut v = view(16);
        v.set(5, Data::owned(Entity::Value(Value::from_u32(111))));
        v.set(6, Data::owned(Entity::Value(Value::from_u32(222))));
        let instr = InstructionBuilder::new(Op::Phi)
            .push(100) // result type (unused by Phi itself)
            .push(3) // result id
            .push(5) // value from block 40
            .push(40)
            .push(6) // value from block 50
            .push(50)
            .build();
        let mut frame = Frame::new(0, vec![], 0);
        frame.enter_block(40); // cur_block=40, prev_block=None
        frame.enter_block(50); // cur_block=50, prev_block=40
        let warn = crate::console::NullWarnSink;
        execute_one(&instr, &mut v, &mut frame, 0, &warn).unwrap();
        let result = v.at(3).unwrap().borrow().as_value().unwrap().as_u32().unwrap();
        assert_eq!(result, 111);
    }

    #[test]
    fn i_add_carry_reports_overflow_in_the_second_member() {
        let mut v = view(16);
        let struct_ty = Type::Struct(StructType {
            name: None,
            members: vec![
                StructMember { name: None, ty: Type::uint32() },
                StructMember { name: None, ty: Type::uint32() },
            ],
        });
        v.set(100, Data::owned(Entity::Type(struct_ty)));
        v.set(1, Data::owned(Entity::Value(Value::from_u32(u32::MAX))));
        v.set(2, Data::owned(Entity::Value(Value::from_u32(1))));
        let instr = InstructionBuilder::new(Op::IAddCarry).push(100).push(3).push(1).push(2).build();
        let mut frame = Frame::new(0, vec![], 0);
        let warn = crate::console::NullWarnSink;
        execute_one(&instr, &mut v, &mut frame, 0, &warn).unwrap();
        let result = v.at(3).unwrap().borrow().as_value().unwrap().as_struct().unwrap().fields.clone();
        assert_eq!(result[0].1.as_u32().unwrap(), 0);
        assert_eq!(result[1].1.as_u32().unwrap(), 1);
    }

    #[test]
    fn copy_memory_copies_into_a_variable_target() {
        let mut v = view(16);
        let var = crate::var::Variable::new(
            None,
            crate::ty::PointerType { pointee_ty: Box::new(Type::uint32()), store_cls: crate::ty::StorageClass::Function },
            crate::ty::StorageClass::Function,
        );
        v.set(1, Data::owned(Entity::Variable(var)));
        v.set(2, Data::owned(Entity::Value(Value::from_u32(42))));
        let instr = InstructionBuilder::new(Op::CopyMemory).push(1).push(2).build();
        let mut frame = Frame::new(0, vec![], 0);
        let warn = crate::console::NullWarnSink;
        execute_one(&instr, &mut v, &mut frame, 0, &warn).unwrap();
        let copied = v.at(1).unwrap().borrow().as_variable().unwrap().value().unwrap().as_u32().unwrap();
        assert_eq!(copied, 42);
    }
}
