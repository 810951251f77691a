//! Array and Struct: ordered collections of owned values.
use crate::error::{InterpError, Result};
use crate::ty::Type;

use super::Value;

/// Runtime-sized or fixed-size ordered sequence of values sharing one
/// element type.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayVal {
    pub elements: Vec<Value>,
}
impl ArrayVal {
    pub fn new(elements: Vec<Value>) -> Self {
        ArrayVal { elements }
    }

    /// `copyFrom` sizing rule: a zero-length array adopts the source's
    /// length on its first copy; afterwards the lengths must match.
    pub fn copy_from(&mut self, src: &ArrayVal, inst_idx: Option<usize>) -> Result<()> {
        if self.elements.is_empty() || src.elements.len() == self.elements.len() {
            self.elements = src.elements.clone();
            Ok(())
        } else {
            Err(InterpError::shape_mismatch(
                inst_idx,
                format!(
                    "array length mismatch: {} vs {}",
                    self.elements.len(),
                    src.elements.len()
                ),
            ))
        }
    }
}

/// Named-field record. Used both as the runtime `Struct` value category and
/// as the abstract structured form `toStruct`/`copyFrom(Struct)` round-trip
/// through — the same shape serves both purposes, the way the original
/// reused its `Struct` value for self-description.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StructVal {
    pub fields: Vec<(String, Value)>,
}
impl StructVal {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        StructVal { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn copy_from(&mut self, src: &StructVal, inst_idx: Option<usize>) -> Result<()> {
        if self.fields.len() != src.fields.len() {
            return Err(InterpError::shape_mismatch(
                inst_idx,
                format!(
                    "struct field count mismatch: {} vs {}",
                    self.fields.len(),
                    src.fields.len()
                ),
            ));
        }
        self.fields = src.fields.clone();
        Ok(())
    }
}

/// Backfills a placeholder element/field type once the first concrete
/// element of an aggregate is known, per `Type::replace_sub_element` /
/// `Type::replace_field_type`.
///
/// Preserved quirk: for `Struct`, every member is backfilled from
/// `elements[0]`'s type, never `elements[i]`'s — this mirrors an apparent
/// off-by-one in the reference implementation's `inferType` that we were
/// told to keep rather than silently correct.
pub fn infer_type(ty: &mut Type, elements: &[Value]) {
    let Some(first) = elements.first() else {
        return;
    };
    match ty {
        Type::Array(_) => ty.replace_sub_element(first.type_of().clone()),
        Type::Struct(s) => {
            let n = s.members.len();
            for i in 0..n {
                ty.replace_field_type(i, first.type_of().clone());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;
    use crate::value::Value;

    #[test]
    fn runtime_array_adopts_source_length_on_first_copy() {
        let mut dst = ArrayVal::new(vec![]);
        let src = ArrayVal::new(vec![
            Value::from_f32(1.0),
            Value::from_f32(2.0),
            Value::from_f32(3.0),
        ]);
        dst.copy_from(&src, None).unwrap();
        assert_eq!(dst.elements.len(), 3);
        assert_eq!(dst.elements[1].as_f32().unwrap(), 2.0);
    }

    #[test]
    fn mismatched_nonzero_lengths_fail() {
        let mut dst = ArrayVal::new(vec![Value::from_f32(0.0)]);
        let src = ArrayVal::new(vec![Value::from_f32(1.0), Value::from_f32(2.0)]);
        assert!(dst.copy_from(&src, Some(4)).is_err());
    }

    #[test]
    fn infer_type_always_uses_the_first_element_for_struct_members() {
        let mut ty = Type::Struct(crate::ty::StructType {
            name: None,
            members: vec![
                crate::ty::StructMember {
                    name: None,
                    ty: Type::Void,
                },
                crate::ty::StructMember {
                    name: None,
                    ty: Type::Void,
                },
            ],
        });
        let elements = vec![Value::from_f32(1.0), Value::from_u32(2)];
        infer_type(&mut ty, &elements);
        let s = ty.as_struct().unwrap();
        assert_eq!(s.members[0].ty, Type::float32());
        // Bug preserved: member 1 also gets element 0's type, not element 1's.
        assert_eq!(s.members[1].ty, Type::float32());
    }
}
