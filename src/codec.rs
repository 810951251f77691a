//! JSON (de)serialization of runtime [`Value`]s, layered on top of the
//! internal `to_struct`/`copy_from_struct` pair the same way the original
//! front-end layers YAML on top of its own structured form. This module
//! never reaches into `ValueData` directly.
use serde_json::Value as Json;

use crate::error::{InterpError, Result};
use crate::ty::{StructType, Type};
use crate::value::{StructVal, Value};

/// Converts a runtime value to its external JSON form. Scalars map to plain
/// JSON scalars; every aggregate (including ones with no natural JSON
/// analogue, like `Image`) goes through [`Value::to_struct`].
pub fn to_json(value: &Value) -> Json {
    match value.type_of() {
        Type::Bool => Json::Bool(value.as_bool().unwrap_or(false)),
        Type::Int { .. } => serde_json::json!(value.as_i32().unwrap_or(0)),
        Type::Uint { .. } => serde_json::json!(value.as_u32().unwrap_or(0)),
        Type::Float { .. } => serde_json::json!(value.as_f32().unwrap_or(0.0)),
        Type::String => Json::String(value.as_string().unwrap_or("").to_string()),
        Type::Array(_) => Json::Array(
            value
                .as_array()
                .map(|arr| arr.elements.iter().map(to_json).collect())
                .unwrap_or_default(),
        ),
        _ => struct_to_json(&value.to_struct()),
    }
}

fn struct_to_json(s: &StructVal) -> Json {
    if s.fields.len() == 1 && s.fields[0].0 == "value" {
        return to_json(&s.fields[0].1);
    }
    let sequential = !s.fields.is_empty()
        && s.fields
            .iter()
            .enumerate()
            .all(|(i, (name, _))| name == &i.to_string());
    if sequential {
        Json::Array(s.fields.iter().map(|(_, v)| to_json(v)).collect())
    } else {
        Json::Object(s.fields.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
    }
}

/// Parses an external JSON value into a runtime [`Value`] of type `ty`.
/// Aggregates whose member shape isn't directly navigable from `Type`
/// (images, samplers, acceleration structures) are filled in via
/// [`Value::copy_from_struct`] from a best-effort structured reading of the
/// JSON object.
pub fn from_json(ty: &Type, json: &Json) -> Result<Value> {
    match ty {
        Type::Bool => json
            .as_bool()
            .map(Value::from_bool)
            .ok_or_else(|| shape_mismatch(ty, json)),
        Type::Int { .. } => json
            .as_i64()
            .map(|x| Value::from_i32(x as i32))
            .ok_or_else(|| shape_mismatch(ty, json)),
        Type::Uint { .. } => json
            .as_u64()
            .map(|x| Value::from_u32(x as u32))
            .ok_or_else(|| shape_mismatch(ty, json)),
        Type::Float { .. } => json
            .as_f64()
            .map(|x| Value::from_f32(x as f32))
            .ok_or_else(|| shape_mismatch(ty, json)),
        Type::String => json
            .as_str()
            .map(Value::from_string)
            .ok_or_else(|| shape_mismatch(ty, json)),
        Type::Array(a) => {
            let items = json.as_array().ok_or_else(|| shape_mismatch(ty, json))?;
            let elements = items
                .iter()
                .map(|item| from_json(&a.element_ty, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::array((*a.element_ty).clone(), elements))
        }
        Type::Struct(s) => from_json_struct(s, ty, json),
        _ => {
            let mut v = Value::construct(ty, false);
            let fields = json_object_to_fields(json)?;
            v.copy_from_struct(&StructVal::new(fields), None)?;
            Ok(v)
        }
    }
}

fn from_json_struct(s: &StructType, ty: &Type, json: &Json) -> Result<Value> {
    let obj = json.as_object().ok_or_else(|| shape_mismatch(ty, json))?;
    let mut fields = Vec::with_capacity(s.members.len());
    for (i, member) in s.members.iter().enumerate() {
        let key = member.name.clone().unwrap_or_else(|| i.to_string());
        let field_json = obj
            .get(&key)
            .or_else(|| obj.get(&i.to_string()))
            .ok_or_else(|| shape_mismatch(ty, json))?;
        let value = from_json(&member.ty, field_json)?;
        fields.push((key, value));
    }
    Ok(Value::struct_of(ty.clone(), fields))
}

/// Best-effort leaf conversion used only for the aggregates the codec can't
/// navigate by declared member type (see `from_json`'s fallback arm). A JSON
/// number with a fractional/exponent part becomes a float; otherwise an
/// integer. This mirrors how most JSON encoders round-trip the distinction.
fn json_object_to_fields(json: &Json) -> Result<Vec<(String, Value)>> {
    let obj = json
        .as_object()
        .ok_or_else(|| InterpError::shape_mismatch(None, "expected a JSON object"))?;
    obj.iter().map(|(k, v)| Ok((k.clone(), json_leaf_to_value(v)?))).collect()
}

fn json_leaf_to_value(json: &Json) -> Result<Value> {
    match json {
        Json::Bool(b) => Ok(Value::from_bool(*b)),
        Json::String(s) => Ok(Value::from_string(s.clone())),
        Json::Array(items) => {
            let elements = items.iter().map(json_leaf_to_value).collect::<Result<Vec<_>>>()?;
            Ok(Value::array(Type::uint32(), elements))
        }
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(Value::from_u32(u as u32))
            } else if let Some(i) = n.as_i64() {
                Ok(Value::from_i32(i as i32))
            } else {
                Ok(Value::from_f32(n.as_f64().unwrap_or(0.0) as f32))
            }
        }
        Json::Object(_) | Json::Null => Err(InterpError::shape_mismatch(None, "unsupported JSON leaf shape")),
    }
}

fn shape_mismatch(ty: &Type, json: &Json) -> InterpError {
    InterpError::shape_mismatch(None, format!("JSON value {} does not fit type {}", json, ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips() {
        let v = Value::from_u32(42);
        let j = to_json(&v);
        assert_eq!(j, serde_json::json!(42));
        let back = from_json(&Type::uint32(), &j).unwrap();
        assert_eq!(back.as_u32(), Some(42));
    }

    #[test]
    fn array_round_trips() {
        let v = Value::array(Type::float32(), vec![Value::from_f32(1.5), Value::from_f32(2.5)]);
        let j = to_json(&v);
        assert_eq!(j, serde_json::json!([1.5, 2.5]));
        let back = from_json(
            &Type::Array(crate::ty::ArrayType {
                element_ty: Box::new(Type::float32()),
                element_count: Some(2),
            }),
            &j,
        )
        .unwrap();
        assert_eq!(back.as_array().unwrap().elements.len(), 2);
    }

    #[test]
    fn struct_round_trips_by_member_name() {
        let ty = Type::Struct(StructType {
            name: Some("Pair".to_string()),
            members: vec![
                crate::ty::StructMember { name: Some("x".to_string()), ty: Type::uint32() },
                crate::ty::StructMember { name: Some("y".to_string()), ty: Type::uint32() },
            ],
        });
        let v = Value::struct_of(ty.clone(), vec![("x".to_string(), Value::from_u32(1)), ("y".to_string(), Value::from_u32(2))]);
        let j = to_json(&v);
        let back = from_json(&ty, &j).unwrap();
        assert_eq!(back.as_struct().unwrap().get("y").and_then(Value::as_u32), Some(2));
    }
}
