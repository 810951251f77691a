//! `Variable`: a module entity bound to a pointer type and a lazily
//! constructed pointee value.
use crate::console::WarnSink;
use crate::ty::{PointerType, StorageClass, Type};
use crate::value::{StructVal, Value};

/// A SPIR-V `OpVariable` result: a pointer-typed entity that owns (once
/// materialised) the value it points to.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Option<String>,
    pub ptr_ty: PointerType,
    pub store_cls: StorageClass,
    /// Set for variables backed by a specialization constant; carries the
    /// constant's resolved default so load-time specialization overrides it
    /// without touching any runtime code path.
    pub spec_const: bool,
    pointee: Option<Value>,
}
impl Variable {
    pub fn new(name: Option<String>, ptr_ty: PointerType, store_cls: StorageClass) -> Self {
        Variable {
            name,
            ptr_ty,
            store_cls,
            spec_const: false,
            pointee: None,
        }
    }

    pub fn ty(&self) -> Type {
        Type::Pointer(self.ptr_ty.clone())
    }

    /// Dereferences the pointer type and materialises the pointee value,
    /// marking every `CoopMatrix` found in the fresh value tree as unsized.
    /// Idempotent: returns the existing pointee on repeated calls.
    pub fn init_value(&mut self, undef: bool) -> &Value {
        if self.pointee.is_none() {
            let mut v = Value::construct(&self.ptr_ty.pointee_ty, undef);
            v.mark_coop_matrices_unsized();
            self.pointee = Some(v);
        }
        self.pointee.as_ref().unwrap()
    }

    pub fn value(&self) -> Option<&Value> {
        self.pointee.as_ref()
    }
    pub fn value_mut(&mut self) -> Option<&mut Value> {
        self.pointee.as_mut()
    }
    pub fn set_value(&mut self, v: Value) {
        self.pointee = Some(v);
    }

    /// Self-description per the external interface: `{name?, value,
    /// storage-class}` in that order.
    pub fn as_value(&self, warn: &dyn WarnSink) -> StructVal {
        let mut fields = Vec::new();
        if let Some(name) = &self.name {
            fields.push(("name".to_string(), Value::from_string(name.clone())));
        }
        match &self.pointee {
            Some(v) => fields.push(("value".to_string(), v.clone())),
            None => {
                warn.warn("describing a variable whose pointee was never materialised");
                fields.push((
                    "value".to_string(),
                    Value::construct(&self.ptr_ty.pointee_ty, true),
                ));
            }
        }
        fields.push((
            "storage-class".to_string(),
            Value::from_string(format!("{:?}", self.store_cls)),
        ));
        StructVal::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_value_is_idempotent() {
        let mut v = Variable::new(
            None,
            PointerType {
                pointee_ty: Box::new(Type::float32()),
                store_cls: StorageClass::Function,
            },
            StorageClass::Function,
        );
        v.init_value(false);
        let first_ptr = v.value().unwrap() as *const Value;
        v.init_value(false);
        let second_ptr = v.value().unwrap() as *const Value;
        assert_eq!(first_ptr, second_ptr);
    }
}
