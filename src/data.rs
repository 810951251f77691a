//! The module data table: a sparse, layered id-to-entity map.
//!
//! `DataView` is a stack of sparse maps with a parent link — used both to
//! hold the globally declared entities built during load, and to stack
//! per-function-call local bindings on top of them without ever copying the
//! parent. A flattened snapshot is never needed and deliberately not
//! provided.
use std::cell::RefCell;
use std::rc::Rc;

use fnv::FnvHashMap as HashMap;

use crate::error::{InterpError, Result};
use crate::func::{EntryPoint, Function};
use crate::ty::Type;
use crate::value::Value;
use crate::var::Variable;

pub type Id = u32;

/// The entity an id can name. `Undefined` is the allocation `DataView`
/// falls back to when `operator[]` misses both the local map and every
/// ancestor.
#[derive(Clone, Debug)]
pub enum Entity {
    Undefined,
    Type(Type),
    Value(Value),
    Variable(Variable),
    Function(Function),
    EntryPoint(EntryPoint),
    /// An `OpLabel` result id, resolved to the instruction index of the
    /// label itself so branch targets can be looked up by id instead of by
    /// raw instruction offset.
    Label(usize),
}
impl Entity {
    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Entity::Type(t) => Some(t),
            _ => None,
        }
    }
    pub fn as_label(&self) -> Option<usize> {
        match self {
            Entity::Label(idx) => Some(*idx),
            _ => None,
        }
    }
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Entity::Value(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_value_mut(&mut self) -> Option<&mut Value> {
        match self {
            Entity::Value(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Entity::Variable(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match self {
            Entity::Variable(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }
    pub fn as_entry_point(&self) -> Option<&EntryPoint> {
        match self {
            Entity::EntryPoint(e) => Some(e),
            _ => None,
        }
    }
}

/// A tagged, owning-or-weak handle over an `Entity`.
///
/// A clone of an owned `Data` deep-copies the underlying entity and the
/// clone takes ownership; a clone of a *weak* `Data` produces another weak
/// view of the same entity (sharing the `Rc`). Weak aliases exist for
/// ray-tracing sub-invocations whose parent invocation is guaranteed to
/// outlive them — so the shared `Rc` never needs to survive past the scope
/// that produced it, even though nothing here enforces that lifetime at the
/// type level (see the design notes on modelling this as a borrow from a
/// generational arena, which this sparse map approximates well enough for
/// the core's own needs).
#[derive(Clone, Debug)]
pub struct Data {
    own: bool,
    entity: Rc<RefCell<Entity>>,
}
impl Data {
    pub fn owned(entity: Entity) -> Self {
        Data {
            own: true,
            entity: Rc::new(RefCell::new(entity)),
        }
    }
    pub fn undefined() -> Self {
        Self::owned(Entity::Undefined)
    }
    /// A weak view over the same underlying entity.
    pub fn weak_alias(&self) -> Self {
        Data {
            own: false,
            entity: self.entity.clone(),
        }
    }
    pub fn is_own(&self) -> bool {
        self.own
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, Entity> {
        self.entity.borrow()
    }
    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Entity> {
        self.entity.borrow_mut()
    }

    /// Deep-clones when owned, shares the underlying entity when weak —
    /// this is the distinction `DataView::get` needs to preserve when it
    /// copies an ancestor's entry down into a child's local map.
    fn clone_for_layering(&self) -> Self {
        if self.own {
            Data::owned(self.entity.borrow().clone())
        } else {
            self.clone()
        }
    }
}

/// A layered view over the id table: an owned local map plus an optional
/// parent view. `contains` and reads are local-or-ancestral; writes always
/// land in the local map.
pub struct DataView {
    local: HashMap<Id, Data>,
    parent: Option<Rc<DataView>>,
    pub bound: Id,
}
impl DataView {
    pub fn new_root(bound: Id) -> Self {
        DataView {
            local: HashMap::default(),
            parent: None,
            bound,
        }
    }
    pub fn new_child(parent: Rc<DataView>) -> Self {
        let bound = parent.bound;
        DataView {
            local: HashMap::default(),
            parent: Some(parent),
            bound,
        }
    }

    pub fn contains(&self, id: Id) -> bool {
        self.local.contains_key(&id) || self.parent.as_ref().is_some_and(|p| p.contains(id))
    }

    /// Prefers the local map, falls back to the ancestral chain, else
    /// allocates an `UNDEFINED` entry locally and returns that.
    pub fn get(&mut self, id: Id) -> &Data {
        if !self.local.contains_key(&id) {
            let inherited = self.lookup_ancestor(id);
            let data = inherited.unwrap_or_else(Data::undefined);
            self.local.insert(id, data);
        }
        self.local.get(&id).unwrap()
    }

    /// Same as `get`, additionally enforcing `id < bound`.
    pub fn at(&mut self, id: Id) -> Result<&Data> {
        if id >= self.bound {
            return Err(InterpError::out_of_bounds(
                None,
                format!("id {} is outside [0, {})", id, self.bound),
            ));
        }
        Ok(self.get(id))
    }

    /// Writes (or overwrites) the local binding for `id`.
    pub fn set(&mut self, id: Id, data: Data) {
        self.local.insert(id, data);
    }

    fn lookup_ancestor(&self, id: Id) -> Option<Data> {
        self.local
            .get(&id)
            .map(Data::clone_for_layering)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_ancestor(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::StorageClass;

    fn var_entity(store_cls: StorageClass) -> Entity {
        Entity::Variable(Variable::new(
            Some("x".to_string()),
            crate::ty::PointerType {
                pointee_ty: Box::new(Type::int32()),
                store_cls,
            },
            store_cls,
        ))
    }

    #[test]
    fn child_shadows_parent_without_mutating_it() {
        let mut root = DataView::new_root(16);
        root.set(5, Data::owned(var_entity(StorageClass::Private)));
        let original = root.lookup_ancestor(5).unwrap();
        let root = Rc::new(root);

        let mut child = DataView::new_child(root.clone());
        child.set(5, Data::owned(var_entity(StorageClass::Function)));

        let child_store_cls = child.at(5).unwrap().borrow().as_variable().unwrap().store_cls;
        assert_eq!(child_store_cls, StorageClass::Function);

        let root_store_cls = original.borrow().as_variable().unwrap().store_cls;
        assert_eq!(root_store_cls, StorageClass::Private);
    }

    #[test]
    fn contains_is_local_or_ancestral() {
        let mut root = DataView::new_root(4);
        root.set(1, Data::undefined());
        let root = Rc::new(root);
        let child = DataView::new_child(root.clone());
        assert!(child.contains(1));
        assert!(!child.contains(2));
    }

    #[test]
    fn at_rejects_ids_past_bound() {
        let mut view = DataView::new_root(4);
        assert!(view.at(10).is_err());
    }
}
