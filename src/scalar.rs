//! Scalar (spec §3): a single optional value of a given [`Type`]. Used both
//! as a first-class operand (e.g. the result of `v_reduce`/`m_reduce`) and
//! as the host-side element type moved in and out of vectors/matrices by
//! `read`/`write`.

use parking_lot::RwLock;

use crate::shared::Shared;
use crate::types::{Type, Value};

pub struct Scalar {
    ty: Shared<Type>,
    value: RwLock<Option<Value>>,
}

impl Scalar {
    pub fn new(ty: Shared<Type>) -> Shared<Self> {
        Shared::new(Scalar { ty, value: RwLock::new(None) })
    }

    pub fn with_value(ty: Shared<Type>, value: Value) -> Shared<Self> {
        Shared::new(Scalar { ty, value: RwLock::new(Some(value)) })
    }

    pub fn ty(&self) -> &Shared<Type> {
        &self.ty
    }

    pub fn get(&self) -> Option<Value> {
        self.value.read().clone()
    }

    pub fn set(&self, value: Value) {
        *self.value.write() = Some(value);
    }

    pub fn clear(&self) {
        *self.value.write() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.read().is_none()
    }
}

/// A resizable, homogeneously typed buffer of host-side values, used to
/// bulk-load or bulk-read coordinate triples (spec §4.6 `*_write`/`*_read`).
pub struct Array {
    ty: Shared<Type>,
    data: RwLock<Vec<Value>>,
}

impl Array {
    pub fn new(ty: Shared<Type>) -> Shared<Self> {
        Shared::new(Array { ty, data: RwLock::new(Vec::new()) })
    }

    pub fn from_values(ty: Shared<Type>, values: Vec<Value>) -> Shared<Self> {
        Shared::new(Array { ty, data: RwLock::new(values) })
    }

    pub fn ty(&self) -> &Shared<Type> {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn resize(&self, new_len: usize, fill: Value) {
        self.data.write().resize(new_len, fill);
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.data.read().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) {
        self.data.write()[index] = value;
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.data.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INT;

    #[test]
    fn scalar_starts_empty() {
        let s = Scalar::new(INT.clone());
        assert!(s.is_empty());
        s.set(Value::Int(42));
        assert_eq!(s.get(), Some(Value::Int(42)));
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn array_resize_and_index() {
        let a = Array::new(INT.clone());
        a.resize(3, Value::Int(0));
        assert_eq!(a.len(), 3);
        a.set(1, Value::Int(7));
        assert_eq!(a.get(1), Some(Value::Int(7)));
        assert_eq!(a.to_vec(), vec![Value::Int(0), Value::Int(7), Value::Int(0)]);
    }
}
