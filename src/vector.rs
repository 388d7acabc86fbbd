//! Vector (spec §3, §6): a one-dimensional sparse entity over `len` indices
//! of a given [`Type`]. Holds a runtime type handle rather than being
//! generic over the element type, consistent with the rest of the crate's
//! dynamically-typed operand model.

use crate::error::{Error, Result};
use crate::ops::OpBinary;
use crate::scalar::Scalar;
use crate::shared::Shared;
use crate::storage::{VectorStorage, DEFAULT_BLOCK_SIZE};
use crate::types::{Type, Value};

pub struct Vector {
    ty: Shared<Type>,
    storage: VectorStorage,
}

impl Vector {
    pub fn new(ty: Shared<Type>, len: usize) -> Shared<Self> {
        Self::with_block_size(ty, len, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(ty: Shared<Type>, len: usize, block_size: usize) -> Shared<Self> {
        Shared::new(Vector { ty, storage: VectorStorage::new(len, block_size) })
    }

    pub fn ty(&self) -> &Shared<Type> {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn nvals(&self) -> usize {
        self.storage.nvals(None)
    }

    pub(crate) fn storage(&self) -> &VectorStorage {
        &self.storage
    }

    /// Writes a single coordinate, combining with any existing value at
    /// that index via `accumulator` (spec §4.6 `vector_write`).
    pub fn set(&self, index: usize, value: Value, accumulator: Option<&OpBinary>) -> Result<()> {
        if index >= self.len() {
            return Err(Error::invalid_argument(format!(
                "vector index {index} out of range for length {}",
                self.len()
            )));
        }
        self.storage.write_index(index, |dok, local| {
            if let Some(op) = accumulator {
                if let Some(old) = dok.entries.get(&local) {
                    let combined = op.apply(old, &value);
                    dok.entries.insert(local, combined);
                    return;
                }
            }
            dok.entries.insert(local, value);
        });
        Ok(())
    }

    /// Bulk write of coordinate pairs. Out-of-order or duplicate indices
    /// are fine; duplicates combine via `accumulator`, "later wins" if
    /// `None` (spec §4.2).
    pub fn build(&self, indices: &[usize], values: &[Value], accumulator: Option<&OpBinary>) -> Result<()> {
        if indices.len() != values.len() {
            return Err(Error::invalid_argument("vector build: indices/values length mismatch"));
        }
        for (i, v) in indices.iter().zip(values.iter()) {
            self.set(*i, v.clone(), accumulator)?;
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        if index >= self.len() {
            return Err(Error::invalid_argument(format!(
                "vector index {index} out of range for length {}",
                self.len()
            )));
        }
        let (block, local) = self.storage.block_index(index);
        Ok(self.storage.get_block(block).and_then(|b| b.get_dok(None).entries.get(&local).cloned()))
    }

    /// Reads out every populated coordinate, in ascending global index
    /// order, as parallel `(indices, values)` vectors (spec §4.6
    /// `vector_read`).
    pub fn read(&self) -> (Vec<usize>, Vec<Value>) {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut blocks: Vec<usize> = self.storage.blocks().map(|(k, _)| k).collect();
        blocks.sort_unstable();
        for block in blocks {
            let decoration = self.storage.get_block(block).expect("block listed by iterator must exist");
            let coo = decoration.get_coo(None);
            let base = block * self.storage.block_size();
            for (i, v) in coo.indices.iter().zip(coo.values.iter()) {
                indices.push(base + i);
                values.push(v.clone());
            }
        }
        (indices, values)
    }

    /// Drops every stored value, so subsequent reads see an empty vector
    /// (spec §4.6 `Descriptor::replace`).
    pub fn clear(&self) {
        self.storage.clear();
    }

    pub fn reduce(&self, op: &OpBinary) -> Shared<Scalar> {
        let (_, values) = self.read();
        let mut acc: Option<Value> = None;
        for v in values {
            acc = Some(match acc {
                Some(prev) => op.apply(&prev, &v),
                None => v,
            });
        }
        match acc {
            Some(v) => Scalar::with_value(op.result_ty().clone(), v),
            None => Scalar::new(op.result_ty().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;
    use crate::types::INT;

    #[test]
    fn set_and_get_round_trip() {
        let v = Vector::new(INT.clone(), 10);
        v.set(4, Value::Int(42), None).unwrap();
        assert_eq!(v.get(4).unwrap(), Some(Value::Int(42)));
        assert_eq!(v.get(5).unwrap(), None);
    }

    #[test]
    fn out_of_range_index_is_invalid_argument() {
        let v = Vector::new(INT.clone(), 4);
        assert!(matches!(v.set(4, Value::Int(1), None), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn build_combines_duplicates_with_accumulator() {
        let v = Vector::new(INT.clone(), 4);
        let plus = builtin::plus_int();
        v.build(&[1, 1], &[Value::Int(2), Value::Int(3)], Some(&plus)).unwrap();
        assert_eq!(v.get(1).unwrap(), Some(Value::Int(5)));
    }

    #[test]
    fn reduce_sums_populated_values() {
        let v = Vector::new(INT.clone(), 4);
        v.set(0, Value::Int(2), None).unwrap();
        v.set(2, Value::Int(3), None).unwrap();
        let plus = builtin::plus_int();
        let scalar = v.reduce(&plus);
        assert_eq!(scalar.get(), Some(Value::Int(5)));
    }
}
