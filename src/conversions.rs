//! Format conversions (spec §4.2): every transition the decoration cache
//! may need to satisfy a `get_or_build`. Conversions that can encounter
//! duplicate coordinates (any conversion that canonicalizes an unsorted
//! coordinate stream) take an optional accumulator; when `None`, the
//! "later value wins" rule applies (`ops::builtin::second`, spec §4.2),
//! matching the default accumulate-as-replace behavior of a write with no
//! explicit accumulator set on its `Descriptor`.

use crate::accelerator::AcceleratorBackend;
use crate::error::Result;
use crate::formats::matrix::{MatrixAccelCoo, MatrixAccelCsr, MatrixCoo, MatrixCsr, MatrixDok};
use crate::formats::vector::{VectorAccelCoo, VectorAccelDense, VectorCoo, VectorDense, VectorDok};
use crate::ops::OpBinary;
use crate::types::Value;

fn combine(acc: Option<&OpBinary>, old: Value, new: Value) -> Value {
    match acc {
        Some(op) => op.apply(&old, &new),
        None => new,
    }
}

// ---------------------------------------------------------------- vector --

pub fn vector_dok_to_coo(dok: &VectorDok) -> VectorCoo {
    let mut pairs: Vec<(usize, Value)> = dok.entries.iter().map(|(i, v)| (*i, v.clone())).collect();
    pairs.sort_by_key(|(i, _)| *i);
    let (indices, values) = pairs.into_iter().unzip();
    VectorCoo { indices, values }
}

pub fn vector_coo_to_dok(coo: &VectorCoo, accumulator: Option<&OpBinary>) -> VectorDok {
    let mut entries = std::collections::HashMap::new();
    for (i, v) in coo.indices.iter().zip(coo.values.iter()) {
        entries
            .entry(*i)
            .and_modify(|old: &mut Value| *old = combine(accumulator, old.clone(), v.clone()))
            .or_insert_with(|| v.clone());
    }
    VectorDok { entries }
}

/// Sorts `coo` by index and combines duplicate indices with `accumulator`
/// (or "later wins" if `None`). The caller is expected to have appended
/// possibly-unsorted, possibly-duplicate entries via successive writes.
pub fn vector_coo_canonicalize(coo: &VectorCoo, accumulator: Option<&OpBinary>) -> VectorCoo {
    let mut pairs: Vec<(usize, Value)> =
        coo.indices.iter().cloned().zip(coo.values.iter().cloned()).collect();
    pairs.sort_by_key(|(i, _)| *i);
    let mut indices = Vec::with_capacity(pairs.len());
    let mut values: Vec<Value> = Vec::with_capacity(pairs.len());
    for (i, v) in pairs {
        if indices.last() == Some(&i) {
            let old = values.pop().unwrap();
            values.push(combine(accumulator, old, v));
        } else {
            indices.push(i);
            values.push(v);
        }
    }
    VectorCoo { indices, values }
}

pub fn vector_coo_to_dense(coo: &VectorCoo, len: usize, accumulator: Option<&OpBinary>) -> VectorDense {
    let mut dense = VectorDense::new(len);
    for (i, v) in coo.indices.iter().zip(coo.values.iter()) {
        match &mut dense.slots[*i] {
            Some(old) => *old = combine(accumulator, old.clone(), v.clone()),
            slot @ None => *slot = Some(v.clone()),
        }
    }
    dense
}

pub fn vector_dense_to_coo(dense: &VectorDense) -> VectorCoo {
    let mut indices = Vec::new();
    let mut values = Vec::new();
    for (i, slot) in dense.slots.iter().enumerate() {
        if let Some(v) = slot {
            indices.push(i);
            values.push(v.clone());
        }
    }
    VectorCoo { indices, values }
}

pub fn vector_dense_to_dok(dense: &VectorDense) -> VectorDok {
    let mut entries = std::collections::HashMap::new();
    for (i, slot) in dense.slots.iter().enumerate() {
        if let Some(v) = slot {
            entries.insert(i, v.clone());
        }
    }
    VectorDok { entries }
}

pub fn vector_dok_to_dense(dok: &VectorDok, len: usize) -> VectorDense {
    let mut dense = VectorDense::new(len);
    for (i, v) in &dok.entries {
        dense.slots[*i] = Some(v.clone());
    }
    dense
}

pub fn vector_coo_to_accel(
    backend: &dyn AcceleratorBackend,
    coo: &VectorCoo,
    value_byte_size: usize,
) -> Result<VectorAccelCoo> {
    let indices = backend.allocate(coo.indices.len() * std::mem::size_of::<usize>())?;
    let values = backend.allocate(coo.values.len() * value_byte_size)?;
    Ok(VectorAccelCoo { indices, values, nvals: coo.nvals() })
}

pub fn vector_dense_to_accel(
    backend: &dyn AcceleratorBackend,
    dense: &VectorDense,
    value_byte_size: usize,
) -> Result<VectorAccelDense> {
    let slots = backend.allocate(dense.slots.len() * value_byte_size)?;
    let presence = backend.allocate(dense.slots.len())?;
    Ok(VectorAccelDense { slots, presence, len: dense.slots.len() })
}

// ---------------------------------------------------------------- matrix --

pub fn matrix_dok_to_coo(dok: &MatrixDok) -> MatrixCoo {
    let mut triples: Vec<((usize, usize), Value)> =
        dok.entries.iter().map(|(k, v)| (*k, v.clone())).collect();
    triples.sort_by_key(|(k, _)| *k);
    let mut rows = Vec::with_capacity(triples.len());
    let mut cols = Vec::with_capacity(triples.len());
    let mut values = Vec::with_capacity(triples.len());
    for ((r, c), v) in triples {
        rows.push(r);
        cols.push(c);
        values.push(v);
    }
    MatrixCoo { rows, cols, values }
}

pub fn matrix_coo_to_dok(coo: &MatrixCoo, accumulator: Option<&OpBinary>) -> MatrixDok {
    let mut entries = std::collections::HashMap::new();
    for ((r, c), v) in coo.rows.iter().zip(coo.cols.iter()).zip(coo.values.iter()).map(|((r, c), v)| ((*r, *c), v))
    {
        entries
            .entry((r, c))
            .and_modify(|old: &mut Value| *old = combine(accumulator, old.clone(), v.clone()))
            .or_insert_with(|| v.clone());
    }
    MatrixDok { entries }
}

/// Sorts `coo` by `(row, col)` and combines duplicate coordinates with
/// `accumulator` (spec §4.2's duplicate-combining rule).
pub fn matrix_coo_canonicalize(coo: &MatrixCoo, accumulator: Option<&OpBinary>) -> MatrixCoo {
    let mut triples: Vec<((usize, usize), Value)> = coo
        .rows
        .iter()
        .cloned()
        .zip(coo.cols.iter().cloned())
        .zip(coo.values.iter().cloned())
        .map(|((r, c), v)| ((r, c), v))
        .collect();
    triples.sort_by_key(|(k, _)| *k);

    let mut rows = Vec::with_capacity(triples.len());
    let mut cols = Vec::with_capacity(triples.len());
    let mut values: Vec<Value> = Vec::with_capacity(triples.len());
    for ((r, c), v) in triples {
        if rows.last() == Some(&r) && cols.last() == Some(&c) {
            let old = values.pop().unwrap();
            values.push(combine(accumulator, old, v));
        } else {
            rows.push(r);
            cols.push(c);
            values.push(v);
        }
    }
    MatrixCoo { rows, cols, values }
}

/// Builds a CSR matrix from a row-major-sorted, duplicate-free COO. Call
/// [`matrix_coo_canonicalize`] first if the input might not already be
/// canonical.
pub fn matrix_coo_to_csr(coo: &MatrixCoo, nrows: usize) -> MatrixCsr {
    let mut row_ptr = vec![0usize; nrows + 1];
    for &r in &coo.rows {
        row_ptr[r + 1] += 1;
    }
    for i in 0..nrows {
        row_ptr[i + 1] += row_ptr[i];
    }
    MatrixCsr { row_ptr, col_idx: coo.cols.clone(), values: coo.values.clone() }
}

pub fn matrix_csr_to_coo(csr: &MatrixCsr) -> MatrixCoo {
    let mut rows = Vec::with_capacity(csr.nvals());
    for r in 0..csr.nrows() {
        let (cols, _) = csr.row(r);
        rows.extend(std::iter::repeat(r).take(cols.len()));
    }
    MatrixCoo { rows, cols: csr.col_idx.clone(), values: csr.values.clone() }
}

pub fn matrix_coo_to_accel(
    backend: &dyn AcceleratorBackend,
    coo: &MatrixCoo,
    value_byte_size: usize,
) -> Result<MatrixAccelCoo> {
    let rows = backend.allocate(coo.rows.len() * std::mem::size_of::<usize>())?;
    let cols = backend.allocate(coo.cols.len() * std::mem::size_of::<usize>())?;
    let values = backend.allocate(coo.values.len() * value_byte_size)?;
    Ok(MatrixAccelCoo { rows, cols, values, nvals: coo.nvals() })
}

pub fn matrix_csr_to_accel(
    backend: &dyn AcceleratorBackend,
    csr: &MatrixCsr,
    value_byte_size: usize,
) -> Result<MatrixAccelCsr> {
    let row_ptr = backend.allocate(csr.row_ptr.len() * std::mem::size_of::<usize>())?;
    let col_idx = backend.allocate(csr.col_idx.len() * std::mem::size_of::<usize>())?;
    let values = backend.allocate(csr.values.len() * value_byte_size)?;
    Ok(MatrixAccelCsr { row_ptr, col_idx, values, nrows: csr.nrows() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;

    #[test]
    fn vector_coo_canonicalize_combines_duplicates_with_accumulator() {
        let coo = VectorCoo { indices: vec![2, 1, 1], values: vec![Value::Int(5), Value::Int(1), Value::Int(2)] };
        let plus = builtin::plus_int();
        let canon = vector_coo_canonicalize(&coo, Some(&plus));
        assert_eq!(canon.indices, vec![1, 2]);
        assert_eq!(canon.values, vec![Value::Int(3), Value::Int(5)]);
    }

    #[test]
    fn vector_coo_canonicalize_defaults_to_last_write_wins() {
        let coo = VectorCoo { indices: vec![1, 1], values: vec![Value::Int(1), Value::Int(9)] };
        let canon = vector_coo_canonicalize(&coo, None);
        assert_eq!(canon.values, vec![Value::Int(9)]);
    }

    #[test]
    fn matrix_coo_to_csr_builds_correct_row_ptr() {
        let coo = MatrixCoo {
            rows: vec![0, 0, 2],
            cols: vec![0, 1, 0],
            values: vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        };
        let csr = matrix_coo_to_csr(&coo, 3);
        assert_eq!(csr.row_ptr, vec![0, 2, 2, 3]);
    }

    #[test]
    fn matrix_csr_round_trips_through_coo() {
        let coo = MatrixCoo {
            rows: vec![0, 0, 2],
            cols: vec![0, 1, 0],
            values: vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        };
        let csr = matrix_coo_to_csr(&coo, 3);
        let back = matrix_csr_to_coo(&csr);
        assert_eq!(back.rows, coo.rows);
        assert_eq!(back.cols, coo.cols);
    }

    #[test]
    fn dok_to_coo_is_sorted() {
        let mut dok = MatrixDok::default();
        dok.entries.insert((1, 0), Value::Int(1));
        dok.entries.insert((0, 2), Value::Int(2));
        dok.entries.insert((0, 0), Value::Int(3));
        let coo = matrix_dok_to_coo(&dok);
        assert!(coo.is_sorted());
    }
}
