//! `transpose` (spec §4.6, §4.7, §9 Open Question 1): swaps `(row, col[,
//! value])` for every stored entry, stable-sorts by the new row key, then
//! applies the mask (or its complement) as a membership filter over the
//! new `(row, col)` pairs.
//!
//! `original_source/sources/algo/matrix/SplaMatrixTransposeCOO.cpp` has
//! both its `typeHasValues` and structural branches empty — dead code,
//! not a design decision (SPEC_FULL.md Open Question 1). We implement
//! both branches identically: transposition doesn't care whether the
//! type carries a value, only whether there is one to carry along.

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::shared::Shared;

pub struct TransposeParams {
    pub out: Shared<Matrix>,
    pub mask: Option<Shared<Matrix>>,
    pub input: Shared<Matrix>,
    pub descriptor: Descriptor,
}

pub struct CooTranspose;

impl super::TransposeAlgorithm for CooTranspose {
    fn name(&self) -> &str {
        "transpose_coo"
    }
    fn description(&self) -> &str {
        "swap (row, col) via each block's COO decoration, stable-sort, apply mask"
    }
    fn select(&self, _p: &TransposeParams) -> bool {
        true
    }
    fn execute(&self, p: &TransposeParams) -> Result<()> {
        if p.descriptor.replace() {
            p.out.clear();
        }
        let (rows, cols, values) = p.input.read();

        // Swap coordinates; stable order preserved by the fact `read()`
        // already yields row-major order, so after swapping we still
        // need an explicit stable sort on the new (row, col) key.
        let mut swapped: Vec<(usize, usize, crate::types::Value)> =
            rows.into_iter().zip(cols).zip(values).map(|((r, c), v)| (c, r, v)).collect();
        swapped.sort_by_key(|(r, c, _)| (*r, *c));

        let complement = p.descriptor.mask_complement();
        for (row, col, value) in swapped {
            let accepted = match &p.mask {
                None => true,
                Some(m) => {
                    let present = m.get(row, col)?.is_some();
                    present != complement
                }
            };
            if accepted {
                p.out.set(row, col, value, p.descriptor.accumulator().map(|op| op.as_ref()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Value, INT};

    #[test]
    fn transpose_swaps_coordinates() {
        let m = Matrix::new(INT.clone(), 3, 3);
        m.set(0, 2, Value::Int(5), None).unwrap();
        m.set(1, 0, Value::Int(7), None).unwrap();
        let out = Matrix::new(INT.clone(), 3, 3);

        let params = TransposeParams { out: out.clone(), mask: None, input: m, descriptor: Descriptor::new() };
        super::super::TRANSPOSE.dispatch(&params).unwrap();

        assert_eq!(out.get(2, 0).unwrap(), Some(Value::Int(5)));
        assert_eq!(out.get(0, 1).unwrap(), Some(Value::Int(7)));
    }

    #[test]
    fn transpose_respects_mask_complement() {
        let m = Matrix::new(INT.clone(), 2, 2);
        m.set(0, 1, Value::Int(1), None).unwrap();
        m.set(1, 0, Value::Int(2), None).unwrap();
        let mask = Matrix::new(INT.clone(), 2, 2);
        mask.set(1, 0, Value::Int(1), None).unwrap(); // present at (1,0) only
        let out = Matrix::new(INT.clone(), 2, 2);

        let params = TransposeParams {
            out: out.clone(),
            mask: Some(mask),
            input: m,
            descriptor: Descriptor::new().with_mask_complement(true),
        };
        super::super::TRANSPOSE.dispatch(&params).unwrap();

        // Transposed entries land at (1,0) and (0,1); mask_complement means
        // "keep where mask absent" so only (0,1) (mask absent there) survives.
        assert_eq!(out.get(0, 1).unwrap(), Some(Value::Int(2)));
        assert_eq!(out.get(1, 0).unwrap(), None);
    }
}
