//! `ewise_add` (spec §4.6): element-wise union of two operands combined by
//! a binary op — entries present in only one operand pass through
//! unchanged, entries present in both combine via `op`, subject to the
//! usual mask/mask_complement/replace/accumulator descriptor semantics.

use std::collections::HashMap;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::ops::OpBinary;
use crate::shared::Shared;
use crate::types::Value;
use crate::vector::Vector;

pub struct VEwiseAddParams {
    pub out: Shared<Vector>,
    pub mask: Option<Shared<Vector>>,
    pub a: Shared<Vector>,
    pub b: Shared<Vector>,
    pub op: Shared<OpBinary>,
    pub descriptor: Descriptor,
}

pub struct MEwiseAddParams {
    pub out: Shared<Matrix>,
    pub mask: Option<Shared<Matrix>>,
    pub a: Shared<Matrix>,
    pub b: Shared<Matrix>,
    pub op: Shared<OpBinary>,
    pub descriptor: Descriptor,
}

pub struct VectorEwiseAddCoo;

impl super::VEwiseAddAlgorithm for VectorEwiseAddCoo {
    fn name(&self) -> &str {
        "v_ewise_add_coo"
    }
    fn description(&self) -> &str {
        "merge a and b's stored indices in a host hash map, combine overlaps via op"
    }
    fn select(&self, _p: &VEwiseAddParams) -> bool {
        true
    }
    fn execute(&self, p: &VEwiseAddParams) -> Result<()> {
        if p.descriptor.replace() {
            p.out.clear();
        }
        let (a_idx, a_val) = p.a.read();
        let mut merged: HashMap<usize, Value> = a_idx.into_iter().zip(a_val).collect();
        let (b_idx, b_val) = p.b.read();
        for (index, value) in b_idx.into_iter().zip(b_val) {
            merged
                .entry(index)
                .and_modify(|existing| *existing = p.op.apply(existing, &value))
                .or_insert(value);
        }

        let complement = p.descriptor.mask_complement();
        for (index, value) in merged {
            let accepted = match &p.mask {
                None => true,
                Some(m) => {
                    let present = m.get(index)?.is_some();
                    present != complement
                }
            };
            if accepted {
                p.out.set(index, value, p.descriptor.accumulator().map(|op| op.as_ref()))?;
            }
        }
        Ok(())
    }
}

pub struct MatrixEwiseAddCoo;

impl super::MEwiseAddAlgorithm for MatrixEwiseAddCoo {
    fn name(&self) -> &str {
        "m_ewise_add_coo"
    }
    fn description(&self) -> &str {
        "merge a and b's stored coordinates in a host hash map, combine overlaps via op"
    }
    fn select(&self, _p: &MEwiseAddParams) -> bool {
        true
    }
    fn execute(&self, p: &MEwiseAddParams) -> Result<()> {
        if p.descriptor.replace() {
            p.out.clear();
        }
        let (a_rows, a_cols, a_val) = p.a.read();
        let mut merged: HashMap<(usize, usize), Value> =
            a_rows.into_iter().zip(a_cols).zip(a_val).map(|((r, c), v)| ((r, c), v)).collect();
        let (b_rows, b_cols, b_val) = p.b.read();
        for ((row, col), value) in b_rows.into_iter().zip(b_cols).zip(b_val) {
            merged
                .entry((row, col))
                .and_modify(|existing| *existing = p.op.apply(existing, &value))
                .or_insert(value);
        }

        let complement = p.descriptor.mask_complement();
        for ((row, col), value) in merged {
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
    use crate::ops::builtin;
    use crate::types::INT;

    #[test]
    fn v_ewise_add_combines_overlap_and_keeps_disjoint() {
        let a = Vector::new(INT.clone(), 4);
        a.set(0, Value::Int(1), None).unwrap();
        a.set(1, Value::Int(2), None).unwrap();
        let b = Vector::new(INT.clone(), 4);
        b.set(1, Value::Int(10), None).unwrap();
        b.set(2, Value::Int(3), None).unwrap();
        let out = Vector::new(INT.clone(), 4);

        let params = VEwiseAddParams { out: out.clone(), mask: None, a, b, op: builtin::plus_int(), descriptor: Descriptor::new() };
        super::super::V_EWISE_ADD.dispatch(&params).unwrap();

        assert_eq!(out.get(0).unwrap(), Some(Value::Int(1)));
        assert_eq!(out.get(1).unwrap(), Some(Value::Int(12)));
        assert_eq!(out.get(2).unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn m_ewise_add_respects_mask_complement() {
        let a = Matrix::new(INT.clone(), 2, 2);
        a.set(0, 0, Value::Int(1), None).unwrap();
        let b = Matrix::new(INT.clone(), 2, 2);
        b.set(1, 1, Value::Int(2), None).unwrap();
        let mask = Matrix::new(INT.clone(), 2, 2);
        mask.set(0, 0, Value::Int(1), None).unwrap();
        let out = Matrix::new(INT.clone(), 2, 2);

        let params = MEwiseAddParams {
            out: out.clone(),
            mask: Some(mask),
            a,
            b,
            op: builtin::plus_int(),
            descriptor: Descriptor::new().with_mask_complement(true),
        };
        super::super::M_EWISE_ADD.dispatch(&params).unwrap();

        assert_eq!(out.get(0, 0).unwrap(), None);
        assert_eq!(out.get(1, 1).unwrap(), Some(Value::Int(2)));
    }
}
