//! `v_reduce` / `m_reduce` (spec §4.6): collapse every stored value down to
//! a single [`Scalar`] via an associative binary op, with an optional
//! initial value seeding the accumulation. Each populated block reduces
//! independently in parallel (the block-partial phase), then the partial
//! results combine on the calling thread (the final phase) — two-phase
//! tree reduction, grounded in the dispatch sketch's per-block parallelism
//! shape rather than a single sequential fold over the whole entity.

use rayon::prelude::*;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::ops::OpBinary;
use crate::scalar::Scalar;
use crate::shared::Shared;
use crate::types::Value;
use crate::vector::Vector;

pub struct VReduceParams {
    pub out: Shared<Scalar>,
    pub input: Shared<Vector>,
    pub op: Shared<OpBinary>,
    pub init: Option<Value>,
}

pub struct MReduceParams {
    pub out: Shared<Scalar>,
    pub input: Shared<Matrix>,
    pub op: Shared<OpBinary>,
    pub init: Option<Value>,
}

fn fold(values: impl Iterator<Item = Value>, op: &OpBinary, init: Option<Value>) -> Option<Value> {
    values.fold(init, |acc, v| {
        Some(match acc {
            Some(prev) => op.apply(&prev, &v),
            None => v,
        })
    })
}

pub struct VectorTreeReduce;

impl super::VReduceAlgorithm for VectorTreeReduce {
    fn name(&self) -> &str {
        "v_reduce_tree"
    }
    fn description(&self) -> &str {
        "per-block partial reduce in parallel, combined sequentially on the caller"
    }
    fn select(&self, _p: &VReduceParams) -> bool {
        true
    }
    fn execute(&self, p: &VReduceParams) -> Result<()> {
        let mut blocks: Vec<usize> = p.input.storage().blocks().map(|(k, _)| k).collect();
        blocks.sort_unstable();
        let partials: Vec<Value> = blocks
            .into_par_iter()
            .filter_map(|block| {
                let decoration = p.input.storage().get_block(block)?;
                let coo = decoration.get_coo(None);
                fold(coo.values.iter().cloned(), &p.op, None)
            })
            .collect();
        match fold(partials.into_iter(), &p.op, p.init.clone()) {
            Some(v) => p.out.set(v),
            None => p.out.clear(),
        }
        Ok(())
    }
}

pub struct MatrixTreeReduce;

impl super::MReduceAlgorithm for MatrixTreeReduce {
    fn name(&self) -> &str {
        "m_reduce_tree"
    }
    fn description(&self) -> &str {
        "per-block partial reduce in parallel, combined sequentially on the caller"
    }
    fn select(&self, _p: &MReduceParams) -> bool {
        true
    }
    fn execute(&self, p: &MReduceParams) -> Result<()> {
        let mut blocks: Vec<(usize, usize)> = p.input.storage().blocks().map(|(k, _)| k).collect();
        blocks.sort_unstable();
        let partials: Vec<Value> = blocks
            .into_par_iter()
            .filter_map(|block| {
                let decoration = p.input.storage().get_block(block)?;
                let coo = decoration.get_coo(None);
                fold(coo.values.iter().cloned(), &p.op, None)
            })
            .collect();
        match fold(partials.into_iter(), &p.op, p.init.clone()) {
            Some(v) => p.out.set(v),
            None => p.out.clear(),
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
    fn v_reduce_sums_across_blocks() {
        let v = Vector::with_block_size(INT.clone(), 100, 16);
        v.set(1, Value::Int(2), None).unwrap();
        v.set(40, Value::Int(3), None).unwrap();
        let out = Scalar::new(INT.clone());
        let params = VReduceParams { out: out.clone(), input: v, op: builtin::plus_int(), init: None };
        super::super::V_REDUCE.dispatch(&params).unwrap();
        assert_eq!(out.get(), Some(Value::Int(5)));
    }

    #[test]
    fn v_reduce_seeds_with_init() {
        let v = Vector::new(INT.clone(), 4);
        v.set(0, Value::Int(2), None).unwrap();
        let out = Scalar::new(INT.clone());
        let params = VReduceParams { out: out.clone(), input: v, op: builtin::plus_int(), init: Some(Value::Int(10)) };
        super::super::V_REDUCE.dispatch(&params).unwrap();
        assert_eq!(out.get(), Some(Value::Int(12)));
    }

    #[test]
    fn m_reduce_empty_matrix_is_empty_scalar() {
        let m = Matrix::new(INT.clone(), 4, 4);
        let out = Scalar::new(INT.clone());
        let params = MReduceParams { out: out.clone(), input: m, op: builtin::plus_int(), init: None };
        super::super::M_REDUCE.dispatch(&params).unwrap();
        assert!(out.is_empty());
    }
}
