//! `mxv` (spec §4.6, §4.7 dispatch sketch): `out = mask ⊙ (matrix
//! ×[mult,add] in_vec)`. The reference algorithm pulls one output row at
//! a time off the matrix's CSR decoration — grounded in the dispatch
//! sketch's "for each row i ... launch a cooperative group per row" shape,
//! translated to a `rayon` parallel iterator over rows instead of an
//! accelerator cooperative-group launch, since the CPU backend has no
//! device queue to enqueue onto.

use rayon::prelude::*;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::ops::OpBinary;
use crate::shared::Shared;
use crate::types::Value;
use crate::vector::Vector;

pub struct MxvParams {
    pub out: Shared<Vector>,
    pub mask: Option<Shared<Vector>>,
    pub matrix: Shared<Matrix>,
    pub input: Shared<Vector>,
    pub mult_op: Shared<OpBinary>,
    pub add_op: Shared<OpBinary>,
    pub descriptor: Descriptor,
}

/// Computes one output row: `add_op`-reduces `mult_op(a_val, in[col])`
/// over every stored `(col, a_val)` in that row for which `in` has a
/// value. Rows with no contributing column are absent from the result,
/// same as the original's row-sparse `mxv` (no additive identity is
/// assumed, spec §3).
fn row_result(cols: &[usize], vals: &[Value], input: &Vector, mult_op: &OpBinary, add_op: &OpBinary) -> Option<Value> {
    let mut acc: Option<Value> = None;
    for (col, a_val) in cols.iter().zip(vals.iter()) {
        if let Some(v_val) = input.get(*col).ok().flatten() {
            let contribution = mult_op.apply(a_val, &v_val);
            acc = Some(match acc {
                Some(prev) => add_op.apply(&prev, &contribution),
                None => contribution,
            });
        }
    }
    acc
}

fn mask_accepts(mask: &Option<Shared<Vector>>, complement: bool, row: usize) -> bool {
    match mask {
        None => true,
        Some(m) => {
            let present = m.get(row).ok().flatten().is_some();
            present != complement
        }
    }
}

fn run(p: &MxvParams) -> Result<()> {
    let csr = p.matrix.storage().get_block((0, 0)).map(|b| b.get_csr(None));
    let nrows = p.matrix.nrows();

    let rows: Vec<(usize, Value)> = (0..nrows)
        .into_par_iter()
        .filter_map(|row| {
            if !mask_accepts(&p.mask, p.descriptor.mask_complement(), row) {
                return None;
            }
            let (cols, vals) = match &csr {
                Some(csr) if row < csr.nrows() => csr.row(row),
                _ => (&[][..], &[][..]),
            };
            row_result(cols, vals, &p.input, &p.mult_op, &p.add_op).map(|v| (row, v))
        })
        .collect();

    if p.descriptor.replace() {
        p.out.clear();
    }
    for (row, value) in rows {
        p.out.set(row, value, p.descriptor.accumulator().map(|op| op.as_ref()))?;
    }
    Ok(())
}

/// Requires the matrix's only block to already be materialisable as CSR
/// (true for any single-block matrix, which is every matrix smaller than
/// one block edge — spec §3's default block size is large enough that
/// this covers ordinary use).
pub struct CsrPull;

impl super::MxvAlgorithm for CsrPull {
    fn name(&self) -> &str {
        "mxv_csr_pull"
    }
    fn description(&self) -> &str {
        "row-parallel pull over a CSR-decorated single-block matrix"
    }
    fn select(&self, p: &MxvParams) -> bool {
        p.matrix.storage().block_count_populated() <= 1
    }
    fn execute(&self, p: &MxvParams) -> Result<()> {
        run(p)
    }
}

/// Multi-block fallback: iterates every populated block instead of
/// assuming a single one. Registered after [`CsrPull`] so it only matters
/// once a matrix has outgrown a single block (spec §4.7 registration
/// order encodes preference).
pub struct GenericCooFallback;

impl super::MxvAlgorithm for GenericCooFallback {
    fn name(&self) -> &str {
        "mxv_generic_coo"
    }
    fn description(&self) -> &str {
        "per-block CSR pull merged across a matrix's whole grid"
    }
    fn select(&self, _p: &MxvParams) -> bool {
        true
    }
    fn execute(&self, p: &MxvParams) -> Result<()> {
        if p.descriptor.replace() {
            p.out.clear();
        }
        let nrows = p.matrix.nrows();
        let block_edge = p.matrix.storage().row_block_edge();
        let mut blocks: Vec<(usize, usize)> = p.matrix.storage().blocks().map(|(k, _)| k).collect();
        blocks.sort_unstable();
        let mut combined: std::collections::HashMap<usize, Value> = std::collections::HashMap::new();
        for block in blocks {
            let decoration = p.matrix.storage().get_block(block).expect("listed block must exist");
            let csr = decoration.get_csr(None);
            let row_base = block.0 * block_edge;
            for local_row in 0..csr.nrows() {
                let global_row = row_base + local_row;
                if global_row >= nrows || !mask_accepts(&p.mask, p.descriptor.mask_complement(), global_row) {
                    continue;
                }
                let (cols, vals) = csr.row(local_row);
                let col_base = block.1 * block_edge;
                let shifted_cols: Vec<usize> = cols.iter().map(|c| c + col_base).collect();
                if let Some(v) = row_result(&shifted_cols, vals, &p.input, &p.mult_op, &p.add_op) {
                    combined
                        .entry(global_row)
                        .and_modify(|old| *old = p.add_op.apply(old, &v))
                        .or_insert(v);
                }
            }
        }
        for (row, value) in combined {
            p.out.set(row, value, p.descriptor.accumulator().map(|op| op.as_ref()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;
    use crate::types::{BOOL, INT};

    #[test]
    fn mxv_structural_one_step_frontier() {
        // S3: A is a 4x4 adjacency {(0,1),(1,2),(2,3),(3,0)}; v = [1,0,0,0].
        // u = A^T x_{AND,OR} v is the one-step forward BFS frontier of {0},
        // i.e. {1} (the row-pull convention computes out[i] = reduce over j
        // of A^T[i,j] and v[j], so only row 1, which holds A^T[1,0] from
        // edge 0->1, contributes). A^T: swap coordinates.
        let at = Matrix::new(BOOL.clone(), 4, 4);
        for (r, c) in [(1, 0), (2, 1), (3, 2), (0, 3)] {
            at.set(r, c, Value::Bool(true), None).unwrap();
        }
        let v = Vector::new(BOOL.clone(), 4);
        v.set(0, Value::Bool(true), None).unwrap();
        let out = Vector::new(BOOL.clone(), 4);

        let params = MxvParams {
            out: out.clone(),
            mask: None,
            matrix: at,
            input: v,
            mult_op: builtin::and_bool(),
            add_op: builtin::or_bool(),
            descriptor: Descriptor::new(),
        };
        super::super::MXV.dispatch(&params).unwrap();
        let (indices, values) = out.read();
        assert_eq!(indices, vec![1]);
        assert_eq!(values, vec![Value::Bool(true)]);
    }

    #[test]
    fn mxv_replace_clears_existing_output() {
        let a = Matrix::new(INT.clone(), 2, 2);
        a.set(0, 0, Value::Int(1), None).unwrap();
        let v = Vector::new(INT.clone(), 2);
        v.set(0, Value::Int(1), None).unwrap();
        let out = Vector::new(INT.clone(), 2);
        out.set(1, Value::Int(99), None).unwrap();

        let params = MxvParams {
            out: out.clone(),
            mask: None,
            matrix: a,
            input: v,
            mult_op: builtin::times_int(),
            add_op: builtin::plus_int(),
            descriptor: Descriptor::new().with_replace(true),
        };
        super::super::MXV.dispatch(&params).unwrap();
        assert_eq!(out.get(1).unwrap(), None);
        assert_eq!(out.get(0).unwrap(), Some(Value::Int(1)));
    }
}
