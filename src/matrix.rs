//! Matrix (spec §3, §6): a two-dimensional sparse entity over
//! `nrows x ncols` of a given [`Type`]. As with [`crate::vector::Vector`],
//! the element type is a runtime handle rather than a Rust generic.

use crate::error::{Error, Result};
use crate::ops::OpBinary;
use crate::scalar::Scalar;
use crate::shared::Shared;
use crate::storage::{MatrixStorage, DEFAULT_BLOCK_SIZE};
use crate::types::{Type, Value};

pub struct Matrix {
    ty: Shared<Type>,
    storage: MatrixStorage,
}

impl Matrix {
    pub fn new(ty: Shared<Type>, nrows: usize, ncols: usize) -> Shared<Self> {
        Self::with_block_size(ty, nrows, ncols, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(ty: Shared<Type>, nrows: usize, ncols: usize, block_size: usize) -> Shared<Self> {
        Shared::new(Matrix { ty, storage: MatrixStorage::new(nrows, ncols, block_size) })
    }

    pub fn ty(&self) -> &Shared<Type> {
        &self.ty
    }

    pub fn nrows(&self) -> usize {
        self.storage.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.storage.ncols()
    }

    pub fn nvals(&self) -> usize {
        self.storage.nvals(None)
    }

    pub(crate) fn storage(&self) -> &MatrixStorage {
        &self.storage
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.nrows() || col >= self.ncols() {
            return Err(Error::invalid_argument(format!(
                "matrix coordinate ({row}, {col}) out of range for {}x{}",
                self.nrows(),
                self.ncols()
            )));
        }
        Ok(())
    }

    pub fn set(&self, row: usize, col: usize, value: Value, accumulator: Option<&OpBinary>) -> Result<()> {
        self.check_bounds(row, col)?;
        self.storage.write_coord(row, col, |dok, local_row, local_col| {
            let key = (local_row, local_col);
            if let Some(op) = accumulator {
                if let Some(old) = dok.entries.get(&key) {
                    let combined = op.apply(old, &value);
                    dok.entries.insert(key, combined);
                    return;
                }
            }
            dok.entries.insert(key, value);
        });
        Ok(())
    }

    pub fn build(
        &self,
        rows: &[usize],
        cols: &[usize],
        values: &[Value],
        accumulator: Option<&OpBinary>,
    ) -> Result<()> {
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(Error::invalid_argument("matrix build: rows/cols/values length mismatch"));
        }
        for ((r, c), v) in rows.iter().zip(cols.iter()).zip(values.iter()) {
            self.set(*r, *c, v.clone(), accumulator)?;
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Option<Value>> {
        self.check_bounds(row, col)?;
        let (block, local) = self.storage.block_index(row, col);
        Ok(self.storage.get_block(block).and_then(|b| b.get_dok(None).entries.get(&local).cloned()))
    }

    /// Reads out every populated coordinate in ascending `(row, col)`
    /// order, as parallel `(rows, cols, values)` vectors.
    pub fn read(&self) -> (Vec<usize>, Vec<usize>, Vec<Value>) {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut values = Vec::new();
        let mut blocks: Vec<(usize, usize)> = self.storage.blocks().map(|(k, _)| k).collect();
        blocks.sort_unstable();
        let block_size = self.block_size();
        for block in blocks {
            let decoration = self.storage.get_block(block).expect("block listed by iterator must exist");
            let coo = decoration.get_coo(None);
            let (row_base, col_base) = (block.0 * block_size, block.1 * block_size);
            for ((r, c), v) in coo.rows.iter().zip(coo.cols.iter()).zip(coo.values.iter()) {
                rows.push(row_base + r);
                cols.push(col_base + c);
                values.push(v.clone());
            }
        }
        (rows, cols, values)
    }

    fn block_size(&self) -> usize {
        self.storage.row_block_edge()
    }

    /// Drops every stored value, so subsequent reads see an empty matrix
    /// (spec §4.6 `Descriptor::replace`).
    pub fn clear(&self) {
        self.storage.clear();
    }

    pub fn reduce(&self, op: &OpBinary) -> Shared<Scalar> {
        let (_, _, values) = self.read();
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
