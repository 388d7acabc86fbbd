//! Blocked storage (spec §3): an entity's coordinate space is tiled into
//! fixed-size blocks, each with its own [`decoration::VectorDecoration`] /
//! [`decoration::MatrixDecoration`]. Only blocks that have ever been
//! written exist in the map; reading an unwritten block yields an empty
//! representation without allocating one.

use dashmap::DashMap;

use crate::decoration::{MatrixDecoration, VectorDecoration};
use crate::ops::OpBinary;

/// Default block edge length (spec §3): large enough that most vectors and
/// small matrices fit in a single block, small enough that a huge sparse
/// matrix tiles into a manageable grid instead of one huge dense scan.
pub const DEFAULT_BLOCK_SIZE: usize = 10_000_000;

pub struct VectorStorage {
    block_size: usize,
    len: usize,
    blocks: DashMap<usize, VectorDecoration>,
}

impl VectorStorage {
    pub fn new(len: usize, block_size: usize) -> Self {
        VectorStorage { block_size, len, blocks: DashMap::new() }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn block_count(&self) -> usize {
        self.len.div_ceil(self.block_size)
    }

    fn block_len(&self, block: usize) -> usize {
        let start = block * self.block_size;
        (self.len - start).min(self.block_size)
    }

    pub fn block_index(&self, global_index: usize) -> (usize, usize) {
        (global_index / self.block_size, global_index % self.block_size)
    }

    /// Runs `f` against the block containing `global_index`, creating the
    /// block on first write.
    pub fn write_index(&self, global_index: usize, f: impl FnOnce(&mut crate::formats::vector::VectorDok, usize)) {
        let (block, local) = self.block_index(global_index);
        let len = self.block_len(block);
        let entry = self.blocks.entry(block).or_insert_with(|| VectorDecoration::new(len));
        entry.write_dok(|dok| f(dok, local));
    }

    pub fn nvals(&self, accumulator: Option<&OpBinary>) -> usize {
        self.blocks.iter().map(|b| b.nvals(accumulator)).sum()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (usize, dashmap::mapref::multiple::RefMulti<'_, usize, VectorDecoration>)> {
        self.blocks.iter().map(|r| (*r.key(), r))
    }

    pub fn get_block(&self, block: usize) -> Option<dashmap::mapref::one::Ref<'_, usize, VectorDecoration>> {
        self.blocks.get(&block)
    }

    pub fn block_count_populated(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_block_count(&self) -> usize {
        self.block_count()
    }

    /// Drops every block, so the entity reads back empty (used by
    /// `Descriptor::replace`, spec §4.6).
    pub fn clear(&self) {
        self.blocks.clear();
    }
}

pub struct MatrixStorage {
    block_size: usize,
    nrows: usize,
    ncols: usize,
    blocks: DashMap<(usize, usize), MatrixDecoration>,
}

impl MatrixStorage {
    pub fn new(nrows: usize, ncols: usize, block_size: usize) -> Self {
        MatrixStorage { block_size, nrows, ncols, blocks: DashMap::new() }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    fn row_block_len(&self, p: usize) -> usize {
        let start = p * self.block_size;
        (self.nrows - start).min(self.block_size)
    }

    pub fn block_index(&self, row: usize, col: usize) -> ((usize, usize), (usize, usize)) {
        ((row / self.block_size, col / self.block_size), (row % self.block_size, col % self.block_size))
    }

    /// The grid edge length blocks are tiled at, along both axes (spec §3).
    pub fn row_block_edge(&self) -> usize {
        self.block_size
    }

    pub fn write_coord(
        &self,
        row: usize,
        col: usize,
        f: impl FnOnce(&mut crate::formats::matrix::MatrixDok, usize, usize),
    ) {
        let (block, local) = self.block_index(row, col);
        let row_len = self.row_block_len(block.0);
        let entry = self.blocks.entry(block).or_insert_with(|| MatrixDecoration::new(row_len));
        entry.write_dok(|dok| f(dok, local.0, local.1));
    }

    pub fn nvals(&self, accumulator: Option<&OpBinary>) -> usize {
        self.blocks.iter().map(|b| b.nvals(accumulator)).sum()
    }

    pub fn get_block(&self, block: (usize, usize)) -> Option<dashmap::mapref::one::Ref<'_, (usize, usize), MatrixDecoration>> {
        self.blocks.get(&block)
    }

    /// Drops every block, so the entity reads back empty (used by
    /// `Descriptor::replace`, spec §4.6).
    pub fn clear(&self) {
        self.blocks.clear();
    }

    pub fn blocks(
        &self,
    ) -> impl Iterator<Item = ((usize, usize), dashmap::mapref::multiple::RefMulti<'_, (usize, usize), MatrixDecoration>)>
    {
        self.blocks.iter().map(|r| (*r.key(), r))
    }

    pub fn block_count_populated(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn unwritten_storage_has_no_blocks() {
        let storage = VectorStorage::new(100, 16);
        assert_eq!(storage.block_count_populated(), 0);
        assert_eq!(storage.nvals(None), 0);
    }

    #[test]
    fn writes_spanning_two_blocks_create_two_blocks() {
        let storage = VectorStorage::new(100, 16);
        storage.write_index(3, |dok, local| {
            dok.entries.insert(local, Value::Int(1));
        });
        storage.write_index(20, |dok, local| {
            dok.entries.insert(local, Value::Int(2));
        });
        assert_eq!(storage.block_count_populated(), 2);
        assert_eq!(storage.nvals(None), 2);
    }

    #[test]
    fn matrix_block_index_splits_row_and_column_independently() {
        let storage = MatrixStorage::new(1000, 1000, 100);
        let (block, local) = storage.block_index(250, 50);
        assert_eq!(block, (2, 0));
        assert_eq!(local, (50, 50));
    }
}
