//! Decoration cache (spec §4.2): each vector/matrix block keeps at most one
//! representation per format, lazily converted into from whichever valid
//! format is cheapest to convert from. A write always goes through one
//! "primary" format and invalidates every other cached format; the next
//! read in a different format triggers exactly one conversion, which is
//! then itself cached until the next write.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::conversions as conv;
use crate::formats::matrix::{MatrixCoo, MatrixCsr, MatrixDok};
use crate::formats::vector::{VectorCoo, VectorDense, VectorDok};
use crate::formats::{MatrixFormatTag, VectorFormatTag};
use crate::ops::OpBinary;

/// Generates the version-counter and invalidation bookkeeping shared by
/// every decoration cache, regardless of which formats it holds. The
/// per-format storage and conversion logic is still written by hand below,
/// since each cache's formats have nothing in common structurally.
macro_rules! version_tracked_cache {
    ($name:ident, $tag:ty) => {
        struct $name {
            valid: RwLock<HashSet<$tag>>,
            primary: RwLock<$tag>,
            version: AtomicU64,
        }

        impl $name {
            fn bump(&self, new_primary: $tag) {
                let mut valid = self.valid.write();
                valid.clear();
                valid.insert(new_primary);
                *self.primary.write() = new_primary;
                self.version.fetch_add(1, Ordering::Relaxed);
            }

            fn mark_valid(&self, tag: $tag) {
                self.valid.write().insert(tag);
            }

            fn is_valid(&self, tag: $tag) -> bool {
                self.valid.read().contains(&tag)
            }

            fn version(&self) -> u64 {
                self.version.load(Ordering::Relaxed)
            }
        }
    };
}

version_tracked_cache!(VectorTracker, VectorFormatTag);
version_tracked_cache!(MatrixTracker, MatrixFormatTag);

/// Cost of converting from `src` to `dst`. Lower is cheaper; `0` for the
/// no-op case. Ties (e.g. two equally-costed sources both valid) are
/// broken toward the most-recently-written format by the caller.
fn vector_conversion_cost(src: VectorFormatTag, dst: VectorFormatTag) -> u32 {
    use VectorFormatTag::*;
    if src == dst {
        return 0;
    }
    match (src, dst) {
        (Dok, Coo) | (Coo, Dok) => 1,
        (Coo, Dense) | (Dense, Coo) => 1,
        (Dok, Dense) | (Dense, Dok) => 2,
        (AccelCoo, Coo) | (Coo, AccelCoo) => 1,
        (AccelDense, Dense) | (Dense, AccelDense) => 1,
        _ => 3,
    }
}

fn matrix_conversion_cost(src: MatrixFormatTag, dst: MatrixFormatTag) -> u32 {
    use MatrixFormatTag::*;
    if src == dst {
        return 0;
    }
    match (src, dst) {
        (Dok, Coo) | (Coo, Dok) => 1,
        (Coo, Csr) | (Csr, Coo) => 1,
        (Dok, Csr) | (Csr, Dok) => 2,
        (AccelCoo, Coo) | (Coo, AccelCoo) => 1,
        (AccelCsr, Csr) | (Csr, AccelCsr) => 1,
        _ => 3,
    }
}

/// Decoration cache for a single vector block.
pub struct VectorDecoration {
    tracker: VectorTracker,
    dok: RwLock<VectorDok>,
    coo: RwLock<VectorCoo>,
    dense: RwLock<VectorDense>,
    len: usize,
}

impl VectorDecoration {
    pub fn new(len: usize) -> Self {
        VectorDecoration {
            tracker: VectorTracker {
                valid: RwLock::new(HashSet::from([VectorFormatTag::Dok])),
                primary: RwLock::new(VectorFormatTag::Dok),
                version: AtomicU64::new(0),
            },
            dok: RwLock::new(VectorDok::default()),
            coo: RwLock::new(VectorCoo::default()),
            dense: RwLock::new(VectorDense::new(len)),
            len,
        }
    }

    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    /// Applies `f` to the primary dok representation and invalidates every
    /// other cached format (spec §4.2 write semantics).
    pub fn write_dok(&self, f: impl FnOnce(&mut VectorDok)) {
        f(&mut self.dok.write());
        self.tracker.bump(VectorFormatTag::Dok);
    }

    fn cheapest_valid_source(&self, dst: VectorFormatTag) -> VectorFormatTag {
        let valid = self.tracker.valid.read();
        let primary = *self.tracker.primary.read();
        valid
            .iter()
            .copied()
            .min_by_key(|src| (vector_conversion_cost(*src, dst), *src != primary))
            .unwrap_or(primary)
    }

    pub fn get_coo(&self, accumulator: Option<&OpBinary>) -> VectorCoo {
        if self.tracker.is_valid(VectorFormatTag::Coo) {
            return self.coo.read().clone();
        }
        let src = self.cheapest_valid_source(VectorFormatTag::Coo);
        let built = match src {
            VectorFormatTag::Dok => conv::vector_dok_to_coo(&self.dok.read()),
            VectorFormatTag::Dense => conv::vector_dense_to_coo(&self.dense.read()),
            _ => conv::vector_coo_canonicalize(&self.coo.read(), accumulator),
        };
        *self.coo.write() = built.clone();
        self.tracker.mark_valid(VectorFormatTag::Coo);
        built
    }

    pub fn get_dok(&self, accumulator: Option<&OpBinary>) -> VectorDok {
        if self.tracker.is_valid(VectorFormatTag::Dok) {
            return self.dok.read().clone();
        }
        let coo = self.get_coo(accumulator);
        let built = conv::vector_coo_to_dok(&coo, accumulator);
        *self.dok.write() = VectorDok { entries: built.entries.clone() };
        self.tracker.mark_valid(VectorFormatTag::Dok);
        built
    }

    pub fn get_dense(&self, accumulator: Option<&OpBinary>) -> VectorDense {
        if self.tracker.is_valid(VectorFormatTag::Dense) {
            return self.dense.read().clone();
        }
        let coo = self.get_coo(accumulator);
        let built = conv::vector_coo_to_dense(&coo, self.len, accumulator);
        *self.dense.write() = built.clone();
        self.tracker.mark_valid(VectorFormatTag::Dense);
        built
    }

    pub fn nvals(&self, accumulator: Option<&OpBinary>) -> usize {
        self.get_coo(accumulator).nvals()
    }
}

/// Decoration cache for a single matrix block.
pub struct MatrixDecoration {
    tracker: MatrixTracker,
    dok: RwLock<MatrixDok>,
    coo: RwLock<MatrixCoo>,
    csr: RwLock<MatrixCsr>,
    nrows: usize,
}

impl MatrixDecoration {
    pub fn new(nrows: usize) -> Self {
        MatrixDecoration {
            tracker: MatrixTracker {
                valid: RwLock::new(HashSet::from([MatrixFormatTag::Dok])),
                primary: RwLock::new(MatrixFormatTag::Dok),
                version: AtomicU64::new(0),
            },
            dok: RwLock::new(MatrixDok::default()),
            coo: RwLock::new(MatrixCoo::default()),
            csr: RwLock::new(MatrixCsr::new_empty(nrows)),
            nrows,
        }
    }

    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    pub fn write_dok(&self, f: impl FnOnce(&mut MatrixDok)) {
        f(&mut self.dok.write());
        self.tracker.bump(MatrixFormatTag::Dok);
    }

    fn cheapest_valid_source(&self, dst: MatrixFormatTag) -> MatrixFormatTag {
        let valid = self.tracker.valid.read();
        let primary = *self.tracker.primary.read();
        valid
            .iter()
            .copied()
            .min_by_key(|src| (matrix_conversion_cost(*src, dst), *src != primary))
            .unwrap_or(primary)
    }

    pub fn get_coo(&self, accumulator: Option<&OpBinary>) -> MatrixCoo {
        if self.tracker.is_valid(MatrixFormatTag::Coo) {
            return self.coo.read().clone();
        }
        let src = self.cheapest_valid_source(MatrixFormatTag::Coo);
        let built = match src {
            MatrixFormatTag::Dok => conv::matrix_dok_to_coo(&self.dok.read()),
            MatrixFormatTag::Csr => conv::matrix_csr_to_coo(&self.csr.read()),
            _ => conv::matrix_coo_canonicalize(&self.coo.read(), accumulator),
        };
        *self.coo.write() = built.clone();
        self.tracker.mark_valid(MatrixFormatTag::Coo);
        built
    }

    pub fn get_dok(&self, accumulator: Option<&OpBinary>) -> MatrixDok {
        if self.tracker.is_valid(MatrixFormatTag::Dok) {
            return self.dok.read().clone();
        }
        let coo = self.get_coo(accumulator);
        let built = conv::matrix_coo_to_dok(&coo, accumulator);
        *self.dok.write() = MatrixDok { entries: built.entries.clone() };
        self.tracker.mark_valid(MatrixFormatTag::Dok);
        built
    }

    pub fn get_csr(&self, accumulator: Option<&OpBinary>) -> MatrixCsr {
        if self.tracker.is_valid(MatrixFormatTag::Csr) {
            return self.csr.read().clone();
        }
        let coo = conv::matrix_coo_canonicalize(&self.get_coo(accumulator), accumulator);
        let built = conv::matrix_coo_to_csr(&coo, self.nrows);
        *self.csr.write() = built.clone();
        self.tracker.mark_valid(MatrixFormatTag::Csr);
        built
    }

    pub fn nvals(&self, accumulator: Option<&OpBinary>) -> usize {
        self.get_coo(accumulator).nvals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;
    use crate::types::Value;

    #[test]
    fn write_then_read_other_format_converts_lazily() {
        let dec = VectorDecoration::new(8);
        dec.write_dok(|d| {
            d.entries.insert(3, Value::Int(30));
            d.entries.insert(1, Value::Int(10));
        });
        assert_eq!(dec.version(), 1);
        let coo = dec.get_coo(None);
        assert_eq!(coo.indices, vec![1, 3]);
        let dense = dec.get_dense(None);
        assert_eq!(dense.slots[1], Some(Value::Int(10)));
        assert_eq!(dense.slots[3], Some(Value::Int(30)));
    }

    #[test]
    fn write_invalidates_previously_cached_formats() {
        let dec = VectorDecoration::new(4);
        dec.write_dok(|d| {
            d.entries.insert(0, Value::Int(1));
        });
        let _ = dec.get_dense(None);
        dec.write_dok(|d| {
            d.entries.insert(1, Value::Int(2));
        });
        // Dense is now stale; nvals must reflect both writes, not the
        // cached one-entry dense snapshot.
        assert_eq!(dec.nvals(None), 2);
    }

    #[test]
    fn matrix_csr_conversion_round_trips_after_write() {
        let dec = MatrixDecoration::new(4);
        dec.write_dok(|d| {
            d.entries.insert((2, 1), Value::Int(7));
            d.entries.insert((0, 0), Value::Int(1));
        });
        let csr = dec.get_csr(None);
        assert_eq!(csr.nvals(), 2);
        assert_eq!(csr.row(0).0, &[0]);
        assert_eq!(csr.row(2).0, &[1]);
    }

    #[test]
    fn reads_with_accumulator_do_not_panic_on_single_entries() {
        let dec = VectorDecoration::new(4);
        dec.write_dok(|d| {
            d.entries.insert(0, Value::Int(1));
        });
        let plus = builtin::plus_int();
        assert_eq!(dec.nvals(Some(&plus)), 1);
    }
}
