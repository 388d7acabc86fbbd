//! Algorithm registry & dispatch (spec §4.7): one registry per operation
//! kind, each holding an ordered list of candidate algorithms. Dispatch
//! walks the list in registration order and runs the first whose
//! `select` accepts the operands, mirroring the original's
//! `AlgorithmManager::SelectAlgorithm` (`original_source/sources/algo/
//! SplaAlgorithmManager.cpp`): registration order therefore encodes
//! preference, typically accelerator-specialised candidates before the
//! generic CPU fallback.
//!
//! Each operation kind has its own parameter shape, so rather than one
//! registry generic over a single `Params` type, [`define_registry`]
//! stamps out a small, independently-typed registry + trait pair per
//! kind. The format kernels themselves (CSR `mxv`, COO transpose, etc.)
//! live in the sibling modules and are registered into these registries
//! by [`install_builtin_algorithms`].

pub mod assign;
pub mod ewise;
pub mod mxv;
pub mod reduce;
pub mod transpose;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::shared::Shared;

/// Stamps out a `{Name}Algorithm` trait and a `{Name}Registry` type
/// holding an ordered `Vec` of candidates for one operation kind, plus a
/// `dispatch` that runs the first matching candidate (spec §4.7).
macro_rules! define_registry {
    ($algo_trait:ident, $registry:ident, $params:ty) => {
        pub trait $algo_trait: Send + Sync {
            fn name(&self) -> &str;
            fn description(&self) -> &str;
            fn select(&self, params: &$params) -> bool;
            fn execute(&self, params: &$params) -> Result<()>;
        }

        pub struct $registry {
            candidates: RwLock<Vec<Shared<dyn $algo_trait>>>,
        }

        impl $registry {
            fn new() -> Self {
                $registry { candidates: RwLock::new(Vec::new()) }
            }

            pub fn register(&self, algo: Shared<dyn $algo_trait>) {
                self.candidates.write().push(algo);
            }

            /// Runs the first candidate that accepts `params`, in
            /// registration order (spec §4.7 selection rule).
            pub fn dispatch(&self, params: &$params) -> Result<()> {
                let candidates = self.candidates.read();
                for algo in candidates.iter() {
                    if algo.select(params) {
                        tracing::debug!(algorithm = algo.name(), "dispatching algorithm");
                        return algo.execute(params);
                    }
                }
                Err(Error::NoAlgorithm(format!(
                    "no registered algorithm accepted the operands ({} candidates tried)",
                    candidates.len()
                )))
            }
        }
    };
}

pub(crate) use define_registry;

define_registry!(MxvAlgorithm, MxvRegistry, mxv::MxvParams);
define_registry!(TransposeAlgorithm, TransposeRegistry, transpose::TransposeParams);
define_registry!(VReduceAlgorithm, VReduceRegistry, reduce::VReduceParams);
define_registry!(MReduceAlgorithm, MReduceRegistry, reduce::MReduceParams);
define_registry!(VSelectCountAlgorithm, VSelectCountRegistry, assign::VSelectCountParams);
define_registry!(VAssignAlgorithm, VAssignRegistry, assign::VAssignParams);
define_registry!(VEwiseAddAlgorithm, VEwiseAddRegistry, ewise::VEwiseAddParams);
define_registry!(MEwiseAddAlgorithm, MEwiseAddRegistry, ewise::MEwiseAddParams);

pub static MXV: Lazy<MxvRegistry> = Lazy::new(MxvRegistry::new);
pub static TRANSPOSE: Lazy<TransposeRegistry> = Lazy::new(TransposeRegistry::new);
pub static V_REDUCE: Lazy<VReduceRegistry> = Lazy::new(VReduceRegistry::new);
pub static M_REDUCE: Lazy<MReduceRegistry> = Lazy::new(MReduceRegistry::new);
pub static V_SELECT_COUNT: Lazy<VSelectCountRegistry> = Lazy::new(VSelectCountRegistry::new);
pub static V_ASSIGN: Lazy<VAssignRegistry> = Lazy::new(VAssignRegistry::new);
pub static V_EWISE_ADD: Lazy<VEwiseAddRegistry> = Lazy::new(VEwiseAddRegistry::new);
pub static M_EWISE_ADD: Lazy<MEwiseAddRegistry> = Lazy::new(MEwiseAddRegistry::new);

/// Registers the reference algorithms shipped by this crate. Idempotent
/// in practice (called once from a `once_cell::sync::Lazy` via
/// [`ensure_installed`]), analogous to the original's
/// `SplaLibraryPrivate` constructor populating its `AlgorithmManager`.
fn install_builtin_algorithms() {
    MXV.register(Shared::new(mxv::CsrPull));
    MXV.register(Shared::new(mxv::GenericCooFallback));
    TRANSPOSE.register(Shared::new(transpose::CooTranspose));
    V_REDUCE.register(Shared::new(reduce::VectorTreeReduce));
    M_REDUCE.register(Shared::new(reduce::MatrixTreeReduce));
    V_SELECT_COUNT.register(Shared::new(assign::SelectCountCoo));
    V_ASSIGN.register(Shared::new(assign::AssignCoo));
    V_EWISE_ADD.register(Shared::new(ewise::VectorEwiseAddCoo));
    M_EWISE_ADD.register(Shared::new(ewise::MatrixEwiseAddCoo));
}

static INSTALLED: Lazy<()> = Lazy::new(install_builtin_algorithms);

/// Forces registration of the built-in algorithms. Every public entry
/// point that dispatches through a registry calls this first; it is a
/// no-op after the first call.
pub fn ensure_installed() {
    Lazy::force(&INSTALLED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_at_least_one_candidate_per_kind() {
        ensure_installed();
        assert!(!MXV.candidates.read().is_empty());
        assert!(!TRANSPOSE.candidates.read().is_empty());
        assert!(!V_REDUCE.candidates.read().is_empty());
        assert!(!M_REDUCE.candidates.read().is_empty());
        assert!(!V_SELECT_COUNT.candidates.read().is_empty());
        assert!(!V_ASSIGN.candidates.read().is_empty());
        assert!(!V_EWISE_ADD.candidates.read().is_empty());
        assert!(!M_EWISE_ADD.candidates.read().is_empty());
    }
}
