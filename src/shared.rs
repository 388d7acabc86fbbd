//! The original implementation threads an intrusive reference count
//! (`RefCnt`/`RefPtr`) through every library-owned value, with raw
//! back-pointers from expression nodes to their operands. We don't carry
//! that over: every library-owned value (types, operators, scalars,
//! vectors, matrices, expression operands) is shared with the ordinary
//! standard-library primitive instead, and expression nodes hold `Shared<T>`
//! clones of their operands rather than raw pointers.

use std::sync::Arc;

/// Shared ownership handle used throughout the crate in place of the
/// original's intrusive `RefCnt`.
pub type Shared<T> = Arc<T>;
