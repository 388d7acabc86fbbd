//! Descriptor (spec §4.6): the closed set of per-node execution flags
//! plus an accumulator. Grounded in `original_source/spla/descriptor.hpp`,
//! which additionally carries arbitrary custom string fields beyond the
//! closed key set — we keep those too, as inert metadata only.

use std::collections::HashMap;

use crate::ops::OpBinary;
use crate::shared::Shared;

/// Execution flags attached to a write/compute node. The closed keys
/// (`mask_complement`, `replace`, `structural`, `transpose_first`,
/// `transpose_second`, and the accumulator) are the only ones with a
/// defined operational effect; `custom` fields never affect dispatch or
/// results.
#[derive(Default, Clone)]
pub struct Descriptor {
    mask_complement: bool,
    replace: bool,
    structural: bool,
    transpose_first: bool,
    transpose_second: bool,
    accumulator: Option<Shared<OpBinary>>,
    custom: HashMap<String, String>,
}

impl Descriptor {
    pub fn new() -> Self {
        Descriptor::default()
    }

    pub fn with_mask_complement(mut self, v: bool) -> Self {
        self.mask_complement = v;
        self
    }

    pub fn with_replace(mut self, v: bool) -> Self {
        self.replace = v;
        self
    }

    /// Drop values and treat the operand as purely structural (adjacency
    /// only) for the duration of this operation.
    pub fn with_structural(mut self, v: bool) -> Self {
        self.structural = v;
        self
    }

    pub fn with_transpose_first(mut self, v: bool) -> Self {
        self.transpose_first = v;
        self
    }

    pub fn with_transpose_second(mut self, v: bool) -> Self {
        self.transpose_second = v;
        self
    }

    pub fn with_accumulator(mut self, op: Shared<OpBinary>) -> Self {
        self.accumulator = Some(op);
        self
    }

    pub fn mask_complement(&self) -> bool {
        self.mask_complement
    }

    pub fn replace(&self) -> bool {
        self.replace
    }

    pub fn structural(&self) -> bool {
        self.structural
    }

    pub fn transpose_first(&self) -> bool {
        self.transpose_first
    }

    pub fn transpose_second(&self) -> bool {
        self.transpose_second
    }

    pub fn accumulator(&self) -> Option<&Shared<OpBinary>> {
        self.accumulator.as_ref()
    }

    /// Attach forward-compatible metadata, e.g. a human-readable node
    /// label for logging. Never consulted by dispatch or algorithms.
    pub fn set_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.insert(key.into(), value.into());
    }

    pub fn get_custom(&self, key: &str) -> Option<&str> {
        self.custom.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;

    #[test]
    fn builder_sets_closed_keys() {
        let d = Descriptor::new()
            .with_mask_complement(true)
            .with_replace(true)
            .with_accumulator(builtin::plus_int());
        assert!(d.mask_complement());
        assert!(d.replace());
        assert!(!d.structural());
        assert_eq!(d.accumulator().unwrap().name(), "plus");
    }

    #[test]
    fn custom_fields_are_inert_metadata() {
        let mut d = Descriptor::new();
        d.set_custom("label", "bfs frontier");
        assert_eq!(d.get_custom("label"), Some("bfs frontier"));
        assert_eq!(d.get_custom("missing"), None);
    }
}
