//! `v_select_count` / `v_assign` (spec §4.6, §4.7 dispatch sketch):
//! `v_select_count` counts the populated indices for which a selector
//! operator accepts the stored value; `v_assign` treats an optional
//! selector as a structural filter over the input vector's values and
//! copies the accepted `(index, value)` pairs into `out`, further
//! filtered by an optional mask, subject to the usual replace/accumulator
//! descriptor semantics. Grounded in `SplaVectorAssignCOO.cpp`'s
//! `output`/`input`/`mask` operand triple (`original_source/sources/algo/
//! vector/SplaVectorAssignCOO.cpp`), whose `Process` body is an empty stub.

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::ops::OpSelect;
use crate::scalar::Scalar;
use crate::shared::Shared;
use crate::types::Value;
use crate::vector::Vector;

pub struct VSelectCountParams {
    pub out: Shared<Scalar>,
    pub input: Shared<Vector>,
    pub selector: Shared<OpSelect>,
}

pub struct VAssignParams {
    pub out: Shared<Vector>,
    pub mask: Option<Shared<Vector>>,
    pub input: Shared<Vector>,
    pub selector: Option<Shared<OpSelect>>,
    pub descriptor: Descriptor,
}

pub struct SelectCountCoo;

impl super::VSelectCountAlgorithm for SelectCountCoo {
    fn name(&self) -> &str {
        "v_select_count_coo"
    }
    fn description(&self) -> &str {
        "scan every stored value, count the ones the selector accepts"
    }
    fn select(&self, _p: &VSelectCountParams) -> bool {
        true
    }
    fn execute(&self, p: &VSelectCountParams) -> Result<()> {
        let (_, values) = p.input.read();
        let count = values.iter().filter(|v| p.selector.apply(v)).count();
        p.out.set(Value::Uint(count as u64));
        Ok(())
    }
}

pub struct AssignCoo;

impl super::VAssignAlgorithm for AssignCoo {
    fn name(&self) -> &str {
        "v_assign_coo"
    }
    fn description(&self) -> &str {
        "copy stored (index, value) pairs from input into out, filtered by selector and mask"
    }
    fn select(&self, _p: &VAssignParams) -> bool {
        true
    }
    fn execute(&self, p: &VAssignParams) -> Result<()> {
        if p.descriptor.replace() {
            p.out.clear();
        }
        let complement = p.descriptor.mask_complement();
        let (indices, values) = p.input.read();
        for (index, value) in indices.into_iter().zip(values.into_iter()) {
            if let Some(selector) = &p.selector {
                if !selector.apply(&value) {
                    continue;
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpSelect;
    use crate::types::{BOOL, INT};

    fn positive() -> Shared<OpSelect> {
        OpSelect::new(
            "positive",
            INT.clone(),
            "bool_t positive(int_t a) { return a > 0; }",
            Box::new(|v| matches!(v, Value::Int(x) if *x > 0)),
        )
    }

    #[test]
    fn select_count_counts_accepted_values() {
        let v = Vector::new(INT.clone(), 4);
        v.set(0, Value::Int(5), None).unwrap();
        v.set(1, Value::Int(-1), None).unwrap();
        v.set(2, Value::Int(2), None).unwrap();
        let out = Scalar::new(INT.clone());
        let params = VSelectCountParams { out: out.clone(), input: v, selector: positive() };
        super::super::V_SELECT_COUNT.dispatch(&params).unwrap();
        assert_eq!(out.get(), Some(Value::Uint(2)));
    }

    #[test]
    fn assign_respects_mask() {
        let input = Vector::new(INT.clone(), 4);
        input.set(0, Value::Int(1), None).unwrap();
        input.set(1, Value::Int(2), None).unwrap();
        let mask = Vector::new(BOOL.clone(), 4);
        mask.set(0, Value::Bool(true), None).unwrap();
        let out = Vector::new(INT.clone(), 4);

        let params =
            VAssignParams { out: out.clone(), mask: Some(mask), input, selector: None, descriptor: Descriptor::new() };
        super::super::V_ASSIGN.dispatch(&params).unwrap();

        assert_eq!(out.get(0).unwrap(), Some(Value::Int(1)));
        assert_eq!(out.get(1).unwrap(), None);
    }

    #[test]
    fn assign_selector_filters_input_values() {
        let input = Vector::new(INT.clone(), 4);
        input.set(0, Value::Int(5), None).unwrap();
        input.set(1, Value::Int(-2), None).unwrap();
        let out = Vector::new(INT.clone(), 4);

        let params =
            VAssignParams { out: out.clone(), mask: None, input, selector: Some(positive()), descriptor: Descriptor::new() };
        super::super::V_ASSIGN.dispatch(&params).unwrap();

        assert_eq!(out.get(0).unwrap(), Some(Value::Int(5)));
        assert_eq!(out.get(1).unwrap(), None);
    }
}
