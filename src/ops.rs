//! Operator descriptors (spec §3, §4.1): unary `T -> U`, binary
//! `T x U -> V`, and selector `T -> bool` operators. Each carries a kernel
//! source snippet for accelerator compilation plus a host-side callable
//! used by CPU algorithms. Operators are pure descriptors with no mutable
//! state; they are constructed once by the caller and then shared by
//! reference into as many expression nodes as needed.

use bitflags::bitflags;

use crate::shared::Shared;
use crate::types::{Type, Value};

bitflags! {
    /// Metadata flags on a binary operator, used by algorithm selection
    /// (e.g. a reduction's combiner must be associative) and by the
    /// decoration-cache duplicate-combining rule (spec §4.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BinOpFlags: u8 {
        const ASSOCIATIVE = 0b01;
        const COMMUTATIVE = 0b10;
    }
}

/// Host-side callable for a unary operator: `U f(T)`.
pub type UnaryFn = dyn Fn(&Value) -> Value + Send + Sync + 'static;
/// Host-side callable for a binary operator: `V f(T, U)`.
pub type BinaryFn = dyn Fn(&Value, &Value) -> Value + Send + Sync + 'static;
/// Host-side callable for a selector operator: `bool f(T)`.
pub type SelectFn = dyn Fn(&Value) -> bool + Send + Sync + 'static;

pub struct OpUnary {
    name: String,
    arg_ty: Shared<Type>,
    result_ty: Shared<Type>,
    kernel_snippet: String,
    host_fn: Box<UnaryFn>,
}

impl OpUnary {
    pub fn new(
        name: impl Into<String>,
        arg_ty: Shared<Type>,
        result_ty: Shared<Type>,
        kernel_snippet: impl Into<String>,
        host_fn: Box<UnaryFn>,
    ) -> Shared<Self> {
        Shared::new(OpUnary {
            name: name.into(),
            arg_ty,
            result_ty,
            kernel_snippet: kernel_snippet.into(),
            host_fn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn arg_ty(&self) -> &Shared<Type> {
        &self.arg_ty
    }
    pub fn result_ty(&self) -> &Shared<Type> {
        &self.result_ty
    }
    pub fn kernel_snippet(&self) -> &str {
        &self.kernel_snippet
    }

    /// Applicability is a direct type-identity check (spec §4.1).
    pub fn can_apply(&self, arg_ty: &Type) -> bool {
        self.arg_ty.id() == arg_ty.id()
    }

    pub fn apply(&self, arg: &Value) -> Value {
        (self.host_fn)(arg)
    }
}

pub struct OpBinary {
    name: String,
    arg1_ty: Shared<Type>,
    arg2_ty: Shared<Type>,
    result_ty: Shared<Type>,
    kernel_snippet: String,
    host_fn: Box<BinaryFn>,
    flags: BinOpFlags,
}

impl OpBinary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        arg1_ty: Shared<Type>,
        arg2_ty: Shared<Type>,
        result_ty: Shared<Type>,
        kernel_snippet: impl Into<String>,
        host_fn: Box<BinaryFn>,
        flags: BinOpFlags,
    ) -> Shared<Self> {
        Shared::new(OpBinary {
            name: name.into(),
            arg1_ty,
            arg2_ty,
            result_ty,
            kernel_snippet: kernel_snippet.into(),
            host_fn,
            flags,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn arg1_ty(&self) -> &Shared<Type> {
        &self.arg1_ty
    }
    pub fn arg2_ty(&self) -> &Shared<Type> {
        &self.arg2_ty
    }
    pub fn result_ty(&self) -> &Shared<Type> {
        &self.result_ty
    }
    pub fn kernel_snippet(&self) -> &str {
        &self.kernel_snippet
    }
    pub fn is_associative(&self) -> bool {
        self.flags.contains(BinOpFlags::ASSOCIATIVE)
    }
    pub fn is_commutative(&self) -> bool {
        self.flags.contains(BinOpFlags::COMMUTATIVE)
    }

    pub fn can_apply(&self, arg1_ty: &Type, arg2_ty: &Type) -> bool {
        self.arg1_ty.id() == arg1_ty.id() && self.arg2_ty.id() == arg2_ty.id()
    }

    pub fn apply(&self, a: &Value, b: &Value) -> Value {
        (self.host_fn)(a, b)
    }
}

pub struct OpSelect {
    name: String,
    arg_ty: Shared<Type>,
    kernel_snippet: String,
    host_fn: Box<SelectFn>,
}

impl OpSelect {
    pub fn new(
        name: impl Into<String>,
        arg_ty: Shared<Type>,
        kernel_snippet: impl Into<String>,
        host_fn: Box<SelectFn>,
    ) -> Shared<Self> {
        Shared::new(OpSelect {
            name: name.into(),
            arg_ty,
            kernel_snippet: kernel_snippet.into(),
            host_fn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn arg_ty(&self) -> &Shared<Type> {
        &self.arg_ty
    }
    pub fn kernel_snippet(&self) -> &str {
        &self.kernel_snippet
    }

    pub fn can_apply(&self, arg_ty: &Type) -> bool {
        self.arg_ty.id() == arg_ty.id()
    }

    pub fn apply(&self, arg: &Value) -> bool {
        (self.host_fn)(arg)
    }
}

/// Ready-made binary operators, named after `original_source/spla/binary_op.hpp`.
/// These cover the common accumulators spec.md's own scenarios (S2-S4)
/// assume already exist (`plus<int>` etc.) without requiring callers to
/// hand-write a host closure for every use.
pub mod builtin {
    use super::*;
    use crate::types::{BOOL, FLOAT, INT, UINT};

    macro_rules! arith_dispatch {
        ($a:expr, $b:expr, $op:tt) => {
            match ($a, $b) {
                (Value::Int(x), Value::Int(y)) => Value::Int(x $op y),
                (Value::Uint(x), Value::Uint(y)) => Value::Uint(x $op y),
                (Value::Float(x), Value::Float(y)) => Value::Float(x $op y),
                (Value::Byte(x), Value::Byte(y)) => Value::Byte((*x as i64 $op *y as i64) as u8),
                (x, y) => panic!("arithmetic op on incompatible values: {:?} {:?}", x, y),
            }
        };
    }

    fn plus(ty: Shared<Type>) -> Shared<OpBinary> {
        let snippet = format!("{t} plus({t} a, {t} b) {{ return a + b; }}", t = ty.host_name());
        OpBinary::new(
            "plus",
            ty.clone(),
            ty.clone(),
            ty,
            snippet,
            Box::new(|a, b| arith_dispatch!(a, b, +)),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }

    pub fn plus_int() -> Shared<OpBinary> {
        plus(INT.clone())
    }
    pub fn plus_uint() -> Shared<OpBinary> {
        plus(UINT.clone())
    }
    pub fn plus_float() -> Shared<OpBinary> {
        plus(FLOAT.clone())
    }

    pub fn minus_int() -> Shared<OpBinary> {
        OpBinary::new(
            "minus",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t minus(int_t a, int_t b) { return a - b; }",
            Box::new(|a, b| arith_dispatch!(a, b, -)),
            BinOpFlags::empty(),
        )
    }

    pub fn rminus_int() -> Shared<OpBinary> {
        OpBinary::new(
            "rminus",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t rminus(int_t a, int_t b) { return b - a; }",
            Box::new(|a, b| match (a, b) {
                (Value::Int(x), Value::Int(y)) => Value::Int(y - x),
                _ => panic!("rminus on incompatible values"),
            }),
            BinOpFlags::empty(),
        )
    }

    fn times(ty: Shared<Type>) -> Shared<OpBinary> {
        let snippet = format!("{t} times({t} a, {t} b) {{ return a * b; }}", t = ty.host_name());
        OpBinary::new(
            "times",
            ty.clone(),
            ty.clone(),
            ty,
            snippet,
            Box::new(|a, b| arith_dispatch!(a, b, *)),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }

    pub fn times_int() -> Shared<OpBinary> {
        times(INT.clone())
    }
    pub fn times_float() -> Shared<OpBinary> {
        times(FLOAT.clone())
    }

    pub fn div_int() -> Shared<OpBinary> {
        OpBinary::new(
            "div",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t div(int_t a, int_t b) { return a / b; }",
            Box::new(|a, b| arith_dispatch!(a, b, /)),
            BinOpFlags::empty(),
        )
    }

    pub fn rdiv_int() -> Shared<OpBinary> {
        OpBinary::new(
            "rdiv",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t rdiv(int_t a, int_t b) { return b / a; }",
            Box::new(|a, b| match (a, b) {
                (Value::Int(x), Value::Int(y)) => Value::Int(y / x),
                _ => panic!("rdiv on incompatible values"),
            }),
            BinOpFlags::empty(),
        )
    }

    /// `first(a, b) = a`: ignore the second argument.
    pub fn first_int() -> Shared<OpBinary> {
        OpBinary::new(
            "first",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t first(int_t a, int_t b) { return a; }",
            Box::new(|a, _b| a.clone()),
            BinOpFlags::empty(),
        )
    }

    /// `second(a, b) = b`: the default "later value wins" combining rule
    /// used by format conversions when no accumulator was supplied
    /// (spec §4.2).
    pub fn second_int() -> Shared<OpBinary> {
        OpBinary::new(
            "second",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t second(int_t a, int_t b) { return b; }",
            Box::new(|_a, b| b.clone()),
            BinOpFlags::empty(),
        )
    }

    /// `one(a, b) = 1`: discards both arguments, used to turn a valued
    /// matrix into a structural one under an accumulating write.
    pub fn one_int() -> Shared<OpBinary> {
        OpBinary::new(
            "one",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t one(int_t a, int_t b) { return 1; }",
            Box::new(|_a, _b| Value::Int(1)),
            BinOpFlags::empty(),
        )
    }

    pub fn min_int() -> Shared<OpBinary> {
        OpBinary::new(
            "min",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t min(int_t a, int_t b) { return a < b ? a : b; }",
            Box::new(|a, b| match (a, b) {
                (Value::Int(x), Value::Int(y)) => Value::Int((*x).min(*y)),
                _ => panic!("min on incompatible values"),
            }),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }

    pub fn max_int() -> Shared<OpBinary> {
        OpBinary::new(
            "max",
            INT.clone(),
            INT.clone(),
            INT.clone(),
            "int_t max(int_t a, int_t b) { return a > b ? a : b; }",
            Box::new(|a, b| match (a, b) {
                (Value::Int(x), Value::Int(y)) => Value::Int((*x).max(*y)),
                _ => panic!("max on incompatible values"),
            }),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }

    /// Boolean AND, typically used as the multiply operator in structural
    /// (adjacency) `mxv`/`vxm` (spec scenario S3).
    pub fn and_bool() -> Shared<OpBinary> {
        OpBinary::new(
            "and",
            BOOL.clone(),
            BOOL.clone(),
            BOOL.clone(),
            "bool_t op_and(bool_t a, bool_t b) { return a && b; }",
            Box::new(|a, b| match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => Value::Bool(*x && *y),
                _ => panic!("and on incompatible values"),
            }),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }

    /// Boolean OR, typically used as the add operator in structural
    /// `mxv`/`vxm`.
    pub fn or_bool() -> Shared<OpBinary> {
        OpBinary::new(
            "or",
            BOOL.clone(),
            BOOL.clone(),
            BOOL.clone(),
            "bool_t op_or(bool_t a, bool_t b) { return a || b; }",
            Box::new(|a, b| match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => Value::Bool(*x || *y),
                _ => panic!("or on incompatible values"),
            }),
            BinOpFlags::ASSOCIATIVE | BinOpFlags::COMMUTATIVE,
        )
    }
}
