//! Type & Operator Registry (spec §4.1).
//!
//! A [`Type`] is a pure descriptor: a stable string identifier, a byte size
//! (`0` means "no value", i.e. structural/mask-only), a short host-side
//! name, and, if the type carries values, a snippet of accelerator kernel
//! source declaring the device-side `typedef`. Types are interned in a
//! process-wide registry keyed by identifier; re-registering an id fails
//! with [`Error::AlreadyExists`].

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::shared::Shared;

/// A type descriptor. Immutable once constructed; referentially shared.
#[derive(Debug)]
pub struct Type {
    id: String,
    byte_size: usize,
    host_name: String,
    kernel_snippet: Option<String>,
}

impl Type {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `0` means "no value" — a structural, mask-only type.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn has_values(&self) -> bool {
        self.byte_size > 0
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Accelerator-language source declaring this type's device-side
    /// representation, if it carries values.
    pub fn kernel_snippet(&self) -> Option<&str> {
        self.kernel_snippet.as_deref()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        // Applicability is a direct type-identity check (spec §4.1):
        // same interned identifier means same type.
        self.id == other.id
    }
}
impl Eq for Type {}

/// Process-wide type registry. Types live for the process once created.
pub struct TypeRegistry {
    by_id: RwLock<HashMap<String, Shared<Type>>>,
}

impl TypeRegistry {
    fn new() -> Self {
        TypeRegistry { by_id: RwLock::new(HashMap::new()) }
    }

    pub fn make_type(
        &self,
        id: impl Into<String>,
        byte_size: usize,
        host_name: impl Into<String>,
        kernel_snippet: Option<String>,
    ) -> Result<Shared<Type>> {
        let id = id.into();
        let mut map = self.by_id.write();
        if map.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }
        let ty = Shared::new(Type {
            id: id.clone(),
            byte_size,
            host_name: host_name.into(),
            kernel_snippet,
        });
        map.insert(id, ty.clone());
        Ok(ty)
    }

    pub fn find_type(&self, id: &str) -> Option<Shared<Type>> {
        self.by_id.read().get(id).cloned()
    }
}

/// The process-wide registry singleton.
pub static TYPE_REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

macro_rules! builtin_types {
    ($($name:ident => ($id:expr, $size:expr, $host:expr, $snippet:expr)),* $(,)?) => {
        $(
            /// A built-in type, registered the first time any of them is touched.
            pub static $name: Lazy<Shared<Type>> = Lazy::new(|| {
                TYPE_REGISTRY
                    .make_type($id, $size, $host, $snippet.map(str::to_string))
                    .expect(concat!("builtin type ", $id, " registered twice"))
            });
        )*
    };
}

builtin_types! {
    BOOL => ("bool", 1, "bool", Some("typedef uchar bool_t;")),
    INT => ("int", 8, "int", Some("typedef long int_t;")),
    UINT => ("uint", 8, "uint", Some("typedef ulong uint_t;")),
    FLOAT => ("float", 8, "float", Some("typedef double float_t;")),
    BYTE => ("byte", 1, "byte", Some("typedef uchar byte_t;")),
    /// Zero byte size: a purely structural type, used for mask-only
    /// matrices/vectors that carry no values at all.
    UNIT => ("unit", 0, "unit", None),
}

/// A dynamically-typed host-side value. Built-in types get a strongly typed
/// variant; arbitrary user types fall back to an opaque byte blob sized by
/// [`Type::byte_size`]. `None` at the `Scalar` level represents "empty".
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Byte(u8),
    Bytes(Vec<u8>),
    /// The sole value of a structural (zero-byte) type: presence without
    /// content, used by mask/adjacency-only matrices and vectors.
    Unit,
}

impl Value {
    pub fn type_id_hint(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Byte(_) => "byte",
            Value::Bytes(_) => "<custom>",
            Value::Unit => "unit",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Uint(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Byte(b) => Some(*b as f64),
            Value::Bytes(_) => None,
            Value::Unit => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Uint(u) => Some(*u != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Byte(b) => Some(*b != 0),
            Value::Bytes(_) => None,
            Value::Unit => Some(true),
        }
    }
}
