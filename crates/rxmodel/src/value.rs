//! Dynamically typed property values.
//!
//! Every property of a [`Model`](crate::Model) holds a [`Value`]. The enum
//! covers the common scalar types directly and falls back to
//! [`Value::Opaque`] for arbitrary host types.
//!
//! Two variants carry special meaning for combinators:
//!
//! - [`Value::Undefined`] is what a property reads as before anything was
//!   written to it. It never satisfies a combinator.
//! - [`Value::Optional`] (also available as [`OPTIONAL`]) marks a dependency
//!   that is deliberately absent. It always satisfies a combinator.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The optional-dependency marker.
///
/// Write this into a property to let a combinator that depends on it fire
/// even though there is no concrete value for that slot.
pub const OPTIONAL: Value = Value::Optional;

/// A property value.
#[derive(Clone, Default)]
pub enum Value {
    /// The property has never been assigned.
    #[default]
    Undefined,
    /// An explicit "no value".
    Null,
    /// Deliberately absent, but counts as defined.
    Optional,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// Any other `Send + Sync` value. Compared by pointer identity.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Whether this value satisfies a combinator dependency.
    ///
    /// `Undefined` and `Null` do not; everything else does, including
    /// [`Value::Optional`].
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Null)
    }

    /// Whether this is the optional-dependency marker.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Borrow an opaque value as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// A short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Optional => "optional",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined)
            | (Self::Null, Self::Null)
            | (Self::Optional, Self::Optional) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Optional => write!(f, "Optional"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Float(n) => write!(f, "Float({n})"),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
