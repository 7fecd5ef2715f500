//! Structured values carried by method calls, responses, and events

use std::fmt;

use super::error::ValueError;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value
    Null,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 string
    String,
    /// Byte buffer
    Uint8List,
    /// Packed 32-bit integers
    Int32List,
    /// Packed 64-bit integers
    Int64List,
    /// Packed 64-bit floats
    FloatList,
    /// Ordered sequence of values
    List,
    /// Ordered sequence of key/value pairs
    Map,
}

impl ValueType {
    /// Check if values of this type own child values
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Map)
    }

    /// Check if this is one of the packed numeric list types
    #[must_use]
    pub const fn is_typed_list(self) -> bool {
        matches!(
            self,
            Self::Uint8List | Self::Int32List | Self::Int64List | Self::FloatList
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Uint8List => "uint8_list",
            Self::Int32List => "int32_list",
            Self::Int64List => "int64_list",
            Self::FloatList => "float_list",
            Self::List => "list",
            Self::Map => "map",
        };
        write!(f, "{name}")
    }
}

/// A structured value exchanged over a platform channel.
///
/// Containers exclusively own their children, so a tree can never contain
/// itself. Lists and maps are built with [`Value::append`] and
/// [`Value::set`] and should be treated as immutable once handed to a
/// channel.
///
/// Map entries keep insertion order and may repeat keys; lookups return the
/// first structurally equal key.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Byte buffer
    Uint8List(Vec<u8>),
    /// Packed 32-bit integers
    Int32List(Vec<i32>),
    /// Packed 64-bit integers
    Int64List(Vec<i64>),
    /// Packed 64-bit floats
    FloatList(Vec<f64>),
    /// Ordered sequence of values
    List(Vec<Value>),
    /// Ordered sequence of key/value pairs
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create an empty list
    #[must_use]
    pub const fn new_list() -> Self {
        Self::List(Vec::new())
    }

    /// Create an empty map
    #[must_use]
    pub const fn new_map() -> Self {
        Self::Map(Vec::new())
    }

    /// Get the value type
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Uint8List(_) => ValueType::Uint8List,
            Self::Int32List(_) => ValueType::Int32List,
            Self::Int64List(_) => ValueType::Int64List,
            Self::FloatList(_) => ValueType::FloatList,
            Self::List(_) => ValueType::List,
            Self::Map(_) => ValueType::Map,
        }
    }

    /// Check if this is [`Value::Null`]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get a boolean
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Get an integer
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Get a float
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Get a string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Get a byte buffer
    #[must_use]
    pub fn as_uint8_list(&self) -> Option<&[u8]> {
        match self {
            Self::Uint8List(value) => Some(value),
            _ => None,
        }
    }

    /// Get packed 32-bit integers
    #[must_use]
    pub fn as_int32_list(&self) -> Option<&[i32]> {
        match self {
            Self::Int32List(value) => Some(value),
            _ => None,
        }
    }

    /// Get packed 64-bit integers
    #[must_use]
    pub fn as_int64_list(&self) -> Option<&[i64]> {
        match self {
            Self::Int64List(value) => Some(value),
            _ => None,
        }
    }

    /// Get packed 64-bit floats
    #[must_use]
    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            Self::FloatList(value) => Some(value),
            _ => None,
        }
    }

    /// Get list children
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// Get map entries in insertion order
    #[must_use]
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Number of elements in a list, map, or typed list; zero otherwise
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Uint8List(values) => values.len(),
            Self::Int32List(values) => values.len(),
            Self::Int64List(values) => values.len(),
            Self::FloatList(values) => values.len(),
            Self::List(values) => values.len(),
            Self::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Check whether [`Value::len`] is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the list child at `index`
    #[must_use]
    pub fn list_value(&self, index: usize) -> Option<&Value> {
        self.as_list().and_then(|values| values.get(index))
    }

    /// Get the map key at `index`
    #[must_use]
    pub fn map_key(&self, index: usize) -> Option<&Value> {
        self.as_map().and_then(|entries| entries.get(index)).map(|(key, _)| key)
    }

    /// Get the map value at `index`
    #[must_use]
    pub fn map_value(&self, index: usize) -> Option<&Value> {
        self.as_map()
            .and_then(|entries| entries.get(index))
            .map(|(_, value)| value)
    }

    /// Find the value stored under the first key structurally equal to `key`
    #[must_use]
    pub fn lookup(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value)
    }

    /// Find the value stored under the first string key equal to `key`
    #[must_use]
    pub fn lookup_string(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(candidate, _)| candidate.as_str() == Some(key))
            .map(|(_, value)| value)
    }

    /// Append a child to a list
    pub fn append(&mut self, value: impl Into<Value>) -> Result<(), ValueError> {
        match self {
            Self::List(values) => {
                values.push(value.into());
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: ValueType::List,
                found: other.value_type(),
            }),
        }
    }

    /// Append a key/value pair to a map
    ///
    /// Existing entries with an equal key are kept; lookups keep returning
    /// the first one.
    pub fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<(), ValueError> {
        match self {
            Self::Map(entries) => {
                entries.push((key.into(), value.into()));
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: ValueType::Map,
                found: other.value_type(),
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Uint8List(value)
    }
}

impl From<Vec<i32>> for Value {
    fn from(value: Vec<i32>) -> Self {
        Self::Int32List(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Self::Int64List(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Self::FloatList(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Uint8List(values) => write_joined(f, values),
            Self::Int32List(values) => write_joined(f, values),
            Self::Int64List(values) => write_joined(f, values),
            Self::FloatList(values) => {
                let rendered: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::List(values) => write_joined(f, values),
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
