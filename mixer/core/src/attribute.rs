use ahash::AHashMap as HashMap;
use std::fmt;

/// A single attribute value carried by a request.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

/// A read-only view over a request's attributes.
pub trait Bag: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    fn names(&self) -> Vec<String>;
}

/// An owned, mutable attribute bag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutableBag {
    values: HashMap<String, Value>,
}

// === impl Value ===

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => s.fmt(f),
            Self::Int64(i) => i.fmt(f),
            Self::Double(d) => d.fmt(f),
            Self::Bool(b) => b.fmt(f),
            Self::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// === impl MutableBag ===

impl MutableBag {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Bag for MutableBag {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.values.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl<K, V> FromIterator<(K, V)> for MutableBag
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::default();
        for (k, v) in iter {
            bag.set(k, v);
        }
        bag
    }
}
