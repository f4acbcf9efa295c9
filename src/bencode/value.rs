use bytes::Bytes;
use indexmap::IndexMap;

/// A bencode dictionary. Iteration follows insertion (wire) order; the
/// encoder sorts keys on the way out.
pub type Dict = IndexMap<Bytes, Value>;

/// Any bencode value.
///
/// Byte strings stay raw: node ids, compact addresses and tokens are
/// binary, so text is only interpreted on request via [`Value::as_str`].
///
/// ```
/// use mlspider::bencode::Value;
///
/// let int: Value = 42i64.into();
/// let string: Value = "hello".into();
///
/// assert_eq!(int.as_integer(), Some(42));
/// assert_eq!(string.as_str(), Some("hello"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Bytes(Bytes),
    List(Vec<Value>),
    /// Equality ignores key order.
    Dict(Dict),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Self::bytes(s.as_bytes())
    }

    pub fn bytes(b: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(b))
    }

    /// Builds a dictionary from static keys, the common shape of every KRPC
    /// and extension message.
    ///
    /// ```
    /// use mlspider::bencode::{encode, Value};
    ///
    /// let msg = Value::dict([("piece", Value::Integer(0)), ("msg_type", Value::Integer(0))]);
    /// assert_eq!(encode(&msg).unwrap(), b"d8:msg_typei0e5:piecei0ee");
    /// ```
    pub fn dict<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Bytes::from_static(k.as_bytes()), v))
                .collect(),
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The byte string as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_dict(self) -> Option<Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Dictionary lookup; `None` for missing keys and for non-dictionaries.
    ///
    /// ```
    /// use mlspider::bencode::decode;
    ///
    /// let value = decode(b"d3:foo3:bare").unwrap();
    /// assert_eq!(value.get(b"foo").and_then(|v| v.as_str()), Some("bar"));
    /// assert_eq!(value.get(b"missing"), None);
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}
