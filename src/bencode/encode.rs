use super::error::BencodeError;
use super::value::Value;
use std::io::Write;

/// Encodes `value` into a fresh buffer.
///
/// Dictionary keys are written in sorted order whatever order they were
/// inserted in, so equal values always encode to the same bytes.
///
/// ```
/// use mlspider::bencode::{encode, Dict, Value};
/// use bytes::Bytes;
///
/// let mut dict = Dict::new();
/// dict.insert(Bytes::from_static(b"b"), Value::Integer(2));
/// dict.insert(Bytes::from_static(b"a"), Value::Integer(1));
/// let encoded = encode(&Value::Dict(dict)).unwrap();
/// assert_eq!(encoded, b"d1:ai1e1:bi2ee");
/// ```
pub fn encode(value: &Value) -> Result<Vec<u8>, BencodeError> {
    let mut buf = Vec::with_capacity(64);
    encode_to(value, &mut buf)?;
    Ok(buf)
}

/// Streams the encoding of `value` into `writer`.
pub fn encode_to<W: Write>(value: &Value, writer: &mut W) -> Result<(), BencodeError> {
    match value {
        Value::Integer(i) => write!(writer, "i{i}e")?,
        Value::Bytes(b) => write_string(writer, b)?,
        Value::List(items) => {
            writer.write_all(b"l")?;
            items.iter().try_for_each(|item| encode_to(item, writer))?;
            writer.write_all(b"e")?;
        }
        Value::Dict(dict) => {
            let mut keys: Vec<_> = dict.keys().collect();
            keys.sort_unstable();

            writer.write_all(b"d")?;
            for key in keys {
                write_string(writer, key)?;
                if let Some(item) = dict.get(key) {
                    encode_to(item, writer)?;
                }
            }
            writer.write_all(b"e")?;
        }
    }
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write!(writer, "{}:", bytes.len())?;
    writer.write_all(bytes)
}
