use super::error::BencodeError;
use super::value::{Dict, Value};
use bytes::Bytes;

/// Containers nested deeper than this are refused.
const MAX_DEPTH: usize = 64;

/// Decodes exactly one value spanning the whole input.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, consumed) = decode_prefix(data)?;

    match data.len() - consumed {
        0 => Ok(value),
        left => Err(BencodeError::TrailingData(left)),
    }
}

/// Decodes the value at the start of `data` and returns it together with the
/// number of bytes it occupied. Anything after it is left untouched.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    let mut cursor = Cursor { data, pos: 0 };
    let value = cursor.value(0)?;
    Ok((value, cursor.pos))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn unexpected(&self, byte: u8) -> BencodeError {
        BencodeError::UnexpectedChar {
            byte: byte as char,
            offset: self.pos,
        }
    }

    /// Bytes up to (not including) the next `stop`, which is consumed.
    fn until(&mut self, stop: u8) -> Result<&'a [u8], BencodeError> {
        let data = self.data;
        let rest = &data[self.pos..];
        let len = rest
            .iter()
            .position(|b| *b == stop)
            .ok_or(BencodeError::UnexpectedEof)?;

        self.pos += len + 1;
        Ok(&rest[..len])
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        match self.peek()? {
            b'i' => self.integer(),
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            b'l' | b'd' if depth >= MAX_DEPTH => Err(BencodeError::NestingTooDeep(MAX_DEPTH)),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            other => Err(self.unexpected(other)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let digits = self.until(b'e')?;

        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;

        let unsigned = text.strip_prefix('-').unwrap_or(text);
        let canonical = match unsigned.as_bytes() {
            [] => false,
            [b'0'] => unsigned.len() == text.len(),
            [b'0', ..] => false,
            _ => true,
        };
        if !canonical {
            return Err(BencodeError::InvalidInteger(text.to_string()));
        }

        text.parse()
            .map(Value::Integer)
            .map_err(|_| BencodeError::InvalidInteger(text.to_string()))
    }

    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let prefix = self.until(b':')?;
        let len: usize = std::str::from_utf8(prefix)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        let end = self
            .pos
            .checked_add(len)
            .ok_or(BencodeError::InvalidStringLength)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(BencodeError::UnexpectedEof)?;

        self.pos = end;
        Ok(Bytes::copy_from_slice(bytes))
    }

    /// Consumes the closing `e` of a container if it is next.
    fn close(&mut self) -> Result<bool, BencodeError> {
        if self.peek()? == b'e' {
            self.pos += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while !self.close()? {
            items.push(self.value(depth + 1)?);
        }

        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut dict = Dict::new();

        while !self.close()? {
            let first = self.peek()?;
            if !first.is_ascii_digit() {
                return Err(self.unexpected(first));
            }

            let key = self.byte_string()?;
            let value = self.value(depth + 1)?;
            dict.insert(key, value);
        }

        Ok(Value::Dict(dict))
    }
}
