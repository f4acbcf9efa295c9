use bytes::Bytes;

use super::*;

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-42e").unwrap(), Value::Integer(-42));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn test_decode_integer_invalid() {
    for bad in [&b"i-0e"[..], b"i03e", b"i-03e", b"ie", b"i-e", b"i1x2e"] {
        assert!(
            matches!(decode(bad), Err(BencodeError::InvalidInteger(_))),
            "{:?}",
            String::from_utf8_lossy(bad)
        );
    }
    assert!(matches!(decode(b"i12"), Err(BencodeError::UnexpectedEof)));
}

#[test]
fn test_decode_bytes() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(
        decode(b"0:").unwrap(),
        Value::Bytes(Bytes::from_static(b""))
    );
}

#[test]
fn test_truncated_length_prefix() {
    assert!(matches!(decode(b"10:short"), Err(BencodeError::UnexpectedEof)));
    assert!(matches!(decode(b"4"), Err(BencodeError::UnexpectedEof)));
}

#[test]
fn test_non_numeric_length() {
    assert!(matches!(decode(b"4x:spam"), Err(BencodeError::InvalidStringLength)));
}

#[test]
fn test_unterminated_containers() {
    assert!(matches!(decode(b"l4:spam"), Err(BencodeError::UnexpectedEof)));
    assert!(matches!(decode(b"d3:cow3:moo"), Err(BencodeError::UnexpectedEof)));
    assert!(decode(b"d3:cow").is_err());
}

#[test]
fn test_dict_key_must_be_string() {
    assert!(matches!(
        decode(b"di1e3:mooe"),
        Err(BencodeError::UnexpectedChar { byte: 'i', offset: 1 })
    ));
}

#[test]
fn test_unexpected_leading_byte() {
    assert!(matches!(
        decode(b"l4:spamxe"),
        Err(BencodeError::UnexpectedChar { byte: 'x', offset: 7 })
    ));
}

#[test]
fn test_decode_list() {
    let result = decode(b"l4:spami42ee").unwrap();
    match result {
        Value::List(l) => {
            assert_eq!(l.len(), 2);
            assert_eq!(l[0], Value::Bytes(Bytes::from_static(b"spam")));
            assert_eq!(l[1], Value::Integer(42));
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn test_decode_dict() {
    let result = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    match result {
        Value::Dict(d) => {
            assert_eq!(d.len(), 2);
            assert_eq!(
                d.get(b"cow".as_slice()),
                Some(&Value::Bytes(Bytes::from_static(b"moo")))
            );
        }
        _ => panic!("expected dict"),
    }
}

#[test]
fn test_decode_preserves_encounter_order() {
    let value = decode(b"d1:zi1e1:ai2e1:mi3ee").unwrap();
    let keys: Vec<&[u8]> = value
        .as_dict()
        .unwrap()
        .keys()
        .map(|k| k.as_ref())
        .collect();
    assert_eq!(keys, vec![&b"z"[..], b"a", b"m"]);

    assert_eq!(encode(&value).unwrap(), b"d1:ai2e1:mi3e1:zi1ee");
}

#[test]
fn test_encode_integer() {
    assert_eq!(encode(&Value::Integer(42)).unwrap(), b"i42e");
    assert_eq!(encode(&Value::Integer(-42)).unwrap(), b"i-42e");
    assert_eq!(encode(&Value::Integer(0)).unwrap(), b"i0e");
}

#[test]
fn test_encode_list() {
    let list = Value::List(vec![
        Value::Bytes(Bytes::from_static(b"spam")),
        Value::Integer(42),
    ]);
    assert_eq!(encode(&list).unwrap(), b"l4:spami42ee");
}

#[test]
fn test_encode_dict_sorts_keys() {
    let value = Value::dict([
        ("spam", Value::string("eggs")),
        ("cow", Value::string("moo")),
    ]);
    assert_eq!(encode(&value).unwrap(), b"d3:cow3:moo4:spam4:eggse");
}

#[test]
fn test_encode_to_writer() {
    let mut out = Vec::new();
    encode_to(&Value::List(vec![Value::string("a"), Value::Integer(-1)]), &mut out).unwrap();
    assert_eq!(out, b"l1:ai-1ee");
}

#[test]
fn test_roundtrip() {
    let original = b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee";
    let decoded = decode(original).unwrap();
    let encoded = encode(&decoded).unwrap();
    assert_eq!(encoded, original);
}

#[test]
fn test_roundtrip_values() {
    let values = vec![
        Value::Integer(-7),
        Value::bytes(&[0, 159, 255]),
        Value::List(vec![]),
        Value::Dict(Dict::new()),
        Value::List(vec![Value::List(vec![]), Value::Dict(Dict::new())]),
        Value::dict([
            ("z", Value::List(vec![Value::Integer(1), Value::string("x")])),
            ("a", Value::dict([("inner", Value::Dict(Dict::new()))])),
        ]),
    ];

    for value in values {
        let encoded = encode(&value).unwrap();
        assert_eq!(decode(&encoded).unwrap(), value);
    }
}

#[test]
fn test_decode_prefix() {
    let data = b"d8:msg_typei1e5:piecei0eeRAWBYTES";
    let (value, consumed) = decode_prefix(data).unwrap();
    assert_eq!(value.get(b"msg_type").and_then(|v| v.as_integer()), Some(1));
    assert_eq!(&data[consumed..], b"RAWBYTES");
}

#[test]
fn test_trailing_data_error() {
    assert!(matches!(decode(b"i42eextra"), Err(BencodeError::TrailingData(5))));
}

#[test]
fn test_nesting_limit() {
    let mut data = vec![b'l'; 100];
    data.extend(vec![b'e'; 100]);
    assert!(matches!(decode(&data), Err(BencodeError::NestingTooDeep(64))));
}

#[test]
fn test_value_accessors() {
    let value = Value::Integer(42);
    assert_eq!(value.as_integer(), Some(42));
    assert!(value.as_bytes().is_none());

    let value = Value::Bytes(Bytes::from_static(b"test"));
    assert_eq!(value.as_str(), Some("test"));
    assert!(value.as_integer().is_none());

    let value = Value::List(vec![]);
    assert!(value.as_list().is_some());
    assert!(value.as_dict().is_none());
}
