use super::error::DhtError;
use super::node::{decode_compact_nodes, decode_compact_peer, encode_compact_nodes, encode_compact_peer, Contact, NodeId};
use crate::bencode::{decode, encode, Dict, Value};
use crate::info_hash::InfoHash;
use bytes::Bytes;
use std::net::SocketAddr;

pub type TransactionId = Bytes;

pub const ERROR_GENERIC: i64 = 201;
pub const ERROR_SERVER: i64 = 202;
pub const ERROR_PROTOCOL: i64 = 203;
pub const ERROR_METHOD_UNKNOWN: i64 = 204;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ping,
    FindNode {
        target: NodeId,
    },
    GetPeers {
        info_hash: InfoHash,
    },
    AnnouncePeer {
        info_hash: InfoHash,
        port: u16,
        token: Bytes,
        implied_port: bool,
    },
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::Ping => "ping",
            Query::FindNode { .. } => "find_node",
            Query::GetPeers { .. } => "get_peers",
            Query::AnnouncePeer { .. } => "announce_peer",
        }
    }
}

/// The `r` dictionary of a reply. Every reply kind shares this shape; which
/// fields are set depends on the query it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: NodeId,
    pub nodes: Vec<Contact>,
    pub values: Option<Vec<SocketAddr>>,
    pub token: Option<Bytes>,
}

impl Response {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            values: None,
            token: None,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<Contact>) -> Self {
        self.nodes = nodes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Query { sender: NodeId, query: Query },
    Response(Response),
    Error { code: i64, message: String },
}

/// One KRPC datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrpcMessage {
    pub transaction_id: TransactionId,
    pub body: Body,
}

impl KrpcMessage {
    pub fn query(transaction_id: TransactionId, sender: NodeId, query: Query) -> Self {
        Self {
            transaction_id,
            body: Body::Query { sender, query },
        }
    }

    pub fn response(transaction_id: TransactionId, response: Response) -> Self {
        Self {
            transaction_id,
            body: Body::Response(response),
        }
    }

    pub fn error(transaction_id: TransactionId, code: i64, message: impl Into<String>) -> Self {
        Self {
            transaction_id,
            body: Body::Error {
                code,
                message: message.into(),
            },
        }
    }

    /// Decodes a datagram in one step. See [`transaction_id`] and
    /// [`KrpcMessage::from_value`] for the two halves used by the server.
    pub fn parse(data: &[u8]) -> Result<Self, DhtError> {
        let value = decode(data)?;
        let tid = transaction_id(&value)?;
        Self::from_value(tid, &value)
    }

    /// Interprets an already decoded message.
    ///
    /// A query with an unknown name or bad arguments yields
    /// [`DhtError::Protocol`] carrying the code to answer with; anything else
    /// that does not fit is [`DhtError::MalformedMessage`].
    pub fn from_value(transaction_id: TransactionId, value: &Value) -> Result<Self, DhtError> {
        let dict = value.as_dict().ok_or_else(|| malformed("expected dict"))?;

        let msg_type = dict
            .get(b"y".as_slice())
            .and_then(|v| v.as_str())
            .ok_or_else(|| malformed("missing message type"))?;

        let body = match msg_type {
            "q" => parse_query(dict)?,
            "r" => parse_response(dict)?,
            "e" => parse_error(dict)?,
            other => return Err(malformed(format!("unknown message type: {other}"))),
        };

        Ok(Self {
            transaction_id,
            body,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, DhtError> {
        let t = ("t", Value::Bytes(self.transaction_id.clone()));

        let msg = match &self.body {
            Body::Query { sender, query } => Value::dict([
                t,
                ("y", Value::string("q")),
                ("q", Value::string(query.name())),
                ("a", encode_args(sender, query)),
            ]),
            Body::Response(response) => {
                Value::dict([t, ("y", Value::string("r")), ("r", encode_response(response))])
            }
            Body::Error { code, message } => Value::dict([
                t,
                ("y", Value::string("e")),
                (
                    "e",
                    Value::List(vec![Value::Integer(*code), Value::string(message)]),
                ),
            ]),
        };

        encode(&msg).map_err(DhtError::from)
    }
}

/// The `t` field of a decoded datagram.
pub fn transaction_id(value: &Value) -> Result<TransactionId, DhtError> {
    value
        .get(b"t")
        .and_then(|v| v.as_bytes())
        .cloned()
        .ok_or_else(|| malformed("missing transaction id"))
}

fn malformed(msg: impl Into<String>) -> DhtError {
    DhtError::MalformedMessage(msg.into())
}

fn invalid_arguments() -> DhtError {
    DhtError::Protocol {
        code: ERROR_PROTOCOL,
        message: "Protocol Error, invalid arguments".to_string(),
    }
}

fn parse_query(dict: &Dict) -> Result<Body, DhtError> {
    let name = dict
        .get(b"q".as_slice())
        .and_then(|v| v.as_str())
        .ok_or_else(invalid_arguments)?;

    if !matches!(name, "ping" | "find_node" | "get_peers" | "announce_peer") {
        return Err(DhtError::Protocol {
            code: ERROR_METHOD_UNKNOWN,
            message: "Method Unknown".to_string(),
        });
    }

    let args = dict
        .get(b"a".as_slice())
        .and_then(|v| v.as_dict())
        .ok_or_else(invalid_arguments)?;

    let sender = args
        .get(b"id".as_slice())
        .and_then(|v| v.as_bytes())
        .and_then(|b| NodeId::from_bytes(b).ok())
        .ok_or_else(invalid_arguments)?;

    let info_hash = || {
        args.get(b"info_hash".as_slice())
            .and_then(|v| v.as_bytes())
            .and_then(|b| InfoHash::from_bytes(b).ok())
            .ok_or_else(invalid_arguments)
    };

    let query = match name {
        "ping" => Query::Ping,
        "find_node" => {
            let target = args
                .get(b"target".as_slice())
                .and_then(|v| v.as_bytes())
                .and_then(|b| NodeId::from_bytes(b).ok())
                .ok_or_else(invalid_arguments)?;
            Query::FindNode { target }
        }
        "get_peers" => Query::GetPeers {
            info_hash: info_hash()?,
        },
        _ => {
            let port = args
                .get(b"port".as_slice())
                .and_then(|v| v.as_integer())
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(invalid_arguments)?;

            let token = args
                .get(b"token".as_slice())
                .and_then(|v| v.as_bytes())
                .cloned()
                .ok_or_else(invalid_arguments)?;

            let implied_port = args
                .get(b"implied_port".as_slice())
                .and_then(|v| v.as_integer())
                == Some(1);

            Query::AnnouncePeer {
                info_hash: info_hash()?,
                port,
                token,
                implied_port,
            }
        }
    };

    Ok(Body::Query { sender, query })
}

fn parse_response(dict: &Dict) -> Result<Body, DhtError> {
    let resp = dict
        .get(b"r".as_slice())
        .and_then(|v| v.as_dict())
        .ok_or_else(|| malformed("missing response dict"))?;

    let id = resp
        .get(b"id".as_slice())
        .and_then(|v| v.as_bytes())
        .and_then(|b| NodeId::from_bytes(b).ok())
        .ok_or_else(|| malformed("missing id in response"))?;

    let nodes = resp
        .get(b"nodes".as_slice())
        .and_then(|v| v.as_bytes())
        .map(|data| decode_compact_nodes(data))
        .unwrap_or_default();

    let values = resp
        .get(b"values".as_slice())
        .and_then(|v| v.as_list())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_bytes())
                .filter_map(|b| decode_compact_peer(b))
                .collect()
        });

    let token = resp
        .get(b"token".as_slice())
        .and_then(|v| v.as_bytes())
        .cloned();

    Ok(Body::Response(Response {
        id,
        nodes,
        values,
        token,
    }))
}

fn parse_error(dict: &Dict) -> Result<Body, DhtError> {
    let error = dict
        .get(b"e".as_slice())
        .and_then(|v| v.as_list())
        .ok_or_else(|| malformed("missing error list"))?;

    let code = error
        .first()
        .and_then(|v| v.as_integer())
        .unwrap_or(ERROR_GENERIC);

    let message = error
        .get(1)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();

    Ok(Body::Error { code, message })
}

fn id_value(id: &NodeId) -> Value {
    Value::bytes(id.as_bytes())
}

fn encode_args(sender: &NodeId, query: &Query) -> Value {
    let id = ("id", id_value(sender));

    match query {
        Query::Ping => Value::dict([id]),
        Query::FindNode { target } => Value::dict([id, ("target", id_value(target))]),
        Query::GetPeers { info_hash } => {
            Value::dict([id, ("info_hash", Value::bytes(info_hash.as_bytes()))])
        }
        Query::AnnouncePeer {
            info_hash,
            port,
            token,
            implied_port,
        } => {
            let mut args = vec![
                id,
                ("info_hash", Value::bytes(info_hash.as_bytes())),
                ("port", Value::Integer(i64::from(*port))),
                ("token", Value::Bytes(token.clone())),
            ];
            if *implied_port {
                args.push(("implied_port", Value::Integer(1)));
            }
            Value::dict(args)
        }
    }
}

fn encode_response(response: &Response) -> Value {
    let mut fields = vec![("id", id_value(&response.id))];

    if !response.nodes.is_empty() {
        fields.push((
            "nodes",
            Value::Bytes(Bytes::from(encode_compact_nodes(&response.nodes))),
        ));
    }

    if let Some(token) = &response.token {
        fields.push(("token", Value::Bytes(token.clone())));
    }

    if let Some(values) = &response.values {
        let values = values
            .iter()
            .filter_map(encode_compact_peer)
            .map(|peer| Value::bytes(&peer))
            .collect();
        fields.push(("values", Value::List(values)));
    }

    Value::dict(fields)
}
