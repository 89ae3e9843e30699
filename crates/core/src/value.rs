use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload attached to a fact: field name to value.
pub type Data = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Build a [`Data`] map from `(field, value)` pairs.
pub fn data<K, V, I>(pairs: I) -> Data
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub fn encode_data(data: &Data) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(data)
}

pub fn decode_data(bytes: &[u8]) -> Result<Data, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_total() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn nested_payload_survives_msgpack() {
        let mut inner = BTreeMap::new();
        inner.insert("lang".to_string(), Value::from("en"));
        let mut payload = data([("title", Value::from("hello")), ("views", Value::from(3i64))]);
        payload.insert("meta".into(), Value::Map(inner));
        payload.insert(
            "tags".into(),
            Value::List(vec![Value::from("a"), Value::Null, Value::from(true)]),
        );

        let bytes = encode_data(&payload).unwrap();
        let decoded = decode_data(&bytes).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded["meta"].as_map().unwrap()["lang"].as_text(), Some("en"));
    }
}
