use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The most specific representation recovered from a key or value returned by the REST Proxy.
///
/// The proxy may hand back plain JSON, base64-wrapped JSON, base64-wrapped opaque bytes
/// or plain text, without saying which: see [`decode_base64`] for how each is told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Structured value: either already parsed by the proxy, or parsed from (base64-wrapped) JSON text.
    Json(Value),

    /// Base64-wrapped UTF-8 that isn't JSON.
    Bytes(Vec<u8>),

    /// Text that could not be base64-decoded into UTF-8, returned as received.
    Text(String),
}

impl DecodedValue {
    /// String view of this value, when it has one.
    ///
    /// This is what message keys are matched against: a JSON string,
    /// plain text or UTF-8 bytes all qualify.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::Json(Value::String(s)) => Some(s.as_str()),
            DecodedValue::Json(_) => None,
            DecodedValue::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            DecodedValue::Text(s) => Some(s.as_str()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            DecodedValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Decode a key or value returned by the REST Proxy.
///
/// Precedence, first match wins:
///
/// 1. a non-string JSON value is already structured, and is returned as [`DecodedValue::Json`]
/// 2. a string that parses as JSON becomes [`DecodedValue::Json`]
/// 3. a string that is not valid base64, or whose decoded bytes are not UTF-8,
///    is returned unchanged as [`DecodedValue::Text`]
/// 4. decoded bytes that parse as JSON become [`DecodedValue::Json`]
/// 5. any other decoded bytes become [`DecodedValue::Bytes`]
///
/// **NOTE:** A string that is both valid base64 and valid JSON (ex. `"1234"`)
/// stops at step 2: it is never base64-decoded.
pub fn decode_base64(value: Value) -> DecodedValue {
    let text = match value {
        Value::String(text) => text,
        structured => return DecodedValue::Json(structured),
    };

    if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
        return DecodedValue::Json(parsed);
    }

    let decoded = match STANDARD.decode(text.as_bytes()) {
        Ok(decoded) => decoded,
        Err(_) => return DecodedValue::Text(text),
    };

    let decoded = match String::from_utf8(decoded) {
        Ok(decoded) => decoded,
        Err(_) => return DecodedValue::Text(text),
    };

    match serde_json::from_str::<Value>(&decoded) {
        Ok(parsed) => DecodedValue::Json(parsed),
        Err(_) => DecodedValue::Bytes(decoded.into_bytes()),
    }
}

/// A record as returned by the REST Proxy `records` endpoint, before any decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default)]
    pub key: Value,

    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// A consumed record, with key and value decoded by [`decode_base64`].
///
/// `topic`, `partition` and `offset` are carried over from the REST Proxy response when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub key: DecodedValue,
    pub value: DecodedValue,
}

impl Record {
    /// The record key as a string, if it has a string form.
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_str()
    }
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        Record {
            topic: raw.topic,
            partition: raw.partition,
            offset: raw.offset,
            key: decode_base64(raw.key),
            value: decode_base64(raw.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::utils::is_thread_safe;

    fn b64(s: &str) -> Value {
        Value::String(STANDARD.encode(s))
    }

    #[test]
    fn structured_values_pass_through() {
        let v = json!({"name": "doc", "pages": [1, 2]});
        assert_eq!(decode_base64(v.clone()), DecodedValue::Json(v));
        assert_eq!(decode_base64(Value::Null), DecodedValue::Json(Value::Null));
        assert_eq!(decode_base64(json!(42)), DecodedValue::Json(json!(42)));
    }

    #[test]
    fn base64_wrapped_json_round_trips() {
        let original = json!({"id": 7, "tags": ["a", "b"], "nested": {"ok": true}});
        let wrapped = b64(&serde_json::to_string(&original).unwrap());
        assert_eq!(decode_base64(wrapped), DecodedValue::Json(original));
    }

    #[rstest]
    #[case(r#"{"a":1}"#, json!({"a": 1}))]
    #[case("[1,2,3]", json!([1, 2, 3]))]
    #[case(r#""quoted""#, json!("quoted"))]
    #[case("true", json!(true))]
    fn plain_json_strings_are_parsed(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(decode_base64(Value::String(input.into())), DecodedValue::Json(expected));
    }

    #[rstest]
    #[case("hello world!")]
    #[case("not base64 at all")]
    fn plain_text_is_returned_unchanged(#[case] input: &str) {
        assert_eq!(decode_base64(Value::String(input.into())), DecodedValue::Text(input.into()));
    }

    #[test]
    fn base64_wrapped_text_becomes_bytes() {
        assert_eq!(decode_base64(b64("plain text")), DecodedValue::Bytes(b"plain text".to_vec()));
    }

    #[test]
    fn empty_string_is_empty_bytes() {
        assert_eq!(decode_base64(Value::String(String::new())), DecodedValue::Bytes(Vec::new()));
    }

    #[test]
    fn base64_wrapped_non_utf8_is_returned_as_received() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0x00, 0x81]);
        assert_eq!(decode_base64(Value::String(encoded.clone())), DecodedValue::Text(encoded));
    }

    #[test]
    fn json_wins_over_base64_when_both_are_valid() {
        // "1234" is also valid base64.
        assert_eq!(decode_base64(Value::String("1234".into())), DecodedValue::Json(json!(1234)));
    }

    #[test]
    fn record_from_raw_decodes_key_and_value() {
        let raw: RawRecord = serde_json::from_value(json!({
            "topic": "docs",
            "key": STANDARD.encode("\"k1\""),
            "value": STANDARD.encode(r#"{"text":"hello"}"#),
            "partition": 0,
            "offset": 41
        }))
        .unwrap();

        let record = Record::from(raw);
        assert_eq!(record.key_str(), Some("k1"));
        assert_eq!(record.value.as_json(), Some(&json!({"text": "hello"})));
        assert_eq!(record.topic.as_deref(), Some("docs"));
        assert_eq!(record.partition, Some(0));
        assert_eq!(record.offset, Some(41));
    }

    #[test]
    fn raw_record_tolerates_missing_fields() {
        let raw: RawRecord = serde_json::from_value(json!({"value": "x"})).unwrap();
        assert_eq!(raw.key, Value::Null);
        assert_eq!(raw.partition, None);
        assert_eq!(Record::from(raw).key_str(), None);
    }

    #[rstest]
    #[case(DecodedValue::Json(json!("k")), Some("k"))]
    #[case(DecodedValue::Json(json!({"k": 1})), None)]
    #[case(DecodedValue::Text("k".into()), Some("k"))]
    #[case(DecodedValue::Bytes(b"k".to_vec()), Some("k"))]
    #[case(DecodedValue::Bytes(vec![0xff]), None)]
    fn string_view(#[case] value: DecodedValue, #[case] expected: Option<&str>) {
        assert_eq!(value.as_str(), expected);
    }

    #[test]
    fn test_types_thread_safety() {
        is_thread_safe::<DecodedValue>();
        is_thread_safe::<RawRecord>();
        is_thread_safe::<Record>();
    }
}
