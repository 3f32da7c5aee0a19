//! Common Rules for Property Exchange (§4.5.1): the pluggable rules object
//! that builds/parses CRPE JSON headers and encodes/decodes property bodies.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{Map, Value};

use crate::parse_error::CiParseError;
use crate::util::{mcoded7_decode, mcoded7_encode};

pub const ENCODING_NONE: &str = "";
pub const ENCODING_ASCII: &str = "ASCII";
pub const ENCODING_MCODED7: &str = "Mcoded7";
pub const ENCODING_MCODED7_ZLIB: &str = "zlib+Mcoded7";

/// Fields that may appear in a Get/Set/Subscribe request header, before
/// being serialized to JSON by [`create_data_request_header`].
#[derive(Debug, Clone, Default)]
pub struct RequestFields {
    pub res_id: Option<String>,
    pub mutual_encoding: Option<String>,
    pub set_partial: Option<bool>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

pub fn create_data_request_header(resource: &str, fields: &RequestFields) -> Vec<u8> {
    let mut map = Map::new();
    map.insert("resource".to_string(), Value::String(resource.to_string()));
    if let Some(res_id) = &fields.res_id {
        map.insert("resId".to_string(), Value::String(res_id.clone()));
    }
    if let Some(enc) = &fields.mutual_encoding {
        map.insert("mutualEncoding".to_string(), Value::String(enc.clone()));
    }
    if let Some(partial) = fields.set_partial {
        map.insert("setPartial".to_string(), Value::Bool(partial));
    }
    if let Some(offset) = fields.offset {
        map.insert("offset".to_string(), Value::Number(offset.into()));
    }
    if let Some(limit) = fields.limit {
        map.insert("limit".to_string(), Value::Number(limit.into()));
    }
    Value::Object(map).to_string().into_bytes()
}

pub fn create_subscription_header(resource: &str, command: &str, mutual_encoding: Option<&str>, subscribe_id: Option<&str>) -> Vec<u8> {
    let mut map = Map::new();
    map.insert("resource".to_string(), Value::String(resource.to_string()));
    map.insert("command".to_string(), Value::String(command.to_string()));
    if let Some(enc) = mutual_encoding {
        map.insert("mutualEncoding".to_string(), Value::String(enc.to_string()));
    }
    if let Some(id) = subscribe_id {
        map.insert("subscribeId".to_string(), Value::String(id.to_string()));
    }
    Value::Object(map).to_string().into_bytes()
}

pub fn create_status_header(status: i32) -> Vec<u8> {
    let mut map = Map::new();
    map.insert("status".to_string(), Value::Number(status.into()));
    Value::Object(map).to_string().into_bytes()
}

pub fn create_shutdown_subscription_header(property_id: &str) -> Vec<u8> {
    create_subscription_header(property_id, "end", None, None)
}

pub fn create_update_notification_header(property_id: &str, command: &str) -> Vec<u8> {
    create_subscription_header(property_id, command, None, None)
}

fn parse_header(header: &[u8]) -> Result<Map<String, Value>, CiParseError> {
    let text = std::str::from_utf8(header).map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CiParseError::InvalidHeader("header JSON was not an object".to_string())),
        Err(e) => Err(CiParseError::InvalidHeader(e.to_string())),
    }
}

pub fn get_property_id_for_header(header: &[u8]) -> Result<String, CiParseError> {
    get_header_field_string(header, "resource")?.ok_or_else(|| {
        CiParseError::InvalidHeader("header is missing a \"resource\" field".to_string())
    })
}

pub fn get_header_field_string(header: &[u8], field: &str) -> Result<Option<String>, CiParseError> {
    let map = parse_header(header)?;
    Ok(match map.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    })
}

pub fn get_header_field_integer(header: &[u8], field: &str) -> Result<Option<i64>, CiParseError> {
    let map = parse_header(header)?;
    Ok(match map.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::Bool(b)) => Some(*b as i64),
        _ => None,
    })
}

/// Encodes a property body per `encoding`, one of [`ENCODING_NONE`],
/// [`ENCODING_ASCII`], [`ENCODING_MCODED7`], [`ENCODING_MCODED7_ZLIB`].
pub fn encode_body(data: &[u8], encoding: &str) -> Result<Vec<u8>, CiParseError> {
    match encoding {
        ENCODING_NONE => Ok(data.to_vec()),
        ENCODING_ASCII => {
            if let Some(&bad) = data.iter().find(|&&b| b > 0x7F) {
                return Err(CiParseError::InvalidHeader(format!(
                    "ASCII encoding requires 7-bit clean input, found byte {:#04x}",
                    bad
                )));
            }
            Ok(data.iter().flat_map(|b| format!("{:02X}", b).into_bytes()).collect())
        }
        ENCODING_MCODED7 => Ok(mcoded7_encode(data)),
        ENCODING_MCODED7_ZLIB => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
            let compressed = encoder.finish().map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
            Ok(mcoded7_encode(&compressed))
        }
        other => Err(CiParseError::InvalidHeader(format!("unsupported mutualEncoding {:?}", other))),
    }
}

/// Decodes a property body, reading `mutualEncoding` from `header` (absent
/// means [`ENCODING_NONE`]).
pub fn decode_body(header: &[u8], body: &[u8]) -> Result<Vec<u8>, CiParseError> {
    let encoding = get_header_field_string(header, "mutualEncoding")?.unwrap_or_default();
    match encoding.as_str() {
        ENCODING_NONE => Ok(body.to_vec()),
        ENCODING_ASCII => {
            let text = std::str::from_utf8(body).map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
            let mut out = Vec::with_capacity(text.len() / 2);
            let bytes = text.as_bytes();
            if bytes.len() % 2 != 0 {
                return Err(CiParseError::InvalidHeader("ASCII body has odd length".to_string()));
            }
            for pair in bytes.chunks(2) {
                let hex = std::str::from_utf8(pair).unwrap();
                let b = u8::from_str_radix(hex, 16).map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
                out.push(b);
            }
            Ok(out)
        }
        ENCODING_MCODED7 => mcoded7_decode(body),
        ENCODING_MCODED7_ZLIB => {
            let compressed = mcoded7_decode(body)?;
            let mut decoder = ZlibDecoder::new(&compressed[..]);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CiParseError::InvalidHeader(e.to_string()))?;
            Ok(out)
        }
        other => Err(CiParseError::InvalidHeader(format!("unsupported mutualEncoding {:?}", other))),
    }
}

/// Applies pagination to a JSON array value, per `offset`/`limit` fields of
/// a request header. Non-array bodies are returned unchanged.
pub fn paginate(value: Value, offset: Option<u32>, limit: Option<u32>) -> Value {
    match value {
        Value::Array(items) => {
            let start = offset.unwrap_or(0) as usize;
            let end = match limit {
                Some(n) => start.saturating_add(n as usize),
                None => items.len(),
            };
            let slice: Vec<Value> = items.into_iter().skip(start).take(end.saturating_sub(start)).collect();
            Value::Array(slice)
        }
        other => other,
    }
}

/// Applies an RFC6901 JSON pointer partial patch: replaces the value at
/// `pointer` within `target` with `patch`. The pointer must resolve to an
/// existing location; the empty pointer replaces the whole document.
pub fn apply_partial_patch(target: &Value, pointer: &str, patch: Value) -> Result<Value, CiParseError> {
    if pointer.is_empty() {
        return Ok(patch);
    }
    let mut result = target.clone();
    let slot = result
        .pointer_mut(pointer)
        .ok_or_else(|| CiParseError::InvalidHeader(format!("JSON pointer {:?} does not resolve", pointer)))?;
    *slot = patch;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_request_header_roundtrip_fields() {
        let fields = RequestFields {
            res_id: Some("x".to_string()),
            mutual_encoding: Some(ENCODING_MCODED7.to_string()),
            set_partial: None,
            offset: Some(2),
            limit: Some(10),
        };
        let header = create_data_request_header("ResourceList", &fields);
        assert_eq!(get_property_id_for_header(&header).unwrap(), "ResourceList");
        assert_eq!(get_header_field_string(&header, "resId").unwrap().unwrap(), "x");
        assert_eq!(get_header_field_integer(&header, "offset").unwrap().unwrap(), 2);
    }

    #[test]
    fn encode_decode_ascii() {
        let data = vec![0x00, 0x7F, 0x41];
        let header = create_subscription_header("DeviceInfo", "full", Some(ENCODING_ASCII), None);
        let encoded = encode_body(&data, ENCODING_ASCII).unwrap();
        assert!(encoded.iter().all(|b| b.is_ascii_hexdigit()));
        let decoded = decode_body(&header, &encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn ascii_encoding_rejects_high_bit_set() {
        assert!(encode_body(&[0xFF], ENCODING_ASCII).is_err());
    }

    #[test]
    fn encode_decode_mcoded7() {
        let data: Vec<u8> = (0..=255u16).map(|x| x as u8).collect();
        let header = create_subscription_header("DeviceInfo", "full", Some(ENCODING_MCODED7), None);
        let encoded = encode_body(&data, ENCODING_MCODED7).unwrap();
        assert!(encoded.iter().all(|b| b & 0x80 == 0));
        assert_eq!(decode_body(&header, &encoded).unwrap(), data);
    }

    #[test]
    fn encode_decode_zlib_mcoded7() {
        let data = b"hello hello hello hello hello".repeat(4);
        let header = create_subscription_header("DeviceInfo", "full", Some(ENCODING_MCODED7_ZLIB), None);
        let encoded = encode_body(&data, ENCODING_MCODED7_ZLIB).unwrap();
        assert!(encoded.iter().all(|b| b & 0x80 == 0));
        assert_eq!(decode_body(&header, &encoded).unwrap(), data);
    }

    #[test]
    fn none_encoding_is_identity() {
        let data = vec![1, 2, 3];
        assert_eq!(encode_body(&data, ENCODING_NONE).unwrap(), data);
        let header = create_status_header(200);
        assert_eq!(decode_body(&header, &data).unwrap(), data);
    }

    #[test]
    fn paginate_slices_array() {
        let value = serde_json::json!([1, 2, 3, 4, 5]);
        let paged = paginate(value, Some(1), Some(2));
        assert_eq!(paged, serde_json::json!([2, 3]));
    }

    #[test]
    fn partial_patch_replaces_pointer() {
        let target = serde_json::json!({"a": {"b": 1}});
        let patched = apply_partial_patch(&target, "/a/b", serde_json::json!(2)).unwrap();
        assert_eq!(patched, serde_json::json!({"a": {"b": 2}}));
    }

    #[test]
    fn partial_patch_rejects_missing_pointer() {
        let target = serde_json::json!({"a": 1});
        assert!(apply_partial_patch(&target, "/missing/deep", serde_json::json!(2)).is_err());
    }
}
