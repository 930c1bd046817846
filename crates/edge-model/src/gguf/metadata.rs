use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{ModelError, Result};

/// A single GGUF metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum GgufMetadataValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    String(String),
    Array(Vec<GgufMetadataValue>),
}

impl GgufMetadataValue {
    fn type_name(&self) -> &'static str {
        match self {
            GgufMetadataValue::U8(_) => "U8",
            GgufMetadataValue::I8(_) => "I8",
            GgufMetadataValue::U16(_) => "U16",
            GgufMetadataValue::I16(_) => "I16",
            GgufMetadataValue::U32(_) => "U32",
            GgufMetadataValue::I32(_) => "I32",
            GgufMetadataValue::U64(_) => "U64",
            GgufMetadataValue::I64(_) => "I64",
            GgufMetadataValue::F32(_) => "F32",
            GgufMetadataValue::F64(_) => "F64",
            GgufMetadataValue::Bool(_) => "Bool",
            GgufMetadataValue::String(_) => "String",
            GgufMetadataValue::Array(_) => "Array",
        }
    }

    /// The GGUF value type ID of this variant.
    pub fn type_id(&self) -> u32 {
        match self {
            GgufMetadataValue::U8(_) => 0,
            GgufMetadataValue::I8(_) => 1,
            GgufMetadataValue::U16(_) => 2,
            GgufMetadataValue::I16(_) => 3,
            GgufMetadataValue::U32(_) => 4,
            GgufMetadataValue::I32(_) => 5,
            GgufMetadataValue::F32(_) => 6,
            GgufMetadataValue::Bool(_) => 7,
            GgufMetadataValue::String(_) => 8,
            GgufMetadataValue::Array(_) => 9,
            GgufMetadataValue::U64(_) => 10,
            GgufMetadataValue::I64(_) => 11,
            GgufMetadataValue::F64(_) => 12,
        }
    }

    /// Any integer variant as a non-negative integer.
    fn as_uint(&self) -> Option<u64> {
        match *self {
            GgufMetadataValue::U8(v) => Some(v as u64),
            GgufMetadataValue::U16(v) => Some(v as u64),
            GgufMetadataValue::U32(v) => Some(v as u64),
            GgufMetadataValue::U64(v) => Some(v),
            GgufMetadataValue::I8(v) => u64::try_from(v).ok(),
            GgufMetadataValue::I16(v) => u64::try_from(v).ok(),
            GgufMetadataValue::I32(v) => u64::try_from(v).ok(),
            GgufMetadataValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Serialize the payload (without the leading type ID).
    pub fn write_payload(&self, writer: &mut impl Write) -> Result<()> {
        match self {
            GgufMetadataValue::U8(v) => writer.write_all(&[*v])?,
            GgufMetadataValue::I8(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::U16(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::I16(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::U32(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::I32(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::U64(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::I64(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::F32(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::F64(v) => writer.write_all(&v.to_le_bytes())?,
            GgufMetadataValue::Bool(v) => writer.write_all(&[*v as u8])?,
            GgufMetadataValue::String(s) => write_gguf_string(writer, s)?,
            GgufMetadataValue::Array(items) => {
                // Arrays are homogeneous; an empty one is tagged as a string array.
                let elem_type = items.first().map_or(8, GgufMetadataValue::type_id);
                if let Some(bad) = items.iter().find(|v| v.type_id() != elem_type) {
                    return Err(ModelError::TypeMismatch {
                        key: "<array element>".to_string(),
                        expected: items[0].type_name().to_string(),
                        got: bad.type_name().to_string(),
                    });
                }
                writer.write_all(&elem_type.to_le_bytes())?;
                writer.write_all(&(items.len() as u64).to_le_bytes())?;
                for item in items {
                    item.write_payload(writer)?;
                }
            }
        }
        Ok(())
    }
}

fn mismatch(key: &str, expected: &str, got: &GgufMetadataValue) -> ModelError {
    ModelError::TypeMismatch {
        key: key.to_string(),
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

/// Collection of GGUF metadata key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct GgufMetadata {
    pub entries: HashMap<String, GgufMetadataValue>,
}

impl GgufMetadata {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<&GgufMetadataValue> {
        self.entries
            .get(key)
            .ok_or_else(|| ModelError::MissingKey(key.to_string()))
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            GgufMetadataValue::String(s) => Ok(s.as_str()),
            other => Err(mismatch(key, "String", other)),
        }
    }

    pub fn get_u32(&self, key: &str) -> Result<u32> {
        match self.get(key)? {
            GgufMetadataValue::U32(v) => Ok(*v),
            other => Err(mismatch(key, "U32", other)),
        }
    }

    /// Retrieve any non-negative integer value, whatever its stored width.
    ///
    /// Converters disagree on the integer type of hyperparameters, so
    /// readers of counts and sizes should prefer this over `get_u32`.
    pub fn get_uint(&self, key: &str) -> Result<u64> {
        let value = self.get(key)?;
        value
            .as_uint()
            .ok_or_else(|| mismatch(key, "unsigned integer", value))
    }

    pub fn get_f32(&self, key: &str) -> Result<f32> {
        match self.get(key)? {
            GgufMetadataValue::F32(v) => Ok(*v),
            other => Err(mismatch(key, "F32", other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            GgufMetadataValue::Bool(v) => Ok(*v),
            other => Err(mismatch(key, "Bool", other)),
        }
    }

    fn get_array(&self, key: &str) -> Result<&[GgufMetadataValue]> {
        match self.get(key)? {
            GgufMetadataValue::Array(arr) => Ok(arr),
            other => Err(mismatch(key, "Array", other)),
        }
    }

    pub fn get_string_array(&self, key: &str) -> Result<Vec<String>> {
        self.get_array(key)?
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                GgufMetadataValue::String(s) => Ok(s.clone()),
                other => Err(mismatch(&format!("{}[{}]", key, i), "String", other)),
            })
            .collect()
    }

    pub fn get_f32_array(&self, key: &str) -> Result<Vec<f32>> {
        self.get_array(key)?
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                GgufMetadataValue::F32(f) => Ok(*f),
                other => Err(mismatch(&format!("{}[{}]", key, i), "F32", other)),
            })
            .collect()
    }

    pub fn get_i32_array(&self, key: &str) -> Result<Vec<i32>> {
        self.get_array(key)?
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                GgufMetadataValue::I32(n) => Ok(*n),
                other => Err(mismatch(&format!("{}[{}]", key, i), "I32", other)),
            })
            .collect()
    }

    /// Parse `n_kv` entries: GGUF string key, u32 value type ID, payload.
    pub fn parse_kv(reader: &mut impl Read, n_kv: u64) -> Result<GgufMetadata> {
        let mut entries = HashMap::new();
        for _ in 0..n_kv {
            let key = read_gguf_string(reader)?;
            let type_id = read_u32(reader)?;
            let value = read_value(reader, type_id, 0)?;
            entries.insert(key, value);
        }
        Ok(GgufMetadata { entries })
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a GGUF string: u64 length followed by that many UTF-8 bytes.
pub(crate) fn read_gguf_string(reader: &mut impl Read) -> Result<String> {
    let len = read_u64(reader)? as usize;
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ModelError::Io(std::io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(String::from_utf8(buf)?)
}

pub(crate) fn write_gguf_string(writer: &mut impl Write, s: &str) -> Result<()> {
    writer.write_all(&(s.len() as u64).to_le_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

/// Deepest array nesting accepted when reading metadata.
const MAX_ARRAY_DEPTH: usize = 8;

/// Read a single metadata value of the given type ID. `depth` counts the
/// arrays enclosing it.
///
/// Type IDs: 0=U8, 1=I8, 2=U16, 3=I16, 4=U32, 5=I32, 6=F32, 7=Bool,
/// 8=String, 9=Array, 10=U64, 11=I64, 12=F64.
fn read_value(reader: &mut impl Read, type_id: u32, depth: usize) -> Result<GgufMetadataValue> {
    fn bytes<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    let value = match type_id {
        0 => GgufMetadataValue::U8(bytes::<1>(reader)?[0]),
        1 => GgufMetadataValue::I8(i8::from_le_bytes(bytes(reader)?)),
        2 => GgufMetadataValue::U16(u16::from_le_bytes(bytes(reader)?)),
        3 => GgufMetadataValue::I16(i16::from_le_bytes(bytes(reader)?)),
        4 => GgufMetadataValue::U32(u32::from_le_bytes(bytes(reader)?)),
        5 => GgufMetadataValue::I32(i32::from_le_bytes(bytes(reader)?)),
        6 => GgufMetadataValue::F32(f32::from_le_bytes(bytes(reader)?)),
        7 => GgufMetadataValue::Bool(bytes::<1>(reader)?[0] != 0),
        8 => GgufMetadataValue::String(read_gguf_string(reader)?),
        9 => {
            if depth >= MAX_ARRAY_DEPTH {
                return Err(ModelError::ArrayTooDeep(MAX_ARRAY_DEPTH));
            }
            let elem_type = read_u32(reader)?;
            let count = read_u64(reader)? as usize;
            // Cap the up-front reservation; a corrupt count should hit EOF, not OOM.
            let mut values = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                values.push(read_value(reader, elem_type, depth + 1)?);
            }
            GgufMetadataValue::Array(values)
        }
        10 => GgufMetadataValue::U64(u64::from_le_bytes(bytes(reader)?)),
        11 => GgufMetadataValue::I64(i64::from_le_bytes(bytes(reader)?)),
        12 => GgufMetadataValue::F64(f64::from_le_bytes(bytes(reader)?)),
        other => return Err(ModelError::UnsupportedGgufType(other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(entries: &[(&str, GgufMetadataValue)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (key, value) in entries {
            write_gguf_string(&mut buf, key).unwrap();
            buf.extend_from_slice(&value.type_id().to_le_bytes());
            value.write_payload(&mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn test_parse_mixed_entries() {
        let buf = encode(&[
            ("general.architecture", GgufMetadataValue::String("llama".into())),
            ("llama.block_count", GgufMetadataValue::U32(2)),
            ("llama.context_length", GgufMetadataValue::U64(4096)),
            ("tokenizer.ggml.add_bos_token", GgufMetadataValue::Bool(true)),
            (
                "tokenizer.ggml.token_type",
                GgufMetadataValue::Array(vec![GgufMetadataValue::I32(1), GgufMetadataValue::I32(3)]),
            ),
        ]);
        let md = GgufMetadata::parse_kv(&mut Cursor::new(buf), 5).unwrap();
        assert_eq!(md.get_string("general.architecture").unwrap(), "llama");
        assert_eq!(md.get_u32("llama.block_count").unwrap(), 2);
        assert_eq!(md.get_uint("llama.context_length").unwrap(), 4096);
        assert!(md.get_bool("tokenizer.ggml.add_bos_token").unwrap());
        assert_eq!(md.get_i32_array("tokenizer.ggml.token_type").unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_type_mismatch_and_missing() {
        let buf = encode(&[("a", GgufMetadataValue::F32(1.5))]);
        let md = GgufMetadata::parse_kv(&mut Cursor::new(buf), 1).unwrap();
        assert!(matches!(md.get_u32("a"), Err(ModelError::TypeMismatch { .. })));
        assert!(matches!(md.get_u32("b"), Err(ModelError::MissingKey(k)) if k == "b"));
    }

    #[test]
    fn test_get_uint_rejects_negative() {
        let buf = encode(&[("n", GgufMetadataValue::I32(-4))]);
        let md = GgufMetadata::parse_kv(&mut Cursor::new(buf), 1).unwrap();
        assert!(md.get_uint("n").is_err());
    }

    #[test]
    fn test_unknown_type_id() {
        let mut buf = Vec::new();
        write_gguf_string(&mut buf, "k").unwrap();
        buf.extend_from_slice(&42u32.to_le_bytes());
        let err = GgufMetadata::parse_kv(&mut Cursor::new(buf), 1).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedGgufType(42)));
    }

    #[test]
    fn test_nested_arrays_are_capped() {
        let nested = |levels: usize| {
            let mut buf = Vec::new();
            write_gguf_string(&mut buf, "k").unwrap();
            buf.extend_from_slice(&9u32.to_le_bytes());
            for _ in 1..levels {
                buf.extend_from_slice(&9u32.to_le_bytes());
                buf.extend_from_slice(&1u64.to_le_bytes());
            }
            buf.extend_from_slice(&4u32.to_le_bytes());
            buf.extend_from_slice(&1u64.to_le_bytes());
            buf.extend_from_slice(&7u32.to_le_bytes());
            buf
        };

        let md = GgufMetadata::parse_kv(&mut Cursor::new(nested(MAX_ARRAY_DEPTH)), 1).unwrap();
        assert!(md.contains("k"));

        let err = GgufMetadata::parse_kv(&mut Cursor::new(nested(MAX_ARRAY_DEPTH + 1)), 1).unwrap_err();
        assert!(matches!(err, ModelError::ArrayTooDeep(MAX_ARRAY_DEPTH)));

        // Far deeper than any stack could recurse; stops at the cap instead.
        let err = GgufMetadata::parse_kv(&mut Cursor::new(nested(100_000)), 1).unwrap_err();
        assert!(matches!(err, ModelError::ArrayTooDeep(_)));
    }

    #[test]
    fn test_heterogeneous_array_is_rejected() {
        let value = GgufMetadataValue::Array(vec![
            GgufMetadataValue::U32(1),
            GgufMetadataValue::F32(2.0),
        ]);
        assert!(value.write_payload(&mut Vec::new()).is_err());
    }
}
