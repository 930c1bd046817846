use std::io::{Read, Write};

use edge_tensor::DType;

use super::metadata::{read_gguf_string, write_gguf_string};
use crate::error::{ModelError, Result};

/// Describes a single tensor stored within a GGUF file.
#[derive(Debug, Clone, PartialEq)]
pub struct GgufTensorInfo {
    /// Tensor name (e.g. "blk.0.attn_q.weight").
    pub name: String,
    /// Dimension sizes, innermost (`ne0`) first.
    pub dims: Vec<u64>,
    pub dtype: DType,
    /// Byte offset of the data relative to the start of the tensor data section.
    pub offset: u64,
}

impl GgufTensorInfo {
    /// Element count, `None` when the dimensions overflow `usize`.
    pub fn numel(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(usize::try_from(d).ok()?))
    }

    /// Byte size of this tensor's raw data in the file, `None` on overflow.
    pub fn data_size(&self) -> Option<usize> {
        self.numel().and_then(|n| self.dtype.storage_bytes(n))
    }

    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        write_gguf_string(writer, &self.name)?;
        writer.write_all(&(self.dims.len() as u32).to_le_bytes())?;
        for d in &self.dims {
            writer.write_all(&d.to_le_bytes())?;
        }
        writer.write_all(&self.dtype.to_gguf_type().to_le_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())?;
        Ok(())
    }
}

/// Parse `n_tensors` tensor info entries.
///
/// Each entry: GGUF string name, u32 dimension count, that many u64 sizes,
/// u32 GGUF type ID, u64 data offset.
pub fn parse_tensor_infos(reader: &mut impl Read, n_tensors: u64) -> Result<Vec<GgufTensorInfo>> {
    let mut buf4 = [0u8; 4];
    let mut buf8 = [0u8; 8];

    let mut infos = Vec::with_capacity((n_tensors as usize).min(1 << 16));
    for _ in 0..n_tensors {
        let name = read_gguf_string(reader)?;

        reader.read_exact(&mut buf4)?;
        let n_dims = u32::from_le_bytes(buf4);
        let mut dims = Vec::with_capacity(n_dims.min(8) as usize);
        for _ in 0..n_dims {
            reader.read_exact(&mut buf8)?;
            dims.push(u64::from_le_bytes(buf8));
        }

        reader.read_exact(&mut buf4)?;
        let type_id = u32::from_le_bytes(buf4);
        let dtype = DType::from_gguf_type(type_id).ok_or(ModelError::UnsupportedGgufType(type_id))?;

        reader.read_exact(&mut buf8)?;
        let offset = u64::from_le_bytes(buf8);

        infos.push(GgufTensorInfo {
            name,
            dims,
            dtype,
            offset,
        });
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_written_info() {
        let info = GgufTensorInfo {
            name: "blk.0.attn_q.weight".to_string(),
            dims: vec![64, 32],
            dtype: DType::Q8_0,
            offset: 128,
        };
        let mut buf = Vec::new();
        info.write(&mut buf).unwrap();

        let parsed = parse_tensor_infos(&mut Cursor::new(buf), 1).unwrap();
        assert_eq!(parsed, vec![info]);
        assert_eq!(parsed[0].numel(), Some(2048));
        assert_eq!(parsed[0].data_size(), Some(64 * 34));
    }

    #[test]
    fn test_oversized_dims_do_not_overflow() {
        let info = GgufTensorInfo {
            name: "huge".to_string(),
            dims: vec![1 << 40, 1 << 40],
            dtype: DType::F32,
            offset: 0,
        };
        assert_eq!(info.numel(), None);
        assert_eq!(info.data_size(), None);

        let info = GgufTensorInfo {
            dims: vec![1 << 62],
            ..info
        };
        assert!(info.numel().is_some());
        assert_eq!(info.data_size(), None);
    }

    #[test]
    fn test_unsupported_tensor_type() {
        let mut buf = Vec::new();
        write_gguf_string(&mut buf, "w").unwrap();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&4u64.to_le_bytes());
        buf.extend_from_slice(&14u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        let err = parse_tensor_infos(&mut Cursor::new(buf), 1).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedGgufType(14)));
    }
}
