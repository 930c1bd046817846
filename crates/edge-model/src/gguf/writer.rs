use std::io::Write;
use std::path::Path;

use edge_tensor::DType;

use super::header::{GgufHeader, GGUF_DEFAULT_ALIGNMENT, GGUF_VERSION};
use super::metadata::{write_gguf_string, GgufMetadataValue};
use super::tensor_info::GgufTensorInfo;
use crate::error::{ModelError, Result};

/// Builds a GGUF v3 file from metadata and f32 tensors.
///
/// Used for conversion tooling and for generating fixtures in tests.
#[derive(Debug, Default)]
pub struct GgufWriter {
    metadata: Vec<(String, GgufMetadataValue)>,
    tensors: Vec<(GgufTensorInfo, Vec<f32>)>,
    data_len: u64,
}

impl GgufWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, replacing any earlier value under the same key.
    pub fn add_metadata(&mut self, key: &str, value: GgufMetadataValue) -> &mut Self {
        self.metadata.retain(|(k, _)| k != key);
        self.metadata.push((key.to_string(), value));
        self
    }

    /// Add an f32 tensor. `dims` are in GGUF order, innermost first.
    pub fn add_tensor_f32(&mut self, name: &str, dims: &[u64], data: Vec<f32>) -> Result<&mut Self> {
        let numel = dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .and_then(|n| usize::try_from(n).ok());
        if numel != Some(data.len()) {
            return Err(ModelError::TensorShape {
                name: name.to_string(),
                expected: numel.unwrap_or(usize::MAX),
                got: data.len(),
            });
        }
        let info = GgufTensorInfo {
            name: name.to_string(),
            dims: dims.to_vec(),
            dtype: DType::F32,
            offset: self.data_len,
        };
        let align = GGUF_DEFAULT_ALIGNMENT as u64;
        let size = info
            .data_size()
            .ok_or_else(|| ModelError::TensorOutOfBounds(name.to_string()))?;
        self.data_len = (self.data_len + size as u64).next_multiple_of(align);
        self.tensors.push((info, data));
        Ok(self)
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let mut out = CountingWriter { inner: writer, written: 0 };

        GgufHeader {
            version: GGUF_VERSION,
            n_tensors: self.tensors.len() as u64,
            n_kv: self.metadata.len() as u64,
        }
        .write(&mut out)?;

        for (key, value) in &self.metadata {
            write_gguf_string(&mut out, key)?;
            out.write_all(&value.type_id().to_le_bytes())?;
            value.write_payload(&mut out)?;
        }
        for (info, _) in &self.tensors {
            info.write(&mut out)?;
        }

        out.pad_to(GGUF_DEFAULT_ALIGNMENT)?;
        for (_, data) in &self.tensors {
            for v in data {
                out.write_all(&v.to_le_bytes())?;
            }
            out.pad_to(GGUF_DEFAULT_ALIGNMENT)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut buf = std::io::BufWriter::new(file);
        self.write_to(&mut buf)
    }
}

struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    written: usize,
}

impl<W: Write> CountingWriter<'_, W> {
    fn pad_to(&mut self, alignment: usize) -> std::io::Result<()> {
        let pad = self.written.next_multiple_of(alignment) - self.written;
        self.write_all(&vec![0u8; pad])
    }
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
