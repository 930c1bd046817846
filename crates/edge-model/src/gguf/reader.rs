use std::io::{BufReader, Seek};
use std::path::Path;

use memmap2::Mmap;

use edge_tensor::{DType, Shape, Tensor};

use super::header::{GgufHeader, GGUF_DEFAULT_ALIGNMENT};
use super::metadata::GgufMetadata;
use super::tensor_info::{self, GgufTensorInfo};
use crate::error::{ModelError, Result};

/// A parsed GGUF file backed by a memory-mapped region.
///
/// The header, metadata and tensor table are read with buffered I/O, then the
/// whole file is mapped so tensor data can be sliced without further reads.
pub struct GgufFile {
    pub header: GgufHeader,
    pub metadata: GgufMetadata,
    pub tensor_infos: Vec<GgufTensorInfo>,
    mmap: Mmap,
    /// Byte offset within the file where tensor data begins (aligned).
    data_offset: usize,
}

impl std::fmt::Debug for GgufFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GgufFile")
            .field("header", &self.header)
            .field("n_tensors", &self.tensor_infos.len())
            .field("data_offset", &self.data_offset)
            .finish()
    }
}

impl GgufFile {
    /// Open and parse a GGUF file from disk.
    pub fn open(path: &Path) -> Result<GgufFile> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(&file);

        let header = GgufHeader::parse(&mut reader)?;
        let metadata = GgufMetadata::parse_kv(&mut reader, header.n_kv)?;
        let tensor_infos = tensor_info::parse_tensor_infos(&mut reader, header.n_tensors)?;

        let alignment = match metadata.get_uint("general.alignment") {
            Ok(a) if a > 0 && a.is_power_of_two() => a as usize,
            Ok(a) => {
                return Err(ModelError::InvalidHyperparameters(format!(
                    "general.alignment must be a power of two, got {}",
                    a
                )))
            }
            Err(_) => GGUF_DEFAULT_ALIGNMENT,
        };

        let current_pos = reader.stream_position()? as usize;
        let data_offset = current_pos.next_multiple_of(alignment);

        // SAFETY: the mapping is read-only and lives as long as `GgufFile`.
        // Concurrent truncation of the file by another process is not guarded against.
        let mmap = unsafe { Mmap::map(&file)? };

        log::debug!(
            "opened GGUF v{} from {}: {} tensors, {} metadata keys, data at {:#x}",
            header.version,
            path.display(),
            tensor_infos.len(),
            metadata.entries.len(),
            data_offset
        );

        Ok(GgufFile {
            header,
            metadata,
            tensor_infos,
            mmap,
            data_offset,
        })
    }

    pub fn tensor_info(&self, name: &str) -> Option<&GgufTensorInfo> {
        self.tensor_infos.iter().find(|t| t.name == name)
    }

    /// Raw bytes of a tensor within the mapped file.
    pub fn tensor_data(&self, info: &GgufTensorInfo) -> Result<&[u8]> {
        let start = usize::try_from(info.offset)
            .ok()
            .and_then(|offset| self.data_offset.checked_add(offset));
        let end = start
            .zip(info.data_size())
            .and_then(|(s, size)| s.checked_add(size));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.mmap.len() => Ok(&self.mmap[start..end]),
            _ => Err(ModelError::TensorOutOfBounds(info.name.clone())),
        }
    }

    /// Load a tensor by name, dequantizing to f32 if needed.
    ///
    /// The returned shape lists dimensions outermost first, the reverse of
    /// the GGUF `ne` order.
    pub fn get_tensor_f32(&self, name: &str) -> Result<Tensor> {
        let info = self
            .tensor_info(name)
            .ok_or_else(|| ModelError::TensorNotFound(name.to_string()))?;

        let raw = self.tensor_data(info)?;
        // tensor_data succeeded, so the element count and every dim fit in usize.
        let numel = info
            .numel()
            .ok_or_else(|| ModelError::TensorOutOfBounds(info.name.clone()))?;
        let dims: Vec<usize> = info.dims.iter().rev().map(|&d| d as usize).collect();

        let data = match info.dtype {
            DType::F32 => dequantize_f32(raw),
            DType::F16 => dequantize_f16(raw),
            DType::Q4_0 => dequantize_q4_0(raw, numel),
            DType::Q8_0 => dequantize_q8_0(raw, numel),
        };

        Ok(Tensor::new(data, Shape::new(dims))?)
    }
}

fn dequantize_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn dequantize_f16(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(2)
        .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
        .collect()
}

/// Q4_0 block: f16 scale, then 16 bytes holding 32 unsigned nibbles.
///
/// llama.cpp stores the low nibbles of all 16 bytes as elements 0..16 and the
/// high nibbles as elements 16..32. Each value is `(nibble - 8) * scale`.
fn dequantize_q4_0(data: &[u8], numel: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(numel + 32);
    for block in data.chunks_exact(18) {
        let scale = half::f16::from_le_bytes([block[0], block[1]]).to_f32();
        let qs = &block[2..];
        out.extend(qs.iter().map(|&b| ((b & 0x0F) as i32 - 8) as f32 * scale));
        out.extend(qs.iter().map(|&b| ((b >> 4) as i32 - 8) as f32 * scale));
    }
    out.truncate(numel);
    out
}

/// Q8_0 block: f16 scale, then 32 signed bytes. Each value is `q * scale`.
fn dequantize_q8_0(data: &[u8], numel: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(numel + 32);
    for block in data.chunks_exact(34) {
        let scale = half::f16::from_le_bytes([block[0], block[1]]).to_f32();
        out.extend(block[2..].iter().map(|&q| q as i8 as f32 * scale));
    }
    out.truncate(numel);
    out
}
