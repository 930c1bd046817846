use std::fmt;

/// Element formats a GGUF tensor can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    /// IEEE 754 half precision.
    F16,
    /// Blocks of 32 4-bit values sharing one f16 scale.
    Q4_0,
    /// Blocks of 32 signed 8-bit values sharing one f16 scale.
    Q8_0,
}

impl DType {
    /// Bytes per element for plain types, bytes per block for quantized ones.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
            DType::Q4_0 => 18,
            DType::Q8_0 => 34,
        }
    }

    /// Elements per quantization block, 1 for plain types.
    pub fn block_size(&self) -> usize {
        match self {
            DType::F32 | DType::F16 => 1,
            DType::Q4_0 | DType::Q8_0 => 32,
        }
    }

    /// Number of bytes needed to store `numel` elements, `None` on overflow.
    pub fn storage_bytes(&self, numel: usize) -> Option<usize> {
        numel.div_ceil(self.block_size()).checked_mul(self.size_in_bytes())
    }

    /// Maps a GGUF `ggml_type` id to a `DType`.
    pub fn from_gguf_type(id: u32) -> Option<DType> {
        match id {
            0 => Some(DType::F32),
            1 => Some(DType::F16),
            2 => Some(DType::Q4_0),
            8 => Some(DType::Q8_0),
            _ => None,
        }
    }

    pub fn to_gguf_type(&self) -> u32 {
        match self {
            DType::F32 => 0,
            DType::F16 => 1,
            DType::Q4_0 => 2,
            DType::Q8_0 => 8,
        }
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, DType::Q4_0 | DType::Q8_0)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
            DType::Q4_0 => write!(f, "q4_0"),
            DType::Q8_0 => write!(f, "q8_0"),
        }
    }
}
