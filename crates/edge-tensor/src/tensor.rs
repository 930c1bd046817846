use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Contiguous, row-major f32 data with an associated shape.
///
/// Weights are dequantized to f32 when they are read from a model file, so
/// this is the only element type the compute path sees.
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    /// Create a tensor, checking that `data` fills `shape` exactly.
    pub fn new(data: Vec<f32>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(TensorError::LengthMismatch {
                op: "tensor",
                expected: shape.numel(),
                got: data.len(),
            });
        }
        Ok(Tensor { data, shape })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data_f32(&self) -> &[f32] {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Consume the tensor and return its data.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}
