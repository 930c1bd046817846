//! `edge-tensor` - Tensor primitives with pluggable compute backends for edge-runtime.
//!
//! This crate provides:
//! - A `Tensor` type holding contiguous f32 data
//! - A `ComputeBackend` trait the model forward pass dispatches to
//! - A reference `CpuBackend` with an optional `rayon` thread pool
//! - Data type definitions shared with the GGUF reader (F32, F16, quantized formats)

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod tensor;

pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::Tensor;
