use std::path::PathBuf;

pub mod host;
pub mod kernel;
pub mod stats;

pub use host::{HostBuffer, HostCompute, HostKernel};
pub use kernel::{KernelProgram, KernelSource, KernelWrapper};
pub use stats::KernelStats;

/// Floating point type of every device-resident state buffer.
#[cfg(not(feature = "single-precision"))]
pub type Real = f64;
#[cfg(feature = "single-precision")]
pub type Real = f32;

/// Buffer type of a compute backend.
pub type BufferOf<B> = <B as ComputeBackend>::Buffer;

/// Access flags requested when a device buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl BufferAccess {
    pub fn is_writable(&self) -> bool {
        !matches!(self, BufferAccess::ReadOnly)
    }
}

/// Launch geometry of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    /// Number of work items, one per state element.
    pub global: usize,
    /// Optional work group size, backends may ignore it.
    pub local: Option<usize>,
}

impl NdRange {
    pub fn new(global: usize) -> Self {
        Self {
            global,
            local: None,
        }
    }

    pub fn with_local(mut self, local: usize) -> Self {
        self.local = Some(local);
        self
    }
}

/// Arguments of the weighted sum kernel:
/// `out[e] = (base[e] or out[e]) + sum_k coeff_k * term_k[e]`.
pub struct LinearCombination<'b, Buffer> {
    pub out: &'b mut Buffer,
    pub base: Option<&'b Buffer>,
    pub terms: &'b [(Real, &'b Buffer)],
}

/// A device (or device-like) backend that owns the queue the steppers
/// dispatch into. Steppers never create a backend, they only borrow one
/// and allocate buffers from it.
pub trait ComputeBackend {
    type Buffer;
    type Kernel;

    /// Allocates an uninitialised buffer of `size_byte` bytes.
    fn create_buffer(
        &self,
        access: BufferAccess,
        size_byte: usize,
    ) -> Result<Self::Buffer, ComputeError>;

    /// Copies host data into the buffer.
    fn write_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &mut Self::Buffer,
        data: &[T],
    ) -> Result<(), ComputeError>;

    /// Copies the buffer into `output`, returning the number of elements copied.
    fn read_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &Self::Buffer,
        output: &mut [T],
    ) -> Result<usize, ComputeError>;

    fn copy_buffer(&self, src: &Self::Buffer, dst: &mut Self::Buffer) -> Result<(), ComputeError>;

    fn build_kernel(&self, program: &KernelProgram) -> Result<Self::Kernel, ComputeError>;

    fn run_linear_combination(
        &self,
        kernel: &Self::Kernel,
        range: NdRange,
        args: LinearCombination<'_, Self::Buffer>,
    ) -> Result<(), ComputeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("{0}")]
    InvalidBufferSize(String),
    #[error("kernel '{name}' is not defined in the program source")]
    KernelNotFound { name: String },
    #[error("could not read kernel file {path:?}: {source}")]
    KernelFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("kernel range of {global} work items exceeds buffer length {len}")]
    InvalidRange { global: usize, len: usize },
    #[error("attempted to write into a read-only buffer")]
    AccessViolation,
}
