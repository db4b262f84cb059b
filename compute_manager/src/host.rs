use rayon::prelude::*;

use crate::{
    BufferAccess, ComputeBackend, ComputeError, KernelProgram, LinearCombination, NdRange, Real,
};

/// Entry point of the weighted sum kernel understood by [`HostCompute`].
pub const LINEAR_COMBINATION_KERNEL: &str = "linear_combination";

const HOST_KERNELS: [&str; 1] = [LINEAR_COMBINATION_KERNEL];

/// Data-parallel CPU backend. Every work item of a launch is one element of
/// the participating buffers, executed on the rayon thread pool.
#[derive(Debug, Default)]
pub struct HostCompute {}

#[derive(Debug, Clone)]
pub struct HostBuffer {
    label: String,
    access: BufferAccess,
    data: Vec<Real>,
}

impl HostBuffer {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    pub fn len(&self) -> usize {
        self.data
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.data
            .is_empty()
    }

    pub fn size_byte(&self) -> usize {
        self.len() * std::mem::size_of::<Real>()
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        &mut self.data
    }
}

#[derive(Debug, Clone)]
pub struct HostKernel {
    name: String,
    compile_options: String,
}

impl HostKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compile_options(&self) -> &str {
        &self.compile_options
    }
}

impl HostCompute {
    pub fn new() -> Self {
        Self {}
    }

    /// Create a read-only buffer initialised with `data`
    pub fn create_input_buffer<T: bytemuck::Pod>(&self, label: &str, data: &[T]) -> HostBuffer {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let real_size = std::mem::size_of::<Real>();
        let mut buffer = HostBuffer {
            label: label.to_string(),
            access: BufferAccess::ReadOnly,
            data: vec![0.0; bytes.len().div_ceil(real_size)],
        };
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut buffer.data);
        dst[..bytes.len()].copy_from_slice(bytes);
        buffer
    }

    /// Create a zeroed read-write buffer of `size` bytes
    pub fn create_output_buffer(&self, label: &str, size: usize) -> Result<HostBuffer, ComputeError> {
        let mut buffer = self.create_buffer(BufferAccess::ReadWrite, size)?;
        buffer.label = label.to_string();
        Ok(buffer)
    }
}

impl ComputeBackend for HostCompute {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;

    fn create_buffer(
        &self,
        access: BufferAccess,
        size_byte: usize,
    ) -> Result<HostBuffer, ComputeError> {
        let real_size = std::mem::size_of::<Real>();
        if size_byte % real_size != 0 {
            return Err(ComputeError::InvalidBufferSize(format!(
                "buffer size of {size_byte} bytes is not a multiple of {real_size}"
            )));
        }
        Ok(HostBuffer {
            label: String::new(),
            access,
            data: vec![0.0; size_byte / real_size],
        })
    }

    fn write_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &mut HostBuffer,
        data: &[T],
    ) -> Result<(), ComputeError> {
        let src: &[u8] = bytemuck::cast_slice(data);
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut buffer.data);
        if src.len() > dst.len() {
            return Err(ComputeError::InvalidBufferSize(format!(
                "cannot write {} bytes into a buffer of {} bytes",
                src.len(),
                dst.len()
            )));
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn read_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &HostBuffer,
        output: &mut [T],
    ) -> Result<usize, ComputeError> {
        if output.is_empty() {
            return Err(ComputeError::InvalidBufferSize(
                "Output buffer is empty".to_string(),
            ));
        }

        let element_size = std::mem::size_of::<T>();
        let src: &[u8] = bytemuck::cast_slice(&buffer.data);
        let dst: &mut [u8] = bytemuck::cast_slice_mut(output);
        let copy_len = (dst.len().min(src.len()) / element_size) * element_size;
        dst[..copy_len].copy_from_slice(&src[..copy_len]);

        Ok(copy_len / element_size)
    }

    fn copy_buffer(&self, src: &HostBuffer, dst: &mut HostBuffer) -> Result<(), ComputeError> {
        if src.len() != dst.len() {
            return Err(ComputeError::InvalidBufferSize(format!(
                "cannot copy {} elements into a buffer of {}",
                src.len(),
                dst.len()
            )));
        }
        dst.data
            .copy_from_slice(&src.data);
        Ok(())
    }

    fn build_kernel(&self, program: &KernelProgram) -> Result<HostKernel, ComputeError> {
        let name = program
            .kernel_name
            .as_str();
        if !HOST_KERNELS.contains(&name) || !program.source.contains(name) {
            return Err(ComputeError::KernelNotFound {
                name: name.to_string(),
            });
        }
        Ok(HostKernel {
            name: name.to_string(),
            compile_options: program
                .compile_options
                .clone(),
        })
    }

    fn run_linear_combination(
        &self,
        _kernel: &HostKernel,
        range: NdRange,
        args: LinearCombination<'_, HostBuffer>,
    ) -> Result<(), ComputeError> {
        let LinearCombination { out, base, terms } = args;
        if !out.access.is_writable() {
            return Err(ComputeError::AccessViolation);
        }

        let global = range.global;
        let shortest = terms
            .iter()
            .map(|(_, term)| term.len())
            .chain(base.map(HostBuffer::len))
            .fold(out.len(), usize::min);
        if global > shortest {
            return Err(ComputeError::InvalidRange {
                global,
                len: shortest,
            });
        }

        out.data[..global]
            .par_iter_mut()
            .enumerate()
            .for_each(|(e, o)| {
                let mut acc = base.map_or(*o, |base| base.data[e]);
                for (coeff, term) in terms {
                    acc += *coeff * term.data[e];
                }
                *o = acc;
            });

        Ok(())
    }
}
