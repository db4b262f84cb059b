use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{ComputeBackend, ComputeError, KernelStats, LinearCombination, NdRange, Real};

/// Where the source of a kernel comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    /// The source shipped with the kernel's owner, see [`EmbeddedKernel`].
    Embedded,
    /// Source text and entry point supplied by the caller.
    Inline { source: String, kernel_name: String },
    /// Source loaded from a file when the kernel is built.
    File { path: PathBuf, kernel_name: String },
}

/// Source text and entry point compiled into the crate that owns the kernel.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedKernel {
    pub source: &'static str,
    pub kernel_name: &'static str,
}

/// Everything a backend needs to build one kernel.
#[derive(Debug, Clone)]
pub struct KernelProgram {
    /// Full program text, header first.
    pub source: String,
    pub kernel_name: String,
    pub compile_options: String,
}

impl KernelProgram {
    pub fn resolve(
        source: &KernelSource,
        embedded: &EmbeddedKernel,
        source_header: &str,
        compile_options: &str,
    ) -> Result<Self, ComputeError> {
        let (body, kernel_name) = match source {
            KernelSource::Embedded => (
                embedded
                    .source
                    .to_string(),
                embedded
                    .kernel_name
                    .to_string(),
            ),
            KernelSource::Inline {
                source,
                kernel_name,
            } => (source.clone(), kernel_name.clone()),
            KernelSource::File { path, kernel_name } => {
                let body = std::fs::read_to_string(path).map_err(|source| {
                    ComputeError::KernelFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                (body, kernel_name.clone())
            }
        };

        let mut program = String::with_capacity(source_header.len() + body.len() + 1);
        program.push_str(source_header);
        if !source_header.is_empty() && !source_header.ends_with('\n') {
            program.push('\n');
        }
        program.push_str(&body);

        Ok(Self {
            source: program,
            kernel_name,
            compile_options: compile_options.to_string(),
        })
    }
}

/// A built kernel together with its identity and launch statistics.
pub struct KernelWrapper<'a, B: ComputeBackend> {
    compute: &'a B,
    kernel: B::Kernel,
    range: NdRange,
    kernel_name: String,
    file_name: Option<PathBuf>,
    stats: KernelStats,
}

impl<'a, B: ComputeBackend> KernelWrapper<'a, B> {
    pub fn new(
        compute: &'a B,
        source: &KernelSource,
        embedded: &EmbeddedKernel,
        source_header: &str,
        compile_options: &str,
        range: NdRange,
    ) -> Result<Self, ComputeError> {
        let program = KernelProgram::resolve(source, embedded, source_header, compile_options)?;
        let kernel = compute.build_kernel(&program)?;
        let file_name = match source {
            KernelSource::File { path, .. } => Some(path.clone()),
            _ => None,
        };
        Ok(Self {
            compute,
            kernel,
            range,
            kernel_name: program.kernel_name,
            file_name,
            stats: KernelStats::default(),
        })
    }

    pub fn compute(&self) -> &'a B {
        self.compute
    }

    pub fn range(&self) -> NdRange {
        self.range
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn uses_kernel_file(&self) -> bool {
        self.file_name
            .is_some()
    }

    pub fn kernel_file_name(&self) -> Option<&Path> {
        self.file_name
            .as_deref()
    }

    pub fn kernel_stats(&self) -> &KernelStats {
        &self.stats
    }

    /// Launches the kernel and records its wall time.
    pub fn run_linear_combination(
        &mut self,
        out: &mut B::Buffer,
        base: Option<&B::Buffer>,
        terms: &[(Real, &B::Buffer)],
    ) -> Result<(), ComputeError> {
        let start = Instant::now();
        self.compute
            .run_linear_combination(
                &self.kernel,
                self.range,
                LinearCombination { out, base, terms },
            )?;
        self.stats
            .add(start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferAccess, HostCompute, host::LINEAR_COMBINATION_KERNEL};
    use approx::assert_abs_diff_eq;

    const TEST_KERNEL: EmbeddedKernel = EmbeddedKernel {
        source: "__kernel void linear_combination() {}",
        kernel_name: LINEAR_COMBINATION_KERNEL,
    };

    #[test]
    fn test_resolve_embedded_prepends_header() {
        let program = KernelProgram::resolve(
            &KernelSource::Embedded,
            &TEST_KERNEL,
            "#define N 4",
            "-cl-fast-relaxed-math",
        )
        .unwrap();
        assert_eq!(
            program.source,
            "#define N 4\n__kernel void linear_combination() {}"
        );
        assert_eq!(program.kernel_name, LINEAR_COMBINATION_KERNEL);
        assert_eq!(program.compile_options, "-cl-fast-relaxed-math");
    }

    #[test]
    fn test_resolve_missing_file() {
        let source = KernelSource::File {
            path: PathBuf::from("/definitely/not/here.cl"),
            kernel_name: "linear_combination".to_string(),
        };
        let result = KernelProgram::resolve(&source, &TEST_KERNEL, "", "");
        assert!(matches!(
            result,
            Err(ComputeError::KernelFile { .. })
        ));
    }

    #[test]
    fn test_wrapper_records_stats() {
        let compute = HostCompute::new();
        let mut wrapper = KernelWrapper::new(
            &compute,
            &KernelSource::Embedded,
            &TEST_KERNEL,
            "",
            "",
            NdRange::new(3),
        )
        .unwrap();
        assert!(!wrapper.uses_kernel_file());
        assert!(
            wrapper
                .kernel_file_name()
                .is_none()
        );

        let a = compute.create_input_buffer("a", &[1.0 as Real, 2.0, 3.0]);
        let mut out = compute
            .create_buffer(BufferAccess::ReadWrite, 3 * std::mem::size_of::<Real>())
            .unwrap();

        wrapper
            .run_linear_combination(&mut out, Some(&a), &[(2.0, &a)])
            .unwrap();
        wrapper
            .run_linear_combination(&mut out, None, &[(-1.0, &a)])
            .unwrap();

        let mut result = [0.0 as Real; 3];
        compute
            .read_buffer(&out, &mut result)
            .unwrap();
        assert_abs_diff_eq!(result[0], 2.0);
        assert_abs_diff_eq!(result[1], 4.0);
        assert_abs_diff_eq!(result[2], 6.0);
        assert_eq!(
            wrapper
                .kernel_stats()
                .count(),
            2
        );
    }

    #[test]
    fn test_inline_source_without_entry_point() {
        let compute = HostCompute::new();
        let source = KernelSource::Inline {
            source: "__kernel void something_else() {}".to_string(),
            kernel_name: LINEAR_COMBINATION_KERNEL.to_string(),
        };
        let result = KernelWrapper::new(&compute, &source, &TEST_KERNEL, "", "", NdRange::new(1));
        assert!(matches!(
            result,
            Err(ComputeError::KernelNotFound { .. })
        ));
    }
}
