use std::{
    fmt::Write as _,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use compute_manager::{ComputeBackend, KernelSource, NdRange};
use ron::{
    from_str,
    ser::{PrettyConfig, to_string_pretty},
};
use serde::{Deserialize, Serialize};

use crate::{StepperError, make::write_ode_compile_options, ode::OdeEvaluator, stepper_type::StepperType};

/// Construction arguments shared by every stepper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepperConfig {
    pub kernel: KernelSource,
    /// Prepended to the kernel source, e.g. type definitions shared with the evaluator.
    pub source_header: String,
    pub compile_options: String,
    pub range: NdRange,
}

impl StepperConfig {
    /// Uses the stepper's built-in kernel source.
    pub fn embedded(
        source_header: impl Into<String>,
        compile_options: impl Into<String>,
        range: NdRange,
    ) -> Self {
        Self {
            kernel: KernelSource::Embedded,
            source_header: source_header.into(),
            compile_options: compile_options.into(),
            range,
        }
    }

    pub fn inline(
        source: impl Into<String>,
        kernel_name: impl Into<String>,
        source_header: impl Into<String>,
        compile_options: impl Into<String>,
        range: NdRange,
    ) -> Self {
        Self {
            kernel: KernelSource::Inline {
                source: source.into(),
                kernel_name: kernel_name.into(),
            },
            source_header: source_header.into(),
            compile_options: compile_options.into(),
            range,
        }
    }

    /// The file is read when the stepper is built.
    pub fn from_file(
        path: impl Into<PathBuf>,
        kernel_name: impl Into<String>,
        source_header: impl Into<String>,
        compile_options: impl Into<String>,
        range: NdRange,
    ) -> Self {
        Self {
            kernel: KernelSource::File {
                path: path.into(),
                kernel_name: kernel_name.into(),
            },
            source_header: source_header.into(),
            compile_options: compile_options.into(),
            range,
        }
    }
}

/// User facing stepper selection, stored as RON.
///
/// ```ron
/// (
///     stepper_type: "rk_dopri54",
///     work_group_size: Some(64),
///     defines: ["N_STATES 128"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepperSettings {
    pub stepper_type: StepperType,
    #[serde(default)]
    pub work_group_size: Option<usize>,
    /// Extra `#define`s for the stepper kernel and the evaluator, without the keyword.
    #[serde(default)]
    pub defines: Vec<String>,
}

impl StepperSettings {
    pub fn new(stepper_type: StepperType) -> Self {
        Self {
            stepper_type,
            work_group_size: None,
            defines: Vec::new(),
        }
    }

    pub fn from_ron_str(text: &str) -> Result<Self, StepperError> {
        from_str(text).map_err(|e| StepperError::Settings(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, StepperError> {
        let mut file = File::open(path)
            .map_err(|e| StepperError::Settings(format!("failed to open {path:?}: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| StepperError::Settings(format!("failed to read {path:?}: {e}")))?;

        from_str(&contents)
            .map_err(|e| StepperError::Settings(format!("failed to parse {path:?}: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), StepperError> {
        let ron_string = to_string_pretty(self, PrettyConfig::new())
            .map_err(|e| StepperError::Settings(e.to_string()))?;

        let mut file = File::create(path)
            .map_err(|e| StepperError::Settings(format!("failed to create {path:?}: {e}")))?;
        file.write_all(ron_string.as_bytes())
            .map_err(|e| StepperError::Settings(format!("failed to write {path:?}: {e}")))
    }

    /// The extra definitions, one `#define` per line.
    pub fn define_lines(&self) -> String {
        let mut out = String::new();
        for define in &self.defines {
            // writing to a String cannot fail
            let _ = writeln!(out, "#define {define}");
        }
        out
    }

    /// Compile options for an evaluator driven by the selected stepper.
    pub fn ode_compile_options<B, O>(&self) -> Result<String, StepperError>
    where
        B: ComputeBackend,
        O: OdeEvaluator<B>,
    {
        let mut out = self.define_lines();
        write_ode_compile_options::<B, O>(self.stepper_type, &mut out)
            .map_err(|e| StepperError::Settings(e.to_string()))?;
        Ok(out)
    }

    pub fn range(&self, state_len: usize) -> Result<NdRange, StepperError> {
        let range = NdRange::new(state_len);
        match self.work_group_size {
            None => Ok(range),
            Some(0) => Err(StepperError::Settings(
                "work group size must be positive".to_string(),
            )),
            Some(local) if state_len % local != 0 => Err(StepperError::Settings(format!(
                "work group size {local} does not divide the state length {state_len}"
            ))),
            Some(local) => Ok(range.with_local(local)),
        }
    }

    /// Config for the built-in stepper kernel over `state_len` elements.
    pub fn stepper_config(
        &self,
        source_header: &str,
        state_len: usize,
    ) -> Result<StepperConfig, StepperError> {
        let mut header = String::from(source_header);
        if !header.is_empty() && !header.ends_with('\n') {
            header.push('\n');
        }
        header.push_str(&self.define_lines());
        Ok(StepperConfig::embedded(header, "", self.range(state_len)?))
    }
}
