use std::{cell::Cell, fmt};

use compute_manager::{ComputeBackend, HostBuffer, HostCompute};
use nalgebra::{DMatrix, DVector};

use crate::{StepperError, types::Real};

/// Compile definition that makes an evaluator accumulate into its output buffer.
pub const ODE_ACCUMULATE_DEFINE: &str = "#define ODE_ACCUMULATE";

/// Writes the accumulate definition as one line of compile options.
pub fn write_accumulate_define(out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(out, "{ODE_ACCUMULATE_DEFINE}")
}

/// True if `compile_options` enables accumulation.
pub fn accumulate_enabled(compile_options: &str) -> bool {
    compile_options
        .lines()
        .any(|line| line.trim() == ODE_ACCUMULATE_DEFINE)
}

/// Right-hand side of `y' = f(t, y)`, evaluated on a compute backend.
///
/// Evaluators are built before the steppers that drive them, with the compile
/// options a stepper reports through `ode_compile_options`.
pub trait OdeEvaluator<B: ComputeBackend> {
    /// Size in bytes of one state vector.
    fn buffer_size_byte(&self) -> usize;

    /// Evaluates `scratch = f(time, input)`.
    ///
    /// An evaluator built with [`ODE_ACCUMULATE_DEFINE`] additionally performs
    /// `output = (input if initialize else output) + coefficient * scratch`.
    /// Without it `output` is left untouched.
    ///
    /// `step_size` is informational. Steppers that fold the step into
    /// `coefficient` themselves, such as the Taylor stepper, pass `1.0`.
    #[allow(clippy::too_many_arguments)]
    fn solve(
        &self,
        time: Real,
        step_size: Real,
        input: &B::Buffer,
        scratch: &mut B::Buffer,
        output: &mut B::Buffer,
        coefficient: Real,
        initialize: bool,
    ) -> Result<(), StepperError>;
}

/// Linear, autonomous system `y' = A y` on the host backend.
///
/// Repeated application of `A` yields every higher derivative, so this system
/// also satisfies the precondition of the Taylor stepper.
#[derive(Debug)]
pub struct LinearOde {
    matrix: DMatrix<Real>,
    accumulate: bool,
    evaluations: Cell<usize>,
}

impl LinearOde {
    pub fn new(matrix: DMatrix<Real>, compile_options: &str) -> Result<Self, StepperError> {
        if !matrix.is_square() {
            return Err(StepperError::Ode(
                format!(
                    "system matrix must be square, got {}x{}",
                    matrix.nrows(),
                    matrix.ncols()
                )
                .into(),
            ));
        }
        Ok(Self {
            matrix,
            accumulate: accumulate_enabled(compile_options),
            evaluations: Cell::new(0),
        })
    }

    /// `y' = rate * y` for a single component.
    pub fn scalar(rate: Real, compile_options: &str) -> Result<Self, StepperError> {
        Self::new(DMatrix::from_element(1, 1, rate), compile_options)
    }

    pub fn dim(&self) -> usize {
        self.matrix
            .nrows()
    }

    pub fn accumulates(&self) -> bool {
        self.accumulate
    }

    /// Number of right-hand side evaluations so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
            .get()
    }
}

impl OdeEvaluator<HostCompute> for LinearOde {
    fn buffer_size_byte(&self) -> usize {
        self.dim() * std::mem::size_of::<Real>()
    }

    fn solve(
        &self,
        _time: Real,
        _step_size: Real,
        input: &HostBuffer,
        scratch: &mut HostBuffer,
        output: &mut HostBuffer,
        coefficient: Real,
        initialize: bool,
    ) -> Result<(), StepperError> {
        let n = self.dim();
        if input.len() != n || scratch.len() != n || output.len() != n {
            return Err(StepperError::Ode(
                format!("state buffers must hold {n} elements").into(),
            ));
        }

        let y = DVector::from_column_slice(input.as_slice());
        let dy = &self.matrix * y;
        scratch
            .as_mut_slice()
            .copy_from_slice(dy.as_slice());

        if self.accumulate {
            if initialize {
                output
                    .as_mut_slice()
                    .copy_from_slice(input.as_slice());
            }
            for (out, d) in output
                .as_mut_slice()
                .iter_mut()
                .zip(dy.iter())
            {
                *out += coefficient * d;
            }
        }

        self.evaluations
            .set(self.evaluations.get() + 1);
        Ok(())
    }
}
