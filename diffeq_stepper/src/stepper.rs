use std::{fmt, path::Path};

use compute_manager::{BufferOf, ComputeBackend, KernelStats};

use crate::{StepperError, config::StepperConfig, ode::OdeEvaluator, types::Real};

/// Contract shared by every concrete (statically dispatched) stepper.
///
/// A stepper borrows the compute backend and the evaluator for its whole
/// lifetime `'a`, owns its scratch buffers, and borrows the state buffers
/// only for the duration of one [`Stepper::step`].
pub trait Stepper<'a>: Sized {
    type Compute: ComputeBackend + 'a;
    type Ode: OdeEvaluator<Self::Compute> + 'a;

    /// Builds the stepper and allocates its scratch buffers, sized from `ode`.
    fn new(
        compute: &'a Self::Compute,
        config: &StepperConfig,
        ode: &'a Self::Ode,
    ) -> Result<Self, StepperError>;

    /// Advances `state_in` at `time` by `step_size` into `state_out`.
    ///
    /// Returns the step size a caller should use next.
    fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<Self::Compute>,
        state_out: &mut BufferOf<Self::Compute>,
    ) -> Result<Real, StepperError>;

    fn compute(&self) -> &'a Self::Compute;

    fn uses_kernel_file(&self) -> bool;

    fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError>;

    fn kernel_stats(&self) -> Result<&KernelStats, StepperError>;

    /// Options the evaluator must be built with to work with this stepper.
    /// Needed before the evaluator exists, hence no receiver.
    fn ode_compile_options(out: &mut dyn fmt::Write) -> fmt::Result;
}
