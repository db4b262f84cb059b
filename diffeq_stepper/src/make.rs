use std::fmt;

use compute_manager::ComputeBackend;

use crate::{
    StepperError,
    config::StepperConfig,
    meta::MetaStepper,
    ode::OdeEvaluator,
    stepper::Stepper,
    stepper_type::{StepperType, StepperTypeVisitor, visit_stepper_type},
};

/// Uniform construction for static and runtime selected steppers, so solver
/// code can be generic over either.
///
/// Concrete steppers ignore `stepper_type`, [`MetaStepper`] uses it to pick
/// its implementation.
pub trait StepperFactory<'a, B, O>: Sized
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    fn make(
        stepper_type: StepperType,
        compute: &'a B,
        config: &StepperConfig,
        ode: &'a O,
    ) -> Result<Self, StepperError>;

    fn ode_compile_options(stepper_type: StepperType, out: &mut dyn fmt::Write) -> fmt::Result;
}

impl<'a, S> StepperFactory<'a, S::Compute, S::Ode> for S
where
    S: Stepper<'a>,
{
    fn make(
        _stepper_type: StepperType,
        compute: &'a S::Compute,
        config: &StepperConfig,
        ode: &'a S::Ode,
    ) -> Result<Self, StepperError> {
        S::new(compute, config, ode)
    }

    fn ode_compile_options(_stepper_type: StepperType, out: &mut dyn fmt::Write) -> fmt::Result {
        <S as Stepper<'a>>::ode_compile_options(out)
    }
}

impl<'a, B, O> StepperFactory<'a, B, O> for MetaStepper<'a, B>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    fn make(
        stepper_type: StepperType,
        compute: &'a B,
        config: &StepperConfig,
        ode: &'a O,
    ) -> Result<Self, StepperError> {
        MetaStepper::new(stepper_type, compute, config, ode)
    }

    fn ode_compile_options(stepper_type: StepperType, out: &mut dyn fmt::Write) -> fmt::Result {
        write_ode_compile_options::<B, O>(stepper_type, out)
    }
}

struct CompileOptions<'w> {
    out: &'w mut dyn fmt::Write,
}

impl<'a, B, O> StepperTypeVisitor<'a, B, O> for CompileOptions<'_>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    type Output = fmt::Result;

    fn visit<S>(self) -> fmt::Result
    where
        S: Stepper<'a, Compute = B, Ode = O> + 'a,
    {
        S::ode_compile_options(self.out)
    }
}

/// Writes the options an evaluator of type `O` must be built with to be
/// driven by the stepper `stepper_type` stands for.
pub fn write_ode_compile_options<B, O>(
    stepper_type: StepperType,
    out: &mut dyn fmt::Write,
) -> fmt::Result
where
    B: ComputeBackend,
    O: OdeEvaluator<B>,
{
    visit_stepper_type::<B, O, _>(stepper_type, CompileOptions { out })
}
