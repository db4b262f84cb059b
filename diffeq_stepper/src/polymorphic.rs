use std::{marker::PhantomData, path::Path};

use compute_manager::{BufferOf, ComputeBackend, KernelStats};

use crate::{
    StepperError,
    config::StepperConfig,
    ode::OdeEvaluator,
    stepper::Stepper,
    stepper_type::{StepperType, StepperTypeVisitor, visit_stepper_type},
    types::Real,
};

/// Object safe face of a [`Stepper`], for steppers chosen at runtime.
pub trait PolymorphicStepper<'a, B: ComputeBackend> {
    fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<B>,
        state_out: &mut BufferOf<B>,
    ) -> Result<Real, StepperError>;

    fn compute(&self) -> &'a B;

    fn uses_kernel_file(&self) -> bool;

    fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError>;

    fn kernel_stats(&self) -> Result<&KernelStats, StepperError>;
}

/// Owns a concrete stepper and forwards every call to it unchanged.
pub struct PolymorphicStepperAdapter<'a, S> {
    stepper: S,
    _lifetime: PhantomData<&'a ()>,
}

impl<'a, S: Stepper<'a>> PolymorphicStepperAdapter<'a, S> {
    pub fn new(
        compute: &'a S::Compute,
        config: &StepperConfig,
        ode: &'a S::Ode,
    ) -> Result<Self, StepperError> {
        Ok(Self::from_stepper(S::new(compute, config, ode)?))
    }

    pub fn from_stepper(stepper: S) -> Self {
        Self {
            stepper,
            _lifetime: PhantomData,
        }
    }

    pub fn inner(&self) -> &S {
        &self.stepper
    }

    pub fn into_inner(self) -> S {
        self.stepper
    }
}

impl<'a, S: Stepper<'a>> PolymorphicStepper<'a, S::Compute> for PolymorphicStepperAdapter<'a, S> {
    fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<S::Compute>,
        state_out: &mut BufferOf<S::Compute>,
    ) -> Result<Real, StepperError> {
        self.stepper
            .step(time, step_size, state_in, state_out)
    }

    fn compute(&self) -> &'a S::Compute {
        self.stepper
            .compute()
    }

    fn uses_kernel_file(&self) -> bool {
        self.stepper
            .uses_kernel_file()
    }

    fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError> {
        self.stepper
            .kernel_file_name()
    }

    fn kernel_stats(&self) -> Result<&KernelStats, StepperError> {
        self.stepper
            .kernel_stats()
    }
}

pub type BoxedStepper<'a, B> = Box<dyn PolymorphicStepper<'a, B> + 'a>;

struct MakePolymorphic<'a, 'c, B, O> {
    compute: &'a B,
    config: &'c StepperConfig,
    ode: &'a O,
}

impl<'a, B, O> StepperTypeVisitor<'a, B, O> for MakePolymorphic<'a, '_, B, O>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    type Output = Result<BoxedStepper<'a, B>, StepperError>;

    fn visit<S>(self) -> Self::Output
    where
        S: Stepper<'a, Compute = B, Ode = O> + 'a,
    {
        let adapter = PolymorphicStepperAdapter::<S>::new(self.compute, self.config, self.ode)?;
        Ok(Box::new(adapter))
    }
}

/// Builds the stepper `stepper_type` stands for, behind the polymorphic interface.
pub fn make_polymorphic_stepper<'a, B, O>(
    stepper_type: StepperType,
    compute: &'a B,
    config: &StepperConfig,
    ode: &'a O,
) -> Result<BoxedStepper<'a, B>, StepperError>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    visit_stepper_type::<B, O, _>(
        stepper_type,
        MakePolymorphic {
            compute,
            config,
            ode,
        },
    )
}
