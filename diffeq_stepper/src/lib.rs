//! Time steppers for ODEs whose right-hand side runs on a compute device.
//!
//! Steppers can be fixed at compile time ([`RkStepper`], [`TaylorStepper`]) or
//! picked at runtime from a [`StepperType`] through [`MetaStepper`]. Both share
//! the same step contract and the same construction arguments, see
//! [`StepperFactory`].

/// Submodules for steppers and their selection.
pub mod config;
pub mod error;
pub mod make;
pub mod meta;
pub mod ode;
pub mod polymorphic;
pub mod rk;
pub mod rk_method;
pub mod stepper;
pub mod stepper_type;
pub mod stepping;
pub mod tableau;
pub mod taylor;
pub mod types;

pub use config::{StepperConfig, StepperSettings};
pub use error::{ParseError, StepperError};
pub use make::{StepperFactory, write_ode_compile_options};
pub use meta::MetaStepper;
pub use ode::{LinearOde, ODE_ACCUMULATE_DEFINE, OdeEvaluator};
pub use polymorphic::{
    BoxedStepper, PolymorphicStepper, PolymorphicStepperAdapter, make_polymorphic_stepper,
};
pub use rk::{AccumulateMethod, AccumulateTag, Integrated, RkStepper, Separated, Subdiagonal};
pub use rk_method::{RkMethod, RkMethodTag};
pub use stepper::Stepper;
pub use stepper_type::{StepperType, StepperTypeVisitor, visit_stepper_type};
pub use stepping::{FixedStepDriver, FixedStepOutcome, StateSlot};
pub use tableau::ButcherTableau;
pub use taylor::TaylorStepper;
pub use types::Real;
