use compute_manager::ComputeError;
use thiserror::Error;

/// Text that did not match any entry of a name table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {type_name}.")]
pub struct ParseError {
    pub value: String,
    pub type_name: &'static str,
}

#[derive(Debug, Error)]
pub enum StepperError {
    #[error("unknown Runge-Kutta method: {0}")]
    UnknownMethod(u32),
    #[error("unknown stepper type: {0}")]
    UnknownStepperType(u32),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{0} is not supported by this stepper")]
    NotSupported(&'static str),
    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),
    #[error("ODE evaluation failed: {0}")]
    Ode(Box<dyn std::error::Error + Send + Sync>),
    #[error("invalid settings: {0}")]
    Settings(String),
}
