use std::{fmt, str::FromStr};

use compute_manager::ComputeBackend;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    error::{ParseError, StepperError},
    ode::OdeEvaluator,
    rk::{RkStepper, Separated},
    rk_method::{BoSha32, CashKarp54, Dopri54, Euler, Fehlberg54, Midpoint, Rk4},
    stepper::Stepper,
    taylor::TaylorStepper,
};

/// Runtime selector for a concrete stepper, e.g. read from a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepperType {
    RkEuler,
    RkMidpoint,
    RkRk4,
    RkFehlberg54,
    RkDopri54,
    RkCashKarp54,
    RkBoSha32,
    Taylor1,
    Taylor2,
    Taylor3,
    Taylor4,
    Taylor5,
    Taylor6,
    Taylor7,
    Taylor8,
    Taylor9,
}

const STEPPER_TYPE_NAMES: [(StepperType, &str); 16] = [
    (StepperType::RkEuler, "rk_euler"),
    (StepperType::RkMidpoint, "rk_midpoint"),
    (StepperType::RkRk4, "rk_rk4"),
    (StepperType::RkFehlberg54, "rk_fehlberg54"),
    (StepperType::RkDopri54, "rk_dopri54"),
    (StepperType::RkCashKarp54, "rk_cashkarp54"),
    (StepperType::RkBoSha32, "rk_bosha32"),
    (StepperType::Taylor1, "taylor_1"),
    (StepperType::Taylor2, "taylor_2"),
    (StepperType::Taylor3, "taylor_3"),
    (StepperType::Taylor4, "taylor_4"),
    (StepperType::Taylor5, "taylor_5"),
    (StepperType::Taylor6, "taylor_6"),
    (StepperType::Taylor7, "taylor_7"),
    (StepperType::Taylor8, "taylor_8"),
    (StepperType::Taylor9, "taylor_9"),
];

impl StepperType {
    pub const ALL: [StepperType; 16] = [
        StepperType::RkEuler,
        StepperType::RkMidpoint,
        StepperType::RkRk4,
        StepperType::RkFehlberg54,
        StepperType::RkDopri54,
        StepperType::RkCashKarp54,
        StepperType::RkBoSha32,
        StepperType::Taylor1,
        StepperType::Taylor2,
        StepperType::Taylor3,
        StepperType::Taylor4,
        StepperType::Taylor5,
        StepperType::Taylor6,
        StepperType::Taylor7,
        StepperType::Taylor8,
        StepperType::Taylor9,
    ];

    pub fn name(&self) -> &'static str {
        STEPPER_TYPE_NAMES[*self as usize].1
    }
}

impl fmt::Display for StepperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepperType {
    type Err = ParseError;

    /// Parses the first line of `s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s
            .lines()
            .next()
            .unwrap_or_default();
        STEPPER_TYPE_NAMES
            .iter()
            .find(|(_, name)| *name == line)
            .map(|(stepper_type, _)| *stepper_type)
            .ok_or_else(|| ParseError {
                value: line.to_string(),
                type_name: "stepper_type",
            })
    }
}

impl TryFrom<u32> for StepperType {
    type Error = StepperError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(StepperError::UnknownStepperType(value))
    }
}

impl Serialize for StepperType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for StepperType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(de::Error::custom)
    }
}

/// Receives the concrete stepper type a [`StepperType`] stands for.
pub trait StepperTypeVisitor<'a, B, O>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    type Output;

    fn visit<S>(self) -> Self::Output
    where
        S: Stepper<'a, Compute = B, Ode = O> + 'a;
}

/// Calls `visitor` with the stepper `stepper_type` resolves to for backend `B`
/// and evaluator `O`. Runge-Kutta types use separated accumulation.
pub fn visit_stepper_type<'a, B, O, V>(stepper_type: StepperType, visitor: V) -> V::Output
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
    V: StepperTypeVisitor<'a, B, O>,
{
    match stepper_type {
        StepperType::RkEuler => visitor.visit::<RkStepper<'a, B, O, Euler, Separated>>(),
        StepperType::RkMidpoint => visitor.visit::<RkStepper<'a, B, O, Midpoint, Separated>>(),
        StepperType::RkRk4 => visitor.visit::<RkStepper<'a, B, O, Rk4, Separated>>(),
        StepperType::RkFehlberg54 => visitor.visit::<RkStepper<'a, B, O, Fehlberg54, Separated>>(),
        StepperType::RkDopri54 => visitor.visit::<RkStepper<'a, B, O, Dopri54, Separated>>(),
        StepperType::RkCashKarp54 => visitor.visit::<RkStepper<'a, B, O, CashKarp54, Separated>>(),
        StepperType::RkBoSha32 => visitor.visit::<RkStepper<'a, B, O, BoSha32, Separated>>(),
        StepperType::Taylor1 => visitor.visit::<TaylorStepper<'a, B, O, 1>>(),
        StepperType::Taylor2 => visitor.visit::<TaylorStepper<'a, B, O, 2>>(),
        StepperType::Taylor3 => visitor.visit::<TaylorStepper<'a, B, O, 3>>(),
        StepperType::Taylor4 => visitor.visit::<TaylorStepper<'a, B, O, 4>>(),
        StepperType::Taylor5 => visitor.visit::<TaylorStepper<'a, B, O, 5>>(),
        StepperType::Taylor6 => visitor.visit::<TaylorStepper<'a, B, O, 6>>(),
        StepperType::Taylor7 => visitor.visit::<TaylorStepper<'a, B, O, 7>>(),
        StepperType::Taylor8 => visitor.visit::<TaylorStepper<'a, B, O, 8>>(),
        StepperType::Taylor9 => visitor.visit::<TaylorStepper<'a, B, O, 9>>(),
    }
}
