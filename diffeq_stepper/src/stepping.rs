use crate::{StepperError, types::Real};

/// Which of the two state buffers handed to [`FixedStepDriver::run`] holds a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSlot {
    First,
    Second,
}

impl StateSlot {
    pub fn index(&self) -> usize {
        match self {
            StateSlot::First => 0,
            StateSlot::Second => 1,
        }
    }

    fn other(&self) -> Self {
        match self {
            StateSlot::First => StateSlot::Second,
            StateSlot::Second => StateSlot::First,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStepOutcome {
    /// Time of the final state.
    pub time: Real,
    pub steps: usize,
    /// Buffer holding the final state.
    pub result: StateSlot,
}

/// Integrates over `tspan` with a constant step size, alternating between two
/// state buffers. The last step is shortened to end exactly on `tspan.1`.
///
/// Works with any stepper through a closure, e.g.
/// `driver.run(&mut buffers, |t, h, x, y| stepper.step(t, h, x, y))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStepDriver {
    pub tspan: (Real, Real),
    pub dt: Real,
}

impl FixedStepDriver {
    pub fn new(tspan: (Real, Real), dt: Real) -> Result<Self, StepperError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(StepperError::Settings(format!(
                "step size must be positive and finite, got {dt}"
            )));
        }
        if tspan.0.is_nan() || tspan.1.is_nan() || tspan.1 < tspan.0 {
            return Err(StepperError::Settings(format!(
                "end time {} is before start time {}",
                tspan.1, tspan.0
            )));
        }
        Ok(Self { tspan, dt })
    }

    /// Number of steps `run` takes.
    pub fn steps(&self) -> usize {
        let n = ((self.tspan.1 - self.tspan.0) / self.dt).ceil() as usize;
        // guard against round-off producing a final step of almost zero length
        if n > 0 && self.tspan.0 + (n - 1) as Real * self.dt >= self.tspan.1 {
            n - 1
        } else {
            n
        }
    }

    /// Starts from the state in `buffers[0]`.
    pub fn run<Buf, F>(&self, buffers: &mut [Buf; 2], mut step: F) -> Result<FixedStepOutcome, StepperError>
    where
        F: FnMut(Real, Real, &Buf, &mut Buf) -> Result<Real, StepperError>,
    {
        let steps = self.steps();
        let mut current = StateSlot::First;
        let mut time = self.tspan.0;

        for n in 0..steps {
            let h = if n + 1 == steps {
                self.tspan.1 - time
            } else {
                self.dt
            };
            let [first, second] = &mut *buffers;
            let (input, output) = match current {
                StateSlot::First => (&*first, second),
                StateSlot::Second => (&*second, first),
            };
            step(time, h, input, output)?;
            current = current.other();
            time = if n + 1 == steps {
                self.tspan.1
            } else {
                self.tspan.0 + (n + 1) as Real * self.dt
            };
        }

        Ok(FixedStepOutcome {
            time,
            steps,
            result: current,
        })
    }
}
