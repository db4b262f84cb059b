use std::{fmt, path::Path};

use compute_manager::{BufferAccess, BufferOf, ComputeBackend, KernelStats};

use crate::{
    StepperError,
    config::StepperConfig,
    ode::{OdeEvaluator, write_accumulate_define},
    stepper::Stepper,
    types::Real,
};

/// Truncated Taylor series of order `ORDER`,
/// `y(t + h) = y(t) + sum_{m=1}^{ORDER} h^m / m! * y^(m)(t)`.
///
/// The m-th derivative is obtained by applying the evaluator to the (m-1)-th,
/// which is only correct when repeated application of `f` yields the higher
/// derivatives of the solution, e.g. for linear autonomous systems. This is
/// not checked.
///
/// Two scratch buffers are used whatever the order. The stepper launches no
/// kernel of its own, so its kernel config is ignored.
pub struct TaylorStepper<'a, B, O, const ORDER: usize>
where
    B: ComputeBackend,
{
    compute: &'a B,
    ode: &'a O,
    tmp_a: B::Buffer,
    tmp_b: B::Buffer,
}

impl<'a, B, O, const ORDER: usize> TaylorStepper<'a, B, O, ORDER>
where
    B: ComputeBackend,
{
    pub const fn order() -> usize {
        ORDER
    }
}

impl<'a, B, O, const ORDER: usize> Stepper<'a> for TaylorStepper<'a, B, O, ORDER>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
{
    type Compute = B;
    type Ode = O;

    fn new(compute: &'a B, _config: &StepperConfig, ode: &'a O) -> Result<Self, StepperError> {
        const { assert!(ORDER >= 1, "Taylor order must be at least 1") };

        let size = ode.buffer_size_byte();
        Ok(Self {
            compute,
            ode,
            tmp_a: compute.create_buffer(BufferAccess::ReadWrite, size)?,
            tmp_b: compute.create_buffer(BufferAccess::ReadWrite, size)?,
        })
    }

    /// Returns 0, no error estimate is produced.
    fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<B>,
        state_out: &mut BufferOf<B>,
    ) -> Result<Real, StepperError> {
        let h = step_size;

        // the coefficients carry h^m / m!, so the evaluator sees a unit step
        // derivative m is written to tmp_b for odd m, tmp_a for even m
        self.ode
            .solve(time, 1.0, state_in, &mut self.tmp_b, state_out, h, true)?;

        let mut factorial: Real = 1.0;
        let mut power = h;
        for m in 2..=ORDER {
            factorial *= m as Real;
            power *= h;
            let (read, write) = if m % 2 == 1 {
                (&self.tmp_a, &mut self.tmp_b)
            } else {
                (&self.tmp_b, &mut self.tmp_a)
            };
            self.ode
                .solve(time, 1.0, read, write, state_out, power / factorial, false)?;
        }
        Ok(0.0)
    }

    fn compute(&self) -> &'a B {
        self.compute
    }

    fn uses_kernel_file(&self) -> bool {
        false
    }

    fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError> {
        Err(StepperError::NotSupported("kernel file name"))
    }

    fn kernel_stats(&self) -> Result<&KernelStats, StepperError> {
        Err(StepperError::NotSupported("kernel statistics"))
    }

    fn ode_compile_options(out: &mut dyn fmt::Write) -> fmt::Result {
        write_accumulate_define(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ode::LinearOde,
        test_utils::{ode_options, read_state, state_buffer},
    };
    use approx::assert_relative_eq;
    use compute_manager::{HostBuffer, HostCompute, NdRange};
    use nalgebra::DMatrix;

    type Taylor<'a, const ORDER: usize> = TaylorStepper<'a, HostCompute, LinearOde, ORDER>;

    /// Evaluator that returns `step_size * f(y)`, as systems integrating
    /// their own time step do.
    struct StepScaledOde(LinearOde);

    impl OdeEvaluator<HostCompute> for StepScaledOde {
        fn buffer_size_byte(&self) -> usize {
            self.0
                .buffer_size_byte()
        }

        fn solve(
            &self,
            time: Real,
            step_size: Real,
            input: &HostBuffer,
            scratch: &mut HostBuffer,
            output: &mut HostBuffer,
            coefficient: Real,
            initialize: bool,
        ) -> Result<(), StepperError> {
            self.0
                .solve(time, step_size, input, scratch, output, coefficient * step_size, initialize)?;
            for value in scratch.as_mut_slice() {
                *value *= step_size;
            }
            Ok(())
        }
    }

    fn taylor_step<const ORDER: usize>(rate: Real, y0: Real, h: Real) -> (Real, Real) {
        let compute = HostCompute::new();
        let ode = LinearOde::scalar(rate, &ode_options::<Taylor<ORDER>>()).unwrap();
        let config = StepperConfig::embedded("", "", NdRange::new(1));
        let mut stepper = Taylor::<ORDER>::new(&compute, &config, &ode).unwrap();
        let input = state_buffer(&compute, &[y0]);
        let mut output = state_buffer(&compute, &[0.0]);
        let taken = stepper
            .step(0.0, h, &input, &mut output)
            .unwrap();
        assert_eq!(ode.evaluations(), ORDER);
        (read_state(&compute, &output)[0], taken)
    }

    fn partial_sum(h: Real, order: usize) -> Real {
        let mut term = 1.0;
        let mut sum = 1.0;
        for m in 1..=order {
            term *= h / m as Real;
            sum += term;
        }
        sum
    }

    macro_rules! taylor_matches_exponential_series {
        ($($order:literal),*) => {$({
            let h = 0.3;
            let (y1, taken) = taylor_step::<$order>(1.0, 1.0, h);
            assert_relative_eq!(y1, partial_sum(h, $order), max_relative = 1e-14);
            assert_eq!(taken, 0.0);
        })*};
    }

    #[test]
    fn test_exponential_series() {
        taylor_matches_exponential_series!(1, 2, 3, 4, 5, 6, 7, 8, 9);
    }

    #[test]
    fn test_evaluator_sees_unit_step() {
        type Scaled<'a> = TaylorStepper<'a, HostCompute, StepScaledOde, 5>;

        let compute = HostCompute::new();
        let ode = StepScaledOde(LinearOde::scalar(1.0, &ode_options::<Scaled>()).unwrap());
        let config = StepperConfig::embedded("", "", NdRange::new(1));
        let mut stepper = Scaled::new(&compute, &config, &ode).unwrap();
        let input = state_buffer(&compute, &[1.0]);
        let mut output = state_buffer(&compute, &[0.0]);
        let h = 0.3;
        stepper
            .step(0.0, h, &input, &mut output)
            .unwrap();
        assert_relative_eq!(read_state(&compute, &output)[0], partial_sum(h, 5), max_relative = 1e-14);
    }

    #[test]
    fn test_first_order_is_euler() {
        let (y1, _) = taylor_step::<1>(-2.0, 3.0, 0.1);
        assert_relative_eq!(y1, 3.0 * (1.0 - 0.2), max_relative = 1e-14);
    }

    #[test]
    fn test_rotation_stays_on_circle() {
        let compute = HostCompute::new();
        let matrix = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -1.0, 0.0]);
        let ode = LinearOde::new(matrix, &ode_options::<Taylor<9>>()).unwrap();
        let config = StepperConfig::embedded("", "", NdRange::new(2));
        let mut stepper = Taylor::<9>::new(&compute, &config, &ode).unwrap();
        let input = state_buffer(&compute, &[1.0, 0.0]);
        let mut output = state_buffer(&compute, &[0.0, 0.0]);
        let h: Real = 0.5;
        stepper
            .step(0.0, h, &input, &mut output)
            .unwrap();
        let y = read_state(&compute, &output);
        assert_relative_eq!(y[0], h.cos(), max_relative = 1e-8);
        assert_relative_eq!(y[1], -h.sin(), max_relative = 1e-8);
    }

    #[test]
    fn test_no_kernel_identity() {
        let compute = HostCompute::new();
        let ode = LinearOde::scalar(1.0, &ode_options::<Taylor<3>>()).unwrap();
        let config = StepperConfig::from_file("missing.cl", "linear_combination", "", "", NdRange::new(1));
        let stepper = Taylor::<3>::new(&compute, &config, &ode).unwrap();
        assert!(!stepper.uses_kernel_file());
        assert!(matches!(
            stepper.kernel_file_name(),
            Err(StepperError::NotSupported(_))
        ));
        assert!(matches!(
            stepper.kernel_stats(),
            Err(StepperError::NotSupported(_))
        ));
        assert_eq!(Taylor::<3>::order(), 3);
    }

    #[test]
    fn test_requires_accumulating_ode() {
        assert_eq!(ode_options::<Taylor<4>>(), "#define ODE_ACCUMULATE\n");
    }
}
