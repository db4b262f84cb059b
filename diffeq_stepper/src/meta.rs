use std::{fmt, path::Path};

use compute_manager::{BufferOf, ComputeBackend, KernelStats};

use crate::{
    StepperError,
    config::StepperConfig,
    make::write_ode_compile_options,
    ode::OdeEvaluator,
    polymorphic::{BoxedStepper, make_polymorphic_stepper},
    stepper_type::StepperType,
    types::Real,
};

/// Stepper selected at runtime from a [`StepperType`].
///
/// The concrete stepper is fixed at construction and owned exclusively.
pub struct MetaStepper<'a, B: ComputeBackend> {
    stepper_type: StepperType,
    stepper: BoxedStepper<'a, B>,
}

impl<'a, B: ComputeBackend + 'a> MetaStepper<'a, B> {
    pub fn new<O>(
        stepper_type: StepperType,
        compute: &'a B,
        config: &StepperConfig,
        ode: &'a O,
    ) -> Result<Self, StepperError>
    where
        O: OdeEvaluator<B> + 'a,
    {
        Ok(Self {
            stepper_type,
            stepper: make_polymorphic_stepper(stepper_type, compute, config, ode)?,
        })
    }

    pub fn stepper_type(&self) -> StepperType {
        self.stepper_type
    }

    pub fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<B>,
        state_out: &mut BufferOf<B>,
    ) -> Result<Real, StepperError> {
        self.stepper
            .step(time, step_size, state_in, state_out)
    }

    pub fn compute(&self) -> &'a B {
        self.stepper
            .compute()
    }

    pub fn uses_kernel_file(&self) -> bool {
        self.stepper
            .uses_kernel_file()
    }

    pub fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError> {
        self.stepper
            .kernel_file_name()
    }

    pub fn kernel_stats(&self) -> Result<&KernelStats, StepperError> {
        self.stepper
            .kernel_stats()
    }

    /// Evaluator options for `stepper_type`, see [`crate::Stepper::ode_compile_options`].
    pub fn ode_compile_options<O>(stepper_type: StepperType, out: &mut dyn fmt::Write) -> fmt::Result
    where
        O: OdeEvaluator<B>,
    {
        write_ode_compile_options::<B, O>(stepper_type, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ode::LinearOde,
        rk::RK_KERNEL,
        stepper::Stepper,
        stepper_type::{StepperTypeVisitor, visit_stepper_type},
        test_utils::{read_state, state_buffer},
    };
    use approx::assert_abs_diff_eq;
    use compute_manager::{HostCompute, NdRange, host::LINEAR_COMBINATION_KERNEL};
    use nalgebra::DMatrix;
    use std::path::PathBuf;

    fn system() -> DMatrix<Real> {
        DMatrix::from_row_slice(3, 3, &[-0.5, 1.0, 0.0, -1.0, -0.5, 0.2, 0.0, 0.3, -0.1])
    }

    /// Steps the concrete stepper and a meta stepper of the same type side by side.
    struct CompareWithMeta<'a> {
        stepper_type: StepperType,
        compute: &'a HostCompute,
        ode: &'a LinearOde,
    }

    impl<'a> StepperTypeVisitor<'a, HostCompute, LinearOde> for CompareWithMeta<'a> {
        type Output = ();

        fn visit<S>(self)
        where
            S: Stepper<'a, Compute = HostCompute, Ode = LinearOde> + 'a,
        {
            let CompareWithMeta {
                stepper_type,
                compute,
                ode,
            } = self;
            let mut options = String::new();
            S::ode_compile_options(&mut options).unwrap();
            assert_eq!(options.is_empty(), !ode.accumulates());

            let config = StepperConfig::embedded("", "", NdRange::new(3));
            let mut direct = S::new(compute, &config, ode).unwrap();
            let mut meta = MetaStepper::new(stepper_type, compute, &config, ode).unwrap();

            let mut direct_state = [
                state_buffer(compute, &[1.0, -2.0, 0.5]),
                state_buffer(compute, &[0.0; 3]),
            ];
            let mut meta_state = [
                state_buffer(compute, &[1.0, -2.0, 0.5]),
                state_buffer(compute, &[0.0; 3]),
            ];

            for n in 0..5 {
                let time = n as Real * 0.1;
                let [a, b] = &mut direct_state;
                let (input, output) = if n % 2 == 0 { (&*a, b) } else { (&*b, a) };
                let direct_h = direct
                    .step(time, 0.1, input, output)
                    .unwrap();

                let [a, b] = &mut meta_state;
                let (input, output) = if n % 2 == 0 { (&*a, b) } else { (&*b, a) };
                let meta_h = meta
                    .step(time, 0.1, input, output)
                    .unwrap();

                assert_eq!(direct_h, meta_h, "{}", stepper_type);
            }

            for (d, m) in direct_state
                .iter()
                .zip(&meta_state)
            {
                assert_eq!(
                    read_state(compute, d),
                    read_state(compute, m),
                    "{}",
                    stepper_type
                );
            }
            assert_eq!(
                direct.uses_kernel_file(),
                meta.uses_kernel_file()
            );
            assert_eq!(
                direct
                    .kernel_stats()
                    .map(|stats| stats.count())
                    .ok(),
                meta.kernel_stats()
                    .map(|stats| stats.count())
                    .ok()
            );
        }
    }

    #[test]
    fn test_meta_matches_direct_for_every_type() {
        let compute = HostCompute::new();
        for stepper_type in StepperType::ALL {
            let mut options = String::new();
            MetaStepper::<HostCompute>::ode_compile_options::<LinearOde>(stepper_type, &mut options)
                .unwrap();
            let ode = LinearOde::new(system(), &options).unwrap();
            visit_stepper_type::<HostCompute, LinearOde, _>(
                stepper_type,
                CompareWithMeta {
                    stepper_type,
                    compute: &compute,
                    ode: &ode,
                },
            );
        }
    }

    #[test]
    fn test_meta_introspection() {
        let compute = HostCompute::new();
        let mut options = String::new();
        MetaStepper::<HostCompute>::ode_compile_options::<LinearOde>(StepperType::Taylor2, &mut options)
            .unwrap();
        let ode = LinearOde::scalar(1.0, &options).unwrap();
        let config = StepperConfig::embedded("", "", NdRange::new(1));

        let taylor = MetaStepper::new(StepperType::Taylor2, &compute, &config, &ode).unwrap();
        assert_eq!(taylor.stepper_type(), StepperType::Taylor2);
        assert!(std::ptr::eq(taylor.compute(), &compute));
        assert!(matches!(
            taylor.kernel_file_name(),
            Err(StepperError::NotSupported(_))
        ));

        let rk = MetaStepper::new(StepperType::RkMidpoint, &compute, &config, &ode).unwrap();
        assert_eq!(
            rk.kernel_file_name()
                .unwrap(),
            None
        );
        assert_eq!(
            rk.kernel_stats()
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_inline_and_file_kernels() {
        let compute = HostCompute::new();
        let ode = LinearOde::scalar(1.0, "").unwrap();

        let inline = StepperConfig::inline(
            RK_KERNEL.source,
            LINEAR_COMBINATION_KERNEL,
            "",
            "",
            NdRange::new(1),
        );
        let mut stepper = MetaStepper::new(StepperType::RkMidpoint, &compute, &inline, &ode).unwrap();
        assert!(!stepper.uses_kernel_file());
        assert_eq!(
            stepper
                .kernel_file_name()
                .unwrap(),
            None
        );
        let input = state_buffer(&compute, &[1.0]);
        let mut output = state_buffer(&compute, &[0.0]);
        stepper
            .step(0.0, 0.2, &input, &mut output)
            .unwrap();
        assert_abs_diff_eq!(read_state(&compute, &output)[0], 1.22, epsilon = 1e-14);
        // one stage input plus the final combination
        assert_eq!(
            stepper
                .kernel_stats()
                .unwrap()
                .count(),
            2
        );

        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/kernels/rk_stepper.cl");
        let file = StepperConfig::from_file(
            path.clone(),
            LINEAR_COMBINATION_KERNEL,
            "",
            "",
            NdRange::new(1),
        );
        let stepper = MetaStepper::new(StepperType::RkRk4, &compute, &file, &ode).unwrap();
        assert!(stepper.uses_kernel_file());
        assert_eq!(
            stepper
                .kernel_file_name()
                .unwrap(),
            Some(path.as_path())
        );

        let missing = StepperConfig::from_file(
            "does/not/exist.cl",
            LINEAR_COMBINATION_KERNEL,
            "",
            "",
            NdRange::new(1),
        );
        assert!(matches!(
            MetaStepper::new(StepperType::RkEuler, &compute, &missing, &ode),
            Err(StepperError::Compute(_))
        ));
    }

    #[test]
    fn test_raw_value_out_of_range_is_rejected() {
        let result = StepperType::try_from(99).map(|stepper_type| stepper_type.to_string());
        assert!(matches!(result, Err(StepperError::UnknownStepperType(99))));
    }
}
