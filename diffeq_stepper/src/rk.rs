use std::{fmt, marker::PhantomData, path::Path};

use arrayvec::ArrayVec;
use compute_manager::{
    BufferAccess, BufferOf, ComputeBackend, KernelStats, KernelWrapper, host::LINEAR_COMBINATION_KERNEL,
    kernel::EmbeddedKernel,
};

use crate::{
    StepperError,
    config::StepperConfig,
    ode::{OdeEvaluator, write_accumulate_define},
    rk_method::RkMethodTag,
    stepper::Stepper,
    tableau::{ButcherTableau, MAX_STAGES},
    types::Real,
};

/// Kernel that forms stage inputs and weighted sums of stage derivatives.
pub const RK_KERNEL: EmbeddedKernel = EmbeddedKernel {
    source: include_str!("kernels/rk_stepper.cl"),
    kernel_name: LINEAR_COMBINATION_KERNEL,
};

/// How stage derivatives are combined into the new state.
///
/// All three give the same result up to summation order; they differ in how
/// many scratch buffers a step needs and who performs the accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateMethod {
    /// Every stage derivative gets its own buffer, the new state is formed in
    /// one pass at the end.
    Separated,
    /// The evaluator adds each weighted stage into the output as soon as it is
    /// computed. Derivatives are kept only while later stages still read them.
    Integrated,
    /// Like `Integrated`, but each derivative is pushed into the inputs of the
    /// later stages right away, so a single derivative buffer suffices. For
    /// tableaux with only a subdiagonal this is one evolving stage buffer.
    /// Falls back to the `Integrated` plan when pushing would hold more
    /// buffers, as for Dormand-Prince where every stage reads `k_0`.
    Subdiagonal,
}

pub trait AccumulateTag: 'static {
    const METHOD: AccumulateMethod;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Separated;
#[derive(Debug, Clone, Copy, Default)]
pub struct Integrated;
#[derive(Debug, Clone, Copy, Default)]
pub struct Subdiagonal;

impl AccumulateTag for Separated {
    const METHOD: AccumulateMethod = AccumulateMethod::Separated;
}
impl AccumulateTag for Integrated {
    const METHOD: AccumulateMethod = AccumulateMethod::Integrated;
}
impl AccumulateTag for Subdiagonal {
    const METHOD: AccumulateMethod = AccumulateMethod::Subdiagonal;
}

#[derive(Default)]
struct SlotAllocator {
    free: Vec<usize>,
    count: usize,
}

impl SlotAllocator {
    fn acquire(&mut self) -> usize {
        self.free
            .pop()
            .unwrap_or_else(|| {
                self.count += 1;
                self.count - 1
            })
    }

    fn release(&mut self, slot: usize) {
        self.free
            .push(slot);
    }
}

/// Scratch buffer assignment for one step, fixed per tableau and strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Derivative buffer that receives stage `i`.
    pub derivative_slot: Vec<usize>,
    /// Buffer holding the input state of stage `i`, `None` reads the step input.
    pub input_slot: Vec<Option<usize>>,
    pub derivative_buffers: usize,
    pub input_buffers: usize,
    /// Derivatives are pushed into later stage inputs as soon as they are known.
    pub push: bool,
}

impl StagePlan {
    pub fn new(tableau: &ButcherTableau, method: AccumulateMethod) -> Self {
        match method {
            AccumulateMethod::Separated => Self::separated(tableau),
            AccumulateMethod::Integrated => Self::integrated(tableau),
            AccumulateMethod::Subdiagonal => Self::subdiagonal(tableau),
        }
    }

    pub fn scratch_buffers(&self) -> usize {
        self.derivative_buffers + self.input_buffers
    }

    // one shared buffer for every stage that depends on earlier stages
    fn shared_inputs(tableau: &ButcherTableau) -> (Vec<Option<usize>>, usize) {
        let input_slot: Vec<Option<usize>> = tableau
            .a
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row[..i]
                    .iter()
                    .any(|&a| a != 0.0)
                    .then_some(0)
            })
            .collect();
        let input_buffers = usize::from(
            input_slot
                .iter()
                .any(Option::is_some),
        );
        (input_slot, input_buffers)
    }

    fn separated(tableau: &ButcherTableau) -> Self {
        let n = tableau.stages();
        let (input_slot, input_buffers) = Self::shared_inputs(tableau);
        Self {
            derivative_slot: (0..n).collect(),
            input_slot,
            derivative_buffers: n,
            input_buffers,
            push: false,
        }
    }

    fn integrated(tableau: &ButcherTableau) -> Self {
        let n = tableau.stages();
        let a = tableau.a;

        // last stage whose input reads derivative j
        let last_use: Vec<usize> = (0..n)
            .map(|j| {
                (j + 1..n)
                    .rev()
                    .find(|&i| a[i][j] != 0.0)
                    .unwrap_or(j)
            })
            .collect();

        let mut slots = SlotAllocator::default();
        let mut derivative_slot = vec![0; n];
        for i in 0..n {
            // stage input i is formed before derivative i is written
            for j in 0..i {
                if last_use[j] == i {
                    slots.release(derivative_slot[j]);
                }
            }
            derivative_slot[i] = slots.acquire();
            if last_use[i] == i {
                slots.release(derivative_slot[i]);
            }
        }

        let (input_slot, input_buffers) = Self::shared_inputs(tableau);
        Self {
            derivative_slot,
            input_slot,
            derivative_buffers: slots.count,
            input_buffers,
            push: false,
        }
    }

    fn subdiagonal(tableau: &ButcherTableau) -> Self {
        let n = tableau.stages();
        let a = tableau.a;

        // first stage whose derivative feeds the input of stage i
        let first_use: Vec<Option<usize>> = (0..n)
            .map(|i| (0..i).find(|&j| a[i][j] != 0.0))
            .collect();

        let mut slots = SlotAllocator::default();
        let mut input_slot = vec![None; n];
        for j in 0..n {
            // stage j consumes its input before its derivative is pushed on
            if let Some(slot) = input_slot[j] {
                slots.release(slot);
            }
            for i in j + 1..n {
                if first_use[i] == Some(j) {
                    input_slot[i] = Some(slots.acquire());
                }
            }
        }

        let pushed = Self {
            derivative_slot: vec![0; n],
            input_slot,
            derivative_buffers: usize::from(n > 0),
            input_buffers: slots.count,
            push: true,
        };
        let integrated = Self::integrated(tableau);
        if pushed.scratch_buffers() <= integrated.scratch_buffers() {
            pushed
        } else {
            integrated
        }
    }
}

/// Explicit Runge-Kutta stepper, specialised at compile time on the method `M`
/// and the accumulation strategy `A`.
pub struct RkStepper<'a, B, O, M, A = Separated>
where
    B: ComputeBackend,
{
    kernel: KernelWrapper<'a, B>,
    ode: &'a O,
    tableau: &'static ButcherTableau,
    plan: StagePlan,
    derivatives: Vec<B::Buffer>,
    inputs: Vec<B::Buffer>,
    _method: PhantomData<(M, A)>,
}

impl<'a, B, O, M, A> RkStepper<'a, B, O, M, A>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
    M: RkMethodTag,
    A: AccumulateTag,
{
    pub fn tableau(&self) -> &'static ButcherTableau {
        self.tableau
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Stages formed from earlier derivatives, then the evaluator, once per stage.
    fn evaluate_stages(
        &mut self,
        time: Real,
        h: Real,
        state_in: &B::Buffer,
        state_out: &mut B::Buffer,
    ) -> Result<(), StepperError> {
        let tableau = self.tableau;
        for i in 0..tableau.stages() {
            if let Some(slot) = self.plan.input_slot[i] {
                let terms: ArrayVec<(Real, &B::Buffer), MAX_STAGES> = tableau.a[i][..i]
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| **a != 0.0)
                    .map(|(j, a)| (h * a, &self.derivatives[self.plan.derivative_slot[j]]))
                    .collect();
                self.kernel
                    .run_linear_combination(&mut self.inputs[slot], Some(state_in), &terms)?;
            }

            let input = match self.plan.input_slot[i] {
                Some(slot) => &self.inputs[slot],
                None => state_in,
            };
            self.ode
                .solve(
                    time + tableau.c[i] * h,
                    h,
                    input,
                    &mut self.derivatives[self.plan.derivative_slot[i]],
                    state_out,
                    h * tableau.b[i],
                    i == 0,
                )?;
        }
        Ok(())
    }

    fn step_separated(
        &mut self,
        time: Real,
        h: Real,
        state_in: &B::Buffer,
        state_out: &mut B::Buffer,
    ) -> Result<(), StepperError> {
        self.evaluate_stages(time, h, state_in, state_out)?;

        let terms: ArrayVec<(Real, &B::Buffer), MAX_STAGES> = self
            .tableau
            .b
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != 0.0)
            .map(|(i, b)| (h * b, &self.derivatives[self.plan.derivative_slot[i]]))
            .collect();
        self.kernel
            .run_linear_combination(state_out, Some(state_in), &terms)?;
        Ok(())
    }

    fn step_subdiagonal(
        &mut self,
        time: Real,
        h: Real,
        state_in: &B::Buffer,
        state_out: &mut B::Buffer,
    ) -> Result<(), StepperError> {
        let tableau = self.tableau;
        let n = tableau.stages();
        for i in 0..n {
            let input = match self.plan.input_slot[i] {
                Some(slot) => &self.inputs[slot],
                None => state_in,
            };
            let k = self.plan.derivative_slot[i];
            self.ode
                .solve(
                    time + tableau.c[i] * h,
                    h,
                    input,
                    &mut self.derivatives[k],
                    state_out,
                    h * tableau.b[i],
                    i == 0,
                )?;

            // push k_i into every later stage that reads it
            for later in i + 1..n {
                let a = tableau.a[later][i];
                if a == 0.0 {
                    continue;
                }
                if let Some(slot) = self.plan.input_slot[later] {
                    let first = tableau.a[later][..i]
                        .iter()
                        .all(|&a| a == 0.0);
                    self.kernel
                        .run_linear_combination(
                            &mut self.inputs[slot],
                            first.then_some(state_in),
                            &[(h * a, &self.derivatives[k])],
                        )?;
                }
            }
        }
        Ok(())
    }
}

impl<'a, B, O, M, A> Stepper<'a> for RkStepper<'a, B, O, M, A>
where
    B: ComputeBackend + 'a,
    O: OdeEvaluator<B> + 'a,
    M: RkMethodTag,
    A: AccumulateTag,
{
    type Compute = B;
    type Ode = O;

    fn new(compute: &'a B, config: &StepperConfig, ode: &'a O) -> Result<Self, StepperError> {
        let tableau = ButcherTableau::get(M::METHOD);
        let plan = StagePlan::new(tableau, A::METHOD);
        let kernel = KernelWrapper::new(
            compute,
            &config.kernel,
            &RK_KERNEL,
            &config.source_header,
            &config.compile_options,
            config.range,
        )?;

        let size = ode.buffer_size_byte();
        let derivatives = (0..plan.derivative_buffers)
            .map(|_| compute.create_buffer(BufferAccess::ReadWrite, size))
            .collect::<Result<Vec<_>, _>>()?;
        let inputs = (0..plan.input_buffers)
            .map(|_| compute.create_buffer(BufferAccess::ReadWrite, size))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kernel,
            ode,
            tableau,
            plan,
            derivatives,
            inputs,
            _method: PhantomData,
        })
    }

    /// Always returns `step_size`, there is no error control.
    fn step(
        &mut self,
        time: Real,
        step_size: Real,
        state_in: &BufferOf<B>,
        state_out: &mut BufferOf<B>,
    ) -> Result<Real, StepperError> {
        match A::METHOD {
            AccumulateMethod::Separated => {
                self.step_separated(time, step_size, state_in, state_out)?
            }
            AccumulateMethod::Subdiagonal if self.plan.push => {
                self.step_subdiagonal(time, step_size, state_in, state_out)?
            }
            AccumulateMethod::Integrated | AccumulateMethod::Subdiagonal => {
                self.evaluate_stages(time, step_size, state_in, state_out)?
            }
        }
        Ok(step_size)
    }

    fn compute(&self) -> &'a B {
        self.kernel
            .compute()
    }

    fn uses_kernel_file(&self) -> bool {
        self.kernel
            .uses_kernel_file()
    }

    fn kernel_file_name(&self) -> Result<Option<&Path>, StepperError> {
        Ok(self
            .kernel
            .kernel_file_name())
    }

    fn kernel_stats(&self) -> Result<&KernelStats, StepperError> {
        Ok(self
            .kernel
            .kernel_stats())
    }

    fn ode_compile_options(out: &mut dyn fmt::Write) -> fmt::Result {
        match A::METHOD {
            AccumulateMethod::Separated => Ok(()),
            AccumulateMethod::Integrated | AccumulateMethod::Subdiagonal => {
                write_accumulate_define(out)
            }
        }
    }
}
