use crate::{rk_method::RkMethod, types::Real};

/// Most stages of any registered tableau.
pub const MAX_STAGES: usize = 7;

/// Coefficients of an explicit Runge-Kutta method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButcherTableau {
    /// N x N, strictly lower triangular.
    pub a: &'static [&'static [Real]],
    pub b: &'static [Real],
    /// Weights of the embedded lower order solution, for error estimates.
    pub b_cmp: Option<&'static [Real]>,
    pub c: &'static [Real],
    /// Last stage of a step equals the first stage of the next.
    pub fsal: bool,
}

impl ButcherTableau {
    // 1st order
    pub const EULER: Self = Self {
        a: &[&[0.0]],
        b: &[1.0],
        b_cmp: None,
        c: &[0.0],
        fsal: false,
    };

    // 2nd order
    pub const MIDPOINT: Self = Self {
        a: &[&[0.0, 0.0], &[0.5, 0.0]],
        b: &[0.0, 1.0],
        b_cmp: None,
        c: &[0.0, 0.5],
        fsal: false,
    };

    // classical 4th order
    pub const RK4: Self = Self {
        a: &[
            &[0., 0., 0., 0.],
            &[1. / 2., 0., 0., 0.],
            &[0., 1. / 2., 0., 0.],
            &[0., 0., 1., 0.],
        ],
        b: &[1. / 6., 1. / 3., 1. / 3., 1. / 6.],
        b_cmp: None,
        c: &[0., 1. / 2., 1. / 2., 1.],
        fsal: false,
    };

    // Runge-Kutta-Fehlberg 5(4), weights of the 5th order solution first
    pub const FEHLBERG54: Self = Self {
        a: &[
            &[0., 0., 0., 0., 0., 0.],
            &[1. / 4., 0., 0., 0., 0., 0.],
            &[3. / 32., 9. / 32., 0., 0., 0., 0.],
            &[1932. / 2197., -7200. / 2197., 7296. / 2197., 0., 0., 0.],
            &[439. / 216., -8., 3680. / 513., -845. / 4104., 0., 0.],
            &[-8. / 27., 2., -3544. / 2565., 1859. / 4104., -11. / 40., 0.],
        ],
        b: &[
            16. / 135.,
            0.,
            6656. / 12825.,
            28561. / 56430.,
            -9. / 50.,
            2. / 55.,
        ],
        b_cmp: Some(&[
            25. / 216.,
            0.,
            1408. / 2565.,
            2197. / 4104.,
            -1. / 5.,
            0.,
        ]),
        c: &[0., 1. / 4., 3. / 8., 12. / 13., 1., 1. / 2.],
        fsal: false,
    };

    // Dormand-Prince 5(4)
    pub const DOPRI54: Self = Self {
        a: &[
            &[0., 0., 0., 0., 0., 0., 0.],
            &[1. / 5., 0., 0., 0., 0., 0., 0.],
            &[3. / 40., 9. / 40., 0., 0., 0., 0., 0.],
            &[44. / 45., -56. / 15., 32. / 9., 0., 0., 0., 0.],
            &[
                19372. / 6561.,
                -25360. / 2187.,
                64448. / 6561.,
                -212. / 729.,
                0.,
                0.,
                0.,
            ],
            &[
                9017. / 3168.,
                -355. / 33.,
                46732. / 5247.,
                49. / 176.,
                -5103. / 18656.,
                0.,
                0.,
            ],
            &[
                35. / 384.,
                0.,
                500. / 1113.,
                125. / 192.,
                -2187. / 6784.,
                11. / 84.,
                0.,
            ],
        ],
        b: &[
            35. / 384.,
            0.,
            500. / 1113.,
            125. / 192.,
            -2187. / 6784.,
            11. / 84.,
            0.,
        ],
        b_cmp: Some(&[
            5179. / 57600.,
            0.,
            7571. / 16695.,
            393. / 640.,
            -92097. / 339200.,
            187. / 2100.,
            1. / 40.,
        ]),
        c: &[0., 1. / 5., 3. / 10., 4. / 5., 8. / 9., 1., 1.],
        fsal: true,
    };

    // Cash-Karp 5(4)
    pub const CASHKARP54: Self = Self {
        a: &[
            &[0., 0., 0., 0., 0., 0.],
            &[1. / 5., 0., 0., 0., 0., 0.],
            &[3. / 40., 9. / 40., 0., 0., 0., 0.],
            &[3. / 10., -9. / 10., 6. / 5., 0., 0., 0.],
            &[-11. / 54., 5. / 2., -70. / 27., 35. / 27., 0., 0.],
            &[
                1631. / 55296.,
                175. / 512.,
                575. / 13824.,
                44275. / 110592.,
                253. / 4096.,
                0.,
            ],
        ],
        b: &[37. / 378., 0., 250. / 621., 125. / 594., 0., 512. / 1771.],
        b_cmp: Some(&[
            2825. / 27648.,
            0.,
            18575. / 48384.,
            13525. / 55296.,
            277. / 14336.,
            1. / 4.,
        ]),
        c: &[0., 1. / 5., 3. / 10., 3. / 5., 1., 7. / 8.],
        fsal: false,
    };

    // Bogacki-Shampine 3(2)
    pub const BOSHA32: Self = Self {
        a: &[
            &[0., 0., 0., 0.],
            &[1. / 2., 0., 0., 0.],
            &[0., 3. / 4., 0., 0.],
            &[2. / 9., 1. / 3., 4. / 9., 0.],
        ],
        b: &[2. / 9., 1. / 3., 4. / 9., 0.],
        b_cmp: Some(&[7. / 24., 1. / 4., 1. / 3., 1. / 8.]),
        c: &[0., 1. / 2., 3. / 4., 1.],
        fsal: true,
    };

    /// Tableau of `method`.
    pub fn get(method: RkMethod) -> &'static Self {
        match method {
            RkMethod::Euler => &Self::EULER,
            RkMethod::Midpoint => &Self::MIDPOINT,
            RkMethod::Rk4 => &Self::RK4,
            RkMethod::Fehlberg54 => &Self::FEHLBERG54,
            RkMethod::Dopri54 => &Self::DOPRI54,
            RkMethod::CashKarp54 => &Self::CASHKARP54,
            RkMethod::BoSha32 => &Self::BOSHA32,
        }
    }

    pub fn stages(&self) -> usize {
        self.b
            .len()
    }

    pub fn is_embedded(&self) -> bool {
        self.b_cmp
            .is_some()
    }

    /// Dimensions agree and every entry on or above the diagonal of `a` is zero.
    pub fn is_explicit(&self) -> bool {
        let n = self.stages();
        self.c.len() == n
            && self.a.len() == n
            && self
                .b_cmp
                .is_none_or(|b_cmp| b_cmp.len() == n)
            && self
                .a
                .iter()
                .enumerate()
                .all(|(i, row)| {
                    row.len() == n
                        && row[i..]
                            .iter()
                            .all(|&a| a == 0.0)
                })
    }
}
