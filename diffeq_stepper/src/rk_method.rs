use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{ParseError, StepperError};

/// Explicit Runge-Kutta methods with a tableau in [`crate::tableau`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RkMethod {
    Euler,
    Midpoint,
    Rk4,
    Fehlberg54,
    Dopri54,
    CashKarp54,
    BoSha32,
}

const RK_METHOD_NAMES: [(RkMethod, &str); 7] = [
    (RkMethod::Euler, "euler"),
    (RkMethod::Midpoint, "midpoint"),
    (RkMethod::Rk4, "rk4"),
    (RkMethod::Fehlberg54, "fehlberg54"),
    (RkMethod::Dopri54, "dopri54"),
    (RkMethod::CashKarp54, "cashkarp54"),
    (RkMethod::BoSha32, "bosha32"),
];

impl RkMethod {
    pub const ALL: [RkMethod; 7] = [
        RkMethod::Euler,
        RkMethod::Midpoint,
        RkMethod::Rk4,
        RkMethod::Fehlberg54,
        RkMethod::Dopri54,
        RkMethod::CashKarp54,
        RkMethod::BoSha32,
    ];

    pub fn name(&self) -> &'static str {
        RK_METHOD_NAMES[*self as usize].1
    }
}

impl fmt::Display for RkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RkMethod {
    type Err = ParseError;

    /// Parses the first line of `s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s
            .lines()
            .next()
            .unwrap_or_default();
        RK_METHOD_NAMES
            .iter()
            .find(|(_, name)| *name == line)
            .map(|(method, _)| *method)
            .ok_or_else(|| ParseError {
                value: line.to_string(),
                type_name: "rk_method",
            })
    }
}

impl TryFrom<u32> for RkMethod {
    type Error = StepperError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(StepperError::UnknownMethod(value))
    }
}

impl Serialize for RkMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for RkMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(de::Error::custom)
    }
}

/// Type-level tag for an [`RkMethod`], used to specialise a stepper at compile time.
pub trait RkMethodTag: 'static {
    const METHOD: RkMethod;
}

macro_rules! rk_method_tags {
    ($($tag:ident => $method:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $tag;

            impl RkMethodTag for $tag {
                const METHOD: RkMethod = RkMethod::$method;
            }
        )*
    };
}

rk_method_tags! {
    Euler => Euler,
    Midpoint => Midpoint,
    Rk4 => Rk4,
    Fehlberg54 => Fehlberg54,
    Dopri54 => Dopri54,
    CashKarp54 => CashKarp54,
    BoSha32 => BoSha32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for method in RkMethod::ALL {
            let text = method.to_string();
            assert_eq!(text.parse::<RkMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_names_are_unique() {
        for (i, (_, a)) in RK_METHOD_NAMES
            .iter()
            .enumerate()
        {
            for (_, b) in &RK_METHOD_NAMES[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_parse_first_line_only() {
        assert_eq!("dopri54\nrk4".parse::<RkMethod>().unwrap(), RkMethod::Dopri54);
    }

    #[test]
    fn test_parse_error_carries_literal() {
        let err = "not-a-real-name"
            .parse::<RkMethod>()
            .unwrap_err();
        assert_eq!(err.value, "not-a-real-name");
        assert_eq!(
            err.to_string(),
            "'not-a-real-name' is not a valid rk_method."
        );
        assert!("RK4".parse::<RkMethod>().is_err());
    }

    #[test]
    fn test_try_from_raw() {
        assert_eq!(RkMethod::try_from(2).unwrap(), RkMethod::Rk4);
        assert!(matches!(
            RkMethod::try_from(7),
            Err(StepperError::UnknownMethod(7))
        ));
    }

    #[test]
    fn test_serde_uses_names() {
        let text = ron::to_string(&RkMethod::CashKarp54).unwrap();
        assert_eq!(text, "\"cashkarp54\"");
        let method: RkMethod = ron::from_str("\"bosha32\"").unwrap();
        assert_eq!(method, RkMethod::BoSha32);
        assert!(ron::from_str::<RkMethod>("\"heun\"").is_err());
    }

    #[test]
    fn test_tags() {
        assert_eq!(Euler::METHOD, RkMethod::Euler);
        assert_eq!(BoSha32::METHOD, RkMethod::BoSha32);
    }
}
