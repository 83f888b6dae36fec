//! Lifetime kernels describing how carbon is released from a pool.
//!
//! Two families are supported:
//!
//! - Exponential: $ R(t) = e^{-t / \tau} $ with half-life $ h = \tau \ln 2 $
//! - Weibull with a fixed shape $ \beta = 5 $: $ R(t) = e^{-(t / \lambda)^\beta} $
//!   with scale $ \lambda = \tau / \Gamma(1 + 1/\beta) $ and half-life
//!   $ h = \lambda (\ln 2)^{1/\beta} $
//!
//! where $ \tau $ is the mean lifetime, i.e. $ \int_0^\infty R(t) dt $.
//! The canonical representation is the mean lifetime; half-lives are converted
//! on the way in and out.

use crate::errors::{RCATError, RCATResult};
use crate::time_table::FloatValue;
use crate::utils::special::gamma;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

/// Shape parameter of the Weibull kernel
pub const WEIBULL_SHAPE: FloatValue = 5.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecayFamily {
    #[default]
    Exponential,
    Weibull,
}

/// How a lifetime value is expressed in a configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifetimeMode {
    HalfLife,
    /// Mean lifetime
    Average,
}

/// Serialisable description of a lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifetimeDescriptor {
    pub mode: LifetimeMode,
    /// unit: yr
    pub value: FloatValue,
    #[serde(default)]
    pub family: DecayFamily,
}

/// Decay kernel parameterised by its mean lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LifetimeDescriptor", into = "LifetimeDescriptor")]
pub struct DecayFunction {
    family: DecayFamily,
    mean_lifetime: FloatValue,
}

fn check_lifetime(value: FloatValue) -> RCATResult<FloatValue> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RCATError::InvalidLifetime { value })
    }
}

impl DecayFamily {
    /// Ratio of the half-life to the mean lifetime
    fn half_life_ratio(&self) -> FloatValue {
        match self {
            DecayFamily::Exponential => LN_2,
            DecayFamily::Weibull => {
                LN_2.powf(1.0 / WEIBULL_SHAPE) / gamma(1.0 + 1.0 / WEIBULL_SHAPE)
            }
        }
    }
}

impl DecayFunction {
    pub fn from_mean_lifetime(family: DecayFamily, mean_lifetime: FloatValue) -> RCATResult<Self> {
        Ok(Self {
            family,
            mean_lifetime: check_lifetime(mean_lifetime)?,
        })
    }

    pub fn from_half_life(family: DecayFamily, half_life: FloatValue) -> RCATResult<Self> {
        let half_life = check_lifetime(half_life)?;
        Ok(Self {
            family,
            mean_lifetime: half_life / family.half_life_ratio(),
        })
    }

    pub fn from_descriptor(descriptor: LifetimeDescriptor) -> RCATResult<Self> {
        match descriptor.mode {
            LifetimeMode::HalfLife => Self::from_half_life(descriptor.family, descriptor.value),
            LifetimeMode::Average => Self::from_mean_lifetime(descriptor.family, descriptor.value),
        }
    }

    /// A kernel that releases everything at the first step after creation
    pub fn immediate(family: DecayFamily) -> Self {
        Self {
            family,
            mean_lifetime: 0.0,
        }
    }

    pub fn family(&self) -> DecayFamily {
        self.family
    }

    pub fn mean_lifetime(&self) -> FloatValue {
        self.mean_lifetime
    }

    pub fn half_life(&self) -> FloatValue {
        self.mean_lifetime * self.family.half_life_ratio()
    }

    pub fn set_mean_lifetime(&mut self, mean_lifetime: FloatValue) -> RCATResult<()> {
        self.mean_lifetime = check_lifetime(mean_lifetime)?;
        Ok(())
    }

    pub fn set_half_life(&mut self, half_life: FloatValue) -> RCATResult<()> {
        self.mean_lifetime = check_lifetime(half_life)? / self.family.half_life_ratio();
        Ok(())
    }

    /// Switch family while keeping the mean lifetime
    pub fn with_family(self, family: DecayFamily) -> Self {
        Self { family, ..self }
    }

    /// Multiply the mean lifetime by a (non-negative) factor
    pub fn scaled(self, factor: FloatValue) -> RCATResult<Self> {
        Self::from_mean_lifetime(self.family, self.mean_lifetime * factor)
    }

    /// Weibull scale parameter $ \lambda $
    pub fn weibull_scale(&self) -> FloatValue {
        self.mean_lifetime / gamma(1.0 + 1.0 / WEIBULL_SHAPE)
    }

    /// Integral of the remaining fraction from 0 to infinity
    pub fn infinite_integral(&self) -> FloatValue {
        self.mean_lifetime
    }

    /// Fraction of the initial amount still present after `elapsed` years.
    pub fn remaining_fraction(&self, elapsed: FloatValue) -> FloatValue {
        if elapsed <= 0.0 {
            return 1.0;
        }
        if self.mean_lifetime == 0.0 {
            return 0.0;
        }
        match self.family {
            DecayFamily::Exponential => (-elapsed / self.mean_lifetime).exp(),
            DecayFamily::Weibull => (-(elapsed / self.weibull_scale()).powf(WEIBULL_SHAPE)).exp(),
        }
    }

    /// Ratio of the remaining fractions at two ages.
    ///
    /// This is the factor applied to the carbon present at `previous_age` to
    /// obtain the carbon present at `age`.
    pub fn decay_ratio(&self, previous_age: FloatValue, age: FloatValue) -> FloatValue {
        if self.infinite_integral() == 0.0 {
            return 0.0;
        }
        let previous = self.remaining_fraction(previous_age);
        if previous == 0.0 {
            return 0.0;
        }
        self.remaining_fraction(age) / previous
    }

    pub fn descriptor(&self, mode: LifetimeMode) -> LifetimeDescriptor {
        let value = match mode {
            LifetimeMode::HalfLife => self.half_life(),
            LifetimeMode::Average => self.mean_lifetime,
        };
        LifetimeDescriptor {
            mode,
            value,
            family: self.family,
        }
    }
}

impl TryFrom<LifetimeDescriptor> for DecayFunction {
    type Error = RCATError;

    fn try_from(value: LifetimeDescriptor) -> Result<Self, Self::Error> {
        Self::from_descriptor(value)
    }
}

impl From<DecayFunction> for LifetimeDescriptor {
    fn from(value: DecayFunction) -> Self {
        value.descriptor(LifetimeMode::Average)
    }
}
