//! Monte-Carlo accumulation of realization results.

use crate::carbon_unit::UseClass;
use crate::compartment::CompartmentInfo;
use crate::errors::{RCATError, RCATResult};
use crate::time_table::{FloatValue, Year};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running mean and variance per time index (Welford's algorithm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloEstimate {
    count: usize,
    mean: Array1<FloatValue>,
    m2: Array1<FloatValue>,
}

impl MonteCarloEstimate {
    pub fn new(length: usize) -> Self {
        Self {
            count: 0,
            mean: Array1::zeros(length),
            m2: Array1::zeros(length),
        }
    }

    /// An estimate that has already seen `count` all-zero samples
    pub fn with_zero_samples(length: usize, count: usize) -> Self {
        Self {
            count,
            ..Self::new(length)
        }
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, sample: ArrayView1<FloatValue>) -> RCATResult<()> {
        if sample.len() != self.len() {
            return Err(RCATError::State(format!(
                "sample of length {} added to an estimate of length {}",
                sample.len(),
                self.len()
            )));
        }
        self.count += 1;
        let n = self.count as FloatValue;
        for ((mean, m2), &x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(sample.iter()) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
        Ok(())
    }

    pub fn mean(&self) -> ArrayView1<'_, FloatValue> {
        self.mean.view()
    }

    /// Sample variance, 0 with fewer than two samples
    pub fn variance(&self) -> Array1<FloatValue> {
        if self.count < 2 {
            return Array1::zeros(self.len());
        }
        &self.m2 / (self.count - 1) as FloatValue
    }
}

/// The outcome of one realization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub compartments: BTreeMap<CompartmentInfo, Vec<FloatValue>>,
    /// Retained carbon of end-use products per use class and species
    pub products: BTreeMap<(UseClass, String), Vec<FloatValue>>,
}

/// Mean and variance over every completed realization.
///
/// Results are added atomically: a result that does not fit the summary is
/// rejected without modifying it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    years: Vec<Year>,
    realizations: usize,
    compartments: BTreeMap<CompartmentInfo, MonteCarloEstimate>,
    products: BTreeMap<(UseClass, String), MonteCarloEstimate>,
}

impl SimulationSummary {
    pub fn new(years: Vec<Year>) -> Self {
        Self {
            years,
            realizations: 0,
            compartments: BTreeMap::new(),
            products: BTreeMap::new(),
        }
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    pub fn realizations(&self) -> usize {
        self.realizations
    }

    pub fn add(&mut self, result: &SimulationResult) -> RCATResult<()> {
        let length = self.years.len();
        if let Some(series) = result
            .compartments
            .values()
            .chain(result.products.values())
            .find(|series| series.len() != length)
        {
            return Err(RCATError::State(format!(
                "result of length {} does not match a time table of {} indices",
                series.len(),
                length
            )));
        }
        if self.realizations > 0 {
            if let Some(info) = self
                .compartments
                .keys()
                .find(|info| !result.compartments.contains_key(info))
            {
                return Err(RCATError::State(format!(
                    "result is missing compartment {}",
                    info
                )));
            }
        }

        for (info, series) in &result.compartments {
            self.compartments
                .entry(*info)
                .or_insert_with(|| MonteCarloEstimate::with_zero_samples(length, self.realizations))
                .add(ArrayView1::from(series.as_slice()))?;
        }

        let zeros = Array1::zeros(length);
        for (key, estimate) in self.products.iter_mut() {
            if !result.products.contains_key(key) {
                estimate.add(zeros.view())?;
            }
        }
        for (key, series) in &result.products {
            self.products
                .entry(key.clone())
                .or_insert_with(|| MonteCarloEstimate::with_zero_samples(length, self.realizations))
                .add(ArrayView1::from(series.as_slice()))?;
        }

        self.realizations += 1;
        Ok(())
    }

    pub fn compartments(&self) -> impl Iterator<Item = CompartmentInfo> + '_ {
        self.compartments.keys().copied()
    }

    pub fn products(&self) -> impl Iterator<Item = &(UseClass, String)> {
        self.products.keys()
    }

    pub fn estimate(&self, info: CompartmentInfo) -> RCATResult<&MonteCarloEstimate> {
        self.compartments
            .get(&info)
            .ok_or_else(|| RCATError::State(format!("no result for compartment {}", info)))
    }

    pub fn product_estimate(
        &self,
        use_class: UseClass,
        species: &str,
    ) -> RCATResult<&MonteCarloEstimate> {
        self.products
            .get(&(use_class, species.to_string()))
            .ok_or_else(|| {
                RCATError::State(format!(
                    "no product result for use class {} and species {}",
                    use_class, species
                ))
            })
    }

    fn value_at(series: ArrayView1<FloatValue>, index: usize) -> RCATResult<FloatValue> {
        series
            .get(index)
            .copied()
            .ok_or_else(|| RCATError::State(format!("time index {} is out of range", index)))
    }

    pub fn mean(&self, info: CompartmentInfo, index: usize) -> RCATResult<FloatValue> {
        Self::value_at(self.estimate(info)?.mean(), index)
    }

    pub fn variance(&self, info: CompartmentInfo, index: usize) -> RCATResult<FloatValue> {
        Self::value_at(self.estimate(info)?.variance().view(), index)
    }

    pub fn product_mean(
        &self,
        use_class: UseClass,
        species: &str,
        index: usize,
    ) -> RCATResult<FloatValue> {
        Self::value_at(self.product_estimate(use_class, species)?.mean(), index)
    }

    pub fn product_variance(
        &self,
        use_class: UseClass,
        species: &str,
        index: usize,
    ) -> RCATResult<FloatValue> {
        Self::value_at(
            self.product_estimate(use_class, species)?.variance().view(),
            index,
        )
    }
}
