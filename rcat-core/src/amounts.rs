//! Element-wise amounts carried by carbon units.

use crate::time_table::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::AddAssign;

/// Quantities tracked alongside carbon.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    /// unit: m^3
    Volume,
    /// Dry biomass
    /// unit: Mg
    Biomass,
    /// unit: Mg C
    Carbon,
    /// unit: Mg
    Nitrogen,
    /// unit: Mg
    Sulfur,
    /// unit: Mg
    Phosphorus,
    /// unit: Mg
    Potassium,
    /// Process emissions accumulated along the processing chain
    /// unit: Mg CO2 eq
    EmissionsCO2Eq,
}

impl Element {
    pub const ALL: [Element; 8] = [
        Element::Volume,
        Element::Biomass,
        Element::Carbon,
        Element::Nitrogen,
        Element::Sulfur,
        Element::Phosphorus,
        Element::Potassium,
        Element::EmissionsCO2Eq,
    ];
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Mapping from [`Element`] to a quantity.
///
/// Absent elements behave as zero. Merging two maps sums them element-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmountMap(BTreeMap<Element, FloatValue>);

impl AmountMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: Element) -> FloatValue {
        self.0.get(&element).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, element: Element, value: FloatValue) {
        self.0.insert(element, value);
    }

    /// Builder-style variant of [`AmountMap::set`]
    pub fn with(mut self, element: Element, value: FloatValue) -> Self {
        self.set(element, value);
        self
    }

    pub fn add(&mut self, element: Element, value: FloatValue) {
        *self.0.entry(element).or_insert(0.0) += value;
    }

    pub fn carbon(&self) -> FloatValue {
        self.get(Element::Carbon)
    }

    pub fn biomass(&self) -> FloatValue {
        self.get(Element::Biomass)
    }

    /// A copy with every element multiplied by `factor`
    pub fn scaled(&self, factor: FloatValue) -> Self {
        Self(self.0.iter().map(|(k, v)| (*k, v * factor)).collect())
    }

    /// A copy with every element multiplied by `percentage / 100`
    pub fn proportion(&self, percentage: FloatValue) -> Self {
        Self(
            self.0
                .iter()
                .map(|(k, v)| (*k, v * percentage / 100.0))
                .collect(),
        )
    }

    pub fn merge(&mut self, other: &AmountMap) {
        for (element, value) in other.iter() {
            self.add(element, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Element, FloatValue)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Element, FloatValue)> for AmountMap {
    fn from_iter<T: IntoIterator<Item = (Element, FloatValue)>>(iter: T) -> Self {
        let mut map = AmountMap::new();
        for (element, value) in iter {
            map.add(element, value);
        }
        map
    }
}

impl AddAssign<&AmountMap> for AmountMap {
    fn add_assign(&mut self, rhs: &AmountMap) {
        self.merge(rhs);
    }
}

impl<'a> Sum<&'a AmountMap> for AmountMap {
    fn sum<I: Iterator<Item = &'a AmountMap>>(iter: I) -> Self {
        iter.fold(AmountMap::new(), |mut acc, m| {
            acc += m;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_elements_are_zero() {
        let map = AmountMap::new().with(Element::Carbon, 2.0);
        assert_eq!(map.get(Element::Nitrogen), 0.0);
        assert_eq!(map.carbon(), 2.0);
    }

    #[test]
    fn merge_sums_per_element() {
        let a = AmountMap::new()
            .with(Element::Carbon, 2.0)
            .with(Element::Volume, 1.0);
        let b = AmountMap::new()
            .with(Element::Carbon, 3.0)
            .with(Element::Nitrogen, 0.5);

        let mut total = a.clone();
        total += &b;
        assert_eq!(total.carbon(), 5.0);
        assert_eq!(total.get(Element::Volume), 1.0);
        assert_eq!(total.get(Element::Nitrogen), 0.5);
    }

    #[test]
    fn proportion_scales_every_element() {
        let map = AmountMap::new()
            .with(Element::Biomass, 100.0)
            .with(Element::EmissionsCO2Eq, 10.0);
        let part = map.proportion(30.0);
        assert_eq!(part.biomass(), 30.0);
        assert_eq!(part.get(Element::EmissionsCO2Eq), 3.0);
    }

    #[test]
    fn serialises_as_plain_map() {
        let map = AmountMap::new().with(Element::Carbon, 1.5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Carbon":1.5}"#);
        let parsed: AmountMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, map);
    }
}
