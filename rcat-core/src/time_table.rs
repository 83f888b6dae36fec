//! Discrete time axis shared by every carbon unit and compartment of a simulation.
//!
//! The table is assembled from the ordered stand observations of a trajectory.
//! Every observation gets its own index, so that the state before and after an
//! intervention occurring in the same year are kept apart. Calendar years that
//! fall between two consecutive observations of the same trajectory can be
//! given their own, unobserved, index; values at those indices are obtained by
//! [interpolation](crate::interpolate).

use crate::errors::{RCATError, RCATResult};
use crate::stand::StandObservation;
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Year = i32;

/// A maximal run of time indices belonging to the same stand trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First index of the segment
    pub start: usize,
    /// Last index of the segment (inclusive)
    pub end: usize,
    pub trajectory: usize,
}

impl Segment {
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTable {
    years: Vec<Year>,
    observed: Vec<bool>,
    /// Time index of each stand observation, in input order
    stand_indices: Vec<usize>,
    segments: Vec<Segment>,
}

impl TimeTable {
    /// Build the table from a stand trajectory.
    ///
    /// If `fill_intermediate_years` is true, every calendar year strictly between
    /// two consecutive observations of a segment gets an unobserved index.
    pub fn from_stands(
        stands: &[StandObservation],
        fill_intermediate_years: bool,
    ) -> RCATResult<Self> {
        Self::from_observations(
            stands.iter().map(|s| (s.year, s.trajectory)),
            fill_intermediate_years,
        )
    }

    /// Build the table from `(year, trajectory)` pairs.
    ///
    /// Years must be non-decreasing over the whole sequence.
    pub fn from_observations<I>(observations: I, fill_intermediate_years: bool) -> RCATResult<Self>
    where
        I: IntoIterator<Item = (Year, usize)>,
    {
        let mut table = Self {
            years: vec![],
            observed: vec![],
            stand_indices: vec![],
            segments: vec![],
        };
        let mut previous: Option<(Year, usize)> = None;

        for (year, trajectory) in observations {
            match previous {
                Some((previous_year, _)) if year < previous_year => {
                    return Err(RCATError::TimeTable(format!(
                        "calendar years must be non-decreasing, got {} after {}",
                        year, previous_year
                    )));
                }
                Some((previous_year, previous_trajectory)) if previous_trajectory == trajectory => {
                    if fill_intermediate_years {
                        for y in (previous_year + 1)..year {
                            table.push(y, false);
                        }
                    }
                }
                _ => {
                    table.segments.push(Segment {
                        start: table.years.len(),
                        end: table.years.len(),
                        trajectory,
                    });
                }
            }
            let index = table.push(year, true);
            table.stand_indices.push(index);
            previous = Some((year, trajectory));
        }

        if table.years.is_empty() {
            return Err(RCATError::TimeTable(
                "cannot build a time table without stand observations".to_string(),
            ));
        }
        Ok(table)
    }

    fn push(&mut self, year: Year, observed: bool) -> usize {
        self.years.push(year);
        self.observed.push(observed);
        let index = self.years.len() - 1;
        if let Some(segment) = self.segments.last_mut() {
            segment.end = index;
        }
        index
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.years.len() - 1
    }

    /// Calendar year at a given index
    pub fn year_at(&self, index: usize) -> Option<Year> {
        self.years.get(index).copied()
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    pub fn initial_year(&self) -> Year {
        self.years[0]
    }

    pub fn final_year(&self) -> Year {
        self.years[self.last_index()]
    }

    /// Time index of the stand observation at `position` in the input trajectory
    pub fn index_of_stand(&self, position: usize) -> Option<usize> {
        self.stand_indices.get(position).copied()
    }

    pub fn stand_count(&self) -> usize {
        self.stand_indices.len()
    }

    /// True if the index corresponds to a stand observation
    pub fn is_observed(&self, index: usize) -> bool {
        self.observed.get(index).copied().unwrap_or(false)
    }

    pub fn observed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.stand_indices.iter().copied()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_of(&self, index: usize) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(index))
    }

    /// Elapsed years between two indices
    pub fn elapsed(&self, from: usize, to: usize) -> FloatValue {
        (self.years[to] - self.years[from]) as FloatValue
    }
}
