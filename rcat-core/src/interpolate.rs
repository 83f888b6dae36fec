//! Gap filling for values that are only known at observed time indices.
//!
//! Within a [`Segment`](crate::time_table::Segment) of the time table, the value
//! at an unobserved index is the linear blend, in calendar-year space, of the
//! two bracketing observed values:
//!
//! $$ v_i = v_p + \frac{y_i - y_p}{y_n - y_p} (v_n - v_p) $$
//!
//! Interpolation never crosses a segment boundary. Indices trailing the last
//! observation of a segment hold the last observed value.

use crate::time_table::{FloatValue, TimeTable};
use std::collections::BTreeMap;

/// Linear interpolation between `(x0, y0)` and `(x1, y1)` evaluated at `x`.
pub fn linear(
    x0: FloatValue,
    y0: FloatValue,
    x1: FloatValue,
    y1: FloatValue,
    x: FloatValue,
) -> FloatValue {
    if x1 == x0 {
        return y1;
    }
    y0 + (x - x0) / (x1 - x0) * (y1 - y0)
}

/// Expand values known at some indices into a full series aligned with `time_table`.
///
/// Indices in a segment that precede its first known value are 0.
pub fn fill_segment_gaps(
    time_table: &TimeTable,
    known: &BTreeMap<usize, FloatValue>,
) -> Vec<FloatValue> {
    let years = time_table.years();
    let mut values = vec![0.0; time_table.len()];

    for segment in time_table.segments() {
        let points: Vec<(usize, FloatValue)> = known
            .range(segment.indices())
            .map(|(i, v)| (*i, *v))
            .collect();

        for i in segment.indices() {
            let next = points.partition_point(|(index, _)| *index < i);
            values[i] = match (next.checked_sub(1).map(|p| points[p]), points.get(next)) {
                (_, Some(&(index, value))) if index == i => value,
                (Some((prev, prev_value)), Some(&(following, following_value))) => linear(
                    years[prev] as FloatValue,
                    prev_value,
                    years[following] as FloatValue,
                    following_value,
                    years[i] as FloatValue,
                ),
                (Some((_, prev_value)), None) => prev_value,
                (None, _) => 0.0,
            };
        }
    }
    values
}
