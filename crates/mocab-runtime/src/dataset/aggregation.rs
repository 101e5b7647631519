//! Aggregation selector
//!
//! Reduces a filtered data set to what a downstream variable observes, per
//! the feature's search strategy.

use super::{DataPoint, DataSet};
use chrono::NaiveDateTime;
use mocab_core::ast::SearchStrategy;
use mocab_core::Value;

/// Result of reducing a data set
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    /// Nothing survived extraction and filtering
    #[default]
    Empty,
    /// One (date, value) pair
    Single(DataPoint),
    /// The full series, for the `all` strategy
    Series(Vec<DataPoint>),
}

impl Selection {
    /// Scalar view: the selected point, or the latest point of a series
    pub fn point(&self) -> Option<&DataPoint> {
        match self {
            Selection::Empty => None,
            Selection::Single(point) => Some(point),
            Selection::Series(points) => latest(points),
        }
    }

    pub fn value(&self) -> Value {
        self.point().map(|p| p.value.clone()).unwrap_or(Value::Null)
    }

    pub fn date(&self) -> Option<NaiveDateTime> {
        self.point().and_then(|p| p.date)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }
}

/// Aggregation selector
pub struct Aggregator;

impl Aggregator {
    pub fn select(data: &DataSet, strategy: SearchStrategy) -> Selection {
        if data.is_empty() {
            return Selection::Empty;
        }

        let selected = match strategy {
            SearchStrategy::Latest => latest(&data.points).cloned(),
            SearchStrategy::Earliest => earliest(&data.points).cloned(),
            SearchStrategy::Max => extreme(&data.points, |candidate, best| candidate > best),
            SearchStrategy::Min => extreme(&data.points, |candidate, best| candidate < best),
            SearchStrategy::Mean => mean(&data.points),
            SearchStrategy::All => return Selection::Series(data.points.clone()),
        };

        selected.map(Selection::Single).unwrap_or_default()
    }
}

/// Greatest date; ties go to the later position and undated points rank oldest
fn latest(points: &[DataPoint]) -> Option<&DataPoint> {
    let mut best: Option<&DataPoint> = None;
    for point in points {
        match best {
            Some(current) if point.date < current.date => {}
            _ => best = Some(point),
        }
    }
    best
}

/// Smallest date among dated points, else the first point
fn earliest(points: &[DataPoint]) -> Option<&DataPoint> {
    let mut best: Option<&DataPoint> = None;
    for point in points.iter().filter(|p| p.date.is_some()) {
        match best {
            Some(current) if point.date >= current.date => {}
            _ => best = Some(point),
        }
    }
    best.or_else(|| points.first())
}

fn extreme(points: &[DataPoint], better: impl Fn(f64, f64) -> bool) -> Option<DataPoint> {
    let mut best: Option<(f64, &DataPoint)> = None;
    for point in points {
        let Some(n) = point.value.as_f64() else {
            continue;
        };
        match best {
            Some((current, _)) if !better(n, current) => {}
            _ => best = Some((n, point)),
        }
    }
    best.map(|(_, point)| point.clone())
}

fn mean(points: &[DataPoint]) -> Option<DataPoint> {
    let numeric: Vec<(f64, Option<NaiveDateTime>)> = points
        .iter()
        .filter_map(|p| p.value.as_f64().map(|n| (n, p.date)))
        .collect();
    if numeric.is_empty() {
        return None;
    }

    let sum: f64 = numeric.iter().map(|(n, _)| n).sum();
    let date = numeric.iter().filter_map(|(_, d)| *d).max();
    Some(DataPoint::new(date, Value::Number(sum / numeric.len() as f64)))
}
