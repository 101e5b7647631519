//! Data set extraction
//!
//! Turns the raw observations attached to a feature into a [`DataSet`],
//! dropping points older than the feature's validity window.

use super::{DataPoint, DataSet, Observation};
use chrono::NaiveDateTime;
use mocab_core::ast::{DataKind, FeatureDefinition, ModelFeatures};
use mocab_core::{parse_timestamp, TimeWindow, Value};
use std::collections::HashMap;
use tracing::debug;

/// Data set extractor
pub struct DataSetExtractor;

impl DataSetExtractor {
    /// Oldest instant a window accepts; a zero window never expires
    pub fn lower_bound(window: &TimeWindow, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        if window.is_zero() {
            None
        } else {
            Some(window.lower_bound(reference))
        }
    }

    /// Extract the data set of one feature.
    ///
    /// Dated points before `lower_bound` are dropped; undated points are kept.
    /// For category features an observation without a value records presence.
    pub fn extract(
        feature: &FeatureDefinition,
        observations: &[Observation],
        lower_bound: Option<NaiveDateTime>,
    ) -> DataSet {
        let mut points = Vec::with_capacity(observations.len());

        for observation in observations {
            let date = match observation.date.as_deref() {
                Some(raw) => {
                    let parsed = parse_timestamp(raw);
                    if parsed.is_none() && !raw.trim().is_empty() {
                        debug!(
                            "Unparseable timestamp '{}' for feature '{}', treating as undated",
                            raw, feature.name
                        );
                    }
                    parsed
                }
                None => None,
            };

            if let (Some(date), Some(bound)) = (date, lower_bound) {
                if date < bound {
                    continue;
                }
            }

            let value = match (feature.kind, observation.value.normalized()) {
                (DataKind::Category, Value::Null) => Value::Bool(true),
                (_, value) => value,
            };
            points.push(DataPoint::new(date, value));
        }

        debug!(
            "Extracted {}/{} points for feature '{}'",
            points.len(),
            observations.len(),
            feature.name
        );
        DataSet::new(points)
    }

    /// Allocate coded observations to the features of a model.
    ///
    /// An observation belongs to every feature listing its code; observations
    /// without a code cannot be allocated and are skipped.
    pub fn allocate(
        features: &ModelFeatures,
        observations: &[Observation],
    ) -> HashMap<String, Vec<Observation>> {
        let mut allocated: HashMap<String, Vec<Observation>> = HashMap::new();

        for observation in observations {
            let Some(code) = observation.code.as_deref() else {
                continue;
            };
            for feature in features.iter() {
                if feature.matches_code(code, observation.system.as_deref()) {
                    allocated
                        .entry(feature.name.clone())
                        .or_default()
                        .push(observation.clone());
                }
            }
        }

        allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::CodeRef;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn glucose() -> FeatureDefinition {
        FeatureDefinition::new("glucose", DataKind::Value, TimeWindow::parse("0000-06-00").unwrap())
            .with_code(CodeRef::with_system("2339-0", "http://loinc.org"))
    }

    #[test]
    fn test_window_drops_stale_points() {
        let feature = glucose();
        let bound = DataSetExtractor::lower_bound(&feature.window, at("2020-01-31"));
        assert_eq!(bound, Some(at("2019-07-31")));

        let observations = vec![
            Observation::new(Some("2019-07-30T23:59:59"), 120.0),
            Observation::new(Some("2019-08-01"), 153.0),
            Observation::undated(99.0),
        ];
        let data = DataSetExtractor::extract(&feature, &observations, bound);

        assert_eq!(data.values(), vec![Value::Number(153.0), Value::Number(99.0)]);
        assert_eq!(data.dates(), vec![Some(at("2019-08-01")), None]);
    }

    #[test]
    fn test_zero_window_never_expires() {
        assert_eq!(DataSetExtractor::lower_bound(&TimeWindow::default(), at("2020-01-01")), None);
    }

    #[test]
    fn test_raw_values_are_coerced() {
        let observations = vec![
            Observation::new(Some("not a date"), "25"),
            Observation::new(Some("2020-01-01"), "nan"),
        ];
        let data = DataSetExtractor::extract(&glucose(), &observations, None);

        assert_eq!(data.points[0], DataPoint::new(None, Value::Number(25.0)));
        assert_eq!(data.points[1].value, Value::Null);
    }

    #[test]
    fn test_category_presence() {
        let feature = FeatureDefinition::new("sea", DataKind::Category, TimeWindow::days(7));
        let data = DataSetExtractor::extract(&feature, &[Observation::new(Some("2016-12-24"), Value::Null)], None);
        assert_eq!(data.values(), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_allocate_by_code() {
        let mut features = ModelFeatures::new("diabetes");
        features.features.push(glucose());
        features.features.push(
            FeatureDefinition::new("age", DataKind::Value, TimeWindow::years(1))
                .with_code(CodeRef::new("30525-0")),
        );

        let observations = vec![
            Observation::new(Some("2020-01-01"), 153.0)
                .with_code("2339-0")
                .with_system("http://loinc.org"),
            Observation::new(Some("2020-01-01"), 140.0)
                .with_code("2339-0")
                .with_system("http://other.org"),
            Observation::undated(25.0).with_code("30525-0").with_system("http://loinc.org"),
            Observation::undated(1.0),
        ];

        let allocated = DataSetExtractor::allocate(&features, &observations);
        assert_eq!(allocated["glucose"].len(), 1);
        assert_eq!(allocated["age"].len(), 1);
    }
}
