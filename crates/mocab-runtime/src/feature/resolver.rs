//! Feature resolver
//!
//! For every catalog feature of a model:
//! 1. extract the data set inside the validity window;
//! 2. apply the data filter (training only), after substituting reference
//!    thresholds with the referenced features' aggregated selections;
//! 3. aggregate with the feature's search strategy.
//!
//! Referenced features are aggregated from their unfiltered series. A
//! snapshot feature holding exactly one point bypasses the filter.

use crate::dataset::{Aggregator, DataSetExtractor, Observation, Selection};
use crate::filter::{BoundThreshold, FilterEngine};
use chrono::NaiveDateTime;
use mocab_core::ast::{FeatureDefinition, FilterRule, ModelFeatures};
use mocab_core::{TimeWindow, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Resolved selection of one feature
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeature {
    pub selection: Selection,
    pub default_value: Value,
}

impl ResolvedFeature {
    /// Selected scalar, falling back to the catalog default
    pub fn value(&self) -> Value {
        let value = self.selection.value();
        if value.is_null() {
            self.default_value.clone()
        } else {
            value
        }
    }
}

/// Resolution output of one patient, keyed by feature name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFeatures {
    features: BTreeMap<String, ResolvedFeature>,
}

impl ResolvedFeatures {
    pub fn get(&self, name: &str) -> Option<&ResolvedFeature> {
        self.features.get(name)
    }

    pub fn value(&self, name: &str) -> Value {
        self.features.get(name).map(ResolvedFeature::value).unwrap_or(Value::Null)
    }

    /// Value map consumed by the variable registry
    pub fn values(&self) -> HashMap<String, Value> {
        self.features
            .iter()
            .map(|(name, feature)| (name.clone(), feature.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Feature resolver for one model
pub struct FeatureResolver<'a> {
    features: &'a ModelFeatures,
    filters: &'a [FilterRule],
    window: Option<TimeWindow>,
}

impl<'a> FeatureResolver<'a> {
    pub fn new(features: &'a ModelFeatures) -> Self {
        Self {
            features,
            filters: &[],
            window: None,
        }
    }

    /// Apply a training set's data filter
    pub fn with_filters(mut self, filters: &'a [FilterRule]) -> Self {
        self.filters = filters;
        self
    }

    /// Replace every feature's validity window; a zero window keeps them
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = if window.is_zero() { None } else { Some(window) };
        self
    }

    /// Resolve all catalog features from observations keyed by feature name
    pub fn resolve(
        &self,
        observations: &HashMap<String, Vec<Observation>>,
        reference: NaiveDateTime,
    ) -> ResolvedFeatures {
        for name in observations.keys() {
            if self.features.get(name).is_none() {
                debug!(
                    "Ignoring observations for '{}': not in the catalog of model '{}'",
                    name, self.features.model
                );
            }
        }

        let engine = FilterEngine::new(self.filters);
        let referenced = engine.referenced_features();

        let mut thresholds: HashMap<String, Selection> = HashMap::new();
        for name in &referenced {
            if let Some(feature) = self.features.get(name) {
                thresholds.insert(name.to_string(), self.select(feature, observations, reference, None));
            }
        }
        let bound = engine.bind(&thresholds);

        let mut resolved = ResolvedFeatures::default();
        for feature in self.features.iter() {
            let selection = match thresholds.get(&feature.name) {
                Some(selection) => selection.clone(),
                None if engine.is_empty() => self.select(feature, observations, reference, None),
                None => self.select(feature, observations, reference, Some((&engine, bound.as_slice()))),
            };
            resolved.features.insert(
                feature.name.clone(),
                ResolvedFeature {
                    selection,
                    default_value: feature.default_value.clone(),
                },
            );
        }

        resolved
    }

    fn select(
        &self,
        feature: &FeatureDefinition,
        observations: &HashMap<String, Vec<Observation>>,
        reference: NaiveDateTime,
        filter: Option<(&FilterEngine<'_>, &[BoundThreshold])>,
    ) -> Selection {
        let window = self.window.as_ref().unwrap_or(&feature.window);
        let lower_bound = DataSetExtractor::lower_bound(window, reference);
        let raw = observations
            .get(&feature.name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut data = DataSetExtractor::extract(feature, raw, lower_bound);

        if let Some((engine, thresholds)) = filter {
            if feature.snapshot && data.len() == 1 {
                debug!("Snapshot feature '{}' bypasses the data filter", feature.name);
            } else {
                let before = data.len();
                data = engine.apply(&data, thresholds);
                debug!(
                    "Filter kept {}/{} points of feature '{}'",
                    data.len(),
                    before,
                    feature.name
                );
            }
        }

        Aggregator::select(&data, feature.search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{Comparator, DataKind, FilterKind, FilterThreshold, SearchStrategy};
    use mocab_core::parse_timestamp;

    fn reference() -> NaiveDateTime {
        parse_timestamp("2020-06-01").unwrap()
    }

    fn model() -> ModelFeatures {
        let mut model = ModelFeatures::new("spc");
        model.features.push(FeatureDefinition::new(
            "admission",
            DataKind::Value,
            TimeWindow::years(1),
        ));
        model.features.push(
            FeatureDefinition::new("crp", DataKind::Value, TimeWindow::years(1))
                .with_default(Value::Number(-1.0)),
        );
        model.features.push(
            FeatureDefinition::new("age", DataKind::Value, TimeWindow::years(1)).with_snapshot(true),
        );
        model.features.push(
            FeatureDefinition::new("wbc", DataKind::Value, TimeWindow::years(1))
                .with_search(SearchStrategy::Max),
        );
        model
    }

    fn observations() -> HashMap<String, Vec<Observation>> {
        HashMap::from([
            (
                "admission".to_string(),
                vec![
                    Observation::new(Some("2020-03-01"), true),
                    Observation::new(Some("2020-01-01"), true),
                ],
            ),
            (
                "crp".to_string(),
                vec![
                    Observation::new(Some("2020-02-01"), 9.0),
                    Observation::new(Some("2020-04-01"), 0.5),
                ],
            ),
            ("age".to_string(), vec![Observation::new(Some("2019-12-01"), 60.0)]),
            (
                "wbc".to_string(),
                vec![
                    Observation::new(Some("2020-03-15"), 4400.0),
                    Observation::new(Some("2020-02-15"), 12000.0),
                    Observation::new(Some("2018-01-01"), 30000.0),
                ],
            ),
        ])
    }

    fn since_admission() -> Vec<FilterRule> {
        vec![FilterRule::new(
            FilterKind::Date,
            Comparator::Ge,
            FilterThreshold::Reference("admission".to_string()),
        )]
    }

    #[test]
    fn test_resolve_without_filters() {
        let model = model();
        let resolved = FeatureResolver::new(&model).resolve(&observations(), reference());

        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved.value("crp"), Value::Number(0.5));
        // the 2018 point is outside the window
        assert_eq!(resolved.value("wbc"), Value::Number(12000.0));
        assert_eq!(resolved.value("admission"), Value::Bool(true));
    }

    #[test]
    fn test_reference_threshold_filters_other_features() {
        let model = model();
        let filters = since_admission();
        let resolved = FeatureResolver::new(&model)
            .with_filters(&filters)
            .resolve(&observations(), reference());

        // only points on or after the latest admission survive
        assert_eq!(resolved.value("wbc"), Value::Number(4400.0));
        // the referenced feature itself is not filtered
        let admission = resolved.get("admission").unwrap();
        assert_eq!(admission.selection.date(), parse_timestamp("2020-03-01"));
    }

    #[test]
    fn test_filtered_out_feature_falls_back_to_default() {
        let model = model();
        let filters = vec![FilterRule::new(
            FilterKind::Value,
            Comparator::Gt,
            FilterThreshold::Literal(Value::Number(100_000.0)),
        )];
        let resolved = FeatureResolver::new(&model)
            .with_filters(&filters)
            .resolve(&observations(), reference());

        assert_eq!(resolved.value("crp"), Value::Number(-1.0));
        assert_eq!(resolved.value("wbc"), Value::Null);
    }

    #[test]
    fn test_snapshot_feature_bypasses_filter() {
        let model = model();
        let filters = since_admission();
        let resolved = FeatureResolver::new(&model)
            .with_filters(&filters)
            .resolve(&observations(), reference());

        // 2019-12-01 is before admission, yet the single snapshot point stays
        assert_eq!(resolved.value("age"), Value::Number(60.0));
    }

    #[test]
    fn test_window_override() {
        let model = model();
        let resolved = FeatureResolver::new(&model)
            .with_window(TimeWindow::parse("0003-00-00").unwrap())
            .resolve(&observations(), reference());
        assert_eq!(resolved.value("wbc"), Value::Number(30000.0));
    }

    #[test]
    fn test_unknown_observations_are_ignored() {
        let model = model();
        let mut observations = observations();
        observations.insert("fio2".to_string(), vec![Observation::undated(0.21)]);

        let resolved = FeatureResolver::new(&model).resolve(&observations, reference());
        assert!(resolved.get("fio2").is_none());
    }
}
