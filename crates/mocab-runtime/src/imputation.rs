//! Imputation policy engine
//!
//! Cleans a patient × feature matrix with a training set's null value
//! strategy: rows whose null count satisfies the drop rule are removed first,
//! then the remaining nulls of each column are filled. Column statistics are
//! computed over the row-filtered matrix.

use mocab_core::ast::{FillMethod, NullValueStrategy};
use mocab_core::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Outcome of one imputation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImputationReport {
    pub dropped_rows: usize,
    pub filled_cells: usize,
}

/// Imputation engine for one null value strategy
pub struct ImputationEngine<'a> {
    strategy: &'a NullValueStrategy,
}

impl<'a> ImputationEngine<'a> {
    pub fn new(strategy: &'a NullValueStrategy) -> Self {
        Self { strategy }
    }

    /// Rows the drop rule removes, as a mask
    pub fn drop_mask(&self, rows: &[Vec<Value>]) -> Vec<bool> {
        rows.iter()
            .map(|row| {
                let nulls = row.iter().filter(|v| v.is_null()).count();
                self.strategy.drop.drops(nulls)
            })
            .collect()
    }

    /// Drop rows, then fill the remaining nulls
    pub fn apply(&self, columns: &[String], rows: &mut Vec<Vec<Value>>) -> ImputationReport {
        let mask = self.drop_mask(rows);
        let before = rows.len();
        let mut keep = mask.iter().map(|drop| !drop);
        rows.retain(|_| keep.next().unwrap_or(true));

        let dropped_rows = before - rows.len();
        let filled_cells = self.fill(columns, rows);
        ImputationReport {
            dropped_rows,
            filled_cells,
        }
    }

    /// Fill the nulls of every column; returns the number of filled cells
    pub fn fill(&self, columns: &[String], rows: &mut [Vec<Value>]) -> usize {
        let mut filled = 0;

        for (index, column) in columns.iter().enumerate() {
            let nulls = rows
                .iter()
                .filter(|row| row.get(index).map(Value::is_null).unwrap_or(false))
                .count();
            if nulls == 0 {
                continue;
            }

            let method = self.strategy.method_for(column);
            let Some(replacement) = Self::replacement(method, rows, index) else {
                warn!(
                    "Column '{}' has no numeric values, {} of {} cells stay null",
                    column, method, nulls
                );
                continue;
            };

            for row in rows.iter_mut() {
                if let Some(cell) = row.get_mut(index) {
                    if cell.is_null() {
                        *cell = replacement.clone();
                        filled += 1;
                    }
                }
            }
            debug!("Filled {} cells of column '{}' with {}", nulls, column, replacement);
        }

        filled
    }

    fn replacement(method: FillMethod, rows: &[Vec<Value>], index: usize) -> Option<Value> {
        if let FillMethod::Constant(value) = method {
            return Some(Value::Number(value));
        }

        let mut values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(Value::as_f64)
            .collect();
        if values.is_empty() {
            return None;
        }

        let statistic = match method {
            FillMethod::Mean => values.iter().sum::<f64>() / values.len() as f64,
            FillMethod::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
            FillMethod::Mode => mode(&values),
            FillMethod::Constant(value) => value,
        };
        Some(Value::Number(statistic))
    }
}

/// Most frequent value, smallest on ties
fn mode(values: &[f64]) -> f64 {
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for value in values {
        counts.entry(value.to_bits()).or_insert((*value, 0)).1 += 1;
    }

    let mut best: Option<(f64, usize)> = None;
    for (value, count) in counts.into_values() {
        match best {
            Some((best_value, best_count))
                if best_count > count || (best_count == count && best_value <= value) => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocab_core::ast::{Comparator, DropRule};

    fn n(value: f64) -> Value {
        Value::Number(value)
    }

    fn columns() -> Vec<String> {
        vec!["age".to_string(), "glucose".to_string(), "smoker".to_string()]
    }

    fn strategy(drop: DropRule, columns: Vec<(&str, FillMethod)>, default: FillMethod) -> NullValueStrategy {
        NullValueStrategy {
            drop,
            columns: columns
                .into_iter()
                .map(|(name, method)| (name.to_string(), method))
                .collect(),
            default,
        }
    }

    fn matrix() -> Vec<Vec<Value>> {
        vec![
            vec![n(30.0), n(100.0), Value::Null],
            vec![Value::Null, Value::Null, Value::Null],
            vec![n(50.0), Value::Null, n(1.0)],
            vec![n(40.0), n(140.0), n(0.0)],
            vec![Value::Null, n(120.0), n(0.0)],
        ]
    }

    #[test]
    fn test_drop_then_fill() {
        let strategy = strategy(
            DropRule::new(Comparator::Ge, 2),
            vec![("age", FillMethod::Median), ("smoker", FillMethod::Constant(0.0))],
            FillMethod::Mean,
        );
        let mut rows = matrix();
        let report = ImputationEngine::new(&strategy).apply(&columns(), &mut rows);

        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.filled_cells, 3);
        assert_eq!(rows.len(), 4);
        // median of 30, 50, 40 computed after the drop
        assert_eq!(rows[3][0], n(40.0));
        // mean of 100, 140, 120
        assert_eq!(rows[1][1], n(120.0));
        assert_eq!(rows[0][2], n(0.0));
    }

    #[test]
    fn test_gt_drop_keeps_rows_at_threshold() {
        let strategy = strategy(DropRule::new(Comparator::Gt, 1), vec![], FillMethod::Constant(-1.0));
        let mut rows = matrix();
        let report = ImputationEngine::new(&strategy).apply(&columns(), &mut rows);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(rows[1], vec![n(50.0), n(-1.0), n(1.0)]);
    }

    #[test]
    fn test_mode_ties_pick_smallest() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), 1.0);
        assert_eq!(mode(&[2.0, 5.0, 5.0]), 5.0);
    }

    #[test]
    fn test_median_of_even_count() {
        let strategy = strategy(DropRule::new(Comparator::Ge, 3), vec![], FillMethod::Median);
        let mut rows = vec![vec![n(1.0)], vec![n(4.0)], vec![Value::Null], vec![n(2.0)], vec![n(3.0)]];
        ImputationEngine::new(&strategy).apply(&["x".to_string()], &mut rows);
        assert_eq!(rows[2][0], n(2.5));
    }

    #[test]
    fn test_clean_matrix_is_untouched() {
        let strategy = strategy(DropRule::new(Comparator::Ge, 1), vec![], FillMethod::Mode);
        let clean = vec![vec![n(1.0), n(2.0), n(3.0)], vec![n(4.0), n(5.0), n(6.0)]];

        let mut once = clean.clone();
        let first = ImputationEngine::new(&strategy).apply(&columns(), &mut once);
        let mut twice = once.clone();
        let second = ImputationEngine::new(&strategy).apply(&columns(), &mut twice);

        assert_eq!(first, ImputationReport::default());
        assert_eq!(second, ImputationReport::default());
        assert_eq!(once, clean);
        assert_eq!(twice, clean);
    }

    #[test]
    fn test_imputed_matrix_is_stable() {
        let strategy = strategy(DropRule::new(Comparator::Ge, 2), vec![], FillMethod::Mean);
        let mut rows = matrix();
        ImputationEngine::new(&strategy).apply(&columns(), &mut rows);
        let cleaned = rows.clone();

        ImputationEngine::new(&strategy).apply(&columns(), &mut rows);
        assert_eq!(rows, cleaned);
    }

    #[test]
    fn test_column_without_numbers_stays_null() {
        let strategy = strategy(DropRule::new(Comparator::Ge, 5), vec![], FillMethod::Mean);
        let mut rows = vec![vec![Value::Null], vec![Value::String("high".to_string())]];
        let report = ImputationEngine::new(&strategy).apply(&["x".to_string()], &mut rows);
        assert_eq!(report.filled_cells, 0);
        assert!(rows[0][0].is_null());
    }
}
