//! Variable registry
//!
//! Per-model arena of variables built once from the transformation table.
//! Numeric leaves are shared by name through [`VariableRegistry::get_or_create`],
//! so every category and formula reading a feature observes one value.
//!
//! Named references (`[name]` in conditions and formulas) bind to an earlier
//! unindexed derived row of that name when one exists, otherwise to the
//! numeric leaf. Bindings only ever point at earlier variables, which keeps
//! the graph acyclic.

use super::frame::ValueFrame;
use crate::engine::ExpressionEvaluator;
use crate::error::{Result, RuntimeError};
use mocab_core::ast::{Expression, ModelTransformation, SlotRole, TransformationRow, VariableSpec};
use mocab_core::condition::{ParsedCondition, ParsedValue};
use mocab_core::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Handle of a numeric leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(usize);

impl LeafId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle of a variable in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where a named reference reads its value
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Leaf(LeafId),
    /// Candidates of an unindexed derived variable, first non-null wins
    Derived(Vec<VariableId>),
}

/// A category condition with its operands bound
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCondition {
    pub condition: ParsedCondition,
    /// `None` for the `[default]` catch-all
    pub subject: Option<Binding>,
    pub reference: Option<Binding>,
}

/// A variable of the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Current value of a feature
    Numeric { feature: String, leaf: LeafId },
    /// Label produced when every condition holds
    Category {
        feature: String,
        label: Value,
        conditions: Vec<BoundCondition>,
    },
    /// Expression over other variables
    Formula {
        feature: String,
        expression: Expression,
        bindings: HashMap<String, Binding>,
        mandatory: bool,
    },
}

impl Variable {
    pub fn feature(&self) -> &str {
        match self {
            Variable::Numeric { feature, .. }
            | Variable::Category { feature, .. }
            | Variable::Formula { feature, .. } => feature,
        }
    }
}

/// One position of the output vector
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// 1-based position
    pub index: usize,
    /// Candidates in declaration order
    pub candidates: Vec<VariableId>,
}

/// Variable registry of one model
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    model: String,
    leaves: Vec<String>,
    leaf_ids: HashMap<String, LeafId>,
    variables: Vec<Variable>,
    derived: HashMap<String, Vec<VariableId>>,
    inputs: Vec<Slot>,
    labels: Vec<Slot>,
}

impl VariableRegistry {
    /// Create an empty registry
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Build the registry of a model from its transformation rows
    pub fn build(transformation: &ModelTransformation) -> Self {
        let mut registry = Self::new(transformation.model.clone());
        let mut inputs: BTreeMap<usize, Vec<VariableId>> = BTreeMap::new();
        let mut labels: BTreeMap<usize, Vec<VariableId>> = BTreeMap::new();

        for row in &transformation.rows {
            let id = registry.add_row(row);
            match (row.index, row.role) {
                (Some(index), SlotRole::Input) => inputs.entry(index).or_default().push(id),
                (Some(index), SlotRole::Label) => labels.entry(index).or_default().push(id),
                (None, _) => {
                    if !matches!(row.spec, VariableSpec::Numeric) {
                        registry.derived.entry(row.feature.clone()).or_default().push(id);
                    }
                }
            }
        }

        registry.inputs = Self::number_slots(inputs);
        registry.labels = Self::number_slots(labels);

        info!(
            "Built variable registry for model '{}': {} leaves, {} variables, {} slots, {} label slots",
            registry.model,
            registry.leaves.len(),
            registry.variables.len(),
            registry.inputs.len(),
            registry.labels.len()
        );
        registry
    }

    /// Numbered slots, with gaps in the numbering as empty slots
    fn number_slots(table: BTreeMap<usize, Vec<VariableId>>) -> Vec<Slot> {
        let last = table.keys().next_back().copied().unwrap_or(0);
        (1..=last)
            .map(|index| Slot {
                index,
                candidates: table.get(&index).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Shared numeric leaf for a feature name
    pub fn get_or_create(&mut self, name: &str) -> LeafId {
        if let Some(id) = self.leaf_ids.get(name) {
            return *id;
        }
        let id = LeafId(self.leaves.len());
        self.leaves.push(name.to_string());
        self.leaf_ids.insert(name.to_string(), id);
        id
    }

    /// Compile one transformation row into the arena
    pub fn add_row(&mut self, row: &TransformationRow) -> VariableId {
        let variable = match &row.spec {
            VariableSpec::Numeric => Variable::Numeric {
                feature: row.feature.clone(),
                leaf: self.get_or_create(&row.feature),
            },
            VariableSpec::Category(rule) => {
                let conditions = rule
                    .conditions
                    .iter()
                    .map(|condition| {
                        let subject = match &condition.subject {
                            _ if condition.value.is_default() => None,
                            Some(name) => Some(self.bind(name)),
                            None => Some(self.bind(&row.feature)),
                        };
                        let reference = condition
                            .value
                            .reference_name()
                            .map(|name| self.bind(name));
                        BoundCondition {
                            condition: condition.clone(),
                            subject,
                            reference,
                        }
                    })
                    .collect();
                Variable::Category {
                    feature: row.feature.clone(),
                    label: rule.label.clone(),
                    conditions,
                }
            }
            VariableSpec::Formula {
                expression,
                mandatory,
            } => {
                let bindings = expression
                    .references()
                    .into_iter()
                    .map(|name| {
                        let binding = self.bind(&name);
                        (name, binding)
                    })
                    .collect();
                Variable::Formula {
                    feature: row.feature.clone(),
                    expression: expression.clone(),
                    bindings,
                    mandatory: *mandatory,
                }
            }
        };

        let id = VariableId(self.variables.len());
        self.variables.push(variable);
        id
    }

    /// Bare conditions bind their own feature the same way as `[name]`
    fn bind(&mut self, name: &str) -> Binding {
        match self.derived.get(name) {
            Some(ids) => Binding::Derived(ids.clone()),
            None => Binding::Leaf(self.get_or_create(name)),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn leaf(&self, name: &str) -> Option<LeafId> {
        self.leaf_ids.get(name).copied()
    }

    /// Leaf names in creation order
    pub fn leaf_names(&self) -> &[String] {
        &self.leaves
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn slots(&self) -> &[Slot] {
        &self.inputs
    }

    pub fn label_slots(&self) -> &[Slot] {
        &self.labels
    }

    /// Column names of the input vector
    pub fn columns(&self) -> Vec<String> {
        self.column_names(&self.inputs)
    }

    /// Column names of the label vector
    pub fn label_columns(&self) -> Vec<String> {
        self.column_names(&self.labels)
    }

    fn column_names(&self, slots: &[Slot]) -> Vec<String> {
        slots
            .iter()
            .map(|slot| {
                slot.candidates
                    .first()
                    .and_then(|id| self.variable(*id))
                    .map(|v| v.feature().to_string())
                    .unwrap_or_else(|| format!("slot_{}", slot.index))
            })
            .collect()
    }

    /// Fresh frame holding the given feature values; absent leaves are null
    pub fn frame(&self, values: &HashMap<String, Value>) -> ValueFrame {
        let mut frame = ValueFrame::new(self.leaves.len());
        for (index, name) in self.leaves.iter().enumerate() {
            if let Some(value) = values.get(name) {
                frame.set(LeafId(index), value.clone());
            }
        }
        frame
    }

    /// Resolve the input vector from feature values
    pub fn resolve(&self, values: &HashMap<String, Value>) -> Result<Vec<Value>> {
        self.resolve_frame(&self.frame(values))
    }

    /// Resolve the input vector from a prepared frame
    pub fn resolve_frame(&self, frame: &ValueFrame) -> Result<Vec<Value>> {
        self.resolve_slots(&self.inputs, frame)
    }

    /// Resolve the label vector from feature values
    pub fn resolve_labels(&self, values: &HashMap<String, Value>) -> Result<Vec<Value>> {
        self.resolve_slots(&self.labels, &self.frame(values))
    }

    fn resolve_slots(&self, slots: &[Slot], frame: &ValueFrame) -> Result<Vec<Value>> {
        let mut vector = Vec::with_capacity(slots.len());
        for slot in slots {
            vector.push(self.first_non_null(&slot.candidates, frame)?);
        }
        Ok(vector)
    }

    fn first_non_null(&self, candidates: &[VariableId], frame: &ValueFrame) -> Result<Value> {
        for id in candidates {
            let value = self.evaluate(*id, frame)?;
            if !value.is_null() {
                return Ok(value);
            }
        }
        Ok(Value::Null)
    }

    /// Evaluate one variable.
    ///
    /// A category without a match and a non-mandatory formula that cannot
    /// be evaluated both yield null. Only a failing mandatory formula is an
    /// error.
    pub fn evaluate(&self, id: VariableId, frame: &ValueFrame) -> Result<Value> {
        let Some(variable) = self.variables.get(id.0) else {
            return Ok(Value::Null);
        };

        match variable {
            Variable::Numeric { leaf, .. } => Ok(frame.get(*leaf).clone()),
            Variable::Category {
                label, conditions, ..
            } => {
                for bound in conditions {
                    if !self.condition_holds(bound, frame)? {
                        return Ok(Value::Null);
                    }
                }
                Ok(label.clone())
            }
            Variable::Formula {
                feature,
                expression,
                bindings,
                mandatory,
            } => {
                let lookup = |name: &str| match bindings.get(name) {
                    Some(binding) => self.binding_value(binding, frame),
                    None => Err(RuntimeError::MissingValue(name.to_string())),
                };
                match ExpressionEvaluator::evaluate(expression, &lookup) {
                    Ok(value) => Ok(value),
                    Err(err @ RuntimeError::MandatoryFormula { .. }) => Err(err),
                    Err(err) if *mandatory => Err(RuntimeError::MandatoryFormula {
                        feature: feature.clone(),
                        reason: err.to_string(),
                    }),
                    Err(err) => {
                        debug!("Formula '{}' resolved to null: {}", feature, err);
                        Ok(Value::Null)
                    }
                }
            }
        }
    }

    fn condition_holds(&self, bound: &BoundCondition, frame: &ValueFrame) -> Result<bool> {
        if bound.condition.value.is_default() {
            return Ok(true);
        }
        let subject = match &bound.subject {
            Some(binding) => self.binding_value(binding, frame)?,
            None => Value::Null,
        };
        let rhs = match (&bound.condition.value, &bound.reference) {
            (ParsedValue::Literal(value), _) => value.clone(),
            (_, Some(reference)) => self.binding_value(reference, frame)?,
            _ => Value::Null,
        };
        Ok(bound.condition.evaluate(&subject, &rhs))
    }

    fn binding_value(&self, binding: &Binding, frame: &ValueFrame) -> Result<Value> {
        match binding {
            Binding::Leaf(leaf) => Ok(frame.get(*leaf).clone()),
            Binding::Derived(ids) => self.first_non_null(ids, frame),
        }
    }
}
