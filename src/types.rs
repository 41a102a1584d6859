use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

/// Ordered name -> value mapping describing one candidate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns a new map where entries of `other` override entries of `self`
    pub fn merged(&self, other: &ParamMap) -> ParamMap {
        let mut merged = self.0.clone();
        for (name, value) in &other.0 {
            merged.insert(name.clone(), value.clone());
        }
        ParamMap(merged)
    }

    /// Name of the first float entry that is NaN or infinite
    pub fn first_non_finite(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, value)| matches!(value, ParamValue::Float(v) if !v.is_finite()))
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Ordered sequence of candidate configurations. A candidate's identity is its index.
pub type ParamGrid = Vec<ParamMap>;

/// Builds a param grid as the cartesian product of per-parameter value lists
#[derive(Debug, Clone, Default)]
pub struct ParamGridBuilder {
    base: ParamMap,
    grids: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed values shared by every candidate
    pub fn base_on(mut self, base: ParamMap) -> Self {
        self.base = self.base.merged(&base);
        self
    }

    /// Values to search for one parameter. Re-adding a name replaces its values.
    pub fn add_grid<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let name = name.into();
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.grids.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = values,
            None => self.grids.push((name, values)),
        }
        self
    }

    /// Expands the grid. The first added parameter varies slowest.
    pub fn build(&self) -> ParamGrid {
        let mut grid = vec![self.base.clone()];
        for (name, values) in &self.grids {
            let mut expanded = Vec::with_capacity(grid.len() * values.len());
            for params in &grid {
                for value in values {
                    expanded.push(params.clone().with(name.clone(), value.clone()));
                }
            }
            grid = expanded;
        }
        grid
    }
}

/// Winning candidate of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub best_index: usize,
    pub best_metric: f64,
}

/// Generates a uid of the form `<prefix>_<12 hex digits>`
pub fn random_uid(prefix: &str) -> String {
    let suffix: u64 = rand::thread_rng().gen::<u64>() & 0xffff_ffff_ffff;
    format!("{}_{:012x}", prefix, suffix)
}
