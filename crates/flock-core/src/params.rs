//! Model parameters and parameter sweeps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::value::Value;

/// Ordered name → value mapping handed to model factories.
///
/// Typed getters distinguish a missing parameter from one of the wrong
/// type; the `*_or` variants substitute a default only when missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(IndexMap<String, Value>);

impl ParamSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or overwrite a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether a parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite entries with those of `other`.
    pub fn merge(&mut self, other: &ParamSet) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Parse a `name=value` assignment as given on the command line.
    pub fn parse_assignment(s: &str) -> Result<(String, Value), ConfigError> {
        let (name, raw) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid(s, "expected name=value"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid(s, "empty parameter name"));
        }
        Ok((name.to_string(), Value::parse_literal(raw.trim())))
    }

    fn required(&self, name: &str) -> Result<&Value, ConfigError> {
        self.0.get(name).ok_or_else(|| ConfigError::MissingParameter {
            name: name.to_string(),
        })
    }

    fn mismatch(name: &str, want: &str, got: &Value) -> ConfigError {
        ConfigError::invalid(name, format!("expected {want}, got {}", got.type_name()))
    }

    /// Required float (integers widen).
    pub fn f64(&self, name: &str) -> Result<f64, ConfigError> {
        let v = self.required(name)?;
        match v {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => Err(Self::mismatch(name, "number", v)),
        }
    }

    /// Required integer. Floats are rejected even when whole.
    pub fn i64(&self, name: &str) -> Result<i64, ConfigError> {
        let v = self.required(name)?;
        match v {
            Value::Int(i) => Ok(*i),
            _ => Err(Self::mismatch(name, "integer", v)),
        }
    }

    /// Required non-negative integer.
    pub fn usize(&self, name: &str) -> Result<usize, ConfigError> {
        let i = self.i64(name)?;
        usize::try_from(i)
            .map_err(|_| ConfigError::invalid(name, format!("must be >= 0, got {i}")))
    }

    /// Required boolean.
    pub fn bool(&self, name: &str) -> Result<bool, ConfigError> {
        let v = self.required(name)?;
        v.as_bool().ok_or_else(|| Self::mismatch(name, "bool", v))
    }

    /// Required text.
    pub fn str(&self, name: &str) -> Result<&str, ConfigError> {
        let v = self.required(name)?;
        v.as_str().ok_or_else(|| Self::mismatch(name, "text", v))
    }

    /// Float, or `default` when absent.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        if self.contains(name) {
            self.f64(name)
        } else {
            Ok(default)
        }
    }

    /// Integer, or `default` when absent.
    pub fn i64_or(&self, name: &str, default: i64) -> Result<i64, ConfigError> {
        if self.contains(name) {
            self.i64(name)
        } else {
            Ok(default)
        }
    }

    /// Non-negative integer, or `default` when absent.
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, ConfigError> {
        if self.contains(name) {
            self.usize(name)
        } else {
            Ok(default)
        }
    }

    /// Boolean, or `default` when absent.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        if self.contains(name) {
            self.bool(name)
        } else {
            Ok(default)
        }
    }

    /// Probability in `[0, 1]`, or `default` when absent.
    pub fn probability_or(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        let p = self.f64_or(name, default)?;
        if (0.0..=1.0).contains(&p) {
            Ok(p)
        } else {
            Err(ConfigError::invalid(name, format!("must be in [0, 1], got {p}")))
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One entry of a parameter grid.
///
/// In JSON, an array is a sweep and anything else is fixed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamSpec {
    /// Every run takes each of these values in turn.
    Sweep(Vec<Value>),
    /// Every run gets this value.
    Fixed(Value),
}

impl ParamSpec {
    fn values(&self) -> &[Value] {
        match self {
            Self::Sweep(vs) => vs,
            Self::Fixed(v) => std::slice::from_ref(v),
        }
    }
}

/// Ordered parameter grid for batch sweeps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid(IndexMap<String, ParamSpec>);

impl ParameterGrid {
    /// An empty grid (one combination with no parameters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed parameter.
    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), ParamSpec::Fixed(value.into()));
        self
    }

    /// Add a swept parameter.
    pub fn sweep<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.0.insert(name.into(), ParamSpec::Sweep(values));
        self
    }

    /// Insert or overwrite an entry.
    pub fn set(&mut self, name: impl Into<String>, spec: ParamSpec) {
        self.0.insert(name.into(), spec);
    }

    /// Parse a JSON object of `name: value | [values]`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] on malformed JSON, nested
    /// objects, or an empty sweep list.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let grid: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::invalid("params", e.to_string()))?;
        grid.validate()?;
        Ok(grid)
    }

    /// Reject empty sweeps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.0 {
            if spec.values().is_empty() {
                return Err(ConfigError::invalid(name.as_str(), "sweep list is empty"));
            }
        }
        Ok(())
    }

    /// Names of swept parameters, in grid order.
    pub fn swept(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, s)| matches!(s, ParamSpec::Sweep(_)))
            .map(|(k, _)| k.as_str())
    }

    /// Number of combinations in the Cartesian product.
    pub fn len(&self) -> usize {
        self.0.values().map(|s| s.values().len()).product()
    }

    /// Whether the product is empty (some sweep has no values).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerate the Cartesian product; the last parameter varies fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let total = self.len();
        let specs: Vec<(&String, &[Value])> =
            self.0.iter().map(|(k, s)| (k, s.values())).collect();
        let mut out = Vec::with_capacity(total);
        for mut index in 0..total {
            let mut slots: Vec<(&String, &Value)> = Vec::with_capacity(specs.len());
            for (name, values) in specs.iter().rev() {
                slots.push((*name, &values[index % values.len()]));
                index /= values.len();
            }
            out.push(
                slots
                    .into_iter()
                    .rev()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_distinguish_missing_from_mismatch() {
        let p = ParamSet::new()
            .with("n", 10i64)
            .with("density", 0.8)
            .with("torus", true)
            .with("name", "wolf");
        assert_eq!(p.usize("n").unwrap(), 10);
        assert_eq!(p.f64("n").unwrap(), 10.0);
        assert_eq!(p.f64("density").unwrap(), 0.8);
        assert!(p.bool("torus").unwrap());
        assert_eq!(p.str("name").unwrap(), "wolf");

        assert!(matches!(
            p.f64("missing"),
            Err(ConfigError::MissingParameter { .. })
        ));
        assert!(matches!(
            p.i64("density"),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert_eq!(p.f64_or("missing", 2.5).unwrap(), 2.5);
        assert!(p.bool_or("name", false).is_err());
    }

    #[test]
    fn negative_count_is_invalid() {
        let p = ParamSet::new().with("n", -1i64);
        assert!(p.usize("n").is_err());
    }

    #[test]
    fn probability_is_range_checked() {
        let p = ParamSet::new().with("p", 1.5);
        assert!(p.probability_or("p", 0.1).is_err());
        assert_eq!(p.probability_or("q", 0.1).unwrap(), 0.1);
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(
            ParamSet::parse_assignment("density=0.7").unwrap(),
            ("density".to_string(), Value::Float(0.7))
        );
        assert!(ParamSet::parse_assignment("density").is_err());
        assert!(ParamSet::parse_assignment("=3").is_err());
    }

    #[test]
    fn grid_product_last_varies_fastest() {
        let g = ParameterGrid::new()
            .sweep("a", [1i64, 2])
            .fixed("b", "x")
            .sweep("c", [10i64, 20, 30]);
        assert_eq!(g.len(), 6);
        let combos = g.combinations();
        let pairs: Vec<(i64, i64)> = combos
            .iter()
            .map(|p| (p.i64("a").unwrap(), p.i64("c").unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![(1, 10), (1, 20), (1, 30), (2, 10), (2, 20), (2, 30)]
        );
        assert!(combos.iter().all(|p| p.str("b").unwrap() == "x"));
        let names: Vec<&str> = combos[0].iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn grid_from_json() {
        let g = ParameterGrid::from_json(
            r#"{"init_people": [25, 100], "rich_threshold": [5, 10],
                "reserve_percent": [5, 10, 20, 50], "width": 20}"#,
        )
        .unwrap();
        assert_eq!(g.len(), 16);
        assert_eq!(
            g.swept().collect::<Vec<_>>(),
            vec!["init_people", "rich_threshold", "reserve_percent"]
        );
        assert!(ParameterGrid::from_json(r#"{"a": []}"#).is_err());
        assert!(ParameterGrid::from_json("not json").is_err());
    }

    #[test]
    fn empty_grid_has_one_empty_combination() {
        let combos = ParameterGrid::new().combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }
}
