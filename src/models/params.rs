//! Hyperparameter values and ordered parameter sets.

use std::fmt;

use serde::Serialize;

use super::classifier::ModelError;

/// A single hyperparameter candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Convert a scalar TOML value. Arrays, tables and datetimes are not
    /// valid candidates.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(b) => Some(Self::Bool(*b)),
            toml::Value::Integer(i) => Some(Self::Int(*i)),
            toml::Value::Float(f) => Some(Self::Float(*f)),
            toml::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `"none"` stands in for an absent value (TOML has no null).
    pub fn is_none(&self) -> bool {
        matches!(self, Self::Str(s) if s.eq_ignore_ascii_case("none"))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{:.1}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) if s.eq_ignore_ascii_case("none") => write!(f, "None"),
            Self::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// One concrete choice of hyperparameters, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `Family(name=value, ...)`.
    pub fn signature(&self, family: &str) -> String {
        let args: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        format!("{}({})", family, args.join(", "))
    }

    /// Reject names the family does not understand.
    pub fn ensure_known(&self, family: &str, known: &[&str]) -> Result<(), ModelError> {
        match self.entries.iter().find(|(name, _)| !known.contains(&name.as_str())) {
            Some((name, _)) => Err(ModelError::UnknownParameter {
                family: family.to_string(),
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(name, value, "expected a number")),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_i64()
                .filter(|v| *v >= 0)
                .map(|v| v as usize)
                .ok_or_else(|| invalid(name, value, "expected a non-negative integer")),
        }
    }

    /// Integer parameter where absence or `"none"` means unlimited.
    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>, ModelError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) if value.is_none() => Ok(None),
            Some(_) => self.usize_or(name, 0).map(Some),
        }
    }

    pub fn u64_or(&self, name: &str, default: u64) -> Result<u64, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) if value.is_none() => Ok(default),
            Some(value) => value
                .as_i64()
                .filter(|v| *v >= 0)
                .map(|v| v as u64)
                .ok_or_else(|| invalid(name, value, "expected a non-negative integer")),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| invalid(name, value, "expected true or false")),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .ok_or_else(|| invalid(name, value, "expected a string")),
        }
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> ModelError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        reason: format!("{} (got {})", reason, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_values() {
        assert_eq!(ParamValue::from(0.1).to_string(), "0.1");
        assert_eq!(ParamValue::from(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::from(1).to_string(), "1");
        assert_eq!(ParamValue::from("l2").to_string(), "'l2'");
        assert_eq!(ParamValue::from("none").to_string(), "None");
        assert_eq!(ParamValue::from(true).to_string(), "True");
    }

    #[test]
    fn test_signature_keeps_order() {
        let params = ParamSet::new().with("penalty", "l2").with("C", 0.1);
        assert_eq!(params.signature("LinearSVC"), "LinearSVC(penalty='l2', C=0.1)");
        assert_eq!(ParamSet::new().signature("GaussianNB"), "GaussianNB()");
    }

    #[test]
    fn test_typed_readers() {
        let params = ParamSet::new()
            .with("C", 1)
            .with("max_depth", "none")
            .with("n_estimators", 10)
            .with("bootstrap", false);

        assert_eq!(params.f64_or("C", 0.5).unwrap(), 1.0);
        assert_eq!(params.f64_or("tol", 1e-4).unwrap(), 1e-4);
        assert_eq!(params.opt_usize("max_depth").unwrap(), None);
        assert_eq!(params.usize_or("n_estimators", 100).unwrap(), 10);
        assert!(!params.bool_or("bootstrap", true).unwrap());
        assert!(params.str_or("C", "x").is_err());
        assert!(params.usize_or("C", 1).is_ok());
    }

    #[test]
    fn test_negative_integer_rejected() {
        let params = ParamSet::new().with("n_neighbors", -3);
        assert!(matches!(
            params.usize_or("n_neighbors", 5),
            Err(ModelError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_ensure_known() {
        let params = ParamSet::new().with("C", 0.1).with("gamma", 2.0);
        assert!(params.ensure_known("LinearSVC", &["C", "gamma"]).is_ok());
        assert!(matches!(
            params.ensure_known("LinearSVC", &["C"]),
            Err(ModelError::UnknownParameter { name, .. }) if name == "gamma"
        ));
    }

    #[test]
    fn test_from_toml() {
        assert_eq!(
            ParamValue::from_toml(&toml::Value::Integer(3)),
            Some(ParamValue::Int(3))
        );
        assert_eq!(ParamValue::from_toml(&toml::Value::Array(vec![])), None);
    }
}
