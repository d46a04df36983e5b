use std::collections::BTreeMap;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::{DecodeError, Result};
use super::keys;

/// A single typed option value.
///
/// The representation is untagged so that model metadata (a flat YAML or
/// JSON mapping) deserializes straight into [`Options`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<OptionValue>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "integer",
            OptionValue::Float(_) => "float",
            OptionValue::Str(_) => "string",
            OptionValue::List(_) => "list",
        }
    }
}

/// Conversion out of an [`OptionValue`], used by [`Options::get`].
pub trait FromOptionValue: Sized {
    /// Human readable name of the expected type, used in error messages
    const EXPECTED: &'static str;

    fn from_option_value(value: &OptionValue) -> Option<Self>;
}

impl FromOptionValue for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Bool(b) => Some(*b),
            // metadata written by other tools often stores flags as 0/1
            OptionValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl FromOptionValue for i64 {
    const EXPECTED: &'static str = "an integer";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromOptionValue for usize {
    const EXPECTED: &'static str = "an unsigned integer";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Int(i) => usize::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromOptionValue for u32 {
    const EXPECTED: &'static str = "a 32-bit unsigned integer";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Int(i) => u32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromOptionValue for f64 {
    const EXPECTED: &'static str = "a number";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromOptionValue for f32 {
    const EXPECTED: &'static str = "a number";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        f64::from_option_value(value).map(|f| f as f32)
    }
}

impl FromOptionValue for String {
    const EXPECTED: &'static str = "a string";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromOptionValue for Vec<String> {
    const EXPECTED: &'static str = "a list of strings";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::List(items) => items.iter().map(String::from_option_value).collect(),
            // a lone string is accepted as a one element list
            OptionValue::Str(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

impl FromOptionValue for Vec<usize> {
    const EXPECTED: &'static str = "a list of unsigned integers";

    fn from_option_value(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::List(items) => items.iter().map(usize::from_option_value).collect(),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        OptionValue::Float(value as f64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value.into_iter().map(OptionValue::Str).collect())
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        OptionValue::List(value.into_iter().map(OptionValue::from).collect())
    }
}

impl From<Vec<PathBuf>> for OptionValue {
    fn from(value: Vec<PathBuf>) -> Self {
        OptionValue::List(
            value
                .into_iter()
                .map(|p| OptionValue::Str(p.to_string_lossy().into_owned()))
                .collect(),
        )
    }
}

/// Named, typed options.
///
/// Keys are kept ordered so that two option sets built from the same input
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an option set from a JSON object.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Parses a flat YAML mapping. JSON objects are valid input too.
    pub fn from_yaml_str(text: &str) -> serde_yaml::Result<Self> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml_string(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    /// Set `key` to `value`, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Typed lookup of a required option.
    pub fn get<T: FromOptionValue>(&self, key: &str) -> Result<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| DecodeError::MissingOption(key.to_string()))?;
        T::from_option_value(value).ok_or_else(|| {
            DecodeError::config(key, format!("expected {}, found {}", T::EXPECTED, value.kind()))
        })
    }

    /// Typed lookup falling back to `default` when the option is absent.
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<T: FromOptionValue>(&self, key: &str, default: T) -> Result<T> {
        if self.has(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build the option set of one ensemble member.
    ///
    /// Starts from `self` (the global decoding options) and layers the
    /// model's embedded `metadata` on top. Metadata wins for model keys;
    /// shared decode-time keys that the global options define are kept.
    pub fn merge_model_metadata(&self, metadata: &Options) -> Options {
        let mut merged = self.clone();
        for (key, value) in metadata.iter() {
            if keys::SHARED_DECODE_KEYS.contains(&key.as_str()) && self.has(key) {
                continue;
            }
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_get() {
        let mut options = Options::new();
        options.set("beam-size", 4usize);
        options.set("normalize", 0.6f32);
        options.set("model", vec!["a.npz", "b.npz"]);
        options.set("inference", true);

        assert_eq!(options.get::<usize>("beam-size").unwrap(), 4);
        assert!((options.get::<f32>("normalize").unwrap() - 0.6).abs() < 1e-6);
        assert_eq!(
            options.get::<Vec<String>>("model").unwrap(),
            vec!["a.npz".to_string(), "b.npz".to_string()]
        );
        assert!(options.get::<bool>("inference").unwrap());
    }

    #[test]
    fn test_integer_reads_as_float() {
        let mut options = Options::new();
        options.set("word-penalty", 0);
        assert_eq!(options.get::<f32>("word-penalty").unwrap(), 0.0);
    }

    #[test]
    fn test_missing_and_mistyped() {
        let mut options = Options::new();
        options.set("beam-size", "wide");

        assert!(matches!(
            options.get::<usize>("absent"),
            Err(DecodeError::MissingOption(key)) if key == "absent"
        ));
        assert!(matches!(
            options.get::<usize>("beam-size"),
            Err(DecodeError::Config { key, .. }) if key == "beam-size"
        ));
        // defaults only cover absence
        assert!(options.get_or::<usize>("beam-size", 3).is_err());
        assert_eq!(options.get_or::<usize>("absent", 3).unwrap(), 3);
    }

    #[test]
    fn test_negative_is_not_unsigned() {
        let mut options = Options::new();
        options.set("mkl-threads", -1);
        assert!(options.get::<usize>("mkl-threads").is_err());
        assert_eq!(options.get::<i64>("mkl-threads").unwrap(), -1);
    }

    #[test]
    fn test_set_returns_previous() {
        let mut options = Options::new();
        assert!(options.set("n-best", true).is_none());
        assert_eq!(options.set("n-best", false), Some(OptionValue::Bool(true)));
    }

    #[test]
    fn test_from_json() {
        let options =
            Options::from_json_str(r#"{"type": "bow", "dim-emb": 8, "dim-vocabs": [10, 12], "tied": false}"#)
                .unwrap();
        assert_eq!(options.get::<String>("type").unwrap(), "bow");
        assert_eq!(options.get::<usize>("dim-emb").unwrap(), 8);
        assert_eq!(options.get::<Vec<usize>>("dim-vocabs").unwrap(), vec![10, 12]);
        assert!(!options.get::<bool>("tied").unwrap());
    }

    #[test]
    fn test_from_block_yaml() {
        let text = "type: bow\ndim-emb: 4\ndim-vocabs:\n  - 10\n  - 12\ntied-embeddings: true\nlabel-smoothing: 0.1\n";
        let options = Options::from_yaml_str(text).unwrap();
        assert_eq!(options.get::<String>("type").unwrap(), "bow");
        assert_eq!(options.get::<usize>("dim-emb").unwrap(), 4);
        assert_eq!(options.get::<Vec<usize>>("dim-vocabs").unwrap(), vec![10, 12]);
        assert!(options.get::<bool>("tied-embeddings").unwrap());
        assert_eq!(options.get::<f32>("label-smoothing").unwrap(), 0.1);
    }

    #[test]
    fn test_yaml_accepts_flow_mapping() {
        let options = Options::from_yaml_str(r#"{"type": "bow", "dim-emb": 8}"#).unwrap();
        assert_eq!(options.get::<usize>("dim-emb").unwrap(), 8);
    }

    #[test]
    fn test_json_rejects_objects() {
        assert!(Options::from_json_str(r#"{"nested": {"a": 1}}"#).is_err());
    }

    #[test]
    fn test_merge_model_metadata() {
        let mut global = Options::new();
        global.set("beam-size", 6usize);
        global.set("normalize", 0);
        global.set("dim-emb", 512usize);

        let mut metadata = Options::new();
        metadata.set("beam-size", 2usize);
        metadata.set("dim-emb", 8usize);
        metadata.set("type", "bow");
        metadata.set("max-length-factor", 2.0f32);

        let merged = global.merge_model_metadata(&metadata);
        // shared decode-time keys stay global
        assert_eq!(merged.get::<usize>("beam-size").unwrap(), 6);
        // model keys come from the artifact
        assert_eq!(merged.get::<usize>("dim-emb").unwrap(), 8);
        assert_eq!(merged.get::<String>("type").unwrap(), "bow");
        // shared keys the global set lacks are filled from metadata
        assert_eq!(merged.get::<f32>("max-length-factor").unwrap(), 2.0);
    }
}
