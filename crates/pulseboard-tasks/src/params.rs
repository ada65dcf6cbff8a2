//! Typed view over raw task parameters.
//!
//! Each check declares its defaults once; accessors then coerce the raw value,
//! falling back to the declared default when the key is absent or mistyped.
//! A key without a default is required, and its absence is a [`ParamError`].

use serde_json::Value;

use crate::error::ParamError;
use crate::task::Params;

/// Declared `{key: default}` contract of a check
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    values: Params,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a default for `key`
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

/// Parameters resolved against a check's defaults
#[derive(Debug, Clone)]
pub struct ResolvedParams<'a> {
    raw: &'a Params,
    defaults: Defaults,
}

impl<'a> ResolvedParams<'a> {
    pub fn new(raw: &'a Params, defaults: Defaults) -> Self {
        Self { raw, defaults }
    }

    pub fn string(&self, key: &str) -> Result<String, ParamError> {
        self.resolve(key, "string", as_string)
    }

    /// Like [`string`](Self::string) but an empty value counts as missing
    pub fn non_empty_string(&self, key: &str) -> Result<String, ParamError> {
        self.resolve(key, "string", |value| as_string(value).filter(|s| !s.is_empty()))
    }

    pub fn int(&self, key: &str) -> Result<i64, ParamError> {
        self.resolve(key, "integer", as_int)
    }

    pub fn ints(&self, key: &str) -> Result<Vec<i64>, ParamError> {
        self.resolve(key, "integer list", |value| match value {
            Value::Array(items) => items.iter().map(as_int).collect(),
            other => as_int(other).map(|n| vec![n]),
        })
    }

    pub fn strings(&self, key: &str) -> Result<Vec<String>, ParamError> {
        self.resolve(key, "string list", |value| match value {
            Value::Array(items) => items.iter().map(as_string).collect(),
            other => as_string(other).map(|s| vec![s]),
        })
    }

    /// Whether the caller supplied `key` at all
    pub fn contains(&self, key: &str) -> bool {
        self.raw.contains_key(key)
    }

    fn resolve<T>(
        &self,
        key: &str,
        expected: &'static str,
        coerce: impl Fn(&Value) -> Option<T>,
    ) -> Result<T, ParamError> {
        if let Some(value) = self.raw.get(key).and_then(&coerce) {
            return Ok(value);
        }

        match self.defaults.values.get(key) {
            Some(default) => {
                coerce(default).ok_or(ParamError::Invalid { key: key.to_string(), expected })
            }
            None if self.raw.contains_key(key) => {
                Err(ParamError::Invalid { key: key.to_string(), expected })
            }
            None => Err(ParamError::Missing(key.to_string())),
        }
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whole floats such as `3.0` only; fractional or out-of-range values are mistyped
fn integral(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}
