//! Typed access to a plugin's free-form configuration map.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// A plugin configuration map as sent by the host.
pub type ConfigMap = Map<String, Value>;

/// Typed getters over a [`ConfigMap`].
///
/// Every getter takes an explicit default. The `*_or_env` variants consult a
/// chain of environment variables when the key is absent from the map, in
/// order, before falling back to the default:
///
/// ```
/// use cadence_plugin::{ConfigAccessor, ConfigMap};
/// use std::collections::HashMap;
///
/// let config = ConfigMap::new();
/// let env = HashMap::from([("GH_TOKEN".to_string(), "secret".to_string())]);
/// let accessor = ConfigAccessor::new(&config).with_environment(&env);
///
/// let token = accessor.get_string_or_env("token", &["GITHUB_TOKEN", "GH_TOKEN"], "");
/// assert_eq!(token, "secret");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConfigAccessor<'a> {
    config: &'a ConfigMap,
    environment: Option<&'a HashMap<String, String>>,
}

impl<'a> ConfigAccessor<'a> {
    /// Creates an accessor reading the process environment for fallbacks.
    #[must_use]
    pub fn new(config: &'a ConfigMap) -> Self {
        Self {
            config,
            environment: None,
        }
    }

    /// Uses the given map instead of the process environment for fallbacks.
    #[must_use]
    pub fn with_environment(mut self, environment: &'a HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    fn env(&self, name: &str) -> Option<String> {
        match self.environment {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
        .filter(|value| !value.is_empty())
    }

    fn env_chain(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.env(name))
    }

    /// Returns true if the key is present and not null.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.config.get(key).is_some_and(|value| !value.is_null())
    }

    /// Returns a string value.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.string_value(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Returns a string value, falling back to the environment chain.
    #[must_use]
    pub fn get_string_or_env(&self, key: &str, env: &[&str], default: &str) -> String {
        self.string_value(key)
            .or_else(|| self.env_chain(env))
            .unwrap_or_else(|| default.to_string())
    }

    fn string_value(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns a boolean value.
    ///
    /// Strings `true`/`yes`/`1` and `false`/`no`/`0` are accepted.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.bool_value(key).unwrap_or(default)
    }

    /// Returns a boolean value, falling back to the environment chain.
    #[must_use]
    pub fn get_bool_or_env(&self, key: &str, env: &[&str], default: bool) -> bool {
        self.bool_value(key)
            .or_else(|| self.env_chain(env).and_then(|s| parse_bool(&s)))
            .unwrap_or(default)
    }

    fn bool_value(&self, key: &str) -> Option<bool> {
        match self.config.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_bool(s),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    /// Returns an integer value.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.int_value(key).unwrap_or(default)
    }

    /// Returns an integer value, falling back to the environment chain.
    #[must_use]
    pub fn get_int_or_env(&self, key: &str, env: &[&str], default: i64) -> i64 {
        self.int_value(key)
            .or_else(|| self.env_chain(env).and_then(|s| s.trim().parse().ok()))
            .unwrap_or(default)
    }

    fn int_value(&self, key: &str) -> Option<i64> {
        match self.config.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns a float value.
    #[must_use]
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.float_value(key).unwrap_or(default)
    }

    /// Returns a float value, falling back to the environment chain.
    #[must_use]
    pub fn get_float_or_env(&self, key: &str, env: &[&str], default: f64) -> f64 {
        self.float_value(key)
            .or_else(|| self.env_chain(env).and_then(|s| s.trim().parse().ok()))
            .unwrap_or(default)
    }

    fn float_value(&self, key: &str) -> Option<f64> {
        match self.config.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns a list of strings.
    ///
    /// Non-string elements are skipped; a single string becomes a one-element
    /// list.
    #[must_use]
    pub fn get_string_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.config.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => default.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Returns a nested map, or an empty map when absent.
    #[must_use]
    pub fn get_map(&self, key: &str) -> ConfigMap {
        match self.config.get(key) {
            Some(Value::Object(map)) => map.clone(),
            _ => ConfigMap::new(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ConfigMap {
        match json!({
            "name": "cadence",
            "count": 3,
            "ratio": 0.5,
            "enabled": true,
            "quoted_bool": "yes",
            "quoted_int": "42",
            "tags": ["a", "b", 7],
            "single": "solo",
            "nested": {"key": "value"},
            "nothing": null
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([
            ("FIRST".to_string(), String::new()),
            ("SECOND".to_string(), "from-env".to_string()),
            ("FLAG".to_string(), "false".to_string()),
            ("NUM".to_string(), "9".to_string()),
            ("FLOAT".to_string(), "1.5".to_string()),
        ])
    }

    #[test]
    fn test_get_string() {
        let cfg = config();
        let accessor = ConfigAccessor::new(&cfg);
        assert_eq!(accessor.get_string("name", "x"), "cadence");
        assert_eq!(accessor.get_string("count", "x"), "3");
        assert_eq!(accessor.get_string("missing", "fallback"), "fallback");
        assert_eq!(accessor.get_string("nested", "fallback"), "fallback");
    }

    #[test]
    fn test_get_string_or_env_skips_empty_values() {
        let cfg = config();
        let env = env();
        let accessor = ConfigAccessor::new(&cfg).with_environment(&env);
        assert_eq!(
            accessor.get_string_or_env("missing", &["FIRST", "SECOND"], "d"),
            "from-env"
        );
        assert_eq!(accessor.get_string_or_env("name", &["SECOND"], "d"), "cadence");
        assert_eq!(accessor.get_string_or_env("missing", &["NOPE"], "d"), "d");
    }

    #[test]
    fn test_get_bool() {
        let cfg = config();
        let env = env();
        let accessor = ConfigAccessor::new(&cfg).with_environment(&env);
        assert!(accessor.get_bool("enabled", false));
        assert!(accessor.get_bool("quoted_bool", false));
        assert!(accessor.get_bool("missing", true));
        assert!(!accessor.get_bool_or_env("missing", &["FLAG"], true));
    }

    #[test]
    fn test_get_int() {
        let cfg = config();
        let env = env();
        let accessor = ConfigAccessor::new(&cfg).with_environment(&env);
        assert_eq!(accessor.get_int("count", 0), 3);
        assert_eq!(accessor.get_int("quoted_int", 0), 42);
        assert_eq!(accessor.get_int("name", 7), 7);
        assert_eq!(accessor.get_int_or_env("missing", &["NUM"], 0), 9);
    }

    #[test]
    fn test_get_float() {
        let cfg = config();
        let env = env();
        let accessor = ConfigAccessor::new(&cfg).with_environment(&env);
        assert!((accessor.get_float("ratio", 0.0) - 0.5).abs() < f64::EPSILON);
        assert!((accessor.get_float("count", 0.0) - 3.0).abs() < f64::EPSILON);
        assert!((accessor.get_float_or_env("missing", &["FLOAT"], 0.0) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_string_list() {
        let cfg = config();
        let accessor = ConfigAccessor::new(&cfg);
        assert_eq!(accessor.get_string_list("tags", &[]), vec!["a", "b"]);
        assert_eq!(accessor.get_string_list("single", &[]), vec!["solo"]);
        assert_eq!(accessor.get_string_list("missing", &["d"]), vec!["d"]);
    }

    #[test]
    fn test_get_map() {
        let cfg = config();
        let accessor = ConfigAccessor::new(&cfg);
        assert_eq!(accessor.get_map("nested")["key"], "value");
        assert!(accessor.get_map("name").is_empty());
    }

    #[test]
    fn test_contains() {
        let cfg = config();
        let accessor = ConfigAccessor::new(&cfg);
        assert!(accessor.contains("name"));
        assert!(!accessor.contains("nothing"));
        assert!(!accessor.contains("missing"));
    }
}
