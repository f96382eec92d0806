//! Declarative validation over stored values.
//!
//! # Responsibilities
//! - Check presence, numeric bounds, patterns and custom predicates per key
//! - Derive rules from schema rule expressions
//!
//! # Design Decisions
//! - Returns all violations, not just the first
//! - Each rule kind contributes at most one message per key
//! - A missing required key skips that key's remaining checks only
//!
//! # Rule Grammar
//! ```text
//! required,min=1,max=65535,pattern=^[a-z]+$
//! ```
//! `pattern=` (or `regex=`) takes the rest of the expression, commas included.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::config::error::{FieldError, ValidationError};
use crate::config::schema::{shared_descriptor, Schema};
use crate::config::store::Config;
use crate::observability::metrics;
use crate::value::{coerce, FlatMap, Value};

/// Custom check; the error string becomes the violation message.
pub type Predicate = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Constraints for one key.
#[derive(Clone, Default)]
pub struct Rule {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub custom: Option<Predicate>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(predicate));
        self
    }

    /// Parse a rule expression such as `required,min=1,max=10`.
    ///
    /// Unknown tokens and unparsable bounds are logged and skipped.
    pub fn parse(expression: &str) -> Self {
        let mut rule = Rule::default();
        let mut rest = expression;
        while !rest.is_empty() {
            let token = rest.trim_start();
            if let Some(pattern) = token
                .strip_prefix("pattern=")
                .or_else(|| token.strip_prefix("regex="))
            {
                rule.pattern = Some(pattern.to_string());
                break;
            }

            let (part, tail) = token.split_once(',').unwrap_or((token, ""));
            rest = tail;
            let part = part.trim();
            if part == "required" {
                rule.required = true;
            } else if let Some(n) = part.strip_prefix("min=") {
                rule.min = parse_bound(expression, "min", n).or(rule.min);
            } else if let Some(n) = part.strip_prefix("max=") {
                rule.max = parse_bound(expression, "max", n).or(rule.max);
            } else if !part.is_empty() {
                tracing::warn!(expression, token = part, "Unknown validation token ignored");
            }
        }
        rule
    }

    fn check(&self, key: &str, value: Option<&Value>, errors: &mut Vec<FieldError>) {
        let Some(value) = value else {
            if self.required {
                errors.push(FieldError::new(key, "required"));
            }
            return;
        };

        if self.min.is_some() || self.max.is_some() {
            match coerce::to_f64(value) {
                Err(e) => errors.push(FieldError::new(key, format!("cannot convert to number: {}", e))),
                Ok(n) => {
                    if let Some(min) = self.min.filter(|min| n < *min) {
                        errors.push(FieldError::new(key, format!("value {} is less than min {}", n, min)));
                    }
                    if let Some(max) = self.max.filter(|max| n > *max) {
                        errors.push(FieldError::new(key, format!("value {} is greater than max {}", n, max)));
                    }
                }
            }
        }

        if let Some(pattern) = &self.pattern {
            let rendered = value.to_string();
            match Regex::new(pattern) {
                Err(e) => errors.push(FieldError::new(key, format!("invalid pattern: {}", e))),
                Ok(re) if !re.is_match(&rendered) => errors.push(FieldError::new(
                    key,
                    format!("value {:?} does not match pattern {:?}", rendered, pattern),
                )),
                Ok(_) => {}
            }
        }

        if let Some(custom) = &self.custom {
            if let Err(message) = custom(value) {
                errors.push(FieldError::new(key, message));
            }
        }
    }
}

fn parse_bound(expression: &str, name: &str, text: &str) -> Option<f64> {
    match text.trim().parse::<f64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(expression, bound = name, value = text, "Unparsable bound ignored");
            None
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("required", &self.required)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("pattern", &self.pattern)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Ordered rule set keyed by configuration key.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    entries: Vec<(String, Rule)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any earlier rule for the same key.
    pub fn rule(mut self, key: impl Into<String>, rule: Rule) -> Self {
        self.insert(key, rule);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, rule: Rule) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = rule,
            None => self.entries.push((key, rule)),
        }
    }

    /// Rules from the rule expressions of a schema's fields.
    pub fn from_schema<T: Schema>() -> Self {
        let mut rules = Rules::new();
        for field in shared_descriptor::<T>().fields() {
            if let Some(expression) = field.rules() {
                rules.insert(field.key(), Rule::parse(expression));
            }
        }
        rules
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    /// Evaluate every rule against `data`.
    pub fn check(&self, data: &FlatMap) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        for (key, rule) in &self.entries {
            rule.check(key, data.get(key), &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }
}

impl Config {
    /// Validate the current snapshot against `rules`.
    ///
    /// # Errors
    ///
    /// One [`ValidationError`] holding every violation found.
    pub fn validate(&self, rules: &Rules) -> Result<(), ValidationError> {
        let result = rules.check(&self.current());
        if let Err(e) = &result {
            metrics::record_validation_failures(e.len());
            tracing::debug!(violations = e.len(), "Validation failed");
        }
        result
    }

    /// Validate using the rule expressions declared on `T`'s schema.
    pub fn validate_schema<T: Schema>(&self) -> Result<(), ValidationError> {
        self.validate(&Rules::from_schema::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Descriptor;
    use crate::table;

    fn config(values: crate::value::Table) -> Config {
        let config = Config::builder().with_defaults(values).build();
        config.reload().unwrap();
        config
    }

    #[test]
    fn test_required_missing() {
        let err = config(table! {})
            .validate(&Rules::new().rule("server.port", Rule::new().required()))
            .unwrap_err();
        assert_eq!(err.errors, vec![FieldError::new("server.port", "required")]);
    }

    #[test]
    fn test_aggregates_across_keys() {
        let rules = Rules::new()
            .rule("a", Rule::new().required())
            .rule("b", Rule::new().max(10.0));
        let err = config(table! { "b" => 11 }).validate(&rules).unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(err.errors[0].field, "a");
        assert_eq!(err.errors[1].field, "b");
    }

    #[test]
    fn test_one_message_per_rule_kind() {
        let rules = Rules::new().rule(
            "port",
            Rule::new()
                .min(100.0)
                .pattern("^9")
                .custom(|_| Err("rejected".to_string())),
        );
        let err = config(table! { "port" => 80 }).validate(&rules).unwrap_err();
        let messages: Vec<&str> = err.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "value 80 is less than min 100",
                "value \"80\" does not match pattern \"^9\"",
                "rejected",
            ]
        );
    }

    #[test]
    fn test_bounds_need_numbers() {
        let rules = Rules::new().rule("flag", Rule::new().min(0.0));
        let err = config(table! { "flag" => true }).validate(&rules).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.errors[0].message.starts_with("cannot convert to number"));
    }

    #[test]
    fn test_numeric_strings_pass_bounds() {
        let rules = Rules::new().rule("port", Rule::new().required().min(1.0).max(65535.0));
        assert!(config(table! { "port" => "8080" }).validate(&rules).is_ok());
    }

    #[test]
    fn test_optional_absent_key_passes() {
        let rules = Rules::new().rule("maybe", Rule::new().min(1.0).pattern("x"));
        assert!(config(table! {}).validate(&rules).is_ok());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let rules = Rules::new().rule("name", Rule::new().pattern("("));
        let err = config(table! { "name" => "x" }).validate(&rules).unwrap_err();
        assert!(err.errors[0].message.starts_with("invalid pattern"));
    }

    #[test]
    fn test_parse_grammar() {
        let rule = Rule::parse("required, min=1,max=65535");
        assert!(rule.required);
        assert_eq!(rule.min, Some(1.0));
        assert_eq!(rule.max, Some(65535.0));
        assert!(rule.pattern.is_none());

        let rule = Rule::parse("required,pattern=^[a-z]{1,3}$");
        assert!(rule.required);
        assert_eq!(rule.pattern.as_deref(), Some("^[a-z]{1,3}$"));

        let rule = Rule::parse("regex=^x,y$");
        assert_eq!(rule.pattern.as_deref(), Some("^x,y$"));

        let rule = Rule::parse("min=abc,bogus,max=2");
        assert_eq!(rule.min, None);
        assert_eq!(rule.max, Some(2.0));
    }

    #[test]
    fn test_rules_replace_same_key() {
        let rules = Rules::new()
            .rule("a", Rule::new().required())
            .rule("a", Rule::new().min(1.0));
        assert_eq!(rules.len(), 1);
        assert!(!rules.get("a").unwrap().required);
    }

    #[derive(Debug, Default)]
    struct Database {
        host: String,
        port: u16,
        name: String,
        password: String,
    }

    impl Schema for Database {
        fn describe(d: &mut Descriptor<Self>) {
            d.field("host", "database.host", |c| &mut c.host)
                .default("localhost")
                .validate("required");
            d.field("port", "database.port", |c| &mut c.port)
                .default("5432")
                .validate("required,min=1,max=65535");
            d.field("name", "database.name", |c| &mut c.name).validate("required");
            d.field("password", "database.password", |c| &mut c.password).default("secret");
        }
    }

    #[test]
    fn test_rules_from_schema() {
        let rules = Rules::from_schema::<Database>();
        assert_eq!(rules.len(), 3);
        assert!(rules.get("database.password").is_none());
        assert_eq!(rules.get("database.port").unwrap().max, Some(65535.0));
    }

    #[test]
    fn test_validate_schema() {
        let err = config(table! { "database.port" => 0 })
            .validate_schema::<Database>()
            .unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["database.host", "database.port", "database.name"]);

        let ok = config(table! {
            "database.host" => "db",
            "database.port" => 5432,
            "database.name" => "app",
        });
        assert!(ok.validate_schema::<Database>().is_ok());
    }
}
