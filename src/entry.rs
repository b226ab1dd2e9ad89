//! Activity entries submitted for matching

use crate::factor::ScopeValue;
use crate::normalize::{normalize_scope, normalize_scope_text};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// One activity record: how much of something was consumed, in what unit,
/// under which scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionEntry {
    pub category: String,
    pub unit: String,
    pub scope: ScopeValue,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reasons an entry cannot be matched at all
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid entry: {}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl EmissionEntry {
    pub fn new(
        category: impl Into<String>,
        unit: impl Into<String>,
        scope: impl Into<ScopeValue>,
        quantity: f64,
    ) -> Self {
        Self {
            category: category.into(),
            unit: unit.into(),
            scope: scope.into(),
            quantity,
            date: None,
            description: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Checks the fields matching depends on. Date and description are
    /// informational and never rejected.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.category.trim().is_empty() {
            problems.push("category must be a non-empty string".to_string());
        }
        if self.unit.trim().is_empty() {
            problems.push("unit must be a non-empty string".to_string());
        }
        if normalize_scope(&self.scope).is_empty() {
            problems.push("scope must be present".to_string());
        }
        if !self.quantity.is_finite() {
            problems.push("quantity must be a finite number".to_string());
        } else if self.quantity < 0.0 {
            problems.push(format!("quantity must not be negative (got {})", self.quantity));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }

    /// Builds an entry from an untyped JSON object, reporting every problem
    /// found rather than stopping at the first.
    pub fn from_value(value: &Value) -> std::result::Result<Self, ValidationError> {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                return Err(ValidationError {
                    problems: vec!["entry must be a JSON object".to_string()],
                })
            }
        };

        let mut problems = Vec::new();

        let category = match obj.get("category") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => {
                problems.push("category must be a non-empty string".to_string());
                None
            }
        };

        let unit = match obj.get("unit") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => {
                problems.push("unit must be a non-empty string".to_string());
                None
            }
        };

        let scope = match obj.get("scope") {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(ScopeValue::Number(i)),
                None => Some(ScopeValue::Text(n.to_string())),
            },
            Some(Value::String(s)) if !normalize_scope_text(s).is_empty() => Some(ScopeValue::Text(s.clone())),
            _ => {
                problems.push("scope must be present (number or string)".to_string());
                None
            }
        };

        let quantity = match obj.get("quantity").and_then(Value::as_f64) {
            Some(q) if q.is_finite() && q >= 0.0 => Some(q),
            Some(q) => {
                problems.push(format!("quantity must be a non-negative number (got {})", q));
                None
            }
            None => {
                problems.push("quantity must be a number".to_string());
                None
            }
        };

        let date = obj.get("date").and_then(Value::as_str).and_then(|raw| {
            match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!("Ignoring unparseable entry date '{}': {}", raw, e);
                    None
                }
            }
        });

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (category, unit, scope, quantity) {
            (Some(category), Some(unit), Some(scope), Some(quantity)) if problems.is_empty() => {
                Ok(Self {
                    category,
                    unit,
                    scope,
                    quantity,
                    date,
                    description,
                })
            }
            _ => Err(ValidationError { problems }),
        }
    }
}
