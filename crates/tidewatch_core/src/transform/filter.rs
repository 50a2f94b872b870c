//! Filter/projection expressions applied to structured payloads.
//!
//! Expressions are JSONPath queries, compiled once when the owning source
//! spec is built. Only the first value a query produces is kept.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::error::TransformError;

/// A compiled JSONPath expression plus its original text.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilterExpr {
    expression: String,
    path: Arc<JsonPath>,
}

impl FilterExpr {
    pub fn parse(expression: impl Into<String>) -> Result<Self, TransformError> {
        let expression = expression.into();
        let path =
            JsonPath::parse(&expression).map_err(|e| TransformError::InvalidExpression {
                expression: expression.clone(),
                cause: e.to_string(),
            })?;
        Ok(Self {
            expression,
            path: Arc::new(path),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// First value produced by the query, if any.
    pub fn first(&self, input: &Value) -> Option<Value> {
        self.path.query(input).first().cloned()
    }
}

impl fmt::Debug for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilterExpr").field(&self.expression).finish()
    }
}

impl PartialEq for FilterExpr {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl TryFrom<String> for FilterExpr {
    type Error = TransformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FilterExpr> for String {
    fn from(value: FilterExpr) -> Self {
        value.expression
    }
}
