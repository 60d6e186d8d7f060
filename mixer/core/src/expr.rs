//! The expression evaluation contract.
//!
//! Selectors and aspect inputs are written in an implementation-defined
//! expression language. The runtime only depends on the [`Evaluator`]
//! contract; [`IdentityEvaluator`] is a minimal implementation that treats an
//! expression as an attribute name or a literal.

use crate::attribute::{Bag, Value};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unresolved attribute {0}")]
    UnknownAttribute(String),

    #[error("expression {expr:?} evaluated to {found}, expected {expected}")]
    Type {
        expr: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid expression {expr:?}: {reason}")]
    Syntax { expr: String, reason: &'static str },

    #[error("{0}")]
    Eval(String),
}

/// Evaluates expressions against an attribute bag.
pub trait Evaluator: Send + Sync {
    fn eval(&self, expr: &str, attrs: &dyn Bag) -> Result<Value, Error>;

    fn eval_string(&self, expr: &str, attrs: &dyn Bag) -> Result<String, Error>;

    fn eval_predicate(&self, expr: &str, attrs: &dyn Bag) -> Result<bool, Error>;

    /// Ensures that the expression is syntactically valid.
    fn validate(&self, expr: &str) -> Result<(), Error>;
}

/// Resolves an expression as a literal or, failing that, as the name of an
/// attribute.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityEvaluator(());

// === impl IdentityEvaluator ===

impl IdentityEvaluator {
    pub fn new() -> Self {
        Self(())
    }

    fn literal(expr: &str) -> Result<Option<Value>, Error> {
        if expr == "true" || expr == "false" {
            return Ok(Some(Value::Bool(expr == "true")));
        }

        if let Some(rest) = expr.strip_prefix('"') {
            return match rest.strip_suffix('"') {
                Some(s) if !s.contains('"') => Ok(Some(Value::String(s.to_string()))),
                _ => Err(Error::Syntax {
                    expr: expr.to_string(),
                    reason: "unterminated string literal",
                }),
            };
        }

        if expr.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            return expr
                .parse::<i64>()
                .map(|i| Some(Value::Int64(i)))
                .map_err(|_| Error::Syntax {
                    expr: expr.to_string(),
                    reason: "invalid integer literal",
                });
        }

        Ok(None)
    }
}

impl Evaluator for IdentityEvaluator {
    fn eval(&self, expr: &str, attrs: &dyn Bag) -> Result<Value, Error> {
        let expr = expr.trim();
        if let Some(v) = Self::literal(expr)? {
            return Ok(v);
        }
        attrs
            .get(expr)
            .ok_or_else(|| Error::UnknownAttribute(expr.to_string()))
    }

    fn eval_string(&self, expr: &str, attrs: &dyn Bag) -> Result<String, Error> {
        match self.eval(expr, attrs)? {
            Value::String(s) => Ok(s),
            v => Ok(v.to_string()),
        }
    }

    fn eval_predicate(&self, expr: &str, attrs: &dyn Bag) -> Result<bool, Error> {
        match self.eval(expr, attrs)? {
            Value::Bool(b) => Ok(b),
            v => Err(Error::Type {
                expr: expr.to_string(),
                expected: "bool",
                found: format!("{:?}", v),
            }),
        }
    }

    fn validate(&self, expr: &str) -> Result<(), Error> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(Error::Syntax {
                expr: expr.to_string(),
                reason: "empty expression",
            });
        }
        if Self::literal(expr)?.is_some() {
            return Ok(());
        }
        if !expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
        {
            return Err(Error::Syntax {
                expr: expr.to_string(),
                reason: "attribute names are limited to letters, numbers, dots, dashes, \
                         underscores, and slashes",
            });
        }
        Ok(())
    }
}
