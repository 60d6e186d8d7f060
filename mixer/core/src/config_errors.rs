use std::fmt;

/// A single configuration problem, attributed to a field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

/// An ordered collection of configuration problems.
///
/// An empty collection means the configuration is valid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigErrors {
    errors: Vec<ConfigError>,
}

// === impl ConfigError ===

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// === impl ConfigErrors ===

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, field: impl Into<String>, error: impl fmt::Display) -> &mut Self {
        self.errors.push(ConfigError {
            field: field.into(),
            message: error.to_string(),
        });
        self
    }

    /// Appends all errors from `other`, prefixing their fields with `prefix`.
    pub fn extend(&mut self, prefix: &str, other: ConfigErrors) -> &mut Self {
        for ConfigError { field, message } in other.errors {
            let field = match (prefix.is_empty(), field.is_empty()) {
                (true, _) => field,
                (false, true) => prefix.to_string(),
                (false, false) => format!("{}.{}", prefix, field),
            };
            self.errors.push(ConfigError { field, message });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.errors.iter()
    }

    /// Returns `Err(self)` when any error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => f.write_str("no configuration errors"),
            1 => self.errors[0].fmt(f),
            n => {
                write!(f, "{} configuration errors: ", n)?;
                for (i, e) in self.errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    e.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigErrors {}

impl<'a> IntoIterator for &'a ConfigErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
