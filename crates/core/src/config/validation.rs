use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read configuration file {path}: {source}")]
    FileSystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parsing {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Port number validator
pub struct PortValidator {
    pub field: &'static str,
}

impl ConfigValidator<u16> for PortValidator {
    fn validate(&self, value: &u16) -> Result<(), ConfigError> {
        if *value == 0 {
            return Err(ConfigError::invalid_value(
                self.field,
                value.to_string(),
                "port between 1 and 65535",
            ));
        }
        Ok(())
    }
}

/// Accepts one of a fixed set of values, case-sensitive
pub struct OneOfValidator {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
}

impl ConfigValidator<str> for OneOfValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if !self.allowed.contains(&value) {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                format!("one of: {}", self.allowed.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Plain SQL identifier: letters, digits and underscores, not starting with a digit.
///
/// Table names are interpolated into ledger SQL, so anything else is refused.
pub struct IdentifierValidator {
    pub field: &'static str,
}

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };

        if !valid || value.len() > 63 {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                "SQL identifier of at most 63 letters, digits or underscores",
            ));
        }
        Ok(())
    }
}
