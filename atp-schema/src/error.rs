//! Errors raised by the schema engine

use thiserror::Error;

/// Underlying cause attached to a schema error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// Schema errors
///
/// Validation and compatibility failures carry the path of the offending
/// field, outermost segment first.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The data violated a constraint of the schema
    #[error("Validation failed for '{}': {}{}", join_path(.path), .message, cause_suffix(.cause))]
    Constraint {
        path: Vec<String>,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// A schema is not an acceptable substitute for another one
    #[error("Compatibility check failed for '{}': {}{}", join_path(.path), .message, cause_suffix(.cause))]
    Compatibility {
        path: Vec<String>,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// The schema itself was built incorrectly
    #[error("{}{}", .message, cause_suffix(.cause))]
    BadArgument {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// The plugin does not declare the requested step
    #[error("No such step: {step}")]
    NoSuchStep { step: String },
}

impl SchemaError {
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            path: Vec::new(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn compatibility(message: impl Into<String>) -> Self {
        Self::Compatibility {
            path: Vec::new(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument {
            message: message.into(),
            cause: None,
        }
    }

    pub fn no_such_step(step: impl Into<String>) -> Self {
        Self::NoSuchStep { step: step.into() }
    }

    /// Attach an underlying cause
    pub fn with_cause(mut self, source: impl Into<BoxError>) -> Self {
        match &mut self {
            Self::Constraint { cause, .. }
            | Self::Compatibility { cause, .. }
            | Self::BadArgument { cause, .. } => *cause = Some(source.into()),
            Self::NoSuchStep { .. } => {}
        }
        self
    }

    /// Prefix the path with a segment as the error leaves a container
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        if let Self::Constraint { path, .. } | Self::Compatibility { path, .. } = &mut self {
            path.insert(0, segment.into());
        }
        self
    }

    /// Path of the offending field, empty for errors without one
    pub fn path(&self) -> &[String] {
        match self {
            Self::Constraint { path, .. } | Self::Compatibility { path, .. } => path,
            _ => &[],
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }

    pub fn is_compatibility(&self) -> bool {
        matches!(self, Self::Compatibility { .. })
    }

    pub fn is_bad_argument(&self) -> bool {
        matches!(self, Self::BadArgument { .. })
    }
}

fn join_path(path: &[String]) -> String {
    path.join("' -> '")
}

fn cause_suffix(cause: &Option<BoxError>) -> String {
    match cause {
        Some(cause) => format!(" ({cause})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_message_contains_path_and_cause() {
        let err = SchemaError::constraint("Must be a string")
            .with_cause(SchemaError::bad_argument("inner"))
            .at("c")
            .at("b");

        assert_eq!(err.path(), ["b".to_string(), "c".to_string()]);
        assert_eq!(
            err.to_string(),
            "Validation failed for 'b' -> 'c': Must be a string (inner)"
        );
    }

    #[test]
    fn bad_argument_has_no_path() {
        let err = SchemaError::bad_argument("unbound ref").at("ignored");
        assert!(err.path().is_empty());
        assert!(err.is_bad_argument());
        assert_eq!(err.to_string(), "unbound ref");
    }
}
