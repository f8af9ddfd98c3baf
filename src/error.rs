use thiserror::Error;

/// Rejected path pattern in an exclude or include list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum PatternError {
    #[error("path pattern is empty")]
    Empty,
    #[error("path pattern {0:?} has no path component")]
    NoPathComponent(String),
}

/// A compiled directive that could not be turned into a glob matcher.
#[derive(Debug, Error)]
#[error("failed to compile filter pattern '{pattern}': {source}")]
pub(crate) struct PreviewError {
    pattern: String,
    #[source]
    source: globset::Error,
}

impl PreviewError {
    pub(crate) fn new(pattern: impl Into<String>, source: globset::Error) -> Self {
        Self {
            pattern: pattern.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::GlobBuilder;
    use std::error::Error as _;

    #[test]
    fn pattern_errors_name_the_offender() {
        assert_eq!(PatternError::Empty.to_string(), "path pattern is empty");
        let err = PatternError::NoPathComponent("//".into());
        assert!(err.to_string().contains("\"//\""));
    }

    #[test]
    fn preview_error_keeps_pattern_and_source() {
        let glob_err = GlobBuilder::new("[").build().unwrap_err();
        let err = PreviewError::new("[", glob_err.clone());

        assert!(err
            .to_string()
            .starts_with("failed to compile filter pattern '['"));
        assert_eq!(err.source().unwrap().to_string(), glob_err.to_string());
    }
}
