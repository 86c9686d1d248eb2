use std::fmt;

pub const TOP_LEVEL_PREFIX: &str = "Top-level error: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { label: String },
    Failure(Failure),
}

/// A record that could not be verified.
///
/// `context` is the human label written to the log. `subject` carries the
/// same identity in structured form for enrichers that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub context: String,
    pub message: String,
    pub subject: Option<FailureSubject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSubject {
    DeployKey {
        id: i64,
        title: String,
        projects: Vec<String>,
    },
}

impl Outcome {
    pub fn success(label: impl Into<String>) -> Self {
        Outcome::Success { label: label.into() }
    }

    pub fn failure(context: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Failure(Failure::new(context, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl Failure {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            subject: None,
        }
    }

    /// Failure raised past a checker or a record source.
    pub fn top_level(context: impl Into<String>, err: &dyn fmt::Display) -> Self {
        Self::new(context, format!("{TOP_LEVEL_PREFIX}{err}"))
    }

    pub fn with_subject(mut self, subject: FailureSubject) -> Self {
        self.subject = Some(subject);
        self
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Outcome::Failure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;

    #[test]
    fn test_success_and_failure_constructors() {
        assert!(Outcome::success("Runner ID 1").is_success());
        let outcome = Outcome::failure("Runner ID 2", "decryption error: value is missing");
        assert!(!outcome.is_success());
        match outcome {
            Outcome::Failure(f) => {
                assert_eq!(f.context, "Runner ID 2");
                assert!(f.subject.is_none());
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_top_level_message() {
        let err = AuditError::Source("relation \"ci_variables\" does not exist".into());
        let failure = Failure::top_level("Checking CI/CD Project Variables", &err);
        assert_eq!(
            failure.message,
            "Top-level error: Record source error: relation \"ci_variables\" does not exist"
        );
    }

    #[test]
    fn test_with_subject() {
        let failure = Failure::new("ctx", "msg").with_subject(FailureSubject::DeployKey {
            id: 9,
            title: "ci".into(),
            projects: vec!["a/b".into()],
        });
        assert!(matches!(failure.subject, Some(FailureSubject::DeployKey { id: 9, .. })));
    }
}
