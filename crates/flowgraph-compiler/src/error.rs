use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Info,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
  pub severity: Severity,
  pub message: String,
}

impl ValidationIssue {
  pub fn error(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Error,
      message: message.into(),
    }
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      message: message.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("compilation aborted with {} validation error(s)", .0.iter().filter(|i| i.severity == Severity::Error).count())]
  Aborted(Vec<ValidationIssue>),
}
