use thiserror::Error;

/// Decoded entry from the instrument's error queue.
///
/// `code` is the number the meter reported for this occurrence, which is
/// why it may differ from the catalog entry's stored code across
/// firmware revisions. `summary` is either the catalog message or, for
/// uncataloged errors, the raw message text; `detail` is the operator
/// guidance from the manual and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub code: i32,
    pub summary: String,
    pub detail: String,
}

impl std::fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.summary, self.code)?;
        if !self.detail.is_empty() {
            write!(f, "\n{}", self.detail)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ScpiError {
    #[error("communication failure: {0}")]
    Communication(#[from] std::io::Error),
    #[error("malformed reply: {line:?}")]
    Parse { line: String },
    #[error("instrument reported an error: {0}")]
    Device(DiagnosticReport),
}

impl ScpiError {
    /// The decoded report, when the instrument itself reported the error.
    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            ScpiError::Device(report) => Some(report),
            _ => None,
        }
    }
}
