/// Domain errors raised before a conversion is launched.
///
/// Failures that happen after launch are not errors in this sense: they are
/// reported as a [`TerminalOutcome`](crate::outcome::TerminalOutcome).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
