// Error taxonomy for the normalization engine.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the parsers, the payout expander and the salary
/// resolver. Every variant is scoped to a single row, contest or file so the
/// batch driver can log it and move on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("contest {contest_id}: malformed payout range `{key}`")]
    MalformedPayoutRange { contest_id: String, key: String },

    #[error("contest {contest_id}: salary group cannot be resolved ({reason})")]
    UnresolvableSalaryGroup { contest_id: String, reason: String },

    #[error("missing source file: {}", path.display())]
    MissingSourceFile { path: PathBuf },

    #[error("malformed lineup row: leading token `{token}` is not a roster position in `{lineup}`")]
    MalformedLineupRow { token: String, lineup: String },

    #[error("contest {contest_id}: malformed `{field}` in contest detail: {message}")]
    MalformedContestDetail {
        contest_id: String,
        field: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
