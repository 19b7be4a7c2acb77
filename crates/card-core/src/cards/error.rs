use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::InvalidAddressError;
use super::domain::{CardReference, CardStatus, Eligibility, ReplacementReason};
use super::task_group::Cancelled;

/// Status class shared by collaborator and core errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    PermissionDenied,
    NotFound,
    Unavailable,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned by a downstream collaborator, carrying its machine-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({reason})")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub reason: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, reason, message)
    }

    pub fn unavailable(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, reason, message)
    }

    pub fn permission_denied(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, reason, message)
    }
}

/// Error raised by card operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CardError {
    #[error("{operation} failed during {step}: {source}")]
    Downstream {
        operation: &'static str,
        step: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("card replacement for reason {0} is currently disabled")]
    ReasonDisabled(ReplacementReason),
    #[error("entitled card has no linked accounts")]
    MissingAccounts,
    #[error("card is not eligible for {0:?}")]
    NotEligible(Eligibility),
    #[error("card is not available")]
    CardNotVisible,
    #[error("status change {from:?} -> {to:?} is not allowed")]
    IllegalTransition { from: CardStatus, to: CardStatus },
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressError),
    #[error("no deliverable mailing address on file")]
    NoMailingAddress,
    #[error("card cannot be replaced as lost or stolen on the day its account was opened")]
    SameDayReplacement,
    #[error("request was cancelled")]
    Cancelled,
    #[error("unexpected downstream payload: {0}")]
    UnexpectedPayload(String),
    /// The replacement card exists but a later step failed; retrying resumes
    /// from the existing replacement.
    #[error("replacement card {new_card} was issued but the workflow did not finish: {source}")]
    IncompleteReplacement {
        new_card: CardReference,
        #[source]
        source: Box<CardError>,
    },
}

impl CardError {
    pub fn downstream(
        operation: &'static str,
        step: &'static str,
    ) -> impl FnOnce(GatewayError) -> CardError {
        move |source| CardError::Downstream {
            operation,
            step,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CardError::Downstream { source, .. } => source.kind,
            CardError::ReasonDisabled(_)
            | CardError::InvalidAddress(_)
            | CardError::NoMailingAddress => ErrorKind::InvalidArgument,
            CardError::NotEligible(_) | CardError::IllegalTransition { .. } => {
                ErrorKind::PermissionDenied
            }
            CardError::CardNotVisible => ErrorKind::NotFound,
            CardError::Cancelled => ErrorKind::Unavailable,
            CardError::SameDayReplacement => ErrorKind::Conflict,
            CardError::MissingAccounts | CardError::UnexpectedPayload(_) => ErrorKind::Internal,
            CardError::IncompleteReplacement { source, .. } => source.kind(),
        }
    }

    /// Stable machine-readable reason. Downstream reasons are passed through.
    pub fn reason_code(&self) -> &str {
        match self {
            CardError::Downstream { source, .. } => &source.reason,
            CardError::ReasonDisabled(_) => "REPLACEMENT_REASON_DISABLED",
            CardError::MissingAccounts => "CARD_HAS_NO_ACCOUNTS",
            CardError::NotEligible(_) => "NOT_ELIGIBLE",
            CardError::CardNotVisible => "CARD_NOT_FOUND",
            CardError::IllegalTransition { .. } => "ILLEGAL_STATUS_TRANSITION",
            CardError::InvalidAddress(_) | CardError::NoMailingAddress => "INVALID_ADDRESS",
            CardError::SameDayReplacement => "SAME_DAY_REPLACEMENT_NOT_ALLOWED",
            CardError::Cancelled => "REQUEST_CANCELLED",
            CardError::UnexpectedPayload(_) => "UNEXPECTED_PAYLOAD",
            CardError::IncompleteReplacement { source, .. } => source.reason_code(),
        }
    }

    /// Message safe to return to a caller. Downstream messages are never
    /// echoed; only the failing step and its reason code are.
    pub fn public_message(&self) -> String {
        if self.kind() == ErrorKind::Internal {
            return "internal error".to_string();
        }
        match self {
            CardError::Downstream {
                operation,
                step,
                source,
            } => format!("{operation} failed during {step} ({})", source.reason),
            CardError::IncompleteReplacement { new_card, source } => format!(
                "replacement card {new_card} was issued but the workflow did not finish: {}",
                source.public_message()
            ),
            other => other.to_string(),
        }
    }

    pub fn view(&self) -> ErrorView {
        ErrorView {
            status: self.kind(),
            reason: self.reason_code().to_string(),
            message: self.public_message(),
        }
    }
}

impl From<Cancelled> for CardError {
    fn from(_: Cancelled) -> Self {
        CardError::Cancelled
    }
}

impl From<tokio::task::JoinError> for CardError {
    fn from(value: tokio::task::JoinError) -> Self {
        CardError::UnexpectedPayload(format!("concurrent task aborted: {value}"))
    }
}

/// Structured error body returned to callers and recorded in audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorView {
    pub status: ErrorKind,
    pub reason: String,
    pub message: String,
}
