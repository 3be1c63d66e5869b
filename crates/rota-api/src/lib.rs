//! Shared vocabulary for the operator shift sync layer.
//!
//! This crate holds the types every other crate speaks:
//! - `model` - stored records and the denormalized views published to consumers
//! - `rows` - raw joined rows as returned by the backing store
//! - `feed` - change-feed bindings, trigger signals and the `ChangeFeed` trait
//! - `ApiError` - the single error type crossing crate boundaries

use serde::{Deserialize, Serialize};

pub mod feed;
pub mod model;
pub mod rows;

pub use feed::{
    ChangeFeed, ChangeKind, ChangeSignal, ChannelSpec, FeedBinding, FeedSubscription, RowFilter,
    Table,
};
pub use model::{
    AssignedEvent, AssignedShift, Brand, Client, Event, NamedRef, Operator, OperatorId,
    OperatorStats, Shift, ShiftAssignment,
};
pub use rows::{AssignmentRow, Embedded, EventRow, NameRow, ShiftDateAssignmentRow, ShiftDateRow, ShiftRow};

/// Structured error types for store reads and feed subscriptions.
///
/// Store failures keep the store's own message as their display text so that
/// consumers can show it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Query {
        message: String,
        cause: Option<String>,
    },

    #[error("Failed to decode {relation} row: {message}")]
    Decode { relation: String, message: String },

    #[error("Channel {channel} unavailable: {message}")]
    ChannelUnavailable { channel: String, message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ApiError {
    pub fn query(message: impl Into<String>, cause: Option<String>) -> Self {
        ApiError::Query {
            message: message.into(),
            cause,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::InternalError {
            message: message.into(),
        }
    }

    /// The store's own message, if this error came from a store read.
    pub fn store_message(&self) -> Option<&str> {
        match self {
            ApiError::Query { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            ApiError::Query { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_displays_store_message() {
        let err = ApiError::query("network error", Some("connection reset".to_string()));
        assert_eq!(err.to_string(), "network error");
        assert_eq!(err.store_message(), Some("network error"));
        assert_eq!(err.cause(), Some("connection reset"));
    }

    #[test]
    fn test_non_store_errors_have_no_store_message() {
        let err = ApiError::Decode {
            relation: "shift_assignments".to_string(),
            message: "missing field `date`".to_string(),
        };
        assert_eq!(err.store_message(), None);
        assert!(err.to_string().contains("shift_assignments"));
    }

    #[test]
    fn test_api_error_serialization() {
        let errors = vec![
            ApiError::query("timeout", None),
            ApiError::Decode {
                relation: "shifts".to_string(),
                message: "bad row".to_string(),
            },
            ApiError::ChannelUnavailable {
                channel: "operator-shifts".to_string(),
                message: "closed".to_string(),
            },
            ApiError::internal("poisoned"),
        ];

        for error in errors {
            let json = serde_json::to_string(&error).expect("Failed to serialize error");
            let deserialized: ApiError =
                serde_json::from_str(&json).expect("Failed to deserialize error");
            assert_eq!(error, deserialized);
        }
    }
}
