//! Results of a send.

use crate::error::{ErrorKind, MailError, Result};

/// What the server said about one envelope recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    /// Envelope address.
    pub address: String,
    /// True if RCPT TO was accepted.
    pub accepted: bool,
    /// Server reply text for a rejection; empty when accepted.
    pub detail: String,
    /// Reply code for a rejection.
    pub code: Option<u16>,
}

impl RecipientOutcome {
    /// An accepted recipient.
    #[must_use]
    pub fn accepted(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            accepted: true,
            detail: String::new(),
            code: None,
        }
    }

    /// A rejected recipient.
    #[must_use]
    pub fn rejected(address: impl Into<String>, detail: impl Into<String>, code: Option<u16>) -> Self {
        Self {
            address: address.into(),
            accepted: false,
            detail: detail.into(),
            code,
        }
    }
}

/// Why one host was given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    /// Host as configured.
    pub host: String,
    /// Port that was tried.
    pub port: u16,
    /// Error text.
    pub error: String,
    /// SMTP reply code, if the server answered.
    pub code: Option<u16>,
}

/// Summary of one message handed to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Message-ID of the composed message.
    pub message_id: String,
    /// Queue identifier from the final DATA reply, if recognizable.
    pub transaction_id: Option<String>,
    /// Host that took the message.
    pub host: String,
    /// True if DATA completed.
    pub delivered: bool,
    /// Outcome per envelope recipient, in RCPT TO order.
    pub recipients: Vec<RecipientOutcome>,
}

impl SendReport {
    /// Recipients the server accepted.
    pub fn accepted(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.recipients.iter().filter(|r| r.accepted)
    }

    /// Recipients the server rejected.
    pub fn rejected(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.recipients.iter().filter(|r| !r.accepted)
    }

    /// Returns true if every recipient was accepted and DATA completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.delivered && self.recipients.iter().all(|r| r.accepted)
    }
}

/// Non-raising form of a send result: a pass/fail flag plus a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// True if every recipient was accepted and the message delivered.
    pub success: bool,
    /// Failure category.
    pub error_kind: Option<ErrorKind>,
    /// Diagnostic string suitable for logging; empty on success.
    pub detail: String,
    /// Report, when the server got as far as recipients.
    pub report: Option<SendReport>,
}

impl From<Result<SendReport>> for SendOutcome {
    fn from(result: Result<SendReport>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                error_kind: None,
                detail: String::new(),
                report: Some(report),
            },
            Err(error) => {
                let detail = error.to_string();
                let error_kind = Some(error.kind());
                let report = match error {
                    MailError::Recipients(report) => Some(*report),
                    _ => None,
                };
                Self {
                    success: false,
                    error_kind,
                    detail,
                    report,
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn report(recipients: Vec<RecipientOutcome>) -> SendReport {
        SendReport {
            message_id: "<abc@x.com>".into(),
            transaction_id: Some("Q1".into()),
            host: "mx.test".into(),
            delivered: true,
            recipients,
        }
    }

    #[test]
    fn test_accepted_and_rejected() {
        let report = report(vec![
            RecipientOutcome::accepted("a@y.com"),
            RecipientOutcome::rejected("b@y.com", "No such user", Some(550)),
            RecipientOutcome::accepted("c@y.com"),
        ]);
        assert_eq!(report.accepted().count(), 2);
        let rejected: Vec<_> = report.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].address, "b@y.com");
        assert!(!report.is_complete());
    }

    #[test]
    fn test_outcome_from_success() {
        let outcome = SendOutcome::from(Ok(report(vec![RecipientOutcome::accepted("a@y.com")])));
        assert!(outcome.success);
        assert!(outcome.detail.is_empty());
        assert_eq!(outcome.error_kind, None);
        assert!(outcome.report.unwrap().is_complete());
    }

    #[test]
    fn test_outcome_keeps_partial_report() {
        let partial = report(vec![RecipientOutcome::rejected("b@y.com", "nope", Some(550))]);
        let outcome = SendOutcome::from(Err(MailError::Recipients(Box::new(partial.clone()))));
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Recipients));
        assert!(outcome.detail.contains("b@y.com"));
        assert_eq!(outcome.report, Some(partial));
    }

    #[test]
    fn test_outcome_from_config_error() {
        let outcome = SendOutcome::from(Err(MailError::Config("no hosts".into())));
        assert_eq!(outcome.error_kind, Some(ErrorKind::Configuration));
        assert_eq!(outcome.detail, "Configuration error: no hosts");
        assert!(outcome.report.is_none());
    }
}
