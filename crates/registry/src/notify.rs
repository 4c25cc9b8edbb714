//! Notification collaborator.
//!
//! Notification delivery is best-effort and strictly fire-and-forget: it is
//! dispatched on a spawned task only after the ledger mutation commits, its
//! failure is logged but never propagated, and it can neither roll back nor
//! block a registration outcome.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{Event, RegistrationRequest, RequestId};

/// Notification delivery failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotifyError {
    /// The delivery attempt failed.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Event details included in a confirmation notification.
#[derive(Clone, Debug, PartialEq)]
pub struct EventSummary {
    /// Event title.
    pub title: String,
    /// Scheduled start time.
    pub starts_at: DateTime<Utc>,
    /// Venue description.
    pub location: String,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            starts_at: event.starts_at,
            location: event.location.clone(),
        }
    }
}

/// Registration details included in a confirmation notification.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrationSummary {
    /// The approved request.
    pub request_id: RequestId,
    /// Requester's full name, for salutation.
    pub full_name: String,
}

impl From<&RegistrationRequest> for RegistrationSummary {
    fn from(request: &RegistrationRequest) -> Self {
        Self { request_id: request.id, full_name: request.fields.full_name.clone() }
    }
}

/// Collaborator that attempts notification delivery.
///
/// Constructed once at process start and passed into the workflow — no
/// ambient singletons. Implementations own their transport (email gateway,
/// message topic); this crate makes no delivery guarantee.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempts to deliver a registration-confirmed notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails. The caller logs the
    /// failure and moves on; the registration outcome is already committed.
    async fn registration_confirmed(
        &self,
        email: &str,
        event: &EventSummary,
        registration: &RegistrationSummary,
    ) -> Result<(), NotifyError>;
}

/// [`Notifier`] that records the notification in the log stream.
///
/// Useful in development and as a safe default where no delivery transport
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn registration_confirmed(
        &self,
        email: &str,
        event: &EventSummary,
        registration: &RegistrationSummary,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            email,
            event = %event.title,
            request_id = %registration.request_id,
            "registration confirmed"
        );
        Ok(())
    }
}

/// Dispatches a confirmation notification without awaiting delivery.
///
/// Failure is observable in the logs but never reaches the caller.
pub(crate) fn dispatch(
    notifier: Arc<dyn Notifier>,
    email: String,
    event: EventSummary,
    registration: RegistrationSummary,
) {
    tokio::spawn(async move {
        if let Err(err) =
            notifier.registration_confirmed(&email, &event, &registration).await
        {
            tracing::warn!(
                error = %err,
                request_id = %registration.request_id,
                "registration notification failed"
            );
        }
    });
}
