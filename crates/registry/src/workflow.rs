//! Reviewable registration request workflow.
//!
//! Lifecycle: `PENDING → APPROVED` or `PENDING → REJECTED`, both terminal.
//!
//! Submission and decision are both built from conditional writes:
//!
//! - `submit` creates the request record and its `(event, user)` index entry
//!   in one transaction, so a pair can never hold two live requests no
//!   matter how submissions interleave.
//! - `decide(APPROVED)` commits the status transition and the ledger
//!   enrollment as one transaction — if the event filled up or the user got
//!   enrolled some other way, nothing is committed and the request stays
//!   `PENDING`.
//!
//! Only write contention is retried; every business rejection surfaces
//! immediately with a stable code.

use std::sync::Arc;

use chrono::Utc;
use muster_authn::{Principal, Role, authorize};
use muster_storage::{StorageBackend, StorageError};

use crate::{
    error::{RegistrationError, WorkflowError},
    keys,
    ledger::{RegistrationLedger, admit},
    notify::{self, EventSummary, Notifier, RegistrationSummary},
    retry::{RetryConfig, backoff_delay},
    types::{
        Event, EventId, RegistrationFields, RegistrationRequest, RequestId, RequestStatus,
    },
};

/// Manages the lifecycle of reviewable registration requests.
pub struct RequestWorkflow<B> {
    backend: Arc<B>,
    ledger: RegistrationLedger<B>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
}

impl<B: StorageBackend> RequestWorkflow<B> {
    /// Creates a workflow over the given backend, ledger, and notifier.
    ///
    /// All collaborators are constructed once at process start and passed
    /// in — the workflow holds no ambient state.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        ledger: RegistrationLedger<B>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { backend, ledger, notifier, retry: RetryConfig::default() }
    }

    /// Replaces the retry policy for contended writes.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Submits a registration request for `(event_id, user_id)`.
    ///
    /// The new request starts `PENDING`. At most one live (`PENDING` or
    /// `APPROVED`) request exists per pair: a repeated or concurrent
    /// submission observes the pair's index entry and is rejected
    /// `AlreadyRegistered`. A `REJECTED` request releases the pair, so the
    /// user may submit again; the new request supersedes the rejected one
    /// in the index.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] / [`RegistrationError::EventClosed`] /
    ///   [`RegistrationError::Full`] — the event cannot accept this request
    /// - [`RegistrationError::AlreadyRegistered`] — the user is enrolled or has a live request
    /// - [`RegistrationError::Conflict`] — contention outlasted every bounded retry
    #[tracing::instrument(skip(self, fields))]
    pub async fn submit(
        &self,
        event_id: EventId,
        user_id: &str,
        fields: RegistrationFields,
    ) -> Result<RegistrationRequest, WorkflowError> {
        let pair_key = keys::pair_index_key(event_id, user_id);

        for attempt in 0..self.retry.max_attempts {
            // The event must be able to accept this user at all before a
            // request is worth queueing for review.
            let Some(event_bytes) = self.backend.get(&keys::event_key(event_id)).await? else {
                return Err(RegistrationError::EventNotFound { event_id }.into());
            };
            let event: Event = keys::decode(&event_bytes).map_err(RegistrationError::from)?;
            admit(&event, user_id)?;

            // One live request per (event, user): a PENDING or APPROVED
            // request blocks resubmission, a REJECTED one is superseded.
            let expected = match self.backend.get(&pair_key).await? {
                Some(index_bytes) => {
                    let prior_id =
                        keys::decode_request_id(&index_bytes).map_err(RegistrationError::from)?;
                    match self.request(prior_id).await? {
                        Some(prior) if prior.status != RequestStatus::Rejected => {
                            return Err(RegistrationError::AlreadyRegistered {
                                event_id,
                                user_id: user_id.to_owned(),
                            }
                            .into());
                        },
                        _ => Some(index_bytes.to_vec()),
                    }
                },
                None => None,
            };

            let request = RegistrationRequest {
                id: RequestId::new(),
                event_id,
                user_id: user_id.to_owned(),
                status: RequestStatus::Pending,
                fields: fields.clone(),
                created_at: Utc::now(),
                decided_at: None,
            };

            let mut txn = self.backend.transaction().await?;
            txn.compare_and_set(
                pair_key.clone(),
                expected,
                request.id.to_string().into_bytes(),
            )?;
            txn.set(
                keys::request_key(request.id),
                keys::encode(&request).map_err(RegistrationError::from)?,
            );

            match txn.commit().await {
                Ok(()) => {
                    tracing::info!(request_id = %request.id, "registration request submitted");
                    return Ok(request);
                },
                Err(StorageError::Conflict) => {
                    // A concurrent submission claimed the pair first; the
                    // next pass reads the fresh index entry and resolves.
                    tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
                },
                Err(err) => return Err(err.into()),
            }
        }

        Err(RegistrationError::Conflict { attempts: self.retry.max_attempts }.into())
    }

    /// Decides a pending request.
    ///
    /// Only a principal passing the role gate for [`Role::Organizer`] may
    /// call this. `PENDING` is not a valid target. A terminal request
    /// reports [`WorkflowError::AlreadyDecided`] — the first decision is
    /// never overwritten.
    ///
    /// On `APPROVED`, the status transition and the ledger enrollment
    /// commit as one all-or-nothing transaction; if the ledger condition
    /// fails (`Full`, `AlreadyRegistered`, `EventClosed`), the request
    /// stays `PENDING` and the error surfaces. After an approval commits,
    /// a confirmation notification is dispatched fire-and-forget.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Policy`] — the acting principal is not an organizer; nothing is read or
    ///   written
    /// - [`WorkflowError::InvalidTarget`] — target is `PENDING`
    /// - [`WorkflowError::RequestNotFound`] — no such request
    /// - [`WorkflowError::AlreadyDecided`] — the request already carries a terminal status
    /// - [`WorkflowError::Registration`] — the enrollment was refused, contention outlasted the
    ///   bounded retries, or the backend failed
    #[tracing::instrument(skip(self, acting), fields(principal = %acting.id))]
    pub async fn decide(
        &self,
        request_id: RequestId,
        target: RequestStatus,
        acting: &Principal,
    ) -> Result<RegistrationRequest, WorkflowError> {
        authorize(acting, Role::Organizer)?;

        if target == RequestStatus::Pending {
            return Err(WorkflowError::InvalidTarget { target });
        }

        let request_key = keys::request_key(request_id);

        for attempt in 0..self.retry.max_attempts {
            let Some(request_bytes) = self.backend.get(&request_key).await? else {
                return Err(WorkflowError::RequestNotFound { request_id });
            };
            let request: RegistrationRequest =
                keys::decode(&request_bytes).map_err(RegistrationError::from)?;

            if request.status.is_terminal() {
                return Err(WorkflowError::AlreadyDecided { request_id, status: request.status });
            }

            let mut decided = request.clone();
            decided.status = target;
            decided.decided_at = Some(Utc::now());
            let decided_bytes = keys::encode(&decided).map_err(RegistrationError::from)?;

            let commit_result = match target {
                RequestStatus::Rejected => {
                    self.backend
                        .compare_and_set(
                            &request_key,
                            Some(request_bytes.as_ref()),
                            decided_bytes,
                        )
                        .await
                },
                RequestStatus::Approved => {
                    let event_key = keys::event_key(request.event_id);
                    let Some(event_bytes) = self.backend.get(&event_key).await? else {
                        return Err(RegistrationError::EventNotFound {
                            event_id: request.event_id,
                        }
                        .into());
                    };
                    let event: Event =
                        keys::decode(&event_bytes).map_err(RegistrationError::from)?;

                    // Business refusals abort the decision entirely; the
                    // request stays PENDING.
                    let mut txn = self.backend.transaction().await?;
                    let updated_event = self.ledger.stage_enrollment(
                        txn.as_mut(),
                        &event_bytes,
                        &event,
                        &request.user_id,
                    )?;
                    txn.compare_and_set(
                        request_key.clone(),
                        Some(request_bytes.to_vec()),
                        decided_bytes,
                    )?;

                    match txn.commit().await {
                        Ok(()) => {
                            notify::dispatch(
                                Arc::clone(&self.notifier),
                                decided.fields.email.clone(),
                                EventSummary::from(&updated_event),
                                RegistrationSummary::from(&decided),
                            );
                            Ok(())
                        },
                        Err(err) => Err(err),
                    }
                },
                RequestStatus::Pending => return Err(WorkflowError::InvalidTarget { target }),
            };

            match commit_result {
                Ok(()) => {
                    tracing::info!(
                        event_id = %request.event_id,
                        status = %target,
                        "registration request decided"
                    );
                    return Ok(decided);
                },
                Err(StorageError::Conflict) => {
                    // Someone else touched the request or the event; re-read
                    // and re-evaluate everything.
                    tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
                },
                Err(err) => return Err(err.into()),
            }
        }

        Err(RegistrationError::Conflict { attempts: self.retry.max_attempts }.into())
    }

    /// Retrieves a registration request by id.
    pub async fn request(
        &self,
        id: RequestId,
    ) -> Result<Option<RegistrationRequest>, WorkflowError> {
        match self.backend.get(&keys::request_key(id)).await? {
            Some(bytes) => {
                Ok(Some(keys::decode(&bytes).map_err(RegistrationError::from)?))
            },
            None => Ok(None),
        }
    }

    /// Lists every registration request, in id order.
    pub async fn requests(&self) -> Result<Vec<RegistrationRequest>, WorkflowError> {
        let (start, end) = keys::prefix_range(keys::REQUEST_PREFIX.as_bytes());
        let entries = self.backend.get_range(start..end).await?;

        let mut requests = Vec::with_capacity(entries.len());
        for entry in entries {
            requests.push(keys::decode(&entry.value).map_err(RegistrationError::from)?);
        }
        Ok(requests)
    }

    /// Lists the registration requests targeting one event.
    pub async fn requests_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<RegistrationRequest>, WorkflowError> {
        let mut requests = self.requests().await?;
        requests.retain(|request| request.event_id == event_id);
        Ok(requests)
    }
}
