//! End-to-end registration workflow tests.
//!
//! These exercise the full submit → decide → enroll flow over the in-memory
//! backend, including the concurrency scenarios the capacity invariant must
//! survive.

use std::sync::Arc;

use chrono::Utc;
use muster_authn::{Principal, Role};
use muster_registry::{
    EventStore, EventSummary, NewEvent, Notifier, NotifyError, RegistrationError,
    RegistrationFields, RegistrationLedger, RegistrationSummary, RequestStatus, RequestWorkflow,
    WorkflowError,
};
use muster_storage::MemoryBackend;
use parking_lot::Mutex;

/// Notifier that records every delivery for assertions.
#[derive(Default)]
struct RecordingNotifier {
    deliveries: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn registration_confirmed(
        &self,
        email: &str,
        event: &EventSummary,
        _registration: &RegistrationSummary,
    ) -> Result<(), NotifyError> {
        self.deliveries.lock().push((email.to_string(), event.title.clone()));
        Ok(())
    }
}

/// Notifier that always fails, proving delivery failure never propagates.
struct FailingNotifier;

#[async_trait::async_trait]
impl Notifier for FailingNotifier {
    async fn registration_confirmed(
        &self,
        _email: &str,
        _event: &EventSummary,
        _registration: &RegistrationSummary,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp unreachable".into()))
    }
}

struct Harness {
    events: EventStore<MemoryBackend>,
    ledger: RegistrationLedger<MemoryBackend>,
    workflow: RequestWorkflow<MemoryBackend>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let events = EventStore::new(Arc::clone(&backend));
    let ledger = RegistrationLedger::new(Arc::clone(&backend));
    let notifier = Arc::new(RecordingNotifier::default());
    let workflow = RequestWorkflow::new(
        backend,
        ledger.clone(),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    Harness { events, ledger, workflow, notifier }
}

fn organizer() -> Principal {
    Principal { id: "org-1".into(), email: "org@example.com".into(), role: Role::Organizer }
}

fn participant() -> Principal {
    Principal { id: "user-9".into(), email: "p@example.com".into(), role: Role::Participant }
}

fn fields(name: &str) -> RegistrationFields {
    RegistrationFields {
        full_name: name.into(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        college_name: "Analytical College".into(),
        year_of_study: "3".into(),
        phone_number: "+1-555-0100".into(),
        why_interested: "Systems programming".into(),
    }
}

fn workshop(capacity: u32) -> NewEvent {
    NewEvent {
        organizer_id: "org-1".into(),
        title: "Rust Workshop".into(),
        starts_at: Utc::now(),
        location: "Hall A".into(),
        capacity,
    }
}

#[tokio::test]
async fn submit_then_approve_enrolls_and_notifies() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();

    let request = h.workflow.submit(event.id, "user-1", fields("Ada Lovelace")).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert!(request.decided_at.is_none());

    let decided =
        h.workflow.decide(request.id, RequestStatus::Approved, &organizer()).await.unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);
    assert!(decided.decided_at.is_some());

    let stored = h.events.event(event.id).await.unwrap().unwrap();
    assert!(stored.participants.contains("user-1"));

    // Notification dispatch is fire-and-forget; give the spawned task a beat
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let deliveries = h.notifier.deliveries.lock().clone();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "ada.lovelace@example.com");
    assert_eq!(deliveries[0].1, "Rust Workshop");
}

#[tokio::test]
async fn duplicate_submit_is_rejected_with_single_request() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();

    h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();
    let second = h.workflow.submit(event.id, "user-1", fields("Ada")).await;

    assert!(matches!(
        second,
        Err(WorkflowError::Registration(RegistrationError::AlreadyRegistered { .. }))
    ));

    let requests = h.workflow.requests_for_event(event.id).await.unwrap();
    assert_eq!(requests.len(), 1, "only one request may exist for the pair");
}

#[tokio::test]
async fn resubmission_is_allowed_after_rejection() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();

    let first = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();
    h.workflow.decide(first.id, RequestStatus::Rejected, &organizer()).await.unwrap();

    // The rejected request releases the pair
    let second = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();
    assert_eq!(second.status, RequestStatus::Pending);
    assert_ne!(second.id, first.id);

    // Requests are never deleted: both remain readable
    let requests = h.workflow.requests_for_event(event.id).await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn participant_cannot_decide_and_nothing_mutates() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();
    let request = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();

    let result = h.workflow.decide(request.id, RequestStatus::Approved, &participant()).await;
    assert!(matches!(result, Err(WorkflowError::Policy(_))));

    // No state was touched
    let stored_request = h.workflow.request(request.id).await.unwrap().unwrap();
    assert_eq!(stored_request.status, RequestStatus::Pending);
    let stored_event = h.events.event(event.id).await.unwrap().unwrap();
    assert!(stored_event.participants.is_empty());
}

#[tokio::test]
async fn second_approval_reports_already_decided_without_duplicates() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();
    let request = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();

    h.workflow.decide(request.id, RequestStatus::Approved, &organizer()).await.unwrap();
    let again = h.workflow.decide(request.id, RequestStatus::Approved, &organizer()).await;

    assert!(matches!(
        again,
        Err(WorkflowError::AlreadyDecided { status: RequestStatus::Approved, .. })
    ));

    let stored = h.events.event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.participants.len(), 1, "no duplicate participant");
}

#[tokio::test]
async fn approval_of_full_event_leaves_request_pending() {
    let h = harness();
    let event = h.events.create_event(workshop(1)).await.unwrap();

    let first = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();
    let second = h.workflow.submit(event.id, "user-2", fields("Grace")).await.unwrap();

    h.workflow.decide(first.id, RequestStatus::Approved, &organizer()).await.unwrap();

    let result = h.workflow.decide(second.id, RequestStatus::Approved, &organizer()).await;
    assert!(matches!(
        result,
        Err(WorkflowError::Registration(RegistrationError::Full { .. }))
    ));

    // The decision and the enrollment are one all-or-nothing step: the
    // refused approval must not have committed APPROVED.
    let stored = h.workflow.request(second.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);

    let stored_event = h.events.event(event.id).await.unwrap().unwrap();
    assert_eq!(stored_event.participants.len(), 1);
}

#[tokio::test]
async fn pending_is_not_a_valid_decision_target() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();
    let request = h.workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();

    let result = h.workflow.decide(request.id, RequestStatus::Pending, &organizer()).await;
    assert!(matches!(result, Err(WorkflowError::InvalidTarget { .. })));
}

#[tokio::test]
async fn deciding_unknown_request_reports_not_found() {
    let h = harness();

    let result = h
        .workflow
        .decide(muster_registry::RequestId::new(), RequestStatus::Approved, &organizer())
        .await;
    assert!(matches!(result, Err(WorkflowError::RequestNotFound { .. })));
}

#[tokio::test]
async fn submit_to_unknown_or_closed_event_is_rejected() {
    let h = harness();

    let missing = h.workflow.submit(muster_registry::EventId::new(), "u", fields("Ada")).await;
    assert!(matches!(
        missing,
        Err(WorkflowError::Registration(RegistrationError::EventNotFound { .. }))
    ));

    let event = h.events.create_event(workshop(10)).await.unwrap();
    h.events.close_event(event.id).await.unwrap();

    let closed = h.workflow.submit(event.id, "u", fields("Ada")).await;
    assert!(matches!(
        closed,
        Err(WorkflowError::Registration(RegistrationError::EventClosed { .. }))
    ));
}

#[tokio::test]
async fn notification_failure_never_blocks_the_outcome() {
    let backend = Arc::new(MemoryBackend::new());
    let events = EventStore::new(Arc::clone(&backend));
    let ledger = RegistrationLedger::new(Arc::clone(&backend));
    let workflow = RequestWorkflow::new(backend, ledger, Arc::new(FailingNotifier));

    let event = events.create_event(workshop(10)).await.unwrap();
    let request = workflow.submit(event.id, "user-1", fields("Ada")).await.unwrap();

    // Approval succeeds even though delivery will fail
    let decided =
        workflow.decide(request.id, RequestStatus::Approved, &organizer()).await.unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let stored = events.event(event.id).await.unwrap().unwrap();
    assert!(stored.participants.contains("user-1"), "delivery failure must not roll back");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn three_concurrent_registrations_for_two_seats() {
    let h = harness();
    let event = h.events.create_event(workshop(2)).await.unwrap();

    let mut handles = Vec::new();
    for user in ["a", "b", "c"] {
        let ledger = h.ledger.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move { ledger.try_register(event_id, user).await }));
    }

    let mut enrolled = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => enrolled += 1,
            Err(RegistrationError::Full { .. }) => full += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(enrolled, 2);
    assert_eq!(full, 1);

    let stored = h.events.event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.participants.len(), 2, "capacity invariant must hold");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_submissions_for_one_pair_yield_one_request() {
    let h = harness();
    let event = h.events.create_event(workshop(10)).await.unwrap();
    let workflow = Arc::new(h.workflow);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let workflow = Arc::clone(&workflow);
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            workflow.submit(event_id, "same-user", fields("Ada")).await
        }));
    }

    let mut submitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => submitted += 1,
            Err(WorkflowError::Registration(RegistrationError::AlreadyRegistered { .. })) => {},
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(submitted, 1, "exactly one submission may win the pair");

    let requests = workflow.requests_for_event(event.id).await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_approvals_across_requests_respect_capacity() {
    let h = harness();
    let event = h.events.create_event(workshop(2)).await.unwrap();
    let workflow = Arc::new(h.workflow);

    let mut request_ids = Vec::new();
    for user in ["a", "b", "c", "d"] {
        let request = workflow.submit(event.id, user, fields(user)).await.unwrap();
        request_ids.push(request.id);
    }

    let mut handles = Vec::new();
    for request_id in request_ids {
        let workflow = Arc::clone(&workflow);
        handles.push(tokio::spawn(async move {
            workflow.decide(request_id, RequestStatus::Approved, &organizer()).await
        }));
    }

    let mut approved = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => approved += 1,
            Err(WorkflowError::Registration(RegistrationError::Full { .. })) => refused += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(approved, 2, "only as many approvals as seats");
    assert_eq!(refused, 2);

    let stored = h.events.event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.participants.len(), 2);
}
