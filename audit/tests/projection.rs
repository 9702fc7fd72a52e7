use nexus_audit::{Activity, ActivityLog, Actor, StatusProjection};
use nexus_nullables::{NullClock, NullStore};
use nexus_store::{ActionType, PairingRequest, PairingStore, VerificationRecord};
use nexus_types::{
    AccessStatus, AgentId, BrokerId, PairingStatus, RequestId, Role, Timestamp, UserId,
    VerificationOutcome,
};
use std::sync::Arc;

fn request(id: &str, agent: &str, status: PairingStatus, at: u64) -> PairingRequest {
    PairingRequest {
        id: RequestId::new(id),
        agent_id: AgentId::new(agent),
        broker_id: BrokerId::new("b1"),
        status,
        created_at: Timestamp::new(at),
        responded_at: None,
    }
}

fn record(user: &str, outcome: VerificationOutcome, at: u64) -> VerificationRecord {
    VerificationRecord {
        user_id: UserId::new(user),
        outcome,
        similarity: None,
        field_count: 3,
        decided_at: Timestamp::new(at),
    }
}

#[test]
fn agent_is_verified_with_one_accepted_among_many_closed_rows() {
    let store = Arc::new(NullStore::new());
    store
        .insert_pairing_request(&request("r1", "a1", PairingStatus::Cancelled, 1))
        .unwrap();
    store
        .insert_pairing_request(&request("r2", "a1", PairingStatus::Rejected, 2))
        .unwrap();
    let projection = StatusProjection::new(store.clone());
    assert_eq!(
        projection.agent_status(&AgentId::new("a1")).unwrap(),
        AccessStatus::PendingApproval
    );

    store
        .insert_pairing_request(&request("r3", "a1", PairingStatus::Accepted, 3))
        .unwrap();
    assert_eq!(
        projection.agent_status(&AgentId::new("a1")).unwrap(),
        AccessStatus::Verified
    );
}

#[test]
fn pending_outcomes_are_not_recorded() {
    let store = Arc::new(NullStore::new());
    let projection = StatusProjection::new(store.clone());
    assert!(!projection
        .record_outcome(&record("u1", VerificationOutcome::Pending, 5))
        .unwrap());
    assert!(projection.latest_outcome(&UserId::new("u1")).unwrap().is_none());
}

#[test]
fn identity_status_follows_latest_outcome() {
    let store = Arc::new(NullStore::new());
    let projection = StatusProjection::new(store.clone());
    let user = UserId::new("u1");

    projection
        .record_outcome(&record("u1", VerificationOutcome::Review, 5))
        .unwrap();
    assert_eq!(
        projection.identity_status(&user).unwrap(),
        AccessStatus::PendingApproval
    );

    projection
        .record_outcome(&record("u1", VerificationOutcome::Verified, 9))
        .unwrap();
    assert_eq!(projection.identity_status(&user).unwrap(), AccessStatus::Verified);
}

#[test]
fn agents_need_identity_and_pairing_for_access() {
    let store = Arc::new(NullStore::new());
    let projection = StatusProjection::new(store.clone());
    let user = UserId::new("a1");

    projection
        .record_outcome(&record("a1", VerificationOutcome::Verified, 5))
        .unwrap();
    assert_eq!(
        projection.access_status(&user, Role::Agent).unwrap(),
        AccessStatus::PendingApproval
    );
    assert_eq!(
        projection.access_status(&user, Role::Broker).unwrap(),
        AccessStatus::Verified
    );

    store
        .insert_pairing_request(&request("r1", "a1", PairingStatus::Accepted, 6))
        .unwrap();
    assert_eq!(
        projection.access_status(&user, Role::Agent).unwrap(),
        AccessStatus::Verified
    );
}

#[test]
fn activity_log_is_newest_first_and_stamped_by_clock() {
    let store = Arc::new(NullStore::new());
    let clock = Arc::new(NullClock::new(100));
    let log = ActivityLog::new(store.clone(), clock.clone());
    let actor = Actor::new(AgentId::new("a1"), Role::Agent);

    log.record(
        Activity::by("r1", &actor, ActionType::PairingRequested)
            .description("requested")
            .meta("broker", "b1"),
    )
    .unwrap();
    clock.advance(5);
    log.record(Activity::by("r1", &actor, ActionType::PairingCancelled))
        .unwrap();
    log.record(Activity::by("r2", &actor, ActionType::PairingRequested))
        .unwrap();

    let entries = log.recent("r1", 10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action_type, ActionType::PairingCancelled);
    assert_eq!(entries[0].created_at, Timestamp::new(105));
    assert_eq!(entries[1].metadata.get("broker").map(String::as_str), Some("b1"));
    assert_eq!(entries[1].actor_role, Role::Agent);
}

#[test]
fn best_effort_record_swallows_store_failure() {
    let store = Arc::new(NullStore::new());
    let log = ActivityLog::new(store.clone(), Arc::new(NullClock::new(1)));
    let actor = Actor::new(UserId::new("u1"), Role::Client);

    store.set_failing(true);
    log.record_best_effort(Activity::by("u1", &actor, ActionType::IdentityDecided));
    assert!(log.record(Activity::by("u1", &actor, ActionType::IdentityDecided)).is_err());

    store.set_failing(false);
    assert_eq!(store.activity_count(), 0);
}
