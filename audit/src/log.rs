//! Append-only activity log.

use crate::AuditError;
use nexus_store::{ActionType, ActivityLogEntry, NewActivity, NexusStore};
use nexus_types::{Clock, Role, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default page size for activity reads.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

/// Who performed an action, as asserted by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// An activity entry under construction.
#[derive(Clone, Debug)]
pub struct Activity {
    subject: String,
    actor_id: UserId,
    actor_role: Role,
    action_type: ActionType,
    description: String,
    metadata: BTreeMap<String, String>,
}

impl Activity {
    pub fn new(
        subject: impl Into<String>,
        actor_id: UserId,
        actor_role: Role,
        action_type: ActionType,
    ) -> Self {
        Self {
            subject: subject.into(),
            actor_id,
            actor_role,
            action_type,
            description: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Shorthand for [`new`](Self::new) with the actor's id and role.
    pub fn by(subject: impl Into<String>, actor: &Actor, action_type: ActionType) -> Self {
        Self::new(subject, actor.id.clone(), actor.role, action_type)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Writes and reads activity entries. Entries are never mutated or deleted.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn NexusStore>,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn NexusStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append an entry stamped with the current time.
    pub fn record(&self, activity: Activity) -> Result<ActivityLogEntry, AuditError> {
        let entry = self.store.append_activity(NewActivity {
            subject: activity.subject,
            actor_id: activity.actor_id,
            actor_role: activity.actor_role,
            action_type: activity.action_type,
            description: activity.description,
            metadata: activity.metadata,
            created_at: self.clock.now(),
        })?;
        tracing::debug!(
            seq = entry.seq,
            subject = %entry.subject,
            action = %entry.action_type,
            "activity recorded"
        );
        Ok(entry)
    }

    /// Like [`record`](Self::record), but a failure is logged instead of
    /// returned. Used after the primary state change has already committed,
    /// where failing the caller would misreport the outcome.
    pub fn record_best_effort(&self, activity: Activity) {
        let action = activity.action_type;
        if let Err(e) = self.record(activity) {
            tracing::error!(%action, error = %e, "failed to append activity entry");
        }
    }

    /// Newest-first entries for a transaction or user.
    pub fn recent(&self, subject: &str, limit: usize) -> Result<Vec<ActivityLogEntry>, AuditError> {
        Ok(self.store.activity_for_subject(subject, limit)?)
    }
}
