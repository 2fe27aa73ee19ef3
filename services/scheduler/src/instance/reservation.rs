//! Reservation lifecycle for stateful tasks.
//!
//! A stateful task's reservation traverses:
//!
//! - `New` — resources reserved and volumes created, waiting for a matching
//!   offer to launch on. Expires into `Garbage`.
//! - `Launched` — the task is running on its reservation.
//! - `Suspended` — the task terminated but its volumes were retained; waiting
//!   to be relaunched. Expires into destruction.
//! - `Garbage` — scheduled for destruction; the grace period lets an
//!   in-flight launch land.
//! - `Unknown` — the agent is gone or reconciliation lost track of the task.
//!
//! Transitions are pure functions; the caller applies the returned action to
//! its instance store and drives unreserve operations itself.

use armada_id::{InstanceId, TaskId, VolumeId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Instance;
use std::collections::BTreeMap;

/// Why a reservation timeout was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutReason {
    /// Waiting for a matching offer after reserving.
    ReservationTimeout,
    /// Waiting to be relaunched after the task terminated.
    RelinquishedAfterLaunch,
}

/// A deadline attached to a reservation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    pub initiated: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub reason: TimeoutReason,
}

impl Timeout {
    /// Arms a timeout starting now.
    #[must_use]
    pub fn new(now: DateTime<Utc>, ttl: Duration, reason: TimeoutReason) -> Self {
        Self {
            initiated: now,
            deadline: now + ttl,
            reason,
        }
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// The state machine a stateful task's reservation traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReservationState {
    New { timeout: Option<Timeout> },
    Launched,
    Suspended { timeout: Option<Timeout> },
    Garbage { timeout: Option<Timeout> },
    Unknown { timeout: Option<Timeout> },
}

impl ReservationState {
    /// Returns the armed timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<&Timeout> {
        match self {
            ReservationState::New { timeout }
            | ReservationState::Suspended { timeout }
            | ReservationState::Garbage { timeout }
            | ReservationState::Unknown { timeout } => timeout.as_ref(),
            ReservationState::Launched => None,
        }
    }

    /// Returns true if a matching offer may launch on this reservation.
    #[must_use]
    pub fn is_launchable(&self) -> bool {
        matches!(
            self,
            ReservationState::New { .. } | ReservationState::Suspended { .. }
        )
    }
}

/// A stateful task's claim on reserved resources and persistent volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub volume_ids: Vec<VolumeId>,

    pub state: ReservationState,

    /// When the reservation was first created; orders volume-match
    /// candidates.
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// A fresh reservation waiting for its first launch.
    #[must_use]
    pub fn new(volume_ids: Vec<VolumeId>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            volume_ids,
            state: ReservationState::New {
                timeout: Some(Timeout::new(now, ttl, TimeoutReason::ReservationTimeout)),
            },
            created_at: now,
        }
    }

    /// The reservation after its task launched.
    #[must_use]
    pub fn launched(&self) -> Self {
        Self {
            volume_ids: self.volume_ids.clone(),
            state: ReservationState::Launched,
            created_at: self.created_at,
        }
    }

    /// The reservation after its task terminated with volumes retained.
    #[must_use]
    pub fn suspended(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            volume_ids: self.volume_ids.clone(),
            state: ReservationState::Suspended {
                timeout: Some(Timeout::new(now, ttl, TimeoutReason::RelinquishedAfterLaunch)),
            },
            created_at: self.created_at,
        }
    }

    /// The reservation after its agent disappeared or reconciliation lost
    /// track of the task.
    #[must_use]
    pub fn unknown(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            volume_ids: self.volume_ids.clone(),
            state: ReservationState::Unknown {
                timeout: Some(Timeout::new(now, ttl, TimeoutReason::ReservationTimeout)),
            },
            created_at: self.created_at,
        }
    }
}

/// What the caller should do with a reservation after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationAction {
    /// Nothing to do yet.
    Keep,
    /// Move the reservation to a new state.
    Transition(ReservationState),
    /// Destroy the volumes and unreserve the resources.
    DestroyAndUnreserve,
}

/// Evaluates a reservation's timeout against the clock.
///
/// `New` expires into `Garbage` with a fresh grace period; `Suspended`,
/// `Garbage`, and `Unknown` expire into destruction.
#[must_use]
pub fn check_timeout(
    state: &ReservationState,
    now: DateTime<Utc>,
    ttl: Duration,
) -> ReservationAction {
    match state {
        ReservationState::New { timeout: Some(t) } if t.expired(now) => {
            ReservationAction::Transition(ReservationState::Garbage {
                timeout: Some(Timeout::new(now, ttl, TimeoutReason::ReservationTimeout)),
            })
        }
        ReservationState::Suspended { timeout: Some(t) }
        | ReservationState::Garbage { timeout: Some(t) }
        | ReservationState::Unknown { timeout: Some(t) }
            if t.expired(now) =>
        {
            ReservationAction::DestroyAndUnreserve
        }
        _ => ReservationAction::Keep,
    }
}

/// Evaluates a launched task's termination.
#[must_use]
pub fn on_task_terminated(
    reservation: &Reservation,
    volumes_retained: bool,
    now: DateTime<Utc>,
    ttl: Duration,
) -> ReservationAction {
    if volumes_retained {
        ReservationAction::Transition(reservation.suspended(now, ttl).state)
    } else {
        ReservationAction::DestroyAndUnreserve
    }
}

/// Sweeps all instances for reservations whose timeout has fired.
#[must_use]
pub fn expired_reservations(
    instances: &BTreeMap<InstanceId, Instance>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Vec<(InstanceId, TaskId, ReservationAction)> {
    let mut actions = Vec::new();
    for (instance_id, instance) in instances {
        for (task_id, task) in &instance.tasks {
            let Some(reservation) = task.reservation() else {
                continue;
            };
            match check_timeout(&reservation.state, now, ttl) {
                ReservationAction::Keep => {}
                action => actions.push((instance_id.clone(), task_id.clone(), action)),
            }
        }
    }
    actions
}
