//! Instances and tasks: the incarnations of a run spec.
//!
//! An instance holds one task (apps) or several (pods). Tasks are a closed
//! union: ephemeral tasks exist only while running; stateful tasks hold a
//! [`Reservation`] that outlives individual launches.

pub mod reservation;
pub mod status;

pub use reservation::{
    check_timeout, expired_reservations, on_task_terminated, Reservation, ReservationAction,
    ReservationState, Timeout, TimeoutReason,
};
pub use status::{derive_instance_status, derive_pod_statuses, ContainerStatus};

use std::collections::BTreeMap;

use armada_id::{AgentId, InstanceId, TaskId};
use armada_mesos::Offer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

// =============================================================================
// Statuses
// =============================================================================

/// Task and instance status lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Created,
    Reserved,
    Staging,
    Starting,
    Running,
    Killing,
    Killed,
    Failed,
    Finished,
    Gone,
    Dropped,
    Unreachable,
    Unknown,
    Error,
}

impl InstanceStatus {
    /// Terminal statuses destroy ephemeral tasks and suspend stateful ones.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Finished
                | InstanceStatus::Failed
                | InstanceStatus::Killed
                | InstanceStatus::Gone
                | InstanceStatus::Dropped
                | InstanceStatus::Error
        )
    }

    /// Active statuses count toward a run spec's live instances.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Created
                | InstanceStatus::Staging
                | InstanceStatus::Starting
                | InstanceStatus::Running
                | InstanceStatus::Killing
                | InstanceStatus::Unreachable
        )
    }
}

/// The mutable state of a launched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: InstanceStatus,

    /// When the task entered this status.
    pub since: DateTime<Utc>,

    /// Health as reported by its checks; `None` until the first report.
    pub healthy: Option<bool>,
}

impl TaskState {
    /// The state of a task that was just staged.
    #[must_use]
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            status: InstanceStatus::Created,
            since: now,
            healthy: None,
        }
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// A task: one container process tracked by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    /// A stateless task; destroyed on terminal status.
    LaunchedEphemeral {
        task_id: TaskId,
        run_spec_version: DateTime<Utc>,
        state: TaskState,
        host_ports: Vec<u32>,
    },

    /// A stateful task holding resources and volumes, not currently running.
    Reserved {
        task_id: TaskId,
        reservation: Reservation,
    },

    /// A stateful task running on its reservation.
    LaunchedOnReservation {
        task_id: TaskId,
        run_spec_version: DateTime<Utc>,
        state: TaskState,
        host_ports: Vec<u32>,
        reservation: Reservation,
    },
}

impl Task {
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        match self {
            Task::LaunchedEphemeral { task_id, .. }
            | Task::Reserved { task_id, .. }
            | Task::LaunchedOnReservation { task_id, .. } => task_id,
        }
    }

    /// The reservation, for stateful tasks.
    #[must_use]
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            Task::LaunchedEphemeral { .. } => None,
            Task::Reserved { reservation, .. }
            | Task::LaunchedOnReservation { reservation, .. } => Some(reservation),
        }
    }

    /// The task's current status. A `Reserved` task reports `Reserved`.
    #[must_use]
    pub fn status(&self) -> InstanceStatus {
        match self {
            Task::LaunchedEphemeral { state, .. }
            | Task::LaunchedOnReservation { state, .. } => state.status,
            Task::Reserved { .. } => InstanceStatus::Reserved,
        }
    }
}

// =============================================================================
// Instances
// =============================================================================

/// A snapshot of the agent an instance was placed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: AgentId,
    pub host: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl AgentInfo {
    /// Snapshots the agent an offer came from.
    #[must_use]
    pub fn from_offer(offer: &Offer) -> Self {
        Self {
            agent_id: offer.agent_id.clone(),
            host: offer.hostname.clone(),
            attributes: offer.attributes.clone(),
        }
    }
}

/// The aggregate state of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub status: InstanceStatus,
    pub since: DateTime<Utc>,
    pub run_spec_version: DateTime<Utc>,
    pub healthy: Option<bool>,
}

/// A running or pending incarnation of a run spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub agent_info: AgentInfo,
    pub state: InstanceState,
    pub tasks: BTreeMap<TaskId, Task>,
    pub run_spec_version: DateTime<Utc>,
}

impl Instance {
    /// Iterates over the instance's tasks that hold a launchable reservation.
    pub fn launchable_reservations(&self) -> impl Iterator<Item = (&TaskId, &Reservation)> {
        self.tasks.iter().filter_map(|(task_id, task)| match task {
            Task::Reserved { reservation, .. } if reservation.state.is_launchable() => {
                Some((task_id, reservation))
            }
            _ => None,
        })
    }

    /// Returns true if any task is waiting on a reservation.
    #[must_use]
    pub fn has_waiting_reservation(&self) -> bool {
        self.tasks
            .values()
            .any(|task| matches!(task, Task::Reserved { .. }))
    }

    /// Checks the identity invariant: every task ID must be prefixed by the
    /// instance's run spec.
    pub fn validate(&self) -> SchedulerResult<()> {
        let run_spec_id = self.instance_id.run_spec_id();
        for task_id in self.tasks.keys() {
            if task_id.run_spec_id() != run_spec_id {
                return Err(SchedulerError::Invariant {
                    message: format!(
                        "task '{task_id}' does not belong to run spec '{run_spec_id}'"
                    ),
                });
            }
        }
        Ok(())
    }
}
