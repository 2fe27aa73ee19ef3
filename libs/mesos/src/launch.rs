//! Launch payloads and accept-time operations.
//!
//! These are the wire types handed back to the resource manager when an offer
//! is accepted. They must round-trip unchanged through serialization.

use std::collections::BTreeMap;

use armada_id::{AgentId, FrameworkId, TaskId, VolumeId};
use serde::{Deserialize, Serialize};

use crate::Resource;

/// An ordered environment variable list.
///
/// Order is preserved so that repeated builds of the same task serialize
/// identically.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl Environment {
    /// Appends a variable.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.push(EnvironmentVariable {
            name: name.into(),
            value: value.into(),
        });
    }
}

/// The command a task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Shell command line, when `shell` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Argv-style arguments, when `shell` is false.
    #[serde(default)]
    pub arguments: Vec<String>,

    #[serde(default)]
    pub environment: Environment,

    pub shell: bool,
}

/// A volume mounted into a task's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMapping {
    pub container_path: String,

    /// Set for persistent volumes; absent for plain host mounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<VolumeId>,

    pub read_only: bool,
}

/// Container runtime configuration for a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub volumes: Vec<VolumeMapping>,
}

/// A command health check attached to the launch payload.
///
/// Endpoint (HTTP/TCP) checks are evaluated by the framework itself and never
/// serialize into the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub command: String,
}

/// The launch payload for a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,

    pub name: String,

    pub agent_id: AgentId,

    pub resources: Vec<Resource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// The shared executor a task group launches under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub executor_id: String,

    pub framework_id: FrameworkId,

    /// Executor overhead resources, separate from the tasks' own.
    pub resources: Vec<Resource>,
}

/// A set of tasks launched atomically under a shared executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroupInfo {
    pub tasks: Vec<TaskInfo>,
}

/// An accept-time operation on an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Launch one or more tasks directly.
    Launch { task_infos: Vec<TaskInfo> },

    /// Launch a task group under a shared executor.
    LaunchGroup {
        executor: ExecutorInfo,
        task_group: TaskGroupInfo,
    },

    /// Dynamically reserve resources.
    Reserve { resources: Vec<Resource> },

    /// Create persistent volumes on reserved disk.
    Create { volumes: Vec<Resource> },
}
