//! Run specifications: what operators ask the orchestrator to keep running.
//!
//! A run spec is either an `App` (single container) or a `Pod` (an ordered
//! list of containers sharing an executor and networks). The variants form a
//! closed union so every dispatch site is an exhaustive match.

use std::collections::{BTreeMap, BTreeSet};

use armada_id::RunSpecId;
use armada_mesos::DiskKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Demand
// =============================================================================

/// Scalar resource demand of an app, container, or executor.
///
/// `mem` and `disk` are MiB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceDemand {
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub gpus: f64,
}

impl ResourceDemand {
    /// Component-wise sum.
    #[must_use]
    pub fn plus(&self, other: &ResourceDemand) -> ResourceDemand {
        ResourceDemand {
            cpus: self.cpus + other.cpus,
            mem: self.mem + other.mem,
            disk: self.disk + other.disk,
            gpus: self.gpus + other.gpus,
        }
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// A requested host port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPort {
    /// Any free port from the offer.
    Any,
    /// This exact port.
    Fixed(u32),
}

/// A named endpoint of an app or pod container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,

    /// `None` means the endpoint does not request a host port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<HostPort>,
}

impl Endpoint {
    /// An endpoint requesting any free host port.
    #[must_use]
    pub fn any_port(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host_port: Some(HostPort::Any),
        }
    }

    /// An endpoint requesting a fixed host port.
    #[must_use]
    pub fn fixed_port(name: &str, port: u32) -> Self {
        Self {
            name: name.to_string(),
            host_port: Some(HostPort::Fixed(port)),
        }
    }
}

// =============================================================================
// Health Checks
// =============================================================================

/// A health check declared on an app or pod container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum HealthCheckSpec {
    /// A command line run inside the task; travels with the launch payload.
    Command { value: String },

    /// An HTTP probe against a named endpoint; evaluated by the framework.
    Http {
        endpoint: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// A TCP probe against a named endpoint; evaluated by the framework.
    Tcp { endpoint: String },
}

impl HealthCheckSpec {
    /// The endpoint this check is associated with, for endpoint checks.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            HealthCheckSpec::Command { .. } => None,
            HealthCheckSpec::Http { endpoint, .. } | HealthCheckSpec::Tcp { endpoint } => {
                Some(endpoint)
            }
        }
    }
}

// =============================================================================
// Persistent Volumes
// =============================================================================

/// A persistent volume requested by a stateful app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRequest {
    /// Mount point inside the container, relative (`data`, not `/data`).
    pub container_path: String,

    /// Requested size in MiB.
    pub size_mb: f64,

    /// Which disk provenance the volume may be placed on.
    pub kind: DiskKind,

    pub read_only: bool,
}

// =============================================================================
// Placement Constraints
// =============================================================================

/// Constraint operators over agent attributes and hostnames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintOp {
    /// Every instance lands on a distinct field value.
    Unique,
    /// All instances land on one field value (the given one, or the first
    /// one chosen).
    Cluster,
    /// Spread instances evenly across field values.
    GroupBy,
    /// The field value must match the given regular expression.
    Like,
    /// The field value must not match the given regular expression.
    Unlike,
    /// At most N instances per field value.
    MaxPer,
}

/// A placement constraint on a run spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// `hostname` or an agent attribute name.
    pub field: String,

    pub operator: ConstraintOp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// =============================================================================
// Apps
// =============================================================================

/// A single-container run spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    pub id: RunSpecId,

    /// Version timestamp; bumped on every definition change.
    pub version: DateTime<Utc>,

    /// Shell command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    /// Argv-style arguments, used when `cmd` is absent.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    pub resources: ResourceDemand,

    /// Container image; absent for bare commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,

    /// Persistent volume requests. Non-empty makes the app resident.
    #[serde(default)]
    pub volumes: Vec<VolumeRequest>,

    /// Roles this spec may consume resources from; `None` defers to the
    /// configured defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_resource_roles: Option<BTreeSet<String>>,

    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

// =============================================================================
// Pods
// =============================================================================

/// Network mode shared by a pod's containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Network {
    Host,
    Container { name: String },
}

/// One container of a pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,

    pub resources: ResourceDemand,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
}

impl ContainerSpec {
    /// The container's endpoints that request a host port, in declaration
    /// order.
    pub fn host_port_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(|e| e.host_port.is_some())
    }
}

/// A multi-container run spec sharing an executor and networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    pub id: RunSpecId,

    pub version: DateTime<Utc>,

    pub containers: Vec<ContainerSpec>,

    #[serde(default)]
    pub networks: Vec<Network>,

    /// Overhead claimed by the shared executor itself.
    #[serde(default)]
    pub executor_resources: ResourceDemand,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_resource_roles: Option<BTreeSet<String>>,

    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl PodSpec {
    /// Returns the container spec with the given name.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Total demand: all containers plus the executor overhead.
    #[must_use]
    pub fn total_demand(&self) -> ResourceDemand {
        self.containers
            .iter()
            .fold(self.executor_resources, |acc, c| acc.plus(&c.resources))
    }
}

// =============================================================================
// Run Specs
// =============================================================================

/// A run specification: an app or a pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunSpec {
    App(AppSpec),
    Pod(PodSpec),
}

impl RunSpec {
    #[must_use]
    pub fn id(&self) -> &RunSpecId {
        match self {
            RunSpec::App(app) => &app.id,
            RunSpec::Pod(pod) => &pod.id,
        }
    }

    #[must_use]
    pub fn version(&self) -> DateTime<Utc> {
        match self {
            RunSpec::App(app) => app.version,
            RunSpec::Pod(pod) => pod.version,
        }
    }

    #[must_use]
    pub fn accepted_resource_roles(&self) -> Option<&BTreeSet<String>> {
        match self {
            RunSpec::App(app) => app.accepted_resource_roles.as_ref(),
            RunSpec::Pod(pod) => pod.accepted_resource_roles.as_ref(),
        }
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        match self {
            RunSpec::App(app) => &app.constraints,
            RunSpec::Pod(pod) => &pod.constraints,
        }
    }

    /// A resident run spec keeps persistent volumes and follows the
    /// reserve-then-launch lifecycle.
    #[must_use]
    pub fn is_resident(&self) -> bool {
        match self {
            RunSpec::App(app) => !app.volumes.is_empty(),
            RunSpec::Pod(_) => false,
        }
    }
}
