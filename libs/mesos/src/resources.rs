//! Resource fragments: quantities, port ranges, reservations, disk sources.

use std::collections::BTreeMap;

use armada_id::{FrameworkId, TaskId, VolumeId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Names and Constants
// =============================================================================

/// CPU shares, fractional.
pub const CPUS: &str = "cpus";

/// Memory in MiB.
pub const MEM: &str = "mem";

/// Disk in MiB.
pub const DISK: &str = "disk";

/// GPU devices, whole units offered as scalars.
pub const GPUS: &str = "gpus";

/// Host port ranges.
pub const PORTS: &str = "ports";

/// The role resources belong to when nobody has reserved them.
pub const UNRESERVED_ROLE: &str = "*";

/// Tolerance for scalar comparisons. Resource quantities are doubles on the
/// wire; repeated deduction must not let dust block a match.
pub const SCALAR_EPSILON: f64 = 1e-9;

/// Reservation label carrying the reserving framework's ID.
pub const FRAMEWORK_ID_LABEL: &str = "marathon_framework_id";

/// Reservation label carrying the owning task's ID.
pub const TASK_ID_LABEL: &str = "marathon_task_id";

/// Builds the exact label set a task's reservation must carry.
///
/// Resources reserved for a task carry exactly these two labels; matching is
/// by full equality of the set.
#[must_use]
pub fn reservation_labels(framework_id: &FrameworkId, task_id: &TaskId) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(FRAMEWORK_ID_LABEL.to_string(), framework_id.to_string());
    labels.insert(TASK_ID_LABEL.to_string(), task_id.to_string());
    labels
}

// =============================================================================
// Values
// =============================================================================

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub begin: u32,
    pub end: u32,
}

impl PortRange {
    /// Creates a range; `begin` and `end` are both included.
    #[must_use]
    pub const fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    /// Returns true if `port` falls inside the range.
    #[must_use]
    pub const fn contains(&self, port: u32) -> bool {
        self.begin <= port && port <= self.end
    }

    /// Returns the number of ports in the range.
    #[must_use]
    pub const fn size(&self) -> u64 {
        if self.begin > self.end {
            0
        } else {
            (self.end - self.begin + 1) as u64
        }
    }

    /// Iterates over the ports in the range, ascending.
    pub fn ports(&self) -> impl Iterator<Item = u32> {
        self.begin..=self.end
    }
}

/// The value carried by a resource: a scalar quantity or a set of ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(f64),
    Ranges(Vec<PortRange>),
}

// =============================================================================
// Disk Provenance
// =============================================================================

/// The provenance kind of a disk resource, without its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskKind {
    /// Shared, divisible disk space on the agent's root filesystem.
    Root,
    /// Path-based disk space, divisible.
    Path,
    /// A whole dedicated disk; consumed indivisibly.
    Mount,
}

/// The provenance of a disk resource.
///
/// Ordering is derived so disk sources can key deterministic maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiskSource {
    Root,
    Path { root: String },
    Mount { root: String },
}

impl DiskSource {
    /// Returns the provenance kind.
    #[must_use]
    pub fn kind(&self) -> DiskKind {
        match self {
            DiskSource::Root => DiskKind::Root,
            DiskSource::Path { .. } => DiskKind::Path,
            DiskSource::Mount { .. } => DiskKind::Mount,
        }
    }
}

/// A persistent volume bound to a disk resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persistence {
    /// The volume identifier; contents survive task termination.
    pub id: VolumeId,

    /// Principal that created the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
}

/// Disk-specific resource metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub source: DiskSource,

    /// Present when this disk fragment is a persistent volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<Persistence>,
}

// =============================================================================
// Reservations
// =============================================================================

/// A dynamic reservation on a resource.
///
/// The reservation's role is the resource's role; labels identify the
/// reserving framework and owning task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInfo {
    /// Principal the reservation was made under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,

    /// Reservation labels; matched by full-set equality.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

// =============================================================================
// Resources
// =============================================================================

/// A single resource fragment of an offer or a launch payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name (`cpus`, `mem`, `disk`, `gpus`, `ports`).
    pub name: String,

    /// The role this fragment is offered under. `*` means unreserved.
    pub role: String,

    /// Present when the fragment is dynamically reserved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<ReservationInfo>,

    pub value: Value,

    /// Disk provenance; only meaningful for `disk` resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskInfo>,
}

impl Resource {
    /// Creates an unreserved scalar resource.
    #[must_use]
    pub fn scalar(name: &str, amount: f64) -> Self {
        Self {
            name: name.to_string(),
            role: UNRESERVED_ROLE.to_string(),
            reservation: None,
            value: Value::Scalar(amount),
            disk: None,
        }
    }

    /// Creates an unreserved `ports` resource from ranges.
    #[must_use]
    pub fn ports(ranges: Vec<PortRange>) -> Self {
        Self {
            name: PORTS.to_string(),
            role: UNRESERVED_ROLE.to_string(),
            reservation: None,
            value: Value::Ranges(ranges),
            disk: None,
        }
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    /// Attaches a dynamic reservation.
    #[must_use]
    pub fn with_reservation(mut self, reservation: ReservationInfo) -> Self {
        self.reservation = Some(reservation);
        self
    }

    /// Attaches disk metadata.
    #[must_use]
    pub fn with_disk(mut self, disk: DiskInfo) -> Self {
        self.disk = Some(disk);
        self
    }

    /// Returns the scalar amount, if this is a scalar resource.
    #[must_use]
    pub fn scalar_value(&self) -> Option<f64> {
        match &self.value {
            Value::Scalar(v) => Some(*v),
            Value::Ranges(_) => None,
        }
    }

    /// Returns the ranges, if this is a range resource.
    #[must_use]
    pub fn port_ranges(&self) -> Option<&[PortRange]> {
        match &self.value {
            Value::Ranges(r) => Some(r),
            Value::Scalar(_) => None,
        }
    }

    /// Returns true if the fragment is unreserved.
    #[must_use]
    pub fn is_unreserved(&self) -> bool {
        self.role == UNRESERVED_ROLE && self.reservation.is_none()
    }

    /// Returns true if the fragment carries a persistent volume.
    #[must_use]
    pub fn has_persistence(&self) -> bool {
        self.disk
            .as_ref()
            .is_some_and(|d| d.persistence.is_some())
    }

    /// Returns the disk source, if any.
    #[must_use]
    pub fn disk_source(&self) -> Option<&DiskSource> {
        self.disk.as_ref().map(|d| &d.source)
    }

    /// Returns the persistent volume ID, if any.
    #[must_use]
    pub fn persistence_id(&self) -> Option<&VolumeId> {
        self.disk
            .as_ref()
            .and_then(|d| d.persistence.as_ref())
            .map(|p| &p.id)
    }
}
