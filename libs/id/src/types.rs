//! Typed ID definitions for all orchestrator resources.
//!
//! Run spec IDs are hierarchical paths; instance, task, and volume IDs embed
//! their owning run spec so that an ID alone is enough to route it. IDs owned
//! by the resource manager are opaque strings.

use crate::{define_opaque_id, IdError};
use ulid::Ulid;

const INSTANCE_MARKER: &str = "instance-";

/// Returns true for a valid path / container-name segment.
///
/// Segments are lowercase alphanumerics and dashes. Underscores and dots are
/// excluded so that the flattened forms used inside instance and task IDs
/// stay unambiguous.
fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// =============================================================================
// Run Specs
// =============================================================================

/// The identifier of a run specification: an absolute, hierarchical path.
///
/// Example: `/prod/db/postgres`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunSpecId {
    path: String,
}

impl RunSpecId {
    /// Parses a run spec ID from its canonical path form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(IdError::NotAbsolute(s.to_string()));
        };
        if rest.is_empty() {
            return Err(IdError::InvalidFormat {
                message: "run spec ID must have at least one segment".to_string(),
            });
        }
        for segment in rest.split('/') {
            if !is_valid_segment(segment) {
                return Err(IdError::InvalidSegment {
                    id: s.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self {
            path: s.to_string(),
        })
    }

    /// Reconstructs a run spec ID from its flattened (underscore) form.
    pub fn from_safe_path(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let mut path = String::with_capacity(s.len() + 1);
        for segment in s.split('_') {
            if !is_valid_segment(segment) {
                return Err(IdError::InvalidSegment {
                    id: s.to_string(),
                    segment: segment.to_string(),
                });
            }
            path.push('/');
            path.push_str(segment);
        }
        Ok(Self { path })
    }

    /// Returns the canonical path form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Iterates over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path[1..].split('/')
    }

    /// Returns the flattened form used inside instance and task IDs
    /// (`/prod/db/postgres` → `prod_db_postgres`).
    #[must_use]
    pub fn safe_path(&self) -> String {
        self.path[1..].replace('/', "_")
    }

    /// Returns the dotted form used for task names
    /// (`/prod/db/postgres` → `prod.db.postgres`).
    #[must_use]
    pub fn dotted(&self) -> String {
        self.path[1..].replace('/', ".")
    }
}

impl std::fmt::Display for RunSpecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl std::str::FromStr for RunSpecId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for RunSpecId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> serde::Deserialize<'de> for RunSpecId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Instances
// =============================================================================

/// The identifier of an instance: a running or pending incarnation of a
/// run spec.
///
/// Canonical form: `{safe_path}.instance-{ulid}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId {
    run_spec: RunSpecId,
    ulid: Ulid,
}

impl InstanceId {
    /// Mints a fresh instance ID for a run spec.
    #[must_use]
    pub fn for_run_spec(run_spec: &RunSpecId) -> Self {
        Self {
            run_spec: run_spec.clone(),
            ulid: Ulid::new(),
        }
    }

    /// Builds an instance ID from a caller-provided ULID.
    ///
    /// Callers that need replayable IDs derive the ULID from their inputs.
    #[must_use]
    pub fn from_parts(run_spec: &RunSpecId, ulid: Ulid) -> Self {
        Self {
            run_spec: run_spec.clone(),
            ulid,
        }
    }

    /// Parses an instance ID from its canonical form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let mut parts = s.split('.');
        let (Some(prefix), Some(marker), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(IdError::InvalidFormat {
                message: format!("expected '{{runspec}}.instance-{{ulid}}', got '{s}'"),
            });
        };
        let run_spec = RunSpecId::from_safe_path(prefix)?;
        let ulid = parse_instance_marker(s, marker)?;
        Ok(Self { run_spec, ulid })
    }

    /// Returns the owning run spec ID.
    #[must_use]
    pub fn run_spec_id(&self) -> &RunSpecId {
        &self.run_spec
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Returns the timestamp portion of the ULID in milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }
}

fn parse_instance_marker(id: &str, token: &str) -> Result<Ulid, IdError> {
    let Some(ulid_str) = token.strip_prefix(INSTANCE_MARKER) else {
        return Err(IdError::MissingInstanceMarker(id.to_string()));
    };
    ulid_str
        .parse::<Ulid>()
        .map_err(|e| IdError::InvalidUlid(e.to_string()))
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}{}",
            self.run_spec.safe_path(),
            INSTANCE_MARKER,
            self.ulid
        )
    }
}

impl std::str::FromStr for InstanceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for InstanceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for InstanceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// The identifier of a task.
///
/// App tasks are one-to-one with their instance and share its canonical form;
/// pod tasks append the container name:
///
/// - `prod_db_postgres.instance-01HV...` (app)
/// - `prod_gateway.instance-01HV....proxy` (pod container `proxy`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId {
    instance: InstanceId,
    container: Option<String>,
}

impl TaskId {
    /// Mints a fresh task ID (and implied instance) for a run spec.
    #[must_use]
    pub fn for_run_spec(run_spec: &RunSpecId) -> Self {
        Self {
            instance: InstanceId::for_run_spec(run_spec),
            container: None,
        }
    }

    /// Returns the app task ID for an existing instance.
    #[must_use]
    pub fn for_instance(instance: &InstanceId) -> Self {
        Self {
            instance: instance.clone(),
            container: None,
        }
    }

    /// Returns the pod task ID for a container of an existing instance.
    pub fn for_container(instance: &InstanceId, container: &str) -> Result<Self, IdError> {
        if !is_valid_segment(container) {
            return Err(IdError::InvalidSegment {
                id: instance.to_string(),
                segment: container.to_string(),
            });
        }
        Ok(Self {
            instance: instance.clone(),
            container: Some(container.to_string()),
        })
    }

    /// Parses a task ID from its canonical form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [prefix, marker] => {
                let run_spec = RunSpecId::from_safe_path(prefix)?;
                let ulid = parse_instance_marker(s, marker)?;
                Ok(Self {
                    instance: InstanceId { run_spec, ulid },
                    container: None,
                })
            }
            [prefix, marker, container] => {
                let run_spec = RunSpecId::from_safe_path(prefix)?;
                let ulid = parse_instance_marker(s, marker)?;
                if !is_valid_segment(container) {
                    return Err(IdError::InvalidSegment {
                        id: s.to_string(),
                        segment: container.to_string(),
                    });
                }
                Ok(Self {
                    instance: InstanceId { run_spec, ulid },
                    container: Some(container.to_string()),
                })
            }
            _ => Err(IdError::InvalidFormat {
                message: format!("expected 2 or 3 dot-separated parts, got '{s}'"),
            }),
        }
    }

    /// Returns the owning run spec ID.
    #[must_use]
    pub fn run_spec_id(&self) -> &RunSpecId {
        self.instance.run_spec_id()
    }

    /// Returns the owning instance ID.
    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance
    }

    /// Returns the container name for pod tasks.
    #[must_use]
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}.{}", self.instance, container),
            None => write!(f, "{}", self.instance),
        }
    }
}

impl std::str::FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Persistent Volumes
// =============================================================================

/// The identifier of a local persistent volume.
///
/// Canonical form: `{safe_path}#{container_path}#{ulid}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId {
    run_spec: RunSpecId,
    container_path: String,
    ulid: Ulid,
}

impl VolumeId {
    /// Mints a fresh volume ID for a volume request of a run spec.
    pub fn for_volume(run_spec: &RunSpecId, container_path: &str) -> Result<Self, IdError> {
        Self::from_parts(run_spec, container_path, Ulid::new())
    }

    /// Builds a volume ID from a caller-provided ULID.
    pub fn from_parts(
        run_spec: &RunSpecId,
        container_path: &str,
        ulid: Ulid,
    ) -> Result<Self, IdError> {
        if container_path.is_empty() {
            return Err(IdError::Empty);
        }
        if container_path.contains('#') {
            return Err(IdError::InvalidFormat {
                message: format!("container path must not contain '#': '{container_path}'"),
            });
        }
        Ok(Self {
            run_spec: run_spec.clone(),
            container_path: container_path.to_string(),
            ulid,
        })
    }

    /// Parses a volume ID from its canonical form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let parts: Vec<&str> = s.split('#').collect();
        let [prefix, container_path, ulid_str] = parts.as_slice() else {
            return Err(IdError::MissingSeparator {
                id: s.to_string(),
                separator: '#',
            });
        };
        let run_spec = RunSpecId::from_safe_path(prefix)?;
        if container_path.is_empty() {
            return Err(IdError::Empty);
        }
        let ulid = ulid_str
            .parse::<Ulid>()
            .map_err(|e| IdError::InvalidUlid(e.to_string()))?;
        Ok(Self {
            run_spec,
            container_path: container_path.to_string(),
            ulid,
        })
    }

    /// Returns the owning run spec ID.
    #[must_use]
    pub fn run_spec_id(&self) -> &RunSpecId {
        &self.run_spec
    }

    /// Returns the container path this volume mounts at.
    #[must_use]
    pub fn container_path(&self) -> &str {
        &self.container_path
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}#{}",
            self.run_spec.safe_path(),
            self.container_path,
            self.ulid
        )
    }
}

impl std::str::FromStr for VolumeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for VolumeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for VolumeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Resource-Manager Identities
// =============================================================================

define_opaque_id!(OfferId);
define_opaque_id!(AgentId);
define_opaque_id!(FrameworkId);
