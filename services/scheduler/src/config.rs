//! Configuration for the scheduler core.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Duration;

use armada_mesos::UNRESERVED_ROLE;

/// Scheduler core configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Role under which the framework makes dynamic reservations.
    pub role: Option<String>,

    /// Principal recorded on reservations and volumes.
    pub principal: Option<String>,

    /// Roles a run spec may consume when it does not restrict them itself.
    pub default_accepted_resource_roles: BTreeSet<String>,

    /// Prefix prepended to every generated environment variable name.
    /// User-supplied variables are never prefixed.
    pub env_vars_prefix: Option<String>,

    /// How long a fresh or suspended reservation may wait for a matching
    /// offer before it is garbage-collected.
    pub task_reservation_timeout: Duration,

    /// Whether pod task records carry their host ports. The launch operation
    /// always carries the full per-container port list; defaults to `false`
    /// so task records stay lean.
    pub pod_tasks_carry_host_ports: bool,

    /// Whether a container status's `last_updated` tracks `last_changed`.
    /// Defaults to `true`: the two are equal unless a repeated status report
    /// arrives for an unchanged state.
    pub container_status_last_updated_tracks_changed: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut default_roles = BTreeSet::new();
        default_roles.insert(UNRESERVED_ROLE.to_string());
        Self {
            role: None,
            principal: None,
            default_accepted_resource_roles: default_roles,
            env_vars_prefix: None,
            task_reservation_timeout: Duration::seconds(20),
            pod_tasks_carry_host_ports: false,
            container_status_last_updated_tracks_changed: true,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(role) = std::env::var("ARMADA_ROLE") {
            if !role.is_empty() {
                config.role = Some(role);
            }
        }

        if let Ok(principal) = std::env::var("ARMADA_PRINCIPAL") {
            if !principal.is_empty() {
                config.principal = Some(principal);
            }
        }

        if let Ok(roles) = std::env::var("ARMADA_DEFAULT_ACCEPTED_RESOURCE_ROLES") {
            let parsed: BTreeSet<String> = roles
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                config.default_accepted_resource_roles = parsed;
            }
        }

        if let Ok(prefix) = std::env::var("ARMADA_ENV_VARS_PREFIX") {
            if !prefix.is_empty() {
                config.env_vars_prefix = Some(prefix);
            }
        }

        if let Ok(timeout_ms) = std::env::var("ARMADA_TASK_RESERVATION_TIMEOUT_MS") {
            let millis: i64 = timeout_ms
                .parse()
                .context("ARMADA_TASK_RESERVATION_TIMEOUT_MS must be an integer")?;
            config.task_reservation_timeout = Duration::milliseconds(millis);
        }

        if let Ok(v) = std::env::var("ARMADA_POD_TASKS_CARRY_HOST_PORTS") {
            config.pod_tasks_carry_host_ports = v == "1" || v.to_lowercase() == "true";
        }

        if let Ok(v) = std::env::var("ARMADA_CONTAINER_STATUS_LAST_UPDATED_TRACKS_CHANGED") {
            config.container_status_last_updated_tracks_changed =
                v == "1" || v.to_lowercase() == "true";
        }

        Ok(config)
    }

    /// The role set a run spec may consume, given its own restriction.
    #[must_use]
    pub fn accepted_roles_for(&self, spec_roles: Option<&BTreeSet<String>>) -> BTreeSet<String> {
        match spec_roles {
            Some(roles) if !roles.is_empty() => roles.clone(),
            _ => self.default_accepted_resource_roles.clone(),
        }
    }
}
