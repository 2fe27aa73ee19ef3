//! Status derivation for instances.
//!
//! Pod instances aggregate several task statuses; the derivation also checks
//! the invariant that every pod task names a container of its spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::spec::PodSpec;

use super::{Instance, InstanceStatus, Task};

/// Statuses ordered from most to least severe; the most severe task status
/// present becomes the instance status.
const SEVERITY: &[InstanceStatus] = &[
    InstanceStatus::Error,
    InstanceStatus::Failed,
    InstanceStatus::Gone,
    InstanceStatus::Dropped,
    InstanceStatus::Killed,
    InstanceStatus::Killing,
    InstanceStatus::Unreachable,
    InstanceStatus::Unknown,
    InstanceStatus::Staging,
    InstanceStatus::Starting,
    InstanceStatus::Created,
    InstanceStatus::Reserved,
    InstanceStatus::Finished,
    InstanceStatus::Running,
];

/// The derived status of one pod container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub status: InstanceStatus,
    pub last_updated: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
    pub healthy: Option<bool>,
}

/// Derives an instance-level status from its tasks.
#[must_use]
pub fn derive_instance_status<'a>(tasks: impl Iterator<Item = &'a Task>) -> InstanceStatus {
    let present: Vec<InstanceStatus> = tasks.map(Task::status).collect();
    for status in SEVERITY {
        if present.contains(status) {
            return *status;
        }
    }
    InstanceStatus::Unknown
}

/// Derives per-container statuses for a pod instance.
///
/// Fails with [`SchedulerError::Invariant`] if a task does not name a
/// container of the pod spec, or if a task record carries a host-port list
/// that disagrees with its container's declared host-port endpoints.
pub fn derive_pod_statuses(
    instance: &Instance,
    pod: &PodSpec,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> SchedulerResult<Vec<ContainerStatus>> {
    let mut statuses = Vec::with_capacity(instance.tasks.len());

    for (task_id, task) in &instance.tasks {
        let Some(container_name) = task_id.container() else {
            return Err(SchedulerError::Invariant {
                message: format!("pod task '{task_id}' has no container name"),
            });
        };
        let Some(container) = pod.container(container_name) else {
            return Err(SchedulerError::Invariant {
                message: format!(
                    "task '{task_id}' names container '{container_name}' which is not in pod '{}'",
                    pod.id
                ),
            });
        };

        if config.pod_tasks_carry_host_ports {
            if let Task::LaunchedEphemeral { host_ports, .. } = task {
                let declared = container.host_port_endpoints().count();
                if host_ports.len() != declared {
                    return Err(SchedulerError::Invariant {
                        message: format!(
                            "task '{task_id}' carries {} host ports but container \
                             '{container_name}' declares {declared}",
                            host_ports.len()
                        ),
                    });
                }
            }
        }

        let (status, since, healthy) = match task {
            Task::LaunchedEphemeral { state, .. }
            | Task::LaunchedOnReservation { state, .. } => {
                (state.status, state.since, state.healthy)
            }
            Task::Reserved { .. } => (InstanceStatus::Reserved, instance.state.since, None),
        };

        let last_updated = if config.container_status_last_updated_tracks_changed {
            since
        } else {
            now
        };

        statuses.push(ContainerStatus {
            name: container_name.to_string(),
            status,
            last_updated,
            last_changed: since,
            healthy,
        });
    }

    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{AgentInfo, InstanceState, TaskState};
    use crate::spec::{ContainerSpec, ResourceDemand};
    use armada_id::{AgentId, InstanceId, RunSpecId, TaskId};
    use std::collections::BTreeMap;

    fn pod(run_spec: &RunSpecId, containers: &[&str]) -> PodSpec {
        PodSpec {
            id: run_spec.clone(),
            version: Utc::now(),
            containers: containers
                .iter()
                .map(|name| ContainerSpec {
                    name: name.to_string(),
                    resources: ResourceDemand::default(),
                    endpoints: vec![],
                    image: None,
                    cmd: None,
                    args: vec![],
                    env: BTreeMap::new(),
                    health_check: None,
                })
                .collect(),
            networks: vec![],
            executor_resources: ResourceDemand::default(),
            accepted_resource_roles: None,
            constraints: vec![],
        }
    }

    fn pod_instance(run_spec: &RunSpecId, containers: &[&str]) -> Instance {
        let now = Utc::now();
        let instance_id = InstanceId::for_run_spec(run_spec);
        let mut tasks = BTreeMap::new();
        for name in containers {
            let task_id = TaskId::for_container(&instance_id, name).unwrap();
            tasks.insert(
                task_id.clone(),
                Task::LaunchedEphemeral {
                    task_id,
                    run_spec_version: now,
                    state: TaskState::created(now),
                    host_ports: vec![],
                },
            );
        }
        Instance {
            instance_id,
            agent_info: AgentInfo {
                agent_id: AgentId::new("agent-1"),
                host: "host-1".to_string(),
                attributes: BTreeMap::new(),
            },
            state: InstanceState {
                status: InstanceStatus::Created,
                since: now,
                run_spec_version: now,
                healthy: None,
            },
            tasks,
            run_spec_version: now,
        }
    }

    #[test]
    fn test_derive_pod_statuses() {
        let run_spec = RunSpecId::parse("/prod/gateway").unwrap();
        let pod = pod(&run_spec, &["logger", "proxy"]);
        let instance = pod_instance(&run_spec, &["proxy", "logger"]);

        let statuses =
            derive_pod_statuses(&instance, &pod, &SchedulerConfig::default(), Utc::now()).unwrap();
        assert_eq!(statuses.len(), 2);
        for status in &statuses {
            assert_eq!(status.status, InstanceStatus::Created);
            assert_eq!(status.last_updated, status.last_changed);
        }
    }

    #[test]
    fn test_unknown_container_is_invariant_violation() {
        let run_spec = RunSpecId::parse("/prod/gateway").unwrap();
        let pod = pod(&run_spec, &["proxy"]);
        let instance = pod_instance(&run_spec, &["proxy", "stowaway"]);

        let result = derive_pod_statuses(&instance, &pod, &SchedulerConfig::default(), Utc::now());
        assert!(matches!(result, Err(SchedulerError::Invariant { .. })));
    }

    #[test]
    fn test_severity_ordering() {
        let run_spec = RunSpecId::parse("/prod/gateway").unwrap();
        let now = Utc::now();
        let instance_id = InstanceId::for_run_spec(&run_spec);

        let healthy_task = Task::LaunchedEphemeral {
            task_id: TaskId::for_container(&instance_id, "a").unwrap(),
            run_spec_version: now,
            state: TaskState {
                status: InstanceStatus::Running,
                since: now,
                healthy: None,
            },
            host_ports: vec![],
        };
        let failed_task = Task::LaunchedEphemeral {
            task_id: TaskId::for_container(&instance_id, "b").unwrap(),
            run_spec_version: now,
            state: TaskState {
                status: InstanceStatus::Failed,
                since: now,
                healthy: None,
            },
            host_ports: vec![],
        };

        let status = derive_instance_status([&healthy_task, &failed_task].into_iter());
        assert_eq!(status, InstanceStatus::Failed);

        let status = derive_instance_status([&healthy_task].into_iter());
        assert_eq!(status, InstanceStatus::Running);
    }
}
