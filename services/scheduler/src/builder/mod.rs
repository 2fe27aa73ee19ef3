//! Task and task-group builders.
//!
//! A builder turns a successful [`ResourceMatch`](crate::matcher::ResourceMatch)
//! into the resource manager's launch payload: command, environment, port
//! wiring, container image, volume mounts, and the matched resources with
//! their role and reservation metadata intact.

pub mod plugin;

pub use plugin::{apply_task_group_processors, apply_task_processors, RunSpecTaskProcessor};

use armada_id::{InstanceId, TaskId};
use armada_mesos::{
    CommandInfo, ContainerInfo, DiskInfo, Environment, ExecutorInfo, HealthCheck, Offer, Resource,
    TaskGroupInfo, TaskInfo, Value, VolumeMapping, CPUS, DISK, GPUS, MEM, SCALAR_EPSILON,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::matcher::{ConsumedResource, PortAssignment, ResourceMatch};
use crate::spec::{AppSpec, ContainerSpec, HealthCheckSpec, PodSpec, ResourceDemand};

// =============================================================================
// Build Results
// =============================================================================

/// An endpoint health check's association with its assigned host port.
///
/// HTTP and TCP checks are evaluated by the framework, not the agent, so the
/// payload carries nothing for them; the association is handed back to the
/// caller instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAssociation {
    pub endpoint: String,
    pub host_port: Option<u32>,
}

/// The built single-task payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBuildResult {
    pub task_info: TaskInfo,
    pub endpoint_associations: Vec<EndpointAssociation>,
}

/// The built task-group payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroupBuildResult {
    pub executor_info: ExecutorInfo,
    pub task_group_info: TaskGroupInfo,

    /// Host ports per container, in pod declaration order.
    pub host_ports_by_container: Vec<Vec<u32>>,

    pub endpoint_associations: Vec<EndpointAssociation>,
}

// =============================================================================
// App Tasks
// =============================================================================

/// Builds the launch payload for an app task.
///
/// `persistent_volumes` carries the offer's volume resources when launching
/// on a reservation; it is empty for ephemeral launches.
pub fn build_app_task(
    config: &SchedulerConfig,
    app: &AppSpec,
    task_id: TaskId,
    offer: &Offer,
    matched: &ResourceMatch,
    persistent_volumes: &[Resource],
) -> SchedulerResult<TaskBuildResult> {
    let declared = app
        .endpoints
        .iter()
        .filter(|e| e.host_port.is_some())
        .count();
    if declared != matched.port_assignments.len() {
        return Err(SchedulerError::BuilderFailure {
            reason: format!(
                "match assigned {} host ports but '{}' declares {declared}",
                matched.port_assignments.len(),
                app.id
            ),
        });
    }

    let mut resources = matched.launch_resources();
    resources.extend(persistent_volumes.iter().cloned());

    let mut environment = Environment::default();
    for (name, value) in &app.env {
        environment.push(name.clone(), value.clone());
    }
    push_generated_env(
        config,
        &mut environment,
        &offer.hostname,
        &matched.port_assignments,
        &task_id,
        app.id.as_str(),
        app.version,
    );

    let command = CommandInfo {
        value: app.cmd.clone(),
        arguments: app.args.clone(),
        environment,
        shell: app.cmd.is_some(),
    };

    let container = build_container(app.image.as_deref(), app, persistent_volumes);

    let (health_check, endpoint_associations) =
        translate_health_check(app.health_check.as_ref(), &matched.port_assignments);

    Ok(TaskBuildResult {
        task_info: TaskInfo {
            task_id,
            name: app.id.dotted(),
            agent_id: offer.agent_id.clone(),
            resources,
            command: Some(command),
            container,
            health_check,
            labels: BTreeMap::new(),
        },
        endpoint_associations,
    })
}

/// Mounts for the app's persistent volumes, pairing each offered volume with
/// its originating request by container path.
fn build_container(
    image: Option<&str>,
    app: &AppSpec,
    persistent_volumes: &[Resource],
) -> Option<ContainerInfo> {
    let mut volumes = Vec::new();
    for resource in persistent_volumes {
        let Some(volume_id) = resource.persistence_id() else {
            continue;
        };
        let read_only = app
            .volumes
            .iter()
            .find(|request| request.container_path == volume_id.container_path())
            .map(|request| request.read_only)
            .unwrap_or(false);
        volumes.push(VolumeMapping {
            container_path: volume_id.container_path().to_string(),
            volume_id: Some(volume_id.clone()),
            read_only,
        });
    }

    if image.is_none() && volumes.is_empty() {
        return None;
    }
    Some(ContainerInfo {
        image: image.map(String::from),
        volumes,
    })
}

// =============================================================================
// Pod Task Groups
// =============================================================================

/// Builds the executor and task-group payload for a pod instance.
pub fn build_pod_task_group(
    config: &SchedulerConfig,
    pod: &PodSpec,
    instance_id: &InstanceId,
    offer: &Offer,
    matched: &ResourceMatch,
    framework_id: &armada_id::FrameworkId,
) -> SchedulerResult<TaskGroupBuildResult> {
    let declared: usize = pod
        .containers
        .iter()
        .map(|c| c.host_port_endpoints().count())
        .sum();
    if declared != matched.port_assignments.len() {
        return Err(SchedulerError::BuilderFailure {
            reason: format!(
                "match assigned {} host ports but pod '{}' declares {declared}",
                matched.port_assignments.len(),
                pod.id
            ),
        });
    }

    // Split the matched fragments across the executor and the containers so
    // that role and reservation metadata survive the split.
    let mut pool: Vec<ConsumedResource> = matched.consumed.clone();
    let executor_resources = take_demand(&mut pool, &pod.executor_resources, &pod.id.to_string())?;

    let mut tasks = Vec::with_capacity(pod.containers.len());
    let mut host_ports_by_container = Vec::with_capacity(pod.containers.len());
    let mut endpoint_associations = Vec::new();
    let mut next_assignment = 0usize;

    for container in &pod.containers {
        let port_count = container.host_port_endpoints().count();
        let assignments = &matched.port_assignments[next_assignment..next_assignment + port_count];
        next_assignment += port_count;

        let task = build_pod_task(config, pod, container, instance_id, offer, assignments)?;
        let mut resources = take_demand(&mut pool, &container.resources, &pod.id.to_string())?;
        resources.extend(ports_resource_for(assignments));

        tasks.push(TaskInfo {
            resources,
            ..task.task_info
        });
        host_ports_by_container.push(assignments.iter().map(|a| a.port).collect());
        endpoint_associations.extend(task.endpoint_associations);
    }

    let executor_info = ExecutorInfo {
        executor_id: instance_id.to_string(),
        framework_id: framework_id.clone(),
        resources: executor_resources,
    };

    Ok(TaskGroupBuildResult {
        executor_info,
        task_group_info: TaskGroupInfo { tasks },
        host_ports_by_container,
        endpoint_associations,
    })
}

/// Builds one container's task of a pod (resources are attached by the
/// caller after splitting the pool).
fn build_pod_task(
    config: &SchedulerConfig,
    pod: &PodSpec,
    container: &ContainerSpec,
    instance_id: &InstanceId,
    offer: &Offer,
    assignments: &[PortAssignment],
) -> SchedulerResult<TaskBuildResult> {
    let task_id = TaskId::for_container(instance_id, &container.name).map_err(|e| {
        SchedulerError::BuilderFailure {
            reason: format!("container name '{}' is not a valid task segment: {e}", container.name),
        }
    })?;

    let mut environment = Environment::default();
    for (name, value) in &container.env {
        environment.push(name.clone(), value.clone());
    }
    push_generated_env(
        config,
        &mut environment,
        &offer.hostname,
        assignments,
        &task_id,
        pod.id.as_str(),
        pod.version,
    );

    let command = CommandInfo {
        value: container.cmd.clone(),
        arguments: container.args.clone(),
        environment,
        shell: container.cmd.is_some(),
    };

    let (health_check, endpoint_associations) =
        translate_health_check(container.health_check.as_ref(), assignments);

    Ok(TaskBuildResult {
        task_info: TaskInfo {
            task_id,
            name: format!("{}.{}", pod.id.dotted(), container.name),
            agent_id: offer.agent_id.clone(),
            resources: vec![],
            command: Some(command),
            container: container.image.as_ref().map(|image| ContainerInfo {
                image: Some(image.clone()),
                volumes: vec![],
            }),
            health_check,
            labels: BTreeMap::new(),
        },
        endpoint_associations,
    })
}

/// Splits scalar fragments out of the pool to cover one demand.
fn take_demand(
    pool: &mut [ConsumedResource],
    demand: &ResourceDemand,
    owner: &str,
) -> SchedulerResult<Vec<Resource>> {
    let mut out = Vec::new();
    for (name, amount) in [
        (CPUS, demand.cpus),
        (MEM, demand.mem),
        (DISK, demand.disk),
        (GPUS, demand.gpus),
    ] {
        let mut outstanding = amount;
        for fragment in pool.iter_mut().filter(|f| f.name == name) {
            if outstanding <= SCALAR_EPSILON {
                break;
            }
            let take = fragment.amount.min(outstanding);
            if take <= SCALAR_EPSILON {
                continue;
            }
            fragment.amount -= take;
            outstanding -= take;
            out.push(Resource {
                name: name.to_string(),
                role: fragment.role.clone(),
                reservation: fragment.reservation.clone(),
                value: Value::Scalar(take),
                disk: fragment.disk_source.clone().map(|source| DiskInfo {
                    source,
                    persistence: None,
                }),
            });
        }
        if outstanding > SCALAR_EPSILON {
            return Err(SchedulerError::BuilderFailure {
                reason: format!("match does not cover {name} demand of '{owner}'"),
            });
        }
    }
    Ok(out)
}

/// Renders a container's port assignments as a `ports` resource.
fn ports_resource_for(assignments: &[PortAssignment]) -> Vec<Resource> {
    let partial = ResourceMatch {
        consumed: vec![],
        port_assignments: assignments.to_vec(),
        volume_allocations: vec![],
    };
    partial
        .launch_resources()
        .into_iter()
        .filter(|r| r.name == armada_mesos::PORTS)
        .collect()
}

// =============================================================================
// Environment and Health Checks
// =============================================================================

fn prefixed(config: &SchedulerConfig, name: &str) -> String {
    match &config.env_vars_prefix {
        Some(prefix) => format!("{prefix}{name}"),
        None => name.to_string(),
    }
}

/// Appends the generated variables. User-supplied variables are pushed by
/// the caller first and are never prefixed.
fn push_generated_env(
    config: &SchedulerConfig,
    environment: &mut Environment,
    hostname: &str,
    assignments: &[PortAssignment],
    task_id: &TaskId,
    run_spec_id: &str,
    version: DateTime<Utc>,
) {
    environment.push(prefixed(config, "HOST"), hostname.to_string());

    for (index, assignment) in assignments.iter().enumerate() {
        let port = assignment.port.to_string();
        environment.push(prefixed(config, &format!("PORT{index}")), port.clone());
        let endpoint_var = assignment.endpoint.to_uppercase().replace('-', "_");
        environment.push(prefixed(config, &format!("PORT_{endpoint_var}")), port);
    }
    if !assignments.is_empty() {
        let ports_list = assignments
            .iter()
            .map(|a| a.port.to_string())
            .collect::<Vec<_>>()
            .join(",");
        environment.push(prefixed(config, "PORTS"), ports_list);
        environment.push(prefixed(config, "PORT"), assignments[0].port.to_string());
    }

    environment.push(prefixed(config, "TASK_ID"), task_id.to_string());
    environment.push(prefixed(config, "APP_ID"), run_spec_id.to_string());
    environment.push(prefixed(config, "APP_VERSION"), version.to_rfc3339());
}

/// Command checks travel with the payload; endpoint checks only record
/// their association with the assigned host port.
fn translate_health_check(
    check: Option<&HealthCheckSpec>,
    assignments: &[PortAssignment],
) -> (Option<HealthCheck>, Vec<EndpointAssociation>) {
    match check {
        None => (None, vec![]),
        Some(HealthCheckSpec::Command { value }) => (
            Some(HealthCheck {
                command: value.clone(),
            }),
            vec![],
        ),
        Some(HealthCheckSpec::Http { endpoint, .. }) | Some(HealthCheckSpec::Tcp { endpoint }) => {
            let host_port = assignments
                .iter()
                .find(|a| a.endpoint == *endpoint)
                .map(|a| a.port);
            (
                None,
                vec![EndpointAssociation {
                    endpoint: endpoint.clone(),
                    host_port,
                }],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::VolumeAllocation;
    use crate::spec::{Endpoint, VolumeRequest};
    use armada_id::{AgentId, OfferId, RunSpecId, VolumeId};
    use armada_mesos::{DiskKind, DiskSource, Persistence, PortRange};

    fn offer() -> Offer {
        Offer {
            id: OfferId::new("offer-1"),
            framework_id: Some(armada_id::FrameworkId::new("fw-1")),
            agent_id: AgentId::new("agent-1"),
            hostname: "host-1".to_string(),
            attributes: BTreeMap::new(),
            resources: vec![],
        }
    }

    fn app(id: &str) -> AppSpec {
        AppSpec {
            id: RunSpecId::parse(id).unwrap(),
            version: Utc::now(),
            cmd: Some("sleep 600".to_string()),
            args: vec![],
            env: BTreeMap::new(),
            resources: ResourceDemand {
                cpus: 0.2,
                mem: 16.0,
                disk: 0.0,
                gpus: 0.0,
            },
            image: None,
            endpoints: vec![],
            health_check: None,
            volumes: vec![],
            accepted_resource_roles: None,
            constraints: vec![],
        }
    }

    fn matched(cpus: f64, mem: f64, ports: &[(&str, u32)]) -> ResourceMatch {
        ResourceMatch {
            consumed: vec![
                ConsumedResource {
                    name: CPUS.to_string(),
                    amount: cpus,
                    role: "*".to_string(),
                    reservation: None,
                    disk_source: None,
                },
                ConsumedResource {
                    name: MEM.to_string(),
                    amount: mem,
                    role: "*".to_string(),
                    reservation: None,
                    disk_source: None,
                },
            ],
            port_assignments: ports
                .iter()
                .map(|(endpoint, port)| PortAssignment {
                    endpoint: endpoint.to_string(),
                    port: *port,
                    role: "*".to_string(),
                    reservation: None,
                })
                .collect(),
            volume_allocations: vec![],
        }
    }

    #[test]
    fn test_build_app_task_wires_env_and_command() {
        let mut spec = app("/prod/web");
        spec.env.insert("DATABASE_URL".to_string(), "postgres://db".to_string());
        spec.endpoints.push(Endpoint::any_port("http"));

        let task_id = TaskId::for_run_spec(&spec.id);
        let result = build_app_task(
            &SchedulerConfig::default(),
            &spec,
            task_id.clone(),
            &offer(),
            &matched(0.2, 16.0, &[("http", 31001)]),
            &[],
        )
        .unwrap();

        let task_info = &result.task_info;
        assert_eq!(task_info.name, "prod.web");
        assert_eq!(task_info.task_id, task_id);

        let command = task_info.command.as_ref().unwrap();
        assert!(command.shell);
        assert_eq!(command.value.as_deref(), Some("sleep 600"));

        let vars: BTreeMap<&str, &str> = command
            .environment
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.value.as_str()))
            .collect();
        assert_eq!(vars["DATABASE_URL"], "postgres://db");
        assert_eq!(vars["HOST"], "host-1");
        assert_eq!(vars["PORT0"], "31001");
        assert_eq!(vars["PORT_HTTP"], "31001");
        assert_eq!(vars["PORTS"], "31001");
        assert_eq!(vars["APP_ID"], "/prod/web");
        assert_eq!(vars["TASK_ID"], task_id.to_string());
    }

    #[test]
    fn test_env_vars_prefix_applies_to_generated_only() {
        let mut spec = app("/prod/web");
        spec.env.insert("USER_VAR".to_string(), "1".to_string());

        let config = SchedulerConfig {
            env_vars_prefix: Some("ARMADA_".to_string()),
            ..SchedulerConfig::default()
        };
        let result = build_app_task(
            &config,
            &spec,
            TaskId::for_run_spec(&spec.id),
            &offer(),
            &matched(0.2, 16.0, &[]),
            &[],
        )
        .unwrap();

        let names: Vec<&str> = result
            .task_info
            .command
            .as_ref()
            .unwrap()
            .environment
            .variables
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert!(names.contains(&"USER_VAR"));
        assert!(names.contains(&"ARMADA_HOST"));
        assert!(names.contains(&"ARMADA_TASK_ID"));
        assert!(!names.contains(&"HOST"));
    }

    #[test]
    fn test_port_count_mismatch_is_builder_failure() {
        let mut spec = app("/prod/web");
        spec.endpoints.push(Endpoint::any_port("http"));

        let result = build_app_task(
            &SchedulerConfig::default(),
            &spec,
            TaskId::for_run_spec(&spec.id),
            &offer(),
            &matched(0.2, 16.0, &[]),
            &[],
        );
        assert!(matches!(
            result,
            Err(SchedulerError::BuilderFailure { .. })
        ));
    }

    #[test]
    fn test_endpoint_health_check_records_association_only() {
        let mut spec = app("/prod/web");
        spec.endpoints.push(Endpoint::any_port("http"));
        spec.health_check = Some(HealthCheckSpec::Http {
            endpoint: "http".to_string(),
            path: Some("/health".to_string()),
        });

        let result = build_app_task(
            &SchedulerConfig::default(),
            &spec,
            TaskId::for_run_spec(&spec.id),
            &offer(),
            &matched(0.2, 16.0, &[("http", 31004)]),
            &[],
        )
        .unwrap();

        assert!(result.task_info.health_check.is_none());
        assert_eq!(
            result.endpoint_associations,
            vec![EndpointAssociation {
                endpoint: "http".to_string(),
                host_port: Some(31004),
            }]
        );
    }

    #[test]
    fn test_command_health_check_travels_with_payload() {
        let mut spec = app("/prod/web");
        spec.health_check = Some(HealthCheckSpec::Command {
            value: "pgrep sleep".to_string(),
        });

        let result = build_app_task(
            &SchedulerConfig::default(),
            &spec,
            TaskId::for_run_spec(&spec.id),
            &offer(),
            &matched(0.2, 16.0, &[]),
            &[],
        )
        .unwrap();

        assert_eq!(
            result.task_info.health_check.as_ref().unwrap().command,
            "pgrep sleep"
        );
        assert!(result.endpoint_associations.is_empty());
    }

    #[test]
    fn test_persistent_volumes_mount_into_container() {
        let mut spec = app("/prod/db");
        spec.volumes.push(VolumeRequest {
            container_path: "data".to_string(),
            size_mb: 100.0,
            kind: DiskKind::Root,
            read_only: false,
        });

        let volume_id = VolumeId::for_volume(&spec.id, "data").unwrap();
        let volume = Resource::scalar(DISK, 100.0)
            .with_role("database")
            .with_disk(DiskInfo {
                source: DiskSource::Root,
                persistence: Some(Persistence {
                    id: volume_id.clone(),
                    principal: None,
                }),
            });

        let result = build_app_task(
            &SchedulerConfig::default(),
            &spec,
            TaskId::for_run_spec(&spec.id),
            &offer(),
            &matched(0.2, 16.0, &[]),
            &[volume.clone()],
        )
        .unwrap();

        let container = result.task_info.container.as_ref().unwrap();
        assert_eq!(
            container.volumes,
            vec![VolumeMapping {
                container_path: "data".to_string(),
                volume_id: Some(volume_id),
                read_only: false,
            }]
        );
        assert!(result.task_info.resources.contains(&volume));
    }

    #[test]
    fn test_build_pod_task_group() {
        let run_spec = RunSpecId::parse("/prod/gateway").unwrap();
        let pod = PodSpec {
            id: run_spec.clone(),
            version: Utc::now(),
            containers: vec![
                ContainerSpec {
                    name: "proxy".to_string(),
                    resources: ResourceDemand {
                        cpus: 0.1,
                        mem: 32.0,
                        disk: 0.0,
                        gpus: 0.0,
                    },
                    endpoints: vec![Endpoint::any_port("http")],
                    image: Some("nginx:1.25".to_string()),
                    cmd: None,
                    args: vec![],
                    env: BTreeMap::new(),
                    health_check: None,
                },
                ContainerSpec {
                    name: "logger".to_string(),
                    resources: ResourceDemand {
                        cpus: 0.1,
                        mem: 32.0,
                        disk: 0.0,
                        gpus: 0.0,
                    },
                    endpoints: vec![],
                    image: None,
                    cmd: Some("tail -F /logs/access.log".to_string()),
                    args: vec![],
                    env: BTreeMap::new(),
                    health_check: None,
                },
            ],
            networks: vec![crate::spec::Network::Host],
            executor_resources: ResourceDemand {
                cpus: 0.1,
                mem: 32.0,
                disk: 0.0,
                gpus: 0.0,
            },
            accepted_resource_roles: None,
            constraints: vec![],
        };

        let instance_id = InstanceId::for_run_spec(&run_spec);
        let matched = ResourceMatch {
            consumed: vec![
                ConsumedResource {
                    name: CPUS.to_string(),
                    amount: 0.3,
                    role: "*".to_string(),
                    reservation: None,
                    disk_source: None,
                },
                ConsumedResource {
                    name: MEM.to_string(),
                    amount: 96.0,
                    role: "*".to_string(),
                    reservation: None,
                    disk_source: None,
                },
            ],
            port_assignments: vec![PortAssignment {
                endpoint: "http".to_string(),
                port: 31000,
                role: "*".to_string(),
                reservation: None,
            }],
            volume_allocations: vec![],
        };

        let result = build_pod_task_group(
            &SchedulerConfig::default(),
            &pod,
            &instance_id,
            &offer(),
            &matched,
            &armada_id::FrameworkId::new("fw-1"),
        )
        .unwrap();

        assert_eq!(result.executor_info.executor_id, instance_id.to_string());
        assert_eq!(result.task_group_info.tasks.len(), 2);
        assert_eq!(result.host_ports_by_container, vec![vec![31000], vec![]]);

        let proxy = &result.task_group_info.tasks[0];
        assert_eq!(proxy.task_id.container(), Some("proxy"));
        assert_eq!(proxy.name, "prod.gateway.proxy");
        assert!(proxy
            .resources
            .iter()
            .any(|r| r.port_ranges() == Some(&[PortRange::new(31000, 31000)][..])));

        let logger = &result.task_group_info.tasks[1];
        assert_eq!(logger.task_id.container(), Some("logger"));
        assert!(logger.command.as_ref().unwrap().shell);

        // Executor overhead plus both containers exhaust the match.
        let executor_cpus: f64 = result
            .executor_info
            .resources
            .iter()
            .filter(|r| r.name == CPUS)
            .filter_map(Resource::scalar_value)
            .sum();
        assert!((executor_cpus - 0.1).abs() < SCALAR_EPSILON);
    }

    #[test]
    fn test_pod_group_fails_when_match_is_short() {
        let run_spec = RunSpecId::parse("/prod/gateway").unwrap();
        let pod = PodSpec {
            id: run_spec.clone(),
            version: Utc::now(),
            containers: vec![ContainerSpec {
                name: "proxy".to_string(),
                resources: ResourceDemand {
                    cpus: 1.0,
                    mem: 32.0,
                    disk: 0.0,
                    gpus: 0.0,
                },
                endpoints: vec![],
                image: None,
                cmd: None,
                args: vec![],
                env: BTreeMap::new(),
                health_check: None,
            }],
            networks: vec![],
            executor_resources: ResourceDemand::default(),
            accepted_resource_roles: None,
            constraints: vec![],
        };

        let instance_id = InstanceId::for_run_spec(&run_spec);
        let short = ResourceMatch {
            consumed: vec![ConsumedResource {
                name: CPUS.to_string(),
                amount: 0.5,
                role: "*".to_string(),
                reservation: None,
                disk_source: None,
            }],
            port_assignments: vec![],
            volume_allocations: vec![],
        };

        let result = build_pod_task_group(
            &SchedulerConfig::default(),
            &pod,
            &instance_id,
            &offer(),
            &short,
            &armada_id::FrameworkId::new("fw-1"),
        );
        assert!(matches!(
            result,
            Err(SchedulerError::BuilderFailure { .. })
        ));
    }

    #[test]
    fn test_volume_allocation_struct_is_value_copy() {
        // A VolumeAllocation carries its own copies of the request and
        // source; mutating the original request later cannot alias it.
        let request = VolumeRequest {
            container_path: "data".to_string(),
            size_mb: 100.0,
            kind: DiskKind::Root,
            read_only: false,
        };
        let allocation = VolumeAllocation {
            request: request.clone(),
            source: DiskSource::Root,
            role: "*".to_string(),
            reservation: None,
            consumed_mb: 100.0,
        };
        drop(request);
        assert_eq!(allocation.request.container_path, "data");
    }
}
