//! The instance-op factory: entry point of the offer pipeline.
//!
//! Dispatches a `(run spec, offer, instances, demand)` request to the right
//! branch — ephemeral app, pod, or the two-phase stateful protocol — and
//! packages the result as a typed [`InstanceOp`] the caller applies against
//! its instance store and the resource manager.
//!
//! The factory is purely functional over its inputs. Fresh IDs are derived
//! from the inputs and the injected clock, so replaying a request yields an
//! identical operation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use armada_id::{FrameworkId, InstanceId, TaskId, Ulid, VolumeId};
use armada_mesos::{
    reservation_labels, ExecutorInfo, Offer, Operation, Resource, TaskGroupInfo, TaskInfo,
    UNRESERVED_ROLE,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::builder::{
    apply_task_group_processors, apply_task_processors, build_app_task, build_pod_task_group,
    RunSpecTaskProcessor,
};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::instance::{
    AgentInfo, Instance, InstanceState, InstanceStatus, Reservation, Task, TaskState,
};
use crate::matcher::{self, find_volume_match, MatchRequest, ResourceSelector};
use crate::spec::{AppSpec, PodSpec, RunSpec, VolumeRequest};

// =============================================================================
// Operations
// =============================================================================

/// A persistent volume to create alongside a reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVolume {
    pub id: VolumeId,

    pub request: VolumeRequest,

    /// The persistent-volume wire resource handed to the create operation.
    pub resource: Resource,
}

/// The instance-store mutation the caller must apply with an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateOp {
    /// Record a freshly reserved instance.
    Reserve { instance: Instance },

    /// Promote a `Reserved` task to `LaunchedOnReservation`.
    LaunchOnReservation {
        instance_id: InstanceId,
        run_spec_version: DateTime<Utc>,
        state: TaskState,
        host_ports: Vec<u32>,
    },
}

/// A typed instance operation produced by the factory.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceOp {
    /// Launch a stateless app task.
    LaunchEphemeral { task_info: TaskInfo, task: Task },

    /// Launch a pod as a task group under a shared executor.
    LaunchGroup {
        executor_info: ExecutorInfo,
        task_group_info: TaskGroupInfo,
        instance: Instance,
        host_ports: Vec<u32>,
    },

    /// Launch a stateful task on its existing reservation.
    LaunchOnReservation {
        task_info: TaskInfo,
        state_op: StateOp,
        task: Task,
    },

    /// Reserve resources and create persistent volumes for a stateful task.
    ReserveAndCreateVolumes {
        framework_id: FrameworkId,
        state_op: StateOp,
        resources: Vec<Resource>,
        local_volumes: Vec<LocalVolume>,
    },
}

impl InstanceOp {
    /// The accept-time operations to answer the offer with.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        match self {
            InstanceOp::LaunchEphemeral { task_info, .. }
            | InstanceOp::LaunchOnReservation { task_info, .. } => vec![Operation::Launch {
                task_infos: vec![task_info.clone()],
            }],
            InstanceOp::LaunchGroup {
                executor_info,
                task_group_info,
                ..
            } => vec![Operation::LaunchGroup {
                executor: executor_info.clone(),
                task_group: task_group_info.clone(),
            }],
            InstanceOp::ReserveAndCreateVolumes {
                resources,
                local_volumes,
                ..
            } => vec![
                Operation::Reserve {
                    resources: resources.clone(),
                },
                Operation::Create {
                    volumes: local_volumes.iter().map(|v| v.resource.clone()).collect(),
                },
            ],
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// One request to the factory.
#[derive(Debug, Clone)]
pub struct InstanceOpRequest<'a> {
    pub run_spec: &'a RunSpec,

    pub offer: &'a Offer,

    /// This run spec's instances, keyed by ID. Snapshots for different run
    /// specs must be disjoint.
    pub current_instances: &'a BTreeMap<InstanceId, Instance>,

    /// How many more launches the deployment planner wants.
    pub additional_launches: u32,

    pub framework_id: &'a FrameworkId,
}

/// Builds instance operations out of offers.
pub struct InstanceOpFactory {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    processors: Vec<Box<dyn RunSpecTaskProcessor>>,
}

impl InstanceOpFactory {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            processors: Vec::new(),
        }
    }

    /// Registers a plugin processor; processors apply in registration order.
    #[must_use]
    pub fn with_processor(mut self, processor: Box<dyn RunSpecTaskProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Decides whether the offer can serve the request and, if so, builds
    /// the operation.
    ///
    /// `Ok(None)` means the offer simply does not fit; the caller waits for
    /// the next one. Errors are defects the caller must not apply partially.
    pub fn build_instance_op(
        &self,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        match request.run_spec {
            RunSpec::App(app) if !app.volumes.is_empty() => self.infer_stateful(app, request),
            RunSpec::App(app) => self.infer_ephemeral_app(app, request),
            RunSpec::Pod(pod) => self.infer_pod(pod, request),
        }
    }

    // -------------------------------------------------------------------------
    // Ephemeral apps
    // -------------------------------------------------------------------------

    fn infer_ephemeral_app(
        &self,
        app: &AppSpec,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        let roles = self
            .config
            .accepted_roles_for(app.accepted_resource_roles.as_ref());
        let selector = ResourceSelector::any_of(roles);
        let peers: Vec<&Instance> = request.current_instances.values().collect();

        let match_request = MatchRequest {
            demand: app.resources,
            endpoints: app.endpoints.iter().collect(),
            volumes: &[],
            constraints: &app.constraints,
        };
        let Some(matched) = matcher::match_offer(request.offer, &match_request, &peers, &selector)
        else {
            debug!(run_spec = %app.id, offer = %request.offer.id, "Offer does not match");
            return Ok(None);
        };

        let now = self.clock.now();
        let task_id = self.mint_task_id(app, request, now);
        let built = build_app_task(
            &self.config,
            app,
            task_id.clone(),
            request.offer,
            &matched,
            &[],
        )?;
        let mut task_info = built.task_info;
        apply_task_processors(&self.processors, request.run_spec, &mut task_info);

        let task = Task::LaunchedEphemeral {
            task_id,
            run_spec_version: app.version,
            state: TaskState::created(now),
            host_ports: matched.host_ports(),
        };

        Ok(Some(InstanceOp::LaunchEphemeral { task_info, task }))
    }

    // -------------------------------------------------------------------------
    // Pods
    // -------------------------------------------------------------------------

    fn infer_pod(
        &self,
        pod: &PodSpec,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        let roles = self
            .config
            .accepted_roles_for(pod.accepted_resource_roles.as_ref());
        let selector = ResourceSelector::any_of(roles);
        let peers: Vec<&Instance> = request.current_instances.values().collect();

        let match_request = MatchRequest {
            demand: pod.total_demand(),
            endpoints: pod
                .containers
                .iter()
                .flat_map(|c| c.endpoints.iter())
                .collect(),
            volumes: &[],
            constraints: &pod.constraints,
        };
        let Some(matched) = matcher::match_offer(request.offer, &match_request, &peers, &selector)
        else {
            debug!(run_spec = %pod.id, offer = %request.offer.id, "Offer does not match");
            return Ok(None);
        };

        let now = self.clock.now();
        let instance_id = InstanceId::from_parts(
            &pod.id,
            self.mint_ulid(request, now, &[pod.id.as_str(), "instance"]),
        );
        let built = build_pod_task_group(
            &self.config,
            pod,
            &instance_id,
            request.offer,
            &matched,
            request.framework_id,
        )?;
        let mut executor_info = built.executor_info;
        let mut task_group_info = built.task_group_info;
        apply_task_group_processors(
            &self.processors,
            request.run_spec,
            &mut executor_info,
            &mut task_group_info,
        );

        let mut tasks = BTreeMap::new();
        for (task_info, ports) in task_group_info
            .tasks
            .iter()
            .zip(&built.host_ports_by_container)
        {
            let host_ports = if self.config.pod_tasks_carry_host_ports {
                ports.clone()
            } else {
                vec![]
            };
            tasks.insert(
                task_info.task_id.clone(),
                Task::LaunchedEphemeral {
                    task_id: task_info.task_id.clone(),
                    run_spec_version: pod.version,
                    state: TaskState::created(now),
                    host_ports,
                },
            );
        }

        let instance = Instance {
            instance_id,
            agent_info: AgentInfo::from_offer(request.offer),
            state: InstanceState {
                status: InstanceStatus::Created,
                since: now,
                run_spec_version: pod.version,
                healthy: None,
            },
            tasks,
            run_spec_version: pod.version,
        };

        Ok(Some(InstanceOp::LaunchGroup {
            executor_info,
            task_group_info,
            instance,
            host_ports: matched.host_ports(),
        }))
    }

    // -------------------------------------------------------------------------
    // Stateful apps
    // -------------------------------------------------------------------------

    /// A single offer either launches on an existing reservation or creates
    /// a new one; launch has strict precedence.
    fn infer_stateful(
        &self,
        app: &AppSpec,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        if let Some(op) = self.launch_on_reservation(app, request)? {
            return Ok(Some(op));
        }
        self.reserve_and_create(app, request)
    }

    fn launch_on_reservation(
        &self,
        app: &AppSpec,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        if request.additional_launches == 0 {
            return Ok(None);
        }
        let any_launchable = request
            .current_instances
            .values()
            .any(|i| i.launchable_reservations().next().is_some());
        if !any_launchable {
            return Ok(None);
        }
        let Some(role) = self.config.role.clone() else {
            return Ok(None);
        };

        let Some(volume_match) = find_volume_match(request.offer, request.current_instances)
        else {
            return Ok(None);
        };

        let labels = reservation_labels(request.framework_id, &volume_match.task_id);
        let mut roles = BTreeSet::new();
        roles.insert(role);
        let selector = ResourceSelector::reserved_with_labels(roles, labels);

        // The task being relaunched must not violate uniqueness constraints
        // against itself: its own instance is excluded from the peers.
        let peers: Vec<&Instance> = request
            .current_instances
            .iter()
            .filter(|(id, _)| **id != volume_match.instance_id)
            .map(|(_, instance)| instance)
            .collect();

        let match_request = MatchRequest {
            demand: app.resources,
            endpoints: app.endpoints.iter().collect(),
            volumes: &[],
            constraints: &app.constraints,
        };
        let Some(matched) = matcher::match_offer(request.offer, &match_request, &peers, &selector)
        else {
            debug!(
                run_spec = %app.id,
                task_id = %volume_match.task_id,
                "Reserved resources for task not fully present in offer"
            );
            return Ok(None);
        };

        let now = self.clock.now();
        let built = build_app_task(
            &self.config,
            app,
            volume_match.task_id.clone(),
            request.offer,
            &matched,
            &volume_match.volumes,
        )?;
        let mut task_info = built.task_info;
        apply_task_processors(&self.processors, request.run_spec, &mut task_info);

        let state = TaskState::created(now);
        let host_ports = matched.host_ports();
        let task = Task::LaunchedOnReservation {
            task_id: volume_match.task_id.clone(),
            run_spec_version: app.version,
            state: state.clone(),
            host_ports: host_ports.clone(),
            reservation: volume_match.reservation.launched(),
        };
        let state_op = StateOp::LaunchOnReservation {
            instance_id: volume_match.instance_id.clone(),
            run_spec_version: app.version,
            state,
            host_ports,
        };

        Ok(Some(InstanceOp::LaunchOnReservation {
            task_info,
            state_op,
            task,
        }))
    }

    fn reserve_and_create(
        &self,
        app: &AppSpec,
        request: &InstanceOpRequest<'_>,
    ) -> SchedulerResult<Option<InstanceOp>> {
        let waiting = request
            .current_instances
            .values()
            .filter(|i| i.has_waiting_reservation())
            .count() as u32;
        if waiting >= request.additional_launches {
            debug!(
                run_spec = %app.id,
                waiting,
                additional_launches = request.additional_launches,
                "Enough reservations already waiting"
            );
            return Ok(None);
        }

        let Some(role) = self.config.role.clone() else {
            warn!(
                run_spec = %app.id,
                "Cannot reserve for stateful run spec: no reservation role configured"
            );
            return Ok(None);
        };

        // Dynamic reservations can only be made from unreserved resources.
        let accepted = self
            .config
            .accepted_roles_for(app.accepted_resource_roles.as_ref());
        if !accepted.contains(UNRESERVED_ROLE) {
            warn!(
                run_spec = %app.id,
                accepted_roles = ?accepted,
                "Accepted resource roles leave nothing reservable; skipping offer"
            );
            return Ok(None);
        }
        let mut roles = BTreeSet::new();
        roles.insert(UNRESERVED_ROLE.to_string());
        let selector = ResourceSelector::reservable(roles);
        let peers: Vec<&Instance> = request.current_instances.values().collect();

        let match_request = MatchRequest {
            demand: app.resources,
            endpoints: app.endpoints.iter().collect(),
            volumes: &app.volumes,
            constraints: &app.constraints,
        };
        let Some(matched) = matcher::match_offer(request.offer, &match_request, &peers, &selector)
        else {
            debug!(run_spec = %app.id, offer = %request.offer.id, "Offer does not match");
            return Ok(None);
        };

        let now = self.clock.now();
        let task_id = self.mint_task_id(app, request, now);
        let mut volume_ids = Vec::with_capacity(app.volumes.len());
        for (index, volume) in app.volumes.iter().enumerate() {
            let ulid = self.mint_ulid(
                request,
                now,
                &[app.id.as_str(), &volume.container_path, &index.to_string()],
            );
            let volume_id = VolumeId::from_parts(&app.id, &volume.container_path, ulid).map_err(
                |e| SchedulerError::BuilderFailure {
                    reason: format!(
                        "volume path '{}' cannot form a volume ID: {e}",
                        volume.container_path
                    ),
                },
            )?;
            volume_ids.push(volume_id);
        }

        let reservation = Reservation::new(
            volume_ids.clone(),
            now,
            self.config.task_reservation_timeout,
        );
        let task = Task::Reserved {
            task_id: task_id.clone(),
            reservation,
        };

        let instance_id = task_id.instance_id().clone();
        let mut tasks = BTreeMap::new();
        tasks.insert(task_id.clone(), task);
        let instance = Instance {
            instance_id,
            agent_info: AgentInfo::from_offer(request.offer),
            state: InstanceState {
                status: InstanceStatus::Reserved,
                since: now,
                run_spec_version: app.version,
                healthy: None,
            },
            tasks,
            run_spec_version: app.version,
        };

        let labels = reservation_labels(request.framework_id, &task_id);
        let principal = self.config.principal.as_deref();
        let resources = matched.reserve_resources(&role, principal, &labels);
        let volume_resources = matched.volume_resources(&role, principal, &labels, &volume_ids);
        let local_volumes = matched
            .volume_allocations
            .iter()
            .zip(volume_ids)
            .zip(volume_resources)
            .map(|((allocation, id), resource)| LocalVolume {
                id,
                request: allocation.request.clone(),
                resource,
            })
            .collect();

        Ok(Some(InstanceOp::ReserveAndCreateVolumes {
            framework_id: request.framework_id.clone(),
            state_op: StateOp::Reserve { instance },
            resources,
            local_volumes,
        }))
    }

    // -------------------------------------------------------------------------
    // Deterministic ID minting
    // -------------------------------------------------------------------------

    fn mint_task_id(
        &self,
        app: &AppSpec,
        request: &InstanceOpRequest<'_>,
        now: DateTime<Utc>,
    ) -> TaskId {
        let ulid = self.mint_ulid(request, now, &[app.id.as_str(), "task"]);
        TaskId::for_instance(&InstanceId::from_parts(&app.id, ulid))
    }

    /// Derives a ULID from the request and the clock, so that replaying the
    /// same request mints the same IDs.
    fn mint_ulid(
        &self,
        request: &InstanceOpRequest<'_>,
        now: DateTime<Utc>,
        seed: &[&str],
    ) -> Ulid {
        let mut hasher = Sha256::new();
        hasher.update(request.offer.id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(request.framework_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(request.current_instances.len().to_be_bytes());
        for part in seed {
            hasher.update(b":");
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Ulid::from_parts(now.timestamp_millis() as u64, u128::from_be_bytes(bytes))
    }
}
