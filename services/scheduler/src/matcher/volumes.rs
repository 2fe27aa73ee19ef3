//! Persistent-volume matching for stateful run specs.
//!
//! When an offer arrives carrying persistent volumes, the matcher looks for a
//! `Reserved` task of this run spec whose reservation's volumes are all
//! present. The matched task is the one relaunched on the offer.

use std::collections::BTreeMap;

use armada_id::{InstanceId, TaskId, VolumeId};
use armada_mesos::{Offer, Resource};

use crate::instance::{Instance, Reservation};

/// A `Reserved` task paired with the offer's persistent volumes that satisfy
/// its reservation IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMatch {
    pub instance_id: InstanceId,
    pub task_id: TaskId,
    pub reservation: Reservation,
    pub volumes: Vec<Resource>,
}

/// Finds the `Reserved` task whose volumes are all carried by the offer.
///
/// If several tasks qualify, the one whose reservation was created earliest
/// wins; ties break by task ID lexicographic order.
#[must_use]
pub fn find_volume_match(
    offer: &Offer,
    instances: &BTreeMap<InstanceId, Instance>,
) -> Option<VolumeMatch> {
    let offered: BTreeMap<&VolumeId, &Resource> = offer
        .persistent_volumes()
        .filter_map(|r| r.persistence_id().map(|id| (id, r)))
        .collect();
    if offered.is_empty() {
        return None;
    }

    let mut best: Option<(&InstanceId, &TaskId, &Reservation)> = None;
    for (instance_id, instance) in instances {
        for (task_id, reservation) in instance.launchable_reservations() {
            if reservation.volume_ids.is_empty()
                || !reservation
                    .volume_ids
                    .iter()
                    .all(|id| offered.contains_key(id))
            {
                continue;
            }
            let candidate_wins = match best {
                None => true,
                Some((_, best_task_id, best_reservation)) => {
                    (reservation.created_at, task_id.to_string())
                        < (best_reservation.created_at, best_task_id.to_string())
                }
            };
            if candidate_wins {
                best = Some((instance_id, task_id, reservation));
            }
        }
    }

    best.map(|(instance_id, task_id, reservation)| VolumeMatch {
        instance_id: instance_id.clone(),
        task_id: task_id.clone(),
        reservation: reservation.clone(),
        volumes: reservation
            .volume_ids
            .iter()
            .filter_map(|id| offered.get(id).map(|r| (*r).clone()))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{AgentInfo, InstanceState, InstanceStatus, Task};
    use armada_id::{AgentId, OfferId, RunSpecId};
    use armada_mesos::{DiskInfo, DiskSource, Persistence, DISK};
    use chrono::{Duration, Utc};

    fn volume_resource(volume_id: &VolumeId) -> Resource {
        Resource::scalar(DISK, 100.0)
            .with_role("database")
            .with_disk(DiskInfo {
                source: DiskSource::Root,
                persistence: Some(Persistence {
                    id: volume_id.clone(),
                    principal: None,
                }),
            })
    }

    fn offer_with(resources: Vec<Resource>) -> Offer {
        Offer {
            id: OfferId::new("offer-1"),
            framework_id: None,
            agent_id: AgentId::new("agent-1"),
            hostname: "host-1".to_string(),
            attributes: BTreeMap::new(),
            resources,
        }
    }

    fn reserved_instance(
        run_spec: &RunSpecId,
        volume_ids: Vec<VolumeId>,
        created_at: chrono::DateTime<Utc>,
    ) -> (InstanceId, Instance, TaskId) {
        let task_id = TaskId::for_run_spec(run_spec);
        let instance_id = task_id.instance_id().clone();
        let reservation = Reservation::new(volume_ids, created_at, Duration::seconds(20));

        let mut tasks = BTreeMap::new();
        tasks.insert(
            task_id.clone(),
            Task::Reserved {
                task_id: task_id.clone(),
                reservation,
            },
        );
        let instance = Instance {
            instance_id: instance_id.clone(),
            agent_info: AgentInfo {
                agent_id: AgentId::new("agent-1"),
                host: "host-1".to_string(),
                attributes: BTreeMap::new(),
            },
            state: InstanceState {
                status: InstanceStatus::Reserved,
                since: created_at,
                run_spec_version: created_at,
                healthy: None,
            },
            tasks,
            run_spec_version: created_at,
        };
        (instance_id, instance, task_id)
    }

    #[test]
    fn test_finds_task_whose_volumes_are_offered() {
        let run_spec = RunSpecId::parse("/prod/db").unwrap();
        let volume_id = VolumeId::for_volume(&run_spec, "data").unwrap();
        let (instance_id, instance, task_id) =
            reserved_instance(&run_spec, vec![volume_id.clone()], Utc::now());

        let mut instances = BTreeMap::new();
        instances.insert(instance_id.clone(), instance);

        let offer = offer_with(vec![volume_resource(&volume_id)]);
        let matched = find_volume_match(&offer, &instances).unwrap();
        assert_eq!(matched.task_id, task_id);
        assert_eq!(matched.instance_id, instance_id);
        assert_eq!(matched.volumes.len(), 1);
    }

    #[test]
    fn test_no_match_when_a_volume_is_missing() {
        let run_spec = RunSpecId::parse("/prod/db").unwrap();
        let present = VolumeId::for_volume(&run_spec, "data").unwrap();
        let absent = VolumeId::for_volume(&run_spec, "logs").unwrap();
        let (instance_id, instance, _) =
            reserved_instance(&run_spec, vec![present.clone(), absent], Utc::now());

        let mut instances = BTreeMap::new();
        instances.insert(instance_id, instance);

        let offer = offer_with(vec![volume_resource(&present)]);
        assert!(find_volume_match(&offer, &instances).is_none());
    }

    #[test]
    fn test_earliest_reservation_wins() {
        let run_spec = RunSpecId::parse("/prod/db").unwrap();
        let now = Utc::now();

        let old_volume = VolumeId::for_volume(&run_spec, "data").unwrap();
        let new_volume = VolumeId::for_volume(&run_spec, "data").unwrap();
        let (old_id, old_instance, old_task) = reserved_instance(
            &run_spec,
            vec![old_volume.clone()],
            now - Duration::minutes(5),
        );
        let (new_id, new_instance, _) = reserved_instance(&run_spec, vec![new_volume.clone()], now);

        let mut instances = BTreeMap::new();
        instances.insert(new_id, new_instance);
        instances.insert(old_id, old_instance);

        let offer = offer_with(vec![
            volume_resource(&new_volume),
            volume_resource(&old_volume),
        ]);
        let matched = find_volume_match(&offer, &instances).unwrap();
        assert_eq!(matched.task_id, old_task);
    }
}
