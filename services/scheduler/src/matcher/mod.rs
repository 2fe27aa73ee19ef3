//! The resource matcher.
//!
//! Given an offer, a demand, and a selector, produces a [`ResourceMatch`]:
//! the exact set of offer fragments to consume. The matcher is deterministic:
//! the same inputs yield byte-identical output, so matching decisions are
//! replayable in tests.
//!
//! Consumption prefers fragments that leave the smallest leftover, which
//! keeps large fragments intact for later offers. Ties are broken by role,
//! reservation labels, disk-source kind, and finally position in the offer.

pub mod selector;
pub mod volumes;

pub use selector::ResourceSelector;
pub use volumes::{find_volume_match, VolumeMatch};

use std::collections::{BTreeMap, BTreeSet};

use armada_id::VolumeId;
use armada_mesos::{
    DiskInfo, DiskKind, DiskSource, Offer, Persistence, PortRange, Resource, ReservationInfo,
    Value, CPUS, DISK, GPUS, MEM, PORTS, SCALAR_EPSILON,
};
use tracing::debug;

use crate::constraints;
use crate::instance::Instance;
use crate::spec::{Constraint, Endpoint, HostPort, ResourceDemand, VolumeRequest};

// =============================================================================
// Match Output
// =============================================================================

/// A scalar fragment deducted from the offer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedResource {
    pub name: String,
    pub amount: f64,
    pub role: String,
    pub reservation: Option<ReservationInfo>,
    pub disk_source: Option<DiskSource>,
}

/// One host port drawn from the offer's ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct PortAssignment {
    /// The endpoint the port was assigned to.
    pub endpoint: String,
    pub port: u32,
    pub role: String,
    pub reservation: Option<ReservationInfo>,
}

/// A persistent-volume placement on a disk fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAllocation {
    pub request: VolumeRequest,
    pub source: DiskSource,
    pub role: String,
    pub reservation: Option<ReservationInfo>,

    /// Disk actually deducted; the whole disk for `Mount` sources.
    pub consumed_mb: f64,
}

/// A concrete assignment of offer resources to a demand.
///
/// Fragments are value copies of the relevant offer sub-records; a match
/// never points back into the offer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceMatch {
    pub consumed: Vec<ConsumedResource>,
    pub port_assignments: Vec<PortAssignment>,
    pub volume_allocations: Vec<VolumeAllocation>,
}

impl ResourceMatch {
    /// The assigned host ports, in endpoint declaration order.
    #[must_use]
    pub fn host_ports(&self) -> Vec<u32> {
        self.port_assignments.iter().map(|a| a.port).collect()
    }

    /// Total scalar amount consumed under a resource name.
    #[must_use]
    pub fn total(&self, name: &str) -> f64 {
        self.consumed
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.amount)
            .sum()
    }

    /// Every role the match consumes from.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        let mut roles: BTreeSet<String> = self.consumed.iter().map(|c| c.role.clone()).collect();
        roles.extend(self.port_assignments.iter().map(|a| a.role.clone()));
        roles.extend(self.volume_allocations.iter().map(|a| a.role.clone()));
        roles
    }

    /// Renders the match as launch-payload resources, preserving each
    /// fragment's role and reservation metadata. Persistent volumes travel
    /// separately and are not included.
    #[must_use]
    pub fn launch_resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self
            .consumed
            .iter()
            .map(|c| Resource {
                name: c.name.clone(),
                role: c.role.clone(),
                reservation: c.reservation.clone(),
                value: Value::Scalar(c.amount),
                disk: c.disk_source.clone().map(|source| DiskInfo {
                    source,
                    persistence: None,
                }),
            })
            .collect();
        resources.extend(self.port_resources(None));
        resources
    }

    /// Renders the match as resources to dynamically reserve under `role`
    /// with the given labels. Scalars are aggregated per name; volume
    /// allocations become reserved plain disk (volumes are created by a
    /// separate operation).
    #[must_use]
    pub fn reserve_resources(
        &self,
        role: &str,
        principal: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Vec<Resource> {
        let reservation = ReservationInfo {
            principal: principal.map(String::from),
            labels: labels.clone(),
        };

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for c in &self.consumed {
            *totals.entry(c.name.as_str()).or_insert(0.0) += c.amount;
        }

        let mut resources: Vec<Resource> = totals
            .into_iter()
            .map(|(name, amount)| Resource {
                name: name.to_string(),
                role: role.to_string(),
                reservation: Some(reservation.clone()),
                value: Value::Scalar(amount),
                disk: None,
            })
            .collect();

        resources.extend(self.port_resources(Some((role, &reservation))));

        for allocation in &self.volume_allocations {
            resources.push(Resource {
                name: DISK.to_string(),
                role: role.to_string(),
                reservation: Some(reservation.clone()),
                value: Value::Scalar(allocation.consumed_mb),
                disk: Some(DiskInfo {
                    source: allocation.source.clone(),
                    persistence: None,
                }),
            });
        }

        resources
    }

    /// Renders the volume allocations as persistent volumes to create, one
    /// per minted volume ID (paired with allocations in request order).
    #[must_use]
    pub fn volume_resources(
        &self,
        role: &str,
        principal: Option<&str>,
        labels: &BTreeMap<String, String>,
        volume_ids: &[VolumeId],
    ) -> Vec<Resource> {
        let reservation = ReservationInfo {
            principal: principal.map(String::from),
            labels: labels.clone(),
        };
        self.volume_allocations
            .iter()
            .zip(volume_ids)
            .map(|(allocation, volume_id)| Resource {
                name: DISK.to_string(),
                role: role.to_string(),
                reservation: Some(reservation.clone()),
                value: Value::Scalar(allocation.consumed_mb),
                disk: Some(DiskInfo {
                    source: allocation.source.clone(),
                    persistence: Some(Persistence {
                        id: volume_id.clone(),
                        principal: principal.map(String::from),
                    }),
                }),
            })
            .collect()
    }

    /// Groups the port assignments into `ports` resources, one per distinct
    /// (role, reservation) pair, with consecutive ports merged into ranges.
    fn port_resources(&self, rewrite: Option<(&str, &ReservationInfo)>) -> Vec<Resource> {
        let mut groups: Vec<((String, Option<ReservationInfo>), Vec<u32>)> = Vec::new();
        for assignment in &self.port_assignments {
            let key = match rewrite {
                Some((role, reservation)) => (role.to_string(), Some(reservation.clone())),
                None => (assignment.role.clone(), assignment.reservation.clone()),
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, ports)) => ports.push(assignment.port),
                None => groups.push((key, vec![assignment.port])),
            }
        }

        groups
            .into_iter()
            .map(|((role, reservation), mut ports)| {
                ports.sort_unstable();
                Resource {
                    name: PORTS.to_string(),
                    role,
                    reservation,
                    value: Value::Ranges(to_ranges(&ports)),
                    disk: None,
                }
            })
            .collect()
    }
}

/// Merges sorted ports into inclusive ranges.
fn to_ranges(ports: &[u32]) -> Vec<PortRange> {
    let mut ranges: Vec<PortRange> = Vec::new();
    for &port in ports {
        match ranges.last_mut() {
            Some(range) if range.end + 1 == port => range.end = port,
            _ => ranges.push(PortRange::new(port, port)),
        }
    }
    ranges
}

// =============================================================================
// Matching
// =============================================================================

/// What a matching attempt needs from the offer.
#[derive(Debug, Clone)]
pub struct MatchRequest<'a> {
    pub demand: ResourceDemand,

    /// Endpoints in declaration order; only those requesting a host port
    /// receive an assignment.
    pub endpoints: Vec<&'a Endpoint>,

    pub volumes: &'a [VolumeRequest],

    pub constraints: &'a [Constraint],
}

/// Attempts to satisfy a demand from an offer.
///
/// Returns `None` when constraints reject the offer or any requirement
/// cannot be fully covered by fragments passing the selector.
#[must_use]
pub fn match_offer(
    offer: &Offer,
    request: &MatchRequest<'_>,
    peers: &[&Instance],
    selector: &ResourceSelector,
) -> Option<ResourceMatch> {
    if !constraints::meets_all(request.constraints, offer, peers) {
        return None;
    }

    let mut remaining: Vec<f64> = offer
        .resources
        .iter()
        .map(|r| r.scalar_value().unwrap_or(0.0))
        .collect();
    let mut consumed = Vec::new();

    for (name, need) in [
        (CPUS, request.demand.cpus),
        (MEM, request.demand.mem),
        (DISK, request.demand.disk),
        (GPUS, request.demand.gpus),
    ] {
        if !consume_scalar(offer, selector, &mut remaining, &mut consumed, name, need) {
            debug!(resource = name, need, "Offer cannot cover scalar demand");
            return None;
        }
    }

    let port_assignments = match assign_ports(offer, selector, &request.endpoints) {
        Some(assignments) => assignments,
        None => {
            debug!("Offer cannot cover requested host ports");
            return None;
        }
    };

    let volume_allocations =
        match place_volumes(offer, selector, &mut remaining, request.volumes) {
            Some(allocations) => allocations,
            None => {
                debug!("Offer cannot place requested persistent volumes");
                return None;
            }
        };

    Some(ResourceMatch {
        consumed,
        port_assignments,
        volume_allocations,
    })
}

/// Deterministic candidate order: smallest leftover first, then role,
/// reservation labels, disk-source kind, and position in the offer.
fn candidate_order(offer: &Offer, remaining: &[f64], a: usize, b: usize) -> std::cmp::Ordering {
    let ra = &offer.resources[a];
    let rb = &offer.resources[b];
    remaining[a]
        .total_cmp(&remaining[b])
        .then_with(|| ra.role.cmp(&rb.role))
        .then_with(|| labels_key(ra).cmp(&labels_key(rb)))
        .then_with(|| disk_kind_rank(ra).cmp(&disk_kind_rank(rb)))
        .then_with(|| a.cmp(&b))
}

fn labels_key(resource: &Resource) -> String {
    match &resource.reservation {
        Some(reservation) => reservation
            .labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(","),
        None => String::new(),
    }
}

fn disk_kind_rank(resource: &Resource) -> u8 {
    match resource.disk_source().map(DiskSource::kind) {
        None => 0,
        Some(DiskKind::Root) => 1,
        Some(DiskKind::Path) => 2,
        Some(DiskKind::Mount) => 3,
    }
}

/// Consumes `need` of a scalar resource from eligible fragments. Scalar disk
/// demand draws only from root disk; persistent volumes are never eligible.
fn consume_scalar(
    offer: &Offer,
    selector: &ResourceSelector,
    remaining: &mut [f64],
    consumed: &mut Vec<ConsumedResource>,
    name: &str,
    need: f64,
) -> bool {
    if need <= SCALAR_EPSILON {
        return true;
    }

    let mut candidates: Vec<usize> = offer
        .resources
        .iter()
        .enumerate()
        .filter(|(_, r)| r.name == name && r.scalar_value().is_some())
        .filter(|(_, r)| selector.accepts(r) && !r.has_persistence())
        .filter(|(_, r)| {
            name != DISK || r.disk_source().map(DiskSource::kind).unwrap_or(DiskKind::Root)
                == DiskKind::Root
        })
        .map(|(i, _)| i)
        .collect();
    candidates.sort_by(|&a, &b| candidate_order(offer, remaining, a, b));

    let mut outstanding = need;
    for index in candidates {
        if outstanding <= SCALAR_EPSILON {
            break;
        }
        let take = remaining[index].min(outstanding);
        if take <= SCALAR_EPSILON {
            continue;
        }
        remaining[index] -= take;
        outstanding -= take;

        let resource = &offer.resources[index];
        consumed.push(ConsumedResource {
            name: name.to_string(),
            amount: take,
            role: resource.role.clone(),
            reservation: resource.reservation.clone(),
            disk_source: resource.disk_source().cloned(),
        });
    }

    outstanding <= SCALAR_EPSILON
}

/// Assigns requested host ports from the offer's port ranges.
fn assign_ports(
    offer: &Offer,
    selector: &ResourceSelector,
    endpoints: &[&Endpoint],
) -> Option<Vec<PortAssignment>> {
    let eligible: Vec<&Resource> = offer
        .resources_named(PORTS)
        .filter(|r| selector.accepts(r))
        .collect();

    let mut used: BTreeSet<u32> = BTreeSet::new();
    let mut assignments = Vec::new();

    for endpoint in endpoints {
        let Some(request) = endpoint.host_port else {
            continue;
        };

        let (port, resource) = match request {
            HostPort::Fixed(port) => {
                let resource = eligible.iter().find(|r| {
                    !used.contains(&port)
                        && r.port_ranges()
                            .is_some_and(|ranges| ranges.iter().any(|range| range.contains(port)))
                })?;
                (port, *resource)
            }
            HostPort::Any => {
                // The lowest free value across all eligible ranges.
                let mut choice: Option<(u32, &Resource)> = None;
                for resource in &eligible {
                    for range in resource.port_ranges().unwrap_or(&[]) {
                        let mut port = range.begin;
                        while port <= range.end && used.contains(&port) {
                            port += 1;
                        }
                        if port <= range.end
                            && choice.map_or(true, |(best, _)| port < best)
                        {
                            choice = Some((port, *resource));
                        }
                    }
                }
                choice?
            }
        };

        used.insert(port);
        assignments.push(PortAssignment {
            endpoint: endpoint.name.clone(),
            port,
            role: resource.role.clone(),
            reservation: resource.reservation.clone(),
        });
    }

    Some(assignments)
}

/// Places each volume request on a disk fragment of the matching source
/// kind. `Mount` disks are indivisible: the entire disk is consumed.
fn place_volumes(
    offer: &Offer,
    selector: &ResourceSelector,
    remaining: &mut [f64],
    requests: &[VolumeRequest],
) -> Option<Vec<VolumeAllocation>> {
    let mut allocations = Vec::with_capacity(requests.len());

    for request in requests {
        let mut candidates: Vec<usize> = offer
            .resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.name == DISK && r.scalar_value().is_some())
            .filter(|(_, r)| selector.accepts(r) && !r.has_persistence())
            .filter(|(_, r)| {
                r.disk_source().map(DiskSource::kind).unwrap_or(DiskKind::Root) == request.kind
            })
            .filter(|(i, _)| remaining[*i] + SCALAR_EPSILON >= request.size_mb)
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|&a, &b| candidate_order(offer, remaining, a, b));

        let index = *candidates.first()?;
        let resource = &offer.resources[index];
        let source = resource
            .disk_source()
            .cloned()
            .unwrap_or(DiskSource::Root);

        let consumed_mb = match source.kind() {
            DiskKind::Mount => remaining[index],
            DiskKind::Root | DiskKind::Path => request.size_mb,
        };
        remaining[index] -= consumed_mb;

        allocations.push(VolumeAllocation {
            request: request.clone(),
            source,
            role: resource.role.clone(),
            reservation: resource.reservation.clone(),
            consumed_mb,
        });
    }

    Some(allocations)
}
