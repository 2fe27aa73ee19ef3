//! Resource selectors: which offer fragments a matching attempt may consume.

use std::collections::{BTreeMap, BTreeSet};

use armada_mesos::Resource;

/// A predicate over offer resources expressing which roles and reservations
/// are eligible for a given matching attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSelector {
    /// Ordinary scheduling: any resource offered under an accepted role.
    /// Fragments reserved for a specific task (labelled reservations) are
    /// never eligible here.
    Any { roles: BTreeSet<String> },

    /// Reservation-time matching: only unreserved resources.
    Reservable { roles: BTreeSet<String> },

    /// Launch-on-reservation matching: only resources dynamically reserved
    /// under one of `roles` whose labels equal `labels` exactly.
    ReservedWithLabels {
        roles: BTreeSet<String>,
        labels: BTreeMap<String, String>,
    },
}

impl ResourceSelector {
    #[must_use]
    pub fn any_of(roles: BTreeSet<String>) -> Self {
        Self::Any { roles }
    }

    #[must_use]
    pub fn reservable(roles: BTreeSet<String>) -> Self {
        Self::Reservable { roles }
    }

    #[must_use]
    pub fn reserved_with_labels(roles: BTreeSet<String>, labels: BTreeMap<String, String>) -> Self {
        Self::ReservedWithLabels { roles, labels }
    }

    /// Returns true if the fragment is eligible under this selector.
    #[must_use]
    pub fn accepts(&self, resource: &Resource) -> bool {
        match self {
            ResourceSelector::Any { roles } => {
                roles.contains(&resource.role)
                    && resource
                        .reservation
                        .as_ref()
                        .map_or(true, |r| r.labels.is_empty())
            }
            ResourceSelector::Reservable { roles } => {
                resource.is_unreserved() && roles.contains(&resource.role)
            }
            ResourceSelector::ReservedWithLabels { roles, labels } => {
                roles.contains(&resource.role)
                    && resource
                        .reservation
                        .as_ref()
                        .is_some_and(|r| &r.labels == labels)
            }
        }
    }
}
