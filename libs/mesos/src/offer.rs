//! Offers: resource bundles presented by the resource manager.

use std::collections::BTreeMap;

use armada_id::{AgentId, FrameworkId, OfferId};
use serde::{Deserialize, Serialize};

use crate::Resource;

/// A bundle of agent resources presented to the framework.
///
/// The framework accepts an offer by returning operations, or implicitly
/// declines. Fields beyond the ones the matching pipeline consumes are left
/// to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,

    /// The framework this offer was made to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<FrameworkId>,

    pub agent_id: AgentId,

    pub hostname: String,

    /// Agent attributes used for constraint evaluation.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    pub resources: Vec<Resource>,
}

impl Offer {
    /// Iterates over the offer's resources with a given name, in offer order.
    pub fn resources_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources.iter().filter(move |r| r.name == name)
    }

    /// Iterates over the offer's persistent-volume resources.
    pub fn persistent_volumes(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.has_persistence())
    }

    /// Returns an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiskInfo, DiskSource, Persistence, CPUS, DISK};
    use armada_id::{RunSpecId, VolumeId};

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

    #[test]
    fn test_resources_named() {
        let offer = offer_with(vec![
            Resource::scalar(CPUS, 2.0),
            Resource::scalar(DISK, 100.0),
            Resource::scalar(CPUS, 1.0).with_role("database"),
        ]);

        let cpus: Vec<_> = offer.resources_named(CPUS).collect();
        assert_eq!(cpus.len(), 2);
        assert_eq!(cpus[0].scalar_value(), Some(2.0));
        assert_eq!(cpus[1].role, "database");
    }

    #[test]
    fn test_persistent_volumes() {
        let run_spec = RunSpecId::parse("/prod/db").unwrap();
        let volume_id = VolumeId::for_volume(&run_spec, "data").unwrap();
        let offer = offer_with(vec![
            Resource::scalar(DISK, 100.0),
            Resource::scalar(DISK, 50.0).with_disk(DiskInfo {
                source: DiskSource::Root,
                persistence: Some(Persistence {
                    id: volume_id.clone(),
                    principal: None,
                }),
            }),
        ]);

        let volumes: Vec<_> = offer.persistent_volumes().collect();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].persistence_id(), Some(&volume_id));
    }
}
