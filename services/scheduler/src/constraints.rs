//! Placement constraint evaluation.
//!
//! Constraints are evaluated against an offer's hostname and agent
//! attributes, considering the run spec's peer instances. Evaluation runs
//! before any resource arithmetic: constraint failure is common and cheap.

use std::collections::BTreeMap;

use armada_mesos::Offer;
use regex::Regex;
use tracing::debug;

use crate::instance::Instance;
use crate::spec::{Constraint, ConstraintOp};

/// The field name resolving to the offer's hostname rather than an
/// attribute.
pub const HOSTNAME_FIELD: &str = "hostname";

/// Returns true if the offer satisfies every constraint.
#[must_use]
pub fn meets_all(constraints: &[Constraint], offer: &Offer, peers: &[&Instance]) -> bool {
    constraints.iter().all(|constraint| {
        let ok = meets(constraint, offer, peers);
        if !ok {
            debug!(
                field = %constraint.field,
                operator = ?constraint.operator,
                hostname = %offer.hostname,
                "Constraint rejected offer"
            );
        }
        ok
    })
}

/// Returns true if the offer satisfies one constraint.
#[must_use]
pub fn meets(constraint: &Constraint, offer: &Offer, peers: &[&Instance]) -> bool {
    let Some(offer_value) = field_value_of_offer(&constraint.field, offer) else {
        // An agent without the attribute can never satisfy the constraint.
        return false;
    };

    let peer_values: Vec<&str> = peers
        .iter()
        .filter_map(|peer| field_value_of_instance(&constraint.field, peer))
        .collect();

    match constraint.operator {
        ConstraintOp::Unique => !peer_values.contains(&offer_value),

        ConstraintOp::Cluster => match constraint.value.as_deref() {
            Some(value) => offer_value == value,
            // Without an explicit value the first placement picks it.
            None => peer_values.is_empty() || peer_values.contains(&offer_value),
        },

        ConstraintOp::GroupBy => {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for value in &peer_values {
                *counts.entry(value).or_insert(0) += 1;
            }
            let offer_count = counts.get(offer_value).copied().unwrap_or(0);

            let group_target: Option<usize> = constraint
                .value
                .as_deref()
                .and_then(|v| v.parse().ok());
            // With a declared group count, an unfilled group means only
            // unseen values may be taken.
            if let Some(groups) = group_target {
                if counts.len() < groups {
                    return offer_count == 0;
                }
            }
            let min_count = counts.values().copied().min().unwrap_or(0);
            offer_count <= min_count
        }

        ConstraintOp::Like => match_regex(constraint.value.as_deref(), offer_value),

        ConstraintOp::Unlike => !match_regex(constraint.value.as_deref(), offer_value),

        ConstraintOp::MaxPer => {
            let Some(max) = constraint
                .value
                .as_deref()
                .and_then(|v| v.parse::<usize>().ok())
            else {
                return false;
            };
            let count = peer_values.iter().filter(|v| **v == offer_value).count();
            count < max
        }
    }
}

fn match_regex(pattern: Option<&str>, value: &str) -> bool {
    let Some(pattern) = pattern else {
        return false;
    };
    // The value must match in full, as if anchored.
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(regex) => regex.is_match(value),
        Err(_) => false,
    }
}

fn field_value_of_offer<'a>(field: &str, offer: &'a Offer) -> Option<&'a str> {
    if field == HOSTNAME_FIELD {
        Some(&offer.hostname)
    } else {
        offer.attribute(field)
    }
}

fn field_value_of_instance<'a>(field: &str, instance: &'a Instance) -> Option<&'a str> {
    if field == HOSTNAME_FIELD {
        Some(&instance.agent_info.host)
    } else {
        instance
            .agent_info
            .attributes
            .get(field)
            .map(String::as_str)
    }
}
