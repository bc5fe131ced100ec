//! Greedy seed-based grouping of similar logo hashes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

use crate::domain_utils::display_domain;
use crate::hash_store::PerceptualHash;

/// A group of domains whose logos look alike
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoGroup {
    /// 1-based position in the grouping output
    pub group_id: usize,
    /// Display domains, sorted and deduplicated
    pub domains: Vec<String>,
}

/// Partition hostnames into groups of similar hashes.
///
/// Hostnames are visited in map order. Each unassigned hostname seeds a new
/// group, and every later unassigned hostname within `threshold` bits of
/// the seed (inclusive) joins it. Members are compared against the seed
/// only, so two members of one group may be further apart than
/// `threshold`. Hashes of different lengths are never similar.
pub fn group_by_similarity(hashes: &IndexMap<String, PerceptualHash>, threshold: u32) -> Vec<Vec<String>> {
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for (seed_host, seed_hash) in hashes {
        if assigned.contains(seed_host.as_str()) {
            continue;
        }
        assigned.insert(seed_host);
        let mut group = vec![seed_host.clone()];

        for (host, hash) in hashes {
            if assigned.contains(host.as_str()) {
                continue;
            }
            match seed_hash.distance(hash) {
                Ok(distance) if distance <= threshold => {
                    assigned.insert(host);
                    group.push(host.clone());
                }
                Ok(_) => {}
                Err(e) => warn!("Not comparing {} with {}: {}", seed_host, host, e),
            }
        }

        groups.push(group);
    }

    groups
}

/// Number the groups from 1 and turn hostnames into display domains
pub fn build_logo_groups(groups: Vec<Vec<String>>) -> Vec<LogoGroup> {
    groups
        .into_iter()
        .enumerate()
        .map(|(index, hosts)| {
            let domains: BTreeSet<String> = hosts.iter().map(|host| display_domain(host)).collect();
            LogoGroup {
                group_id: index + 1,
                domains: domains.into_iter().collect(),
            }
        })
        .collect()
}

/// Cluster a hash map straight into numbered output groups
pub fn cluster(hashes: &IndexMap<String, PerceptualHash>, threshold: u32) -> Vec<LogoGroup> {
    build_logo_groups(group_by_similarity(hashes, threshold))
}
