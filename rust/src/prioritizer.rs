//! Building ranking for the planning pass.
//!
//! Buildings whose residents come from a few narrow, "preferred" units are
//! the easiest to staff with local supervisors, so they are planned first,
//! while the rotation pools are still full. Buildings that draw from every
//! unit, or from units whose staff are excluded from duty, go last.

use std::cmp::Ordering;

use crate::config::PlannerConfig;
use crate::models::Building;

/// Sort key for one building. Lower sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingRank {
    /// Associated with the "covers everything" tag
    pub covers_all: bool,
    /// Associated with at least one excluded affiliation
    pub has_excluded: bool,
    /// Every affiliation matches the preferred prefix (false when none)
    pub all_preferred: bool,
    pub affiliation_count: usize,
    pub name: String,
}

impl Ord for BuildingRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.covers_all
            .cmp(&other.covers_all)
            .then(self.has_excluded.cmp(&other.has_excluded))
            // true first
            .then(other.all_preferred.cmp(&self.all_preferred))
            .then(self.affiliation_count.cmp(&other.affiliation_count))
            .then(self.name.cmp(&other.name))
    }
}

impl PartialOrd for BuildingRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compute the ranking key of a single building.
pub fn compute_rank(building: &Building, config: &PlannerConfig) -> BuildingRank {
    let covers_all = building
        .affiliations
        .iter()
        .any(|a| a.as_str().eq_ignore_ascii_case(config.covers_all_affiliation.trim()));
    let has_excluded = building.affiliations.iter().any(|a| {
        config
            .excluded_affiliations
            .iter()
            .any(|ex| a.as_str().eq_ignore_ascii_case(ex.trim()))
    });
    let prefix = config.preferred_prefix.to_uppercase();
    let all_preferred = !building.affiliations.is_empty()
        && building
            .affiliations
            .iter()
            .all(|a| a.as_str().starts_with(prefix.as_str()));

    BuildingRank {
        covers_all,
        has_excluded,
        all_preferred,
        affiliation_count: building.affiliations.len(),
        name: building.name.clone(),
    }
}

/// Order buildings for planning, easiest to staff fairly first.
///
/// Returns an empty vector when given none; the caller reports that.
pub fn prioritize_buildings(buildings: Vec<Building>, config: &PlannerConfig) -> Vec<Building> {
    let mut ranked: Vec<(BuildingRank, Building)> = buildings
        .into_iter()
        .map(|b| (compute_rank(&b, config), b))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, b)| b).collect()
}
