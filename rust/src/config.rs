//! Configuration for the duty planner.

use pyo3::prelude::*;

/// Rooms covered by one day's assignment unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: u32 = 20;

/// Tuning knobs for building ranking and room rotation.
#[pyclass]
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// Rooms covered per building per day
    #[pyo3(get, set)]
    pub block_size: u32,
    /// Affiliation tag meaning "draws from every unit"; such buildings go last
    #[pyo3(get, set)]
    pub covers_all_affiliation: String,
    /// Affiliations whose supervisors are never drawn and whose buildings rank low
    #[pyo3(get, set)]
    pub excluded_affiliations: Vec<String>,
    /// Buildings whose affiliations all start with this prefix are ranked first
    #[pyo3(get, set)]
    pub preferred_prefix: String,
    /// Logging verbosity (0=silent, 1=changes, 2=checks, 3=debug)
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            covers_all_affiliation: "ALL ENGINEERING SCHOOL".to_string(),
            excluded_affiliations: vec![
                "SCHOOL OF COMPUTER ENGINEERING".to_string(),
                "SCHOOL OF COMPUTER APPLICATIONS".to_string(),
                "SCHOOL OF COMPUTER SCIENCE".to_string(),
            ],
            preferred_prefix: "SCHOOL OF".to_string(),
            verbosity: 0,
        }
    }
}

impl PlannerConfig {
    /// Reject settings the planner cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 {
            return Err("block_size must be at least 1".to_string());
        }
        Ok(())
    }
}

#[pymethods]
impl PlannerConfig {
    #[new]
    #[pyo3(signature = (
        block_size=None,
        covers_all_affiliation=None,
        excluded_affiliations=None,
        preferred_prefix=None,
        verbosity=None
    ))]
    fn new(
        block_size: Option<u32>,
        covers_all_affiliation: Option<String>,
        excluded_affiliations: Option<Vec<String>>,
        preferred_prefix: Option<String>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            block_size: block_size.unwrap_or(defaults.block_size),
            covers_all_affiliation: covers_all_affiliation
                .unwrap_or(defaults.covers_all_affiliation),
            excluded_affiliations: excluded_affiliations
                .unwrap_or(defaults.excluded_affiliations),
            preferred_prefix: preferred_prefix.unwrap_or(defaults.preferred_prefix),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "PlannerConfig(block_size={}, covers_all_affiliation={:?}, excluded={})",
            self.block_size,
            self.covers_all_affiliation,
            self.excluded_affiliations.len()
        )
    }
}
