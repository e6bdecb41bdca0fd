//! Validation of an incoming planning request.

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::models::Wing;

/// Reasons a request is rejected before anything is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing required field: {0}")]
    Missing(&'static str),
    #[error("Invalid date for {field}: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("{0}")]
    InvalidCategory(String),
    #[error("end_date {end} is before start_date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// A request as received, every field still optional and untyped.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawPlanRequest {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub exclude_buildings: Vec<String>,
    #[serde(default)]
    pub overwrite: bool,
}

/// A validated planning request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub wing: Wing,
    pub exclude_buildings: Vec<String>,
    pub overwrite: bool,
}

fn parse_date(field: &'static str, raw: Option<&str>) -> Result<NaiveDate, RequestError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RequestError::Missing(field))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| RequestError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

impl PlanRequest {
    pub fn from_raw(raw: &RawPlanRequest) -> Result<Self, RequestError> {
        let start_date = parse_date("start_date", raw.start_date.as_deref())?;
        let end_date = parse_date("end_date", raw.end_date.as_deref())?;
        if end_date < start_date {
            return Err(RequestError::EndBeforeStart {
                start: start_date,
                end: end_date,
            });
        }

        let category = raw
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RequestError::Missing("category"))?;
        let wing: Wing = category
            .parse()
            .map_err(|e: crate::models::ModelError| RequestError::InvalidCategory(e.to_string()))?;

        let exclude_buildings = raw
            .exclude_buildings
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();

        Ok(Self {
            start_date,
            end_date,
            wing,
            exclude_buildings,
            overwrite: raw.overwrite,
        })
    }
}
