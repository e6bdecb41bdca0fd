//! Core data types for the duty rota.
//!
//! String-typed fields coming from the document store are validated here,
//! at deserialization time, so the planner only sees closed enums and
//! normalized identifiers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while validating raw record fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown category: {0:?} (expected male/female)")]
    UnknownWing(String),
    #[error("Unknown employee group: {0:?} (expected teaching/non-teaching)")]
    UnknownRole(String),
    #[error("Affiliation must not be empty")]
    EmptyAffiliation,
    #[error("Invalid room range: {0:?}")]
    InvalidRoomRange(String),
}

/// Which residential wing a building or supervisor belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Wing {
    Male,
    Female,
}

impl Wing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Wing::Male => "MALE",
            Wing::Female => "FEMALE",
        }
    }
}

impl FromStr for Wing {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" | "BOYS" => Ok(Wing::Male),
            "FEMALE" | "GIRLS" => Ok(Wing::Female),
            _ => Err(ModelError::UnknownWing(s.to_string())),
        }
    }
}

impl TryFrom<String> for Wing {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Wing> for String {
    fn from(value: Wing) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Wing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Employee group of a supervisor. Every duty pairs one of each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Teaching,
    NonTeaching,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Teaching, Role::NonTeaching];

    /// Position of this role in per-role arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Role::Teaching => 0,
            Role::NonTeaching => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teaching => "Teaching",
            Role::NonTeaching => "Non-Teaching",
        }
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "teaching" => Ok(Role::Teaching),
            "nonteaching" => Ok(Role::NonTeaching),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized department/unit name: trimmed, single-spaced, upper case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Affiliation(String);

impl Affiliation {
    pub fn new(raw: &str) -> Result<Self, ModelError> {
        let normalized = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        if normalized.is_empty() {
            return Err(ModelError::EmptyAffiliation);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Affiliation {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Affiliation> for String {
    fn from(value: Affiliation) -> Self {
        value.0
    }
}

impl fmt::Display for Affiliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive, 1-based range of rooms covered by one duty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomBlock {
    pub start: u32,
    pub end: u32,
}

impl RoomBlock {
    pub fn new(start: u32, end: u32) -> Result<Self, ModelError> {
        if start == 0 || end < start {
            return Err(ModelError::InvalidRoomRange(format!("{}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Number of rooms in the block.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl FromStr for RoomBlock {
    type Err = ModelError;

    /// Parses `"21-40"`; a lone number `"7"` is the single-room block `7-7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidRoomRange(s.to_string());
        let mut parts = s.split('-').map(|p| p.trim().parse::<u32>());
        let start = parts.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let end = match parts.next() {
            Some(end) => end.map_err(|_| invalid())?,
            None => start,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        RoomBlock::new(start, end).map_err(|_| invalid())
    }
}

impl TryFrom<String> for RoomBlock {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomBlock> for String {
    fn from(value: RoomBlock) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RoomBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Missing or unparseable dates deserialize to `None` (never served).
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        // Full timestamps keep only their calendar day.
        let day = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }))
}

/// The most recent duty a supervisor served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastDuty {
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub block: Option<RoomBlock>,
    #[serde(default)]
    pub rooms: u32,
}

impl LastDuty {
    pub fn new(date: NaiveDate, building: &str, block: RoomBlock) -> Self {
        Self {
            date: Some(date),
            building: building.to_string(),
            block: Some(block),
            rooms: block.len(),
        }
    }
}

/// A staff member who can be put on duty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supervisor {
    pub id: String,
    #[serde(default)]
    pub employee_code: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub designation: String,
    pub affiliation: Affiliation,
    pub role: Role,
    pub wing: Wing,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub on_leave: bool,
    #[serde(default)]
    pub last_duty: Option<LastDuty>,
}

impl Supervisor {
    /// Date of the last duty, `None` when never served or unreadable.
    pub fn last_duty_date(&self) -> Option<NaiveDate> {
        self.last_duty.as_ref().and_then(|d| d.date)
    }

    /// True if this supervisor already served in the calendar month of `date`.
    pub fn served_in_month_of(&self, date: NaiveDate) -> bool {
        self.last_duty_date()
            .is_some_and(|last| same_month(last, date))
    }

    pub fn to_ref(&self) -> SupervisorRef {
        SupervisorRef {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// A residential building with a contiguous range of rooms `1..=capacity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub name: String,
    pub capacity: u32,
    pub wing: Wing,
    #[serde(default)]
    pub affiliations: Vec<Affiliation>,
}

/// Denormalized supervisor identity stored on an assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorRef {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Identity of an assignment: one per building per calendar day.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentKey {
    pub building: String,
    pub date: NaiveDate,
}

/// One day's duty for one building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub affiliation: Affiliation,
    pub date: NaiveDate,
    pub building: String,
    pub block: RoomBlock,
    pub teaching: SupervisorRef,
    pub non_teaching: SupervisorRef,
}

impl Assignment {
    pub fn key(&self) -> AssignmentKey {
        AssignmentKey {
            building: self.building.clone(),
            date: self.date,
        }
    }

    pub fn supervisor(&self, role: Role) -> &SupervisorRef {
        match role {
            Role::Teaching => &self.teaching,
            Role::NonTeaching => &self.non_teaching,
        }
    }
}

/// A pending write of a supervisor's last duty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastDutyUpdate {
    pub supervisor_id: String,
    pub last_duty: LastDuty,
}

/// (year, month) bucket of a date.
#[inline]
pub fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[inline]
pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    month_of(a) == month_of(b)
}
