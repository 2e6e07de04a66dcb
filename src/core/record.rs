//! Upstream movement/booking records and series keys.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a container moved empty or carrying cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerStatus {
    /// Empty repositioning move.
    Empty,
    /// Revenue (laden) move.
    Laden,
}

/// A single movement/booking event as delivered by the ingestion layer.
///
/// Field-name aliasing and unit normalization happen upstream; records
/// arriving here are already clean. A record is attributed to its
/// destination location, since that is where the container will sit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub container_type: String,
    pub quantity: u32,
    pub status: ContainerStatus,
}

impl MovementRecord {
    /// Whether this event adds empty stock at the destination.
    pub fn is_empty_positioning(&self) -> bool {
        self.status == ContainerStatus::Empty
    }

    /// The series this record contributes observations to.
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(&self.destination, &self.container_type)
    }
}

/// Identifies one forecast series: a (location, container-type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub location: String,
    pub container_type: String,
}

impl SeriesKey {
    pub fn new(location: impl Into<String>, container_type: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            container_type: container_type.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.container_type)
    }
}
