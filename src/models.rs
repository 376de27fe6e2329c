// 📍 Place & Status Report models
//
// A Place is identity + descriptive values, owned by the store.
// A StatusReport is one crowd-sourced OPEN/CLOSED claim. Reports are
// append-only: the core never updates or deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{IsItOpenError, Result};

// ============================================================================
// PLACE CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceCategory {
    Medical,
    Bank,
    Office,
    Shop,
    Food,
    Other,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 6] = [
        PlaceCategory::Medical,
        PlaceCategory::Bank,
        PlaceCategory::Office,
        PlaceCategory::Shop,
        PlaceCategory::Food,
        PlaceCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Medical => "Medical",
            PlaceCategory::Bank => "Bank",
            PlaceCategory::Office => "Office",
            PlaceCategory::Shop => "Shop",
            PlaceCategory::Food => "Food",
            PlaceCategory::Other => "Other",
        }
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaceCategory {
    type Err = IsItOpenError;

    /// Case-insensitive ("medical", "MEDICAL" and "Medical" all parse)
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        PlaceCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| IsItOpenError::invalid(format!("unknown category '{}'", s)))
    }
}

// ============================================================================
// REPORT STATUS & REPORTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Open,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "OPEN",
            ReportStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = IsItOpenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(ReportStatus::Open),
            "CLOSED" => Ok(ReportStatus::Closed),
            _ => Err(IsItOpenError::invalid(format!("unknown status '{}'", s))),
        }
    }
}

/// Who filed a report. Carried for display only, it does not weight resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reporter {
    Staff,
    #[default]
    Public,
}

impl Reporter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reporter::Staff => "staff",
            Reporter::Public => "public",
        }
    }
}

impl FromStr for Reporter {
    type Err = IsItOpenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Reporter::Staff),
            "public" => Ok(Reporter::Public),
            _ => Err(IsItOpenError::invalid(format!("unknown reporter '{}'", s))),
        }
    }
}

// ============================================================================
// PLACE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(IsItOpenError::invalid(format!("latitude {} out of range", self.lat)));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(IsItOpenError::invalid(format!("longitude {} out of range", self.lng)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    /// Stable identity (UUID)
    pub id: String,

    pub name: String,
    pub category: PlaceCategory,
    pub city: String,
    pub area: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    /// Hosted image URL (upload happens outside this system)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_link: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    /// Hash for duplicate detection on bulk import.
    /// NOTE: this is for DEDUPLICATION, not IDENTITY. Identity = id (UUID).
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}",
            self.name.to_lowercase(),
            self.city.to_lowercase(),
            self.area.to_lowercase()
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Payload for creating a place
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlace {
    pub name: String,
    pub category: PlaceCategory,
    pub city: String,
    pub area: String,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lng: Option<f64>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default, alias = "googleMapsLink")]
    pub maps_link: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IsItOpenError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewPlace {
    /// Validate and stamp a new Place with a fresh UUID
    pub fn into_place(self, now: DateTime<Utc>) -> Result<Place> {
        let name = required("name", &self.name)?;
        let city = required("city", &self.city)?;
        let area = required("area", &self.area)?;

        let coordinates = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                let c = Coordinates { lat, lng };
                c.validate()?;
                Some(c)
            }
            (None, None) => None,
            _ => {
                return Err(IsItOpenError::invalid(
                    "lat and lng must be given together",
                ))
            }
        };

        Ok(Place {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category: self.category,
            city,
            area,
            coordinates,
            image: optional(self.image),
            maps_link: optional(self.maps_link),
            created_at: now,
            updated_at: now,
        })
    }
}

// ============================================================================
// STATUS REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub id: String,
    pub place_id: String,
    pub status: ReportStatus,
    pub updated_by: Reporter,
    pub created_at: DateTime<Utc>,
}

/// Payload for filing a report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatusReport {
    pub place_id: String,
    pub status: ReportStatus,

    #[serde(default)]
    pub updated_by: Reporter,
}

impl NewStatusReport {
    pub fn into_report(self, now: DateTime<Utc>) -> Result<StatusReport> {
        let place_id = required("placeId", &self.place_id)?;

        Ok(StatusReport {
            id: uuid::Uuid::new_v4().to_string(),
            place_id,
            status: self.status,
            updated_by: self.updated_by,
            created_at: now,
        })
    }
}
