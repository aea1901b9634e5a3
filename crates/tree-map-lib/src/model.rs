//! Read models returned by the tree inventory backend
//!
//! These are projections: the map never edits them. Edits go through the
//! inventory CRUD API elsewhere and invalidate the map cache wholesale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeStatus {
    Alive,
    Cut,
    Dead,
    Replaced,
    #[serde(other)]
    Unknown,
}

/// Health assessment of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeHealth {
    Healthy,
    NeedsAttention,
    Diseased,
    Dead,
    #[serde(other)]
    Unknown,
}

impl TreeStatus {
    /// Query parameter value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Cut => "cut",
            Self::Dead => "dead",
            Self::Replaced => "replaced",
            Self::Unknown => "unknown",
        }
    }

    /// Values offered as filters
    pub fn all() -> &'static [Self] {
        &[Self::Alive, Self::Cut, Self::Dead, Self::Replaced]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Alive => "ALIVE",
            Self::Cut => "CUT",
            Self::Dead => "DEAD",
            Self::Replaced => "REPLACED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl TreeHealth {
    /// Query parameter value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::NeedsAttention => "needs_attention",
            Self::Diseased => "diseased",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }

    /// Values offered as filters
    pub fn all() -> &'static [Self] {
        &[Self::Healthy, Self::NeedsAttention, Self::Diseased]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::NeedsAttention => "NEEDS ATTENTION",
            Self::Diseased => "DISEASED",
            Self::Dead => "DEAD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TreeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute filters applied server-side; `None` means "all"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapFilters {
    pub status: Option<TreeStatus>,
    pub health: Option<TreeHealth>,
}

impl MapFilters {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.health.is_none()
    }
}

/// Lightweight tree record used for map markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMapItem {
    pub id: String,
    pub tree_code: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub common_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub barangay: Option<String>,
    pub status: TreeStatus,
    pub health: TreeHealth,
}

impl TreeMapItem {
    /// Display title: scientific name, falling back to the common name
    pub fn title(&self) -> &str {
        if !self.species.is_empty() {
            &self.species
        } else {
            self.common_name.as_deref().unwrap_or("")
        }
    }
}

/// Server-side aggregate of nearby trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeCluster {
    pub cluster_lat: f64,
    pub cluster_lng: f64,
    pub tree_count: u64,
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub sample_code: Option<String>,
    #[serde(default)]
    pub sample_species: Option<String>,
}

/// Photo attached to a tree record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePhoto {
    pub url: String,
    pub filename: String,
}

/// Photos arrive either as bare URLs or as metadata objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPhoto {
    Url(String),
    Meta {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
}

impl From<RawPhoto> for TreePhoto {
    fn from(raw: RawPhoto) -> Self {
        let (url, filename) = match raw {
            RawPhoto::Url(url) => (url, None),
            RawPhoto::Meta { url, filename } => (url, filename),
        };
        let filename = filename.unwrap_or_else(|| {
            url.rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("image.jpg")
                .to_string()
        });
        Self { url, filename }
    }
}

fn deserialize_photos<'de, D>(deserializer: D) -> std::result::Result<Vec<TreePhoto>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<RawPhoto>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(TreePhoto::from)
        .collect())
}

/// Full tree record, fetched lazily when a marker is selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDetail {
    pub id: String,
    pub tree_code: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub barangay: Option<String>,
    pub status: TreeStatus,
    pub health: TreeHealth,
    #[serde(default)]
    pub height_meters: Option<f64>,
    #[serde(default)]
    pub diameter_cm: Option<f64>,
    #[serde(default)]
    pub age_years: Option<u32>,
    #[serde(default)]
    pub planted_date: Option<String>,
    #[serde(default)]
    pub cutting_date: Option<String>,
    #[serde(default)]
    pub cutting_reason: Option<String>,
    #[serde(default)]
    pub managed_by: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_photos")]
    pub photos: Vec<TreePhoto>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TreeDetail {
    pub fn title(&self) -> &str {
        match self.species.as_deref() {
            Some(species) if !species.is_empty() => species,
            _ => &self.common_name,
        }
    }
}
