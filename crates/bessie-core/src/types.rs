use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata for one photo, as returned by the backend.
///
/// Records are only ever built from server responses. The client never
/// edits one in place; a GPS change goes through [`GpsPatch`] and a
/// re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// Filename as uploaded (e.g. "IMG_0042.jpg").
    pub original_name: String,
    /// Storage key or presigned URL of the full image.
    #[serde(default, alias = "presigned_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_coord")]
    pub gps_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coord")]
    pub gps_lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i64>,
}

impl ImageRecord {
    /// Both coordinates, if the record is geotagged.
    pub fn location(&self) -> Option<(f64, f64)> {
        Some((self.gps_lat?, self.gps_lon?))
    }
}

/// One page of records from `GET /images` or `GET /images/clustered`.
///
/// Missing fields decode to their defaults; the backend omits `total`
/// when it cannot count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePage {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(default)]
    pub total: Option<usize>,
}

/// One similarity group from `GET /images/clusters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// Body of `PATCH /images/{id}/gps`. Coordinates travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPatch {
    pub gps_lat: String,
    pub gps_lon: String,
}

impl GpsPatch {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            gps_lat: lat.to_string(),
            gps_lon: lon.to_string(),
        }
    }
}

/// Ordering of the contact sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Server-paged, sorted by filename within each page.
    #[default]
    Numerical,
    /// Client-flattened clusters, largest first.
    Cluster,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Numerical => f.write_str("numerical"),
            Mode::Cluster => f.write_str("cluster"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numerical" | "n" => Ok(Mode::Numerical),
            "cluster" | "c" => Ok(Mode::Cluster),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Accept a coordinate as a JSON number, a numeric string, or null.
fn lenient_coord<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coord {
        Num(f64),
        Text(String),
    }

    Ok(match Option::<Coord>::deserialize(deserializer)? {
        Some(Coord::Num(v)) => Some(v),
        Some(Coord::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}
