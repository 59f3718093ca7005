//! Grid topology: transformer hierarchy loading and synthesis.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Transformer role in the distribution hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerKind {
    /// City-level substation feeding pole/pad transformers.
    Substation,
    /// Pole- or pad-mounted distribution transformer serving households.
    PolePad,
}

/// One row of the topology table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyRow {
    pub kind: TransformerKind,
    /// Stable transformer identity, unique within the city.
    pub id: String,
    /// Parent transformer id; `None` for the substation.
    pub parent: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Buildings served; zero for the substation.
    pub buildings: u32,
}

/// Topology loading or consistency failure.
#[derive(Debug)]
pub enum TopologyError {
    Io(io::Error),
    Csv(csv::Error),
    /// Structural problem (missing substation, dangling parent, duplicate id).
    Invalid(String),
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "topology io error: {e}"),
            Self::Csv(e) => write!(f, "topology csv error: {e}"),
            Self::Invalid(msg) => write!(f, "invalid topology: {msg}"),
        }
    }
}

impl std::error::Error for TopologyError {}

impl From<io::Error> for TopologyError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for TopologyError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

/// A validated city topology: exactly one substation plus its pole/pad
/// transformers.
#[derive(Debug, Clone)]
pub struct Topology {
    pub substation: TopologyRow,
    pub pole_pads: Vec<TopologyRow>,
}

impl Topology {
    /// Validates a raw row list into a topology.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::Invalid`] when the row set has no single
    /// substation, duplicate ids, or pole/pads not parented to it.
    pub fn from_rows(rows: Vec<TopologyRow>) -> Result<Self, TopologyError> {
        let mut substation = None;
        let mut pole_pads = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for row in rows {
            if !seen.insert(row.id.clone()) {
                return Err(TopologyError::Invalid(format!("duplicate id '{}'", row.id)));
            }
            match row.kind {
                TransformerKind::Substation => {
                    if substation.replace(row).is_some() {
                        return Err(TopologyError::Invalid(
                            "more than one substation".to_string(),
                        ));
                    }
                }
                TransformerKind::PolePad => pole_pads.push(row),
            }
        }

        let substation =
            substation.ok_or_else(|| TopologyError::Invalid("no substation row".to_string()))?;

        for pp in &pole_pads {
            if pp.parent.as_deref() != Some(substation.id.as_str()) {
                return Err(TopologyError::Invalid(format!(
                    "pole/pad '{}' not parented to substation '{}'",
                    pp.id, substation.id
                )));
            }
            if pp.buildings == 0 {
                return Err(TopologyError::Invalid(format!(
                    "pole/pad '{}' serves zero buildings",
                    pp.id
                )));
            }
        }
        if pole_pads.is_empty() {
            return Err(TopologyError::Invalid(
                "substation has no pole/pad transformers".to_string(),
            ));
        }

        Ok(Self {
            substation,
            pole_pads,
        })
    }

    /// Loads and validates a topology from a CSV file.
    ///
    /// Expected columns: `kind,id,parent,latitude,longitude,buildings`
    /// with an empty `parent` on the substation row.
    ///
    /// # Errors
    ///
    /// Returns a `TopologyError` on io, parse, or consistency failure.
    pub fn from_csv_file(path: &Path) -> Result<Self, TopologyError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Loads and validates a topology from any CSV reader.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, TopologyError> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.deserialize::<RawRow>() {
            rows.push(record?.into());
        }
        Self::from_rows(rows)
    }

    /// Synthesizes a plausible demo topology for `city`, seeded so the same
    /// city name always yields the same layout.
    ///
    /// One substation plus `transformers` pole/pads scattered around the
    /// Metro Manila area, each serving `buildings_min..=buildings_max`
    /// buildings.
    pub fn demo_city(
        city: &str,
        seed: u64,
        transformers: u32,
        buildings_min: u32,
        buildings_max: u32,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ city_hash(city));

        let base_lat = 14.65 + rng.random_range(-0.05..0.05);
        let base_lon = 121.05 + rng.random_range(-0.05..0.05);
        let sub_id = format!("{}-SUB-01", city_code(city));

        let substation = TopologyRow {
            kind: TransformerKind::Substation,
            id: sub_id.clone(),
            parent: None,
            latitude: base_lat,
            longitude: base_lon,
            buildings: 0,
        };

        let pole_pads = (1..=transformers)
            .map(|i| TopologyRow {
                kind: TransformerKind::PolePad,
                id: format!("{}-T-{i:02}", city_code(city)),
                parent: Some(sub_id.clone()),
                latitude: base_lat + rng.random_range(-0.02..0.02),
                longitude: base_lon + rng.random_range(-0.02..0.02),
                buildings: rng.random_range(buildings_min..=buildings_max),
            })
            .collect();

        Self {
            substation,
            pole_pads,
        }
    }

    /// Total buildings served across all pole/pads.
    pub fn total_buildings(&self) -> u32 {
        self.pole_pads.iter().map(|pp| pp.buildings).sum()
    }
}

/// CSV row as written on disk; `parent` is an empty string for the
/// substation.
#[derive(Debug, Deserialize)]
struct RawRow {
    kind: TransformerKind,
    id: String,
    #[serde(default)]
    parent: String,
    latitude: f64,
    longitude: f64,
    buildings: u32,
}

impl From<RawRow> for TopologyRow {
    fn from(raw: RawRow) -> Self {
        Self {
            kind: raw.kind,
            id: raw.id,
            parent: (!raw.parent.is_empty()).then_some(raw.parent),
            latitude: raw.latitude,
            longitude: raw.longitude,
            buildings: raw.buildings,
        }
    }
}

/// Stable FNV-1a hash so demo layouts survive process restarts.
fn city_hash(city: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for b in city.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Short uppercase code derived from the city name ("Quezon City" -> "QUE").
fn city_code(city: &str) -> String {
    city.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
kind,id,parent,latitude,longitude,buildings
substation,QC-SUB-01,,14.65,121.05,0
pole_pad,QC-T-01,QC-SUB-01,14.66,121.06,35
pole_pad,QC-T-02,QC-SUB-01,14.64,121.04,52
";

    #[test]
    fn csv_round_trip() {
        let topo = Topology::from_csv_reader(CSV.as_bytes()).expect("valid csv");
        assert_eq!(topo.substation.id, "QC-SUB-01");
        assert_eq!(topo.pole_pads.len(), 2);
        assert_eq!(topo.pole_pads[1].buildings, 52);
        assert_eq!(topo.total_buildings(), 87);
    }

    #[test]
    fn rejects_missing_substation() {
        let csv = "\
kind,id,parent,latitude,longitude,buildings
pole_pad,QC-T-01,QC-SUB-01,14.66,121.06,35
";
        let err = Topology::from_csv_reader(csv.as_bytes());
        assert!(matches!(err, Err(TopologyError::Invalid(_))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let csv = "\
kind,id,parent,latitude,longitude,buildings
substation,QC-SUB-01,,14.65,121.05,0
pole_pad,QC-T-01,QC-SUB-01,14.66,121.06,35
pole_pad,QC-T-01,QC-SUB-01,14.64,121.04,52
";
        let err = Topology::from_csv_reader(csv.as_bytes());
        assert!(matches!(err, Err(TopologyError::Invalid(_))));
    }

    #[test]
    fn rejects_dangling_parent() {
        let csv = "\
kind,id,parent,latitude,longitude,buildings
substation,QC-SUB-01,,14.65,121.05,0
pole_pad,QC-T-01,OTHER-SUB,14.66,121.06,35
";
        let err = Topology::from_csv_reader(csv.as_bytes());
        assert!(matches!(err, Err(TopologyError::Invalid(_))));
    }

    #[test]
    fn demo_city_is_deterministic() {
        let a = Topology::demo_city("Quezon City", 42, 8, 20, 60);
        let b = Topology::demo_city("Quezon City", 42, 8, 20, 60);
        assert_eq!(a.substation.id, b.substation.id);
        assert_eq!(a.pole_pads.len(), 8);
        for (x, y) in a.pole_pads.iter().zip(b.pole_pads.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.buildings, y.buildings);
            assert_eq!(x.latitude, y.latitude);
        }
    }

    #[test]
    fn different_cities_get_different_layouts() {
        let a = Topology::demo_city("Quezon City", 42, 8, 20, 60);
        let b = Topology::demo_city("Makati", 42, 8, 20, 60);
        assert_ne!(a.substation.id, b.substation.id);
        assert_ne!(a.substation.latitude, b.substation.latitude);
    }

    #[test]
    fn demo_buildings_respect_bounds() {
        let topo = Topology::demo_city("Pasig", 7, 20, 25, 40);
        for pp in &topo.pole_pads {
            assert!((25..=40).contains(&pp.buildings));
        }
        assert!(Topology::from_rows(
            std::iter::once(topo.substation.clone())
                .chain(topo.pole_pads.iter().cloned())
                .collect()
        )
        .is_ok());
    }
}
