//! Restricted airspace zones loaded from a GeoJSON feature collection.
//!
//! The index is built once at startup and is read-only afterwards, apart from
//! the per-category visibility set consulted when picking intersection candidates.

use geojson::{Feature, GeoJson, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::{BoundingBox, Point, Ring, ZoneGeometry};

const UNNAMED_ZONE: &str = "Unnamed zone";
const NAME_KEYS: [&str; 2] = ["name", "Name"];
const DESCRIPTION_KEYS: [&str; 2] = ["description", "Description"];

/// Stable identity of a zone: its position in the loaded collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub usize);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Classification of a zone derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCategory {
    /// Flights prohibited
    Prohibited,
    /// Flights allowed only with authorization
    Restricted,
    /// Danger area (firing ranges, industrial hazards)
    Danger,
    /// Aerodrome control zones and traffic zones
    ControlZone,
    /// Temporarily reserved or segregated airspace
    Temporary,
    /// Everything the prefix table does not match
    Other,
}

impl ZoneCategory {
    pub const ALL: [ZoneCategory; 6] = [
        ZoneCategory::Prohibited,
        ZoneCategory::Restricted,
        ZoneCategory::Danger,
        ZoneCategory::ControlZone,
        ZoneCategory::Temporary,
        ZoneCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneCategory::Prohibited => "prohibited",
            ZoneCategory::Restricted => "restricted",
            ZoneCategory::Danger => "danger",
            ZoneCategory::ControlZone => "control_zone",
            ZoneCategory::Temporary => "temporary",
            ZoneCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ZoneCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown zone category '{s}'"))
    }
}

/// Ordered prefix table; the first matching prefix wins.
pub const CATEGORY_PREFIXES: &[(&str, ZoneCategory)] = &[
    ("UMP", ZoneCategory::Prohibited),
    ("UMR", ZoneCategory::Restricted),
    ("UMD", ZoneCategory::Danger),
    ("CTR", ZoneCategory::ControlZone),
    ("ATZ", ZoneCategory::ControlZone),
    ("TMA", ZoneCategory::ControlZone),
    ("TSA", ZoneCategory::Temporary),
    ("TRA", ZoneCategory::Temporary),
];

/// Classify a name against an arbitrary prefix table (case-insensitive, trimmed).
pub fn categorize_with(table: &[(&str, ZoneCategory)], name: &str) -> ZoneCategory {
    let normalized = name.trim().to_uppercase();
    table
        .iter()
        .find(|(prefix, _)| normalized.starts_with(&prefix.to_uppercase()))
        .map(|(_, category)| *category)
        .unwrap_or(ZoneCategory::Other)
}

/// Classify a name with the built-in prefix table.
pub fn category_of(name: &str) -> ZoneCategory {
    categorize_with(CATEGORY_PREFIXES, name)
}

/// Colors the map layer uses for a category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneStyle {
    pub stroke_color: &'static str,
    pub fill_color: &'static str,
    pub fill_opacity: f32,
}

pub fn style(category: ZoneCategory) -> ZoneStyle {
    let (stroke_color, fill_color, fill_opacity) = match category {
        ZoneCategory::Prohibited => ("#c62828", "#ef5350", 0.35),
        ZoneCategory::Restricted => ("#ef6c00", "#ffb74d", 0.3),
        ZoneCategory::Danger => ("#f9a825", "#fff176", 0.3),
        ZoneCategory::ControlZone => ("#1565c0", "#64b5f6", 0.2),
        ZoneCategory::Temporary => ("#6a1b9a", "#ba68c8", 0.25),
        ZoneCategory::Other => ("#616161", "#bdbdbd", 0.2),
    };
    ZoneStyle {
        stroke_color,
        fill_color,
        fill_opacity,
    }
}

/// A restricted or advisory airspace area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub description: Option<String>,
    pub category: ZoneCategory,
    pub geometry: ZoneGeometry,
    #[serde(skip)]
    bbox: Option<BoundingBox>,
}

impl Zone {
    pub fn new(id: ZoneId, name: impl Into<String>, geometry: ZoneGeometry) -> Self {
        let name = name.into();
        Self {
            id,
            category: category_of(&name),
            bbox: geometry.bounding_box(),
            name,
            description: None,
            geometry,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read zone file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zone data is not valid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),
    #[error("zone data must be a FeatureCollection, got {0}")]
    NotFeatureCollection(&'static str),
}

/// Which zones the intersection check considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// When true, zones of hidden categories are still checked.
    pub include_hidden_in_intersection_check: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            include_hidden_in_intersection_check: true,
        }
    }
}

/// Read-only snapshot of all loaded zones plus category visibility.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
    hidden: BTreeSet<ZoneCategory>,
}

impl ZoneIndex {
    /// Build an index from already constructed zones.
    pub fn from_zones(zones: Vec<Zone>) -> Self {
        Self {
            zones,
            hidden: BTreeSet::new(),
        }
    }

    /// Build an index from a parsed GeoJSON document.
    pub fn load(geojson: GeoJson) -> Result<Self, LoadError> {
        let collection = match geojson {
            GeoJson::FeatureCollection(collection) => collection,
            GeoJson::Feature(_) => return Err(LoadError::NotFeatureCollection("Feature")),
            GeoJson::Geometry(_) => return Err(LoadError::NotFeatureCollection("Geometry")),
        };

        let total = collection.features.len();
        let mut zones = Vec::with_capacity(total);
        for (idx, feature) in collection.features.iter().enumerate() {
            let name = feature_text(feature, &NAME_KEYS).unwrap_or_else(|| UNNAMED_ZONE.to_string());
            let Some(geometry) = feature_geometry(feature) else {
                tracing::warn!("Skipping feature {} ('{}'): no polygon geometry", idx, name);
                continue;
            };
            let mut zone = Zone::new(ZoneId(idx), name, geometry);
            if let Some(description) = feature_text(feature, &DESCRIPTION_KEYS) {
                zone = zone.with_description(description);
            }
            zones.push(zone);
        }

        tracing::info!("Loaded {} zones from {} features", zones.len(), total);
        Ok(Self::from_zones(zones))
    }

    pub fn from_geojson_str(text: &str) -> Result<Self, LoadError> {
        let geojson: GeoJson = text.parse()?;
        Self::load(geojson)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(&text)
    }

    /// Load zones, or log the failure and continue with none.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::from_path(path) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!("Zone load failed, continuing without zones: {}", err);
                Self::default()
            }
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones_of(&self, category: ZoneCategory) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |zone| zone.category == category)
    }

    /// Number of zones per category, including empty categories.
    pub fn categories(&self) -> BTreeMap<ZoneCategory, usize> {
        let mut counts: BTreeMap<ZoneCategory, usize> =
            ZoneCategory::ALL.into_iter().map(|c| (c, 0)).collect();
        for zone in &self.zones {
            *counts.entry(zone.category).or_default() += 1;
        }
        counts
    }

    pub fn set_visible(&mut self, category: ZoneCategory, visible: bool) {
        if visible {
            self.hidden.remove(&category);
        } else {
            self.hidden.insert(category);
        }
    }

    pub fn is_visible(&self, category: ZoneCategory) -> bool {
        !self.hidden.contains(&category)
    }

    /// Zones the intersection engine should test under the given options.
    pub fn candidate_zones(&self, options: EngineOptions) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |zone| {
            options.include_hidden_in_intersection_check || self.is_visible(zone.category)
        })
    }
}

fn feature_text(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| feature.property(key))
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn feature_geometry(feature: &Feature) -> Option<ZoneGeometry> {
    let geometry = feature.geometry.as_ref()?;
    let mut polygons = Vec::new();
    collect_polygons(&geometry.value, &mut polygons);
    let geometry = ZoneGeometry { polygons };
    (!geometry.is_empty()).then_some(geometry)
}

fn collect_polygons(value: &Value, out: &mut Vec<Vec<Ring>>) {
    match value {
        Value::Polygon(rings) => out.push(convert_rings(rings)),
        Value::MultiPolygon(polygons) => out.extend(polygons.iter().map(|rings| convert_rings(rings))),
        Value::GeometryCollection(members) => {
            for member in members {
                collect_polygons(&member.value, out);
            }
        }
        _ => {}
    }
}

fn convert_rings(rings: &[Vec<Vec<f64>>]) -> Vec<Ring> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|position| match position.as_slice() {
                    [lon, lat, ..] => Point::new(*lat, *lon),
                    _ => Point::new(f64::NAN, f64::NAN),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "UMP1 Minsk" },
                "geometry": { "type": "Polygon", "coordinates": [[[27.5,53.9],[27.6,53.9],[27.6,54.0],[27.5,53.9]]] }
            },
            {
                "type": "Feature",
                "properties": { "Name": "umr 22 Zhodino", "Description": "Military" },
                "geometry": { "type": "MultiPolygon", "coordinates": [[[[28.0,54.0],[28.1,54.0],[28.1,54.1],[28.0,54.0]]]] }
            },
            {
                "type": "Feature",
                "properties": { "name": "Tower" },
                "geometry": { "type": "Point", "coordinates": [27.0, 53.0] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "GeometryCollection", "geometries": [
                    { "type": "Point", "coordinates": [27.0, 53.0] },
                    { "type": "Polygon", "coordinates": [[[26.0,52.0],[26.1,52.0],[26.1,52.1],[26.0,52.0]]] }
                ] }
            }
        ]
    }"#;

    #[test]
    fn load_keeps_areal_features_and_reads_both_name_keys() {
        let index = ZoneIndex::from_geojson_str(SAMPLE).unwrap();
        assert_eq!(index.len(), 3);

        let first = &index.zones()[0];
        assert_eq!(first.name, "UMP1 Minsk");
        assert_eq!(first.category, ZoneCategory::Prohibited);
        assert_eq!(first.geometry.polygons[0][0][0], Point::new(53.9, 27.5));

        let second = &index.zones()[1];
        assert_eq!(second.name, "umr 22 Zhodino");
        assert_eq!(second.category, ZoneCategory::Restricted);
        assert_eq!(second.description.as_deref(), Some("Military"));

        let third = &index.zones()[2];
        assert_eq!(third.id, ZoneId(3));
        assert_eq!(third.name, UNNAMED_ZONE);
        assert_eq!(third.geometry.polygons.len(), 1);
    }

    #[test]
    fn load_rejects_documents_that_are_not_collections() {
        let feature = r#"{ "type": "Feature", "properties": {}, "geometry": null }"#;
        assert!(matches!(
            ZoneIndex::from_geojson_str(feature),
            Err(LoadError::NotFeatureCollection("Feature"))
        ));
        assert!(matches!(
            ZoneIndex::from_geojson_str("not json"),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn load_or_empty_survives_missing_file() {
        let index = ZoneIndex::load_or_empty("/definitely/not/here.geojson");
        assert!(index.is_empty());
    }

    #[test]
    fn prefix_table_first_match_wins() {
        let table = [
            ("UMR", ZoneCategory::Restricted),
            ("UM", ZoneCategory::Danger),
        ];
        assert_eq!(categorize_with(&table, "UMR5"), ZoneCategory::Restricted);
        assert_eq!(categorize_with(&table, "UMD5"), ZoneCategory::Danger);
        assert_eq!(categorize_with(&table, "  umr5"), ZoneCategory::Restricted);
        assert_eq!(categorize_with(&table, "Park"), ZoneCategory::Other);
    }

    #[test]
    fn default_table_classifies_known_prefixes() {
        assert_eq!(category_of("CTR Minsk-2"), ZoneCategory::ControlZone);
        assert_eq!(category_of("TSA 12"), ZoneCategory::Temporary);
        assert_eq!(category_of("UMD 101"), ZoneCategory::Danger);
        assert_eq!(category_of(""), ZoneCategory::Other);
    }

    #[test]
    fn every_category_has_a_style() {
        for category in ZoneCategory::ALL {
            let s = style(category);
            assert!(s.stroke_color.starts_with('#'));
            assert!(s.fill_color.starts_with('#'));
        }
        assert_ne!(style(ZoneCategory::Prohibited), style(ZoneCategory::Other));
    }

    #[test]
    fn hidden_categories_are_filtered_unless_included() {
        let mut index = ZoneIndex::from_geojson_str(SAMPLE).unwrap();
        index.set_visible(ZoneCategory::Prohibited, false);
        assert!(!index.is_visible(ZoneCategory::Prohibited));

        let strict = EngineOptions {
            include_hidden_in_intersection_check: false,
        };
        let names: Vec<_> = index.candidate_zones(strict).map(|z| z.name.as_str()).collect();
        assert!(!names.contains(&"UMP1 Minsk"));
        assert_eq!(index.candidate_zones(EngineOptions::default()).count(), 3);

        index.set_visible(ZoneCategory::Prohibited, true);
        assert_eq!(index.candidate_zones(strict).count(), 3);
    }

    #[test]
    fn category_counts_cover_all_categories() {
        let index = ZoneIndex::from_geojson_str(SAMPLE).unwrap();
        let counts = index.categories();
        assert_eq!(counts.len(), ZoneCategory::ALL.len());
        assert_eq!(counts[&ZoneCategory::Prohibited], 1);
        assert_eq!(counts[&ZoneCategory::Other], 1);
        assert_eq!(index.zones_of(ZoneCategory::Restricted).count(), 1);
    }
}
