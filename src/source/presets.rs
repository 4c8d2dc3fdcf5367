//! Well-known public tile servers.
//!
//! Most of these services have usage policies that require a meaningful
//! User-Agent and forbid heavy use; Thunderforest additionally needs an API
//! key appended as `?apikey=...`.

use super::config::INVALID_TEMPLATE;

pub const INVALID: &str = INVALID_TEMPLATE;

pub const OSM: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const OPENTOPOMAP: &str = "https://tile.opentopomap.org/{z}/{x}/{y}.png";

pub const GOOGLE_MAP: &str = "https://mt0.google.com/vt/lyrs=m&hl=en&x={x}&y={y}&z={z}&s=Ga";
pub const GOOGLE_SAT: &str = "https://mt0.google.com/vt/lyrs=y&hl=en&x={x}&y={y}&z={z}&s=Ga";
pub const GOOGLE_LAND: &str = "https://mt0.google.com/vt/lyrs=p&hl=en&x={x}&y={y}&z={z}&s=Ga";

pub const CARTODB_POSITRON: &str = "https://a.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png";
pub const CARTODB_DARK_MATTER: &str = "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png";

pub const THUNDERFOREST_TRANSPORT: &str =
    "https://tile.thunderforest.com/transport/{z}/{x}/{y}.png";
pub const THUNDERFOREST_LANDSCAPE: &str =
    "https://tile.thunderforest.com/landscape/{z}/{x}/{y}.png";
pub const THUNDERFOREST_OUTDOORS: &str =
    "https://tile.thunderforest.com/outdoors/{z}/{x}/{y}.png";

// Esri orders the path as z/y/x.
pub const ESRI_WORLD_STREET_MAP: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Street_Map/MapServer/tile/{z}/{y}/{x}";
pub const ESRI_WORLD_IMAGERY: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// All presets by short name, for lookup from the command line.
pub const ALL: &[(&str, &str)] = &[
    ("osm", OSM),
    ("opentopomap", OPENTOPOMAP),
    ("google-map", GOOGLE_MAP),
    ("google-sat", GOOGLE_SAT),
    ("google-land", GOOGLE_LAND),
    ("cartodb-positron", CARTODB_POSITRON),
    ("cartodb-dark-matter", CARTODB_DARK_MATTER),
    ("thunderforest-transport", THUNDERFOREST_TRANSPORT),
    ("thunderforest-landscape", THUNDERFOREST_LANDSCAPE),
    ("thunderforest-outdoors", THUNDERFOREST_OUTDOORS),
    ("esri-street", ESRI_WORLD_STREET_MAP),
    ("esri-imagery", ESRI_WORLD_IMAGERY),
];

/// Template of a preset by short name (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static str> {
    ALL.iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, template)| *template)
}
