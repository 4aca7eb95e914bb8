//! Map state: one location marker, a replaceable set of historical-event
//! markers and a fixed palette of independently toggled WMS overlays.
//!
//! Drawing is delegated to a [`MapView`]; the controller owns the state and
//! keeps the view consistent with it.

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use crate::dashboard::damage_tags;
use crate::logging::{self, obj, v_int, v_num, v_str, Domain};
use crate::model::{coerce_number, HistoricalEvent};

/// Default view covering mainland Norway.
pub const DEFAULT_CENTER: LatLon = LatLon { lat: 65.0, lon: 14.0 };
pub const DEFAULT_ZOOM: u8 = 5;
/// Zoom used after a location is selected.
pub const LOCATED_ZOOM: u8 = 14;

pub const BUILDING_DAMAGE_COLOR: &str = "#c0392b";
pub const EVENT_COLOR: &str = "#d96830";
pub const EVENT_MARKER_RADIUS: u8 = 7;
/// Popup descriptions are cut to this many characters.
pub const POPUP_DESCRIPTION_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Raster tile layers drawn underneath everything else.
#[derive(Debug, Clone, Copy)]
pub struct BaseLayer {
    pub url_template: &'static str,
    pub attribution: &'static str,
    pub max_zoom: u8,
}

pub const BASE_LAYERS: &[BaseLayer] = &[
    BaseLayer {
        url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        attribution: "© OpenStreetMap",
        max_zoom: 19,
    },
    BaseLayer {
        url_template: "https://cache.kartverket.no/v1/wmts/1.0.0/topo/default/webmercator/{z}/{y}/{x}.png",
        attribution: "© Kartverket",
        max_zoom: 18,
    },
];

/// A pre-configured WMS overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySource {
    pub id: &'static str,
    pub label: &'static str,
    pub url: &'static str,
    pub layers: &'static str,
    pub opacity: f64,
}

pub const WMS_FORMAT: &str = "image/png";
pub const WMS_VERSION: &str = "1.3.0";
pub const WMS_OPACITY: f64 = 0.5;

pub const OVERLAYS: &[OverlaySource] = &[
    OverlaySource {
        id: "flood",
        label: "Flomsoner",
        url: "https://nve.geodataonline.no/arcgis/services/Flomsoner1/MapServer/WMSServer",
        layers: "Flomsone_10arsflom,Flomsone_20arsflom,Flomsone_50arsflom,Flomsone_100arsflom,Flomsone_200arsflom",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "flood_awareness",
        label: "Flomaktsomhet",
        url: "https://nve.geodataonline.no/arcgis/services/FlomAktsomhet/MapServer/WMSServer",
        layers: "Flom_aktsomhetsomrade",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "landslide",
        label: "Skredaktsomhet",
        url: "https://nve.geodataonline.no/arcgis/services/SkredSnoSteinAkt/MapServer/WMSServer",
        layers: "Aktsomhetsomrade",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "quick_clay",
        label: "Kvikkleire",
        url: "https://nve.geodataonline.no/arcgis/services/KvikkleireskredAktsomhet/MapServer/WMSServer",
        layers: "KvikkleireskredAktsomhet",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "avalanche",
        label: "Snøskred",
        url: "https://nve.geodataonline.no/arcgis/services/SnoskredAktsomhet/MapServer/WMSServer",
        layers: "S2_snoskred_u_skogeffekt_Aktsomhetsomrade,S3_snoskred_Aktsomhetsomrade",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "rock_fall",
        label: "Steinsprang",
        url: "https://nve.geodataonline.no/arcgis/services/SkredSteinAktR/MapServer/WMSServer",
        layers: "Utlopsomrade,Utlosningsomrade,Steinsprang-AktsomhetOmrader",
        opacity: WMS_OPACITY,
    },
    OverlaySource {
        id: "combined",
        label: "Skredfaresoner",
        url: "https://nve.geodataonline.no/arcgis/services/Skredfaresoner2/MapServer/WMSServer",
        layers: "Skredsoner_100,Skredsoner_1000",
        opacity: WMS_OPACITY,
    },
];

pub fn overlay(id: &str) -> Option<&'static OverlaySource> {
    OVERLAYS.iter().find(|o| o.id == id)
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl OverlaySource {
    /// WMS 1.3.0 GetMap request for one tile. EPSG:4326 axis order is lat,lon.
    pub fn get_map_url(&self, bbox: BoundingBox, width: u32, height: u32) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(self.url)?;
        url.query_pairs_mut()
            .append_pair("SERVICE", "WMS")
            .append_pair("VERSION", WMS_VERSION)
            .append_pair("REQUEST", "GetMap")
            .append_pair("LAYERS", self.layers)
            .append_pair("STYLES", "")
            .append_pair("CRS", "EPSG:4326")
            .append_pair(
                "BBOX",
                &format!("{},{},{},{}", bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon),
            )
            .append_pair("WIDTH", &width.to_string())
            .append_pair("HEIGHT", &height.to_string())
            .append_pair("FORMAT", WMS_FORMAT)
            .append_pair("TRANSPARENT", "TRUE");
        Ok(url)
    }
}

/// Circle marker for one historical event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub position: LatLon,
    pub fill_color: &'static str,
    pub radius: u8,
    /// Popup content, one entry per line.
    pub popup: Vec<String>,
}

impl EventMarker {
    pub fn from_event(e: &HistoricalEvent) -> Self {
        Self {
            position: LatLon {
                lat: e.latitude,
                lon: e.longitude,
            },
            fill_color: if e.building_damage {
                BUILDING_DAMAGE_COLOR
            } else {
                EVENT_COLOR
            },
            radius: EVENT_MARKER_RADIUS,
            popup: popup_lines(e),
        }
    }
}

fn popup_lines(e: &HistoricalEvent) -> Vec<String> {
    let mut lines = vec![e.kind.clone()];
    if let Some(date) = e.date.as_deref().filter(|d| !d.is_empty()) {
        lines.push(date.to_string());
    }
    if let Some(location) = e.location.as_deref().filter(|l| !l.is_empty()) {
        lines.push(location.to_string());
    }
    lines.push(format!("{:.0} m fra adressen", coerce_number(&e.distance_m)));
    lines.extend(damage_tags(e));
    if let Some(desc) = e.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(truncate_chars(desc, POPUP_DESCRIPTION_MAX));
    }
    lines
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Drawing capability of the underlying map engine.
pub trait MapView {
    fn set_base_view(&mut self, center: LatLon, zoom: u8);
    fn place_location_marker(&mut self, at: LatLon);
    fn remove_location_marker(&mut self);
    /// Replaces every event marker currently drawn.
    fn set_event_markers(&mut self, markers: &[EventMarker]);
    fn set_overlay_enabled(&mut self, overlay: &OverlaySource, enabled: bool);
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("unknown overlay '{0}'")]
    UnknownOverlay(String),
}

pub struct MapController<V: MapView> {
    view: V,
    location: Option<LatLon>,
    events: Vec<EventMarker>,
    overlays: BTreeMap<&'static str, bool>,
}

impl<V: MapView> MapController<V> {
    /// Initial state: default wide view, no markers, every overlay off.
    pub fn new(mut view: V) -> Self {
        view.set_base_view(DEFAULT_CENTER, DEFAULT_ZOOM);
        view.set_event_markers(&[]);
        Self {
            view,
            location: None,
            events: Vec::new(),
            overlays: OVERLAYS.iter().map(|o| (o.id, false)).collect(),
        }
    }

    pub fn set_location(&mut self, lat: f64, lon: f64, events: &[HistoricalEvent]) {
        if self.location.take().is_some() {
            self.view.remove_location_marker();
        }
        let at = LatLon { lat, lon };
        self.view.place_location_marker(at);
        self.location = Some(at);
        self.view.set_base_view(at, LOCATED_ZOOM);

        self.events = events.iter().map(EventMarker::from_event).collect();
        self.view.set_event_markers(&self.events);

        logging::info(
            Domain::Map,
            "map.located",
            obj(&[
                ("lat", v_num(lat)),
                ("lon", v_num(lon)),
                ("event_markers", v_int(self.events.len() as u64)),
            ]),
        );
    }

    pub fn set_overlay(&mut self, id: &str, enabled: bool) -> Result<(), MapError> {
        let source = overlay(id).ok_or_else(|| MapError::UnknownOverlay(id.to_string()))?;
        let current = self
            .overlays
            .get_mut(source.id)
            .ok_or_else(|| MapError::UnknownOverlay(id.to_string()))?;
        if *current != enabled {
            *current = enabled;
            self.view.set_overlay_enabled(source, enabled);
            logging::debug(
                Domain::Map,
                "map.overlay",
                obj(&[("id", v_str(source.id)), ("enabled", serde_json::Value::Bool(enabled))]),
            );
        }
        Ok(())
    }

    /// Flips an overlay and returns its new state.
    pub fn toggle_overlay(&mut self, id: &str) -> Result<bool, MapError> {
        let next = !self.overlay_enabled(id).ok_or_else(|| MapError::UnknownOverlay(id.to_string()))?;
        self.set_overlay(id, next)?;
        Ok(next)
    }

    pub fn overlay_enabled(&self, id: &str) -> Option<bool> {
        self.overlays.get(id).copied()
    }

    pub fn enabled_overlays(&self) -> Vec<&'static str> {
        self.overlays.iter().filter(|(_, on)| **on).map(|(id, _)| *id).collect()
    }

    pub fn location(&self) -> Option<LatLon> {
        self.location
    }

    pub fn event_markers(&self) -> &[EventMarker] {
        &self.events
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

/// [`MapView`] that only logs what it would draw.
#[derive(Debug, Default)]
pub struct LogMapView;

impl MapView for LogMapView {
    fn set_base_view(&mut self, center: LatLon, zoom: u8) {
        logging::debug(
            Domain::Map,
            "view.base",
            obj(&[("lat", v_num(center.lat)), ("lon", v_num(center.lon)), ("zoom", v_int(u64::from(zoom)))]),
        );
    }

    fn place_location_marker(&mut self, at: LatLon) {
        logging::debug(Domain::Map, "view.marker", obj(&[("lat", v_num(at.lat)), ("lon", v_num(at.lon))]));
    }

    fn remove_location_marker(&mut self) {
        logging::debug(Domain::Map, "view.marker_removed", obj(&[]));
    }

    fn set_event_markers(&mut self, markers: &[EventMarker]) {
        logging::debug(Domain::Map, "view.events", obj(&[("count", v_int(markers.len() as u64))]));
    }

    fn set_overlay_enabled(&mut self, overlay: &OverlaySource, enabled: bool) {
        logging::info(
            Domain::Map,
            "view.overlay",
            obj(&[
                ("id", v_str(overlay.id)),
                ("label", v_str(overlay.label)),
                ("opacity", v_num(overlay.opacity)),
                ("enabled", serde_json::Value::Bool(enabled)),
            ]),
        );
    }
}
