use super::*;
use crate::engine::{HeadlessFactory, Surface};
use crate::geo::ShapeKind;
use crate::host::{FormHost, MemoryHost, NoticeLevel};
use crate::services::{FetchError, LocationError};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// A controller wired to a headless surface and an in-memory form.
struct Harness {
    controller: MapController,
    factory: HeadlessFactory,
    host: MemoryHost,
    now: Instant,
    effects: Vec<Effect>,
}

impl Harness {
    fn new(config: serde_json::Value, host: MemoryHost) -> Self {
        let config = MapConfig::from_value(config).unwrap();
        let factory = HeadlessFactory::default();
        let mut controller = MapController::new(config.clone(), Box::new(factory.clone()));
        let now = Instant::now();
        let snapshot = HostSnapshot::read(&host, &config);
        let effects = controller.attach(snapshot, true, now);
        let mut harness = Self {
            controller,
            factory,
            host,
            now,
            effects: Vec::new(),
        };
        harness.apply(effects);
        harness
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in &effects {
            self.host.apply(effect);
        }
        self.effects = effects;
    }

    fn send(&mut self, message: MapMessage) -> &[Effect] {
        let effects = self.controller.handle(message, self.now);
        self.apply(effects);
        &self.effects
    }

    fn advance(&mut self, ms: u64) -> &[Effect] {
        self.now += Duration::from_millis(ms);
        let effects = self.controller.run(self.now);
        self.apply(effects);
        &self.effects
    }

    fn surface(&self) -> Rc<RefCell<Surface>> {
        self.factory.current().unwrap()
    }

    fn pan_to(&mut self, center: LatLng) {
        self.surface().borrow_mut().center = center;
        self.send(MapMessage::MapMoved);
        self.send(MapMessage::MoveEnd);
    }

    fn location_writes(&self) -> Vec<Value> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::SetState {
                    slot: StateSlot::Location,
                    value,
                    ..
                } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    fn notices(&self) -> Vec<Notice> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }
}

fn square(lat: f64, lng: f64) -> ShapeData {
    ShapeData::polygon(
        ShapeKind::Polygon,
        &[
            LatLng::new(lat, lng),
            LatLng::new(lat + 1.0, lng),
            LatLng::new(lat + 1.0, lng + 1.0),
        ],
    )
}

#[test]
fn test_coordinates_default_without_stored_state() {
    let h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 48.2, "lng": 16.4}}),
        MemoryHost::new(),
    );
    assert_eq!(h.controller.get_coordinates(), LatLng::new(48.2, 16.4));

    let h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 48.2, "lng": 16.4}}),
        MemoryHost::new().with_state("loc", json!({"lat": 1.5, "lng": null})),
    );
    assert_eq!(h.controller.get_coordinates(), LatLng::new(48.2, 16.4));
}

#[test]
fn test_click_fixes_marker() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 51.5, "lng": -0.1},
            "showMarker": true,
            "clickable": true
        }),
        MemoryHost::new(),
    );
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(51.5, -0.1)));
    assert_eq!(
        h.surface().borrow().marker.as_ref().map(|(at, _)| *at),
        Some(LatLng::new(51.5, -0.1))
    );
    assert!(h.controller.follows_map());

    h.send(MapMessage::MapClicked(LatLng::new(52.0, 0.0)));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(52.0, 0.0)));
    assert!(!h.controller.follows_map());
    assert_eq!(h.location_writes(), vec![json!({"lat": 52.0, "lng": 0.0})]);
    assert_eq!(h.host.get("loc"), json!({"lat": 52.0, "lng": 0.0}));

    h.pan_to(LatLng::new(40.0, 5.0));
    h.advance(1000);
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(52.0, 0.0)));
    assert!(h.location_writes().is_empty());
}

#[test]
fn test_click_ignored_when_not_clickable() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
        MemoryHost::new(),
    );
    h.send(MapMessage::MapClicked(LatLng::new(2.0, 2.0)));
    assert!(h.controller.follows_map());
    assert!(h.location_writes().is_empty());
}

#[test]
fn test_click_to_place_never_follows() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "clickToPlace": true, "default": {"lat": 1.0, "lng": 1.0}}),
        MemoryHost::new(),
    );
    assert!(!h.controller.follows_map());
    h.pan_to(LatLng::new(3.0, 3.0));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(1.0, 1.0)));

    h.send(MapMessage::MapClicked(LatLng::new(2.0, 2.0)));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(2.0, 2.0)));
}

#[test]
fn test_stored_coordinate_disables_follow() {
    let h = Harness::new(
        json!({"statePath": "loc"}),
        MemoryHost::new().with_state("loc", json!({"lat": "45.5", "lng": "9.2"})),
    );
    assert!(!h.controller.follows_map());
    assert_eq!(h.surface().borrow().center, LatLng::new(45.5, 9.2));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(45.5, 9.2)));
    assert!(!h
        .effects
        .iter()
        .any(|e| matches!(e, Effect::RequestLocation { .. })));
}

#[test]
fn test_stored_icon_hint_selects_image() {
    let h = Harness::new(
        json!({"statePath": "loc", "iconSize": 40}),
        MemoryHost::new().with_state(
            "loc",
            json!({"lat": 1.0, "lng": 2.0, "icon": "https://cdn.example/pin.png"}),
        ),
    );
    let surface = h.surface();
    let surface = surface.borrow();
    assert_eq!(
        surface.marker.as_ref().map(|(_, icon)| icon.clone()),
        Some(crate::engine::MarkerIcon::Image {
            url: "https://cdn.example/pin.png".to_string(),
            size: 40
        })
    );
}

#[test]
fn test_follow_mode_syncs_center_after_debounce() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new(),
    );
    h.advance(500);
    assert!(h.location_writes().is_empty());

    h.pan_to(LatLng::new(11.0, 21.0));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(11.0, 21.0)));
    h.advance(499);
    assert!(h.location_writes().is_empty());
    h.advance(1);
    assert_eq!(h.location_writes(), vec![json!({"lat": 11.0, "lng": 21.0})]);
    assert_eq!(h.host.refreshes, 0);

    h.advance(1000);
    assert!(h.location_writes().is_empty());
}

#[test]
fn test_live_push_refreshes_after_writes() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "clickable": true,
            "default": {"lat": 10.0, "lng": 20.0},
            "liveLocation": {"send": true}
        }),
        MemoryHost::new(),
    );
    h.send(MapMessage::MapClicked(LatLng::new(12.0, 22.0)));
    assert!(h.effects.contains(&Effect::Refresh));
    assert_eq!(h.host.refreshes, 1);
}

#[test]
fn test_update_marker_position() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new(),
    );

    h.send(MapMessage::Host(HostEvent::UpdateMarkerPosition {
        at: LatLng::new(30.0, 40.0),
        fix: false,
    }));
    assert!(!h.controller.follows_map());
    assert_eq!(h.surface().borrow().center, LatLng::new(10.0, 20.0));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(30.0, 40.0)));
    assert_eq!(h.location_writes(), vec![json!({"lat": 30.0, "lng": 40.0})]);

    h.send(MapMessage::Host(HostEvent::UpdateMarkerPosition {
        at: LatLng::new(35.0, 45.0),
        fix: true,
    }));
    assert!(h.controller.follows_map());
    assert_eq!(h.surface().borrow().center, LatLng::new(35.0, 45.0));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(35.0, 45.0)));
    assert_eq!(h.host.get("loc"), json!({"lat": 35.0, "lng": 45.0}));
}

#[test]
fn test_fix_resets_follow_after_click() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "clickable": true, "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new(),
    );
    h.send(MapMessage::MapClicked(LatLng::new(11.0, 21.0)));
    assert!(!h.controller.follows_map());
    h.send(MapMessage::Host(HostEvent::UpdateMarkerPosition {
        at: LatLng::new(11.0, 21.0),
        fix: true,
    }));
    assert!(h.controller.follows_map());
}

#[test]
fn test_refresh_map_flies_to_stored_coordinate() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new(),
    );
    h.host.put("loc", json!({"lat": -33.9, "lng": 151.2}));
    let snapshot = HostSnapshot::read(&h.host, h.controller.config());
    h.send(MapMessage::HostStateChanged(snapshot));
    h.send(MapMessage::Host(HostEvent::RefreshMap));

    let surface = h.surface();
    assert_eq!(surface.borrow().flights, 1);
    assert_eq!(surface.borrow().center, LatLng::new(-33.9, 151.2));
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(-33.9, 151.2)));
}

#[test]
fn test_marker_icon_swap_keeps_marker() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
        MemoryHost::new(),
    );
    h.send(MapMessage::Host(HostEvent::UpdateMarkerIcon {
        url: None,
        size: Some(48),
        color: Some("#ef4444".to_string()),
    }));
    let icon = h.surface().borrow().marker.as_ref().map(|(_, i)| i.clone());
    assert_eq!(
        icon,
        Some(crate::engine::MarkerIcon::Pin {
            color: "#ef4444".to_string(),
            size: 48
        })
    );

    h.send(MapMessage::VisibilityChanged { visible: false });
    h.send(MapMessage::VisibilityChanged { visible: true });
    let icon = h.surface().borrow().marker.as_ref().map(|(_, i)| i.clone());
    assert!(matches!(icon, Some(crate::engine::MarkerIcon::Pin { size: 48, .. })));
}

#[test]
fn test_range_circle_follows_range_input() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
        MemoryHost::new().with_state("distance", json!(250)),
    );
    assert_eq!(
        h.surface().borrow().range_circle,
        Some((LatLng::new(1.0, 1.0), 250.0))
    );

    h.host.put("distance", json!("abc"));
    let snapshot = HostSnapshot::read(&h.host, h.controller.config());
    h.send(MapMessage::HostStateChanged(snapshot));
    assert_eq!(h.surface().borrow().range_circle, None);

    let h = Harness::new(
        json!({"statePath": "loc", "rangeSelectField": null, "default": {"lat": 1.0, "lng": 1.0}}),
        MemoryHost::new().with_state("distance", json!(250)),
    );
    assert_eq!(h.surface().borrow().range_circle, None);
}

#[test]
fn test_point_geojson_centers_on_point() {
    let h = Harness::new(
        json!({"statePath": "loc"}),
        MemoryHost::new().with_hidden_field(r#"{"type":"Point","coordinates":[-0.1,51.5]}"#),
    );
    let center = h.surface().borrow().center;
    assert!(center.approx_eq(&LatLng::new(51.5, -0.1), 1e-9));
    assert_eq!(h.surface().borrow().zoom, 8.0);
    assert_eq!(h.controller.shapes().len(), 1);
    assert_eq!(h.surface().borrow().shapes.len(), 1);
}

#[test]
fn test_polygon_geojson_fits_bounds() {
    let doc = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"shape": "Polygon"},
            "geometry": {"type": "Polygon", "coordinates": [[[2.0, 48.0], [3.0, 48.0], [3.0, 49.0], [2.0, 48.0]]]}
        }]
    });
    let h = Harness::new(
        json!({"statePath": "loc"}),
        MemoryHost::new().with_hidden_field(doc.to_string()),
    );
    let surface = h.surface();
    let surface = surface.borrow();
    assert!(surface.center.approx_eq(&LatLng::new(48.5, 2.5), 1e-9));
    assert!(surface.zoom > 5.0);
    assert!(surface.shapes.values().all(|s| s.editable));
}

#[test]
fn test_straight_line_geojson_fits_along_the_line() {
    let h = Harness::new(
        json!({"statePath": "loc"}),
        MemoryHost::new()
            .with_hidden_field(r#"{"type":"LineString","coordinates":[[0,10],[20,10]]}"#),
    );
    let surface = h.surface();
    let surface = surface.borrow();
    assert!(surface.center.approx_eq(&LatLng::new(10.0, 10.0), 1e-9));
    assert!(surface.zoom.is_finite());
    assert_eq!(h.controller.shapes().len(), 1);
}

#[test]
fn test_invalid_stored_geojson_keeps_default_view() {
    for stored in ["", "   ", "{not json", r#"{"type":"Nope"}"#] {
        let h = Harness::new(
            json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}, "controls": {"zoom": 6}}),
            MemoryHost::new().with_hidden_field(stored),
        );
        let surface = h.surface();
        assert_eq!(surface.borrow().center, LatLng::new(10.0, 20.0));
        assert_eq!(surface.borrow().zoom, 6.0);
        assert!(h.controller.shapes().is_empty());
    }

    let h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field("{not json"),
    );
    assert_eq!(h.notices().len(), 1);
    assert_eq!(h.notices()[0].level, NoticeLevel::Error);
}

#[test]
fn test_create_edit_remove_keeps_hidden_field_in_sync() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field(""),
    );

    h.send(MapMessage::ShapeCreated(square(10.0, 20.0)));
    h.send(MapMessage::ShapeCreated(ShapeData::circle(LatLng::new(12.0, 22.0), 800.0)));
    h.send(MapMessage::ShapeCreated(ShapeData::point(ShapeKind::Marker, LatLng::new(9.0, 19.0))));
    let ids = h.controller.shapes().ids();
    assert_eq!(ids.len(), 3);

    h.send(MapMessage::ShapeEdited {
        id: ids[0],
        shape: square(11.0, 21.0),
    });
    h.send(MapMessage::ShapeRemoved(ids[2]));

    let serialized = h.controller.shapes().to_geojson_string().unwrap();
    assert_eq!(h.host.hidden_field().as_deref(), Some(serialized.as_str()));
    assert_eq!(h.host.get("loc")["geojson"], json!(serialized));
    assert_eq!(h.surface().borrow().shapes.len(), 2);

    let reparsed = FeatureGroup::from_geojson(&serialized).unwrap();
    assert_eq!(reparsed.to_geojson_string().unwrap(), serialized);
    let kinds: Vec<ShapeKind> = reparsed.iter().map(|(_, s)| s.kind).collect();
    assert_eq!(kinds, vec![ShapeKind::Polygon, ShapeKind::Circle]);
}

#[test]
fn test_unknown_shape_ids_are_ignored() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field(""),
    );
    h.send(MapMessage::ShapeEdited {
        id: ShapeId(99),
        shape: square(1.0, 1.0),
    });
    assert!(h.effects.is_empty());
    h.send(MapMessage::ShapeRemoved(ShapeId(99)));
    assert!(h.effects.is_empty());
}

#[test]
fn test_missing_hidden_field_warns_once() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new(),
    );
    h.send(MapMessage::ShapeCreated(square(10.0, 20.0)));
    let notices = h.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Blocking);
    assert!(h.controller.geojson_write_back_disabled());
    assert_eq!(h.controller.shapes().len(), 1);

    h.send(MapMessage::ShapeCreated(square(12.0, 22.0)));
    assert!(h.notices().is_empty());
    assert!(!h
        .effects
        .iter()
        .any(|e| matches!(e, Effect::SetState { .. } | Effect::WriteHiddenField(_))));
    assert_eq!(h.controller.shapes().len(), 2);
}

#[test]
fn test_bulk_load() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "geoJsonStatePath": "area", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field(""),
    );
    h.send(MapMessage::ShapeCreated(square(10.0, 20.0)));

    let doc = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[5.0,45.0]}},
        {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[7.0,47.0]}}
    ]}"#;
    h.send(MapMessage::Host(HostEvent::LoadGeoJson {
        geojson: doc.to_string(),
    }));
    assert_eq!(h.controller.shapes().len(), 2);
    assert_eq!(h.surface().borrow().shapes.len(), 2);
    assert!(h
        .surface()
        .borrow()
        .center
        .approx_eq(&LatLng::new(46.0, 6.0), 1e-9));
    let stored = h.host.get("area")["geojson"].as_str().unwrap().to_string();
    assert_eq!(FeatureGroup::from_geojson(&stored).unwrap().len(), 2);

    h.send(MapMessage::Host(HostEvent::LoadGeoJson {
        geojson: String::new(),
    }));
    assert!(h.controller.shapes().is_empty());
    assert!(h.surface().borrow().shapes.is_empty());
    let cleared = h.host.hidden_field().unwrap();
    assert!(FeatureGroup::from_geojson(&cleared).unwrap().is_empty());
}

#[test]
fn test_bad_or_empty_bulk_load_returns_to_default_view() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 10.0, "lng": 20.0},
            "controls": {"zoom": 6}
        }),
        MemoryHost::new()
            .with_hidden_field("")
            .with_state("loc", json!({"lat": 40.0, "lng": 5.0})),
    );
    assert_eq!(h.surface().borrow().center, LatLng::new(40.0, 5.0));
    h.send(MapMessage::ShapeCreated(square(40.0, 5.0)));

    h.send(MapMessage::Host(HostEvent::LoadGeoJson {
        geojson: "{broken".to_string(),
    }));
    assert_eq!(h.notices().len(), 1);
    assert_eq!(h.notices()[0].level, NoticeLevel::Error);
    assert_eq!(h.controller.shapes().len(), 1);
    assert_eq!(h.surface().borrow().center, LatLng::new(10.0, 20.0));
    assert_eq!(h.surface().borrow().zoom, 6.0);

    h.pan_to(LatLng::new(30.0, 30.0));
    h.send(MapMessage::Host(HostEvent::LoadGeoJson {
        geojson: String::new(),
    }));
    assert!(h.controller.shapes().is_empty());
    assert!(h.notices().is_empty());
    assert_eq!(h.surface().borrow().center, LatLng::new(10.0, 20.0));
    assert_eq!(h.surface().borrow().zoom, 6.0);
}

#[test]
fn test_empty_object_payload_clears_shapes() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field(""),
    );
    h.send(MapMessage::ShapeCreated(square(40.0, 5.0)));
    assert_eq!(h.controller.shapes().len(), 1);

    let event = HostEvent::from_named(HostEvent::LOAD_GEOJSON, &json!({})).unwrap();
    h.send(MapMessage::Host(event));
    assert!(h.controller.shapes().is_empty());
    assert!(h.notices().is_empty());
    assert_eq!(h.surface().borrow().center, LatLng::new(10.0, 20.0));

    h.send(MapMessage::ShapeCreated(square(40.0, 5.0)));
    h.send(MapMessage::Host(HostEvent::LoadGeoJson {
        geojson: "[]".to_string(),
    }));
    assert!(h.controller.shapes().is_empty());
    assert!(h.notices().is_empty());
}

#[test]
fn test_overlay_without_url_is_skipped() {
    let h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 1.0, "lng": 1.0},
            "overlayLayers": [{"name": "Broken", "type": "geojson"}]
        }),
        MemoryHost::new(),
    );
    assert!(h.controller.is_active());
    assert!(h.controller.layers().overlays().is_empty());
    assert_eq!(h.surface().borrow().visible_layers(), vec!["OpenStreetMap"]);
}

#[test]
fn test_stale_overlay_fetch_is_dropped() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 1.0, "lng": 1.0},
            "overlayLayers": [{"name": "Remote", "url": "/remote.json", "visibleByDefault": true}]
        }),
        MemoryHost::new(),
    );
    assert!(h.effects.contains(&Effect::FetchOverlay {
        generation: 1,
        layer: "Remote".to_string(),
        url: "/remote.json".to_string()
    }));
    h.send(MapMessage::VisibilityChanged { visible: false });
    h.send(MapMessage::VisibilityChanged { visible: true });

    let data = json!({"type": "FeatureCollection", "features": []});
    h.send(MapMessage::OverlayFetched(OverlayFetched {
        generation: 1,
        layer: "Remote".to_string(),
        result: Ok(data.clone()),
    }));
    assert_eq!(h.controller.layers().overlays()[0].handle, None);

    h.send(MapMessage::OverlayFetched(OverlayFetched {
        generation: 2,
        layer: "Remote".to_string(),
        result: Ok(data),
    }));
    assert!(h.controller.layers().overlays()[0].handle.is_some());
    assert!(h
        .surface()
        .borrow()
        .layer_by_name("Remote")
        .unwrap()
        .is_visible());
}

#[test]
fn test_overlay_fetch_failure_notifies() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 1.0, "lng": 1.0},
            "overlayLayers": [{"name": "Remote", "url": "/remote.json"}]
        }),
        MemoryHost::new(),
    );
    h.send(MapMessage::OverlayFetched(OverlayFetched {
        generation: 1,
        layer: "Remote".to_string(),
        result: Err(FetchError::Status(500)),
    }));
    assert_eq!(h.notices().len(), 1);
    assert!(h.controller.is_active());
}

#[test]
fn test_location_button() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}, "showMyLocationButton": true}),
        MemoryHost::new(),
    );
    assert!(h.surface().borrow().location_button);

    h.send(MapMessage::LocateRequested);
    assert_eq!(
        h.effects,
        vec![Effect::RequestLocation {
            generation: 1,
            purpose: LocatePurpose::Button
        }]
    );

    h.send(MapMessage::LocationFound(LocationFix {
        generation: 1,
        purpose: LocatePurpose::Button,
        result: Ok(LatLng::new(40.4, -3.7)),
    }));
    assert_eq!(h.surface().borrow().flights, 1);
    assert_eq!(h.surface().borrow().center, LatLng::new(40.4, -3.7));
    assert_eq!(h.location_writes(), vec![json!({"lat": 40.4, "lng": -3.7})]);
    assert_eq!(h.controller.marker_position(), Some(LatLng::new(40.4, -3.7)));

    h.send(MapMessage::LocationFound(LocationFix {
        generation: 1,
        purpose: LocatePurpose::Button,
        result: Err(LocationError::Unsupported),
    }));
    assert_eq!(h.notices()[0].level, NoticeLevel::Blocking);
    assert_eq!(h.surface().borrow().center, LatLng::new(40.4, -3.7));
}

#[test]
fn test_locate_on_start_applies_configured_zoom() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "controls": {"zoom": 12}}),
        MemoryHost::new(),
    );
    h.surface().borrow_mut().zoom = 3.0;
    h.send(MapMessage::LocationFound(LocationFix {
        generation: 1,
        purpose: LocatePurpose::Start,
        result: Ok(LatLng::new(59.3, 18.1)),
    }));
    assert_eq!(h.surface().borrow().zoom, 12.0);
    assert_eq!(h.surface().borrow().flights, 0);

    h.send(MapMessage::LocationFound(LocationFix {
        generation: 5,
        purpose: LocatePurpose::Start,
        result: Ok(LatLng::new(0.5, 0.5)),
    }));
    assert_eq!(h.surface().borrow().center, LatLng::new(59.3, 18.1));
}

#[test]
fn test_realtime_polling() {
    let mut h = Harness::new(
        json!({
            "statePath": "loc",
            "default": {"lat": 10.0, "lng": 20.0},
            "liveLocation": {"send": true, "realtime": true, "milliseconds": 1000}
        }),
        MemoryHost::new(),
    );
    let polls = |effects: &[Effect]| {
        effects
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Effect::RequestLocation {
                        purpose: LocatePurpose::Poll,
                        ..
                    }
                )
            })
            .count()
    };
    assert_eq!(polls(h.advance(999)), 0);
    assert_eq!(polls(h.advance(1)), 1);
    assert_eq!(polls(h.advance(500)), 0);
    assert_eq!(polls(h.advance(500)), 1);

    h.send(MapMessage::Detach);
    assert_eq!(polls(h.advance(5000)), 0);
}

#[test]
fn test_capture_map_image() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_csrf_token("tok"),
    );
    h.send(MapMessage::Host(HostEvent::CaptureMapImage));
    let request = h
        .effects
        .iter()
        .find_map(|e| match e {
            Effect::UploadSnapshot(request) => Some(request.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.endpoint, "/map-picker/upload-image");
    assert_eq!(request.csrf_token.as_deref(), Some("tok"));
    assert!(request.file_name.starts_with("map-snapshot-"));
    assert!(request.file_name.ends_with(".svg"));
    assert!(h.surface().borrow().chrome_visible);

    h.send(MapMessage::SnapshotUploaded(Ok("Stored".to_string())));
    assert_eq!(h.notices(), vec![Notice::success("Stored")]);

    h.send(MapMessage::SnapshotUploaded(Err(SnapshotError::Status(413))));
    assert_eq!(h.notices()[0].level, NoticeLevel::Error);

    h.send(MapMessage::VisibilityChanged { visible: false });
    h.send(MapMessage::Host(HostEvent::CaptureMapImage));
    assert_eq!(h.notices()[0].level, NoticeLevel::Warning);
}

#[test]
fn test_shapes_survive_reentry() {
    let mut h = Harness::new(
        json!({"statePath": "loc", "default": {"lat": 10.0, "lng": 20.0}}),
        MemoryHost::new().with_hidden_field(""),
    );
    h.send(MapMessage::ShapeCreated(square(10.0, 20.0)));
    h.send(MapMessage::VisibilityChanged { visible: false });

    let snapshot = HostSnapshot::read(&h.host, h.controller.config());
    h.send(MapMessage::HostStateChanged(snapshot));
    h.send(MapMessage::VisibilityChanged { visible: true });
    assert_eq!(h.factory.created(), 2);
    assert_eq!(h.surface().borrow().shapes.len(), 1);
}

#[test]
fn test_geofence_and_dragging_reach_the_surface() {
    let h = Harness::new(
        json!({
            "statePath": "loc",
            "draggable": false,
            "default": {"lat": 55.0, "lng": -3.0},
            "bounds": {"sw": {"lat": 49.5, "lng": -11}, "ne": {"lat": 61, "lng": 2}}
        }),
        MemoryHost::new(),
    );
    let surface = h.surface();
    let surface = surface.borrow();
    let options = surface.options.as_ref().unwrap();
    assert!(!options.dragging);
    assert!(options.max_bounds.is_some());
}
