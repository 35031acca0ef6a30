//! Base and overlay layers.

use crate::config::{ConfigError, MapConfig, OverlayKind, OverlayLayerConfig, OSM_TILES_URL};
use crate::engine::{LayerHandle, LayerSwitcher, MapEngine, SwitcherEntry, TileSource, VectorStyle};
use crate::geo::to_feature_collection;
use crate::host::Effect;
use crate::services::FetchError;

/// A base layer on the current surface.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseEntry {
    pub name: String,
    pub handle: LayerHandle,
}

/// An overlay on the current surface.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub name: String,
    /// `None` while remote data is still loading.
    pub handle: Option<LayerHandle>,
    pub visible: bool,
    style: VectorStyle,
}

/// Tracks the layers of one surface and the switcher listing them.
#[derive(Debug, Clone, Default)]
pub struct LayerManager {
    base: Vec<BaseEntry>,
    active_base: Option<usize>,
    overlays: Vec<OverlayEntry>,
}

/// Tile sources for the base layers.
///
/// Without `baseLayers` the legacy `tilesUrl` (or OpenStreetMap) becomes the
/// only base layer. Descriptors without a URL or name are skipped.
pub fn base_sources(config: &MapConfig) -> Vec<TileSource> {
    let controls = &config.controls;
    if config.base_layers.is_empty() {
        return vec![TileSource {
            name: config
                .default_base_layer
                .clone()
                .unwrap_or_else(|| "OpenStreetMap".to_string()),
            url: config
                .tiles_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| OSM_TILES_URL.to_string()),
            attribution: config.attribution.clone(),
            min_zoom: controls.min_zoom,
            max_zoom: controls.max_zoom,
            tile_size: config.tile_size,
            zoom_offset: config.zoom_offset,
            detect_retina: config.detect_retina,
            opacity: 1.0,
            cross_origin: false,
        }];
    }

    config
        .base_layers
        .iter()
        .filter_map(|layer| {
            let url = layer.url.as_deref().filter(|u| !u.trim().is_empty());
            let Some(url) = url else {
                log::warn!(
                    "{}",
                    ConfigError::MissingLayerUrl {
                        layer: layer.name.clone()
                    }
                );
                return None;
            };
            if layer.name.trim().is_empty() {
                log::warn!("Base layer {} has no name and was skipped", url);
                return None;
            }
            Some(TileSource {
                name: layer.name.clone(),
                url: url.to_string(),
                attribution: layer.attribution.clone(),
                min_zoom: layer.min_zoom.unwrap_or(controls.min_zoom),
                max_zoom: layer.max_zoom.unwrap_or(controls.max_zoom),
                tile_size: layer.tile_size.unwrap_or(config.tile_size),
                zoom_offset: layer.zoom_offset.unwrap_or(config.zoom_offset),
                detect_retina: layer.detect_retina.unwrap_or(config.detect_retina),
                opacity: layer.opacity,
                cross_origin: layer.cross_origin,
            })
        })
        .collect()
}

impl LayerManager {
    /// Builds every configured layer on a new surface.
    ///
    /// Returns the fetches needed for remote GeoJSON overlays.
    pub fn install(
        &mut self,
        engine: &mut dyn MapEngine,
        config: &MapConfig,
        generation: u64,
    ) -> Vec<Effect> {
        self.clear();

        for source in base_sources(config) {
            let handle = engine.add_tile_layer(&source);
            self.base.push(BaseEntry {
                name: source.name,
                handle,
            });
        }
        let default = config
            .default_base_layer
            .as_deref()
            .and_then(|name| self.base.iter().position(|b| b.name == name));
        self.active_base = default.or(if self.base.is_empty() { None } else { Some(0) });
        if let Some(active) = self.active_base.and_then(|i| self.base.get(i)) {
            engine.set_layer_visible(active.handle, true);
        }

        let mut effects = Vec::new();
        for overlay in &config.overlay_layers {
            match self.add_overlay(engine, config, overlay) {
                Ok(Some(url)) => effects.push(Effect::FetchOverlay {
                    generation,
                    layer: overlay.name.clone(),
                    url,
                }),
                Ok(None) => {}
                Err(e) => log::warn!("{}", e),
            }
        }

        self.publish_switcher(engine);
        effects
    }

    /// Returns the URL to fetch for remote overlays.
    fn add_overlay(
        &mut self,
        engine: &mut dyn MapEngine,
        config: &MapConfig,
        overlay: &OverlayLayerConfig,
    ) -> Result<Option<String>, ConfigError> {
        let style = VectorStyle::from(&overlay.style);
        let url = overlay
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(str::to_string);

        let handle = match overlay.kind {
            OverlayKind::Api => {
                let data = overlay.data.clone().ok_or_else(|| ConfigError::MissingLayerData {
                    layer: overlay.name.clone(),
                })?;
                let features =
                    to_feature_collection(data).map_err(|e| ConfigError::InvalidLayerData {
                        layer: overlay.name.clone(),
                        reason: e.to_string(),
                    })?;
                Some(engine.add_feature_layer(&overlay.name, &features, &style))
            }
            OverlayKind::Tile => {
                let url = url.clone().ok_or_else(|| ConfigError::MissingLayerUrl {
                    layer: overlay.name.clone(),
                })?;
                let source = TileSource {
                    name: overlay.name.clone(),
                    url,
                    attribution: overlay.attribution.clone(),
                    min_zoom: config.controls.min_zoom,
                    max_zoom: config.controls.max_zoom,
                    tile_size: config.tile_size,
                    zoom_offset: config.zoom_offset,
                    detect_retina: config.detect_retina,
                    opacity: overlay.opacity,
                    cross_origin: false,
                };
                Some(engine.add_tile_layer(&source))
            }
            OverlayKind::GeoJson => {
                if url.is_none() {
                    return Err(ConfigError::MissingLayerUrl {
                        layer: overlay.name.clone(),
                    });
                }
                None
            }
        };

        if let (Some(handle), true) = (handle, overlay.visible_by_default) {
            engine.set_layer_visible(handle, true);
        }
        self.overlays.push(OverlayEntry {
            name: overlay.name.clone(),
            handle,
            visible: overlay.visible_by_default,
            style,
        });
        Ok(if handle.is_none() { url } else { None })
    }

    /// Adds fetched overlay data. The error text is meant for the user.
    pub fn overlay_loaded(
        &mut self,
        engine: &mut dyn MapEngine,
        name: &str,
        result: Result<serde_json::Value, FetchError>,
    ) -> Result<(), String> {
        let Some(index) = self
            .overlays
            .iter()
            .position(|o| o.name == name && o.handle.is_none())
        else {
            log::debug!("No pending overlay named '{}'", name);
            return Ok(());
        };

        let features = result
            .map_err(|e| e.to_string())
            .and_then(|value| to_feature_collection(value).map_err(|e| e.to_string()));
        let features = match features {
            Ok(features) => features,
            Err(reason) => {
                log::error!("Overlay '{}' failed to load: {}", name, reason);
                self.overlays.remove(index);
                return Err(format!("Failed to load layer '{}': {}", name, reason));
            }
        };

        let entry = &mut self.overlays[index];
        let handle = engine.add_feature_layer(name, &features, &entry.style);
        engine.set_layer_visible(handle, entry.visible);
        entry.handle = Some(handle);
        log::info!(
            "Overlay '{}' loaded with {} feature(s)",
            name,
            features.features.len()
        );
        self.publish_switcher(engine);
        Ok(())
    }

    /// Makes the named base layer the only visible one.
    pub fn select_base(&mut self, engine: &mut dyn MapEngine, name: &str) -> bool {
        let Some(index) = self.base.iter().position(|b| b.name == name) else {
            return false;
        };
        for (i, entry) in self.base.iter().enumerate() {
            engine.set_layer_visible(entry.handle, i == index);
        }
        self.active_base = Some(index);
        self.publish_switcher(engine);
        true
    }

    pub fn set_overlay_visible(
        &mut self,
        engine: &mut dyn MapEngine,
        name: &str,
        visible: bool,
    ) -> bool {
        let Some(entry) = self.overlays.iter_mut().find(|o| o.name == name) else {
            return false;
        };
        entry.visible = visible;
        if let Some(handle) = entry.handle {
            engine.set_layer_visible(handle, visible);
        }
        self.publish_switcher(engine);
        true
    }

    /// Name of the visible base layer.
    pub fn active_base(&self) -> Option<&str> {
        self.active_base
            .and_then(|i| self.base.get(i))
            .map(|b| b.name.as_str())
    }

    pub fn base_layers(&self) -> &[BaseEntry] {
        &self.base
    }

    pub fn overlays(&self) -> &[OverlayEntry] {
        &self.overlays
    }

    /// Switcher rows; overlays still loading are left out.
    pub fn switcher(&self) -> LayerSwitcher {
        LayerSwitcher {
            base: self
                .base
                .iter()
                .enumerate()
                .map(|(i, b)| SwitcherEntry {
                    name: b.name.clone(),
                    handle: b.handle,
                    active: Some(i) == self.active_base,
                })
                .collect(),
            overlays: self
                .overlays
                .iter()
                .filter_map(|o| {
                    o.handle.map(|handle| SwitcherEntry {
                        name: o.name.clone(),
                        handle,
                        active: o.visible,
                    })
                })
                .collect(),
        }
    }

    /// Forgets the layers of a destroyed surface.
    pub fn clear(&mut self) {
        self.base.clear();
        self.overlays.clear();
        self.active_base = None;
    }

    fn publish_switcher(&self, engine: &mut dyn MapEngine) {
        if self.base.len() > 1 || !self.overlays.is_empty() {
            engine.set_layer_switcher(&self.switcher());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseLayerConfig;
    use crate::engine::{EngineFactory, HeadlessFactory};
    use serde_json::json;

    fn base(name: &str, url: Option<&str>) -> BaseLayerConfig {
        BaseLayerConfig {
            name: name.to_string(),
            url: url.map(str::to_string),
            ..BaseLayerConfig::default()
        }
    }

    #[test]
    fn test_fallback_base_layers() {
        let sources = base_sources(&MapConfig::default());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, OSM_TILES_URL);
        assert_eq!(sources[0].name, "OpenStreetMap");
        assert_eq!(sources[0].tile_size, 512);

        let legacy = MapConfig {
            tiles_url: Some("https://tiles.example/{z}/{x}/{y}.png".to_string()),
            ..MapConfig::default()
        };
        assert_eq!(
            base_sources(&legacy)[0].url,
            "https://tiles.example/{z}/{x}/{y}.png"
        );
    }

    #[test]
    fn test_base_layer_without_url_is_skipped() {
        let config = MapConfig {
            base_layers: vec![
                base("Broken", None),
                base("Streets", Some("https://a/{z}/{x}/{y}.png")),
                BaseLayerConfig {
                    max_zoom: Some(18.0),
                    ..base("Satellite", Some("https://b/{z}/{x}/{y}.png"))
                },
            ],
            ..MapConfig::default()
        };
        let sources = base_sources(&config);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].max_zoom, 28.0);
        assert_eq!(sources[1].max_zoom, 18.0);
    }

    #[test]
    fn test_install_shows_default_base_and_switcher() {
        let config = MapConfig {
            base_layers: vec![
                base("Streets", Some("https://a/{z}/{x}/{y}.png")),
                base("Satellite", Some("https://b/{z}/{x}/{y}.png")),
            ],
            default_base_layer: Some("Satellite".to_string()),
            ..MapConfig::default()
        };
        let mut factory = HeadlessFactory::default();
        let mut engine = factory.create().unwrap();
        let mut layers = LayerManager::default();
        let effects = layers.install(engine.as_mut(), &config, 1);
        assert!(effects.is_empty());
        assert_eq!(layers.active_base(), Some("Satellite"));

        let surface = factory.current().unwrap();
        assert_eq!(surface.borrow().visible_layers(), vec!["Satellite"]);
        assert_eq!(surface.borrow().switcher.as_ref().unwrap().base.len(), 2);

        assert!(layers.select_base(engine.as_mut(), "Streets"));
        assert_eq!(surface.borrow().visible_layers(), vec!["Streets"]);
        assert!(!layers.select_base(engine.as_mut(), "Terrain"));
    }

    #[test]
    fn test_single_base_layer_has_no_switcher() {
        let mut factory = HeadlessFactory::default();
        let mut engine = factory.create().unwrap();
        let mut layers = LayerManager::default();
        layers.install(engine.as_mut(), &MapConfig::default(), 1);
        assert!(factory.current().unwrap().borrow().switcher.is_none());
    }

    #[test]
    fn test_overlays() {
        let config = MapConfig {
            overlay_layers: vec![
                OverlayLayerConfig {
                    name: "Inline".to_string(),
                    kind: OverlayKind::Api,
                    data: Some(json!({"type": "Point", "coordinates": [1.0, 2.0]})),
                    visible_by_default: true,
                    ..OverlayLayerConfig::default()
                },
                OverlayLayerConfig {
                    name: "Remote".to_string(),
                    kind: OverlayKind::GeoJson,
                    url: Some("/parks.json".to_string()),
                    ..OverlayLayerConfig::default()
                },
                OverlayLayerConfig {
                    name: "NoUrl".to_string(),
                    kind: OverlayKind::GeoJson,
                    ..OverlayLayerConfig::default()
                },
                OverlayLayerConfig {
                    name: "NoData".to_string(),
                    kind: OverlayKind::Api,
                    ..OverlayLayerConfig::default()
                },
            ],
            ..MapConfig::default()
        };
        let mut factory = HeadlessFactory::default();
        let mut engine = factory.create().unwrap();
        let mut layers = LayerManager::default();
        let effects = layers.install(engine.as_mut(), &config, 9);

        assert_eq!(
            effects,
            vec![Effect::FetchOverlay {
                generation: 9,
                layer: "Remote".to_string(),
                url: "/parks.json".to_string()
            }]
        );
        assert_eq!(layers.overlays().len(), 2);
        let surface = factory.current().unwrap();
        assert_eq!(surface.borrow().visible_layers(), vec!["OpenStreetMap", "Inline"]);
        assert_eq!(surface.borrow().switcher.as_ref().unwrap().overlays.len(), 1);

        layers
            .overlay_loaded(
                engine.as_mut(),
                "Remote",
                Ok(json!({"type": "FeatureCollection", "features": []})),
            )
            .unwrap();
        assert_eq!(surface.borrow().switcher.as_ref().unwrap().overlays.len(), 2);
        assert!(!surface.borrow().layer_by_name("Remote").unwrap().is_visible());

        assert!(layers.set_overlay_visible(engine.as_mut(), "Remote", true));
        assert!(surface.borrow().layer_by_name("Remote").unwrap().is_visible());
    }

    #[test]
    fn test_failed_overlay_fetch_is_reported() {
        let config = MapConfig {
            overlay_layers: vec![OverlayLayerConfig {
                name: "Remote".to_string(),
                url: Some("/parks.json".to_string()),
                ..OverlayLayerConfig::default()
            }],
            ..MapConfig::default()
        };
        let mut factory = HeadlessFactory::default();
        let mut engine = factory.create().unwrap();
        let mut layers = LayerManager::default();
        layers.install(engine.as_mut(), &config, 1);

        let err = layers
            .overlay_loaded(engine.as_mut(), "Remote", Err(FetchError::Status(404)))
            .unwrap_err();
        assert!(err.contains("Remote"));
        assert!(layers.overlays().is_empty());
        assert_eq!(
            factory.current().unwrap().borrow().visible_layers(),
            vec!["OpenStreetMap"]
        );
    }
}
