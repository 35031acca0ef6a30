//! Drawn shapes and their GeoJSON write-back.

use super::MapController;
use crate::engine::VectorStyle;
use crate::geo::{is_document_present, FeatureGroup, ShapeData, ShapeId};
use crate::host::{Effect, Notice, StateSlot};
use serde_json::json;

/// Shapes managed by the draw tools.
#[derive(Debug, Clone, Default)]
pub struct DrawState {
    pub group: FeatureGroup,
    /// Set after the missing hidden field was reported.
    pub write_back_disabled: bool,
}

impl MapController {
    /// Restores shapes from the hidden field onto a new surface.
    pub(super) fn load_initial_shapes(&mut self) {
        let stored = self
            .host
            .hidden_field
            .clone()
            .filter(|text| is_document_present(text));

        if let Some(text) = stored {
            match self.draw.group.replace_from_geojson(&text) {
                Ok(ids) => {
                    log::info!("Editing {} stored shape(s)", ids.len());
                    self.render_group();
                    self.fit_to_group();
                    return;
                }
                Err(e) => {
                    log::error!("Stored GeoJSON is invalid: {}", e);
                    self.effects.push(Effect::Notify(Notice::error(format!(
                        "Stored shapes could not be loaded: {}",
                        e
                    ))));
                }
            }
        } else {
            log::debug!("No stored shapes to edit");
        }
        self.render_group();
    }

    pub(super) fn shape_created(&mut self, shape: ShapeData) {
        match self.draw.group.insert(shape) {
            Ok(id) => {
                log::debug!("Created {}", id);
                self.render_shape(id);
                self.propagate_shapes(true);
            }
            Err(e) => {
                log::warn!("Rejected drawn shape: {}", e);
                self.effects.push(Effect::Notify(Notice::error(e.to_string())));
            }
        }
    }

    pub(super) fn shape_edited(&mut self, id: ShapeId, shape: ShapeData) {
        match self.draw.group.update(id, shape) {
            Ok(true) => {
                self.render_shape(id);
                self.propagate_shapes(false);
            }
            Ok(false) => log::debug!("Ignoring edit of unknown {}", id),
            Err(e) => {
                log::warn!("Rejected edit of {}: {}", id, e);
                self.effects.push(Effect::Notify(Notice::error(e.to_string())));
            }
        }
    }

    pub(super) fn shape_removed(&mut self, id: ShapeId) {
        if self.draw.group.remove(id).is_none() {
            log::debug!("Ignoring removal of unknown {}", id);
            return;
        }
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.remove_shape(id);
        }
        self.propagate_shapes(false);
    }

    /// Replaces every shape with a document and refits the view.
    ///
    /// An empty document clears the shapes and returns to the default view;
    /// an unreadable one is reported, keeps the shapes and returns to the
    /// default view.
    pub(super) fn load_geojson(&mut self, text: &str) {
        let previous = self.draw.group.ids();
        if !is_document_present(text) {
            self.draw.group.clear();
        } else if let Err(e) = self.draw.group.replace_from_geojson(text) {
            log::error!("Could not load GeoJSON: {}", e);
            self.effects.push(Effect::Notify(Notice::error(format!(
                "Could not load GeoJSON: {}",
                e
            ))));
            self.show_default_view();
            return;
        }
        log::info!("Loaded {} shape(s)", self.draw.group.len());

        if let Some(engine) = self.engine.as_deref_mut() {
            for id in previous {
                engine.remove_shape(id);
            }
        }
        self.render_group();
        if self.draw.group.is_empty() {
            self.show_default_view();
        } else {
            self.fit_to_group();
        }
        self.propagate_shapes(false);
    }

    fn show_default_view(&mut self) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        engine.set_view(self.config.default, self.config.zoom());
        self.after_view_change();
    }

    fn render_shape(&mut self, id: ShapeId) {
        let (Some(engine), Some(shape)) = (self.engine.as_deref_mut(), self.draw.group.get(id))
        else {
            return;
        };
        let toolbar = &self.config.geo_man_toolbar;
        engine.render_shape(id, shape, &VectorStyle::for_drawing(toolbar), toolbar.editable);
    }

    fn render_group(&mut self) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        let toolbar = &self.config.geo_man_toolbar;
        let style = VectorStyle::for_drawing(toolbar);
        for (id, shape) in self.draw.group.iter() {
            engine.render_shape(id, shape, &style, toolbar.editable);
        }
    }

    /// Fits the shapes, falling back to their first position and then to the
    /// default location when the bounds have no area.
    fn fit_to_group(&mut self) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match self.draw.group.bounds() {
            Some(bounds) if !bounds.is_degenerate() => engine.fit_bounds(&bounds),
            _ => {
                let at = self
                    .draw
                    .group
                    .first_position()
                    .unwrap_or(self.config.default);
                engine.set_view(at, self.config.zoom());
            }
        }
        self.after_view_change();
    }

    /// Serializes the group into the hidden field and the form state.
    fn propagate_shapes(&mut self, created: bool) {
        if self.draw.write_back_disabled {
            return;
        }
        if self.host.hidden_field.is_none() {
            if created {
                log::warn!("Field 'geomanbox' was not found in the structure");
                self.draw.write_back_disabled = true;
                self.effects.push(Effect::Notify(Notice::blocking(
                    "Field 'geomanbox' was not found in the structure to store geojson data",
                )));
            } else {
                log::debug!("No hidden GeoJSON field, skipping write-back");
            }
            return;
        }

        let text = match self.draw.group.to_geojson_string() {
            Ok(text) => text,
            Err(e) => {
                log::error!("Could not serialize shapes: {}", e);
                self.effects.push(Effect::Notify(Notice::error(e.to_string())));
                return;
            }
        };
        self.host.hidden_field = Some(text.clone());
        self.effects.push(Effect::WriteHiddenField(text.clone()));
        self.write_state(StateSlot::GeoJson, json!({ "geojson": text }));
        self.refresh_if_live();
    }
}
