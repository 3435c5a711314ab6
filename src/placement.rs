//! Turns extracted text plus a target into a text box creation request

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::store::{CreateTextBoxRequest, SheetId, StoreError, TextBox, TextBoxStore};
use crate::zones::{TemplateRegistry, ZoneLayout, next_slot};

/// Where extracted text should land
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTarget {
    /// Explicit canvas point, e.g. a drop location
    Point { x: f32, y: f32 },
    /// Next free slot of a zone of the active template
    Zone(String),
}

/// Canvas extent used to clamp drop points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasBounds {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for CanvasBounds {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 1200.0,
            margin: 10.0,
        }
    }
}

impl CanvasBounds {
    /// Keep a point at least `margin` away from every canvas edge
    #[must_use]
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        let max_x = (self.width - self.margin).max(self.margin);
        let max_y = (self.height - self.margin).max(self.margin);
        (x.clamp(self.margin, max_x), y.clamp(self.margin, max_y))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("zone '{zone}' is not part of template {template:?}")]
    InvalidZone {
        zone: String,
        template: Option<String>,
    },

    #[error("text box could not be created: {0}")]
    Failed(#[source] StoreError),
}

/// Box defaults applied to every placement
#[derive(Debug, Clone, PartialEq)]
pub struct BoxDefaults {
    pub width: f32,
    pub height: Option<f32>,
    pub color: Option<String>,
}

impl Default for BoxDefaults {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: None,
            color: None,
        }
    }
}

/// Builds and emits text box creation requests for one sheet
#[derive(Debug, Clone)]
pub struct PlacementDispatcher {
    registry: TemplateRegistry,
    layout: ZoneLayout,
    canvas: CanvasBounds,
    defaults: BoxDefaults,
}

impl PlacementDispatcher {
    #[must_use]
    pub fn new(
        registry: TemplateRegistry,
        layout: ZoneLayout,
        canvas: CanvasBounds,
        defaults: BoxDefaults,
    ) -> Self {
        Self {
            registry,
            layout,
            canvas,
            defaults,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Build the creation request without emitting it.
    ///
    /// Zone targets are checked against the zones of `template`; the slot is
    /// computed from the boxes of the sheet that are already in that zone.
    pub fn prepare(
        &self,
        store: &dyn TextBoxStore,
        sheet_id: SheetId,
        template: Option<&str>,
        text: &str,
        target: &PlacementTarget,
    ) -> Result<CreateTextBoxRequest, PlacementError> {
        let (x, y, zone) = match target {
            PlacementTarget::Point { x, y } => {
                let (x, y) = self.canvas.clamp(*x, *y);
                (x, y, None)
            }
            PlacementTarget::Zone(zone_id) => {
                let zones = self.registry.zones_for(template);
                let Some(zone_index) = zones.iter().position(|z| &z.id == zone_id) else {
                    warn!("Rejecting placement into unknown zone '{zone_id}' (template {template:?})");
                    return Err(PlacementError::InvalidZone {
                        zone: zone_id.clone(),
                        template: template.map(str::to_string),
                    });
                };

                let in_zone: Vec<TextBox> = store
                    .list_text_boxes_for_sheet(sheet_id)
                    .map_err(PlacementError::Failed)?
                    .into_iter()
                    .filter(|b| b.zone.as_deref() == Some(zone_id.as_str()))
                    .collect();
                let (x, y) = next_slot(&in_zone, zone_index, &self.layout);
                (x, y, Some(zone_id.clone()))
            }
        };

        Ok(CreateTextBoxRequest {
            sheet_id,
            content: text.to_string(),
            x,
            y,
            width: self.defaults.width,
            height: self.defaults.height,
            color: self.defaults.color.clone(),
            zone,
        })
    }

    /// Emit exactly one creation request and return the stored box.
    ///
    /// Store failures are passed through unchanged and never retried.
    pub fn place(
        &self,
        store: &mut dyn TextBoxStore,
        sheet_id: SheetId,
        template: Option<&str>,
        text: &str,
        target: &PlacementTarget,
    ) -> Result<TextBox, PlacementError> {
        let request = self.prepare(store, sheet_id, template, text, target)?;
        let created = store
            .create_text_box(request)
            .map_err(PlacementError::Failed)?;
        info!(
            "Placed text box {} on sheet {} at ({}, {}){}",
            created.id,
            created.sheet_id,
            created.x,
            created.y,
            created
                .zone
                .as_deref()
                .map(|z| format!(" in zone '{z}'"))
                .unwrap_or_default()
        );
        Ok(created)
    }
}

impl Default for PlacementDispatcher {
    fn default() -> Self {
        Self::new(
            TemplateRegistry::builtin(),
            ZoneLayout::default(),
            CanvasBounds::default(),
            BoxDefaults::default(),
        )
    }
}
