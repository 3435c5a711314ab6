//! Analysis templates and their zones
//!
//! A template is a fixed, ordered list of zones. The order matters: a zone's
//! index determines where its first box lands on the canvas.

use serde::{Deserialize, Serialize};

use crate::store::TextBox;

/// Semantic role of a zone inside its template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneGroup {
    /// One of the framework's own quadrants/forces/blocks
    #[default]
    Core,
    /// Extra analysis areas attached to a framework
    Analysis,
    /// Summary or verdict area
    Conclusion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub group: ZoneGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub zones: Vec<Zone>,
}

impl Template {
    /// Position of `zone_id` in this template, if present
    #[must_use]
    pub fn zone_index(&self, zone_id: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.id == zone_id)
    }
}

type ZoneSpec = (&'static str, &'static str, ZoneGroup);

use ZoneGroup::{Analysis, Conclusion, Core};

const BUILTIN: &[(&str, &str, &[ZoneSpec])] = &[
    (
        "swot",
        "SWOT",
        &[
            ("strengths", "Strengths", Core),
            ("weaknesses", "Weaknesses", Core),
            ("opportunities", "Opportunities", Core),
            ("threats", "Threats", Core),
        ],
    ),
    (
        "4p",
        "4P",
        &[
            ("product", "Product", Core),
            ("price", "Price", Core),
            ("place", "Place", Core),
            ("promotion", "Promotion", Core),
        ],
    ),
    (
        "3c",
        "3C",
        &[
            ("customer", "Customer", Core),
            ("competitor", "Competitor", Core),
            ("company", "Company", Core),
        ],
    ),
    (
        "pest",
        "PEST",
        &[
            ("political", "Political", Core),
            ("economic", "Economic", Core),
            ("social", "Social", Core),
            ("technological", "Technological", Core),
        ],
    ),
    (
        "five_forces",
        "Five Forces",
        &[
            ("rivalry", "Competitive Rivalry", Core),
            ("new_entrants", "Threat of New Entrants", Core),
            ("substitutes", "Threat of Substitutes", Core),
            ("buyer_power", "Bargaining Power of Buyers", Core),
            ("supplier_power", "Bargaining Power of Suppliers", Core),
        ],
    ),
    (
        "supply_chain",
        "Supply Chain",
        &[
            ("procurement", "Procurement", Core),
            ("manufacturing", "Manufacturing", Core),
            ("logistics", "Logistics", Core),
            ("sales", "Sales", Core),
            ("service", "Service", Core),
            ("issues", "Issues", Analysis),
            ("improvements", "Improvements", Analysis),
        ],
    ),
    (
        "value_chain",
        "Value Chain",
        &[
            ("inbound_logistics", "Inbound Logistics", Core),
            ("operations", "Operations", Core),
            ("outbound_logistics", "Outbound Logistics", Core),
            ("marketing_sales", "Marketing & Sales", Core),
            ("service", "Service", Core),
            ("infrastructure", "Firm Infrastructure", Core),
            ("hr_management", "Human Resource Management", Core),
            ("technology", "Technology Development", Core),
            ("procurement", "Procurement", Core),
            ("strengths", "Strengths", Analysis),
            ("weaknesses", "Weaknesses", Analysis),
        ],
    ),
    (
        "vrio",
        "VRIO",
        &[
            ("value", "Value", Core),
            ("rarity", "Rarity", Core),
            ("imitability", "Imitability", Core),
            ("organization", "Organization", Core),
            ("conclusion", "Conclusion", Conclusion),
        ],
    ),
    (
        "ansoff",
        "Ansoff Matrix",
        &[
            ("market_penetration", "Market Penetration", Core),
            ("product_development", "Product Development", Core),
            ("market_development", "Market Development", Core),
            ("diversification", "Diversification", Core),
        ],
    ),
    (
        "stp",
        "STP",
        &[
            ("segmentation", "Segmentation", Core),
            ("targeting", "Targeting", Core),
            ("positioning", "Positioning", Core),
        ],
    ),
    (
        "business_model_canvas",
        "Business Model Canvas",
        &[
            ("key_partners", "Key Partners", Core),
            ("key_activities", "Key Activities", Core),
            ("key_resources", "Key Resources", Core),
            ("value_propositions", "Value Propositions", Core),
            ("customer_relationships", "Customer Relationships", Core),
            ("channels", "Channels", Core),
            ("customer_segments", "Customer Segments", Core),
            ("cost_structure", "Cost Structure", Core),
            ("revenue_streams", "Revenue Streams", Core),
        ],
    ),
];

/// Canonical form of a template id: lowercase, `-` and spaces as `_`
#[must_use]
pub fn normalize_template_id(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Static template table
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    /// The built-in frameworks
    #[must_use]
    pub fn builtin() -> Self {
        let templates = BUILTIN
            .iter()
            .map(|(id, name, zones)| Template {
                id: (*id).to_string(),
                name: (*name).to_string(),
                zones: zones
                    .iter()
                    .map(|(zid, label, group)| Zone {
                        id: (*zid).to_string(),
                        label: (*label).to_string(),
                        group: *group,
                    })
                    .collect(),
            })
            .collect();
        Self { templates }
    }

    /// Built-ins plus user templates; a user template replaces a built-in
    /// with the same id
    #[must_use]
    pub fn with_custom(custom: &[Template]) -> Self {
        let mut registry = Self::builtin();
        for template in custom {
            let mut template = template.clone();
            template.id = normalize_template_id(&template.id);
            match registry.templates.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => registry.templates.push(template),
            }
        }
        registry
    }

    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    #[must_use]
    pub fn get(&self, template_id: &str) -> Option<&Template> {
        let id = normalize_template_id(template_id);
        self.templates.iter().find(|t| t.id == id)
    }

    /// Ordered zones of a template. Unknown or absent ids give an empty
    /// slice, meaning a freeform canvas.
    #[must_use]
    pub fn zones_for(&self, template_id: Option<&str>) -> &[Zone] {
        template_id
            .and_then(|id| self.get(id))
            .map(|t| t.zones.as_slice())
            .unwrap_or(&[])
    }
}

/// Fixed spacing used to place boxes inside zones
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneLayout {
    pub base_x: f32,
    pub base_y: f32,
    pub column_width: f32,
    pub row_height: f32,
    /// Offset below the last box of a non-empty zone
    pub vertical_step: f32,
    /// Columns of the first-insertion tiling
    pub columns: usize,
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self {
            base_x: 50.0,
            base_y: 50.0,
            column_width: 300.0,
            row_height: 200.0,
            vertical_step: 100.0,
            columns: 2,
        }
    }
}

/// Canvas position for the next box of a zone.
///
/// With boxes already present the new one goes directly below the last one
/// in `existing_in_zone`. An empty zone starts from a tile derived from its
/// index alone, so different zones never share a first position.
#[must_use]
pub fn next_slot(existing_in_zone: &[TextBox], zone_index: usize, layout: &ZoneLayout) -> (f32, f32) {
    if let Some(last) = existing_in_zone.last() {
        return (last.x, last.y + layout.vertical_step);
    }

    let columns = layout.columns.max(1);
    let col = (zone_index % columns) as f32;
    let row = (zone_index / columns) as f32;
    (
        layout.base_x + col * layout.column_width,
        layout.base_y + row * layout.row_height,
    )
}
