//! Persistence collaborator for canvas text boxes
//!
//! The core only ever creates boxes and lists the boxes of a sheet. Two
//! reference stores are provided: an in-memory one and a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SheetId = u64;
pub type TextBoxId = u64;

/// Payload handed to the store to create one box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTextBoxRequest {
    pub sheet_id: SheetId,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// A stored box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub id: TextBoxId,
    pub sheet_id: SheetId,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TextBox {
    fn from_request(id: TextBoxId, req: CreateTextBoxRequest) -> Self {
        Self {
            id,
            sheet_id: req.sheet_id,
            content: req.content,
            x: req.x,
            y: req.y,
            width: req.width,
            height: req.height,
            color: req.color,
            zone: req.zone,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store rejected request: {0}")]
    Rejected(String),
}

/// Text box persistence
pub trait TextBoxStore {
    fn create_text_box(&mut self, req: CreateTextBoxRequest) -> Result<TextBox, StoreError>;

    /// Boxes of a sheet in creation order
    fn list_text_boxes_for_sheet(&self, sheet_id: SheetId) -> Result<Vec<TextBox>, StoreError>;
}

/// Volatile store
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    next_id: TextBoxId,
    boxes: Vec<TextBox>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn boxes(&self) -> &[TextBox] {
        &self.boxes
    }
}

impl TextBoxStore for MemoryStore {
    fn create_text_box(&mut self, req: CreateTextBoxRequest) -> Result<TextBox, StoreError> {
        self.next_id += 1;
        let created = TextBox::from_request(self.next_id, req);
        self.boxes.push(created.clone());
        Ok(created)
    }

    fn list_text_boxes_for_sheet(&self, sheet_id: SheetId) -> Result<Vec<TextBox>, StoreError> {
        Ok(self
            .boxes
            .iter()
            .filter(|b| b.sheet_id == sheet_id)
            .cloned()
            .collect())
    }
}

/// Store persisted as pretty JSON, rewritten on every create
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open an existing file, or start empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            MemoryStore::new()
        };
        Ok(Self { path, inner })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.inner)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl TextBoxStore for JsonFileStore {
    fn create_text_box(&mut self, req: CreateTextBoxRequest) -> Result<TextBox, StoreError> {
        let created = self.inner.create_text_box(req)?;
        if let Err(e) = self.save() {
            // Leave no partial state behind.
            self.inner.boxes.pop();
            self.inner.next_id -= 1;
            return Err(e);
        }
        Ok(created)
    }

    fn list_text_boxes_for_sheet(&self, sheet_id: SheetId) -> Result<Vec<TextBox>, StoreError> {
        self.inner.list_text_boxes_for_sheet(sheet_id)
    }
}
