//! Persistent shape storage keyed by `(room_id, shape_id)`.
//!
//! ARCHITECTURE
//! ============
//! The relay talks to storage only through `ShapeStore`: upsert, filtered
//! delete, delete-all and ordered list. `PgShapeStore` backs production;
//! `MemoryShapeStore` backs local runs without a database and the tests.
//!
//! DESIGN
//! ======
//! `(room_id, shape_id)` is the persistence key and the unit of last write
//! wins. An upsert on an existing key replaces type, geometry, style and
//! payload but keeps the row's author and creation time, so `list` order
//! (oldest first) is stable across edits.

pub mod memory;
pub mod postgres;

use serde_json::Value;
use time::OffsetDateTime;

use crate::message::ErrorCode;
use crate::shape::{Shape, ShapeError, ShapeKind};

pub use memory::MemoryShapeStore;
pub use postgres::PgShapeStore;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        "E_PERSISTENCE"
    }
}

/// One persisted shape. Mirrors the `shapes` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRow {
    pub room_id: String,
    pub shape_id: String,
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub stroke_color: String,
    pub fill_color: String,
    pub stroke_width: f64,
    pub opacity: f64,
    pub payload: Value,
    pub author_id: String,
    pub created_at: OffsetDateTime,
}

impl ShapeRow {
    /// Flatten a wire shape into a row authored by `author_id`.
    #[must_use]
    pub fn from_shape(room_id: &str, shape: &Shape, author_id: &str) -> Self {
        Self {
            room_id: room_id.to_owned(),
            shape_id: shape.id.clone(),
            kind: shape.kind.type_name().to_owned(),
            x: shape.x,
            y: shape.y,
            width: shape.width,
            height: shape.height,
            angle: shape.angle,
            stroke_color: shape.stroke_color.clone(),
            fill_color: shape.fill_color.clone(),
            stroke_width: shape.stroke_width,
            opacity: shape.opacity,
            payload: shape.kind.payload(),
            author_id: author_id.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Rebuild the wire shape, reconstituting the type-specific fields from
    /// the generic payload.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the stored type or payload is not valid.
    pub fn into_shape(self) -> Result<Shape, ShapeError> {
        let kind = ShapeKind::from_parts(&self.kind, self.payload)?;
        Ok(Shape {
            id: self.shape_id,
            kind,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            stroke_color: self.stroke_color,
            fill_color: self.fill_color,
            stroke_width: self.stroke_width,
            opacity: self.opacity,
            angle: self.angle,
        })
    }
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

#[async_trait::async_trait]
pub trait ShapeStore: Send + Sync {
    /// Create or replace the shape keyed by `(row.room_id, row.shape_id)`.
    async fn upsert(&self, row: ShapeRow) -> Result<(), StoreError>;

    /// Delete one shape, optionally only if `author_id` authored it.
    /// Returns the number of rows removed.
    async fn delete_shape(&self, room_id: &str, shape_id: &str, author_id: Option<&str>) -> Result<u64, StoreError>;

    /// Delete every shape in a room. Returns the number of rows removed.
    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError>;

    /// All shapes in a room, oldest first.
    async fn list(&self, room_id: &str) -> Result<Vec<ShapeRow>, StoreError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
