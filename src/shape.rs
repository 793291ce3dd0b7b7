//! Shape model: wire representation and persisted payload translation.
//!
//! DESIGN
//! ======
//! On the wire a shape is one flat JSON object: common geometry and style
//! fields plus a few type-specific fields selected by `type`. Internally the
//! type-specific part is the closed `ShapeKind` variant, flattened into the
//! common fields only at (de)serialization time.
//!
//! Storage keeps the common fields as columns and the type-specific part as a
//! single JSON `payload`. `ShapeKind::payload` and `ShapeKind::from_parts`
//! translate between the two.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// TYPES
// =============================================================================

/// A 2D point in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Geometry type plus its type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Diamond,
    Line {
        points: Vec<Point>,
    },
    Arrow {
        start_point: Point,
        end_point: Point,
    },
    Pencil {
        points: Vec<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pressure: Option<Vec<f64>>,
    },
    Text {
        text: String,
        font_size: f64,
        font_family: String,
    },
}

/// A drawable element. `id` is client-generated and unique within a room.
///
/// Client-only fields (selection state and the like) are accepted on input and
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    #[serde(flatten)]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub stroke_color: String,
    pub fill_color: String,
    pub stroke_width: f64,
    pub opacity: f64,
    #[serde(default)]
    pub angle: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("unknown shape type: {0}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// PAYLOAD TRANSLATION
// =============================================================================

const SHAPE_TYPES: [&str; 7] = ["rectangle", "circle", "diamond", "line", "arrow", "pencil", "text"];

impl ShapeKind {
    /// Wire name of the geometry type (the `type` field).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Diamond => "diamond",
            Self::Line { .. } => "line",
            Self::Arrow { .. } => "arrow",
            Self::Pencil { .. } => "pencil",
            Self::Text { .. } => "text",
        }
    }

    /// Type-specific fields as a JSON object, without the `type` tag.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Rectangle | Self::Circle | Self::Diamond => json!({}),
            Self::Line { points } => json!({ "points": points }),
            Self::Arrow { start_point, end_point } => json!({ "startPoint": start_point, "endPoint": end_point }),
            Self::Pencil { points, pressure: None } => json!({ "points": points }),
            Self::Pencil { points, pressure: Some(pressure) } => json!({ "points": points, "pressure": pressure }),
            Self::Text { text, font_size, font_family } => {
                json!({ "text": text, "fontSize": font_size, "fontFamily": font_family })
            }
        }
    }

    /// Rebuild a kind from a stored type name and generic payload.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` for a type outside the closed set and
    /// `InvalidPayload` when the payload lacks the fields the type needs.
    pub fn from_parts(type_name: &str, payload: Value) -> Result<Self, ShapeError> {
        if !SHAPE_TYPES.contains(&type_name) {
            return Err(ShapeError::UnknownType(type_name.to_string()));
        }

        let mut fields = match payload {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let source = <serde_json::Error as serde::de::Error>::custom(format!("expected object, got {other}"));
                return Err(ShapeError::InvalidPayload { kind: type_name.to_string(), source });
            }
        };
        fields.insert("type".into(), Value::String(type_name.to_string()));

        serde_json::from_value(Value::Object(fields))
            .map_err(|source| ShapeError::InvalidPayload { kind: type_name.to_string(), source })
    }
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;
