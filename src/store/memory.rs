//! Process-local shape store. Rows live in insertion order per room.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{ShapeRow, ShapeStore, StoreError};

#[derive(Default)]
pub struct MemoryShapeStore {
    rooms: RwLock<HashMap<String, Vec<ShapeRow>>>,
}

impl MemoryShapeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ShapeStore for MemoryShapeStore {
    async fn upsert(&self, row: ShapeRow) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let shapes = rooms.entry(row.room_id.clone()).or_default();

        match shapes.iter_mut().find(|s| s.shape_id == row.shape_id) {
            Some(existing) => {
                // Author and creation time belong to the row, not the edit.
                let author_id = std::mem::take(&mut existing.author_id);
                let created_at = existing.created_at;
                *existing = ShapeRow { author_id, created_at, ..row };
            }
            None => shapes.push(row),
        }
        Ok(())
    }

    async fn delete_shape(&self, room_id: &str, shape_id: &str, author_id: Option<&str>) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().await;
        let Some(shapes) = rooms.get_mut(room_id) else {
            return Ok(0);
        };

        let before = shapes.len();
        shapes.retain(|s| !(s.shape_id == shape_id && author_id.is_none_or(|a| s.author_id == a)));
        Ok((before - shapes.len()) as u64)
    }

    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().await;
        Ok(rooms.remove(room_id).map_or(0, |shapes| shapes.len() as u64))
    }

    async fn list(&self, room_id: &str) -> Result<Vec<ShapeRow>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
