//! Postgres-backed shape store.
//!
//! The `shapes` table carries a unique `(room_id, shape_id)` constraint; the
//! upsert resolves on it and never touches `author_id` or `created_at`.

use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::{ShapeRow, ShapeStore, StoreError};

type RowTuple = (
    String,
    String,
    String,
    f64,
    f64,
    f64,
    f64,
    f64,
    String,
    String,
    f64,
    f64,
    Value,
    String,
    OffsetDateTime,
);

#[derive(Clone)]
pub struct PgShapeStore {
    pool: PgPool,
}

impl PgShapeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ShapeStore for PgShapeStore {
    async fn upsert(&self, row: ShapeRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO shapes (room_id, shape_id, kind, x, y, width, height, angle, \
                 stroke_color, fill_color, stroke_width, opacity, payload, author_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (room_id, shape_id) DO UPDATE SET \
                 kind = EXCLUDED.kind, x = EXCLUDED.x, y = EXCLUDED.y, \
                 width = EXCLUDED.width, height = EXCLUDED.height, angle = EXCLUDED.angle, \
                 stroke_color = EXCLUDED.stroke_color, fill_color = EXCLUDED.fill_color, \
                 stroke_width = EXCLUDED.stroke_width, opacity = EXCLUDED.opacity, \
                 payload = EXCLUDED.payload, updated_at = now()",
        )
        .bind(&row.room_id)
        .bind(&row.shape_id)
        .bind(&row.kind)
        .bind(row.x)
        .bind(row.y)
        .bind(row.width)
        .bind(row.height)
        .bind(row.angle)
        .bind(&row.stroke_color)
        .bind(&row.fill_color)
        .bind(row.stroke_width)
        .bind(row.opacity)
        .bind(&row.payload)
        .bind(&row.author_id)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_shape(&self, room_id: &str, shape_id: &str, author_id: Option<&str>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM shapes \
             WHERE room_id = $1 AND shape_id = $2 AND ($3::text IS NULL OR author_id = $3)",
        )
        .bind(room_id)
        .bind(shape_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self, room_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM shapes WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, room_id: &str) -> Result<Vec<ShapeRow>, StoreError> {
        let rows = sqlx::query_as::<_, RowTuple>(
            "SELECT room_id, shape_id, kind, x, y, width, height, angle, \
                    stroke_color, fill_color, stroke_width, opacity, payload, author_id, created_at \
             FROM shapes WHERE room_id = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_from_tuple).collect())
    }
}

fn row_from_tuple(
    (
        room_id,
        shape_id,
        kind,
        x,
        y,
        width,
        height,
        angle,
        stroke_color,
        fill_color,
        stroke_width,
        opacity,
        payload,
        author_id,
        created_at,
    ): RowTuple,
) -> ShapeRow {
    ShapeRow {
        room_id,
        shape_id,
        kind,
        x,
        y,
        width,
        height,
        angle,
        stroke_color,
        fill_color,
        stroke_width,
        opacity,
        payload,
        author_id,
        created_at,
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
