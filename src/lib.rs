//! Glyph relay, real-time shape synchronization for collaborative boards.
//!
//! ARCHITECTURE
//! ============
//! Transport (`routes::ws`) → credential check (`auth`, once per connect) →
//! `registry` (register) → `relay` (per message) → `store` (mutate/read) →
//! `registry` (room members) → each member's outbound queue.

pub mod auth;
pub mod config;
pub mod db;
pub mod message;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod shape;
pub mod state;
pub mod store;
