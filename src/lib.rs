//! Atelier - content catalogue service
//!
//! Users, categories, themes and contents behind a role-based REST API. The
//! services keep references between them consistent: themes only list
//! existing categories, content must fit its theme, and nothing that is still
//! referenced can be deleted.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
