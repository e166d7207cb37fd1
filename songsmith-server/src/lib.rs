//! Song generation server
//!
//! Turns a brief into lyrics, a melody with an audio rendering and an
//! engraved score, and serves the results over HTTP.

pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod music;
pub mod repository;
pub mod score;
pub mod service;
pub mod speech;
pub mod text;
