//! Core domain types
//!
//! These types describe a song generation job and the files it produces.
//! They are shared between the server (which persists and drives jobs) and
//! the client/CLI (which submit briefs and download artifacts).

pub mod artifact;
pub mod brief;
pub mod job;
