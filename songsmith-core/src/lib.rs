//! Songsmith Core
//!
//! Core types shared by the Songsmith services.
//!
//! This crate contains:
//! - Domain types: jobs, creative briefs and artifacts
//! - DTOs: request and response bodies of the HTTP API

pub mod domain;
pub mod dto;
