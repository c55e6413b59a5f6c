//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into read (eager fetch) and write
//!   (creation gate) use-cases.
//! - Keep callers decoupled from storage details.

pub mod creation_service;
pub mod fetch_service;
