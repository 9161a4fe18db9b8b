//! Shared test fixtures for the dotconfig-hub workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`hub`]: [`TestHub`] builder for a templates directory, its catalog and
//!   a handful of projects inside one temp dir

pub mod hub;

pub use hub::TestHub;
