//! # Figma API Connector
//!
//! Implements the [`bridge_traits::DesignHost`] contract against the Figma
//! REST API v1: OAuth token exchange and refresh, the `/me` identity
//! endpoint, and per-key file metadata lookups.

pub mod client;
pub mod types;

pub use client::{FigmaClient, FigmaConfig, AUTHORIZE_URL, DEFAULT_SCOPES};
