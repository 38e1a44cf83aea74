#![doc = "blog-migrate-core: core logic library for blog-migrate."]

//! This crate contains the migration pipeline for moving Jekyll posts to a
//! publishing platform: front-matter extraction, content rewriting, image
//! re-hosting and the append-only progress ledger.
//! Network clients are not included here; they implement the traits in
//! [`contract`] from the binary crate.
//!
//! # Usage
//! Add this as a dependency for all shared pipeline, ledger, and config code.

pub mod assets;
pub mod config;
pub mod contract;
pub mod error;
pub mod frontmatter;
pub mod images;
pub mod ledger;
pub mod migrate;
pub mod transform;
