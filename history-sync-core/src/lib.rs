#![doc = "history-sync-core: core pipeline for reconciling remote post history into a local store."]

//! This crate holds the data model, the trait seams and every stage of the post history
//! reconciliation pipeline. Concrete provider clients, file-backed stores, the CLI and the
//! HTTP surface live in the `history-sync` crate.
//!
//! # Pipeline
//! [`scan`] → [`history`] → [`dedup`] → [`media`] × [`import`], with [`avatar`] running
//! alongside; [`synchronise`] wires the stages together.

pub mod avatar;
pub mod config;
pub mod contract;
pub mod dedup;
pub mod error;
pub mod history;
pub mod import;
pub mod media;
pub mod model;
pub mod scan;
pub mod store;
pub mod synchronise;
