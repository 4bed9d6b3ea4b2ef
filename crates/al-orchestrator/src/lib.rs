//! AutoLider orchestrator — library crate for the lead-qualification chat.
//!
//! Re-exports all modules so the binary (`main.rs`) and external crates
//! (e.g. `al-e2e-tests`) can reach `AppState`, `build_router`, the dialogue
//! and the mock collaborators.

pub mod config;
pub mod dialogue;
pub mod error;
pub mod intent;
pub mod leads;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
