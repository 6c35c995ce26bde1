//! Compartmental model editing core.
//!
//! This crate keeps an epidemiological compartment model (compartments,
//! constants, interventions and flows with symbolic rate equations) in sync
//! with an interactive graph canvas:
//!
//! - [`model`]: entities, ids and model files
//! - [`diff`]: identity-keyed collection diffing
//! - [`equation`]: tokenizing and whole-word symbol renaming
//! - [`editor`]: model store, undo/redo, canvas synchronization, workspaces
//! - [`canvas`]: the adapter trait a canvas implements, plus an in-memory one
//! - [`validate`]: name, endpoint and equation checks
//! - [`processing`]: payloads and request fencing for the remote solver
//!
//! The binary `epiflow` exposes validation, renaming and sync traces on the
//! command line.

pub mod canvas;
pub mod diff;
pub mod editor;
pub mod equation;
pub mod error;
pub mod model;
pub mod processing;
pub mod settings;
pub mod validate;
