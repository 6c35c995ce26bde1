//! Compartmental model editor core.
//!
//! This module ties the model to an interactive canvas:
//!
//! - **Operations**: every edit as a [`ModelCommand`], applied in place or
//!   through the pure [`reduce`] function, with cascading removal and rename
//!   propagation into flow equations
//! - **Store**: the canonical model of a workspace, with undo/redo and change
//!   observers
//! - **Synchronization**: incremental model → canvas reconciliation and
//!   canvas → model edit requests
//! - **Selection**: canvas-only selection and edge-drawing state
//! - **Workspaces**: several models, one bound to the canvas at a time

pub mod operations;
pub mod selection;
pub mod state;
pub mod store;
pub mod sync;
pub mod workspace;

pub use operations::{ModelCommand, ModelHistory, apply, reduce};
pub use selection::{CanvasSelection, EdgeDrawing};
pub use state::EditorState;
pub use store::{ModelChanged, ModelStore, SubscriptionId};
pub use sync::{EditRequest, FlowCreation, GraphSynchronizer, SyncReport};
pub use workspace::{Workspace, WorkspaceId, Workspaces};
