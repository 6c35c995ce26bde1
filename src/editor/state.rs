//! Editor state management.
//!
//! [`EditorState`] composes the pieces of an editing session: the workspaces
//! (each with its own [`ModelStore`]), the [`GraphSynchronizer`] bound to the
//! live canvas, id allocation and settings. Store changes reach the
//! synchronizer as [`ModelChanged`] messages over a channel; the editor pumps
//! that channel after every edit.

use std::sync::mpsc::{Receiver, Sender, channel};

use tracing::{debug, info};

use crate::canvas::{CanvasAdapter, CanvasEvent};
use crate::error::{ModelError, ModelResult, WorkspaceError};
use crate::model::{
    Compartment, Constant, EntityKind, Flow, Id, IdAllocator, Intervention, Model,
};
use crate::settings::Settings;

use super::operations::ModelCommand;
use super::selection::EdgeDrawing;
use super::store::{ModelChanged, ModelStore};
use super::sync::{EditRequest, FlowCreation, GraphSynchronizer, SyncReport};
use super::workspace::{WorkspaceId, Workspaces};

/// The complete state of a model editing session.
///
/// # Example
///
/// ```rust,ignore
/// use epiflow::canvas::RecordingCanvas;
/// use epiflow::editor::EditorState;
///
/// let mut editor = EditorState::new(RecordingCanvas::new(), Settings::default(), Model::default());
/// let s = editor.new_compartment("S", 99.0)?;
/// ```
pub struct EditorState<C> {
    settings: Settings,
    workspaces: Workspaces,
    sync: GraphSynchronizer<C>,
    ids: IdAllocator,
    sender: Sender<(WorkspaceId, ModelChanged)>,
    changes: Receiver<(WorkspaceId, ModelChanged)>,
    dirty: bool,
}

impl<C: CanvasAdapter> EditorState<C> {
    /// Open `model` in a first workspace and draw it on `canvas`.
    pub fn new(canvas: C, settings: Settings, model: Model) -> Self {
        let (sender, changes) = channel();
        let ids = IdAllocator::seeded(&model);
        let sync = GraphSynchronizer::with_settings(canvas, &settings);
        let store = ModelStore::new(model, settings.history_depth);
        let mut editor = Self {
            settings,
            workspaces: Workspaces::new("Model 1", store),
            sync,
            ids,
            sender,
            changes,
            dirty: false,
        };
        editor.wire(0);
        let model = editor.workspaces.active().store.model();
        editor.sync.rebind(&model);
        editor
    }

    fn wire(&mut self, index: usize) {
        let tx = self.sender.clone();
        if let Some(ws) = self.workspaces.get_mut(index) {
            let id = ws.id();
            ws.store.subscribe(move |change| {
                tx.send((id, change.clone())).ok();
            });
        }
    }

    // ── accessors ──────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ModelStore {
        &self.workspaces.active().store
    }

    pub fn model(&self) -> Model {
        self.store().model()
    }

    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }

    pub fn synchronizer(&self) -> &GraphSynchronizer<C> {
        &self.sync
    }

    pub fn canvas(&self) -> &C {
        self.sync.canvas()
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        self.sync.canvas_mut()
    }

    /// Whether the model changed since the last [`EditorState::clear_dirty`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // ── edits ──────────────────────────────────────────────────────────────

    /// Apply `cmd` to the active workspace and bring the canvas up to date.
    pub fn apply(&mut self, cmd: ModelCommand) -> ModelResult<SyncReport> {
        if let ModelCommand::Replace(model) = &cmd {
            self.ids.observe(model);
        }
        self.workspaces.active_mut().store.dispatch(cmd)?;
        Ok(self.pump())
    }

    pub fn new_compartment(&mut self, name: &str, value: f64) -> ModelResult<Id> {
        let id = self.ids.next(&self.settings.compartment_id_prefix);
        self.apply(ModelCommand::AddCompartment(Compartment::new(id.clone(), name, value)))?;
        Ok(id)
    }

    pub fn new_constant(&mut self, name: &str, value: f64) -> ModelResult<Id> {
        let id = self.ids.next(&self.settings.constant_id_prefix);
        self.apply(ModelCommand::AddConstant(Constant::new(id.clone(), name, value)))?;
        Ok(id)
    }

    pub fn new_intervention(&mut self, name: &str) -> ModelResult<Id> {
        let id = self.ids.next(&self.settings.intervention_id_prefix);
        self.apply(ModelCommand::AddIntervention(Intervention::new(id.clone(), name)))?;
        Ok(id)
    }

    pub fn new_flow(&mut self, source: &Id, target: &Id, equation: &str) -> ModelResult<Id> {
        let id = self.ids.next(&self.settings.flow_id_prefix);
        self.apply(ModelCommand::AddFlow(Flow::new(
            id.clone(),
            source.clone(),
            target.clone(),
            equation,
        )))?;
        Ok(id)
    }

    pub fn undo(&mut self) -> SyncReport {
        if self.workspaces.active_mut().store.undo() {
            self.pump()
        } else {
            SyncReport::default()
        }
    }

    pub fn redo(&mut self) -> SyncReport {
        if self.workspaces.active_mut().store.redo() {
            self.pump()
        } else {
            SyncReport::default()
        }
    }

    /// Forward pending store changes of the active workspace to the canvas.
    /// Only the newest change matters: every pass works from full state.
    pub fn pump(&mut self) -> SyncReport {
        let active = self.workspaces.active().id();
        let latest = self
            .changes
            .try_iter()
            .filter(|(ws, _)| *ws == active)
            .last();
        match latest {
            Some((_, change)) => {
                self.dirty = true;
                self.sync.apply(&change)
            }
            None => SyncReport::default(),
        }
    }

    // ── canvas interaction ─────────────────────────────────────────────────

    pub fn handle_canvas_event(&mut self, event: CanvasEvent) -> Option<EditRequest> {
        self.sync.handle_event(event)
    }

    /// Confirm the pending create-flow request with `equation`. Returns the
    /// new flow's id, or `None` if no request was pending.
    pub fn confirm_flow(&mut self, equation: &str) -> ModelResult<Option<Id>> {
        let (source, target) = match self.sync.selection().drawing() {
            EdgeDrawing::AwaitingConfirmation { source, target, .. } => {
                (source.clone(), target.clone())
            }
            _ => return Ok(None),
        };
        for endpoint in [&source, &target] {
            if self.store().compartment(endpoint).is_none() {
                self.sync.resolve_flow_creation(FlowCreation::Cancelled);
                return Err(ModelError::NotFound {
                    kind: EntityKind::Compartment,
                    id: endpoint.clone(),
                });
            }
        }
        let id = self.new_flow(&source, &target, equation)?;
        self.sync.resolve_flow_creation(FlowCreation::Confirmed);
        Ok(Some(id))
    }

    /// Cancel the pending create-flow request; the drawn edge disappears.
    pub fn cancel_flow(&mut self) -> bool {
        self.sync.resolve_flow_creation(FlowCreation::Cancelled)
    }

    // ── workspaces ─────────────────────────────────────────────────────────

    /// Open `model` in a new workspace without activating it.
    pub fn add_workspace(&mut self, name: &str, model: Model) -> usize {
        self.ids.observe(&model);
        let index = self
            .workspaces
            .push(name, ModelStore::new(model, self.settings.history_depth));
        self.wire(index);
        index
    }

    /// Activate another workspace and redraw the canvas from its model.
    pub fn switch_workspace(&mut self, index: usize) -> Result<SyncReport, WorkspaceError> {
        self.workspaces.select(index)?;
        // Changes queued for the previous binding are obsolete now.
        self.changes.try_iter().for_each(drop);
        info!(workspace = %self.workspaces.active().name, "switching workspace");
        Ok(self.rebind())
    }

    pub fn remove_workspace(&mut self, index: usize) -> Result<SyncReport, WorkspaceError> {
        let was_active = index == self.workspaces.active_index();
        let removed = self.workspaces.remove(index)?;
        debug!(workspace = %removed.name, "workspace removed");
        Ok(if was_active {
            self.rebind()
        } else {
            SyncReport::default()
        })
    }

    pub fn rename_workspace(&mut self, index: usize, name: &str) -> Result<(), WorkspaceError> {
        let ws = self
            .workspaces
            .get_mut(index)
            .ok_or(WorkspaceError::NoSuchWorkspace(index))?;
        ws.name = name.to_string();
        Ok(())
    }

    fn rebind(&mut self) -> SyncReport {
        let model = self.workspaces.active().store.model();
        self.ids.observe(&model);
        self.sync.rebind(&model)
    }
}
