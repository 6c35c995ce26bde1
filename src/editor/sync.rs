//! Keeps a canvas projection in step with the model.
//!
//! [`GraphSynchronizer`] runs in two directions:
//!
//! - **Model → canvas**: [`GraphSynchronizer::on_model_changed`] diffs the
//!   new model against what the canvas currently shows and issues the minimal
//!   adapter calls. Compartments are reconciled before flows, and layout runs
//!   once per pass at most.
//! - **Canvas → model**: [`GraphSynchronizer::handle_event`] turns canvas
//!   interaction into [`EditRequest`]s. It never writes the model itself; the
//!   caller decides whether a request turns into an edit.
//!
//! Canvas failures never touch the model. They mark the projection as
//! diverged and the next pass rebuilds the canvas from the full model.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::canvas::{CanvasAdapter, CanvasError, CanvasEvent, EdgeData, ElementRef, NodeData, Position};
use crate::diff::diff;
use crate::model::{Compartment, Flow, Id, Model};
use crate::settings::Settings;

use super::selection::{CanvasSelection, EdgeDrawing};
use super::store::ModelChanged;

/// What the user asked for through the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum EditRequest {
    /// Open the compartment editor on the current compartment data.
    EditCompartment(Compartment),
    /// Open the flow editor on the current flow (and its equation).
    EditFlow(Flow),
    /// Open the create-flow dialog for an edge the user just drew.
    CreateFlow {
        source: Id,
        target: Id,
        provisional_edge: Id,
    },
}

/// How a create-flow request was settled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCreation {
    Confirmed,
    Cancelled,
}

/// Summary of one model → canvas pass. Counters only include calls that
/// succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub cleared: bool,
    pub rebuilt: bool,
    pub nodes_added: usize,
    pub nodes_updated: usize,
    pub nodes_removed: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
    pub edges_removed: usize,
    /// Flows not drawn because an endpoint compartment does not exist.
    pub edges_skipped: usize,
    pub laid_out: bool,
    pub failures: usize,
}

impl SyncReport {
    pub fn mutations(&self) -> usize {
        self.nodes_added
            + self.nodes_updated
            + self.nodes_removed
            + self.edges_added
            + self.edges_updated
            + self.edges_removed
    }
}

pub struct GraphSynchronizer<C> {
    canvas: C,
    compartments: Vec<Compartment>,
    flows: Vec<Flow>,
    diverged: bool,
    selection: CanvasSelection,
    default_position: Position,
}

impl<C: CanvasAdapter> GraphSynchronizer<C> {
    pub fn new(canvas: C) -> Self {
        Self::with_settings(canvas, &Settings::default())
    }

    pub fn with_settings(canvas: C, settings: &Settings) -> Self {
        Self {
            canvas,
            compartments: Vec::new(),
            flows: Vec::new(),
            diverged: false,
            selection: CanvasSelection::new(),
            default_position: settings.default_node_position,
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    /// Compartments the canvas is believed to show.
    pub fn projected_compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    /// Flows the canvas is believed to show.
    pub fn projected_flows(&self) -> &[Flow] {
        &self.flows
    }

    /// True when the last pass hit a canvas failure; the next pass rebuilds.
    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    pub fn selection(&self) -> &CanvasSelection {
        &self.selection
    }

    pub fn selected_element(&self) -> Option<&ElementRef> {
        self.selection.selected()
    }

    pub fn node_position(&self, id: &Id) -> Option<Position> {
        self.canvas.node_position(id)
    }

    // ── model → canvas ─────────────────────────────────────────────────────

    pub fn apply(&mut self, change: &ModelChanged) -> SyncReport {
        self.on_model_changed(&change.new)
    }

    /// Bring the canvas in line with `model`.
    pub fn on_model_changed(&mut self, model: &Model) -> SyncReport {
        let mut report = SyncReport::default();

        if model.is_graph_empty() {
            report.cleared = true;
            let result = self.canvas.clear();
            settle(&mut report, "clear", None, result);
            self.compartments.clear();
            self.flows.clear();
            self.selection.clear();
            self.diverged = report.failures > 0;
            return report;
        }

        let drawable = drawable_flows(model);
        report.edges_skipped = model.flows.len() - drawable.len();
        if report.edges_skipped > 0 {
            warn!(
                skipped = report.edges_skipped,
                "flows with missing endpoint compartments are not drawn"
            );
        }

        if self.diverged {
            self.rebuild(model, &drawable, &mut report);
        } else {
            self.reconcile(model, &drawable, &mut report);
        }

        if report.mutations() > 0 {
            let result = self.canvas.layout();
            let laid_out = settle(&mut report, "layout", None, result);
            report.laid_out = laid_out;
        }

        self.compartments = model.compartments.clone();
        self.flows = drawable;
        let (compartments, flows) = (&self.compartments, &self.flows);
        self.selection.retain(|el| match el {
            ElementRef::Node(id) => compartments.iter().any(|c| &c.id == id),
            ElementRef::Edge(id) => flows.iter().any(|f| &f.id == id),
        });
        self.drop_stale_drawing();
        self.diverged = report.failures > 0;

        debug!(
            nodes_added = report.nodes_added,
            nodes_updated = report.nodes_updated,
            nodes_removed = report.nodes_removed,
            edges_added = report.edges_added,
            edges_updated = report.edges_updated,
            edges_removed = report.edges_removed,
            rebuilt = report.rebuilt,
            failures = report.failures,
            "canvas sync pass"
        );
        report
    }

    /// Tear the projection down and redraw `model` from scratch, e.g. after
    /// switching workspaces.
    pub fn rebind(&mut self, model: &Model) -> SyncReport {
        self.selection.clear();
        self.diverged = true;
        self.on_model_changed(model)
    }

    fn reconcile(&mut self, model: &Model, drawable: &[Flow], report: &mut SyncReport) {
        let nodes = diff(&self.compartments, &model.compartments);
        for c in &nodes.added {
            let result = self.canvas.add_node(&c.id, &NodeData::from(c), self.default_position);
            if settle(report, "add node", Some(&c.id), result) {
                report.nodes_added += 1;
            }
        }
        for (_, c) in nodes.changed(&self.compartments) {
            let result = self.canvas.update_node(&c.id, &NodeData::from(c));
            if settle(report, "update node", Some(&c.id), result) {
                report.nodes_updated += 1;
            }
        }
        for c in &nodes.removed {
            let result = self.canvas.remove_node(&c.id);
            if settle(report, "remove node", Some(&c.id), result) {
                report.nodes_removed += 1;
            }
        }

        // Edges attached to a removed node were already dropped by the canvas.
        let removed_nodes: HashSet<&Id> = nodes.removed.iter().map(|c| &c.id).collect();
        let cascaded = |f: &Flow| removed_nodes.contains(&f.source) || removed_nodes.contains(&f.target);

        let edges = diff(&self.flows, drawable);
        for f in &edges.added {
            let result = self
                .canvas
                .add_edge(&f.id, &f.source, &f.target, &EdgeData::from(f));
            if settle(report, "add edge", Some(&f.id), result) {
                report.edges_added += 1;
            }
        }
        for (old, new) in edges.changed(&self.flows) {
            if cascaded(old) {
                let result = self
                    .canvas
                    .add_edge(&new.id, &new.source, &new.target, &EdgeData::from(new));
                if settle(report, "add edge", Some(&new.id), result) {
                    report.edges_added += 1;
                }
                continue;
            }
            let source = (old.source != new.source).then_some(&new.source);
            let target = (old.target != new.target).then_some(&new.target);
            let result = self
                .canvas
                .update_edge(&new.id, &EdgeData::from(new), source, target);
            if settle(report, "update edge", Some(&new.id), result) {
                report.edges_updated += 1;
            }
        }
        for f in edges.removed.iter().filter(|f| !cascaded(*f)) {
            let result = self.canvas.remove_edge(&f.id);
            if settle(report, "remove edge", Some(&f.id), result) {
                report.edges_removed += 1;
            }
        }
    }

    fn rebuild(&mut self, model: &Model, drawable: &[Flow], report: &mut SyncReport) {
        let result = self.canvas.clear();
        if !settle(report, "clear", None, result) {
            return;
        }
        // A provisional edge went with the clear.
        self.selection.clear();
        report.rebuilt = true;
        for c in &model.compartments {
            let result = self.canvas.add_node(&c.id, &NodeData::from(c), self.default_position);
            if settle(report, "add node", Some(&c.id), result) {
                report.nodes_added += 1;
            }
        }
        for f in drawable {
            let result = self
                .canvas
                .add_edge(&f.id, &f.source, &f.target, &EdgeData::from(f));
            if settle(report, "add edge", Some(&f.id), result) {
                report.edges_added += 1;
            }
        }
    }

    // ── canvas → model ─────────────────────────────────────────────────────

    /// Translate a canvas event into an edit request, updating canvas-only
    /// state along the way.
    pub fn handle_event(&mut self, event: CanvasEvent) -> Option<EditRequest> {
        match event {
            CanvasEvent::Select { element } => {
                self.selection.select(element);
                None
            }
            CanvasEvent::Unselect { element } => {
                self.selection.unselect(&element);
                None
            }
            CanvasEvent::DoubleClick {
                element: ElementRef::Node(id),
            } => self
                .compartments
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .map(EditRequest::EditCompartment),
            CanvasEvent::DoubleClick {
                element: ElementRef::Edge(id),
            } => self
                .flows
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .map(EditRequest::EditFlow),
            CanvasEvent::ContextTap { node } => {
                if !self.shows_node(&node) {
                    return None;
                }
                self.abandon_pending_flow();
                match self.canvas.start_edge_drawing(&node) {
                    Ok(()) => self.selection.begin_drawing(node),
                    Err(err) => warn!("canvas could not start edge drawing at {}: {}", node, err),
                }
                None
            }
            CanvasEvent::EdgeDrawComplete {
                source,
                target,
                edge,
            } => {
                self.abandon_pending_flow();
                if self.shows_node(&source) && self.shows_node(&target) {
                    self.selection
                        .await_confirmation(source.clone(), target.clone(), edge.clone());
                    Some(EditRequest::CreateFlow {
                        source,
                        target,
                        provisional_edge: edge,
                    })
                } else {
                    warn!("edge drawn between unknown compartments {} -> {}", source, target);
                    self.selection.finish_drawing();
                    self.discard_provisional(&edge);
                    None
                }
            }
        }
    }

    /// Settle the pending create-flow request. The provisional edge is removed
    /// either way: a confirmed flow is drawn by the next model pass under its
    /// own id. Returns false if nothing was pending.
    pub fn resolve_flow_creation(&mut self, outcome: FlowCreation) -> bool {
        let Some(edge) = self.selection.finish_drawing() else {
            return false;
        };
        debug!(?outcome, provisional = %edge, "create-flow request settled");
        self.discard_provisional(&edge);
        true
    }

    /// True while a drawn edge waits for the user's decision.
    pub fn is_awaiting_flow_creation(&self) -> bool {
        matches!(
            self.selection.drawing(),
            EdgeDrawing::AwaitingConfirmation { .. }
        )
    }

    fn shows_node(&self, id: &Id) -> bool {
        self.compartments.iter().any(|c| &c.id == id)
    }

    /// A new drawing replaces an unanswered create-flow request.
    fn abandon_pending_flow(&mut self) {
        if let Some(edge) = self.selection.finish_drawing() {
            debug!(provisional = %edge, "create-flow request abandoned");
            self.discard_provisional(&edge);
        }
    }

    /// End a drawing whose endpoint compartment is no longer shown. The canvas
    /// removed the provisional edge together with the node.
    fn drop_stale_drawing(&mut self) {
        let stale = match self.selection.drawing() {
            EdgeDrawing::Idle => false,
            EdgeDrawing::Drawing { source } => !self.shows_node(source),
            EdgeDrawing::AwaitingConfirmation { source, target, .. } => {
                !self.shows_node(source) || !self.shows_node(target)
            }
        };
        if stale {
            self.selection.finish_drawing();
            debug!("edge drawing ended: endpoint compartment removed");
        }
    }

    fn discard_provisional(&mut self, edge: &Id) {
        if let Err(err) = self.canvas.remove_edge(edge) {
            warn!("could not remove provisional edge {}: {}", edge, err);
        }
    }
}

/// Flows whose endpoints both exist in the model.
fn drawable_flows(model: &Model) -> Vec<Flow> {
    let present: HashSet<&Id> = model.compartments.iter().map(|c| &c.id).collect();
    model
        .flows
        .iter()
        .filter(|f| present.contains(&f.source) && present.contains(&f.target))
        .cloned()
        .collect()
}

/// Log a failed adapter call and count it. Returns true on success.
fn settle(
    report: &mut SyncReport,
    operation: &str,
    id: Option<&Id>,
    result: Result<(), CanvasError>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            report.failures += 1;
            match id {
                Some(id) => warn!("canvas {} failed for {}: {}", operation, id, err),
                None => warn!("canvas {} failed: {}", operation, err),
            }
            false
        }
    }
}
