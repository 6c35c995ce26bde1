//! The interactive graph surface, seen from the editor.
//!
//! The canvas owns rendering, layout, camera and node positions. The editor
//! only drives it through [`CanvasAdapter`] and listens to the
//! [`CanvasEvent`]s it emits.

mod recording;

pub use recording::{CanvasCall, RecordedEdge, RecordedNode, RecordingCanvas};

use serde::{Deserialize, Serialize};

pub use crate::error::CanvasError;
use crate::model::{Compartment, Flow, Id};

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Model data shown on a compartment node. Position is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    pub value: f64,
}

impl From<&Compartment> for NodeData {
    fn from(c: &Compartment) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value,
        }
    }
}

/// Model data shown on a flow edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub equation: String,
}

impl From<&Flow> for EdgeData {
    fn from(f: &Flow) -> Self {
        Self {
            equation: f.equation.clone(),
        }
    }
}

/// A node or an edge on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum ElementRef {
    Node(Id),
    Edge(Id),
}

impl ElementRef {
    pub fn id(&self) -> &Id {
        match self {
            ElementRef::Node(id) | ElementRef::Edge(id) => id,
        }
    }
}

/// Interaction events emitted by the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CanvasEvent {
    Select { element: ElementRef },
    Unselect { element: ElementRef },
    DoubleClick { element: ElementRef },
    /// Right-click drag start on a node: begin drawing an edge from it.
    ContextTap { node: Id },
    /// The user finished drawing an edge. `edge` is the provisional edge the
    /// canvas already shows.
    EdgeDrawComplete { source: Id, target: Id, edge: Id },
}

/// Mutation capability of the canvas.
///
/// `remove_node` must also remove every edge incident to the node.
pub trait CanvasAdapter {
    fn add_node(&mut self, id: &Id, data: &NodeData, position: Position) -> Result<(), CanvasError>;
    fn update_node(&mut self, id: &Id, data: &NodeData) -> Result<(), CanvasError>;
    fn remove_node(&mut self, id: &Id) -> Result<(), CanvasError>;
    fn add_edge(
        &mut self,
        id: &Id,
        source: &Id,
        target: &Id,
        data: &EdgeData,
    ) -> Result<(), CanvasError>;
    /// Update edge data and re-route whichever endpoints are given.
    fn update_edge(
        &mut self,
        id: &Id,
        data: &EdgeData,
        source: Option<&Id>,
        target: Option<&Id>,
    ) -> Result<(), CanvasError>;
    fn remove_edge(&mut self, id: &Id) -> Result<(), CanvasError>;
    /// Remove every node and edge.
    fn clear(&mut self) -> Result<(), CanvasError>;
    /// Re-run the layout over the whole graph.
    fn layout(&mut self) -> Result<(), CanvasError>;
    /// Enter interactive edge drawing, starting at `source`.
    fn start_edge_drawing(&mut self, source: &Id) -> Result<(), CanvasError>;
    /// Current rendered position of a node, if the canvas knows it.
    fn node_position(&self, _id: &Id) -> Option<Position> {
        None
    }
}
