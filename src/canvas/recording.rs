use indexmap::IndexMap;
use serde::Serialize;

use super::{CanvasAdapter, CanvasError, CanvasEvent, EdgeData, NodeData, Position};
use crate::model::Id;

/// One adapter call, as seen by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum CanvasCall {
    AddNode { id: Id },
    UpdateNode { id: Id },
    RemoveNode { id: Id },
    AddEdge { id: Id, source: Id, target: Id },
    UpdateEdge { id: Id, rerouted: bool },
    RemoveEdge { id: Id },
    Clear,
    Layout,
    StartEdgeDrawing { source: Id },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNode {
    pub data: NodeData,
    pub position: Position,
    /// Placed by the user; layout leaves it where it is.
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEdge {
    pub source: Id,
    pub target: Id,
    pub data: EdgeData,
}

/// In-memory canvas that keeps the graph it is told to show and records every
/// call made to it, including failed ones.
///
/// It behaves like a strict graph surface: edges need both endpoints, ids must
/// be unique, and removing a node removes its edges. It can also be switched
/// offline to simulate an uninitialised surface.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    nodes: IndexMap<Id, RecordedNode>,
    edges: IndexMap<Id, RecordedEdge>,
    calls: Vec<CanvasCall>,
    offline: bool,
    drawing_from: Option<Id>,
    provisional_counter: u64,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// A canvas that rejects every call until [`RecordingCanvas::set_offline`]
    /// turns it back on.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn calls(&self) -> &[CanvasCall] {
        &self.calls
    }

    /// Drain the recorded calls.
    pub fn take_calls(&mut self) -> Vec<CanvasCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn nodes(&self) -> &IndexMap<Id, RecordedNode> {
        &self.nodes
    }

    pub fn edges(&self) -> &IndexMap<Id, RecordedEdge> {
        &self.edges
    }

    pub fn node(&self, id: &Id) -> Option<&RecordedNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &Id) -> Option<&RecordedEdge> {
        self.edges.get(id)
    }

    /// Source node of the edge currently being drawn, if any.
    pub fn drawing_from(&self) -> Option<&Id> {
        self.drawing_from.as_ref()
    }

    /// Move a node, the way a user drag would. The node stays pinned there.
    pub fn drag_node(&mut self, id: &Id, position: Position) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.position = position;
            node.pinned = true;
        }
    }

    /// Finish the edge being drawn at `target`: the surface adds a
    /// provisional edge and reports the completion event.
    pub fn finish_edge_drawing(&mut self, target: &Id) -> Option<CanvasEvent> {
        let source = self.drawing_from.take()?;
        if !self.nodes.contains_key(target) {
            return None;
        }
        self.provisional_counter += 1;
        let edge = Id::new(format!("eh-{}", self.provisional_counter));
        self.edges.insert(
            edge.clone(),
            RecordedEdge {
                source: source.clone(),
                target: target.clone(),
                data: EdgeData {
                    equation: String::new(),
                },
            },
        );
        Some(CanvasEvent::EdgeDrawComplete {
            source,
            target: target.clone(),
            edge,
        })
    }

    fn record(&mut self, call: CanvasCall) -> Result<(), CanvasError> {
        self.calls.push(call);
        if self.offline {
            Err(CanvasError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn require_node(&self, id: &Id) -> Result<(), CanvasError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(CanvasError::UnknownNode(id.clone()))
        }
    }
}

impl CanvasAdapter for RecordingCanvas {
    fn add_node(&mut self, id: &Id, data: &NodeData, position: Position) -> Result<(), CanvasError> {
        self.record(CanvasCall::AddNode { id: id.clone() })?;
        if self.nodes.contains_key(id) {
            return Err(CanvasError::Rejected(format!("node {} already exists", id)));
        }
        self.nodes.insert(
            id.clone(),
            RecordedNode {
                data: data.clone(),
                position,
                pinned: false,
            },
        );
        Ok(())
    }

    fn update_node(&mut self, id: &Id, data: &NodeData) -> Result<(), CanvasError> {
        self.record(CanvasCall::UpdateNode { id: id.clone() })?;
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| CanvasError::UnknownNode(id.clone()))?;
        node.data = data.clone();
        Ok(())
    }

    fn remove_node(&mut self, id: &Id) -> Result<(), CanvasError> {
        self.record(CanvasCall::RemoveNode { id: id.clone() })?;
        self.nodes
            .shift_remove(id)
            .ok_or_else(|| CanvasError::UnknownNode(id.clone()))?;
        self.edges
            .retain(|_, e| &e.source != id && &e.target != id);
        Ok(())
    }

    fn add_edge(
        &mut self,
        id: &Id,
        source: &Id,
        target: &Id,
        data: &EdgeData,
    ) -> Result<(), CanvasError> {
        self.record(CanvasCall::AddEdge {
            id: id.clone(),
            source: source.clone(),
            target: target.clone(),
        })?;
        self.require_node(source)?;
        self.require_node(target)?;
        if self.edges.contains_key(id) {
            return Err(CanvasError::Rejected(format!("edge {} already exists", id)));
        }
        self.edges.insert(
            id.clone(),
            RecordedEdge {
                source: source.clone(),
                target: target.clone(),
                data: data.clone(),
            },
        );
        Ok(())
    }

    fn update_edge(
        &mut self,
        id: &Id,
        data: &EdgeData,
        source: Option<&Id>,
        target: Option<&Id>,
    ) -> Result<(), CanvasError> {
        self.record(CanvasCall::UpdateEdge {
            id: id.clone(),
            rerouted: source.is_some() || target.is_some(),
        })?;
        for endpoint in source.iter().chain(target.iter()) {
            self.require_node(endpoint)?;
        }
        let edge = self
            .edges
            .get_mut(id)
            .ok_or_else(|| CanvasError::UnknownEdge(id.clone()))?;
        edge.data = data.clone();
        if let Some(source) = source {
            edge.source = source.clone();
        }
        if let Some(target) = target {
            edge.target = target.clone();
        }
        Ok(())
    }

    fn remove_edge(&mut self, id: &Id) -> Result<(), CanvasError> {
        self.record(CanvasCall::RemoveEdge { id: id.clone() })?;
        self.edges
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::UnknownEdge(id.clone()))
    }

    fn clear(&mut self) -> Result<(), CanvasError> {
        self.record(CanvasCall::Clear)?;
        self.nodes.clear();
        self.edges.clear();
        self.drawing_from = None;
        Ok(())
    }

    fn layout(&mut self) -> Result<(), CanvasError> {
        self.record(CanvasCall::Layout)?;
        // Spread nodes on a grid; enough for tests and the CLI trace.
        for (i, node) in self.nodes.values_mut().enumerate() {
            if !node.pinned {
                node.position = Position::new((i % 4) as f64 * 150.0, (i / 4) as f64 * 120.0);
            }
        }
        Ok(())
    }

    fn start_edge_drawing(&mut self, source: &Id) -> Result<(), CanvasError> {
        self.record(CanvasCall::StartEdgeDrawing {
            source: source.clone(),
        })?;
        self.require_node(source)?;
        self.drawing_from = Some(source.clone());
        Ok(())
    }

    fn node_position(&self, id: &Id) -> Option<Position> {
        self.nodes.get(id).map(|n| n.position)
    }
}
