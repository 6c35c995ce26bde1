//! Canvas-only interaction state: the selected element and the progress of
//! an interactive edge drawing. None of this is ever written into the model.

use crate::canvas::ElementRef;
use crate::model::Id;

/// Where an interactive edge drawing currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EdgeDrawing {
    #[default]
    Idle,
    /// The user is dragging an edge out of `source`.
    Drawing { source: Id },
    /// The edge has been drawn and a create-flow request is waiting for the
    /// user to confirm or cancel. `provisional_edge` is shown on the canvas
    /// meanwhile.
    AwaitingConfirmation {
        source: Id,
        target: Id,
        provisional_edge: Id,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasSelection {
    selected: Option<ElementRef>,
    drawing: EdgeDrawing,
}

impl CanvasSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&ElementRef> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, element: ElementRef) {
        self.selected = Some(element);
    }

    /// Clear the selection if `element` is what is selected. An unselect for
    /// some other element (already replaced by a newer select) is ignored.
    pub fn unselect(&mut self, element: &ElementRef) {
        if self.selected.as_ref() == Some(element) {
            self.selected = None;
        }
    }

    /// Drop the selection if it refers to an element no longer shown.
    pub fn retain(&mut self, still_shown: impl Fn(&ElementRef) -> bool) {
        if self.selected.as_ref().is_some_and(|el| !still_shown(el)) {
            self.selected = None;
        }
    }

    pub fn drawing(&self) -> &EdgeDrawing {
        &self.drawing
    }

    pub fn begin_drawing(&mut self, source: Id) {
        self.drawing = EdgeDrawing::Drawing { source };
    }

    pub fn await_confirmation(&mut self, source: Id, target: Id, provisional_edge: Id) {
        self.drawing = EdgeDrawing::AwaitingConfirmation {
            source,
            target,
            provisional_edge,
        };
    }

    /// Leave drawing mode, returning the provisional edge if one was pending.
    pub fn finish_drawing(&mut self) -> Option<Id> {
        match std::mem::take(&mut self.drawing) {
            EdgeDrawing::AwaitingConfirmation {
                provisional_edge, ..
            } => Some(provisional_edge),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.drawing = EdgeDrawing::Idle;
    }
}
