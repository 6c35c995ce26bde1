//! The canonical model of one workspace.
//!
//! [`ModelStore`] owns a [`Model`], applies [`ModelCommand`]s to it, keeps
//! undo history and tells its observers about every change with a
//! [`ModelChanged`] message. Read accessors hand out copies.

use crate::error::ModelResult;
use crate::model::{Compartment, Constant, Flow, Id, Intervention, Model};

use super::operations::{ModelCommand, ModelHistory, reduce};

/// Sent to observers after every successful change.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChanged {
    pub old: Model,
    pub new: Model,
}

/// Handle returned by [`ModelStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&ModelChanged)>;

pub struct ModelStore {
    model: Model,
    history: ModelHistory,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("model", &self.model)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(Model::default(), 100)
    }
}

impl ModelStore {
    pub fn new(model: Model, history_depth: usize) -> Self {
        Self {
            model,
            history: ModelHistory::new(history_depth),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    // ── observers ──────────────────────────────────────────────────────────

    /// Register `observer`; it is called after every change, in subscription
    /// order.
    pub fn subscribe(&mut self, observer: impl FnMut(&ModelChanged) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    // ── reads ──────────────────────────────────────────────────────────────

    /// A copy of the whole model.
    pub fn model(&self) -> Model {
        self.model.clone()
    }

    /// Borrow the model without copying.
    pub fn view(&self) -> &Model {
        &self.model
    }

    pub fn compartments(&self) -> Vec<Compartment> {
        self.model.compartments.clone()
    }

    pub fn constants(&self) -> Vec<Constant> {
        self.model.constants.clone()
    }

    pub fn interventions(&self) -> Vec<Intervention> {
        self.model.interventions.clone()
    }

    pub fn flows(&self) -> Vec<Flow> {
        self.model.flows.clone()
    }

    pub fn compartment(&self, id: &Id) -> Option<Compartment> {
        self.model.compartment(id).cloned()
    }

    pub fn constant(&self, id: &Id) -> Option<Constant> {
        self.model.constant(id).cloned()
    }

    pub fn intervention(&self, id: &Id) -> Option<Intervention> {
        self.model.intervention(id).cloned()
    }

    pub fn flow(&self, id: &Id) -> Option<Flow> {
        self.model.flow(id).cloned()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.model.symbols()
    }

    // ── mutations ──────────────────────────────────────────────────────────

    /// Apply `cmd`, record the previous state for undo and notify observers.
    pub fn dispatch(&mut self, cmd: ModelCommand) -> ModelResult<()> {
        let next = reduce(&self.model, cmd)?;
        if next == self.model {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.model, next);
        self.history.record(old.clone());
        self.notify(old);
        Ok(())
    }

    pub fn add_compartment(&mut self, c: Compartment) -> ModelResult<()> {
        self.dispatch(ModelCommand::AddCompartment(c))
    }

    /// Replace the compartment with the same id; a name change is propagated
    /// into flow equations.
    pub fn update_compartment(&mut self, c: Compartment) -> ModelResult<()> {
        self.dispatch(ModelCommand::UpdateCompartment(c))
    }

    /// Remove a compartment together with every flow starting or ending at it.
    pub fn remove_compartment(&mut self, id: &Id) -> ModelResult<()> {
        self.dispatch(ModelCommand::RemoveCompartment(id.clone()))
    }

    pub fn add_constant(&mut self, c: Constant) -> ModelResult<()> {
        self.dispatch(ModelCommand::AddConstant(c))
    }

    pub fn update_constant(&mut self, c: Constant) -> ModelResult<()> {
        self.dispatch(ModelCommand::UpdateConstant(c))
    }

    pub fn remove_constant(&mut self, id: &Id) -> ModelResult<()> {
        self.dispatch(ModelCommand::RemoveConstant(id.clone()))
    }

    pub fn add_intervention(&mut self, i: Intervention) -> ModelResult<()> {
        self.dispatch(ModelCommand::AddIntervention(i))
    }

    pub fn update_intervention(&mut self, i: Intervention) -> ModelResult<()> {
        self.dispatch(ModelCommand::UpdateIntervention(i))
    }

    pub fn remove_intervention(&mut self, id: &Id) -> ModelResult<()> {
        self.dispatch(ModelCommand::RemoveIntervention(id.clone()))
    }

    pub fn add_flow(&mut self, f: Flow) -> ModelResult<()> {
        self.dispatch(ModelCommand::AddFlow(f))
    }

    pub fn update_flow(&mut self, f: Flow) -> ModelResult<()> {
        self.dispatch(ModelCommand::UpdateFlow(f))
    }

    pub fn remove_flow(&mut self, id: &Id) -> ModelResult<()> {
        self.dispatch(ModelCommand::RemoveFlow(id.clone()))
    }

    pub fn clear(&mut self, keep_constants: bool) -> ModelResult<()> {
        self.dispatch(ModelCommand::Clear { keep_constants })
    }

    pub fn replace(&mut self, model: Model) -> ModelResult<()> {
        self.dispatch(ModelCommand::Replace(model))
    }

    // ── history ────────────────────────────────────────────────────────────

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Returns true if an undo was performed.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.model.clone()) {
            Some(previous) => {
                let old = std::mem::replace(&mut self.model, previous);
                self.notify(old);
                true
            }
            None => false,
        }
    }

    /// Returns true if a redo was performed.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.model.clone()) {
            Some(next) => {
                let old = std::mem::replace(&mut self.model, next);
                self.notify(old);
                true
            }
            None => false,
        }
    }

    fn notify(&mut self, old: Model) {
        if self.observers.is_empty() {
            return;
        }
        let change = ModelChanged {
            old,
            new: self.model.clone(),
        };
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }
}
