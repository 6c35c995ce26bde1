//! Model mutation operations.
//!
//! Every edit is expressed as a [`ModelCommand`]. [`apply`] performs it in
//! place on a [`Model`]; [`reduce`] is the pure `(model, command) -> model`
//! form used by the store. [`ModelHistory`] keeps undo/redo snapshots.
//!
//! Renaming or removing a symbol rewrites every flow equation that refers to
//! it; removing a compartment also deletes the flows attached to it.

use crate::equation::{mark_removed, rename_symbol};
use crate::error::{ModelError, ModelResult};
use crate::model::{Compartment, Constant, EntityKind, Flow, Id, Intervention, Model, Named};

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

/// A single edit of a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCommand {
    AddCompartment(Compartment),
    UpdateCompartment(Compartment),
    RemoveCompartment(Id),
    AddConstant(Constant),
    UpdateConstant(Constant),
    RemoveConstant(Id),
    AddIntervention(Intervention),
    UpdateIntervention(Intervention),
    RemoveIntervention(Id),
    AddFlow(Flow),
    UpdateFlow(Flow),
    RemoveFlow(Id),
    /// Empty compartments, interventions and flows, and constants too unless
    /// `keep_constants` is set.
    Clear { keep_constants: bool },
    /// Swap in a whole new model (import, undo-like replacement).
    Replace(Model),
}

/// Apply `cmd` to `model` in place. On error the model is unchanged.
pub fn apply(model: &mut Model, cmd: ModelCommand) -> ModelResult<()> {
    match cmd {
        ModelCommand::AddCompartment(c) => {
            check_compartment_value(&c)?;
            ensure_new_id(model, &c.id, EntityKind::Compartment)?;
            model.compartments.push(c);
        }
        ModelCommand::UpdateCompartment(c) => {
            check_compartment_value(&c)?;
            let old_name = replace_named(&mut model.compartments, c)?;
            propagate_rename(model, &old_name.0, &old_name.1);
        }
        ModelCommand::RemoveCompartment(id) => {
            let removed = remove_named(&mut model.compartments, &id)?;
            model.flows.retain(|f| !f.touches(&id));
            propagate_removal(model, removed.name());
        }
        ModelCommand::AddConstant(c) => {
            ensure_new_id(model, &c.id, EntityKind::Constant)?;
            model.constants.push(c);
        }
        ModelCommand::UpdateConstant(c) => {
            let (old, new) = replace_named(&mut model.constants, c)?;
            propagate_rename(model, &old, &new);
        }
        ModelCommand::RemoveConstant(id) => {
            let removed = remove_named(&mut model.constants, &id)?;
            propagate_removal(model, removed.name());
        }
        ModelCommand::AddIntervention(i) => {
            ensure_new_id(model, &i.id, EntityKind::Intervention)?;
            model.interventions.push(i);
        }
        ModelCommand::UpdateIntervention(i) => {
            let (old, new) = replace_named(&mut model.interventions, i)?;
            propagate_rename(model, &old, &new);
        }
        ModelCommand::RemoveIntervention(id) => {
            let removed = remove_named(&mut model.interventions, &id)?;
            propagate_removal(model, removed.name());
        }
        ModelCommand::AddFlow(f) => {
            ensure_new_id(model, &f.id, EntityKind::Flow)?;
            model.flows.push(f);
        }
        ModelCommand::UpdateFlow(f) => {
            let idx = index_of(&model.flows, &f.id, EntityKind::Flow)?;
            model.flows[idx] = f;
        }
        ModelCommand::RemoveFlow(id) => {
            let idx = index_of(&model.flows, &id, EntityKind::Flow)?;
            model.flows.remove(idx);
        }
        ModelCommand::Clear { keep_constants } => {
            model.compartments.clear();
            model.interventions.clear();
            model.flows.clear();
            if !keep_constants {
                model.constants.clear();
            }
        }
        ModelCommand::Replace(new_model) => *model = new_model,
    }
    Ok(())
}

/// Pure form of [`apply`]: returns the edited copy, leaving `model` alone.
pub fn reduce(model: &Model, cmd: ModelCommand) -> ModelResult<Model> {
    let mut next = model.clone();
    apply(&mut next, cmd)?;
    Ok(next)
}

fn check_compartment_value(c: &Compartment) -> ModelResult<()> {
    if c.value.is_finite() && c.value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidValue {
            kind: EntityKind::Compartment,
            id: c.id.clone(),
            value: c.value,
        })
    }
}

fn ensure_new_id(model: &Model, id: &Id, kind: EntityKind) -> ModelResult<()> {
    if model.contains_id(id) {
        Err(ModelError::DuplicateId {
            kind,
            id: id.clone(),
        })
    } else {
        Ok(())
    }
}

fn index_of<T: crate::diff::Keyed>(items: &[T], id: &Id, kind: EntityKind) -> ModelResult<usize> {
    items
        .iter()
        .position(|item| item.key() == id)
        .ok_or_else(|| ModelError::NotFound {
            kind,
            id: id.clone(),
        })
}

/// Replace the entity with the same id, returning `(old_name, new_name)`.
fn replace_named<T: Named>(items: &mut [T], new: T) -> ModelResult<(String, String)> {
    let idx = index_of(items, new.key(), T::KIND)?;
    let names = (items[idx].name().to_string(), new.name().to_string());
    items[idx] = new;
    Ok(names)
}

fn remove_named<T: Named>(items: &mut Vec<T>, id: &Id) -> ModelResult<T> {
    let idx = index_of(items, id, T::KIND)?;
    Ok(items.remove(idx))
}

fn propagate_rename(model: &mut Model, old: &str, new: &str) {
    if old == new {
        return;
    }
    for flow in &mut model.flows {
        flow.equation = rename_symbol(&flow.equation, old, new);
    }
}

fn propagate_removal(model: &mut Model, removed: &str) {
    for flow in &mut model.flows {
        flow.equation = mark_removed(&flow.equation, removed);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// History (undo / redo)
// ────────────────────────────────────────────────────────────────────────────

/// Undo/redo history of whole-model snapshots.
///
/// # Example
///
/// ```rust,ignore
/// let mut history = ModelHistory::new(100);
/// history.record(model.clone());       // state before an edit
/// let previous = history.undo(current); // hands back the snapshot
/// ```
#[derive(Debug, Clone)]
pub struct ModelHistory {
    undo_stack: Vec<Model>,
    redo_stack: Vec<Model>,
    max_size: usize,
}

impl ModelHistory {
    /// Create a new history with the given maximum undo depth.
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Record the state that existed before an edit, clearing the redo stack.
    pub fn record(&mut self, before: Model) {
        if self.max_size == 0 {
            return;
        }
        self.undo_stack.push(before);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Step back: `current` goes onto the redo stack and the previous
    /// snapshot is returned.
    pub fn undo(&mut self, current: Model) -> Option<Model> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: Model) -> Option<Model> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sir() -> Model {
        Model {
            compartments: vec![
                Compartment::new("1", "S", 99.0),
                Compartment::new("2", "I", 1.0),
                Compartment::new("3", "R", 0.0),
            ],
            constants: vec![
                Constant::new("k1", "beta", 0.3),
                Constant::new("k2", "gamma", 0.1),
            ],
            interventions: vec![Intervention::new("u1", "u")],
            flows: vec![
                Flow::new("f1", "1", "2", "beta*S*I*(1-u)"),
                Flow::new("f2", "2", "3", "gamma*I"),
            ],
        }
    }

    #[test]
    fn test_rename_compartment_rewrites_equations() {
        let mut model = sir();
        apply(
            &mut model,
            ModelCommand::UpdateCompartment(Compartment::new("1", "Susceptible", 99.0)),
        )
        .unwrap();
        let f1 = model.flow(&Id::from("f1")).unwrap();
        assert_eq!(f1.equation, "beta*Susceptible*I*(1-u)");
        assert_eq!(f1.source, Id::from("1"));
        assert_eq!(f1.target, Id::from("2"));
    }

    #[test]
    fn test_remove_compartment_cascades_and_marks() {
        let mut model = sir();
        model.flows.push(Flow::new("f3", "3", "1", "0.01*R + 0*I"));
        apply(&mut model, ModelCommand::RemoveCompartment(Id::from("2"))).unwrap();
        assert_eq!(model.compartments.len(), 2);
        let ids: Vec<&str> = model.flows.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f3"]);
        assert_eq!(model.flows[0].equation, "0.01*R + 0*__removed__");
    }

    #[test]
    fn test_remove_constant_marks_equations() {
        let mut model = sir();
        apply(&mut model, ModelCommand::RemoveConstant(Id::from("k2"))).unwrap();
        assert_eq!(model.flows[1].equation, "__removed__*I");
        assert_eq!(model.flows.len(), 2);
    }

    #[test]
    fn test_rename_intervention() {
        let mut model = sir();
        apply(
            &mut model,
            ModelCommand::UpdateIntervention(Intervention::new("u1", "vacc")),
        )
        .unwrap();
        assert_eq!(model.flows[0].equation, "beta*S*I*(1-vacc)");
    }

    #[test]
    fn test_unknown_id_fails_loudly() {
        let mut model = sir();
        let before = model.clone();
        let err = apply(
            &mut model,
            ModelCommand::UpdateConstant(Constant::new("nope", "x", 1.0)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::NotFound {
                kind: EntityKind::Constant,
                id: Id::from("nope")
            }
        );
        assert!(apply(&mut model, ModelCommand::RemoveFlow(Id::from("f9"))).is_err());
        assert!(apply(&mut model, ModelCommand::RemoveCompartment(Id::from("9"))).is_err());
        assert_eq!(model, before);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut model = sir();
        let err = apply(
            &mut model,
            ModelCommand::AddConstant(Constant::new("f1", "delta", 1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateId { .. }));
    }

    #[test]
    fn test_negative_initial_value_rejected() {
        let mut model = sir();
        let err = apply(
            &mut model,
            ModelCommand::AddCompartment(Compartment::new("9", "D", -1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidValue { .. }));
    }

    #[test]
    fn test_clear_keep_constants() {
        let mut model = sir();
        apply(&mut model, ModelCommand::Clear { keep_constants: true }).unwrap();
        assert!(model.compartments.is_empty());
        assert!(model.flows.is_empty());
        assert!(model.interventions.is_empty());
        assert_eq!(model.constants.len(), 2);

        apply(&mut model, ModelCommand::Clear { keep_constants: false }).unwrap();
        assert_eq!(model, Model::default());
    }

    #[test]
    fn test_reduce_leaves_input_untouched() {
        let model = sir();
        let next = reduce(&model, ModelCommand::RemoveFlow(Id::from("f2"))).unwrap();
        assert_eq!(model.flows.len(), 2);
        assert_eq!(next.flows.len(), 1);
    }

    #[test]
    fn test_history_undo_redo() {
        let mut history = ModelHistory::new(10);
        let a = sir();
        let b = reduce(&a, ModelCommand::RemoveFlow(Id::from("f2"))).unwrap();
        history.record(a.clone());
        assert!(history.can_undo());
        let back = history.undo(b.clone()).unwrap();
        assert_eq!(back, a);
        assert!(history.can_redo());
        let forward = history.redo(back).unwrap();
        assert_eq!(forward, b);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_max_size() {
        let mut history = ModelHistory::new(2);
        for _ in 0..5 {
            history.record(Model::default());
        }
        assert!(history.undo(Model::default()).is_some());
        assert!(history.undo(Model::default()).is_some());
        assert!(history.undo(Model::default()).is_none());
    }
}
