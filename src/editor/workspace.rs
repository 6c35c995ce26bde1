//! Several models open side by side. Exactly one workspace is active, and only
//! the active one is bound to the canvas.

use crate::error::WorkspaceError;

use super::store::ModelStore;

/// Stable identity of a workspace, unaffected by reordering or removal of
/// other workspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceId(u64);

#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    pub name: String,
    pub store: ModelStore,
}

impl Workspace {
    pub fn id(&self) -> WorkspaceId {
        self.id
    }
}

#[derive(Debug)]
pub struct Workspaces {
    items: Vec<Workspace>,
    active: usize,
    next_id: u64,
}

impl Workspaces {
    /// Start with a single, active workspace.
    pub fn new(name: impl Into<String>, store: ModelStore) -> Self {
        let mut ws = Self {
            items: Vec::new(),
            active: 0,
            next_id: 0,
        };
        ws.push(name, store);
        ws
    }

    /// Append a workspace (not activated). Returns its index.
    pub fn push(&mut self, name: impl Into<String>, store: ModelStore) -> usize {
        let id = WorkspaceId(self.next_id);
        self.next_id += 1;
        self.items.push(Workspace {
            id,
            name: name.into(),
            store,
        });
        self.items.len() - 1
    }

    /// Remove a workspace. The last remaining one cannot be removed. If the
    /// active workspace is removed, its successor (or the new last one)
    /// becomes active.
    pub fn remove(&mut self, index: usize) -> Result<Workspace, WorkspaceError> {
        if index >= self.items.len() {
            return Err(WorkspaceError::NoSuchWorkspace(index));
        }
        if self.items.len() == 1 {
            return Err(WorkspaceError::LastWorkspace);
        }
        let removed = self.items.remove(index);
        if index < self.active || self.active >= self.items.len() {
            self.active -= 1;
        }
        Ok(removed)
    }

    pub fn select(&mut self, index: usize) -> Result<(), WorkspaceError> {
        if index >= self.items.len() {
            return Err(WorkspaceError::NoSuchWorkspace(index));
        }
        self.active = index;
        Ok(())
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Workspace {
        &self.items[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Workspace {
        &mut self.items[self.active]
    }

    pub fn get(&self, index: usize) -> Option<&Workspace> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workspace> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> Workspaces {
        let mut ws = Workspaces::new("a", ModelStore::default());
        ws.push("b", ModelStore::default());
        ws.push("c", ModelStore::default());
        ws
    }

    #[test]
    fn test_select_and_names() {
        let mut ws = three();
        assert_eq!(ws.names(), vec!["a", "b", "c"]);
        ws.select(2).unwrap();
        assert_eq!(ws.active().name, "c");
        assert_eq!(ws.select(3), Err(WorkspaceError::NoSuchWorkspace(3)));
    }

    #[test]
    fn test_remove_before_active_keeps_it_active() {
        let mut ws = three();
        ws.select(2).unwrap();
        let active_id = ws.active().id();
        ws.remove(0).unwrap();
        assert_eq!(ws.active().id(), active_id);
        assert_eq!(ws.active_index(), 1);
    }

    #[test]
    fn test_remove_active_last_moves_back() {
        let mut ws = three();
        ws.select(2).unwrap();
        ws.remove(2).unwrap();
        assert_eq!(ws.active().name, "b");
    }

    #[test]
    fn test_remove_active_middle_activates_successor() {
        let mut ws = three();
        ws.select(1).unwrap();
        ws.remove(1).unwrap();
        assert_eq!(ws.active().name, "c");
    }

    #[test]
    fn test_cannot_remove_last() {
        let mut ws = Workspaces::new("only", ModelStore::default());
        assert!(matches!(ws.remove(0), Err(WorkspaceError::LastWorkspace)));
        assert!(matches!(ws.remove(5), Err(WorkspaceError::NoSuchWorkspace(5))));
    }
}
