use std::collections::HashSet;

use crate::model::{ItemId, ListItem};

/// Ids with a mutation in flight. Membership gates re-entry and disables the
/// row's controls in the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSet {
    ids: HashSet<ItemId>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns `false` if the id was already pending.
    pub fn insert(&mut self, id: ItemId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        self.ids.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pending ids in ascending order.
    pub fn sorted(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// One item as it was before a speculative change, together with where it sat.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot<T> {
    pub index: usize,
    pub item: T,
}

/// What a failed mutation restores.
#[derive(Debug, Clone, PartialEq)]
pub enum Rollback<T> {
    Item(ItemSnapshot<T>),
    Full(Vec<T>),
}

/// Ordered list of records. Order is display order and survives rollback.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    items: Vec<T>,
    pending: PendingSet,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending: PendingSet::new(),
        }
    }
}

impl<T: ListItem> CollectionState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items,
            pending: PendingSet::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingSet {
        &mut self.pending
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Replaces the list after a fetch. In-flight ids stay pending.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Appends a record, or replaces it in place if the id is already listed.
    pub fn upsert(&mut self, item: T) {
        match self.position(item.id()) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    pub fn remove(&mut self, id: ItemId) -> Option<ItemSnapshot<T>> {
        let index = self.position(id)?;
        let item = self.items.remove(index);
        Some(ItemSnapshot { index, item })
    }

    /// Applies `patch` to the item with `id`. Returns `false` if it is not listed.
    pub fn update<F>(&mut self, id: ItemId, patch: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.get_mut(id) {
            Some(item) => {
                patch(item);
                true
            }
            None => false,
        }
    }

    pub fn snapshot_item(&self, id: ItemId) -> Option<ItemSnapshot<T>> {
        let index = self.position(id)?;
        Some(ItemSnapshot {
            index,
            item: self.items[index].clone(),
        })
    }

    pub fn snapshot_all(&self) -> Vec<T> {
        self.items.clone()
    }

    /// Puts a single item back. If the id is still listed its fields are
    /// overwritten in place, otherwise it is reinserted at its old index,
    /// clamped to the current length.
    pub fn restore_item(&mut self, snapshot: ItemSnapshot<T>) {
        let ItemSnapshot { index, item } = snapshot;
        match self.position(item.id()) {
            Some(current) => self.items[current] = item,
            None => {
                let index = index.min(self.items.len());
                self.items.insert(index, item);
            }
        }
    }

    pub fn rollback(&mut self, rollback: Rollback<T>) {
        match rollback {
            Rollback::Item(snapshot) => self.restore_item(snapshot),
            Rollback::Full(items) => self.items = items,
        }
    }
}
