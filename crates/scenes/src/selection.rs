//! Selection state reused at every level of the scene tree.
//!
//! Holds a `current` item plus the set of `additional` items selected next to
//! it. Members are non-owning ids into the sibling sequence being selected
//! over. `current`, when set, is always a member of `additional`.
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet<T: Copy + Eq + Hash> {
    current: Option<T>,
    additional: HashSet<T>,
}

impl<T: Copy + Eq + Hash> Default for SelectionSet<T> {
    fn default() -> Self {
        Self {
            current: None,
            additional: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> SelectionSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection holding exactly one item, which is also current
    pub fn single(item: T) -> Self {
        let mut selection = Self::new();
        selection.select_only(item);
        selection
    }

    /// Build from parts; `current` is added to `additional` when missing
    pub fn from_parts(current: Option<T>, additional: impl IntoIterator<Item = T>) -> Self {
        let mut additional: HashSet<T> = additional.into_iter().collect();
        if let Some(item) = current {
            additional.insert(item);
        }
        Self {
            current,
            additional,
        }
    }

    pub fn current(&self) -> Option<T> {
        self.current
    }

    pub fn additional(&self) -> &HashSet<T> {
        &self.additional
    }

    pub fn contains(&self, item: &T) -> bool {
        self.additional.contains(item)
    }

    pub fn is_current(&self, item: &T) -> bool {
        self.current.as_ref() == Some(item)
    }

    pub fn len(&self) -> usize {
        self.additional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.additional.is_empty()
    }

    /// Replace the whole selection with a single current item
    pub fn select_only(&mut self, item: T) {
        self.additional.clear();
        self.additional.insert(item);
        self.current = Some(item);
    }

    /// Change the current item, keeping the rest of the selection
    pub fn set_current(&mut self, item: Option<T>) {
        if let Some(item) = item {
            self.additional.insert(item);
        }
        self.current = item;
    }

    /// Extend the selection (Shift-click)
    pub fn insert(&mut self, item: T) {
        self.additional.insert(item);
    }

    /// Drop an item; a removed current item leaves no current item behind
    pub fn remove(&mut self, item: &T) -> bool {
        if self.current.as_ref() == Some(item) {
            self.current = None;
        }
        self.additional.remove(item)
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.additional.clear();
    }

    /// Drop every member that is not part of `container`
    pub fn retain_within<'a, I>(&mut self, container: I)
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let present: HashSet<T> = container.into_iter().copied().collect();
        self.additional.retain(|item| present.contains(item));
        if let Some(current) = self.current {
            if !present.contains(&current) {
                self.current = None;
            }
        }
    }

    /// True when `current ∈ additional` and `additional ⊆ container`
    pub fn is_consistent_with<'a, I>(&self, container: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let present: HashSet<T> = container.into_iter().copied().collect();
        let current_ok = match self.current {
            Some(current) => self.additional.contains(&current),
            None => true,
        };
        current_ok && self.additional.iter().all(|item| present.contains(item))
    }

    /// Selected members in container order
    pub fn ordered<'a, I>(&self, container: I) -> Vec<T>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        container
            .into_iter()
            .filter(|item| self.additional.contains(item))
            .copied()
            .collect()
    }

    /// Position of the current item within `container`
    pub fn current_index<'a, I>(&self, container: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let current = self.current?;
        container.into_iter().position(|item| *item == current)
    }
}
