//! Retained menu surface.
//!
//! `MenuSurface` is the menu toolkit the terminal UI renders: a tree of items
//! keyed by monotonically increasing ids. Unlike most tray toolkits it supports
//! real removal, so a torn-down menu leaves nothing behind.

use std::collections::BTreeMap;

use crate::menu::{ItemId, MenuBackend};

/// A single entry on the surface.
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub id: ItemId,
    pub title: String,
    pub tooltip: String,
    pub parent: Option<ItemId>,
    pub children: Vec<ItemId>,
    pub enabled: bool,
    pub hidden: bool,
    pub separator: bool,
}

#[derive(Debug, Default)]
pub struct MenuSurface {
    items: BTreeMap<ItemId, MenuItem>,
    roots: Vec<ItemId>,
    next_id: u64,
    title: String,
    tooltip: String,
}

impl MenuSurface {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn item(&self, id: ItemId) -> Option<&MenuItem> {
        self.items.get(&id)
    }

    /// Number of live items, hidden ones included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    pub fn visible_roots(&self) -> impl Iterator<Item = &MenuItem> {
        self.roots
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| !item.hidden)
    }

    pub fn visible_children(&self, id: ItemId) -> Vec<&MenuItem> {
        self.items
            .get(&id)
            .map(|item| {
                item.children
                    .iter()
                    .filter_map(|child| self.items.get(child))
                    .filter(|child| !child.hidden)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert(
        &mut self,
        parent: Option<ItemId>,
        title: &str,
        tooltip: &str,
        separator: bool,
    ) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.insert(
            id,
            MenuItem {
                id,
                title: title.to_string(),
                tooltip: tooltip.to_string(),
                parent,
                children: Vec::new(),
                enabled: !separator,
                hidden: false,
                separator,
            },
        );
        match parent.and_then(|parent| self.items.get_mut(&parent)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

impl MenuBackend for MenuSurface {
    fn add_item(&mut self, title: &str, tooltip: &str) -> ItemId {
        self.insert(None, title, tooltip, false)
    }

    fn add_sub_item(&mut self, parent: ItemId, title: &str, tooltip: &str) -> ItemId {
        self.insert(Some(parent), title, tooltip, false)
    }

    fn add_separator(&mut self) -> ItemId {
        self.insert(None, "", "", true)
    }

    fn disable(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.enabled = false;
        }
    }

    fn hide(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.hidden = true;
        }
    }

    fn remove(&mut self, id: ItemId) {
        let Some(item) = self.items.remove(&id) else {
            return;
        };
        match item.parent.and_then(|parent| self.items.get_mut(&parent)) {
            Some(parent) => parent.children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }
        let mut pending = item.children;
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.items.remove(&child) {
                pending.extend(removed.children);
            }
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_tooltip(&mut self, tooltip: &str) {
        self.tooltip = tooltip.to_string();
    }
}
