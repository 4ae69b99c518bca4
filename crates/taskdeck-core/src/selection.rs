use uuid::Uuid;

/// Task ids checked for bulk action, in the order they were checked.
///
/// Ids may point at tasks hidden by the current filters; only deletion
/// removes them implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: Uuid) {
        if !self.remove(id) {
            self.ids.push(id);
        }
    }

    /// "Select all" when the sizes differ, "deselect all" when they match.
    pub fn select_all(&mut self, visible_ids: &[Uuid]) {
        if self.ids.len() == visible_ids.len() {
            self.ids.clear();
        } else {
            self.ids = visible_ids.to_vec();
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Returns whether `id` was selected.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.ids.len();
        self.ids.retain(|selected| *selected != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
