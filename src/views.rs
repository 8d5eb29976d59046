//! Ordered collection of live views. The front is the most recently focused
//! view; order drives both stacking and focus cycling.

use crate::view::{View, ViewId, ViewSurface};

#[derive(Debug)]
pub struct ViewCollection<S> {
    views: Vec<View<S>>,
}

impl<S> Default for ViewCollection<S> {
    fn default() -> Self {
        Self { views: Vec::new() }
    }
}

impl<S: ViewSurface> ViewCollection<S> {
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn insert_front(&mut self, view: View<S>) {
        self.views.insert(0, view);
    }

    pub fn remove(&mut self, id: ViewId) -> Option<View<S>> {
        let index = self.position(id)?;
        Some(self.views.remove(index))
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: ViewId) -> Option<&View<S>> {
        self.views.iter().find(|view| view.id() == id)
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut View<S>> {
        self.views.iter_mut().find(|view| view.id() == id)
    }

    pub fn find_by_surface(&self, surface: &S) -> Option<&View<S>> {
        self.views.iter().find(|view| view.raw_surface() == surface)
    }

    /// Moves `id` to the front. Returns `false` if it is not in the collection.
    pub fn raise(&mut self, id: ViewId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let view = self.views.remove(index);
        self.views.insert(0, view);
        true
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &View<S>> {
        self.views.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut View<S>> {
        self.views.iter_mut()
    }

    /// Mapped views on `workspace` in collection order.
    pub fn on_workspace(&self, workspace: usize) -> impl DoubleEndedIterator<Item = &View<S>> {
        self.views
            .iter()
            .filter(move |view| view.mapped && view.workspace == workspace)
    }

    /// The mapped view after `focused` on `workspace`, wrapping around. Without a
    /// focused candidate the first one is returned.
    pub fn next_in_workspace(&self, workspace: usize, focused: Option<ViewId>) -> Option<ViewId> {
        adjacent(self.on_workspace(workspace).map(View::id), focused)
    }

    pub fn prev_in_workspace(&self, workspace: usize, focused: Option<ViewId>) -> Option<ViewId> {
        adjacent(self.on_workspace(workspace).rev().map(View::id), focused)
    }

    fn position(&self, id: ViewId) -> Option<usize> {
        self.views.iter().position(|view| view.id() == id)
    }
}

fn adjacent(candidates: impl Iterator<Item = ViewId>, focused: Option<ViewId>) -> Option<ViewId> {
    let mut first = None;
    let mut found_focused = false;
    for id in candidates {
        if found_focused {
            return Some(id);
        }
        first.get_or_insert(id);
        if Some(id) == focused {
            found_focused = true;
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::view::{ViewKind, testing::TestSurface};

    fn collection(specs: &[(u64, usize, bool)]) -> ViewCollection<TestSurface> {
        let mut views = ViewCollection::default();
        for &(id, workspace, mapped) in specs.iter().rev() {
            let mut view = View::new(ViewId::new(id), ViewKind::Native, TestSurface::named("v"), workspace);
            view.mapped = mapped;
            views.insert_front(view);
        }
        views
    }

    #[test]
    fn next_wraps_around() {
        let views = collection(&[(1, 1, true), (2, 1, true), (3, 1, true)]);
        let (a, b, c) = (ViewId::new(1), ViewId::new(2), ViewId::new(3));
        assert_eq!(views.next_in_workspace(1, Some(b)), Some(c));
        assert_eq!(views.next_in_workspace(1, Some(c)), Some(a));
        assert_eq!(views.prev_in_workspace(1, Some(a)), Some(c));
        assert_eq!(views.prev_in_workspace(1, Some(b)), Some(a));
    }

    #[test]
    fn next_without_focus_returns_first_candidate() {
        let views = collection(&[(1, 2, true), (2, 1, false), (3, 1, true), (4, 1, true)]);
        assert_eq!(views.next_in_workspace(1, None), Some(ViewId::new(3)));
        assert_eq!(views.next_in_workspace(3, None), None);
        // A focused view on another workspace is not a candidate.
        assert_eq!(views.next_in_workspace(1, Some(ViewId::new(1))), Some(ViewId::new(3)));
    }

    #[test]
    fn raise_moves_to_front() {
        let mut views = collection(&[(1, 1, true), (2, 1, true), (3, 1, true)]);
        assert!(views.raise(ViewId::new(3)));
        let order: Vec<_> = views.iter().map(View::id).collect();
        assert_eq!(order, vec![ViewId::new(3), ViewId::new(1), ViewId::new(2)]);
        assert!(!views.raise(ViewId::new(9)));
    }
}
