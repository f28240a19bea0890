//! Which layer owns the keyboard: the grid or the single-image modal.

/// The input layer that currently receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Grid,
    Modal,
}

/// Tracks the modal index separately from the grid cursor.
///
/// While the modal is open, grid navigation is suspended; closing it
/// hands focus back to the grid cell that was selected when it opened.
#[derive(Debug, Clone, Default)]
pub struct ModalCoordinator {
    modal: Option<usize>,
    grid_focus: Option<usize>,
}

impl ModalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the modal on `index` of a `len`-record collection.
    pub fn open(&mut self, index: usize, len: usize) -> bool {
        if index >= len {
            return false;
        }
        self.modal = Some(index);
        self.grid_focus = Some(index);
        tracing::debug!(index, "modal opened");
        true
    }

    /// Close the modal, returning the grid cell to focus.
    pub fn close(&mut self) -> Option<usize> {
        self.modal.take()?;
        tracing::debug!(focus = ?self.grid_focus, "modal closed");
        self.grid_focus
    }

    pub fn next(&mut self, len: usize) -> Option<usize> {
        self.step(len, 1)
    }

    pub fn prev(&mut self, len: usize) -> Option<usize> {
        self.step(len, len.saturating_sub(1))
    }

    pub fn index(&self) -> Option<usize> {
        self.modal
    }

    pub fn is_open(&self) -> bool {
        self.modal.is_some()
    }

    pub fn live_layer(&self) -> Layer {
        if self.modal.is_some() {
            Layer::Modal
        } else {
            Layer::Grid
        }
    }

    /// Record the grid cursor so a later close restores it.
    pub fn set_grid_focus(&mut self, index: Option<usize>) {
        self.grid_focus = index;
    }

    pub fn grid_focus(&self) -> Option<usize> {
        self.grid_focus
    }

    fn step(&mut self, len: usize, by: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let current = self.modal.as_mut()?;
        *current = (*current % len + by) % len;
        Some(*current)
    }
}
