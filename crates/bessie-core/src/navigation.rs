//! Keyboard navigation over the loaded part of a collection.
//!
//! Two states: `Browsing` moves the cursor, `Zoomed` swallows every key
//! except unzoom. Moves wrap over the *loaded* length only, and forward
//! moves are held back while a fetch is in flight so the cursor never
//! runs into records that are still on their way.

/// Keys the browsing layer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    /// Zoom / unzoom toggle.
    Space,
    Escape,
    Enter,
    PageUp,
    PageDown,
    Char(char),
}

/// Everything the controller needs to decide on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavSnapshot {
    pub cursor: usize,
    /// Number of records currently loaded.
    pub len: usize,
    /// A fetch that would extend the collection is outstanding.
    pub loading: bool,
    pub enabled: bool,
}

impl NavSnapshot {
    pub fn new(cursor: usize, len: usize, loading: bool) -> Self {
        Self {
            cursor,
            len,
            loading,
            enabled: true,
        }
    }
}

/// Callbacks fired by [`NavigationController::handle`].
///
/// Indices passed to `on_prev` / `on_next` are the new cursor position.
pub trait NavigationHandler {
    fn on_prev(&mut self, index: usize);
    fn on_next(&mut self, index: usize);
    fn on_zoom(&mut self, index: usize);
    /// `index` is the grid position focused before zooming.
    fn on_unzoom(&mut self, index: usize);
}

/// Recorded callback, for handlers that act after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Prev(usize),
    Next(usize),
    Zoom(usize),
    Unzoom(usize),
}

impl NavigationHandler for Vec<NavAction> {
    fn on_prev(&mut self, index: usize) {
        self.push(NavAction::Prev(index));
    }

    fn on_next(&mut self, index: usize) {
        self.push(NavAction::Next(index));
    }

    fn on_zoom(&mut self, index: usize) {
        self.push(NavAction::Zoom(index));
    }

    fn on_unzoom(&mut self, index: usize) {
        self.push(NavAction::Unzoom(index));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Browsing,
    Zoomed { focus: usize },
}

#[derive(Debug, Clone)]
pub struct NavigationController {
    state: State,
    /// Grid width; enables Up/Down when set.
    columns: Option<usize>,
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            state: State::Browsing,
            columns: None,
        }
    }

    /// Controller for a grid `columns` wide.
    pub fn with_columns(columns: usize) -> Self {
        Self {
            state: State::Browsing,
            columns: Some(columns.max(1)),
        }
    }

    /// React to one key. Returns true if the key was consumed.
    pub fn handle<H: NavigationHandler>(
        &mut self,
        key: Key,
        snap: NavSnapshot,
        handler: &mut H,
    ) -> bool {
        if !snap.enabled || snap.len == 0 {
            return false;
        }

        match self.state {
            State::Zoomed { focus } => {
                if matches!(key, Key::Space | Key::Escape) {
                    self.state = State::Browsing;
                    handler.on_unzoom(focus);
                }
                // Everything else is swallowed while zoomed.
                true
            }
            State::Browsing => self.browse(key, snap, handler),
        }
    }

    pub fn is_zoomed(&self) -> bool {
        matches!(self.state, State::Zoomed { .. })
    }

    /// Leave the zoomed state without a key, returning the saved focus.
    pub fn unzoom(&mut self) -> Option<usize> {
        match std::mem::replace(&mut self.state, State::Browsing) {
            State::Zoomed { focus } => Some(focus),
            State::Browsing => None,
        }
    }

    pub fn columns(&self) -> Option<usize> {
        self.columns
    }

    fn browse<H: NavigationHandler>(&mut self, key: Key, snap: NavSnapshot, handler: &mut H) -> bool {
        let len = snap.len;
        let cursor = snap.cursor.min(len - 1);

        match key {
            Key::Left => {
                handler.on_prev((cursor + len - 1) % len);
                true
            }
            Key::Right => {
                if snap.loading {
                    tracing::debug!(cursor, "next held back while loading");
                    return true;
                }
                handler.on_next((cursor + 1) % len);
                true
            }
            Key::Up => match self.columns {
                Some(cols) => {
                    handler.on_prev((cursor + len - cols % len) % len);
                    true
                }
                None => false,
            },
            Key::Down => match self.columns {
                Some(_) if snap.loading => true,
                Some(cols) => {
                    handler.on_next((cursor + cols) % len);
                    true
                }
                None => false,
            },
            Key::Space => {
                self.state = State::Zoomed { focus: cursor };
                handler.on_zoom(cursor);
                true
            }
            _ => false,
        }
    }
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}
