//! Single-slot key listener registry.
//!
//! A view attaches one listener over its own state type `C`. Attaching
//! again replaces the previous listener, so a key press reaches at most
//! one handler, exactly once. `dispose` empties the slot.

/// Identifies an attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<C> = Box<dyn FnMut(&mut C, crate::navigation::Key) -> bool + Send>;

pub struct KeyBus<C> {
    slot: Option<(ListenerId, Listener<C>)>,
    next_id: u64,
}

impl<C> KeyBus<C> {
    pub fn new() -> Self {
        Self {
            slot: None,
            next_id: 0,
        }
    }

    /// Attach `listener`, detaching whatever was attached before.
    pub fn attach<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&mut C, crate::navigation::Key) -> bool + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        if let Some((old, _)) = self.slot.replace((id, Box::new(listener))) {
            tracing::debug!(old = old.0, new = id.0, "key listener replaced");
        }
        id
    }

    /// Detach `id` if it is still the attached listener.
    pub fn detach(&mut self, id: ListenerId) -> bool {
        match &self.slot {
            Some((current, _)) if *current == id => {
                self.slot = None;
                true
            }
            _ => false,
        }
    }

    /// Deliver `key` to the attached listener. Returns whether it was consumed.
    pub fn dispatch(&mut self, ctx: &mut C, key: crate::navigation::Key) -> bool {
        match &mut self.slot {
            Some((_, listener)) => listener(ctx, key),
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        usize::from(self.slot.is_some())
    }

    pub fn dispose(&mut self) {
        self.slot = None;
    }
}

impl<C> Default for KeyBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for KeyBus<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBus")
            .field("listener", &self.slot.as_ref().map(|(id, _)| id))
            .finish()
    }
}
