//! Notifications queued for a renderer
//!
//! Listener closures only record what happened and ask the host for a frame.
//! The renderer applies the queued events at the start of its next tick or
//! draw, when it has the world at hand.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::world::{BlocksetEvent, WorldEvent};

/// Anything a renderer listens to
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    World(WorldEvent),
    Blockset(BlocksetEvent),
    /// The render distance setting moved to this value
    RenderDistanceChanged(f32),
    /// A debug overlay toggle changed
    DebugToggled(bool),
}

/// Shared queue between listener closures and their renderer
#[derive(Clone, Default)]
pub struct Inbox {
    queue: Rc<RefCell<VecDeque<RenderEvent>>>,
    redraw: Option<Rc<dyn Fn()>>,
}

impl Inbox {
    /// Create an inbox that calls `redraw` after each delivered event
    pub fn new(redraw: Rc<dyn Fn()>) -> Self {
        Self {
            queue: Rc::default(),
            redraw: Some(redraw),
        }
    }

    pub fn push(&self, event: RenderEvent) {
        self.queue.borrow_mut().push_back(event);
        if let Some(redraw) = &self.redraw {
            redraw();
        }
    }

    /// Take every queued event, oldest first
    pub fn take_all(&self) -> Vec<RenderEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox").field("queued", &self.len()).finish()
    }
}
