//! Full-screen detail view over an ordered list of records.

use lookup_client::PhotoRecord;
use tokio::sync::mpsc;

pub const DEFAULT_SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeAction {
    Previous,
    Next,
    None,
}

/// Horizontal drag from `start_x` to `end_x`. Dragging right past the
/// threshold goes back, dragging left goes forward.
pub fn classify_swipe(start_x: f32, end_x: f32, threshold: f32) -> SwipeAction {
    let displacement = end_x - start_x;
    if displacement > threshold {
        SwipeAction::Previous
    } else if displacement < -threshold {
        SwipeAction::Next
    } else {
        SwipeAction::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeEvent {
    Hide,
    Show,
}

/// Sending half of the chrome visibility channel.
#[derive(Debug, Clone)]
pub struct ChromeNotifier {
    tx: mpsc::UnboundedSender<ChromeEvent>,
}

impl ChromeNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChromeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChromeNotifier { tx }, rx)
    }

    pub fn notify(&self, event: ChromeEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!(?event, "chrome listener gone");
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailNavigator {
    list: Vec<PhotoRecord>,
    focused: usize,
    swipe_threshold: f32,
}

impl DetailNavigator {
    /// Opens on `id`. `None` when `id` is not part of `list`.
    pub fn open(list: Vec<PhotoRecord>, id: &str) -> Option<Self> {
        let focused = list.iter().position(|r| r.id == id)?;
        Some(DetailNavigator {
            list,
            focused,
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
        })
    }

    pub fn with_swipe_threshold(mut self, threshold: f32) -> Self {
        self.swipe_threshold = threshold;
        self
    }

    pub fn focused(&self) -> &PhotoRecord {
        &self.list[self.focused]
    }

    pub fn focused_index(&self) -> usize {
        self.focused
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// One-based counter, e.g. "3 of 12".
    pub fn position(&self) -> String {
        format!("{} of {}", self.focused + 1, self.list.len())
    }

    pub fn has_next(&self) -> bool {
        self.focused + 1 < self.list.len()
    }

    pub fn has_previous(&self) -> bool {
        self.focused > 0
    }

    /// Returns whether focus moved.
    pub fn next(&mut self) -> bool {
        if self.has_next() {
            self.focused += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.has_previous() {
            self.focused -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_to(&mut self, id: &str) -> bool {
        match self.list.iter().position(|r| r.id == id) {
            Some(idx) => {
                self.focused = idx;
                true
            }
            None => false,
        }
    }

    pub fn swipe(&mut self, start_x: f32, end_x: f32) -> SwipeAction {
        let action = classify_swipe(start_x, end_x, self.swipe_threshold);
        match action {
            SwipeAction::Previous => {
                self.previous();
            }
            SwipeAction::Next => {
                self.next();
            }
            SwipeAction::None => {}
        }
        action
    }

    /// Swaps in a new list. Focus stays on the same id if it survived,
    /// otherwise it clamps to the old index. `None` when the list is empty.
    pub fn refresh(self, list: Vec<PhotoRecord>) -> Option<Self> {
        if list.is_empty() {
            return None;
        }
        let current = &self.list[self.focused].id;
        let focused = list
            .iter()
            .position(|r| &r.id == current)
            .unwrap_or_else(|| self.focused.min(list.len() - 1));
        Some(DetailNavigator {
            list,
            focused,
            swipe_threshold: self.swipe_threshold,
        })
    }
}
