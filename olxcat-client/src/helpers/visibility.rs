use std::sync::Arc;
use tokio::sync::watch;

/// Host visibility flag (foreground / backgrounded) with change notification.
///
/// A terminal host is always visible; an embedding host flips it from its own
/// platform events.
#[derive(Clone)]
pub struct PageVisibility {
    visible: Arc<watch::Sender<bool>>,
}

impl Default for PageVisibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PageVisibility {
    pub fn new(visible: bool) -> Self {
        let (visible, _) = watch::channel(visible);
        Self {
            visible: Arc::new(visible),
        }
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.visible.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
        if changed {
            tracing::debug!(visible, "Visibility changed");
        }
    }

    pub fn changes(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }
}
