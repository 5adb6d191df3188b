use std::sync::Arc;

use parking_lot::Mutex;

/// Client-side router
pub trait Navigator: Send + Sync {
    fn go_to(&self, path: &str);
}

/// Navigator that only records the visited paths
#[derive(Clone, Default)]
pub struct HistoryNavigator {
    entries: Arc<Mutex<Vec<String>>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn current(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    /// How many times `path` was navigated to
    pub fn visits(&self, path: &str) -> usize {
        self.entries.lock().iter().filter(|p| *p == path).count()
    }
}

impl Navigator for HistoryNavigator {
    fn go_to(&self, path: &str) {
        self.entries.lock().push(path.to_string());
    }
}
