//! Event bus test suites


use crate::notifications::api::{Event, HandlerResult};
use std::sync::{Arc, Mutex};

/// Shared log that handlers append to, for asserting delivery order
#[derive(Clone, Default)]
pub(super) struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn handler(&self, label: &str) -> impl Fn(&Event) -> HandlerResult + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        let label = label.to_string();
        move |event: &Event| {
            entries
                .lock()
                .unwrap()
                .push(format!("{}:{}", label, event.name));
            Ok(())
        }
    }

    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}
