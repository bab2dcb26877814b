use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::transport::OscArg;

/// Callback invoked with the concrete inbound address and its arguments.
pub type Handler = Box<dyn FnMut(&str, &[OscArg]) + Send>;

/// Dispatch table shared between a transport and the query correlator.
///
/// Handlers are keyed by OSC address pattern. A `*` matches any run of
/// characters inside one path segment and `?` matches exactly one.
///
/// Handlers run outside the table lock, so a handler may register or
/// unregister handlers on the same dispatcher.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<String, Arc<Mutex<Handler>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`, replacing any previous handler.
    pub fn register_handler(&self, pattern: impl Into<String>, handler: Handler) {
        self.handlers
            .lock()
            .insert(pattern.into(), Arc::new(Mutex::new(handler)));
    }

    /// Returns true if a handler was removed.
    pub fn unregister_handler(&self, pattern: &str) -> bool {
        self.handlers.lock().remove(pattern).is_some()
    }

    pub fn has_handler(&self, pattern: &str) -> bool {
        self.handlers.lock().contains_key(pattern)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Deliver an inbound message to every handler whose pattern matches.
    /// Returns false when nothing was listening.
    pub fn dispatch(&self, address: &str, args: &[OscArg]) -> bool {
        let matching: Vec<Arc<Mutex<Handler>>> = self
            .handlers
            .lock()
            .iter()
            .filter(|(pattern, _)| address_matches(pattern, address))
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let delivered = !matching.is_empty();
        for handler in matching {
            let mut handler = handler.lock();
            (*handler)(address, args);
        }

        if !delivered {
            log::debug!("No handler for inbound message {}", address);
        }
        delivered
    }
}

/// Match a concrete OSC address against a pattern segment by segment.
pub fn address_matches(pattern: &str, address: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let address_parts: Vec<&str> = address.split('/').collect();

    pattern_parts.len() == address_parts.len()
        && pattern_parts
            .iter()
            .zip(address_parts.iter())
            .all(|(p, a)| segment_matches(p.as_bytes(), a.as_bytes()))
}

fn segment_matches(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_text = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            star_text = t;
            p += 1;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            star_text += 1;
            t = star_text;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
