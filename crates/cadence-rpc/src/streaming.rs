//! Host-side routing of plugin notifications.
//!
//! Progress events are routed by token to registered callbacks. A caller
//! that does not know the token in advance registers a callback for its
//! request id instead; the first event stamped with that id binds its token
//! to the callback. Bindings are dropped automatically on the `end` event.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use cadence_plugin::{LogLevel, LogNotification, ProgressKind, ProgressNotification, ProgressToken};
use tracing::trace;

/// Receives progress events.
pub type ProgressCallback = Arc<dyn Fn(&ProgressNotification) + Send + Sync>;

/// Receives log lines streamed by a plugin.
pub type LogHandler = Arc<dyn Fn(&LogNotification) + Send + Sync>;

struct Binding {
    callback: ProgressCallback,
    request_id: Option<u64>,
}

/// Thread-safe token → callback routing table.
#[derive(Default)]
pub struct ProgressRegistry {
    tokens: RwLock<HashMap<ProgressToken, Binding>>,
    requests: RwLock<HashMap<u64, ProgressCallback>>,
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("tokens", &self.len())
            .finish_non_exhaustive()
    }
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes events carrying `token` to `callback`.
    pub fn register(&self, token: ProgressToken, callback: ProgressCallback) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                token,
                Binding {
                    callback,
                    request_id: None,
                },
            );
    }

    /// Stops routing `token`. Returns true if it was registered.
    pub fn unregister(&self, token: &ProgressToken) -> bool {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    /// Routes every session started by request `request_id` to `callback`.
    pub fn register_request(&self, request_id: u64, callback: ProgressCallback) {
        self.requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, callback);
    }

    /// Forgets request `request_id` and every token bound through it.
    pub fn unregister_request(&self, request_id: u64) {
        self.requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id);
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, binding| binding.request_id != Some(request_id));
    }

    /// Number of tokens currently routed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, event: &ProgressNotification) -> Option<ProgressCallback> {
        if let Some(binding) = self
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.progress_token)
        {
            return Some(binding.callback.clone());
        }

        let request_id = event.request_id?;
        let callback = self
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id)
            .cloned()?;
        if event.kind != ProgressKind::End {
            self.tokens
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    event.progress_token.clone(),
                    Binding {
                        callback: callback.clone(),
                        request_id: Some(request_id),
                    },
                );
        }
        Some(callback)
    }

    /// Delivers one event. Returns false if no callback wanted it.
    ///
    /// The callback runs outside the table lock.
    pub fn dispatch(&self, event: &ProgressNotification) -> bool {
        let Some(callback) = self.lookup(event) else {
            trace!(token = %event.progress_token, "no progress callback for token");
            return false;
        };
        callback(event);
        if event.kind == ProgressKind::End {
            self.unregister(&event.progress_token);
        }
        true
    }
}

/// Returns a handler forwarding plugin log lines to `tracing`.
#[must_use]
pub fn forward_to_tracing(plugin: impl Into<String>) -> LogHandler {
    let plugin = plugin.into();
    Arc::new(move |log: &LogNotification| match log.level {
        LogLevel::Debug => tracing::debug!(plugin = %plugin, "[plugin] {}", log.message),
        LogLevel::Info => tracing::info!(plugin = %plugin, "[plugin] {}", log.message),
        LogLevel::Warning => tracing::warn!(plugin = %plugin, "[plugin] {}", log.message),
        LogLevel::Error => tracing::error!(plugin = %plugin, "[plugin] {}", log.message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(token: &str, kind: ProgressKind, request_id: Option<u64>) -> ProgressNotification {
        ProgressNotification {
            progress_token: ProgressToken::new(token),
            kind,
            percentage: 0.0,
            message: String::new(),
            request_id,
        }
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |e: &ProgressNotification| {
            sink.lock().unwrap().push(e.progress_token.to_string());
        });
        (callback, seen)
    }

    #[test]
    fn test_routes_by_token() {
        let registry = ProgressRegistry::new();
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        registry.register(ProgressToken::new("a"), a);
        registry.register(ProgressToken::new("b"), b);

        assert!(registry.dispatch(&event("a", ProgressKind::Report, None)));
        assert!(registry.dispatch(&event("b", ProgressKind::Report, None)));
        assert!(registry.dispatch(&event("a", ProgressKind::Report, None)));

        assert_eq!(*seen_a.lock().unwrap(), vec!["a", "a"]);
        assert_eq!(*seen_b.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_unknown_token_is_ignored() {
        let registry = ProgressRegistry::new();
        assert!(!registry.dispatch(&event("ghost", ProgressKind::Begin, None)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_end_removes_binding() {
        let registry = ProgressRegistry::new();
        let (cb, seen) = recorder();
        registry.register(ProgressToken::new("t"), cb);

        assert!(registry.dispatch(&event("t", ProgressKind::End, None)));
        assert!(registry.is_empty());
        assert!(!registry.dispatch(&event("t", ProgressKind::Report, None)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_explicit_unregister() {
        let registry = ProgressRegistry::new();
        let (cb, _) = recorder();
        registry.register(ProgressToken::new("t"), cb);
        assert!(registry.unregister(&ProgressToken::new("t")));
        assert!(!registry.unregister(&ProgressToken::new("t")));
    }

    #[test]
    fn test_request_scope_binds_tokens() {
        let registry = ProgressRegistry::new();
        let (cb, seen) = recorder();
        registry.register_request(7, cb);

        assert!(registry.dispatch(&event("x", ProgressKind::Begin, Some(7))));
        assert!(registry.dispatch(&event("y", ProgressKind::Begin, Some(7))));
        assert_eq!(registry.len(), 2);
        assert!(!registry.dispatch(&event("z", ProgressKind::Begin, Some(8))));

        assert!(registry.dispatch(&event("x", ProgressKind::End, Some(7))));
        assert_eq!(registry.len(), 1);

        registry.unregister_request(7);
        assert!(registry.is_empty());
        assert!(!registry.dispatch(&event("w", ProgressKind::Begin, Some(7))));
        assert_eq!(*seen.lock().unwrap(), vec!["x", "y", "x"]);
    }

    #[test]
    fn test_concurrent_dispatch_and_registration() {
        let registry = Arc::new(ProgressRegistry::new());
        let (cb, seen) = recorder();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let cb = cb.clone();
                std::thread::spawn(move || {
                    let token = format!("t{i}");
                    registry.register(ProgressToken::new(&token), cb);
                    for _ in 0..10 {
                        registry.dispatch(&event(&token, ProgressKind::Report, None));
                    }
                    registry.dispatch(&event(&token, ProgressKind::End, None));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 8 * 11);
    }
}
