//! Wires watchable providers to the reload path

use crate::core::{ConfigInner, ConfigResult, Source};
use crate::watchers::{WatchCallback, WatchNotification};
use futures::FutureExt;
use std::sync::{Arc, Weak};

/// Activates watches and turns their notifications into reloads
///
/// Each notification is handled independently:
/// - a change triggers a full reload; success fires `on_config_changed`,
///   failure fires `on_reload_error` and keeps the previous snapshot;
/// - an error fires `on_reload_error` and does not reload.
///
/// Reloads from different providers may be triggered concurrently; they are
/// serialized by the load lock.
pub(crate) struct WatchOrchestrator {
    inner: Weak<ConfigInner>,
}

impl WatchOrchestrator {
    pub(crate) fn new(inner: &Arc<ConfigInner>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
        }
    }

    /// Call `watch()` once on every watchable provider, in source order
    ///
    /// Stops at the first failure, closes the providers armed so far and
    /// returns the error.
    pub(crate) async fn activate(&self) -> ConfigResult<usize> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(0);
        };

        let mut armed = Vec::new();
        for source in &inner.sources {
            let Some(watchable) = source.provider().as_watchable() else {
                continue;
            };

            let provider = source.name();
            if let Err(e) = watchable.watch(self.handler(provider.clone())).await {
                strata_log::error!(provider = %provider, error = %e, "failed to activate watch");
                for source in armed {
                    close_quietly(source).await;
                }
                return Err(e);
            }

            strata_log::debug!(provider = %provider, "watch activated");
            armed.push(source);
        }

        strata_log::info!(watched = armed.len(), "configuration watches active");
        Ok(armed.len())
    }

    fn handler(&self, provider: String) -> WatchCallback {
        let inner = self.inner.clone();
        Arc::new(move |notification: WatchNotification| {
            let inner = inner.clone();
            let provider = provider.clone();
            async move { handle(inner, &provider, notification).await }.boxed()
        })
    }
}

async fn handle(inner: Weak<ConfigInner>, provider: &str, notification: WatchNotification) {
    let Some(inner) = inner.upgrade() else {
        strata_log::debug!(provider = %provider, "configuration dropped, ignoring notification");
        return;
    };

    match notification {
        Err(e) => {
            strata_log::warn!(provider = %provider, error = %e, "watch reported an error");
            (inner.on_reload_error)(&e);
        }
        Ok(event) => {
            strata_log::debug!(provider = %provider, kind = ?event.kind, "change detected, reloading");
            match inner.load().await {
                Ok(_) => (inner.on_config_changed)(),
                Err(e) => {
                    strata_log::warn!(
                        provider = %provider,
                        error = %e,
                        "reload failed, keeping previous configuration"
                    );
                    (inner.on_reload_error)(&e);
                }
            }
        }
    }
}

async fn close_quietly(source: &Source) {
    if let Err(e) = source.provider().close().await {
        strata_log::debug!(
            provider = %source.name(),
            error = %e,
            "failed to close provider after activation error"
        );
    }
}
