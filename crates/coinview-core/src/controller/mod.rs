//! # View-State Controllers
//!
//! Observable state for the presentation layer. Each controller owns a
//! `tokio::sync::watch` sender; every mutation goes through it and every
//! subscriber sees each publication.
//!
//! | Controller | State |
//! |------------|-------|
//! | [`AssetListController`] | cached + live asset list, search and favorites filter, icons |
//! | [`TimeSeriesController`] | exchange-rate history of one asset in the quote currency |

mod asset_list;
mod time_series;

use std::sync::Arc;

use coinview_warehouse::WarehouseError;
use tokio::sync::watch;

use crate::cache::AssetStore;

pub use asset_list::{AssetListController, AssetListState};
pub use time_series::{TimeSeriesController, TimeSeriesState, DEFAULT_WINDOW_DAYS};

/// Run a store operation on a blocking worker.
///
/// Failures are logged and reported as `None`; controllers never surface
/// storage errors to the view.
pub(crate) async fn run_store<T, F>(store: &Arc<dyn AssetStore>, operation: &'static str, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn AssetStore) -> Result<T, WarehouseError> + Send + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            tracing::warn!(operation, %error, "cache store operation failed");
            None
        }
        Err(error) => {
            tracing::warn!(operation, %error, "cache store worker did not complete");
            None
        }
    }
}

/// Loading flag held by one in-flight load.
///
/// Dropping an unfinished guard clears the flag, so a cancelled load does
/// not block later ones.
pub(crate) struct LoadingGuard<'a, T> {
    state: &'a watch::Sender<T>,
    flag: fn(&mut T) -> &mut bool,
    armed: bool,
}

impl<'a, T> LoadingGuard<'a, T> {
    /// Set the flag; `None` when it was already set.
    pub(crate) fn acquire(state: &'a watch::Sender<T>, flag: fn(&mut T) -> &mut bool) -> Option<Self> {
        let started = state.send_if_modified(|value| {
            let loading = flag(value);
            if *loading {
                return false;
            }
            *loading = true;
            true
        });

        started.then_some(Self {
            state,
            flag,
            armed: true,
        })
    }

    /// Publish the outcome and clear the flag in one update.
    pub(crate) fn finish(mut self, publish: impl FnOnce(&mut T)) {
        let flag = self.flag;
        self.state.send_modify(|value| {
            publish(value);
            *flag(value) = false;
        });
        self.armed = false;
    }
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let flag = self.flag;
        self.state.send_if_modified(|value| std::mem::replace(flag(value), false));
        tracing::debug!("load dropped before completion");
    }
}
