use time::{Duration, OffsetDateTime};
use tokio::sync::watch;

use crate::config::QUOTE_CURRENCY;
use crate::domain::{rate_range, TimeSeriesData};
use crate::network::NetworkClient;
use crate::reconcile::{Clock, SystemClock};

use super::LoadingGuard;

/// Length of the history window when none is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 100;

/// Exchange-rate history of one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesState {
    pub base_asset: String,
    pub quote_currency: &'static str,
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
    /// Chronological bars, one per day.
    pub series: Vec<TimeSeriesData>,
    pub is_loading: bool,
    pub is_offline: bool,
    pub last_error: Option<String>,
}

impl TimeSeriesState {
    /// Lowest low and highest high of the loaded series.
    pub fn rate_range(&self) -> Option<(f64, f64)> {
        rate_range(&self.series)
    }

    fn loading_flag(&mut self) -> &mut bool {
        &mut self.is_loading
    }
}

/// Owner of the history state for a selected asset.
pub struct TimeSeriesController {
    client: NetworkClient,
    state: watch::Sender<TimeSeriesState>,
}

impl TimeSeriesController {
    /// History of `base_asset` over the last [`DEFAULT_WINDOW_DAYS`] days.
    pub fn new(client: NetworkClient, base_asset: impl Into<String>) -> Self {
        Self::with_clock(client, base_asset, &SystemClock)
    }

    /// Like [`new`](Self::new) with the window ending at `clock.now()`.
    pub fn with_clock(client: NetworkClient, base_asset: impl Into<String>, clock: &dyn Clock) -> Self {
        let to = clock.now();
        let from = to - Duration::days(DEFAULT_WINDOW_DAYS);
        Self::with_window(client, base_asset, from, to)
    }

    pub fn with_window(
        client: NetworkClient,
        base_asset: impl Into<String>,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Self {
        let (state, _) = watch::channel(TimeSeriesState {
            base_asset: base_asset.into(),
            quote_currency: QUOTE_CURRENCY,
            from,
            to,
            series: Vec::new(),
            is_loading: false,
            is_offline: false,
            last_error: None,
        });
        Self { client, state }
    }

    pub fn snapshot(&self) -> TimeSeriesState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimeSeriesState> {
        self.state.subscribe()
    }

    pub fn rate_range(&self) -> Option<(f64, f64)> {
        self.state.borrow().rate_range()
    }

    /// Move the window; takes effect on the next [`load`](Self::load).
    pub fn set_window(&self, from: OffsetDateTime, to: OffsetDateTime) {
        self.state.send_modify(|state| {
            state.from = from;
            state.to = to;
        });
    }

    /// Fetch the history for the current window. No-op while a load is in
    /// flight; dropping the future clears `is_loading`.
    pub async fn load(&self) {
        let Some(loading) = LoadingGuard::acquire(&self.state, TimeSeriesState::loading_flag) else {
            tracing::debug!("time series load already in flight");
            return;
        };
        let (base, from, to) = {
            let state = self.state.borrow();
            (state.base_asset.clone(), state.from, state.to)
        };

        match self.client.fetch_time_series(&base, from, to).await {
            Ok(series) => {
                tracing::info!(base = %base, bars = series.len(), "time series loaded");
                loading.finish(|state| {
                    state.series = series;
                    state.is_offline = false;
                    state.last_error = None;
                });
            }
            Err(error) => {
                tracing::warn!(base = %base, code = error.code(), %error, "time series fetch failed");
                loading.finish(|state| {
                    state.is_offline = error.is_offline();
                    state.last_error = Some(error.to_string());
                });
            }
        }
    }
}

impl std::fmt::Debug for TimeSeriesController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeriesController")
            .field("client", &self.client)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
