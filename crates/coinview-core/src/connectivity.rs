//! Network reachability used as a precondition before any request.

use std::sync::atomic::{AtomicU8, Ordering};

/// Reachability reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityStatus {
    /// A usable route exists.
    Satisfied,
    /// No usable route.
    Unsatisfied,
    /// A route exists but must be brought up first (e.g. on-demand VPN).
    RequiresConnection,
    /// Monitoring has not reported yet.
    Unknown,
}

impl ConnectivityStatus {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Satisfied => 0,
            Self::Unsatisfied => 1,
            Self::RequiresConnection => 2,
            Self::Unknown => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Satisfied,
            1 => Self::Unsatisfied,
            2 => Self::RequiresConnection,
            _ => Self::Unknown,
        }
    }
}

/// Source of the current connectivity status.
pub trait ConnectivityMonitor: Send + Sync {
    fn status(&self) -> ConnectivityStatus;
}

/// Fixed status, for tests and hosts without reachability reporting.
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub ConnectivityStatus);

impl StaticConnectivity {
    pub const fn online() -> Self {
        Self(ConnectivityStatus::Satisfied)
    }

    pub const fn offline() -> Self {
        Self(ConnectivityStatus::Unsatisfied)
    }
}

impl ConnectivityMonitor for StaticConnectivity {
    fn status(&self) -> ConnectivityStatus {
        self.0
    }
}

/// Status cell updated by a platform path-monitor callback.
///
/// Starts as [`ConnectivityStatus::Unknown`] until the first update.
#[derive(Debug)]
pub struct SharedConnectivity {
    status: AtomicU8,
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(ConnectivityStatus::Unknown)
    }
}

impl SharedConnectivity {
    pub fn new(initial: ConnectivityStatus) -> Self {
        Self {
            status: AtomicU8::new(initial.to_u8()),
        }
    }

    pub fn update(&self, status: ConnectivityStatus) {
        let previous = ConnectivityStatus::from_u8(self.status.swap(status.to_u8(), Ordering::AcqRel));
        if previous != status {
            tracing::debug!(?previous, current = ?status, "connectivity changed");
        }
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus::from_u8(self.status.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_connectivity_starts_unknown_and_tracks_updates() {
        let monitor = SharedConnectivity::default();
        assert_eq!(monitor.status(), ConnectivityStatus::Unknown);

        for status in [
            ConnectivityStatus::Satisfied,
            ConnectivityStatus::RequiresConnection,
            ConnectivityStatus::Unsatisfied,
        ] {
            monitor.update(status);
            assert_eq!(monitor.status(), status);
        }
    }
}
