//! Merge freshly fetched assets with the collection already held.
//!
//! Server-owned fields always come from the fetch. `is_favorite` is carried
//! over from the held record and `last_fetched` is stamped with the
//! reconciliation instant. Assets seen for the first time keep their
//! defaults: not a favorite, never fetched.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::domain::Asset;

/// Source of the reconciliation instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Reconcile against the wall clock.
pub fn reconcile(fresh: Vec<Asset>, held: &[Asset]) -> Vec<Asset> {
    reconcile_at(fresh, held, OffsetDateTime::now_utc())
}

/// Reconcile with an explicit instant.
///
/// The output has exactly the members of `fresh`, in the same order.
pub fn reconcile_at(fresh: Vec<Asset>, held: &[Asset], now: OffsetDateTime) -> Vec<Asset> {
    let held_by_id: HashMap<&str, &Asset> = held
        .iter()
        .map(|asset| (asset.asset_id.as_str(), asset))
        .collect();

    fresh
        .into_iter()
        .map(|mut asset| {
            match held_by_id.get(asset.asset_id.as_str()) {
                Some(existing) => {
                    asset.is_favorite = existing.is_favorite;
                    asset.last_fetched = Some(now);
                }
                None => {
                    asset.is_favorite = false;
                    asset.last_fetched = None;
                }
            }
            asset
        })
        .collect()
}
