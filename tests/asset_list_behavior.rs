//! Behavior-driven tests for the asset list controller
//!
//! These tests verify HOW the list screen state reacts to loads, failures,
//! favorites and filter changes, with a scripted transport and an in-memory
//! store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use coinview_core::{
    Asset, AssetListController, AssetStore, ConnectivityStatus, FixedClock, HttpError,
    HttpResponse, InMemoryAssetStore, RetryConfig, SharedConnectivity, UpsertReport,
    UserPreferences, WarehouseError,
};
use coinview_tests::{assets_response, client_with, online_client, ScriptedHttpClient};
use time::macros::datetime;
use time::OffsetDateTime;

const NOW: OffsetDateTime = datetime!(2025-06-01 09:30:00 UTC);

fn controller(http: Arc<ScriptedHttpClient>, store: Arc<dyn AssetStore>) -> AssetListController {
    AssetListController::new(online_client(http), store).with_clock(Arc::new(FixedClock(NOW)))
}

/// In-memory store that counts preference writes and can be made slow or
/// failing.
#[derive(Default)]
struct ObservedStore {
    inner: InMemoryAssetStore,
    preference_saves: AtomicUsize,
    upsert_delay: Duration,
    preferences_delay: Duration,
    fail_reads: bool,
    fail_writes: bool,
}

impl ObservedStore {
    fn with_preferences(preferences: UserPreferences) -> Self {
        Self {
            inner: InMemoryAssetStore::new().with_preferences(preferences),
            ..Self::default()
        }
    }

    fn saves(&self) -> usize {
        self.preference_saves.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), WarehouseError> {
        if self.fail_reads {
            return Err(WarehouseError::Io(std::io::Error::other("cache file unreadable")));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), WarehouseError> {
        if self.fail_writes {
            return Err(WarehouseError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl AssetStore for ObservedStore {
    fn load_all(&self) -> Result<Vec<Asset>, WarehouseError> {
        self.check_read()?;
        self.inner.load_all()
    }

    fn find(&self, asset_id: &str) -> Result<Option<Asset>, WarehouseError> {
        self.check_read()?;
        self.inner.find(asset_id)
    }

    fn find_many(&self, asset_ids: &[String]) -> Result<Vec<Asset>, WarehouseError> {
        self.check_read()?;
        self.inner.find_many(asset_ids)
    }

    fn upsert_all(&self, assets: &[Asset]) -> Result<UpsertReport, WarehouseError> {
        std::thread::sleep(self.upsert_delay);
        self.check_write()?;
        self.inner.upsert_all(assets)
    }

    fn set_favorite(&self, asset_id: &str, is_favorite: bool) -> Result<bool, WarehouseError> {
        self.check_write()?;
        self.inner.set_favorite(asset_id, is_favorite)
    }

    fn load_preferences(&self) -> Result<Option<UserPreferences>, WarehouseError> {
        std::thread::sleep(self.preferences_delay);
        self.check_read()?;
        self.inner.load_preferences()
    }

    fn save_preferences(&self, preferences: &UserPreferences) -> Result<(), WarehouseError> {
        self.preference_saves.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        self.inner.save_preferences(preferences)
    }
}

fn ids(assets: &[Asset]) -> Vec<&str> {
    assets.iter().map(|asset| asset.asset_id.as_str()).collect()
}

// =============================================================================
// Asset List: Loading
// =============================================================================

#[tokio::test]
async fn when_a_held_favorite_is_refetched_it_keeps_the_flag_and_gains_server_fields() {
    // Given: BTC is cached as a favorite without a name
    let store = Arc::new(InMemoryAssetStore::with_assets(vec![
        Asset::new("BTC").with_favorite(true)
    ]));
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store.clone());

    // When: The list is loaded
    controller.load().await;

    // Then: BTC is still a favorite, named Bitcoin, stamped with the load time
    let state = controller.snapshot();
    assert_eq!(ids(&state.assets), ["BTC", "MST", "USD"]);
    let btc = &state.assets[0];
    assert!(btc.is_favorite);
    assert_eq!(btc.name.as_deref(), Some("Bitcoin"));
    assert_eq!(btc.last_fetched, Some(NOW));

    // And: First sightings are not favorites and were never fetched before
    assert!(state.assets[1..]
        .iter()
        .all(|asset| !asset.is_favorite && asset.last_fetched.is_none()));
    assert!(!state.is_loading);
    assert_eq!(state.last_error, None);

    // And: The merged result was persisted
    let stored = store.load_all().expect("store");
    assert_eq!(stored.len(), 3);
    let stored_btc = store.find("BTC").expect("find").expect("BTC cached");
    assert!(stored_btc.is_favorite);
    assert_eq!(stored_btc.name.as_deref(), Some("Bitcoin"));
}

#[tokio::test]
async fn cached_assets_are_published_before_the_network_answers() {
    // Given: A cached asset and a slow server
    let store = Arc::new(InMemoryAssetStore::with_assets(vec![
        Asset::new("DOGE").with_name("Dogecoin")
    ]));
    let http = Arc::new(
        ScriptedHttpClient::always(assets_response()).with_delay(Duration::from_millis(200)),
    );
    let controller = Arc::new(controller(http, store));
    let mut updates = controller.subscribe();

    // When: A load starts in the background
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load().await })
    };

    // Then: The cached asset appears while the load is still running
    let cached = {
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            updates.wait_for(|state| !state.assets.is_empty()),
        )
        .await
        .expect("cached snapshot in time")
        .expect("controller alive");
        (*state).clone()
    };
    assert!(cached.is_loading);
    assert_eq!(ids(&cached.assets), ["DOGE"]);

    // And: The live result replaces it once the fetch completes
    task.await.expect("load task");
    assert_eq!(ids(&controller.snapshot().assets), ["BTC", "MST", "USD"]);
}

#[tokio::test]
async fn concurrent_loads_share_one_network_call() {
    // Given: A server that takes a while to answer
    let http = Arc::new(
        ScriptedHttpClient::always(assets_response()).with_delay(Duration::from_millis(50)),
    );
    let controller = controller(http.clone(), Arc::new(InMemoryAssetStore::new()));

    // When: Two loads are started together
    tokio::join!(controller.load(), controller.load());

    // Then: Only one request reached the transport
    assert_eq!(http.call_count(), 1);
    assert_eq!(controller.snapshot().assets.len(), 3);
    assert!(!controller.snapshot().is_loading);
}

#[tokio::test]
async fn failed_refresh_keeps_the_displayed_assets() {
    // Given: A first load succeeds, then the server breaks
    let http = Arc::new(ScriptedHttpClient::scripted(
        vec![Ok(assets_response())],
        Ok(HttpResponse::new(500, r#"{"error":"maintenance"}"#)),
    ));
    let controller = AssetListController::new(
        online_client(http).with_retry(RetryConfig::no_retry()),
        Arc::new(InMemoryAssetStore::new()),
    );
    controller.load().await;

    // When: The list is refreshed
    controller.load().await;

    // Then: The previous assets stay, the error is recorded, and we are not offline
    let state = controller.snapshot();
    assert_eq!(state.assets.len(), 3);
    assert_eq!(state.last_error.as_deref(), Some("server error: maintenance"));
    assert!(!state.is_offline);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn offline_flag_follows_connectivity_failures_and_clears_on_success() {
    // Given: The device is offline
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let connectivity = Arc::new(SharedConnectivity::new(ConnectivityStatus::Unsatisfied));
    let controller = AssetListController::new(
        client_with(http.clone(), connectivity.clone()),
        Arc::new(InMemoryAssetStore::new()),
    );

    // When: A load is attempted
    controller.load().await;

    // Then: The state says offline and no request was made
    let state = controller.snapshot();
    assert!(state.is_offline);
    assert!(state.last_error.is_some());
    assert_eq!(http.call_count(), 0);

    // When: Connectivity returns and the list is reloaded
    connectivity.update(ConnectivityStatus::Satisfied);
    controller.load().await;

    // Then: The offline flag and error are cleared
    let state = controller.snapshot();
    assert!(!state.is_offline);
    assert_eq!(state.last_error, None);
    assert_eq!(state.assets.len(), 3);
}

#[tokio::test]
async fn transport_failure_is_not_reported_as_offline() {
    let http = Arc::new(ScriptedHttpClient::failing(HttpError::new("connection reset")));
    let controller = AssetListController::new(
        online_client(http).with_retry(RetryConfig::no_retry()),
        Arc::new(InMemoryAssetStore::new()),
    );

    controller.load().await;

    let state = controller.snapshot();
    assert!(!state.is_offline);
    assert_eq!(state.last_error.as_deref(), Some("server error: connection reset"));
}

#[tokio::test]
async fn a_cancelled_load_does_not_block_the_next_one() {
    // Given: A server slower than the caller is willing to wait
    let http = Arc::new(
        ScriptedHttpClient::always(assets_response()).with_delay(Duration::from_millis(200)),
    );
    let controller = controller(http.clone(), Arc::new(InMemoryAssetStore::new()));

    // When: The first load is abandoned by a timeout
    let abandoned = tokio::time::timeout(Duration::from_millis(20), controller.load()).await;
    assert!(abandoned.is_err());

    // Then: The loading flag is cleared and a new load goes through
    assert!(!controller.snapshot().is_loading);
    controller.load().await;
    assert_eq!(http.call_count(), 2);
    assert_eq!(controller.snapshot().assets.len(), 3);
    assert!(!controller.snapshot().is_loading);
}

// =============================================================================
// Asset List: Storage Failures
// =============================================================================

#[tokio::test]
async fn unreadable_cache_counts_as_empty_and_the_load_still_succeeds() {
    // Given: A store whose reads fail
    let store = Arc::new(ObservedStore {
        fail_reads: true,
        ..ObservedStore::default()
    });
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store);

    // When: The list is loaded
    controller.load().await;

    // Then: The network result is shown without an error
    let state = controller.snapshot();
    assert_eq!(ids(&state.assets), ["BTC", "MST", "USD"]);
    assert_eq!(state.last_error, None);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn failed_writes_leave_the_published_state_intact() {
    // Given: A store whose writes fail
    let store = Arc::new(ObservedStore {
        fail_writes: true,
        ..ObservedStore::default()
    });
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store.clone());

    // When: The list is loaded and a favorite is toggled
    controller.load().await;
    let toggled = controller.toggle_favorite("BTC").await;

    // Then: The view keeps the merged list and the new flag
    assert_eq!(toggled, Some(true));
    let state = controller.snapshot();
    assert_eq!(ids(&state.assets), ["BTC", "MST", "USD"]);
    assert!(state.assets[0].is_favorite);
    assert_eq!(state.last_error, None);
    assert!(!state.is_offline);

    // And: Nothing reached the store
    assert!(store.inner.load_all().expect("inner store").is_empty());
}

// =============================================================================
// Asset List: Favorites and Filtering
// =============================================================================

#[tokio::test]
async fn filtering_follows_search_text_and_favorites_only() {
    // Given: BTC (not favorite) and MST (favorite) are held
    let store = Arc::new(InMemoryAssetStore::with_assets(vec![
        Asset::new("BTC").with_name("Bitcoin"),
        Asset::new("MST").with_name("MustangCoin").with_favorite(true),
    ]));
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store);
    controller.load().await;
    assert_eq!(controller.snapshot().filtered_assets.len(), 3);

    // When/Then: Searching "MST" shows only MustangCoin
    controller.set_search_text("MST").await;
    assert_eq!(ids(&controller.snapshot().filtered_assets), ["MST"]);

    // When/Then: Empty search with favorites only shows only MustangCoin
    controller.set_search_text("").await;
    controller.set_favorites_only(true).await;
    assert_eq!(ids(&controller.snapshot().filtered_assets), ["MST"]);

    // When/Then: A search that matches nothing shows nothing
    controller.set_favorites_only(false).await;
    controller.set_search_text("nonexistent").await;
    assert!(controller.snapshot().filtered_assets.is_empty());
}

#[tokio::test]
async fn toggling_a_favorite_updates_view_and_store() {
    // Given: A loaded list with no favorites and a favorites-only filter
    let store = Arc::new(InMemoryAssetStore::new());
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store.clone());
    controller.load().await;
    controller.set_favorites_only(true).await;
    assert!(controller.snapshot().filtered_assets.is_empty());

    // When: MST is marked as favorite
    let toggled = controller.toggle_favorite("MST").await;

    // Then: The view and the store agree
    assert_eq!(toggled, Some(true));
    assert_eq!(ids(&controller.snapshot().filtered_assets), ["MST"]);
    assert!(store
        .find("MST")
        .expect("find")
        .is_some_and(|asset| asset.is_favorite));

    // When: It is toggled again
    assert_eq!(controller.toggle_favorite("MST").await, Some(false));
    assert!(controller.snapshot().filtered_assets.is_empty());
}

#[tokio::test]
async fn a_favorite_toggled_while_the_load_is_persisting_survives_a_relaunch() {
    // Given: A store that takes a while to write the merged list
    let store = Arc::new(ObservedStore {
        upsert_delay: Duration::from_millis(150),
        ..ObservedStore::default()
    });
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = Arc::new(controller(http.clone(), store.clone()));
    let mut updates = controller.subscribe();

    // When: MST is toggled as soon as the merged list is published
    let task = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load().await })
    };
    tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|state| state.assets.len() == 3 && !state.is_loading),
    )
    .await
    .expect("merged list in time")
    .expect("controller alive");
    assert_eq!(controller.toggle_favorite("MST").await, Some(true));
    task.await.expect("load task");

    // Then: The store agrees with the view
    assert!(store
        .find("MST")
        .expect("find")
        .is_some_and(|asset| asset.is_favorite));

    // And: A fresh controller over the same store still shows the favorite
    let relaunched = AssetListController::new(online_client(http), store)
        .with_clock(Arc::new(FixedClock(NOW)));
    relaunched.load().await;
    let state = relaunched.snapshot();
    assert!(state
        .assets
        .iter()
        .any(|asset| asset.asset_id == "MST" && asset.is_favorite));
}

#[tokio::test]
async fn toggling_an_unknown_asset_changes_nothing() {
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, Arc::new(InMemoryAssetStore::new()));
    controller.load().await;
    let before = controller.snapshot();

    assert_eq!(controller.toggle_favorite("NOPE").await, None);
    assert_eq!(controller.snapshot(), before);
}

#[tokio::test]
async fn subscribers_see_filter_changes() {
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, Arc::new(InMemoryAssetStore::new()));
    controller.load().await;
    let mut updates = controller.subscribe();
    updates.borrow_and_update();

    controller.set_search_text("dollar").await;

    assert!(updates.has_changed().expect("sender alive"));
    assert_eq!(ids(&updates.borrow_and_update().filtered_assets), ["USD"]);
}

// =============================================================================
// Asset List: Preferences
// =============================================================================

#[tokio::test]
async fn restoring_preferences_applies_them_without_saving() {
    // Given: Stored preferences from a previous session
    let store = Arc::new(ObservedStore::with_preferences(UserPreferences {
        search_text: String::from("coin"),
        favorites_only: true,
    }));
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store.clone());

    // When: They are restored
    controller.restore_preferences().await;

    // Then: The state reflects them and nothing was written back
    let state = controller.snapshot();
    assert_eq!(state.search_text, "coin");
    assert!(state.favorites_only);
    assert_eq!(store.saves(), 0);

    // When: The user changes the search afterwards
    controller.set_search_text("btc").await;

    // Then: The change is persisted
    assert_eq!(store.saves(), 1);
    assert_eq!(
        store.load_preferences().expect("load"),
        Some(UserPreferences {
            search_text: String::from("btc"),
            favorites_only: true,
        })
    );
}

#[tokio::test]
async fn a_filter_change_made_during_restore_wins_and_is_saved() {
    // Given: Stored preferences that take a while to read
    let store = Arc::new(ObservedStore {
        preferences_delay: Duration::from_millis(150),
        ..ObservedStore::with_preferences(UserPreferences {
            search_text: String::from("coin"),
            favorites_only: true,
        })
    });
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = Arc::new(controller(http, store.clone()));

    // When: The user searches while the restore is still reading
    let restore = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.restore_preferences().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    controller.set_search_text("eth").await;
    restore.await.expect("restore task");

    // Then: The user's value is shown and persisted
    let state = controller.snapshot();
    assert_eq!(state.search_text, "eth");
    assert!(!state.favorites_only);
    assert_eq!(store.saves(), 1);
    assert_eq!(
        store.load_preferences().expect("load"),
        Some(UserPreferences {
            search_text: String::from("eth"),
            favorites_only: false,
        })
    );
}

#[tokio::test]
async fn restoring_without_stored_preferences_keeps_defaults() {
    let store = Arc::new(ObservedStore::default());
    let http = Arc::new(ScriptedHttpClient::always(assets_response()));
    let controller = controller(http, store.clone());

    controller.restore_preferences().await;

    let state = controller.snapshot();
    assert_eq!(state.search_text, "");
    assert!(!state.favorites_only);
    assert_eq!(store.saves(), 0);
}

// =============================================================================
// Asset List: Icons
// =============================================================================

#[tokio::test]
async fn icons_are_published_as_an_index() {
    let http = Arc::new(ScriptedHttpClient::always(HttpResponse::ok(
        r#"[{"asset_id":"BTC","url":"https://icons.test/64/btc.png"},{"asset_id":"ETH"}]"#,
    )));
    let controller = controller(http.clone(), Arc::new(InMemoryAssetStore::new()));

    controller.load_icons(64).await;

    let state = controller.snapshot();
    assert_eq!(state.icons.url_for("BTC"), Some("https://icons.test/64/btc.png"));
    assert_eq!(state.icons.len(), 1);
    assert!(http.recorded_requests()[0].url.ends_with("/assets/icons/64"));
}

#[tokio::test]
async fn undecodable_icons_are_recorded_as_an_error() {
    let http = Arc::new(ScriptedHttpClient::always(HttpResponse::ok(r#"{"not":"a list"}"#)));
    let controller = controller(http, Arc::new(InMemoryAssetStore::new()));

    controller.load_icons(32).await;

    let state = controller.snapshot();
    assert!(state.icons.is_empty());
    assert_eq!(
        state.last_error.as_deref(),
        Some("the response could not be decoded")
    );
}

#[tokio::test]
async fn loading_icons_clears_an_earlier_error() {
    // Given: A first icon request that cannot be decoded
    let http = Arc::new(ScriptedHttpClient::scripted(
        vec![Ok(HttpResponse::ok(r#"{"not":"a list"}"#))],
        Ok(HttpResponse::ok(r#"[{"asset_id":"BTC","url":"https://icons.test/32/btc.png"}]"#)),
    ));
    let controller = controller(http, Arc::new(InMemoryAssetStore::new()));
    controller.load_icons(32).await;
    assert!(controller.snapshot().last_error.is_some());

    // When: The icons are requested again
    controller.load_icons(32).await;

    // Then: The index is published and the error is gone
    let state = controller.snapshot();
    assert_eq!(state.icons.len(), 1);
    assert_eq!(state.last_error, None);
}
