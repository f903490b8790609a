//! Poller Module
//!
//! Drives periodic glucose refresh while a login is active and hands every
//! outcome to the display sink.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::api::GlucoseApi;
use crate::auth::{CredentialStore, Credentials};
use crate::config::PollerConfig;

/// Outcome of one fetch cycle as seen by the display
///
/// Serializes as `{"measurement": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseUpdate {
    Measurement(Value),
    Error(String),
}

impl GlucoseUpdate {
    pub fn is_error(&self) -> bool {
        matches!(self, GlucoseUpdate::Error(_))
    }
}

/// Presentation collaborator receiving glucose updates
pub trait DisplaySink: Send + Sync {
    fn deliver(&self, update: GlucoseUpdate);
}

/// One authenticate-then-fetch sequence
pub async fn run_fetch_cycle(api: &dyn GlucoseApi, credentials: &Credentials) -> GlucoseUpdate {
    info!("Updating glucose level");

    let result = async {
        let token = api.authenticate(credentials).await?;
        api.fetch_latest_measurement(&token, credentials.region).await
    }
    .await;

    match result {
        Ok(measurement) => {
            debug!("Sending glucose data to display");
            GlucoseUpdate::Measurement(measurement)
        }
        Err(e) => {
            error!("Error fetching glucose data: {}", e);
            GlucoseUpdate::Error(e.to_string())
        }
    }
}

struct CycleContext {
    api: Arc<dyn GlucoseApi>,
    credentials: Arc<CredentialStore>,
    sink: Arc<dyn DisplaySink>,
    skip_overlapping: bool,
    in_flight: AtomicBool,
    /// Bumped on every start/stop; cycles from an older session stay silent
    generation: AtomicU64,
}

impl CycleContext {
    /// Begin a new session, orphaning any cycle still in flight
    fn next_generation(&self) {
        self.in_flight.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Spawn a fetch cycle for the current login, if any
    ///
    /// `force` bypasses the overlap guard.
    fn spawn_cycle(self: &Arc<Self>, force: bool) -> bool {
        let Some(credentials) = self.credentials.get() else {
            debug!("No credentials, skipping fetch cycle");
            return false;
        };

        if self.skip_overlapping && self.in_flight.swap(true, Ordering::AcqRel) && !force {
            debug!("Previous fetch cycle still in flight, skipping");
            return false;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let update = run_fetch_cycle(ctx.api.as_ref(), &credentials).await;

            if ctx.generation.load(Ordering::Acquire) != generation {
                debug!("Session changed during fetch cycle, dropping result");
                return;
            }

            ctx.sink.deliver(update);
            if ctx.skip_overlapping {
                ctx.in_flight.store(false, Ordering::Release);
            }
        });

        true
    }
}

/// Owns the recurring update timer
pub struct Poller {
    ctx: Arc<CycleContext>,
    config: PollerConfig,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Create an idle poller
    pub fn new(
        api: Arc<dyn GlucoseApi>,
        credentials: Arc<CredentialStore>,
        sink: Arc<dyn DisplaySink>,
        config: PollerConfig,
    ) -> Self {
        let ctx = Arc::new(CycleContext {
            api,
            credentials,
            sink,
            skip_overlapping: config.skip_overlapping,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });

        Self {
            ctx,
            config,
            timer: Mutex::new(None),
        }
    }

    /// Fetch now, then arm the recurring timer, replacing any existing one
    pub fn start(&self) {
        let period = self.config.poll_interval;
        info!("Starting periodic update every {}s", period.as_secs());

        self.ctx.next_generation();
        self.ctx.spawn_cycle(true);

        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                debug!("Periodic update tick");
                ctx.spawn_cycle(false);
            }
        });

        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);

        if let Some(previous) = previous {
            debug!("Replacing existing update timer");
            previous.abort();
        }
    }

    /// Run one fetch cycle outside the schedule
    pub fn refresh_now(&self) -> bool {
        self.ctx.spawn_cycle(false)
    }

    /// Cancel the recurring timer and silence any cycle in flight
    pub fn stop(&self) {
        self.ctx.next_generation();

        let previous = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Some(previous) = previous {
            info!("Stopping periodic update");
            previous.abort();
        }
    }

    /// Check if the recurring timer is armed
    pub fn is_active(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::config::Region;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    pub(crate) struct FakeApi {
        pub auth: Result<String, ApiError>,
        pub data: Result<Value, ApiError>,
        pub auth_delay: Duration,
        pub auth_calls: AtomicUsize,
        pub data_calls: Mutex<Vec<(String, Region)>>,
    }

    impl FakeApi {
        pub fn ok(token: &str, measurement: Value) -> Self {
            Self {
                auth: Ok(token.to_string()),
                data: Ok(measurement),
                auth_delay: Duration::ZERO,
                auth_calls: AtomicUsize::new(0),
                data_calls: Mutex::new(Vec::new()),
            }
        }

        pub fn auth_calls(&self) -> usize {
            self.auth_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GlucoseApi for FakeApi {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<String, ApiError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if !self.auth_delay.is_zero() {
                tokio::time::sleep(self.auth_delay).await;
            }
            self.auth.clone()
        }

        async fn fetch_latest_measurement(&self, token: &str, region: Region) -> Result<Value, ApiError> {
            self.data_calls.lock().unwrap().push((token.to_string(), region));
            self.data.clone()
        }
    }

    pub(crate) struct ChannelSink(pub mpsc::UnboundedSender<GlucoseUpdate>);

    impl DisplaySink for ChannelSink {
        fn deliver(&self, update: GlucoseUpdate) {
            let _ = self.0.send(update);
        }
    }

    pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<GlucoseUpdate>) -> Vec<GlucoseUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn poller_with(
        api: Arc<FakeApi>,
        config: PollerConfig,
    ) -> (Poller, Arc<CredentialStore>, mpsc::UnboundedReceiver<GlucoseUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(CredentialStore::new());
        store.set(Credentials::new("a@b.com", "x", Region::Eu));
        let poller = Poller::new(api, store.clone(), Arc::new(ChannelSink(tx)), config);
        (poller, store, rx)
    }

    fn every_minute() -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_secs(60),
            skip_overlapping: false,
        }
    }

    #[test]
    fn update_serializes_by_key() {
        let ok = GlucoseUpdate::Measurement(json!({"value": 110}));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"measurement": {"value": 110}}));

        let err = GlucoseUpdate::Error("bad credentials".into());
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "bad credentials"}));
        assert!(err.is_error());
    }

    #[tokio::test]
    async fn cycle_passes_token_to_data_call() {
        let api = FakeApi::ok("T", json!({"value": 110}));
        let creds = Credentials::new("a@b.com", "x", Region::Us);

        let update = run_fetch_cycle(&api, &creds).await;

        assert_eq!(update, GlucoseUpdate::Measurement(json!({"value": 110})));
        assert_eq!(*api.data_calls.lock().unwrap(), vec![("T".to_string(), Region::Us)]);
    }

    #[tokio::test]
    async fn auth_failure_skips_data_call() {
        let api = FakeApi {
            auth: Err(ApiError::Authentication("bad credentials".into())),
            ..FakeApi::ok("T", json!({}))
        };
        let creds = Credentials::new("a@b.com", "x", Region::Eu);

        let update = run_fetch_cycle(&api, &creds).await;

        assert_eq!(update, GlucoseUpdate::Error("bad credentials".into()));
        assert!(api.data_calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_fetches_immediately_then_every_period() {
        let api = Arc::new(FakeApi::ok("T", json!({"value": 110})));
        let (poller, _store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), vec![GlucoseUpdate::Measurement(json!({"value": 110}))]);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(drain(&mut rx).len(), 2);
        assert_eq!(api.auth_calls(), 3);
        assert!(poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycle_delivers_exactly_one_error() {
        let api = Arc::new(FakeApi {
            data: Err(ApiError::NoData),
            ..FakeApi::ok("T", json!({}))
        });
        let (poller, _store, mut rx) = poller_with(api, every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            drain(&mut rx),
            vec![GlucoseUpdate::Error("No glucose data available in the response".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_timer() {
        let api = Arc::new(FakeApi::ok("T", json!({"value": 1})));
        let (poller, _store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(30)).await;
        poller.start();

        // Old timer would have fired at 60s; new one fires at 90s.
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(api.auth_calls(), 3);
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let api = Arc::new(FakeApi::ok("T", json!({"value": 1})));
        let (poller, _store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        poller.stop();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert!(!poller.is_active());
        assert_eq!(api.auth_calls(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_without_credentials_is_noop() {
        let api = Arc::new(FakeApi::ok("T", json!({"value": 1})));
        let (poller, store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        store.clear();
        tokio::time::sleep(Duration::from_secs(130)).await;

        assert!(poller.is_active());
        assert_eq!(api.auth_calls(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(!poller.refresh_now());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_overlap_by_default() {
        let api = Arc::new(FakeApi {
            auth_delay: Duration::from_secs(90),
            ..FakeApi::ok("T", json!({"value": 1}))
        });
        let (poller, _store, _rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(130)).await;

        // Cycles started at 0s, 60s and 120s.
        assert_eq!(api.auth_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_overlapping_waits_for_in_flight_cycle() {
        let api = Arc::new(FakeApi {
            auth_delay: Duration::from_secs(90),
            ..FakeApi::ok("T", json!({"value": 1}))
        });
        let config = PollerConfig {
            skip_overlapping: true,
            ..every_minute()
        };
        let (poller, _store, mut rx) = poller_with(api.clone(), config);

        poller.start();
        tokio::time::sleep(Duration::from_secs(130)).await;

        // The 60s tick lands while the first cycle is still authenticating.
        assert_eq!(api.auth_calls(), 2);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_cycle_in_flight() {
        let api = Arc::new(FakeApi {
            auth_delay: Duration::from_secs(5),
            ..FakeApi::ok("T", json!({"value": 1}))
        });
        let (poller, _store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.stop();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(api.auth_calls(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_drops_result_of_previous_session() {
        let api = Arc::new(FakeApi {
            auth_delay: Duration::from_secs(5),
            ..FakeApi::ok("T", json!({"value": 1}))
        });
        let (poller, _store, mut rx) = poller_with(api.clone(), every_minute());

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(api.auth_calls(), 2);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_fetches_immediately_despite_overlap_guard() {
        let api = Arc::new(FakeApi {
            auth_delay: Duration::from_secs(90),
            ..FakeApi::ok("T", json!({"value": 1}))
        });
        let config = PollerConfig {
            skip_overlapping: true,
            ..every_minute()
        };
        let (poller, _store, mut rx) = poller_with(api.clone(), config);

        poller.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.auth_calls(), 2);

        // Only the second session's cycle reports, at 100s.
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
