//! Ingestion scenarios for the updater, driven by a scripted feed

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use raid_relay::feed::{FeedError, FeedResult, FeedSource};
use raid_relay::pubsub::{filter_all, Topic};
use raid_relay::types::{CanonicalState, FeedMessage, SharedState, Update, REGION_COUNT};
use raid_relay::updater::{Updater, RETRY_DELAY};
use raid_relay::Shutdown;

/// One recorded feed call
#[derive(Debug, Clone)]
struct Call {
    at: Instant,
    after: Option<i64>,
    last_update: DateTime<Utc>,
}

/// Feed fake replaying canned responses; an exhausted script yields empty batches
struct ScriptedFeed {
    state: SharedState,
    backlog: Mutex<VecDeque<FeedResult<Vec<FeedMessage>>>>,
    newer: Mutex<VecDeque<FeedResult<Vec<FeedMessage>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedFeed {
    fn new(state: SharedState) -> Self {
        Self {
            state,
            backlog: Mutex::new(VecDeque::new()),
            newer: Mutex::new(VecDeque::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_backlog(self, batch: FeedResult<Vec<FeedMessage>>) -> Self {
        self.backlog.lock().push_back(batch);
        self
    }

    fn with_newer(self, batch: FeedResult<Vec<FeedMessage>>) -> Self {
        self.newer.lock().push_back(batch);
        self
    }

    fn record(&self, after: Option<i64>) {
        self.calls.lock().push(Call {
            at: Instant::now(),
            after,
            last_update: self.state.read().last_update,
        });
    }
}

impl FeedSource for ScriptedFeed {
    async fn fetch_last(&self, _count: usize) -> FeedResult<Vec<FeedMessage>> {
        self.record(None);
        self.backlog.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_newer(&self, after: i64) -> FeedResult<Vec<FeedMessage>> {
        self.record(Some(after));
        self.newer.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn time(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 3, 15, hour, minute, 0).unwrap()
}

fn message(id: i64, sentence: &str, at: DateTime<Utc>) -> FeedMessage {
    FeedMessage::new(
        id,
        "Повітряна Тривога",
        vec!["🔴 12:00".to_string(), sentence.to_string()],
        at,
    )
}

fn raised(id: i64, at: DateTime<Utc>) -> FeedMessage {
    message(id, "Повітряна тривога в Київська область.", at)
}

fn cleared(id: i64, at: DateTime<Utc>) -> FeedMessage {
    message(id, "Відбій тривоги в Київська область.", at)
}

fn assert_backoff(elapsed: Duration) {
    assert!(
        elapsed >= RETRY_DELAY && elapsed < RETRY_DELAY + Duration::from_secs(1),
        "unexpected backoff {elapsed:?}"
    );
}

fn new_state(cursor: Option<i64>) -> SharedState {
    Arc::new(RwLock::new(CanonicalState {
        last_cursor: cursor,
        ..Default::default()
    }))
}

fn updater(feed: ScriptedFeed, state: &SharedState, topic: &Arc<Topic<Update>>) -> Arc<Updater<ScriptedFeed>> {
    Arc::new(Updater::new(
        feed,
        chrono_tz::Europe::Kyiv,
        1,
        Arc::clone(state),
        Arc::clone(topic),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_backlog_then_live_update() {
    let state = new_state(None);
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let mut events = topic.subscribe("test", filter_all).await;

    let feed = ScriptedFeed::new(Arc::clone(&state))
        .with_backlog(Ok(vec![raised(100, time(10, 0))]))
        .with_newer(Ok(vec![cleared(101, time(10, 30))]));
    let updater = updater(feed, &state, &topic);
    let shutdown = Shutdown::new();
    let task = {
        let updater = Arc::clone(&updater);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { updater.run(shutdown).await })
    };

    let replayed = events.recv().await.unwrap();
    assert!(!replayed.is_fresh);
    assert_eq!(replayed.region.id, 9);
    assert!(replayed.region.alert);
    assert_eq!(
        replayed.region.changed_at.unwrap().to_rfc3339(),
        "2022-03-15T12:00:00+02:00"
    );

    let live = events.recv().await.unwrap();
    assert!(live.is_fresh);
    assert_eq!(live.region.id, 9);
    assert!(!live.region.alert);
    assert_eq!(
        live.region.changed_at.unwrap().to_rfc3339(),
        "2022-03-15T12:30:00+02:00"
    );

    {
        let state = state.read();
        assert_eq!(state.last_cursor, Some(101));
        assert_eq!(state.regions.len(), REGION_COUNT);
        assert!(!state.find_region(9).unwrap().alert);
    }

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resumed_cursor_skips_backlog() {
    let state = new_state(Some(100));
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let mut events = topic.subscribe("test", filter_all).await;

    let feed = ScriptedFeed::new(Arc::clone(&state)).with_newer(Ok(vec![raised(101, time(11, 0))]));
    let calls = Arc::clone(&feed.calls);
    let updater = updater(feed, &state, &topic);
    let shutdown = Shutdown::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { updater.run(shutdown).await })
    };

    let update = events.recv().await.unwrap();
    assert!(update.is_fresh);

    shutdown.cancel();
    task.await.unwrap().unwrap();

    let calls = calls.lock();
    assert!(calls.iter().all(|c| c.after.is_some()));
    assert_eq!(calls[0].after, Some(100));
}

#[tokio::test(start_paused = true)]
async fn test_failed_polls_retry_with_backoff() {
    let state = new_state(Some(100));
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let mut events = topic.subscribe("test", |u: &Update| u.is_fresh).await;

    let feed = ScriptedFeed::new(Arc::clone(&state))
        .with_newer(Err(FeedError::Status(502)))
        .with_newer(Err(FeedError::Status(502)))
        .with_newer(Err(FeedError::Parse("garbage".into())))
        .with_newer(Ok(vec![cleared(101, time(12, 0))]));
    let calls = Arc::clone(&feed.calls);
    let updater = updater(feed, &state, &topic);
    let shutdown = Shutdown::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { updater.run(shutdown).await })
    };

    let update = events.recv().await.unwrap();
    assert_eq!(update.region.id, 9);
    assert_eq!(state.read().last_cursor, Some(101));
    assert_ne!(state.read().last_update, DateTime::<Utc>::default());

    shutdown.cancel();
    task.await.unwrap().unwrap();

    let calls = calls.lock();
    assert!(calls.len() >= 4);
    for pair in calls[..4].windows(2) {
        assert_backoff(pair[1].at - pair[0].at);
    }
    // Cursor held and last_update untouched until the first success
    assert!(calls[..4].iter().all(|c| c.after == Some(100)));
    assert!(calls[..4]
        .iter()
        .all(|c| c.last_update == DateTime::<Utc>::default()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let state = new_state(Some(100));
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());

    let feed = ScriptedFeed::new(Arc::clone(&state)).with_newer(Err(FeedError::Status(500)));
    let calls = Arc::clone(&feed.calls);
    let updater = updater(feed, &state, &topic);
    let shutdown = Shutdown::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { updater.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    let cancelled_at = Instant::now();
    shutdown.cancel();
    task.await.unwrap().unwrap();

    assert!(Instant::now() - cancelled_at < RETRY_DELAY);
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_backlog_is_retried() {
    let state = new_state(None);
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let mut events = topic.subscribe("test", filter_all).await;

    let feed = ScriptedFeed::new(Arc::clone(&state))
        .with_backlog(Ok(Vec::new()))
        .with_backlog(Ok(vec![raised(100, time(10, 0))]));
    let calls = Arc::clone(&feed.calls);
    let updater = updater(feed, &state, &topic);
    let shutdown = Shutdown::new();
    let task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { updater.run(shutdown).await })
    };

    let update = events.recv().await.unwrap();
    assert!(!update.is_fresh);
    assert_eq!(state.read().last_cursor, Some(100));

    shutdown.cancel();
    task.await.unwrap().unwrap();

    let calls = calls.lock();
    assert_eq!(calls[0].after, None);
    assert_eq!(calls[1].after, None);
    assert_backoff(calls[1].at - calls[0].at);
}

#[tokio::test(start_paused = true)]
async fn test_backlog_error_is_fatal() {
    let state = new_state(None);
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());

    let feed = ScriptedFeed::new(Arc::clone(&state)).with_backlog(Err(FeedError::Status(503)));
    let updater = updater(feed, &state, &topic);

    assert!(updater.run(Shutdown::new()).await.is_err());
    assert_eq!(state.read().last_cursor, None);
}

#[tokio::test]
async fn test_reprocessing_batch_is_idempotent() {
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let batch = vec![
        raised(100, time(10, 0)),
        message(101, "Повітряна тривога в м. Київ", time(10, 5)),
        cleared(102, time(10, 30)),
        message(103, "Повітряна тривога в Криму", time(10, 40)),
        FeedMessage::new(104, "", vec!["тільки один рядок".into()], time(10, 45)),
    ];

    let state = new_state(None);
    let updater = updater(ScriptedFeed::new(Arc::clone(&state)), &state, &topic);
    updater.process_messages(&batch, true).await;
    let first: Vec<(u32, bool)> = state.read().regions.iter().map(|r| (r.id, r.alert)).collect();

    updater.process_messages(&batch, true).await;
    let second: Vec<(u32, bool)> = state.read().regions.iter().map(|r| (r.id, r.alert)).collect();

    assert_eq!(first, second);
    assert_eq!(second.len(), REGION_COUNT);
    assert!(!state.read().find_region(9).unwrap().alert);
    assert!(state.read().find_region(25).unwrap().alert);
}

#[tokio::test]
async fn test_unrecognised_phrase_clears_region() {
    let topic: Arc<Topic<Update>> = Arc::new(Topic::new());
    let state = new_state(None);
    let updater = updater(ScriptedFeed::new(Arc::clone(&state)), &state, &topic);

    updater.process_messages(&[raised(100, time(10, 0))], false).await;
    assert!(state.read().find_region(9).unwrap().alert);

    updater
        .process_messages(&[message(101, "Загроза артобстрілу в Київська область", time(10, 10))], true)
        .await;
    assert!(!state.read().find_region(9).unwrap().alert);
}
