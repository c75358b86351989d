//! End-to-end session behaviour with scripted backends and in-memory
//! storage.

use image::{DynamicImage, ImageFormat, RgbImage};
use muse_app::{BackendConnector, Banner, ImportFile, Session, SessionEvent};
use muse_core::{AppSettings, CaptionStyle, ModelTier, Point};
use muse_gen::{
    BatchState, CaptionBackend, ContentRequest, Credentials, GenerationError, Result,
    RetryPolicy,
};
use muse_store::{MemoryStorage, StoredState};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VALID: &str = r##"{"captions": [
  {"tone": "dry", "text": "parking lot poetry", "translation": "停车场诗篇", "emoji": "🅿️"},
  {"tone": "witty", "text": "golden hour, zero plans", "translation": "黄金时刻，毫无计划", "emoji": "🌇"}
], "hashtags": ["#streetframes", "#goldenhour"]}"##;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn photo(name: &str) -> ImportFile {
    sized_photo(name, 64, 48)
}

fn sized_photo(name: &str, width: u32, height: u32) -> ImportFile {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    ImportFile {
        name: name.into(),
        mime_type: "image/png".into(),
        bytes,
    }
}

// ─── Scripted backend ────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    payloads: Mutex<Vec<Result<String>>>,
    tiers: Mutex<Vec<ModelTier>>,
    calls: AtomicUsize,
    delay: Duration,
    /// Image data that answers after its own delay.
    slow: Mutex<Option<(String, Duration)>>,
}

impl Script {
    fn new(mut payloads: Vec<Result<String>>, delay: Duration) -> Arc<Self> {
        payloads.reverse();
        Arc::new(Self {
            payloads: Mutex::new(payloads),
            delay,
            ..Self::default()
        })
    }
}

struct Shared(Arc<Script>);

impl CaptionBackend for Shared {
    async fn generate_content(&self, request: &ContentRequest) -> Result<String> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0.tiers.lock().unwrap().push(request.model);
        let delay = match &*self.0.slow.lock().unwrap() {
            Some((data, slow)) if *data == request.image_data => *slow,
            _ => self.0.delay,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.0.payloads.lock().unwrap().pop();
        next.unwrap_or_else(|| Ok(VALID.to_string()))
    }
}

struct Connector(Arc<Script>);

impl BackendConnector for Connector {
    type Backend = Shared;

    fn connect(&self, credentials: Credentials) -> Result<Shared> {
        assert_eq!(credentials.api_key, "test-key");
        Ok(Shared(Arc::clone(&self.0)))
    }
}

fn session_with(script: &Arc<Script>, settings: AppSettings) -> Session<Connector> {
    Session::new(settings, Connector(Arc::clone(script)))
        .with_env(no_env)
        .with_retry_policy(RetryPolicy::immediate(10))
}

fn keyed_settings() -> AppSettings {
    AppSettings {
        api_key: Some("test-key".into()),
        ..AppSettings::default()
    }
}

// ─── Scenario ────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_generate_and_persist() {
    init_logger();
    let script = Script::new(
        vec![Ok("{captions: [{tone: \"dry\", text: \"half a payload\"".into())],
        Duration::ZERO,
    );
    let settings = AppSettings {
        model: ModelTier::Pro25,
        style: CaptionStyle::Social,
        ..keyed_settings()
    };
    let mut session = session_with(&script, settings);
    let storage = Arc::new(MemoryStorage::default());
    session
        .attach_storage(Arc::clone(&storage), Duration::from_millis(10))
        .await
        .unwrap();

    let id = session.import_file(&photo("first.png")).unwrap();
    let item = session.controller().store().get(id).unwrap();
    assert_eq!(item.position, Point::new(0.0, 0.0));
    assert!(session.controller().selection().contains(id));

    let handle = session.generate_selected().expect("batch should start");
    assert_eq!(session.batch_state(), BatchState::Running);
    let report = handle.join().await;
    assert!(session.finish_generation(report));

    let item = session.controller().store().get(id).unwrap();
    assert_eq!(item.history.len(), 1);
    assert_eq!(item.view_index, Some(0));
    let result = &item.history[0];
    assert!(matches!(result.model_used, ModelTier::Pro25 | ModelTier::Flash));
    assert_eq!(result.captions.len(), 2);
    assert_eq!(
        session.controller().visible_result().map(|r| r.hashtags.len()),
        Some(2)
    );
    assert_eq!(session.take_events(), vec![SessionEvent::GenerationSucceeded]);
    assert_eq!(session.batch_state(), BatchState::Completed);
    assert_eq!(
        *script.tiers.lock().unwrap(),
        vec![ModelTier::Pro25, ModelTier::Flash]
    );

    session.shutdown().await.unwrap();
    let saved = storage.snapshot();
    assert_eq!(saved.items.len(), 1);
    assert_eq!(saved.items[0].history.len(), 1);
    assert_eq!(saved.personas.len(), 1);
}

#[tokio::test]
async fn reload_restores_items_with_fresh_handles() {
    init_logger();
    let script = Script::new(vec![], Duration::ZERO);
    let storage = Arc::new(MemoryStorage::default());

    let mut first = session_with(&script, keyed_settings());
    first
        .attach_storage(Arc::clone(&storage), Duration::from_millis(10))
        .await
        .unwrap();
    let id = first.import_file(&photo("keep.png")).unwrap();
    first.shutdown().await.unwrap();

    let stored: StoredState = storage.snapshot();
    assert_eq!(stored.items.len(), 1);
    assert_eq!(stored.items[0].id, id);

    let mut second = session_with(&script, keyed_settings());
    second
        .attach_storage(Arc::clone(&storage), Duration::from_millis(10))
        .await
        .unwrap();
    let item = second.controller().store().get(id).unwrap();
    assert!(item.image.handle.is_some());
    assert!(second.controller().selection().is_empty());
}

// ─── Credentials ─────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_short_circuit() {
    init_logger();
    let script = Script::new(vec![], Duration::ZERO);
    let mut session = session_with(&script, AppSettings::default());
    let id = session.import_file(&photo("nokey.png")).unwrap();

    assert!(session.generate(&[id]).is_none());
    assert_eq!(session.banner(), Some(&Banner::MissingCredentials));
    assert_eq!(
        session.take_events(),
        vec![
            SessionEvent::GenerationFailed(Banner::MissingCredentials),
            SessionEvent::OpenSettings,
        ]
    );
    assert_eq!(script.calls.load(Ordering::SeqCst), 0);
    assert!(!session.is_generating());
    assert!(session.controller().store().get(id).unwrap().history.is_empty());
}

#[tokio::test]
async fn region_failure_raises_distinct_banner() {
    init_logger();
    let script = Script::new(
        vec![Err(GenerationError::RegionRestricted("location not supported".into()))],
        Duration::ZERO,
    );
    let mut session = session_with(&script, keyed_settings());
    let id = session.import_file(&photo("far.png")).unwrap();

    assert!(session.run_generation(&[id]).await);
    assert_eq!(
        session.banner(),
        Some(&Banner::RegionRestricted("location not supported".into()))
    );
    assert_eq!(script.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.batch_state(), BatchState::Failed);
    assert!(session.controller().store().get(id).unwrap().history.is_empty());
}

// ─── Cancellation ────────────────────────────────────────────────────────

#[tokio::test]
async fn newer_batch_wins() {
    init_logger();
    let script = Script::new(vec![], Duration::from_millis(30));
    let mut session = session_with(&script, keyed_settings());
    let id = session.import_file(&photo("twice.png")).unwrap();

    let first = session.generate(&[id]).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = session.generate(&[id]).unwrap();

    let (stale, fresh) = tokio::join!(first.join(), second.join());
    assert!(!session.finish_generation(stale));
    assert!(session.finish_generation(fresh));
    assert_eq!(session.controller().store().get(id).unwrap().history.len(), 1);
    assert_eq!(session.take_events(), vec![SessionEvent::GenerationSucceeded]);
}

#[tokio::test]
async fn user_cancel_reports_once() {
    init_logger();
    let script = Script::new(vec![], Duration::from_millis(30));
    let mut session = session_with(&script, keyed_settings());
    let a = session.import_file(&photo("a.png")).unwrap();
    let b = session.import_file(&photo("b.png")).unwrap();

    let handle = session.generate(&[a, b]).unwrap();
    assert!(session.refresh().is_none());
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(session.cancel_generation());
    assert_eq!(session.banner(), Some(&Banner::Cancelled));

    let report = handle.join().await;
    assert!(!session.finish_generation(report));
    assert_eq!(session.take_events(), vec![SessionEvent::GenerationCancelled]);
    assert_eq!(session.batch_state(), BatchState::Aborted);
    for id in [a, b] {
        assert!(session.controller().store().get(id).unwrap().history.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn finished_item_keeps_its_result_after_cancel() {
    init_logger();
    let script = Script::new(vec![], Duration::from_millis(5));
    let mut session = session_with(&script, keyed_settings());
    let fast = session.import_file(&photo("fast.png")).unwrap();
    let slow = session.import_file(&sized_photo("slow.png", 96, 64)).unwrap();
    let slow_data = session.controller().store().get(slow).unwrap().image.data.clone();
    *script.slow.lock().unwrap() = Some((slow_data, Duration::from_millis(500)));

    let mut handle = session.generate(&[fast, slow]).unwrap();
    let batch = handle.id();
    let (item, outcome) = handle.join_next().await.unwrap();
    assert_eq!(item, fast);
    assert!(session.deliver_result(batch, item, outcome));
    assert!(session.cancel_generation());

    let (item, outcome) = handle.join_next().await.unwrap();
    assert_eq!(item, slow);
    assert!(!session.deliver_result(batch, item, outcome));
    assert!(!session.finish_generation(handle.join().await));

    assert_eq!(session.controller().store().get(fast).unwrap().history.len(), 1);
    assert!(session.controller().store().get(slow).unwrap().history.is_empty());
    assert_eq!(session.take_events(), vec![SessionEvent::GenerationCancelled]);
    assert_eq!(session.batch_state(), BatchState::Aborted);
}

#[tokio::test(start_paused = true)]
async fn superseded_batch_keeps_results_delivered_in_time() {
    init_logger();
    let script = Script::new(vec![], Duration::from_millis(5));
    let mut session = session_with(&script, keyed_settings());
    let fast = session.import_file(&photo("early.png")).unwrap();
    let slow = session.import_file(&sized_photo("late.png", 96, 64)).unwrap();
    let slow_data = session.controller().store().get(slow).unwrap().image.data.clone();
    *script.slow.lock().unwrap() = Some((slow_data, Duration::from_millis(500)));

    let mut first = session.generate(&[fast, slow]).unwrap();
    let (item, outcome) = first.join_next().await.unwrap();
    assert!(session.deliver_result(first.id(), item, outcome));

    let second = session.generate(&[fast]).unwrap();
    let stale = first.join().await;
    assert!(stale.results.is_empty());
    assert!(!session.finish_generation(stale));
    assert!(session.drive(second).await);

    assert_eq!(session.controller().store().get(fast).unwrap().history.len(), 2);
    assert!(session.controller().store().get(slow).unwrap().history.is_empty());
    assert_eq!(session.take_events(), vec![SessionEvent::GenerationSucceeded]);
}

// ─── Import ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn drop_skips_non_images_and_flags_broken_ones() {
    init_logger();
    let script = Script::new(vec![], Duration::ZERO);
    let mut session = session_with(&script, keyed_settings());
    let files = vec![
        photo("one.png"),
        ImportFile {
            name: "readme.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"hi".to_vec(),
        },
        ImportFile {
            name: "broken.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        },
        photo("two.png"),
    ];

    let ids = session.drop_files(&files, 400.0, 300.0);
    assert_eq!(ids.len(), 2);
    assert_eq!(session.controller().selection().len(), 2);
    assert_eq!(session.banner(), Some(&Banner::ImportFailed));
}

#[tokio::test]
async fn failed_drop_still_clears_selection() {
    init_logger();
    let script = Script::new(vec![], Duration::ZERO);
    let mut session = session_with(&script, keyed_settings());
    let id = session.import_file(&photo("kept.png")).unwrap();
    assert!(session.controller().selection().contains(id));

    let broken = ImportFile {
        name: "broken.jpg".into(),
        mime_type: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8],
    };
    assert!(session.drop_files(&[broken], 10.0, 10.0).is_empty());
    assert!(session.controller().selection().is_empty());
    assert_eq!(session.banner(), Some(&Banner::ImportFailed));
    assert_eq!(session.controller().store().len(), 1);
}
