//! Application session.
//!
//! Owns the canvas controller, the persona book, settings and the batch
//! orchestrator, and keeps the collections database in step with them.
//! The host forwards UI events here and awaits batch handles on its runtime,
//! handing each finished item back through [`Session::deliver_result`] and
//! the final report through [`Session::finish_generation`].
//!
//! Everything the host should react to beyond redrawing (sounds, opening
//! the settings dialog) is queued as [`SessionEvent`]s.

use crate::banner::Banner;
use crate::import::{ImportError, ImportFile, prepare_image};
use muse_core::{
    AppSettings, CanvasConfig, CaptionStyle, GenerationResult, ImageRef, ItemId, ModelTier,
    Persona, PersonaBook, PersonaError, Placement,
};
use muse_editor::shortcuts::ShortcutAction;
use muse_editor::{CanvasController, InputEvent, Modifiers};
use muse_gen::{
    BatchHandle, BatchOutcome, BatchReport, BatchState, CaptionBackend, CaptionGenerator,
    CaptionJob, Credentials, GeminiBackend, GenerationError, Orchestrator, RetryPolicy,
};
use muse_store::{Debouncer, SaveRequest, SettingsStore, Storage, rehydrate};
use std::sync::Arc;
use std::time::Duration;

/// Looks up a process environment variable.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Builds a backend once credentials are known.
pub trait BackendConnector {
    type Backend: CaptionBackend;

    fn connect(&self, credentials: Credentials) -> muse_gen::Result<Self::Backend>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiConnector;

impl BackendConnector for GeminiConnector {
    type Backend = GeminiBackend;

    fn connect(&self, credentials: Credentials) -> muse_gen::Result<GeminiBackend> {
        GeminiBackend::new(credentials)
    }
}

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A batch finished with every item captioned.
    GenerationSucceeded,
    GenerationFailed(Banner),
    /// The user cancelled the running batch.
    GenerationCancelled,
    /// Credentials are missing; show the settings dialog.
    OpenSettings,
}

struct Autosave {
    debouncer: Debouncer,
    saved_revision: u64,
    personas_dirty: bool,
}

pub struct Session<C: BackendConnector = GeminiConnector> {
    controller: CanvasController,
    personas: PersonaBook,
    settings: AppSettings,
    settings_store: Option<SettingsStore>,
    orchestrator: Orchestrator,
    connector: C,
    retry_policy: RetryPolicy,
    env: EnvLookup,
    banner: Option<Banner>,
    events: Vec<SessionEvent>,
    autosave: Option<Autosave>,
}

impl<C: BackendConnector> Session<C> {
    pub fn new(settings: AppSettings, connector: C) -> Self {
        let controller = CanvasController::new(settings.canvas, settings.style);
        let personas = PersonaBook::from_parts(Vec::new(), settings.active_persona_id.clone());
        Self {
            controller,
            personas,
            settings,
            settings_store: None,
            orchestrator: Orchestrator::new(),
            connector,
            retry_policy: RetryPolicy::default(),
            env: process_env,
            banner: None,
            events: Vec::new(),
            autosave: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the environment consulted for a default API key.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Write settings to `store` whenever they change.
    pub fn with_settings_store(mut self, store: SettingsStore) -> Self {
        self.settings_store = Some(store);
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn controller(&self) -> &CanvasController {
        &self.controller
    }

    /// Direct controller access. Call [`sync_persistence`](Self::sync_persistence)
    /// after changing items through it.
    pub fn controller_mut(&mut self) -> &mut CanvasController {
        &mut self.controller
    }

    pub fn personas(&self) -> &PersonaBook {
        &self.personas
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn is_generating(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn batch_state(&self) -> BatchState {
        self.orchestrator.state()
    }

    /// Events queued since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Load personas and items from `storage`, then start saving changes
    /// to it. Nothing is written before the load completes.
    pub async fn attach_storage<S: Storage>(
        &mut self,
        storage: Arc<S>,
        window: Duration,
    ) -> muse_store::Result<()> {
        let loader = Arc::clone(&storage);
        let state = tokio::task::spawn_blocking(move || loader.load()).await??;
        log::info!(
            "loaded {} persona(s), {} item(s)",
            state.personas.len(),
            state.items.len()
        );

        let personas_missing = state.personas.is_empty();
        self.personas = PersonaBook::from_parts(state.personas, self.settings.active_persona_id.clone());
        self.controller.restore_items(rehydrate(state.items));

        self.autosave = Some(Autosave {
            debouncer: Debouncer::spawn(storage, window),
            saved_revision: self.controller.store().revision(),
            personas_dirty: personas_missing,
        });
        self.sync_persistence();
        Ok(())
    }

    /// Queue snapshots of whatever changed since the last call. Skipped
    /// while a gesture is in progress; the release triggers it.
    pub fn sync_persistence(&mut self) {
        let Some(autosave) = self.autosave.as_mut() else {
            return;
        };
        if !self.controller.gesture().is_idle() {
            return;
        }
        let revision = self.controller.store().revision();
        if revision != autosave.saved_revision {
            autosave
                .debouncer
                .schedule(SaveRequest::Items(self.controller.items().to_vec()));
            autosave.saved_revision = revision;
        }
        if autosave.personas_dirty {
            autosave
                .debouncer
                .schedule(SaveRequest::Personas(self.personas.personas().to_vec()));
            autosave.personas_dirty = false;
        }
    }

    /// Cancel any batch, write pending snapshots and stop saving.
    pub async fn shutdown(mut self) -> muse_store::Result<()> {
        self.orchestrator.cancel();
        self.sync_persistence();
        if let Some(autosave) = self.autosave.take() {
            autosave.debouncer.flush().await?;
        }
        Ok(())
    }

    fn mark_personas_dirty(&mut self) {
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.personas_dirty = true;
        }
        self.sync_persistence();
    }

    fn persist_settings(&self) {
        if let Some(store) = &self.settings_store {
            if let Err(err) = store.save(&self.settings) {
                log::error!("failed to save settings: {err}");
            }
        }
    }

    // ─── Canvas ──────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        let changed = self.controller.handle_event(event);
        self.sync_persistence();
        changed
    }

    pub fn handle_key(&mut self, key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let action = self.controller.handle_key(key, modifiers);
        self.sync_persistence();
        action
    }

    pub fn handle_key_up(&mut self, key: &str) -> bool {
        let changed = self.controller.handle_key_up(key);
        self.sync_persistence();
        changed
    }

    /// Import one file at the first free grid cell.
    pub fn import_file(&mut self, file: &ImportFile) -> Result<ItemId, ImportError> {
        let image = self.prepare(file)?;
        let id = self.controller.import_image(image, Placement::Auto);
        self.sync_persistence();
        Ok(id)
    }

    /// Import files dropped at screen position (`x`, `y`). Non-image files
    /// are ignored; images that fail to decode raise the import banner.
    /// Any non-empty drop clears the selection first.
    pub fn drop_files(&mut self, files: &[ImportFile], x: f64, y: f64) -> Vec<ItemId> {
        if files.is_empty() {
            return Vec::new();
        }
        let mut images: Vec<ImageRef> = Vec::with_capacity(files.len());
        for file in files.iter().filter(|f| f.is_image()) {
            if let Ok(image) = self.prepare(file) {
                images.push(image);
            }
        }
        if images.is_empty() {
            self.controller.clear_selection();
            return Vec::new();
        }
        let ids = self.controller.drop_images(images, x, y);
        self.sync_persistence();
        ids
    }

    fn prepare(&mut self, file: &ImportFile) -> Result<ImageRef, ImportError> {
        prepare_image(file).inspect_err(|err| {
            log::warn!("{}: import failed: {err}", file.name);
            if matches!(err, ImportError::Image(_)) {
                self.banner = Some(Banner::ImportFailed);
            }
        })
    }

    pub fn delete_item(&mut self, id: ItemId) -> bool {
        let removed = self.controller.delete_item(id);
        self.sync_persistence();
        removed
    }

    pub fn delete_selected(&mut self) -> usize {
        let removed = self.controller.delete_selected();
        self.sync_persistence();
        removed
    }

    pub fn arrange_grid(&mut self) {
        self.controller.arrange_grid();
        self.sync_persistence();
    }

    pub fn show_previous_version(&mut self) -> bool {
        let moved = self.controller.show_previous_version();
        self.sync_persistence();
        moved
    }

    pub fn show_next_version(&mut self) -> bool {
        let moved = self.controller.show_next_version();
        self.sync_persistence();
        moved
    }

    // ─── Settings ────────────────────────────────────────────────────────

    pub fn set_style(&mut self, style: CaptionStyle) -> bool {
        let changed = self.controller.set_style(style);
        if changed {
            self.settings.style = style;
            self.persist_settings();
            self.sync_persistence();
        }
        changed
    }

    pub fn set_model(&mut self, model: ModelTier) {
        self.settings.model = model;
        self.persist_settings();
    }

    /// Advance the model toggle and return the new tier.
    pub fn toggle_model(&mut self) -> ModelTier {
        let next = self.settings.model.cycle();
        self.set_model(next);
        next
    }

    pub fn set_credentials(&mut self, api_key: Option<String>, base_url: Option<String>) {
        self.settings.api_key = api_key;
        self.settings.base_url = base_url;
        self.persist_settings();
    }

    pub fn clear_credentials(&mut self) {
        self.settings.clear_credentials();
        self.persist_settings();
    }

    pub fn set_canvas_config(&mut self, config: CanvasConfig) {
        self.settings.canvas = config;
        self.controller.set_config(config);
        self.persist_settings();
    }

    // ─── Personas ────────────────────────────────────────────────────────

    /// Add a "New Identity" persona and return its id.
    pub fn create_persona(&mut self) -> String {
        let id = self.personas.create_identity().id.clone();
        self.mark_personas_dirty();
        id
    }

    pub fn update_persona(&mut self, persona: Persona) -> Result<(), PersonaError> {
        self.personas.update(persona)?;
        self.mark_personas_dirty();
        Ok(())
    }

    pub fn delete_persona(&mut self, id: &str) -> Result<Persona, PersonaError> {
        let removed = self.personas.delete(id)?;
        self.store_active_persona();
        self.mark_personas_dirty();
        Ok(removed)
    }

    pub fn set_active_persona(&mut self, id: &str) -> Result<(), PersonaError> {
        self.personas.set_active(id)?;
        self.store_active_persona();
        Ok(())
    }

    fn store_active_persona(&mut self) {
        if self.settings.active_persona_id != self.personas.active_id() {
            self.settings.active_persona_id = self.personas.active_id().to_string();
            self.persist_settings();
        }
    }

    // ─── Generation ──────────────────────────────────────────────────────

    /// Start a batch for `targets`, cancelling any batch in flight.
    ///
    /// Returns `None` when nothing was started: no known targets, or the
    /// credentials check failed (which queues the failure events). Must be
    /// called from within a tokio runtime.
    pub fn generate(&mut self, targets: &[ItemId]) -> Option<BatchHandle> {
        self.banner = None;
        let generator = match self.connect() {
            Ok(generator) => generator,
            Err(err) => {
                self.report_failure(&err);
                return None;
            }
        };

        let style = self.controller.style();
        let persona = self.personas.active();
        let model = self.settings.model;
        let jobs: Vec<CaptionJob> = targets
            .iter()
            .filter_map(|id| self.controller.store().get(*id))
            .map(|item| CaptionJob::for_item(item, style, persona, model))
            .collect();
        if jobs.is_empty() {
            log::debug!("nothing to generate");
            return None;
        }
        Some(self.orchestrator.start(generator, jobs))
    }

    /// Start a batch for every selected item.
    pub fn generate_selected(&mut self) -> Option<BatchHandle> {
        let selection = self.controller.selection();
        let targets: Vec<ItemId> = self
            .controller
            .items()
            .iter()
            .map(|item| item.id)
            .filter(|id| selection.contains(*id))
            .collect();
        self.generate(&targets)
    }

    /// Regenerate the primary item. Ignored while a batch is running.
    pub fn refresh(&mut self) -> Option<BatchHandle> {
        if self.orchestrator.is_running() {
            return None;
        }
        let id = self.controller.selection().primary()?;
        self.generate(&[id])
    }

    /// Stop the running batch. The cancellation banner and event are
    /// raised here, once; the batch's own report will be ignored.
    pub fn cancel_generation(&mut self) -> bool {
        if !self.orchestrator.cancel() {
            return false;
        }
        self.banner = Some(Banner::Cancelled);
        self.events.push(SessionEvent::GenerationCancelled);
        true
    }

    /// Apply one finished item of batch `batch_id`. The result lands only
    /// while that batch is still current; failures are left for the report.
    pub fn deliver_result(
        &mut self,
        batch_id: u64,
        item: ItemId,
        outcome: muse_gen::Result<GenerationResult>,
    ) -> bool {
        let Ok(result) = outcome else {
            return false;
        };
        if self.orchestrator.current_batch() != Some(batch_id) {
            log::debug!("batch {batch_id}: late result for {item} dropped");
            return false;
        }
        if !self.controller.append_result(item, result) {
            log::debug!("{item} was deleted before its captions arrived");
            return false;
        }
        self.sync_persistence();
        true
    }

    /// Apply a joined batch. Returns `false` for superseded or cancelled
    /// batches, whose reports are dropped.
    pub fn finish_generation(&mut self, report: BatchReport) -> bool {
        if !self.orchestrator.settle(&report) {
            return false;
        }
        let BatchReport {
            outcome, results, ..
        } = report;

        for (id, result) in results {
            if !self.controller.append_result(id, result) {
                log::debug!("{id} was deleted before its captions arrived");
            }
        }
        match outcome {
            BatchOutcome::Completed => self.events.push(SessionEvent::GenerationSucceeded),
            BatchOutcome::Cancelled => {
                self.banner = Some(Banner::Cancelled);
                self.events.push(SessionEvent::GenerationCancelled);
            }
            BatchOutcome::Failed(err) => self.report_failure(&err),
        }
        self.sync_persistence();
        true
    }

    /// Drive `handle` to the end, applying each item as it finishes.
    pub async fn drive(&mut self, mut handle: BatchHandle) -> bool {
        let batch_id = handle.id();
        while let Some((item, outcome)) = handle.join_next().await {
            self.deliver_result(batch_id, item, outcome);
        }
        self.finish_generation(handle.join().await)
    }

    /// Start, drive and settle a batch in one go.
    pub async fn run_generation(&mut self, targets: &[ItemId]) -> bool {
        match self.generate(targets) {
            Some(handle) => self.drive(handle).await,
            None => false,
        }
    }

    fn connect(&self) -> muse_gen::Result<Arc<CaptionGenerator<C::Backend>>> {
        let credentials = Credentials::resolve_with(
            self.settings.api_key.as_deref(),
            self.settings.base_url.as_deref(),
            self.env,
        )?;
        let backend = self.connector.connect(credentials)?;
        Ok(Arc::new(CaptionGenerator::with_policy(
            backend,
            self.retry_policy.clone(),
        )))
    }

    fn report_failure(&mut self, err: &GenerationError) {
        log::warn!("generation failed: {err}");
        let banner = Banner::from_error(err);
        let open_settings = banner.requests_settings();
        self.events.push(SessionEvent::GenerationFailed(banner.clone()));
        if open_settings {
            self.events.push(SessionEvent::OpenSettings);
        }
        self.banner = Some(banner);
    }
}

impl Session<GeminiConnector> {
    /// A session talking to the hosted backend.
    pub fn with_gemini(settings: AppSettings) -> Self {
        Self::new(settings, GeminiConnector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn session() -> Session {
        Session::with_gemini(AppSettings::default()).with_env(no_env)
    }

    #[test]
    fn toggle_model_cycles() {
        let mut s = session();
        assert_eq!(s.settings().model, ModelTier::Lite);
        assert_eq!(s.toggle_model(), ModelTier::Pro3);
        assert_eq!(s.toggle_model(), ModelTier::Pro25);
    }

    #[test]
    fn deleting_active_persona_updates_settings() {
        let mut s = session();
        let id = s.create_persona();
        s.set_active_persona(&id).unwrap();
        assert_eq!(s.settings().active_persona_id, id);

        s.delete_persona(&id).unwrap();
        assert_eq!(s.settings().active_persona_id, muse_core::persona::DEFAULT_PERSONA_ID);
        assert_eq!(
            s.delete_persona(muse_core::persona::DEFAULT_PERSONA_ID),
            Err(PersonaError::LastPersona)
        );
    }

    #[test]
    fn clearing_credentials_keeps_other_settings() {
        let mut s = session();
        s.set_credentials(Some("k".into()), Some("https://proxy".into()));
        s.set_model(ModelTier::Flash);
        s.clear_credentials();
        assert_eq!(s.settings().api_key, None);
        assert_eq!(s.settings().base_url, None);
        assert_eq!(s.settings().model, ModelTier::Flash);
    }

    #[test]
    fn style_switch_is_remembered() {
        let mut s = session();
        assert!(s.set_style(CaptionStyle::OneLiner));
        assert!(!s.set_style(CaptionStyle::OneLiner));
        assert_eq!(s.settings().style, CaptionStyle::OneLiner);
        assert_eq!(s.controller().style(), CaptionStyle::OneLiner);
    }

    #[test]
    fn cancel_without_batch_is_silent() {
        let mut s = session();
        assert!(!s.cancel_generation());
        assert!(s.take_events().is_empty());
        assert_eq!(s.banner(), None);
    }
}
