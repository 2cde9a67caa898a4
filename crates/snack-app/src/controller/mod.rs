//! Session controller: owns the entry store and keeps it in sync with the
//! session worker.
//!
//! ## Data flow
//!
//! ```text
//! editor call ──▶ EntryStore ──▶ debounce ──▶ SEND_CODE / SAVE ──▶ worker
//!                     ▲                                              │
//!                     └──── update(Message::Push(STATE)) ◀── push ──┘
//! ```
//!
//! Editor-facing mutations are plain `&mut self` methods. Everything
//! asynchronous arrives as a [`Message`] and is applied one at a time by
//! [`SessionController::update`], driven by [`SessionController::step`].

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use snack_core::entries::{basename, parent_path, unique_path};
use snack_core::events::{
    DependencyError, DeviceDescriptor, ErrorAnnotation, LogLine, PresenceEvent, PresenceStatus,
    PushKind, SessionEvent,
};
use snack_core::prelude::*;
use snack_core::{
    is_feature_supported, manifest_entry, parse_manifest, Dependencies, Entry, EntryStore,
    Feature, RingBuffer, SessionFiles, SessionState, MANIFEST_PATH,
};
use snack_session::{
    parse_upload_result, protocol, send_code_payload, upload_asset_payload, Property,
    SessionChannel, Subscription,
};

use crate::config::{DeviceSettings, SessionSettings, Settings};
use crate::controller_event::ControllerEvent;
use crate::debounce::Debouncer;
use crate::message::Message;
use crate::project::Project;
use crate::save_status::SaveStatus;
use crate::tabs::TabHandle;


/// Device log lines kept in memory
pub const LOG_CAPACITY: usize = 100;

const EVENT_CAPACITY: usize = 256;

const PUSH_KINDS: [PushKind; 6] = [
    PushKind::State,
    PushKind::Presence,
    PushKind::Error,
    PushKind::Log,
    PushKind::Channel,
    PushKind::Exited,
];

pub struct SessionController {
    project_key: String,
    settings: SessionSettings,
    device: DeviceSettings,

    store: EntryStore,
    session: SessionState,
    status: SaveStatus,
    saved_id: Option<String>,
    /// Bumped by every local edit; lets late save completions detect staleness
    edit_generation: u64,
    /// Files as of the last `INIT` or `SEND_CODE`
    last_sent: SessionFiles,
    manifest_focused: bool,

    dependency_errors: BTreeMap<String, String>,
    devices: Vec<DeviceDescriptor>,
    error_annotation: Option<ErrorAnnotation>,
    logs: RingBuffer<LogLine>,
    channel_id: Option<String>,
    worker_exit: Option<Option<i32>>,

    channel: SessionChannel,
    subscriptions: Vec<Subscription>,
    msg_tx: mpsc::UnboundedSender<Message>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    event_tx: broadcast::Sender<ControllerEvent>,

    code_push: Debouncer,
    autosave: Debouncer,
    autosave_enabled: bool,
    tab: Option<TabHandle>,
    tab_forwarder: Option<JoinHandle<()>>,

    opened: bool,
    shut_down: bool,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("project", &self.project_key)
            .field("status", &self.status)
            .field("entries", &self.store.len())
            .field("opened", &self.opened)
            .finish()
    }
}

impl SessionController {
    /// Build a controller for `project`. Nothing is sent until [`open`](Self::open).
    pub fn new(channel: SessionChannel, project: Project, settings: &Settings) -> Self {
        let session_settings = settings.session.clone();
        let mut store = EntryStore::from_files(&project.files, &session_settings.entry_point);
        let session = SessionState::from_defaults(
            project.name.clone(),
            project.description,
            project.files,
            project.dependencies,
            project.sdk_version,
        );

        if is_feature_supported(Feature::ProjectDependencies, &session.sdk_version) {
            store.upsert_virtual(manifest_entry(&session.dependencies));
        }
        let entry_point = store.entry_point().to_string();
        if store.get(&entry_point).is_some() {
            let _ = store.focus(&entry_point);
        }

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            project_key: project.name,
            code_push: Debouncer::new("code-push", session_settings.code_push_debounce()),
            autosave: Debouncer::new("autosave", session_settings.autosave_debounce()),
            settings: session_settings,
            device: settings.device.clone(),
            store,
            session,
            status: SaveStatus::default(),
            saved_id: None,
            edit_generation: 0,
            last_sent: SessionFiles::new(),
            manifest_focused: false,
            dependency_errors: BTreeMap::new(),
            devices: Vec::new(),
            error_annotation: None,
            logs: RingBuffer::new(LOG_CAPACITY),
            channel_id: None,
            worker_exit: None,
            channel,
            subscriptions: Vec::new(),
            msg_tx,
            msg_rx,
            event_tx,
            autosave_enabled: true,
            tab: None,
            tab_forwarder: None,
            opened: false,
            shut_down: false,
        }
    }

    /// Take part in cross-tab autosave coordination.
    pub fn with_tab(mut self, tab: TabHandle) -> Self {
        self.tab = Some(tab);
        self
    }

    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────

    /// Subscribe to worker pushes and start the session.
    ///
    /// `INIT` and `START` are queued here; their outcomes arrive later as
    /// messages.
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(Error::protocol("session already opened"));
        }
        if self.shut_down {
            return Err(Error::ChannelClosed);
        }
        self.opened = true;
        info!("Opening session for {}", self.project_key);

        for kind in PUSH_KINDS {
            let tx = self.msg_tx.clone();
            let subscription = self.channel.subscribe(kind, move |event| {
                let _ = tx.send(Message::Push(event.clone()));
            });
            self.subscriptions.push(subscription);
        }

        let files = self.store.to_files();
        let init = self.channel.create(json!({
            "name": self.session.name,
            "description": self.session.description,
            "files": files,
            "dependencies": self.session.dependencies,
            "sdkVersion": self.session.sdk_version,
        }));
        self.last_sent = files;
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Message::Created(init.await));
        });

        if let Some(device_id) = self.device.device_id.clone() {
            self.channel.set_property(Property::DeviceId, device_id);
        }
        if let Some(user) = self.device.user.clone() {
            self.channel.set_property(Property::User, user);
        }

        let start = self.channel.call(protocol::START, Value::Null);
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Message::Started(start.await.map(|_| ())));
        });

        self.start_tab_coordination();
        Ok(())
    }

    fn start_tab_coordination(&mut self) {
        let Some(tab) = self.tab.as_ref() else {
            return;
        };

        let mut rx = tab.subscribe();
        tab.claim(&self.project_key);

        let tx = self.msg_tx.clone();
        self.tab_forwarder = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notice) => {
                        if tx.send(Message::Tab(notice)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} tab notices", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Cancel timers, drop push listeners, and terminate the worker.
    /// Pending requests are left unsettled. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down session for {}", self.project_key);

        self.code_push.cancel();
        self.autosave.cancel();
        for mut subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
        if let Some(forwarder) = self.tab_forwarder.take() {
            forwarder.abort();
        }
        self.channel.dispose();
    }

    /// Receive and apply the next message. Returns false once the queue is
    /// closed.
    pub async fn step(&mut self) -> bool {
        match self.msg_rx.recv().await {
            Some(message) => {
                self.update(message);
                true
            }
            None => false,
        }
    }

    /// Apply every message already queued. Returns how many were applied.
    pub fn process_queued(&mut self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.msg_rx.try_recv() {
            self.update(message);
            count += 1;
        }
        count
    }

    /// Listen for controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.event_tx.send(event);
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn entries(&self) -> &[Entry] {
        self.store.entries()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn saved_id(&self) -> Option<&str> {
        self.saved_id.as_deref()
    }

    /// Failing dependencies from the latest sync, by name
    pub fn dependency_errors(&self) -> &BTreeMap<String, String> {
        &self.dependency_errors
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn error_annotation(&self) -> Option<&ErrorAnnotation> {
        self.error_annotation.as_ref()
    }

    pub fn logs(&self) -> &RingBuffer<LogLine> {
        &self.logs
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// `Some(code)` once the worker has exited
    pub fn worker_exit(&self) -> Option<Option<i32>> {
        self.worker_exit
    }

    pub fn is_autosave_enabled(&self) -> bool {
        self.settings.autosave && self.autosave_enabled
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }

    // ─────────────────────────────────────────────────────────
    // Editor Mutations
    // ─────────────────────────────────────────────────────────

    /// Replace the text of a file.
    pub fn edit(&mut self, path: &str, content: &str) -> Result<()> {
        if !self.store.update_content(path, content)? {
            return Ok(());
        }

        if self.is_manifest(path) {
            self.apply_manifest(content);
        }
        self.mark_changed();
        Ok(())
    }

    /// Create an entry relative to `parent`. Returns the path it got.
    pub fn create_entry(
        &mut self,
        parent: Option<&str>,
        prototype: Entry,
        suffix: Option<&str>,
    ) -> Result<String> {
        let path = self.store.create_at(parent, prototype, suffix)?;
        debug!("Created {}", path);
        self.mark_changed();
        Ok(path)
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        self.reject_virtual(old_path)?;
        self.store.rename(old_path, new_path)?;
        self.mark_changed();
        Ok(())
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.reject_virtual(path)?;
        self.store.delete(path)?;
        self.mark_changed();
        Ok(())
    }

    /// Focus an entry. The manifest is re-rendered from the session's
    /// dependencies when it regains focus, never while it has it.
    pub fn focus(&mut self, path: &str) -> Result<()> {
        self.store.focus(path)?;

        let focusing_manifest = self.is_manifest(path);
        if focusing_manifest && !self.manifest_focused {
            self.store
                .upsert_virtual(manifest_entry(&self.session.dependencies));
        }
        self.manifest_focused = focusing_manifest;
        Ok(())
    }

    pub fn blur(&mut self) {
        self.store.blur();
        self.manifest_focused = false;
    }

    fn is_manifest(&self, path: &str) -> bool {
        path == MANIFEST_PATH && self.store.get(path).is_some_and(Entry::is_virtual)
    }

    fn reject_virtual(&self, path: &str) -> Result<()> {
        match self.store.get(path) {
            Some(entry) if entry.is_virtual() => Err(Error::invalid_path(
                path,
                "synthesized entries cannot be renamed or deleted",
            )),
            _ => Ok(()),
        }
    }

    /// A valid manifest with a different dependency map is synced.
    fn apply_manifest(&mut self, content: &str) {
        match parse_manifest(content) {
            Ok(dependencies) if self.session.dependencies_differ(&dependencies) => {
                self.sync_dependencies(dependencies);
            }
            Ok(_) => trace!("Manifest edit left dependencies unchanged"),
            Err(e) => debug!("Manifest not applied: {}", e),
        }
    }

    fn mark_changed(&mut self) {
        self.edit_generation += 1;
        self.set_status(self.status.on_edit());

        if self.shut_down {
            return;
        }
        self.code_push.schedule(&self.msg_tx, Message::CodePushDue);
        if self.autosave_allowed() {
            self.autosave.schedule(&self.msg_tx, Message::AutosaveDue);
        }
    }

    fn set_status(&mut self, new: SaveStatus) {
        let old = self.status;
        if old != new {
            debug!("Save status {} -> {}", old, new);
            self.status = new;
            self.emit(ControllerEvent::StatusChanged { old, new });
        }
    }

    fn autosave_allowed(&self) -> bool {
        self.opened && !self.shut_down && self.is_autosave_enabled()
    }

    // ─────────────────────────────────────────────────────────
    // Session Requests
    // ─────────────────────────────────────────────────────────

    /// Publish the project. Pending edits are pushed first.
    pub fn save(&mut self) {
        self.flush_code();
        self.set_status(self.status.begin_publish());
        self.request_save(false);
    }

    fn autosave_due(&mut self) {
        if !self.autosave_allowed() {
            debug!("Autosave skipped: disabled for this tab");
            return;
        }
        let Some(status) = self.status.begin_draft() else {
            trace!("Autosave skipped: nothing to save");
            return;
        };
        self.flush_code();
        self.set_status(status);
        self.request_save(true);
    }

    fn request_save(&mut self, draft: bool) {
        let pending = self
            .channel
            .call(protocol::SAVE, json!({ "isDraft": draft }));
        let generation = self.edit_generation;
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let result = pending.await.and_then(|data| {
                data.get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::protocol("SAVE response without an id"))
            });
            let _ = tx.send(Message::SaveFinished {
                generation,
                draft,
                result,
            });
        });
    }

    /// Push the current files now instead of waiting for the debounce.
    pub fn flush_code(&mut self) {
        self.code_push.cancel();
        self.push_code();
    }

    fn push_code(&mut self) {
        let files = self.store.to_files();
        if files == self.last_sent {
            trace!("SEND_CODE skipped: nothing new");
            return;
        }
        self.channel
            .notify(protocol::SEND_CODE, send_code_payload(&files));
        self.emit(ControllerEvent::CodePushed { files: files.len() });
        self.last_sent = files;
    }

    /// Ask the worker to resolve `dependencies`. Each failing dependency is
    /// reported as it is found.
    pub fn sync_dependencies(&mut self, dependencies: Dependencies) {
        info!("Syncing {} dependencies", dependencies.len());
        self.dependency_errors.clear();

        let progress_tx = self.msg_tx.clone();
        let pending = self.channel.call_with_progress(
            protocol::SYNC_DEPENDENCIES,
            json!({ "dependencies": dependencies }),
            move |data| match serde_json::from_value::<DependencyError>(data) {
                Ok(error) => {
                    let _ = progress_tx.send(Message::DependencyFailed(error));
                }
                Err(e) => warn!("Unreadable dependency callback: {}", e),
            },
        );

        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Message::DependenciesSynced(pending.await.map(|_| ())));
        });
    }

    /// Upload `bytes` and add them as an asset at `path` once the worker
    /// returns a uri.
    pub fn upload_asset(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        snack_core::entries::validate_path(path)?;
        if self.store.contains_ignoring_case(path) {
            return Err(Error::path_conflict(path));
        }

        let pending = self.channel.call(
            protocol::UPLOAD_ASSET,
            upload_asset_payload(basename(path), bytes),
        );
        let tx = self.msg_tx.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            let result = pending.await.and_then(|data| parse_upload_result(&data));
            let _ = tx.send(Message::AssetUploaded { path, result });
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Properties (fire-and-forget)
    // ─────────────────────────────────────────────────────────

    pub fn set_sdk_version(&mut self, version: &str) {
        self.channel.set_property(Property::SdkVersion, version);
        self.mark_changed();
    }

    pub fn set_name(&mut self, name: &str) {
        self.channel.set_property(Property::Name, name);
        self.mark_changed();
    }

    pub fn set_description(&mut self, description: &str) {
        self.channel.set_property(Property::Description, description);
        self.mark_changed();
    }

    pub fn set_user(&mut self, user: &str) {
        self.device.user = Some(user.to_string());
        self.channel.set_property(Property::User, user);
    }

    pub fn set_device_id(&mut self, device_id: &str) {
        self.device.device_id = Some(device_id.to_string());
        self.channel.set_property(Property::DeviceId, device_id);
    }

    /// Make this tab the one that autosaves the project.
    pub fn claim_autosave(&mut self) {
        if let Some(tab) = &self.tab {
            tab.claim(&self.project_key);
        }
        if !self.autosave_enabled {
            self.autosave_enabled = true;
            self.emit(ControllerEvent::AutosaveToggled { enabled: true });
        }
    }

    // ─────────────────────────────────────────────────────────
    // Update
    // ─────────────────────────────────────────────────────────

    /// Apply one message.
    pub fn update(&mut self, message: Message) {
        match message {
            Message::Push(event) => self.handle_push(event),
            Message::CodePushDue => self.push_code(),
            Message::AutosaveDue => self.autosave_due(),
            Message::Created(result) => match result {
                Ok(()) => info!("Session created"),
                Err(e) => {
                    error!("Session INIT failed: {}", e);
                    self.emit(ControllerEvent::SessionFailed {
                        message: e.to_string(),
                    });
                }
            },
            Message::Started(result) => match result {
                Ok(()) => {
                    info!("Session started");
                    self.emit(ControllerEvent::SessionStarted);
                }
                Err(e) => {
                    error!("Session START failed: {}", e);
                    self.emit(ControllerEvent::SessionFailed {
                        message: e.to_string(),
                    });
                }
            },
            Message::SaveFinished {
                generation,
                draft,
                result,
            } => self.handle_save_finished(generation, draft, result),
            Message::DependencyFailed(error) => {
                warn!("Dependency {} failed: {}", error.name, error.message);
                self.dependency_errors
                    .insert(error.name.clone(), error.message.clone());
                self.emit(ControllerEvent::DependencyFailed(error));
            }
            Message::DependenciesSynced(result) => {
                if let Err(e) = &result {
                    warn!("Dependency sync failed: {}", e);
                }
                self.emit(ControllerEvent::DependenciesSynced {
                    ok: result.is_ok(),
                });
            }
            Message::AssetUploaded { path, result } => self.handle_asset_uploaded(path, result),
            Message::Tab(notice) => {
                let yields = self
                    .tab
                    .as_ref()
                    .is_some_and(|tab| tab.yields_to(&notice, &self.project_key));
                if yields && self.autosave_enabled {
                    info!("Another tab took over autosave");
                    self.autosave_enabled = false;
                    self.autosave.cancel();
                    self.emit(ControllerEvent::AutosaveToggled { enabled: false });
                }
            }
        }
    }

    fn handle_save_finished(&mut self, generation: u64, draft: bool, result: Result<String>) {
        match result {
            Ok(id) => {
                let current = generation == self.edit_generation;
                if !current {
                    debug!("Save {} completed after newer edits", id);
                }
                self.saved_id = Some(id.clone());
                self.set_status(self.status.on_saved(draft, current));
                self.emit(ControllerEvent::Saved { id, draft });
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                self.set_status(self.status.on_failed(draft));
                self.emit(ControllerEvent::SaveFailed {
                    draft,
                    message: e.to_string(),
                });
            }
        }
    }

    fn handle_asset_uploaded(&mut self, path: String, result: Result<String>) {
        let uri = match result {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Upload of {} failed: {}", path, e);
                self.emit(ControllerEvent::AssetUploadFailed {
                    path,
                    message: e.to_string(),
                });
                return;
            }
        };

        // Something may have taken the path while the upload was in flight
        let paths = self.store.paths();
        let final_path = unique_path(&paths, &path, None);

        self.ensure_folders(&final_path);
        match self
            .store
            .insert(Entry::asset_file(final_path.clone(), uri.clone()))
        {
            Ok(()) => {
                self.mark_changed();
                self.emit(ControllerEvent::AssetUploaded {
                    path: final_path,
                    uri,
                });
            }
            Err(e) => {
                warn!("Could not add uploaded asset {}: {}", final_path, e);
                self.emit(ControllerEvent::AssetUploadFailed {
                    path: final_path,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Insert any missing ancestor folders of `path`.
    fn ensure_folders(&mut self, path: &str) {
        let mut ancestors = Vec::new();
        let mut current = parent_path(path);
        while let Some(folder) = current {
            ancestors.push(folder.to_string());
            current = parent_path(folder);
        }

        for folder in ancestors.into_iter().rev() {
            if self.store.get(&folder).is_none() {
                if let Err(e) = self.store.insert(Entry::folder(folder.clone())) {
                    warn!("Could not create folder {}: {}", folder, e);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Pushes
    // ─────────────────────────────────────────────────────────

    fn handle_push(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::State(state) => self.reconcile(*state),
            SessionEvent::Presence(presence) => self.apply_presence(presence),
            SessionEvent::Error(errors) => {
                self.error_annotation = ErrorAnnotation::from_errors(&errors);
                self.emit(ControllerEvent::ErrorAnnotated(self.error_annotation.clone()));
            }
            SessionEvent::Log(log) => {
                self.logs.push(LogLine::now(log.clone()));
                self.emit(ControllerEvent::Log(log));
            }
            SessionEvent::Channel(id) => {
                debug!("Live session channel {}", id);
                self.channel_id = Some(id.clone());
                self.emit(ControllerEvent::ChannelAssigned { id });
            }
            SessionEvent::Exited { code } => {
                error!("Session worker exited with code {:?}", code);
                self.worker_exit = Some(code);
                self.code_push.cancel();
                self.autosave.cancel();
                self.emit(ControllerEvent::WorkerExited { code });
            }
        }
    }

    /// Adopt a pushed `STATE`.
    ///
    /// Only the focused file is reconciled: the pushed content replaces the
    /// local one unless local edits have not been sent yet.
    fn reconcile(&mut self, state: SessionState) {
        let sdk_changed = state.sdk_version != self.session.sdk_version;
        self.session = state;

        let replaced = self.reconcile_focused();
        if sdk_changed {
            info!("SDK version is now {}", self.session.sdk_version);
            self.sync_manifest_presence();
        }
        self.emit(ControllerEvent::StateReconciled { replaced });
    }

    fn reconcile_focused(&mut self) -> Option<String> {
        let focused = self.store.focused()?;
        if focused.is_virtual() {
            return None;
        }
        let path = focused.path().to_string();
        let local = focused.content()?.to_string();

        let pushed = self.session.files.get(&path)?;
        if pushed.is_asset() || pushed.contents() == local {
            return None;
        }
        let pushed = pushed.clone();

        let diverged = self.last_sent.get(&path).map(|f| f.contents()) != Some(local.as_str());
        if diverged {
            debug!("Keeping unsent local edits to {}", path);
            return None;
        }

        if let Err(e) = self.store.update_content(&path, pushed.contents()) {
            warn!("Could not apply pushed content for {}: {}", path, e);
            return None;
        }
        self.last_sent.insert(path.clone(), pushed);
        Some(path)
    }

    /// Add or remove the synthetic manifest to match the SDK's capabilities.
    fn sync_manifest_presence(&mut self) {
        let supported = is_feature_supported(Feature::ProjectDependencies, &self.session.sdk_version);
        let present = self.store.get(MANIFEST_PATH).is_some_and(Entry::is_virtual);

        if supported && !present {
            self.store
                .upsert_virtual(manifest_entry(&self.session.dependencies));
            self.emit(ControllerEvent::ManifestToggled { present: true });
        } else if !supported && present {
            self.store.remove_virtual(MANIFEST_PATH);
            self.manifest_focused = false;
            self.emit(ControllerEvent::ManifestToggled { present: false });
        }
    }

    fn apply_presence(&mut self, presence: PresenceEvent) {
        let device = presence.device;
        match presence.status {
            PresenceStatus::Join => {
                if self.devices.iter().any(|d| d.id == device.id) {
                    return;
                }
                info!("Device joined: {}", device.name);
                self.devices.push(device);
            }
            PresenceStatus::Leave => {
                let before = self.devices.len();
                self.devices.retain(|d| d.id != device.id);
                if before == self.devices.len() {
                    return;
                }
                info!("Device left: {}", device.name);
            }
        }
        self.emit(ControllerEvent::DevicesChanged {
            devices: self.devices.clone(),
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
