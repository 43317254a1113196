//! Reload coordination.
//!
//! `Coordinator` owns the configuration store, the current menu model and the
//! live watcher. Every change to any of them goes through one cycle: disarm the
//! watcher, tear the menu down, reload the file, rebuild, re-arm. The cycle runs
//! on the main loop only, so at most one watcher is ever armed.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ConfigStore};
use crate::events::Event;
use crate::menu::{ItemId, MenuAction, MenuBackend, MenuModel};
use crate::watch::{self, WatchHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Reloading,
}

/// What a watcher signal led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Menu rebuilt from the fresh configuration.
    Rebuilt,
    /// The configuration could not be loaded; the menu stays torn down.
    Failed,
    /// Signal from a watcher that is no longer armed, or a reload is running.
    Ignored,
}

#[derive(Debug)]
pub struct Coordinator {
    store: ConfigStore,
    menu: MenuModel,
    watch: Option<WatchHandle>,
    generation: u64,
    state: ReloadState,
    rebuilds: u64,
    last_error: Option<String>,
    event_tx: mpsc::Sender<Event>,
}

impl Coordinator {
    pub fn new(store: ConfigStore, event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            store,
            menu: MenuModel::default(),
            watch: None,
            generation: 0,
            state: ReloadState::Idle,
            rebuilds: 0,
            last_error: None,
            event_tx,
        }
    }

    /// Builds the initial menu from the already loaded configuration and arms
    /// the watcher.
    pub fn start<B: MenuBackend>(&mut self, backend: &mut B) {
        self.menu = MenuModel::build(self.store.entries(), backend);
        self.rearm();
    }

    /// Handles a change signal from the watcher armed in `generation`.
    pub fn on_watch_fired<B: MenuBackend>(
        &mut self,
        generation: u64,
        backend: &mut B,
    ) -> ReloadOutcome {
        if self.state == ReloadState::Reloading {
            return ReloadOutcome::Ignored;
        }
        if self.watch.as_ref().map(WatchHandle::generation) != Some(generation) {
            info!("ignoring signal from stale watcher generation {}", generation);
            return ReloadOutcome::Ignored;
        }
        match self.cycle(backend, |_| Ok(())) {
            Ok(()) => ReloadOutcome::Rebuilt,
            Err(err) => {
                warn!("reload config error: {}", err);
                ReloadOutcome::Failed
            }
        }
    }

    /// Appends a Makefile to the configuration and rebuilds the menu.
    ///
    /// The file is re-read first so edits made in an editor are kept, and the
    /// watcher is disarmed while our own write lands.
    pub fn add_entry<B: MenuBackend>(
        &mut self,
        path: &str,
        label: &str,
        backend: &mut B,
    ) -> Result<(), ConfigError> {
        self.cycle(backend, |store| store.add_entry(path, label))
    }

    fn cycle<B, F>(&mut self, backend: &mut B, mutate: F) -> Result<(), ConfigError>
    where
        B: MenuBackend,
        F: FnOnce(&mut ConfigStore) -> Result<(), ConfigError>,
    {
        self.state = ReloadState::Reloading;
        if let Some(watch) = self.watch.take() {
            watch.disarm();
        }
        self.menu.teardown(backend);

        let result = match self.store.reload() {
            Ok(()) => {
                self.last_error = None;
                let mutated = mutate(&mut self.store);
                self.menu = MenuModel::build(self.store.entries(), backend);
                self.rebuilds += 1;
                info!(
                    "menu rebuilt with {} makefiles, {} clickable items",
                    self.store.entries().len(),
                    self.menu.binding_count()
                );
                mutated
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        };

        self.rearm();
        self.state = ReloadState::Idle;
        result
    }

    fn rearm(&mut self) {
        if let Some(previous) = self.watch.take() {
            previous.disarm();
        }
        self.generation += 1;
        match watch::arm(&self.store.watch_paths(), self.generation, self.event_tx.clone()) {
            Ok(handle) => {
                debug!(
                    "watching {} directories (generation {})",
                    handle.watched_dirs(),
                    handle.generation()
                );
                self.watch = Some(handle);
            }
            Err(err) => warn!("live reload unavailable: {:#}", err),
        }
    }

    /// Releases the watcher before exit.
    pub fn shutdown(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.disarm();
        }
    }

    pub fn action_for(&self, id: ItemId) -> Option<MenuAction> {
        self.menu.action_for(id).cloned()
    }

    pub fn menu(&self) -> &MenuModel {
        &self.menu
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Completed menu rebuilds, excluding the initial build.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Error from the most recent failed reload, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
