//! The tab-set reducer.
//!
//! [`FileSessionState`] is synchronous and I/O free. Actions that need a file
//! fetched return a [`LoadTicket`] in the [`Outcome`]; the caller runs the
//! load and reports back with `LoadSucceeded`/`LoadFailed` carrying the same
//! generation, so a result for a superseded attempt is dropped.

use chrono::Utc;
use tracing::trace;
use workbench_session::{PersistedTab, TabSessionSnapshot};

use crate::content::{LoadedFile, SaveReceipt};
use crate::tab::{FileTab, TabStatus};

/// Ordering partition. Pinned tabs always precede regular tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabZone {
    Pinned,
    Regular,
}

/// Direction for cycling through the MRU order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentDirection {
    /// Towards less recently used tabs.
    Older,
    /// Towards more recently used tabs.
    Newer,
}

/// A load the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub id: String,
    pub generation: u64,
}

/// Result of reducing one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub changed: bool,
    pub loads: Vec<LoadTicket>,
}

impl Outcome {
    fn unchanged() -> Self {
        Self::default()
    }

    fn changed(changed: bool) -> Self {
        Self {
            changed,
            loads: Vec::new(),
        }
    }

    fn load(ticket: LoadTicket) -> Self {
        Self {
            changed: true,
            loads: vec![ticket],
        }
    }
}

/// Actions accepted by the tab reducer.
#[derive(Debug, Clone)]
pub enum TabAction {
    /// Open and activate a tab, creating it in `loading` if it is new.
    Open(String),
    /// Activate an existing tab, retrying its load if it is in `error`.
    Select(String),
    LoadSucceeded {
        id: String,
        generation: u64,
        file: LoadedFile,
    },
    LoadFailed {
        id: String,
        generation: u64,
        message: String,
    },
    Close(String),
    CloseOthers(String),
    CloseToRight(String),
    CloseAll,
    /// Reorder a tab. `zone` defaults to the tab's current zone and the index
    /// is clamped into that zone's partition.
    Move {
        id: String,
        target_index: usize,
        zone: Option<TabZone>,
    },
    Pin(String),
    Unpin(String),
    UpdateContent {
        id: String,
        content: String,
    },
    BeginSaving(String),
    /// `saved_content` is the text that was sent, which becomes the new
    /// baseline even if the buffer was edited while the save was in flight.
    CompleteSaving {
        id: String,
        saved_content: String,
        receipt: SaveReceipt,
    },
    FailSaving {
        id: String,
        message: String,
    },
    /// Overwrite a tab with the server's version.
    ReplaceContent {
        id: String,
        file: LoadedFile,
    },
    SelectRecent(RecentDirection),
    /// Replace the whole session with a persisted layout.
    Restore(TabSessionSnapshot),
}

/// Open tabs in visual order, the active tab, and the MRU order.
#[derive(Debug, Clone, Default)]
pub struct FileSessionState {
    tabs: Vec<FileTab>,
    active: Option<String>,
    /// Most recently used first.
    mru: Vec<String>,
    next_generation: u64,
}

impl FileSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action.
    pub fn reduce(&mut self, action: TabAction) -> Outcome {
        match action {
            TabAction::Open(id) => self.open(id),
            TabAction::Select(id) => self.select(&id),
            TabAction::LoadSucceeded {
                id,
                generation,
                file,
            } => match self.pending_load(&id, generation) {
                Some(tab) => {
                    tab.apply_loaded(file);
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::LoadFailed {
                id,
                generation,
                message,
            } => match self.pending_load(&id, generation) {
                Some(tab) => {
                    tab.status = TabStatus::Error;
                    tab.load_error = Some(message);
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::Close(id) => self.retain(|_, tab| tab.id != id),
            TabAction::CloseOthers(id) => {
                if self.position(&id).is_none() {
                    return Outcome::unchanged();
                }
                self.retain(|_, tab| tab.id == id)
            }
            TabAction::CloseToRight(id) => match self.position(&id) {
                Some(pos) => self.retain(|index, _| index <= pos),
                None => Outcome::unchanged(),
            },
            TabAction::CloseAll => self.retain(|_, _| false),
            TabAction::Move {
                id,
                target_index,
                zone,
            } => self.move_tab(&id, target_index, zone),
            TabAction::Pin(id) => self.set_pinned(&id, true),
            TabAction::Unpin(id) => self.set_pinned(&id, false),
            TabAction::UpdateContent { id, content } => match self.tab_mut(&id) {
                Some(tab) if tab.status == TabStatus::Ready => {
                    if tab.content == content {
                        return Outcome::unchanged();
                    }
                    tab.content = content;
                    Outcome::changed(true)
                }
                Some(_) => {
                    trace!(tab_id = %id, "Ignoring edit for tab that is not ready");
                    Outcome::unchanged()
                }
                None => Outcome::unchanged(),
            },
            TabAction::BeginSaving(id) => match self.tab_mut(&id) {
                Some(tab) => {
                    tab.saving = true;
                    tab.save_error = None;
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::CompleteSaving {
                id,
                saved_content,
                receipt,
            } => match self.tab_mut(&id) {
                Some(tab) => {
                    tab.initial_content = saved_content;
                    tab.etag = receipt.etag.clone();
                    tab.metadata.etag = receipt.etag;
                    if receipt.size.is_some() {
                        tab.metadata.size = receipt.size;
                    }
                    if receipt.mtime.is_some() {
                        tab.metadata.modified_at = receipt.mtime;
                    }
                    tab.saving = false;
                    tab.save_error = None;
                    tab.last_saved_at = Some(Utc::now());
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::FailSaving { id, message } => match self.tab_mut(&id) {
                Some(tab) => {
                    tab.saving = false;
                    tab.save_error = Some(message);
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::ReplaceContent { id, file } => match self.tab_mut(&id) {
                Some(tab) => {
                    tab.apply_loaded(file);
                    tab.saving = false;
                    tab.save_error = None;
                    Outcome::changed(true)
                }
                None => Outcome::unchanged(),
            },
            TabAction::SelectRecent(direction) => self.select_recent(direction),
            TabAction::Restore(snapshot) => self.restore(snapshot),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Open tabs in visual order.
    pub fn tabs(&self) -> &[FileTab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&FileTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_tab(&self) -> Option<&FileTab> {
        self.active.as_deref().and_then(|id| self.tab(id))
    }

    /// Tab ids, most recently used first.
    pub fn mru(&self) -> &[String] {
        &self.mru
    }

    /// True iff any ready tab has unsaved edits.
    pub fn is_dirty(&self) -> bool {
        self.tabs.iter().any(FileTab::is_dirty)
    }

    /// Ids of dirty tabs in visual order.
    pub fn dirty_tab_ids(&self) -> Vec<String> {
        self.tabs
            .iter()
            .filter(|t| t.is_dirty())
            .map(|t| t.id.clone())
            .collect()
    }

    /// Whether any tab is waiting for its content.
    pub fn is_loading(&self) -> bool {
        self.tabs.iter().any(FileTab::is_loading)
    }

    /// The persisted form of the current layout.
    pub fn snapshot(&self) -> TabSessionSnapshot {
        TabSessionSnapshot {
            open_tabs: self
                .tabs
                .iter()
                .map(|t| PersistedTab::new(t.id.clone(), t.pinned))
                .collect(),
            active_tab_id: self.active.clone(),
            mru: self.mru.clone(),
        }
    }

    fn pinned_count(&self) -> usize {
        self.tabs.iter().take_while(|t| t.pinned).count()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    fn tab_mut(&mut self, id: &str) -> Option<&mut FileTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// The tab if it is still waiting on this exact load attempt.
    fn pending_load(&mut self, id: &str, generation: u64) -> Option<&mut FileTab> {
        match self.tab_mut(id) {
            Some(tab) if tab.status == TabStatus::Loading && tab.generation == generation => {
                Some(tab)
            }
            _ => {
                trace!(tab_id = %id, generation, "Dropping stale load result");
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    fn issue_ticket(&mut self, id: &str) -> LoadTicket {
        self.next_generation += 1;
        LoadTicket {
            id: id.to_string(),
            generation: self.next_generation,
        }
    }

    fn activate(&mut self, id: &str) -> bool {
        let was_active = self.active.as_deref() == Some(id);
        let was_front = self.mru.first().map(String::as_str) == Some(id);
        self.active = Some(id.to_string());
        self.touch(id);
        !(was_active && was_front)
    }

    fn touch(&mut self, id: &str) {
        self.mru.retain(|m| m != id);
        self.mru.insert(0, id.to_string());
    }

    fn open(&mut self, id: String) -> Outcome {
        if self.position(&id).is_some() {
            return Outcome::changed(self.activate(&id));
        }
        let ticket = self.issue_ticket(&id);
        self.tabs.push(FileTab::loading(&id, ticket.generation));
        self.activate(&id);
        Outcome::load(ticket)
    }

    fn select(&mut self, id: &str) -> Outcome {
        let retry = match self.tab(id) {
            Some(tab) => tab.status == TabStatus::Error,
            None => return Outcome::unchanged(),
        };
        let activated = self.activate(id);
        if !retry {
            return Outcome::changed(activated);
        }

        let ticket = self.issue_ticket(id);
        if let Some(tab) = self.tab_mut(id) {
            tab.status = TabStatus::Loading;
            tab.load_error = None;
            tab.generation = ticket.generation;
        }
        Outcome::load(ticket)
    }

    /// Keep tabs matching `keep(index, tab)`. When the active tab is removed
    /// the last remaining tab becomes active.
    fn retain(&mut self, keep: impl Fn(usize, &FileTab) -> bool) -> Outcome {
        let before = self.tabs.len();
        let active = self.active.clone();
        let mut index = 0;
        self.tabs.retain(|tab| {
            let kept = keep(index, tab);
            index += 1;
            kept
        });
        if self.tabs.len() == before {
            return Outcome::unchanged();
        }

        let open: Vec<&str> = self.tabs.iter().map(|t| t.id.as_str()).collect();
        self.mru.retain(|id| open.contains(&id.as_str()));

        let active_survived = active
            .as_deref()
            .is_some_and(|id| self.position(id).is_some());
        if !active_survived {
            match self.tabs.last().map(|t| t.id.clone()) {
                Some(last) => {
                    self.activate(&last);
                }
                None => self.active = None,
            }
        }
        Outcome::changed(true)
    }

    fn move_tab(&mut self, id: &str, target_index: usize, zone: Option<TabZone>) -> Outcome {
        let Some(from) = self.position(id) else {
            return Outcome::unchanged();
        };
        let mut tab = self.tabs.remove(from);
        let was_pinned = tab.pinned;
        let zone = zone.unwrap_or(if was_pinned {
            TabZone::Pinned
        } else {
            TabZone::Regular
        });
        tab.pinned = zone == TabZone::Pinned;

        let pinned = self.pinned_count();
        let to = match zone {
            TabZone::Pinned => target_index.min(pinned),
            TabZone::Regular => target_index.clamp(pinned, self.tabs.len()),
        };
        let changed = to != from || tab.pinned != was_pinned;
        self.tabs.insert(to, tab);
        Outcome::changed(changed)
    }

    fn set_pinned(&mut self, id: &str, pinned: bool) -> Outcome {
        let Some(from) = self.position(id) else {
            return Outcome::unchanged();
        };
        if self.tabs[from].pinned == pinned {
            return Outcome::unchanged();
        }
        let mut tab = self.tabs.remove(from);
        tab.pinned = pinned;
        // Pinning appends to the pinned zone; unpinning leads the regular zone.
        let to = self.pinned_count();
        self.tabs.insert(to, tab);
        Outcome::changed(true)
    }

    fn select_recent(&mut self, direction: RecentDirection) -> Outcome {
        if self.mru.len() <= 1 {
            return Outcome::unchanged();
        }
        let len = self.mru.len();
        let current = self
            .active
            .as_deref()
            .and_then(|id| self.mru.iter().position(|m| m == id))
            .unwrap_or(0);
        let next = match direction {
            RecentDirection::Older => (current + 1) % len,
            RecentDirection::Newer => (current + len - 1) % len,
        };
        // Cycling walks the MRU order without reshuffling it.
        self.active = Some(self.mru[next].clone());
        Outcome::changed(next != current)
    }

    fn restore(&mut self, snapshot: TabSessionSnapshot) -> Outcome {
        let TabSessionSnapshot {
            open_tabs,
            active_tab_id,
            mru,
        } = snapshot;

        let mut tabs: Vec<FileTab> = Vec::with_capacity(open_tabs.len());
        let mut loads = Vec::with_capacity(open_tabs.len());
        for persisted in open_tabs {
            if tabs.iter().any(|t| t.id == persisted.id) {
                continue;
            }
            let ticket = self.issue_ticket(&persisted.id);
            let mut tab = FileTab::loading(&persisted.id, ticket.generation);
            tab.pinned = persisted.pinned;
            tabs.push(tab);
            loads.push(ticket);
        }
        // Stable partition keeps the relative order inside each zone.
        let (pinned, regular): (Vec<_>, Vec<_>) = tabs.into_iter().partition(|t| t.pinned);
        self.tabs = pinned.into_iter().chain(regular).collect();

        let open = |id: &str| self.tabs.iter().any(|t| t.id == id);
        let mut restored_mru: Vec<String> = Vec::with_capacity(self.tabs.len());
        for id in mru {
            if open(id.as_str()) && !restored_mru.contains(&id) {
                restored_mru.push(id);
            }
        }
        for tab in &self.tabs {
            if !restored_mru.contains(&tab.id) {
                restored_mru.push(tab.id.clone());
            }
        }
        self.active = active_tab_id
            .filter(|id| open(id.as_str()))
            .or_else(|| self.tabs.last().map(|t| t.id.clone()));
        self.mru = restored_mru;

        Outcome {
            changed: true,
            loads,
        }
    }
}
