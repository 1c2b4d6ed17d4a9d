// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! One sync session: pull, reconcile, push, persist.

use std::collections::HashMap;
use std::path::PathBuf;

use errands_caldav::{CalDavError, CancellationToken, Client, ComponentSet, Href};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{SyncError, SyncErrorSource, SyncPhase};
use crate::property::{ListProp, PropValue};
use crate::reconcile::{ReconcileSummary, event_uid, reconcile};
use crate::state::SyncState;
use crate::store::Store;

/// Outcome of a completed session.
///
/// Serializes flat, with failures as their messages.
#[derive(Debug, Default, serde::Serialize)]
pub struct SyncReport {
    /// Live calendars on the server.
    pub calendars: usize,
    /// Calendars whose events were pulled.
    pub pulled: usize,
    /// Local changes made from pulled data.
    #[serde(flatten)]
    pub reconciled: ReconcileSummary,
    /// Calendars created for local lists.
    pub calendars_created: usize,
    /// Tasks created or updated on the server.
    pub uploaded: usize,
    /// Tasks deleted on the server.
    pub deleted: usize,
    /// Per-calendar failures that did not stop the session.
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<SyncError>,
}

fn serialize_failures<S: serde::Serializer>(
    failures: &[SyncError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(ToString::to_string))
}

impl SyncReport {
    /// Whether every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A connected client paired with the local store.
#[derive(Debug)]
pub struct SyncSession {
    client: Client,
    store: Store,
    state_file: PathBuf,
}

impl SyncSession {
    /// Opens the store, discovers the server and restores the state of the
    /// previous session.
    ///
    /// An unreadable state file is discarded, which costs a full pull.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or discovery fails.
    #[tracing::instrument(skip_all, fields(server = %config.server.base_url))]
    pub async fn connect(config: &Config, cancel: CancellationToken) -> Result<Self, SyncError> {
        let store = Store::open(&config.data_dir)
            .await
            .map_err(|e| SyncError::new(SyncPhase::LocalStore, e))?;

        let state_file = config.state_file();
        let state = SyncState::load(&state_file).await.unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring unreadable sync state");
            SyncState::default()
        });

        let mut client = Client::discover(config.server.clone(), cancel)
            .await
            .map_err(|e| SyncError::new(SyncPhase::Discovery, e))?;

        // State of another server would mark every list deleted.
        let origin = client.base_url().as_str().to_string();
        let calendars = state
            .calendars
            .into_iter()
            .filter(|c| c.href().starts_with(&origin))
            .collect();
        client.restore_calendars(calendars);

        Ok(Self::new(client, store, state_file))
    }

    /// Pairs an already discovered client with a store.
    #[must_use]
    pub const fn new(client: Client, store: Store, state_file: PathBuf) -> Self {
        Self {
            client,
            store,
            state_file,
        }
    }

    /// The client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The client, for mutations outside a sync run.
    pub const fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// The local store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// The local store, for local edits between runs.
    pub const fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Splits the session.
    #[must_use]
    pub fn into_parts(self) -> (Client, Store) {
        (self.client, self.store)
    }

    /// Runs one full synchronization.
    ///
    /// Calendars are pulled, changed calendars get their events pulled, the
    /// result is applied to the store, local changes are uploaded, and the
    /// store and state are written. A calendar whose events fail to pull is
    /// reported in [`SyncReport::failures`] and retried next session.
    ///
    /// # Errors
    ///
    /// Returns an error if listing calendars fails, the session is
    /// cancelled, or the store or state cannot be written. Nothing is
    /// persisted in that case.
    #[tracing::instrument(skip(self), fields(server = %self.client.base_url()))]
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        self.client
            .pull_calendars()
            .await
            .map_err(|e| SyncError::new(SyncPhase::CalendarList, e))?;

        let mut skip = Vec::new();
        for href in self.client.changed_calendars() {
            if !self.holds_tasks(&href) {
                continue;
            }
            match self.client.pull_events(&href).await {
                Ok(()) => report.pulled += 1,
                Err(CalDavError::Cancelled) => {
                    return Err(SyncError::new(
                        SyncPhase::EventList { calendar: href },
                        CalDavError::Cancelled,
                    ));
                }
                Err(e) => {
                    tracing::warn!(%href, error = %e, "failed to pull events");
                    self.client.invalidate_calendar(&href);
                    skip.push(href.clone());
                    report
                        .failures
                        .push(SyncError::new(SyncPhase::EventList { calendar: href }, e));
                }
            }
        }

        report.reconciled = reconcile(&mut self.store, self.client.calendars(), &skip);
        self.push(&mut report, &skip).await?;

        self.store
            .save()
            .await
            .map_err(|e| SyncError::new(SyncPhase::LocalStore, e))?;
        SyncState::new(self.client.calendars().to_vec())
            .save(&self.state_file)
            .await
            .map_err(|e| SyncError::new(SyncPhase::LocalStore, e))?;

        report.calendars = self
            .client
            .calendars()
            .iter()
            .filter(|c| !c.is_deleted())
            .count();
        tracing::info!(
            calendars = report.calendars,
            pulled = report.pulled,
            uploaded = report.uploaded,
            deleted = report.deleted,
            failures = report.failures.len(),
            "sync finished"
        );
        Ok(report)
    }

    /// Runs [`SyncSession::run`] on a background task.
    ///
    /// The session moves into the task and is handed back by
    /// [`SyncHandle::join`].
    #[must_use]
    pub fn spawn(mut self) -> SyncHandle {
        let cancel = self.client.cancellation_token().clone();
        let task = tokio::spawn(async move {
            let result = self.run().await;
            (self, result)
        });
        SyncHandle { cancel, task }
    }

    fn holds_tasks(&self, href: &str) -> bool {
        self.client.calendar(href).is_some_and(|c| {
            c.components().is_empty() || c.components().contains(ComponentSet::VTODO)
        })
    }

    async fn push(&mut self, report: &mut SyncReport, skip: &[Href]) -> Result<(), SyncError> {
        if self.create_missing_calendars(report).await? {
            self.client
                .pull_calendars()
                .await
                .map_err(|e| SyncError::new(SyncPhase::CalendarList, e))?;
            // The relisting brings back the server ctag of failed calendars.
            for href in skip {
                self.client.invalidate_calendar(href);
            }
        }

        let list_uids: Vec<String> = self
            .store
            .lists()
            .iter()
            .filter(|l| !l.is_deleted())
            .map(|l| l.uid().to_string())
            .collect();
        for list_uid in list_uids {
            self.push_tasks(&list_uid, report).await?;
        }
        Ok(())
    }

    /// Creates calendars for unsynced local lists; true if any was created.
    async fn create_missing_calendars(&mut self, report: &mut SyncReport) -> Result<bool, SyncError> {
        let missing: Vec<_> = self
            .store
            .lists()
            .iter()
            .filter(|l| !l.is_deleted() && !l.is_synced())
            .filter(|l| self.client.calendar_by_uid(l.uid()).is_none_or(|c| c.is_deleted()))
            .map(|l| (l.uid().to_string(), l.name(), l.description(), l.color()))
            .collect();

        let mut created = false;
        for (uid, name, description, color) in missing {
            let result = self
                .client
                .create_calendar(
                    &uid,
                    &name,
                    description.as_deref(),
                    color.as_deref(),
                    ComponentSet::VTODO,
                )
                .await;
            match result {
                Ok(_) => {
                    if let Some(list) = self.store.list_mut(&uid) {
                        list.set(ListProp::Synced, Some(PropValue::Bool(true)));
                    }
                    report.calendars_created += 1;
                    created = true;
                }
                Err(e) => {
                    let phase = SyncPhase::Push {
                        calendar: Href::new(uid),
                    };
                    record(report, phase, e)?;
                }
            }
        }
        Ok(created)
    }

    async fn push_tasks(&mut self, list_uid: &str, report: &mut SyncReport) -> Result<(), SyncError> {
        let Some(calendar) = self
            .client
            .calendar_by_uid(list_uid)
            .filter(|c| !c.is_deleted())
        else {
            return Ok(());
        };
        let calendar_href = calendar.href().clone();
        let remote: HashMap<String, Href> = calendar
            .events()
            .iter()
            .filter(|e| !e.is_deleted())
            .map(|e| (event_uid(e), e.href().clone()))
            .collect();

        let pending: Vec<_> = self
            .store
            .list(list_uid)
            .map(|list| {
                list.tasks()
                    .iter()
                    .filter(|t| !t.is_synced())
                    .map(|t| (t.uid().to_string(), t.is_deleted(), t.to_ical()))
                    .collect()
            })
            .unwrap_or_default();

        for (uid, deleted, ical) in pending {
            let result = match (deleted, remote.get(&uid)) {
                (true, Some(href)) => self.client.delete_event(&calendar_href, href).await,
                (true, None) => Ok(()),
                (false, Some(href)) => self.client.update_event(&calendar_href, href, &ical).await,
                (false, None) => self
                    .client
                    .create_event(&calendar_href, &uid, &ical)
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = result {
                let phase = SyncPhase::Push {
                    calendar: calendar_href.clone(),
                };
                record(report, phase, e)?;
                continue;
            }

            let Some(list) = self.store.list_mut(list_uid) else {
                continue;
            };
            if deleted {
                list.remove_task(&uid);
                if remote.contains_key(&uid) {
                    report.deleted += 1;
                }
            } else if let Some(task) = list.task_mut(&uid) {
                task.mark_synced(true);
                report.uploaded += 1;
            }
        }
        Ok(())
    }
}

/// Adds a push failure to the report; cancellation aborts the session.
fn record(report: &mut SyncReport, phase: SyncPhase, err: CalDavError) -> Result<(), SyncError> {
    if matches!(err, CalDavError::Cancelled) {
        return Err(SyncError::new(phase, err));
    }
    tracing::warn!(%phase, error = %err, "failed to push");
    report.failures.push(SyncError::new(phase, err));
    Ok(())
}

/// Handle to a session running in the background.
#[derive(Debug)]
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<(SyncSession, Result<SyncReport, SyncError>)>,
}

impl SyncHandle {
    /// Asks the session to stop before its next request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session, handing it back with the outcome of the run.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncPhase::Worker`] error if the task panicked.
    pub async fn join(self) -> Result<(SyncSession, Result<SyncReport, SyncError>), SyncError> {
        self.task.await.map_err(|e| {
            SyncError::new(
                SyncPhase::Worker,
                SyncErrorSource::Worker(e.to_string()),
            )
        })
    }
}
