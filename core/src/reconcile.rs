// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Applies pulled calendars and events to the local store.

use errands_caldav::{Calendar, ComponentSet, Event, Href, uid_from_href};

use crate::property::{ListProp, PropValue};
use crate::store::{Store, Task, TaskList};

/// What a reconciliation changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReconcileSummary {
    /// Lists created for new calendars.
    pub lists_added: usize,
    /// Lists whose name, description or color changed.
    pub lists_updated: usize,
    /// Lists marked deleted because their calendar is gone.
    pub lists_deleted: usize,
    /// Tasks added from new remote events.
    pub tasks_added: usize,
    /// Tasks replaced by a newer remote version.
    pub tasks_updated: usize,
    /// Tasks removed because their event is gone.
    pub tasks_removed: usize,
}

/// Uid of the task an event carries: the `UID` of its body, else the href
/// stem.
pub(crate) fn event_uid(event: &Event) -> String {
    event
        .ical()
        .and_then(|ical| Task::from_ical(ical).ok())
        .and_then(|tasks| tasks.into_iter().next())
        .map_or_else(
            || {
                let name = uid_from_href(event.href());
                name.strip_suffix(".ics").unwrap_or(name).to_string()
            },
            |task| task.uid().to_string(),
        )
}

/// Brings the store in line with the pulled calendars.
///
/// Events of calendars in `skip` are left alone, since their pull failed
/// and the event list is stale.
pub fn reconcile(store: &mut Store, calendars: &[Calendar], skip: &[Href]) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    for calendar in calendars {
        if !calendar.components().is_empty()
            && !calendar.components().contains(ComponentSet::VTODO)
        {
            continue;
        }

        reconcile_list(store, calendar, &mut summary);
        if calendar.is_deleted() || !calendar.events_changed() || skip.contains(calendar.href()) {
            continue;
        }
        for event in calendar.events() {
            reconcile_event(store, calendar.uid(), event, &mut summary);
        }
    }

    tracing::debug!(?summary, "reconciled");
    summary
}

fn reconcile_list(store: &mut Store, calendar: &Calendar, summary: &mut ReconcileSummary) {
    let uid = calendar.uid();
    let Some(list) = store.list(uid) else {
        if calendar.is_deleted() {
            return;
        }
        let name = calendar.display_name().unwrap_or(uid);
        let mut list = TaskList::new(uid, name);
        apply_properties(&mut list, calendar);
        list.set(ListProp::Synced, Some(PropValue::Bool(true)));
        tracing::info!(uid, "new list from server");
        store.add_list(list);
        summary.lists_added += 1;
        return;
    };

    if calendar.is_deleted() {
        if !list.is_deleted()
            && let Some(list) = store.list_mut(uid)
        {
            list.set(ListProp::Deleted, Some(PropValue::Bool(true)));
            tracing::info!(uid, "list deleted on server");
            summary.lists_deleted += 1;
        }
        return;
    }

    let differs = list.name() != calendar.display_name().unwrap_or(uid)
        || list.description().as_deref() != calendar.description()
        || list.color().as_deref() != calendar.color();
    if (calendar.properties_changed() && differs) || !list.is_synced() {
        if let Some(list) = store.list_mut(uid) {
            apply_properties(list, calendar);
            list.set(ListProp::Synced, Some(PropValue::Bool(true)));
        }
        if differs {
            summary.lists_updated += 1;
        }
    }
}

fn apply_properties(list: &mut TaskList, calendar: &Calendar) {
    let text = |value: Option<&str>| value.map(|v| PropValue::Text(v.to_string()));
    list.set(
        ListProp::Name,
        text(Some(calendar.display_name().unwrap_or(calendar.uid()))),
    );
    list.set(ListProp::Description, text(calendar.description()));
    list.set(ListProp::Color, text(calendar.color()));
}

fn reconcile_event(store: &mut Store, list_uid: &str, event: &Event, summary: &mut ReconcileSummary) {
    let Some(list) = store.list(list_uid) else {
        return;
    };

    if event.is_deleted() {
        let uid = event_uid(event);
        if list.task(&uid).is_some_and(Task::is_synced)
            && let Some(list) = store.list_mut(list_uid)
        {
            list.remove_task(&uid);
            tracing::info!(%uid, "task deleted on server");
            summary.tasks_removed += 1;
        }
        return;
    }

    let Some(ical) = event.ical() else {
        return;
    };
    let remote_tasks = match Task::from_ical(ical) {
        Ok(tasks) => tasks,
        Err(err) => {
            tracing::warn!(href = %event.href(), %err, body = ical, "skipping unparsable event");
            return;
        }
    };

    let mut incoming = Vec::new();
    for mut remote in remote_tasks {
        remote.mark_synced(true);
        match list.task(remote.uid()) {
            None => {
                summary.tasks_added += 1;
                incoming.push(remote);
            }
            Some(local) if local == &remote => {}
            Some(local) => {
                if local.is_synced() || remote.last_modified() > local.last_modified() {
                    summary.tasks_updated += 1;
                    incoming.push(remote);
                } else {
                    tracing::debug!(uid = remote.uid(), "keeping newer local edit");
                }
            }
        }
    }

    if incoming.is_empty() {
        return;
    }
    if let Some(list) = store.list_mut(list_uid) {
        for task in incoming {
            list.add_task(task);
        }
    }
}
