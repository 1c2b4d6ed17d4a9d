// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Local task store: one `.ics` file per list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use icalendar::{Calendar, CalendarComponent, Todo};
use jiff::Timestamp;
use tokio::fs;

use crate::error::StoreError;
use crate::property::{ListProp, Properties, PropValue, TaskProp};

/// Calendar properties the writer emits itself.
const GENERATED: &[&str] = &["VERSION", "PRODID", "CALSCALE"];

/// Generates a fresh uid for a task or list.
#[must_use]
pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parses a `VCALENDAR` object.
///
/// # Errors
///
/// Returns an error if the text is not iCalendar.
pub fn parse_calendar(text: &str) -> Result<Calendar, StoreError> {
    if !text
        .trim_start()
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(StoreError::MissingComponent("VCALENDAR"));
    }
    text.parse::<Calendar>()
        .map_err(|err| StoreError::Ical(err.to_string()))
}

/// One task, backed by a `VTODO` component.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    uid: String,
    todo: Todo,
}

impl Task {
    /// Creates an unsynced task.
    pub fn new(uid: impl Into<String>, summary: &str) -> Self {
        let uid = uid.into();
        let now = PropValue::Timestamp(Timestamp::now());
        let mut todo = Todo::new();
        todo.set_prop(TaskProp::Uid, Some(&PropValue::Text(uid.clone())));
        todo.set_prop(TaskProp::Summary, Some(&PropValue::Text(summary.to_string())));
        todo.set_raw_value("DTSTAMP", &now.encode());
        todo.set_prop(TaskProp::Created, Some(&now));
        todo.set_prop(TaskProp::LastModified, Some(&now));
        todo.set_prop(TaskProp::Synced, Some(&PropValue::Bool(false)));
        Self { uid, todo }
    }

    /// Wraps a `VTODO`; `None` without a `UID`.
    #[must_use]
    pub fn from_todo(todo: Todo) -> Option<Self> {
        let uid = todo.prop_text(TaskProp::Uid)?;
        Some(Self { uid, todo })
    }

    /// Parses the `VTODO`s of a calendar object resource.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed iCalendar.
    pub fn from_ical(text: &str) -> Result<Vec<Self>, StoreError> {
        Ok(parse_calendar(text)?
            .components
            .into_iter()
            .filter_map(|component| match component {
                CalendarComponent::Todo(todo) => Self::from_todo(todo),
                _ => None,
            })
            .collect())
    }

    /// Unique id.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Underlying `VTODO`.
    #[must_use]
    pub const fn todo(&self) -> &Todo {
        &self.todo
    }

    /// Decoded value of `prop`.
    #[must_use]
    pub fn get(&self, prop: TaskProp) -> Option<PropValue> {
        self.todo.prop(prop)
    }

    /// Edits a property as a local change.
    ///
    /// Bumps `LAST-MODIFIED` and clears the synced flag. The uid cannot be
    /// changed.
    pub fn set(&mut self, prop: TaskProp, value: Option<PropValue>) {
        if prop == TaskProp::Uid {
            return;
        }
        self.todo.set_prop(prop, value.as_ref());
        self.todo.set_prop(
            TaskProp::LastModified,
            Some(&PropValue::Timestamp(Timestamp::now())),
        );
        self.todo
            .set_prop(TaskProp::Synced, Some(&PropValue::Bool(false)));
    }

    /// Summary text.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        self.todo.prop_text(TaskProp::Summary)
    }

    /// Time of the last edit.
    #[must_use]
    pub fn last_modified(&self) -> Option<Timestamp> {
        self.todo.prop_time(TaskProp::LastModified)
    }

    /// No local edits since the last upload.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.todo.prop_flag(TaskProp::Synced)
    }

    /// Deleted locally, pending removal on the server.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.todo.prop_flag(TaskProp::Deleted)
    }

    /// Marks the task deleted as a local change.
    pub fn delete(&mut self) {
        self.set(TaskProp::Deleted, Some(PropValue::Bool(true)));
    }

    pub(crate) fn mark_synced(&mut self, synced: bool) {
        self.todo
            .set_prop(TaskProp::Synced, Some(&PropValue::Bool(synced)));
    }

    /// Calendar object resource for upload, flagged as synced.
    #[must_use]
    pub fn to_ical(&self) -> String {
        let mut todo = self.todo.clone();
        todo.set_prop(TaskProp::Synced, Some(&PropValue::Bool(true)));
        let mut calendar = Calendar::new();
        calendar.push(todo);
        calendar.to_string()
    }
}

/// A task list, stored as one `VCALENDAR` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    uid: String,
    file_name: String,
    header: Calendar,
    tasks: Vec<Task>,
}

impl TaskList {
    /// Creates an empty, unsynced list.
    pub fn new(uid: impl Into<String>, name: &str) -> Self {
        let uid = uid.into();
        let mut header = Calendar::new();
        header.set_prop(ListProp::Uid, Some(&PropValue::Text(uid.clone())));
        header.set_prop(ListProp::Name, Some(&PropValue::Text(name.to_string())));
        header.set_prop(ListProp::Synced, Some(&PropValue::Bool(false)));
        Self {
            file_name: format!("{uid}.ics"),
            uid,
            header,
            tasks: Vec::new(),
        }
    }

    /// Parses a list file. Without `X-WR-RELCALID`, `fallback_uid` is used.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed iCalendar or a file without `VCALENDAR`.
    pub fn from_ical(text: &str, fallback_uid: &str) -> Result<Self, StoreError> {
        let mut header = parse_calendar(text)?;

        let mut tasks = Vec::new();
        let mut others = Vec::new();
        for component in std::mem::take(&mut header.components) {
            match component {
                CalendarComponent::Todo(todo) => tasks.extend(Task::from_todo(todo)),
                other => others.push(other),
            }
        }
        header.components = others;

        let uid = header
            .prop_text(ListProp::Uid)
            .unwrap_or_else(|| fallback_uid.to_string());
        Ok(Self {
            file_name: format!("{fallback_uid}.ics"),
            uid,
            header,
            tasks,
        })
    }

    /// Serializes the list with all its tasks.
    #[must_use]
    pub fn to_ical(&self) -> String {
        let mut calendar = Calendar::new();
        calendar.properties.retain(|p| GENERATED.contains(&p.key()));
        calendar.properties.extend(
            self.header
                .properties
                .iter()
                .filter(|p| !GENERATED.iter().any(|g| p.key().eq_ignore_ascii_case(g)))
                .cloned(),
        );
        calendar.components.extend(self.header.components.iter().cloned());
        for task in &self.tasks {
            calendar.push(task.todo.clone());
        }
        calendar.to_string()
    }

    /// Unique id, equal to the remote calendar uid once synced.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Name shown to the user.
    #[must_use]
    pub fn name(&self) -> String {
        self.header
            .prop_text(ListProp::Name)
            .unwrap_or_else(|| self.uid.clone())
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.header.prop_text(ListProp::Description)
    }

    /// Hex color.
    #[must_use]
    pub fn color(&self) -> Option<String> {
        self.header.prop_text(ListProp::Color)
    }

    /// Deleted locally or on the server.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.header.prop_flag(ListProp::Deleted)
    }

    /// Exists on the server.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.header.prop_flag(ListProp::Synced)
    }

    /// Sets a list property; the uid cannot be changed.
    pub fn set(&mut self, prop: ListProp, value: Option<PropValue>) {
        if prop != ListProp::Uid {
            self.header.set_prop(prop, value.as_ref());
        }
    }

    /// Tasks, including locally deleted ones.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by uid.
    #[must_use]
    pub fn task(&self, uid: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.uid == uid)
    }

    /// Looks up a task by uid for editing.
    pub fn task_mut(&mut self, uid: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.uid == uid)
    }

    /// Adds a task, replacing one with the same uid.
    pub fn add_task(&mut self, task: Task) {
        match self.task_mut(&task.uid) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Removes a task.
    pub fn remove_task(&mut self, uid: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.uid == uid)?;
        Some(self.tasks.remove(index))
    }
}

/// Directory of list files.
///
/// Lists handed out through [`Store::list_mut`] or added with
/// [`Store::add_list`] are written by the next [`Store::save`]; untouched
/// files are never rewritten.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    lists: Vec<TaskList>,
    dirty: HashSet<String>,
}

impl Store {
    /// Opens `dir`, creating it if needed, and loads every `.ics` file.
    ///
    /// Files that fail to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    #[tracing::instrument]
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        let io_err = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).await.map_err(io_err)?;

        let mut reader = fs::read_dir(dir).await.map_err(io_err)?;
        let mut lists = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "ics") {
                continue;
            }
            match read_list(&path).await {
                Ok(list) => lists.push(list),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable list file");
                }
            }
        }

        tracing::debug!(count = lists.len(), "loaded lists");
        Ok(Self {
            dir: dir.to_path_buf(),
            lists,
            dirty: HashSet::new(),
        })
    }

    /// Store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All lists.
    #[must_use]
    pub fn lists(&self) -> &[TaskList] {
        &self.lists
    }

    /// Looks up a list by uid.
    #[must_use]
    pub fn list(&self, uid: &str) -> Option<&TaskList> {
        self.lists.iter().find(|l| l.uid == uid)
    }

    /// Looks up a list for editing and marks it for writing.
    pub fn list_mut(&mut self, uid: &str) -> Option<&mut TaskList> {
        let list = self.lists.iter_mut().find(|l| l.uid == uid)?;
        self.dirty.insert(list.uid.clone());
        Some(list)
    }

    /// Adds a list, replacing one with the same uid.
    pub fn add_list(&mut self, list: TaskList) {
        self.dirty.insert(list.uid.clone());
        match self.lists.iter_mut().find(|l| l.uid == list.uid) {
            Some(existing) => *existing = list,
            None => self.lists.push(list),
        }
    }

    /// Whether any list awaits writing.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Writes modified lists, returning how many files were written.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written; lists not yet written
    /// stay marked.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn save(&mut self) -> Result<usize, StoreError> {
        let mut written = 0;
        for list in &self.lists {
            if !self.dirty.contains(&list.uid) {
                continue;
            }
            let path = self.dir.join(&list.file_name);
            let tmp = path.with_extension("ics.tmp");
            let io_err = |source| StoreError::Io {
                path: path.clone(),
                source,
            };
            fs::write(&tmp, list.to_ical()).await.map_err(io_err)?;
            fs::rename(&tmp, &path).await.map_err(io_err)?;
            self.dirty.remove(&list.uid);
            written += 1;
            tracing::debug!(path = %path.display(), "list written");
        }
        Ok(written)
    }
}

async fn read_list(path: &Path) -> Result<TaskList, StoreError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    TaskList::from_ical(&text, stem)
}
