//! Task storage backed by sled.
//!
//! Every record key is `user_id ++ record_id` (both big-endian), so a
//! prefix scan over a user ID only ever sees that user's records.
//!
//! Writes go through one lock per store so that uniqueness checks and
//! subject/label cascades see a stable view of the trees.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::types::{
    DEFAULT_LABEL_COLOR, Dashboard, DashboardStats, Label, LabelInput, Notifications,
    RECENT_TASK_LIMIT, RecordId, Subject, SubjectInput, Task, TaskFilter, TaskInput, TaskStatus,
};

/// Task store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record missing or owned by someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness constraint violated.
    #[error("{0}")]
    Conflict(String),
}

/// Open (or create) the shared database at `path`.
///
/// # Errors
///
/// Returns error if the database cannot be opened.
pub fn open_db(path: &Path) -> Result<sled::Db, StoreError> {
    let db = sled::open(path)?;
    tracing::debug!(path = %path.display(), "Opened database");
    Ok(db)
}

fn record_key(user_id: RecordId, id: RecordId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user_id.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn load<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, StoreError> {
    match tree.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn save<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), StoreError> {
    tree.insert(key, serde_json::to_vec(value)?)?;
    Ok(())
}

fn scan_user<T: DeserializeOwned>(tree: &sled::Tree, user_id: RecordId) -> Result<Vec<T>, StoreError> {
    let mut records = Vec::new();
    for result in tree.scan_prefix(user_id.to_be_bytes()) {
        let (_, value) = result?;
        records.push(serde_json::from_slice(&value)?);
    }
    Ok(records)
}

/// Subjects, labels and tasks for all users.
#[derive(Clone)]
pub struct TaskStore {
    db: sled::Db,
    writes: Arc<Mutex<()>>,
    subjects: sled::Tree,
    labels: sled::Tree,
    tasks: sled::Tree,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("subjects", &self.subjects.len())
            .field("labels", &self.labels.len())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Open or create a task store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_db(open_db(path)?)
    }

    /// Create a task store over an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        let subjects = db.open_tree("subjects")?;
        let labels = db.open_tree("labels")?;
        let tasks = db.open_tree("tasks")?;

        Ok(Self {
            db,
            writes: Arc::new(Mutex::new(())),
            subjects,
            labels,
            tasks,
        })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub const fn db(&self) -> &sled::Db {
        &self.db
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        // Guards no data, so a panicked writer leaves nothing to repair
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> Result<RecordId, StoreError> {
        // sled ids start at 0; keep 0 free so it never names a record
        Ok(self.db.generate_id()? + 1)
    }

    // ---- subjects ----

    /// List a user's subjects, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn list_subjects(&self, user_id: RecordId) -> Result<Vec<Subject>, StoreError> {
        let mut subjects: Vec<Subject> = scan_user(&self.subjects, user_id)?;
        subjects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(subjects)
    }

    /// Get a subject owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn get_subject(&self, user_id: RecordId, id: RecordId) -> Result<Option<Subject>, StoreError> {
        load(&self.subjects, &record_key(user_id, id))
    }

    fn ensure_subject_name_free(
        &self,
        user_id: RecordId,
        name: &str,
        except: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let taken = scan_user::<Subject>(&self.subjects, user_id)?
            .iter()
            .any(|s| s.name == name && Some(s.id) != except);
        if taken {
            return Err(StoreError::Conflict(format!(
                "Subject '{name}' already exists"
            )));
        }
        Ok(())
    }

    /// Create a subject.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the user already has a subject with this name.
    pub fn create_subject(&self, user_id: RecordId, input: SubjectInput) -> Result<Subject, StoreError> {
        let _guard = self.write_lock();
        self.ensure_subject_name_free(user_id, &input.name, None)?;

        let subject = Subject {
            id: self.next_id()?,
            user_id,
            name: input.name,
            description: input.description,
            created_at: Utc::now(),
            updated_at: None,
        };
        save(&self.subjects, &record_key(user_id, subject.id), &subject)?;
        self.subjects.flush()?;

        tracing::debug!(user_id, subject_id = subject.id, "Created subject");
        Ok(subject)
    }

    /// Rename or re-describe a subject.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if not owned by `user_id`, `Conflict` on a duplicate name.
    pub fn update_subject(
        &self,
        user_id: RecordId,
        id: RecordId,
        input: SubjectInput,
    ) -> Result<Subject, StoreError> {
        let _guard = self.write_lock();
        let mut subject = self
            .get_subject(user_id, id)?
            .ok_or(StoreError::NotFound("Subject"))?;
        self.ensure_subject_name_free(user_id, &input.name, Some(id))?;

        subject.name = input.name;
        subject.description = input.description;
        subject.updated_at = Some(Utc::now());
        save(&self.subjects, &record_key(user_id, id), &subject)?;
        self.subjects.flush()?;
        Ok(subject)
    }

    /// Delete a subject and every task in it.
    ///
    /// Returns `false` if the subject doesn't exist for this user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_subject(&self, user_id: RecordId, id: RecordId) -> Result<bool, StoreError> {
        let _guard = self.write_lock();
        if self.subjects.remove(record_key(user_id, id))?.is_none() {
            return Ok(false);
        }

        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for task in scan_user::<Task>(&self.tasks, user_id)? {
            if task.subject_id == id {
                batch.remove(&record_key(user_id, task.id)[..]);
                removed += 1;
            }
        }
        self.tasks.apply_batch(batch)?;
        self.db.flush()?;

        tracing::debug!(user_id, subject_id = id, tasks = removed, "Deleted subject");
        Ok(true)
    }

    // ---- labels ----

    /// List a user's labels, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn list_labels(&self, user_id: RecordId) -> Result<Vec<Label>, StoreError> {
        let mut labels: Vec<Label> = scan_user(&self.labels, user_id)?;
        labels.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(labels)
    }

    /// Get a label owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn get_label(&self, user_id: RecordId, id: RecordId) -> Result<Option<Label>, StoreError> {
        load(&self.labels, &record_key(user_id, id))
    }

    fn ensure_label_name_free(
        &self,
        user_id: RecordId,
        name: &str,
        except: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let taken = scan_user::<Label>(&self.labels, user_id)?
            .iter()
            .any(|l| l.name == name && Some(l.id) != except);
        if taken {
            return Err(StoreError::Conflict(format!("Label '{name}' already exists")));
        }
        Ok(())
    }

    /// Create a label. An empty colour falls back to the default.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the user already has a label with this name.
    pub fn create_label(&self, user_id: RecordId, input: LabelInput) -> Result<Label, StoreError> {
        let _guard = self.write_lock();
        self.ensure_label_name_free(user_id, &input.name, None)?;

        let color = if input.color.is_empty() {
            DEFAULT_LABEL_COLOR.to_string()
        } else {
            input.color
        };
        let label = Label {
            id: self.next_id()?,
            user_id,
            name: input.name,
            color,
            created_at: Utc::now(),
        };
        save(&self.labels, &record_key(user_id, label.id), &label)?;
        self.labels.flush()?;

        tracing::debug!(user_id, label_id = label.id, "Created label");
        Ok(label)
    }

    /// Edit a label.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if not owned by `user_id`, `Conflict` on a duplicate name.
    pub fn update_label(
        &self,
        user_id: RecordId,
        id: RecordId,
        input: LabelInput,
    ) -> Result<Label, StoreError> {
        let _guard = self.write_lock();
        let mut label = self
            .get_label(user_id, id)?
            .ok_or(StoreError::NotFound("Label"))?;
        self.ensure_label_name_free(user_id, &input.name, Some(id))?;

        label.name = input.name;
        if !input.color.is_empty() {
            label.color = input.color;
        }
        save(&self.labels, &record_key(user_id, id), &label)?;
        self.labels.flush()?;
        Ok(label)
    }

    /// Delete a label and detach it from any tasks using it.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_label(&self, user_id: RecordId, id: RecordId) -> Result<bool, StoreError> {
        let _guard = self.write_lock();
        if self.labels.remove(record_key(user_id, id))?.is_none() {
            return Ok(false);
        }

        let mut batch = sled::Batch::default();
        for mut task in scan_user::<Task>(&self.tasks, user_id)? {
            if task.label_id == Some(id) {
                task.label_id = None;
                task.updated_at = Some(Utc::now());
                batch.insert(&record_key(user_id, task.id)[..], serde_json::to_vec(&task)?);
            }
        }
        self.tasks.apply_batch(batch)?;
        self.db.flush()?;

        tracing::debug!(user_id, label_id = id, "Deleted label");
        Ok(true)
    }

    // ---- tasks ----

    /// Resolve the subject and label references of a task input.
    ///
    /// A subject owned by someone else is an error; a foreign label is dropped.
    fn owned_refs(
        &self,
        user_id: RecordId,
        input: &TaskInput,
    ) -> Result<Option<RecordId>, StoreError> {
        if self.get_subject(user_id, input.subject_id)?.is_none() {
            return Err(StoreError::NotFound("Subject"));
        }
        match input.label_id {
            Some(label_id) if self.get_label(user_id, label_id)?.is_some() => Ok(Some(label_id)),
            Some(label_id) => {
                tracing::debug!(user_id, label_id, "Dropping label not owned by user");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Get a task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn get_task(&self, user_id: RecordId, id: RecordId) -> Result<Option<Task>, StoreError> {
        load(&self.tasks, &record_key(user_id, id))
    }

    /// Create a task.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the subject isn't owned by `user_id`.
    pub fn create_task(&self, user_id: RecordId, input: TaskInput) -> Result<Task, StoreError> {
        let _guard = self.write_lock();
        let label_id = self.owned_refs(user_id, &input)?;

        let task = Task {
            id: self.next_id()?,
            user_id,
            subject_id: input.subject_id,
            label_id,
            title: input.title,
            note: input.note,
            status: input.status.unwrap_or_default(),
            due_date: input.due_date,
            created_at: Utc::now(),
            updated_at: None,
        };
        save(&self.tasks, &record_key(user_id, task.id), &task)?;
        self.tasks.flush()?;

        tracing::debug!(user_id, task_id = task.id, "Created task");
        Ok(task)
    }

    /// Edit a task.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the task or its new subject isn't owned by `user_id`.
    pub fn update_task(
        &self,
        user_id: RecordId,
        id: RecordId,
        input: TaskInput,
    ) -> Result<Task, StoreError> {
        let _guard = self.write_lock();
        let mut task = self
            .get_task(user_id, id)?
            .ok_or(StoreError::NotFound("Task"))?;
        let label_id = self.owned_refs(user_id, &input)?;

        task.subject_id = input.subject_id;
        task.label_id = label_id;
        task.title = input.title;
        task.note = input.note;
        task.due_date = input.due_date;
        if let Some(status) = input.status {
            task.status = status;
        }
        task.updated_at = Some(Utc::now());

        save(&self.tasks, &record_key(user_id, id), &task)?;
        self.tasks.flush()?;
        Ok(task)
    }

    /// Flip a task between todo and done.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the task isn't owned by `user_id`.
    pub fn toggle_task(&self, user_id: RecordId, id: RecordId) -> Result<Task, StoreError> {
        let _guard = self.write_lock();
        let mut task = self
            .get_task(user_id, id)?
            .ok_or(StoreError::NotFound("Task"))?;

        task.status = task.status.toggled();
        task.updated_at = Some(Utc::now());
        save(&self.tasks, &record_key(user_id, id), &task)?;
        self.tasks.flush()?;
        Ok(task)
    }

    /// Delete a task.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_task(&self, user_id: RecordId, id: RecordId) -> Result<bool, StoreError> {
        let _guard = self.write_lock();
        let removed = self.tasks.remove(record_key(user_id, id))?.is_some();
        self.tasks.flush()?;
        Ok(removed)
    }

    fn all_tasks(&self, user_id: RecordId) -> Result<Vec<Task>, StoreError> {
        scan_user(&self.tasks, user_id)
    }

    /// List a user's tasks matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn list_tasks(
        &self,
        user_id: RecordId,
        filter: &TaskFilter,
        now: NaiveDateTime,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .all_tasks(user_id)?
            .into_iter()
            .filter(|t| filter.matches(t, now))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    /// Number of tasks per subject for a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn task_counts(
        &self,
        user_id: RecordId,
    ) -> Result<std::collections::HashMap<RecordId, usize>, StoreError> {
        let mut counts = std::collections::HashMap::new();
        for task in self.all_tasks(user_id)? {
            *counts.entry(task.subject_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Open tasks bucketed by urgency.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn notifications(
        &self,
        user_id: RecordId,
        now: NaiveDateTime,
    ) -> Result<Notifications, StoreError> {
        let tasks = self.all_tasks(user_id)?;
        Ok(Notifications::collect(&tasks, now))
    }

    /// Dashboard counts plus the most recently created tasks.
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn dashboard(&self, user_id: RecordId, now: NaiveDateTime) -> Result<Dashboard, StoreError> {
        let mut tasks = self.all_tasks(user_id)?;
        let stats = DashboardStats::collect(&tasks, now);

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks.truncate(RECENT_TASK_LIMIT);

        Ok(Dashboard {
            stats,
            recent_tasks: tasks,
        })
    }

    /// Remove every subject, label and task belonging to a user.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn purge_user(&self, user_id: RecordId) -> Result<usize, StoreError> {
        let _guard = self.write_lock();
        let mut removed = 0;
        for tree in [&self.tasks, &self.labels, &self.subjects] {
            let mut batch = sled::Batch::default();
            for result in tree.scan_prefix(user_id.to_be_bytes()) {
                let (key, _) = result?;
                batch.remove(key);
                removed += 1;
            }
            tree.apply_batch(batch)?;
        }
        self.db.flush()?;

        tracing::info!(user_id, records = removed, "Purged user data");
        Ok(removed)
    }

    /// Count open tasks (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns error if storage read fails.
    pub fn count_open(&self, user_id: RecordId) -> Result<usize, StoreError> {
        Ok(self
            .all_tasks(user_id)?
            .iter()
            .filter(|t| t.status == TaskStatus::Todo)
            .count())
    }

    /// Flush all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns error if flush fails.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const ALICE: RecordId = 1;
    const BOB: RecordId = 2;

    fn store() -> (TempDir, TaskStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn subject(name: &str) -> SubjectInput {
        SubjectInput {
            name: name.to_string(),
            description: None,
        }
    }

    fn label(name: &str) -> LabelInput {
        LabelInput {
            name: name.to_string(),
            color: String::new(),
        }
    }

    fn task(subject_id: RecordId, title: &str) -> TaskInput {
        TaskInput {
            title: title.to_string(),
            note: None,
            subject_id,
            label_id: None,
            due_date: None,
            status: None,
        }
    }

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_subject_names_unique_per_user() {
        let (_dir, store) = store();

        store.create_subject(ALICE, subject("Work")).unwrap();
        let dup = store.create_subject(ALICE, subject("Work"));
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        // Another user may reuse the name
        store.create_subject(BOB, subject("Work")).unwrap();
        assert_eq!(store.list_subjects(ALICE).unwrap().len(), 1);
        assert_eq!(store.list_subjects(BOB).unwrap().len(), 1);
    }

    #[test]
    fn test_subject_update_keeps_own_name() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        store.create_subject(ALICE, subject("Home")).unwrap();

        let same = store
            .update_subject(
                ALICE,
                work.id,
                SubjectInput {
                    name: "Work".to_string(),
                    description: Some("day job".to_string()),
                },
            )
            .unwrap();
        assert_eq!(same.description.as_deref(), Some("day job"));
        assert!(same.updated_at.is_some());

        let clash = store.update_subject(ALICE, work.id, subject("Home"));
        assert!(matches!(clash, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_cross_user_access_is_not_found() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let t = store.create_task(ALICE, task(work.id, "Report")).unwrap();

        assert!(store.get_subject(BOB, work.id).unwrap().is_none());
        assert!(store.get_task(BOB, t.id).unwrap().is_none());
        assert!(matches!(
            store.update_subject(BOB, work.id, subject("Mine")),
            Err(StoreError::NotFound("Subject"))
        ));
        assert!(matches!(
            store.toggle_task(BOB, t.id),
            Err(StoreError::NotFound("Task"))
        ));
        assert!(!store.delete_task(BOB, t.id).unwrap());
        assert!(store.get_task(ALICE, t.id).unwrap().is_some());
    }

    #[test]
    fn test_task_with_foreign_subject_rejected() {
        let (_dir, store) = store();
        let bobs = store.create_subject(BOB, subject("Bob's")).unwrap();

        let result = store.create_task(ALICE, task(bobs.id, "Sneaky"));
        assert!(matches!(result, Err(StoreError::NotFound("Subject"))));
    }

    #[test]
    fn test_task_with_foreign_label_drops_label() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let mine = store.create_label(ALICE, label("urgent")).unwrap();
        let bobs = store.create_label(BOB, label("urgent")).unwrap();

        let mut input = task(work.id, "Labelled");
        input.label_id = Some(mine.id);
        assert_eq!(store.create_task(ALICE, input).unwrap().label_id, Some(mine.id));

        let mut input = task(work.id, "Foreign label");
        input.label_id = Some(bobs.id);
        assert_eq!(store.create_task(ALICE, input).unwrap().label_id, None);
    }

    #[test]
    fn test_label_default_color() {
        let (_dir, store) = store();
        let l = store.create_label(ALICE, label("misc")).unwrap();
        assert_eq!(l.color, DEFAULT_LABEL_COLOR);

        let edited = store
            .update_label(
                ALICE,
                l.id,
                LabelInput {
                    name: "misc".to_string(),
                    color: "#00FF00".to_string(),
                },
            )
            .unwrap();
        assert_eq!(edited.color, "#00FF00");
    }

    #[test]
    fn test_delete_subject_cascades_tasks() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let home = store.create_subject(ALICE, subject("Home")).unwrap();
        store.create_task(ALICE, task(work.id, "a")).unwrap();
        store.create_task(ALICE, task(work.id, "b")).unwrap();
        let keep = store.create_task(ALICE, task(home.id, "c")).unwrap();

        assert!(store.delete_subject(ALICE, work.id).unwrap());
        assert!(!store.delete_subject(ALICE, work.id).unwrap());

        let remaining = store
            .list_tasks(ALICE, &TaskFilter::default(), at("2026-01-01 00:00"))
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn test_delete_label_clears_tasks() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let urgent = store.create_label(ALICE, label("urgent")).unwrap();
        let mut input = task(work.id, "a");
        input.label_id = Some(urgent.id);
        let t = store.create_task(ALICE, input).unwrap();

        assert!(store.delete_label(ALICE, urgent.id).unwrap());
        assert_eq!(store.get_task(ALICE, t.id).unwrap().unwrap().label_id, None);
    }

    #[test]
    fn test_toggle_and_filter() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let a = store.create_task(ALICE, task(work.id, "Write report")).unwrap();
        store.create_task(ALICE, task(work.id, "Call Bob")).unwrap();

        assert_eq!(store.toggle_task(ALICE, a.id).unwrap().status, TaskStatus::Done);
        assert_eq!(store.count_open(ALICE).unwrap(), 1);

        let now = at("2026-01-01 00:00");
        let done = TaskFilter {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        let listed = store.list_tasks(ALICE, &done, now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Write report");

        let search = TaskFilter {
            search: Some("BOB".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_tasks(ALICE, &search, now).unwrap().len(), 1);
        assert!(store.list_tasks(BOB, &TaskFilter::default(), now).unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let first = store.create_task(ALICE, task(work.id, "first")).unwrap();
        let second = store.create_task(ALICE, task(work.id, "second")).unwrap();

        let listed = store
            .list_tasks(ALICE, &TaskFilter::default(), at("2026-01-01 00:00"))
            .unwrap();
        assert_eq!(
            listed.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(store.task_counts(ALICE).unwrap().get(&work.id), Some(&2));
    }

    #[test]
    fn test_dashboard_and_notifications() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        let now = at("2026-03-10 12:00");

        for (i, due) in ["2026-03-10 18:00", "2026-03-09 12:00", "2026-03-01 12:00"]
            .iter()
            .enumerate()
        {
            let mut input = task(work.id, &format!("t{i}"));
            input.due_date = Some(at(due));
            store.create_task(ALICE, input).unwrap();
        }
        for i in 0..4 {
            store.create_task(ALICE, task(work.id, &format!("undated {i}"))).unwrap();
        }

        let dashboard = store.dashboard(ALICE, now).unwrap();
        assert_eq!(dashboard.stats.total_tasks, 7);
        assert_eq!(dashboard.stats.due_today_count, 1);
        assert_eq!(dashboard.stats.overdue_count, 2);
        assert_eq!(dashboard.recent_tasks.len(), RECENT_TASK_LIMIT);

        let notes = store.notifications(ALICE, now).unwrap();
        assert_eq!(notes.due_today.len(), 1);
        assert_eq!(notes.recent_overdue.len(), 1);
        assert_eq!(notes.overdue.len(), 1);
    }

    #[test]
    fn test_purge_user() {
        let (_dir, store) = store();
        let work = store.create_subject(ALICE, subject("Work")).unwrap();
        store.create_label(ALICE, label("x")).unwrap();
        store.create_task(ALICE, task(work.id, "a")).unwrap();
        let bobs = store.create_subject(BOB, subject("Work")).unwrap();

        assert_eq!(store.purge_user(ALICE).unwrap(), 3);
        assert!(store.list_subjects(ALICE).unwrap().is_empty());
        assert!(store.list_labels(ALICE).unwrap().is_empty());
        assert_eq!(store.get_subject(BOB, bobs.id).unwrap().unwrap().name, "Work");
    }

    #[test]
    fn test_concurrent_creates_keep_names_unique() {
        let (_dir, store) = store();
        let barrier = std::sync::Barrier::new(8);
        let (store, barrier) = (&store, &barrier);

        let created = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        store.create_subject(ALICE, subject("Work")).is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|created| *created)
                .count()
        });

        assert_eq!(created, 1);
        assert_eq!(store.list_subjects(ALICE).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_subject_racing_create_task_leaves_no_orphans() {
        let (_dir, store) = store();

        for round in 0..20 {
            let work = store
                .create_subject(ALICE, subject(&format!("Work {round}")))
                .unwrap();
            let barrier = std::sync::Barrier::new(2);
            let (store_ref, barrier, subject_id) = (&store, &barrier, work.id);

            std::thread::scope(|scope| {
                scope.spawn(move || {
                    barrier.wait();
                    let _ = store_ref.create_task(ALICE, task(subject_id, "racing"));
                });
                scope.spawn(move || {
                    barrier.wait();
                    assert!(store_ref.delete_subject(ALICE, subject_id).unwrap());
                });
            });

            let orphans = store
                .list_tasks(ALICE, &TaskFilter::default(), at("2024-06-01 12:00"))
                .unwrap()
                .into_iter()
                .filter(|t| store.get_subject(ALICE, t.subject_id).unwrap().is_none())
                .count();
            assert_eq!(orphans, 0, "round {round}");
        }
    }
}
