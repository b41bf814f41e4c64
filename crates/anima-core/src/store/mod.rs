//! Sled-backed store with one tree per collection.
//!
//! | Collection        | Key                        | Value           |
//! |-------------------|----------------------------|-----------------|
//! | users             | user_id (be)               | `UserRecord`    |
//! | psycho_profiles   | user_id (be)               | `PsychoProfile` |
//! | dialog_events     | user_id (be) ++ id (be)    | `DialogEvent`   |
//! | processed_updates | update_id (be)             | first-seen ms   |
//! | homework          | user_id (be) ++ id (be)    | `HomeworkTask`  |

mod records;

pub use records::{AppState, DialogEvent, Role, UserRecord, APP_STATE_KEY};

use crate::error::StoreError;
use crate::homework::{HomeworkStatus, HomeworkTask};
use crate::profile::{Anchor, AxisDeltas, PsychoProfile};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Profiles,
    DialogEvents,
    ProcessedUpdates,
    Homework,
}

impl Collection {
    pub fn tree_name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Profiles => "psycho_profiles",
            Self::DialogEvents => "dialog_events",
            Self::ProcessedUpdates => "processed_updates",
            Self::Homework => "homework",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Profiles => "Psychometric profiles",
            Self::DialogEvents => "Dialog events",
            Self::ProcessedUpdates => "Processed updates",
            Self::Homework => "Homework",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Users,
            Self::Profiles,
            Self::DialogEvents,
            Self::ProcessedUpdates,
            Self::Homework,
        ]
    }
}

/// Health of one collection, reported by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub name: String,
    pub tree_name: String,
    pub connected: bool,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn user_key(user_id: i64) -> [u8; 8] {
    user_id.to_be_bytes()
}

fn scoped_key(user_id: i64, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user_id.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

/// Users, profiles, dialog history, idempotency keys and homework.
pub struct ProfileStore {
    db: Db,
}

impl ProfileStore {
    /// Opens or creates the store at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store removed on drop. Used by tests and dry runs.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tree(&self, collection: Collection) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(collection.tree_name())?)
    }

    // --- idempotency ---

    /// Records `update_id`. Returns `false` when it was already processed.
    pub fn mark_update_processed(&self, update_id: i64) -> Result<bool, StoreError> {
        let tree = self.tree(Collection::ProcessedUpdates)?;
        let seen_at = crate::now_ms().to_be_bytes();
        let inserted = tree
            .compare_and_swap(update_id.to_be_bytes(), None::<&[u8]>, Some(&seen_at[..]))?
            .is_ok();
        if !inserted {
            tracing::debug!(target: "anima::store", update_id, "duplicate update ignored");
        }
        Ok(inserted)
    }

    // --- users and state ---

    /// Creates the user row when missing; refreshes names when they changed.
    pub fn ensure_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<UserRecord, StoreError> {
        let tree = self.tree(Collection::Users)?;
        let key = user_key(user_id);
        let existing = tree.get(key)?.map(|b| UserRecord::from_bytes(&b)).transpose()?;
        let created = existing.is_none();
        let mut user = existing.unwrap_or_else(|| UserRecord::new(user_id));
        let before = user.clone();
        if username.is_some() {
            user.username = username.map(str::to_string);
        }
        if first_name.is_some() {
            user.first_name = first_name.map(str::to_string);
        }
        if last_name.is_some() {
            user.last_name = last_name.map(str::to_string);
        }
        if created || user != before {
            tree.insert(key, user.to_bytes()?)?;
        }
        if created {
            tracing::info!(target: "anima::store", user_id, "user created");
        }
        Ok(user)
    }

    pub fn user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let tree = self.tree(Collection::Users)?;
        Ok(tree.get(user_key(user_id))?.map(|b| UserRecord::from_bytes(&b)).transpose()?)
    }

    /// Conversational state; default for unknown users.
    pub fn app_state(&self, user_id: i64) -> Result<AppState, StoreError> {
        match self.user(user_id)? {
            Some(user) => Ok(user.app_state()?),
            None => Ok(AppState::default()),
        }
    }

    /// Writes the state into the user's facts bag, creating the user row if needed.
    pub fn set_app_state(&self, user_id: i64, state: &AppState) -> Result<(), StoreError> {
        let tree = self.tree(Collection::Users)?;
        let key = user_key(user_id);
        let mut user = match tree.get(key)? {
            Some(b) => UserRecord::from_bytes(&b)?,
            None => UserRecord::new(user_id),
        };
        user.set_app_state(state)?;
        tree.insert(key, user.to_bytes()?)?;
        Ok(())
    }

    pub fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        let tree = self.tree(Collection::Users)?;
        let mut ids = Vec::new();
        for key in tree.iter().keys() {
            let key = key?;
            if let Ok(raw) = <[u8; 8]>::try_from(&key[..]) {
                ids.push(i64::from_be_bytes(raw));
            }
        }
        Ok(ids)
    }

    // --- profiles ---

    pub fn profile(&self, user_id: i64) -> Result<Option<PsychoProfile>, StoreError> {
        let tree = self.tree(Collection::Profiles)?;
        Ok(tree
            .get(user_key(user_id))?
            .map(|b| serde_json::from_slice::<PsychoProfile>(&b))
            .transpose()?)
    }

    /// Overwrites the profile (questionnaire finalization).
    pub fn put_profile(&self, profile: &PsychoProfile) -> Result<(), StoreError> {
        let tree = self.tree(Collection::Profiles)?;
        tree.insert(user_key(profile.user_id), serde_json::to_vec(profile)?)?;
        tracing::info!(
            target: "anima::store",
            user_id = profile.user_id,
            mbti = profile.mbti_type.as_deref().unwrap_or("-"),
            confidence = profile.confidence,
            "profile written"
        );
        Ok(())
    }

    /// Applies an EWMA update atomically, creating a neutral profile first if absent.
    pub fn update_profile(
        &self,
        user_id: i64,
        deltas: &AxisDeltas,
        anchors: Vec<Anchor>,
    ) -> Result<PsychoProfile, StoreError> {
        let tree = self.tree(Collection::Profiles)?;
        let key = user_key(user_id);
        loop {
            let current = tree.get(key)?;
            let mut profile = match &current {
                Some(b) => serde_json::from_slice::<PsychoProfile>(b)?,
                None => PsychoProfile::neutral(user_id),
            };
            profile.apply(deltas, anchors.clone());
            let encoded = serde_json::to_vec(&profile)?;
            if tree.compare_and_swap(key, current, Some(encoded))?.is_ok() {
                tracing::debug!(
                    target: "anima::store",
                    user_id,
                    confidence = profile.confidence,
                    "profile updated"
                );
                return Ok(profile);
            }
        }
    }

    pub fn profiles(&self) -> Result<Vec<PsychoProfile>, StoreError> {
        let tree = self.tree(Collection::Profiles)?;
        let mut out = Vec::new();
        for item in tree.iter().values() {
            out.push(serde_json::from_slice(&item?)?);
        }
        Ok(out)
    }

    // --- dialog events ---

    /// Appends an event; assigns and returns its id.
    pub fn log_event(&self, mut event: DialogEvent) -> Result<u64, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        let id = self.db.generate_id()?;
        event.id = id;
        tree.insert(scoped_key(event.user_id, id), event.to_bytes()?)?;
        tracing::debug!(
            target: "anima::store",
            user_id = event.user_id,
            event_id = id,
            role = ?event.role,
            "dialog event logged"
        );
        Ok(id)
    }

    /// Most recent event of the user, if any.
    pub fn last_event(&self, user_id: i64) -> Result<Option<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        match tree.scan_prefix(user_key(user_id)).next_back() {
            Some(item) => Ok(Some(DialogEvent::from_bytes(&item?.1)?)),
            None => Ok(None),
        }
    }

    /// Earliest event of the user, if any.
    pub fn first_event(&self, user_id: i64) -> Result<Option<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        match tree.scan_prefix(user_key(user_id)).next() {
            Some(item) => Ok(Some(DialogEvent::from_bytes(&item?.1)?)),
            None => Ok(None),
        }
    }

    pub fn last_assistant_event(&self, user_id: i64) -> Result<Option<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        for item in tree.scan_prefix(user_key(user_id)).rev() {
            let event = DialogEvent::from_bytes(&item?.1)?;
            if event.role == Role::Assistant {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Newest-first events of one user.
    pub fn recent_events(&self, user_id: i64, limit: usize) -> Result<Vec<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        let mut out = Vec::with_capacity(limit.min(64));
        for item in tree.scan_prefix(user_key(user_id)).rev().take(limit) {
            out.push(DialogEvent::from_bytes(&item?.1)?);
        }
        Ok(out)
    }

    pub fn event_count(&self, user_id: i64) -> Result<usize, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        Ok(tree.scan_prefix(user_key(user_id)).count())
    }

    /// Events of all users created at or after `since_ms`.
    pub fn events_since(&self, since_ms: i64) -> Result<Vec<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        let mut out = Vec::new();
        for item in tree.iter().values() {
            let event = DialogEvent::from_bytes(&item?)?;
            if event.created_at_ms >= since_ms {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Events of one user created at or after `since_ms`, oldest first.
    pub fn user_events_since(&self, user_id: i64, since_ms: i64) -> Result<Vec<DialogEvent>, StoreError> {
        let tree = self.tree(Collection::DialogEvents)?;
        let mut out = Vec::new();
        for item in tree.scan_prefix(user_key(user_id)).values() {
            let event = DialogEvent::from_bytes(&item?)?;
            if event.created_at_ms >= since_ms {
                out.push(event);
            }
        }
        Ok(out)
    }

    // --- homework ---

    pub fn add_homework(
        &self,
        user_id: i64,
        text: &str,
        due: Option<chrono::NaiveDate>,
    ) -> Result<HomeworkTask, StoreError> {
        let id = self.db.generate_id()?;
        let task = HomeworkTask::new(id, user_id, text, due);
        self.put_homework(&task)?;
        tracing::info!(target: "anima::store", user_id, task_id = id, "homework added");
        Ok(task)
    }

    pub fn put_homework(&self, task: &HomeworkTask) -> Result<(), StoreError> {
        let tree = self.tree(Collection::Homework)?;
        tree.insert(scoped_key(task.user_id, task.id), serde_json::to_vec(task)?)?;
        Ok(())
    }

    /// Open tasks of one user in creation order.
    pub fn open_homework(&self, user_id: i64) -> Result<Vec<HomeworkTask>, StoreError> {
        let tree = self.tree(Collection::Homework)?;
        let mut out = Vec::new();
        for item in tree.scan_prefix(user_key(user_id)).values() {
            let task: HomeworkTask = serde_json::from_slice(&item?)?;
            if task.status == HomeworkStatus::Open {
                out.push(task);
            }
        }
        Ok(out)
    }

    /// Open tasks of every user.
    pub fn all_open_homework(&self) -> Result<Vec<HomeworkTask>, StoreError> {
        let tree = self.tree(Collection::Homework)?;
        let mut out = Vec::new();
        for item in tree.iter().values() {
            let task: HomeworkTask = serde_json::from_slice(&item?)?;
            if task.status == HomeworkStatus::Open {
                out.push(task);
            }
        }
        Ok(out)
    }

    // --- health ---

    pub fn get_all_status(&self) -> Vec<CollectionStatus> {
        Collection::all()
            .iter()
            .map(|c| match self.db.open_tree(c.tree_name()) {
                Ok(tree) => CollectionStatus {
                    name: c.label().to_string(),
                    tree_name: c.tree_name().to_string(),
                    connected: true,
                    entry_count: tree.len(),
                    error: None,
                },
                Err(e) => CollectionStatus {
                    name: c.label().to_string(),
                    tree_name: c.tree_name().to_string(),
                    connected: false,
                    entry_count: 0,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Phase;
    use crate::profile::Axis;

    #[test]
    fn update_ids_are_processed_once() {
        let store = ProfileStore::temporary().unwrap();
        assert!(store.mark_update_processed(100).unwrap());
        assert!(!store.mark_update_processed(100).unwrap());
        assert!(store.mark_update_processed(101).unwrap());
    }

    #[test]
    fn ensure_user_is_idempotent_and_keeps_state() {
        let store = ProfileStore::temporary().unwrap();
        store.ensure_user(7, Some("ann"), None, None).unwrap();
        let mut state = AppState::default();
        state.humor_on = true;
        store.set_app_state(7, &state).unwrap();
        let again = store.ensure_user(7, None, Some("Ann"), None).unwrap();
        assert_eq!(again.username.as_deref(), Some("ann"));
        assert_eq!(again.first_name.as_deref(), Some("Ann"));
        assert!(store.app_state(7).unwrap().humor_on);
        assert_eq!(store.user_ids().unwrap(), vec![7]);
    }

    #[test]
    fn profile_is_created_lazily_on_first_update() {
        let store = ProfileStore::temporary().unwrap();
        assert!(store.profile(3).unwrap().is_none());
        let deltas: AxisDeltas = [(Axis::Ei, 0.2)].into_iter().collect();
        let p = store.update_profile(3, &deltas, Vec::new()).unwrap();
        assert!((p.ei - 0.52).abs() < 1e-6);
        assert!((p.confidence - 0.02).abs() < 1e-6);
        assert_eq!(store.profile(3).unwrap(), Some(p));
    }

    #[test]
    fn events_are_ordered_per_user() {
        let store = ProfileStore::temporary().unwrap();
        store.log_event(DialogEvent::user(1, "a", Phase::Engage)).unwrap();
        store.log_event(DialogEvent::user(2, "other", Phase::Engage)).unwrap();
        store.log_event(DialogEvent::assistant(1, "b", Phase::Focus)).unwrap();
        store.log_event(DialogEvent::user(1, "c", Phase::Evoke)).unwrap();

        assert_eq!(store.last_event(1).unwrap().unwrap().text, "c");
        assert_eq!(store.last_assistant_event(1).unwrap().unwrap().text, "b");
        let recent: Vec<_> = store.recent_events(1, 2).unwrap().into_iter().map(|e| e.text).collect();
        assert_eq!(recent, vec!["c", "b"]);
        assert_eq!(store.event_count(1).unwrap(), 3);
        assert_eq!(store.event_count(2).unwrap(), 1);
        assert!(store.last_event(9).unwrap().is_none());
    }

    #[test]
    fn negative_chat_ids_do_not_collide() {
        let store = ProfileStore::temporary().unwrap();
        store.log_event(DialogEvent::user(-5, "group", Phase::Engage)).unwrap();
        store.log_event(DialogEvent::user(5, "private", Phase::Engage)).unwrap();
        assert_eq!(store.last_event(-5).unwrap().unwrap().text, "group");
        assert_eq!(store.last_event(5).unwrap().unwrap().text, "private");
    }

    #[test]
    fn homework_lists_only_open_tasks() {
        let store = ProfileStore::temporary().unwrap();
        let a = store.add_homework(1, "journal", None).unwrap();
        store.add_homework(1, "walk", None).unwrap();
        let mut done = a.clone();
        done.status = HomeworkStatus::Done;
        store.put_homework(&done).unwrap();
        let open = store.open_homework(1).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].text, "walk");
        assert_eq!(store.all_open_homework().unwrap().len(), 1);
    }

    #[test]
    fn status_lists_every_collection() {
        let store = ProfileStore::temporary().unwrap();
        let status = store.get_all_status();
        assert_eq!(status.len(), Collection::all().len());
        assert!(status.iter().all(|s| s.connected));
    }
}
