//! The virtual file store shared by all pipeline stages.

use std::collections::BTreeMap;
use std::fmt;

use super::document::{CollectionMembership, FileRecord};

/// A write that displaced an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The key both records resolved to
    pub path: String,
    /// Where the incoming record came from, if it was relocated
    pub incoming_from: Option<String>,
    /// Stage that was running when the collision happened
    pub stage: Option<&'static str>,
}

/// Observer notified on every collision.
pub type CollisionHook = Box<dyn Fn(&Collision) + Send + Sync>;

/// Path-keyed records for one build run.
///
/// Keys are unique and a write to an existing key replaces the previous
/// record (last write wins). Iteration order is lexicographic by key, which
/// makes runs reproducible but carries no meaning for stages.
#[derive(Default)]
pub struct FileStore {
    files: BTreeMap<String, FileRecord>,
    on_collision: Option<CollisionHook>,
    active_stage: Option<&'static str>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("files", &self.files)
            .field("active_stage", &self.active_stage)
            .finish_non_exhaustive()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an observer for overwrites.
    pub fn with_collision_hook(mut self, hook: CollisionHook) -> Self {
        self.on_collision = Some(hook);
        self
    }

    /// Record which stage is mutating the store, for collision reports.
    pub(crate) fn set_active_stage(&mut self, stage: Option<&'static str>) {
        self.active_stage = stage;
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.files.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Insert or overwrite the record at `path`.
    ///
    /// The record's `path` field is updated to match the key. Returns the
    /// displaced record, if any. Use [`get_mut`](Self::get_mut) for in-place
    /// updates; overwriting through `set` is reported as a collision.
    pub fn set(&mut self, path: impl Into<String>, mut record: FileRecord) -> Option<FileRecord> {
        let path = path.into();
        record.path = path.clone();
        let incoming_from = record.original_path.clone();

        let displaced = self.files.insert(path.clone(), record);
        if displaced.is_some() {
            self.report_collision(path, incoming_from);
        }
        displaced
    }

    pub fn delete(&mut self, path: &str) -> Option<FileRecord> {
        self.files.remove(path)
    }

    /// Snapshot of the current keys.
    ///
    /// Stages iterate the snapshot while mutating the live store.
    pub fn keys(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Move the record at `from` to `to`.
    ///
    /// The record is taken out of `from` and stored under `to` within the
    /// same call, so no other mutation can observe it missing. `original_path`
    /// is set to `from` and collection neighbours are pointed at the new key.
    /// Returns `false` if there was nothing at `from`.
    pub fn relocate(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.files.contains_key(from);
        }

        let Some(mut record) = self.files.remove(from) else {
            return false;
        };
        record.original_path = Some(from.to_string());
        let memberships = record.metadata.collections.clone();

        tracing::trace!(from, to, "relocating record");
        self.set(to, record);
        for membership in &memberships {
            self.relink_neighbours(membership, from, to);
        }
        true
    }

    fn relink_neighbours(&mut self, membership: &CollectionMembership, from: &str, to: &str) {
        let retarget = |link: &mut Option<String>| {
            if link.as_deref() == Some(from) {
                *link = Some(to.to_string());
            }
        };

        if let Some(previous) = membership.previous.as_deref()
            && let Some(record) = self.files.get_mut(previous)
        {
            for m in record.metadata.collections.iter_mut() {
                if m.name == membership.name {
                    retarget(&mut m.next);
                }
            }
        }
        if let Some(next) = membership.next.as_deref()
            && let Some(record) = self.files.get_mut(next)
        {
            for m in record.metadata.collections.iter_mut() {
                if m.name == membership.name {
                    retarget(&mut m.previous);
                }
            }
        }
    }

    /// Members of a collection, in collection order.
    pub fn collection(&self, name: &str) -> Vec<&FileRecord> {
        let mut members: Vec<(usize, &FileRecord)> = self
            .files
            .values()
            .filter_map(|record| {
                record
                    .metadata
                    .collections
                    .iter()
                    .find(|m| m.name == name)
                    .map(|m| (m.position, record))
            })
            .collect();
        members.sort_by_key(|(position, _)| *position);
        members.into_iter().map(|(_, record)| record).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileRecord)> {
        self.files.iter()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.files.values_mut()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn report_collision(&self, path: String, incoming_from: Option<String>) {
        if let Some(hook) = &self.on_collision {
            hook(&Collision {
                path,
                incoming_from,
                stage: self.active_stage,
            });
        }
    }
}
