//! JSON file backed record store.
//!
//! Every read re-parses the file and every mutation rewrites it. Writes go
//! through a temp file that is fsynced and renamed over the target, so a
//! concurrent reader sees either the old or the new collection.

use crate::error::{BotError, Result};
use crate::store::records::{Member, MemberEntry, Task};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// File name of the member collection inside the data directory.
pub const MEMBERS_FILE: &str = "members.json";
/// File name of the task collection inside the data directory.
pub const TASKS_FILE: &str = "tasks.json";

/// Store for the member and task collections.
#[derive(Debug, Clone)]
pub struct RecordStore {
    members_path: PathBuf,
    tasks_path: PathBuf,
}

impl RecordStore {
    /// Store rooted at `data_dir` using the standard file names.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            members_path: data_dir.join(MEMBERS_FILE),
            tasks_path: data_dir.join(TASKS_FILE),
        }
    }

    /// Store with explicit file paths.
    #[cfg(test)]
    pub(crate) fn with_paths(members_path: PathBuf, tasks_path: PathBuf) -> Self {
        Self {
            members_path,
            tasks_path,
        }
    }

    pub fn members_path(&self) -> &Path {
        &self.members_path
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    /// Load all members keyed by username.
    ///
    /// Never fails: a missing or unparseable file yields an empty map, and
    /// entries that do not match the member schema are skipped.
    pub fn load_members(&self) -> BTreeMap<String, Member> {
        let Some(value) = read_json(&self.members_path) else {
            return BTreeMap::new();
        };
        let serde_json::Value::Object(entries) = value else {
            error!(
                "{} does not hold a member map, treating as empty",
                self.members_path.display()
            );
            return BTreeMap::new();
        };

        let mut members = BTreeMap::new();
        for (username, entry) in entries {
            match serde_json::from_value::<MemberEntry>(entry) {
                Ok(entry) => {
                    members.insert(
                        username.clone(),
                        Member {
                            username,
                            chat_id: entry.chat_id,
                        },
                    );
                }
                Err(e) => warn!("skipping malformed member record '{username}': {e}"),
            }
        }
        members
    }

    /// Load all tasks in stored order.
    ///
    /// Never fails: a missing or unparseable file yields an empty list, and
    /// entries that do not match the task schema are skipped.
    pub fn load_tasks(&self) -> Vec<Task> {
        let Some(value) = read_json(&self.tasks_path) else {
            return Vec::new();
        };
        let serde_json::Value::Array(entries) = value else {
            error!(
                "{} does not hold a task list, treating as empty",
                self.tasks_path.display()
            );
            return Vec::new();
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<Task>(entry) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!("skipping malformed task record #{index}: {e}");
                    None
                }
            })
            .collect()
    }

    /// Replace the member collection.
    pub fn save_members(&self, members: &BTreeMap<String, Member>) -> Result<()> {
        let entries: BTreeMap<&str, MemberEntry> = members
            .values()
            .map(|m| (m.username.as_str(), MemberEntry { chat_id: m.chat_id }))
            .collect();
        write_json_atomic(&self.members_path, &entries)?;
        info!("members saved to {}", self.members_path.display());
        Ok(())
    }

    /// Replace the task collection.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        write_json_atomic(&self.tasks_path, &tasks)?;
        info!("tasks saved to {}", self.tasks_path.display());
        Ok(())
    }

    /// Register a new member. Returns `false` if the username is taken.
    pub fn insert_member(&self, member: Member) -> Result<bool> {
        if member.username.trim().is_empty() {
            return Err(BotError::Validation("member username is empty".to_owned()));
        }
        let mut members = self.load_members();
        if members.contains_key(&member.username) {
            return Ok(false);
        }
        members.insert(member.username.clone(), member);
        self.save_members(&members)?;
        Ok(true)
    }

    /// Append a task to the end of the collection.
    pub fn append_task(&self, task: Task) -> Result<()> {
        if task.description.trim().is_empty() || task.assigned_to.trim().is_empty() {
            return Err(BotError::Validation(
                "task needs a description and an assignee".to_owned(),
            ));
        }
        if let Err(e) = task.deadline_date() {
            return Err(BotError::Validation(format!(
                "task deadline '{}' is not YYYY-MM-DD: {e}",
                task.deadline
            )));
        }
        let mut tasks = self.load_tasks();
        tasks.push(task);
        self.save_tasks(&tasks)
    }
}

fn read_json(path: &Path) -> Option<serde_json::Value> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} not found, returning empty collection", path.display());
            return None;
        }
        Err(e) => {
            error!("cannot read {}: {e}", path.display());
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("cannot parse JSON from {}: {e}", path.display());
            None
        }
    }
}

/// Serialize `value` as 4-space indented JSON and atomically replace `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            BotError::Storage(format!(
                "cannot create record directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| BotError::Storage(format!("cannot serialize {}: {e}", path.display())))?;

    let tmp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        BotError::Storage(format!(
            "cannot create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(&buf)
        .map_err(|e| BotError::Storage(format!("cannot write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| BotError::Storage(format!("cannot sync temp file: {e}")))?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(|e| {
        BotError::Storage(format!(
            "cannot rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
