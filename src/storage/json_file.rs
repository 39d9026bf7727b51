use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::agents::Agent;
use crate::error::{Result, StewardError};
use crate::policy::{ApprovalQueueItem, Policy};

use super::{settle_created_before, settle_one, ApprovalDecision, Settled, Store};

const AGENTS_FILE: &str = "agents.json";
const POLICIES_FILE: &str = "policies.json";
const APPROVALS_FILE: &str = "approvals.json";

/// File-backed store: one JSON array per record type under `data_dir`.
///
/// Every mutation is a locked read-modify-write that lands through a temp file
/// and rename, so concurrent `steward` processes (daemon and CLI) never see a
/// torn file.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        read_records(&self.path(file))
    }

    /// Apply `f` to the records of `file` under an exclusive lock and persist
    /// the result.
    fn modify<T, F, R>(&self, file: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let path = self.path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(&path)?;
        let mut records: Vec<T> = read_records(&path)?;
        let out = f(&mut records);
        write_records(&path, &records)?;
        Ok(out)
    }
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).map_err(|e| StewardError::Storage {
        reason: format!("failed to parse {}: {}", path.display(), e),
    })
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    set_file_permissions_0600(&tmp_path);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn upsert_by_id<T: Clone>(records: &mut Vec<T>, record: &T, id_of: impl Fn(&T) -> &str) {
    let id = id_of(record).to_string();
    match records.iter().position(|r| id_of(r) == id) {
        Some(idx) => records[idx] = record.clone(),
        None => records.push(record.clone()),
    }
}

fn replace_by_id<T: Clone>(records: &mut [T], record: &T, id_of: impl Fn(&T) -> &str) -> bool {
    let id = id_of(record).to_string();
    match records.iter().position(|r| id_of(r) == id) {
        Some(idx) => {
            records[idx] = record.clone();
            true
        }
        None => false,
    }
}

fn remove_by_id<T>(records: &mut Vec<T>, id: &str, id_of: impl Fn(&T) -> &str) -> bool {
    let before = records.len();
    records.retain(|r| id_of(r) != id);
    records.len() != before
}

impl Store for JsonFileStore {
    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        self.modify(AGENTS_FILE, |records: &mut Vec<Agent>| {
            upsert_by_id(records, agent, |a| a.id.as_str())
        })
    }

    fn update_agent(&self, agent: &Agent) -> Result<bool> {
        self.modify(AGENTS_FILE, |records: &mut Vec<Agent>| {
            replace_by_id(records, agent, |a| a.id.as_str())
        })
    }

    fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let records: Vec<Agent> = self.read(AGENTS_FILE)?;
        Ok(records.into_iter().find(|a| a.id == id))
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        self.read(AGENTS_FILE)
    }

    fn delete_agent(&self, id: &str) -> Result<bool> {
        self.modify(AGENTS_FILE, |records: &mut Vec<Agent>| {
            remove_by_id(records, id, |a| a.id.as_str())
        })
    }

    fn insert_policy(&self, policy: &Policy) -> Result<()> {
        self.modify(POLICIES_FILE, |records: &mut Vec<Policy>| {
            upsert_by_id(records, policy, |p| p.id.as_str())
        })
    }

    fn update_policy(&self, policy: &Policy) -> Result<bool> {
        self.modify(POLICIES_FILE, |records: &mut Vec<Policy>| {
            replace_by_id(records, policy, |p| p.id.as_str())
        })
    }

    fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        let records: Vec<Policy> = self.read(POLICIES_FILE)?;
        Ok(records.into_iter().find(|p| p.id == id))
    }

    fn list_policies(&self) -> Result<Vec<Policy>> {
        self.read(POLICIES_FILE)
    }

    fn delete_policy(&self, id: &str) -> Result<bool> {
        self.modify(POLICIES_FILE, |records: &mut Vec<Policy>| {
            remove_by_id(records, id, |p| p.id.as_str())
        })
    }

    fn insert_approval(&self, item: &ApprovalQueueItem) -> Result<()> {
        self.modify(APPROVALS_FILE, |records: &mut Vec<ApprovalQueueItem>| {
            upsert_by_id(records, item, |i| i.id.as_str())
        })
    }

    fn update_approval(&self, item: &ApprovalQueueItem) -> Result<bool> {
        self.modify(APPROVALS_FILE, |records: &mut Vec<ApprovalQueueItem>| {
            replace_by_id(records, item, |i| i.id.as_str())
        })
    }

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalQueueItem>> {
        let records: Vec<ApprovalQueueItem> = self.read(APPROVALS_FILE)?;
        Ok(records.into_iter().find(|i| i.id == id))
    }

    fn list_approvals(&self) -> Result<Vec<ApprovalQueueItem>> {
        self.read(APPROVALS_FILE)
    }

    fn decide_approval(&self, id: &str, decision: &ApprovalDecision) -> Result<Option<Settled>> {
        self.modify(APPROVALS_FILE, |records: &mut Vec<ApprovalQueueItem>| {
            settle_one(records, id, decision)
        })
    }

    fn settle_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        decision: &ApprovalDecision,
    ) -> Result<Vec<ApprovalQueueItem>> {
        self.modify(APPROVALS_FILE, |records: &mut Vec<ApprovalQueueItem>| {
            settle_created_before(records, cutoff, decision)
        })
    }
}

/// Set file permissions to 0600 (owner read/write only).
#[cfg(unix)]
fn set_file_permissions_0600(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    let _ = fs::set_permissions(path, perms);
}

#[cfg(not(unix))]
fn set_file_permissions_0600(_path: &Path) {}

/// Advisory file lock using flock(2) on a .lock file.
struct FileLock {
    _file: fs::File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        flock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}

// Dropping the FileLock closes the file, which releases the lock.

#[cfg(unix)]
fn flock_exclusive(file: &fs::File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };
    if ret != 0 {
        return Err(StewardError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &fs::File) -> Result<()> {
    Ok(())
}
