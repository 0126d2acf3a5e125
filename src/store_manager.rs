use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::command::{validate, Command, CommandUpdate, NewCommand};
use crate::error::{ArgusError, Result, ValidationError};

/// Owns the registry file. Sole writer; every mutation is a locked
/// load-modify-persist cycle that lands through an atomic rename.
///
/// The lock lives in the instance. Share one `StoreManager` (e.g. behind an
/// `Arc`) per registry file; separate instances or processes on the same
/// path do not coordinate and the last write wins.
pub struct StoreManager {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StoreManager {
    /// Opens (without creating) the registry at `path`; a missing file reads as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "registry opened");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> Result<Vec<Command>> {
        self.load_all()
    }

    pub fn get(&self, id: Uuid) -> Result<Command> {
        self.load_all()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or(ArgusError::NotFound(id))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Command>> {
        Ok(self.load_all()?.into_iter().find(|c| c.name == name))
    }

    pub fn create(&self, request: NewCommand) -> Result<Command> {
        let mut command = request.into_command();
        validate(&command)?;

        self.mutate(|commands| {
            if commands.iter().any(|c| c.name == command.name) {
                return Err(ValidationError::DuplicateName(command.name.clone()).into());
            }
            while commands.iter().any(|c| c.id == command.id) {
                command.id = Uuid::new_v4();
            }
            commands.push(command.clone());
            Ok(())
        })?;

        info!(id = %command.id, name = %command.name, "command created");
        Ok(command)
    }

    pub fn update(&self, id: Uuid, changes: CommandUpdate) -> Result<Command> {
        let updated = self.mutate(|commands| {
            let index = commands
                .iter()
                .position(|c| c.id == id)
                .ok_or(ArgusError::NotFound(id))?;

            let mut merged = commands[index].clone();
            changes.apply_to(&mut merged);
            validate(&merged)?;
            if commands.iter().any(|c| c.id != id && c.name == merged.name) {
                return Err(ValidationError::DuplicateName(merged.name).into());
            }
            merged.updated_at = Utc::now().max(merged.created_at);

            commands[index] = merged.clone();
            Ok(merged)
        })?;

        info!(id = %id, "command updated");
        Ok(updated)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.mutate(|commands| {
            let initial_len = commands.len();
            commands.retain(|c| c.id != id);
            if commands.len() == initial_len {
                return Err(ArgusError::NotFound(id));
            }
            Ok(())
        })?;

        info!(id = %id, "command deleted");
        Ok(())
    }

    /// Case-insensitive substring match on names, in list order.
    pub fn search_by_name(&self, query: &str) -> Result<Vec<Command>> {
        let commands = self.load_all()?;
        let query_lower = query.to_lowercase();
        Ok(commands
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&query_lower))
            .collect())
    }

    pub fn search_by_tags(&self, tags: &[String]) -> Result<Vec<Command>> {
        let commands = self.load_all()?;
        Ok(commands
            .into_iter()
            .filter(|c| tags.iter().any(|tag| c.tags.contains(tag)))
            .collect())
    }

    /// Counts one use at `timestamp`. A timestamp older than the command's
    /// creation is clamped to `created_at`.
    pub fn record_usage(&self, id: Uuid, timestamp: DateTime<Utc>) -> Result<Command> {
        self.mutate(|commands| {
            let command = commands
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(ArgusError::NotFound(id))?;
            command.use_count = command.use_count.saturating_add(1);
            command.last_used_at = Some(timestamp.max(command.created_at));
            debug!(id = %id, use_count = command.use_count, "usage recorded");
            Ok(command.clone())
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Command>) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        let mut commands = self.load_all()?;
        let out = f(&mut commands)?;
        self.save_all(&commands)?;
        Ok(out)
    }

    fn load_all(&self) -> Result<Vec<Command>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            // Absent only when nothing at all sits at the path; a dangling link is an error.
            Err(e) if e.kind() == io::ErrorKind::NotFound && !self.path_is_occupied() => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e.into()),
        };
        let commands: Vec<Command> =
            serde_json::from_str(&content).map_err(|source| ArgusError::CorruptData {
                path: self.path.clone(),
                source,
            })?;
        debug!(count = commands.len(), "registry loaded");
        Ok(commands)
    }

    fn path_is_occupied(&self) -> bool {
        !matches!(fs::symlink_metadata(&self.path), Err(e) if e.kind() == io::ErrorKind::NotFound)
    }

    fn save_all(&self, commands: &[Command]) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, commands)
                .map_err(|e| ArgusError::Storage(format!("Failed to serialize registry: {}", e)))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ArgusError::Io(e.error))?;

        debug!(count = commands.len(), path = %self.path.display(), "registry persisted");
        Ok(())
    }
}
