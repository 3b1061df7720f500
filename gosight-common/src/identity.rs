// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Stable agent identity persisted under an OS-appropriate state directory.
//!
//! The id is a version-4 UUID written on first start and read back verbatim
//! afterwards, so the same host keeps the same identity across restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

/// File name holding the agent id inside the state directory.
const ID_FILE: &str = "agent_id";

/// Application sub-directory under the state root.
const APP_DIR: &str = "gosight";

/// Resolve the default path of the agent id file.
///
/// POSIX: `$XDG_STATE_HOME/gosight/agent_id`, falling back to
/// `$HOME/.local/state/gosight/agent_id`. Windows: `%APPDATA%\gosight\agent_id`.
pub fn default_state_path() -> PathBuf {
    state_dir().join(ID_FILE)
}

#[cfg(not(windows))]
fn state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir).join(APP_DIR);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR),
        None => PathBuf::from("/var/lib").join(APP_DIR),
    }
}

#[cfg(windows)]
fn state_dir() -> PathBuf {
    match std::env::var_os("APPDATA") {
        Some(dir) => PathBuf::from(dir).join(APP_DIR),
        None => PathBuf::from(r"C:\ProgramData").join(APP_DIR),
    }
}

/// Load the agent id from `path`, generating and persisting a fresh one if
/// the file is absent or empty.
///
/// The parent directory is created with mode `0700` and the id file is
/// written atomically (temp file + rename) with mode `0600`. Any read or
/// write failure is returned to the caller; identity errors are fatal at
/// startup.
pub fn load_or_create(path: &Path) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let id = contents.trim().to_string();
            if !id.is_empty() {
                debug!(agent_id = %id, "loaded existing agent id");
                return Ok(id);
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let id = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        create_state_dir(parent)?;
    }
    write_atomic(path, &id)?;
    debug!(agent_id = %id, path = %path.display(), "generated new agent id");
    Ok(id)
}

fn create_state_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Write `contents` to `path` via a sibling temp file and rename, so a crash
/// mid-write never leaves a truncated id behind.
fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&tmp)?;
        use std::io::Write;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join(ID_FILE);

        let first = load_or_create(&path).unwrap();
        let second = load_or_create(&path).unwrap();
        assert_eq!(first, second);

        let on_disk = fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, first);
    }

    #[test]
    fn test_generated_id_is_uuid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ID_FILE);
        let id = load_or_create(&path).unwrap();
        assert!(Uuid::parse_str(&id).is_ok(), "not a uuid: {id}");
    }

    #[test]
    fn test_empty_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ID_FILE);
        fs::write(&path, "  \n").unwrap();
        let id = load_or_create(&path).unwrap();
        assert!(!id.trim().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), id);
    }

    #[test]
    fn test_existing_id_is_trimmed_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ID_FILE);
        fs::write(&path, "abc-123\n").unwrap();
        let id = load_or_create(&path).unwrap();
        assert_eq!(id, "abc-123");
        // The file keeps its original contents.
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc-123\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join(ID_FILE);
        load_or_create(&path).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }
}
