use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const DATA_DIR: &str = "quotawatch";
const CONFIG_FILE: &str = "config.json";
const ACCOUNTS_DIR: &str = "accounts";

fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// Resolves the data directory: env override, then XDG config home, then
/// `~/.config/quotawatch`.
pub fn get_data_dir() -> AppResult<PathBuf> {
    if let Ok(env_path) = std::env::var("QUOTAWATCH_DATA_DIR") {
        if !env_path.trim().is_empty() {
            let dir = PathBuf::from(env_path);
            ensure_dir(&dir)?;
            return Ok(dir);
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            let dir = PathBuf::from(xdg).join(DATA_DIR);
            ensure_dir(&dir)?;
            return Ok(dir);
        }
    }

    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("cannot determine home directory".to_string()))?;
    let dir = home.join(".config").join(DATA_DIR);
    ensure_dir(&dir)?;
    Ok(dir)
}

pub fn get_accounts_dir() -> AppResult<PathBuf> {
    let dir = get_data_dir()?.join(ACCOUNTS_DIR);
    ensure_dir(&dir)?;
    Ok(dir)
}

pub fn get_config_path() -> AppResult<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Writes `data` atomically: temp file in the same directory, flush,
/// then rename over the destination. A reader never observes a
/// partially written record.
pub fn atomic_write(path: &Path, data: &[u8]) -> AppResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| AppError::Config(format!("no parent directory for {}", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Config(format!("invalid file name: {}", path.display())))?;
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(data)?;
        tmp.sync_all()?;
    }

    // Credential and config files must be readable by the owner only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Loads the app config, treating a missing file as defaults.
pub fn load_app_config_from(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::new());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(AppConfig::new());
    }

    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("failed to parse config file: {}", e)))
}

pub fn save_app_config_to(path: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("failed to serialize config: {}", e)))?;
    atomic_write(path, content.as_bytes())
}

pub fn load_app_config() -> AppResult<AppConfig> {
    load_app_config_from(&get_config_path()?)
}

pub fn save_app_config(config: &AppConfig) -> AppResult<()> {
    save_app_config_to(&get_config_path()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_creates_file_and_cleans_temp() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");

        atomic_write(&path, b"{\"a\":1}").expect("atomic write");

        assert_eq!(fs::read_to_string(&path).expect("read back"), "{\"a\":1}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file was left behind");
    }

    #[test]
    fn atomic_write_replaces_old_content_entirely() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        fs::write(&path, "old content that is fairly long").expect("seed file");

        atomic_write(&path, b"new").expect("atomic write");

        // Either the old or the fully new content; after a successful
        // rename it must be exactly the new bytes, never a mix.
        assert_eq!(fs::read_to_string(&path).expect("read back"), "new");
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        atomic_write(&path, b"secret").expect("atomic write");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_rename_preserves_old_state_and_removes_temp() {
        let dir = tempdir().expect("tempdir");
        // A non-empty directory at the destination makes the rename fail
        // after the temp file is fully written.
        let dest = dir.path().join("token.json");
        fs::create_dir(&dest).expect("seed dir");
        fs::write(dest.join("keep.json"), "old").expect("seed child");

        atomic_write(&dest, b"new").expect_err("rename over a non-empty directory must fail");

        assert_eq!(
            fs::read_to_string(dest.join("keep.json")).expect("read back"),
            "old"
        );
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file was left behind");
    }

    #[test]
    fn stale_temp_from_interrupted_write_never_reaches_destination() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        fs::write(&path, "old").expect("seed file");

        // A crash between temp-file write and rename leaves a partial
        // temp behind; the destination still reads as the old content.
        fs::write(dir.path().join(".token.json.tmp"), "ne").expect("seed temp");
        assert_eq!(fs::read_to_string(&path).expect("read back"), "old");

        // The next write replaces the stale temp and lands cleanly.
        atomic_write(&path, b"new").expect("atomic write");
        assert_eq!(fs::read_to_string(&path).expect("read back"), "new");
        assert!(!dir.path().join(".token.json.tmp").exists());
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let cfg = load_app_config_from(&dir.path().join("config.json")).expect("load");
        assert!(cfg.default_account.is_none());
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let mut cfg = AppConfig::new();
        cfg.default_account = Some("a@x.com".to_string());
        cfg.notifications.enabled = true;
        save_app_config_to(&path, &cfg).expect("save");

        let loaded = load_app_config_from(&path).expect("load");
        assert_eq!(loaded.default_account.as_deref(), Some("a@x.com"));
        assert!(loaded.notifications.enabled);
    }
}
