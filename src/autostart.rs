use anyhow::Result;
use std::path::Path;

/// Name of the run-at-login record.
pub const APP_NAME: &str = "SecClock";

/// Command line stored in the run-at-login record.
pub fn startup_command(exe: &Path) -> String {
    format!("\"{}\"", exe.display())
}

/// XDG autostart entry launching `exe`.
pub fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName={APP_NAME}\nExec={}\nX-GNOME-Autostart-enabled=true\n",
        startup_command(exe)
    )
}

/// Register or unregister the running executable to start at login.
/// Removing a record that does not exist is not an error.
pub fn set_run_on_startup(enable: bool) -> Result<()> {
    let exe = std::env::current_exe()?;
    platform::apply(enable, &exe)
}

#[cfg(target_os = "windows")]
mod platform {
    use super::{startup_command, APP_NAME};
    use anyhow::{Context, Result};
    use std::path::Path;
    use winreg::enums::{HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE};
    use winreg::RegKey;

    const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

    pub fn apply(enable: bool, exe: &Path) -> Result<()> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = hkcu
            .open_subkey_with_flags(RUN_KEY, KEY_SET_VALUE | KEY_QUERY_VALUE)
            .context("open Run registry key")?;
        if enable {
            let command = startup_command(exe);
            key.set_value(APP_NAME, &command)
                .context("write Run registry value")?;
            tracing::info!(%command, "run on startup enabled");
        } else {
            match key.delete_value(APP_NAME) {
                Ok(()) => tracing::info!("run on startup disabled"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context("delete Run registry value"),
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::{desktop_entry, APP_NAME};
    use anyhow::{anyhow, Context, Result};
    use std::path::{Path, PathBuf};

    fn entry_path() -> Result<PathBuf> {
        let config = dirs_next::config_dir().ok_or_else(|| anyhow!("no config directory"))?;
        Ok(config.join("autostart").join(format!("{APP_NAME}.desktop")))
    }

    pub fn apply(enable: bool, exe: &Path) -> Result<()> {
        apply_at(&entry_path()?, enable, exe)
    }

    pub(super) fn apply_at(path: &Path, enable: bool, exe: &Path) -> Result<()> {
        if enable {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            std::fs::write(path, desktop_entry(exe))
                .with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "run on startup enabled");
        } else {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!(path = %path.display(), "run on startup disabled"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("remove {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{desktop_entry, startup_command};
    use std::path::Path;

    #[test]
    fn command_is_quoted() {
        let exe = Path::new("/opt/sec clock/sec_clock");
        assert_eq!(startup_command(exe), "\"/opt/sec clock/sec_clock\"");
    }

    #[test]
    fn desktop_entry_launches_executable() {
        let entry = desktop_entry(Path::new("/usr/bin/sec_clock"));
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Name=SecClock\n"));
        assert!(entry.contains("Exec=\"/usr/bin/sec_clock\"\n"));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn entry_is_written_and_removed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("autostart").join("SecClock.desktop");
        let exe = Path::new("/usr/bin/sec_clock");

        super::platform::apply_at(&path, true, exe).expect("enable");
        assert!(path.exists());
        super::platform::apply_at(&path, false, exe).expect("disable");
        assert!(!path.exists());
        super::platform::apply_at(&path, false, exe).expect("disable twice");
    }
}
