//! Locating the ffmpeg binary.
//!
//! Resolution order: `FFMPEG_PATH`, then the configured path, then `ffmpeg`
//! on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable that overrides every other ffmpeg location.
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Resolve the ffmpeg program to spawn.
pub fn resolve_ffmpeg_binary(configured: Option<&Path>) -> PathBuf {
    resolve_with_env(std::env::var_os(FFMPEG_PATH_ENV).map(PathBuf::from), configured)
}

fn resolve_with_env(env: Option<PathBuf>, configured: Option<&Path>) -> PathBuf {
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    PathBuf::from("ffmpeg")
}

/// Whether the given program can be executed.
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .args(["-c", "command -v \"$1\" >/dev/null 2>&1", "sh"])
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First line of `ffmpeg -version`, if the binary runs.
pub fn ffmpeg_version(binary: &Path) -> Option<String> {
    let output = Command::new(binary).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_wins_over_config() {
        let resolved = resolve_with_env(
            Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")),
            Some(Path::new("/usr/local/bin/ffmpeg")),
        );
        assert_eq!(resolved, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn test_falls_back_to_path_lookup() {
        assert_eq!(resolve_with_env(None, None), PathBuf::from("ffmpeg"));
        assert_eq!(
            resolve_with_env(Some(PathBuf::new()), Some(Path::new("/x/ffmpeg"))),
            PathBuf::from("/x/ffmpeg")
        );
    }

    #[test]
    fn test_missing_absolute_binary_does_not_exist() {
        assert!(!command_exists(Path::new("/definitely/not/here/ffmpeg")));
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_name_is_not_shell_evaluated() {
        assert!(command_exists(Path::new("sh")));
        assert!(!command_exists(Path::new("true; exit 0")));
        assert!(!command_exists(Path::new("$(echo sh)")));
    }
}
