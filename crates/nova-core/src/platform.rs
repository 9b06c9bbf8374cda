use std::path::PathBuf;

#[cfg(unix)]
pub fn player_binary_names() -> &'static [&'static str] {
    &["cvlc", "vlc"]
}

#[cfg(windows)]
pub fn player_binary_names() -> &'static [&'static str] {
    &["vlc.exe", "vlc"]
}

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/novaplayer/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("novaplayer")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("novaplayer")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("novaplayer")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("novaplayer")
    }
}

/// Default destination for recordings, matching the historical `~/Opnames`
/// location.
pub fn default_recordings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::env::temp_dir())
        .join("Opnames")
}

fn find_beside_exe(names: &[&str]) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    for name in names {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    #[cfg(unix)]
    let sep = ":";
    #[cfg(windows)]
    let sep = ";";
    for dir in path.split(sep) {
        for name in names {
            let p = PathBuf::from(dir).join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Find the VLC binary used for both playback and recording.
/// Checks beside the current exe first, then PATH.
pub fn find_player_binary() -> Option<PathBuf> {
    if let Some(p) = find_beside_exe(player_binary_names()) {
        return Some(p);
    }
    find_on_path(player_binary_names())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names_prefer_headless_vlc() {
        #[cfg(unix)]
        assert_eq!(player_binary_names()[0], "cvlc");
        assert!(!player_binary_names().is_empty());
    }

    #[test]
    fn recordings_dir_ends_with_opnames() {
        assert!(default_recordings_dir().ends_with("Opnames"));
    }
}
