use std::path::PathBuf;

/// Data directory: `~/.local/share/gardenfm/` (XDG layout).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("gardenfm")
}

/// Config directory: `~/.config/gardenfm/`.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gardenfm")
}

/// Path of the mpv JSON IPC socket.
pub fn mpv_socket_path() -> PathBuf {
    std::env::temp_dir().join("gardenfm-mpv.sock")
}

/// Find the mpv binary: beside the current executable first, then PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local = dir.join("mpv");
            if local.exists() {
                return Some(local);
            }
        }
    }

    let path = std::env::var("PATH").ok()?;
    for dir in path.split(':') {
        let candidate = PathBuf::from(dir).join("mpv");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
