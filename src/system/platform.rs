use std::path::PathBuf;

/// Filesystem root watched by the disk collector when none is configured.
pub fn default_disk_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from("C:\\")
    }
    #[cfg(not(target_os = "windows"))]
    {
        PathBuf::from("/")
    }
}
