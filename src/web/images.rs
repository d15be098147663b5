//! Portrait files on disk and the URLs they're served under.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::PROFILE_PICS_URL;
use crate::store::CharacterId;

/// File name for a character's portrait.
pub(crate) fn profile_pic_filename(id: CharacterId) -> String {
    format!("profile_{id}.png")
}

/// Public URL for a character's portrait.
pub(crate) fn profile_pic_url(id: CharacterId) -> String {
    format!("{PROFILE_PICS_URL}/{}", profile_pic_filename(id))
}

/// Maps a stored portrait URL back onto `profile_dir`. Anything outside the
/// portrait URL space, or that would escape the directory, maps to nothing.
pub(crate) fn profile_pic_path(profile_dir: &Path, url: &str) -> Option<PathBuf> {
    let prefix = format!("{PROFILE_PICS_URL}/");
    let name = url.replace('\\', "/");
    let name = name.strip_prefix(&prefix)?;
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return None;
    }
    Some(profile_dir.join(name))
}

/// Writes the portrait PNG, returning its URL.
pub(crate) async fn save_profile_pic(
    profile_dir: &Path,
    id: CharacterId,
    png: &[u8],
) -> Result<String, std::io::Error> {
    tokio::fs::create_dir_all(profile_dir).await?;
    let path = profile_dir.join(profile_pic_filename(id));
    tokio::fs::write(&path, png).await?;
    debug!("Saved portrait {}", path.display());
    Ok(profile_pic_url(id))
}

/// Deletes the portrait behind `url`, returning whether a file was removed.
pub(crate) async fn remove_profile_pic(
    profile_dir: &Path,
    url: &str,
) -> Result<bool, std::io::Error> {
    let Some(path) = profile_pic_path(profile_dir, url) else {
        return Ok(false);
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            debug!("Removed portrait {}", path.display());
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_map_back_to_files() {
        let dir = Path::new("/srv/static/profile_pics");
        assert_eq!(profile_pic_url(7), "/static/profile_pics/profile_7.png");
        assert_eq!(
            profile_pic_path(dir, &profile_pic_url(7)),
            Some(dir.join("profile_7.png"))
        );
        assert_eq!(
            profile_pic_path(dir, "\\static\\profile_pics\\profile_2.png"),
            Some(dir.join("profile_2.png"))
        );
    }

    #[test]
    fn foreign_or_escaping_urls_are_ignored() {
        let dir = Path::new("/srv/static/profile_pics");
        assert_eq!(profile_pic_path(dir, ""), None);
        assert_eq!(profile_pic_path(dir, "https://example.org/a.png"), None);
        assert_eq!(profile_pic_path(dir, "/static/profile_pics/../../etc/passwd"), None);
        assert_eq!(profile_pic_path(dir, "/static/profile_pics/.."), None);
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let profile_dir = dir.path().join("profile_pics");
        let url = save_profile_pic(&profile_dir, 3, b"png")
            .await
            .expect("save");
        assert!(profile_dir.join("profile_3.png").exists());
        assert!(remove_profile_pic(&profile_dir, &url).await.expect("remove"));
        assert!(!remove_profile_pic(&profile_dir, &url).await.expect("remove again"));
    }
}
