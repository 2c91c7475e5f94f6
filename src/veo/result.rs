//! PlayableResult - a downloaded video held in the session media directory.

use std::path::{Path, PathBuf};

/// A downloaded video ready to be played or saved.
///
/// The file lives until [`PlayableResult::release`] or
/// [`PlayableResult::persist`] is called. Callers that keep only the latest
/// result should hold it in a [`ResultSlot`].
#[derive(Debug)]
pub struct PlayableResult {
    path: PathBuf,
    size_bytes: u64,
    content_type: Option<String>,
    source_uri: String,
    handle: String,
}

impl PlayableResult {
    pub(crate) fn new(
        path: PathBuf,
        size_bytes: u64,
        content_type: Option<String>,
        source_uri: String,
        handle: String,
    ) -> Self {
        Self {
            path,
            size_bytes,
            content_type,
            source_uri,
            handle,
        }
    }

    /// Local path of the video file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Content-Type reported by the file server.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Remote URI the video was fetched from (without the key).
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Operation handle that produced this video.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Delete the local file. A file that is already gone is not an error.
    pub fn release(self) -> Result<(), std::io::Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Move the video to `dest`, creating parent directories as needed.
    ///
    /// An existing file at `dest` is never overwritten: the call fails with
    /// `ErrorKind::AlreadyExists` and the video stays where it is.
    pub fn persist(self, dest: &Path) -> Result<PathBuf, std::io::Error> {
        if dest.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            ));
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if std::fs::rename(&self.path, dest).is_err() {
            // Cross-device moves need a copy.
            std::fs::copy(&self.path, dest)?;
            std::fs::remove_file(&self.path)?;
        }
        Ok(dest.to_path_buf())
    }
}

/// Holds the current result and releases the previous one on replacement.
#[derive(Debug, Default)]
pub struct ResultSlot {
    current: Option<PlayableResult>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PlayableResult> {
        self.current.as_ref()
    }

    /// Store `result`, releasing whatever was there before.
    ///
    /// A previous result at the same path was overwritten by the new
    /// download and is not deleted.
    pub fn replace(&mut self, result: PlayableResult) {
        let new_path = result.path().to_path_buf();
        if let Some(previous) = self.current.replace(result) {
            if previous.path() == new_path {
                return;
            }
            let path = previous.path().to_path_buf();
            if let Err(e) = previous.release() {
                log::warn!("Failed to release superseded video {:?}: {}", path, e);
            }
        }
    }

    /// Take ownership of the current result, leaving the slot empty.
    pub fn take(&mut self) -> Option<PlayableResult> {
        self.current.take()
    }

    /// Release the current result, if any.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            if let Err(e) = previous.release() {
                log::warn!("Failed to release video: {}", e);
            }
        }
    }
}
