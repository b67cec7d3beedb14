/*!
 * Link Descriptor
 *
 * Owned descriptor of an opened link file with explicit, error-reporting
 * close and a close-on-drop fallback.
 */

use parking_lot::Mutex;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Descriptor of an opened link file
///
/// # Example
///
/// ```ignore
/// let descriptor = LinkDescriptor::open(&path, true).await?;
/// let fd = descriptor.raw_fd();
/// descriptor.close()?;
/// ```
#[derive(Debug)]
pub struct LinkDescriptor {
    file: Mutex<Option<File>>,
    path: PathBuf,
    writable: bool,
}

impl LinkDescriptor {
    /// Open `path` read-write when `writable`, read-only otherwise
    pub async fn open(path: &Path, writable: bool) -> io::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .await?
            .into_std()
            .await;
        Ok(Self::from_std(file, path, writable))
    }

    /// Take ownership of an already opened file
    pub fn from_std(file: File, path: &Path, writable: bool) -> Self {
        debug!(path = %path.display(), fd = file.as_raw_fd(), writable, "link descriptor opened");
        Self {
            file: Mutex::new(Some(file)),
            path: path.to_path_buf(),
            writable,
        }
    }

    /// Mode the descriptor was actually opened with
    #[inline]
    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw descriptor while open
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file.lock().as_ref().map(|file| file.as_raw_fd())
    }

    pub fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Close the descriptor, reporting the close error if any
    ///
    /// Closing an already closed descriptor is a no-op.
    pub fn close(&self) -> io::Result<()> {
        let Some(file) = self.file.lock().take() else {
            debug!(path = %self.path.display(), "link descriptor already closed");
            return Ok(());
        };
        let fd = file.into_raw_fd();
        nix::unistd::close(fd).map_err(io::Error::from)?;
        debug!(path = %self.path.display(), fd, "link descriptor closed");
        Ok(())
    }
}

impl Drop for LinkDescriptor {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                error!(path = %self.path.display(), error = %e, "link descriptor close on drop failed");
            }
        }
    }
}
