//! ION device session over raw ioctls.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::{error, trace};
use nix::errno::Errno;

use super::abi::{
    IonAllocationData, IonFdData, IonHandleData, ion_ioc_alloc, ion_ioc_free, ion_ioc_map,
};
use crate::error::{RaceError, Result};
use crate::models::{Handle, MapDescriptor};
use crate::session::{AllocatorDevice, AllocatorSession};

pub const DEFAULT_ION_PATH: &str = "/dev/ion";

#[derive(Debug, Clone)]
pub struct IonDevice {
    path: PathBuf,
}

impl IonDevice {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for IonDevice {
    fn default() -> Self {
        Self::new(DEFAULT_ION_PATH)
    }
}

impl AllocatorDevice for IonDevice {
    type Session = IonSession;

    fn open_session(&self) -> Result<IonSession> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(&self.path)
            .map_err(|source| {
                error!("open {} failed: {}", self.path.display(), source);
                RaceError::OpenFailed {
                    path: self.path.clone(),
                    source,
                }
            })?;
        trace!("opened {} as fd {}", self.path.display(), file.as_raw_fd());
        Ok(IonSession { file })
    }
}

/// An open ION client. Every request is a bare ioctl on the shared fd.
#[derive(Debug)]
pub struct IonSession {
    file: File,
}

impl AllocatorSession for IonSession {
    fn allocate(&self, size: usize, mask: u32, flags: u32) -> Result<Handle> {
        let mut req = IonAllocationData {
            len: size,
            align: size,
            heap_id_mask: mask,
            flags,
            handle: 0,
        };
        unsafe { ion_ioc_alloc(self.file.as_raw_fd(), &mut req) }
            .map_err(|source| RaceError::AllocFailed { mask, source })?;
        Ok(Handle(req.handle))
    }

    fn release(&self, handle: Handle) -> Result<()> {
        let mut req = IonHandleData {
            handle: handle.raw(),
        };
        unsafe { ion_ioc_free(self.file.as_raw_fd(), &mut req) }.map_err(|source| {
            RaceError::FreeFailed {
                handle: handle.raw(),
                source,
            }
        })?;
        Ok(())
    }

    fn map(&self, handle: Handle) -> Result<MapDescriptor> {
        let mut req = IonFdData {
            handle: handle.raw(),
            fd: -1,
        };
        unsafe { ion_ioc_map(self.file.as_raw_fd(), &mut req) }.map_err(|source| {
            RaceError::MapFailed {
                handle: handle.raw(),
                source,
            }
        })?;
        if req.fd < 0 {
            return Ok(MapDescriptor::detached());
        }
        // The kernel installed a fresh fd for us; nobody else owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(req.fd) };
        Ok(MapDescriptor::from_fd(fd))
    }

    fn close(self) -> Result<()> {
        let fd = self.file.into_raw_fd();
        trace!("closing ion fd {}", fd);
        Errno::result(unsafe { libc::close(fd) })
            .map(drop)
            .map_err(|source| RaceError::CloseFailed { fd, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        assert_eq!(IonDevice::default().path(), Path::new("/dev/ion"));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let device = IonDevice::new("/nonexistent/ion");
        match device.open_session() {
            Err(RaceError::OpenFailed { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/ion"));
            }
            other => panic!("expected OpenFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_close_releases_fd() {
        let session = match IonDevice::new("/dev/null").open_session() {
            Ok(session) => session,
            Err(_) => return,
        };
        assert!(session.file.as_raw_fd() >= 0);
        assert!(session.close().is_ok());
    }

    #[test]
    fn test_requests_on_non_ion_fd_fail() {
        // /dev/null accepts the open but rejects every ION ioctl
        let session = match IonDevice::new("/dev/null").open_session() {
            Ok(session) => session,
            Err(_) => return,
        };
        assert!(matches!(
            session.allocate(4096, 1 << 25, 0),
            Err(RaceError::AllocFailed { mask, .. }) if mask == 1 << 25
        ));
        assert!(matches!(
            session.release(Handle(1)),
            Err(RaceError::FreeFailed { handle: 1, .. })
        ));
        assert!(matches!(
            session.map(Handle(1)),
            Err(RaceError::MapFailed { handle: 1, .. })
        ));
        assert!(session.close().is_ok());
    }
}
