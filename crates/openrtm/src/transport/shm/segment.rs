// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named POSIX shared memory mapped into this process.
//!
//! The provider end creates the object and unlinks it on close; the consumer
//! end attaches by name. Each side unmaps its own view on drop.

use super::ShmError;
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};

/// Longest name accepted, leading slash included.
const NAME_MAX: usize = 255;

pub struct ShmSegment {
    base: NonNull<u8>,
    len: usize,
    name: String,
}

// SAFETY: the mapping is shared memory; every field the channel touches
// concurrently is an atomic, and the data area is handed over by the
// seq/ack protocol.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

/// `/name` with no further slash, as `shm_open` expects.
fn c_name(name: &str) -> Result<CString, ShmError> {
    let reason = match name.strip_prefix('/') {
        None => Some("missing leading '/'"),
        Some("") => Some("empty"),
        Some(rest) if rest.contains('/') => Some("'/' after the leading one"),
        Some(_) if name.len() > NAME_MAX => Some("longer than 255 bytes"),
        Some(_) => None,
    };
    if let Some(reason) = reason {
        return Err(ShmError::InvalidName(format!("{name}: {reason}")));
    }
    CString::new(name).map_err(|_| ShmError::InvalidName(format!("{name}: interior NUL")))
}

fn shm_open(name: &CString, flags: libc::c_int) -> io::Result<OwnedFd> {
    // SAFETY: name is NUL-terminated; the mode only applies with O_CREAT.
    let fd = unsafe { libc::shm_open(name.as_ptr(), flags, 0o600 as libc::mode_t) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd was just returned by shm_open and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Map `len` bytes of `fd` shared and read-write. The descriptor may be
/// closed afterwards; the mapping holds its own reference.
fn map_shared(fd: &OwnedFd, len: usize) -> Result<NonNull<u8>, ShmError> {
    // SAFETY: fd is open; a null hint lets the kernel choose the address and
    // MAP_FAILED is checked below.
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd.as_raw_fd(),
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(ShmError::Mmap(io::Error::last_os_error()));
    }
    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| ShmError::Mmap(io::Error::other("null mapping")))
}

impl ShmSegment {
    /// Create a zeroed segment of `len` bytes. A leftover object with the
    /// same name is removed first.
    pub fn create(name: &str, len: usize) -> Result<Self, ShmError> {
        let cname = c_name(name)?;
        // SAFETY: cname is NUL-terminated; a missing object is ignored.
        unsafe { libc::shm_unlink(cname.as_ptr()) };

        let fd = shm_open(&cname, libc::O_CREAT | libc::O_EXCL | libc::O_RDWR)
            .map_err(ShmError::SegmentCreate)?;
        let sized = libc::off_t::try_from(len)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
            .and_then(|off| {
                // SAFETY: fd is open for writing.
                match unsafe { libc::ftruncate(fd.as_raw_fd(), off) } {
                    0 => Ok(()),
                    _ => Err(io::Error::last_os_error()),
                }
            });
        let base = sized
            .map_err(ShmError::SegmentCreate)
            .and_then(|()| map_shared(&fd, len));
        let base = match base {
            Ok(base) => base,
            Err(e) => {
                // SAFETY: cname is NUL-terminated.
                unsafe { libc::shm_unlink(cname.as_ptr()) };
                return Err(e);
            }
        };

        // SAFETY: base maps `len` writable bytes nobody else has attached to.
        unsafe { ptr::write_bytes(base.as_ptr(), 0, len) };

        Ok(Self { base, len, name: name.to_string() })
    }

    /// Attach to an existing segment and map its first `len` bytes.
    pub fn open(name: &str, len: usize) -> Result<Self, ShmError> {
        let cname = c_name(name)?;
        let fd = shm_open(&cname, libc::O_RDWR).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ShmError::NotFound(name.to_string()),
            _ => ShmError::SegmentOpen(e),
        })?;
        let base = map_shared(&fd, len)?;
        Ok(Self { base, len, name: name.to_string() })
    }

    /// Drop the name from the namespace. Existing mappings stay valid and a
    /// segment that is already gone is fine.
    pub fn unlink(name: &str) -> Result<(), ShmError> {
        let cname = c_name(name)?;
        // SAFETY: cname is NUL-terminated; only the namespace entry goes.
        if unsafe { libc::shm_unlink(cname.as_ptr()) } == 0 {
            return Ok(());
        }
        match io::Error::last_os_error() {
            e if e.kind() == io::ErrorKind::NotFound => Ok(()),
            e => Err(ShmError::SegmentOpen(e)),
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: base/len describe a live mapping made by map_shared.
        unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        for bad in ["no_slash", "/", "/a/b"] {
            assert!(
                matches!(ShmSegment::open(bad, 64), Err(ShmError::InvalidName(_))),
                "{bad}"
            );
        }
        let long = format!("/{}", "x".repeat(NAME_MAX));
        assert!(matches!(
            ShmSegment::create(&long, 64),
            Err(ShmError::InvalidName(_))
        ));
    }

    #[test]
    fn test_create_open_share_bytes() {
        let name = format!("/openrtm_test_seg_{}", std::process::id());
        let writer = ShmSegment::create(&name, 4096).unwrap();
        let reader = ShmSegment::open(&name, 4096).unwrap();
        assert_eq!(reader.size(), 4096);
        // SAFETY: both mappings cover 4096 bytes.
        unsafe {
            *writer.as_ptr().add(10) = 0xAB;
            assert_eq!(*reader.as_ptr().add(10), 0xAB);
        }
        ShmSegment::unlink(&name).unwrap();
        ShmSegment::unlink(&name).unwrap();
        assert!(matches!(
            ShmSegment::open(&name, 4096),
            Err(ShmError::NotFound(_))
        ));
    }
}
