//! Advisory OS hints for the flat-node file.
//!
//! All of these are best effort: a failure is logged and the import
//! carries on. Outside Linux they compile to no-ops.

use std::fs::File;

#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

#[cfg(target_os = "linux")]
use log::info;

/// Ask the kernel to read a range ahead of a synchronous access.
pub(super) fn prefetch(file: &File, offset: u64, len: u64) {
    #[cfg(target_os = "linux")]
    {
        let rc = unsafe {
            libc::posix_fadvise(
                file.as_raw_fd(),
                offset as libc::off_t,
                len as libc::off_t,
                libc::POSIX_FADV_WILLNEED,
            )
        };
        if rc != 0 {
            info!("flat-node prefetch hint failed (rc {rc}); reads may be slower");
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (file, offset, len);
    }
}

/// Start writeback of a freshly written range without waiting for it.
pub(super) fn start_writeback(file: &File, offset: u64, len: u64) {
    #[cfg(target_os = "linux")]
    {
        let rc = unsafe {
            libc::sync_file_range(
                file.as_raw_fd(),
                offset as libc::off64_t,
                len as libc::off64_t,
                libc::SYNC_FILE_RANGE_WRITE,
            )
        };
        if rc != 0 {
            info!("flat-node writeback hint failed; nothing to worry about");
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (file, offset, len);
    }
}

/// Wait for writeback of an older range and drop it from the page cache.
/// Bounds the amount of dirty flat-node data the kernel holds and keeps
/// the file from duplicating the import driver's RAM cache.
pub(super) fn finish_and_evict(file: &File, offset: u64, len: u64) {
    #[cfg(target_os = "linux")]
    {
        let rc = unsafe {
            libc::sync_file_range(
                file.as_raw_fd(),
                offset as libc::off64_t,
                len as libc::off64_t,
                libc::SYNC_FILE_RANGE_WAIT_BEFORE
                    | libc::SYNC_FILE_RANGE_WRITE
                    | libc::SYNC_FILE_RANGE_WAIT_AFTER,
            )
        };
        if rc != 0 {
            info!("flat-node writeback wait failed; nothing to worry about");
            return;
        }
        let rc = unsafe {
            libc::posix_fadvise(
                file.as_raw_fd(),
                offset as libc::off_t,
                len as libc::off_t,
                libc::POSIX_FADV_DONTNEED,
            )
        };
        if rc != 0 {
            info!("flat-node page cache eviction hint failed (rc {rc})");
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (file, offset, len);
    }
}
