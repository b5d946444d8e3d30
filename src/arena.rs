//! Page-aligned buffer arena with a read-only sentinel page.
//!
//! The arena backs one scanner: a working buffer of the caller-requested
//! capacity placed flush against a trailing page whose first byte is a copy
//! of the delimiter. Because the buffer's upper bound is page-aligned, that
//! trailing page is a self-contained protectable region, and the delimiter
//! search can run from any point in the buffer without a length bound: it
//! terminates at the sentinel if nowhere sooner.
//!
//! # Invariants
//! - The allocation is page-aligned and never moves or grows.
//! - `working()` ends exactly at a page boundary; the sentinel byte sits at
//!   offset `bufsz` of the scan coordinate space.
//! - On Unix the sentinel page is `PROT_READ` from construction until drop,
//!   which restores write access before releasing the memory.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::slice;

use crate::outcome::OpenError;

#[cfg(not(unix))]
const PAGE_SIZE_FALLBACK: usize = 4096;

#[cfg(unix)]
fn page_size() -> usize {
    // sysconf cannot fail for _SC_PAGESIZE on any supported platform, but
    // guard the cast anyway.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    PAGE_SIZE_FALLBACK
}

/// One contiguous page-aligned region: working buffer plus sentinel page.
///
/// The working buffer occupies the top `bufsz` bytes below the sentinel
/// page, so buffer offsets `0..bufsz` are writable and offset `bufsz` is the
/// first byte of the read-only page, pre-stamped with the delimiter.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
    bufsz: usize,
    pgsz: usize,
    /// Offset of the working buffer's first byte within the allocation.
    buf_off: usize,
}

// SAFETY: the arena exclusively owns its allocation; nothing aliases it
// outside this struct, and shared access only reads.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocates the arena and installs the sentinel.
    ///
    /// Fails with `OpenError::Alloc` if the allocation cannot be obtained
    /// (including size overflow) and `OpenError::Protect` if the sentinel
    /// page cannot be made read-only.
    pub(crate) fn new(bufsz: usize, delimiter: u8) -> Result<Self, OpenError> {
        debug_assert!(bufsz > 0);
        let pgsz = page_size();

        let rounded = bufsz
            .checked_add(pgsz - 1)
            .map(|n| n / pgsz * pgsz)
            .ok_or(OpenError::Alloc)?;
        let arena_len = rounded.checked_add(pgsz).ok_or(OpenError::Alloc)?;
        let layout = Layout::from_size_align(arena_len, pgsz).map_err(|_| OpenError::Alloc)?;

        // Zeroed so the very first delimiter scan (which may run before any
        // fill) never reads uninitialized memory.
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(OpenError::Alloc)?;

        // The working buffer sits flush against the sentinel page, so its
        // upper bound lands exactly on the page boundary at `rounded`.
        let buf_off = rounded - bufsz;

        // SAFETY: `rounded < arena_len`, so the write is in bounds.
        unsafe { ptr.as_ptr().add(rounded).write(delimiter) };

        #[cfg(unix)]
        {
            // SAFETY: `ptr + rounded` is page-aligned (alloc is aligned to
            // pgsz and rounded is a multiple of it) and the final pgsz bytes
            // belong to this allocation.
            let rc = unsafe {
                libc::mprotect(
                    ptr.as_ptr().add(rounded).cast::<libc::c_void>(),
                    pgsz,
                    libc::PROT_READ,
                )
            };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                // SAFETY: allocated above with this layout; nothing else
                // holds the pointer yet.
                unsafe { dealloc(ptr.as_ptr(), layout) };
                return Err(OpenError::Protect(err));
            }
        }

        Ok(Self {
            ptr,
            layout,
            bufsz,
            pgsz,
            buf_off,
        })
    }

    /// The writable working buffer, `bufsz` bytes.
    #[inline]
    pub(crate) fn working(&self) -> &[u8] {
        // SAFETY: `[buf_off, buf_off + bufsz)` is in bounds and initialized
        // memory is not required for u8 reads of an alloc'd region we own.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(self.buf_off), self.bufsz) }
    }

    /// Mutable view of the working buffer.
    #[inline]
    pub(crate) fn working_mut(&mut self) -> &mut [u8] {
        // SAFETY: same bounds as `working`; all of it is below the protected
        // page, so writes are permitted.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().add(self.buf_off), self.bufsz) }
    }

    /// The scan region `[from, bufsz]`: buffered bytes, free space, and the
    /// sentinel byte, in buffer coordinates.
    ///
    /// Running a byte search over this slice is guaranteed to find the
    /// delimiter at relative offset `bufsz - from` if nowhere sooner.
    #[inline]
    pub(crate) fn scan_region(&self, from: usize) -> &[u8] {
        debug_assert!(from <= self.bufsz);
        // SAFETY: the slice extends one byte past the working buffer, onto
        // the sentinel page, which is readable for the arena's lifetime.
        unsafe {
            slice::from_raw_parts(
                self.ptr.as_ptr().add(self.buf_off + from),
                self.bufsz - from + 1,
            )
        }
    }

    #[cfg(test)]
    pub(crate) fn page_sz(&self) -> usize {
        self.pgsz
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            // Restore write access before handing the pages back; the
            // allocator may write to freed memory.
            let sentinel = self.buf_off + self.bufsz;
            // SAFETY: same region protected in `new`.
            unsafe {
                libc::mprotect(
                    self.ptr.as_ptr().add(sentinel).cast::<libc::c_void>(),
                    self.pgsz,
                    libc::PROT_READ | libc::PROT_WRITE,
                );
            }
        }
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
