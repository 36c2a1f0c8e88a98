//! Safe wrapper around `libc::fd_set`.
//!
//! The set can only hold descriptors below `FD_SETSIZE`; inserting anything
//! larger is refused instead of writing past the bitmask.

use std::io;
use std::os::unix::io::RawFd;
use std::ptr;

/// Upper bound (exclusive) on descriptors a `FdSet` can hold.
pub const FD_LIMIT: usize = libc::FD_SETSIZE as usize;

/// Fixed-size descriptor bitmask used with `select(2)`.
#[derive(Clone, Copy)]
pub struct FdSet {
    raw: libc::fd_set,
    count: usize,
}

impl FdSet {
    pub fn new() -> Self {
        // SAFETY: fd_set is plain old data; FD_ZERO initializes it fully.
        let mut raw: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut raw) };
        Self { raw, count: 0 }
    }

    fn in_range(fd: RawFd) -> bool {
        fd >= 0 && (fd as usize) < FD_LIMIT
    }

    /// Add `fd`. Returns false if it is outside the bitmask.
    pub fn insert(&mut self, fd: RawFd) -> bool {
        if !Self::in_range(fd) {
            return false;
        }
        if !self.contains(fd) {
            // SAFETY: fd is within [0, FD_SETSIZE).
            unsafe { libc::FD_SET(fd, &mut self.raw) };
            self.count += 1;
        }
        true
    }

    /// Remove `fd`. Returns whether it was present.
    pub fn remove(&mut self, fd: RawFd) -> bool {
        if !self.contains(fd) {
            return false;
        }
        // SAFETY: contains() only succeeds for in-range descriptors.
        unsafe { libc::FD_CLR(fd, &mut self.raw) };
        self.count -= 1;
        true
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        // SAFETY: fd is within [0, FD_SETSIZE).
        Self::in_range(fd) && unsafe { libc::FD_ISSET(fd, &self.raw) }
    }

    /// Number of descriptors in the set.
    ///
    /// Not updated by `wait_readable`; use `contains` on the scratch copy.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Block until a descriptor in the set is readable.
    ///
    /// `select` overwrites the set with the ready subset, so call this on a
    /// scratch copy of the persistent set. Returns the number of ready
    /// descriptors.
    pub fn wait_readable(&mut self) -> io::Result<usize> {
        // SAFETY: raw is a valid fd_set; the other sets and timeout are null,
        // meaning no write/except interest and an unbounded wait.
        let rc = unsafe {
            libc::select(
                FD_LIMIT as libc::c_int,
                &mut self.raw,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(rc as usize)
    }
}

impl Default for FdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fds: Vec<RawFd> = (0..FD_LIMIT as RawFd).filter(|&fd| self.contains(fd)).collect();
        f.debug_set().entries(fds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_insert_remove() {
        let mut set = FdSet::new();
        assert!(set.is_empty());

        assert!(set.insert(3));
        assert!(set.insert(3));
        assert!(set.insert(7));
        assert_eq!(set.len(), 2);
        assert!(set.contains(3));
        assert!(set.contains(7));
        assert!(!set.contains(4));

        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert!(!set.contains(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut set = FdSet::new();
        assert!(!set.insert(-1));
        assert!(!set.insert(FD_LIMIT as RawFd));
        assert!(!set.contains(FD_LIMIT as RawFd));
        assert!(set.insert(FD_LIMIT as RawFd - 1));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut current = FdSet::new();
        current.insert(5);

        let mut scratch = current;
        scratch.remove(5);
        scratch.insert(6);

        assert!(current.contains(5));
        assert!(!current.contains(6));
        assert_eq!(format!("{current:?}"), "{5}");
    }

    #[test]
    fn test_wait_reports_readable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"x").unwrap();

        let mut current = FdSet::new();
        assert!(current.insert(listener.as_raw_fd()));

        let mut ready = current;
        let n = ready.wait_readable().unwrap();
        assert_eq!(n, 1);
        assert!(ready.contains(listener.as_raw_fd()));
        assert!(current.contains(listener.as_raw_fd()));
    }
}
