//! Per-Socket Connection State
//!
//! One `Connection` per accepted client: the non-blocking descriptor, an
//! incoming and an outgoing [`ByteBuffer`], three interest flags the
//! server consults when recomputing the epoll mask, and a last-activity
//! timestamp.
//!
//! ## Read/Write Drivers
//!
//! [`Connection::handle_read`] and [`Connection::handle_write`] each
//! perform exactly one non-blocking syscall and classify the outcome:
//! progress, "would block" (alive, nothing to do), end-of-stream, or a
//! fatal error. They never loop — the reactor's edge of readiness decides
//! when to try again, so one greedy peer can't monopolize the loop.
//!
//! A connection is neither `Clone` nor shared: it lives in the server's
//! fd→connection map and dies with its slot, closing the descriptor.

use crate::buffer::ByteBuffer;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Instant;

/// Bytes of incoming-buffer space guaranteed before each read.
const READ_WINDOW: usize = 4096;

/// Per-client state. See the module docs.
#[derive(Debug)]
pub struct Connection {
    fd: RawFd,
    incoming: ByteBuffer,
    outgoing: ByteBuffer,
    want_read: bool,
    want_write: bool,
    want_close: bool,
    last_activity: Instant,
}

impl Connection {
    /// Wraps an already non-blocking descriptor. The connection owns the
    /// fd from here on and closes it when dropped.
    pub fn new(fd: RawFd) -> Self {
        Self {
            fd,
            incoming: ByteBuffer::new(),
            outgoing: ByteBuffer::new(),
            want_read: true,
            want_write: false,
            want_close: false,
            last_activity: Instant::now(),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn incoming(&mut self) -> &mut ByteBuffer {
        &mut self.incoming
    }

    pub fn outgoing(&mut self) -> &mut ByteBuffer {
        &mut self.outgoing
    }

    pub fn want_read(&self) -> bool {
        self.want_read
    }

    pub fn want_write(&self) -> bool {
        self.want_write
    }

    pub fn want_close(&self) -> bool {
        self.want_close
    }

    pub fn set_want_read(&mut self, v: bool) {
        self.want_read = v;
    }

    pub fn set_want_write(&mut self, v: bool) {
        self.want_write = v;
    }

    pub fn set_want_close(&mut self, v: bool) {
        self.want_close = v;
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// One non-blocking read into the incoming buffer. Returns `false`
    /// on EOF or a fatal error — the read side of this connection is
    /// done. The buffer grows lazily, so a connection that never sends
    /// never allocates.
    pub fn handle_read(&mut self) -> bool {
        self.incoming.ensure_writable(READ_WINDOW);
        let window = self.incoming.writable_mut();
        let n = unsafe {
            libc::read(
                self.fd,
                window.as_mut_ptr() as *mut libc::c_void,
                window.len(),
            )
        };

        if n > 0 {
            self.incoming.advance_write(n as usize);
            self.last_activity = Instant::now();
            return true;
        }
        if n == 0 {
            // Peer closed its write side.
            return false;
        }
        io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock
    }

    /// One non-blocking write of the outgoing buffer. Returns `false`
    /// only on a fatal error; "would block" and a zero-length buffer are
    /// both fine.
    pub fn handle_write(&mut self) -> bool {
        let pending = self.outgoing.readable();
        if pending.is_empty() {
            return true;
        }

        let n = unsafe {
            libc::write(
                self.fd,
                pending.as_ptr() as *const libc::c_void,
                pending.len(),
            )
        };

        if n > 0 {
            self.outgoing.consume(n as usize);
            self.last_activity = Instant::now();
            return true;
        }
        if n == 0 {
            return true;
        }
        io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
        }
    }
}
