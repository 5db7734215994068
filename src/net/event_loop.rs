//! The Event Multiplexer
//!
//! A thin, single-threaded wrapper around an epoll instance: register,
//! re-arm, and remove descriptors; wait for readiness; and keep one
//! periodic timer slot honest. The loop knows nothing about frames,
//! commands, or the keyspace — it reports "this fd is readable/writable/
//! errored" and nothing else.
//!
//! ## The Timer Slot
//!
//! `poll` clamps its wait to whichever comes first: the caller's timeout
//! or the next timer deadline, so the timer can't be overslept. After the
//! wait it reports whether the interval has elapsed; the caller runs the
//! tick body (active expiration, fsync policy, compaction reaping). A
//! wait interrupted by a signal reports zero ready events and no timer
//! fire — the main loop just comes around again.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Instant;

/// Capacity of the ready-event array per wait.
const MAX_EVENTS: usize = 128;

/// Readiness bits reported for one descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub fd: RawFd,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

/// Outcome of one [`EventLoop::poll`] call.
#[derive(Debug, Clone, Copy)]
pub struct Poll {
    /// Number of ready descriptors; index [`EventLoop::event`] with `0..ready`.
    pub ready: usize,
    /// Whether the periodic timer interval elapsed during this wait.
    pub timer_fired: bool,
}

/// Single-threaded epoll reactor with one periodic timer slot.
#[derive(Debug)]
pub struct EventLoop {
    epoll_fd: RawFd,
    events: Vec<libc::epoll_event>,
    timer_interval_ms: u64,
    last_timer_fire: Instant,
}

impl EventLoop {
    /// Creates the epoll instance. Failure here is startup-fatal.
    pub fn new() -> io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(0) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            epoll_fd,
            events: vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS],
            timer_interval_ms: 0,
            last_timer_fire: Instant::now(),
        })
    }

    /// Registers a descriptor with the given interest.
    pub fn add_fd(&mut self, fd: RawFd, readable: bool, writable: bool) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, Self::mask(readable, writable))
    }

    /// Re-arms an already registered descriptor.
    pub fn mod_fd(&mut self, fd: RawFd, readable: bool, writable: bool) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, Self::mask(readable, writable))
    }

    /// Removes a descriptor from the interest set.
    pub fn remove_fd(&mut self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe {
            libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Arms the periodic timer slot. An interval of zero disarms it.
    pub fn set_timer_interval(&mut self, interval_ms: u64) {
        self.timer_interval_ms = interval_ms;
        self.last_timer_fire = Instant::now();
    }

    /// Waits for readiness, at most `timeout_ms` but never past the next
    /// timer deadline. `EINTR` is not an error: it reports zero events.
    pub fn poll(&mut self, timeout_ms: i32) -> io::Result<Poll> {
        let mut effective_timeout = timeout_ms;
        if self.timer_interval_ms > 0 {
            let elapsed = self.last_timer_fire.elapsed().as_millis() as u64;
            let remaining = self.timer_interval_ms.saturating_sub(elapsed) as i32;
            // A negative caller timeout means "wait forever" — the timer
            // deadline still caps it.
            if effective_timeout < 0 || remaining < effective_timeout {
                effective_timeout = remaining;
            }
        }

        let n = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                self.events.as_mut_ptr(),
                MAX_EVENTS as libc::c_int,
                effective_timeout,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Poll {
                    ready: 0,
                    timer_fired: false,
                });
            }
            return Err(err);
        }

        let mut timer_fired = false;
        if self.timer_interval_ms > 0
            && self.last_timer_fire.elapsed().as_millis() as u64 >= self.timer_interval_ms
        {
            timer_fired = true;
            self.last_timer_fire = Instant::now();
        }

        Ok(Poll {
            ready: n as usize,
            timer_fired,
        })
    }

    /// The `i`-th ready descriptor from the most recent poll.
    pub fn event(&self, i: usize) -> Readiness {
        let ev = &self.events[i];
        Readiness {
            fd: ev.u64 as RawFd,
            // HUP can still carry buffered data, so it counts as readable.
            readable: ev.events & (libc::EPOLLIN | libc::EPOLLHUP) as u32 != 0,
            writable: ev.events & libc::EPOLLOUT as u32 != 0,
            error: ev.events & libc::EPOLLERR as u32 != 0,
        }
    }

    fn mask(readable: bool, writable: bool) -> u32 {
        let mut mask = 0;
        if readable {
            mask |= libc::EPOLLIN as u32;
        }
        if writable {
            mask |= libc::EPOLLOUT as u32;
        }
        mask
    }

    fn ctl(&mut self, op: libc::c_int, fd: RawFd, mask: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events: mask,
            u64: fd as u64,
        };
        let rc = unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut ev) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if self.epoll_fd >= 0 {
            unsafe { libc::close(self.epoll_fd) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_pair() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        let rc = unsafe {
            libc::socketpair(
                libc::AF_UNIX,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK,
                0,
                fds.as_mut_ptr(),
            )
        };
        assert_eq!(rc, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn test_readable_event_reported() {
        let mut el = EventLoop::new().expect("epoll");
        let (a, b) = socket_pair();
        el.add_fd(a, true, false).expect("add");

        // Nothing ready yet.
        let poll = el.poll(0).expect("poll");
        assert_eq!(poll.ready, 0);

        unsafe { libc::write(b, b"x".as_ptr() as *const libc::c_void, 1) };
        let poll = el.poll(100).expect("poll");
        assert_eq!(poll.ready, 1);
        let ev = el.event(0);
        assert_eq!(ev.fd, a);
        assert!(ev.readable);
        assert!(!ev.writable);

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn test_writable_after_rearm() {
        let mut el = EventLoop::new().expect("epoll");
        let (a, b) = socket_pair();
        el.add_fd(a, true, false).expect("add");
        el.mod_fd(a, true, true).expect("mod");

        let poll = el.poll(100).expect("poll");
        assert_eq!(poll.ready, 1);
        assert!(el.event(0).writable);

        el.remove_fd(a).expect("remove");
        let poll = el.poll(0).expect("poll");
        assert_eq!(poll.ready, 0);

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn test_timer_fires_after_interval() {
        let mut el = EventLoop::new().expect("epoll");
        el.set_timer_interval(20);

        // An immediate poll doesn't fire the timer.
        assert!(!el.poll(0).expect("poll").timer_fired);

        // Waiting with a generous timeout is clamped to the timer.
        let started = Instant::now();
        let poll = el.poll(10_000).expect("poll");
        assert!(poll.timer_fired);
        assert!(started.elapsed().as_millis() < 1_000);

        // The slot re-arms itself.
        assert!(!el.poll(0).expect("poll").timer_fired);
    }
}
