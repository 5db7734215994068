//! Listening Socket
//!
//! Binds a non-blocking IPv4 TCP socket and hands out non-blocking
//! client descriptors. `accept4` with `SOCK_NONBLOCK` means accepted fds
//! are born non-blocking — no follow-up `fcntl` round trip.

use std::io;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;

/// The server's listening socket. Closes the descriptor on drop.
#[derive(Debug)]
pub struct Listener {
    fd: RawFd,
}

impl Listener {
    /// Creates, binds, and starts listening. `SO_REUSEADDR` is set so a
    /// restart doesn't trip over a lingering TIME_WAIT binding.
    pub fn bind(host: Ipv4Addr, port: u16) -> io::Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let listener = Self { fd };

        let reuse: libc::c_int = 1;
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: port.to_be(),
            sin_addr: libc::in_addr {
                s_addr: u32::from(host).to_be(),
            },
            sin_zero: [0; 8],
        };
        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::listen(fd, libc::SOMAXCONN) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(listener)
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// The port actually bound — interesting when the caller asked for 0
    /// and the kernel picked one.
    pub fn local_port(&self) -> io::Result<u16> {
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(u16::from_be(addr.sin_port))
    }

    /// Accepts one pending connection. Returns `None` when the accept
    /// queue is drained (`EAGAIN`) or on a transient accept failure.
    pub fn accept(&self) -> Option<RawFd> {
        let client = unsafe {
            libc::accept4(
                self.fd,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                libc::SOCK_NONBLOCK,
            )
        };
        if client < 0 {
            None
        } else {
            Some(client)
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
        }
    }
}
