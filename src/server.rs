//! The Server
//!
//! One process, one thread, one reactor. Every iteration:
//!
//! ```text
//! poll ──▶ listener ready?  drain the accept queue, register clients
//!      ──▶ client ready?    read ─▶ parse ─▶ dispatch ─▶ queue reply
//!                           write the outgoing buffer when the socket
//!                           opens up, then recompute the epoll mask
//!      ──▶ timer fired?     active expiration, fsync policy tick,
//!                           compaction reaping and growth trigger
//! then: one incremental rehash batch, sweep of closed connections
//! ```
//!
//! All handler code runs to completion between two waits, so commands
//! are atomic with respect to one another without a single lock. Nothing
//! in a handler may block; sockets are non-blocking and report
//! would-block back to the reactor.
//!
//! Shutdown is cooperative: `SIGINT`/`SIGTERM` flip a process-wide stop
//! flag from the signal handler (the one piece of global mutable state),
//! and the loop exits after finishing its current iteration.

use crate::commands::CommandTable;
use crate::net::{Connection, EventLoop, Listener, Readiness};
use crate::persistence::{aof_loader, AofWriter, FsyncPolicy};
use crate::protocol::parse_frame;
use crate::storage::Keyspace;
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reactor wait bound and timer interval, both in milliseconds.
const POLL_TIMEOUT_MS: i32 = 100;
const TIMER_INTERVAL_MS: u64 = 100;

/// Keys reclaimed per active-expiration cycle.
const ACTIVE_EXPIRE_BUDGET: usize = 200;

/// Log size that auto-triggers a background compaction.
const AOF_REWRITE_MIN_BYTES: u64 = 64 * 1024 * 1024;

/// Process-wide stop flag, set from the signal path.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

/// Startup failures — all fatal, all worth a precise message.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to create event multiplexer: {0}")]
    EventLoop(#[source] io::Error),
    #[error("failed to register listener: {0}")]
    Register(#[source] io::Error),
}

/// Server configuration, filled in by the CLI layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
    /// `None` disables persistence entirely.
    pub aof_path: Option<PathBuf>,
    pub fsync: FsyncPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: crate::DEFAULT_PORT,
            aof_path: Some(PathBuf::from("emberkv.aof")),
            fsync: FsyncPolicy::EverySec,
        }
    }
}

/// The assembled server: reactor, keyspace, dispatcher, persistence, and
/// the fd→connection map.
pub struct Server {
    listener: Listener,
    event_loop: EventLoop,
    keyspace: Keyspace,
    commands: CommandTable,
    aof: Option<AofWriter>,
    connections: HashMap<RawFd, Connection>,
}

impl Server {
    /// Binds, replays the append log, and wires the reactor.
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        let listener = Listener::bind(config.host, config.port).map_err(ServerError::Bind)?;
        let mut event_loop = EventLoop::new().map_err(ServerError::EventLoop)?;
        event_loop
            .add_fd(listener.fd(), true, false)
            .map_err(ServerError::Register)?;
        event_loop.set_timer_interval(TIMER_INTERVAL_MS);

        let commands = CommandTable::new();
        let mut keyspace = Keyspace::new();

        let aof = match &config.aof_path {
            Some(path) => {
                aof_loader::load(path, &commands, &mut keyspace);
                Some(AofWriter::open(path, config.fsync))
            }
            None => None,
        };

        Ok(Self {
            listener,
            event_loop,
            keyspace,
            commands,
            aof,
            connections: HashMap::new(),
        })
    }

    /// The port actually bound.
    pub fn local_port(&self) -> io::Result<u16> {
        self.listener.local_port()
    }

    /// Runs until the stop flag flips, then releases every connection.
    pub fn run(&mut self) {
        info!(
            port = self.listener.local_port().unwrap_or(0),
            keys = self.keyspace.dbsize(),
            "ready to accept connections"
        );
        while RUNNING.load(Ordering::SeqCst) {
            if !self.run_once() {
                break;
            }
        }
        self.shutdown();
    }

    /// One reactor iteration. Returns `false` on an unrecoverable
    /// multiplexer failure.
    pub fn run_once(&mut self) -> bool {
        let poll = match self.event_loop.poll(POLL_TIMEOUT_MS) {
            Ok(poll) => poll,
            Err(err) => {
                error!(error = %err, "event multiplexer failed");
                return false;
            }
        };

        for i in 0..poll.ready {
            let ev = self.event_loop.event(i);
            if ev.fd == self.listener.fd() {
                self.accept_clients();
            } else {
                self.handle_client_event(ev);
            }
        }

        if poll.timer_fired {
            self.timer_tick();
        }

        self.keyspace.rehash_step();
        self.sweep_closed();
        true
    }

    /// Level-triggered listener: drain the whole accept queue.
    fn accept_clients(&mut self) {
        while let Some(fd) = self.listener.accept() {
            let conn = Connection::new(fd);
            if let Err(err) = self.event_loop.add_fd(fd, true, false) {
                warn!(fd, error = %err, "failed to register client");
                continue; // dropping the connection closes the fd
            }
            debug!(fd, "client connected");
            self.connections.insert(fd, conn);
        }
    }

    fn handle_client_event(&mut self, ev: Readiness) {
        let Some(conn) = self.connections.get_mut(&ev.fd) else {
            return; // stale event for an already-swept fd
        };

        if ev.error {
            conn.set_want_close(true);
            return;
        }

        if ev.readable {
            if !conn.handle_read() {
                // EOF or read error: stop reading, but keep the
                // connection long enough to flush queued replies.
                conn.set_want_read(false);
            }

            // Pipelining: drain every complete frame already buffered.
            loop {
                let Some(args) = parse_frame(conn.incoming()) else {
                    break;
                };
                if args.is_empty() {
                    continue;
                }
                let wrote = self
                    .commands
                    .dispatch(&mut self.keyspace, conn.outgoing(), &args);
                if wrote {
                    if let Some(aof) = &mut self.aof {
                        aof.append(&args);
                    }
                }
            }

            if conn.outgoing().readable_len() > 0 {
                conn.set_want_write(true);
            }
        }

        if ev.writable && !conn.want_close() {
            if !conn.handle_write() {
                conn.set_want_close(true);
            } else if conn.outgoing().readable_len() == 0 {
                conn.set_want_write(false);
            }
        }

        // Read side finished and nothing left to send: done.
        if !conn.want_read() && conn.outgoing().readable_len() == 0 {
            conn.set_want_close(true);
        }

        if !conn.want_close() {
            if let Err(err) = self
                .event_loop
                .mod_fd(ev.fd, conn.want_read(), conn.want_write())
            {
                warn!(fd = ev.fd, error = %err, "failed to re-arm client");
                conn.set_want_close(true);
            }
        }
    }

    fn timer_tick(&mut self) {
        let reclaimed = self.keyspace.active_expire_cycle(ACTIVE_EXPIRE_BUDGET);
        if reclaimed > 0 {
            debug!(reclaimed, "active expiration cycle");
        }

        if let Some(aof) = &mut self.aof {
            aof.tick();
            aof.check_rewrite_complete();
            if !aof.is_rewriting() && aof.size() >= AOF_REWRITE_MIN_BYTES {
                aof.trigger_rewrite(&self.keyspace);
            }
        }
    }

    fn sweep_closed(&mut self) {
        let closing: Vec<RawFd> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.want_close())
            .map(|(&fd, _)| fd)
            .collect();
        for fd in closing {
            let _ = self.event_loop.remove_fd(fd);
            self.connections.remove(&fd);
            debug!(fd, "client disconnected");
        }
    }

    fn shutdown(&mut self) {
        for fd in self.connections.keys() {
            let _ = self.event_loop.remove_fd(*fd);
        }
        self.connections.clear();
        info!("server shut down");
    }
}

/// Ignores `SIGPIPE` (a write to a closed socket must fail with an error
/// return, not kill the process) and routes `SIGINT`/`SIGTERM` to the
/// stop flag. The handler body is a single atomic store — the only thing
/// that is safe to do there.
pub fn install_signal_handlers() {
    extern "C" fn handle_stop(_sig: libc::c_int) {
        RUNNING.store(false, Ordering::SeqCst);
    }
    let handler = handle_stop as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

/// Raises `RLIMIT_NOFILE` so the fd budget covers thousands of clients.
/// Falls back to raising the soft limit to whatever the hard limit
/// allows.
pub fn raise_fd_limit() {
    unsafe {
        let desired = libc::rlimit {
            rlim_cur: 65536,
            rlim_max: 65536,
        };
        if libc::setrlimit(libc::RLIMIT_NOFILE, &desired) != 0 {
            let mut current = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::getrlimit(libc::RLIMIT_NOFILE, &mut current) == 0 {
                current.rlim_cur = current.rlim_max;
                let _ = libc::setrlimit(libc::RLIMIT_NOFILE, &current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    fn test_server() -> (Server, u16) {
        let config = Config {
            host: Ipv4Addr::LOCALHOST,
            port: 0,
            aof_path: None,
            fsync: FsyncPolicy::No,
        };
        let server = Server::new(&config).expect("server");
        let port = server.local_port().expect("port");
        (server, port)
    }

    fn connect(port: u16) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout");
        stream
    }

    /// Drives the reactor until `client` yields `want` bytes of reply.
    fn exchange(server: &mut Server, client: &mut TcpStream, send: &[u8], want: usize) -> Vec<u8> {
        client.write_all(send).expect("send");
        let mut reply = vec![0u8; want];
        let mut filled = 0;
        for _ in 0..50 {
            assert!(server.run_once());
            match client.read(&mut reply[filled..]) {
                Ok(n) => {
                    filled += n;
                    if filled == want {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut => {}
                Err(err) => panic!("client read failed: {err}"),
            }
        }
        assert_eq!(filled, want, "reply: {:?}", &reply[..filled]);
        reply
    }

    #[test]
    fn test_pipelined_set_get_over_socket() {
        let (mut server, port) = test_server();
        let mut client = connect(port);
        // Let the reactor accept the connection.
        server.run_once();

        let reply = exchange(
            &mut server,
            &mut client,
            b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\n",
            12,
        );
        assert_eq!(reply, b"+OK\r\n$1\r\n1\r\n");
    }

    #[test]
    fn test_wrong_type_then_value_intact_over_socket() {
        let (mut server, port) = test_server();
        let mut client = connect(port);
        server.run_once();

        let reply = exchange(
            &mut server,
            &mut client,
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
            5,
        );
        assert_eq!(reply, b"+OK\r\n");

        let wrongtype = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
        let reply = exchange(
            &mut server,
            &mut client,
            b"*3\r\n$5\r\nLPUSH\r\n$1\r\nk\r\n$1\r\nx\r\n",
            wrongtype.len(),
        );
        assert_eq!(reply, &wrongtype[..]);

        let reply = exchange(
            &mut server,
            &mut client,
            b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
            7,
        );
        assert_eq!(reply, b"$1\r\nv\r\n");
    }

    #[test]
    fn test_inline_command_over_socket() {
        let (mut server, port) = test_server();
        let mut client = connect(port);
        server.run_once();

        let reply = exchange(&mut server, &mut client, b"PING\r\n", 7);
        assert_eq!(reply, b"+PONG\r\n");
    }

    #[test]
    fn test_partial_frame_waits_for_rest() {
        let (mut server, port) = test_server();
        let mut client = connect(port);
        server.run_once();

        // First half of a SET frame: no reply yet.
        client.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\n").expect("send");
        for _ in 0..3 {
            server.run_once();
        }

        // Second half completes it.
        let reply = exchange(&mut server, &mut client, b"a\r\n$1\r\n1\r\n", 5);
        assert_eq!(reply, b"+OK\r\n");
    }

    #[test]
    fn test_disconnect_releases_connection() {
        let (mut server, port) = test_server();
        let client = connect(port);
        server.run_once();
        assert_eq!(server.connections.len(), 1);

        drop(client);
        for _ in 0..5 {
            server.run_once();
            if server.connections.is_empty() {
                break;
            }
        }
        assert!(server.connections.is_empty());
    }

    #[test]
    fn test_two_clients_interleave() {
        let (mut server, port) = test_server();
        let mut first = connect(port);
        let mut second = connect(port);
        server.run_once();
        server.run_once();

        let reply = exchange(
            &mut server,
            &mut first,
            b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$2\r\nhi\r\n",
            5,
        );
        assert_eq!(reply, b"+OK\r\n");

        // The second client sees the first client's write.
        let reply = exchange(&mut server, &mut second, b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n", 8);
        assert_eq!(reply, b"$2\r\nhi\r\n");
    }
}
