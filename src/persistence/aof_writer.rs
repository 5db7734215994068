//! Append-Only Log Writer
//!
//! Every executed write command is appended to the log as one protocol
//! array frame, byte-for-byte as it would arrive on the wire. Startup
//! replays the file through the normal dispatcher, so the log format
//! *is* the wire format — no second serializer to keep in sync.
//!
//! ## Durability Policy
//!
//! - `Always`: fsync after every append — safest, slowest
//! - `EverySec`: fsync from the timer tick once a second — the default
//! - `No`: leave flushing to the kernel
//!
//! Write failures degrade durability but never fail the command: the
//! mutation is already live in memory, so the append is logged as a
//! warning and the server keeps serving.
//!
//! ## Background Compaction
//!
//! The log only grows, so on demand the process forks. The child walks a
//! copy-on-write snapshot of the keyspace and writes one reconstruction
//! command per live key to `temp-rewrite-<pid>.aof`, fsyncs, and exits.
//! The parent keeps serving and buffers every subsequent append in
//! memory. A non-blocking `waitpid` from the timer tick notices the
//! child's exit: on success the buffered tail is appended to the temp
//! file, which is fsynced and atomically renamed over the live log; on
//! failure the temp file is unlinked and the old log stays authoritative.

use crate::storage::keyspace::now_ms;
use crate::storage::object::{format_score, Value};
use crate::storage::Keyspace;
use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// When to fsync the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    Always,
    EverySec,
    No,
}

impl FsyncPolicy {
    /// Parses the CLI spelling: `always`, `everysec`, or `no`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(Self::Always),
            "everysec" => Some(Self::EverySec),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// The append log. See the module docs.
#[derive(Debug)]
pub struct AofWriter {
    path: PathBuf,
    /// `None` when the log could not be opened — the server then runs
    /// without persistence rather than refusing to start.
    file: Option<File>,
    policy: FsyncPolicy,
    last_fsync: Instant,
    rewrite_child: Option<libc::pid_t>,
    rewrite_temp: PathBuf,
    rewrite_buffer: Vec<Vec<u8>>,
}

impl AofWriter {
    /// Opens (or creates) the log for appending.
    pub fn open(path: impl Into<PathBuf>, policy: FsyncPolicy) -> Self {
        let path = path.into();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to open append log, persistence disabled");
                None
            }
        };
        Self {
            path,
            file,
            policy,
            last_fsync: Instant::now(),
            rewrite_child: None,
            rewrite_temp: PathBuf::new(),
            rewrite_buffer: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_rewriting(&self) -> bool {
        self.rewrite_child.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current log size on disk; zero when disabled or unreadable.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Appends one executed write command.
    pub fn append(&mut self, args: &[Bytes]) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let frame = format_command(args);
        write_all_degraded(file, &frame);

        if self.policy == FsyncPolicy::Always {
            if let Err(err) = file.sync_all() {
                warn!(error = %err, "append log fsync failed");
            }
        }

        if self.rewrite_child.is_some() {
            self.rewrite_buffer.push(frame);
        }
    }

    /// Timer-driven fsync for the `EverySec` policy.
    pub fn tick(&mut self) {
        if self.policy != FsyncPolicy::EverySec {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if self.last_fsync.elapsed().as_secs() >= 1 {
            if let Err(err) = file.sync_all() {
                warn!(error = %err, "append log fsync failed");
            }
            self.last_fsync = Instant::now();
        }
    }

    /// Forks a compaction child. No-op when disabled or one is already
    /// running; a failed fork aborts the attempt (retried on the next
    /// trigger).
    pub fn trigger_rewrite(&mut self, ks: &Keyspace) {
        if !self.is_enabled() || self.rewrite_child.is_some() {
            return;
        }

        let temp = self
            .path
            .with_file_name(format!("temp-rewrite-{}.aof", std::process::id()));

        let pid = unsafe { libc::fork() };
        if pid < 0 {
            warn!(error = %io::Error::last_os_error(), "fork for log rewrite failed");
            return;
        }
        if pid == 0 {
            // Child: snapshot, fsync, leave. _exit skips the parent's
            // atexit machinery in this borrowed address space.
            let status = match snapshot_to_path(ks, &temp) {
                Ok(()) => 0,
                Err(_) => 1,
            };
            unsafe { libc::_exit(status) };
        }

        info!(pid, temp = %temp.display(), "background log rewrite started");
        self.rewrite_child = Some(pid);
        self.rewrite_temp = temp;
        self.rewrite_buffer.clear();
    }

    /// Non-blocking reap of the compaction child; swaps the files in on
    /// success. Called from the timer tick.
    pub fn check_rewrite_complete(&mut self) {
        let Some(pid) = self.rewrite_child else {
            return;
        };

        let mut status: libc::c_int = 0;
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        if rc == 0 {
            return; // still running
        }

        self.rewrite_child = None;
        let clean_exit = rc > 0 && libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0;

        if clean_exit {
            match self.swap_in_rewrite() {
                Ok(()) => {
                    info!(path = %self.path.display(), "append log rewrite complete");
                }
                Err(err) => {
                    warn!(error = %err, "failed to install rewritten log, keeping old one");
                    let _ = fs::remove_file(&self.rewrite_temp);
                }
            }
        } else {
            warn!(status, "log rewrite child failed");
            let _ = fs::remove_file(&self.rewrite_temp);
        }

        self.rewrite_buffer.clear();
    }

    /// Appends the parent-side buffer to the temp file, fsyncs, renames
    /// it over the live log, and reopens for appending.
    fn swap_in_rewrite(&mut self) -> io::Result<()> {
        let mut temp = OpenOptions::new().append(true).open(&self.rewrite_temp)?;
        for frame in &self.rewrite_buffer {
            temp.write_all(frame)?;
        }
        temp.sync_all()?;
        drop(temp);

        fs::rename(&self.rewrite_temp, &self.path)?;
        self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        Ok(())
    }
}

impl Drop for AofWriter {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.sync_all();
        }
    }
}

/// Formats an argument vector as one wire frame:
/// `*N\r\n$len\r\narg\r\n...`.
pub fn format_command(args: &[Bytes]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    frame.push(b'*');
    frame.extend_from_slice(args.len().to_string().as_bytes());
    frame.extend_from_slice(b"\r\n");
    for arg in args {
        frame.push(b'$');
        frame.extend_from_slice(arg.len().to_string().as_bytes());
        frame.extend_from_slice(b"\r\n");
        frame.extend_from_slice(arg);
        frame.extend_from_slice(b"\r\n");
    }
    frame
}

/// Writes all of `buf`, retrying on interrupt. Any other failure is a
/// durability degradation: warn and keep the server alive.
fn write_all_degraded(file: &mut File, mut buf: &[u8]) {
    while !buf.is_empty() {
        match file.write(buf) {
            Ok(0) => {
                warn!("append log short write, remaining bytes dropped");
                return;
            }
            Ok(n) => buf = &buf[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "append log write failed");
                return;
            }
        }
    }
}

fn snapshot_to_path(ks: &Keyspace, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    write_snapshot(ks, &mut file)?;
    file.sync_all()
}

/// Writes a compact reconstruction of the keyspace: one command per live
/// key, plus `PEXPIRE` for keys with remaining TTL. Replaying the result
/// through the dispatcher recreates an observationally identical
/// keyspace.
pub fn write_snapshot(ks: &Keyspace, file: &mut File) -> io::Result<()> {
    let now = now_ms();
    for key in ks.peek_keys() {
        let Some(entry) = ks.peek(&key) else {
            continue;
        };

        let frame = match &entry.value {
            Value::Str(_) => {
                let Some(projection) = entry.value.string_projection() else {
                    continue;
                };
                format_command(&[Bytes::from_static(b"SET"), key.clone(), projection])
            }
            Value::List(list) => {
                let mut cmd = vec![Bytes::from_static(b"RPUSH"), key.clone()];
                cmd.extend(list.iter().cloned());
                format_command(&cmd)
            }
            Value::Hash(map) => {
                let mut cmd = vec![Bytes::from_static(b"HSET"), key.clone()];
                for (field, value) in map {
                    cmd.push(field.clone());
                    cmd.push(value.clone());
                }
                format_command(&cmd)
            }
            Value::Set(set) => {
                let mut cmd = vec![Bytes::from_static(b"SADD"), key.clone()];
                cmd.extend(set.iter().cloned());
                format_command(&cmd)
            }
            Value::ZSet(zset) => {
                // Ascending (score, member) order, so replay re-inserts
                // in the same order the index holds them.
                let mut cmd = vec![Bytes::from_static(b"ZADD"), key.clone()];
                for (member, score) in zset.range_by_rank(0, -1) {
                    cmd.push(Bytes::from(format_score(score)));
                    cmd.push(member);
                }
                format_command(&cmd)
            }
        };
        file.write_all(&frame)?;

        if entry.expire_at >= 0 {
            let remaining = entry.expire_at - now;
            if remaining > 0 {
                let frame = format_command(&[
                    Bytes::from_static(b"PEXPIRE"),
                    key.clone(),
                    Bytes::from(remaining.to_string()),
                ]);
                file.write_all(&frame)?;
            }
        }
    }
    Ok(())
}
