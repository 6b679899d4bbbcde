//! Integrity-verified archive fetching over FTP.
//!
//! One `ArchiveSession` per baseline file: connect, anonymous login, cwd
//! into the baseline directory. Transfers run through `fetch_with_retry`,
//! which re-establishes the whole session between attempts; a keep-alive
//! thread NOOPs the control channel every 30s and is joined when the
//! session closes. Checksum parsing and MD5 verification live here too —
//! the fetch side owns the integrity gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use md5::{Digest, Md5};
use suppaftp::{FtpError, FtpStream};
use thiserror::Error;
use tracing::{debug, info, warn};

use medcite_common::config::ArchiveConfig;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("FTP error: {0}")]
    Ftp(#[from] FtpError),
    #[error("retries exhausted for {file} after {attempts} attempts")]
    RetriesExhausted { file: String, attempts: usize },
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct ArchiveSession {
    host: String,
    directory: String,
    retries: usize,
    retry_delay: Duration,
    stream: Arc<Mutex<FtpStream>>,
    keepalive: Option<KeepAlive>,
}

impl ArchiveSession {
    pub fn connect(cfg: &ArchiveConfig) -> Result<Self, FetchError> {
        let stream = open_stream(&cfg.host, &cfg.directory)?;
        let stream = Arc::new(Mutex::new(stream));
        let keepalive = KeepAlive::spawn(Arc::clone(&stream));
        Ok(Self {
            host: cfg.host.clone(),
            directory: cfg.directory.clone(),
            retries: cfg.retries.max(1),
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
            stream,
            keepalive: Some(keepalive),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FtpStream> {
        // the heartbeat only ever NOOPs, so a poisoned stream is still usable
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// RETR one file into memory with bounded retry. Between attempts the
    /// session is torn down and re-established (connect, login, cwd).
    /// Errors stop here: the caller logs and skips the file.
    pub fn fetch_with_retry(&self, remote: &str) -> Result<Vec<u8>, FetchError> {
        for attempt in 1..=self.retries {
            let result = self.lock().retr_as_buffer(remote);
            match result {
                Ok(cursor) => return Ok(cursor.into_inner()),
                Err(e) => {
                    warn!(remote, attempt, "Transfer attempt failed: {e}");
                    thread::sleep(self.retry_delay);
                    if attempt < self.retries {
                        if let Err(reconnect_err) = self.reconnect() {
                            warn!(remote, "Reconnect attempt failed: {reconnect_err}");
                            break;
                        }
                    }
                }
            }
        }
        Err(FetchError::RetriesExhausted {
            file: remote.to_string(),
            attempts: self.retries,
        })
    }

    fn reconnect(&self) -> Result<(), FetchError> {
        let fresh = open_stream(&self.host, &self.directory)?;
        *self.lock() = fresh;
        Ok(())
    }

    /// Stop and join the heartbeat, then QUIT the control channel.
    pub fn close(mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.stop();
        }
        if let Err(e) = self.lock().quit() {
            warn!("FTP quit failed: {e}");
        }
    }
}

fn open_stream(host: &str, directory: &str) -> Result<FtpStream, FetchError> {
    let mut stream = FtpStream::connect(format!("{host}:21"))?;
    stream.login("anonymous", "anonymous")?;
    stream.cwd(directory)?;
    info!(host, directory, "FTP session established");
    Ok(stream)
}

// ── Keep-alive heartbeat ──────────────────────────────────────────────────────

/// Background thread NOOPing the shared control channel. Read-only with
/// respect to session state; exits when signalled or when a NOOP fails.
struct KeepAlive {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    fn spawn(stream: Arc<Mutex<FtpStream>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || loop {
            // sleep in 1s steps so close() is not held up by the interval
            for _ in 0..KEEPALIVE_INTERVAL.as_secs() {
                if flag.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(Duration::from_secs(1));
            }
            let result = stream.lock().unwrap_or_else(|e| e.into_inner()).noop();
            match result {
                Ok(()) => debug!("Sent NOOP to keep the FTP session alive"),
                Err(e) => {
                    warn!("FTP keep-alive failed: {e}");
                    return;
                }
            }
        });
        Self { stop, handle: Some(handle) }
    }

    fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ── Checksums ─────────────────────────────────────────────────────────────────

/// Parse a published checksum line. Both `MD5(file)= hex` and bare
/// `hex  file` forms appear in baseline directories.
pub fn parse_checksum(text: &str) -> Option<String> {
    let text = text.trim();
    let value = match text.split_once('=') {
        Some((_, rest)) => rest.trim(),
        None => text.split_whitespace().next()?,
    };
    if value.is_empty() {
        None
    } else {
        Some(value.to_ascii_lowercase())
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub fn checksum_matches(data: &[u8], expected: &str) -> bool {
    md5_hex(data) == expected.trim().to_ascii_lowercase()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
