//! Run a child with stdout and stderr interleaved into one log file.
//!
//! Both streams share a single file handle, so the log preserves the order
//! in which the child wrote them (the `2>&1` behaviour of a shell).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

/// How a captured child ended.
#[derive(Debug, Clone, Copy)]
pub struct Captured {
    /// Exit status; `None` when the child was killed after a timeout.
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Spawn `cmd`, sending both output streams to `log_path`, and block until it
/// exits or `timeout` elapses.
///
/// # Errors
///
/// Returns an error if the log cannot be created or the child cannot be
/// spawned or waited on.
pub fn run_captured(
    cmd: &mut Command,
    log_path: &Path,
    timeout: Option<Duration>,
) -> std::io::Result<Captured> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = File::create(log_path)?;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file.try_clone()?))
        .stderr(Stdio::from(log_file))
        .spawn()?;

    let Some(limit) = timeout else {
        let status = child.wait()?;
        return Ok(Captured {
            status: Some(status),
            timed_out: false,
        });
    };

    if let Some(status) = child.wait_timeout(limit)? {
        return Ok(Captured {
            status: Some(status),
            timed_out: false,
        });
    }

    tracing::warn!("child exceeded {}, killing", format_duration(limit));
    // The child may exit between the timeout and the kill.
    let _ = child.kill();
    child.wait()?;
    Ok(Captured {
        status: None,
        timed_out: true,
    })
}

/// Read at most `max_bytes` from the end of a file.
///
/// Instead of loading the entire file, we seek to near the end. When the
/// seek lands mid-file the first (partial) line is dropped. Invalid UTF-8 is
/// replaced rather than rejected: compiler output is not always clean.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, sought, or read.
pub fn read_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let text = String::from_utf8_lossy(&buffer);

    let content = if seek_pos > 0 {
        text.find('\n').map_or(&*text, |idx| &text[idx + 1..])
    } else {
        &text
    };
    Ok(content.to_string())
}

/// Whether the file contains `needle` anywhere, scanning it in chunks so a
/// match early in a large log is not lost to a size cap.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn file_contains(path: &Path, needle: &str) -> std::io::Result<bool> {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return Ok(true);
    }

    let mut file = File::open(path)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut window: Vec<u8> = Vec::with_capacity(buf.len() + needle.len());
    let overlap = needle.len() - 1;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(false);
        }
        window.extend_from_slice(&buf[..n]);
        if window.windows(needle.len()).any(|w| w == needle) {
            return Ok(true);
        }
        // Keep enough bytes to catch a match split across reads.
        let drop = window.len().saturating_sub(overlap);
        window.drain(..drop);
    }
}

/// Human-readable duration for timeout messages (`1.5s`, `0.1s`).
pub fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_captures_both_streams_in_order() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("logs/run.log");

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("echo out; echo err 1>&2; echo out2");
        let captured = run_captured(&mut cmd, &log, None).unwrap();

        assert!(captured.success());
        assert_eq!(captured.code(), Some(0));
        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text, "out\nerr\nout2\n");
    }

    #[test]
    fn test_non_zero_exit() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("run.log");

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("exit 3");
        let captured = run_captured(&mut cmd, &log, None).unwrap();

        assert!(!captured.success());
        assert_eq!(captured.code(), Some(3));
        assert!(!captured.timed_out);
    }

    #[test]
    fn test_timeout_kills_child() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("run.log");

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("sleep 5");
        let captured = run_captured(&mut cmd, &log, Some(Duration::from_millis(100))).unwrap();

        assert!(captured.timed_out);
        assert!(!captured.success());
        assert_eq!(captured.code(), None);
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let tmp = tempdir().unwrap();
        let mut cmd = Command::new(tmp.path().join("does-not-exist"));
        assert!(run_captured(&mut cmd, &tmp.path().join("run.log"), None).is_err());
    }

    #[test]
    fn test_file_contains_finds_early_match_in_large_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        let mut content = String::from("Hello from Wyn!\n");
        content.push_str(&"noise\n".repeat(50_000));
        std::fs::write(&path, content).unwrap();

        assert!(file_contains(&path, "Hello from Wyn!").unwrap());
        assert!(!file_contains(&path, "Goodbye").unwrap());
    }

    #[test]
    fn test_file_contains_match_across_chunks() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        // Put the needle straddling the 64 KiB read boundary.
        let mut content = "x".repeat(64 * 1024 - 5);
        content.push_str("Hello from Wyn!");
        std::fs::write(&path, content).unwrap();

        assert!(file_contains(&path, "Hello from Wyn!").unwrap());
    }

    #[test]
    fn test_format_duration_sub_second() {
        assert_eq!(format_duration(Duration::from_millis(100)), "0.1s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90.0s");
    }

    #[test]
    fn test_read_tail_drops_partial_line() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        std::fs::write(&path, "first line\nsecond line\nthird\n").unwrap();

        assert_eq!(read_tail(&path, 1024).unwrap(), "first line\nsecond line\nthird\n");
        assert_eq!(read_tail(&path, 15).unwrap(), "third\n");
    }
}
