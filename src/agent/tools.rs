//! Local tools reachable through explicit commands.

use std::io::{self, ErrorKind};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launch a program through the platform shell.
///
/// The child is detached from the caller; only spawning errors are reported.
/// Must be called from within a tokio runtime.
pub async fn open_app(app_name: &str) -> String {
    match launch_detached(app_name) {
        Ok(_reaper) => {
            info!("Launched {app_name:?}");
            format!("Opened {app_name}")
        }
        Err(err) => {
            warn!("Failed to launch {app_name:?}: {err}");
            format!("Failed to open {app_name}: {err}")
        }
    }
}

/// Spawn `line` through the shell and wait for it on a background task so
/// the child is reaped when it exits.
fn launch_detached(line: &str) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = shell_command(line)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let line = line.to_string();
    Ok(tokio::spawn(async move {
        let status = child.wait().await;
        match &status {
            Ok(status) => debug!("{line:?} exited with {status}"),
            Err(err) => warn!("Failed to wait for {line:?}: {err}"),
        }
        status
    }))
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

/// Read a text file, falling back from UTF-8 to UTF-16 to a lossy read.
pub async fn read_file(path: &str) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => decode_text(&bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => "File not found.".to_string(),
        Err(err) => format!("Failed to read file: {err}"),
    }
}

/// Decode file contents: UTF-8, then UTF-16 (BOM-detected, little-endian by
/// default), then UTF-8 with undecodable bytes dropped.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.strip_prefix('\u{feff}').unwrap_or(text).to_string();
    }

    if let Some(text) = decode_utf16(bytes) {
        return text;
    }

    String::from_utf8_lossy(bytes).replace('\u{fffd}', "")
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (body, big_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        _ => (bytes, false),
    };
    if body.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}
