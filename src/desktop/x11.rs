//! X11 desktop backed by `xclip` and `xdotool`.
//!
//! Requires:
//! - xclip installed (clipboard access)
//! - xdotool installed (window activation and synthetic key chords)

use std::process::Stdio;
use std::sync::Mutex;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Accessibility, AppHandle, Chord, Clipboard, DesktopError, Keyboard, Workspace};

/// Emulated clipboard version counter.
///
/// X11 has no clipboard sequence number, so the counter is derived: it
/// advances on every own write or clear and whenever an observation sees
/// content that differs from the last content seen. Empty and absent text
/// are the same content.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    count: u64,
    last: Option<String>,
}

impl ChangeTracker {
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Record what a read saw. Returns the counter afterwards.
    pub fn observe(&mut self, content: Option<String>) -> u64 {
        let content = normalize(content);
        if self.last != content {
            self.count += 1;
            self.last = content;
        }
        self.count
    }

    /// Record our own write (or clear, with `None`). Always advances.
    pub fn record_write(&mut self, content: Option<String>) -> u64 {
        self.count += 1;
        self.last = normalize(content);
        self.count
    }
}

fn normalize(content: Option<String>) -> Option<String> {
    content.filter(|c| !c.is_empty())
}

#[derive(Default)]
pub struct X11Desktop {
    tracker: Mutex<ChangeTracker>,
}

impl X11Desktop {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracker(&self) -> std::sync::MutexGuard<'_, ChangeTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run a tool to completion and return its stdout.
async fn run(tool: &'static str, args: &[&str]) -> Result<String, DesktopError> {
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| spawn_error(tool, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DesktopError::ToolFailed {
            tool,
            message: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn spawn_error(tool: &'static str, e: std::io::Error) -> DesktopError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DesktopError::ToolMissing { tool }
    } else {
        DesktopError::ToolFailed {
            tool,
            message: e.to_string(),
        }
    }
}

fn xclip_failed(e: impl std::fmt::Display) -> DesktopError {
    DesktopError::ToolFailed {
        tool: "xclip",
        message: e.to_string(),
    }
}

/// Hand `text` to xclip as the new clipboard owner.
///
/// xclip forks to keep serving the selection, so stdout/stderr must not be
/// piped or waiting on the parent would block until the selection is lost.
async fn xclip_set(text: &str) -> Result<(), DesktopError> {
    let mut child = Command::new("xclip")
        .args(["-selection", "clipboard", "-i"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_error("xclip", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await.map_err(xclip_failed)?;
        // Close stdin to signal EOF
        drop(stdin);
    }

    let status = child.wait().await.map_err(xclip_failed)?;
    if !status.success() {
        return Err(xclip_failed(format!("exited with {status}")));
    }
    Ok(())
}

async fn xclip_get() -> Option<String> {
    // xclip exits non-zero when the clipboard holds no text target
    run("xclip", &["-selection", "clipboard", "-o"]).await.ok()
}

#[async_trait::async_trait]
impl Clipboard for X11Desktop {
    async fn read_text(&self) -> Option<String> {
        let text = xclip_get().await;
        self.tracker().observe(text.clone());
        text
    }

    async fn write_text(&self, text: &str) -> Result<(), DesktopError> {
        xclip_set(text).await?;
        self.tracker().record_write(Some(text.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), DesktopError> {
        xclip_set("").await?;
        self.tracker().record_write(None);
        Ok(())
    }

    async fn change_count(&self) -> u64 {
        let current = xclip_get().await;
        self.tracker().observe(current)
    }
}

#[async_trait::async_trait]
impl Keyboard for X11Desktop {
    async fn send_chord(&self, chord: Chord) -> Result<(), DesktopError> {
        run("xdotool", &["key", "--clearmodifiers", chord.keysym()])
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl Workspace for X11Desktop {
    async fn frontmost(&self) -> Option<AppHandle> {
        match run("xdotool", &["getactivewindow"]).await {
            Ok(id) if !id.trim().is_empty() => Some(AppHandle(id.trim().to_string())),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("could not query active window: {e}");
                None
            }
        }
    }

    async fn activate(&self, app: &AppHandle) {
        if let Err(e) = run("xdotool", &["windowactivate", "--sync", &app.0]).await {
            tracing::warn!(window = %app.0, "failed to activate window: {e}");
        }
    }
}

#[async_trait::async_trait]
impl Accessibility for X11Desktop {
    async fn is_trusted(&self) -> bool {
        let has_display = std::env::var_os("DISPLAY").is_some_and(|d| !d.is_empty());
        has_display && run("xdotool", &["version"]).await.is_ok()
    }

    async fn set_selected_text(&self, _text: &str) -> bool {
        // No selection-write API on plain X11; replace goes through paste.
        false
    }
}
