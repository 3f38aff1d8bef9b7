use std::sync::Mutex;
use std::time::Duration;

use crate::config::TimingConfig;
use crate::desktop::{AppHandle, Chord, Desktop};
use crate::error::ReformatError;

/// Fixed waits of the capture/replace protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimings {
    /// Wait after re-activating the target before injecting a chord.
    pub settle: Duration,
    /// Interval between clipboard version checks after "copy".
    pub poll_interval: Duration,
    /// Maximum number of version checks before giving up.
    pub poll_attempts: u32,
    /// Wait after "paste" so the target consumes the clipboard.
    pub paste_settle: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for CaptureTimings {
    fn from(t: &TimingConfig) -> Self {
        Self {
            settle: Duration::from_millis(t.settle_ms),
            poll_interval: Duration::from_millis(t.poll_interval_ms),
            poll_attempts: t.poll_attempts.max(1),
            paste_settle: Duration::from_millis(t.paste_settle_ms),
        }
    }
}

/// Which path `replace` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMethod {
    /// Direct write into the focused element's selection.
    Accessibility,
    /// Clipboard + synthetic paste. Unconfirmed: nothing reports whether the
    /// target actually accepted the paste.
    Paste,
}

/// Clipboard-based selection capture and replacement.
///
/// The clipboard is shared with every other process and is never locked.
/// Capture detects the copy through the clipboard's version counter and
/// restores the previous contents on every failure path.
pub struct CaptureEngine {
    desktop: Desktop,
    timings: CaptureTimings,
    /// Foreground application recorded by the last capture. Replace and
    /// revert target it explicitly, since the triggering UI may have stolen
    /// focus in between.
    target: Mutex<Option<AppHandle>>,
}

impl CaptureEngine {
    pub fn new(desktop: Desktop, timings: CaptureTimings) -> Self {
        Self {
            desktop,
            timings,
            target: Mutex::new(None),
        }
    }

    pub fn timings(&self) -> CaptureTimings {
        self.timings
    }

    /// Copy the foreground application's selection and return it.
    ///
    /// On success the clipboard is left holding the captured text. On
    /// `Timeout` or `Empty` the previous clipboard text is put back.
    pub async fn capture(&self) -> Result<String, ReformatError> {
        let clipboard = &self.desktop.clipboard;

        if !self.desktop.accessibility.is_trusted().await {
            return Err(ReformatError::no_permission());
        }

        let app = self.desktop.workspace.frontmost().await;
        tracing::debug!(target_app = ?app, "capturing selection");
        *self.target.lock().unwrap_or_else(|e| e.into_inner()) = app.clone();

        let previous = clipboard.read_text().await;

        // clear() advances the counter, so the baseline is read after it
        if let Err(e) = clipboard.clear().await {
            tracing::warn!("clipboard not writable: {e}");
            return Err(ReformatError::NoPermission {
                detail: Some(e.to_string()),
            });
        }
        let baseline = clipboard.change_count().await;

        if let Some(ref app) = app {
            self.desktop.workspace.activate(app).await;
        }
        tokio::time::sleep(self.timings.settle).await;

        if let Err(e) = self.desktop.keyboard.send_chord(Chord::Copy).await {
            // Keep polling: the failure surfaces as Timeout with the clipboard restored.
            tracing::warn!("failed to inject copy: {e}");
        }

        let mut attempts = 0;
        let mut changed = clipboard.change_count().await != baseline;
        while !changed && attempts < self.timings.poll_attempts {
            tokio::time::sleep(self.timings.poll_interval).await;
            attempts += 1;
            changed = clipboard.change_count().await != baseline;
        }

        if !changed {
            tracing::debug!(attempts, "clipboard unchanged after copy");
            self.restore(previous).await;
            return Err(ReformatError::Timeout);
        }

        match clipboard.read_text().await {
            Some(text) if !text.is_empty() => {
                tracing::debug!(chars = text.chars().count(), attempts, "selection captured");
                Ok(text)
            }
            _ => {
                self.restore(previous).await;
                Err(ReformatError::Empty)
            }
        }
    }

    /// Put `text` in place of the current selection.
    ///
    /// Tries a direct accessibility write first and falls back to
    /// clipboard + paste. The fallback is reported as success once the
    /// chord is injected; nothing confirms the target accepted it. Only local
    /// failures yield `ReplaceFailed`: the clipboard write failing, or the
    /// paste chord itself failing to inject, since then the text cannot have
    /// landed.
    pub async fn replace(&self, text: &str) -> Result<ReplaceMethod, ReformatError> {
        if self.desktop.accessibility.set_selected_text(text).await {
            tracing::debug!("replaced via accessibility write");
            return Ok(ReplaceMethod::Accessibility);
        }

        self.desktop
            .clipboard
            .write_text(text)
            .await
            .map_err(|e| ReformatError::ReplaceFailed(e.to_string()))?;

        self.focus_target().await;

        self.desktop
            .keyboard
            .send_chord(Chord::Paste)
            .await
            .map_err(|e| ReformatError::ReplaceFailed(e.to_string()))?;

        tokio::time::sleep(self.timings.paste_settle).await;
        tracing::debug!(chars = text.chars().count(), "replaced via clipboard paste");
        Ok(ReplaceMethod::Paste)
    }

    /// Ask the target application to undo its most recent edit.
    ///
    /// Delegates to the application's own undo stack instead of re-replacing
    /// text, so it only undoes the latest native edit, which is assumed (not
    /// verified) to be our last replace.
    pub async fn revert(&self) {
        self.focus_target().await;
        if let Err(e) = self.desktop.keyboard.send_chord(Chord::Undo).await {
            tracing::warn!("failed to inject undo: {e}");
        }
    }

    async fn focus_target(&self) {
        let recorded = self
            .target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let app = match recorded {
            Some(app) => Some(app),
            None => self.desktop.workspace.frontmost().await,
        };
        if let Some(app) = app {
            self.desktop.workspace.activate(&app).await;
        }
        tokio::time::sleep(self.timings.settle).await;
    }

    async fn restore(&self, previous: Option<String>) {
        let Some(previous) = previous else {
            return;
        };
        if let Err(e) = self.desktop.clipboard.write_text(&previous).await {
            tracing::warn!("failed to restore clipboard: {e}");
        }
    }
}
