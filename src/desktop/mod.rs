//! Seams onto the windowing system.
//!
//! The capture engine never talks to the OS directly; it goes through these
//! handles so a fake desktop can stand in during tests.

pub mod x11;

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DesktopError {
    #[error("{tool} not found in PATH")]
    ToolMissing { tool: &'static str },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },
}

/// Synthetic key combinations the engine injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chord {
    Copy,
    Paste,
    Undo,
}

impl Chord {
    /// xdotool key spec for this chord.
    pub fn keysym(&self) -> &'static str {
        match self {
            Self::Copy => "ctrl+c",
            Self::Paste => "ctrl+v",
            Self::Undo => "ctrl+z",
        }
    }
}

/// Opaque identity of a foreground application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle(pub String);

/// The shared system clipboard. Other processes may write to it at any time;
/// `change_count` only ever increases and advances on every content change.
#[async_trait::async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> Option<String>;
    async fn write_text(&self, text: &str) -> Result<(), DesktopError>;
    async fn clear(&self) -> Result<(), DesktopError>;
    async fn change_count(&self) -> u64;
}

#[async_trait::async_trait]
pub trait Keyboard: Send + Sync {
    async fn send_chord(&self, chord: Chord) -> Result<(), DesktopError>;
}

#[async_trait::async_trait]
pub trait Workspace: Send + Sync {
    async fn frontmost(&self) -> Option<AppHandle>;
    async fn activate(&self, app: &AppHandle);
}

#[async_trait::async_trait]
pub trait Accessibility: Send + Sync {
    /// Whether this process may read/modify other applications' selection.
    async fn is_trusted(&self) -> bool;
    /// Write `text` over the focused element's selection. False when the
    /// focused element does not support it.
    async fn set_selected_text(&self, text: &str) -> bool;
}

/// Bundle of desktop handles passed to the capture engine.
#[derive(Clone)]
pub struct Desktop {
    pub clipboard: Arc<dyn Clipboard>,
    pub keyboard: Arc<dyn Keyboard>,
    pub workspace: Arc<dyn Workspace>,
    pub accessibility: Arc<dyn Accessibility>,
}

impl Desktop {
    /// Use one object for all four roles.
    pub fn from_shared<T>(inner: Arc<T>) -> Self
    where
        T: Clipboard + Keyboard + Workspace + Accessibility + 'static,
    {
        Self {
            clipboard: inner.clone(),
            keyboard: inner.clone(),
            workspace: inner.clone(),
            accessibility: inner,
        }
    }

    pub fn x11() -> Self {
        Self::from_shared(Arc::new(x11::X11Desktop::new()))
    }
}
