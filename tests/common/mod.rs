//! Shared fixtures: a scriptable fake desktop and a mock HTTP provider.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reword::capture::{CaptureEngine, CaptureTimings};
use reword::desktop::{
    Accessibility, AppHandle, Chord, Clipboard, Desktop, DesktopError, Keyboard, Workspace,
};

// ---------------------------------------------------------------------------
// Fake desktop
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeState {
    pub clipboard: Option<String>,
    pub change_count: u64,
    /// What a synthetic copy puts on the clipboard. None: copy does nothing.
    pub selection: Option<String>,
    pub trusted: bool,
    pub ax_writable: bool,
    pub frontmost: Option<AppHandle>,
    pub chords: Vec<Chord>,
    pub activations: Vec<AppHandle>,
    pub ax_writes: Vec<String>,
    /// Clipboard contents at the moment each paste chord arrived.
    pub pasted: Vec<Option<String>>,
    pub fail_keyboard: bool,
    /// Make `clear` fail as if xclip were not installed.
    pub fail_clear: bool,
}

pub struct FakeDesktop {
    pub state: Mutex<FakeState>,
}

impl FakeDesktop {
    pub fn new(previous_clipboard: Option<&str>, selection: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                clipboard: previous_clipboard.map(str::to_string),
                change_count: 7,
                selection: selection.map(str::to_string),
                trusted: true,
                ax_writable: false,
                frontmost: Some(AppHandle("editor".to_string())),
                chords: vec![],
                activations: vec![],
                ax_writes: vec![],
                pasted: vec![],
                fail_keyboard: false,
                fail_clear: false,
            }),
        })
    }

    pub fn with(self: Arc<Self>, f: impl FnOnce(&mut FakeState)) -> Arc<Self> {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn clipboard_text(&self) -> Option<String> {
        self.state.lock().unwrap().clipboard.clone()
    }

    pub fn chords(&self) -> Vec<Chord> {
        self.state.lock().unwrap().chords.clone()
    }

    pub fn activations(&self) -> Vec<AppHandle> {
        self.state.lock().unwrap().activations.clone()
    }

    pub fn pasted(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().pasted.clone()
    }

    pub fn ax_writes(&self) -> Vec<String> {
        self.state.lock().unwrap().ax_writes.clone()
    }
}

#[async_trait::async_trait]
impl Clipboard for FakeDesktop {
    async fn read_text(&self) -> Option<String> {
        self.state.lock().unwrap().clipboard.clone()
    }

    async fn write_text(&self, text: &str) -> Result<(), DesktopError> {
        let mut s = self.state.lock().unwrap();
        s.clipboard = Some(text.to_string());
        s.change_count += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DesktopError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_clear {
            return Err(DesktopError::ToolMissing { tool: "xclip" });
        }
        s.clipboard = None;
        s.change_count += 1;
        Ok(())
    }

    async fn change_count(&self) -> u64 {
        self.state.lock().unwrap().change_count
    }
}

#[async_trait::async_trait]
impl Keyboard for FakeDesktop {
    async fn send_chord(&self, chord: Chord) -> Result<(), DesktopError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_keyboard {
            return Err(DesktopError::ToolMissing { tool: "xdotool" });
        }
        s.chords.push(chord);
        match chord {
            Chord::Copy => {
                if let Some(sel) = s.selection.clone() {
                    s.clipboard = Some(sel);
                    s.change_count += 1;
                }
            }
            Chord::Paste => {
                let current = s.clipboard.clone();
                s.pasted.push(current);
            }
            Chord::Undo => {}
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Workspace for FakeDesktop {
    async fn frontmost(&self) -> Option<AppHandle> {
        self.state.lock().unwrap().frontmost.clone()
    }

    async fn activate(&self, app: &AppHandle) {
        self.state.lock().unwrap().activations.push(app.clone());
    }
}

#[async_trait::async_trait]
impl Accessibility for FakeDesktop {
    async fn is_trusted(&self) -> bool {
        self.state.lock().unwrap().trusted
    }

    async fn set_selected_text(&self, text: &str) -> bool {
        let mut s = self.state.lock().unwrap();
        if s.ax_writable {
            s.ax_writes.push(text.to_string());
        }
        s.ax_writable
    }
}

pub fn fast_timings() -> CaptureTimings {
    CaptureTimings {
        settle: Duration::from_millis(1),
        poll_interval: Duration::from_millis(5),
        poll_attempts: 30,
        paste_settle: Duration::from_millis(1),
    }
}

pub fn engine(fake: &Arc<FakeDesktop>) -> CaptureEngine {
    engine_with(fake, fast_timings())
}

pub fn engine_with(fake: &Arc<FakeDesktop>, timings: CaptureTimings) -> CaptureEngine {
    CaptureEngine::new(Desktop::from_shared(Arc::clone(fake)), timings)
}

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers, lowercased.
    pub head: String,
    pub body: serde_json::Value,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head
            .lines()
            .find(|l| l.starts_with(&prefix))
            .map(|l| l[prefix.len()..].trim().to_string())
    }
}

pub struct MockServer {
    pub port: u16,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
    pub hits: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve one response per connection, in accept order. The last response
/// repeats once the list is exhausted.
pub async fn serve(responses: Vec<MockResponse>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(AtomicUsize::new(0));

    {
        let requests = Arc::clone(&requests);
        let hits = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let index = hits.fetch_add(1, Ordering::SeqCst);
                let response = responses[index.min(responses.len() - 1)].clone();
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    if let Some(captured) = read_request(&mut socket).await {
                        requests.lock().unwrap().push(captured);
                    }
                    tokio::time::sleep(response.delay).await;
                    let head = format!(
                        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        response.status,
                        response.body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(response.body.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
    }

    MockServer {
        port,
        requests,
        hits,
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(serde_json::Value::Null);
    Some(CapturedRequest { head, body })
}

pub fn chat_completion(text: &str) -> MockResponse {
    MockResponse::json(
        200,
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        }),
    )
}

/// Address nothing is listening on.
pub async fn closed_port_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}{path}")
}
