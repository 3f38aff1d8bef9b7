use tokio::sync::{mpsc, oneshot};

/// Outcome of presenting candidates to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    Cancelled,
}

/// A pending "pick one of these" prompt. Exactly one response is sent;
/// dropping the request unanswered counts as a cancellation.
#[derive(Debug)]
pub struct SelectionRequest {
    pub candidates: Vec<String>,
    pub original: String,
    reply: oneshot::Sender<Selection>,
}

impl SelectionRequest {
    /// Choose by zero-based index. An out-of-range index leaves the request
    /// pending and hands it back.
    pub fn choose(self, index: usize) -> Result<(), Self> {
        match self.candidates.get(index).cloned() {
            Some(text) => {
                self.respond(Selection::Chosen(text));
                Ok(())
            }
            None => Err(self),
        }
    }

    pub fn cancel(self) {
        self.respond(Selection::Cancelled);
    }

    pub fn respond(self, selection: Selection) {
        // The orchestrator may have gone away; nothing to do then.
        let _ = self.reply.send(selection);
    }
}

/// Orchestrator-side handle to the candidate selection UI.
#[derive(Debug, Clone)]
pub struct CandidatePicker {
    tx: mpsc::Sender<SelectionRequest>,
}

impl CandidatePicker {
    /// Create a picker and the receiver the UI drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SelectionRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Present candidates and wait for the user's answer. May wait
    /// indefinitely. A closed UI channel is treated as cancellation.
    pub async fn present(&self, candidates: Vec<String>, original: String) -> Selection {
        let (reply, answer) = oneshot::channel();
        let request = SelectionRequest {
            candidates,
            original,
            reply,
        };
        if self.tx.send(request).await.is_err() {
            tracing::warn!("candidate picker closed, treating as cancelled");
            return Selection::Cancelled;
        }
        answer.await.unwrap_or(Selection::Cancelled)
    }
}
