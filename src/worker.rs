use std::sync::Arc;

use rag::{Config, Hit, Message, Session, create_engine, get_index};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

pub enum Request {
    Submit(String),
    /// Re-run the controller without new input.
    Retry,
}

pub enum Update {
    Connecting,
    Connected(String),
    Transcript(Vec<Message>),
    Fragment(String),
    Finished(Vec<Hit>),
    Failed(String),
    Rejected(String),
    Idle,
}

/// Owns the session for its whole life. Every request is one controller
/// cycle; all blocking HTTP happens on this thread.
pub fn run_session(cfg: Arc<Config>, mut rx: UnboundedReceiver<Request>, tx: UnboundedSender<Update>) {
    let mut session = Session::new();
    let _ = tx.send(Update::Transcript(session.transcript().to_vec()));

    let _ = tx.send(Update::Connecting);
    match get_index(&cfg) {
        Ok(index) => {
            let _ = tx.send(Update::Connected(index.name().to_string()));
        }
        Err(err) => {
            warn!(error = %err, "index warm-up failed; will retry on the next message");
            let _ = tx.send(Update::Failed(err.to_string()));
        }
    }

    while let Some(req) = rx.blocking_recv() {
        if let Request::Submit(text) = req {
            if let Err(err) = session.submit(&text) {
                let _ = tx.send(Update::Rejected(err.to_string()));
                continue;
            }
            let _ = tx.send(Update::Transcript(session.transcript().to_vec()));
        }

        let fragment_tx = tx.clone();
        let result = session
            .run_cycle(
                || create_engine(&cfg),
                |fragment| {
                    let _ = fragment_tx.send(Update::Fragment(fragment.to_string()));
                },
            )
            .map(|reply| reply.is_some());
        match result {
            Ok(true) => {
                let _ = tx.send(Update::Transcript(session.transcript().to_vec()));
                let _ = tx.send(Update::Finished(session.last_sources().to_vec()));
            }
            Ok(false) => {
                let _ = tx.send(Update::Idle);
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                let _ = tx.send(Update::Failed(err.to_string()));
            }
        }
    }
    info!("session closed");
}
