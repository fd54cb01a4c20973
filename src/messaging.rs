//! User-facing messages.
//!
//! Library code never prints. Anything meant for the user goes through a
//! [`Sink`], which the caller picks: the terminal, the log, a channel, or a
//! collecting buffer for tests.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
    Critical,
    Debug,
}

impl MessageKind {
    fn prefix(self) -> &'static str {
        match self {
            MessageKind::Info => "",
            MessageKind::Success => "✔️ ",
            MessageKind::Warning => "⚠️ ",
            MessageKind::Error => "❌ ",
            MessageKind::Critical => "💀 ",
            MessageKind::Debug => "",
        }
    }

    fn is_problem(self) -> bool {
        matches!(self, MessageKind::Warning | MessageKind::Error | MessageKind::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub content: String,
    pub details: Option<String>,
}

impl Message {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            details: None,
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Info, content)
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Success, content)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Warning, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, content)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Text as shown in a terminal.
    pub fn display_text(&self) -> String {
        let mut text = format!("{}{}", self.kind.prefix(), self.content);
        if let Some(details) = &self.details {
            text.push_str("\n   Details: ");
            text.push_str(details);
        }
        text
    }

    fn log(&self) {
        let details = self.details.as_deref().unwrap_or_default();
        match self.kind {
            MessageKind::Debug => tracing::debug!("{} {}", self.content, details),
            MessageKind::Info | MessageKind::Success => tracing::info!("{} {}", self.content, details),
            MessageKind::Warning => tracing::warn!("{} {}", self.content, details),
            MessageKind::Error | MessageKind::Critical => tracing::error!("{} {}", self.content, details),
        }
    }
}

/// Destination for user-facing messages.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Print to stdout (problems to stderr) and log
    Console,
    /// Log only
    Tracing,
    /// Forward to a receiver, e.g. a front end
    Channel(mpsc::UnboundedSender<Message>),
    /// Keep in memory
    Collect(Arc<Mutex<Vec<Message>>>),
}

impl Sink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Sink::Channel(tx), rx)
    }

    pub fn collect() -> Self {
        Sink::Collect(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn send(&self, message: Message) {
        match self {
            Sink::Console => {
                message.log();
                if message.kind == MessageKind::Debug {
                    return;
                }
                if message.kind.is_problem() {
                    eprintln!("{}", message.display_text());
                } else {
                    println!("{}", message.display_text());
                }
            }
            Sink::Tracing => message.log(),
            Sink::Channel(tx) => {
                if tx.send(message).is_err() {
                    tracing::debug!("Message receiver dropped");
                }
            }
            Sink::Collect(messages) => messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message),
        }
    }

    /// Messages kept by a [`Sink::Collect`], empty for other variants.
    pub fn collected(&self) -> Vec<Message> {
        match self {
            Sink::Collect(messages) => messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text() {
        let message = Message::error("Failed to scan").with_details("bad file");
        assert_eq!(message.display_text(), "❌ Failed to scan\n   Details: bad file");
        assert_eq!(Message::info("hello").display_text(), "hello");
    }

    #[test]
    fn test_collect_sink() {
        let sink = Sink::collect();
        sink.send(Message::info("one"));
        sink.clone().send(Message::warning("two"));
        let collected = sink.collected();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[1].kind, MessageKind::Warning);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = Sink::channel();
        sink.send(Message::success("done"));
        assert_eq!(rx.recv().await.unwrap().content, "done");

        drop(rx);
        // A closed receiver is not an error for the sender
        sink.send(Message::info("ignored"));
    }
}
