use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Info,
  Warning,
  Error,
}

/// A message for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

impl Notice {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Info,
      message: message.into(),
    }
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Warning,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Error,
      message: message.into(),
    }
  }
}

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for redraws
  Tick,
  /// Some cache changed its contents
  Changed(&'static str),
  /// Outcome of a user action
  Notice(Notice),
}

/// Merges terminal input, a tick timer, cache revisions and notices into one
/// stream.
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let input = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if input.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Forward every revision bump of a cache as [`Event::Changed`].
  pub fn watch(&self, name: &'static str, mut revisions: watch::Receiver<u64>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while revisions.changed().await.is_ok() {
        if tx.send(Event::Changed(name)).is_err() {
          break;
        }
      }
    });
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
