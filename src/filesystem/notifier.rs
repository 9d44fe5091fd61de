use derive_more::Display;
use futures::{FutureExt, StreamExt};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// "Filesystem changed" signal carrying the canonical path of the affected folder
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("filesystem changed: {dir}")]
pub struct FsChanged {
    pub dir: String,
}

/// Publishes change notifications to every live subscriber.
///
/// Delivery is synchronous and in mutation order; coalescing is up to subscribers.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: Vec<UnboundedSender<FsChanged>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<FsChanged> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn notify(&mut self, dir: &str) {
        let event = FsChanged {
            dir: dir.to_string(),
        };
        debug!("{}", event);

        // Dropped receivers are pruned on the next send
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Drains every event already queued on `receiver` and returns the distinct folders,
/// in the order they were first announced. Never waits for new events.
pub fn coalesce(receiver: &mut UnboundedReceiver<FsChanged>) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();

    while let Some(Some(event)) = receiver.next().now_or_never() {
        if !dirs.contains(&event.dir) {
            dirs.push(event.dir);
        }
    }

    dirs
}
