use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ftpr::{ActionType, TransferEvent, TransferListener};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum TransferUpdate {
    UploadProgress(String, u64, u64),
    DownloadProgress(String, u64, u64),
    Finished(String, TransferEvent),
}

/// Forwards session callbacks from the blocking transfer thread to the
/// async front end, and vetoes the transfer once `cancel` is raised.
pub struct ChannelListener {
    name: String,
    tx: mpsc::Sender<TransferUpdate>,
    cancel: Arc<AtomicBool>,
}

impl ChannelListener {
    pub fn new(name: &str, tx: mpsc::Sender<TransferUpdate>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            name: name.to_string(),
            tx,
            cancel,
        }
    }

    fn send(&self, update: TransferUpdate) {
        if self.tx.blocking_send(update).is_err() {
            tracing::error!("Failed to send transfer update for {}", self.name);
        }
    }

    fn should_continue(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst)
    }
}

impl TransferListener for ChannelListener {
    fn before(&self, _event: &TransferEvent) -> bool {
        self.should_continue()
    }

    fn on_progress(&self, event: &TransferEvent) -> bool {
        let update = match event.action {
            ActionType::Upload => {
                TransferUpdate::UploadProgress(self.name.clone(), event.completed_size, event.total_size)
            }
            ActionType::Download => {
                TransferUpdate::DownloadProgress(self.name.clone(), event.completed_size, event.total_size)
            }
        };
        self.send(update);
        self.should_continue()
    }

    fn after(&self, event: &TransferEvent) {
        self.send(TransferUpdate::Finished(self.name.clone(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwards_and_cancels() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = Arc::new(AtomicBool::new(false));
        let listener = ChannelListener::new("a.txt", tx, cancel.clone());

        let mut event = TransferEvent::new("u@h:21", ActionType::Upload, 10);
        assert!(listener.before(&event));

        event.set_completed_size(4);
        assert!(listener.on_progress(&event));

        cancel.store(true, Ordering::SeqCst);
        assert!(!listener.on_progress(&event));
        listener.after(&event);

        assert!(matches!(
            rx.try_recv().unwrap(),
            TransferUpdate::UploadProgress(_, 4, 10)
        ));
        assert!(matches!(rx.try_recv().unwrap(), TransferUpdate::UploadProgress(..)));
        assert!(matches!(rx.try_recv().unwrap(), TransferUpdate::Finished(..)));
    }
}
