use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use memestreak_telegram::types::Update;
use memestreak_telegram::{TelegramClient, TelegramError};

use crate::dispatcher::Dispatcher;

/// Seconds the platform may hold a `getUpdates` call open.
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again.
const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Where updates come from. `TelegramClient` long-polls; tests feed batches.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError>;
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        self.get_updates(offset, timeout_secs).await
    }
}

/// Long-polls `source` and hands every update to its own task until
/// `shutdown` flips.
pub async fn run_poller<U>(source: Arc<U>, dispatcher: Dispatcher, mut shutdown: watch::Receiver<bool>)
where
    U: UpdateSource + ?Sized,
{
    let mut offset: Option<i64> = None;
    info!("Polling for updates");

    while !*shutdown.borrow() {
        let batch = tokio::select! {
            batch = source.fetch(offset, POLL_TIMEOUT_SECS) => batch,
            _ = shutdown.changed() => break,
        };

        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.handle_update(update).await;
                    });
                }
            }
            Err(e) => {
                warn!("Polling error: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    info!("Poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::dispatcher::tests::{harness, text_update, user};

    /// Serves queued batches, then idles like an empty long poll.
    struct Scripted {
        batches: Mutex<VecDeque<Result<Vec<Update>, TelegramError>>>,
        offsets: Mutex<Vec<Option<i64>>>,
    }

    #[async_trait]
    impl UpdateSource for Scripted {
        async fn fetch(&self, offset: Option<i64>, _timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(vec![])
                }
            }
        }
    }

    #[tokio::test]
    async fn advances_offset_and_dispatches() {
        let h = harness();
        let mut start = text_update(&user(11, "Ann"), "/start");
        start.update_id = 41;
        let mut myuid = text_update(&user(11, "Ann"), "/myuid");
        myuid.update_id = 42;

        let source = Arc::new(Scripted {
            batches: Mutex::new(VecDeque::from([Ok(vec![start]), Ok(vec![myuid])])),
            offsets: Mutex::new(vec![]),
        });
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_poller(source.clone(), h.dispatcher.clone(), rx));

        for _ in 0..200 {
            if h.messenger.texts_to(11).len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        task.await.unwrap();

        let offsets = source.offsets.lock().unwrap().clone();
        assert_eq!(&offsets[..3], &[None, Some(42), Some(43)]);
        assert_eq!(h.messenger.texts_to(11).len(), 2);
    }

    #[tokio::test]
    async fn stops_while_backing_off() {
        let h = harness();
        let source = Arc::new(Scripted {
            batches: Mutex::new(VecDeque::from([Err(TelegramError::Decode("bad json".into()))])),
            offsets: Mutex::new(vec![]),
        });
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_poller(source.clone(), h.dispatcher.clone(), rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(source.offsets.lock().unwrap().as_slice(), &[None]);
    }
}
