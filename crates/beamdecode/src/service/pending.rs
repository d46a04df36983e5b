use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot::Receiver;
use uuid::Uuid;
use crate::decoder::Hypothesis;
use crate::error::{DecodeError, Result};

/// Resolves to the hypothesis of one submitted sentence.
///
/// Fails with [`DecodeError::ServiceClosed`] when the service shut down before
/// the sentence was decoded.
pub struct PendingTranslation {
    id: Uuid,
    receiver: Receiver<Result<Hypothesis>>,
}

impl PendingTranslation {
    pub fn new(id: Uuid, receiver: Receiver<Result<Hypothesis>>) -> Self {
        Self { id, receiver }
    }

    /// Id of the queued request.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for PendingTranslation {
    type Output = Result<Hypothesis>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(DecodeError::ServiceClosed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_resolves_with_result() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingTranslation::new(Uuid::new_v4(), rx);
        tx.send(Ok(Hypothesis { score: -0.5, words: vec![9, 2] })).unwrap();
        assert_eq!(pending.await.unwrap().words, vec![9, 2]);
    }

    #[tokio::test]
    async fn test_dropped_sender_is_closed() {
        let (tx, rx) = oneshot::channel::<Result<Hypothesis>>();
        drop(tx);
        let pending = PendingTranslation::new(Uuid::new_v4(), rx);
        assert!(matches!(pending.await, Err(DecodeError::ServiceClosed)));
    }
}
