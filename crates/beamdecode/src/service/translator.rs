use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};
use crate::Word;
use crate::decoder::{BeamSearchDecoder, Hypothesis, NBestBatch};
use crate::error::{DecodeError, Result};
use super::pending::PendingTranslation;
use super::request::TranslationRequest;

const IDLE_WAIT: Duration = Duration::from_millis(100);

type Queue = Arc<Mutex<Vec<TranslationRequest>>>;

/// Submits sentences for asynchronous translation.
#[async_trait]
pub trait Translator {
    /// Queues `sentence` and returns a future for its hypothesis.
    async fn translate(&self, sentence: Vec<Word>) -> PendingTranslation;
}

/// Serializes concurrent translation requests onto one decoder.
///
/// The decoder lives inside a background task. The task drains up to `S`
/// queued sentences at a time, decodes them as one batch padded to the
/// longest sentence (capped at `max_length`), and answers each request with
/// its own hypothesis. If the batch fails, every request in it receives
/// [`DecodeError::BatchFailed`]. Decoding runs on tokio's blocking pool so
/// callers on the same runtime keep making progress.
///
/// ```no_run
/// use std::collections::HashSet;
/// use beamdecode::{BeamSearchDecoder, DecodingConfig};
/// use beamdecode::service::{TranslationService, Translator};
///
/// # async fn run() -> beamdecode::Result<()> {
/// let config = DecodingConfig::builder().models(["model.npz"]).build();
/// let decoder = BeamSearchDecoder::new(config, 2)?;
/// let service = TranslationService::<16>::new(decoder, 64, HashSet::new());
///
/// let hypothesis = service.translate(vec![5, 7, 2]).await.await?;
/// println!("{:?}", hypothesis.words);
/// # Ok(())
/// # }
/// ```
pub struct TranslationService<const S: usize> {
    waiting_requests: Queue,
    /// Cleared once the service stops accepting sentences
    open: Arc<AtomicBool>,
    notifier: Arc<Notify>,
}

impl<const S: usize> TranslationService<S> {
    /// Moves `decoder` into a new background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Parameters
    ///
    /// * `decoder` - Decoder every batch runs on
    /// * `max_length` - Upper bound on the packed batch width
    /// * `permitted` - Output vocabulary applied to every batch, empty for none
    pub fn new(decoder: BeamSearchDecoder, max_length: usize, permitted: HashSet<Word>) -> Self {
        let waiting_requests: Queue = Arc::new(Mutex::new(vec![]));
        let open = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());

        tokio::spawn(translation_loop::<S>(
            decoder,
            max_length,
            Arc::new(permitted),
            open.clone(),
            notifier.clone(),
            waiting_requests.clone(),
        ));

        Self {
            waiting_requests,
            open,
            notifier,
        }
    }

    /// Translates every sentence, results in input order.
    pub async fn translate_all(&self, sentences: Vec<Vec<Word>>) -> Vec<Result<Hypothesis>> {
        let mut pending = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            pending.push(self.translate(sentence).await);
        }
        join_all(pending).await
    }

    /// Number of requests not yet taken by the background task.
    pub async fn queued(&self) -> usize {
        self.waiting_requests.lock().await.len()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Stops accepting sentences and wakes the background task so it can
    /// close the queue and release the decoder.
    ///
    /// Needs no runtime, so it is safe from `Drop` on any thread.
    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.notifier.notify_one();
        }
    }
}

impl<const S: usize> Drop for TranslationService<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl<const S: usize> Translator for TranslationService<S> {
    async fn translate(&self, sentence: Vec<Word>) -> PendingTranslation {
        let (tx, rx) = oneshot::channel();
        let request = TranslationRequest::new(sentence, tx);
        let id = request.id();
        {
            let mut waiting = self.waiting_requests.lock().await;
            // checked under the lock, the closing drain takes it too
            if !self.is_open() {
                request.respond(Err(DecodeError::ServiceClosed));
                return PendingTranslation::new(id, rx);
            }
            waiting.push(request);
        }
        self.notifier.notify_one();
        PendingTranslation::new(id, rx)
    }
}

async fn translation_loop<const S: usize>(
    mut decoder: BeamSearchDecoder,
    max_length: usize,
    permitted: Arc<HashSet<Word>>,
    open: Arc<AtomicBool>,
    notifier: Arc<Notify>,
    waiting_requests: Queue,
) {
    while open.load(Ordering::SeqCst) {
        let requests = drain_requests(S, &waiting_requests).await;
        if requests.is_empty() {
            // a timeout just means we poll the queue again
            let _ = timeout_await_notifier(&notifier).await;
            continue;
        }

        let sentences: Vec<Vec<Word>> = requests.iter().map(|r| r.sentence().to_vec()).collect();
        let width = batch_width(&sentences, max_length);
        debug!(requests = requests.len(), width, "decoding queued requests");

        let permitted = permitted.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let result = decoder.decode(&sentences, width, &permitted);
            (decoder, result)
        })
        .await;

        match decoded {
            Ok((returned, result)) => {
                decoder = returned;
                answer_requests(requests, result);
            }
            Err(e) => {
                // the decoder went down with the blocking task
                error!(error = %e, "decoder task failed, closing translation service");
                answer_requests(requests, Err(DecodeError::BatchFailed(e.to_string())));
                open.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    let closed = close_queue(&waiting_requests).await;
    info!(closed, "translation service stopped");
}

/// Packed width for `sentences`: the longest one, capped at `max_length`.
fn batch_width(sentences: &[Vec<Word>], max_length: usize) -> usize {
    let longest = sentences.iter().map(Vec::len).max().unwrap_or(0);
    longest.min(max_length).max(1)
}

fn answer_requests(requests: Vec<TranslationRequest>, result: Result<NBestBatch>) {
    match result {
        Ok(mut nbest) => {
            let mut hypotheses = nbest.pop().unwrap_or_default().into_iter();
            for (position, request) in requests.into_iter().enumerate() {
                let result = hypotheses.next().ok_or(DecodeError::NoHypothesis(position));
                request.respond(result);
            }
        }
        Err(e) => {
            warn!(error = %e, requests = requests.len(), "batch decode failed");
            let message = e.to_string();
            for request in requests {
                request.respond(Err(DecodeError::BatchFailed(message.clone())));
            }
        }
    }
}

/// Answers every queued request with [`DecodeError::ServiceClosed`].
/// Returns how many there were.
async fn close_queue(waiting_requests: &Mutex<Vec<TranslationRequest>>) -> usize {
    let requests: Vec<TranslationRequest> = waiting_requests.lock().await.drain(..).collect();
    let closed = requests.len();
    for request in requests {
        request.respond(Err(DecodeError::ServiceClosed));
    }
    closed
}

#[inline]
async fn timeout_await_notifier(notifier: &Notify) -> std::result::Result<(), Elapsed> {
    tokio::time::timeout(IDLE_WAIT, notifier.notified()).await
}

async fn drain_requests<T>(batch_size: usize, waiting_requests: &Mutex<Vec<T>>) -> Vec<T> {
    let mut requests = waiting_requests.lock().await;
    let take = batch_size.min(requests.len());
    requests.drain(0..take).collect()
}
