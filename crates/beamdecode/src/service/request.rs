use tokio::sync::oneshot::Sender;
use tracing::warn;
use uuid::Uuid;
use crate::Word;
use crate::decoder::Hypothesis;
use crate::error::Result;

/// A queued sentence and the channel its result goes back on.
pub struct TranslationRequest {
    id: Uuid,
    sentence: Vec<Word>,
    sender: Sender<Result<Hypothesis>>,
}

impl TranslationRequest {
    pub fn new(sentence: Vec<Word>, sender: Sender<Result<Hypothesis>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sentence,
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sentence(&self) -> &[Word] {
        &self.sentence
    }

    /// Delivers the result. A caller that stopped waiting is only logged.
    pub fn respond(self, result: Result<Hypothesis>) {
        if self.sender.send(result).is_err() {
            warn!(id = %self.id, "translation receiver dropped before delivery");
        }
    }
}
