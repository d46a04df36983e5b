//! # Translation Service
//!
//! An asynchronous front-end for one [`BeamSearchDecoder`](crate::BeamSearchDecoder).
//!
//! A decoder is single-caller. The service accepts sentences from any number
//! of tasks, queues them, and lets one background worker feed them to the
//! decoder in batches of up to `S` sentences. Each caller gets a
//! [`PendingTranslation`] that resolves to its own hypothesis.
//!
//! Dropping the service, or calling
//! [`TranslationService::shutdown`], closes it. Requests that are still
//! queued resolve to [`DecodeError::ServiceClosed`](crate::DecodeError::ServiceClosed);
//! a batch that is already decoding finishes first.

mod pending;
mod request;
mod translator;

pub use pending::PendingTranslation;
pub use request::TranslationRequest;
pub use translator::{TranslationService, Translator};
