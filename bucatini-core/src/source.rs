// Copyright 2025 Bucatini Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Resumable change feed over a MongoDB collection.
//!
//! [`ChangeFeedSource`] opens a change stream subscription on one collection
//! and hands back a [`ChangeFeed`]: a lazy, potentially infinite
//! [`Stream`] of [`ChangeEvent`]s. Opening with a resume token continues
//! immediately after the position the token encodes; opening without one
//! starts at the current tail of the oplog (earlier events are not replayed).
//!
//! The feed always requests `fullDocument: updateLookup` so every event
//! carries the complete current state of the affected document.
//!
//! A feed instance is not rewindable. Restarting means calling
//! [`ChangeFeedSource::open`] again with a (possibly newer) token. When the
//! driver reports an unrecoverable error — an invalid resume position, an
//! invalidated stream — the feed yields that error once and then ends.
//! Transient network recovery is the driver's job, not this module's; if a
//! transient failure does propagate up, the sequence simply ends.

use crate::event::{ChangeEvent, ConversionError};
use bson::Document;
use futures::Stream;
use mongodb::{
    change_stream::event::{ChangeStreamEvent, ResumeToken},
    error::Error as MongoError,
    options::{ChangeStreamOptions, FullDocumentType},
    Collection,
};
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors surfaced by the change feed.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The subscription could not be established.
    #[error("failed to open change stream: {0}")]
    Open(#[source] MongoError),

    /// The established stream reported an error (including failed resume).
    #[error("change stream error: {0}")]
    Stream(#[source] MongoError),

    /// A driver event could not be decoded into a [`ChangeEvent`].
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The stream was invalidated (collection dropped or renamed).
    #[error("change stream invalidated: {reason}")]
    Invalidated {
        /// Why the stream was invalidated
        reason: String,
    },
}

/// Change feed tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Driver-side batch size for fetching events, if set
    pub batch_size: Option<u32>,
}

/// Factory for change feed subscriptions on a single collection.
pub struct ChangeFeedSource {
    collection: Collection<Document>,
    config: SourceConfig,
}

impl ChangeFeedSource {
    /// Creates a source over the given collection.
    pub fn new(collection: Collection<Document>, config: SourceConfig) -> Self {
        Self { collection, config }
    }

    /// Returns the fully qualified `"database.collection"` name being watched.
    pub fn namespace(&self) -> String {
        let ns = self.collection.namespace();
        format!("{}.{}", ns.db, ns.coll)
    }

    /// Opens a subscription, resuming after `resume_token` when one is given
    /// and starting from the current tail otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the subscription cannot be
    /// established — including the case where the resume position is no
    /// longer covered by the oplog.
    pub async fn open(&self, resume_token: Option<Document>) -> Result<ChangeFeed, SourceError> {
        let mut options = ChangeStreamOptions::default();
        options.full_document = Some(FullDocumentType::UpdateLookup);
        options.batch_size = self.config.batch_size;

        if let Some(ref token_doc) = resume_token {
            debug!(token = ?token_doc, "resuming change stream after token");
            options.resume_after = Some(decode_resume_token(token_doc)?);
        }

        info!(
            namespace = %self.namespace(),
            resuming = resume_token.is_some(),
            "opening change stream"
        );

        let stream = self
            .collection
            .watch()
            .with_options(options)
            .await
            .map_err(SourceError::Open)?;

        Ok(ChangeFeed {
            namespace: self.namespace(),
            inner: Some(stream),
        })
    }
}

/// Re-interprets a persisted token document as the driver's resume token.
fn decode_resume_token(token: &Document) -> Result<ResumeToken, SourceError> {
    let bytes = bson::to_vec(token)
        .map_err(|e| SourceError::Conversion(ConversionError::ResumeToken(e.to_string())))?;
    bson::from_slice::<ResumeToken>(&bytes)
        .map_err(|e| SourceError::Conversion(ConversionError::ResumeToken(e.to_string())))
}

/// An open change feed subscription.
///
/// Yields `Result<ChangeEvent, SourceError>` in oplog order. After the first
/// `Err` the feed is exhausted and subsequent polls return `None`; restart by
/// re-opening through [`ChangeFeedSource::open`].
pub struct ChangeFeed {
    namespace: String,
    inner: Option<mongodb::change_stream::ChangeStream<ChangeStreamEvent<Document>>>,
}

impl Stream for ChangeFeed {
    type Item = Result<ChangeEvent, SourceError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        use futures::StreamExt;

        let this = self.get_mut();
        let Some(ref mut stream) = this.inner else {
            return Poll::Ready(None);
        };

        match stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(raw))) => {
                let event = match ChangeEvent::try_from(raw) {
                    Ok(event) => event,
                    Err(e) => {
                        this.inner = None;
                        return Poll::Ready(Some(Err(SourceError::Conversion(e))));
                    }
                };

                if event.is_invalidate() {
                    let reason = format!("collection {} was dropped or renamed", this.namespace);
                    error!(namespace = %this.namespace, "change stream invalidated");
                    this.inner = None;
                    return Poll::Ready(Some(Err(SourceError::Invalidated { reason })));
                }

                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Unrecoverable as far as this feed is concerned: surface
                // the error once, then the sequence ends.
                this.inner = None;
                Poll::Ready(Some(Err(SourceError::Stream(e))))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn default_config_has_no_batch_size() {
        let config = SourceConfig::default();
        assert!(config.batch_size.is_none());
    }

    #[test]
    fn decode_round_trips_token_document() {
        let token = doc! { "_data": "8264ABCD0000" };
        let decoded = decode_resume_token(&token).unwrap();
        let back = bson::to_document(&decoded).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn source_error_display() {
        let err = SourceError::Invalidated {
            reason: "collection appdb.orders was dropped or renamed".to_string(),
        };
        assert!(err.to_string().contains("invalidated"));
        assert!(err.to_string().contains("appdb.orders"));
    }
}
