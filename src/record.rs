//! Review records with a content-derived identity checksum.
//!
//! Providers assemble a [`ReviewData`] from the page and turn it into a
//! validated [`Review`] through [`Review::from_extraction`], which stamps the
//! run's metadata onto the record. The checksum is computed once, from
//! extraction-stable fields, and never recomputed; the downstream sink uses
//! it to deduplicate across runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::RunContext;
use crate::proxy::ProxyChoice;

/// Key/value pair scraped from per-review rating tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueField {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviewer {
    pub name: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewContent {
    pub original_text: String,
    pub stars: f64,
    pub seen_for: Vec<String>,
    pub posted_unix_millis: i64,
    pub tags: Vec<KeyValueField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReply {
    pub has_reply: bool,
    pub text: Option<String>,
}

/// Where the record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub provider: String,
    pub base_url: String,
    pub proxied_url: String,
}

/// Run-scoped metadata stamped onto every record at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetadata {
    pub run_id: Uuid,
    pub mode: String,
    pub proxy: ProxyChoice,
    pub run_started_millis: i64,
    pub added_to_queue_millis: Option<i64>,
}

impl RuntimeMetadata {
    fn from_context(ctx: &RunContext) -> Self {
        Self {
            run_id: ctx.run_id,
            mode: ctx.config.mode.clone(),
            proxy: ctx.config.proxy,
            run_started_millis: ctx.started_millis,
            added_to_queue_millis: ctx.config.added_to_queue_millis,
        }
    }
}

/// What a provider extracts from a single review element.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewData {
    pub reviewer: Reviewer,
    pub content: ReviewContent,
    pub reply: ReviewReply,
    pub metadata: ReviewMetadata,
    pub business_id: String,
    pub checksum: String,
}

/// A validated review record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: Reviewer,
    pub content: ReviewContent,
    pub reply: ReviewReply,
    pub metadata: ReviewMetadata,
    pub runtime: RuntimeMetadata,
    pub business_id: String,
    pub checksum: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("review field {0} is empty")]
    EmptyField(&'static str),
    #[error("posted timestamp {0} is not a positive unix-millis value")]
    InvalidTimestamp(i64),
    #[error("stars value {0} is outside 0..=5")]
    StarsOutOfRange(String),
}

impl Review {
    /// Attach the run's metadata to extracted data and validate the result.
    pub fn from_extraction(ctx: &RunContext, data: ReviewData) -> Result<Self, RecordError> {
        let review = Self {
            reviewer: data.reviewer,
            content: data.content,
            reply: data.reply,
            metadata: data.metadata,
            runtime: RuntimeMetadata::from_context(ctx),
            business_id: data.business_id,
            checksum: data.checksum,
        };
        review.validate()?;
        Ok(review)
    }

    /// Schema validation applied before a record may leave a run.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.reviewer.name.trim().is_empty() {
            return Err(RecordError::EmptyField("reviewer.name"));
        }
        if self.content.original_text.trim().is_empty() {
            return Err(RecordError::EmptyField("content.original_text"));
        }
        if !(0.0..=5.0).contains(&self.content.stars) {
            return Err(RecordError::StarsOutOfRange(self.content.stars.to_string()));
        }
        if self.content.posted_unix_millis <= 0 {
            return Err(RecordError::InvalidTimestamp(self.content.posted_unix_millis));
        }
        if self.metadata.provider.trim().is_empty() {
            return Err(RecordError::EmptyField("metadata.provider"));
        }
        if self.business_id.trim().is_empty() {
            return Err(RecordError::EmptyField("business_id"));
        }
        if self.checksum.trim().is_empty() {
            return Err(RecordError::EmptyField("checksum"));
        }
        Ok(())
    }
}

/// Identity key for downstream deduplication: a digest of the record's
/// extraction-stable identity field joined with its posted timestamp.
pub fn identity_checksum(identity: &str, posted_unix_millis: i64) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("{}_{}", hex::encode(digest), posted_unix_millis)
}
