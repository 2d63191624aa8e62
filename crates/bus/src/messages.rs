//! Typed payloads carried by [`Envelope`](crate::Envelope)s.
//!
//! Each struct matches one message name from [`names`]. Message kinds are
//! extensible by name — consumers dispatch on the envelope's `type` field
//! and ignore names they don't handle.

use serde::{Deserialize, Serialize};

use cardwatch_core::{CatalogRecord, Listing, SetData, TrackedCard};

/// Message names, as they appear in the envelope `type` field.
pub mod names {
    // scheduler-requests channel
    pub const AVAILABILITY_REQUEST: &str = "availability_request";
    pub const QUEUE_ALL_AVAILABILITY_CHECKS: &str = "queue_all_availability_checks";

    // worker-results channel
    pub const AVAILABILITY_RESULT: &str = "availability_result";
    pub const CATALOG_CARD_NAMES_RESULT: &str = "catalog_card_names_result";
    pub const CATALOG_SET_DATA_RESULT: &str = "catalog_set_data_result";
    pub const CATALOG_PRINTINGS_CHUNK_RESULT: &str = "catalog_printings_chunk_result";
    pub const CATALOG_FINISHES_CHUNK_RESULT: &str = "catalog_finishes_chunk_result";
    pub const JOB_INTERRUPTED: &str = "job_interrupted";
}

/// Ask the scheduler to queue one availability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub user: String,
    pub store_slug: String,
    pub card_data: TrackedCard,
}

/// Ask the scheduler to fan out one job per card × preferred store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAllAvailabilityChecks {
    pub username: String,
}

/// One refreshed (store, card) cell from a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub store: String,
    pub card: String,
    pub items: Vec<Listing>,
}

/// Full card-name catalog from the external feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCardNamesResult {
    pub names: Vec<String>,
}

/// Full set catalog from the external feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSetDataResult {
    pub sets: Vec<SetData>,
}

/// One bounded chunk of printings from the streaming bulk feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPrintingsChunkResult {
    pub printings: Vec<CatalogRecord>,
}

/// The distinct finish strings seen across the whole feed, sent once at
/// stream end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFinishesChunkResult {
    pub finishes: Vec<String>,
}

/// Worker shutdown notice: the in-flight job will be retried via the
/// job queue's re-delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInterrupted {
    pub user: String,
    pub card: String,
    pub message: String,
}
