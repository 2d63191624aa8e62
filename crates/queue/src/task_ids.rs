//! Symbolic task identifiers shared by the scheduler (enqueue side) and
//! the worker (execute side), plus the stable ids of the recurring jobs.

/// Scrape one (user, store, card) combination.
pub const CHECK_SINGLE_CARD: &str = "check_single_card";

/// Enqueue checks for every tracked card of every user.
pub const SWEEP_ALL_AVAILABILITY: &str = "sweep_all_availability";

/// Refresh the card-name catalog from the external feed.
pub const UPDATE_CARD_CATALOG: &str = "update_card_catalog";

/// Refresh the set catalog from the external feed.
pub const UPDATE_SET_CATALOG: &str = "update_set_catalog";

/// Full chunked printings/finishes refresh (runs names + sets first).
pub const UPDATE_FULL_CATALOG: &str = "update_full_catalog";

/// Stable id of the recurring full-catalog job.
pub const FULL_CATALOG_JOB_ID: &str = "recurring:update_full_catalog";

/// Stable id of the recurring availability sweep job.
pub const AVAILABILITY_SWEEP_JOB_ID: &str = "recurring:sweep_all_availability";
