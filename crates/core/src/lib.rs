pub mod catalog;
pub mod diff;
pub mod error;
pub mod listing;
pub mod snapshot;
pub mod spec;

pub use catalog::{CatalogRecord, SetData};
pub use diff::{detect_changes, ChangeSet, ListingDelta};
pub use error::CoreError;
pub use listing::{parse_price, Listing, ListingIdentity};
pub use snapshot::{AvailabilitySnapshot, StoreListings, SYSTEM_CONTEXT};
pub use spec::{CardSpecification, TrackedCard, ANY_FINISH};
