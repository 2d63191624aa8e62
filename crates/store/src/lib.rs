pub mod cache;
pub mod client;
pub mod crystal;
pub mod error;
pub mod filtering;
pub mod null;
pub mod retry;
pub mod sets;
pub mod storefront;
pub mod users;

pub use cache::{AvailabilityCache, SnapshotStore, DEFAULT_TTL};
pub use client::HttpFetcher;
pub use crystal::CrystalCommerceStorefront;
pub use error::ScrapeError;
pub use filtering::filter_listings;
pub use null::NullStorefront;
pub use retry::RetryPolicy;
pub use sets::SetCodeLookup;
pub use storefront::{StoreProfile, StoreRegistry, Storefront};
pub use users::{MemoryUserDirectory, UserDirectory};
