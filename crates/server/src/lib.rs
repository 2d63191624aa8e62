pub mod availability;
pub mod handlers;
pub mod notify;
pub mod requests;

pub use availability::AvailabilityTracker;
pub use handlers::{result_handlers, ServerContext};
pub use notify::{CardChangeSummary, ClientNotifier, LogNotifier};
pub use requests::{AvailabilityService, CachedAvailability};
