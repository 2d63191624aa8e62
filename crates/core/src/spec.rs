use serde::{Deserialize, Serialize};

use crate::listing::Listing;

/// Finish value that matches every finish, including in an otherwise
/// populated specification.
pub const ANY_FINISH: &str = "any";

/// Caller-side narrowing of a card search.
///
/// All three fields are independently optional; `None` means "any".
/// A populated `finish` of [`ANY_FINISH`] also bypasses the finish filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSpecification {
    #[serde(default)]
    pub set_code: Option<String>,
    #[serde(default)]
    pub collector_number: Option<String>,
    #[serde(default)]
    pub finish: Option<String>,
}

impl CardSpecification {
    /// True when this specification accepts the given listing.
    ///
    /// Set code matches case-insensitively, collector number matches
    /// exactly, finish matches case-insensitively with the "any" sentinel
    /// treated as a wildcard. Unpopulated fields are wildcards.
    pub fn matches(&self, listing: &Listing) -> bool {
        let set_ok = match &self.set_code {
            None => true,
            Some(want) => listing
                .set_code
                .as_ref()
                .is_some_and(|have| want.eq_ignore_ascii_case(have)),
        };
        let collector_ok = match &self.collector_number {
            None => true,
            Some(want) => listing
                .collector_number
                .as_ref()
                .is_some_and(|have| want == have),
        };
        let finish_ok = match &self.finish {
            None => true,
            Some(want) if want.eq_ignore_ascii_case(ANY_FINISH) => true,
            Some(want) => want.eq_ignore_ascii_case(&listing.finish),
        };
        set_ok && collector_ok && finish_ok
    }

    /// True when every field is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.set_code.is_none()
            && self.collector_number.is_none()
            && self
                .finish
                .as_ref()
                .is_none_or(|f| f.eq_ignore_ascii_case(ANY_FINISH))
    }
}

/// A card a user tracks, with zero or more acceptable variants.
///
/// An empty specification list means any printing of the card will do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedCard {
    pub card_name: String,
    #[serde(default)]
    pub specifications: Vec<CardSpecification>,
}

impl TrackedCard {
    pub fn any_printing(card_name: impl Into<String>) -> Self {
        Self {
            card_name: card_name.into(),
            specifications: Vec::new(),
        }
    }
}
