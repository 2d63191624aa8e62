use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One printing pulled from the external bulk feed.
///
/// Batches of these form the ingestion chunks; the chunk is a
/// memory/message-size bound, not a domain concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub card_name: String,
    pub set_code: String,
    pub collector_number: String,
    pub finishes: Vec<String>,
}

impl CatalogRecord {
    /// Natural key used for conflict-ignoring upserts.
    pub fn natural_key(&self) -> (String, String, String) {
        (
            self.card_name.clone(),
            self.set_code.clone(),
            self.collector_number.clone(),
        )
    }
}

/// One card set from the external feed's set endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetData {
    pub code: String,
    pub name: String,
    pub release_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let rec = CatalogRecord {
            card_name: "Sol Ring".into(),
            set_code: "c21".into(),
            collector_number: "263".into(),
            finishes: vec!["nonfoil".into(), "foil".into()],
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: CatalogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn set_data_allows_missing_release_date() {
        let json = r#"{"code":"mh2","name":"Modern Horizons 2","release_date":null}"#;
        let set: SetData = serde_json::from_str(json).unwrap();
        assert_eq!(set.code, "mh2");
        assert!(set.release_date.is_none());
    }
}
