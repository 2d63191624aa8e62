use std::path::Path;

use serde::Deserialize;

use cardwatch_store::StoreProfile;

/// Role-specific sections of `cardwatch.toml` the worker reads.
///
/// The bus sections of the same file are parsed separately by
/// [`BusConfig`](cardwatch_bus::BusConfig); unknown sections are ignored
/// on both sides, so one file configures every role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerSettings {
    /// Storefront profiles to scrape. In a full deployment these come
    /// from the store table; the file is the bootstrap source.
    #[serde(default)]
    pub stores: Vec<StoreProfile>,
}

impl WorkerSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_profiles() {
        let settings: WorkerSettings = toml::from_str(
            r#"
            [[stores]]
            name = "Authority Games"
            slug = "authority_games"
            homepage = "https://authoritygames.example/"
            search_url = "https://authoritygames.example/products/search"
            fetch_strategy = "crystal_commerce"
            "#,
        )
        .unwrap();
        assert_eq!(settings.stores.len(), 1);
        assert_eq!(settings.stores[0].slug, "authority_games");
    }

    #[test]
    fn ignores_bus_sections() {
        let settings: WorkerSettings = toml::from_str(
            r#"
            [broker]
            frontend = { type = "ipc", address = "broker-frontend" }
            "#,
        )
        .unwrap();
        assert!(settings.stores.is_empty());
    }
}
