use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cardwatch_core::TrackedCard;

/// Thin persistence collaborator: user → stores/cards queries.
///
/// The real implementation is a database repository outside this core;
/// roles receive it as a trait object at startup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every known username.
    async fn list_usernames(&self) -> Vec<String>;

    /// The user's preferred store slugs.
    async fn get_user_stores(&self, username: &str) -> Vec<String>;

    /// The user's tracked card list.
    async fn load_card_list(&self, username: &str) -> Vec<TrackedCard>;

    /// card name → usernames tracking it, for the given card names.
    async fn get_tracking_users_for_cards(
        &self,
        card_names: &[String],
    ) -> HashMap<String, Vec<String>>;
}

#[derive(Debug, Clone, Default)]
struct UserRecord {
    stores: Vec<String>,
    cards: Vec<TrackedCard>,
}

/// In-memory user directory for tests and single-process runs.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(
        &self,
        username: impl Into<String>,
        stores: Vec<String>,
        cards: Vec<TrackedCard>,
    ) {
        self.users
            .lock()
            .await
            .insert(username.into(), UserRecord { stores, cards });
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn get_user_stores(&self, username: &str) -> Vec<String> {
        self.users
            .lock()
            .await
            .get(username)
            .map(|u| u.stores.clone())
            .unwrap_or_default()
    }

    async fn load_card_list(&self, username: &str) -> Vec<TrackedCard> {
        self.users
            .lock()
            .await
            .get(username)
            .map(|u| u.cards.clone())
            .unwrap_or_default()
    }

    async fn get_tracking_users_for_cards(
        &self,
        card_names: &[String],
    ) -> HashMap<String, Vec<String>> {
        let users = self.users.lock().await;
        let mut tracking: HashMap<String, Vec<String>> = HashMap::new();
        for name in card_names {
            for (username, record) in users.iter() {
                if record.cards.iter().any(|c| &c.card_name == name) {
                    tracking.entry(name.clone()).or_default().push(username.clone());
                }
            }
        }
        for usernames in tracking.values_mut() {
            usernames.sort();
        }
        tracking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_cards_per_user() {
        let dir = MemoryUserDirectory::new();
        dir.add_user(
            "kara",
            vec!["authority_games".into()],
            vec![TrackedCard::any_printing("Sol Ring")],
        )
        .await;

        assert_eq!(dir.get_user_stores("kara").await, vec!["authority_games"]);
        assert_eq!(dir.load_card_list("kara").await.len(), 1);
        assert!(dir.get_user_stores("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn tracking_users_resolved_per_card() {
        let dir = MemoryUserDirectory::new();
        dir.add_user(
            "kara",
            vec![],
            vec![
                TrackedCard::any_printing("Sol Ring"),
                TrackedCard::any_printing("Brainstorm"),
            ],
        )
        .await;
        dir.add_user("liam", vec![], vec![TrackedCard::any_printing("Sol Ring")])
            .await;

        let tracking = dir
            .get_tracking_users_for_cards(&["Sol Ring".into(), "Black Lotus".into()])
            .await;

        assert_eq!(tracking["Sol Ring"], vec!["kara", "liam"]);
        assert!(!tracking.contains_key("Black Lotus"));
    }
}
