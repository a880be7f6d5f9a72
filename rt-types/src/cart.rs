use crate::access::Login;
use crate::product::ProductId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cart kept in the visitor's session: product id (as string) to quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCart(BTreeMap<String, u32>);

impl SessionCart {
    pub fn add(&mut self, product_id: ProductId) -> u32 {
        let quantity = self.0.entry(product_id.to_string()).or_insert(0);
        *quantity += 1;
        *quantity
    }

    pub fn quantity(&self, product_id: ProductId) -> u32 {
        self.0.get(&product_id.to_string()).copied().unwrap_or(0)
    }

    /// Raises the session quantity to the persisted one where the latter is larger.
    pub fn merge_entry(&mut self, entry: &CartEntry) {
        let quantity = self.0.entry(entry.product_id.to_string()).or_insert(0);
        *quantity = (*quantity).max(entry.quantity);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries with keys that parse as product ids. Foreign keys are skipped.
    pub fn items(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.0
            .iter()
            .filter_map(|(k, q)| k.parse::<ProductId>().ok().map(|id| (id, *q)))
    }
}

/// Persisted cart row, one per (user, product).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub user: Login,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartEntry {
    pub fn new(user: Login, product_id: ProductId) -> Self {
        Self {
            user,
            product_id,
            quantity: 1,
        }
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find(
        &self,
        user: &Login,
        product_id: ProductId,
    ) -> anyhow::Result<Option<CartEntry>>;
    /// Inserts the row or overwrites the quantity of the existing one.
    async fn save(&self, entry: CartEntry) -> anyhow::Result<()>;
    async fn list_by_user(&self, user: &Login) -> anyhow::Result<Vec<CartEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_increments_existing_entry() {
        let mut cart = SessionCart::default();
        assert_eq!(cart.add(7), 1);
        assert_eq!(cart.add(7), 2);
        assert_eq!(cart.add(3), 1);
        assert_eq!(cart.quantity(7), 2);
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn serializes_with_string_keys() {
        let mut cart = SessionCart::default();
        cart.add(42);
        cart.add(42);
        assert_eq!(serde_json::to_string(&cart).unwrap(), r#"{"42":2}"#);
        let parsed: SessionCart = serde_json::from_str(r#"{"5":1,"x":3}"#).unwrap();
        assert_eq!(parsed.items().collect::<Vec<_>>(), vec![(5, 1)]);
    }

    #[test]
    fn merge_keeps_larger_quantity() {
        let user = Login("ann".to_string());
        let mut cart: SessionCart = [(1, 3), (2, 1)].into_iter().collect();
        cart.merge_entry(&CartEntry {
            user: user.clone(),
            product_id: 1,
            quantity: 2,
        });
        cart.merge_entry(&CartEntry {
            user: user.clone(),
            product_id: 2,
            quantity: 4,
        });
        cart.merge_entry(&CartEntry::new(user, 9));
        assert_eq!(cart.quantity(1), 3);
        assert_eq!(cart.quantity(2), 4);
        assert_eq!(cart.quantity(9), 1);
    }
}
