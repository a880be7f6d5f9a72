use crate::product::ProductId;
use serde::{Deserialize, Serialize};

pub const MAX_HISTORY_LEN: usize = 5;

/// Recently viewed products of a session, unique and bounded to [`MAX_HISTORY_LEN`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ProductId>", into = "Vec<ProductId>")]
pub struct ViewHistory(Vec<ProductId>);

impl ViewHistory {
    /// New ids go to the end, evicting the entry at index 0 when full.
    /// A repeated id is moved to index 0.
    pub fn record(&mut self, product_id: ProductId) {
        match self.0.iter().position(|id| *id == product_id) {
            None => {
                if self.0.len() >= MAX_HISTORY_LEN {
                    self.0.remove(0);
                }
                self.0.push(product_id);
            }
            Some(idx) => {
                self.0.remove(idx);
                self.0.insert(0, product_id);
            }
        }
    }

    pub fn ids(&self) -> &[ProductId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ProductId>> for ViewHistory {
    fn from(mut ids: Vec<ProductId>) -> Self {
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        let overflow = ids.len().saturating_sub(MAX_HISTORY_LEN);
        ids.drain(..overflow);
        Self(ids)
    }
}

impl From<ViewHistory> for Vec<ProductId> {
    fn from(history: ViewHistory) -> Self {
        history.0
    }
}
