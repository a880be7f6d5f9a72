use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;

pub type ProductId = i64;

#[derive(Debug, Clone, Id, Serialize, Deserialize)]
pub struct Product {
    #[id]
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub category: Option<IdentityOf<Category>>,
    pub price: Decimal,
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}

#[derive(Debug, Clone, Id, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[id]
    pub name: String,
}

/// Percentage discount attached to a single product.
#[derive(Debug, Clone, Id, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    #[id]
    pub product_id: ProductId,
    pub value: Decimal,
}

/// Row of the product listing, with the discounted price already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductListItem {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub price_before: Decimal,
    pub price_after: Option<Decimal>,
    pub discount_value: Option<Decimal>,
}

impl ProductListItem {
    pub fn new(
        id: ProductId,
        name: String,
        image: Option<String>,
        category: Option<String>,
        price_before: Decimal,
        discount_value: Option<Decimal>,
    ) -> Self {
        Self {
            id,
            name,
            image,
            category,
            price_before,
            price_after: discount_value.map(|d| discounted_price(price_before, d)),
            discount_value,
        }
    }
}

pub fn discounted_price(price: Decimal, discount: Decimal) -> Decimal {
    (price * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Category filter of the listing page. `All` disables filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    pub const ALL: &'static str = "All";

    pub fn parse<S: AsRef<str>>(s: Option<S>) -> Self {
        match s.as_ref().map(|s| s.as_ref().trim()) {
            None | Some("") | Some(Self::ALL) => Self::All,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(n) => Some(n),
        }
    }

    pub fn label(&self) -> &str {
        self.name().unwrap_or(Self::ALL)
    }
}

#[async_trait]
pub trait ProductRepository:
    Repository<Product, Error = anyhow::Error>
    + Repository<Category, Error = anyhow::Error>
    + Repository<Discount, Error = anyhow::Error>
    + Get<Product>
    + Save<Product>
    + Save<Category>
    + Save<Discount>
    + Send
    + Sync
{
    async fn count_by(&self, filter: &CategoryFilter) -> Result<usize, anyhow::Error>;
    async fn list_page(
        &self,
        filter: &CategoryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProductListItem>, anyhow::Error>;
    async fn categories(&self) -> Result<Vec<Category>, anyhow::Error>;
}
