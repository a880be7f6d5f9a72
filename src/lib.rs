#![deny(clippy::unwrap_used)]

use anyhow::Context;
use futures::stream::StreamExt;
use log_error::LogError;
use once_cell::sync::Lazy;
use rt_types::product::{Category, Discount, Product, ProductRepository};
use rust_decimal::Decimal;
use serde::de::IntoDeserializer;
use serde::Deserialize;
use std::sync::Arc;
use typesafe_repository::async_ops::Save;

pub mod access;
pub mod cart;
pub mod catalog;
pub mod control;
pub mod pagination;
pub mod session;

pub static BIND_ADDR: Lazy<String> = Lazy::new(|| {
    envmnt::get_parse("BIND_ADDR")
        .context("BIND_ADDR not set")
        .log_error("Unable to get BIND_ADDR")
        .unwrap_or("0.0.0.0".to_string())
});

pub static PORT: Lazy<u16> = Lazy::new(|| envmnt::get_parse("PORT").unwrap_or(8080));

pub static DATABASE_PATH: Lazy<String> = Lazy::new(|| {
    envmnt::get_parse("DATABASE_PATH").unwrap_or("storage/shop.db".to_string())
});

pub const DEFAULT_ITEMS_PER_PAGE: usize = 5;

pub static ITEMS_PER_PAGE: Lazy<usize> = Lazy::new(|| {
    envmnt::get_parse::<_, usize, _>("ITEMS_PER_PAGE")
        .ok()
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_ITEMS_PER_PAGE)
});

#[derive(Debug)]
pub struct SqlWrapper<T>(pub T);

impl<T> SqlWrapper<T> {
    pub fn from_sql<R>(r: R) -> Result<T, <Self as TryFrom<R>>::Error>
    where
        Self: TryFrom<R>,
    {
        r.try_into().map(|w: Self| w.0)
    }
}

#[derive(Deserialize)]
pub struct CatalogEntry {
    id: i64,
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    image: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
    price: Decimal,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    discount: Option<Decimal>,
}

/// Imports `id,name,image,category,price,discount` rows. Existing products are overwritten.
pub async fn import_catalog(
    path: &std::path::Path,
    repo: Arc<dyn ProductRepository>,
) -> Result<usize, anyhow::Error> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Unable to read catalog file {}", path.display()))?;
    import_catalog_from_str(&data, repo).await
}

pub async fn import_catalog_from_str(
    data: &str,
    repo: Arc<dyn ProductRepository>,
) -> Result<usize, anyhow::Error> {
    let mut rdr = csv_async::AsyncReaderBuilder::new()
        .delimiter(b',')
        .create_deserializer(data.as_bytes());
    let mut records = rdr.deserialize::<CatalogEntry>();
    let mut count = 0;
    while let Some(entry) = records.next().await.transpose()? {
        if let Some(name) = &entry.category {
            Save::<Category>::save(repo.as_ref(), Category { name: name.clone() }).await?;
        }
        Save::<Product>::save(
            repo.as_ref(),
            Product {
                id: entry.id,
                name: entry.name,
                image: entry.image,
                category: entry.category,
                price: entry.price,
            },
        )
        .await?;
        if let Some(value) = entry.discount {
            Save::<Discount>::save(
                repo.as_ref(),
                Discount {
                    product_id: entry.id,
                    value,
                },
            )
            .await?;
        }
        count += 1;
    }
    log::info!("Imported {count} products");
    Ok(count)
}

pub fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let opt = Option::<String>::deserialize(de)?;
    let opt = opt.as_deref();
    match opt {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(s.into_deserializer()).map(Some),
    }
}

pub fn empty_string_as_none_parse<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    let opt = Option::<String>::deserialize(de)?;
    let opt = opt.as_deref().map(str::trim);
    match opt {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map_err(|err| serde::de::Error::custom(format!("{err:?}")))
            .map(Some),
    }
}
