use crate::SqlWrapper;
use async_trait::async_trait;
use rt_types::product::{
    Category, CategoryFilter, Discount, Product, ProductListItem, ProductRepository,
};
use rusqlite::params;
use rusqlite::types::Type;
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::prelude::*;

pub struct SqliteProductRepository {
    conn: Connection,
}

impl SqliteProductRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS category (
                    name TEXT PRIMARY KEY
                )",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS product (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    image TEXT,
                    category TEXT,
                    price TEXT NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS product_category_idx ON product(category)",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS discount (
                    product_id INTEGER PRIMARY KEY,
                    value TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<Decimal, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into()))
}

fn optional_decimal_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    row.get::<_, Option<String>>(idx)?
        .as_deref()
        .map(Decimal::from_str)
        .transpose()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into()))
}

impl TryFrom<&rusqlite::Row<'_>> for SqlWrapper<Product> {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(SqlWrapper(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            image: row.get(2)?,
            category: row.get(3)?,
            price: decimal_column(row, 4)?,
        }))
    }
}

impl TryFrom<&rusqlite::Row<'_>> for SqlWrapper<ProductListItem> {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(SqlWrapper(ProductListItem::new(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            decimal_column(row, 4)?,
            optional_decimal_column(row, 5)?,
        )))
    }
}

impl Repository<Product> for SqliteProductRepository {
    type Error = anyhow::Error;
}

impl Repository<Category> for SqliteProductRepository {
    type Error = anyhow::Error;
}

impl Repository<Discount> for SqliteProductRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<Product> for SqliteProductRepository {
    async fn get_one(&self, id: &IdentityOf<Product>) -> Result<Option<Product>, anyhow::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, name, image, category, price FROM product WHERE id = ?1")?;
                let p = stmt
                    .query_map([id], |row| SqlWrapper::<Product>::from_sql(row))?
                    .next()
                    .transpose()?;
                Ok(p)
            })
            .await?)
    }
}

#[async_trait]
impl Save<Product> for SqliteProductRepository {
    async fn save(&self, p: Product) -> Result<(), anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO product (id, name, image, category, price) VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET name=?2, image=?3, category=?4, price=?5",
                    params![p.id, p.name, p.image, p.category, p.price.to_string()],
                )?;
                Ok(())
            })
            .await?)
    }
}

#[async_trait]
impl Save<Category> for SqliteProductRepository {
    async fn save(&self, c: Category) -> Result<(), anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO category (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![c.name],
                )?;
                Ok(())
            })
            .await?)
    }
}

#[async_trait]
impl Save<Discount> for SqliteProductRepository {
    async fn save(&self, d: Discount) -> Result<(), anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO discount (product_id, value) VALUES (?1, ?2)
                     ON CONFLICT(product_id) DO UPDATE SET value=?2",
                    params![d.product_id, d.value.to_string()],
                )?;
                Ok(())
            })
            .await?)
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn count_by(&self, filter: &CategoryFilter) -> Result<usize, anyhow::Error> {
        let category = filter.name().map(ToString::to_string);
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT COUNT(*) FROM product WHERE (?1 IS NULL OR category = ?1)",
                )?;
                let count: i64 = stmt
                    .query_map(params![category], |row| row.get(0))?
                    .next()
                    .transpose()?
                    .unwrap_or_default();
                Ok(count as usize)
            })
            .await?)
    }

    async fn list_page(
        &self,
        filter: &CategoryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProductListItem>, anyhow::Error> {
        let category = filter.name().map(ToString::to_string);
        let SqlWrapper(items) = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT p.id, p.name, p.image, p.category, p.price,
                        (SELECT d.value FROM discount d WHERE d.product_id = p.id LIMIT 1)
                     FROM product p
                     WHERE (?1 IS NULL OR p.category = ?1)
                     ORDER BY p.id
                     LIMIT ?2 OFFSET ?3",
                )?;
                let items = stmt
                    .query_map(params![category, limit as i64, offset as i64], |row| {
                        SqlWrapper::<ProductListItem>::from_sql(row)
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SqlWrapper(items))
            })
            .await?;
        Ok(items)
    }

    async fn categories(&self) -> Result<Vec<Category>, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT name FROM category ORDER BY name")?;
                let items = stmt
                    .query_map([], |row| Ok(Category { name: row.get(0)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn repo() -> SqliteProductRepository {
        let conn = Connection::open_in_memory().await.unwrap();
        let repo = SqliteProductRepository::init(conn).await.unwrap();
        for (id, category) in [(1, "Tea"), (2, "Tea"), (3, "Kitchen"), (4, "Tea")] {
            Save::<Category>::save(&repo, Category { name: category.to_string() })
                .await
                .unwrap();
            Save::<Product>::save(
                &repo,
                Product {
                    id,
                    name: format!("Product {id}"),
                    image: None,
                    category: Some(category.to_string()),
                    price: dec!(10.00),
                },
            )
            .await
            .unwrap();
        }
        Save::<Discount>::save(
            &repo,
            Discount {
                product_id: 2,
                value: dec!(25),
            },
        )
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn gets_product_by_id() {
        let repo = repo().await;
        let p = repo.get_one(&3).await.unwrap().unwrap();
        assert_eq!(p.name, "Product 3");
        assert_eq!(p.category.as_deref(), Some("Kitchen"));
        assert_eq!(p.price, dec!(10.00));
        assert!(repo.get_one(&99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filters_and_pages_listing() {
        let repo = repo().await;
        let tea = CategoryFilter::Named("Tea".to_string());
        assert_eq!(repo.count_by(&CategoryFilter::All).await.unwrap(), 4);
        assert_eq!(repo.count_by(&tea).await.unwrap(), 3);

        let page = repo.list_page(&tea, 2, 0).await.unwrap();
        assert_eq!(page.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page[0].price_after, None);
        assert_eq!(page[1].discount_value, Some(dec!(25)));
        assert_eq!(page[1].price_after, Some(dec!(7.50)));

        let page = repo.list_page(&tea, 2, 2).await.unwrap();
        assert_eq!(page.iter().map(|p| p.id).collect::<Vec<_>>(), vec![4]);
    }

    #[tokio::test]
    async fn lists_categories_once() {
        let repo = repo().await;
        let names = repo
            .categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Kitchen".to_string(), "Tea".to_string()]);
    }
}
