use crate::control::ControllerError;
use crate::session::{SessionState, ShopSession};
use crate::SqlWrapper;
use anyhow::Context;
use async_trait::async_trait;
use rt_types::access::Login;
use rt_types::cart::{CartEntry, CartRepository, SessionCart};
use rt_types::product::{ProductId, ProductRepository};
use rusqlite::params;
use tokio_rusqlite::Connection;

pub struct SqliteCartRepository {
    conn: Connection,
}

impl SqliteCartRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS cart (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    login TEXT NOT NULL,
                    product_id INTEGER NOT NULL,
                    quantity INTEGER NOT NULL DEFAULT 1,
                    UNIQUE(login, product_id)
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS cart_login_idx ON cart(login)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl TryFrom<&rusqlite::Row<'_>> for SqlWrapper<CartEntry> {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(SqlWrapper(CartEntry {
            user: Login(row.get(0)?),
            product_id: row.get(1)?,
            quantity: row.get(2)?,
        }))
    }
}

#[async_trait]
impl CartRepository for SqliteCartRepository {
    async fn find(
        &self,
        user: &Login,
        product_id: ProductId,
    ) -> anyhow::Result<Option<CartEntry>> {
        let login = user.0.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT login, product_id, quantity FROM cart
                     WHERE login = ?1 AND product_id = ?2",
                )?;
                let entry = stmt
                    .query_map(params![login, product_id], |row| {
                        SqlWrapper::<CartEntry>::from_sql(row)
                    })?
                    .next()
                    .transpose()?;
                Ok(entry)
            })
            .await?)
    }

    async fn save(&self, entry: CartEntry) -> anyhow::Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO cart (login, product_id, quantity) VALUES (?1, ?2, ?3)
                     ON CONFLICT(login, product_id) DO UPDATE SET quantity = ?3",
                    params![entry.user.0, entry.product_id, entry.quantity],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_by_user(&self, user: &Login) -> anyhow::Result<Vec<CartEntry>> {
        let login = user.0.clone();
        let SqlWrapper(items) = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT login, product_id, quantity FROM cart
                     WHERE login = ?1 ORDER BY product_id",
                )?;
                let items = stmt
                    .query_map(params![login], |row| SqlWrapper::<CartEntry>::from_sql(row))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SqlWrapper(items))
            })
            .await?;
        Ok(items)
    }
}

/// Adds one unit to the session cart and, for a signed in user, to the persisted row.
///
/// The session is written first and is not rolled back when the persisted write fails.
/// The row update is read-increment-save without locking, so concurrent adds of the same
/// product by the same user may lose an increment.
pub async fn add_to_cart<S: SessionState>(
    session: &S,
    user: Option<&Login>,
    product_id: ProductId,
    products: &dyn ProductRepository,
    carts: &dyn CartRepository,
) -> Result<SessionCart, ControllerError> {
    fill_cart_in_session(session, user, carts).await?;
    let cart = ShopSession::new(session).add_to_cart(product_id)?;

    if let Some(user) = user {
        products
            .get_one(&product_id)
            .await
            .context("Unable to get product")?
            .ok_or(ControllerError::NotFound)?;
        let entry = match carts
            .find(user, product_id)
            .await
            .context("Unable to find cart entry")?
        {
            Some(mut entry) => {
                entry.quantity += 1;
                entry
            }
            None => CartEntry::new(user.clone(), product_id),
        };
        log::info!(
            "Cart of {user}: product {product_id} quantity {}",
            entry.quantity
        );
        carts.save(entry).await.context("Unable to save cart entry")?;
    }
    Ok(cart)
}

/// Session cart, seeded from the persisted rows when a signed in user has none yet.
pub async fn fill_cart_in_session<S: SessionState>(
    session: &S,
    user: Option<&Login>,
    carts: &dyn CartRepository,
) -> Result<SessionCart, anyhow::Error> {
    let shop = ShopSession::new(session);
    match (shop.stored_cart()?, user) {
        (Some(cart), _) => Ok(cart),
        (None, Some(user)) => {
            let mut cart = SessionCart::default();
            for entry in carts.list_by_user(user).await? {
                cart.merge_entry(&entry);
            }
            shop.store_cart(&cart)?;
            Ok(cart)
        }
        (None, None) => Ok(SessionCart::default()),
    }
}

/// Merges persisted rows into the session cart after login. The store is left as is.
pub async fn merge_persisted_cart<S: SessionState>(
    session: &S,
    user: &Login,
    carts: &dyn CartRepository,
) -> Result<SessionCart, anyhow::Error> {
    let shop = ShopSession::new(session);
    let mut cart = shop.cart()?;
    let entries = carts.list_by_user(user).await?;
    log::debug!("Merging {} persisted cart entries of {user}", entries.len());
    for entry in &entries {
        cart.merge_entry(entry);
    }
    shop.store_cart(&cart)?;
    Ok(cart)
}
