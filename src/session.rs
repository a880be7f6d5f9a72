use anyhow::Context;
use rt_types::cart::SessionCart;
use rt_types::history::ViewHistory;
use rt_types::product::ProductId;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const HISTORY_KEY: &str = "history";
pub const CART_KEY: &str = "cart";
pub const LOGIN_KEY: &str = "login";

/// Key/value storage scoped to one visitor session.
pub trait SessionState {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error>;
    fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), anyhow::Error>;
}

impl SessionState for actix_session::Session {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error> {
        actix_session::Session::get(self, key)
            .with_context(|| format!("Unable to read {key} from session"))
    }

    fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), anyhow::Error> {
        actix_session::Session::insert(self, key, value)
            .with_context(|| format!("Unable to insert {key} into session"))
    }
}

/// View history and cart of one session.
pub struct ShopSession<'a, S: SessionState> {
    session: &'a S,
}

impl<'a, S: SessionState> ShopSession<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    pub fn history(&self) -> Result<ViewHistory, anyhow::Error> {
        Ok(self.session.get(HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn record_view(&self, product_id: ProductId) -> Result<ViewHistory, anyhow::Error> {
        let mut history = self.history()?;
        history.record(product_id);
        self.session.insert(HISTORY_KEY, &history)?;
        Ok(history)
    }

    /// `None` until the first add.
    pub fn stored_cart(&self) -> Result<Option<SessionCart>, anyhow::Error> {
        self.session.get(CART_KEY)
    }

    pub fn cart(&self) -> Result<SessionCart, anyhow::Error> {
        Ok(self.stored_cart()?.unwrap_or_default())
    }

    pub fn store_cart(&self, cart: &SessionCart) -> Result<(), anyhow::Error> {
        self.session.insert(CART_KEY, cart)
    }

    pub fn add_to_cart(&self, product_id: ProductId) -> Result<SessionCart, anyhow::Error> {
        let mut cart = self.cart()?;
        let quantity = cart.add(product_id);
        log::debug!("Session cart: product {product_id} quantity {quantity}");
        self.store_cart(&cart)?;
        Ok(cart)
    }
}
