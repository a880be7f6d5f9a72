use crate::cart;
use crate::control::{render_template, see_other, ControllerError, Identity, Response};
use crate::pagination::{page_count, page_links, PageLink, PaginationWindow};
use crate::session::ShopSession;
use crate::{empty_string_as_none, empty_string_as_none_parse, ITEMS_PER_PAGE};
use actix_session::Session;
use actix_web::get;
use actix_web::web::{Data, Path, Query};
use actix_web::HttpRequest;
use anyhow::Context;
use askama::Template;
use log_error::LogError;
use rt_types::access::Login;
use rt_types::cart::CartRepository;
use rt_types::product::{CategoryFilter, Product, ProductId, ProductListItem, ProductRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use url::form_urlencoded;

pub const SHOP_PATH: &str = "/shop";
pub const CART_PATH: &str = "/cart";

#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub page: Option<i64>,
}

pub struct UiCategory {
    pub name: String,
    pub url: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "shop.html")]
pub struct ShopPage {
    user: Option<Login>,
    products: Vec<ProductListItem>,
    categories: Vec<UiCategory>,
    category: String,
    page: usize,
    max_pages: usize,
    next: Option<String>,
    previous: Option<String>,
    page_links: Vec<PageLink>,
    query: String,
}

fn listing_url(filter: &CategoryFilter, page: usize) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(name) = filter.name() {
        serializer.append_pair("category", name);
    }
    if page > 1 {
        serializer.append_pair("page", &page.to_string());
    }
    let qs = serializer.finish();
    if qs.is_empty() {
        SHOP_PATH.to_string()
    } else {
        format!("{SHOP_PATH}?{qs}")
    }
}

#[get("/shop")]
pub async fn shop(
    req: HttpRequest,
    params: Query<ShopQuery>,
    user: Option<Identity>,
    products: Data<Arc<dyn ProductRepository>>,
) -> Response {
    let filter = CategoryFilter::parse(params.category.as_deref());
    let per_page = *ITEMS_PER_PAGE;
    let total_items = products.count_by(&filter).await?;
    let window = PaginationWindow::new(params.page.unwrap_or(1), page_count(total_items, per_page))?;
    let items = products
        .list_page(&filter, per_page, window.offset(per_page))
        .await?;
    log::debug!(
        "Listing {} of {total_items} products, page {}/{}",
        items.len(),
        window.page,
        window.total_pages
    );

    let mut categories = vec![UiCategory {
        name: CategoryFilter::ALL.to_string(),
        url: listing_url(&CategoryFilter::All, 1),
        selected: filter == CategoryFilter::All,
    }];
    categories.extend(products.categories().await?.into_iter().map(|c| {
        let f = CategoryFilter::Named(c.name.clone());
        UiCategory {
            url: listing_url(&f, 1),
            selected: f == filter,
            name: c.name,
        }
    }));

    render_template(ShopPage {
        user: user.map(|u| u.login),
        products: items,
        categories,
        category: filter.label().to_string(),
        page: window.page,
        max_pages: window.total_pages,
        next: window.next_page().map(|p| listing_url(&filter, p)),
        previous: window.previous_page().map(|p| listing_url(&filter, p)),
        page_links: page_links(&window, |p| listing_url(&filter, p)),
        query: req.query_string().to_string(),
    })
}

#[derive(Template)]
#[template(path = "product.html")]
pub struct ProductPage {
    user: Option<Login>,
    product: Product,
    recent: Vec<Product>,
}

#[get("/shop/product/{product_id}")]
pub async fn product(
    product_id: Path<ProductId>,
    session: Session,
    user: Option<Identity>,
    products: Data<Arc<dyn ProductRepository>>,
) -> Response {
    let product_id = product_id.into_inner();
    let product = products
        .get_one(&product_id)
        .await?
        .ok_or(ControllerError::NotFound)?;
    let history = ShopSession::new(&session).record_view(product_id)?;
    let mut recent = Vec::with_capacity(history.len());
    for id in history.ids().iter().filter(|id| **id != product_id) {
        if let Some(p) = products
            .get_one(id)
            .await
            .log_error("Unable to load recently viewed product")
            .flatten()
        {
            recent.push(p);
        }
    }
    render_template(ProductPage {
        user: user.map(|u| u.login),
        product,
        recent,
    })
}

/// Adds the product and goes to the cart page.
#[get("/shop/buy/{product_id}")]
pub async fn buy(
    product_id: Path<ProductId>,
    session: Session,
    user: Option<Identity>,
    products: Data<Arc<dyn ProductRepository>>,
    carts: Data<Arc<dyn CartRepository>>,
) -> Response {
    cart::add_to_cart(
        &session,
        user.as_ref().map(|u| &u.login),
        product_id.into_inner(),
        &**products.get_ref(),
        &**carts.get_ref(),
    )
    .await?;
    Ok(see_other(CART_PATH))
}

/// Adds the product and returns to the listing with the incoming query string.
#[get("/shop/add/{product_id}")]
pub async fn add(
    req: HttpRequest,
    product_id: Path<ProductId>,
    session: Session,
    user: Option<Identity>,
    products: Data<Arc<dyn ProductRepository>>,
    carts: Data<Arc<dyn CartRepository>>,
) -> Response {
    cart::add_to_cart(
        &session,
        user.as_ref().map(|u| &u.login),
        product_id.into_inner(),
        &**products.get_ref(),
        &**carts.get_ref(),
    )
    .await?;
    let qs = req.query_string();
    if qs.is_empty() {
        Ok(see_other(SHOP_PATH))
    } else {
        Ok(see_other(&format!("{SHOP_PATH}?{qs}")))
    }
}

pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub total: Decimal,
}

#[derive(Template)]
#[template(path = "cart.html")]
pub struct CartPage {
    user: Option<Login>,
    lines: Vec<CartLine>,
    total: Decimal,
}

#[get("/cart")]
pub async fn cart_page(
    session: Session,
    user: Option<Identity>,
    products: Data<Arc<dyn ProductRepository>>,
    carts: Data<Arc<dyn CartRepository>>,
) -> Response {
    let login = user.map(|u| u.login);
    let cart = cart::fill_cart_in_session(&session, login.as_ref(), &**carts.get_ref()).await?;
    let mut lines = Vec::with_capacity(cart.len());
    for (id, quantity) in cart.items() {
        match products
            .get_one(&id)
            .await
            .context("Unable to load cart product")?
        {
            Some(p) => lines.push(CartLine {
                total: p.price * Decimal::from(quantity),
                product: p,
                quantity,
            }),
            None => log::warn!("Product {id} from session cart not found"),
        }
    }
    let total: Decimal = lines.iter().map(|l| l.total).sum();
    render_template(CartPage {
        user: login,
        lines,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::repository::SqliteUserCredentialsRepository;
    use crate::catalog::SqliteProductRepository;
    use crate::cart::SqliteCartRepository;
    use crate::control::SessionMiddlewareFactory;
    use crate::session::LOGIN_KEY;
    use actix_session::storage::CookieSessionStore;
    use actix_session::SessionMiddleware;
    use actix_web::cookie::{Cookie, Key};
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App, HttpResponse};
    use rt_types::access::repository::UserCredentialsRepository;
    use rt_types::access::{Password, UserCredentials};
    use rt_types::product::{Category, Discount};
    use rust_decimal_macros::dec;
    use tokio_rusqlite::Connection;
    use typesafe_repository::async_ops::Save;

    async fn sign_in(login: Path<String>, session: Session) -> HttpResponse {
        session
            .insert(LOGIN_KEY, Login(login.into_inner()))
            .expect("session insert");
        HttpResponse::Ok().finish()
    }

    async fn users() -> Arc<dyn UserCredentialsRepository> {
        let users =
            SqliteUserCredentialsRepository::init(Connection::open_in_memory().await.unwrap())
                .await
                .unwrap();
        users
            .save(UserCredentials {
                login: Login("ann".to_string()),
                password: Password::from_encoded(String::new()),
            })
            .await
            .unwrap();
        Arc::new(users)
    }

    async fn repos() -> (Arc<dyn ProductRepository>, Arc<dyn CartRepository>) {
        let products = SqliteProductRepository::init(Connection::open_in_memory().await.unwrap())
            .await
            .unwrap();
        for id in 1..=12 {
            let category = if id % 2 == 0 { "Tea" } else { "Kitchen" };
            Save::<Category>::save(&products, Category { name: category.into() })
                .await
                .unwrap();
            Save::<Product>::save(
                &products,
                Product {
                    id,
                    name: format!("Product {id}"),
                    image: None,
                    category: Some(category.to_string()),
                    price: dec!(10),
                },
            )
            .await
            .unwrap();
        }
        Save::<Discount>::save(
            &products,
            Discount {
                product_id: 2,
                value: dec!(50),
            },
        )
        .await
        .unwrap();
        let carts = SqliteCartRepository::init(Connection::open_in_memory().await.unwrap())
            .await
            .unwrap();
        (Arc::new(products), Arc::new(carts))
    }

    macro_rules! test_app {
        ($products:expr, $carts:expr) => {{
            let users = users().await;
            test::init_service(
                App::new()
                    .wrap(SessionMiddlewareFactory {})
                    .wrap(
                        SessionMiddleware::builder(
                            CookieSessionStore::default(),
                            Key::from(&[7; 64]),
                        )
                        .cookie_secure(false)
                        .build(),
                    )
                    .app_data(Data::new($products.clone()))
                    .app_data(Data::new($carts.clone()))
                    .app_data(Data::new(users))
                    .route("/test/sign-in/{login}", web::get().to(sign_in))
                    .service(shop)
                    .service(product)
                    .service(buy)
                    .service(add)
                    .service(cart_page),
            )
            .await
        }};
    }

    fn session_cookie<B>(res: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
        res.response()
            .cookies()
            .next()
            .expect("session cookie")
            .into_owned()
    }

    fn location<B>(res: &actix_web::dev::ServiceResponse<B>) -> String {
        res.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[actix_web::test]
    async fn builds_listing_urls() {
        let tea = CategoryFilter::Named("Green tea".to_string());
        assert_eq!(listing_url(&CategoryFilter::All, 1), "/shop");
        assert_eq!(listing_url(&CategoryFilter::All, 3), "/shop?page=3");
        assert_eq!(listing_url(&tea, 2), "/shop?category=Green+tea&page=2");
    }

    #[actix_web::test]
    async fn lists_filtered_page() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get()
            .uri("/shop?category=Tea&page=2")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
        assert!(body.contains("Product 12"));
        assert!(!body.contains("Product 11"));
        assert!(!body.contains("Product 10"));
    }

    #[actix_web::test]
    async fn shows_discounted_price() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("5.00"));
    }

    #[actix_web::test]
    async fn out_of_range_page_renders_last_page() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop?page=99").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Product 11"));
        assert!(body.contains("Product 12"));
    }

    #[actix_web::test]
    async fn invalid_page_is_bad_request() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop?page=abc").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_product_is_not_found() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop/product/404").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn product_page_lists_recently_viewed() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop/product/3").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = session_cookie(&res);
        let req = test::TestRequest::get()
            .uri("/shop/product/4")
            .cookie(cookie)
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("/shop/product/3"));
    }

    #[actix_web::test]
    async fn buy_redirects_to_cart() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/shop/buy/5").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), CART_PATH);
        let cookie = session_cookie(&res);
        let req = test::TestRequest::get()
            .uri(CART_PATH)
            .cookie(cookie)
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Product 5"));
    }

    #[actix_web::test]
    async fn add_returns_to_listing_with_query() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get()
            .uri("/shop/add/6?category=Tea&page=2")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/shop?category=Tea&page=2");

        let req = test::TestRequest::get().uri("/shop/add/6").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(location(&res), SHOP_PATH);
    }

    #[actix_web::test]
    async fn signed_in_add_persists_cart_row() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get().uri("/test/sign-in/ann").to_request();
        let res = test::call_service(&app, req).await;
        let mut cookie = session_cookie(&res);
        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/shop/buy/8")
                .cookie(cookie.clone())
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER);
            cookie = session_cookie(&res);
        }
        let ann = Login("ann".to_string());
        let rows = carts.list_by_user(&ann).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 2);

        let req = test::TestRequest::get()
            .uri("/shop/buy/404")
            .cookie(cookie)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn unknown_session_login_is_anonymous() {
        let (products, carts) = repos().await;
        let app = test_app!(products, carts);
        let req = test::TestRequest::get()
            .uri("/test/sign-in/ghost")
            .to_request();
        let res = test::call_service(&app, req).await;
        let cookie = session_cookie(&res);
        let req = test::TestRequest::get()
            .uri("/shop/buy/1")
            .cookie(cookie)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), CART_PATH);
        let ghost = Login("ghost".to_string());
        assert!(carts.list_by_user(&ghost).await.unwrap().is_empty());

        let cookie = session_cookie(&res);
        let req = test::TestRequest::get()
            .uri(CART_PATH)
            .cookie(cookie)
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Product 1"));
        assert!(!body.contains("ghost"));
    }
}
