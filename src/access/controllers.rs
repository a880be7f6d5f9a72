use crate::cart::merge_persisted_cart;
use crate::control::shop::SHOP_PATH;
use crate::control::{render_template, see_other, Identity, Response};
use crate::session::LOGIN_KEY;
use actix_session::Session;
use actix_web::{
    get, post,
    web::{Data, Form, Query},
};
use anyhow::Context as AnyhowContext;
use askama::Template;
use log_error::LogError;
use rt_types::access::repository::UserCredentialsRepository;
use rt_types::access::Login;
use rt_types::cart::CartRepository;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginDto {
    pub login: Login,
    pub password: String,
}

#[post("/login")]
pub async fn log_in(
    form: Form<LoginDto>,
    session: Session,
    users: Data<Arc<dyn UserCredentialsRepository>>,
    carts: Data<Arc<dyn CartRepository>>,
) -> Response {
    let creds = users
        .get_one(&form.login)
        .await
        .context("Unable to get user credentials")?;
    let creds = match creds {
        Some(c) => c,
        None => {
            log::info!("Creds not found");
            return Ok(see_other("/login?invalid"));
        }
    };
    if creds
        .password
        .check(&form.password)
        .context("Unable to verify password")?
    {
        session
            .insert(LOGIN_KEY, &creds.login)
            .context("Unable to insert login into session")?;
        merge_persisted_cart(&session, &creds.login, &**carts.get_ref())
            .await
            .log_error("Unable to merge persisted cart");
        log::info!("{} logged in", creds.login);
        Ok(see_other(SHOP_PATH))
    } else {
        Ok(see_other("/login?invalid"))
    }
}

#[get("/logout")]
pub async fn log_out(session: Session) -> Response {
    session.clear();
    Ok(see_other("/login"))
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage {
    err: bool,
    user: Option<Login>,
}

#[derive(Deserialize)]
struct LoginQuery {
    invalid: Option<String>,
}

#[get("/login")]
pub async fn login_page(q: Query<LoginQuery>, user: Option<Identity>) -> Response {
    render_template(LoginPage {
        err: q.invalid.is_some(),
        user: user.map(|u| u.login),
    })
}
