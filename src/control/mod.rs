use crate::pagination::PaginationError;
use crate::session::LOGIN_KEY;
use actix_session::Session;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    get,
    http::header::ContentType,
    web::Data,
    FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use anyhow::anyhow;
use askama::Template;
use derive_more::{Display, Error};
use futures::future::{ready, LocalBoxFuture, Ready};
use log_error::LogError;
use rt_types::access::repository::UserCredentialsRepository;
use rt_types::access::Login;
use std::sync::Arc;

pub mod shop;

pub type Response = Result<HttpResponse, ControllerError>;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    NotFound,
    Unauthorized,
    #[error(ignore)]
    InternalServerError(anyhow::Error),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl From<PaginationError> for ControllerError {
    fn from(err: PaginationError) -> Self {
        Self::InternalServerError(anyhow!(err))
    }
}

impl actix_web::error::ResponseError for ControllerError {
    fn error_response(&self) -> HttpResponse {
        log::warn!("{self:?}\n");
        use ControllerError::*;
        match self {
            NotFound => NotFoundPage { user: None }
                .render()
                .log_error("Unable to render error template")
                .map(|res| {
                    HttpResponse::NotFound()
                        .content_type(ContentType::html())
                        .body(res)
                })
                .unwrap_or_else(|| HttpResponse::NotFound().body(())),
            Unauthorized => HttpResponse::SeeOther()
                .insert_header(("Location", "/login"))
                .body(()),
            InternalServerError(err) => InternalServerErrorPage {
                error: format!("{err:?}"),
                user: None,
            }
            .render()
            .log_error("Unable to render error template")
            .map(|res| {
                HttpResponse::InternalServerError()
                    .content_type(ContentType::html())
                    .body(res)
            })
            .unwrap_or_else(|| HttpResponse::InternalServerError().body(err.to_string())),
        }
    }
}

#[derive(Template)]
#[template(path = "500.html")]
pub struct InternalServerErrorPage {
    error: String,
    user: Option<Login>,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundPage {
    user: Option<Login>,
}

pub async fn not_found(user: Option<Identity>) -> Response {
    let page = NotFoundPage {
        user: user.map(|u| u.login),
    }
    .render()
    .map_err(|x| ControllerError::InternalServerError(anyhow!(x)))?;
    Ok(HttpResponse::NotFound()
        .content_type(ContentType::html())
        .body(page))
}

#[get("/")]
pub async fn index() -> Response {
    Ok(see_other("/shop"))
}

/// Signed in principal. [`SessionMiddleware`] sets it only for logins that still have credentials.
#[derive(Clone, Debug)]
pub struct Identity {
    pub login: Login,
}

impl FromRequest for Identity {
    type Error = ControllerError;
    type Future = Ready<Result<Self, Self::Error>>;

    #[inline]
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Identity>()
                .cloned()
                .ok_or(ControllerError::Unauthorized),
        )
    }
}

pub struct SessionMiddlewareFactory {}

impl<S, B: 'static> Transform<S, ServiceRequest> for SessionMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = SessionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddleware {
            service: Arc::new(service),
        }))
    }
}

pub struct SessionMiddleware<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        Box::pin(async move {
            let session = req.extract::<Session>().await?;
            let login = match session.get::<Login>(LOGIN_KEY) {
                Ok(login) => login,
                Err(err) => {
                    log::error!("Unable to extract login from session:\n{err:?}");
                    None
                }
            };
            if let Some(login) = login {
                let users = req
                    .app_data::<Data<Arc<dyn UserCredentialsRepository>>>()
                    .cloned();
                match users {
                    Some(users) => match users.get_one(&login).await {
                        Ok(Some(creds)) => {
                            req.extensions_mut().insert(Identity { login: creds.login });
                        }
                        Ok(None) => {
                            log::warn!("Session login {login} has no credentials, dropping it");
                            session.remove(LOGIN_KEY);
                        }
                        Err(err) => {
                            log::error!("Unable to get credentials of {login}:\n{err:?}");
                        }
                    },
                    None => log::error!("UserCredentialsRepository is not registered"),
                }
            }
            let res = service.call(req).await?;
            Ok(res)
        })
    }
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

pub fn render_template(t: impl Template) -> Result<HttpResponse, ControllerError> {
    let result = t
        .render()
        .map_err(|x| ControllerError::InternalServerError(anyhow!(x)))?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn index_redirects_to_shop() {
        let app = test::init_service(
            App::new()
                .service(index)
                .default_service(web::route().to(not_found)),
        )
        .await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/shop");

        let req = test::TestRequest::get().uri("/missing").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    fn status_of(err: ControllerError) -> StatusCode {
        actix_web::ResponseError::error_response(&err).status()
    }

    #[actix_web::test]
    async fn maps_errors_to_status() {
        assert_eq!(status_of(ControllerError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ControllerError::Unauthorized), StatusCode::SEE_OTHER);
        assert_eq!(
            status_of(ControllerError::from(PaginationError::NoPages)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
