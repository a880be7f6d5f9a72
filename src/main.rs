use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::middleware::TrailingSlash;
use actix_web::{web, web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use rand::{distributions, Rng};
use rt_shop::access::{self, repository::SqliteUserCredentialsRepository};
use rt_shop::cart::SqliteCartRepository;
use rt_shop::catalog::SqliteProductRepository;
use rt_shop::{control, import_catalog, BIND_ADDR, DATABASE_PATH, PORT};
use rt_types::access::repository::UserCredentialsRepository;
use rt_types::cart::CartRepository;
use rt_types::product::ProductRepository;
use std::env;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_rusqlite::Connection;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    if let Some(dir) = Path::new(DATABASE_PATH.as_str()).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Unable to create {}", dir.display()))?;
        }
    }

    // One connection per repository, all on the same database file
    let product_repository: Arc<dyn ProductRepository> = Arc::new(
        SqliteProductRepository::init(Connection::open(DATABASE_PATH.as_str()).await?).await?,
    );
    let cart_repository: Arc<dyn CartRepository> = Arc::new(
        SqliteCartRepository::init(Connection::open(DATABASE_PATH.as_str()).await?).await?,
    );
    let user_credentials_repository: Arc<dyn UserCredentialsRepository> = Arc::new(
        SqliteUserCredentialsRepository::init(Connection::open(DATABASE_PATH.as_str()).await?)
            .await?,
    );

    access::seed_admin(
        user_credentials_repository.as_ref(),
        envmnt::get_parse("ADMIN_PASSWORD").ok(),
    )
    .await?;

    if let Ok(catalog_file) = envmnt::get_parse::<_, String, _>("CATALOG_FILE") {
        import_catalog(Path::new(&catalog_file), product_repository.clone())
            .await
            .with_context(|| format!("Unable to import catalog from {catalog_file}"))?;
    }

    let secret_key = match envmnt::get_parse("SESSION_KEY") {
        Ok(v) => v,
        Err(envmnt::errors::EnvmntError::Missing(_)) => {
            let key = rand::thread_rng()
                .sample_iter(distributions::Alphanumeric)
                .take(64)
                .map(char::from)
                .collect::<String>();
            let mut f = std::fs::File::options().append(true).open(".env")?;
            f.write_all(format!("\nSESSION_KEY={key}\n").as_bytes())?;
            key
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to read secret key: {err}"));
        }
    };
    let secret_key = Key::from(secret_key.as_bytes());

    log::info!("Listening on {}:{}", *BIND_ADDR, *PORT);
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Compress::default())
            .wrap(control::SessionMiddlewareFactory {})
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .wrap(actix_web::middleware::NormalizePath::new(
                TrailingSlash::Trim,
            ))
            .app_data(Data::new(product_repository.clone()))
            .app_data(Data::new(cart_repository.clone()))
            .app_data(Data::new(user_credentials_repository.clone()))
            .service(actix_files::Files::new("/static", "static"))
            .service(control::index)
            .service(control::shop::shop)
            .service(control::shop::product)
            .service(control::shop::buy)
            .service(control::shop::add)
            .service(control::shop::cart_page)
            .service(access::controllers::login_page)
            .service(access::controllers::log_in)
            .service(access::controllers::log_out)
            .default_service(web::route().to(control::not_found))
    })
    .bind((BIND_ADDR.as_str(), *PORT))
    .with_context(|| format!("Failed to bind server to {}:{}", *BIND_ADDR, *PORT))?
    .run()
    .await?;
    Ok(())
}
