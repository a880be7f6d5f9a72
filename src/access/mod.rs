use anyhow::Context;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rt_types::access::repository::UserCredentialsRepository;
use rt_types::access::{generate_salt, Login, Password, UserCredentials};

pub mod controllers;
pub mod repository;

pub const ADMIN_LOGIN: &str = "admin";

/// Creates the admin account. An explicit password always overwrites the stored one,
/// without it a random one is generated only when the account does not exist yet.
pub async fn seed_admin(
    repo: &dyn UserCredentialsRepository,
    password: Option<String>,
) -> Result<(), anyhow::Error> {
    let login = Login(ADMIN_LOGIN.to_string());
    let password = match password {
        Some(p) => p,
        None => {
            if repo
                .get_one(&login)
                .await
                .context("Unable to get admin credentials")?
                .is_some()
            {
                return Ok(());
            }
            let p: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect();
            log::warn!("ADMIN_PASSWORD not set, generated password for {login}: {p}");
            p
        }
    };
    repo.save(UserCredentials {
        password: Password::generate(&password, generate_salt())?,
        login,
    })
    .await
    .context("Unable to save admin credentials")?;
    Ok(())
}
