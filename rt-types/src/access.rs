use argon2::{Variant, Version};
use derive_more::{Deref, Display};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;

pub mod repository;

pub const PASSWORD_LENGTH: u32 = 64;
pub const MIN_PASSWORD_LENGTH: usize = 5;
pub const DEFAULT_ARGON_CONFIG: argon2::Config = argon2::Config {
    variant: Variant::Argon2i,
    version: Version::Version13,
    mem_cost: 65535,
    time_cost: 10,
    lanes: 4,
    secret: &[],
    ad: &[],
    hash_length: PASSWORD_LENGTH,
};

#[cfg(not(test))]
const ARGON_CONFIG: argon2::Config = DEFAULT_ARGON_CONFIG;
#[cfg(test)]
const ARGON_CONFIG: argon2::Config = argon2::Config {
    mem_cost: 64,
    time_cost: 1,
    lanes: 1,
    ..DEFAULT_ARGON_CONFIG
};

pub type Salt = [u8; 512];

pub fn generate_salt() -> Salt {
    let mut salt = [0; 512];
    StdRng::from_entropy().fill_bytes(&mut salt);
    salt
}

#[derive(
    Deref, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
)]
pub struct Login(pub String);

#[derive(Id, Serialize, Deserialize, Debug, Clone)]
#[Id(ref_id, get_id)]
pub struct UserCredentials {
    #[id]
    pub login: Login,
    pub password: Password,
}

/// Argon2 encoded hash, salt included.
#[derive(Clone, Debug, Deref, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }
    pub fn generate(input: &str, salt: Salt) -> Result<Password, anyhow::Error> {
        if input.len() < MIN_PASSWORD_LENGTH {
            return Err(anyhow::anyhow!(
                "Password cannot be shorter than {MIN_PASSWORD_LENGTH}"
            ));
        }
        let encoded = argon2::hash_encoded(input.as_bytes(), &salt, &ARGON_CONFIG)?;
        Ok(Self(encoded))
    }
    pub fn check(&self, input: &str) -> Result<bool, anyhow::Error> {
        Ok(argon2::verify_encoded(&self.0, input.as_bytes())?)
    }
    pub fn encoded(&self) -> &String {
        &self.0
    }
}
