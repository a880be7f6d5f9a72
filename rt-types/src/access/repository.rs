use crate::access::UserCredentials;
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::Repository;

pub trait UserCredentialsRepository:
    Repository<UserCredentials, Error = anyhow::Error>
    + Get<UserCredentials>
    + Save<UserCredentials>
    + Send
    + Sync
{
}
