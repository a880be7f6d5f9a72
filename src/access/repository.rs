use crate::SqlWrapper;
use async_trait::async_trait;
use rt_types::access::repository::UserCredentialsRepository;
use rt_types::access::{Login, Password, UserCredentials};
use rusqlite::params;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::{IdentityOf, Repository};

pub struct SqliteUserCredentialsRepository {
    conn: Connection,
}

impl SqliteUserCredentialsRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS user_credentials (
                    login TEXT PRIMARY KEY,
                    password TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl Repository<UserCredentials> for SqliteUserCredentialsRepository {
    type Error = anyhow::Error;
}

impl TryFrom<&rusqlite::Row<'_>> for SqlWrapper<UserCredentials> {
    type Error = rusqlite::Error;

    fn try_from(r: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(SqlWrapper(UserCredentials {
            login: Login(r.get(0)?),
            password: Password::from_encoded(r.get(1)?),
        }))
    }
}

#[async_trait]
impl Get<UserCredentials> for SqliteUserCredentialsRepository {
    async fn get_one(
        &self,
        id: &IdentityOf<UserCredentials>,
    ) -> Result<Option<UserCredentials>, Self::Error> {
        let login = id.0.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT login, password FROM user_credentials WHERE login = ?1")?;
                let creds = stmt
                    .query_map(params![login], |row| {
                        SqlWrapper::<UserCredentials>::from_sql(row)
                    })?
                    .next()
                    .transpose()?;
                Ok(creds)
            })
            .await?)
    }
}

#[async_trait]
impl Save<UserCredentials> for SqliteUserCredentialsRepository {
    async fn save(&self, user: UserCredentials) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user_credentials (login, password) VALUES (?1, ?2)
                     ON CONFLICT(login) DO UPDATE SET password = ?2",
                    params![user.login.0, user.password.encoded()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

impl UserCredentialsRepository for SqliteUserCredentialsRepository {}
