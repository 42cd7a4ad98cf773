use thiserror::Error;

use crate::Credentials;

#[derive(Debug, Error)]
pub enum GetDbCredsError {
    #[error("Invalid Connection Options")]
    InvalidConnectionOptions,
    #[error("Missing database credentials")]
    NoCredentials,
}

pub fn get_db_creds() -> Result<Credentials, GetDbCredsError> {
    let env_db_host = std::env::var("DB_HOST").ok();
    let env_db_name = std::env::var("DB_NAME").ok();
    let env_db_user = std::env::var("DB_USER").ok();
    let env_db_password = std::env::var("DB_PASSWORD").ok();

    if env_db_host.is_some() || env_db_name.is_some() || env_db_user.is_some() {
        Ok(Credentials::new(
            env_db_host.ok_or(GetDbCredsError::InvalidConnectionOptions)?,
            env_db_name.ok_or(GetDbCredsError::InvalidConnectionOptions)?,
            env_db_user.ok_or(GetDbCredsError::InvalidConnectionOptions)?,
            env_db_password,
        ))
    } else {
        Err(GetDbCredsError::NoCredentials)
    }
}
