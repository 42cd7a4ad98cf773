#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

use rowmap::Connection;
use thiserror::Error;

pub mod creds;

#[allow(unused)]
pub struct Credentials {
    host: String,
    name: String,
    user: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(host: String, name: String, user: String, password: Option<String>) -> Self {
        Self {
            host,
            name,
            user,
            password,
        }
    }
}

#[derive(Debug, Error)]
pub enum InitDbError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
    #[cfg(feature = "postgres-native-tls")]
    #[error(transparent)]
    NativeTls(#[from] native_tls::Error),
    #[error("Missing env var: {0}")]
    MissingEnvVar(String),
    #[error("Credentials are required")]
    CredentialsRequired,
}

/// Builds the [`Connection`] selected by this crate's feature set. The
/// connection itself stays unopened until `connect` is called on it.
pub fn init(
    #[allow(unused)] creds: Option<Credentials>,
) -> Result<Box<dyn Connection>, InitDbError> {
    if cfg!(all(feature = "postgres-native-tls", feature = "postgres")) {
        #[cfg(all(feature = "postgres-native-tls", feature = "postgres"))]
        return init_postgres_native_tls(creds.ok_or(InitDbError::CredentialsRequired)?);
        #[cfg(not(all(feature = "postgres-native-tls", feature = "postgres")))]
        panic!("Invalid database features")
    } else if cfg!(feature = "postgres") {
        #[cfg(feature = "postgres")]
        return init_postgres_no_tls(creds.ok_or(InitDbError::CredentialsRequired)?);
        #[cfg(not(feature = "postgres"))]
        panic!("Invalid database features")
    } else if cfg!(feature = "simulator") {
        #[cfg(feature = "simulator")]
        return Ok(init_simulator());
        #[cfg(not(feature = "simulator"))]
        panic!("Invalid database features")
    } else {
        panic!("Invalid database features")
    }
}

#[cfg(all(feature = "postgres-native-tls", feature = "postgres"))]
#[allow(unused)]
pub fn init_postgres_native_tls(
    creds: Credentials,
) -> Result<Box<dyn Connection>, InitDbError> {
    use postgres_native_tls::MakeTlsConnector;
    use rowmap::postgres::PostgresConnection;

    let mut config = tokio_postgres::Config::new();
    config
        .host(&creds.host)
        .dbname(&creds.name)
        .user(&creds.user);

    if let Some(db_password) = &creds.password {
        config.password(db_password);
    }

    let mut builder = native_tls::TlsConnector::builder();

    match creds.host.to_lowercase().as_str() {
        "localhost" | "127.0.0.1" | "0.0.0.0" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {}
    }

    let connector = MakeTlsConnector::new(builder.build()?);

    Ok(Box::new(PostgresConnection::new(config, connector)))
}

#[cfg(feature = "postgres")]
#[allow(unused)]
pub fn init_postgres_no_tls(creds: Credentials) -> Result<Box<dyn Connection>, InitDbError> {
    use rowmap::postgres::PostgresConnection;

    let mut config = tokio_postgres::Config::new();
    config
        .host(&creds.host)
        .dbname(&creds.name)
        .user(&creds.user);

    if let Some(db_password) = &creds.password {
        config.password(db_password);
    }

    Ok(Box::new(PostgresConnection::new(
        config,
        tokio_postgres::NoTls,
    )))
}

/// Builds a postgres [`Connection`] from a connection string held in the
/// `env_var_name` environment variable.
#[cfg(feature = "postgres")]
#[allow(unused)]
pub fn init_postgres_from_env(env_var_name: &str) -> Result<Box<dyn Connection>, InitDbError> {
    use rowmap::postgres::PostgresConnection;

    let connection_string = std::env::var(env_var_name)
        .map_err(|_| InitDbError::MissingEnvVar(env_var_name.to_string()))?;
    let config = connection_string.parse::<tokio_postgres::Config>()?;

    Ok(Box::new(PostgresConnection::new(
        config,
        tokio_postgres::NoTls,
    )))
}

#[cfg(feature = "simulator")]
pub fn init_simulator() -> Box<dyn Connection> {
    Box::new(rowmap::simulator::SimulatorConnection::new())
}
