use std::future::Future;
use std::time::Duration;

use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::db::connect;

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub interval: Duration,
    /// `None` keeps waiting until the database answers.
    pub max_attempts: Option<u32>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("Database still unavailable after {attempts} attempts: {last_error}")]
    GaveUp { attempts: u32, last_error: DbErr },
}

/// Runs `check` until it succeeds, sleeping `options.interval` between
/// failures. Returns the value produced by the successful check together with
/// the number of attempts it took.
pub async fn retry_until_ready<T, F, Fut>(
    mut check: F,
    options: &WaitOptions,
) -> Result<(T, u32), ReadinessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    info!("Waiting for database...");
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check().await {
            Ok(value) => {
                info!(attempts, "Database available!");
                return Ok((value, attempts));
            }
            Err(e) => {
                if options.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(ReadinessError::GaveUp {
                        attempts,
                        last_error: e,
                    });
                }
                warn!(
                    error = %e,
                    attempt = attempts,
                    "Database unavailable, waiting {:?}...",
                    options.interval
                );
                sleep(options.interval).await;
            }
        }
    }
}

/// Connects and pings, retrying until the database accepts connections.
pub async fn connect_when_ready(
    database_url: &str,
    max_connections: u32,
    options: &WaitOptions,
) -> Result<DatabaseConnection, ReadinessError> {
    let (db, _) = retry_until_ready(
        move || async move {
            let db = connect(database_url, max_connections).await?;
            db.ping().await?;
            Ok(db)
        },
        options,
    )
    .await?;

    Ok(db)
}
