//! PostgreSQL connection helper.
//!
//! tokio-postgres splits a session into a `Client` and a background
//! `Connection` that must be polled for the client to make progress; this
//! module owns that mechanics so callers just get a client. One connection is
//! opened per run and dropped with the client.

use tokio_postgres::{Client, NoTls};
use tracing::error;

use crate::config::Dsn;
use crate::error::Result;

/// Connect to the given DSN and spawn the connection driver task.
pub async fn connect(dsn: &Dsn) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(&dsn.conn_string(), NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "postgres connection terminated with error");
        }
    });

    Ok(client)
}
