//! Streaming a large result set with bounded memory.
//!
//! ```bash
//! FIREBOLT_CLIENT_ID=... FIREBOLT_CLIENT_SECRET=... FIREBOLT_ACCOUNT=... \
//!     FIREBOLT_ENGINE=... cargo run --example streaming
//! ```

use firebolt_client::{Auth, ConnectParams, connect};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_id = std::env::var("FIREBOLT_CLIENT_ID")?;
    let client_secret = std::env::var("FIREBOLT_CLIENT_SECRET")?;
    let account = std::env::var("FIREBOLT_ACCOUNT")?;
    let engine = std::env::var("FIREBOLT_ENGINE")?;

    let connection = connect(
        ConnectParams::new(Auth::client_credentials(client_id, client_secret))
            .with_account_name(account)
            .with_engine_name(engine),
    )
    .await?;

    let mut cursor = connection.cursor()?;
    // Rows decode incrementally from a JSON-Lines response; only one batch
    // is held in memory at a time.
    cursor
        .execute_stream("SELECT * FROM generate_series(1, 1000000)", None)
        .await?;

    let mut count = 0u64;
    while cursor.fetchone().await?.is_some() {
        count += 1;
        if count % 100_000 == 0 {
            println!("{count} rows so far");
        }
    }
    println!("streamed {count} rows, final row count {}", cursor.rowcount().await?);

    connection.close().await;
    Ok(())
}
