//! Basic connection and query example.
//!
//! ```bash
//! FIREBOLT_CLIENT_ID=... FIREBOLT_CLIENT_SECRET=... FIREBOLT_ACCOUNT=... \
//!     cargo run --example basic
//! ```

use firebolt_client::{Auth, ConnectParams, connect};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_id = std::env::var("FIREBOLT_CLIENT_ID")?;
    let client_secret = std::env::var("FIREBOLT_CLIENT_SECRET")?;
    let account = std::env::var("FIREBOLT_ACCOUNT")?;

    let connection = connect(
        ConnectParams::new(Auth::client_credentials(client_id, client_secret))
            .with_account_name(account),
    )
    .await?;

    let mut cursor = connection.cursor()?;
    cursor
        .execute(
            "SELECT table_name, number_of_rows FROM information_schema.tables LIMIT ?",
            Some(&[10.into()]),
        )
        .await?;

    if let Some(columns) = cursor.description().await? {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        println!("{}", names.join(" | "));
    }
    while let Some(row) = cursor.fetchone().await? {
        println!("{row:?}");
    }

    connection.close().await;
    Ok(())
}
