use std::path::Path;

use tether_core::util::format_timestamp;

use crate::commands::common::open_engine;
use crate::error::CliError;

pub async fn run_login(token: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path, token).await?;
    let credential = engine.sign_in().await?;

    println!(
        "Signed in; credential expires {}",
        format_timestamp(credential.expires_at)
    );
    Ok(())
}
