pub mod discord;

use anyhow::Result;

use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    discord::run(config).await
}
