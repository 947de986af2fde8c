use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    nutrikid_cli::main_entry().await
}
