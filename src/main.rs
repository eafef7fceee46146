#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_resync::run().await
}
