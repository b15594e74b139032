#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tiergate::run().await
}
