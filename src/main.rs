#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trainhub::bootstrapper::run().await
}
