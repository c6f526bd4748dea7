#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lab_samples::run_server().await
}
