#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = homework_store::run().await {
        eprintln!("homework-store fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
