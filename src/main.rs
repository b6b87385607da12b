#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = playpack_reports::run().await {
        eprintln!("playpack-reports fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
