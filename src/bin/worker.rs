#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = playpack_reports::run_worker().await {
        eprintln!("playpack-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
