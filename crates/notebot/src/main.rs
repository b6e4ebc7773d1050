// notebot/crates/notebot/src/main.rs

use notebot::{config::Config, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let cfg = Config::from_env()?;

    println!("🚀 Starting notes bot");
    notebot::run(cfg).await
}
