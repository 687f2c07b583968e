use std::sync::Arc;
use std::time::Duration;

use media_url_guardian::config::GuardianConfig;
use media_url_guardian::postgres_store::PostgresStore;
use media_url_guardian::prober::ReqwestProber;
use media_url_guardian::redis_queue::RedisQueue;
use media_url_guardian::validator::UrlValidator;
use media_url_guardian::worker::Worker;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = GuardianConfig::from_env()?;

    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);
    store.ensure_schema().await?;

    let prober = ReqwestProber::new(
        Duration::from_millis(config.probe_timeout_ms),
        config.max_redirects as usize,
    )?;
    let validator = Arc::new(UrlValidator::new(prober));

    let queue = Arc::new(RedisQueue::new(&config.redis_url)?);

    let worker = Worker::new(store, validator, queue, config);
    worker.start().await?;
    info!("guardian-worker running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    worker.stop().await?;

    Ok(())
}
