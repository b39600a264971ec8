//! davisx daemon - ISS frame ingester
//!
//! This binary coordinates:
//! - Frame collection (serial device, UDP or simulator)
//! - Rolling windows and Weather Underground uploads
//! - Ten minute archive buckets in MySQL or in memory

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use davisx_archive::{ArchiveWriter, BucketStore, MemoryStore, MySqlBucketStore};
use davisx_core::{StationProcessor, Uploader};
use davisx_daemon::{DaemonConfig, DriverKind, Scheduler};
use davisx_db::DbClient;
use davisx_ingest::{
    create_frame_channel, pump_frames, SerialDriver, SimulatorDriver, StationDriver,
    UdpFrameDriver,
};
use davisx_sinks::{FsSink, WundergroundUploader};

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::load()?;
    davisx_obs::init("davisxd", config.log_json);

    info!("Starting davisx daemon");
    let archive = if config.database_url.is_some() {
        "mysql"
    } else {
        "memory"
    };
    info!(
        station = %config.station,
        driver = ?config.driver,
        archive,
        upload = config.upload.is_some(),
        "Loaded configuration"
    );

    let (store, db_client) = build_store(&config).await?;
    let writer = ArchiveWriter::new(store, config.retry.clone());

    let upload_settings = config
        .upload
        .as_ref()
        .map(|u| u.settings.clone())
        .unwrap_or_default();
    let processor = StationProcessor::new(&config.windows, config.rain_bucket_size, upload_settings);

    let (tx, rx) = create_frame_channel(config.queue_size);
    let mut scheduler = Scheduler::new(rx, processor, writer);

    if let Some(target) = &config.upload {
        let uploader = match &target.url {
            Some(url) => WundergroundUploader::with_endpoint(url)?,
            None => WundergroundUploader::new(target.realtime)?,
        };
        info!("Uploading to {}", uploader.endpoint());
        scheduler = scheduler.with_uploader(Arc::new(uploader) as Arc<dyn Uploader>);
    }
    if let Some(dir) = &config.fs_dir {
        let sink = FsSink::new(dir).context("Failed to open reading journal")?;
        info!("Journaling readings to {}", sink.path().display());
        scheduler = scheduler.with_sink(Box::new(sink));
    }

    let driver = build_driver(&config.driver);
    let source = tokio::spawn(pump_frames(driver, tx));

    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        shutdown.trigger();
    });

    info!("Daemon running - press Ctrl+C to stop");
    let stats = scheduler.run().await?;

    source.abort();
    match source.await {
        Ok(Err(e)) => warn!("Frame source ended with error: {}", e),
        Err(e) if e.is_panic() => error!("Frame source panicked"),
        _ => {}
    }

    if let Some(client) = db_client {
        client.close().await;
    }

    info!(
        frames = stats.frames,
        archived = stats.archived,
        "davisx daemon stopped"
    );
    Ok(())
}

async fn build_store(config: &DaemonConfig) -> Result<(Arc<dyn BucketStore>, Option<DbClient>)> {
    let Some(url) = &config.database_url else {
        warn!("No database configured, archive buckets are kept in memory");
        let store: Arc<dyn BucketStore> = Arc::new(MemoryStore::new());
        return Ok((store, None));
    };

    let db_client = DbClient::new(url)
        .await
        .context("Failed to connect to database")?;
    db_client.ping().await.context("Database ping failed")?;
    db_client
        .ensure_schema()
        .await
        .context("Failed to create archive table")?;
    info!("Database connection verified");

    let store: Arc<dyn BucketStore> =
        Arc::new(MySqlBucketStore::new(db_client.clone(), config.station.clone()));
    Ok((store, Some(db_client)))
}

fn build_driver(kind: &DriverKind) -> Box<dyn StationDriver> {
    match kind {
        DriverKind::Serial { device } => Box::new(SerialDriver::new(device.clone())),
        DriverKind::Udp { bind } => Box::new(UdpFrameDriver::new(*bind)),
        DriverKind::Simulator { interval_ms } => Box::new(SimulatorDriver::new(*interval_ms)),
    }
}
