use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use stac_publish::config::BUCKET_ENV;
use stac_publish::{
    Item, ItemValidator, MemoryStore, ObjectStore, Payload, PublishTransaction, S3Store, Settings,
    UploadOptions,
};
use tracing::{error, info};

mod logging;

/// Publish the STAC Items of a pipeline payload to S3.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input payload: a FeatureCollection with a `process` definition
    #[arg(short, long)]
    payload: PathBuf,

    /// Where to write the updated payload (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with bucket/region/profile/endpoint_url settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target bucket [env: SWOOP_DATA_BUCKET]
    #[arg(long)]
    bucket: Option<String>,

    #[arg(long)]
    region: Option<String>,

    /// Named AWS profile to load credentials from
    #[arg(long)]
    profile: Option<String>,

    /// Custom S3 endpoint, e.g. a local minio
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Publish into an in-memory store instead of S3
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let file = match &self.config {
            Some(path) => Settings::read(path)
                .with_context(|| format!("Unable to read settings from {}", path.display()))?,
            None => Settings::default(),
        };
        let settings = Settings {
            bucket: self.bucket.clone().or(file.bucket),
            region: self.region.clone().or(file.region),
            profile: self.profile.clone().or(file.profile),
            endpoint_url: self.endpoint_url.clone().or(file.endpoint_url),
        };
        Ok(settings.with_env())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("publish: failed publishing output items ({err:#})");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = args.settings()?;
    let mut payload = Payload::read(&args.payload)
        .with_context(|| format!("Unable to read payload from {}", args.payload.display()))?;
    let options = payload.validate()?.upload_options()?;
    let bucket = settings.bucket.clone().ok_or_else(|| {
        anyhow!("No data bucket configured; pass --bucket, set it in the config file or set {BUCKET_ENV}")
    })?;

    let items = std::mem::take(&mut payload.features);
    info!(count = items.len(), %bucket, dry_run = args.dry_run, "Publishing items");
    payload.features = if args.dry_run {
        let store = MemoryStore::new();
        publish(&store, &bucket, settings.region(), options, items).await?
    } else {
        let store = S3Store::connect(&settings.client_options()).await;
        publish(&store, &bucket, settings.region(), options, items).await?
    };

    match &args.output {
        Some(path) => payload.write(path)?,
        None => println!("{}", payload.to_json()?),
    }
    Ok(())
}

async fn publish(
    store: &impl ObjectStore,
    bucket: &str,
    region: &str,
    options: UploadOptions,
    items: Vec<Item>,
) -> Result<Vec<Item>> {
    let validator = ItemValidator;
    let transaction =
        PublishTransaction::new(store, &validator, bucket, options)?.with_region(region);
    let published = transaction.publish(items).await?;
    Ok(published)
}
