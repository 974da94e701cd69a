use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use flatfeed::core::{
    FeedSettings, PackageContent, PackageIdentity, PackageInput, PackageMetadata, RunContext,
};
use flatfeed::stats::FeedReport;
use flatfeed::storage::{FeedStore, LocalStorage};
use flatfeed::update;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flatfeed", version, about = "Static package feed on local storage")]
struct Cli {
    /// 配置文件路径（默认查找 ./flatfeed.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// feed 根目录，覆盖配置文件中的 root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[arg(long, global = true, overrides_with = "no_catalog")]
    catalog: bool,

    /// 使用 virtual catalog（不落盘）
    #[arg(long, global = true, overrides_with = "catalog")]
    no_catalog: bool,

    #[arg(long, global = true, overrides_with = "no_symbols")]
    symbols: bool,

    #[arg(long, global = true, overrides_with = "symbols")]
    no_symbols: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 创建空 feed
    Init,
    /// 添加一个包
    Push(PushArgs),
    /// 删除一个包
    Delete(DeleteArgs),
    /// 打印 feed 概况
    Stats,
}

#[derive(Args, Debug)]
struct PushArgs {
    file: PathBuf,
    #[arg(long)]
    id: String,
    #[arg(long)]
    version: String,
    /// 作为 symbols 包添加
    #[arg(long = "symbols-package")]
    symbols_package: bool,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    version: String,
    #[arg(long, conflicts_with = "package_only")]
    symbols_only: bool,
    #[arg(long)]
    package_only: bool,
}

/// 成对开关：后出现者优先（clap overrides_with），都没给时返回 None
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

async fn load_settings(cli: &Cli) -> anyhow::Result<FeedSettings> {
    let mut settings = FeedSettings::resolve(cli.config.as_deref())
        .await
        .context("Failed to load feed settings")?;

    if let Some(root) = &cli.root {
        settings.root = root.clone();
    }
    if let Some(v) = flag_pair(cli.catalog, cli.no_catalog) {
        settings.catalog_enabled = v;
    }
    if let Some(v) = flag_pair(cli.symbols, cli.no_symbols) {
        settings.symbols_enabled = v;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli).await?;
    info!(
        "flatfeed: root={:?} catalog={} symbols={}",
        settings.root, settings.catalog_enabled, settings.symbols_enabled
    );

    let backend = Arc::new(LocalStorage::new(settings.root.clone()));
    let ctx = RunContext::new(settings, FeedStore::new(backend));

    match cli.command {
        Command::Init => {
            update::init_feed(&ctx).await.context("Failed to initialize feed")?;
        }
        Command::Push(args) => {
            let bytes = tokio::fs::read(&args.file)
                .await
                .with_context(|| format!("Failed to read package {:?}", args.file))?;
            let identity = PackageIdentity::new(&args.id, &args.version);
            let metadata = PackageMetadata {
                description: args.description,
                ..PackageMetadata::default()
            };
            let content = PackageContent::new(bytes, metadata);
            let package = if args.symbols_package {
                PackageInput::symbols(identity, content)
            } else {
                PackageInput::new(identity, content)
            };

            update::fetch_feed(&ctx).await.context("Failed to fetch feed")?;
            update::add_package(&ctx, &package)
                .await
                .with_context(|| format!("Failed to add {}", package.identity))?;
        }
        Command::Delete(args) => {
            let identity = PackageIdentity::new(&args.id, &args.version);

            update::fetch_feed(&ctx).await.context("Failed to fetch feed")?;
            let result = if args.symbols_only {
                update::remove_symbols_package(&ctx, &identity).await
            } else if args.package_only {
                update::remove_non_symbols_package(&ctx, &identity).await
            } else {
                update::remove_package(&ctx, &identity).await
            };
            result.with_context(|| format!("Failed to remove {}", identity))?;
        }
        Command::Stats => {
            update::fetch_feed(&ctx).await.context("Failed to fetch feed")?;
            let report = FeedReport::collect(&ctx).await?;
            println!("{}", report);
        }
    }

    Ok(())
}
