use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};

use hue::color::Argb;
use pauselight::bridge::{self, BridgeClient, PairOutcome};
use pauselight::config::{self, AppConfig, BridgeConnection};
use pauselight::error::{ApiError, ApiResult};
use pauselight::model::{AutomationConfig, ColorMode, GroupKind, LightGroupCatalog};
use pauselight::preview::PreviewEngine;
use pauselight::selection;
use pauselight::sync::{SettingsStore, SyncChannel};

#[derive(Parser)]
#[command(name = "pauselight", version, about = "Hue bridge companion for break-time lighting")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find Hue bridges on the local network
    Discover,
    /// Register with a bridge (press its link button when prompted)
    Pair { ip: String },
    /// List the bridge's lights, marking selected ones
    Lights,
    /// List the bridge's rooms and zones, marking selected ones
    Groups,
    /// Print the current automation settings
    Show,
    /// Select a light (or deselect with --off)
    SelectLight {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Select a room or zone and its lights (or deselect with --off)
    SelectGroup {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Change brightness, color, or color temperature settings
    Set {
        /// Brightness percent, 0-100
        #[arg(long)]
        brightness: Option<u8>,
        /// Color as hex RRGGBB or AARRGGBB; implies custom-color mode
        #[arg(long)]
        color: Option<String>,
        /// Color temperature in mired; implies custom-white mode
        #[arg(long)]
        mired: Option<u16>,
        #[arg(long)]
        mode: Option<ModeArg>,
    },
    /// Apply the draft settings to the real lights, hold, then restore
    Preview,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Scene,
    CustomColor,
    CustomWhite,
}

impl From<ModeArg> for ColorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Scene => Self::Scene,
            ModeArg::CustomColor => Self::CustomColor,
            ModeArg::CustomWhite => Self::CustomWhite,
        }
    }
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &["info", "reqwest=warn", "hyper=warn"];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    Ok(pretty_env_logger::formatted_timed_builder()
        .parse_filters(&log_filters)
        .try_init()?)
}

fn connected_client(config: &AppConfig) -> ApiResult<BridgeClient> {
    let conn = config.bridge.connection().ok_or(ApiError::NotConfigured)?;
    BridgeClient::new(conn)
}

fn settings_store(config: &AppConfig) -> SettingsStore {
    SettingsStore::new(config.pauselight.settings_file.clone())
}

async fn fresh_catalog(client: &BridgeClient) -> ApiResult<LightGroupCatalog> {
    let mut catalog = LightGroupCatalog::new();
    catalog.refresh(client).await?;
    Ok(catalog)
}

async fn cmd_discover() -> ApiResult<()> {
    let bridges = bridge::discover().await?;
    if bridges.is_empty() {
        println!("No bridges found.");
        return Ok(());
    }
    for bridge in bridges {
        println!("{:<16} {:<34} {}", bridge.ip, bridge.id, bridge.name);
    }
    Ok(())
}

async fn cmd_pair(config_file: &Utf8Path, config: &AppConfig, ip: &str) -> ApiResult<()> {
    println!("Press the link button on the bridge at {ip}...");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let outcome = bridge::pair_with_retry(
        || bridge::pair_once(&http, ip),
        config.preview.pair_attempts,
        Duration::from_millis(config.preview.pair_delay_ms),
    )
    .await;

    match outcome {
        PairOutcome::Paired(username) => {
            let conn = BridgeConnection {
                ip: ip.to_string(),
                username,
            };
            config::store_bridge(config_file, &conn)?;
            println!("Paired with bridge {ip}; connection saved to {config_file}");
            Ok(())
        }
        PairOutcome::LinkButtonNotPressed | PairOutcome::Failed => Err(ApiError::PairingFailed),
    }
}

async fn cmd_lights(config: &AppConfig) -> ApiResult<()> {
    let client = connected_client(config)?;
    let catalog = fresh_catalog(&client).await?;
    let settings = settings_store(config).load().await?;

    for light in catalog.lights() {
        let mark = if settings.light_ids.contains(&light.id) {
            '*'
        } else {
            ' '
        };
        let state = if light.on {
            format!("on {:>3}%", light.brightness_percent)
        } else {
            "off".to_string()
        };
        println!("{mark} {:>3}  {:<24} {state}", light.id, light.name);
    }
    Ok(())
}

async fn cmd_groups(config: &AppConfig) -> ApiResult<()> {
    let client = connected_client(config)?;
    let catalog = fresh_catalog(&client).await?;
    let settings = settings_store(config).load().await?;

    // '*' for an explicitly selected group, '+' for one merely containing
    // selected lights
    let checked = selection::checked_groups(&catalog, &settings.light_ids);

    for group in catalog.groups() {
        let mark = if settings.group_ids.contains(&group.id) {
            '*'
        } else if checked.contains(&group.id) {
            '+'
        } else {
            ' '
        };
        let kind = match group.kind {
            GroupKind::Room => "room",
            GroupKind::Zone => "zone",
        };
        println!(
            "{mark} {:>3}  {:<24} {kind}  {} light(s)",
            group.id,
            group.name,
            group.member_light_ids.len()
        );
    }
    Ok(())
}

async fn cmd_show(config: &AppConfig) -> ApiResult<()> {
    let settings = settings_store(config).load().await?;
    print!("{}", serde_yml::to_string(&settings)?);
    Ok(())
}

async fn cmd_select(
    config: &AppConfig,
    id: &str,
    selected: bool,
    is_group: bool,
) -> ApiResult<()> {
    let client = connected_client(config)?;
    let catalog = fresh_catalog(&client).await?;

    let channel = SyncChannel::start(settings_store(config)).await?;
    channel.update(|settings| {
        if is_group {
            selection::toggle_group(settings, &catalog, id, selected);
        } else {
            selection::toggle_light(settings, &catalog, id, selected);
        }
    });
    let settings = channel.current();
    channel.shutdown().await?;

    println!(
        "Selection now covers {} light(s), {} explicit group(s)",
        settings.light_ids.len(),
        settings.group_ids.len()
    );
    Ok(())
}

async fn cmd_set(
    config: &AppConfig,
    brightness: Option<u8>,
    color: Option<String>,
    mired: Option<u16>,
    mode: Option<ModeArg>,
) -> ApiResult<()> {
    let color = color
        .map(|hex| Argb::from_hex(&hex).ok_or(ApiError::InvalidColor(hex)))
        .transpose()?;

    let channel = SyncChannel::start(settings_store(config)).await?;
    channel.update(|settings| {
        if let Some(percent) = brightness {
            settings.brightness_percent = percent.min(100);
        }
        if let Some(argb) = color {
            settings.color_argb = argb;
            settings.color_mode = ColorMode::CustomColor;
        }
        if let Some(mired) = mired {
            settings.color_temperature_mired = mired;
            settings.color_mode = ColorMode::CustomWhite;
        }
        if let Some(mode) = mode {
            settings.color_mode = mode.into();
        }
    });
    channel.shutdown().await?;
    Ok(())
}

async fn cmd_preview(config: &AppConfig) -> ApiResult<()> {
    let client = connected_client(config)?;
    let catalog = fresh_catalog(&client).await?;
    let settings: AutomationConfig = settings_store(config).load().await?;

    let engine = Arc::new(PreviewEngine::new(
        client,
        Duration::from_secs(config.preview.dwell_secs),
    ));

    let mut stage = engine.stage();
    let stage_logger = tokio::spawn(async move {
        while stage.changed().await.is_ok() {
            log::info!("Preview stage: {:?}", *stage.borrow());
        }
    });

    // The preview runs on its own task so an interrupt cannot strand lights
    // in the held state: Ctrl-C waits for the restore to finish.
    let mut preview = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_preview(&settings, &catalog).await }
    });

    let report = tokio::select! {
        report = &mut preview => report??,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted; waiting for lights to be restored..");
            preview.await??
        }
    };
    stage_logger.abort();

    println!(
        "Previewed {} light(s); {} write(s) failed",
        report.affected, report.failed_writes
    );
    Ok(())
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let cli = Cli::parse();
    let config = config::parse(&cli.config)?;
    log::debug!("Configuration loaded from {}", cli.config);

    match cli.command {
        Command::Discover => cmd_discover().await,
        Command::Pair { ip } => cmd_pair(&cli.config, &config, &ip).await,
        Command::Lights => cmd_lights(&config).await,
        Command::Groups => cmd_groups(&config).await,
        Command::Show => cmd_show(&config).await,
        Command::SelectLight { id, off } => cmd_select(&config, &id, !off, false).await,
        Command::SelectGroup { id, off } => cmd_select(&config, &id, !off, true).await,
        Command::Set {
            brightness,
            color,
            mired,
            mode,
        } => cmd_set(&config, brightness, color, mired, mode).await,
        Command::Preview => cmd_preview(&config).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("pauselight error: {err}");
        std::process::exit(1);
    }
}
