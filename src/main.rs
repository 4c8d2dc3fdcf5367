//! tileview - headless slippy-map tile engine.
//!
//! This binary fills a viewport from a tile server and reports the result.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tileview::{
    config::{resolve_server, CheckConfig, Cli, Command, ViewConfig},
    source::{self, SourceSettings},
    AssetBundle, ImageCanvas, MapOptions, MapView,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::View(config) => run_view(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// View Command
// =============================================================================

async fn run_view(config: ViewConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let servers = match config.servers() {
        Ok(servers) => servers,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Tile server: {}", servers[0]);
    for backup in &servers[1..] {
        info!("  Backup: {}", backup);
    }
    info!(
        "  Viewport: {}x{} at ({}, {}), zoom {}",
        config.width, config.height, config.lat, config.lon, config.zoom
    );

    let mut options = MapOptions::from(&config);
    if let Some(ref dir) = config.assets {
        match AssetBundle::load_dir(dir).await {
            Ok(bundle) => {
                info!("  Assets: {} file(s) from {}", bundle.len(), dir.display());
                options.bundle = Some(Arc::new(bundle));
            }
            Err(e) => {
                error!("Failed to load assets from {}: {}", dir.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut map = MapView::new(options);

    if let Err(e) = map.set_tile_servers(servers).await {
        error!("No tile server reachable: {}", e);
        return ExitCode::FAILURE;
    }

    let deadline = tokio::time::Instant::now() + config.deadline();
    if !map.run_until_idle(deadline).await {
        warn!(
            "Viewport not complete after {}ms, reporting what arrived",
            config.deadline_ms
        );
    }

    let stats = map.stats();
    info!(
        "Active server: {} ({} px tiles, {} cached)",
        map.tile_server(),
        map.tile_size(),
        stats.cached
    );

    let tiles = map.visible_tiles();
    if config.json {
        let entries: Vec<_> = tiles
            .iter()
            .map(|t| {
                serde_json::json!({
                    "tile": t.address,
                    "rect": t.rect,
                })
            })
            .collect();
        let report = serde_json::json!({
            "server": map.tile_server(),
            "center": map.center(),
            "zoom": map.zoom_level(),
            "tile_size": map.tile_size(),
            "stats": stats,
            "tiles": entries,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for tile in &tiles {
            println!(
                "{}\t{:.1}\t{:.1}\t{:.1}x{:.1}",
                tile.address, tile.rect.x, tile.rect.y, tile.rect.width, tile.rect.height
            );
        }
    }

    if let Some(ref path) = config.output {
        let mut canvas = ImageCanvas::new(map.size());
        let drawn = map.render(&mut canvas);
        if let Err(e) = canvas.into_image().save(path) {
            error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Rendered {} tile(s) to {}", drawn, path.display());
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tileview=debug"
    } else {
        "tileview=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    let server = match resolve_server(&config.server) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = SourceSettings {
        timeout: config.timeout(),
        ..SourceSettings::default()
    };
    let result = source::connect(&server, &settings).await;

    if config.json {
        let json = match &result {
            Ok((_, report)) => serde_json::json!({
                "server": server,
                "reachable": true,
                "tile_size": report.tile_size,
            }),
            Err(e) => serde_json::json!({
                "server": server,
                "reachable": false,
                "error": e.to_string(),
            }),
        };
        match serde_json::to_string_pretty(&json) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return if result.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    println!("tileview Tile Server Check");
    println!("══════════════════════════");
    println!();
    println!("✓ Kind: {}", server.kind());
    println!("✓ Template: {}", server.template());
    println!();
    print!("Probing tile 0/0/0... ");

    match result {
        Ok((_, report)) => {
            println!("✓ success");
            println!("  Tile size: {} px", report.tile_size);
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The template contains {{x}}, {{y}} and {{z}}");
            println!("  - The server is reachable and serves tile 0/0/0");
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("══════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
