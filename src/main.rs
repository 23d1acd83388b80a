mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use clipvault::server;
use clipvault_av::{FfprobeProber, Probe, ToolRegistry};
use clipvault_core::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipvault=trace,clipvault_av=trace,clipvault_db=debug,tower_http=debug".to_string()
        } else {
            "clipvault=debug,clipvault_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load_or_default(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start(config)).map_err(Into::into)
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipvault {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require("ffprobe")?.path.clone();
    let info = FfprobeProber::new(ffprobe).probe(file).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "duration": info.duration,
                "width": info.width,
                "height": info.height,
                "fps": info.fps,
                "codec": info.codec,
            })
        );
    } else {
        println!("File: {}", file.display());
        let secs = info.duration as u64;
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        match (info.width, info.height) {
            (Some(w), Some(h)) => {
                print!("Video: {}x{h}", w);
                if let Some(codec) = &info.codec {
                    print!(" ({codec})");
                }
                if let Some(fps) = info.fps {
                    print!(", {fps:.3} fps");
                }
                println!();
            }
            _ => println!("Video: none (audio-only container)"),
        }
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_found = true;

    for info in tools.check_all() {
        if info.available {
            println!(
                "✓ {} — {} ({})",
                info.name,
                info.path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                info.version.as_deref().unwrap_or("unknown version"),
            );
        } else {
            println!("✗ {} — not found in PATH", info.name);
            all_found = false;
        }
    }

    if !all_found {
        anyhow::bail!("Some required tools are missing");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        println!("No config file specified; defaults are valid.");
        return Ok(());
    };

    let contents = std::fs::read_to_string(path)?;
    let config = Config::from_json(&contents)?;

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Config {} is valid.", path.display());
    } else {
        println!("Config {} parsed with warnings:", path.display());
        for w in &warnings {
            println!("  - {w}");
        }
    }
    Ok(())
}
