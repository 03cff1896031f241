mod cli;

use vidladder::{config, probe, server};
use vidladder_progress::{ConversionProgress, OutputStream};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use probe::MediaProber;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting vidladder server");
    tracing::info!("Transcode script: {:?}", config.transcode.script);
    tracing::info!(
        "Uploads in {:?}, output in {:?}",
        config.paths.upload_dir,
        config.paths.output_dir
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidladder=trace,vidladder_progress=trace,tower_http=debug".to_string()
        } else {
            "vidladder=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::Replay { log, duration } => replay_log(&log, duration),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidladder {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_file(
    file: &std::path::Path,
    json: bool,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let prober = probe::FfprobeProber::new(config.tools.ffprobe);

    let rt = tokio::runtime::Runtime::new()?;
    let info = rt
        .block_on(prober.probe(file))
        .with_context(|| format!("Failed to probe {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File: {}", file.display());
        println!("Codec: {}", info.codec);
        println!("Resolution: {}x{}", info.width, info.height);
        match info.duration_secs {
            Some(secs) => {
                let whole = secs as u64;
                println!(
                    "Duration: {:02}:{:02}:{:02} ({:.2}s)",
                    whole / 3600,
                    (whole / 60) % 60,
                    whole % 60,
                    secs
                );
            }
            None => println!("Duration: unknown (progress will not be reported)"),
        }
        match info.bit_rate {
            Some(bps) => println!("Bitrate: {} Kbps", bps / 1024),
            None => println!("Bitrate: unknown"),
        }
    }

    Ok(())
}

fn replay_log(log: &std::path::Path, duration: f64) -> Result<()> {
    let raw = std::fs::read(log).with_context(|| format!("Failed to read log {:?}", log))?;
    let text = String::from_utf8_lossy(&raw);

    let mut tracker = ConversionProgress::new(duration);
    let mut emitted = 0usize;

    let lines = text
        .split(|c| c == '\r' || c == '\n')
        .map(str::trim)
        .filter(|l| !l.is_empty());

    for line in lines {
        for observation in tracker.observe_line(OutputStream::Stderr, line) {
            println!("{}", serde_json::to_string(&observation.into_event())?);
            emitted += 1;
        }
    }

    tracing::info!(
        "Replayed {:?}: {} events, final progress {}%",
        log,
        emitted,
        tracker.last_progress()
    );
    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = probe::check_tools(&config.transcode.shell, &config.tools.ffprobe);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    let script_status = if config.transcode.script.is_file() {
        "✓"
    } else {
        all_ok = false;
        "✗"
    };
    println!(
        "{} transcode script - {}",
        script_status,
        config.transcode.script.display()
    );

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Uploads will fail until they are installed.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            config::validate_config(&config)?;
            print_config_summary(&config);
        }
    }

    Ok(())
}

fn print_config_summary(config: &config::Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upload dir: {}", config.paths.upload_dir.display());
    println!("  Output dir: {}", config.paths.output_dir.display());
    println!(
        "  Transcoder: {} {}",
        config.transcode.shell,
        config.transcode.script.display()
    );
    println!(
        "  Max upload: {} MiB",
        config.transcode.max_upload_bytes / (1024 * 1024)
    );
}
