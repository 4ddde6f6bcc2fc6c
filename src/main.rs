//! Jazmin - a virtual personality in your terminal
//!
//! Type to talk to her. Ignore her and she will let you know.

use anyhow::Result;
use clap::Parser;
use jazmin::ambience::run_ambience;
use jazmin::app::Jazmin;
use jazmin::audio::SoundEngine;
use jazmin::chat::openai::OpenAiChat;
use jazmin::chat::ChatBackend;
use jazmin::config::Config;
use jazmin::optimizer::Optimizer;
use jazmin::output::OutputArea;
use jazmin::reactions::ProcessExit;
use jazmin::session::{self, LoginNag, NagTiming};
use jazmin::tts::{self, Speaker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Skip the name prompt
    #[arg(short, long)]
    name: Option<String>,

    /// Start with speech muted
    #[arg(short, long)]
    muted: bool,

    /// Speech engine: voicemaker, system or silent
    #[arg(long)]
    tts: Option<String>,

    /// Disable ambient murmurs
    #[arg(long)]
    no_ambience: bool,

    /// Tuner flags/params JSON to import at startup
    #[arg(long)]
    optimizer_config: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env();
            config
        }
        None => Config::load()?,
    };

    if let Some(engine) = &args.tts {
        config.tts_engine = engine.clone();
    }
    if args.muted {
        config.start_muted = true;
    }
    if args.no_ambience {
        config.ambience.enabled = false;
    }
    if let Some(path) = &args.optimizer_config {
        config.optimizer_config_path = Some(path.display().to_string());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Setup logging: RUST_LOG wins, then --verbose, then the config
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🌸 Jazmin v{} starting...", env!("CARGO_PKG_VERSION"));

    let optimizer = Arc::new(Optimizer::load(
        "default",
        config.optimizer_config_path.as_deref().map(std::path::Path::new),
    ));
    optimizer.on_session_start();
    optimizer.start_background_sampling(Duration::from_secs(5));

    let sound_engine = match SoundEngine::new() {
        Ok(engine) => Some(engine),
        Err(e) => {
            warn!("⚠️ Audio output unavailable: {}", e);
            None
        }
    };
    let speaker = Arc::new(
        Speaker::new(tts::create_engine(&config, sound_engine))
            .with_optimizer(Arc::clone(&optimizer)),
    );
    speaker.set_muted(config.start_muted);

    let chat: Arc<dyn ChatBackend> =
        Arc::new(OpenAiChat::new(&config).with_optimizer(Arc::clone(&optimizer)));
    let output = Arc::new(
        OutputArea::new(
            Duration::from_millis(config.char_delay_ms),
            Duration::from_millis(config.erase_delay_ms),
        )
        .with_echo(true),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let login = session::os_login();
    output.show(&session::wait_message(login.as_deref().unwrap_or("there")));

    let name = match args.name.as_deref().map(session::validate_name) {
        Some(Ok(name)) => name,
        Some(Err(e)) => {
            warn!("⚠️ {}", e);
            return Ok(());
        }
        None => {
            let nag = LoginNag::schedule(
                Arc::clone(&chat),
                Arc::clone(&speaker),
                login.clone(),
                NagTiming::default(),
            );
            let name = loop {
                println!("Enter your name ({}-{} letters):", session::MIN_NAME_LEN, session::MAX_NAME_LEN);
                match lines.next_line().await? {
                    Some(line) => match session::validate_name(&line) {
                        Ok(name) => break Some(name),
                        Err(e) => println!("{}", e),
                    },
                    None => break None,
                }
            };
            nag.cancel();
            match name {
                Some(name) => name,
                None => return Ok(()),
            }
        }
    };

    let jazmin = Jazmin::new(
        &config,
        name,
        chat,
        Arc::clone(&speaker),
        Arc::clone(&output),
        Arc::clone(&optimizer),
        Arc::new(ProcessExit),
    );
    jazmin.greet().await;

    let ambience = config.ambience.enabled.then(|| {
        tokio::spawn(run_ambience(
            config.ambience.clone(),
            jazmin.activity(),
            jazmin.speaker(),
        ))
    });

    let tuner = {
        let optimizer = Arc::clone(&optimizer);
        let period = Duration::from_secs(config.optimizer_tick_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                optimizer.on_idle_tick();
            }
        })
    };

    info!("✅ Jazmin ready - type to talk, /help for commands");

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Couldn't listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    jazmin.run(&mut lines, ctrl_c).await?;

    if let Some(handle) = ambience {
        handle.abort();
    }
    tuner.abort();
    jazmin.goodbye().await;
    Ok(())
}
