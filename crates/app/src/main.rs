use std::process::ExitCode;

use clap::Parser;
use scopeviz_core::{
    open_source, window_title, ConfigStore, FrameScheduler, HeadlessSurface, Pipeline, Surface,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "session ended");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> scopeviz_core::Result<()> {
    let mut config = ConfigStore::open(&cli.config)?;
    tracing::info!(
        path = ?config.path(),
        stereo = config.config().input.stereo,
        source = ?config.config().input.source,
        "starting"
    );

    let snapshot = config.config();
    let source = open_source(&snapshot.input)?;

    let mut scheduler = FrameScheduler::new();
    let mut surface = HeadlessSurface::open(&snapshot.window, &window_title(snapshot))?;
    if let Some(frames) = cli.frames {
        surface = surface.with_frame_limit(frames);
    }
    surface.set_clear_color(snapshot.background);

    #[cfg(unix)]
    install_signals(&scheduler, &surface)?;

    let mut pipeline = Pipeline::start(snapshot, source)?;
    let outcome = scheduler.run(&mut config, &mut surface, &mut pipeline);
    let shutdown = pipeline.shutdown();

    outcome?;
    shutdown
}

/// SIGUSR1 requests a reload; SIGINT and SIGTERM close the surface.
#[cfg(unix)]
fn install_signals(
    scheduler: &FrameScheduler,
    surface: &HeadlessSurface,
) -> scopeviz_core::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};

    scheduler.reload_handle().register_signal(SIGUSR1)?;
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, surface.close_flag())?;
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Real-time spectrum and oscilloscope visualiser",
    long_about = None
)]
struct Cli {
    /// Configuration file; empty selects the per-user default.
    #[arg(default_value = "")]
    config: String,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}
