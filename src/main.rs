use anyhow::{Context, Result};
use clap::Parser;
use looper::backend::jack::JackBackend;
use looper::backend::Backend;
use looper::config::Config;
use looper::error::{Error, PortKind};
use looper::mode::CommandSource;
use looper::scheduler::Scheduler;
use looper::timer::WallTimer;
use looper::ui::{self, Headless, StatusSink, TerminalStatus};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

/// Loop what you play on a MIDI controller into a synth.
#[derive(Parser, Debug)]
#[command(name = "looper", version)]
struct Args {
    /// TOML file with settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input device to search for (case-insensitive substring).
    #[arg(long)]
    input: Option<String>,
    /// Output device to search for (case-insensitive substring).
    #[arg(long)]
    output: Option<String>,
    /// Loop length in seconds.
    #[arg(long)]
    loop_length: Option<f64>,
    /// No status screen.
    #[arg(long)]
    headless: bool,
    /// List MIDI inputs and outputs, then exit.
    #[arg(long)]
    list: bool,
    /// Where to write the log.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// More logging; repeat for trace timing.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new().set_thread_level(LevelFilter::Off).build();
    // The status screen owns the terminal, so the log goes to a file then.
    let path = match (&args.log_file, args.headless || args.list) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => Some(std::env::temp_dir().join("looper.log")),
    };
    match path {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            WriteLogger::init(level, config, file)?;
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)?,
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("loading config")?;
    if let Some(input) = &args.input {
        config.input = input.clone();
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(loop_length) = args.loop_length {
        config.loop_length = loop_length;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&args)?;
    looper::signal::install();

    let epoch = Instant::now();
    let backend = JackBackend::new(epoch).context("starting JACK client")?;

    if args.list {
        println!("inputs:");
        for name in backend.list_inputs() {
            println!("  {}", name);
        }
        println!("outputs:");
        for name in backend.list_outputs() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let input = backend
        .open_input(&config.input)?
        .ok_or_else(|| Error::DeviceNotFound {
            kind: PortKind::Input,
            search: config.input.clone(),
        })?;
    let output = backend
        .open_output(&config.output)?
        .ok_or_else(|| Error::DeviceNotFound {
            kind: PortKind::Output,
            search: config.output.clone(),
        })?;

    let status: Box<dyn StatusSink> = if args.headless {
        Box::new(Headless)
    } else {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            println!("{}", termion::screen::ToMainScreen);
            default_hook(info);
        }));
        Box::new(TerminalStatus::new().context("setting up terminal")?)
    };
    let commands: Box<dyn CommandSource> = Box::new(ui::spawn_key_reader());

    let mut scheduler = Scheduler::new(
        &config,
        input,
        output,
        WallTimer::new(epoch),
        commands,
        status,
    );
    let shutdown_rx = backend.shutdown_rx().clone();
    scheduler.run(|| {
        if shutdown_rx.try_recv().is_ok() {
            log::error!("jack server went away");
            return true;
        }
        looper::signal::requested()
    });
    // Dropping the scheduler silences the output; the backend then waits
    // for that to reach JACK before closing.
    drop(scheduler);
    drop(backend);
    Ok(())
}
