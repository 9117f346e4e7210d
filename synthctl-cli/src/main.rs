mod args;

use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use synthctl_core::config::Config;
use synthctl_core::engine::{Engine, Received};
use synthctl_core::midi::{self, MidiInputManager, MidiOutputManager};
use synthctl_core::model::{self, ParameterModel};
use synthctl_core::paths;
use synthctl_core::synth::SynthRegistry;
use synthctl_core::{CoreError, CoreResult};
use synthctl_types::Layout;

use args::Command;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = paths::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(file) => file,
        Err(_) => match File::create(std::env::temp_dir().join("synthctl.log")) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("synthctl: cannot create log file: {}", e);
                return;
            }
        },
    };

    if WriteLogger::init(log_level, simplelog::Config::default(), log_file).is_err() {
        eprintln!("synthctl: logger already initialised");
    }

    log::info!("synthctl starting (log level: {:?})", log_level);
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match args::parse(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("synthctl: {}\n\n{}", e, args::USAGE);
            return ExitCode::from(2);
        }
    };
    init_logging(args.verbose);

    let config = Config::load();
    match run(args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("synthctl: {}: {}", e.name(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> CoreResult {
    let registry = load_registry(config)?;
    match command {
        Command::Ports => {
            list_ports(config);
            Ok(())
        }
        Command::Synths => {
            for descriptor in registry.iter() {
                let patchable = if descriptor.is_patchable() { "patchable" } else { "live only" };
                println!("{:<16} {}", descriptor.name(), patchable);
            }
            Ok(())
        }
        Command::Request { synth, file } => request(registry, config, &synth, &file),
        Command::Send { synth, file } => send(registry, config, &synth, &file),
        Command::Monitor { layout } => monitor(registry, config, layout.as_deref()),
    }
}

fn load_registry(config: &Config) -> CoreResult<SynthRegistry> {
    let mut registry = SynthRegistry::with_builtin()?;
    let dir = config.synths_dir();
    let loaded = registry.load_dir(&dir)?;
    log::debug!("{} synth descriptors from {}", loaded, dir.display());
    Ok(registry)
}

fn list_ports(config: &Config) {
    println!("inputs:");
    for port in midi::input_ports(config.client_name()) {
        println!("  {}: {}", port.index, port.name);
    }
    println!("outputs:");
    for port in midi::output_ports(config.client_name()) {
        println!("  {}: {}", port.index, port.name);
    }
}

fn connect_output(config: &Config) -> CoreResult<MidiOutputManager> {
    let mut output = MidiOutputManager::new(config.client_name());
    match config.output_port() {
        Some(name) => output.connect_by_name(name)?,
        None => output.connect(0)?,
    }
    Ok(output)
}

fn connect_input(config: &Config) -> CoreResult<MidiInputManager> {
    let mut input = MidiInputManager::new(config.client_name());
    match config.input_port() {
        Some(name) => input.connect_by_name(name)?,
        None => input.connect(0)?,
    }
    Ok(input)
}

fn engine(registry: SynthRegistry, model: ParameterModel, config: &Config) -> CoreResult<Engine> {
    Ok(Engine::new(registry, model)
        .with_transport(connect_output(config)?)
        .with_timeouts(config.nrpn_timeout(), config.sysex_timeout())
        .with_patches_dir(config.patches_dir()))
}

fn request(registry: SynthRegistry, config: &Config, synth: &str, file: &Path) -> CoreResult {
    registry.require(synth)?.patch_details()?;
    let input = connect_input(config)?;
    let mut engine = engine(registry, ParameterModel::default(), config)?;

    engine.request_patch(synth)?;
    let deadline = Instant::now() + config.sysex_timeout();
    while Instant::now() < deadline {
        let received = engine.poll(input.receiver());
        if received
            .iter()
            .any(|r| matches!(r, Received::Patch { synth: s, .. } if s == synth))
        {
            engine.save_patch(synth, file)?;
            println!("saved {} patch to {}", synth, file.display());
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Err(CoreError::Transport(format!(
        "no patch from {} within {:?}",
        synth,
        config.sysex_timeout()
    )))
}

fn send(registry: SynthRegistry, config: &Config, synth: &str, file: &Path) -> CoreResult {
    let mut engine = engine(registry, ParameterModel::default(), config)?;
    let kind = engine.load_patch(synth, file)?;
    engine.send_patch(synth)?;
    println!("sent {} ({:?}) to {}", file.display(), kind, synth);
    Ok(())
}

fn monitor(registry: SynthRegistry, config: &Config, layout: Option<&Path>) -> CoreResult {
    let layout = match layout {
        Some(path) => model::load_layout(path)?,
        None => Layout::default(),
    };
    let model = ParameterModel::build(&layout, &registry, &config.channels())?;
    let input = connect_input(config)?;
    let mut engine = Engine::new(registry, model)
        .with_timeouts(config.nrpn_timeout(), config.sysex_timeout());
    println!(
        "listening on {} (ctrl-c to stop)",
        input.connected_port_name().unwrap_or("?")
    );

    loop {
        for received in engine.poll(input.receiver()) {
            match received {
                Received::Nrpn { key, value, bound } => {
                    println!("nrpn {} = {} ({} controllers)", key, value, bound)
                }
                Received::Cc {
                    channel,
                    controller,
                    value,
                    ..
                } => println!("cc   ch{} #{} = {}", channel, controller, value),
                Received::Patch { synth, kind } => println!("sysex {} {:?}", synth, kind),
            }
        }
        for change in engine.take_changes() {
            let Some(c) = engine.model().controller(change.controller) else {
                continue;
            };
            println!("  {} -> {}", c.name(), c.display().text);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
