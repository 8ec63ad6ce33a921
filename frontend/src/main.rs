use beastem::loader::{BinaryFile, Destination};
use beastem::runmode::RunMode;
use beastem::system::Beast;
use beastem::BeastError;
use beastem_core::core::machine::Machine;
use clap::Parser;

mod assets;
mod audio;
mod config;
mod emulator;
mod input;
mod video;

const DEFAULT_TCP_PORT: u16 = 8456;

/// Feersum MicroBeast emulator.
#[derive(Parser, Debug)]
#[command(name = "beastem", about = "Z80 single-board computer emulator")]
struct Cli {
    /// Read binary file into memory. An optional hex offset may precede the
    /// filename (default 0x0000); repeatable.
    #[arg(short = 'f', num_args = 1..=2, action = clap::ArgAction::Append)]
    binary: Vec<String>,

    /// Read an assembly listing file for code in the given hex page
    /// (default page 0); repeatable.
    #[arg(short = 'l', num_args = 1..=2, action = clap::ArgAction::Append)]
    listing: Vec<String>,

    /// CPU speed in kilohertz. Defaults to the saved setting, or 8000.
    #[arg(short = 'k')]
    khz: Option<u32>,

    /// Stop at this address (hex) once booted.
    #[arg(short = 'b')]
    breakpoint: Option<String>,

    /// Override the default audio device selection (unused on this backend;
    /// accepted for CLI compatibility).
    #[arg(short = 'a')]
    audio_device: Option<i32>,

    /// Audio sample rate in Hz. Defaults to the saved setting, or 22050.
    #[arg(short = 's')]
    sample_rate: Option<u32>,

    /// Audio volume, 0-10. Defaults to the saved setting.
    #[arg(short = 'v')]
    volume: Option<u8>,

    /// Zoom the user interface by the given scale. Defaults to the saved setting.
    #[arg(short = 'z')]
    zoom: Option<f32>,

    /// Override the asset search path (video init files); falls back to
    /// `BEASTEM_ASSETS`, the saved setting, then the working directory.
    #[arg(short = 'A')]
    asset_path: Option<String>,
}

struct Config {
    binaries: Vec<(u32, String)>,
    listings: Vec<(u8, String)>,
    khz: u32,
    breakpoint: Option<u32>,
    sample_rate: u32,
    volume: u8,
    zoom: f32,
    asset_path: Option<String>,
}

impl Config {
    /// Merge CLI overrides onto saved settings, producing both the run
    /// configuration and the settings that should be written back (so a
    /// flag given once is remembered on the next launch).
    fn from_cli_and_settings(cli: Cli, settings: &config::Settings) -> Result<(Self, config::Settings), BeastError> {
        let mut binaries = parse_offset_path_pairs(&cli.binary)?;
        let listings = parse_page_path_pairs(&cli.listing)?;

        if binaries.is_empty() && listings.is_empty() {
            log::info!("no -f/-l arguments given, loading demo firmware");
            binaries.push((0, "monitor.rom".to_string()));
        }

        let breakpoint = cli
            .breakpoint
            .map(|s| u32::from_str_radix(&s, 16).map_err(|_| BeastError::Cli(format!("invalid breakpoint address: {s}"))))
            .transpose()?;

        let merged = config::Settings {
            khz: cli.khz.unwrap_or(settings.khz),
            sample_rate: cli.sample_rate.unwrap_or(settings.sample_rate),
            volume: cli.volume.unwrap_or(settings.volume).min(10),
            zoom: cli.zoom.unwrap_or(settings.zoom),
            asset_path: cli.asset_path.or_else(|| settings.asset_path.clone()),
        };

        let config = Config {
            binaries,
            listings,
            khz: merged.khz,
            breakpoint,
            sample_rate: merged.sample_rate,
            volume: merged.volume,
            zoom: merged.zoom,
            asset_path: merged.asset_path.clone(),
        };
        Ok((config, merged))
    }
}

/// All-hex-digit offsets are treated as `<offset> <filename>` pairs; any
/// other first token is a bare filename with an implied offset of 0.
fn is_hex_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_offset_path_pairs(tokens: &[String]) -> Result<Vec<(u32, String)>, BeastError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if is_hex_token(token) {
            let offset = u32::from_str_radix(token, 16).unwrap();
            i += 1;
            let path = tokens.get(i).ok_or_else(|| BeastError::Cli(format!("-f: offset '{token}' given with no filename")))?;
            out.push((offset, path.clone()));
            i += 1;
        } else {
            out.push((0, token.clone()));
            i += 1;
        }
    }
    Ok(out)
}

fn parse_page_path_pairs(tokens: &[String]) -> Result<Vec<(u8, String)>, BeastError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if is_hex_token(token) {
            let page = u8::from_str_radix(token, 16).map_err(|_| BeastError::Cli(format!("-l: page out of range: {token}")))?;
            i += 1;
            let path = tokens.get(i).ok_or_else(|| BeastError::Cli(format!("-l: page '{token}' given with no filename")))?;
            out.push((page, path.clone()));
            i += 1;
        } else {
            out.push((0, token.clone()));
            i += 1;
        }
    }
    Ok(out)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let saved_settings = config::load();
    let (config, merged_settings) = Config::from_cli_and_settings(cli, &saved_settings).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    if let Err(e) = config::save(&merged_settings) {
        log::warn!("failed to persist settings: {e}");
    }

    let assets = assets::AssetPaths::resolve(config.asset_path.as_deref());

    let mut beast = Beast::new(config.khz as u64 * 1000, DEFAULT_TCP_PORT).with_video();
    beast.set_audio_sample_rate(config.sample_rate);
    beast.set_volume(config.volume);

    for (offset, path) in &config.binaries {
        beast.register_file(BinaryFile::new(path, *offset, Destination::Physical, 0));
    }

    let mut listing = beastem::listing::Listing::new();
    for (page, path) in &config.listings {
        if let Err(e) = listing.add_file(path, *page, false) {
            eprintln!("Failed to load listing '{path}': {e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = beast.load_files() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    beast.reset();

    let mut run_mode = beastem::runmode::RunModeController::new();
    if let Some(address) = config.breakpoint {
        beast.debug.add_breakpoint(address, false);
    }
    run_mode.set_mode(RunMode::Run, &mut beast);

    let key_map = input::default_key_map();
    emulator::run(&mut beast, &mut run_mode, &key_map, &listing, &assets, config.sample_rate, config.volume, config.zoom);
}
