// Canticle Harmony CLI driver.
//
// Harmonizes a lead line given on the command line and prints one harmony
// per step. Useful for listening tests and for checking a config file
// before loading it into a live host.
//
// Usage:
//   cargo run -p canticle_harmony --bin harmonize -- [PITCH[~] ...]
//     [--seed N] [--volume V] [--lead ROLE] [--vowel V]
//     [--strategy stochastic|triad] [--profile compact|extended]
//     [--config FILE] [--json]
//
// Pitches are MIDI numbers; a trailing `~` marks the note as tied to the
// previous one. With no pitches, a C major scale is harmonized. Set
// RUST_LOG (e.g. `RUST_LOG=canticle_harmony=debug`) for engine logging on
// stderr.

use canticle_harmony::note::pitch_name;
use canticle_harmony::{
    HarmonyConfig, HarmonyEngine, Note, RangeProfile, Strategy, VoiceRole, Vowel,
};
use canticle_prng::ChoirRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 7] = [
    "--seed",
    "--volume",
    "--lead",
    "--vowel",
    "--strategy",
    "--profile",
    "--config",
];

const DEFAULT_MELODY: [(u8, bool); 8] = [
    (60, false),
    (62, false),
    (64, false),
    (65, false),
    (67, false),
    (69, false),
    (71, false),
    (72, false),
];

/// One JSON output line.
#[derive(Serialize)]
struct StepLine {
    step: usize,
    lead: Note,
    voices: BTreeMap<VoiceRole, Note>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let seed: Option<u64> = parse_flag(&args, "--seed");
    let volume: f32 = parse_flag(&args, "--volume").unwrap_or(0.8);
    let lead_role: VoiceRole = parse_flag(&args, "--lead").unwrap_or(VoiceRole::Soprano);
    let vowel: Vowel = parse_flag(&args, "--vowel").unwrap_or(Vowel::Ah);
    let json = args.iter().any(|a| a == "--json");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => match HarmonyConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => HarmonyConfig::default(),
    };
    if let Some(strategy) = parse_flag::<Strategy>(&args, "--strategy") {
        config.strategy = strategy;
    }
    if let Some(profile) = parse_flag::<RangeProfile>(&args, "--profile") {
        config.ranges.profile = profile;
    }

    let rng = match seed {
        Some(s) => ChoirRng::new(s),
        None => ChoirRng::from_clock(),
    };
    let mut engine = match HarmonyEngine::from_config(&config, rng) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut melody = parse_pitches(&args);
    if melody.is_empty() {
        melody = DEFAULT_MELODY.to_vec();
    }

    if !json {
        println!("=== Canticle Harmony ===");
        println!("Strategy: {:?}", config.strategy);
        println!("Profile: {:?}", config.ranges.profile);
        println!("Lead: {lead_role} on '{}' at volume {volume}", vowel.as_str());
        if let Some(s) = seed {
            println!("Seed: {s}");
        }
        println!();
    }

    for (step, &(pitch, tie)) in melody.iter().enumerate() {
        let lead = Note::new(pitch, volume, vowel, tie);
        let result = engine.generate_harmony(lead_role, lead, volume);
        if json {
            let line = StepLine {
                step,
                lead,
                voices: result.iter().map(|(role, note)| (role, *note)).collect(),
            };
            match serde_json::to_string(&line) {
                Ok(s) => println!("{s}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        } else {
            let tie_mark = if tie { "~" } else { "" };
            let lead_name = format!("{}{tie_mark}", pitch_name(pitch));
            println!("{:>3}  {lead_name:<5} {}", step + 1, result.summary());
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Parse a flag's value, warning and returning `None` when it doesn't parse.
fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let raw = flag_value(args, flag)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(flag, value = raw, "could not parse flag value, using default");
            None
        }
    }
}

/// Positional lead pitches, skipping flags and their values.
fn parse_pitches(args: &[String]) -> Vec<(u8, bool)> {
    let mut pitches = Vec::new();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        let (digits, tie) = match arg.strip_suffix('~') {
            Some(d) => (d, true),
            None => (arg.as_str(), false),
        };
        match digits.parse::<u8>() {
            Ok(p) if p <= 127 => pitches.push((p, tie)),
            _ => warn!(value = %arg, "not a MIDI pitch, skipping"),
        }
    }
    pitches
}
