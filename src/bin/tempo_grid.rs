//! Analyze a WAV file and print the tempo grid as JSON
//!
//! Usage: `tempo-grid <file.wav> [--degara] [--extended] [--post-process MIN MAX] [--seed N]`

use std::process::ExitCode;

use tempo_grid::{analyze_tempo, AnalysisConfig, RhythmMethod};

fn usage() -> ExitCode {
    eprintln!("Usage: tempo-grid <file.wav> [--degara] [--extended] [--post-process MIN MAX] [--seed N]");
    ExitCode::from(2)
}

/// Load a WAV file and return (mono samples, sample_rate)
fn load_wav(path: &str) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    // Down-mix to mono
    let channels = spec.channels.max(1) as usize;
    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

fn parse_args(args: &[String]) -> Option<(String, AnalysisConfig)> {
    let mut path = None;
    let mut config = AnalysisConfig::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--degara" => config.method = RhythmMethod::Degara,
            "--extended" => config.extended = true,
            "--post-process" => {
                config.post_process = true;
                config.target_min_bpm = args.get(i + 1)?.parse().ok()?;
                config.target_max_bpm = args.get(i + 2)?.parse().ok()?;
                i += 2;
            }
            "--seed" => {
                config.dither_seed = Some(args.get(i + 1)?.parse().ok()?);
                i += 1;
            }
            arg if arg.starts_with("--") => return None,
            arg => {
                if path.replace(arg.to_string()).is_some() {
                    return None;
                }
            }
        }
        i += 1;
    }
    path.map(|p| (p, config))
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((path, config)) = parse_args(&args) else {
        return usage();
    };

    let (samples, sample_rate) = match load_wav(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let progress = |stage: &str, percent: u8| log::info!("{}: {}%", stage, percent);
    let result = match analyze_tempo(&samples, sample_rate, &config, &progress) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize result: {}", e);
            ExitCode::FAILURE
        }
    }
}
