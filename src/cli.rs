use std::path::Path;

use stemsub::config::read_config_json;
use stemsub::io::wav::{load_mono_wav, save_mono_wav};
use stemsub::timestamp::{format_timestamp, parse_timestamp, resolve_timestamp};
use stemsub::{IntermediateSource, Logger, Signal, SubtractConfig, WindowType};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 4 {
        print_usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let num_of_paths = match command {
        "find-delay" => 2,
        "subtract" => 3,
        other => {
            eprintln!("ERROR: Unknown command '{}'", other);
            print_usage();
            std::process::exit(1);
        }
    };
    if args.len() < 2 + num_of_paths {
        print_usage();
        std::process::exit(1);
    }
    let paths = &args[2..2 + num_of_paths];

    let mut start: Option<f64> = None;
    let mut stop: Option<f64> = None;
    let mut delay: Option<f64> = None;
    let mut config_path: Option<String> = None;
    let mut window_type: Option<WindowType> = None;
    let mut intermediate_path: Option<String> = None;
    let mut intermediate_delay: Option<f64> = None;
    let mut running = false;
    let mut verbose = 0u8;

    let mut i = 2 + num_of_paths;
    while i < args.len() {
        match args[i].as_str() {
            "--start" => {
                i += 1;
                start = Some(parse_time(&args, i, "start"));
            }
            "--stop" => {
                i += 1;
                stop = Some(parse_time(&args, i, "stop"));
            }
            "--delay" | "-d" => {
                i += 1;
                delay = Some(parse_f64(&args, i, "delay"));
            }
            "--config" | "-c" => {
                i += 1;
                config_path = Some(parse_string(&args, i, "config"));
            }
            "--window" | "-w" => {
                i += 1;
                window_type = Some(parse_window(&args, i));
            }
            "--intermediate" => {
                i += 1;
                intermediate_path = Some(parse_string(&args, i, "intermediate"));
            }
            "--intermediate-delay" => {
                i += 1;
                intermediate_delay = Some(parse_f64(&args, i, "intermediate-delay"));
            }
            "--running" => running = true,
            "--verbose" | "-v" => verbose += 1,
            other => {
                eprintln!("ERROR: Unknown option '{}'", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &config_path {
        Some(path) => match read_config_json(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SubtractConfig::default(),
    };
    if let Some(w) = window_type {
        config.grain = config.grain.with_window(w);
    }
    if running {
        config.running = true;
    }

    let stem = load(&paths[0]);
    let mix = load(&paths[1]);
    if stem.sample_rate != mix.sample_rate {
        eprintln!(
            "ERROR: Stem is {} Hz but mix is {} Hz",
            stem.sample_rate, mix.sample_rate
        );
        std::process::exit(1);
    }

    if start.is_some() || stop.is_some() {
        let resolve = |t: Option<f64>, default: usize| match t {
            Some(seconds) => resolve_timestamp(seconds, mix.sample_rate, mix.len()),
            None => Ok(default),
        };
        let span = resolve(start, 0).and_then(|s| Ok((s, resolve(stop, mix.len())?)));
        let search = span.and_then(|(s, e)| {
            config
                .grain
                .layout()
                .and_then(|layout| config.delay_search.with_span(s, e, &layout))
        });
        match search {
            Ok(search) => config.delay_search = search,
            Err(e) => {
                eprintln!("ERROR: Invalid search span: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut logger = if verbose > 0 {
        Logger::log_facade()
    } else {
        Logger::none()
    };
    let started = std::time::Instant::now();

    match command {
        "find-delay" => {
            let estimate = match stemsub::find_delay(&stem, &mix, &config, &mut logger) {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("ERROR: Delay search failed: {}", e);
                    std::process::exit(1);
                }
            };
            println!("{}", estimate.samples);
            eprintln!(
                "Delay: {:.4} samples ({}), score {:.4}",
                estimate.samples,
                format_timestamp(estimate.seconds(mix.sample_rate)),
                estimate.score
            );
        }
        _ => {
            let intermediate = intermediate_path.as_deref().map(load);
            let outcome = match &intermediate {
                Some(signal) => {
                    let mut source = IntermediateSource::new(signal);
                    if let Some(d) = intermediate_delay {
                        source = source.with_delay(d);
                    }
                    stemsub::subtract_intermediate(&stem, &source, &mix, delay, &config, &mut logger)
                }
                None => stemsub::subtract_stem(&stem, &mix, delay, &config, &mut logger),
            };
            let result = match outcome {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("ERROR: Subtraction failed: {}", e);
                    std::process::exit(1);
                }
            };
            eprintln!(
                "Delay: {:.4} samples{}",
                result.delay_samples,
                if result.estimate.is_some() { " (searched)" } else { "" }
            );
            let out_path = &paths[2];
            if let Err(e) = save_mono_wav(Path::new(out_path), &result.residual) {
                eprintln!("ERROR: Failed to write {}: {}", out_path, e);
                std::process::exit(1);
            }
            eprintln!("Written to {}", out_path);
        }
    }

    if verbose > 0 {
        eprintln!("Processing time: {:.3}s", started.elapsed().as_secs_f64());
    }
}

fn load(path: &str) -> Signal {
    match load_mono_wav(Path::new(path)) {
        Ok(s) => {
            eprintln!(
                "{}: {} samples, {} Hz, {:.2}s",
                path,
                s.len(),
                s.sample_rate,
                s.duration_secs()
            );
            s
        }
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  stemsub-cli find-delay <stem.wav> <mix.wav> [options]");
    eprintln!("  stemsub-cli subtract <stem.wav> <mix.wav> <out.wav> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --start <time>     Start of the delay search span (default: 0)");
    eprintln!("  --stop <time>      End of the delay search span (default: end of mix)");
    eprintln!("                     Times are [[H:]M:]S or 1h2m3.5s; negative counts from the end");
    eprintln!("  --delay, -d <f>    Stem delay in samples (subtract; searched when omitted)");
    eprintln!("  --running          Filter with a running EQ estimate instead of one profile");
    eprintln!("  --intermediate <f> Subtract this recording of the stem instead (subtract)");
    eprintln!("  --intermediate-delay <f>");
    eprintln!("                     Intermediate delay in samples (default: the stem delay)");
    eprintln!("  --config, -c <f>   JSON config file");
    eprintln!("  --window, -w <t>   hann (default), blackman-harris, kaiser:<beta>");
    eprintln!("  --verbose, -v      More logging; repeat for trace output");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  stemsub-cli find-delay backing.wav room.wav --start 0:30 --stop 1:30");
    eprintln!("  stemsub-cli subtract backing.wav room.wav vocals.wav --delay 1234.56 --running");
}

fn value<'a>(args: &'a [String], idx: usize, name: &str) -> &'a str {
    if idx >= args.len() {
        eprintln!("ERROR: --{} requires a value", name);
        std::process::exit(1);
    }
    &args[idx]
}

fn parse_string(args: &[String], idx: usize, name: &str) -> String {
    value(args, idx, name).to_string()
}

fn parse_f64(args: &[String], idx: usize, name: &str) -> f64 {
    let s = value(args, idx, name);
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            eprintln!("ERROR: Invalid {}: {}", name, s);
            std::process::exit(1);
        }
    }
}

fn parse_time(args: &[String], idx: usize, name: &str) -> f64 {
    let s = value(args, idx, name);
    match parse_timestamp(s) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("ERROR: Invalid {}: {}", name, e);
            std::process::exit(1);
        }
    }
}

fn parse_window(args: &[String], idx: usize) -> WindowType {
    parse_window_str(value(args, idx, "window"))
}

fn parse_window_str(s: &str) -> WindowType {
    match s {
        "hann" => WindowType::Hann,
        "blackman-harris" | "bh" => WindowType::BlackmanHarris,
        "kaiser" => WindowType::Kaiser(800),
        other => match other.strip_prefix("kaiser:").map(str::parse::<f64>) {
            Some(Ok(beta)) if beta >= 0.0 => WindowType::Kaiser((beta * 100.0).round() as u32),
            Some(_) => {
                eprintln!("ERROR: Invalid Kaiser beta in '{}'", other);
                std::process::exit(1);
            }
            None => {
                eprintln!(
                    "ERROR: Unknown window type '{}' (use hann, blackman-harris, or kaiser:<beta>)",
                    other
                );
                std::process::exit(1);
            }
        },
    }
}
