use std::env;
use std::process::ExitCode;

use teras_nnue::config::LoaderConfig;
use teras_nnue::data::{DataLoader, SparseBatch};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("usage: inspect_dataset <data.bin> [batch_size]");
        return ExitCode::FAILURE;
    }
    let batch_size = match args.get(2).map(|s| s.parse::<u32>()) {
        None => LoaderConfig::default().batch_size,
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("batch_size must be a non-negative integer");
            return ExitCode::FAILURE;
        }
    };

    let config = LoaderConfig {
        seed: Some(0),
        ..LoaderConfig::with_batch_size(batch_size)
    };
    let mut data = match DataLoader::open(&args[1], &config) {
        Ok(data) => data,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut batches = 0u64;
    let mut samples = 0u64;
    let mut features = 0u64;
    let mut outcome_sum = 0.0f64;
    loop {
        let batch = match data.next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = SparseBatch::from_view(&batch.view()) {
            log::error!("batch {batches} is malformed: {err}");
            return ExitCode::FAILURE;
        }
        batches += 1;
        samples += u64::from(batch.size());
        features += u64::from(batch.total_features());
        outcome_sum += batch.outcomes().iter().map(|&o| f64::from(o)).sum::<f64>();
    }

    let loader = data.loader();
    println!("records: {}", loader.records());
    println!("skipped: {}", loader.skipped());
    println!("batches: {batches}");
    println!("samples: {samples}");
    if samples > 0 {
        println!(
            "features/sample: {:.2}",
            features as f64 / samples as f64
        );
        println!("mean outcome: {:.4}", outcome_sum / samples as f64);
    }
    data.close();
    ExitCode::SUCCESS
}
