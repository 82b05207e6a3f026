use std::env;
use std::process::ExitCode;

use teras_nnue::config::Architecture;
use teras_nnue::nnue::{weight_file_len, Checkpoint, FloatNetwork};

fn parse_architecture(args: &[String]) -> Option<Architecture> {
    match args {
        [] => Some(Architecture::default()),
        [ft_out, hidden1, hidden2] => Some(Architecture::new(
            ft_out.parse().ok()?,
            hidden1.parse().ok()?,
            hidden2.parse().ok()?,
        )),
        _ => None,
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let architecture = if args.len() >= 3 {
        parse_architecture(&args[3..])
    } else {
        None
    };
    let Some(architecture) = architecture else {
        eprintln!("usage: export_weights <checkpoint.json> <out.nnue> [ft_out hidden1 hidden2]");
        return ExitCode::FAILURE;
    };

    let checkpoint = match Checkpoint::load(&args[1]) {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            log::error!("cannot read {}: {err}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let network = match FloatNetwork::from_checkpoint(&checkpoint, architecture) {
        Ok(network) => network,
        Err(err) => {
            log::error!("checkpoint does not match {architecture:?}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let quantized = match network.quantize() {
        Ok(quantized) => quantized,
        Err(err) => {
            log::error!("quantization failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    match quantized.save(&args[2]) {
        Ok(bytes) => {
            debug_assert_eq!(bytes, weight_file_len(&architecture));
            println!("{bytes} bytes written to {}", args[2]);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("cannot write {}: {err}", args[2]);
            ExitCode::FAILURE
        }
    }
}
