use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;

use teras_nnue::config::Architecture;
use teras_nnue::nnue::{weight_file_len, FloatNetwork, QuantizedNetwork};

fn random_network(architecture: Architecture, seed: u64) -> FloatNetwork {
    let mut rng = StdRng::seed_from_u64(seed);
    FloatNetwork::he_uniform(architecture, &mut rng)
}

#[test]
fn engine_sized_file_has_expected_length() {
    let architecture = Architecture::new(256, 16, 32);
    let quantized = random_network(architecture, 1).quantize().unwrap();

    let file = NamedTempFile::new().unwrap();
    let written = quantized.save(file.path()).unwrap();
    assert_eq!(written, 402_660);
    assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 402_660);
    assert_eq!(weight_file_len(&architecture), 402_660);
}

#[test]
fn saved_file_reads_back_identically() {
    let architecture = Architecture::default();
    let quantized = random_network(architecture, 2).quantize().unwrap();

    let file = NamedTempFile::new().unwrap();
    quantized.save(file.path()).unwrap();
    let loaded = QuantizedNetwork::load(file.path(), architecture).unwrap();
    assert_eq!(loaded, quantized);

    // Same bytes under a wider architecture is a short file
    let wider = Architecture::new(64, 8, 8);
    let err = QuantizedNetwork::load(file.path(), wider).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn export_is_deterministic() {
    let network = random_network(Architecture::default(), 3);
    let mut first = Vec::new();
    let mut second = Vec::new();
    network.quantize().unwrap().write_to(&mut first).unwrap();
    network.quantize().unwrap().write_to(&mut second).unwrap();
    assert_eq!(first, second);
}

#[cfg(feature = "serde")]
#[test]
fn checkpoint_json_exports_same_weights() {
    use teras_nnue::nnue::Checkpoint;

    let architecture = Architecture::default();
    let network = random_network(architecture, 4);

    let mut json = Vec::new();
    network.to_checkpoint().to_json_writer(&mut json).unwrap();
    let checkpoint = Checkpoint::from_json_reader(json.as_slice()).unwrap();
    let restored = FloatNetwork::from_checkpoint(&checkpoint, architecture).unwrap();

    let mut direct = Vec::new();
    let mut via_json = Vec::new();
    network.quantize().unwrap().write_to(&mut direct).unwrap();
    restored.quantize().unwrap().write_to(&mut via_json).unwrap();
    assert_eq!(direct, via_json);
}

#[test]
fn wrong_architecture_is_rejected() {
    let checkpoint = random_network(Architecture::default(), 5).to_checkpoint();
    assert!(FloatNetwork::from_checkpoint(&checkpoint, Architecture::new(16, 8, 8)).is_err());
}
