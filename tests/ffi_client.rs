use tempfile::NamedTempFile;

use teras_nnue::board::Position;
use teras_nnue::config::TargetBlend;
use teras_nnue::data::{write_samples, EpochStatus, Outcome, Sample, SparseBatch};
use teras_nnue::ffi::client::{LoaderHandle, OwnedBatch};
use teras_nnue::nnue::FEATURE_COUNT;

fn dataset(count: usize) -> NamedTempFile {
    let samples: Vec<Sample> = (0..count)
        .map(|i| {
            let mut position = Position::startpos();
            if i % 2 == 1 {
                position.set_side_to_move(!position.side_to_move());
            }
            Sample::new(position, Outcome::WhiteWins, Some(100))
        })
        .collect();
    let file = NamedTempFile::new().unwrap();
    write_samples(file.path(), &samples).unwrap();
    file
}

#[test]
fn trainer_loop_through_the_abi() {
    let file = dataset(10);
    let mut loader = LoaderHandle::open(file.path(), 4).unwrap();
    let mut batch = OwnedBatch::new(4);
    let blend = TargetBlend::default();

    for _epoch in 0..2 {
        let mut samples = 0;
        let mut steps = 0;
        while loader.load(&mut batch).unwrap() == EpochStatus::Continuing {
            steps += 1;
            let view = batch.view().unwrap();
            let sparse = SparseBatch::from_view(&view).unwrap();
            assert_eq!(sparse.stm.cols(), FEATURE_COUNT);
            assert_eq!(sparse.stm.rows(), view.size() as usize);
            for target in sparse.targets(&blend) {
                assert!(target == 1.0 || target == 0.0);
            }
            samples += view.size();
        }
        assert_eq!(steps, 3);
        assert_eq!(samples, 10);
        loader.reopen().unwrap();
    }
}

#[test]
fn producer_allocated_batches_are_released() {
    let file = dataset(5);
    let mut loader = LoaderHandle::open(file.path(), 2).unwrap();
    let batches: Vec<OwnedBatch> = std::iter::from_fn(|| loader.next_batch().unwrap()).collect();
    assert_eq!(
        batches.iter().map(OwnedBatch::size).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    for batch in &batches {
        assert_eq!(batch.capacity(), 2);
        assert!(batch.view().unwrap().validate().is_ok());
    }
    drop(batches);
    loader.close();
    assert!(!loader.is_open());
}
