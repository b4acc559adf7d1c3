//! Shuffle and subsample determinism.

mod common;

use anyhow::Result;

use common::{collect_markers, marker_store, reader};
use data_reader::ReaderConfig;

const TEST_SEED: u64 = 42;

fn shuffled_config(window: usize) -> ReaderConfig {
    ReaderConfig::builder()
        .batch_size(10)
        .shuffle_instances(true)
        .shuffle_window(window)
        .shuffle_seed(TEST_SEED)
        .reshuffle_each_epoch(false)
        .build()
}

#[test]
fn perfect_shuffle_replays_identically_across_epochs() -> Result<()> {
    let reader = reader(vec![marker_store("s", 0..100)], shuffled_config(0));

    let epoch1 = collect_markers(&reader)?;
    reader.reset();
    let epoch2 = collect_markers(&reader)?;

    assert_eq!(epoch1, epoch2);
    assert_ne!(epoch1, (0..100).collect::<Vec<_>>(), "stream was not shuffled");

    let mut sorted = epoch1;
    sorted.sort_unstable();
    assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn reshuffling_epochs_produce_different_permutations() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(10)
        .shuffle_instances(true)
        .shuffle_seed(TEST_SEED)
        .reshuffle_each_epoch(true)
        .build();
    let reader = reader(vec![marker_store("s", 0..100)], config);

    let epoch1 = collect_markers(&reader)?;
    reader.reset();
    let epoch2 = collect_markers(&reader)?;

    assert_ne!(epoch1, epoch2);

    let mut sorted = epoch2;
    sorted.sort_unstable();
    assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn windowed_shuffle_preserves_the_instance_multiset() -> Result<()> {
    let reader = reader(vec![marker_store("s", 0..200)], shuffled_config(16));

    let mut markers = collect_markers(&reader)?;
    markers.sort_unstable();
    assert_eq!(markers, (0..200).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn shuffled_order_is_independent_of_parallelism() -> Result<()> {
    let baseline = {
        let mut config = shuffled_config(0);
        config.num_parallel_reads = 1;
        config.num_prefetched_batches = 1;
        collect_markers(&reader(vec![marker_store("s", 0..100)], config))?
    };

    for parallelism in [2, 4] {
        let mut config = shuffled_config(0);
        config.num_parallel_reads = parallelism;
        config.num_prefetched_batches = parallelism * 2;
        let markers = collect_markers(&reader(vec![marker_store("s", 0..100)], config))?;
        assert_eq!(markers, baseline, "parallelism {parallelism} changed the permutation");
    }
    Ok(())
}

#[test]
fn same_seed_means_same_permutation_across_readers() -> Result<()> {
    let first = collect_markers(&reader(vec![marker_store("s", 0..64)], shuffled_config(8)))?;
    let second = collect_markers(&reader(vec![marker_store("s", 0..64)], shuffled_config(8)))?;
    assert_eq!(first, second);

    let mut other_seed = shuffled_config(8);
    other_seed.shuffle_seed = Some(TEST_SEED + 1);
    let third = collect_markers(&reader(vec![marker_store("s", 0..64)], other_seed))?;
    assert_ne!(first, third);
    Ok(())
}

#[test]
fn subsample_keeps_a_deterministic_proportional_subset() -> Result<()> {
    let config = || {
        ReaderConfig::builder()
            .batch_size(10)
            .shuffle_seed(TEST_SEED)
            .subsample_ratio(0.5)
            .build()
    };

    let first = collect_markers(&reader(vec![marker_store("s", 0..1000)], config()))?;
    assert!(
        first.len() > 400 && first.len() < 600,
        "kept {} of 1000",
        first.len()
    );

    // Kept markers stay in stream order when shuffling is off.
    assert!(first.windows(2).all(|pair| pair[0] < pair[1]));

    let second = collect_markers(&reader(vec![marker_store("s", 0..1000)], config()))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn full_subsample_ratio_keeps_everything() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(10)
        .shuffle_seed(TEST_SEED)
        .subsample_ratio(1.0)
        .build();
    let markers = collect_markers(&reader(vec![marker_store("s", 0..50)], config))?;
    assert_eq!(markers, (0..50).collect::<Vec<_>>());
    Ok(())
}
