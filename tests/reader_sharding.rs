//! Sharding, skip, and limit behaviour over the instance stream.

mod common;

use std::collections::HashSet;

use anyhow::Result;

use common::{collect_markers, marker_store, reader};
use data_reader::ReaderConfig;

#[test]
fn shard_one_of_four_keeps_the_expected_subsequence() -> Result<()> {
    let config = ReaderConfig::builder().batch_size(5).shard(1, 4).build();
    let reader = reader(vec![marker_store("s", 0..100)], config);

    let markers = collect_markers(&reader)?;
    let expected: Vec<u64> = (0..100).filter(|m| m % 4 == 1).collect();
    assert_eq!(markers, expected);
    assert_eq!(markers.first(), Some(&1));
    assert_eq!(markers.last(), Some(&97));
    Ok(())
}

#[test]
fn shards_partition_the_unsharded_stream() -> Result<()> {
    const K: u32 = 4;

    let unsharded = {
        let config = ReaderConfig::builder().batch_size(7).build();
        collect_markers(&reader(vec![marker_store("s", 0..100)], config))?
    };

    let mut union = Vec::new();
    for shard in 0..K {
        let config = ReaderConfig::builder().batch_size(7).shard(shard, K).build();
        let markers = collect_markers(&reader(vec![marker_store("s", 0..100)], config))?;

        // Disjointness with everything collected so far.
        let seen: HashSet<_> = union.iter().copied().collect();
        assert!(markers.iter().all(|m| !seen.contains(m)));
        union.extend(markers);
    }

    union.sort_unstable();
    let mut expected = unsharded;
    expected.sort_unstable();
    assert_eq!(union, expected);
    Ok(())
}

#[test]
fn single_or_zero_shard_count_disables_sharding() -> Result<()> {
    for num_shards in [0, 1] {
        let config = ReaderConfig::builder()
            .batch_size(10)
            .shard(0, num_shards)
            .build();
        let markers = collect_markers(&reader(vec![marker_store("s", 0..30)], config))?;
        assert_eq!(markers, (0..30).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn skip_discards_leading_records() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(10)
        .num_instances_to_skip(10)
        .build();
    let markers = collect_markers(&reader(vec![marker_store("s", 0..30)], config))?;
    assert_eq!(markers, (10..30).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn limit_caps_the_record_count_after_skip() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(10)
        .num_instances_to_skip(10)
        .num_instances_to_read(50)
        .build();
    let reader = reader(vec![marker_store("s", 0..1000)], config);

    let markers = collect_markers(&reader)?;
    assert_eq!(markers, (10..60).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn shard_indices_are_computed_after_skip_and_limit() -> Result<()> {
    // Post-skip/limit stream is 5..25; shard 0 of 2 takes every other.
    let config = ReaderConfig::builder()
        .batch_size(5)
        .num_instances_to_skip(5)
        .num_instances_to_read(20)
        .shard(0, 2)
        .build();
    let markers = collect_markers(&reader(vec![marker_store("s", 0..100)], config))?;
    assert_eq!(markers, vec![5, 7, 9, 11, 13, 15, 17, 19, 21, 23]);
    Ok(())
}

#[test]
fn skip_longer_than_the_dataset_yields_nothing() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(5)
        .num_instances_to_skip(50)
        .build();
    let markers = collect_markers(&reader(vec![marker_store("s", 0..20)], config))?;
    assert!(markers.is_empty());
    Ok(())
}
