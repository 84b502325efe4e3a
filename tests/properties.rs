//! Property-based checks for invariants that are awkward to pin down with a
//! handful of hand-picked examples.

use blocksync::core::partition;
use blocksync::hash::hash_block;
use blocksync::HashAlgorithm;
use proptest::prelude::*;

proptest! {
    /// P4: for any device size and worker count, chunks partition
    /// `[0, total_blocks)` exactly, with no gaps and no overlap.
    #[test]
    fn partition_covers_range_exactly(total_blocks in 0u64..10_000, workers in 1usize..32) {
        let chunks = partition(total_blocks, workers);

        let mut covered = 0u64;
        let mut expected_start = 0u64;
        for chunk in &chunks {
            prop_assert_eq!(chunk.start_block, expected_start);
            expected_start += chunk.block_count;
            covered += chunk.block_count;
        }
        prop_assert_eq!(covered, total_blocks);
        prop_assert_eq!(expected_start, total_blocks);
    }

    /// Two equal byte slices always hash identically under every algorithm;
    /// two differing slices (almost) never collide under a cryptographic one.
    #[test]
    fn sha512_is_sensitive_to_single_byte_changes(
        mut data in prop::collection::vec(any::<u8>(), 16..256),
        flip_index in 0usize..16,
    ) {
        let original = hash_block(HashAlgorithm::Sha512, &data);
        let idx = flip_index % data.len();
        data[idx] ^= 0xFF;
        let mutated = hash_block(HashAlgorithm::Sha512, &data);
        prop_assert_ne!(original, mutated);
    }
}
