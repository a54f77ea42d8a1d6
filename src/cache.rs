// dam: Dessicated archives of SAM/BAM alignment data.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Byte-budgeted LRU cache of decompressed blocks.

use std::sync::Arc;

use lru::LruCache;

/// Decompressed contents of one block: dessicated record lines in read id
/// order. The cache owns the canonical copy; lookups and iteration share it.
pub type BlockLines = Arc<Vec<String>>;

/// LRU cache keyed by block position with a byte budget instead of an
/// entry count. The budget tracks decompressed line bytes; eviction pops
/// least-recently-used entries until the retained size fits.
pub struct BlockCache {
    cache: LruCache<usize, BlockLines>,
    current_size: usize,
    max_size: usize,
}

impl BlockCache {
    pub fn new(max_size: usize) -> Self {
        BlockCache {
            cache: LruCache::unbounded(),
            current_size: 0,
            max_size,
        }
    }

    /// Get a block's lines, marking the entry as recently used.
    pub fn get(&mut self, pos: usize) -> Option<BlockLines> {
        self.cache.get(&pos).cloned()
    }

    /// Insert a block, evicting LRU entries if the budget would overflow.
    /// A single block larger than the whole budget is not cached at all.
    pub fn put(&mut self, pos: usize, lines: BlockLines) {
        let value_size = entry_size(&lines);

        if value_size > self.max_size {
            return;
        }

        if let Some(old) = self.cache.peek(&pos) {
            self.current_size = self.current_size.saturating_sub(entry_size(old));
        }

        while self.current_size + value_size > self.max_size && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_size = self.current_size.saturating_sub(entry_size(&evicted));
            }
        }

        self.current_size += value_size;
        self.cache.push(pos, lines);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Current retained size in bytes.
    pub fn current_bytes(&self) -> usize {
        self.current_size
    }
}

fn entry_size(lines: &[String]) -> usize {
    lines.iter().map(|line| line.len()).sum()
}
