//! The arena: allocation, release, coalescing, and integrity checks.

use std::fmt;
use std::ptr::NonNull;

use shoal_core::align::{align_up, ALLOCATED_PATTERN, FREED_PATTERN, MEMORY_CANARY};
use shoal_core::{AllocationStrategy, ArenaConfig, ArenaError, ArenaId};
use tracing::{debug, error, trace, warn};

use crate::block::{Block, BlockId, BlockTable};
use crate::free_list::FreeList;
use crate::lock::{LockPolicy, SingleThreaded, ThreadSafe};
use crate::raw::RawBuffer;
use crate::stats::{ArenaStats, StatsSnapshot};

/// Public view of one block, for inspection and debugging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Header offset from the arena start.
    pub offset: usize,
    /// Usable bytes after the header.
    pub size: usize,
    /// Whether the block is currently allocated.
    pub used: bool,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            offset: block.offset,
            size: block.size,
            used: block.used,
        }
    }
}

/// Mutable bookkeeping guarded by the lock policy.
struct ArenaState {
    blocks: BlockTable,
    free: FreeList,
}

impl ArenaState {
    fn new(capacity: usize, header: usize) -> Self {
        let mut blocks = BlockTable::new();
        let first = blocks.reset(capacity, header);
        let free = FreeList::new(&mut blocks, first);
        Self { blocks, free }
    }

    fn largest_free(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| !b.used)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }
}

/// Fixed-capacity arena with a free-list allocator.
///
/// `L` selects thread safety: [`ThreadSafe`] (the default) guards state
/// with a reader-writer lock and is `Send + Sync`; [`SingleThreaded`]
/// uses a `RefCell` and is `!Sync`.
///
/// All sizes are rounded up to the configured alignment, and every
/// returned pointer is aligned to it. Each block additionally occupies
/// [`header_size`](Self::header_size) bytes of the buffer.
pub struct Arena<L: LockPolicy = ThreadSafe> {
    id: ArenaId,
    config: ArenaConfig,
    header: usize,
    buffer: RawBuffer,
    state: L::Cell<ArenaState>,
    stats: ArenaStats,
}

/// Arena without internal locking.
pub type LocalArena = Arena<SingleThreaded>;

// Compile-time assertion: the default arena is shareable across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Arena<ThreadSafe>>();
};

impl Arena<ThreadSafe> {
    /// Create a thread-safe arena from a validated config.
    ///
    /// See [`with_policy`](Self::with_policy) for the errors returned.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::with_policy(config)
    }

    /// Create a thread-safe arena of `capacity` bytes with default settings.
    pub fn with_capacity(capacity: usize) -> Result<Self, ArenaError> {
        Self::new(ArenaConfig::new(capacity))
    }
}

impl<L: LockPolicy> Arena<L> {
    /// Create an arena with lock policy `L` from a validated config.
    ///
    /// The whole buffer starts out as one free block. Use
    /// `LocalArena::with_policy` for a single-threaded arena.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config fails validation, or
    /// `OutOfMemory` if the backing buffer cannot be obtained.
    pub fn with_policy(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let header = config.header_size();
        let buffer = RawBuffer::new(config.capacity, config.alignment).ok_or(
            ArenaError::OutOfMemory {
                requested: config.capacity,
                largest_free: 0,
            },
        )?;
        let state = format_buffer(&buffer, &config, header);
        let id = ArenaId::next();
        debug!(
            arena = %id,
            capacity = config.capacity,
            alignment = config.alignment,
            strategy = %config.strategy,
            thread_safe = L::THREAD_SAFE,
            "arena created"
        );
        Ok(Self {
            id,
            config,
            header,
            buffer,
            state: L::new_cell(state),
            stats: ArenaStats::new(),
        })
    }

    /// Allocate at least `size` bytes.
    ///
    /// The returned pointer is aligned to [`alignment`](Self::alignment)
    /// and valid for reads and writes of `size` bytes until it is passed
    /// to [`deallocate`](Self::deallocate) or the arena is reset or dropped.
    ///
    /// # Errors
    ///
    /// `ZeroSizedRequest` for `size == 0`; `OutOfMemory` when no free block
    /// is large enough (the arena is left unchanged apart from the failure
    /// counter).
    ///
    /// # Panics
    ///
    /// Panics if a block visited during the free-list scan fails its
    /// integrity check.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedRequest);
        }
        L::write(&self.state, |state| self.allocate_in(state, size))
    }

    fn allocate_in(&self, state: &mut ArenaState, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let request = align_up(size, self.config.alignment).filter(|&r| r <= self.config.capacity);
        let candidate = match request {
            Some(request) => {
                let scan = state.free.select(
                    &state.blocks,
                    self.config.strategy,
                    request,
                    |block| self.check_block(block),
                );
                match scan {
                    Ok(candidate) => candidate,
                    Err(err) => self.corrupted(err),
                }
            }
            None => None,
        };

        let (Some(request), Some(id)) = (request, candidate) else {
            self.stats.record_failed_allocation();
            let requested = request.unwrap_or(size);
            let largest_free = state.largest_free();
            debug!(
                arena = %self.id,
                requested,
                largest_free,
                strategy = %self.config.strategy,
                "allocation failed: no free block large enough"
            );
            return Err(ArenaError::OutOfMemory {
                requested,
                largest_free,
            });
        };

        let available = state.blocks.get(id).size;
        if available >= request + self.header + self.config.alignment {
            let rest = state.blocks.split(id, request, self.header);
            state.free.replace(&mut state.blocks, id, rest);
            let rest = state.blocks.get(rest);
            self.stamp(rest);
            trace!(
                arena = %self.id,
                offset = rest.offset,
                size = rest.size,
                "split remainder returned to free list"
            );
        } else {
            state.free.remove(&mut state.blocks, id);
        }

        let block = state.blocks.get_mut(id);
        block.used = true;
        let block = state.blocks.get(id);
        self.stamp(block);

        let data = block.offset + self.header;
        if self.config.fill_patterns {
            self.buffer.fill(data, block.size, ALLOCATED_PATTERN);
        }
        self.stats.record_allocation(block.size);
        Ok(self.buffer.ptr_at(data))
    }

    /// Return a block to the arena.
    ///
    /// A null `ptr` is ignored. When coalescing on free is enabled, the
    /// block is merged with any free physical neighbours.
    ///
    /// # Errors
    ///
    /// `ForeignPointer` if `ptr` is not the data start of a block in this
    /// arena; `DoubleFree` if the block is already free. A pointer whose
    /// block has since been merged into a neighbour reports
    /// `ForeignPointer`. In every error case the arena is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the block or a neighbour fails its integrity check.
    ///
    /// # Safety
    ///
    /// If `ptr` was returned by [`allocate`](Self::allocate) on this arena,
    /// nothing may read or write through it (or any pointer derived from
    /// it) after this call.
    #[allow(unsafe_code)]
    pub unsafe fn deallocate(&self, ptr: *mut u8) -> Result<(), ArenaError> {
        if ptr.is_null() {
            return Ok(());
        }
        L::write(&self.state, |state| self.deallocate_in(state, ptr as usize))
    }

    fn deallocate_in(&self, state: &mut ArenaState, address: usize) -> Result<(), ArenaError> {
        let found = self
            .buffer
            .offset_of(address)
            .and_then(|data| data.checked_sub(self.header))
            .and_then(|offset| state.blocks.find(offset));
        let Some(id) = found else {
            warn!(arena = %self.id, address, "deallocate: pointer is not a block in this arena");
            return Err(ArenaError::ForeignPointer { address });
        };

        let block = state.blocks.get(id);
        if let Err(err) = self.check_block(block) {
            self.corrupted(err);
        }
        if !block.used {
            warn!(arena = %self.id, offset = block.offset, "deallocate: block is already free");
            return Err(ArenaError::DoubleFree {
                offset: block.offset,
            });
        }

        let (offset, size) = (block.offset, block.size);
        state.blocks.get_mut(id).used = false;
        if self.config.fill_patterns {
            self.buffer.fill(offset + self.header, size, FREED_PATTERN);
        }
        self.stats.record_deallocation(size);
        state.free.push_front(&mut state.blocks, id);

        if self.config.coalesce_on_free {
            self.coalesce(state, id);
        }
        Ok(())
    }

    /// Merge `id` (just freed) with free physical neighbours.
    fn coalesce(&self, state: &mut ArenaState, id: BlockId) {
        if let Some(next) = state.blocks.get(id).next {
            if self.is_free_neighbour(state, next) {
                self.merge_with_next(state, id);
            }
        }
        if let Some(prev) = state.blocks.get(id).prev {
            if self.is_free_neighbour(state, prev) {
                self.merge_with_next(state, prev);
            }
        }
    }

    fn is_free_neighbour(&self, state: &ArenaState, id: BlockId) -> bool {
        let block = state.blocks.get(id);
        if let Err(err) = self.check_block(block) {
            self.corrupted(err);
        }
        !block.used
    }

    /// Absorb the physical successor of `front`. Both must be free.
    fn merge_with_next(&self, state: &mut ArenaState, front: BlockId) {
        if let Some(back) = state.blocks.get(front).next {
            state.free.remove(&mut state.blocks, back);
        }
        let absorbed = state.blocks.absorb_next(front, self.header);
        let merged = state.blocks.get(front);
        self.stamp(merged);
        if self.config.fill_patterns {
            self.buffer.fill(absorbed.offset, self.header, FREED_PATTERN);
        }
        trace!(
            arena = %self.id,
            offset = merged.offset,
            absorbed = absorbed.offset,
            size = merged.size,
            "merged adjacent free blocks"
        );
    }

    /// Merge every run of adjacent free blocks. Returns the number of
    /// merges performed.
    ///
    /// Passes over the physical chain repeat until one completes without
    /// merging anything.
    ///
    /// # Panics
    ///
    /// Panics if a visited block fails its integrity check.
    pub fn defragment(&self) -> usize {
        L::write(&self.state, |state| {
            let mut merges = 0;
            loop {
                let before = merges;
                let mut cursor = state.blocks.first();
                while let Some(id) = cursor {
                    let block = state.blocks.get(id);
                    if let Err(err) = self.check_block(block) {
                        self.corrupted(err);
                    }
                    let (free, next) = (!block.used, block.next);
                    match next {
                        Some(next) if free && self.is_free_neighbour(state, next) => {
                            self.merge_with_next(state, id);
                            merges += 1;
                        }
                        next => cursor = next,
                    }
                }
                if merges == before {
                    break;
                }
            }
            debug!(
                arena = %self.id,
                merges,
                free_blocks = state.free.len(),
                "defragment complete"
            );
            merges
        })
    }

    /// Whether every structural and integrity check passes.
    ///
    /// Never panics. See [`verify`](Self::verify) for the failure detail.
    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Walk the block chain and the free list and report the first
    /// problem found.
    ///
    /// Checks that blocks tile the buffer without gap or overlap, that
    /// back-links and the offset index agree with the chain, that every
    /// record and in-buffer header carries its expected tag and canary,
    /// and that the free list holds exactly the free blocks, once each.
    ///
    /// # Errors
    ///
    /// Returns `Corruption { offset, detail }` describing the first failure.
    pub fn verify(&self) -> Result<(), ArenaError> {
        L::read(&self.state, |state| self.verify_in(state))
    }

    fn verify_in(&self, state: &ArenaState) -> Result<(), ArenaError> {
        let corrupt = |offset, detail| ArenaError::Corruption { offset, detail };
        let blocks = &state.blocks;

        let mut expected = 0usize;
        let mut prev: Option<BlockId> = None;
        let mut cursor = blocks.first();
        let mut walked = 0usize;
        let mut free_count = 0usize;
        while let Some(id) = cursor {
            let Some(block) = blocks.try_get(id) else {
                return Err(corrupt(expected, "block chain references a released record"));
            };
            if block.offset != expected {
                return Err(corrupt(expected, "gap or overlap in block chain"));
            }
            if block.prev != prev {
                return Err(corrupt(block.offset, "physical back-link mismatch"));
            }
            if blocks.find(block.offset) != Some(id) {
                return Err(corrupt(block.offset, "offset index disagrees with block chain"));
            }
            self.check_block(block)?;
            expected = match block.offset.checked_add(block.footprint(self.header)) {
                Some(end) if end <= self.config.capacity => end,
                _ => return Err(corrupt(block.offset, "block extends past arena end")),
            };
            if !block.used {
                free_count += 1;
            }
            walked += 1;
            if walked > blocks.len() {
                return Err(corrupt(block.offset, "cycle in block chain"));
            }
            prev = Some(id);
            cursor = block.next;
        }
        if expected != self.config.capacity {
            return Err(corrupt(expected, "block chain does not reach arena end"));
        }
        if walked != blocks.len() {
            return Err(corrupt(expected, "block records unreachable from chain"));
        }

        let mut listed = 0usize;
        let mut cursor = state.free.head();
        while let Some(id) = cursor {
            let Some(block) = blocks.try_get(id) else {
                return Err(corrupt(0, "free list references a released record"));
            };
            if block.used {
                return Err(corrupt(block.offset, "allocated block on free list"));
            }
            listed += 1;
            if listed > free_count {
                return Err(corrupt(block.offset, "free list cycle or duplicate entry"));
            }
            cursor = block.next_free;
        }
        if listed != free_count || listed != state.free.len() {
            return Err(corrupt(0, "free block missing from free list"));
        }
        Ok(())
    }

    /// Whether `ptr` lies inside this arena's buffer.
    ///
    /// A pure range check: it does not say whether the address is a live
    /// allocation.
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.buffer.contains(ptr as usize)
    }

    /// Bytes held by allocated blocks, headers included.
    pub fn used(&self) -> usize {
        L::read(&self.state, |state| {
            state
                .blocks
                .iter()
                .filter(|b| b.used)
                .map(|b| b.footprint(self.header))
                .sum()
        })
    }

    /// `capacity() - used()`.
    pub fn remaining(&self) -> usize {
        self.config.capacity - self.used()
    }

    /// Return the arena to a single free block and zero the statistics.
    ///
    /// No destructors run for values still living in the arena. `&mut self`
    /// guarantees no adaptor or box still borrows it.
    pub fn reset(&mut self) {
        let fresh = format_buffer(&self.buffer, &self.config, self.header);
        let state = L::get_mut(&mut self.state);
        let dropped = state.blocks.iter().filter(|b| b.used).count();
        *state = fresh;
        self.stats.reset();
        debug!(arena = %self.id, dropped, "arena reset");
    }

    /// Multi-line statistics summary.
    pub fn stats_report(&self) -> String {
        L::read(&self.state, |_| self.stats.report())
    }

    /// Current statistics, read without taking the lock.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Total buffer size in bytes.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Alignment of every returned pointer.
    pub fn alignment(&self) -> usize {
        self.config.alignment
    }

    /// Bytes reserved in front of each block.
    pub fn header_size(&self) -> usize {
        self.header
    }

    /// Placement strategy in use.
    pub fn strategy(&self) -> AllocationStrategy {
        self.config.strategy
    }

    /// The config this arena was built from.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Process-unique identity of this arena.
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Whether this arena's lock policy is [`ThreadSafe`].
    pub fn is_thread_safe(&self) -> bool {
        L::THREAD_SAFE
    }

    /// Number of blocks, free and allocated.
    pub fn block_count(&self) -> usize {
        L::read(&self.state, |state| state.blocks.len())
    }

    /// Number of blocks on the free list.
    pub fn free_block_count(&self) -> usize {
        L::read(&self.state, |state| state.free.len())
    }

    /// Size of the largest free block, or 0 when none is free.
    pub fn largest_free_block(&self) -> usize {
        L::read(&self.state, ArenaState::largest_free)
    }

    /// Number of allocated blocks.
    pub fn live_allocations(&self) -> usize {
        L::read(&self.state, |state| state.blocks.iter().filter(|b| b.used).count())
    }

    /// Every block in address order.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        L::read(&self.state, |state| {
            state
                .blocks
                .physical()
                .map(|(_, b)| BlockInfo::from(b))
                .collect()
        })
    }

    /// Free blocks in free-list order.
    pub fn free_blocks(&self) -> Vec<BlockInfo> {
        L::read(&self.state, |state| {
            state
                .free
                .iter(&state.blocks)
                .map(|id| BlockInfo::from(state.blocks.get(id)))
                .collect()
        })
    }

    /// Record tag, then in-buffer tag and canary.
    fn check_block(&self, block: &Block) -> Result<(), ArenaError> {
        let corrupt = |detail| ArenaError::Corruption {
            offset: block.offset,
            detail,
        };
        if !block.is_intact() {
            return Err(corrupt("block record integrity tag mismatch"));
        }
        let (tag, canary) = self.buffer.read_header(block.offset);
        if tag != block.tag {
            return Err(corrupt("header integrity tag overwritten"));
        }
        if canary != MEMORY_CANARY {
            return Err(corrupt("header canary overwritten"));
        }
        Ok(())
    }

    fn stamp(&self, block: &Block) {
        self.buffer.write_header(block.offset, block.tag);
    }

    fn corrupted(&self, err: ArenaError) -> ! {
        error!(arena = %self.id, error = %err, "arena metadata corrupted");
        panic!("{err}");
    }
}

/// Build a fresh single-block state and write its header into `buffer`.
fn format_buffer(buffer: &RawBuffer, config: &ArenaConfig, header: usize) -> ArenaState {
    let state = ArenaState::new(config.capacity, header);
    for block in state.blocks.iter() {
        buffer.write_header(block.offset, block.tag);
        if config.fill_patterns {
            buffer.fill(block.offset + header, block.size, FREED_PATTERN);
        }
    }
    state
}

impl<L: LockPolicy> Drop for Arena<L> {
    fn drop(&mut self) {
        let state = L::get_mut(&mut self.state);
        let (live, bytes) = state
            .blocks
            .iter()
            .filter(|b| b.used)
            .fold((0usize, 0usize), |(n, bytes), b| (n + 1, bytes + b.size));
        if live > 0 {
            warn!(arena = %self.id, live, bytes, "arena dropped with live allocations");
        }
    }
}

impl<L: LockPolicy> fmt::Debug for Arena<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("capacity", &self.config.capacity)
            .field("alignment", &self.config.alignment)
            .field("strategy", &self.config.strategy)
            .field("thread_safe", &L::THREAD_SAFE)
            .finish_non_exhaustive()
    }
}
