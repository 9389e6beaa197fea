//! Lazily allocated cell storage shared by both raster variants.
//!
//! [`SparseCells`] is a two-level table: a fixed array of *rows*, each
//! row a fixed array of [`CellBlock`]s, each block a dense
//! `times × materials` grid of counters and mass accumulators.
//!
//! ```text
//! SparseCells
//! └── rows: [OnceLock<Row>; row_count]          (allocated on first touch)
//!     └── Row: [OnceLock<CellBlock>; row_len]   (allocated on first touch)
//!         └── CellBlock { lock, counts[t*m], mass[t*m] }
//! ```
//!
//! First-touch allocation goes through `OnceLock::get_or_init`, which
//! runs the initializer exactly once even when several writers race on
//! the same row or cell. Contention is scoped to the row being warmed
//! up, never the whole table. Nothing is freed until [`reset`](SparseCells::reset).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::config::SyncPolicy;
use crate::lock::CellLock;

/// Counters and mass for one spatial cell across all times and materials.
///
/// Slot layout is `time_index * materials + material`.
pub struct CellBlock<L> {
    lock: L,
    counts: Box<[AtomicU32]>,
    mass: Box<[AtomicU64]>,
    materials: usize,
}

impl<L: CellLock> CellBlock<L> {
    fn new(times: usize, materials: usize) -> Self {
        let len = times * materials;
        Self {
            lock: L::default(),
            counts: (0..len).map(|_| AtomicU32::new(0)).collect(),
            mass: (0..len).map(|_| AtomicU64::new(0f64.to_bits())).collect(),
            materials,
        }
    }

    /// Add one particle of `mass` at `(time_index, material)`.
    ///
    /// Caller guarantees the indices are in range.
    fn record(&self, slot: usize, mass: f64, policy: SyncPolicy) {
        match policy {
            SyncPolicy::Locked => self.lock.with_lock(|| self.raw_add(slot, mass)),
            SyncPolicy::Atomic => {
                self.counts[slot].fetch_add(1, Ordering::Relaxed);
                // fetch_update with a closure that always returns Some never fails.
                let _ = self.mass[slot].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some((f64::from_bits(bits) + mass).to_bits())
                });
            }
            SyncPolicy::Unsynchronized => self.raw_add(slot, mass),
        }
    }

    /// Load-then-store update. Exact only when the caller holds the cell lock.
    fn raw_add(&self, slot: usize, mass: f64) {
        let c = self.counts[slot].load(Ordering::Relaxed);
        self.counts[slot].store(c.wrapping_add(1), Ordering::Relaxed);
        let m = f64::from_bits(self.mass[slot].load(Ordering::Relaxed));
        self.mass[slot].store((m + mass).to_bits(), Ordering::Relaxed);
    }

    fn count(&self, slot: usize) -> u32 {
        self.counts[slot].load(Ordering::Relaxed)
    }

    fn mass_at(&self, slot: usize) -> f64 {
        f64::from_bits(self.mass[slot].load(Ordering::Relaxed))
    }

    /// Sum of counts over all materials at one time index.
    fn material_sum(&self, time_index: usize) -> u32 {
        let base = time_index * self.materials;
        self.counts[base..base + self.materials]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// Largest material-summed count over all time indices.
    fn max_material_sum(&self) -> u32 {
        self.counts
            .chunks(self.materials)
            .map(|chunk| chunk.iter().map(|c| c.load(Ordering::Relaxed)).sum::<u32>())
            .max()
            .unwrap_or(0)
    }

    fn mass_total(&self) -> f64 {
        self.mass
            .iter()
            .map(|m| f64::from_bits(m.load(Ordering::Relaxed)))
            .sum()
    }
}

type Row<L> = Box<[OnceLock<CellBlock<L>>]>;

/// Two-level lazily allocated table of [`CellBlock`]s.
pub struct SparseCells<L> {
    rows: Box<[OnceLock<Row<L>>]>,
    row_len: usize,
    cell_count: usize,
    times: usize,
    materials: usize,
}

impl<L: CellLock> SparseCells<L> {
    /// Create an empty table for `cell_count` cells grouped into rows of `row_len`.
    pub fn new(cell_count: usize, row_len: usize, times: usize, materials: usize) -> Self {
        let row_len = row_len.max(1);
        let row_count = cell_count.div_ceil(row_len);
        Self {
            rows: (0..row_count).map(|_| OnceLock::new()).collect(),
            row_len,
            cell_count,
            times,
            materials,
        }
    }

    /// Total addressable cells.
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Time dimension.
    pub fn times(&self) -> usize {
        self.times
    }

    /// Material dimension.
    pub fn materials(&self) -> usize {
        self.materials
    }

    fn block(&self, cell: usize) -> Option<&CellBlock<L>> {
        let row = self.rows.get(cell / self.row_len)?.get()?;
        row[cell % self.row_len].get()
    }

    /// Get or allocate the block for `cell`. Caller checks `cell < cell_count`.
    fn block_or_init(&self, cell: usize) -> &CellBlock<L> {
        let row_len = self.row_len;
        let row = self.rows[cell / row_len]
            .get_or_init(|| (0..row_len).map(|_| OnceLock::new()).collect());
        row[cell % row_len].get_or_init(|| CellBlock::new(self.times, self.materials))
    }

    fn slot(&self, time_index: usize, material: usize) -> Option<usize> {
        (time_index < self.times && material < self.materials)
            .then_some(time_index * self.materials + material)
    }

    /// Record one particle. Returns `false` (and changes nothing) when any
    /// index is out of range.
    pub fn record(
        &self,
        cell: usize,
        time_index: usize,
        material: usize,
        mass: f64,
        policy: SyncPolicy,
    ) -> bool {
        if cell >= self.cell_count {
            return false;
        }
        let Some(slot) = self.slot(time_index, material) else {
            return false;
        };
        self.block_or_init(cell).record(slot, mass, policy);
        true
    }

    /// Particle count at `(cell, time_index, material)`; 0 if untouched or out of range.
    pub fn count(&self, cell: usize, time_index: usize, material: usize) -> u32 {
        match (self.block(cell), self.slot(time_index, material)) {
            (Some(block), Some(slot)) => block.count(slot),
            _ => 0,
        }
    }

    /// Accumulated mass at `(cell, time_index, material)`.
    pub fn mass(&self, cell: usize, time_index: usize, material: usize) -> f64 {
        match (self.block(cell), self.slot(time_index, material)) {
            (Some(block), Some(slot)) => block.mass_at(slot),
            _ => 0.0,
        }
    }

    /// Count summed over materials at `(cell, time_index)`.
    pub fn material_sum(&self, cell: usize, time_index: usize) -> u32 {
        match self.block(cell) {
            Some(block) if time_index < self.times => block.material_sum(time_index),
            _ => 0,
        }
    }

    /// Mass summed over all times and materials of `cell`.
    pub fn mass_total(&self, cell: usize) -> f64 {
        self.block(cell).map_or(0.0, CellBlock::mass_total)
    }

    /// Iterate `(cell, block)` over allocated cells only.
    fn allocated(&self) -> impl Iterator<Item = (usize, &CellBlock<L>)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.get().into_iter().flat_map(move |row| {
                row.iter()
                    .enumerate()
                    .filter_map(move |(i, b)| b.get().map(|b| (r * self.row_len + i, b)))
            })
        })
    }

    /// Largest material-summed count over all cells and times.
    pub fn max_count(&self) -> u32 {
        self.allocated()
            .map(|(_, b)| b.max_material_sum())
            .max()
            .unwrap_or(0)
    }

    /// Total particle count across the whole table.
    pub fn total_count(&self) -> u64 {
        self.allocated()
            .map(|(_, b)| b.counts.iter().map(|c| c.load(Ordering::Relaxed) as u64).sum::<u64>())
            .sum()
    }

    /// Number of cells with backing storage.
    pub fn allocated_cells(&self) -> usize {
        self.allocated().count()
    }

    /// Indices of cells with backing storage, ascending.
    pub fn allocated_cell_ids(&self) -> Vec<usize> {
        self.allocated().map(|(c, _)| c).collect()
    }

    /// Force-release every allocated cell lock. Returns how many were held,
    /// or `None` when the lock type does not support it.
    pub fn force_release_all(&self) -> Option<usize> {
        let mut released = 0;
        for (_, block) in self.allocated() {
            if block.lock.force_release()? {
                released += 1;
            }
        }
        Some(released)
    }

    /// Direct access to a cell lock, for tests that simulate dead writers.
    #[cfg(test)]
    pub(crate) fn lock_of(&self, cell: usize) -> Option<&L> {
        self.block(cell).map(|b| &b.lock)
    }

    /// Ensure `cell` has storage, for tests that need a lock handle.
    #[cfg(test)]
    pub(crate) fn touch(&self, cell: usize) {
        if cell < self.cell_count {
            self.block_or_init(cell);
        }
    }

    /// Drop all storage. `&mut self` rules out concurrent writers.
    pub fn reset(&mut self) {
        self.rows = (0..self.rows.len()).map(|_| OnceLock::new()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{MutexCellLock, SpinCellLock};
    use std::sync::Arc;
    use std::thread;

    fn table(cells: usize) -> SparseCells<MutexCellLock> {
        SparseCells::new(cells, 4, 3, 2)
    }

    #[test]
    fn untouched_cells_read_zero_and_allocate_nothing() {
        let t = table(10);
        assert_eq!(t.count(3, 1, 1), 0);
        assert_eq!(t.mass(3, 1, 1), 0.0);
        assert_eq!(t.max_count(), 0);
        assert_eq!(t.allocated_cells(), 0);
    }

    #[test]
    fn record_allocates_only_touched_cell() {
        let t = table(10);
        assert!(t.record(9, 2, 1, 0.5, SyncPolicy::Locked));
        assert_eq!(t.allocated_cells(), 1);
        assert_eq!(t.allocated_cell_ids(), vec![9]);
        assert_eq!(t.count(9, 2, 1), 1);
        assert!((t.mass(9, 2, 1) - 0.5).abs() < 1e-12);
        assert_eq!(t.material_sum(9, 2), 1);
        assert_eq!(t.count(8, 2, 1), 0);
    }

    #[test]
    fn out_of_range_record_is_noop() {
        let t = table(10);
        assert!(!t.record(10, 0, 0, 1.0, SyncPolicy::Locked));
        assert!(!t.record(0, 3, 0, 1.0, SyncPolicy::Locked));
        assert!(!t.record(0, 0, 2, 1.0, SyncPolicy::Locked));
        assert_eq!(t.allocated_cells(), 0);
        assert_eq!(t.total_count(), 0);
    }

    #[test]
    fn max_count_sums_materials_per_time() {
        let t = table(10);
        t.record(1, 0, 0, 1.0, SyncPolicy::Atomic);
        t.record(1, 0, 1, 1.0, SyncPolicy::Atomic);
        t.record(2, 1, 0, 1.0, SyncPolicy::Atomic);
        assert_eq!(t.max_count(), 2);
        assert_eq!(t.total_count(), 3);
        assert!((t.mass_total(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_everything() {
        let mut t = table(10);
        t.record(1, 0, 0, 1.0, SyncPolicy::Locked);
        t.reset();
        assert_eq!(t.count(1, 0, 0), 0);
        assert_eq!(t.max_count(), 0);
        assert_eq!(t.allocated_cells(), 0);
    }

    #[test]
    fn concurrent_first_touch_allocates_once() {
        let t = Arc::new(table(64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&t);
                thread::spawn(move || {
                    for cell in 0..64 {
                        t.record(cell, 0, 0, 1.0, SyncPolicy::Locked);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for cell in 0..64 {
            assert_eq!(t.count(cell, 0, 0), 8, "cell {cell}");
        }
        assert_eq!(t.allocated_cells(), 64);
    }

    #[test]
    fn force_release_depends_on_lock_type() {
        let m = table(4);
        m.touch(0);
        assert_eq!(m.force_release_all(), None);

        let s: SparseCells<SpinCellLock> = SparseCells::new(4, 2, 1, 1);
        s.touch(0);
        s.touch(3);
        s.lock_of(3).unwrap().leak_acquire();
        assert_eq!(s.force_release_all(), Some(1));
        assert!(!s.lock_of(3).unwrap().is_held());
    }
}
