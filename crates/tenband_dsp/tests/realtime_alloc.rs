//! Real-time Allocation Tests
//!
//! The processing path must not touch the heap once the bank has seen its
//! channel count. A counting global allocator records allocations made by
//! the current test thread only, so tests can run in parallel.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use tenband_dsp::{Band, BankConfig, FilterBank, MAX_GAIN_DB};

// ============================================================================
// TEST UTILITIES
// ============================================================================

struct CountingAllocator;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static COUNTING: Cell<bool> = const { Cell::new(false) };
}

fn counting() -> bool {
    COUNTING.try_with(|c| c.get()).unwrap_or(false)
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if counting() {
            ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        }
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if counting() {
            ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        }
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

/// Allocations made by this thread while running `f`
///
/// Other threads only ever add to the counter while their own flag is set,
/// and no other test sets it while this one is measuring on its thread.
fn allocations_during<F: FnOnce()>(f: F) -> usize {
    let before = ALLOCATIONS.load(Ordering::SeqCst);
    COUNTING.with(|c| c.set(true));
    f();
    COUNTING.with(|c| c.set(false));
    ALLOCATIONS.load(Ordering::SeqCst) - before
}

const FRAMES: usize = 256;

fn stereo_block() -> Vec<f32> {
    (0..FRAMES * 2).map(|i| (i as f32 * 0.01).sin() * 0.5).collect()
}

/// Bank that has already processed one stereo block
fn warmed_bank() -> (FilterBank, Vec<f32>) {
    let mut bank = FilterBank::new(BankConfig::default()).unwrap();
    let mut buffer = stereo_block();
    bank.process_interleaved(&mut buffer, 2);
    (bank, buffer)
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_steady_gains_do_not_allocate() {
    let (mut bank, mut buffer) = warmed_bank();
    for band in Band::ALL {
        bank.set_band_gain(band, 4.0).unwrap();
    }

    let count = allocations_during(|| {
        for _ in 0..1000 {
            bank.process_interleaved(&mut buffer, 2);
        }
    });
    assert_eq!(count, 0);
}

#[test]
fn test_gain_changes_do_not_allocate() {
    let (mut bank, mut buffer) = warmed_bank();
    let control = bank.control();

    let count = allocations_during(|| {
        for i in 0..1000 {
            let band = Band::ALL[i % Band::ALL.len()];
            // Crosses the skip threshold too, so sections enable and disable
            let gain = [0.0, 6.0, -9.0, 0.05][i % 4];
            let _ = control.set_band_gain(band, gain);
            bank.process_interleaved(&mut buffer, 2);
        }
        control.reset_all();
        bank.process_interleaved(&mut buffer, 2);
    });
    assert_eq!(count, 0);
}

#[test]
fn test_rejected_gain_does_not_reach_audio_path() {
    let (mut bank, mut buffer) = warmed_bank();
    bank.set_gain("1 kHz", MAX_GAIN_DB).unwrap();

    // Rejected on the control side, where allocating the error is fine
    assert!(bank.set_gain("1 kHz", 1.0e6).is_err());
    assert_eq!(bank.gain(Band::Khz1), MAX_GAIN_DB);

    let count = allocations_during(|| {
        for _ in 0..100 {
            bank.process_interleaved(&mut buffer, 2);
        }
    });
    assert_eq!(count, 0);
    assert!(buffer.iter().all(|s| s.is_finite() && (-1.0..=1.0).contains(s)));
}

#[test]
fn test_planar_processing_does_not_allocate() {
    let mut bank = FilterBank::new(BankConfig::default()).unwrap();
    bank.set_gain("60 Hz", 3.0).unwrap();
    bank.set_gain("16 kHz", -3.0).unwrap();

    let mut channels = vec![vec![0.25_f32; FRAMES], vec![-0.25_f32; FRAMES]];
    bank.process_planar(&mut channels);

    let count = allocations_during(|| {
        for _ in 0..100 {
            bank.process_planar(&mut channels);
        }
    });
    assert_eq!(count, 0);
}
