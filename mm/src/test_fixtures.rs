//! Shared helpers for the allocator test suites.

use core::ffi::c_void;

use crate::block_alloc::{
    heap_allocate, heap_check, heap_free, heap_init_with_policy, heap_reallocate,
};
use crate::search::SearchPolicy;

/// Deterministic pseudo-random stream for trace tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
}

/// Fill a payload with a seed-derived byte pattern.
pub fn fill_payload(payload: *mut c_void, bytes: usize, seed: u8) {
    let bytes_ptr = payload as *mut u8;
    for i in 0..bytes {
        // SAFETY: the caller passes a payload at least `bytes` long.
        unsafe { bytes_ptr.add(i).write(seed.wrapping_add(i as u8)) };
    }
}

/// Check that a payload still carries the seed-derived pattern.
pub fn verify_payload(payload: *const c_void, bytes: usize, seed: u8) -> bool {
    let bytes_ptr = payload as *const u8;
    for i in 0..bytes {
        // SAFETY: as in `fill_payload`.
        let byte = unsafe { bytes_ptr.add(i).read() };
        if byte != seed.wrapping_add(i as u8) {
            return false;
        }
    }
    true
}

/// Drive a deterministic mixed allocate/free/reallocate trace against a
/// fresh heap, checking integrity and payload contents after every step.
/// Returns false on the first violation.
pub fn run_mixed_trace(policy: SearchPolicy, steps: usize, seed: u64) -> bool {
    if heap_init_with_policy(policy) != 0 {
        return false;
    }
    let mut rng = Lcg::new(seed);
    let mut live: [Option<(*mut c_void, usize, u8)>; 16] = [None; 16];

    for _ in 0..steps {
        let slot = (rng.next_u32() as usize) % live.len();
        match live[slot] {
            None => {
                let bytes = 1 + (rng.next_u32() as usize) % 200;
                let pattern = rng.next_u32() as u8;
                let payload = heap_allocate(bytes);
                if payload.is_null() {
                    return false;
                }
                fill_payload(payload, bytes, pattern);
                live[slot] = Some((payload, bytes, pattern));
            }
            Some((payload, bytes, pattern)) => {
                if rng.next_u32() % 3 == 0 {
                    let new_bytes = 1 + (rng.next_u32() as usize) % 400;
                    let moved = heap_reallocate(payload, new_bytes);
                    if moved.is_null() {
                        return false;
                    }
                    if !verify_payload(moved, bytes.min(new_bytes), pattern) {
                        return false;
                    }
                    fill_payload(moved, new_bytes, pattern);
                    live[slot] = Some((moved, new_bytes, pattern));
                } else {
                    if !verify_payload(payload, bytes, pattern) {
                        return false;
                    }
                    heap_free(payload);
                    live[slot] = None;
                }
            }
        }
        if !heap_check() {
            return false;
        }
    }

    for entry in live.iter_mut() {
        if let Some((payload, bytes, pattern)) = entry.take() {
            if !verify_payload(payload, bytes, pattern) {
                return false;
            }
            heap_free(payload);
        }
    }
    heap_check()
}
