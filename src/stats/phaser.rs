//! Writer/reader phase coordination for double-buffered recording.
//!
//! Writers enter a critical section with a single `fetch_add` and learn
//! which phase (buffer) they belong to from the sign of the returned epoch.
//! The reader flips the phase and then waits until every writer that entered
//! the old phase has exited. Writers never wait on the reader.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug)]
pub struct Phaser {
    start_epoch: AtomicI64,
    even_end_epoch: AtomicI64,
    odd_end_epoch: AtomicI64,
}

/// Ticket handed to a writer for the duration of one critical section.
#[derive(Debug, Clone, Copy)]
#[must_use = "a writer ticket must be passed back to `Phaser::exit`"]
pub struct WriterTicket(i64);

impl WriterTicket {
    /// Buffer index (0 or 1) this writer must record into.
    #[inline]
    pub fn buffer(self) -> usize {
        (self.0 < 0) as usize
    }
}

impl Phaser {
    pub fn new() -> Self {
        Self {
            start_epoch: AtomicI64::new(0),
            even_end_epoch: AtomicI64::new(0),
            odd_end_epoch: AtomicI64::new(i64::MIN),
        }
    }

    #[inline]
    pub fn enter(&self) -> WriterTicket {
        WriterTicket(self.start_epoch.fetch_add(1, Ordering::SeqCst))
    }

    #[inline]
    pub fn exit(&self, ticket: WriterTicket) {
        if ticket.0 < 0 {
            self.odd_end_epoch.fetch_add(1, Ordering::SeqCst);
        } else {
            self.even_end_epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Buffer index new writers are currently directed to.
    pub fn active_buffer(&self) -> usize {
        (self.start_epoch.load(Ordering::SeqCst) < 0) as usize
    }

    /// Switch writers to the other buffer and wait for stragglers in the old one.
    ///
    /// Returns the index of the buffer that is now quiescent. Callers must
    /// serialize flips (there is exactly one reader).
    pub fn flip(&self) -> usize {
        let next_is_even = self.start_epoch.load(Ordering::SeqCst) < 0;
        let initial = if next_is_even { 0 } else { i64::MIN };
        if next_is_even {
            self.even_end_epoch.store(initial, Ordering::SeqCst);
        } else {
            self.odd_end_epoch.store(initial, Ordering::SeqCst);
        }

        let start_at_flip = self.start_epoch.swap(initial, Ordering::SeqCst);
        let old_end = if next_is_even {
            &self.odd_end_epoch
        } else {
            &self.even_end_epoch
        };

        let mut spins = 0u32;
        while old_end.load(Ordering::SeqCst) != start_at_flip {
            if spins < 64 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                std::thread::yield_now();
            }
        }

        if next_is_even {
            1
        } else {
            0
        }
    }
}

impl Default for Phaser {
    fn default() -> Self {
        Self::new()
    }
}
