use std::sync::{Condvar, Mutex};

/// One-shot countdown rendezvous.
///
/// Created with an initial count; [`count_down`](Latch::count_down) may be
/// called from any thread, and every thread blocked in
/// [`wait`](Latch::wait) is released together when the count reaches zero.
/// Counting down past zero is a no-op (the count saturates); the latch is
/// not reusable.
pub struct Latch {
    count: Mutex<usize>,
    condition: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            condition: Condvar::new(),
        }
    }

    /// Block until the count reaches zero. Returns immediately if it
    /// already has.
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("latch count lock poisoned");
        while *count > 0 {
            count = self
                .condition
                .wait(count)
                .expect("latch count lock poisoned");
        }
    }

    /// Decrement the count, waking all waiters on the transition to zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock().expect("latch count lock poisoned");
        match *count {
            0 => {}
            1 => {
                *count = 0;
                self.condition.notify_all();
            }
            _ => *count -= 1,
        }
    }

    pub fn current_count(&self) -> usize {
        *self.count.lock().expect("latch count lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::Latch;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_at_zero() {
        let latch = Latch::new(0);
        latch.wait();
    }

    #[test]
    fn count_down_past_zero_saturates() {
        let latch = Latch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.current_count(), 0);
        latch.wait();
    }

    #[test]
    fn three_decrements_release_a_waiter() {
        let latch = Arc::new(Latch::new(3));
        let decrements_seen = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let latch = latch.clone();
            let decrements_seen = decrements_seen.clone();
            thread::spawn(move || {
                latch.wait();
                decrements_seen.load(Ordering::SeqCst)
            })
        };

        let mut decrementers = Vec::new();
        for _ in 0..3 {
            let latch = latch.clone();
            let decrements_seen = decrements_seen.clone();
            decrementers.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                decrements_seen.fetch_add(1, Ordering::SeqCst);
                latch.count_down();
            }));
        }

        for decrementer in decrementers {
            decrementer.join().expect("decrementer thread panicked");
        }
        let seen_at_release = waiter.join().expect("waiter thread panicked");
        assert_eq!(seen_at_release, 3, "waiter released before all decrements");
    }

    #[test]
    fn wait_after_all_decrements_does_not_block() {
        let latch = Latch::new(2);
        latch.count_down();
        latch.count_down();
        latch.wait();
        latch.wait();
    }

    #[test]
    fn multiple_waiters_released_together() {
        let latch = Arc::new(Latch::new(1));
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let latch = latch.clone();
            waiters.push(thread::spawn(move || latch.wait()));
        }
        thread::sleep(Duration::from_millis(10));
        latch.count_down();
        for waiter in waiters {
            waiter.join().expect("waiter thread panicked");
        }
    }
}
