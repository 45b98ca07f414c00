use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

/// Returned by [`Pipeline::produce`] when every slot is already producing
/// or ready. This is backpressure, not an error condition: the producer
/// should skip or coalesce the frame instead of blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineFull;

impl fmt::Display for PipelineFull {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "all pipeline slots are in flight")
    }
}

impl std::error::Error for PipelineFull {}

enum Slot<T> {
    Empty,
    Producing,
    Ready { payload: T, sequence: u64 },
}

impl<T> Slot<T> {
    fn is_occupied(&self) -> bool {
        !matches!(self, Self::Empty)
    }
}

struct PipelineInner<T> {
    slots: Vec<Slot<T>>,
    next_sequence: u64,
}

/// Bounded single-producer/single-consumer frame queue with newest-wins
/// delivery.
///
/// Each of the `depth` slots cycles `Empty -> Producing -> Ready -> Empty`.
/// [`produce`](Pipeline::produce) reserves a slot and hands back a scoped
/// [`ProducerContinuation`]; the sequence number is assigned when the
/// continuation completes, so ordering reflects completion order.
/// [`consume`](Pipeline::consume) is a non-blocking poll that delivers the
/// newest ready payload and recycles every older ready slot — under load
/// the consumer always sees the most recent complete frame and stale
/// frames cost memory, never latency.
///
/// Exactly one thread may produce and exactly one (other) thread may
/// consume; produce and consume may run concurrently.
pub struct Pipeline<T> {
    inner: Mutex<PipelineInner<T>>,
    depth: usize,
    produced: AtomicU64,
    dropped: AtomicU64,
}

/// Newest ready payload plus bookkeeping from the consume that delivered it.
#[derive(Debug)]
pub struct ConsumedFrame<T> {
    pub payload: T,
    pub sequence: u64,
    /// Older ready frames recycled by this consume.
    pub frames_dropped: usize,
}

/// Scoped token for a reserved pipeline slot.
///
/// [`complete`](ProducerContinuation::complete) publishes the payload;
/// dropping the token without completing releases the slot back to empty.
pub struct ProducerContinuation<'a, T> {
    pipeline: &'a Pipeline<T>,
    slot_index: usize,
    completed: bool,
}

impl<T> Pipeline<T> {
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "pipeline depth must be greater than zero");
        let mut slots = Vec::with_capacity(depth);
        for _ in 0..depth {
            slots.push(Slot::Empty);
        }
        Self {
            inner: Mutex::new(PipelineInner {
                slots,
                next_sequence: 0,
            }),
            depth,
            produced: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Reserve a slot for the next frame. Fails immediately with
    /// [`PipelineFull`] when the pipeline is at capacity; never blocks.
    pub fn produce(&self) -> Result<ProducerContinuation<'_, T>, PipelineFull> {
        let mut inner = self.inner.lock().expect("pipeline slot lock poisoned");
        let slot_index = inner
            .slots
            .iter()
            .position(|slot| !slot.is_occupied())
            .ok_or(PipelineFull)?;
        inner.slots[slot_index] = Slot::Producing;
        Ok(ProducerContinuation {
            pipeline: self,
            slot_index,
            completed: false,
        })
    }

    /// Non-blocking poll for the newest ready frame.
    ///
    /// Every other ready slot is recycled without being delivered; `None`
    /// means nothing was ready.
    pub fn consume(&self) -> Option<ConsumedFrame<T>> {
        let mut inner = self.inner.lock().expect("pipeline slot lock poisoned");
        let newest_index = inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Ready { sequence, .. } => Some((index, *sequence)),
                _ => None,
            })
            .max_by_key(|(_, sequence)| *sequence)
            .map(|(index, _)| index)?;

        let mut frames_dropped = 0;
        let mut consumed = None;
        for (index, slot) in inner.slots.iter_mut().enumerate() {
            if !matches!(slot, Slot::Ready { .. }) {
                continue;
            }
            match std::mem::replace(slot, Slot::Empty) {
                Slot::Ready { payload, sequence } if index == newest_index => {
                    consumed = Some(ConsumedFrame {
                        payload,
                        sequence,
                        frames_dropped: 0,
                    });
                }
                Slot::Ready { sequence, .. } => {
                    trace!("dropping stale pipeline frame {sequence}");
                    frames_dropped += 1;
                }
                _ => unreachable!("slot changed while locked"),
            }
        }
        drop(inner);

        self.dropped.fetch_add(frames_dropped as u64, Ordering::Relaxed);
        consumed.map(|mut frame| {
            frame.frames_dropped = frames_dropped;
            frame
        })
    }

    /// Frames completed by the producer so far.
    pub fn produced_count(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Frames recycled unseen by newest-wins consumes so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Slots currently holding a completed, undelivered frame.
    pub fn ready_count(&self) -> usize {
        let inner = self.inner.lock().expect("pipeline slot lock poisoned");
        inner
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// True when every slot is empty (nothing producing, nothing ready).
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock().expect("pipeline slot lock poisoned");
        inner.slots.iter().all(|slot| !slot.is_occupied())
    }
}

impl<T> ProducerContinuation<'_, T> {
    /// Publish the payload into the reserved slot. The sequence number is
    /// assigned here, under the slot lock, which is what makes sequences
    /// unique and completion-ordered.
    pub fn complete(mut self, payload: T) -> u64 {
        let mut inner = self
            .pipeline
            .inner
            .lock()
            .expect("pipeline slot lock poisoned");
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        debug_assert!(
            matches!(inner.slots[self.slot_index], Slot::Producing),
            "continuation slot left the producing state"
        );
        inner.slots[self.slot_index] = Slot::Ready { payload, sequence };
        drop(inner);
        self.completed = true;
        self.pipeline.produced.fetch_add(1, Ordering::Relaxed);
        sequence
    }
}

impl<T> Drop for ProducerContinuation<'_, T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // Abandoned reservation: hand the slot back.
        let mut inner = self
            .pipeline
            .inner
            .lock()
            .expect("pipeline slot lock poisoned");
        inner.slots[self.slot_index] = Slot::Empty;
    }
}
