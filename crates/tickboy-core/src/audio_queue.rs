use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::apu::SoundOutput;
use crate::hardware::TICKS_PER_SEC;

pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Unsigned 8-bit stereo frame as produced by the mixer.
pub type Frame = [u8; 2];

/// Single-producer / single-consumer ring buffer of stereo frames between
/// the emulation thread and an audio callback. Lossy when full: new frames
/// are dropped.
pub struct SampleProducer {
    inner: Arc<Inner>,
}

/// Reading end of the queue. There is only ever one.
///
/// ```compile_fail
/// let (_producer, consumer) = tickboy_core::audio_queue::sample_queue(16);
/// let _second = consumer.clone();
/// ```
pub struct SampleConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    // one spare slot so head == tail means empty
    buf: Box<[UnsafeCell<MaybeUninit<Frame>>]>,
    cap: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    playing: AtomicBool,
}

// Only the producer writes `buf[head]` and only the consumer reads
// `buf[tail]`; the indices are published through the atomics.
unsafe impl Sync for Inner {}

impl Inner {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            (self.cap - tail) + head
        }
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.cap { 0 } else { next }
    }
}

pub fn sample_queue(capacity_frames: usize) -> (SampleProducer, SampleConsumer) {
    let cap = capacity_frames.saturating_add(1).max(2);
    let buf: Vec<UnsafeCell<MaybeUninit<Frame>>> =
        (0..cap).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();

    let inner = Arc::new(Inner {
        buf: buf.into_boxed_slice(),
        cap,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        playing: AtomicBool::new(false),
    });

    (
        SampleProducer {
            inner: Arc::clone(&inner),
        },
        SampleConsumer { inner },
    )
}

impl SampleProducer {
    #[inline]
    pub fn push(&self, frame: Frame) -> bool {
        let head = self.inner.head.load(Ordering::Relaxed);
        let next = self.inner.next_index(head);
        if next == self.inner.tail.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            (*self.inner.buf[head].get()).write(frame);
        }
        self.inner.head.store(next, Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleConsumer {
    #[inline]
    pub fn pop(&self) -> Option<Frame> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        if tail == self.inner.head.load(Ordering::Acquire) {
            return None;
        }
        let frame = unsafe { (*self.inner.buf[tail].get()).assume_init_read() };
        self.inner.tail.store(self.inner.next_index(tail), Ordering::Release);
        Some(frame)
    }

    /// False while the emulated APU is powered off.
    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_frames(&self) -> usize {
        self.inner.cap.saturating_sub(1)
    }
}

/// [`SoundOutput`] that keeps every Nth mixer frame so the queue fills at
/// `sample_rate` instead of the master clock rate.
pub struct QueueSoundOutput {
    producer: SampleProducer,
    divider: u32,
    tick: u32,
    dropped: u64,
}

impl QueueSoundOutput {
    pub fn new(producer: SampleProducer, sample_rate: u32) -> Self {
        let divider = (TICKS_PER_SEC / sample_rate.max(1)).max(1);
        log::debug!("sound output at {sample_rate} Hz, keeping 1 of {divider} frames");
        Self {
            producer,
            divider,
            tick: 0,
            dropped: 0,
        }
    }

    /// Frames lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl SoundOutput for QueueSoundOutput {
    fn start(&mut self) {
        self.tick = 0;
        self.producer.inner.playing.store(true, Ordering::Release);
    }

    fn stop(&mut self) {
        self.producer.inner.playing.store(false, Ordering::Release);
    }

    fn play(&mut self, left: u8, right: u8) {
        self.tick += 1;
        if self.tick < self.divider {
            return;
        }
        self.tick = 0;
        if !self.producer.push([left, right]) {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                log::trace!("sample queue full, {} frames dropped", self.dropped);
            }
        }
    }
}
