//! Dedicated OCR thread with a FIFO request queue

use image::GrayImage;
use serde::Serialize;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::engine::OcrEngine;
use crate::error::Result;
use crate::result::{ErrorKind, Recognition, RecognitionError, RecognitionResult};

const DEFAULT_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of requests waiting behind the one in progress
    pub queue_capacity: usize,
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: "ocr-worker".to_string(),
        }
    }
}

/// Lifecycle of the worker. `Idle` and `Busy` are the two sub-states of
/// a ready engine; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum WorkerState {
    Uninitialized = 0,
    Idle = 1,
    Busy = 2,
    Failed = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Idle,
            2 => WorkerState::Busy,
            3 => WorkerState::Failed,
            _ => WorkerState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Busy)
    }
}

/// Request counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Shared {
    state: AtomicU8,
    init_error: OnceLock<String>,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn unavailable(&self) -> RecognitionError {
        let message = self.init_error.get().cloned().unwrap_or_default();
        RecognitionError::new(ErrorKind::EngineUnavailable, message)
    }
}

struct Job {
    id: u64,
    image: GrayImage,
    reply: oneshot::Sender<RecognitionResult>,
}

/// Owns one OCR engine on its own thread.
///
/// The engine is built by `factory` on the worker thread and never leaves
/// it. Requests are processed one at a time in submission order.
pub struct OcrWorker {
    tx: Option<mpsc::Sender<Job>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    capacity: usize,
    thread: Option<JoinHandle<()>>,
}

impl OcrWorker {
    /// Start the worker thread; engine initialization runs on it first
    pub fn spawn<E, F>(factory: F, config: WorkerConfig) -> Result<Self>
    where
        E: OcrEngine + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let shared = Arc::new(Shared::default());

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || Self::run(factory, rx, thread_shared))?;

        info!("OCR worker '{}' started (queue capacity {})", config.thread_name, capacity);

        Ok(Self {
            tx: Some(tx),
            shared,
            next_id: AtomicU64::new(0),
            capacity,
            thread: Some(thread),
        })
    }

    /// Queue `image` for recognition. Never blocks.
    ///
    /// The returned handle resolves exactly once. When the queue is full
    /// the request is rejected and the handle resolves immediately with
    /// [`ErrorKind::QueueFull`]. Once the engine has failed to initialize
    /// every request resolves immediately with
    /// [`ErrorKind::EngineUnavailable`].
    pub fn submit(&self, image: GrayImage) -> RecognitionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);

        if self.shared.state() == WorkerState::Failed {
            debug!("OCR engine unavailable, request {} not queued", id);
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            let _ = reply.send(Err(self.shared.unavailable()));
            return RecognitionHandle::new(id, rx);
        }

        let job = Job { id, image, reply };
        let Some(tx) = self.tx.as_ref() else {
            let _ = job.reply.send(Err(worker_stopped()));
            return RecognitionHandle::new(id, rx);
        };

        match tx.try_send(job) {
            Ok(()) => {
                debug!("queued OCR request {}", id);
            }
            Err(TrySendError::Full(job)) => {
                warn!("OCR queue full ({} pending), rejecting request {}", self.capacity, id);
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                let _ = job.reply.send(Err(RecognitionError::new(
                    ErrorKind::QueueFull,
                    format!("{} requests already pending", self.capacity),
                )));
            }
            Err(TrySendError::Closed(job)) => {
                error!("OCR worker thread is gone, request {} not processed", id);
                let _ = job.reply.send(Err(worker_stopped()));
            }
        }

        RecognitionHandle::new(id, rx)
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
        }
    }

    /// Block until engine initialization has finished or `timeout` passes
    pub fn wait_initialized(&self, timeout: Duration) -> WorkerState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state();
            if state != WorkerState::Uninitialized || Instant::now() >= deadline {
                return state;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Close the queue, finish pending requests and join the thread.
    ///
    /// Blocks for as long as the queued recognitions take; call it from
    /// the frame-delivery thread only when stopping.
    pub fn shutdown(mut self) {
        // Dropping the sender ends the worker loop once the queue drains
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("OCR worker thread panicked");
            }
        }
    }

    fn run<E, F>(factory: F, mut rx: mpsc::Receiver<Job>, shared: Arc<Shared>)
    where
        E: OcrEngine,
        F: FnOnce() -> Result<E>,
    {
        let mut engine = match factory() {
            Ok(engine) => {
                info!("OCR engine '{}' ready", engine.name());
                shared.set_state(WorkerState::Idle);
                Some(engine)
            }
            Err(e) => {
                warn!("OCR engine unavailable: {}", e);
                let _ = shared.init_error.set(e.to_string());
                shared.set_state(WorkerState::Failed);
                None
            }
        };

        while let Some(job) = rx.blocking_recv() {
            let result = match engine.as_mut() {
                Some(engine) => {
                    shared.set_state(WorkerState::Busy);
                    let result = Self::process(engine, job.id, &job.image);
                    shared.set_state(WorkerState::Idle);
                    result
                }
                // Submitted before initialization finished
                None => Err(shared.unavailable()),
            };

            match &result {
                Ok(_) => shared.completed.fetch_add(1, Ordering::Relaxed),
                Err(_) => shared.failed.fetch_add(1, Ordering::Relaxed),
            };

            if job.reply.send(result).is_err() {
                debug!("result of OCR request {} discarded by submitter", job.id);
            }
        }

        debug!("OCR request queue closed, worker exiting");
    }

    fn process<E: OcrEngine>(engine: &mut E, id: u64, image: &GrayImage) -> RecognitionResult {
        if image.width() == 0 || image.height() == 0 {
            return Err(RecognitionError::new(ErrorKind::InvalidInput, "empty image"));
        }

        debug!("OCR request {}: {}x{}", id, image.width(), image.height());
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.recognize(image)));
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(text)) => {
                debug!("OCR request {} done in {:?} ({} chars)", id, elapsed, text.chars().count());
                Ok(Recognition {
                    request_id: id,
                    text,
                    elapsed,
                })
            }
            Ok(Err(e)) => {
                warn!("OCR request {} failed: {}", id, e);
                Err(RecognitionError::from(e))
            }
            Err(_) => {
                error!("OCR engine panicked on request {}", id);
                Err(RecognitionError::new(ErrorKind::RecognitionFailed, "OCR engine panicked"))
            }
        }
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        // Detach: queued requests still finish, the dropping thread never waits
        self.tx.take();
        if self.thread.take().is_some() {
            debug!("OCR worker detached");
        }
    }
}

fn worker_stopped() -> RecognitionError {
    RecognitionError::new(ErrorKind::RecognitionFailed, "OCR worker stopped")
}

/// Pending result of one submitted request.
///
/// Resolve it by blocking ([`wait`](Self::wait)), polling
/// ([`try_result`](Self::try_result)) or awaiting it as a future.
#[derive(Debug)]
pub struct RecognitionHandle {
    id: u64,
    rx: oneshot::Receiver<RecognitionResult>,
    taken: bool,
}

impl RecognitionHandle {
    fn new(id: u64, rx: oneshot::Receiver<RecognitionResult>) -> Self {
        Self { id, rx, taken: false }
    }

    /// Request id, increasing in submission order
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block the calling thread until the result arrives.
    ///
    /// Must not be called from within an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> RecognitionResult {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(worker_stopped()))
    }

    /// Take the result if it is ready. Yields `Some` at most once.
    pub fn try_result(&mut self) -> Option<RecognitionResult> {
        if self.taken {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(worker_stopped()),
        };
        self.taken = true;
        Some(result)
    }
}

impl Future for RecognitionHandle {
    type Output = RecognitionResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        Pin::new(&mut this.rx).poll(cx).map(|received| {
            this.taken = true;
            received.unwrap_or_else(|_| Err(worker_stopped()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use image::Luma;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Echoes the image width, recording start/end of every call
    struct EchoEngine {
        calls: Arc<AtomicUsize>,
        events: Arc<Mutex<Vec<String>>>,
        delay: Duration,
    }

    impl OcrEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        fn recognize(&mut self, image: &GrayImage) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start {}", image.width()));
            thread::sleep(self.delay);
            self.events.lock().unwrap().push(format!("end {}", image.width()));
            match image.get_pixel(0, 0).0[0] {
                0 => Ok(String::new()),
                13 => Err(OcrError::ProcessingError("unreadable".to_string())),
                66 => panic!("engine crashed"),
                _ => Ok(format!("width {}", image.width())),
            }
        }
    }

    struct Harness {
        worker: OcrWorker,
        calls: Arc<AtomicUsize>,
        events: Arc<Mutex<Vec<String>>>,
    }

    fn echo_worker(delay: Duration, capacity: usize) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(Mutex::new(Vec::new()));
        let (c, e) = (calls.clone(), events.clone());
        let worker = OcrWorker::spawn(
            move || {
                Ok(EchoEngine {
                    calls: c,
                    events: e,
                    delay,
                })
            },
            WorkerConfig {
                queue_capacity: capacity,
                ..WorkerConfig::default()
            },
        )
        .unwrap();
        Harness { worker, calls, events }
    }

    fn gray_image(width: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, 4, Luma([value]))
    }

    fn wait_for_state(worker: &OcrWorker, state: WorkerState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.state() != state {
            assert!(Instant::now() < deadline, "worker never reached {:?}", state);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_results_in_submission_order() {
        let h = echo_worker(Duration::from_millis(20), 8);

        let handles: Vec<_> = (1..=4).map(|w| h.worker.submit(gray_image(w, 200))).collect();
        let ids: Vec<_> = handles.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let texts: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap().text).collect();
        assert_eq!(texts, vec!["width 1", "width 2", "width 3", "width 4"]);

        // Never re-entrant: each request ends before the next starts
        let events = h.events.lock().unwrap().clone();
        let expected: Vec<String> = (1..=4)
            .flat_map(|w| [format!("start {}", w), format!("end {}", w)])
            .collect();
        assert_eq!(events, expected);
        assert_eq!(h.worker.stats().completed, 4);
    }

    #[test]
    fn test_init_failure_is_permanent() {
        let inits = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (i, c) = (inits.clone(), calls.clone());

        let worker = OcrWorker::spawn(
            move || -> Result<EchoEngine> {
                i.fetch_add(1, Ordering::SeqCst);
                let _ = c;
                Err(OcrError::EngineInitFailed("eng.traineddata missing".to_string()))
            },
            WorkerConfig::default(),
        )
        .unwrap();

        assert_eq!(worker.wait_initialized(Duration::from_secs(5)), WorkerState::Failed);

        for _ in 0..3 {
            let err = worker.submit(gray_image(8, 200)).wait().unwrap_err();
            assert_eq!(err.kind, ErrorKind::EngineUnavailable);
            assert!(err.message.contains("eng.traineddata"));
        }

        assert_eq!(worker.state(), WorkerState::Failed);
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(worker.stats().failed, 3);
    }

    #[test]
    fn test_failed_worker_never_queues() {
        let worker = OcrWorker::spawn(
            || -> Result<EchoEngine> { Err(OcrError::EngineInitFailed("no language data".to_string())) },
            WorkerConfig {
                queue_capacity: 1,
                ..WorkerConfig::default()
            },
        )
        .unwrap();
        assert_eq!(worker.wait_initialized(Duration::from_secs(5)), WorkerState::Failed);

        let mut handles: Vec<_> = (0..200).map(|_| worker.submit(gray_image(4, 200))).collect();
        for handle in handles.iter_mut() {
            let err = handle.try_result().unwrap().unwrap_err();
            assert_eq!(err.kind, ErrorKind::EngineUnavailable);
            assert!(err.message.contains("no language data"));
        }

        let stats = worker.stats();
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.failed, 200);
    }

    #[test]
    fn test_empty_image_is_invalid_input() {
        let h = echo_worker(Duration::ZERO, 8);

        let err = h.worker.submit(GrayImage::new(0, 0)).wait().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);

        // Still usable afterwards
        assert_eq!(h.worker.submit(gray_image(5, 200)).wait().unwrap().text, "width 5");
    }

    #[test]
    fn test_no_text_is_success() {
        let h = echo_worker(Duration::ZERO, 8);
        let recognition = h.worker.submit(gray_image(5, 0)).wait().unwrap();
        assert!(recognition.text.is_empty());
        assert!(recognition.is_empty());
    }

    #[test]
    fn test_engine_errors_are_not_fatal() {
        let h = echo_worker(Duration::ZERO, 8);

        let err = h.worker.submit(gray_image(3, 13)).wait().unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecognitionFailed);
        assert!(err.message.contains("unreadable"));

        let err = h.worker.submit(gray_image(3, 66)).wait().unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecognitionFailed);

        assert_eq!(h.worker.submit(gray_image(9, 200)).wait().unwrap().text, "width 9");
        assert_eq!(h.worker.state(), WorkerState::Idle);
    }

    #[test]
    fn test_full_queue_rejects() {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();

        struct GatedEngine(std::sync::mpsc::Receiver<()>);
        impl OcrEngine for GatedEngine {
            fn name(&self) -> &str {
                "gated"
            }
            fn recognize(&mut self, _image: &GrayImage) -> Result<String> {
                let _ = self.0.recv();
                Ok("ok".to_string())
            }
        }

        let worker = OcrWorker::spawn(
            move || Ok(GatedEngine(gate_rx)),
            WorkerConfig {
                queue_capacity: 1,
                ..WorkerConfig::default()
            },
        )
        .unwrap();

        let first = worker.submit(gray_image(1, 200));
        wait_for_state(&worker, WorkerState::Busy);
        let second = worker.submit(gray_image(2, 200));
        let mut third = worker.submit(gray_image(3, 200));

        let err = third.try_result().unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::QueueFull);
        assert!(third.try_result().is_none());

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        assert_eq!(first.wait().unwrap().request_id, 0);
        assert_eq!(second.wait().unwrap().request_id, 1);

        let stats = worker.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let h = echo_worker(Duration::from_millis(5), 8);
        let mut handles: Vec<_> = (1..=3).map(|w| h.worker.submit(gray_image(w, 200))).collect();

        h.worker.shutdown();

        for (i, handle) in handles.iter_mut().enumerate() {
            let recognition = handle.try_result().unwrap().unwrap();
            assert_eq!(recognition.request_id, i as u64);
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_drop_does_not_wait_for_queue() {
        let h = echo_worker(Duration::from_millis(100), 8);
        let handles: Vec<_> = (1..=3).map(|w| h.worker.submit(gray_image(w, 200))).collect();

        let started = Instant::now();
        drop(h.worker);
        assert!(started.elapsed() < Duration::from_millis(100));

        let texts: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap().text).collect();
        assert_eq!(texts, vec!["width 1", "width 2", "width 3"]);
    }

    #[tokio::test]
    async fn test_handle_is_awaitable() {
        let h = echo_worker(Duration::from_millis(5), 8);
        let first = h.worker.submit(gray_image(11, 200));
        let second = h.worker.submit(gray_image(12, 200));

        assert_eq!(first.await.unwrap().text, "width 11");
        assert_eq!(second.await.unwrap().text, "width 12");
    }
}
