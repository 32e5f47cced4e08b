//! A codec that hands every chunk to a dedicated engine thread.
//!
//! This models offloading compression to a device with its own command
//! queue: callers submit work into a bounded queue and block on a completion
//! fence. The submitted buffer is shared with the engine and stays alive until
//! the fence is signalled.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::codec::Codec;
use crate::error::{CodecError, ResourceError};

type Completion = Result<Vec<u8>, CodecError>;

/// Completion signal for one submission.
///
/// The engine owns the sending half. If the engine goes away without
/// signalling, the sender is dropped and the waiter sees `EngineStopped`.
struct Fence {
    signal: Receiver<Completion>,
}

impl Fence {
    fn new() -> (Fence, Sender<Completion>) {
        let (sender, signal) = bounded(1);
        (Fence { signal }, sender)
    }

    fn wait(self) -> Completion {
        self.signal.recv().map_err(|_| CodecError::EngineStopped)?
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Compress,
    Decompress { capacity: usize },
}

struct Submission {
    source: Arc<[u8]>,
    operation: Operation,
    fence: Sender<Completion>,
}

pub struct OffloadCodec {
    queue: Option<Sender<Submission>>,
    engine: Option<JoinHandle<()>>,
    engine_name: String,
}

impl OffloadCodec {
    pub const DEFAULT_QUEUE_DEPTH: usize = 64;

    /// Starts an engine thread running `inner`, accepting up to `queue_depth`
    /// pending submissions before submitters block.
    pub fn new<C: Codec + 'static>(inner: C, queue_depth: usize) -> Result<OffloadCodec, ResourceError> {
        let (sender, receiver) = bounded(queue_depth.max(1));
        let engine_name = inner.name().to_string();

        let engine = std::thread::Builder::new()
            .name("rangepack-offload".into())
            .spawn(move || run_engine(inner, receiver))
            .map_err(ResourceError::Thread)?;

        Ok(OffloadCodec {
            queue: Some(sender),
            engine: Some(engine),
            engine_name,
        })
    }

    /// Name of the codec running on the engine.
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    fn submit(&self, source: &[u8], operation: Operation) -> Completion {
        let (fence, signal) = Fence::new();
        let submission = Submission {
            source: Arc::from(source),
            operation,
            fence: signal,
        };

        self.queue
            .as_ref()
            .ok_or(CodecError::EngineStopped)?
            .send(submission)
            .map_err(|_| CodecError::EngineStopped)?;

        fence.wait()
    }
}

fn run_engine<C: Codec>(codec: C, receiver: Receiver<Submission>) {
    for submission in receiver.iter() {
        let completion = match submission.operation {
            Operation::Compress => codec.compress(&submission.source),
            Operation::Decompress { capacity } => codec.decompress(&submission.source, capacity),
        };
        // The submitter only goes away once it has its answer.
        let _ = submission.fence.send(completion);
    }
    tracing::debug!("offload engine drained");
}

impl Codec for OffloadCodec {
    fn name(&self) -> &str {
        "offload"
    }

    fn compress(&self, source: &[u8]) -> Completion {
        self.submit(source, Operation::Compress)
    }

    fn decompress(&self, source: &[u8], capacity: usize) -> Completion {
        self.submit(source, Operation::Decompress { capacity })
    }
}

impl Drop for OffloadCodec {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(engine) = self.engine.take() {
            if engine.join().is_err() {
                tracing::warn!(engine = %self.engine_name, "offload engine panicked");
            }
        }
    }
}

impl std::fmt::Debug for OffloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadCodec")
            .field("engine", &self.engine_name)
            .finish()
    }
}
