//! The serialisation pipeline: a pool of worker threads that turn blob
//! tasks into framed bytes, and an ordered output queue drained by a
//! single writer thread.
//!
//! The producer submits each finalised block as an independent task and
//! pushes the task's future onto the queue at submission time. Workers
//! may finish in any order, but the output thread waits on the futures in
//! FIFO order, so the bytes on disk follow producer order: in-order
//! output from out-of-order compression.

use std::io::Write;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::codecs::blob::SerializeBlob;
use crate::error::{PbfError, Result};

/// Handle on the eventual result of one blob task.
pub(crate) struct BlobFuture {
    rx: Receiver<Result<Vec<u8>>>,
}

impl BlobFuture {
    fn wait(self) -> Result<Vec<u8>> {
        self.rx.recv().map_err(|_| PbfError::PipelineDisconnected)?
    }
}

type PoolTask = (SerializeBlob, SyncSender<Result<Vec<u8>>>);

/// Fixed pool of named worker threads pulling blob tasks from a bounded
/// channel. `submit` blocks when all admission slots are taken, which
/// backpressures the producer instead of buffering unboundedly.
pub(crate) struct SerializePool {
    task_tx: Option<SyncSender<PoolTask>>,
    workers: Vec<JoinHandle<()>>,
}

impl SerializePool {
    pub fn new(threads: usize) -> Result<Self> {
        let (task_tx, task_rx) = sync_channel::<PoolTask>(threads * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let task_rx = Arc::clone(&task_rx);
            let handle = thread::Builder::new()
                .name(format!("pbf-serialize-{}", index))
                .spawn(move || loop {
                    let (task, result_tx) = match task_rx.lock().unwrap().recv() {
                        Ok(task) => task,
                        Err(_) => break, // producer finished
                    };
                    // The result channel has one slot, so this never
                    // blocks; a dropped receiver just discards the result.
                    let _ = result_tx.send(task.run());
                })?;
            workers.push(handle);
        }
        debug!(threads, "serialisation pool started");
        Ok(Self {
            task_tx: Some(task_tx),
            workers,
        })
    }

    pub fn submit(&self, task: SerializeBlob) -> Result<BlobFuture> {
        let (result_tx, result_rx) = sync_channel(1);
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or(PbfError::PipelineDisconnected)?;
        task_tx
            .send((task, result_tx))
            .map_err(|_| PbfError::PipelineDisconnected)?;
        Ok(BlobFuture { rx: result_rx })
    }

    /// Close the task channel and wait for the workers to drain it.
    pub fn shutdown(&mut self) {
        self.task_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for SerializePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ordered queue of pending frames. Futures are pushed in producer order
/// and a single output thread writes each frame as soon as it resolves.
/// The first failed task poisons the stream: later frames are discarded
/// and the error surfaces from `finish`.
pub(crate) struct OutputQueue<W: Write + Send + 'static> {
    future_tx: Option<SyncSender<BlobFuture>>,
    writer_thread: Option<JoinHandle<(W, Option<PbfError>)>>,
}

impl<W: Write + Send + 'static> OutputQueue<W> {
    pub fn new(mut writer: W, capacity: usize) -> Result<Self> {
        let (future_tx, future_rx) = sync_channel::<BlobFuture>(capacity);
        let writer_thread = thread::Builder::new()
            .name("pbf-output".to_string())
            .spawn(move || {
                let mut first_error: Option<PbfError> = None;
                for future in future_rx {
                    match future.wait() {
                        Ok(frame) => {
                            if first_error.is_some() {
                                continue; // poisoned, discard
                            }
                            trace!(bytes = frame.len(), "writing frame");
                            if let Err(e) = writer.write_all(&frame) {
                                first_error = Some(e.into());
                            }
                        }
                        Err(e) => {
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                }
                if first_error.is_none() {
                    if let Err(e) = writer.flush() {
                        first_error = Some(e.into());
                    }
                }
                (writer, first_error)
            })?;
        Ok(Self {
            future_tx: Some(future_tx),
            writer_thread: Some(writer_thread),
        })
    }

    /// Enqueue a pending frame. Blocks while the queue is full.
    pub fn push(&self, future: BlobFuture) -> Result<()> {
        let future_tx = self
            .future_tx
            .as_ref()
            .ok_or(PbfError::PipelineDisconnected)?;
        future_tx
            .send(future)
            .map_err(|_| PbfError::PipelineDisconnected)
    }

    /// Close the queue, wait for every pending frame to be written and
    /// hand back the underlying writer. Returns the first pipeline error
    /// if any task or write failed.
    pub fn finish(mut self) -> Result<W> {
        self.future_tx.take();
        let writer_thread = self
            .writer_thread
            .take()
            .ok_or(PbfError::PipelineDisconnected)?;
        let (writer, error) = writer_thread
            .join()
            .map_err(|_| PbfError::PipelineDisconnected)?;
        match error {
            Some(e) => Err(e),
            None => Ok(writer),
        }
    }
}
