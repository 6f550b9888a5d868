/// Asynchronous GPU task queue
///
/// Tasks are handed to a worker thread over a channel. The worker records
/// and submits them, polls their fences and fires the completion callback
/// once the GPU is done. A task made of two stages is submitted as two
/// batches ordered by a semaphore, the second one carrying the fence. When
/// only the first batch is accepted, the task stays in flight until that
/// batch retires and then completes with the submission error.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, CommandList, Fence, GraphicsDevice, PipelineStages, QueueKind, Semaphore, Submission,
};
use crate::log::Logger;
use crate::upload::SOURCE;
use crate::{engine_debug, engine_error, engine_warn};

/// Records one stage of a task into a command list in recording state
pub type RecordFn = Box<dyn FnOnce(&mut dyn CommandList) -> Result<()> + Send>;

/// Called once with the outcome of the task, on the worker thread
pub type CompletionFn = Box<dyn FnOnce(Result<()>) + Send>;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Commands of a task targeted at one queue
pub struct TaskStage {
    pub queue: QueueKind,
    pub record: RecordFn,
}

impl TaskStage {
    pub fn new<F>(queue: QueueKind, record: F) -> Self
    where
        F: FnOnce(&mut dyn CommandList) -> Result<()> + Send + 'static,
    {
        Self { queue, record: Box::new(record) }
    }
}

/// Unit of GPU work processed by the `AsyncTaskQueue`
pub struct AsyncTask {
    pub upload: TaskStage,
    /// Submitted after `upload`, waiting on it through a semaphore
    pub mip_generation: Option<TaskStage>,
    /// Kept alive until the task completes
    pub staging: Vec<Arc<dyn Buffer>>,
    pub on_complete: CompletionFn,
}

enum Message {
    Task(AsyncTask),
    Shutdown,
}

/// Objects that must outlive a submission, fence first
struct Submitted {
    fence: Arc<dyn Fence>,
    command_lists: Vec<Box<dyn CommandList>>,
    semaphore: Option<Arc<dyn Semaphore>>,
    /// Set when only the first stage reached the GPU
    failure: Option<Error>,
}

struct InFlight {
    fence: Arc<dyn Fence>,
    command_lists: Vec<Box<dyn CommandList>>,
    semaphore: Option<Arc<dyn Semaphore>>,
    staging: Vec<Arc<dyn Buffer>>,
    failure: Option<Error>,
    on_complete: CompletionFn,
}

/// Outstanding task counter shared with waiters
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn finish_one(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }
}

pub struct AsyncTaskQueue {
    sender: Sender<Message>,
    worker: Option<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl AsyncTaskQueue {
    /// Spawn the worker thread
    ///
    /// `fence_timeout` bounds the final fence waits at shutdown.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        fence_timeout: Duration,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let pending = Arc::new(Pending::default());
        let worker = Worker {
            device,
            receiver,
            in_flight: Vec::new(),
            pending: pending.clone(),
            fence_timeout,
            logger,
        };
        let handle = thread::Builder::new()
            .name("galaxy3d-upload".to_string())
            .spawn(move || worker.run())
            .map_err(|e| Error::InitializationFailed(format!("upload worker thread: {}", e)))?;
        Ok(Self { sender, worker: Some(handle), pending })
    }

    /// Enqueue a task; returns immediately
    pub fn submit(&self, task: AsyncTask) -> Result<()> {
        if let Ok(mut count) = self.pending.count.lock() {
            *count += 1;
        }
        if let Err(err) = self.sender.send(Message::Task(task)) {
            self.pending.finish_one();
            if let Message::Task(task) = err.into_inner() {
                (task.on_complete)(Err(Error::BackendError("upload worker is gone".to_string())));
            }
            return Err(Error::BackendError("upload worker is gone".to_string()));
        }
        Ok(())
    }

    /// Number of tasks submitted and not yet completed
    pub fn pending_count(&self) -> usize {
        self.pending.count.lock().map(|c| *c).unwrap_or(0)
    }

    /// Block until every submitted task has completed
    pub fn wait_idle(&self) {
        let Ok(mut count) = self.pending.count.lock() else {
            return;
        };
        while *count > 0 {
            count = match self.pending.idle.wait(count) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

impl Drop for AsyncTaskQueue {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    device: Arc<dyn GraphicsDevice>,
    receiver: Receiver<Message>,
    in_flight: Vec<InFlight>,
    pending: Arc<Pending>,
    fence_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl Worker {
    fn run(mut self) {
        engine_debug!(self.logger, SOURCE, "Upload worker started");
        loop {
            let message = if self.in_flight.is_empty() {
                self.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                self.receiver.recv_timeout(POLL_INTERVAL)
            };

            let shutting_down = match message {
                Ok(Message::Task(task)) => {
                    self.execute(task);
                    false
                }
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            };

            self.poll();

            if shutting_down {
                self.drain();
                break;
            }
        }
        engine_debug!(self.logger, SOURCE, "Upload worker stopped");
    }

    fn execute(&mut self, task: AsyncTask) {
        let AsyncTask { upload, mip_generation, staging, on_complete } = task;
        match self.submit_stages(upload, mip_generation) {
            Ok(Submitted { fence, command_lists, semaphore, failure }) => self.in_flight.push(InFlight {
                fence,
                command_lists,
                semaphore,
                staging,
                failure,
                on_complete,
            }),
            Err(err) => {
                engine_error!(self.logger, SOURCE, "Upload task submission failed: {}", err);
                drop(staging);
                on_complete(Err(err));
                self.pending.finish_one();
            }
        }
    }

    fn submit_stages(&self, upload: TaskStage, mip_generation: Option<TaskStage>) -> Result<Submitted> {
        let fence = self.device.create_fence(false)?;
        let upload_queue = upload.queue;
        let upload_cmd = self.record(upload)?;

        match mip_generation {
            None => {
                let lists = [upload_cmd.as_ref()];
                self.device.submit(upload_queue, &Submission {
                    command_lists: &lists,
                    fence: Some(fence.as_ref()),
                    ..Default::default()
                })?;
                Ok(Submitted { fence, command_lists: vec![upload_cmd], semaphore: None, failure: None })
            }
            Some(mips) => {
                let semaphore = self.device.create_semaphore()?;
                let mip_queue = mips.queue;
                let mip_cmd = self.record(mips)?;

                let first = [upload_cmd.as_ref()];
                let signal = [semaphore.as_ref()];
                self.device.submit(upload_queue, &Submission {
                    command_lists: &first,
                    signal: &signal,
                    ..Default::default()
                })?;

                let second = [mip_cmd.as_ref()];
                let wait = [(semaphore.as_ref(), PipelineStages::TRANSFER)];
                let submitted = self.device.submit(mip_queue, &Submission {
                    command_lists: &second,
                    wait: &wait,
                    fence: Some(fence.as_ref()),
                    ..Default::default()
                });
                let failure = match submitted {
                    Ok(()) => None,
                    Err(err) => {
                        self.fence_copy_batch(upload_queue, fence.as_ref(), &err)?;
                        Some(err)
                    }
                };
                Ok(Submitted {
                    fence,
                    command_lists: vec![upload_cmd, mip_cmd],
                    semaphore: Some(semaphore),
                    failure,
                })
            }
        }
    }

    /// Attach `fence` to the copy batch already on `queue` after the mip
    /// batch was rejected
    ///
    /// An empty fenced submission signals once earlier work on the queue is
    /// done. If even that is rejected, the device is drained and `err` is
    /// returned so the task fails with nothing left in flight.
    fn fence_copy_batch(&self, queue: QueueKind, fence: &dyn Fence, err: &Error) -> Result<()> {
        engine_error!(
            self.logger,
            SOURCE,
            "Mip generation submission failed after the copy was queued: {}",
            err
        );
        let fenced = self.device.submit(queue, &Submission {
            fence: Some(fence),
            ..Default::default()
        });
        if let Err(fence_err) = fenced {
            engine_warn!(self.logger, SOURCE, "Could not fence the copy batch ({}), waiting for the device", fence_err);
            if let Err(idle_err) = self.device.wait_idle() {
                engine_error!(self.logger, SOURCE, "wait_idle after failed upload: {}", idle_err);
            }
            return Err(err.clone());
        }
        Ok(())
    }

    fn record(&self, stage: TaskStage) -> Result<Box<dyn CommandList>> {
        let mut cmd = self.device.create_command_list(stage.queue)?;
        cmd.begin()?;
        (stage.record)(cmd.as_mut())?;
        cmd.end()?;
        Ok(cmd)
    }

    fn poll(&mut self) {
        let mut index = 0;
        while index < self.in_flight.len() {
            match self.device.is_fence_signaled(self.in_flight[index].fence.as_ref()) {
                Ok(true) => {
                    let done = self.in_flight.swap_remove(index);
                    self.complete(done, Ok(()));
                }
                Ok(false) => index += 1,
                Err(err) => {
                    let done = self.in_flight.swap_remove(index);
                    self.complete(done, Err(err));
                }
            }
        }
    }

    fn drain(&mut self) {
        if !self.in_flight.is_empty() {
            engine_warn!(
                self.logger,
                SOURCE,
                "Upload worker stopping with {} task(s) in flight",
                self.in_flight.len()
            );
        }
        for done in std::mem::take(&mut self.in_flight) {
            let result = self.device.wait_for_fence(done.fence.as_ref(), self.fence_timeout);
            self.complete(done, result);
        }
    }

    fn complete(&self, done: InFlight, result: Result<()>) {
        let InFlight { fence, command_lists, semaphore, staging, failure, on_complete } = done;
        drop((fence, command_lists, semaphore, staging));
        on_complete(match failure {
            Some(err) => Err(err),
            None => result,
        });
        self.pending.finish_one();
    }
}

#[cfg(test)]
#[path = "task_queue_tests.rs"]
mod tests;
