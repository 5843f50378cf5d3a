use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, SendError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::error::{ExperimentError, Result};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Running,
    Finished,
    Retired,
}

/// One execution lane. Its directory is derived from the id alone, so no two slots of a
/// pool share one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSlot {
    id: usize,
    dir: PathBuf,
}

impl WorkerSlot {
    pub fn new(id: usize, root: &Path, prefix: &str) -> Self {
        Self {
            id,
            dir: root.join(format!("{prefix}{id}")),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Runs a single work item on a slot. Called from the slot's own thread.
pub trait Executor<T>: Send + Sync + 'static {
    type Output: Send + 'static;

    fn execute(&self, slot: &WorkerSlot, item: &T) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shuffle {
    /// Keep the submission order.
    Off,
    Random,
    Seeded(u64),
}

#[derive(Debug)]
pub struct Completion<T, O> {
    pub slot: usize,
    pub item: T,
    pub result: Result<O>,
}

struct Lane<T> {
    state: SlotState,
    sender: Option<Sender<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T> Lane<T> {
    fn retire(&mut self) {
        self.sender = None;
        self.state = SlotState::Retired;
    }
}

/// A fixed set of slots fed from one queue that only the calling thread touches.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Vec<WorkerSlot>,
    shuffle: Shuffle,
}

impl WorkerPool {
    pub fn new(root: &Path, prefix: &str, num_slots: usize) -> Self {
        Self {
            slots: (0..num_slots)
                .map(|id| WorkerSlot::new(id, root, prefix))
                .collect(),
            shuffle: Shuffle::Random,
        }
    }

    pub fn with_shuffle(mut self, shuffle: Shuffle) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    fn queue<T>(&self, mut items: Vec<T>) -> VecDeque<T> {
        match self.shuffle {
            Shuffle::Off => (),
            Shuffle::Random => items.shuffle(&mut thread_rng()),
            Shuffle::Seeded(seed) => items.shuffle(&mut ChaCha8Rng::seed_from_u64(seed)),
        }
        items.into()
    }

    /// Executes every item exactly once with at most `slots().len()` running at a time and
    /// returns one completion per item, in completion order. Failing items are reported in
    /// their completion and do not stop the pool.
    pub fn run<T, E>(
        &self,
        items: Vec<T>,
        executor: Arc<E>,
    ) -> Result<Vec<Completion<T, E::Output>>>
    where
        T: Send + 'static,
        E: Executor<T>,
    {
        let mut queue = self.queue(items);
        let total = queue.len();
        info!("Scheduling {total} items on {} slots", self.slots.len());

        let (done_tx, done_rx) = mpsc::channel();
        let mut lanes: Vec<Lane<T>> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let mut lane = Lane {
                state: SlotState::Idle,
                sender: None,
                handle: None,
            };
            match queue.pop_front() {
                Some(item) => {
                    let (tx, rx) = mpsc::channel();
                    let handle =
                        spawn_worker(slot.clone(), rx, done_tx.clone(), executor.clone())?;
                    tx.send(item).ok();
                    lane.sender = Some(tx);
                    lane.handle = Some(handle);
                    lane.state = SlotState::Running;
                }
                None => lane.retire(),
            }
            lanes.push(lane);
        }
        drop(done_tx);

        let mut completions = Vec::with_capacity(total);
        let mut stopped = None;
        while lanes.iter().any(|lane| lane.state == SlotState::Running) {
            let completion: Completion<T, E::Output> = match done_rx.recv() {
                Ok(completion) => completion,
                Err(_) => {
                    error!("All worker threads exited with work still running");
                    stopped = lanes
                        .iter()
                        .position(|lane| lane.state == SlotState::Running)
                        .or(stopped);
                    break;
                }
            };
            let slot = completion.slot;
            let lane = &mut lanes[slot];
            lane.state = SlotState::Finished;
            debug!(
                "slot {slot} finished ({}/{total} done, {} queued)",
                completions.len() + 1,
                queue.len()
            );
            completions.push(completion);

            match queue.pop_front() {
                Some(next) => {
                    lane.state = SlotState::Idle;
                    let sent = lane.sender.as_ref().map(|tx| tx.send(next));
                    match sent {
                        Some(Ok(())) => lane.state = SlotState::Running,
                        Some(Err(SendError(next))) => {
                            error!("slot {slot} stopped accepting work");
                            stopped = Some(slot);
                            queue.push_front(next);
                            lane.retire();
                        }
                        None => unreachable!("a finished lane always has a sender"),
                    }
                }
                None => lane.retire(),
            }
        }

        for lane in lanes.iter_mut() {
            lane.retire();
        }
        for (slot, lane) in lanes.into_iter().enumerate() {
            if let Some(handle) = lane.handle {
                if handle.join().is_err() {
                    error!("slot {slot} thread panicked");
                }
            }
        }
        let remaining = total - completions.len();
        if let (Some(slot), true) = (stopped, remaining > 0) {
            return Err(ExperimentError::SlotStopped { slot, remaining });
        }
        info!("Finished {} of {total} items", completions.len());
        Ok(completions)
    }
}

fn spawn_worker<T, E>(
    slot: WorkerSlot,
    items: Receiver<T>,
    done: Sender<Completion<T, E::Output>>,
    executor: Arc<E>,
) -> Result<JoinHandle<()>>
where
    T: Send + 'static,
    E: Executor<T>,
{
    let handle = thread::Builder::new()
        .name(format!("slot-{}", slot.id))
        .spawn(move || {
            for item in items {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(&slot, &item)
                }))
                .unwrap_or(Err(ExperimentError::WorkerPanicked { slot: slot.id }));
                let completion = Completion {
                    slot: slot.id,
                    item,
                    result,
                };
                if done.send(completion).is_err() {
                    break;
                }
            }
        })?;
    Ok(handle)
}
