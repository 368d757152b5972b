use crate::{error::VarhiveError, utils::util::Result};
use crossbeam_channel::unbounded;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    thread,
};

pub(crate) fn panic_payload_message(panic_payload: &(dyn Any + Send + 'static)) -> String {
    if let Some(message) = panic_payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = panic_payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_owned()
}

pub(crate) fn aggregate_errors(name: &str, mut errors: Vec<VarhiveError>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => {
            let summary = errors
                .into_iter()
                .enumerate()
                .map(|(index, error)| format!("{}. {}", index + 1, error))
                .collect::<Vec<_>>()
                .join("; ");
            Err(crate::varhive_error!("Multiple {name} task errors: {summary}"))
        }
    }
}

/// Bounded pool running one wave of independent tasks.
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(name: &'static str, workers: usize, engine_threads: usize) -> Result<Self> {
        let workers = workers.max(1);
        if let Ok(cores) = thread::available_parallelism() {
            let requested = workers.saturating_mul(engine_threads);
            if requested > cores.get() {
                log::warn!(
                    "{name}: {workers} workers x {engine_threads} engine threads exceeds the {} available cores",
                    cores.get()
                );
            }
        }
        log::debug!("Initializing {name} thread pool with {workers} workers...");
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("varhive-{name}-{i}"))
            .build()
            .map_err(|e| crate::varhive_error!("Failed to initialize {name} thread pool: {e}"))?;
        Ok(Self {
            name,
            workers,
            pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every task and returns their outputs in task order once all of
    /// them have finished. Panics become errors; several failures are
    /// reported together.
    pub fn run_all<T, R, F>(&self, tasks: Vec<T>, run: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        let name = self.name;
        let task_count = tasks.len();
        let (sender, receiver) = unbounded();
        let run = &run;
        self.pool.scope(|scope| {
            for (index, task) in tasks.into_iter().enumerate() {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(task)))
                        .unwrap_or_else(|panic_payload| {
                            Err(crate::varhive_error!(
                                "{name} task panicked: {}",
                                panic_payload_message(panic_payload.as_ref())
                            ))
                        });
                    if let Err(error) = sender.send((index, outcome)) {
                        log::error!("{name}: failed to report task {index}: {error}");
                    }
                });
            }
        });
        drop(sender);
        log::debug!("{name}: joined {task_count} tasks");

        let mut reports: Vec<(usize, Result<R>)> = receiver.into_iter().collect();
        reports.sort_by_key(|(index, _)| *index);
        if reports.len() != task_count {
            return Err(crate::varhive_error!(
                "{name}: {} of {task_count} tasks reported back",
                reports.len()
            ));
        }

        let mut outputs = Vec::with_capacity(task_count);
        let mut errors = Vec::new();
        for (_, outcome) in reports {
            match outcome {
                Ok(output) => outputs.push(output),
                Err(error) => errors.push(error),
            }
        }
        aggregate_errors(name, errors)?;
        Ok(outputs)
    }
}
