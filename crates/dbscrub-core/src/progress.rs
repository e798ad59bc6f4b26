use std::time::{Duration, Instant};

/// Step-based progress reporter emitting tracing events.
///
/// A task is started with [`Progress::new_task`], advanced with
/// [`Progress::step`] and closed with [`Progress::done`].
#[derive(Debug)]
pub struct Progress {
    task: String,
    total: u64,
    completed: u64,
    started: Instant,
}

impl Progress {
    pub fn new_task(task: impl Into<String>, total: u64) -> Self {
        let task = task.into();
        tracing::info!(event = "task_started", task = %task, total = total);
        Self {
            task,
            total,
            completed: 0,
            started: Instant::now(),
        }
    }

    pub fn step(&mut self, detail: &str) {
        self.completed = self.completed.saturating_add(1);
        tracing::debug!(
            event = "task_step",
            task = %self.task,
            detail = %detail,
            completed = self.completed,
            total = self.total,
            percent = self.percent(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            eta_ms = self.eta().map(|eta| eta.as_millis() as u64)
        );
    }

    pub fn done(self) {
        tracing::info!(
            event = "task_finished",
            task = %self.task,
            completed = self.completed,
            elapsed_ms = self.elapsed().as_millis() as u64
        );
    }

    /// Completion percentage in `0.0..=100.0`; an empty task counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed.min(self.total) as f64 / self.total as f64) * 100.0
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Linear estimate of the remaining time, unknown until one step is done.
    pub fn eta(&self) -> Option<Duration> {
        eta_from(self.elapsed(), self.completed, self.total)
    }
}

fn eta_from(elapsed: Duration, completed: u64, total: u64) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(completed);
    let per_step = elapsed.as_secs_f64() / completed as f64;
    Some(Duration::from_secs_f64(per_step * remaining as f64))
}
