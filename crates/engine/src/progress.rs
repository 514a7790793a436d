//! Step progress reporting.

use std::fmt;

/// Receives progress messages, e.g. a label on the control surface.
pub type ProgressCallback = Box<dyn FnMut(&str)>;

#[derive(Default)]
pub struct Progress {
    step: u32,
    steps: u32,
    callback: Option<ProgressCallback>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&mut self, callback: ProgressCallback) {
        self.callback = Some(callback);
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Start counting a run of `steps` steps.
    pub fn begin(&mut self, steps: u32) {
        self.step = 0;
        self.steps = steps;
    }

    /// Advance one step and report `Step <n> of <m>: <message>`.
    pub fn show_step(&mut self, message: &str) -> String {
        self.step += 1;
        let line = format!("Step {} of {}: {}", self.step, self.steps, message);
        self.update(&line);
        line
    }

    /// Report `message` without advancing.
    pub fn update(&mut self, message: &str) {
        if let Some(callback) = self.callback.as_mut() {
            callback(message);
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("step", &self.step)
            .field("steps", &self.steps)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
