//! In-memory host for tests.
//!
//! `MemoryHost` implements `ImageHost` without an imaging application:
//! - views are plain records, created by job outputs or `add_view`
//! - every job, close, mask change and alert is recorded in order
//! - statistics are configurable per view
//!
//! `ScriptedSurface` plays back a fixed list of user actions against a
//! `DialogSession`, so interactive runs can be tested without widgets.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use deepsky_core::SettingValue;

use crate::error::{EngineError, JobError};
use crate::host::{ImageHost, MaskBinding, ProcessingJob, ViewHandle, ViewStatistics};
use crate::registry::MainOutcome;
use crate::surface::{ControlSurface, DialogSession};

/// A job as the host received it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job: ProcessingJob,
    /// Id of the view it ran on.
    pub target: String,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    views: BTreeMap<String, ViewHandle>,
    active: Option<String>,
    statistics: HashMap<String, ViewStatistics>,
    jobs: Vec<JobRecord>,
    launched: Vec<ProcessingJob>,
    closed: Vec<String>,
    alerts: Vec<(String, String)>,
    masks: HashMap<String, MaskBinding>,
    mask_events: Vec<(String, Option<MaskBinding>)>,
    fail_on: Option<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with `view` open and active.
    pub fn with_active_view(view: ViewHandle) -> Self {
        let mut host = Self::new();
        host.add_view(view.clone());
        host.set_active(Some(&view.id));
        host
    }

    /// Open a view. Returns it for convenience.
    pub fn add_view(&mut self, view: ViewHandle) -> ViewHandle {
        self.views.insert(view.id.clone(), view.clone());
        view
    }

    pub fn set_active(&mut self, id: Option<&str>) {
        self.active = id.map(str::to_string);
    }

    pub fn set_statistics(&mut self, id: &str, statistics: ViewStatistics) {
        self.statistics.insert(id.to_string(), statistics);
    }

    /// Make every job of `process` fail.
    pub fn fail_on(&mut self, process: &str) {
        self.fail_on = Some(process.to_string());
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    /// Process names of all jobs, in execution order.
    pub fn processes(&self) -> Vec<String> {
        self.jobs.iter().map(|r| r.job.process.clone()).collect()
    }

    /// Process interfaces opened through `launch`.
    pub fn launched(&self) -> &[ProcessingJob] {
        &self.launched
    }

    /// Ids of closed views, in close order.
    pub fn closed(&self) -> &[String] {
        &self.closed
    }

    pub fn alerts(&self) -> &[(String, String)] {
        &self.alerts
    }

    /// Mask currently attached to `id`.
    pub fn mask(&self, id: &str) -> Option<&MaskBinding> {
        self.masks.get(id)
    }

    pub fn mask_events(&self) -> &[(String, Option<MaskBinding>)] {
        &self.mask_events
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.views.contains_key(id)
    }

    pub fn open_views(&self) -> Vec<&ViewHandle> {
        self.views.values().collect()
    }
}

impl ImageHost for MemoryHost {
    fn active_view(&self) -> Option<ViewHandle> {
        self.active.as_ref().and_then(|id| self.views.get(id)).cloned()
    }

    fn find_view(&self, id: &str) -> Option<ViewHandle> {
        self.views.get(id).cloned()
    }

    fn execute_on(&mut self, job: &ProcessingJob, view: &ViewHandle) -> Result<(), JobError> {
        if !self.views.contains_key(&view.id) {
            return Err(JobError::new(&job.process, format!("no view '{}'", view.id)));
        }
        if self.fail_on.as_deref() == Some(job.process.as_str()) {
            return Err(JobError::new(&job.process, "simulated failure"));
        }

        self.jobs.push(JobRecord { job: job.clone(), target: view.id.clone() });
        for output in &job.outputs {
            self.views.insert(output.id.clone(), output.clone());
        }
        Ok(())
    }

    fn close_view(&mut self, view: &ViewHandle) {
        self.views.remove(&view.id);
        self.masks.remove(&view.id);
        if self.active.as_deref() == Some(view.id.as_str()) {
            self.active = None;
        }
        self.closed.push(view.id.clone());
    }

    fn statistics(&self, view: &ViewHandle) -> Result<ViewStatistics, JobError> {
        if !self.views.contains_key(&view.id) {
            return Err(JobError::new("Statistics", format!("no view '{}'", view.id)));
        }
        Ok(self
            .statistics
            .get(&view.id)
            .cloned()
            .unwrap_or_else(|| ViewStatistics::uniform(view.channels, 0.1, 0.005)))
    }

    fn launch(&mut self, job: &ProcessingJob) -> Result<(), JobError> {
        if self.fail_on.as_deref() == Some(job.process.as_str()) {
            return Err(JobError::new(&job.process, "simulated failure"));
        }
        self.launched.push(job.clone());
        Ok(())
    }

    fn set_mask(&mut self, view: &ViewHandle, mask: Option<MaskBinding>) {
        match &mask {
            Some(binding) => {
                self.masks.insert(view.id.clone(), binding.clone());
            }
            None => {
                self.masks.remove(&view.id);
            }
        }
        self.mask_events.push((view.id.clone(), mask));
    }

    fn alert(&mut self, title: &str, message: &str) {
        self.alerts.push((title.to_string(), message.to_string()));
    }
}

// ============================================================================
// Scripted control surface
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Apply,
    Reset,
    Edit { setting: String, value: SettingValue },
    NewInstance,
    Close,
}

impl UserAction {
    pub fn edit(setting: &str, value: impl Into<SettingValue>) -> Self {
        Self::Edit { setting: setting.to_string(), value: value.into() }
    }
}

/// Plays back user actions until they run out or the session closes.
///
/// Each action leaves one line in the transcript; progress messages are
/// recorded as `progress: <message>`.
pub struct ScriptedSurface {
    actions: VecDeque<UserAction>,
    transcript: Rc<RefCell<Vec<String>>>,
}

impl ScriptedSurface {
    pub fn new(actions: Vec<UserAction>) -> Self {
        Self {
            actions: actions.into(),
            transcript: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared view of the transcript, readable after the surface is moved.
    pub fn transcript(&self) -> Rc<RefCell<Vec<String>>> {
        self.transcript.clone()
    }

    fn record(&self, line: String) {
        self.transcript.borrow_mut().push(line);
    }
}

impl ControlSurface for ScriptedSurface {
    fn execute(&mut self, session: &mut DialogSession<'_>) -> Result<(), EngineError> {
        let progress = self.transcript.clone();
        session.set_progress(Box::new(move |msg| {
            progress.borrow_mut().push(format!("progress: {msg}"));
        }));

        while session.is_open() {
            let Some(action) = self.actions.pop_front() else {
                session.close();
                break;
            };

            match action {
                UserAction::Apply => match session.apply()? {
                    MainOutcome::Ran => self.record("apply: ran".to_string()),
                    MainOutcome::Rejected(failure) => {
                        self.record(format!("apply: rejected: {}", failure.message))
                    }
                },
                UserAction::Reset => {
                    session.reset()?;
                    self.record("reset".to_string());
                }
                UserAction::Edit { setting, value } => {
                    let result = session.state().borrow_mut().config.set(&setting, value.clone());
                    match result {
                        Ok(()) => self.record(format!("edit {setting}={value}")),
                        Err(e) => self.record(format!("edit {setting}={value}: rejected: {e}")),
                    }
                }
                UserAction::NewInstance => {
                    let parameters = session.new_instance();
                    self.record(format!("new instance: {} parameters", parameters.len()));
                }
                UserAction::Close => {
                    session.close();
                    self.record("close".to_string());
                }
            }
        }
        Ok(())
    }
}
