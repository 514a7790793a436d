//! Boundary with the imaging application.
//!
//! Pixel work never happens here. Features describe it as `ProcessingJob`s
//! (a process name plus a flat property bag) and hand them to the host, which
//! runs them synchronously against a view.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use deepsky_config::Parameters;

use crate::error::JobError;

/// An image view known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle {
    pub id: String,
    pub channels: u32,
}

impl ViewHandle {
    pub fn new(id: impl Into<String>, channels: u32) -> Self {
        Self { id: id.into(), channels }
    }

    pub fn is_color(&self) -> bool {
        self.channels == 3
    }

    pub fn is_grayscale(&self) -> bool {
        self.channels == 1
    }
}

/// Per-channel robust statistics of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStatistics {
    pub median: Vec<f64>,
    /// Median absolute deviation.
    pub mad: Vec<f64>,
}

impl ViewStatistics {
    /// Same median and MAD on every channel.
    pub fn uniform(channels: u32, median: f64, mad: f64) -> Self {
        Self {
            median: vec![median; channels as usize],
            mad: vec![mad; channels as usize],
        }
    }

    pub fn channel(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.median.get(index)?, *self.mad.get(index)?))
    }
}

/// How a mask is attached to a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskBinding {
    pub mask: String,
    pub enabled: bool,
    pub inverted: bool,
    pub visible: bool,
}

impl MaskBinding {
    /// Enabled, visible, inverted.
    pub fn inverted(mask: &ViewHandle) -> Self {
        Self {
            mask: mask.id.clone(),
            enabled: true,
            inverted: true,
            visible: true,
        }
    }
}

/// One invocation of a host process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingJob {
    pub process: String,
    pub properties: Map<String, Value>,
    /// Views the job creates.
    pub outputs: Vec<ViewHandle>,
}

impl ProcessingJob {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            properties: Map::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn output(mut self, view: ViewHandle) -> Self {
        self.outputs.push(view);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// The imaging application, as seen by features.
///
/// All calls are synchronous and run to completion.
pub trait ImageHost {
    /// The view the user is currently looking at.
    fn active_view(&self) -> Option<ViewHandle>;

    fn find_view(&self, id: &str) -> Option<ViewHandle>;

    /// Run `job` against `view`. Views named in `job.outputs` exist afterwards.
    fn execute_on(&mut self, job: &ProcessingJob, view: &ViewHandle) -> Result<(), JobError>;

    /// Close a view without saving.
    fn close_view(&mut self, view: &ViewHandle);

    fn statistics(&self, view: &ViewHandle) -> Result<ViewStatistics, JobError>;

    /// Open the interface of `job`'s process, preloaded with its properties,
    /// for the user to run.
    fn launch(&mut self, job: &ProcessingJob) -> Result<(), JobError>;

    /// Attach (`Some`) or remove (`None`) a mask.
    fn set_mask(&mut self, view: &ViewHandle, mask: Option<MaskBinding>);

    /// Blocking message dialog.
    fn alert(&mut self, title: &str, message: &str);
}

/// First free view id among `<base><suffix>`, `<base><suffix>2`, `<base><suffix>3`, ...
pub fn unique_view_name(host: &dyn ImageHost, base: &str, suffix: &str) -> String {
    let mut name = format!("{base}{suffix}");
    let mut n = 1;
    while host.find_view(&name).is_some() {
        n += 1;
        name = format!("{base}{suffix}{n}");
    }
    name
}

// ============================================================================
// Invocation
// ============================================================================

/// What the host asked for when it started the feature.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationTarget {
    /// Headless, against this view.
    View(ViewHandle),
    /// Headless, global context.
    Global,
    /// Interactive.
    None,
}

/// Invocation mode plus the one-shot parameter channel attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: InvocationTarget,
    pub parameters: Parameters,
}

impl Invocation {
    pub fn interactive() -> Self {
        Self { target: InvocationTarget::None, parameters: Parameters::new() }
    }

    pub fn view(view: ViewHandle, parameters: Parameters) -> Self {
        Self { target: InvocationTarget::View(view), parameters }
    }

    pub fn global(parameters: Parameters) -> Self {
        Self { target: InvocationTarget::Global, parameters }
    }

    /// True for view and global targets.
    pub fn is_headless(&self) -> bool {
        !matches!(self.target, InvocationTarget::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::MemoryHost;

    #[test]
    fn test_unique_view_name_skips_taken_ids() {
        let mut host = MemoryHost::new();
        assert_eq!(unique_view_name(&host, "M31", "_Lum"), "M31_Lum");

        host.add_view(ViewHandle::new("M31_Lum", 1));
        host.add_view(ViewHandle::new("M31_Lum2", 1));
        assert_eq!(unique_view_name(&host, "M31", "_Lum"), "M31_Lum3");
    }

    #[test]
    fn test_job_properties() {
        let job = ProcessingJob::new("CurvesTransformation")
            .with("Kt", "AkimaSubsplines")
            .with("K", vec![vec![0.0, 0.25], vec![1.0, 0.75]]);
        assert_eq!(job.property("Kt"), Some(&Value::from("AkimaSubsplines")));
        assert_eq!(job.property("K").and_then(|k| k[1][1].as_f64()), Some(0.75));
        assert!(job.outputs.is_empty());
    }

    #[test]
    fn test_invocation_modes() {
        assert!(!Invocation::interactive().is_headless());
        assert!(Invocation::global(Parameters::new()).is_headless());
        assert!(Invocation::view(ViewHandle::new("M31", 3), Parameters::new()).is_headless());
    }
}
