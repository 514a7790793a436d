// Bootstrap dispatch: headless vs interactive, validation, persistence.

use std::cell::Cell;
use std::rc::Rc;

use tempfile::TempDir;

use deepsky_config::{shared, JsonFileStore, MemoryStore, Parameters, SharedStore};
use deepsky_core::{SettingDescriptor, SettingValue};
use deepsky_engine::harness::{MemoryHost, ScriptedSurface, UserAction};
use deepsky_engine::{
    share, Bootstrap, BootstrapState, EngineError, Feature, FeatureRegistry, Invocation,
    OperationContext, ProcessingJob, RunPath, SurfaceHandle, ValidationFailure, ViewHandle,
};

// ---------------------------------------------------------------------------
// Fixture feature
// ---------------------------------------------------------------------------

struct Sharpen;

impl Feature for Sharpen {
    fn name(&self) -> &str {
        "sharpen"
    }

    fn title(&self) -> &str {
        "Sharpen"
    }

    fn descriptors(&self) -> Vec<SettingDescriptor> {
        vec![
            SettingDescriptor::int16("strength", 10).range(1.0, 10.0),
            SettingDescriptor::double("amount", 0.5).precision(2).range(0.0, 1.0),
            SettingDescriptor::boolean("preview", false).transient(),
        ]
    }

    fn validate(&self, cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        match cx.view() {
            Some(_) => Ok(()),
            None => Err(ValidationFailure::new("No active view!")),
        }
    }

    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        let view = cx.require_view()?;
        cx.state.progress.begin(1);
        cx.show_step("Sharpening...");
        let job = ProcessingJob::new("UnsharpMask")
            .with("strength", cx.setting_i64("strength")?)
            .with("amount", cx.setting_f64("amount")?);
        cx.execute(&job, &view)
    }
}

fn setup(store: SharedStore) -> Bootstrap {
    let mut registry = FeatureRegistry::new();
    let handle = registry.register_with_store(Box::new(Sharpen), store).unwrap();
    Bootstrap::new(handle)
}

fn m31() -> ViewHandle {
    ViewHandle::new("M31", 3)
}

/// Factory that counts how many surfaces it built.
fn counting_factory(
    count: Rc<Cell<usize>>,
    actions: Vec<UserAction>,
) -> impl FnOnce(&deepsky_engine::FeatureHandle) -> Result<SurfaceHandle, EngineError> {
    move |_| {
        count.set(count.get() + 1);
        Ok(share(ScriptedSurface::new(actions)))
    }
}

fn job_i64(host: &MemoryHost, index: usize, key: &str) -> Option<i64> {
    host.jobs()[index].job.property(key).and_then(|v| v.as_i64())
}

// ---------------------------------------------------------------------------
// Headless
// ---------------------------------------------------------------------------

#[test]
fn test_view_target_runs_main_once_without_surface() {
    let store = shared(MemoryStore::new());
    store.borrow_mut().seed("strength", SettingValue::Int16(4));
    let mut bootstrap = setup(store.clone());
    let mut host = MemoryHost::new();
    let target = host.add_view(m31());

    let mut params = Parameters::new();
    params.set("strength", SettingValue::Int64(7));

    let built = Rc::new(Cell::new(0));
    let outcome = bootstrap
        .run(&mut host, &Invocation::view(target, params), counting_factory(built.clone(), vec![]))
        .unwrap();

    assert_eq!(outcome.path, RunPath::Headless);
    assert_eq!(outcome.main_invocations, 1);
    assert!(outcome.close_on_exit);
    assert_eq!(built.get(), 0);
    assert!(bootstrap.handle().dialog().is_none());
    assert_eq!(bootstrap.state(), BootstrapState::Done);

    // Parameters win over the store, and the store is not written
    assert_eq!(job_i64(&host, 0, "strength"), Some(7));
    assert_eq!(host.jobs()[0].target, "M31");
    assert_eq!(store.borrow().write_count(), 0);
}

#[test]
fn test_view_target_without_parameters_uses_store() {
    let store = shared(MemoryStore::new());
    store.borrow_mut().seed("strength", SettingValue::Int16(4));
    let mut bootstrap = setup(store);
    let mut host = MemoryHost::new();
    let target = host.add_view(m31());

    bootstrap
        .run(&mut host, &Invocation::view(target, Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(job_i64(&host, 0, "strength"), Some(4));
}

#[test]
fn test_global_target_runs_on_active_view() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::with_active_view(m31());

    let outcome = bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(outcome.path, RunPath::Headless);
    assert_eq!(host.jobs()[0].target, "M31");
}

#[test]
fn test_headless_validation_failure_skips_main() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::new();

    let outcome = bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(outcome.main_invocations, 0);
    assert_eq!(outcome.rejected, 1);
    assert!(outcome.close_on_exit);
    assert!(host.jobs().is_empty());
    assert_eq!(host.alerts().len(), 1);
}

#[test]
fn test_job_failure_propagates() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::with_active_view(m31());
    host.fail_on("UnsharpMask");

    let err = bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap_err();
    assert!(matches!(err, EngineError::Job(ref e) if e.process == "UnsharpMask"));
    assert_eq!(bootstrap.state(), BootstrapState::HeadlessRun);
}

// ---------------------------------------------------------------------------
// Interactive
// ---------------------------------------------------------------------------

#[test]
fn test_no_target_builds_exactly_one_surface() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::with_active_view(m31());

    let built = Rc::new(Cell::new(0));
    let outcome = bootstrap
        .run(&mut host, &Invocation::interactive(), counting_factory(built.clone(), vec![]))
        .unwrap();

    assert_eq!(outcome.path, RunPath::Interactive);
    assert_eq!(built.get(), 1);
    assert_eq!(outcome.main_invocations, 0);
    assert!(host.jobs().is_empty());
    assert!(bootstrap.handle().dialog().is_some());
}

#[test]
fn test_apply_runs_main_and_saves_settings() {
    let store = shared(MemoryStore::new());
    let mut bootstrap = setup(store.clone());
    let mut host = MemoryHost::with_active_view(m31());

    let surface = ScriptedSurface::new(vec![
        UserAction::edit("strength", 3i16),
        UserAction::edit("preview", true),
        UserAction::Apply,
        // The session closed on success; this never runs
        UserAction::Apply,
    ]);
    let transcript = surface.transcript();
    let outcome = bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();

    assert_eq!(outcome.main_invocations, 1);
    assert!(outcome.close_on_exit);
    assert_eq!(job_i64(&host, 0, "strength"), Some(3));
    assert_eq!(store.borrow().get("strength"), Some(&SettingValue::Int16(3)));
    assert_eq!(store.borrow().get("preview"), None);
    assert_eq!(
        *transcript.borrow(),
        vec![
            "edit strength=3",
            "edit preview=true",
            "progress: Step 1 of 1: Sharpening...",
            "apply: ran",
        ]
    );
}

#[test]
fn test_interactive_validation_failure_keeps_surface_open() {
    let store = shared(MemoryStore::new());
    let mut bootstrap = setup(store.clone());
    let mut host = MemoryHost::new();

    let surface = ScriptedSurface::new(vec![UserAction::Apply, UserAction::Close]);
    let transcript = surface.transcript();
    let outcome = bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();

    assert_eq!(outcome.main_invocations, 0);
    assert_eq!(outcome.rejected, 1);
    assert!(!outcome.close_on_exit);
    assert_eq!(store.borrow().write_count(), 0);
    assert_eq!(
        *transcript.borrow(),
        vec!["apply: rejected: No active view!", "close"]
    );
}

#[test]
fn test_out_of_range_edit_never_reaches_store() {
    let store = shared(MemoryStore::new());
    let mut bootstrap = setup(store.clone());
    let mut host = MemoryHost::with_active_view(m31());

    let surface = ScriptedSurface::new(vec![UserAction::edit("strength", 15i16), UserAction::Apply]);
    bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();
    assert_eq!(store.borrow().get("strength"), Some(&SettingValue::Int16(10)));

    // A fresh run reads the same value back
    let surface = ScriptedSurface::new(vec![UserAction::Apply]);
    bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();
    assert_eq!(job_i64(&host, 1, "strength"), Some(10));
}

#[test]
fn test_reset_and_new_instance() {
    let store = shared(MemoryStore::new());
    store.borrow_mut().seed("amount", SettingValue::Double(0.75));
    let mut bootstrap = setup(store.clone());
    let mut host = MemoryHost::with_active_view(m31());

    let surface = ScriptedSurface::new(vec![
        UserAction::NewInstance,
        UserAction::Reset,
        UserAction::Close,
    ]);
    let transcript = surface.transcript();
    bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();

    assert_eq!(
        *transcript.borrow(),
        vec!["new instance: 2 parameters", "reset", "close"]
    );
    assert_eq!(store.borrow().get("amount"), Some(&SettingValue::Double(0.5)));
}

#[test]
fn test_settings_survive_between_runs_on_disk() {
    let dir = TempDir::new().unwrap();
    let store: SharedStore = shared(JsonFileStore::for_feature(dir.path(), "sharpen"));
    let mut bootstrap = setup(store);
    let mut host = MemoryHost::with_active_view(m31());

    let surface = ScriptedSurface::new(vec![UserAction::edit("amount", 0.25), UserAction::Apply]);
    bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();

    // A new process: new registry, new store handle on the same file
    let store: SharedStore = shared(JsonFileStore::for_feature(dir.path(), "sharpen"));
    let mut bootstrap = setup(store);
    bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(
        host.jobs()[1].job.property("amount").and_then(|v| v.as_f64()),
        Some(0.25)
    );
}

#[test]
fn test_close_on_exit_initial_value() {
    let mut bootstrap = setup(shared(MemoryStore::new())).close_on_exit(true);
    let mut host = MemoryHost::with_active_view(m31());

    let outcome = bootstrap
        .run(&mut host, &Invocation::interactive(), |_| Ok(share(ScriptedSurface::new(vec![]))))
        .unwrap();
    assert!(outcome.close_on_exit);
}

#[test]
fn test_progress_callback_cleared_after_interactive_run() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::with_active_view(m31());

    let surface = ScriptedSurface::new(vec![UserAction::Apply]);
    let transcript = surface.transcript();
    bootstrap
        .run(&mut host, &Invocation::interactive(), move |_| Ok(share(surface)))
        .unwrap();
    assert_eq!(*transcript.borrow(), vec!["progress: Step 1 of 1: Sharpening...", "apply: ran"]);

    // The dialog is gone; a headless run must not report into it
    bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(host.jobs().len(), 2);
    assert_eq!(transcript.borrow().len(), 2);
    assert!(!bootstrap.handle().state().borrow().progress.has_callback());
}

#[test]
fn test_failed_run_does_not_block_the_next() {
    let mut bootstrap = setup(shared(MemoryStore::new()));
    let mut host = MemoryHost::with_active_view(m31());
    let lum = host.add_view(ViewHandle::new("M31_Lum", 1));
    bootstrap
        .handle()
        .state()
        .borrow_mut()
        .scratch
        .insert("lum", lum, "extract_luminance")
        .unwrap();

    let outcome = bootstrap
        .run(&mut host, &Invocation::global(Parameters::new()), |_| unreachable!())
        .unwrap();
    assert_eq!(outcome.main_invocations, 1);
    assert_eq!(host.closed(), &["M31_Lum".to_string()]);

    let state = bootstrap.handle().state();
    let state = state.borrow();
    assert!(state.scratch.outstanding().is_empty());
    assert!(state.scratch.ledger().is_empty());
}
