use perfscan_core::config::ConfigError;
use perfscan_core::detectors::{registry, Detector, Granularity};
use perfscan_core::engine::{scan, Engine, EngineError, EngineState};
use perfscan_core::ir::{Program, ProgramBuilder};
use perfscan_core::loops::LoopTable;
use perfscan_core::report::{Finding, FindingContext, LifecycleVerdict};
use perfscan_core::source::LocationResolver;

/// Two global mutexes: `LOCK_open` is locked and unlocked by `open_table`,
/// `LOCK_stale` is only ever initialized and destroyed.
fn mutex_program() -> (Program, LoopTable) {
    let mut b = ProgramBuilder::new();
    let void = b.void();
    let i32_ty = b.int(32);
    let mutex = b.named_struct("union.pthread_mutex_t", vec![i32_ty, i32_ty]);
    let mutex_ptr = b.ptr(mutex);
    let open = b.global("LOCK_open", mutex, None);
    let stale = b.global("LOCK_stale", mutex, None);

    let init = b.function("pthread_mutex_init", i32_ty, vec![mutex_ptr]);
    let destroy = b.function("pthread_mutex_destroy", i32_ty, vec![mutex_ptr]);
    let lock = b.function("pthread_mutex_lock", i32_ty, vec![mutex_ptr]);
    let unlock = b.function("pthread_mutex_unlock", i32_ty, vec![mutex_ptr]);

    let setup = b.function("init_globals", void, vec![]);
    let entry = b.block(setup, "entry");
    b.call(entry, init, vec![open.into()]);
    b.call(entry, init, vec![stale.into()]);
    b.ret(entry, None);

    let teardown = b.function("free_globals", void, vec![]);
    let entry = b.block(teardown, "entry");
    b.call(entry, destroy, vec![open.into()]);
    b.call(entry, destroy, vec![stale.into()]);
    b.ret(entry, None);

    let worker = b.function("open_table", void, vec![]);
    let entry = b.block(worker, "entry");
    b.call(entry, lock, vec![open.into()]);
    b.call(entry, unlock, vec![open.into()]);
    b.ret(entry, None);

    b.finish().expect("valid program")
}

fn classification(finding: &Finding) -> (&str, LifecycleVerdict, &[String]) {
    match &finding.context[..] {
        [FindingContext::Classification { variable, verdict, used_by }] => {
            (variable.as_str(), *verdict, used_by.as_slice())
        }
        other => panic!("expected one classification, got {other:?}"),
    }
}

#[test]
fn mutex_used_by_lock_and_unlock_is_good_practice() {
    let (program, loops) = mutex_program();
    let findings = scan(Detector::MySQLBug38968, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(findings.len(), 2);

    let (variable, verdict, used_by) = classification(&findings[0]);
    assert_eq!(variable, "LOCK_open");
    assert_eq!(verdict, LifecycleVerdict::GoodPractice);
    assert_eq!(used_by, ["pthread_mutex_lock", "pthread_mutex_unlock"]);
    assert!(findings[0].function.is_none());
    assert!(findings[0].to_string().contains("* good practice: LOCK_open"));

    let (variable, verdict, used_by) = classification(&findings[1]);
    assert_eq!(variable, "LOCK_stale");
    assert_eq!(verdict, LifecycleVerdict::Bug);
    assert!(used_by.is_empty());
    assert!(findings[1].to_string().contains("* bugs:  LOCK_stale"));
}

#[test]
fn lock_through_a_constant_cast_counts_as_use() {
    let mut b = ProgramBuilder::new();
    let void = b.void();
    let i8_ty = b.int(8);
    let i8_ptr = b.ptr(i8_ty);
    let i32_ty = b.int(32);
    let mutex = b.named_struct("union.pthread_mutex_t", vec![i32_ty, i32_ty]);
    let mutex_ptr = b.ptr(mutex);
    let cast_lock = b.global("LOCK_cast", mutex, None);
    let field_lock = b.global("LOCK_field", mutex, None);
    let zero = b.const_int(32, 0);
    let as_bytes = b.const_expr(i8_ptr, "bitcast", vec![cast_lock.into()]);
    let first_field =
        b.const_expr(mutex_ptr, "getelementptr", vec![field_lock.into(), zero.into(), zero.into()]);

    let init = b.function("pthread_mutex_init", i32_ty, vec![mutex_ptr]);
    let lock = b.function("pthread_mutex_lock", i32_ty, vec![mutex_ptr]);

    let worker = b.function("flush_tables", void, vec![]);
    let entry = b.block(worker, "entry");
    b.call(entry, init, vec![as_bytes.into()]);
    b.call(entry, lock, vec![as_bytes.into()]);
    b.call(entry, lock, vec![first_field.into()]);
    b.ret(entry, None);
    let (program, loops) = b.finish().expect("valid program");

    let findings = scan(Detector::MySQLBug38968, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(findings.len(), 2);
    for finding in &findings {
        let (variable, verdict, used_by) = classification(finding);
        assert_eq!(verdict, LifecycleVerdict::GoodPractice, "{variable} is locked");
        assert_eq!(used_by, ["pthread_mutex_lock"]);
    }
}

#[test]
fn indirect_call_does_not_count_as_use() {
    let mut b = ProgramBuilder::new();
    let void = b.void();
    let i32_ty = b.int(32);
    let mutex = b.named_struct("union.pthread_mutex_t", vec![i32_ty, i32_ty]);
    let mutex_ptr = b.ptr(mutex);
    let hook_ty = b.fn_type(i32_ty, vec![mutex_ptr], false);
    let hook_ptr = b.ptr(hook_ty);
    let hidden = b.global("LOCK_hidden", mutex, None);

    let init = b.function("pthread_mutex_init", i32_ty, vec![mutex_ptr]);
    let run_hook = b.function("run_hook", void, vec![hook_ptr]);
    let entry = b.block(run_hook, "entry");
    let hook = b.arg(run_hook, 0);
    b.call(entry, init, vec![hidden.into()]);
    b.call_indirect(entry, i32_ty, hook, vec![hidden.into()]);
    b.ret(entry, None);
    let (program, loops) = b.finish().expect("valid program");

    let findings = scan(Detector::MySQLBug38968, &program, &loops, LocationResolver::new())
        .expect("scan succeeds");
    assert_eq!(findings.len(), 1);
    let (variable, verdict, used_by) = classification(&findings[0]);
    assert_eq!(variable, "LOCK_hidden");
    assert_eq!(verdict, LifecycleVerdict::Bug);
    assert!(used_by.is_empty(), "an unknown callee is not a use: {used_by:?}");
}

#[test]
fn initialize_runs_the_module_detector_once() {
    let (program, loops) = mutex_program();
    let mut engine =
        Engine::new(Detector::MySQLBug38968, &program, &loops, LocationResolver::new());
    assert_eq!(engine.state(), EngineState::Uninitialized);

    let mut findings = Vec::new();
    engine.initialize(&mut findings).expect("initialize");
    assert_eq!(engine.state(), EngineState::Dispatching);
    assert_eq!(findings.len(), 2);

    engine.initialize(&mut findings).expect("second initialize is a no-op");
    engine.run(&mut findings).expect("per-function pass");
    assert_eq!(findings.len(), 2, "module findings are not repeated");
}

#[test]
fn per_function_initialize_preloads_sources() {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::write(tmp.path().join("a.c"), "int main() {\n  return 0;\n}\n").expect("write a.c");
    let dir = tmp.path().to_string_lossy().to_string();

    let mut b = ProgramBuilder::new();
    let i32_ty = b.int(32);
    let main = b.function("main", i32_ty, vec![]);
    let entry = b.block(main, "entry");
    let zero = b.const_int(32, 0);
    b.at(&dir, "a.c", 2);
    b.ret(entry, Some(zero.into()));
    let (program, loops) = b.finish().expect("valid program");

    let mut engine =
        Engine::new(Detector::ApacheBug33605, &program, &loops, LocationResolver::new());
    let mut findings = Vec::new();
    engine.initialize(&mut findings).expect("initialize");
    assert_eq!(engine.context().sources.len(), 1);
    engine.run(&mut findings).expect("run");
    assert!(findings.is_empty());
}

#[test]
fn unknown_identifier_is_a_configuration_error() {
    let (program, loops) = mutex_program();
    let result = Engine::for_bug("MySQLBug0", &program, &loops, LocationResolver::new());
    match result {
        Err(EngineError::Config(ConfigError::UnknownBug(id))) => assert_eq!(id, "MySQLBug0"),
        Err(other) => panic!("expected UnknownBug, got {other}"),
        Ok(_) => panic!("expected UnknownBug, got an engine"),
    }
    let err = "Nope".parse::<Detector>().expect_err("unknown id");
    assert_eq!(err.to_string(), "no checker implemented for bug Nope");
}

#[test]
fn placeholder_detectors_report_nothing() {
    let (program, loops) = mutex_program();
    for detector in Detector::ALL.iter().copied().filter(Detector::is_placeholder) {
        let findings =
            scan(detector, &program, &loops, LocationResolver::new()).expect("scan succeeds");
        assert!(findings.is_empty(), "{detector} should be silent");
    }
}

#[test]
fn registry_lists_every_identifier_sorted() {
    let names = registry::names();
    assert_eq!(names.len(), Detector::ALL.len());
    assert!(names.windows(2).all(|w| w[0] < w[1]));
    for name in &names {
        let detector: Detector = name.parse().expect("listed names parse");
        assert_eq!(detector.as_str(), *name);
    }

    let module: Vec<_> =
        registry::list().into_iter().filter(|d| d.granularity == Granularity::Module).collect();
    assert_eq!(module.len(), 1);
    assert_eq!(module[0].id, "MySQLBug38968");
}

#[test]
fn generic_loop_listing_is_not_described_as_a_bug() {
    let info = registry::list()
        .into_iter()
        .find(|d| d.id == "LoopNestedCallSites")
        .expect("LoopNestedCallSites is listed");
    assert_eq!(info.granularity, Granularity::PerFunction);
    assert!(info.description.contains("not a tracked bug"), "{}", info.description);
    assert!(!Detector::LoopNestedCallSites.is_placeholder());
}
