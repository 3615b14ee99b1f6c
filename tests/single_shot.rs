mod support;

use perception_loop::detect::{ClassificationResult, EngineCapability, NetworkRegistry, EngineOptions};
use perception_loop::ingest::open_image;
use perception_loop::single_shot::ClassificationRun;

use support::{Captured, EventLog, ScriptedEngine, ScriptedSource};

fn releases(log: &EventLog) -> Vec<String> {
    log.events()
        .into_iter()
        .filter(|e| e.starts_with("close:") || e.starts_with("shutdown:"))
        .collect()
}

#[test]
fn recognized_image_is_reported_with_label() {
    let log = EventLog::default();
    let out = Captured::default();
    let run = ClassificationRun::new(
        Box::new(ScriptedSource::new(&log, vec![])),
        Box::new(ScriptedEngine::new(&log).classifying(ClassificationResult::new(4, 0.8))),
    );

    let result = run.run(&mut out.reporter()).unwrap();

    assert_eq!(result.recognized(), Some((4, 0.8)));
    assert_eq!(
        out.text(),
        "image is recognized as 'class-4' (class #4) with 80.000000% confidence\n"
    );
    assert_eq!(log.count("acquire"), 1);
    assert_eq!(log.count("classify"), 1);
    assert_eq!(releases(&log), ["close:source", "shutdown:engine"]);
}

#[test]
fn negative_confidence_reports_failure_without_label() {
    let log = EventLog::default();
    let out = Captured::default();
    let run = ClassificationRun::new(
        Box::new(ScriptedSource::new(&log, vec![])),
        Box::new(ScriptedEngine::new(&log).classifying(ClassificationResult::new(2, -1.0))),
    );

    let result = run.run(&mut out.reporter()).unwrap();

    assert_eq!(result.recognized(), None);
    assert_eq!(out.text(), "failed to classify image\n");
    assert!(log.matching("label:").is_empty());
}

#[test]
fn engine_failure_is_explained_and_releases() {
    let log = EventLog::default();
    let out = Captured::default();
    let run = ClassificationRun::new(
        Box::new(ScriptedSource::new(&log, vec![])),
        Box::new(ScriptedEngine::new(&log).failing_on(1)),
    );

    let err = run.run(&mut out.reporter()).unwrap_err();

    assert!(format!("{:#}", err).contains("failed to classify image"));
    assert!(out.text().is_empty());
    assert_eq!(log.count("classify"), 1);
    assert_eq!(releases(&log), ["close:source", "shutdown:engine"]);
}

#[test]
fn detector_only_engine_is_refused_before_acquiring() {
    let log = EventLog::default();
    let out = Captured::default();
    let run = ClassificationRun::new(
        Box::new(ScriptedSource::new(&log, vec![])),
        Box::new(ScriptedEngine::new(&log).only(EngineCapability::Detection)),
    );

    assert!(run.run(&mut out.reporter()).is_err());
    assert_eq!(log.count("acquire"), 0);
    assert_eq!(releases(&log), ["close:source", "shutdown:engine"]);
}

#[test]
fn synthetic_network_classifies_a_synthetic_scene() {
    let out = Captured::default();
    let registry = NetworkRegistry::builtin();
    let engine = registry
        .load_for(None, &EngineOptions::default(), EngineCapability::Classification)
        .unwrap();
    let source = open_image("stub://still?seed=7").unwrap();

    let result = ClassificationRun::new(source, engine)
        .run(&mut out.reporter())
        .unwrap();

    let text = out.text();
    match result.recognized() {
        Some(_) => assert!(text.starts_with("image is recognized as '")),
        None => assert_eq!(text, "failed to classify image\n"),
    }
}
