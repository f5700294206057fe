//! Graph-resolution properties of the controller: apply synthesis, the
//! parents-before-self update order, dirty-flag memoization, validation,
//! and apply gating.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use appdeck_controls::{
    ComboBox, ControlData, ControlError, Controller, FileUpload, InvalidationPolicy, Slider,
    TextField, Validator, View,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn find<'a>(views: &'a [View], id: &str) -> &'a View {
    views
        .iter()
        .find(|v| v.id().as_str() == id)
        .unwrap_or_else(|| panic!("no view with id {id}"))
}

fn apply_view(views: &[View]) -> &View {
    views
        .iter()
        .find(|v| matches!(v, View::ApplyView { .. }))
        .expect("no apply view")
}

fn text_data(view: &View) -> Option<&str> {
    match view {
        View::TextFieldView { data, .. } => data.as_deref(),
        other => panic!("not a text field view: {other:?}"),
    }
}

fn doubling(
    counter: Arc<AtomicUsize>,
) -> impl Fn(&mut ControlData, &[ControlData]) -> HookResult + Send + Sync + 'static {
    move |data, parents| {
        counter.fetch_add(1, Ordering::SeqCst);
        let n: i64 = parents[0].text().unwrap_or("0").parse()?;
        data.set_text((n * 2).to_string());
        Ok(())
    }
}

#[test]
fn simple_update_produces_derived_data_and_synthesized_apply() {
    let c1 = TextField::new().id("c1").data("10").build();
    let c2 = TextField::new()
        .id("c2")
        .depends_on(&c1)
        .update("double", doubling(Arc::new(AtomicUsize::new(0))))
        .build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();

    let views = controller.list(&[]).unwrap();
    assert_eq!(views.len(), 3);
    assert_eq!(text_data(find(&views, "c1")), Some("10"));
    assert_eq!(text_data(find(&views, "c2")), Some("20"));
    apply_view(&views);
}

#[test]
fn apply_is_not_synthesized_for_independent_finite_state_controls() {
    let combo = ComboBox::new(vec![Value::from("a"), Value::from("b")]).id("combo").build();
    let slider = Slider::new([0.0, 1.0]).id("slider").build();
    let mut controller = Controller::new(vec![combo, slider]).unwrap();
    let views = controller.list(&[]).unwrap();
    assert_eq!(views.len(), 2);
    assert!(!views.iter().any(|v| matches!(v, View::ApplyView { .. })));
}

#[test]
fn diamond_ancestor_updates_once_per_traversal() {
    // A -> {B, C} -> D; A has a counting update function reached via two
    // paths. Its dirty flag guards re-entry, so one traversal runs it once.
    let a_runs = Arc::new(AtomicUsize::new(0));
    let a_counter = a_runs.clone();
    let a = TextField::new()
        .id("a")
        .data("1")
        .update("a.init", move |data, _| {
            a_counter.fetch_add(1, Ordering::SeqCst);
            let n: i64 = data.text().unwrap_or("0").parse()?;
            data.set_text(n.to_string());
            Ok(())
        })
        .build();
    let b = TextField::new()
        .id("b")
        .depends_on(&a)
        .update("double", doubling(Arc::new(AtomicUsize::new(0))))
        .build();
    let c = TextField::new()
        .id("c")
        .depends_on(&a)
        .update("double", doubling(Arc::new(AtomicUsize::new(0))))
        .build();
    let d_runs = Arc::new(AtomicUsize::new(0));
    let d_counter = d_runs.clone();
    let d = TextField::new()
        .id("d")
        .depends_on(&b)
        .depends_on(&c)
        .update("sum", move |data, parents| {
            d_counter.fetch_add(1, Ordering::SeqCst);
            let left: i64 = parents[0].text().unwrap_or("0").parse()?;
            let right: i64 = parents[1].text().unwrap_or("0").parse()?;
            data.set_text((left + right).to_string());
            Ok(())
        })
        .build();
    let mut controller = Controller::new(vec![a, b, c, d]).unwrap();

    let views = controller.list(&[]).unwrap();
    assert_eq!(text_data(find(&views, "d")), Some("4"));
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(d_runs.load(Ordering::SeqCst), 1);

    // No new edits: nothing recomputes.
    controller.list(&[]).unwrap();
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(d_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn feeding_views_back_is_content_idempotent() {
    let c1 = TextField::new().id("c1").data("10").build();
    let c2 = TextField::new()
        .id("c2")
        .depends_on(&c1)
        .update("double", doubling(Arc::new(AtomicUsize::new(0))))
        .build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();

    let first = controller.list(&[]).unwrap();
    let second = controller.list(&first).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parent_edit_does_not_recompute_memoized_child() {
    // Documented memoization semantics: the child re-runs only when the
    // child itself receives a new edit.
    let runs = Arc::new(AtomicUsize::new(0));
    let c1 = TextField::new().id("c1").data("10").build();
    let c2 = TextField::new()
        .id("c2")
        .depends_on(&c1)
        .update("double", doubling(runs.clone()))
        .build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();
    controller.list(&[]).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let views = controller.list(&[View::text_edit("c1", "30")]).unwrap();
    assert_eq!(text_data(find(&views, "c1")), Some("30"));
    assert_eq!(text_data(find(&views, "c2")), Some("20"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn transitive_policy_propagates_dirtiness() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c1 = TextField::new().id("c1").data("10").build();
    let c2 = TextField::new()
        .id("c2")
        .depends_on(&c1)
        .update("double", doubling(runs.clone()))
        .build();
    let mut controller =
        Controller::with_policy(vec![c1, c2], InvalidationPolicy::Transitive).unwrap();
    controller.list(&[]).unwrap();

    let views = controller.list(&[View::text_edit("c1", "30")]).unwrap();
    assert_eq!(text_data(find(&views, "c2")), Some("60"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn validated_text_field_round_trip() {
    let field = TextField::new().id("n").validator(Validator::int()).build();
    let mut controller = Controller::new(vec![field]).unwrap();

    controller.list(&[View::text_edit("n", "10")]).unwrap();
    assert_eq!(
        controller.value_of(&"n".into()).unwrap(),
        Some(Value::from(10))
    );

    let err = controller
        .list(&[View::text_edit("n", "abc")])
        .unwrap_err();
    match err {
        ControlError::Validation { id, .. } => assert_eq!(id.as_str(), "n"),
        other => panic!("expected validation error, got {other:?}"),
    }
    // Prior state untouched.
    assert_eq!(
        controller.value_of(&"n".into()).unwrap(),
        Some(Value::from(10))
    );
}

#[test]
fn apply_gate_tracks_non_optional_values() {
    let c1 = TextField::new().id("c1").build();
    let c2 = TextField::new().id("c2").build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();

    let views = controller.list(&[]).unwrap();
    assert!(!apply_view(&views).enabled());

    let views = controller.list(&[View::text_edit("c1", "x")]).unwrap();
    assert!(!apply_view(&views).enabled());

    let views = controller.list(&[View::text_edit("c2", "y")]).unwrap();
    assert!(apply_view(&views).enabled());
}

#[test]
fn apply_gate_skips_optional_controls() {
    let c1 = TextField::new().id("c1").build();
    let c2 = TextField::new().id("c2").optional(true).build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();

    let views = controller.list(&[View::text_edit("c1", "x")]).unwrap();
    assert!(apply_view(&views).enabled());
}

#[test]
fn failed_update_is_reported_and_retried() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let c1 = TextField::new().id("c1").data("1").build();
    let c2 = TextField::new()
        .id("c2")
        .depends_on(&c1)
        .update("boom", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("broken".into())
        })
        .build();
    let mut controller = Controller::new(vec![c1, c2]).unwrap();

    for attempt in 1..=3 {
        let err = controller.list(&[]).unwrap_err();
        match err {
            ControlError::Update { id, message } => {
                assert_eq!(id.as_str(), "c2");
                assert!(message.contains("broken"));
            }
            other => panic!("expected update error, got {other:?}"),
        }
        // The dirty flag stays set after a failure, so every list retries.
        assert_eq!(runs.load(Ordering::SeqCst), attempt);
    }
}

#[test]
fn unknown_view_id_is_rejected() {
    let c1 = TextField::new().id("c1").build();
    let mut controller = Controller::new(vec![c1]).unwrap();
    assert!(matches!(
        controller.list(&[View::text_edit("ghost", "x")]),
        Err(ControlError::UnknownControl(id)) if id.as_str() == "ghost"
    ));
}

#[test]
fn duplicate_apply_is_rejected() {
    use appdeck_controls::Apply;
    let result = Controller::new(vec![
        Apply::new().id("a1").build(),
        Apply::new().id("a2").build(),
    ]);
    assert!(matches!(
        result,
        Err(appdeck_controls::ConfigurationError::DuplicateApply)
    ));
}

#[test]
fn dependency_cycle_is_rejected_at_construction() {
    let c1 = TextField::new().id("c1").depends_on_id("c2").build();
    let c2 = TextField::new().id("c2").depends_on_id("c1").build();
    assert!(matches!(
        Controller::new(vec![c1, c2]),
        Err(appdeck_controls::ConfigurationError::DependencyCycle(_))
    ));
}

#[test]
fn unknown_parent_is_rejected_at_construction() {
    let c1 = TextField::new().id("c1").depends_on_id("missing").build();
    assert!(matches!(
        Controller::new(vec![c1]),
        Err(appdeck_controls::ConfigurationError::UnknownParent { .. })
    ));
}

#[test]
fn explicit_apply_is_reused() {
    use appdeck_controls::Apply;
    let c1 = TextField::new().id("c1").data("x").build();
    let apply = Apply::new().id("go").label("Run").build();
    let mut controller = Controller::new(vec![c1, apply]).unwrap();
    let views = controller.list(&[]).unwrap();
    assert_eq!(views.len(), 2);
    let gate = apply_view(&views);
    assert_eq!(gate.id().as_str(), "go");
    assert_eq!(gate.label(), Some("Run"));
    assert!(gate.enabled());
}

#[test]
fn upload_content_travels_with_the_view() {
    let upload = FileUpload::new().id("f").build();
    let mut controller = Controller::new(vec![upload]).unwrap();

    let encoded = BASE64.encode(b"payload");
    let edit = View::FileUploadView {
        id: "f".into(),
        enabled: true,
        label: None,
        optional: false,
        is_text: false,
        data: Some(encoded.clone()),
    };
    let views = controller.list(&[edit]).unwrap();
    match find(&views, "f") {
        View::FileUploadView { data, .. } => assert_eq!(data.as_deref(), Some(encoded.as_str())),
        other => panic!("unexpected view {other:?}"),
    }
    assert_eq!(
        controller.value_of(&"f".into()).unwrap(),
        Some(Value::from(encoded))
    );
}

#[test]
fn malformed_upload_edit_is_rejected_and_state_kept() {
    let upload = FileUpload::new().id("f").build();
    let mut controller = Controller::new(vec![upload]).unwrap();

    let good = View::FileUploadView {
        id: "f".into(),
        enabled: true,
        label: None,
        optional: false,
        is_text: false,
        data: Some(BASE64.encode(b"first")),
    };
    controller.list(&[good]).unwrap();

    let bad = View::FileUploadView {
        id: "f".into(),
        enabled: true,
        label: None,
        optional: false,
        is_text: false,
        data: Some("!!!not-base64!!!".to_string()),
    };
    let err = controller.list(&[bad]).unwrap_err();
    match err {
        ControlError::Validation { id, .. } => assert_eq!(id.as_str(), "f"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(
        controller.value_of(&"f".into()).unwrap(),
        Some(Value::from(BASE64.encode(b"first")))
    );
}

#[test]
fn combo_box_selection_resolves_elements() {
    let combo = ComboBox::new(vec![Value::from("red"), Value::from("green")])
        .id("color")
        .build();
    let mut controller = Controller::new(vec![combo]).unwrap();
    assert_eq!(
        controller.value_of(&"color".into()).unwrap(),
        Some(Value::from("red"))
    );
    controller
        .list(&[View::selection_edit("color", 1)])
        .unwrap();
    assert_eq!(
        controller.value_of(&"color".into()).unwrap(),
        Some(Value::from("green"))
    );
}
