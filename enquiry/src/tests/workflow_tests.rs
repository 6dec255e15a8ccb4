use crate::presets::TabFields;
use crate::{
    validate_workflow, FieldDef, FieldSelector, PresetPath, Presets, StepAction, Workflow,
    WorkflowStep,
};

fn presets() -> Presets {
    let mut fields = TabFields::new();
    fields.insert(
        "search".to_string(),
        FieldDef::new(FieldSelector::Css {
            selector: "#search".to_string(),
        }),
    );
    fields.insert(
        "balance".to_string(),
        FieldDef::new(FieldSelector::TableLookup {
            table_id: "info-table".to_string(),
            label: "Balance".to_string(),
        }),
    );
    let mut presets = Presets::default();
    presets
        .add_tab(&PresetPath::new("Retail", "Customer", "Profile"), fields)
        .unwrap();
    presets
}

#[test]
fn test_action_names_and_aliases() {
    assert_eq!("wait_for".parse::<StepAction>().unwrap(), StepAction::WaitFor);
    assert_eq!(
        "wait_for_element".parse::<StepAction>().unwrap(),
        StepAction::WaitFor
    );
    assert_eq!(
        "Switch_To_Frame".parse::<StepAction>().unwrap(),
        StepAction::SwitchToFrame
    );
    assert!("scroll".parse::<StepAction>().is_err());
    assert_eq!(StepAction::SwitchToDefault.to_string(), "switch_to_default");
}

#[test]
fn test_unknown_action_is_rejected_on_load() {
    let json = r#"{"name": "bad", "steps": [{"action": "hover", "field": "x"}]}"#;
    assert!(Workflow::from_json(json).is_err());
}

#[test]
fn test_legacy_params_are_folded() {
    let json = r#"{
        "name": "legacy",
        "steps": [
            {"action": "input", "field": "search", "params": {"value": "123"}},
            {"action": "wait", "params": {"seconds": 1.5}}
        ]
    }"#;
    let workflow = Workflow::from_json(json).unwrap();
    assert_eq!(workflow.steps[0].value.as_deref(), Some("123"));
    assert_eq!(workflow.steps[1].wait_seconds(), 1.5);

    let saved = serde_json::to_string(&workflow).unwrap();
    assert!(!saved.contains("params"));
    assert!(saved.contains(r#""value":"123""#));
}

#[test]
fn test_step_key_resolution() {
    let path = PresetPath::new("Retail", "Customer", "Profile");
    let step = WorkflowStep::new(StepAction::Click).field("search");
    assert_eq!(
        step.key(Some(&path)).unwrap().to_string(),
        "Retail/Customer/Profile/search"
    );
    assert!(step.key(None).is_err());

    let qualified = WorkflowStep::new(StepAction::Extract)
        .field("ignored")
        .selector_key("Corp/Loan/Summary/limit");
    assert_eq!(
        qualified.key(None).unwrap().to_string(),
        "Corp/Loan/Summary/limit"
    );
    assert_eq!(qualified.result_key().as_deref(), Some("limit"));
    assert_eq!(
        qualified.output("credit_limit").result_key().as_deref(),
        Some("credit_limit")
    );
}

#[test]
fn test_describe() {
    let path = PresetPath::new("Retail", "Customer", "Profile");
    assert_eq!(
        WorkflowStep::new(StepAction::Click)
            .field("search")
            .describe(Some(&path)),
        "click → Retail/Customer/Profile/search"
    );
    assert_eq!(
        WorkflowStep::new(StepAction::Wait).seconds(2.0).describe(None),
        "wait → 2s"
    );
}

#[test]
fn test_remove_step_out_of_range() {
    let mut workflow = Workflow::new("w");
    workflow.add_step(WorkflowStep::new(StepAction::SwitchToDefault));
    assert!(workflow.remove_step(1).is_err());
    assert_eq!(
        workflow.remove_step(0).unwrap().action,
        StepAction::SwitchToDefault
    );
    assert!(workflow.steps.is_empty());
}

#[test]
fn test_yaml_and_json_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = PresetPath::new("Retail", "Customer", "Profile");
    let mut workflow = Workflow::new("lookup").with_path(&path);
    workflow.add_step(
        WorkflowStep::new(StepAction::Input)
            .field("search")
            .value_from("cif"),
    );
    workflow.add_step(
        WorkflowStep::new(StepAction::Extract)
            .field("balance")
            .output("bal"),
    );

    for name in ["lookup.yaml", "lookup.json"] {
        let file = dir.path().join(name);
        workflow.save(&file).unwrap();
        let loaded = Workflow::load(&file).unwrap();
        assert_eq!(loaded, workflow);
        assert_eq!(loaded.preset_path(), Some(path.clone()));
    }

    let yaml = std::fs::read_to_string(dir.path().join("lookup.yaml")).unwrap();
    assert!(yaml.contains("as: bal"));
}

#[test]
fn test_validation_reports_errors_and_warnings() {
    let presets = presets();
    let path = PresetPath::new("Retail", "Customer", "Profile");
    let mut workflow = Workflow::new("check").with_path(&path);
    workflow.add_step(WorkflowStep::new(StepAction::Input).field("search"));
    workflow.add_step(WorkflowStep::new(StepAction::Wait));
    workflow.add_step(WorkflowStep::new(StepAction::Click).field("balance"));
    workflow.add_step(WorkflowStep::new(StepAction::Extract).field("missing"));
    workflow.add_step(WorkflowStep::new(StepAction::Extract).field("balance"));

    let report = validate_workflow(&workflow, &presets, None);
    assert!(!report.is_valid());
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Step 3 (click)"));
    assert!(report.errors[1].contains("Retail/Customer/Profile/missing"));
}

#[test]
fn test_empty_workflow_is_invalid() {
    let report = validate_workflow(&Workflow::new("empty"), &Presets::default(), None);
    assert_eq!(report.errors, vec!["Workflow must contain at least one step"]);
}

#[test]
fn test_out_of_range_wait_is_invalid() {
    let mut workflow = Workflow::new("forever");
    workflow.add_step(WorkflowStep::new(StepAction::Wait).seconds(1e20));
    workflow.add_step(WorkflowStep::new(StepAction::Wait).seconds(2.5));

    let report = validate_workflow(&workflow, &Presets::default(), None);
    assert!(report.warnings.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Step 1 (wait) has an out-of-range"));
}
