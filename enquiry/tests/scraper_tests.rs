mod common;

use common::MockEngine;
use enquiry::presets::TabFields;
use enquiry::{
    normalize_url, EnquiryError, EnquirySession, FieldDef, FieldSelector, FieldValue, PresetPath,
    Presets, ScrapeOptions, StepAction, WindowWatch, Workflow, WorkflowStep,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn css(s: &str) -> FieldDef {
    FieldDef::new(FieldSelector::Css {
        selector: s.to_string(),
    })
}

fn lookup(label: &str) -> FieldDef {
    FieldDef::new(FieldSelector::TableLookup {
        table_id: "info-table".to_string(),
        label: label.to_string(),
    })
}

fn profile() -> PresetPath {
    PresetPath::new("Retail", "Customer", "Profile")
}

fn presets(with_iframe: bool) -> Presets {
    let mut fields = TabFields::new();
    if with_iframe {
        fields.insert("iframe".to_string(), css("iframe.enquiry"));
    }
    fields.insert("name".to_string(), css("#name"));
    fields.insert("cif".to_string(), lookup("CIF"));
    fields.insert("branch".to_string(), lookup("Branch"));
    fields.insert("phone".to_string(), css("#phone"));
    fields.insert("legacy".to_string(), css("#legacy").disabled());
    let mut presets = Presets::default();
    presets.add_tab(&profile(), fields).unwrap();
    presets
}

fn enquiry_page() -> MockEngine {
    MockEngine::new()
        .with_named_frame("enqframe")
        .with_frame("iframe.enquiry")
        .with_element("#info-table", "")
        .with_element("#name", "  Budi Santoso  ")
        .with_table(
            "#info-table tbody tr",
            &[&["Name", "Budi"], &[" CIF ", " 001 "]],
        )
}

fn session(engine: &Arc<MockEngine>) -> EnquirySession {
    EnquirySession::new(engine.clone())
}

fn fast_watch(attempts: u32) -> WindowWatch {
    WindowWatch {
        attempts,
        interval: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_scrape_named_frame() {
    let engine = Arc::new(enquiry_page());
    let presets = presets(false);

    let report = session(&engine)
        .scrape_preset(&presets, &profile(), &ScrapeOptions::default())
        .await
        .unwrap();

    assert!(report.table_found);
    assert_eq!(engine.state().frame_history, vec!["enqframe"]);
    assert_eq!(report.values.len(), 4);
    assert_eq!(report.values["name"], FieldValue::Found("Budi Santoso".to_string()));
    assert_eq!(report.values["cif"], FieldValue::Found("001".to_string()));
    assert_eq!(report.values["branch"], FieldValue::NotFound);
    assert!(matches!(report.values["phone"], FieldValue::Error(_)));
    assert_eq!(report.error_count(), 1);

    let record = report.to_record();
    let keys: Vec<&str> = record.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "cif", "branch", "phone"]);
    assert_eq!(record["branch"], "[NOT FOUND]");
    assert_eq!(record["phone"], "[ERROR] Element not found: #phone");
}

#[tokio::test]
async fn test_scrape_uses_preset_iframe() {
    let engine = Arc::new(enquiry_page());
    let presets = presets(true);

    let report = session(&engine)
        .scrape_preset(&presets, &profile(), &ScrapeOptions::default())
        .await
        .unwrap();

    assert!(report.table_found);
    assert_eq!(engine.state().frame_history, vec!["iframe.enquiry"]);
    assert!(!report.values.contains_key("iframe"));
}

#[tokio::test]
async fn test_scrape_without_data_table() {
    let engine = Arc::new(
        MockEngine::new()
            .with_named_frame("enqframe")
            .with_element("#name", "Budi"),
    );
    let report = session(&engine)
        .scrape_preset(&presets(false), &profile(), &ScrapeOptions::default())
        .await
        .unwrap();
    assert!(!report.table_found);
    assert!(report.values.is_empty());
}

#[tokio::test]
async fn test_scrape_fails_without_frame() {
    let engine = Arc::new(MockEngine::new().with_element("#info-table", ""));
    let err = session(&engine)
        .scrape_preset(&presets(false), &profile(), &ScrapeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EnquiryError::Timeout(_)));
}

#[tokio::test]
async fn test_scrape_unknown_preset() {
    let engine = Arc::new(enquiry_page());
    let err = session(&engine)
        .scrape_preset(
            &presets(false),
            &PresetPath::new("Retail", "Customer", "Loans"),
            &ScrapeOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EnquiryError::PresetNotFound(_)));
}

#[tokio::test]
async fn test_custom_frame_and_table_names() {
    let engine = Arc::new(
        MockEngine::new()
            .with_named_frame("detail")
            .with_element("#summary", "")
            .with_element("#name", "Sari"),
    );
    let options = ScrapeOptions {
        frame_name: "detail".to_string(),
        data_table_id: "summary".to_string(),
        frame_timeout: Duration::from_secs(1),
    };
    let fields = [("name", &css("#name"))];
    let report = session(&engine)
        .scrape(&fields, None, &options)
        .await
        .unwrap();
    assert_eq!(report.values["name"], FieldValue::Found("Sari".to_string()));
}

#[tokio::test]
async fn test_wait_for_new_window() {
    let engine = Arc::new(MockEngine::new().with_popup_after(3, "Customer Enquiry"));
    let title = session(&engine)
        .wait_for_new_window(fast_watch(5))
        .await
        .unwrap();
    assert_eq!(title.as_deref(), Some("Customer Enquiry"));
    assert_eq!(engine.state().current_window, "popup");
    assert_eq!(engine.state().window_polls, 3);
}

#[tokio::test]
async fn test_wait_for_new_window_gives_up() {
    let engine = Arc::new(MockEngine::new().with_popup_after(10, "Too late"));
    let title = session(&engine)
        .wait_for_new_window(fast_watch(3))
        .await
        .unwrap();
    assert_eq!(title, None);
    assert_eq!(engine.state().current_window, "main");
}

#[tokio::test]
async fn test_open_normalizes_url() {
    let engine = Arc::new(MockEngine::new());
    let session = session(&engine);
    assert_eq!(
        session.open("enquiry.bank.local/app").await.unwrap(),
        "https://enquiry.bank.local/app"
    );
    session.open("http://10.0.0.5/enq").await.unwrap();
    assert!(session.open("   ").await.is_err());
    assert_eq!(
        engine.state().visited,
        vec!["https://enquiry.bank.local/app", "http://10.0.0.5/enq"]
    );
}

#[test]
fn test_normalize_url_schemes() {
    assert_eq!(normalize_url("file:///tmp/page.html").unwrap(), "file:///tmp/page.html");
    assert_eq!(normalize_url(" HTTPS://x.test ").unwrap(), "HTTPS://x.test");
    assert!(matches!(
        normalize_url(""),
        Err(EnquiryError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_run_workflow_and_close() {
    let engine = Arc::new(enquiry_page());
    let presets = presets(true);
    let session = session(&engine);
    let mut workflow = Workflow::new("read").with_path(&profile());
    workflow.add_step(WorkflowStep::new(StepAction::SwitchToFrame).field("iframe"));
    workflow.add_step(WorkflowStep::new(StepAction::Extract).field("cif"));

    let report = session
        .run_workflow(&workflow, &presets, &HashMap::new(), None)
        .await
        .unwrap();
    assert_eq!(report.results["cif"], "001");

    session.close().await.unwrap();
    assert!(engine.state().quit);
}
