//! Scraping and step automation for the enquiry web application
//!
//! Field selectors are kept as presets grouped by team, screen and tab. A
//! [`WorkflowRunner`] executes declarative steps (click, input, wait, extract,
//! frame switches) against any [`BrowserEngine`], resolving each step's field
//! through the presets. The production engine drives a browser over WebDriver.
//!
//! Alongside scraping, [`comparer`] checks a scraped spreadsheet against a
//! template and [`mailer`] fills `.docx` letters from spreadsheet rows.

pub mod comparer;
pub mod errors;
pub mod mailer;
pub mod platforms;
pub mod presets;
pub mod runner;
pub mod scraper;
pub mod selector;
pub mod table;
#[cfg(test)]
mod tests;
pub mod workflow;

pub use comparer::{compare_excel_files, compare_tables, Comparison, MatchStatus, RowStatus};
pub use errors::EnquiryError;
pub use mailer::{generate_letters, MailOptions, MergeReport};
pub use platforms::{create_engine, Browser, BrowserEngine, EngineConfig};
pub use presets::{FieldDef, PresetStore, Presets};
pub use runner::{RunReport, StepFailure, WorkflowRunner};
pub use scraper::{
    normalize_url, EnquirySession, FieldValue, ScrapeOptions, ScrapeReport, WindowWatch,
};
pub use selector::{FieldSelector, PresetPath, SelectorKey};
pub use table::Table;
pub use workflow::{validate_workflow, StepAction, ValidationReport, Workflow, WorkflowStep};
