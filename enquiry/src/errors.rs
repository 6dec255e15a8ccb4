use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnquiryError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Selector not found for {team}/{screen}/{tab}/{field}")]
    SelectorNotFound {
        team: String,
        screen: String,
        tab: String,
        field: String,
    },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Preset already exists: {0}")]
    PresetExists(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Browser automation error: {0}")]
    Browser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Comparison failed: {0}")]
    Comparison(String),
}

impl From<thirtyfour::error::WebDriverError> for EnquiryError {
    fn from(e: thirtyfour::error::WebDriverError) -> Self {
        EnquiryError::Browser(e.to_string())
    }
}

impl From<calamine::Error> for EnquiryError {
    fn from(e: calamine::Error) -> Self {
        EnquiryError::Spreadsheet(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for EnquiryError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        EnquiryError::Spreadsheet(e.to_string())
    }
}

impl From<csv::Error> for EnquiryError {
    fn from(e: csv::Error) -> Self {
        EnquiryError::Spreadsheet(e.to_string())
    }
}

impl From<zip::result::ZipError> for EnquiryError {
    fn from(e: zip::result::ZipError) -> Self {
        EnquiryError::Document(e.to_string())
    }
}
