use crate::errors::EnquiryError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Represents ways to locate a labeled value on the enquiry page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSelector {
    /// Select by CSS selector
    Css { selector: String },
    /// Select the value cell of the row whose first cell equals `label`
    TableLookup {
        table_id: String,
        #[serde(default)]
        label: String,
    },
}

impl FieldSelector {
    pub fn css(&self) -> Result<&str, EnquiryError> {
        match self {
            FieldSelector::Css { selector } => Ok(selector),
            FieldSelector::TableLookup { table_id, label } => Err(EnquiryError::InvalidSelector(
                format!("table lookup '{table_id} | {label}' cannot be used as an element selector"),
            )),
        }
    }

    /// Rows to scan for a table lookup, `None` for CSS selectors.
    pub fn rows_selector(&self) -> Option<String> {
        match self {
            FieldSelector::Css { .. } => None,
            FieldSelector::TableLookup { table_id, .. } => Some(format!("#{table_id} tbody tr")),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldSelector::Css { .. } => "css",
            FieldSelector::TableLookup { .. } => "table_lookup",
        }
    }
}

impl std::fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSelector::Css { selector } => write!(f, "{selector}"),
            FieldSelector::TableLookup { table_id, label } => write!(f, "{table_id} | {label}"),
        }
    }
}

impl FromStr for FieldSelector {
    type Err = EnquiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let table_body = strip_prefix_ignore_case(s, "table_lookup:")
            .or_else(|| strip_prefix_ignore_case(s, "table:"));

        if let Some(body) = table_body {
            let (table_id, label) = body.split_once('|').ok_or_else(|| {
                EnquiryError::InvalidSelector(format!(
                    "Table lookup \"{s}\" must look like 'table:<table_id>|<label>'"
                ))
            })?;
            let table_id = table_id.trim().trim_start_matches('#');
            let label = label.trim();
            if table_id.is_empty() || label.is_empty() {
                return Err(EnquiryError::InvalidSelector(format!(
                    "Table lookup \"{s}\" needs both a table id and a label"
                )));
            }
            return Ok(FieldSelector::TableLookup {
                table_id: table_id.to_string(),
                label: label.to_string(),
            });
        }

        let css = strip_prefix_ignore_case(s, "css:").map_or(s, str::trim);
        if css.is_empty() {
            return Err(EnquiryError::InvalidSelector(
                "Empty selector. Use 'css:<selector>' or 'table:<table_id>|<label>'.".to_string(),
            ));
        }
        Ok(FieldSelector::Css {
            selector: css.to_string(),
        })
    }
}

/// Addresses one tab inside the preset tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetPath {
    pub team: String,
    pub screen: String,
    pub tab: String,
}

impl PresetPath {
    pub fn new(
        team: impl Into<String>,
        screen: impl Into<String>,
        tab: impl Into<String>,
    ) -> Self {
        Self {
            team: team.into(),
            screen: screen.into(),
            tab: tab.into(),
        }
    }

    pub fn key(&self, field: &str) -> SelectorKey {
        SelectorKey {
            path: self.clone(),
            field: field.to_string(),
        }
    }
}

impl std::fmt::Display for PresetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.team, self.screen, self.tab)
    }
}

impl FromStr for PresetPath {
    type Err = EnquiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_parts::<3>(s) {
            Some([team, screen, tab]) => Ok(PresetPath::new(team, screen, tab)),
            None => Err(EnquiryError::InvalidArgument(format!(
                "Preset path \"{s}\" must look like 'team/screen/tab'"
            ))),
        }
    }
}

/// Fully qualified field reference: `team/screen/tab/field`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorKey {
    pub path: PresetPath,
    pub field: String,
}

impl std::fmt::Display for SelectorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.path, self.field)
    }
}

impl FromStr for SelectorKey {
    type Err = EnquiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_parts::<4>(s) {
            Some([team, screen, tab, field]) => Ok(SelectorKey {
                path: PresetPath::new(team, screen, tab),
                field: field.to_string(),
            }),
            None => Err(EnquiryError::InvalidArgument(format!(
                "Selector key \"{s}\" must look like 'team/screen/tab/field'"
            ))),
        }
    }
}

fn split_parts<const N: usize>(s: &str) -> Option<[&str; N]> {
    let parts: Vec<&str> = s.split('/').map(str::trim).collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    parts.try_into().ok()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
