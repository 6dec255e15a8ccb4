//! Field presets grouped by team, screen and tab, persisted to a JSON file.

use crate::errors::EnquiryError;
use crate::selector::{FieldSelector, PresetPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Field name reserved for the selector of the frame holding a tab.
pub const FRAME_FIELD: &str = "iframe";

/// Fields of one tab, in insertion order.
pub type TabFields = IndexMap<String, FieldDef>;

/// One configured field: where to find it and whether scraping uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFieldDef")]
pub struct FieldDef {
    #[serde(flatten)]
    pub selector: FieldSelector,
    #[serde(default = "default_enabled", skip_serializing_if = "is_enabled")]
    pub enabled: bool,
}

impl FieldDef {
    pub fn new(selector: FieldSelector) -> Self {
        Self {
            selector,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl From<FieldSelector> for FieldDef {
    fn from(selector: FieldSelector) -> Self {
        FieldDef::new(selector)
    }
}

fn default_enabled() -> bool {
    true
}

fn is_enabled(enabled: &bool) -> bool {
    *enabled
}

// Older preset files stored a bare CSS selector string per field.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldDef {
    Plain(String),
    Full {
        #[serde(flatten)]
        selector: FieldSelector,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
}

impl From<RawFieldDef> for FieldDef {
    fn from(raw: RawFieldDef) -> Self {
        match raw {
            RawFieldDef::Plain(selector) => FieldDef::new(FieldSelector::Css { selector }),
            RawFieldDef::Full { selector, enabled } => FieldDef { selector, enabled },
        }
    }
}

/// The whole preset tree: team -> screen -> tab -> fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Presets {
    teams: IndexMap<String, IndexMap<String, IndexMap<String, TabFields>>>,
}

#[derive(Deserialize)]
struct LegacyTeamPreset {
    preset_name: String,
    #[serde(default)]
    fields: TabFields,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PresetFile {
    Tree(Presets),
    Legacy(Vec<LegacyTeamPreset>),
}

/// Screen and tab name used when importing flat per-team presets.
pub const LEGACY_LEVEL: &str = "default";

impl Presets {
    pub fn from_json(json: &str) -> Result<Self, EnquiryError> {
        match serde_json::from_str::<PresetFile>(json)? {
            PresetFile::Tree(presets) => Ok(presets),
            PresetFile::Legacy(teams) => {
                let mut presets = Presets::default();
                for team in teams {
                    let path = PresetPath::new(team.preset_name, LEGACY_LEVEL, LEGACY_LEVEL);
                    presets.upsert_fields(&path, team.fields)?;
                }
                Ok(presets)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn team_names(&self) -> Vec<&str> {
        self.teams.keys().map(String::as_str).collect()
    }

    pub fn screens(&self, team: &str) -> Vec<&str> {
        self.teams
            .get(team)
            .map(|screens| screens.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn tabs(&self, team: &str, screen: &str) -> Vec<&str> {
        self.teams
            .get(team)
            .and_then(|screens| screens.get(screen))
            .map(|tabs| tabs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every tab path in the tree, in insertion order.
    pub fn paths(&self) -> Vec<PresetPath> {
        let mut paths = Vec::new();
        for (team, screens) in &self.teams {
            for (screen, tabs) in screens {
                for tab in tabs.keys() {
                    paths.push(PresetPath::new(team, screen, tab));
                }
            }
        }
        paths
    }

    /// All fields of a tab, including the frame selector.
    pub fn fields(&self, path: &PresetPath) -> Option<&TabFields> {
        self.teams
            .get(&path.team)?
            .get(&path.screen)?
            .get(&path.tab)
    }

    /// Enabled fields of a tab used for scraping, frame selector excluded.
    pub fn scrape_fields(&self, path: &PresetPath) -> Vec<(&str, &FieldDef)> {
        self.fields(path)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(name, def)| name.as_str() != FRAME_FIELD && def.enabled)
                    .map(|(name, def)| (name.as_str(), def))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// CSS selector of the frame holding the tab, if the preset names one.
    pub fn frame_selector(&self, path: &PresetPath) -> Option<&str> {
        match self.fields(path)?.get(FRAME_FIELD) {
            Some(FieldDef {
                selector: FieldSelector::Css { selector },
                ..
            }) => Some(selector.as_str()),
            _ => None,
        }
    }

    pub fn resolve(&self, path: &PresetPath, field: &str) -> Result<&FieldDef, EnquiryError> {
        self.fields(path)
            .and_then(|fields| fields.get(field))
            .ok_or_else(|| EnquiryError::SelectorNotFound {
                team: path.team.clone(),
                screen: path.screen.clone(),
                tab: path.tab.clone(),
                field: field.to_string(),
            })
    }

    /// Adds a new tab. Fails when the tab already exists.
    pub fn add_tab(&mut self, path: &PresetPath, fields: TabFields) -> Result<(), EnquiryError> {
        validate_path(path)?;
        validate_fields(&fields)?;
        let tabs = self
            .teams
            .entry(path.team.clone())
            .or_default()
            .entry(path.screen.clone())
            .or_default();
        if tabs.contains_key(&path.tab) {
            return Err(EnquiryError::PresetExists(path.to_string()));
        }
        tabs.insert(path.tab.clone(), fields);
        info!(preset = %path, "Added preset tab");
        Ok(())
    }

    /// Replaces the fields of a tab, creating it when missing.
    pub fn upsert_fields(
        &mut self,
        path: &PresetPath,
        fields: TabFields,
    ) -> Result<(), EnquiryError> {
        validate_path(path)?;
        validate_fields(&fields)?;
        self.teams
            .entry(path.team.clone())
            .or_default()
            .entry(path.screen.clone())
            .or_default()
            .insert(path.tab.clone(), fields);
        debug!(preset = %path, "Stored preset fields");
        Ok(())
    }

    /// Sets a single field on an existing tab, replacing any field of the same name.
    pub fn set_field(
        &mut self,
        path: &PresetPath,
        name: &str,
        def: FieldDef,
    ) -> Result<(), EnquiryError> {
        let name = name.trim();
        validate_field(name, &def)?;
        let fields = self
            .teams
            .get_mut(&path.team)
            .and_then(|screens| screens.get_mut(&path.screen))
            .and_then(|tabs| tabs.get_mut(&path.tab))
            .ok_or_else(|| EnquiryError::PresetNotFound(path.to_string()))?;
        fields.insert(name.to_string(), def);
        Ok(())
    }

    /// Removes one field. The tab stays in place even when it becomes empty.
    pub fn remove_field(&mut self, path: &PresetPath, name: &str) -> bool {
        self.teams
            .get_mut(&path.team)
            .and_then(|screens| screens.get_mut(&path.screen))
            .and_then(|tabs| tabs.get_mut(&path.tab))
            .map(|fields| fields.shift_remove(name).is_some())
            .unwrap_or(false)
    }

    /// Removes a tab and prunes the screen and team when they become empty.
    pub fn remove_tab(&mut self, path: &PresetPath) -> bool {
        let Some(screens) = self.teams.get_mut(&path.team) else {
            return false;
        };
        let Some(tabs) = screens.get_mut(&path.screen) else {
            return false;
        };
        if tabs.shift_remove(&path.tab).is_none() {
            return false;
        }
        if tabs.is_empty() {
            screens.shift_remove(&path.screen);
        }
        if screens.is_empty() {
            self.teams.shift_remove(&path.team);
        }
        true
    }

    pub fn remove_team(&mut self, team: &str) -> bool {
        self.teams.shift_remove(team).is_some()
    }
}

fn validate_path(path: &PresetPath) -> Result<(), EnquiryError> {
    if path.team.trim().is_empty() || path.screen.trim().is_empty() || path.tab.trim().is_empty()
    {
        return Err(EnquiryError::InvalidArgument(
            "Team, Screen, and Tab are required.".to_string(),
        ));
    }
    Ok(())
}

fn validate_fields(fields: &TabFields) -> Result<(), EnquiryError> {
    fields
        .iter()
        .try_for_each(|(name, def)| validate_field(name, def))
}

fn validate_field(name: &str, def: &FieldDef) -> Result<(), EnquiryError> {
    let selector_empty = match &def.selector {
        FieldSelector::Css { selector } => selector.trim().is_empty(),
        FieldSelector::TableLookup { table_id, .. } => table_id.trim().is_empty(),
    };
    if name.trim().is_empty() || selector_empty {
        return Err(EnquiryError::InvalidArgument(
            "Field name and selector are required.".to_string(),
        ));
    }
    Ok(())
}

/// Flat-file store for [`Presets`].
#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Presets, EnquiryError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preset file, starting empty");
            return Ok(Presets::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Presets::default());
        }
        Presets::from_json(&content)
    }

    pub fn save(&self, presets: &Presets) -> Result<(), EnquiryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        presets.serialize(&mut ser)?;
        std::fs::write(&self.path, buf)?;
        debug!(path = %self.path.display(), "Saved presets");
        Ok(())
    }

    /// Loads, applies `edit`, and saves only when the edit succeeds.
    pub fn update<T>(
        &self,
        edit: impl FnOnce(&mut Presets) -> Result<T, EnquiryError>,
    ) -> Result<T, EnquiryError> {
        let mut presets = self.load()?;
        let out = edit(&mut presets)?;
        self.save(&presets)?;
        Ok(out)
    }

    /// Loads and applies a removal; the file is rewritten only when `edit` returns `true`.
    pub fn remove(&self, edit: impl FnOnce(&mut Presets) -> bool) -> Result<bool, EnquiryError> {
        let mut presets = self.load()?;
        let removed = edit(&mut presets);
        if removed {
            self.save(&presets)?;
        }
        Ok(removed)
    }
}
