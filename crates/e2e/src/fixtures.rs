//! Declarative YAML fixture table

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Fixtures shipped with the crate
const BUILTIN: &str = include_str!("../fixtures/translator.yaml");

/// Input length bucket, as recorded in the test plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthClass {
    #[default]
    S,
    M,
    L,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    /// The site is expected to produce `expected`
    #[default]
    Positive,
    /// A documented upstream defect
    Negative,
    /// The progressive-typing / clear scenario
    Ui,
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FixtureKind::Positive => "positive",
            FixtureKind::Negative => "negative",
            FixtureKind::Ui => "ui",
        })
    }
}

/// One translation case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,

    pub name: String,

    /// Singlish text typed into the input
    pub input: String,

    /// Exact Sinhala text the output must show
    pub expected: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub grammar: String,

    #[serde(default)]
    pub length: LengthClass,

    /// Output the site currently renders for a known defect
    #[serde(default, rename = "actual", skip_serializing_if = "Option::is_none")]
    pub known_actual: Option<String>,

    /// Set from the table section the case was loaded from
    #[serde(skip_deserializing, default)]
    pub kind: FixtureKind,
}

impl TestCase {
    /// Title used for reporting and `--grep` filtering
    pub fn title(&self) -> String {
        format!("{} - {}", self.id, self.name)
    }
}

/// Type a prefix, check something renders, type the rest, check the full
/// translation, then clear and check the output empties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiScenario {
    pub id: String,

    pub name: String,

    pub input: String,

    /// Prefix typed first; defaults to the first half of `input`
    #[serde(default)]
    pub partial_input: Option<String>,

    pub expected_full: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub grammar: String,

    #[serde(default)]
    pub length: LengthClass,

    /// Delay between keystrokes
    #[serde(default = "default_type_delay")]
    pub type_delay_ms: u64,

    /// Wait after the prefix before checking for partial output
    #[serde(default = "default_partial_wait")]
    pub partial_wait_ms: u64,
}

fn default_type_delay() -> u64 {
    150
}

fn default_partial_wait() -> u64 {
    1500
}

impl UiScenario {
    pub fn title(&self) -> String {
        format!("{} - {}", self.id, self.name)
    }

    /// The prefix typed before the mid-stream check
    pub fn partial(&self) -> &str {
        match &self.partial_input {
            Some(p) => p.as_str(),
            None => {
                let half = self.input.chars().count() / 2;
                let end = self
                    .input
                    .char_indices()
                    .nth(half)
                    .map(|(i, _)| i)
                    .unwrap_or(self.input.len());
                &self.input[..end]
            }
        }
    }

    /// What remains to be typed after [`UiScenario::partial`]; empty when
    /// the partial is not a prefix of the input
    pub fn remainder(&self) -> &str {
        self.input.strip_prefix(self.partial()).unwrap_or_default()
    }

    pub fn type_delay(&self) -> Duration {
        Duration::from_millis(self.type_delay_ms)
    }

    pub fn partial_wait(&self) -> Duration {
        Duration::from_millis(self.partial_wait_ms)
    }

    fn validate(&self) -> E2eResult<()> {
        if let Some(p) = &self.partial_input {
            if p.is_empty() || !self.input.starts_with(p.as_str()) {
                return Err(E2eError::FixtureParse(format!(
                    "{}: partial_input '{}' is not a non-empty prefix of '{}'",
                    self.id, p, self.input
                )));
            }
        }
        if self.partial().is_empty() {
            return Err(E2eError::FixtureParse(format!(
                "{}: input too short for a partial check",
                self.id
            )));
        }
        Ok(())
    }
}

/// The full table: positive cases, known defects, and an optional UI scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureTable {
    #[serde(default)]
    pub positive: Vec<TestCase>,

    #[serde(default)]
    pub negative: Vec<TestCase>,

    #[serde(default)]
    pub ui: Option<UiScenario>,
}

impl FixtureTable {
    /// The table shipped with the crate
    pub fn builtin() -> E2eResult<Self> {
        Self::from_yaml(BUILTIN)
    }

    /// Parse a table from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let mut table: Self = serde_yaml::from_str(yaml)?;
        table.stamp_kinds();
        if let Some(ui) = &table.ui {
            ui.validate()?;
        }
        Ok(table)
    }

    /// Parse a table from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::FixtureParse(format!("{}: {}", path.display(), e)))
    }

    /// Load a single file, or merge every YAML file under a directory
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.is_file() {
            return Self::from_file(path);
        }

        let mut files: Vec<_> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(E2eError::FixtureParse(format!(
                "no fixture files under {}",
                path.display()
            )));
        }

        let mut table = Self::default();
        for file in files {
            table.merge(Self::from_file(&file)?)?;
        }
        Ok(table)
    }

    fn merge(&mut self, other: Self) -> E2eResult<()> {
        self.positive.extend(other.positive);
        self.negative.extend(other.negative);
        if let Some(extra) = other.ui {
            if let Some(existing) = &self.ui {
                return Err(E2eError::FixtureParse(format!(
                    "more than one UI scenario ({} and {})",
                    existing.id, extra.id
                )));
            }
            self.ui = Some(extra);
        }
        Ok(())
    }

    fn stamp_kinds(&mut self) {
        for case in &mut self.positive {
            case.kind = FixtureKind::Positive;
        }
        for case in &mut self.negative {
            case.kind = FixtureKind::Negative;
        }
    }

    /// All translation cases in table order: positives, then negatives
    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.positive.iter().chain(self.negative.iter())
    }

    /// Ids that occur more than once. Duplicates are allowed but reported.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        let ui_id = self.ui.as_ref().map(|u| u.id.as_str());
        for id in self.cases().map(|c| c.id.as_str()).chain(ui_id) {
            if !seen.insert(id) && !dups.contains(&id) {
                dups.push(id);
            }
        }
        dups
    }

    /// Keep only the requested kinds and, if given, titles matching `grep`
    pub fn select(&self, kinds: &[FixtureKind], grep: Option<&Regex>) -> Self {
        let wanted = |kind: FixtureKind, title: String| {
            (kinds.is_empty() || kinds.contains(&kind))
                && grep.map(|re| re.is_match(&title)).unwrap_or(true)
        };

        Self {
            positive: self
                .positive
                .iter()
                .filter(|c| wanted(c.kind, c.title()))
                .cloned()
                .collect(),
            negative: self
                .negative
                .iter()
                .filter(|c| wanted(c.kind, c.title()))
                .cloned()
                .collect(),
            ui: self
                .ui
                .as_ref()
                .filter(|u| wanted(FixtureKind::Ui, u.title()))
                .cloned(),
        }
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + usize::from(self.ui.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
