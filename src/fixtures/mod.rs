//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers vibration scripts on disk, parses optional
//! expectation JSON, and replays scripts through a `DetectionSession`. It is
//! desktop-focused to support CI and QA workflows.

pub mod replay;
pub mod script;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub use replay::{ReplayReport, ScriptRunner, ShotRecord, TimedEvent};
pub use script::{ScriptAction, Segment, TimedAction, TimedReading, VibrationScript};

/// Default location for fixture script/expectation assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const SCRIPT_SUFFIX: &str = ".script.json";
const EXPECT_SUFFIX: &str = ".expect.json";

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub script_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture script with optional expectations.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub script: VibrationScript,
    pub expectations: Option<FixtureExpectations>,
}

/// Inclusive numeric range used for baseline expectations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpectedRange {
    pub min: f64,
    pub max: f64,
}

impl ExpectedRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub shots: Vec<ExpectedShot>,
    #[serde(default)]
    pub baseline: Option<ExpectedRange>,
}

impl FixtureExpectations {
    pub fn verify(&self, report: &ReplayReport) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.shots.iter().enumerate() {
            match report.shots.get(idx) {
                Some(shot) => {
                    let delta = shot.duration_ms.abs_diff(expected.duration_ms);
                    if delta > expected.tolerance_ms {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(shot.clone()),
                            delta_ms: Some(delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    delta_ms: None,
                }),
            }
        }

        for (idx, shot) in report.shots.iter().enumerate().skip(self.shots.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(shot.clone()),
                delta_ms: None,
            });
        }

        let baseline_failure = self
            .baseline
            .filter(|range| !range.contains(report.baseline))
            .map(|range| BaselineFailure {
                expected: range,
                actual: report.baseline,
            });

        if failures.is_empty() && baseline_failure.is_none() {
            Ok(())
        } else {
            Err(ExpectationDiff {
                failures,
                baseline: baseline_failure,
            })
        }
    }
}

/// Expected shot definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedShot {
    pub duration_ms: u64,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: u64,
}

fn default_tolerance() -> u64 {
    150
}

/// Outcome of comparing a replay with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
    pub baseline: Option<BaselineFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>(),
            "baseline": self.baseline.as_ref().map(|b| serde_json::json!({
                "expected": b.expected,
                "actual": b.actual,
            })),
        })
    }
}

/// Detailed diff entry for a single shot.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    /// `None` for an unexpected extra shot
    pub expected: Option<ExpectedShot>,
    /// `None` for a missing shot
    pub actual: Option<ShotRecord>,
    pub delta_ms: Option<u64>,
}

#[derive(Debug)]
pub struct BaselineFailure {
    pub expected: ExpectedRange,
    pub actual: f64,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(metadata) = metadata_for_path(&path) {
                fixtures.push(metadata);
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load script + expectations for the provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let script_path = self.resolve_fixture_path(fixture)?;
        let metadata = metadata_for_path(&script_path)
            .ok_or_else(|| anyhow!("{} is not a *{} file", script_path.display(), SCRIPT_SUFFIX))?;

        let json = fs::read_to_string(&script_path)
            .with_context(|| format!("reading script {}", script_path.display()))?;
        let script: VibrationScript = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", script_path.display()))?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            script,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}{SCRIPT_SUFFIX}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn metadata_for_path(path: &Path) -> Option<FixtureMetadata> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.strip_suffix(SCRIPT_SUFFIX)?.to_string();
    let expect = path.with_file_name(format!("{name}{EXPECT_SUFFIX}"));
    Some(FixtureMetadata {
        name,
        script_path: path.to_path_buf(),
        expect_path: expect.exists().then_some(expect),
    })
}
