use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::ingest::ToolKind;

/// The persisted benchmark history for one repository.
///
/// Serialized field order and naming is the on-disk format consumed by the
/// chart page, so it must not be reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkData {
    /// Milliseconds since epoch of the most recent ingestion
    pub last_update: i64,
    /// Repository the commits belong to
    pub repo_url: String,
    /// Suite name to chronologically ordered entries
    pub entries: IndexMap<String, Vec<Entry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GitUser {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Commit provenance for an entry. Only `id` and `timestamp` are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Commit {
    pub author: GitUser,
    pub committer: GitUser,
    #[serde(default)]
    pub distinct: bool,
    pub id: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub tree_id: String,
    pub url: String,
}

impl Commit {
    /// Commit time as an instant, so entries recorded with different UTC
    /// offsets still compare correctly.
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Whether a bigger or a smaller value is the better outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Throughput-like units (`iter/sec`, `ops/sec`): higher is better
    Rate,
    /// Time-like units (`ns/iter`, `usec`, `s`): lower is better
    Duration,
}

const RATE_SUFFIXES: [&str; 3] = ["/s", "/sec", "/second"];
const DURATION_LABELS: [&str; 13] = [
    "ns/iter", "ns/op", "ns", "nsec", "us", "µs", "usec", "ms", "msec", "s", "sec", "seconds",
    "min",
];

impl UnitKind {
    /// Classifies a unit label, for entries written by tools this crate
    /// does not know.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if RATE_SUFFIXES.iter().any(|suffix| label.ends_with(suffix)) {
            Some(Self::Rate)
        } else if DURATION_LABELS.contains(&label) {
            Some(Self::Duration)
        } else {
            None
        }
    }

    /// Direction for a bench stored under `tool`. Known tools decide the
    /// direction for all their benches; otherwise the unit label does.
    pub fn for_recorded(tool: &str, label: &str) -> Option<Self> {
        tool.parse::<ToolKind>()
            .ok()
            .map(ToolKind::unit_kind)
            .or_else(|| Self::from_label(label))
    }
}

/// One named measurement within an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Bench {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub kind: UnitKind,
    /// Variability indicator such as `stddev: 0.0012`
    pub range: Option<String>,
    /// Free-form annotation
    pub extra: Option<String>,
}

impl Bench {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            kind,
            range: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// True when both benches belong to the same logical series.
    pub fn same_series(&self, other: &Bench) -> bool {
        self.name == other.name && self.unit == other.unit && self.kind == other.kind
    }
}

/// One CI run's measurements for a single commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntryRecord", into = "EntryRecord")]
pub struct Entry {
    pub commit: Commit,
    /// Milliseconds since epoch when the entry was ingested
    pub date: i64,
    pub tool: String,
    pub benches: Vec<Bench>,
}

impl Entry {
    pub fn id(&self) -> &str {
        &self.commit.id
    }

    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.committed_at()
    }

    pub fn bench(&self, name: &str) -> Option<&Bench> {
        self.benches.iter().find(|bench| bench.name == name)
    }

    /// Checks the per-entry invariants. Returns a description of the first
    /// violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !is_commit_sha(&self.commit.id) {
            return Err(format!(
                "commit id '{}' is not a 40 character hex sha",
                self.commit.id
            ));
        }

        if self.committed_at().is_none() {
            return Err(format!(
                "commit {} has an unparseable timestamp '{}'",
                self.commit.id, self.commit.timestamp
            ));
        }

        if self.tool.trim().is_empty() {
            return Err(format!("commit {} has no tool identifier", self.commit.id));
        }

        let mut seen = HashSet::new();
        for bench in &self.benches {
            if !seen.insert(bench.name.as_str()) {
                return Err(format!(
                    "bench '{}' appears more than once in commit {}",
                    bench.name, self.commit.id
                ));
            }
            if !bench.value.is_finite() {
                return Err(format!(
                    "bench '{}' in commit {} has a non-finite value",
                    bench.name, self.commit.id
                ));
            }
        }

        Ok(())
    }
}

fn is_commit_sha(id: &str) -> bool {
    id.len() == 40 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// On-disk shape of an entry. Converted into [`Entry`] so that every bench
/// carries an explicit [`UnitKind`].
#[derive(Serialize, Deserialize)]
struct EntryRecord {
    commit: Commit,
    date: i64,
    tool: String,
    benches: Vec<BenchRecord>,
}

#[derive(Serialize, Deserialize)]
struct BenchRecord {
    name: String,
    #[serde(serialize_with = "serialize_number")]
    value: f64,
    unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<String>,
}

impl TryFrom<EntryRecord> for Entry {
    type Error = String;

    fn try_from(record: EntryRecord) -> std::result::Result<Self, Self::Error> {
        let tool = record.tool;
        let benches = record
            .benches
            .into_iter()
            .map(|bench| {
                let kind = UnitKind::for_recorded(&tool, &bench.unit).ok_or_else(|| {
                    format!(
                        "cannot tell whether bigger or smaller is better for bench '{}' (tool '{}', unit '{}')",
                        bench.name, tool, bench.unit
                    )
                })?;
                Ok(Bench {
                    name: bench.name,
                    value: bench.value,
                    unit: bench.unit,
                    kind,
                    range: bench.range,
                    extra: bench.extra,
                })
            })
            .collect::<std::result::Result<_, String>>()?;

        Ok(Self {
            commit: record.commit,
            date: record.date,
            tool,
            benches,
        })
    }
}

impl From<Entry> for EntryRecord {
    fn from(entry: Entry) -> Self {
        Self {
            commit: entry.commit,
            date: entry.date,
            tool: entry.tool,
            benches: entry
                .benches
                .into_iter()
                .map(|bench| BenchRecord {
                    name: bench.name,
                    value: bench.value,
                    unit: bench.unit,
                    range: bench.range,
                    extra: bench.extra,
                })
                .collect(),
        }
    }
}

/// Writes integral values without a fractional part (`135`, not `135.0`)
/// so documents produced by JavaScript tooling round-trip byte for byte.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
