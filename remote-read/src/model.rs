//! Query-side data model: label sets, samples, matchers and sub-queries.

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};
use crate::proto;

/// The label holding the metric name.
pub const METRIC_NAME: &str = "__name__";

/// A single label attached to a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A label set identifying a series.
///
/// Labels are kept sorted by name and unique by name, so two equal sets always
/// render to the same wire label list.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Builds a label set. Later duplicates of a name replace earlier ones.
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut labels: Vec<Label> = labels.into_iter().collect();
        // stable sort keeps insertion order among duplicates, so the last one wins below
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        let mut deduped: Vec<Label> = Vec::with_capacity(labels.len());
        for label in labels {
            match deduped.last_mut() {
                Some(last) if last.name == label.name => *last = label,
                _ => deduped.push(label),
            }
        }
        Self(deduped)
    }

    /// Builds a label set from `(name, value)` pairs.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(n, v)| Label::new(n, v)))
    }

    /// Returns the value of a label, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .binary_search_by(|l| l.name.as_str().cmp(name))
            .ok()
            .map(|i| self.0[i].value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the set as a wire label list.
    pub fn to_proto(&self) -> Vec<proto::Label> {
        self.0
            .iter()
            .map(|l| proto::Label {
                name: l.name.clone(),
                value: l.value.clone(),
            })
            .collect()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", label.name, label.value)?;
        }
        write!(f, "}}")
    }
}

/// A single data point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

impl From<Sample> for proto::Sample {
    fn from(sample: Sample) -> Self {
        proto::Sample {
            value: sample.value,
            timestamp_ms: sample.timestamp_ms,
        }
    }
}

/// How a matcher compares a label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Equal,
    NotEqual,
    Regex,
    NotRegex,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::Regex => "=~",
            MatchType::NotRegex => "!~",
        };
        f.write_str(op)
    }
}

/// A predicate over one label of a series.
///
/// Regex matchers are compiled once at construction and are fully anchored.
#[derive(Debug, Clone)]
pub struct Matcher {
    kind: MatchType,
    name: String,
    value: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Creates a matcher, compiling the pattern for regex kinds.
    pub fn new(kind: MatchType, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();
        let regex = match kind {
            MatchType::Regex | MatchType::NotRegex => {
                let anchored = format!("^(?:{})$", value);
                let regex = Regex::new(&anchored).map_err(|e| {
                    Error::InvalidQuery(format!("invalid regex for label {}: {}", name, e))
                })?;
                Some(regex)
            }
            MatchType::Equal | MatchType::NotEqual => None,
        };

        Ok(Self {
            kind,
            name,
            value,
            regex,
        })
    }

    pub fn kind(&self) -> MatchType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Tests a label value. An absent label is matched as the empty string.
    pub fn matches(&self, value: &str) -> bool {
        match (self.kind, &self.regex) {
            (MatchType::Equal, _) => value == self.value,
            (MatchType::NotEqual, _) => value != self.value,
            (MatchType::Regex, Some(re)) => re.is_match(value),
            (MatchType::NotRegex, Some(re)) => !re.is_match(value),
            // regex kinds always carry a compiled pattern
            (MatchType::Regex | MatchType::NotRegex, None) => false,
        }
    }

    /// Tests a whole label set.
    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.name).unwrap_or(""))
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.value == other.value
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.kind, self.value)
    }
}

impl TryFrom<proto::LabelMatcher> for Matcher {
    type Error = Error;

    fn try_from(m: proto::LabelMatcher) -> Result<Self> {
        let kind = match proto::MatchType::try_from(m.r#type) {
            Ok(proto::MatchType::Eq) => MatchType::Equal,
            Ok(proto::MatchType::Neq) => MatchType::NotEqual,
            Ok(proto::MatchType::Re) => MatchType::Regex,
            Ok(proto::MatchType::Nre) => MatchType::NotRegex,
            Err(_) => {
                return Err(Error::InvalidQuery(format!(
                    "invalid matcher type {}",
                    m.r#type
                )));
            }
        };
        Matcher::new(kind, m.name, m.value)
    }
}

/// One `(time range, matcher set)` pair of a read request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    /// Inclusive start of the range, in milliseconds since the epoch.
    pub start_ms: i64,
    /// Inclusive end of the range, in milliseconds since the epoch.
    pub end_ms: i64,
    pub matchers: Vec<Matcher>,
}

impl SubQuery {
    pub fn new(start_ms: i64, end_ms: i64, matchers: Vec<Matcher>) -> Result<Self> {
        if start_ms > end_ms {
            return Err(Error::InvalidQuery(format!(
                "start timestamp {} is after end timestamp {}",
                start_ms, end_ms
            )));
        }
        Ok(Self {
            start_ms,
            end_ms,
            matchers,
        })
    }

    /// Whether a timestamp falls inside the inclusive range.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms <= self.end_ms
    }
}

impl TryFrom<proto::Query> for SubQuery {
    type Error = Error;

    fn try_from(query: proto::Query) -> Result<Self> {
        let matchers = query
            .matchers
            .into_iter()
            .map(Matcher::try_from)
            .collect::<Result<Vec<_>>>()?;
        SubQuery::new(query.start_timestamp_ms, query.end_timestamp_ms, matchers)
    }
}
