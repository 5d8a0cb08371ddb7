use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Build action ─────────────────────────────────────────────────────────

/// The `ACTION` parameter every deploy job receives. The pipeline script
/// branches on it to provision or tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildAction {
    Apply,
    Destroy,
}

impl BuildAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildAction::Apply => "Apply",
            BuildAction::Destroy => "Destroy",
        }
    }
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Parameters ───────────────────────────────────────────────────────────

/// A single `buildWithParameters` value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Number(i64),
    Flag(bool),
    /// Serialized to JSON text before URL encoding.
    Object(serde_json::Value),
}

impl ParamValue {
    /// The textual form placed in the query string (before percent-encoding).
    pub fn render(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Flag(b) => b.to_string(),
            ParamValue::Object(v) => v.to_string(),
        }
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Number(i64::from(n))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Flag(b)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        ParamValue::Object(v)
    }
}

/// Ordered parameter list for one parameterized build. `ACTION` is always
/// emitted last.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    params: Vec<(&'static str, ParamValue)>,
    action: BuildAction,
}

impl BuildRequest {
    pub fn new(action: BuildAction) -> Self {
        Self {
            params: Vec::new(),
            action,
        }
    }

    /// Append a parameter. Insertion order is preserved on the wire.
    pub fn param(mut self, name: &'static str, value: impl Into<ParamValue>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    /// Append a parameter only when a value is present.
    pub fn param_opt<V: Into<ParamValue>>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    pub fn action(&self) -> BuildAction {
        self.action
    }

    /// Look up a parameter by name (`"ACTION"` included).
    pub fn get(&self, name: &str) -> Option<String> {
        if name == "ACTION" {
            return Some(self.action.to_string());
        }
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.render())
    }

    /// `(name, value)` pairs in wire order, ending with `ACTION`.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out: Vec<(&'static str, String)> = self
            .params
            .iter()
            .map(|(k, v)| (*k, v.render()))
            .collect();
        out.push(("ACTION", self.action.to_string()));
        out
    }
}

// ─── Identifiers ──────────────────────────────────────────────────────────

/// Transient handle returned by Jenkins right after a build is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem(pub u64);

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable identifier of one build execution. Kept as the decimal string
/// Jenkins reports so it round-trips through stored records untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildNumber(String);

impl BuildNumber {
    /// Accepts only a non-empty run of ASCII digits.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Build status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildStatus {
    /// Classify the `result` field of `{build}/api/json`. Anything that is
    /// not a recognised final result means the build is still running.
    pub fn from_result(result: Option<&str>) -> Self {
        match result {
            Some("SUCCESS") => BuildStatus::Success,
            Some("UNSTABLE") => BuildStatus::Unstable,
            Some("FAILURE") => BuildStatus::Failure,
            Some("NOT_BUILT") => BuildStatus::NotBuilt,
            Some("ABORTED") => BuildStatus::Aborted,
            _ => BuildStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Pending)
    }

    /// Only a successful build marks its deployment active.
    pub fn is_active(self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Pending => "PENDING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Unstable => "UNSTABLE",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::NotBuilt => "NOT_BUILT",
            BuildStatus::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Wire payloads ────────────────────────────────────────────────────────

/// Subset of `queue/item/{id}/api/json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueItemInfo {
    #[serde(default)]
    pub executable: Option<Executable>,
    #[serde(default)]
    pub cancelled: Option<bool>,
    #[serde(default)]
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Executable {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Subset of `job/{job}/{build}/api/json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub building: Option<bool>,
}

/// Bytes of console output past a given offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSlice {
    pub offset: u64,
    pub data: bytes::Bytes,
}

impl LogSlice {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor value after this slice has been delivered.
    pub fn next_offset(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(BuildStatus::from_result(Some("SUCCESS")), BuildStatus::Success);
        assert!(BuildStatus::Success.is_active());
        assert!(BuildStatus::Success.is_terminal());

        for r in ["FAILURE", "UNSTABLE", "ABORTED", "NOT_BUILT"] {
            let s = BuildStatus::from_result(Some(r));
            assert!(s.is_terminal(), "{r} should be terminal");
            assert!(!s.is_active(), "{r} should be inactive");
            assert_eq!(s.as_str(), r);
        }

        let pending = BuildStatus::from_result(None);
        assert_eq!(pending, BuildStatus::Pending);
        assert!(!pending.is_terminal());
        assert!(!pending.is_active());
        assert_eq!(BuildStatus::from_result(Some("")), BuildStatus::Pending);
    }

    #[test]
    fn build_number_rejects_non_digits() {
        assert_eq!(BuildNumber::parse("42").unwrap().as_str(), "42");
        assert!(BuildNumber::parse("").is_none());
        assert!(BuildNumber::parse("4a").is_none());
        assert!(BuildNumber::parse("-1").is_none());
    }

    #[test]
    fn request_pairs_keep_order_and_end_with_action() {
        let req = BuildRequest::new(BuildAction::Destroy)
            .param("name", "prod")
            .param("min", 2u32)
            .param("env", serde_json::json!({"A": "1"}))
            .param_opt::<String>("missing", None);
        let pairs = req.pairs();
        assert_eq!(
            pairs,
            vec![
                ("name", "prod".to_string()),
                ("min", "2".to_string()),
                ("env", r#"{"A":"1"}"#.to_string()),
                ("ACTION", "Destroy".to_string()),
            ]
        );
        assert_eq!(req.get("ACTION").as_deref(), Some("Destroy"));
        assert_eq!(req.get("missing"), None);
    }

    #[test]
    fn log_slice_advances_cursor() {
        let slice = LogSlice {
            offset: 10,
            data: bytes::Bytes::from_static(b"hello"),
        };
        assert_eq!(slice.next_offset(), 15);
        assert!(!slice.is_empty());
    }
}
