use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseRejection {
    /// Blank lines are expected at end-of-file reads and skipped silently.
    #[error("empty line")]
    Empty,

    #[error("malformed JSON: {0}")]
    MalformedInput(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' has the wrong type")]
    InvalidFieldType(&'static str),

    #[error("exit code is not an integer: {0}")]
    InvalidExitCode(String),
}

/// A validated source entry. The timestamp is still the raw source text;
/// normalization happens separately so unparseable values can degrade to
/// pass-through instead of dropping the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub timestamp: String,
    pub exit_code: i64,
    pub message: String,
}

/// Parse one raw log line into a [`ParsedEntry`].
///
/// Required keys: `ts` (text), `exit` (integer-coercible), `msg` (text).
/// Unknown extra keys are ignored.
pub fn parse_line(raw_line: &str) -> Result<ParsedEntry, ParseRejection> {
    let line = raw_line.trim();
    if line.is_empty() {
        return Err(ParseRejection::Empty);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| ParseRejection::MalformedInput(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| ParseRejection::MalformedInput("not a JSON object".to_string()))?;

    let timestamp = required_string(obj, "ts")?;

    let exit_value = obj.get("exit").ok_or(ParseRejection::MissingField("exit"))?;
    let exit_code = coerce_exit_code(exit_value)?;

    let message = required_string(obj, "msg")?;

    Ok(ParsedEntry {
        timestamp,
        exit_code,
        message,
    })
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<String, ParseRejection> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ParseRejection::InvalidFieldType(key)),
        None => Err(ParseRejection::MissingField(key)),
    }
}

fn coerce_exit_code(value: &Value) -> Result<i64, ParseRejection> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ParseRejection::InvalidExitCode(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseRejection::InvalidExitCode(s.clone())),
        other => Err(ParseRejection::InvalidExitCode(other.to_string())),
    }
}
