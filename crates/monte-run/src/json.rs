use std::fs;
use std::path::Path;

use monte_core::errors::ErrorInfo;
use monte_core::MonteError;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn io_error(code: &str, err: impl ToString, path: &Path) -> MonteError {
    MonteError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Creates `dir` and any missing parents.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), MonteError> {
    fs::create_dir_all(dir).map_err(|err| io_error("mkdir", err, dir))
}

/// Writes `value` as pretty JSON, creating the parent directory.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), MonteError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| io_error("json-serialize", err, path))?;
    fs::write(path, json).map_err(|err| io_error("json-write", err, path))
}

/// Reads a JSON document.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MonteError> {
    let contents = fs::read_to_string(path).map_err(|err| io_error("json-read", err, path))?;
    serde_json::from_str(&contents).map_err(|err| io_error("json-parse", err, path))
}

/// Serde adapter keeping non-finite floats representable in JSON.
///
/// Finite values stay numbers; NaN and infinities become `"nan"`, `"inf"` and
/// `"-inf"`.
pub(crate) mod float_token {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Token(String),
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Token(token) => match token.as_str() {
                "nan" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("unexpected float token `{other}`"))),
            },
        }
    }
}
