//! Session payloads
//!
//! The server treats room-wide state and per-client state as opaque,
//! serializable values. A payload type only has to know how to build
//! itself from the `data` fields of an inbound command; the field
//! helpers here do the structural checking so that the first missing
//! or mistyped field is reported by name.
//!
//! `DisasterMasterData` and `Goblin` are the payloads the bundled game
//! uses.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;

/// Key/value body of a command envelope
pub type Fields = Map<String, Value>;

/// Room-wide shared state
pub trait SharedState: Clone + Serialize + Send + 'static {
    /// Build the initial state from the fields of a `create` command
    fn from_create(data: &Fields) -> Result<Self, AppError>;

    /// Build the replacement state from the fields of an `updateroom` command
    fn from_update(data: &Fields) -> Result<Self, AppError>;
}

/// Per-client state, owned by the client with the matching connection id
pub trait ClientState: Clone + Serialize + Send + 'static {
    /// Key of the sub-object carrying this payload in `join`/`updateplayer`
    const KEY: &'static str;

    /// Build the payload from its sub-object
    fn from_fields(data: &Fields) -> Result<Self, AppError>;
}

/// Required string field
pub fn require_str(data: &Fields, field: &'static str) -> Result<String, AppError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AppError::MissingField(field))
}

/// Required integer field
///
/// Any JSON number is accepted; fractional parts are truncated.
pub fn require_int(data: &Fields, field: &'static str) -> Result<i64, AppError> {
    data.get(field)
        .and_then(as_int)
        .ok_or(AppError::MissingField(field))
}

/// Required array-of-integers field
pub fn require_int_array(data: &Fields, field: &'static str) -> Result<Vec<i64>, AppError> {
    data.get(field)
        .and_then(Value::as_array)
        .and_then(|values| values.iter().map(as_int).collect::<Option<Vec<_>>>())
        .ok_or(AppError::MissingField(field))
}

/// Required object field
pub fn require_object<'a>(data: &'a Fields, field: &'static str) -> Result<&'a Fields, AppError> {
    data.get(field)
        .and_then(Value::as_object)
        .ok_or(AppError::MissingField(field))
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

/// Scenario state shared by everyone in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisasterMasterData {
    #[serde(rename = "scenario")]
    pub scenario_code: String,
    #[serde(rename = "chaosClock")]
    pub chaos_clock: i64,
}

impl SharedState for DisasterMasterData {
    fn from_create(data: &Fields) -> Result<Self, AppError> {
        Ok(Self {
            scenario_code: require_str(data, "scenarioCode")?,
            chaos_clock: 0,
        })
    }

    fn from_update(data: &Fields) -> Result<Self, AppError> {
        let chaos_clock = require_int(data, "chaosClock")?;
        let scenario_code = require_str(data, "scenarioCode")?;
        Ok(Self {
            scenario_code,
            chaos_clock,
        })
    }
}

/// A player's character sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goblin {
    pub dice: Vec<i64>,
    pub name: String,
    pub ass_size: i64,
    pub ass_origin: i64,
    pub class: i64,
    pub pocket_contents: String,
    pub note: String,
}

impl ClientState for Goblin {
    const KEY: &'static str = "player";

    fn from_fields(data: &Fields) -> Result<Self, AppError> {
        Ok(Self {
            dice: require_int_array(data, "dice")?,
            name: require_str(data, "name")?,
            ass_size: require_int(data, "assSize")?,
            ass_origin: require_int(data, "assOrigin")?,
            class: require_int(data, "class")?,
            pocket_contents: require_str(data, "pocketContents")?,
            note: require_str(data, "note")?,
        })
    }
}
