//! Action and feedback option parsing
//!
//! Button panels send option values as text, so numbers are parsed leniently:
//! `75`, `"75"` and `"75.4"` all read as 75. Missing required values are a
//! `MalformedInput` error; unparsable optional values fall back to the
//! defaults listed in the catalog.

use serde_json::{Map, Value};
use tracing::debug;

use crate::encoder::{Command, CueNumber, ExecuteLevel, Switch};
use crate::error::{GatewayError, Result};
use crate::feedback::{Comparison, FeedbackQuery};
use crate::state::{clamp_percent, ExecIndex, ExecKey, PlaybackId};

pub type Options = Map<String, Value>;

/// Read an option as a rounded integer
fn number(options: &Options, key: &str) -> Option<i64> {
    let raw = match options.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    raw.is_finite().then(|| raw.round() as i64)
}

fn required_number(action: &str, options: &Options, key: &str) -> Result<i64> {
    number(options, key).ok_or_else(|| match options.get(key) {
        None | Some(Value::Null) => GatewayError::malformed(action, format!("missing '{}'", key)),
        Some(other) => GatewayError::malformed(action, format!("'{}' is not a number: {}", key, other)),
    })
}

fn optional_number(options: &Options, key: &str, default: i64) -> i64 {
    number(options, key).unwrap_or_else(|| {
        if options.contains_key(key) {
            debug!(key, "Unparsable option, using default {}", default);
        }
        default
    })
}

fn text(options: &Options, key: &str) -> Option<String> {
    match options.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `1`/`on`/`true`, `0`/`off`/`false`, or `2`/`toggle`
fn switch(options: &Options, key: &str) -> Option<Switch> {
    let raw = text(options, key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Some(Switch::Set(true)),
        "0" | "off" | "false" => Some(Switch::Set(false)),
        "2" | "toggle" => Some(Switch::Toggle),
        _ => None,
    }
}

fn flag(options: &Options, key: &str, default: bool) -> bool {
    match switch(options, key) {
        Some(Switch::Set(on)) => on,
        _ => default,
    }
}

fn positive_u32(value: i64) -> u32 {
    value.clamp(1, u32::MAX as i64) as u32
}

fn delta(options: &Options) -> i32 {
    optional_number(options, "delta", 10).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn playback(action: &str, options: &Options) -> Result<PlaybackId> {
    required_number(action, options, "pbId").map(PlaybackId::clamped)
}

/// Feedback page/number: digit strings of any length are kept exact so
/// queries can reach executes the console reported
fn exec_index(feedback: &str, options: &Options, key: &str) -> Result<ExecIndex> {
    if let Some(index) = text(options, key).and_then(|raw| ExecIndex::parse(raw.trim())) {
        if !index.is_zero() {
            return Ok(index);
        }
    }
    required_number(feedback, options, key).map(|n| ExecIndex::from(positive_u32(n)))
}

fn execute_key(action: &str, options: &Options) -> Result<ExecKey> {
    let page = required_number(action, options, "exeP")?;
    let nr = required_number(action, options, "exeNr")?;
    Ok(ExecKey::clamped(page, nr))
}

/// Build a command from an action id and its options
pub fn parse_action(action: &str, options: &Options) -> Result<Command> {
    let command = match action {
        "pb" => Command::PlaybackLevel {
            id: playback(action, options)?,
            level: clamp_percent(required_number(action, options, "pbVal")?),
        },
        "pbAdjust" => Command::PlaybackAdjust {
            id: playback(action, options)?,
            delta: delta(options),
        },
        "pbGo" => Command::PlaybackGo { id: playback(action, options)? },
        "pbFlash" => Command::PlaybackFlash {
            id: playback(action, options)?,
            flash: switch(options, "pbFId").unwrap_or(Switch::Toggle),
        },
        "pbPause" => Command::PlaybackPause { id: playback(action, options)? },
        "pbRelease" => Command::PlaybackRelease { id: playback(action, options)? },
        "pbJump" => {
            let id = playback(action, options)?;
            let raw = text(options, "cue")
                .ok_or_else(|| GatewayError::malformed(action, "missing 'cue'"))?;
            let cue = CueNumber::parse(&raw).ok_or_else(|| {
                GatewayError::malformed(action, format!("cue '{}' is not a cue number", raw))
            })?;
            Command::PlaybackJump { id, cue }
        }
        "execute" => Command::Execute {
            key: execute_key(action, options)?,
            level: ExecuteLevel::Set(clamp_percent(optional_number(options, "exeVal", 100))),
        },
        "executeAdjust" => Command::Execute {
            key: execute_key(action, options)?,
            level: ExecuteLevel::Adjust(delta(options)),
        },
        "executeToggle" => Command::Execute {
            key: execute_key(action, options)?,
            level: ExecuteLevel::Toggle,
        },
        "dbo" => Command::Blackout(switch(options, "dboId").unwrap_or(Switch::Toggle)),
        "swap" => Command::Swap(flag(options, "swapId", true)),
        "tenScene" => Command::TenScene {
            item: positive_u32(required_number(action, options, "item")?),
            zone: positive_u32(required_number(action, options, "zone")?),
            level: clamp_percent(optional_number(options, "level", 100)),
        },
        "rpc" => {
            let cmd = text(options, "cmd")
                .filter(|c| !c.is_empty())
                .ok_or_else(|| GatewayError::malformed(action, "missing 'cmd'"))?;
            Command::Rpc(cmd)
        }
        other => return Err(GatewayError::UnknownAction(other.to_string())),
    };
    Ok(command)
}

fn comparison(options: &Options) -> Comparison {
    text(options, "op")
        .and_then(|op| op.parse().ok())
        .unwrap_or(Comparison::IsActive)
}

/// Build a feedback query from a feedback id and its options
pub fn parse_feedback(feedback: &str, options: &Options) -> Result<FeedbackQuery> {
    let query = match feedback {
        "pbLevel" => FeedbackQuery::PlaybackLevel {
            id: PlaybackId::clamped(required_number(feedback, options, "id")?),
            op: comparison(options),
            value: clamp_percent(optional_number(options, "value", 0)),
        },
        "pbFlash" => FeedbackQuery::PlaybackFlash {
            id: PlaybackId::clamped(required_number(feedback, options, "id")?),
            flashing: flag(options, "flashing", true),
        },
        "execLevel" => FeedbackQuery::ExecuteLevel {
            key: ExecKey {
                page: exec_index(feedback, options, "page")?,
                nr: exec_index(feedback, options, "nr")?,
            },
            op: comparison(options),
            value: clamp_percent(optional_number(options, "value", 0)),
        },
        "dbo" => FeedbackQuery::Blackout {
            active: flag(options, "active", true),
        },
        other => return Err(GatewayError::UnknownFeedback(other.to_string())),
    };
    Ok(query)
}

/// Parse `key=value` tokens into an option map (values stay strings)
pub fn parse_option_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Options> {
    let mut options = Options::new();
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| GatewayError::malformed("options", format!("expected key=value, got '{}'", token)))?;
        options.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    fn pb(id: u8) -> PlaybackId {
        PlaybackId::new(id).unwrap()
    }

    #[test]
    fn test_lenient_numbers() {
        for raw in [json!(75), json!("75"), json!(" 75.4 "), json!(74.6)] {
            let command = parse_action("pb", &opts(json!({ "pbId": "3", "pbVal": raw }))).unwrap();
            assert_eq!(command, Command::PlaybackLevel { id: pb(3), level: 75 });
        }
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let command = parse_action("pb", &opts(json!({ "pbId": 42, "pbVal": -5 }))).unwrap();
        assert_eq!(command, Command::PlaybackLevel { id: pb(10), level: 0 });

        let command =
            parse_action("execute", &opts(json!({ "exeP": 0, "exeNr": 0, "exeVal": 250 }))).unwrap();
        assert_eq!(
            command,
            Command::Execute { key: ExecKey::new(1, 1), level: ExecuteLevel::Set(100) }
        );
    }

    #[test]
    fn test_missing_required_is_malformed() {
        let err = parse_action("pb", &opts(json!({ "pbVal": 50 }))).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedInput { .. }));
        assert!(err.is_client_error());

        let err = parse_action("execute", &opts(json!({ "exeP": "abc", "exeNr": 1 }))).unwrap_err();
        assert!(err.to_string().contains("exeP"));
    }

    #[test]
    fn test_optional_defaults() {
        let command = parse_action("pbAdjust", &opts(json!({ "pbId": 1, "delta": "lots" }))).unwrap();
        assert_eq!(command, Command::PlaybackAdjust { id: pb(1), delta: 10 });

        let command = parse_action("execute", &opts(json!({ "exeP": 2, "exeNr": 5 }))).unwrap();
        assert_eq!(
            command,
            Command::Execute { key: ExecKey::new(2, 5), level: ExecuteLevel::Set(100) }
        );

        let command = parse_action("tenScene", &opts(json!({ "item": 3, "zone": 2 }))).unwrap();
        assert_eq!(command, Command::TenScene { item: 3, zone: 2, level: 100 });
    }

    #[test]
    fn test_switch_values() {
        let cases = [
            (json!("1"), Switch::Set(true)),
            (json!(0), Switch::Set(false)),
            (json!("2"), Switch::Toggle),
            (json!("Toggle"), Switch::Toggle),
            (json!("bogus"), Switch::Toggle),
        ];
        for (raw, expected) in cases {
            let command = parse_action("dbo", &opts(json!({ "dboId": raw }))).unwrap();
            assert_eq!(command, Command::Blackout(expected));
        }
        assert_eq!(parse_action("dbo", &Options::new()).unwrap(), Command::Blackout(Switch::Toggle));
        assert_eq!(
            parse_action("swap", &opts(json!({ "swapId": "0" }))).unwrap(),
            Command::Swap(false)
        );
    }

    #[test]
    fn test_cue_validation() {
        let command = parse_action("pbJump", &opts(json!({ "pbId": 4, "cue": "12.5" }))).unwrap();
        assert!(matches!(command, Command::PlaybackJump { ref cue, .. } if cue.as_str() == "12.5"));

        let numeric = parse_action("pbJump", &opts(json!({ "pbId": 4, "cue": 7 }))).unwrap();
        assert!(matches!(numeric, Command::PlaybackJump { ref cue, .. } if cue.as_str() == "7"));

        let err = parse_action("pbJump", &opts(json!({ "pbId": 4, "cue": "3/flash" }))).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedInput { .. }));
    }

    #[test]
    fn test_rpc_requires_command() {
        let command = parse_action("rpc", &opts(json!({ "cmd": "1,2H" }))).unwrap();
        assert_eq!(command, Command::Rpc("1,2H".to_string()));
        assert!(parse_action("rpc", &opts(json!({ "cmd": "" }))).is_err());
    }

    #[test]
    fn test_unknown_ids() {
        assert!(matches!(
            parse_action("fadeAll", &Options::new()),
            Err(GatewayError::UnknownAction(_))
        ));
        assert!(matches!(
            parse_feedback("rainbow", &Options::new()),
            Err(GatewayError::UnknownFeedback(_))
        ));
    }

    #[test]
    fn test_parse_feedback() {
        let query = parse_feedback(
            "execLevel",
            &opts(json!({ "page": "12", "nr": "400", "op": "greater", "value": "50" })),
        )
        .unwrap();
        assert_eq!(
            query,
            FeedbackQuery::ExecuteLevel {
                key: ExecKey::new(12, 400),
                op: Comparison::Greater,
                value: 50,
            }
        );

        let query = parse_feedback(
            "execLevel",
            &opts(json!({ "page": "0", "nr": "0042949672960", "op": "equal" })),
        )
        .unwrap();
        assert!(matches!(
            query,
            FeedbackQuery::ExecuteLevel { ref key, .. } if key.variable_id() == "exec1_42949672960"
        ));

        let query = parse_feedback("pbLevel", &opts(json!({ "id": 2, "op": "sideways" }))).unwrap();
        assert_eq!(
            query,
            FeedbackQuery::PlaybackLevel { id: pb(2), op: Comparison::IsActive, value: 0 }
        );

        let query = parse_feedback("pbFlash", &opts(json!({ "id": 1, "flashing": "0" }))).unwrap();
        assert_eq!(query, FeedbackQuery::PlaybackFlash { id: pb(1), flashing: false });

        assert_eq!(
            parse_feedback("dbo", &Options::new()).unwrap(),
            FeedbackQuery::Blackout { active: true }
        );
    }

    #[test]
    fn test_parse_option_tokens() {
        let options = parse_option_tokens(["pbId=3", "pbVal=75", "cmd=a=b"]).unwrap();
        assert_eq!(options["pbId"], json!("3"));
        assert_eq!(options["cmd"], json!("a=b"));
        assert!(parse_option_tokens(["pbId"]).is_err());
        assert!(parse_option_tokens(["=3"]).is_err());
    }
}
