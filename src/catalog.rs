//! Host-facing catalogs: actions, feedbacks and display variables
//!
//! Everything here is static description. Parsing of the option values lives in
//! `actions`, evaluation in `feedback`.

use serde::Serialize;

use crate::feedback::Comparison;
use crate::host::VariableDefinition;
use crate::state::{ExecKey, PlaybackId, StateKey};

/// Choice in a dropdown option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: &'static str,
    pub label: &'static str,
}

const fn choice(id: &'static str, label: &'static str) -> Choice {
    Choice { id, label }
}

/// Input widget kind with its constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OptionKind {
    Number { min: i64, max: i64 },
    Dropdown { choices: Vec<Choice> },
    Text,
}

/// One typed option of an action or feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionField {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: OptionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    pub required: bool,
}

impl OptionField {
    fn number(id: &'static str, label: &'static str, min: i64, max: i64) -> Self {
        Self {
            id,
            label,
            kind: OptionKind::Number { min, max },
            default: None,
            required: true,
        }
    }

    fn dropdown(id: &'static str, label: &'static str, choices: Vec<Choice>) -> Self {
        Self {
            id,
            label,
            kind: OptionKind::Dropdown { choices },
            default: None,
            required: true,
        }
    }

    fn text(id: &'static str, label: &'static str) -> Self {
        Self {
            id,
            label,
            kind: OptionKind::Text,
            default: None,
            required: true,
        }
    }

    /// Mark optional, with the value used when it is missing or unparsable
    fn or(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }
}

/// A button action the host can trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub options: Vec<OptionField>,
}

/// A boolean feedback the host can color buttons with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub options: Vec<OptionField>,
}

fn playback_option() -> OptionField {
    OptionField::number("pbId", "Playback (1-10)", 1, 10)
}

fn execute_options() -> Vec<OptionField> {
    vec![
        OptionField::number("exeP", "Execute page (1-10)", 1, 10),
        OptionField::number("exeNr", "Execute number", 1, u32::MAX as i64),
    ]
}

fn switch_choices(on: &'static str, off: &'static str) -> Vec<Choice> {
    vec![choice("1", on), choice("0", off), choice("2", "Toggle")]
}

fn comparison_option() -> OptionField {
    let choices = Comparison::ALL
        .iter()
        .map(|c| choice(c.as_str(), c.as_str()))
        .collect();
    OptionField::dropdown("op", "Comparison", choices).or("isActive")
}

/// Every action, in display order
pub fn action_definitions() -> Vec<ActionDefinition> {
    let action = |id, name, options| ActionDefinition { id, name, options };

    vec![
        action(
            "pb",
            "Set playback level",
            vec![
                playback_option(),
                OptionField::number("pbVal", "Fader value (0-100 %)", 0, 100),
            ],
        ),
        action(
            "pbAdjust",
            "Adjust playback level",
            vec![
                playback_option(),
                OptionField::number("delta", "Change (%)", -100, 100).or("10"),
            ],
        ),
        action("pbGo", "Playback go", vec![playback_option()]),
        action(
            "pbFlash",
            "Playback flash",
            vec![
                playback_option(),
                OptionField::dropdown("pbFId", "On / Off", switch_choices("Flash On", "Flash Off"))
                    .or("2"),
            ],
        ),
        action("pbPause", "Playback pause", vec![playback_option()]),
        action("pbRelease", "Playback release", vec![playback_option()]),
        action(
            "pbJump",
            "Playback jump to cue",
            vec![playback_option(), OptionField::text("cue", "Cue number")],
        ),
        action("execute", "Execute set level", {
            let mut options = execute_options();
            options.push(OptionField::number("exeVal", "Level (0 = release, %)", 0, 100).or("100"));
            options
        }),
        action("executeAdjust", "Execute adjust level", {
            let mut options = execute_options();
            options.push(OptionField::number("delta", "Change (%)", -100, 100).or("10"));
            options
        }),
        action("executeToggle", "Execute toggle", execute_options()),
        action(
            "dbo",
            "Desk blackout",
            vec![OptionField::dropdown(
                "dboId",
                "On / Off",
                switch_choices("Black Out On", "Black Out Off"),
            )
            .or("2")],
        ),
        action(
            "swap",
            "Swap mode",
            vec![OptionField::dropdown(
                "swapId",
                "On / Off",
                vec![choice("1", "Swap On"), choice("0", "Swap Off")],
            )
            .or("1")],
        ),
        action(
            "tenScene",
            "10-scene recall",
            vec![
                OptionField::number("item", "Item", 1, u32::MAX as i64),
                OptionField::number("zone", "Zone", 1, u32::MAX as i64),
                OptionField::number("level", "Level (0-100 %)", 0, 100).or("100"),
            ],
        ),
        action(
            "rpc",
            "Command passthrough",
            vec![OptionField::text("cmd", "Command line")],
        ),
    ]
}

/// Every feedback, in display order
pub fn feedback_definitions() -> Vec<FeedbackDefinition> {
    let active_choices = || vec![choice("1", "Yes"), choice("0", "No")];

    vec![
        FeedbackDefinition {
            id: "pbLevel",
            name: "Playback level",
            options: vec![
                OptionField::number("id", "Playback (1-10)", 1, 10),
                comparison_option(),
                OptionField::number("value", "Value (%)", 0, 100).or("0"),
            ],
        },
        FeedbackDefinition {
            id: "pbFlash",
            name: "Playback flashing",
            options: vec![
                OptionField::number("id", "Playback (1-10)", 1, 10),
                OptionField::dropdown("flashing", "Flashing", active_choices()).or("1"),
            ],
        },
        FeedbackDefinition {
            id: "execLevel",
            name: "Execute level",
            options: vec![
                OptionField::number("page", "Execute page", 1, u32::MAX as i64),
                OptionField::number("nr", "Execute number", 1, u32::MAX as i64),
                comparison_option(),
                OptionField::number("value", "Value (%)", 0, 100).or("0"),
            ],
        },
        FeedbackDefinition {
            id: "dbo",
            name: "Desk blackout",
            options: vec![OptionField::dropdown("active", "Active", active_choices()).or("1")],
        },
    ]
}

/// Variables that exist from startup: level and flash per playback, plus dbo
pub fn static_variable_definitions() -> Vec<VariableDefinition> {
    let mut defs: Vec<VariableDefinition> = PlaybackId::all()
        .flat_map(|id| {
            [
                VariableDefinition::new(
                    StateKey::PlaybackLevel(id).variable_id(),
                    format!("Playback {} level", id),
                ),
                VariableDefinition::new(
                    StateKey::PlaybackFlash(id).variable_id(),
                    format!("Playback {} flash", id),
                ),
            ]
        })
        .collect();
    defs.push(VariableDefinition::new(
        StateKey::Blackout.variable_id(),
        "Desk blackout",
    ));
    defs
}

/// Variable registered the first time an execute key is seen
pub fn execute_variable(key: &ExecKey) -> VariableDefinition {
    VariableDefinition::new(
        key.variable_id(),
        format!("Execute {}/{} level", key.page, key.nr),
    )
}
