//! Movement protocol configuration.
//!
//! A protocol carries an ordered list of movements, each one of six clinical
//! movement shapes selected by its `type` tag, plus the analysis outputs the
//! clinician asked for.

pub mod analyzer;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub use analyzer::{analyzer_for, plan_protocol, AnalysisOutput, EventCategory, MovementAnalyzer, MovementPlan, ProtocolPlan};

pub const MAX_MOVEMENTS: usize = 20;
pub const MAX_REPETITIONS: u32 = 100;
pub const MAX_DURATION_SECONDS: u32 = 600;
pub const MAX_INSTRUCTIONS_LEN: usize = 5000;

/// Field path -> message.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDirection {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TappingMode {
    Unilateral,
    Bilateral,
    Alternating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AperturePhase {
    Aperture,
    Closure,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grip {
    OpenPalm,
    ClosedGrip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WristRotation {
    pub hand: Hand,
    pub direction: RotationDirection,
    pub repetitions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerTapping {
    pub hand: Hand,
    pub fingers: Vec<Finger>,
    pub mode: TappingMode,
    pub repetitions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingersBending {
    pub hand: Hand,
    pub fingers: Vec<Finger>,
    pub repetitions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureClosure {
    pub hand: Hand,
    pub phase: AperturePhase,
    pub repetitions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectHold {
    pub hand: Hand,
    pub grip: Grip,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Freestyle {
    pub duration_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One movement of a protocol, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementConfig {
    WristRotation(WristRotation),
    FingerTapping(FingerTapping),
    FingersBending(FingersBending),
    ApertureClosure(ApertureClosure),
    ObjectHold(ObjectHold),
    Freestyle(Freestyle),
}

impl MovementConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            MovementConfig::WristRotation(_) => "wrist_rotation",
            MovementConfig::FingerTapping(_) => "finger_tapping",
            MovementConfig::FingersBending(_) => "fingers_bending",
            MovementConfig::ApertureClosure(_) => "aperture_closure",
            MovementConfig::ObjectHold(_) => "object_hold",
            MovementConfig::Freestyle(_) => "freestyle",
        }
    }

    pub fn hand(&self) -> Option<Hand> {
        match self {
            MovementConfig::WristRotation(m) => Some(m.hand),
            MovementConfig::FingerTapping(m) => Some(m.hand),
            MovementConfig::FingersBending(m) => Some(m.hand),
            MovementConfig::ApertureClosure(m) => Some(m.hand),
            MovementConfig::ObjectHold(m) => Some(m.hand),
            MovementConfig::Freestyle(_) => None,
        }
    }

    fn validate(&self, path: &str, errors: &mut FieldErrors) {
        match self {
            MovementConfig::WristRotation(m) => {
                check_repetitions(m.repetitions, path, errors);
                if let Some(d) = m.duration_seconds {
                    check_duration(d, path, errors);
                }
            }
            MovementConfig::FingerTapping(m) => {
                check_fingers(&m.fingers, path, errors);
                check_repetitions(m.repetitions, path, errors);
                if let Some(d) = m.duration_seconds {
                    check_duration(d, path, errors);
                }
                if m.mode != TappingMode::Unilateral && m.hand != Hand::Both {
                    errors.insert(
                        format!("{}.hand", path),
                        "bilateral and alternating tapping require hand 'both'".to_string(),
                    );
                }
            }
            MovementConfig::FingersBending(m) => {
                check_fingers(&m.fingers, path, errors);
                check_repetitions(m.repetitions, path, errors);
            }
            MovementConfig::ApertureClosure(m) => {
                check_repetitions(m.repetitions, path, errors);
            }
            MovementConfig::ObjectHold(m) => {
                check_duration(m.duration_seconds, path, errors);
            }
            MovementConfig::Freestyle(m) => {
                check_duration(m.duration_seconds, path, errors);
            }
        }
    }
}

fn check_repetitions(value: u32, path: &str, errors: &mut FieldErrors) {
    if value == 0 || value > MAX_REPETITIONS {
        errors.insert(
            format!("{}.repetitions", path),
            format!("must be between 1 and {}", MAX_REPETITIONS),
        );
    }
}

fn check_duration(value: u32, path: &str, errors: &mut FieldErrors) {
    if value == 0 || value > MAX_DURATION_SECONDS {
        errors.insert(
            format!("{}.duration_seconds", path),
            format!("must be between 1 and {}", MAX_DURATION_SECONDS),
        );
    }
}

fn check_fingers(fingers: &[Finger], path: &str, errors: &mut FieldErrors) {
    if fingers.is_empty() {
        errors.insert(format!("{}.fingers", path), "at least one finger is required".to_string());
        return;
    }
    let mut seen = HashSet::new();
    if !fingers.iter().all(|f| seen.insert(*f)) {
        errors.insert(format!("{}.fingers", path), "fingers must not repeat".to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutputConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfiguration {
    pub movements: Vec<MovementConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, alias = "analysisOutputs")]
    pub analysis_outputs: BTreeMap<String, AnalysisOutputConfig>,
}

impl ProtocolConfiguration {
    /// Parse and validate an untyped configuration, collecting every field
    /// error instead of stopping at the first one.
    pub fn parse(value: Value) -> Result<ProtocolConfiguration, FieldErrors> {
        let mut errors = FieldErrors::new();

        let mut object = match value {
            Value::Object(map) => map,
            _ => {
                errors.insert("configuration".to_string(), "must be an object".to_string());
                return Err(errors);
            }
        };

        let movements = match object.remove("movements") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                errors.insert("movements".to_string(), "must be an array".to_string());
                Vec::new()
            }
            None => {
                errors.insert("movements".to_string(), "is required".to_string());
                Vec::new()
            }
        };

        let mut parsed = Vec::with_capacity(movements.len());
        for (i, raw) in movements.into_iter().enumerate() {
            let path = format!("movements[{}]", i);
            match serde_json::from_value::<MovementConfig>(raw) {
                Ok(movement) => {
                    movement.validate(&path, &mut errors);
                    parsed.push(movement);
                }
                Err(e) => {
                    errors.insert(path, e.to_string());
                }
            }
        }

        let instructions = match object.remove("instructions") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                errors.insert("instructions".to_string(), "must be a string".to_string());
                None
            }
        };

        let outputs_value = object
            .remove("analysis_outputs")
            .or_else(|| object.remove("analysisOutputs"))
            .unwrap_or(Value::Object(Map::new()));
        let analysis_outputs = match serde_json::from_value::<BTreeMap<String, AnalysisOutputConfig>>(outputs_value) {
            Ok(outputs) => outputs,
            Err(e) => {
                errors.insert("analysis_outputs".to_string(), e.to_string());
                BTreeMap::new()
            }
        };

        let config = ProtocolConfiguration {
            movements: parsed,
            instructions,
            analysis_outputs,
        };
        config.validate_into(&mut errors);

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Validate an already typed configuration.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (i, movement) in self.movements.iter().enumerate() {
            movement.validate(&format!("movements[{}]", i), &mut errors);
        }
        self.validate_into(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_into(&self, errors: &mut FieldErrors) {
        if self.movements.is_empty() && !errors.contains_key("movements") {
            errors.insert("movements".to_string(), "at least one movement is required".to_string());
        }
        if self.movements.len() > MAX_MOVEMENTS {
            errors.insert("movements".to_string(), format!("at most {} movements are allowed", MAX_MOVEMENTS));
        }
        if let Some(instructions) = &self.instructions {
            if instructions.chars().count() > MAX_INSTRUCTIONS_LEN {
                errors.insert(
                    "instructions".to_string(),
                    format!("must be at most {} characters", MAX_INSTRUCTIONS_LEN),
                );
            }
        }
        for name in self.analysis_outputs.keys() {
            if AnalysisOutput::from_name(name).is_none() {
                errors.insert(format!("analysis_outputs.{}", name), "unknown analysis output".to_string());
            }
        }
    }
}
