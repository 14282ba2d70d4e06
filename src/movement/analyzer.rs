//! Per-movement analyzers.
//!
//! Each movement type owns an analyzer that decides which hand events the
//! recording pipeline has to detect and which analysis outputs make sense for
//! that movement. Protocol plans are the union of the movement plans filtered
//! by the protocol's requested outputs.

use serde::Serialize;
use std::collections::BTreeSet;

use super::{
    AperturePhase, ApertureClosure, Finger, FingerTapping, FingersBending, Freestyle, Grip, Hand, MovementConfig,
    ObjectHold, ProtocolConfiguration, RotationDirection, TappingMode, WristRotation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Wrist,
    Finger,
    Posture,
    State,
}

/// Catalog of analysis outputs the report generator knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisOutput {
    HandAperture,
    Cyclogram3D,
    Trajectory3D,
    RomPlot,
    TremorSpectrogram,
    OpeningClosingVelocity,
    CycleFrequency,
    CycleVariability,
    InterFingerCoordination,
    CycleSymmetry,
    GeometricCurvature,
    SparcSmoothness,
    LdljvSmoothness,
    BradykinesiaMetrics,
    FatigueAnalysis,
    TremorRegularity,
    ClinicalSummary,
}

impl AnalysisOutput {
    pub const ALL: [AnalysisOutput; 17] = [
        AnalysisOutput::HandAperture,
        AnalysisOutput::Cyclogram3D,
        AnalysisOutput::Trajectory3D,
        AnalysisOutput::RomPlot,
        AnalysisOutput::TremorSpectrogram,
        AnalysisOutput::OpeningClosingVelocity,
        AnalysisOutput::CycleFrequency,
        AnalysisOutput::CycleVariability,
        AnalysisOutput::InterFingerCoordination,
        AnalysisOutput::CycleSymmetry,
        AnalysisOutput::GeometricCurvature,
        AnalysisOutput::SparcSmoothness,
        AnalysisOutput::LdljvSmoothness,
        AnalysisOutput::BradykinesiaMetrics,
        AnalysisOutput::FatigueAnalysis,
        AnalysisOutput::TremorRegularity,
        AnalysisOutput::ClinicalSummary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisOutput::HandAperture => "handAperture",
            AnalysisOutput::Cyclogram3D => "cyclogram3D",
            AnalysisOutput::Trajectory3D => "trajectory3D",
            AnalysisOutput::RomPlot => "romPlot",
            AnalysisOutput::TremorSpectrogram => "tremorSpectrogram",
            AnalysisOutput::OpeningClosingVelocity => "openingClosingVelocity",
            AnalysisOutput::CycleFrequency => "cycleFrequency",
            AnalysisOutput::CycleVariability => "cycleVariability",
            AnalysisOutput::InterFingerCoordination => "interFingerCoordination",
            AnalysisOutput::CycleSymmetry => "cycleSymmetry",
            AnalysisOutput::GeometricCurvature => "geometricCurvature",
            AnalysisOutput::SparcSmoothness => "sparcSmoothness",
            AnalysisOutput::LdljvSmoothness => "ldljvSmoothness",
            AnalysisOutput::BradykinesiaMetrics => "bradykinesiaMetrics",
            AnalysisOutput::FatigueAnalysis => "fatigueAnalysis",
            AnalysisOutput::TremorRegularity => "tremorRegularity",
            AnalysisOutput::ClinicalSummary => "clinicalSummary",
        }
    }

    pub fn from_name(name: &str) -> Option<AnalysisOutput> {
        Self::ALL.iter().copied().find(|o| o.name() == name)
    }
}

impl Serialize for AnalysisOutput {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementPlan {
    pub movement_type: &'static str,
    pub event_categories: Vec<EventCategory>,
    pub event_labels: Vec<String>,
    pub outputs: Vec<AnalysisOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedOutput {
    pub output: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolPlan {
    pub movements: Vec<MovementPlan>,
    pub scheduled: Vec<AnalysisOutput>,
    pub skipped: Vec<SkippedOutput>,
}

pub trait MovementAnalyzer {
    fn movement_type(&self) -> &'static str;

    fn event_categories(&self) -> Vec<EventCategory>;

    fn event_labels(&self) -> Vec<String>;

    fn outputs(&self) -> Vec<AnalysisOutput>;

    fn plan(&self) -> MovementPlan {
        let mut outputs = self.outputs();
        outputs.sort();
        outputs.dedup();
        MovementPlan {
            movement_type: self.movement_type(),
            event_categories: self.event_categories(),
            event_labels: self.event_labels(),
            outputs,
        }
    }
}

pub struct WristRotationAnalyzer<'a>(pub &'a WristRotation);
pub struct FingerTappingAnalyzer<'a>(pub &'a FingerTapping);
pub struct FingersBendingAnalyzer<'a>(pub &'a FingersBending);
pub struct ApertureClosureAnalyzer<'a>(pub &'a ApertureClosure);
pub struct ObjectHoldAnalyzer<'a>(pub &'a ObjectHold);
pub struct FreestyleAnalyzer<'a>(pub &'a Freestyle);

/// Route a movement to its analyzer.
pub fn analyzer_for(movement: &MovementConfig) -> Box<dyn MovementAnalyzer + '_> {
    match movement {
        MovementConfig::WristRotation(m) => Box::new(WristRotationAnalyzer(m)),
        MovementConfig::FingerTapping(m) => Box::new(FingerTappingAnalyzer(m)),
        MovementConfig::FingersBending(m) => Box::new(FingersBendingAnalyzer(m)),
        MovementConfig::ApertureClosure(m) => Box::new(ApertureClosureAnalyzer(m)),
        MovementConfig::ObjectHold(m) => Box::new(ObjectHoldAnalyzer(m)),
        MovementConfig::Freestyle(m) => Box::new(FreestyleAnalyzer(m)),
    }
}

fn finger_labels(fingers: &[Finger], suffixes: &[&str]) -> Vec<String> {
    let mut sorted = fingers.to_vec();
    sorted.sort();
    sorted
        .iter()
        .flat_map(|f| suffixes.iter().map(move |s| format!("{}_{}", f.as_str(), s)))
        .collect()
}

impl MovementAnalyzer for WristRotationAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "wrist_rotation"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![EventCategory::Wrist, EventCategory::Posture]
    }

    fn event_labels(&self) -> Vec<String> {
        let mut labels = match self.0.direction {
            RotationDirection::In => vec!["wrist_rotation_in"],
            RotationDirection::Out => vec!["wrist_rotation_out"],
            RotationDirection::InOut => vec!["wrist_rotation_in", "wrist_rotation_out"],
        };
        labels.extend(["pronation", "supination"]);
        labels.into_iter().map(String::from).collect()
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        let mut outputs = vec![
            AnalysisOutput::RomPlot,
            AnalysisOutput::Trajectory3D,
            AnalysisOutput::CycleFrequency,
            AnalysisOutput::CycleVariability,
            AnalysisOutput::SparcSmoothness,
            AnalysisOutput::TremorSpectrogram,
        ];
        if self.0.hand == Hand::Both {
            outputs.push(AnalysisOutput::CycleSymmetry);
        }
        outputs
    }
}

impl MovementAnalyzer for FingerTappingAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "finger_tapping"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![EventCategory::Finger]
    }

    fn event_labels(&self) -> Vec<String> {
        finger_labels(&self.0.fingers, &["tap", "lift"])
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        let mut outputs = vec![
            AnalysisOutput::CycleFrequency,
            AnalysisOutput::CycleVariability,
            AnalysisOutput::BradykinesiaMetrics,
            AnalysisOutput::FatigueAnalysis,
            AnalysisOutput::TremorRegularity,
        ];
        // Coordination needs at least two fingers
        if self.0.fingers.len() > 1 {
            outputs.push(AnalysisOutput::InterFingerCoordination);
        }
        if self.0.mode != TappingMode::Unilateral {
            outputs.push(AnalysisOutput::CycleSymmetry);
        }
        outputs
    }
}

impl MovementAnalyzer for FingersBendingAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "fingers_bending"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![EventCategory::Finger]
    }

    fn event_labels(&self) -> Vec<String> {
        finger_labels(&self.0.fingers, &["lift"])
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        let mut outputs = vec![
            AnalysisOutput::RomPlot,
            AnalysisOutput::CycleFrequency,
            AnalysisOutput::LdljvSmoothness,
            AnalysisOutput::GeometricCurvature,
        ];
        if self.0.fingers.len() > 1 {
            outputs.push(AnalysisOutput::InterFingerCoordination);
        }
        outputs
    }
}

impl MovementAnalyzer for ApertureClosureAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "aperture_closure"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![EventCategory::State]
    }

    fn event_labels(&self) -> Vec<String> {
        let labels: &[&str] = match self.0.phase {
            AperturePhase::Aperture => &["aperture"],
            AperturePhase::Closure => &["closure"],
            AperturePhase::Both => &["aperture", "closure"],
        };
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        let mut outputs = vec![
            AnalysisOutput::HandAperture,
            AnalysisOutput::Cyclogram3D,
            AnalysisOutput::CycleFrequency,
            AnalysisOutput::BradykinesiaMetrics,
            AnalysisOutput::FatigueAnalysis,
        ];
        // Velocities need both directions of the cycle
        if self.0.phase == AperturePhase::Both {
            outputs.push(AnalysisOutput::OpeningClosingVelocity);
        }
        outputs
    }
}

impl MovementAnalyzer for ObjectHoldAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "object_hold"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![EventCategory::Posture, EventCategory::State]
    }

    fn event_labels(&self) -> Vec<String> {
        let state = match self.0.grip {
            Grip::OpenPalm => "aperture",
            Grip::ClosedGrip => "closure",
        };
        vec!["neutral".to_string(), state.to_string()]
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        vec![
            AnalysisOutput::TremorSpectrogram,
            AnalysisOutput::TremorRegularity,
            AnalysisOutput::SparcSmoothness,
            AnalysisOutput::Trajectory3D,
        ]
    }
}

impl MovementAnalyzer for FreestyleAnalyzer<'_> {
    fn movement_type(&self) -> &'static str {
        "freestyle"
    }

    fn event_categories(&self) -> Vec<EventCategory> {
        vec![
            EventCategory::Wrist,
            EventCategory::Finger,
            EventCategory::Posture,
            EventCategory::State,
        ]
    }

    fn event_labels(&self) -> Vec<String> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<AnalysisOutput> {
        vec![
            AnalysisOutput::Trajectory3D,
            AnalysisOutput::SparcSmoothness,
            AnalysisOutput::LdljvSmoothness,
            AnalysisOutput::TremorSpectrogram,
            AnalysisOutput::GeometricCurvature,
        ]
    }
}

/// Build the analysis plan for a whole protocol.
///
/// With no `analysis_outputs` configured every supported output is scheduled.
/// Otherwise only enabled outputs are scheduled; explicitly disabled ones and
/// enabled ones that no movement supports are reported as skipped.
pub fn plan_protocol(config: &ProtocolConfiguration) -> ProtocolPlan {
    let movements: Vec<MovementPlan> = config.movements.iter().map(|m| analyzer_for(m).plan()).collect();

    let mut supported: BTreeSet<AnalysisOutput> = movements.iter().flat_map(|p| p.outputs.iter().copied()).collect();
    if !movements.is_empty() {
        supported.insert(AnalysisOutput::ClinicalSummary);
    }

    let mut scheduled = Vec::new();
    let mut skipped = Vec::new();

    if config.analysis_outputs.is_empty() {
        scheduled.extend(supported.iter().copied());
    } else {
        for output in AnalysisOutput::ALL {
            let Some(requested) = config.analysis_outputs.get(output.name()) else {
                continue;
            };
            if !requested.enabled {
                skipped.push(SkippedOutput {
                    output: output.name().to_string(),
                    reason: "disabled",
                });
            } else if supported.contains(&output) {
                scheduled.push(output);
            } else {
                skipped.push(SkippedOutput {
                    output: output.name().to_string(),
                    reason: "not supported by any movement",
                });
            }
        }
    }

    ProtocolPlan {
        movements,
        scheduled,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::AnalysisOutputConfig;

    fn tapping(mode: TappingMode, fingers: Vec<Finger>) -> MovementConfig {
        MovementConfig::FingerTapping(FingerTapping {
            hand: Hand::Both,
            fingers,
            mode,
            repetitions: 10,
            duration_seconds: None,
        })
    }

    #[test]
    fn catalog_names_round_trip() {
        for output in AnalysisOutput::ALL {
            assert_eq!(AnalysisOutput::from_name(output.name()), Some(output));
        }
        assert_eq!(AnalysisOutput::from_name("unknown"), None);
    }

    #[test]
    fn routes_each_movement_to_its_analyzer() {
        let movements = vec![
            MovementConfig::WristRotation(WristRotation {
                hand: Hand::Left,
                direction: RotationDirection::In,
                repetitions: 5,
                duration_seconds: None,
            }),
            tapping(TappingMode::Unilateral, vec![Finger::Index]),
            MovementConfig::FingersBending(FingersBending {
                hand: Hand::Right,
                fingers: vec![Finger::Thumb],
                repetitions: 3,
            }),
            MovementConfig::ApertureClosure(ApertureClosure {
                hand: Hand::Right,
                phase: AperturePhase::Closure,
                repetitions: 3,
            }),
            MovementConfig::ObjectHold(ObjectHold {
                hand: Hand::Right,
                grip: Grip::OpenPalm,
                duration_seconds: 10,
            }),
            MovementConfig::Freestyle(Freestyle {
                duration_seconds: 30,
                description: None,
            }),
        ];
        for movement in &movements {
            assert_eq!(analyzer_for(movement).movement_type(), movement.type_name());
        }
    }

    #[test]
    fn finger_tapping_plan_depends_on_mode_and_fingers() {
        let single = analyzer_for(&tapping(TappingMode::Unilateral, vec![Finger::Index])).plan();
        assert_eq!(single.event_labels, vec!["index_tap", "index_lift"]);
        assert!(!single.outputs.contains(&AnalysisOutput::InterFingerCoordination));
        assert!(!single.outputs.contains(&AnalysisOutput::CycleSymmetry));

        let bilateral = analyzer_for(&tapping(TappingMode::Bilateral, vec![Finger::Middle, Finger::Thumb])).plan();
        assert_eq!(
            bilateral.event_labels,
            vec!["thumb_tap", "thumb_lift", "middle_tap", "middle_lift"]
        );
        assert!(bilateral.outputs.contains(&AnalysisOutput::InterFingerCoordination));
        assert!(bilateral.outputs.contains(&AnalysisOutput::CycleSymmetry));
    }

    #[test]
    fn wrist_rotation_labels_follow_direction() {
        let rotation = WristRotation {
            hand: Hand::Right,
            direction: RotationDirection::InOut,
            repetitions: 4,
            duration_seconds: Some(20),
        };
        let plan = WristRotationAnalyzer(&rotation).plan();
        assert_eq!(
            plan.event_labels,
            vec!["wrist_rotation_in", "wrist_rotation_out", "pronation", "supination"]
        );
        assert_eq!(plan.event_categories, vec![EventCategory::Wrist, EventCategory::Posture]);
    }

    #[test]
    fn protocol_plan_schedules_everything_supported_by_default() {
        let config = ProtocolConfiguration {
            movements: vec![tapping(TappingMode::Unilateral, vec![Finger::Index])],
            instructions: None,
            analysis_outputs: Default::default(),
        };
        let plan = plan_protocol(&config);
        assert!(plan.scheduled.contains(&AnalysisOutput::CycleFrequency));
        assert!(plan.scheduled.contains(&AnalysisOutput::ClinicalSummary));
        assert!(!plan.scheduled.contains(&AnalysisOutput::HandAperture));
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn protocol_plan_honors_requested_outputs() {
        let mut config = ProtocolConfiguration {
            movements: vec![tapping(TappingMode::Unilateral, vec![Finger::Index])],
            instructions: None,
            analysis_outputs: Default::default(),
        };
        let enabled = AnalysisOutputConfig {
            enabled: true,
            ..Default::default()
        };
        config.analysis_outputs.insert("cycleFrequency".into(), enabled.clone());
        config.analysis_outputs.insert("handAperture".into(), enabled);
        config.analysis_outputs.insert("fatigueAnalysis".into(), AnalysisOutputConfig::default());

        let plan = plan_protocol(&config);
        assert_eq!(plan.scheduled, vec![AnalysisOutput::CycleFrequency]);
        assert_eq!(
            plan.skipped,
            vec![
                SkippedOutput {
                    output: "handAperture".into(),
                    reason: "not supported by any movement"
                },
                SkippedOutput {
                    output: "fatigueAnalysis".into(),
                    reason: "disabled"
                },
            ]
        );
    }
}
