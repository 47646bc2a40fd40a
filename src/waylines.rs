//! Vendor-neutral Waylines mission: the input side of the codec.

use serde::{Deserialize, Serialize};

use crate::actions::ActionRequest;
use crate::error::ValidationError;

pub const DEFAULT_GLOBAL_HEIGHT: f64 = 100.0;
pub const DEFAULT_GLOBAL_SPEED: f64 = 10.0;
pub const DEFAULT_TURN_MODE: TurnMode = TurnMode::ToPointAndStopWithDiscontinuityCurvature;
pub const DEFAULT_HEADING_MODE: &str = "followWayline";
pub const DEFAULT_GIMBAL_PITCH_MODE: &str = "manual";
pub const DEFAULT_FINISH_ACTION: &str = "goHome";
pub const DEFAULT_FLY_TO_WAYLINE_MODE: &str = "safely";
pub const DEFAULT_EXIT_ON_RC_LOST: &str = "executeLostAction";
pub const DEFAULT_EXECUTE_RC_LOST_ACTION: &str = "goBack";

/// Aircraft families that can fly a WPML mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DroneModel {
    M300RTK,
    M350RTK,
    M30Series,
    M3Series,
    M3DSeries,
    M4Series,
    M4DSeries,
}

impl DroneModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::M300RTK => "M300RTK",
            Self::M350RTK => "M350RTK",
            Self::M30Series => "M30Series",
            Self::M3Series => "M3Series",
            Self::M3DSeries => "M3DSeries",
            Self::M4Series => "M4Series",
            Self::M4DSeries => "M4DSeries",
        }
    }

    /// `droneEnumValue` in WPML.
    pub fn enum_value(self) -> i32 {
        match self {
            Self::M300RTK => 60,
            Self::M350RTK => 89,
            Self::M30Series => 67,
            Self::M3Series => 77,
            Self::M3DSeries => 91,
            Self::M4Series => 99,
            Self::M4DSeries => 100,
        }
    }

    /// Group names matched by conditional validation patterns.
    pub fn groups(self) -> &'static [&'static str] {
        match self {
            Self::M300RTK => &["M300"],
            Self::M350RTK => &["M350"],
            Self::M30Series => &["M30", "Dock"],
            Self::M3Series => &["M3"],
            Self::M3DSeries => &["M3D", "Dock"],
            Self::M4Series => &["M4"],
            Self::M4DSeries => &["M4D", "Dock"],
        }
    }
}

/// Camera payloads, including the integrated cameras of the enterprise series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadModel {
    H20,
    H20T,
    H20N,
    H30,
    H30T,
    Matrice30,
    Matrice30T,
    Mavic3E,
    Mavic3T,
    Mavic3M,
    Matrice3D,
    Matrice3TD,
    Matrice4E,
    Matrice4T,
    Matrice4D,
    Matrice4TD,
}

impl PayloadModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::H20 => "H20",
            Self::H20T => "H20T",
            Self::H20N => "H20N",
            Self::H30 => "H30",
            Self::H30T => "H30T",
            Self::Matrice30 => "Matrice30",
            Self::Matrice30T => "Matrice30T",
            Self::Mavic3E => "Mavic3E",
            Self::Mavic3T => "Mavic3T",
            Self::Mavic3M => "Mavic3M",
            Self::Matrice3D => "Matrice3D",
            Self::Matrice3TD => "Matrice3TD",
            Self::Matrice4E => "Matrice4E",
            Self::Matrice4T => "Matrice4T",
            Self::Matrice4D => "Matrice4D",
            Self::Matrice4TD => "Matrice4TD",
        }
    }

    /// `payloadEnumValue` in WPML.
    pub fn enum_value(self) -> i32 {
        match self {
            Self::H20 => 42,
            Self::H20T => 43,
            Self::H20N => 61,
            Self::H30 => 82,
            Self::H30T => 83,
            Self::Matrice30 => 52,
            Self::Matrice30T => 53,
            Self::Mavic3E => 66,
            Self::Mavic3T => 67,
            Self::Mavic3M => 68,
            Self::Matrice3D => 80,
            Self::Matrice3TD => 81,
            Self::Matrice4E => 88,
            Self::Matrice4T => 89,
            Self::Matrice4D => 98,
            Self::Matrice4TD => 99,
        }
    }

    /// `droneSubEnumValue` of the airframe variant this payload implies.
    pub fn drone_sub_enum_value(self) -> i32 {
        match self {
            Self::Matrice30T
            | Self::Mavic3T
            | Self::Matrice3TD
            | Self::Matrice4T
            | Self::Matrice4TD => 1,
            Self::Mavic3M => 2,
            _ => 0,
        }
    }

    pub fn groups(self) -> &'static [&'static str] {
        match self {
            Self::H20 => &["H20"],
            Self::H20T => &["H20", "H20T", "thermal"],
            Self::H20N => &["H20", "H20N", "thermal"],
            Self::H30 => &["H30"],
            Self::H30T => &["H30", "H30T", "thermal"],
            Self::Matrice30 => &["M30"],
            Self::Matrice30T => &["M30", "M30T", "thermal"],
            Self::Mavic3E => &["M3E"],
            Self::Mavic3T => &["M3T", "thermal"],
            Self::Mavic3M => &["M3M", "multispectral"],
            Self::Matrice3D => &["M3D"],
            Self::Matrice3TD => &["M3TD", "thermal"],
            Self::Matrice4E => &["M4E"],
            Self::Matrice4T => &["M4T", "thermal"],
            Self::Matrice4D => &["M4D"],
            Self::Matrice4TD => &["M4TD", "thermal"],
        }
    }

    /// Whether this payload can be mounted on (or ships with) `drone`.
    pub fn fits(self, drone: DroneModel) -> bool {
        match drone {
            DroneModel::M300RTK | DroneModel::M350RTK => {
                matches!(self, Self::H20 | Self::H20T | Self::H20N | Self::H30 | Self::H30T)
            }
            DroneModel::M30Series => matches!(self, Self::Matrice30 | Self::Matrice30T),
            DroneModel::M3Series => matches!(self, Self::Mavic3E | Self::Mavic3T | Self::Mavic3M),
            DroneModel::M3DSeries => matches!(self, Self::Matrice3D | Self::Matrice3TD),
            DroneModel::M4Series => matches!(self, Self::Matrice4E | Self::Matrice4T),
            DroneModel::M4DSeries => matches!(self, Self::Matrice4D | Self::Matrice4TD),
        }
    }
}

/// WPML template types. Only `waypoint` is modeled; the rest are rejected
/// by the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateType {
    #[default]
    Waypoint,
    Mapping2d,
    Mapping3d,
    MappingStrip,
}

impl TemplateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waypoint => "waypoint",
            Self::Mapping2d => "mapping2d",
            Self::Mapping3d => "mapping3d",
            Self::MappingStrip => "mappingStrip",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerType {
    #[default]
    ReachPoint,
    BetweenAdjacentPoints,
    MultipleTiming,
    MultipleDistance,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReachPoint => "reachPoint",
            Self::BetweenAdjacentPoints => "betweenAdjacentPoints",
            Self::MultipleTiming => "multipleTiming",
            Self::MultipleDistance => "multipleDistance",
        }
    }

    /// Repeating triggers need an interval (seconds or meters).
    pub fn needs_param(self) -> bool {
        matches!(self, Self::MultipleTiming | Self::MultipleDistance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnMode {
    CoordinateTurn,
    ToPointAndStopWithDiscontinuityCurvature,
    ToPointAndStopWithContinuityCurvature,
    ToPointAndPassWithContinuityCurvature,
}

impl TurnMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoordinateTurn => "coordinateTurn",
            Self::ToPointAndStopWithDiscontinuityCurvature => {
                "toPointAndStopWithDiscontinuityCurvature"
            }
            Self::ToPointAndStopWithContinuityCurvature => "toPointAndStopWithContinuityCurvature",
            Self::ToPointAndPassWithContinuityCurvature => "toPointAndPassWithContinuityCurvature",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeightMode {
    #[default]
    #[serde(rename = "relativeToStartPoint")]
    RelativeToStartPoint,
    #[serde(rename = "EGM96")]
    Egm96,
    #[serde(rename = "aboveGroundLevel")]
    AboveGroundLevel,
    #[serde(rename = "realTimeFollowSurface")]
    RealTimeFollowSurface,
}

impl HeightMode {
    /// Height mode of the template document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RelativeToStartPoint => "relativeToStartPoint",
            Self::Egm96 => "EGM96",
            Self::AboveGroundLevel => "aboveGroundLevel",
            Self::RealTimeFollowSurface => "realTimeFollowSurface",
        }
    }

    /// Height mode the aircraft executes in the waylines document.
    pub fn execute_str(self) -> &'static str {
        match self {
            Self::RelativeToStartPoint | Self::AboveGroundLevel => "relativeToStartPoint",
            Self::Egm96 => "WGS84",
            Self::RealTimeFollowSurface => "realTimeFollowSurface",
        }
    }
}

/// Explicit take-off reference point. Used only when both latitude and
/// longitude are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeOffRefPoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub height: Option<f64>,
    pub agl_height: Option<f64>,
}

/// A waypoint mission in vendor-neutral form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waylines {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub drone_model: DroneModel,
    pub payload_model: PayloadModel,
    #[serde(default)]
    pub template_type: TemplateType,
    #[serde(default)]
    pub height_mode: Option<HeightMode>,
    #[serde(default)]
    pub global_height: Option<f64>,
    #[serde(default)]
    pub global_speed: Option<f64>,
    #[serde(default, rename = "globalRTHHeight")]
    pub global_rth_height: Option<f64>,
    #[serde(default)]
    pub take_off_security_height: Option<f64>,
    #[serde(default)]
    pub global_transitional_speed: Option<f64>,
    #[serde(default)]
    pub turn_mode: Option<TurnMode>,
    #[serde(default)]
    pub use_straight_line: Option<bool>,
    /// Mapped leniently: unknown values fly as `followWayline`.
    #[serde(default)]
    pub heading_mode: Option<String>,
    #[serde(default)]
    pub gimbal_pitch_mode: Option<String>,
    #[serde(default)]
    pub take_off_ref_point: Option<TakeOffRefPoint>,
    #[serde(default)]
    pub finish_action: Option<String>,
    #[serde(default)]
    pub fly_to_wayline_mode: Option<String>,
    #[serde(default, rename = "exitOnRCLost")]
    pub exit_on_rc_lost: Option<String>,
    #[serde(default, rename = "executeRCLostAction")]
    pub execute_rc_lost_action: Option<String>,
    #[serde(default)]
    pub waypoints: Vec<WaylinesWaypoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaylinesWaypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    /// Overrides the global speed when present.
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_param: Option<f64>,
    #[serde(default)]
    pub turn_mode: Option<TurnMode>,
    #[serde(default)]
    pub turn_damping_dist: Option<f64>,
    #[serde(default)]
    pub heading_mode: Option<String>,
    #[serde(default)]
    pub heading_angle: Option<f64>,
    #[serde(default)]
    pub gimbal_pitch_angle: Option<f64>,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
}

impl WaylinesWaypoint {
    pub fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self {
            latitude,
            longitude,
            height,
            speed: None,
            trigger_type: TriggerType::ReachPoint,
            trigger_param: None,
            turn_mode: None,
            turn_damping_dist: None,
            heading_mode: None,
            heading_angle: None,
            gimbal_pitch_angle: None,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<ActionRequest>) -> Self {
        self.actions.push(action.into());
        self
    }
}

impl Waylines {
    pub fn new(
        name: impl Into<String>,
        drone_model: DroneModel,
        payload_model: PayloadModel,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            drone_model,
            payload_model,
            template_type: TemplateType::Waypoint,
            height_mode: None,
            global_height: None,
            global_speed: None,
            global_rth_height: None,
            take_off_security_height: None,
            global_transitional_speed: None,
            turn_mode: None,
            use_straight_line: None,
            heading_mode: None,
            gimbal_pitch_mode: None,
            take_off_ref_point: None,
            finish_action: None,
            fly_to_wayline_mode: None,
            exit_on_rc_lost: None,
            execute_rc_lost_action: None,
            waypoints: Vec::new(),
        }
    }

    pub fn with_waypoint(mut self, waypoint: WaylinesWaypoint) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    /// Decode a Waylines JSON document. Unknown enum values and wrong field
    /// types are reported as [`ValidationError::Malformed`].
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Fill unset optional globals. Run before validation.
    ///
    /// The take-off security height, RTH height and transitional speed are
    /// left alone: their fallbacks depend on each other and are resolved
    /// during conversion.
    pub fn apply_defaults(&mut self) {
        self.height_mode.get_or_insert(HeightMode::RelativeToStartPoint);
        self.global_height.get_or_insert(DEFAULT_GLOBAL_HEIGHT);
        self.global_speed.get_or_insert(DEFAULT_GLOBAL_SPEED);
        self.turn_mode.get_or_insert(DEFAULT_TURN_MODE);
        self.use_straight_line.get_or_insert(true);
        self.heading_mode
            .get_or_insert_with(|| DEFAULT_HEADING_MODE.to_string());
        self.gimbal_pitch_mode
            .get_or_insert_with(|| DEFAULT_GIMBAL_PITCH_MODE.to_string());
        self.finish_action
            .get_or_insert_with(|| DEFAULT_FINISH_ACTION.to_string());
        self.fly_to_wayline_mode
            .get_or_insert_with(|| DEFAULT_FLY_TO_WAYLINE_MODE.to_string());
        self.exit_on_rc_lost
            .get_or_insert_with(|| DEFAULT_EXIT_ON_RC_LOST.to_string());
        if self.exit_on_rc_lost.as_deref() == Some(DEFAULT_EXIT_ON_RC_LOST) {
            self.execute_rc_lost_action
                .get_or_insert_with(|| DEFAULT_EXECUTE_RC_LOST_ACTION.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, HoverAction};

    #[test]
    fn test_from_json_minimal() {
        let json = r#"{
            "name": "T",
            "droneModel": "M3DSeries",
            "payloadModel": "Matrice3TD",
            "waypoints": [{"latitude": 39.9042, "longitude": 116.4074, "height": 50}]
        }"#;
        let w = Waylines::from_json(json).unwrap();
        assert_eq!(w.drone_model, DroneModel::M3DSeries);
        assert_eq!(w.payload_model, PayloadModel::Matrice3TD);
        assert_eq!(w.template_type, TemplateType::Waypoint);
        assert_eq!(w.waypoints[0].trigger_type, TriggerType::ReachPoint);
        assert!(w.global_rth_height.is_none());
    }

    #[test]
    fn test_from_json_rth_field_name() {
        let json = r#"{"name": "T", "droneModel": "M30Series", "payloadModel": "Matrice30T",
            "globalRTHHeight": 80, "exitOnRCLost": "goContinue"}"#;
        let w = Waylines::from_json(json).unwrap();
        assert_eq!(w.global_rth_height, Some(80.0));
        assert_eq!(w.exit_on_rc_lost.as_deref(), Some("goContinue"));
    }

    #[test]
    fn test_from_json_unknown_drone() {
        let json = r#"{"name": "T", "droneModel": "Phantom4", "payloadModel": "H20"}"#;
        assert!(matches!(
            Waylines::from_json(json),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_apply_defaults_fills_unset_only() {
        let mut w = Waylines::new("T", DroneModel::M3Series, PayloadModel::Mavic3E);
        w.global_speed = Some(5.0);
        w.apply_defaults();
        assert_eq!(w.height_mode, Some(HeightMode::RelativeToStartPoint));
        assert_eq!(w.global_speed, Some(5.0));
        assert_eq!(w.global_height, Some(DEFAULT_GLOBAL_HEIGHT));
        assert_eq!(w.execute_rc_lost_action.as_deref(), Some("goBack"));
        assert_eq!(w.global_rth_height, None);
        assert_eq!(w.take_off_security_height, None);
    }

    #[test]
    fn test_no_rc_lost_action_when_continuing() {
        let mut w = Waylines::new("T", DroneModel::M3Series, PayloadModel::Mavic3E);
        w.exit_on_rc_lost = Some("goContinue".into());
        w.apply_defaults();
        assert_eq!(w.execute_rc_lost_action, None);
    }

    #[test]
    fn test_waypoint_builder() {
        let wp = WaylinesWaypoint::new(1.0, 2.0, 3.0)
            .with_action(Action::Hover(HoverAction { hover_time: 2.0 }));
        assert_eq!(wp.actions.len(), 1);
        assert_eq!(wp.actions[0].action_type, "hover");
    }

    #[test]
    fn test_payload_fits_drone() {
        assert!(PayloadModel::Matrice3TD.fits(DroneModel::M3DSeries));
        assert!(!PayloadModel::Matrice3TD.fits(DroneModel::M3Series));
        assert!(PayloadModel::H30T.fits(DroneModel::M350RTK));
        assert_eq!(PayloadModel::Mavic3M.drone_sub_enum_value(), 2);
    }
}
