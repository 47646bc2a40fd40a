use std::collections::BTreeMap;

use serde::Serialize;

/// Default (core) namespace of both WPML documents.
pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
/// Namespace bound to the `wpml:` prefix.
pub const WPML_NAMESPACE: &str = "http://www.dji.com/wpmz/1.0.6";

/// A complete WPML mission: the template and waylines documents plus any
/// resource files found next to them in a KMZ archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WpmlMission {
    pub template: Option<TemplateDocument>,
    pub waylines: Option<WaylinesDocument>,
    #[serde(skip)]
    pub resources: BTreeMap<String, Vec<u8>>,
}

impl WpmlMission {
    pub fn new(template: TemplateDocument, waylines: WaylinesDocument) -> Self {
        Self {
            template: Some(template),
            waylines: Some(waylines),
            resources: BTreeMap::new(),
        }
    }

    pub fn add_resource(&mut self, name: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.resources.insert(name.into(), data);
        self
    }

    /// Replace the mission config of both documents.
    pub fn set_mission_config(&mut self, config: MissionConfig) -> &mut Self {
        if let Some(waylines) = &mut self.waylines {
            waylines.mission_config = config.clone();
        }
        if let Some(template) = &mut self.template {
            template.mission_config = config;
        }
        self
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> &mut Self {
        if let Some(template) = &mut self.template {
            template.author = Some(author.into());
        }
        self
    }

    pub fn mission_config(&self) -> Option<&MissionConfig> {
        self.template
            .as_ref()
            .map(|t| &t.mission_config)
            .or_else(|| self.waylines.as_ref().map(|w| &w.mission_config))
    }

    pub fn author(&self) -> Option<&str> {
        self.template.as_ref().and_then(|t| t.author.as_deref())
    }
}

/// `template.kml`: the editable description of the mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub xmlns: Option<String>,
    pub xmlns_wpml: Option<String>,
    pub author: Option<String>,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
    pub mission_config: MissionConfig,
    pub folders: Vec<TemplateFolder>,
}

/// `waylines.wpml`: the flight path the aircraft executes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaylinesDocument {
    pub xmlns: Option<String>,
    pub xmlns_wpml: Option<String>,
    pub author: Option<String>,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
    pub mission_config: MissionConfig,
    pub folders: Vec<WaylineFolder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionConfig {
    pub fly_to_wayline_mode: String,
    pub finish_action: String,
    pub exit_on_rc_lost: String,
    pub execute_rc_lost_action: Option<String>,
    pub take_off_security_height: f64,
    /// `"lat,lon,height"`
    pub take_off_ref_point: Option<String>,
    pub take_off_ref_point_agl_height: Option<f64>,
    pub global_transitional_speed: f64,
    pub global_rth_height: f64,
    pub drone_info: DroneInfo,
    pub payload_info: Option<PayloadInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneInfo {
    pub drone_enum_value: i32,
    pub drone_sub_enum_value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadInfo {
    pub payload_enum_value: i32,
    pub payload_sub_enum_value: i32,
    pub payload_position_index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateSysParam {
    pub coordinate_mode: String,
    pub height_mode: String,
}

/// `<Folder>` of a waypoint template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFolder {
    pub template_type: String,
    pub template_id: i32,
    pub wayline_coordinate_sys_param: CoordinateSysParam,
    pub auto_flight_speed: f64,
    pub global_height: Option<f64>,
    pub cali_flight_enable: Option<i32>,
    pub gimbal_pitch_mode: Option<String>,
    pub global_waypoint_heading_param: Option<HeadingParam>,
    pub global_waypoint_turn_mode: Option<String>,
    pub global_use_straight_line: Option<i32>,
    pub placemarks: Vec<TemplatePlacemark>,
    pub payload_param: Option<PayloadParam>,
}

/// `<Folder>` of an executable wayline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaylineFolder {
    pub template_id: i32,
    pub execute_height_mode: String,
    pub wayline_id: i32,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub auto_flight_speed: f64,
    pub placemarks: Vec<WaylinePlacemark>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadParam {
    pub payload_position_index: i32,
    pub focus_mode: Option<String>,
    pub metering_mode: Option<String>,
    pub image_format: Option<String>,
}

/// Waypoint as edited in the template: carries the `useGlobal*` switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePlacemark {
    /// `"lon,lat"`
    pub coordinates: String,
    pub index: i32,
    pub ellipsoid_height: Option<f64>,
    pub height: Option<f64>,
    pub use_global_height: Option<i32>,
    pub use_global_speed: Option<i32>,
    pub waypoint_speed: Option<f64>,
    pub use_global_heading_param: Option<i32>,
    pub waypoint_heading_param: Option<HeadingParam>,
    pub use_global_turn_param: Option<i32>,
    pub waypoint_turn_param: Option<TurnParam>,
    pub use_straight_line: Option<i32>,
    pub gimbal_pitch_angle: Option<f64>,
    pub action_groups: Vec<ActionGroup>,
}

/// Waypoint as executed: every value resolved, no `useGlobal*` switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaylinePlacemark {
    /// `"lon,lat"`
    pub coordinates: String,
    pub index: i32,
    pub execute_height: f64,
    pub waypoint_speed: f64,
    pub waypoint_heading_param: HeadingParam,
    pub waypoint_turn_param: TurnParam,
    pub use_straight_line: Option<i32>,
    pub action_groups: Vec<ActionGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingParam {
    pub waypoint_heading_mode: String,
    pub waypoint_heading_angle: Option<f64>,
    pub waypoint_poi_point: Option<String>,
    pub waypoint_heading_angle_enable: Option<i32>,
    pub waypoint_heading_path_mode: Option<String>,
    pub waypoint_heading_poi_index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnParam {
    pub waypoint_turn_mode: String,
    pub waypoint_turn_damping_dist: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroup {
    pub action_group_id: i32,
    pub action_group_start_index: i32,
    pub action_group_end_index: i32,
    pub action_group_mode: String,
    pub action_trigger: ActionTrigger,
    pub actions: Vec<WpmlAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTrigger {
    pub action_trigger_type: String,
    pub action_trigger_param: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WpmlAction {
    pub action_id: i32,
    pub action_actuator_func: String,
    pub action_actuator_func_param: ActuatorFuncParam,
}

/// Parameters of every actuator function in one record. Each action fills
/// only its own slots; absent slots are not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorFuncParam {
    pub payload_position_index: Option<i32>,
    pub file_suffix: Option<String>,
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: Option<i32>,
    pub is_point_focus: Option<i32>,
    pub focus_x: Option<f64>,
    pub focus_y: Option<f64>,
    pub focus_region_width: Option<f64>,
    pub focus_region_height: Option<f64>,
    pub is_infinite_focus: Option<i32>,
    pub focal_length: Option<f64>,
    pub directory_name: Option<String>,
    pub gimbal_heading_yaw_base: Option<String>,
    pub gimbal_rotate_mode: Option<String>,
    pub gimbal_pitch_rotate_enable: Option<i32>,
    pub gimbal_pitch_rotate_angle: Option<f64>,
    pub gimbal_roll_rotate_enable: Option<i32>,
    pub gimbal_roll_rotate_angle: Option<f64>,
    pub gimbal_yaw_rotate_enable: Option<i32>,
    pub gimbal_yaw_rotate_angle: Option<f64>,
    pub gimbal_rotate_time_enable: Option<i32>,
    pub gimbal_rotate_time: Option<f64>,
    pub aircraft_heading: Option<f64>,
    pub aircraft_path_mode: Option<String>,
    pub hover_time: Option<f64>,
    pub accurate_frame_valid: Option<i32>,
    pub target_angle: Option<f64>,
    pub action_uuid: Option<String>,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub af_pos: Option<i32>,
    pub gimbal_port: Option<i32>,
    pub oriented_camera_type: Option<i32>,
    pub oriented_file_path: Option<String>,
    pub oriented_file_md5: Option<String>,
    pub oriented_file_size: Option<i64>,
    pub oriented_file_suffix: Option<String>,
    pub oriented_photo_mode: Option<String>,
    pub accurate_camera_type: Option<i32>,
    pub accurate_file_path: Option<String>,
    pub accurate_file_md5: Option<String>,
    pub accurate_file_size: Option<i64>,
    pub accurate_file_suffix: Option<String>,
    pub pano_shot_sub_mode: Option<String>,
    pub record_point_cloud_operate: Option<String>,
    pub smart_oblique_cycle_mode: Option<String>,
    pub min_shoot_interval: Option<f64>,
    pub camera_focus_type: Option<String>,
}

/// General coordinate pair used by the converter: shortest round-trip
/// decimal for each value.
pub fn format_coordinates(longitude: f64, latitude: f64) -> String {
    format!("{longitude},{latitude}")
}

/// Fixed 15-decimal coordinate pair used when placemarks are built by hand.
pub fn format_coordinates_fixed(longitude: f64, latitude: f64) -> String {
    format!("{longitude:.15},{latitude:.15}")
}

/// Turn modes for which `useStraightLine` is meaningful. For any other turn
/// mode the element is left out.
pub fn uses_straight_line(turn_mode: &str) -> bool {
    matches!(
        turn_mode,
        "coordinateTurn"
            | "toPointAndStopWithDiscontinuityCurvature"
            | "toPointAndStopWithContinuityCurvature"
            | "toPointAndPassWithContinuityCurvature"
    )
}

impl TemplatePlacemark {
    /// Build a template placemark flying at its own height with the global
    /// speed, heading and turn settings.
    pub fn waypoint(index: i32, longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            coordinates: format_coordinates_fixed(longitude, latitude),
            index,
            ellipsoid_height: Some(height),
            height: Some(height),
            use_global_height: Some(0),
            use_global_speed: Some(1),
            use_global_heading_param: Some(1),
            use_global_turn_param: Some(1),
            ..Default::default()
        }
    }

    /// Switch the placemark to its own turn mode. `useStraightLine` is set
    /// only for turn modes that honor it.
    pub fn with_turn_mode(
        mut self,
        turn_mode: &str,
        damping_dist: Option<f64>,
        straight: bool,
    ) -> Self {
        self.use_global_turn_param = Some(0);
        self.waypoint_turn_param = Some(TurnParam {
            waypoint_turn_mode: turn_mode.to_string(),
            waypoint_turn_damping_dist: damping_dist,
        });
        self.use_straight_line = uses_straight_line(turn_mode).then_some(i32::from(straight));
        self
    }
}

impl WaylinePlacemark {
    pub fn waypoint(
        index: i32,
        longitude: f64,
        latitude: f64,
        execute_height: f64,
        speed: f64,
    ) -> Self {
        Self {
            coordinates: format_coordinates_fixed(longitude, latitude),
            index,
            execute_height,
            waypoint_speed: speed,
            waypoint_heading_param: HeadingParam {
                waypoint_heading_mode: "followWayline".to_string(),
                ..Default::default()
            },
            waypoint_turn_param: TurnParam {
                waypoint_turn_mode: "toPointAndStopWithDiscontinuityCurvature".to_string(),
                waypoint_turn_damping_dist: Some(0.0),
            },
            use_straight_line: Some(1),
            action_groups: Vec::new(),
        }
    }
}

/// Parse a `"lon,lat[,alt]"` coordinate string.
pub fn parse_coordinates(coordinates: &str) -> Option<(f64, f64)> {
    let mut parts = coordinates.trim().split(',');
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    Some((lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_coordinates() {
        assert_eq!(format_coordinates(116.4074, 39.9042), "116.4074,39.9042");
        assert_eq!(format_coordinates(116.0, -39.5), "116,-39.5");
    }

    #[test]
    fn test_fixed_coordinates() {
        assert_eq!(
            format_coordinates_fixed(116.5, 39.25),
            "116.500000000000000,39.250000000000000"
        );
    }

    #[test]
    fn test_parse_coordinates() {
        let (lon, lat) = parse_coordinates("\n  116.4074,39.9042\n").unwrap();
        assert!((lon - 116.4074).abs() < 1e-12);
        assert!((lat - 39.9042).abs() < 1e-12);
        assert!(parse_coordinates("garbage").is_none());
    }

    #[test]
    fn test_straight_line_only_for_known_turn_modes() {
        let p = TemplatePlacemark::waypoint(0, 1.0, 2.0, 50.0)
            .with_turn_mode("coordinateTurn", Some(0.2), false);
        assert_eq!(p.use_straight_line, Some(0));

        let p = TemplatePlacemark::waypoint(0, 1.0, 2.0, 50.0).with_turn_mode("spiral", None, true);
        assert_eq!(p.use_straight_line, None);
        assert_eq!(p.use_global_turn_param, Some(0));
    }

    #[test]
    fn test_builder_ops() {
        let mut mission =
            WpmlMission::new(TemplateDocument::default(), WaylinesDocument::default());
        let config = MissionConfig {
            global_rth_height: 80.0,
            ..Default::default()
        };
        mission
            .set_mission_config(config.clone())
            .set_author("ops")
            .add_resource("a.png", vec![1, 2, 3]);

        assert_eq!(mission.mission_config(), Some(&config));
        assert_eq!(mission.waylines.as_ref().unwrap().mission_config, config);
        assert_eq!(mission.author(), Some("ops"));
        assert_eq!(mission.resources["a.png"], vec![1, 2, 3]);
    }
}
