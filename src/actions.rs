//! Mission actions.
//!
//! Every action a waypoint can trigger is one variant of [`Action`]. The
//! registry maps the wire tag (`"takePhoto"`, `"hover"`, ...) to a variant and
//! back, and [`Action::actuator_param`] flattens a variant onto the single wide
//! [`ActuatorFuncParam`] record that WPML uses for every actuator function.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{ActionError, ValidationError};
use crate::validator::{
    check_lens_index, check_one_of, check_position_index, check_positive, check_range,
};
use crate::wpml_types::ActuatorFuncParam;

macro_rules! action_registry {
    ($($variant:ident($ty:ident) => $tag:literal,)+) => {
        /// Closed set of mission actions, one variant per actuator function.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Action {
            $($variant($ty),)+
        }

        impl Action {
            /// Every registered type tag, in registry order.
            pub const TAGS: &'static [&'static str] = &[$($tag,)+];

            /// Construct the empty variant registered under `tag`.
            pub fn empty(tag: &str) -> Result<Self, ActionError> {
                match tag {
                    $($tag => Ok(Self::$variant($ty::default())),)+
                    other => Err(ActionError::UnsupportedActionType(other.to_string())),
                }
            }

            /// The variant's own type tag, which is also its actuator function name.
            pub fn action_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $tag,)+
                }
            }

            /// Decode the `params` object of a tagged action into the variant
            /// registered under `tag`. Missing fields keep their empty defaults.
            pub fn decode(tag: &str, params: JsonValue) -> Result<Self, ActionError> {
                let params = if params.is_null() {
                    JsonValue::Object(serde_json::Map::new())
                } else {
                    params
                };
                let invalid = |e: serde_json::Error| ActionError::InvalidParams {
                    tag: tag.to_string(),
                    message: e.to_string(),
                };
                match tag {
                    $($tag => serde_json::from_value::<$ty>(params)
                        .map(Self::$variant)
                        .map_err(invalid),)+
                    other => Err(ActionError::UnsupportedActionType(other.to_string())),
                }
            }

            /// Encode the variant's fields as the `params` object.
            pub fn params(&self) -> serde_json::Result<JsonValue> {
                match self {
                    $(Self::$variant(a) => serde_json::to_value(a),)+
                }
            }
        }
    };
}

action_registry! {
    TakePhoto(TakePhotoAction) => "takePhoto",
    StartRecord(StartRecordAction) => "startRecord",
    StopRecord(StopRecordAction) => "stopRecord",
    Focus(FocusAction) => "focus",
    Zoom(ZoomAction) => "zoom",
    CustomDirName(CustomDirNameAction) => "customDirName",
    GimbalRotate(GimbalRotateAction) => "gimbalRotate",
    RotateYaw(RotateYawAction) => "rotateYaw",
    Hover(HoverAction) => "hover",
    GimbalEvenlyRotate(GimbalEvenlyRotateAction) => "gimbalEvenlyRotate",
    OrientedShoot(OrientedShootAction) => "orientedShoot",
    PanoShot(PanoShotAction) => "panoShot",
    RecordPointCloud(RecordPointCloudAction) => "recordPointCloud",
    AccurateShoot(AccurateShootAction) => "accurateShoot",
    GimbalAngleLock(GimbalAngleLockAction) => "gimbalAngleLock",
    GimbalAngleUnlock(GimbalAngleUnlockAction) => "gimbalAngleUnlock",
    StartSmartOblique(StartSmartObliqueAction) => "startSmartOblique",
    StartTimeLapse(StartTimeLapseAction) => "startTimeLapse",
    StopTimeLapse(StopTimeLapseAction) => "stopTimeLapse",
    SetFocusType(SetFocusTypeAction) => "setFocusType",
    TargetDetection(TargetDetectionAction) => "targetDetection",
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TakePhotoAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StartRecordAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StopRecordAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
}

/// Focus on a point or a region given in normalized frame coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FocusAction {
    pub payload_position_index: i32,
    pub is_point_focus: bool,
    pub focus_x: f64,
    pub focus_y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_region_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_region_height: Option<f64>,
    pub is_infinite_focus: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoomAction {
    pub payload_position_index: i32,
    /// Equivalent focal length in millimeters.
    pub focal_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomDirNameAction {
    pub payload_position_index: i32,
    pub directory_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GimbalRotateAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_heading_yaw_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_rotate_mode: Option<String>,
    pub gimbal_pitch_rotate_enable: bool,
    pub gimbal_pitch_rotate_angle: f64,
    pub gimbal_roll_rotate_enable: bool,
    pub gimbal_roll_rotate_angle: f64,
    pub gimbal_yaw_rotate_enable: bool,
    pub gimbal_yaw_rotate_angle: f64,
    pub gimbal_rotate_time_enable: bool,
    pub gimbal_rotate_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RotateYawAction {
    pub aircraft_heading: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_path_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HoverAction {
    /// Seconds.
    pub hover_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GimbalEvenlyRotateAction {
    pub payload_position_index: i32,
    pub gimbal_pitch_rotate_angle: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_roll_rotate_angle: Option<f64>,
}

/// Shoot at a target framed on a previous flight. Frame coordinates are pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OrientedShootAction {
    pub payload_position_index: i32,
    pub gimbal_pitch_rotate_angle: f64,
    pub gimbal_roll_rotate_angle: f64,
    pub gimbal_yaw_rotate_angle: f64,
    pub focus_x: f64,
    pub focus_y: f64,
    pub focus_region_width: f64,
    pub focus_region_height: f64,
    pub focal_length: f64,
    pub aircraft_heading: f64,
    pub accurate_frame_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_angle: Option<f64>,
    #[serde(rename = "actionUUID", skip_serializing_if = "Option::is_none")]
    pub action_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<i32>,
    #[serde(rename = "AFPos", skip_serializing_if = "Option::is_none")]
    pub af_pos: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oriented_camera_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oriented_file_path: Option<String>,
    #[serde(rename = "orientedFileMD5", skip_serializing_if = "Option::is_none")]
    pub oriented_file_md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oriented_file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oriented_file_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oriented_photo_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PanoShotAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pano_shot_sub_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordPointCloudAction {
    pub payload_position_index: i32,
    pub record_point_cloud_operate: String,
}

/// Precise re-shoot of a recorded frame. Shares its geometry with
/// [`OrientedShootAction`] but references the reference frame through the
/// `accurate*` file fields, which the aircraft dispatches on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AccurateShootAction {
    pub payload_position_index: i32,
    pub gimbal_pitch_rotate_angle: f64,
    pub gimbal_roll_rotate_angle: f64,
    pub gimbal_yaw_rotate_angle: f64,
    pub focus_x: f64,
    pub focus_y: f64,
    pub focus_region_width: f64,
    pub focus_region_height: f64,
    pub focal_length: f64,
    pub aircraft_heading: f64,
    pub accurate_frame_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<i32>,
    #[serde(rename = "AFPos", skip_serializing_if = "Option::is_none")]
    pub af_pos: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gimbal_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accurate_camera_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accurate_file_path: Option<String>,
    #[serde(rename = "accurateFileMD5", skip_serializing_if = "Option::is_none")]
    pub accurate_file_md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accurate_file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accurate_file_suffix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GimbalAngleLockAction {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GimbalAngleUnlockAction {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StartSmartObliqueAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_oblique_cycle_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StartTimeLapseAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
    /// Seconds between shots.
    pub min_shoot_interval: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StopTimeLapseAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SetFocusTypeAction {
    pub payload_position_index: i32,
    pub camera_focus_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetDetectionAction {
    pub payload_position_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_lens_index: Option<String>,
    pub use_global_payload_lens_index: bool,
}

const GIMBAL_HEADING_YAW_BASES: &[&str] = &["north", "aircraft"];
const GIMBAL_ROTATE_MODES: &[&str] = &["absoluteAngle", "relativeAngle"];
const AIRCRAFT_PATH_MODES: &[&str] = &["clockwise", "counterClockwise"];
const PANO_SHOT_SUB_MODES: &[&str] = &["panoShot_360"];
const POINT_CLOUD_OPERATES: &[&str] = &["startRecord", "stopRecord", "pauseRecord", "resumeRecord"];
const ORIENTED_PHOTO_MODES: &[&str] = &["normalPhoto", "lowLightSmartShooting"];
const SMART_OBLIQUE_CYCLE_MODES: &[&str] = &["unlimited", "limited"];
const CAMERA_FOCUS_TYPES: &[&str] = &["manual", "auto"];

fn flag(b: bool) -> i32 {
    i32::from(b)
}

fn field(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

impl Action {
    /// Map the variant onto the wide actuator parameter record. Only the slots
    /// belonging to this variant are populated.
    pub fn actuator_param(&self) -> ActuatorFuncParam {
        let mut p = ActuatorFuncParam::default();
        match self {
            Action::TakePhoto(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.file_suffix = a.file_suffix.clone();
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
            }
            Action::StartRecord(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.file_suffix = a.file_suffix.clone();
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
            }
            Action::StopRecord(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
            }
            Action::Focus(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.is_point_focus = Some(flag(a.is_point_focus));
                p.focus_x = Some(a.focus_x);
                p.focus_y = Some(a.focus_y);
                p.focus_region_width = a.focus_region_width;
                p.focus_region_height = a.focus_region_height;
                p.is_infinite_focus = Some(flag(a.is_infinite_focus));
            }
            Action::Zoom(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.focal_length = Some(a.focal_length);
            }
            Action::CustomDirName(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.directory_name = Some(a.directory_name.clone());
            }
            Action::GimbalRotate(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.gimbal_heading_yaw_base =
                    Some(a.gimbal_heading_yaw_base.clone().unwrap_or_else(|| "north".into()));
                p.gimbal_rotate_mode =
                    Some(a.gimbal_rotate_mode.clone().unwrap_or_else(|| "absoluteAngle".into()));
                p.gimbal_pitch_rotate_enable = Some(flag(a.gimbal_pitch_rotate_enable));
                p.gimbal_pitch_rotate_angle = Some(a.gimbal_pitch_rotate_angle);
                p.gimbal_roll_rotate_enable = Some(flag(a.gimbal_roll_rotate_enable));
                p.gimbal_roll_rotate_angle = Some(a.gimbal_roll_rotate_angle);
                p.gimbal_yaw_rotate_enable = Some(flag(a.gimbal_yaw_rotate_enable));
                p.gimbal_yaw_rotate_angle = Some(a.gimbal_yaw_rotate_angle);
                p.gimbal_rotate_time_enable = Some(flag(a.gimbal_rotate_time_enable));
                p.gimbal_rotate_time = Some(a.gimbal_rotate_time);
            }
            Action::RotateYaw(a) => {
                p.aircraft_heading = Some(a.aircraft_heading);
                p.aircraft_path_mode =
                    Some(a.aircraft_path_mode.clone().unwrap_or_else(|| "clockwise".into()));
            }
            Action::Hover(a) => {
                p.hover_time = Some(a.hover_time);
            }
            Action::GimbalEvenlyRotate(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.gimbal_pitch_rotate_angle = Some(a.gimbal_pitch_rotate_angle);
                p.gimbal_roll_rotate_angle = a.gimbal_roll_rotate_angle;
            }
            Action::OrientedShoot(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.gimbal_pitch_rotate_angle = Some(a.gimbal_pitch_rotate_angle);
                p.gimbal_roll_rotate_angle = Some(a.gimbal_roll_rotate_angle);
                p.gimbal_yaw_rotate_angle = Some(a.gimbal_yaw_rotate_angle);
                p.focus_x = Some(a.focus_x);
                p.focus_y = Some(a.focus_y);
                p.focus_region_width = Some(a.focus_region_width);
                p.focus_region_height = Some(a.focus_region_height);
                p.focal_length = Some(a.focal_length);
                p.aircraft_heading = Some(a.aircraft_heading);
                p.accurate_frame_valid = Some(flag(a.accurate_frame_valid));
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
                p.target_angle = a.target_angle;
                p.action_uuid = a.action_uuid.clone();
                p.image_width = a.image_width;
                p.image_height = a.image_height;
                p.af_pos = a.af_pos;
                p.gimbal_port = a.gimbal_port;
                p.oriented_camera_type = a.oriented_camera_type;
                p.oriented_file_path = a.oriented_file_path.clone();
                p.oriented_file_md5 = a.oriented_file_md5.clone();
                p.oriented_file_size = a.oriented_file_size;
                p.oriented_file_suffix = a.oriented_file_suffix.clone();
                p.oriented_photo_mode = a.oriented_photo_mode.clone();
            }
            Action::PanoShot(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
                p.pano_shot_sub_mode =
                    Some(a.pano_shot_sub_mode.clone().unwrap_or_else(|| "panoShot_360".into()));
            }
            Action::RecordPointCloud(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.record_point_cloud_operate = Some(a.record_point_cloud_operate.clone());
            }
            Action::AccurateShoot(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.gimbal_pitch_rotate_angle = Some(a.gimbal_pitch_rotate_angle);
                p.gimbal_roll_rotate_angle = Some(a.gimbal_roll_rotate_angle);
                p.gimbal_yaw_rotate_angle = Some(a.gimbal_yaw_rotate_angle);
                p.focus_x = Some(a.focus_x);
                p.focus_y = Some(a.focus_y);
                p.focus_region_width = Some(a.focus_region_width);
                p.focus_region_height = Some(a.focus_region_height);
                p.focal_length = Some(a.focal_length);
                p.aircraft_heading = Some(a.aircraft_heading);
                p.accurate_frame_valid = Some(flag(a.accurate_frame_valid));
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
                p.target_angle = a.target_angle;
                p.image_width = a.image_width;
                p.image_height = a.image_height;
                p.af_pos = a.af_pos;
                p.gimbal_port = a.gimbal_port;
                p.accurate_camera_type = a.accurate_camera_type;
                p.accurate_file_path = a.accurate_file_path.clone();
                p.accurate_file_md5 = a.accurate_file_md5.clone();
                p.accurate_file_size = a.accurate_file_size;
                p.accurate_file_suffix = a.accurate_file_suffix.clone();
            }
            Action::GimbalAngleLock(_) | Action::GimbalAngleUnlock(_) => {}
            Action::StartSmartOblique(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
                p.smart_oblique_cycle_mode = a.smart_oblique_cycle_mode.clone();
            }
            Action::StartTimeLapse(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
                p.min_shoot_interval = Some(a.min_shoot_interval);
            }
            Action::StopTimeLapse(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
            }
            Action::SetFocusType(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.camera_focus_type = Some(a.camera_focus_type.clone());
            }
            Action::TargetDetection(a) => {
                p.payload_position_index = Some(a.payload_position_index);
                p.payload_lens_index = a.payload_lens_index.clone();
                p.use_global_payload_lens_index = Some(flag(a.use_global_payload_lens_index));
            }
        }
        p
    }

    /// Lens selection of actions that capture media, if the action has one.
    pub fn lens_selection(&self) -> Option<(Option<&str>, bool)> {
        match self {
            Action::TakePhoto(a) => {
                Some((a.payload_lens_index.as_deref(), a.use_global_payload_lens_index))
            }
            Action::StartRecord(a) => {
                Some((a.payload_lens_index.as_deref(), a.use_global_payload_lens_index))
            }
            _ => None,
        }
    }

    /// Check the variant's field-level constraints. `path` prefixes the
    /// reported field names.
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        let ppi = |v: i32| check_position_index(&field(path, "payloadPositionIndex"), v);
        let lens = |v: &Option<String>| match v {
            Some(l) => check_lens_index(&field(path, "payloadLensIndex"), l),
            None => Ok(()),
        };
        let angle = |name: &str, v: f64| {
            check_range(&field(path, name), v, -180.0, 180.0, "gte=-180,lte=180")
        };

        match self {
            Action::TakePhoto(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
            }
            Action::StartRecord(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
            }
            Action::StopRecord(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
            }
            Action::Focus(a) => {
                ppi(a.payload_position_index)?;
                check_range(&field(path, "focusX"), a.focus_x, 0.0, 1.0, "gte=0,lte=1")?;
                check_range(&field(path, "focusY"), a.focus_y, 0.0, 1.0, "gte=0,lte=1")?;
                if !a.is_point_focus {
                    let width = a.focus_region_width.ok_or_else(|| ValidationError::Required {
                        field: field(path, "focusRegionWidth"),
                    })?;
                    let height = a.focus_region_height.ok_or_else(|| ValidationError::Required {
                        field: field(path, "focusRegionHeight"),
                    })?;
                    check_positive(&field(path, "focusRegionWidth"), width)?;
                    check_positive(&field(path, "focusRegionHeight"), height)?;
                    check_range(&field(path, "focusRegionWidth"), width, 0.0, 1.0, "gt=0,lte=1")?;
                    check_range(&field(path, "focusRegionHeight"), height, 0.0, 1.0, "gt=0,lte=1")?;
                }
            }
            Action::Zoom(a) => {
                ppi(a.payload_position_index)?;
                check_positive(&field(path, "focalLength"), a.focal_length)?;
            }
            Action::CustomDirName(a) => {
                ppi(a.payload_position_index)?;
                if a.directory_name.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: field(path, "directoryName"),
                    });
                }
            }
            Action::GimbalRotate(a) => {
                ppi(a.payload_position_index)?;
                if let Some(base) = &a.gimbal_heading_yaw_base {
                    check_one_of(
                        &field(path, "gimbalHeadingYawBase"),
                        base,
                        GIMBAL_HEADING_YAW_BASES,
                    )?;
                }
                if let Some(mode) = &a.gimbal_rotate_mode {
                    check_one_of(&field(path, "gimbalRotateMode"), mode, GIMBAL_ROTATE_MODES)?;
                }
                angle("gimbalPitchRotateAngle", a.gimbal_pitch_rotate_angle)?;
                angle("gimbalRollRotateAngle", a.gimbal_roll_rotate_angle)?;
                angle("gimbalYawRotateAngle", a.gimbal_yaw_rotate_angle)?;
                if a.gimbal_rotate_time_enable {
                    check_range(
                        &field(path, "gimbalRotateTime"),
                        a.gimbal_rotate_time,
                        0.0,
                        100.0,
                        "gte=0,lte=100",
                    )?;
                }
            }
            Action::RotateYaw(a) => {
                angle("aircraftHeading", a.aircraft_heading)?;
                if let Some(mode) = &a.aircraft_path_mode {
                    check_one_of(&field(path, "aircraftPathMode"), mode, AIRCRAFT_PATH_MODES)?;
                }
            }
            Action::Hover(a) => {
                check_positive(&field(path, "hoverTime"), a.hover_time)?;
            }
            Action::GimbalEvenlyRotate(a) => {
                ppi(a.payload_position_index)?;
                angle("gimbalPitchRotateAngle", a.gimbal_pitch_rotate_angle)?;
                if let Some(roll) = a.gimbal_roll_rotate_angle {
                    angle("gimbalRollRotateAngle", roll)?;
                }
            }
            Action::OrientedShoot(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
                angle("gimbalPitchRotateAngle", a.gimbal_pitch_rotate_angle)?;
                angle("gimbalRollRotateAngle", a.gimbal_roll_rotate_angle)?;
                angle("gimbalYawRotateAngle", a.gimbal_yaw_rotate_angle)?;
                angle("aircraftHeading", a.aircraft_heading)?;
                check_positive(&field(path, "focalLength"), a.focal_length)?;
                if let Some(mode) = &a.oriented_photo_mode {
                    check_one_of(&field(path, "orientedPhotoMode"), mode, ORIENTED_PHOTO_MODES)?;
                }
            }
            Action::PanoShot(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
                if let Some(mode) = &a.pano_shot_sub_mode {
                    check_one_of(&field(path, "panoShotSubMode"), mode, PANO_SHOT_SUB_MODES)?;
                }
            }
            Action::RecordPointCloud(a) => {
                ppi(a.payload_position_index)?;
                check_one_of(
                    &field(path, "recordPointCloudOperate"),
                    &a.record_point_cloud_operate,
                    POINT_CLOUD_OPERATES,
                )?;
            }
            Action::AccurateShoot(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
                angle("gimbalPitchRotateAngle", a.gimbal_pitch_rotate_angle)?;
                angle("gimbalRollRotateAngle", a.gimbal_roll_rotate_angle)?;
                angle("gimbalYawRotateAngle", a.gimbal_yaw_rotate_angle)?;
                angle("aircraftHeading", a.aircraft_heading)?;
                check_positive(&field(path, "focalLength"), a.focal_length)?;
            }
            Action::GimbalAngleLock(_) | Action::GimbalAngleUnlock(_) => {}
            Action::StartSmartOblique(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
                if let Some(mode) = &a.smart_oblique_cycle_mode {
                    check_one_of(
                        &field(path, "smartObliqueCycleMode"),
                        mode,
                        SMART_OBLIQUE_CYCLE_MODES,
                    )?;
                }
            }
            Action::StartTimeLapse(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
                check_positive(&field(path, "minShootInterval"), a.min_shoot_interval)?;
            }
            Action::StopTimeLapse(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
            }
            Action::SetFocusType(a) => {
                ppi(a.payload_position_index)?;
                check_one_of(
                    &field(path, "cameraFocusType"),
                    &a.camera_focus_type,
                    CAMERA_FOCUS_TYPES,
                )?;
            }
            Action::TargetDetection(a) => {
                ppi(a.payload_position_index)?;
                lens(&a.payload_lens_index)?;
            }
        }
        Ok(())
    }
}

/// A tagged action as it appears in a Waylines mission:
/// `{"type": "hover", "params": {"hoverTime": 5}}`.
///
/// The tag is kept next to the variant so a request built by hand with a tag
/// that disagrees with its variant is caught by [`ActionRequest::check_tag`]
/// instead of being coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action_type: String,
    pub action: Action,
}

impl ActionRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action_type: action.action_type().to_string(),
            action,
        }
    }

    pub fn decode(tag: &str, params: JsonValue) -> Result<Self, ActionError> {
        Ok(Self {
            action_type: tag.to_string(),
            action: Action::decode(tag, params)?,
        })
    }

    pub fn check_tag(&self) -> Result<(), ActionError> {
        let actual = self.action.action_type();
        if self.action_type == actual {
            Ok(())
        } else if !Action::TAGS.contains(&self.action_type.as_str()) {
            Err(ActionError::UnsupportedActionType(self.action_type.clone()))
        } else {
            Err(ActionError::ActionTypeMismatch {
                tag: self.action_type.clone(),
                actual,
            })
        }
    }
}

impl From<Action> for ActionRequest {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

#[derive(Serialize, Deserialize)]
struct RawActionRequest {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    params: JsonValue,
}

impl Serialize for ActionRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let params = self.action.params().map_err(S::Error::custom)?;
        RawActionRequest {
            action_type: self.action_type.clone(),
            params,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActionRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawActionRequest::deserialize(deserializer)?;
        ActionRequest::decode(&raw.action_type, raw.params).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_tag_round_trips_through_empty() {
        for tag in Action::TAGS {
            let action = Action::empty(tag).unwrap();
            assert_eq!(action.action_type(), *tag);
        }
        assert_eq!(Action::TAGS.len(), 21);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(
            Action::empty("selfDestruct"),
            Err(ActionError::UnsupportedActionType("selfDestruct".into()))
        );

        let err =
            serde_json::from_value::<ActionRequest>(json!({"type": "selfDestruct", "params": {}}))
                .unwrap_err();
        assert!(err.to_string().contains("unsupported action type 'selfDestruct'"));
    }

    #[test]
    fn test_decode_hover() {
        let req: ActionRequest =
            serde_json::from_value(json!({"type": "hover", "params": {"hoverTime": 5.5}})).unwrap();
        assert_eq!(req.action_type, "hover");
        assert_eq!(req.action, Action::Hover(HoverAction { hover_time: 5.5 }));
        req.check_tag().unwrap();
    }

    #[test]
    fn test_decode_without_params_uses_empty_variant() {
        let req: ActionRequest =
            serde_json::from_value(json!({"type": "gimbalAngleLock"})).unwrap();
        assert_eq!(req.action, Action::GimbalAngleLock(GimbalAngleLockAction {}));
    }

    #[test]
    fn test_decode_wrong_field_type() {
        let err = Action::decode("hover", json!({"hoverTime": "long"})).unwrap_err();
        assert!(matches!(err, ActionError::InvalidParams { ref tag, .. } if tag == "hover"));
    }

    #[test]
    fn test_tag_mismatch() {
        let req = ActionRequest {
            action_type: "zoom".into(),
            action: Action::Hover(HoverAction { hover_time: 1.0 }),
        };
        assert_eq!(
            req.check_tag(),
            Err(ActionError::ActionTypeMismatch {
                tag: "zoom".into(),
                actual: "hover"
            })
        );
    }

    #[test]
    fn test_serialize_request() {
        let req = ActionRequest::new(Action::Zoom(ZoomAction {
            payload_position_index: 0,
            focal_length: 48.0,
        }));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "zoom");
        assert_eq!(value["params"]["focalLength"], 48.0);
    }

    #[test]
    fn test_take_photo_param() {
        let action = Action::TakePhoto(TakePhotoAction {
            payload_position_index: 0,
            file_suffix: Some("x".into()),
            payload_lens_index: None,
            use_global_payload_lens_index: true,
        });
        let p = action.actuator_param();
        assert_eq!(p.payload_position_index, Some(0));
        assert_eq!(p.file_suffix.as_deref(), Some("x"));
        assert_eq!(p.use_global_payload_lens_index, Some(1));
        // Slots of other variants stay absent
        assert_eq!(p.hover_time, None);
        assert_eq!(p.focal_length, None);
    }

    #[test]
    fn test_hover_param_only_hover_slot() {
        let p = Action::Hover(HoverAction { hover_time: 3.0 }).actuator_param();
        assert_eq!(p, ActuatorFuncParam {
            hover_time: Some(3.0),
            ..Default::default()
        });
    }

    #[test]
    fn test_oriented_and_accurate_stay_distinct() {
        let oriented = Action::OrientedShoot(OrientedShootAction {
            oriented_file_path: Some("a.jpg".into()),
            focal_length: 24.0,
            ..Default::default()
        })
        .actuator_param();
        let accurate = Action::AccurateShoot(AccurateShootAction {
            accurate_file_path: Some("a.jpg".into()),
            focal_length: 24.0,
            ..Default::default()
        })
        .actuator_param();
        assert_eq!(oriented.oriented_file_path.as_deref(), Some("a.jpg"));
        assert_eq!(oriented.accurate_file_path, None);
        assert_eq!(accurate.accurate_file_path.as_deref(), Some("a.jpg"));
        assert_eq!(accurate.oriented_file_path, None);
    }

    #[test]
    fn test_focus_bounds() {
        let action = Action::Focus(FocusAction {
            is_point_focus: true,
            focus_x: 1.5,
            ..Default::default()
        });
        let err = action.validate("actions[0]").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { ref field, .. } if field == "actions[0].focusX"
        ));
    }

    #[test]
    fn test_region_focus_needs_region() {
        let action = Action::Focus(FocusAction {
            focus_x: 0.5,
            focus_y: 0.5,
            ..Default::default()
        });
        assert_eq!(
            action.validate("a"),
            Err(ValidationError::Required {
                field: "a.focusRegionWidth".into()
            })
        );
    }

    #[test]
    fn test_hover_time_positive() {
        let action = Action::Hover(HoverAction::default());
        assert!(action.validate("a").is_err());
        assert!(Action::Hover(HoverAction { hover_time: 0.1 }).validate("a").is_ok());
    }

    #[test]
    fn test_payload_position_index_set() {
        for ok in [0, 1, 2, 7] {
            let action = Action::Zoom(ZoomAction {
                payload_position_index: ok,
                focal_length: 24.0,
            });
            assert!(action.validate("a").is_ok());
        }
        let action = Action::Zoom(ZoomAction {
            payload_position_index: 3,
            focal_length: 24.0,
        });
        assert!(action.validate("a").is_err());
    }

    #[test]
    fn test_gimbal_angle_range() {
        let action = Action::GimbalRotate(GimbalRotateAction {
            gimbal_pitch_rotate_enable: true,
            gimbal_pitch_rotate_angle: -190.0,
            ..Default::default()
        });
        assert!(action.validate("a").is_err());
    }

    #[test]
    fn test_lens_index_values() {
        let mut photo = TakePhotoAction {
            payload_lens_index: Some("wide,ir".into()),
            ..Default::default()
        };
        assert!(Action::TakePhoto(photo.clone()).validate("a").is_ok());
        photo.payload_lens_index = Some("wide,xray".into());
        assert!(Action::TakePhoto(photo).validate("a").is_err());
    }

    #[test]
    fn test_wpml_spelled_keys_decode() {
        let oriented = Action::decode(
            "orientedShoot",
            json!({"actionUUID": "u-1", "AFPos": 3, "orientedFileMD5": "abc", "focalLength": 24}),
        )
        .unwrap();
        let p = oriented.actuator_param();
        assert_eq!(p.action_uuid.as_deref(), Some("u-1"));
        assert_eq!(p.af_pos, Some(3));
        assert_eq!(p.oriented_file_md5.as_deref(), Some("abc"));

        let accurate = Action::decode(
            "accurateShoot",
            json!({"AFPos": 5, "accurateFileMD5": "def", "focalLength": 24}),
        )
        .unwrap();
        let p = accurate.actuator_param();
        assert_eq!(p.af_pos, Some(5));
        assert_eq!(p.accurate_file_md5.as_deref(), Some("def"));

        let params = oriented.params().unwrap();
        assert_eq!(params["actionUUID"], "u-1");
        assert_eq!(params["AFPos"], 3);
        assert_eq!(params["orientedFileMD5"], "abc");
    }

    #[test]
    fn test_unknown_param_key_rejected() {
        let err = Action::decode("orientedShoot", json!({"orientedFileMd5": "abc"})).unwrap_err();
        assert!(matches!(
            err,
            ActionError::InvalidParams { ref tag, .. } if tag == "orientedShoot"
        ));
        assert!(Action::decode("gimbalAngleLock", json!({"angle": 1})).is_err());
    }

    #[test]
    fn test_absent_params_not_encoded() {
        let params = Action::TakePhoto(TakePhotoAction::default()).params().unwrap();
        let keys: Vec<_> = params.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert!(params.get("fileSuffix").is_none());
        assert!(params.get("payloadLensIndex").is_none());
        assert_eq!(params["payloadPositionIndex"], 0);
    }
}
