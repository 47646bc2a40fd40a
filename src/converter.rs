use tracing::{debug, warn};

use crate::error::{ConversionCause, ConversionError};
use crate::options::ConvertOptions;
use crate::waylines::*;
use crate::wpml_types::*;

pub const DEFAULT_TAKE_OFF_SECURITY_HEIGHT: f64 = 20.0;
pub const DEFAULT_TRANSITIONAL_SPEED: f64 = 6.0;
pub const DEFAULT_RTH_HEIGHT: f64 = 100.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Convert a Waylines mission to a WPML mission with default options.
pub fn convert(w: &Waylines) -> Result<WpmlMission, ConversionError> {
    convert_with_options(w, &ConvertOptions::default())
}

/// Convert a Waylines mission to the WPML template and waylines documents.
///
/// Deterministic apart from the create/update timestamps, which come from
/// `opts.timestamp_ms` when set.
pub fn convert_with_options(
    w: &Waylines,
    opts: &ConvertOptions,
) -> Result<WpmlMission, ConversionError> {
    if w.waypoints.is_empty() {
        return Err(ConversionError {
            index: 0,
            source: ConversionCause::EmptyMission,
        });
    }

    let globals = Globals::resolve(w);
    let mission_config = mission_config(w);

    let mut template_placemarks = Vec::with_capacity(w.waypoints.len());
    let mut wayline_placemarks = Vec::with_capacity(w.waypoints.len());
    let mut next_group_id = 0;

    for (i, wp) in w.waypoints.iter().enumerate() {
        let resolved = ResolvedWaypoint::resolve(i, wp, &globals, &mut next_group_id)?;
        template_placemarks.push(template_placemark(&resolved));
        wayline_placemarks.push(wayline_placemark(&resolved));
    }

    let (distance, duration) = route_metrics(w, globals.speed);
    let timestamp = opts.timestamp();

    let template = TemplateDocument {
        xmlns: Some(KML_NAMESPACE.to_string()),
        xmlns_wpml: Some(WPML_NAMESPACE.to_string()),
        author: Some(opts.author().to_string()),
        create_time: Some(timestamp),
        update_time: Some(timestamp),
        mission_config: mission_config.clone(),
        folders: vec![TemplateFolder {
            template_type: w.template_type.as_str().to_string(),
            template_id: 0,
            wayline_coordinate_sys_param: CoordinateSysParam {
                coordinate_mode: "WGS84".to_string(),
                height_mode: globals.height_mode.as_str().to_string(),
            },
            auto_flight_speed: globals.speed,
            global_height: Some(globals.height),
            cali_flight_enable: Some(0),
            gimbal_pitch_mode: Some(globals.gimbal_pitch_mode.clone()),
            global_waypoint_heading_param: Some(HeadingParam {
                waypoint_heading_mode: globals.heading_mode.to_string(),
                waypoint_heading_angle: Some(0.0),
                waypoint_poi_point: Some("0.000000,0.000000,0.000000".to_string()),
                waypoint_heading_poi_index: Some(0),
                ..Default::default()
            }),
            global_waypoint_turn_mode: Some(globals.turn_mode.as_str().to_string()),
            global_use_straight_line: straight_line_flag(
                globals.turn_mode,
                globals.use_straight_line,
            ),
            placemarks: template_placemarks,
            payload_param: Some(PayloadParam {
                payload_position_index: 0,
                focus_mode: Some("firstPoint".to_string()),
                metering_mode: Some("average".to_string()),
                image_format: None,
            }),
        }],
    };

    let waylines = WaylinesDocument {
        xmlns: Some(KML_NAMESPACE.to_string()),
        xmlns_wpml: Some(WPML_NAMESPACE.to_string()),
        author: None,
        create_time: None,
        update_time: None,
        mission_config,
        folders: vec![WaylineFolder {
            template_id: 0,
            execute_height_mode: globals.height_mode.execute_str().to_string(),
            wayline_id: 0,
            distance: Some(distance),
            duration: Some(duration),
            auto_flight_speed: globals.speed,
            placemarks: wayline_placemarks,
        }],
    };

    debug!(
        mission = %w.name,
        waypoints = w.waypoints.len(),
        action_groups = next_group_id,
        "converted waylines mission"
    );

    Ok(WpmlMission::new(template, waylines))
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// Build the mission config shared by both documents.
pub fn mission_config(w: &Waylines) -> MissionConfig {
    let take_off_security_height =
        positive(w.take_off_security_height).unwrap_or(DEFAULT_TAKE_OFF_SECURITY_HEIGHT);
    let global_rth_height = positive(w.global_rth_height)
        .or_else(|| positive(w.take_off_security_height))
        .unwrap_or(DEFAULT_RTH_HEIGHT);

    let (take_off_ref_point, take_off_ref_point_agl_height) = match &w.take_off_ref_point {
        Some(TakeOffRefPoint {
            latitude: Some(lat),
            longitude: Some(lon),
            height,
            agl_height,
        }) => (
            Some(format!("{lat},{lon},{}", height.unwrap_or(0.0))),
            *agl_height,
        ),
        _ => match w.waypoints.first() {
            Some(first) => (
                Some(format!("{},{},0", first.latitude, first.longitude)),
                Some(0.0),
            ),
            None => (None, None),
        },
    };

    let exit_on_rc_lost = w
        .exit_on_rc_lost
        .clone()
        .unwrap_or_else(|| DEFAULT_EXIT_ON_RC_LOST.to_string());
    let execute_rc_lost_action = if exit_on_rc_lost == DEFAULT_EXIT_ON_RC_LOST {
        Some(
            w.execute_rc_lost_action
                .clone()
                .unwrap_or_else(|| DEFAULT_EXECUTE_RC_LOST_ACTION.to_string()),
        )
    } else {
        None
    };

    MissionConfig {
        fly_to_wayline_mode: w
            .fly_to_wayline_mode
            .clone()
            .unwrap_or_else(|| DEFAULT_FLY_TO_WAYLINE_MODE.to_string()),
        finish_action: w
            .finish_action
            .clone()
            .unwrap_or_else(|| DEFAULT_FINISH_ACTION.to_string()),
        exit_on_rc_lost,
        execute_rc_lost_action,
        take_off_security_height,
        take_off_ref_point,
        take_off_ref_point_agl_height,
        global_transitional_speed: positive(w.global_transitional_speed)
            .unwrap_or(DEFAULT_TRANSITIONAL_SPEED),
        global_rth_height,
        drone_info: DroneInfo {
            drone_enum_value: w.drone_model.enum_value(),
            drone_sub_enum_value: w.payload_model.drone_sub_enum_value(),
        },
        payload_info: Some(PayloadInfo {
            payload_enum_value: w.payload_model.enum_value(),
            payload_sub_enum_value: 0,
            payload_position_index: 0,
        }),
    }
}

/// Map a heading mode name onto a WPML heading mode. Unknown names fly as
/// `followWayline`.
pub fn resolve_heading_mode(mode: &str) -> &'static str {
    match mode {
        "followWayline" | "follow_wayline" => "followWayline",
        "manually" | "manual" => "manually",
        "fixed" => "fixed",
        "smoothTransition" | "smooth_transition" => "smoothTransition",
        "towardPOI" | "toward_poi" => "towardPOI",
        other => {
            warn!(heading_mode = other, "unknown heading mode, using followWayline");
            "followWayline"
        }
    }
}

fn straight_line_flag(turn_mode: TurnMode, use_straight_line: bool) -> Option<i32> {
    uses_straight_line(turn_mode.as_str()).then_some(i32::from(use_straight_line))
}

/// Mission-wide settings after defaulting.
struct Globals {
    height_mode: HeightMode,
    height: f64,
    speed: f64,
    turn_mode: TurnMode,
    use_straight_line: bool,
    heading_mode: &'static str,
    gimbal_pitch_mode: String,
}

impl Globals {
    fn resolve(w: &Waylines) -> Self {
        Self {
            height_mode: w.height_mode.unwrap_or_default(),
            height: w.global_height.unwrap_or(DEFAULT_GLOBAL_HEIGHT),
            speed: w.global_speed.unwrap_or(DEFAULT_GLOBAL_SPEED),
            turn_mode: w.turn_mode.unwrap_or(DEFAULT_TURN_MODE),
            use_straight_line: w.use_straight_line.unwrap_or(true),
            heading_mode: resolve_heading_mode(
                w.heading_mode.as_deref().unwrap_or(DEFAULT_HEADING_MODE),
            ),
            gimbal_pitch_mode: w
                .gimbal_pitch_mode
                .clone()
                .unwrap_or_else(|| DEFAULT_GIMBAL_PITCH_MODE.to_string()),
        }
    }
}

/// One waypoint with every fallback applied. Both placemark shapes are
/// projected from this value.
struct ResolvedWaypoint {
    index: i32,
    coordinates: String,
    height: f64,
    speed: f64,
    speed_override: Option<f64>,
    heading: HeadingParam,
    heading_override: bool,
    turn: TurnParam,
    turn_override: bool,
    use_straight_line: Option<i32>,
    gimbal_pitch_angle: Option<f64>,
    action_group: Option<ActionGroup>,
}

impl ResolvedWaypoint {
    fn resolve(
        i: usize,
        wp: &WaylinesWaypoint,
        globals: &Globals,
        next_group_id: &mut i32,
    ) -> Result<Self, ConversionError> {
        let index = i as i32;
        let turn_mode = wp.turn_mode.unwrap_or(globals.turn_mode);
        let heading_mode = match wp.heading_mode.as_deref() {
            Some(mode) => resolve_heading_mode(mode),
            None => globals.heading_mode,
        };

        let action_group = action_group(i, wp, *next_group_id)?;
        if action_group.is_some() {
            *next_group_id += 1;
        }

        Ok(Self {
            index,
            coordinates: format_coordinates(wp.longitude, wp.latitude),
            height: wp.height,
            speed: wp.speed.unwrap_or(globals.speed),
            speed_override: wp.speed,
            heading: HeadingParam {
                waypoint_heading_mode: heading_mode.to_string(),
                waypoint_heading_angle: Some(wp.heading_angle.unwrap_or(0.0)),
                waypoint_heading_angle_enable: Some(i32::from(wp.heading_angle.is_some())),
                waypoint_heading_path_mode: Some("followBadArc".to_string()),
                ..Default::default()
            },
            heading_override: wp.heading_mode.is_some() || wp.heading_angle.is_some(),
            turn: TurnParam {
                waypoint_turn_mode: turn_mode.as_str().to_string(),
                waypoint_turn_damping_dist: Some(wp.turn_damping_dist.unwrap_or(0.0)),
            },
            turn_override: wp.turn_mode.is_some() || wp.turn_damping_dist.is_some(),
            use_straight_line: straight_line_flag(turn_mode, globals.use_straight_line),
            gimbal_pitch_angle: wp.gimbal_pitch_angle,
            action_group,
        })
    }
}

/// Every action of a waypoint goes into one group scoped to that waypoint.
fn action_group(
    i: usize,
    wp: &WaylinesWaypoint,
    group_id: i32,
) -> Result<Option<ActionGroup>, ConversionError> {
    if wp.actions.is_empty() {
        return Ok(None);
    }

    let index = i as i32;
    let mut actions = Vec::with_capacity(wp.actions.len());
    for (j, req) in wp.actions.iter().enumerate() {
        req.check_tag().map_err(|e| ConversionError {
            index: i,
            source: e.into(),
        })?;
        actions.push(WpmlAction {
            action_id: j as i32,
            action_actuator_func: req.action.action_type().to_string(),
            action_actuator_func_param: req.action.actuator_param(),
        });
    }

    Ok(Some(ActionGroup {
        action_group_id: group_id,
        action_group_start_index: index,
        action_group_end_index: index,
        action_group_mode: "sequence".to_string(),
        action_trigger: ActionTrigger {
            action_trigger_type: wp.trigger_type.as_str().to_string(),
            action_trigger_param: if wp.trigger_type.needs_param() {
                wp.trigger_param
            } else {
                None
            },
        },
        actions,
    }))
}

fn template_placemark(r: &ResolvedWaypoint) -> TemplatePlacemark {
    TemplatePlacemark {
        coordinates: r.coordinates.clone(),
        index: r.index,
        ellipsoid_height: Some(r.height),
        height: Some(r.height),
        use_global_height: Some(0),
        use_global_speed: Some(i32::from(r.speed_override.is_none())),
        waypoint_speed: r.speed_override,
        use_global_heading_param: Some(i32::from(!r.heading_override)),
        waypoint_heading_param: r.heading_override.then(|| r.heading.clone()),
        use_global_turn_param: Some(i32::from(!r.turn_override)),
        waypoint_turn_param: r.turn_override.then(|| r.turn.clone()),
        use_straight_line: r.use_straight_line,
        gimbal_pitch_angle: r.gimbal_pitch_angle,
        action_groups: r.action_group.iter().cloned().collect(),
    }
}

fn wayline_placemark(r: &ResolvedWaypoint) -> WaylinePlacemark {
    WaylinePlacemark {
        coordinates: r.coordinates.clone(),
        index: r.index,
        execute_height: r.height,
        waypoint_speed: r.speed,
        waypoint_heading_param: r.heading.clone(),
        waypoint_turn_param: r.turn.clone(),
        use_straight_line: r.use_straight_line,
        action_groups: r.action_group.iter().cloned().collect(),
    }
}

/// Great-circle distance in meters between two lat/lon points.
fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Route length (m) and flight time (s) along the waypoints, each leg flown
/// at the speed of the waypoint it starts from.
fn route_metrics(w: &Waylines, global_speed: f64) -> (f64, f64) {
    let mut distance = 0.0;
    let mut duration = 0.0;
    for leg in w.waypoints.windows(2) {
        let (a, b) = (&leg[0], &leg[1]);
        let ground = haversine(a.latitude, a.longitude, b.latitude, b.longitude);
        let length = (ground.powi(2) + (b.height - a.height).powi(2)).sqrt();
        distance += length;
        let speed = a.speed.unwrap_or(global_speed);
        if speed > 0.0 {
            duration += length / speed;
        }
    }
    (distance, duration)
}
