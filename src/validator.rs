//! Structural, range and enumeration checks for [`Waylines`] missions, plus
//! model-conditional requirements.
//!
//! Conditional rules name a field and a pattern such as `M3|M30`. The
//! pattern is an anchored alternation matched against the group names of the
//! drone (or payload) model in context; when any group matches and the field
//! is absent, validation fails naming both the field and the model.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::waylines::{DroneModel, PayloadModel, TemplateType, Waylines};

const GIMBAL_PITCH_MODES: &[&str] = &["manual", "usePointSetting"];
const FINISH_ACTIONS: &[&str] = &["goHome", "noAction", "autoLand", "gotoFirstWaypoint"];
const FLY_TO_WAYLINE_MODES: &[&str] = &["safely", "pointToPoint"];
const EXIT_ON_RC_LOST: &[&str] = &["goContinue", "executeLostAction"];
const RC_LOST_ACTIONS: &[&str] = &["goBack", "landing", "hover"];
const LENS_TYPES: &[&str] = &["wide", "zoom", "ir", "narrow_band", "visable"];
const PAYLOAD_POSITIONS: &[i32] = &[0, 1, 2, 7];

pub(crate) fn check_range(
    field: &str,
    value: f64,
    min: f64,
    max: f64,
    rule: &'static str,
) -> Result<(), ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            rule,
        });
    }
    Ok(())
}

pub(crate) fn check_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            rule: "gt=0",
        })
    }
}

pub(crate) fn check_one_of(
    field: &str,
    value: &str,
    allowed: &[&str],
) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            rule: "oneof",
        })
    }
}

pub(crate) fn check_position_index(field: &str, value: i32) -> Result<(), ValidationError> {
    if PAYLOAD_POSITIONS.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            rule: "oneof=0 1 2 7",
        })
    }
}

/// `payloadLensIndex` is a comma separated list of lens names.
pub(crate) fn check_lens_index(field: &str, value: &str) -> Result<(), ValidationError> {
    let valid = !value.trim().is_empty()
        && value.split(',').all(|lens| LENS_TYPES.contains(&lens.trim()));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            rule: "oneof=wide zoom ir narrow_band visable",
        })
    }
}

fn check_optional_one_of(
    field: &str,
    value: &Option<String>,
    allowed: &[&str],
) -> Result<(), ValidationError> {
    match value {
        Some(v) => check_one_of(field, v, allowed),
        None => Ok(()),
    }
}

/// Which model of the validation context a rule's pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTarget {
    Drone,
    Payload,
}

/// Returns the path of the first missing field, if any.
pub type MissingField = fn(&Waylines) -> Option<String>;

#[derive(Debug, Clone)]
pub struct ConditionalRule {
    pub field: &'static str,
    pub target: ModelTarget,
    pattern: Regex,
    missing: MissingField,
}

impl ConditionalRule {
    pub fn new(
        field: &'static str,
        target: ModelTarget,
        pattern: &str,
        missing: MissingField,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            field,
            target,
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
            missing,
        })
    }

    pub fn applies_to(&self, groups: &[&str]) -> bool {
        groups.iter().any(|g| self.pattern.is_match(g))
    }
}

fn missing_take_off_ref_point(w: &Waylines) -> Option<String> {
    match &w.take_off_ref_point {
        Some(p) if p.latitude.is_some() && p.longitude.is_some() => None,
        _ => Some("takeOffRefPoint".to_string()),
    }
}

fn missing_lens_index(w: &Waylines) -> Option<String> {
    w.waypoints.iter().enumerate().find_map(|(i, wp)| {
        wp.actions.iter().enumerate().find_map(|(j, req)| {
            match req.action.lens_selection() {
                Some((None, false)) => {
                    Some(format!("waypoints[{i}].actions[{j}].payloadLensIndex"))
                }
                _ => None,
            }
        })
    })
}

fn builtin_rules() -> Result<Vec<ConditionalRule>, regex::Error> {
    Ok(vec![
        ConditionalRule::new("payloadLensIndex", ModelTarget::Drone, "M3|M30", missing_lens_index)?,
        ConditionalRule::new(
            "takeOffRefPoint",
            ModelTarget::Drone,
            "M300|M350",
            missing_take_off_ref_point,
        )?,
        ConditionalRule::new(
            "payloadLensIndex",
            ModelTarget::Payload,
            "H20|H30",
            missing_lens_index,
        )?,
    ])
}

/// Mission validator. Stateless apart from its compiled rule table, so a
/// single instance is shared through [`Validator::global`].
#[derive(Debug, Clone)]
pub struct Validator {
    rules: Vec<ConditionalRule>,
}

static GLOBAL: OnceLock<Result<Validator, regex::Error>> = OnceLock::new();

impl Validator {
    /// Validator with the built-in conditional rules.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: builtin_rules()?,
        })
    }

    pub fn with_rules(rules: Vec<ConditionalRule>) -> Self {
        Self { rules }
    }

    pub fn global() -> Result<&'static Validator, ValidationError> {
        GLOBAL
            .get_or_init(Validator::new)
            .as_ref()
            .map_err(|e| ValidationError::InvalidRule(e.to_string()))
    }

    pub fn rules(&self) -> &[ConditionalRule] {
        &self.rules
    }

    /// Check required fields, bounds and enumerations, recursing into every
    /// waypoint and action.
    pub fn validate(&self, w: &Waylines) -> Result<(), ValidationError> {
        if w.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }
        if w.template_type != TemplateType::Waypoint {
            return Err(ValidationError::InvalidValue {
                field: "templateType".to_string(),
                value: w.template_type.as_str().to_string(),
                rule: "oneof=waypoint",
            });
        }
        if !w.payload_model.fits(w.drone_model) {
            return Err(ValidationError::InvalidValue {
                field: "payloadModel".to_string(),
                value: w.payload_model.as_str().to_string(),
                rule: "fits=droneModel",
            });
        }
        if w.waypoints.is_empty() {
            return Err(ValidationError::Required {
                field: "waypoints".to_string(),
            });
        }

        if let Some(h) = w.global_height {
            check_range("globalHeight", h, -1500.0, 1500.0, "gte=-1500,lte=1500")?;
        }
        if let Some(s) = w.global_speed {
            check_positive("globalSpeed", s)?;
            check_range("globalSpeed", s, 0.0, 15.0, "gt=0,lte=15")?;
        }
        if let Some(h) = w.global_rth_height {
            check_range("globalRTHHeight", h, 0.0, 1500.0, "gte=0,lte=1500")?;
        }
        if let Some(h) = w.take_off_security_height {
            check_range("takeOffSecurityHeight", h, 0.0, 1500.0, "gte=0,lte=1500")?;
        }
        if let Some(s) = w.global_transitional_speed {
            check_positive("globalTransitionalSpeed", s)?;
            check_range("globalTransitionalSpeed", s, 0.0, 15.0, "gt=0,lte=15")?;
        }
        check_optional_one_of("gimbalPitchMode", &w.gimbal_pitch_mode, GIMBAL_PITCH_MODES)?;
        check_optional_one_of("finishAction", &w.finish_action, FINISH_ACTIONS)?;
        check_optional_one_of("flyToWaylineMode", &w.fly_to_wayline_mode, FLY_TO_WAYLINE_MODES)?;
        check_optional_one_of("exitOnRCLost", &w.exit_on_rc_lost, EXIT_ON_RC_LOST)?;
        check_optional_one_of("executeRCLostAction", &w.execute_rc_lost_action, RC_LOST_ACTIONS)?;

        if let Some(p) = &w.take_off_ref_point {
            if let Some(lat) = p.latitude {
                check_range("takeOffRefPoint.latitude", lat, -90.0, 90.0, "gte=-90,lte=90")?;
            }
            if let Some(lon) = p.longitude {
                check_range("takeOffRefPoint.longitude", lon, -180.0, 180.0, "gte=-180,lte=180")?;
            }
        }

        for (i, wp) in w.waypoints.iter().enumerate() {
            let path = format!("waypoints[{i}]");
            check_range(&format!("{path}.latitude"), wp.latitude, -90.0, 90.0, "gte=-90,lte=90")?;
            check_range(
                &format!("{path}.longitude"),
                wp.longitude,
                -180.0,
                180.0,
                "gte=-180,lte=180",
            )?;
            check_range(
                &format!("{path}.height"),
                wp.height,
                -1500.0,
                1500.0,
                "gte=-1500,lte=1500",
            )?;
            if let Some(s) = wp.speed {
                check_positive(&format!("{path}.speed"), s)?;
                check_range(&format!("{path}.speed"), s, 0.0, 15.0, "gt=0,lte=15")?;
            }
            if wp.trigger_type.needs_param() {
                let param = wp.trigger_param.ok_or_else(|| ValidationError::Required {
                    field: format!("{path}.triggerParam"),
                })?;
                check_positive(&format!("{path}.triggerParam"), param)?;
            }
            if let Some(d) = wp.turn_damping_dist {
                check_range(&format!("{path}.turnDampingDist"), d, 0.0, 1000.0, "gte=0,lte=1000")?;
            }
            if let Some(a) = wp.heading_angle {
                check_range(&format!("{path}.headingAngle"), a, -180.0, 180.0, "gte=-180,lte=180")?;
            }
            if let Some(a) = wp.gimbal_pitch_angle {
                check_range(
                    &format!("{path}.gimbalPitchAngle"),
                    a,
                    -180.0,
                    180.0,
                    "gte=-180,lte=180",
                )?;
            }

            for (j, req) in wp.actions.iter().enumerate() {
                let action_path = format!("{path}.actions[{j}]");
                req.check_tag().map_err(|source| ValidationError::Action {
                    field: format!("{action_path}.type"),
                    source,
                })?;
                req.action.validate(&action_path)?;
            }
        }

        Ok(())
    }

    /// [`validate`](Self::validate), then the conditional rules for the given
    /// drone and payload.
    pub fn validate_with_context(
        &self,
        w: &Waylines,
        drone: DroneModel,
        payload: PayloadModel,
    ) -> Result<(), ValidationError> {
        self.validate(w)?;

        for rule in &self.rules {
            let (groups, model) = match rule.target {
                ModelTarget::Drone => (drone.groups(), drone.as_str()),
                ModelTarget::Payload => (payload.groups(), payload.as_str()),
            };
            if !rule.applies_to(groups) {
                continue;
            }
            if let Some(field) = (rule.missing)(w) {
                return Err(ValidationError::RequiredForModel {
                    field,
                    model: model.to_string(),
                });
            }
        }

        Ok(())
    }
}

pub fn validate(w: &Waylines) -> Result<(), ValidationError> {
    Validator::global()?.validate(w)
}

pub fn validate_with_context(
    w: &Waylines,
    drone: DroneModel,
    payload: PayloadModel,
) -> Result<(), ValidationError> {
    Validator::global()?.validate_with_context(w, drone, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionRequest, HoverAction, TakePhotoAction};
    use crate::waylines::{TakeOffRefPoint, TriggerType, WaylinesWaypoint};

    fn mission() -> Waylines {
        let mut w = Waylines::new("T", DroneModel::M3DSeries, PayloadModel::Matrice3TD)
            .with_waypoint(WaylinesWaypoint::new(39.9042, 116.4074, 50.0))
            .with_waypoint(WaylinesWaypoint::new(39.9052, 116.4084, 60.0));
        w.apply_defaults();
        w
    }

    #[test]
    fn test_valid_mission() {
        assert_eq!(validate(&mission()), Ok(()));
    }

    #[test]
    fn test_idempotent() {
        let mut w = mission();
        w.waypoints[1].latitude = 95.0;
        let first = validate(&w);
        let second = validate(&w);
        assert!(first.is_err());
        assert_eq!(first, second);
    }

    #[test]
    fn test_requires_waypoints() {
        let mut w = mission();
        w.waypoints.clear();
        assert_eq!(
            validate(&w),
            Err(ValidationError::Required {
                field: "waypoints".into()
            })
        );
    }

    #[test]
    fn test_latitude_bound() {
        let mut w = mission();
        w.waypoints[1].latitude = -90.5;
        match validate(&w) {
            Err(ValidationError::OutOfRange { field, rule, .. }) => {
                assert_eq!(field, "waypoints[1].latitude");
                assert_eq!(rule, "gte=-90,lte=90");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_longitude_bound() {
        let mut w = mission();
        w.waypoints[0].longitude = 180.1;
        assert!(matches!(validate(&w), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_speed_bound() {
        let mut w = mission();
        w.waypoints[0].speed = Some(0.0);
        assert!(validate(&w).is_err());
        w.waypoints[0].speed = Some(15.0);
        assert!(validate(&w).is_ok());
        w.waypoints[0].speed = Some(15.5);
        assert!(validate(&w).is_err());
    }

    #[test]
    fn test_unmodeled_template_type() {
        let mut w = mission();
        w.template_type = TemplateType::Mapping2d;
        assert!(matches!(
            validate(&w),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "templateType"
        ));
    }

    #[test]
    fn test_payload_must_fit_drone() {
        let mut w = mission();
        w.payload_model = PayloadModel::H20T;
        assert!(matches!(
            validate(&w),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "payloadModel"
        ));
    }

    #[test]
    fn test_finish_action_enum() {
        let mut w = mission();
        w.finish_action = Some("explode".into());
        assert_eq!(
            validate(&w),
            Err(ValidationError::InvalidValue {
                field: "finishAction".into(),
                value: "explode".into(),
                rule: "oneof",
            })
        );
    }

    #[test]
    fn test_heading_mode_is_not_an_enum_check() {
        let mut w = mission();
        w.heading_mode = Some("spiral".into());
        assert!(validate(&w).is_ok());
    }

    #[test]
    fn test_multiple_timing_needs_param() {
        let mut w = mission();
        w.waypoints[0].trigger_type = TriggerType::MultipleTiming;
        assert_eq!(
            validate(&w),
            Err(ValidationError::Required {
                field: "waypoints[0].triggerParam".into()
            })
        );
        w.waypoints[0].trigger_param = Some(2.0);
        assert!(validate(&w).is_ok());
    }

    #[test]
    fn test_action_tag_mismatch_fails() {
        let mut w = mission();
        w.waypoints[0].actions.push(ActionRequest {
            action_type: "takePhoto".into(),
            action: Action::Hover(HoverAction { hover_time: 1.0 }),
        });
        match validate(&w) {
            Err(ValidationError::Action { field, .. }) => {
                assert_eq!(field, "waypoints[0].actions[0].type");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_action_fields_checked() {
        let mut w = mission();
        w.waypoints[1]
            .actions
            .push(Action::Hover(HoverAction { hover_time: 0.0 }).into());
        assert!(matches!(
            validate(&w),
            Err(ValidationError::OutOfRange { ref field, .. })
                if field == "waypoints[1].actions[0].hoverTime"
        ));
    }

    #[test]
    fn test_builtin_rules_compile() {
        let validator = Validator::global().unwrap();
        assert_eq!(validator.rules().len(), 3);
        assert!(Validator::new().is_ok());
    }

    #[test]
    fn test_dock_drone_without_rth_height_passes() {
        let w = mission();
        assert_eq!(w.global_rth_height, None);
        assert!(validate_with_context(&w, DroneModel::M3DSeries, PayloadModel::Matrice3TD).is_ok());
    }

    #[test]
    fn test_context_lens_index_for_m30_drones() {
        let photo = Action::TakePhoto(TakePhotoAction::default());
        let mut w = Waylines::new("T", DroneModel::M30Series, PayloadModel::Matrice30T)
            .with_waypoint(WaylinesWaypoint::new(1.0, 1.0, 10.0).with_action(photo));
        w.apply_defaults();
        assert_eq!(
            validate_with_context(&w, DroneModel::M30Series, PayloadModel::Matrice30T),
            Err(ValidationError::RequiredForModel {
                field: "waypoints[0].actions[0].payloadLensIndex".into(),
                model: "M30Series".into(),
            })
        );

        w.waypoints[0].actions[0] = Action::TakePhoto(TakePhotoAction {
            use_global_payload_lens_index: true,
            ..Default::default()
        })
        .into();
        assert!(validate_with_context(&w, DroneModel::M30Series, PayloadModel::Matrice30T).is_ok());
    }

    #[test]
    fn test_context_pattern_is_anchored() {
        // "M3D" must not match the "M3" alternative
        let photo = Action::TakePhoto(TakePhotoAction::default());
        let mut w = Waylines::new("T", DroneModel::M3DSeries, PayloadModel::Matrice3D)
            .with_waypoint(WaylinesWaypoint::new(1.0, 1.0, 10.0).with_action(photo));
        w.apply_defaults();
        assert!(validate_with_context(&w, DroneModel::M3DSeries, PayloadModel::Matrice3D).is_ok());

        w.drone_model = DroneModel::M3Series;
        w.payload_model = PayloadModel::Mavic3E;
        assert!(matches!(
            validate_with_context(&w, DroneModel::M3Series, PayloadModel::Mavic3E),
            Err(ValidationError::RequiredForModel { ref model, .. }) if model == "M3Series"
        ));
    }

    #[test]
    fn test_context_take_off_point_for_m300() {
        let mut w = Waylines::new("T", DroneModel::M300RTK, PayloadModel::H20)
            .with_waypoint(WaylinesWaypoint::new(1.0, 1.0, 10.0));
        w.apply_defaults();
        assert!(matches!(
            validate_with_context(&w, DroneModel::M300RTK, PayloadModel::H20),
            Err(ValidationError::RequiredForModel { ref field, .. }) if field == "takeOffRefPoint"
        ));

        w.take_off_ref_point = Some(TakeOffRefPoint {
            latitude: Some(1.0),
            longitude: Some(1.0),
            ..Default::default()
        });
        assert!(validate_with_context(&w, DroneModel::M300RTK, PayloadModel::H20).is_ok());
    }

    #[test]
    fn test_context_lens_index_for_h20_payloads() {
        let mut w = Waylines::new("T", DroneModel::M350RTK, PayloadModel::H20T)
            .with_waypoint(
                WaylinesWaypoint::new(1.0, 1.0, 10.0)
                    .with_action(Action::TakePhoto(TakePhotoAction::default())),
            );
        w.apply_defaults();
        w.take_off_ref_point = Some(TakeOffRefPoint {
            latitude: Some(1.0),
            longitude: Some(1.0),
            ..Default::default()
        });
        assert_eq!(
            validate_with_context(&w, DroneModel::M350RTK, PayloadModel::H20T),
            Err(ValidationError::RequiredForModel {
                field: "waypoints[0].actions[0].payloadLensIndex".into(),
                model: "H20T".into(),
            })
        );
    }

    #[test]
    fn test_custom_rules() {
        let rule = ConditionalRule::new("description", ModelTarget::Drone, "Dock", |w| {
            w.description.is_none().then(|| "description".to_string())
        })
        .unwrap();
        let validator = Validator::with_rules(vec![rule]);
        let w = mission();
        assert!(matches!(
            validator.validate_with_context(&w, DroneModel::M3DSeries, PayloadModel::Matrice3TD),
            Err(ValidationError::RequiredForModel { ref field, .. }) if field == "description"
        ));
        assert!(ConditionalRule::new("x", ModelTarget::Drone, "(", |_| None).is_err());
    }
}
