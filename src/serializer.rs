//! Namespace-aware XML writer for the WPML documents.
//!
//! Core KML elements (`kml`, `Document`, `Folder`, `Placemark`, `Point`,
//! `coordinates`) go in the default namespace; everything else carries the
//! `wpml:` prefix.

use std::fmt::Display;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::SerializationError;
use crate::wpml_types::*;

type Result<T> = std::result::Result<T, SerializationError>;
type XmlWriter = Writer<Vec<u8>>;

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// A document tree that can be written as XML.
pub trait MarshalXml {
    fn marshal_into(&self, w: &mut XmlWriter) -> Result<()>;
}

/// Serialize `doc` after a literal XML declaration line.
pub fn marshal<D: MarshalXml>(doc: &D, indent: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4096);
    out.extend_from_slice(XML_DECLARATION.as_bytes());
    let mut writer = if indent {
        Writer::new_with_indent(out, b' ', 2)
    } else {
        Writer::new(out)
    };
    doc.marshal_into(&mut writer)?;
    Ok(writer.into_inner())
}

/// Marshal a template document, filling in the namespace URIs when unset.
pub fn marshal_template(doc: &TemplateDocument, indent: bool) -> Result<Vec<u8>> {
    if doc.xmlns.is_some() && doc.xmlns_wpml.is_some() {
        return marshal(doc, indent);
    }
    let mut doc = doc.clone();
    doc.xmlns.get_or_insert_with(|| KML_NAMESPACE.to_string());
    doc.xmlns_wpml.get_or_insert_with(|| WPML_NAMESPACE.to_string());
    marshal(&doc, indent)
}

/// Marshal a waylines document, filling in the namespace URIs when unset.
pub fn marshal_waylines(doc: &WaylinesDocument, indent: bool) -> Result<Vec<u8>> {
    if doc.xmlns.is_some() && doc.xmlns_wpml.is_some() {
        return marshal(doc, indent);
    }
    let mut doc = doc.clone();
    doc.xmlns.get_or_insert_with(|| KML_NAMESPACE.to_string());
    doc.xmlns_wpml.get_or_insert_with(|| WPML_NAMESPACE.to_string());
    marshal(&doc, indent)
}

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn el<T: Display>(w: &mut XmlWriter, name: &str, value: T) -> Result<()> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(&value.to_string())))?;
    end(w, name)
}

fn opt_el<T: Display>(w: &mut XmlWriter, name: &str, value: Option<T>) -> Result<()> {
    match value {
        Some(v) => el(w, name, v),
        None => Ok(()),
    }
}

fn write_root(
    w: &mut XmlWriter,
    xmlns: &Option<String>,
    xmlns_wpml: &Option<String>,
) -> Result<()> {
    let mut root = BytesStart::new("kml");
    if let Some(ns) = xmlns {
        root.push_attribute(("xmlns", ns.as_str()));
    }
    if let Some(ns) = xmlns_wpml {
        root.push_attribute(("xmlns:wpml", ns.as_str()));
    }
    w.write_event(Event::Start(root))?;
    start(w, "Document")
}

fn write_header(
    w: &mut XmlWriter,
    author: &Option<String>,
    create_time: Option<i64>,
    update_time: Option<i64>,
) -> Result<()> {
    opt_el(w, "wpml:author", author.as_deref())?;
    opt_el(w, "wpml:createTime", create_time)?;
    opt_el(w, "wpml:updateTime", update_time)
}

fn write_close(w: &mut XmlWriter) -> Result<()> {
    end(w, "Document")?;
    end(w, "kml")
}

impl MarshalXml for TemplateDocument {
    fn marshal_into(&self, w: &mut XmlWriter) -> Result<()> {
        write_root(w, &self.xmlns, &self.xmlns_wpml)?;
        write_header(w, &self.author, self.create_time, self.update_time)?;
        write_mission_config(w, &self.mission_config)?;
        for folder in &self.folders {
            write_template_folder(w, folder)?;
        }
        write_close(w)
    }
}

impl MarshalXml for WaylinesDocument {
    fn marshal_into(&self, w: &mut XmlWriter) -> Result<()> {
        write_root(w, &self.xmlns, &self.xmlns_wpml)?;
        write_header(w, &self.author, self.create_time, self.update_time)?;
        write_mission_config(w, &self.mission_config)?;
        for folder in &self.folders {
            write_wayline_folder(w, folder)?;
        }
        write_close(w)
    }
}

fn write_mission_config(w: &mut XmlWriter, c: &MissionConfig) -> Result<()> {
    start(w, "wpml:missionConfig")?;
    el(w, "wpml:flyToWaylineMode", &c.fly_to_wayline_mode)?;
    el(w, "wpml:finishAction", &c.finish_action)?;
    el(w, "wpml:exitOnRCLost", &c.exit_on_rc_lost)?;
    opt_el(w, "wpml:executeRCLostAction", c.execute_rc_lost_action.as_deref())?;
    el(w, "wpml:takeOffSecurityHeight", c.take_off_security_height)?;
    opt_el(w, "wpml:takeOffRefPoint", c.take_off_ref_point.as_deref())?;
    opt_el(w, "wpml:takeOffRefPointAGLHeight", c.take_off_ref_point_agl_height)?;
    el(w, "wpml:globalTransitionalSpeed", c.global_transitional_speed)?;
    el(w, "wpml:globalRTHHeight", c.global_rth_height)?;

    start(w, "wpml:droneInfo")?;
    el(w, "wpml:droneEnumValue", c.drone_info.drone_enum_value)?;
    el(w, "wpml:droneSubEnumValue", c.drone_info.drone_sub_enum_value)?;
    end(w, "wpml:droneInfo")?;

    if let Some(p) = &c.payload_info {
        start(w, "wpml:payloadInfo")?;
        el(w, "wpml:payloadEnumValue", p.payload_enum_value)?;
        el(w, "wpml:payloadSubEnumValue", p.payload_sub_enum_value)?;
        el(w, "wpml:payloadPositionIndex", p.payload_position_index)?;
        end(w, "wpml:payloadInfo")?;
    }
    end(w, "wpml:missionConfig")
}

fn write_template_folder(w: &mut XmlWriter, f: &TemplateFolder) -> Result<()> {
    start(w, "Folder")?;
    el(w, "wpml:templateType", &f.template_type)?;
    el(w, "wpml:templateId", f.template_id)?;

    start(w, "wpml:waylineCoordinateSysParam")?;
    el(w, "wpml:coordinateMode", &f.wayline_coordinate_sys_param.coordinate_mode)?;
    el(w, "wpml:heightMode", &f.wayline_coordinate_sys_param.height_mode)?;
    end(w, "wpml:waylineCoordinateSysParam")?;

    el(w, "wpml:autoFlightSpeed", f.auto_flight_speed)?;
    opt_el(w, "wpml:globalHeight", f.global_height)?;
    opt_el(w, "wpml:caliFlightEnable", f.cali_flight_enable)?;
    opt_el(w, "wpml:gimbalPitchMode", f.gimbal_pitch_mode.as_deref())?;
    if let Some(h) = &f.global_waypoint_heading_param {
        write_heading_param(w, "wpml:globalWaypointHeadingParam", h)?;
    }
    opt_el(w, "wpml:globalWaypointTurnMode", f.global_waypoint_turn_mode.as_deref())?;
    opt_el(w, "wpml:globalUseStraightLine", f.global_use_straight_line)?;

    for p in &f.placemarks {
        write_template_placemark(w, p)?;
    }

    if let Some(p) = &f.payload_param {
        start(w, "wpml:payloadParam")?;
        el(w, "wpml:payloadPositionIndex", p.payload_position_index)?;
        opt_el(w, "wpml:focusMode", p.focus_mode.as_deref())?;
        opt_el(w, "wpml:meteringMode", p.metering_mode.as_deref())?;
        opt_el(w, "wpml:imageFormat", p.image_format.as_deref())?;
        end(w, "wpml:payloadParam")?;
    }
    end(w, "Folder")
}

fn write_wayline_folder(w: &mut XmlWriter, f: &WaylineFolder) -> Result<()> {
    start(w, "Folder")?;
    el(w, "wpml:templateId", f.template_id)?;
    el(w, "wpml:executeHeightMode", &f.execute_height_mode)?;
    el(w, "wpml:waylineId", f.wayline_id)?;
    opt_el(w, "wpml:distance", f.distance)?;
    opt_el(w, "wpml:duration", f.duration)?;
    el(w, "wpml:autoFlightSpeed", f.auto_flight_speed)?;
    for p in &f.placemarks {
        write_wayline_placemark(w, p)?;
    }
    end(w, "Folder")
}

fn write_point(w: &mut XmlWriter, coordinates: &str) -> Result<()> {
    start(w, "Point")?;
    el(w, "coordinates", coordinates)?;
    end(w, "Point")
}

fn write_template_placemark(w: &mut XmlWriter, p: &TemplatePlacemark) -> Result<()> {
    start(w, "Placemark")?;
    write_point(w, &p.coordinates)?;
    el(w, "wpml:index", p.index)?;
    opt_el(w, "wpml:ellipsoidHeight", p.ellipsoid_height)?;
    opt_el(w, "wpml:height", p.height)?;
    opt_el(w, "wpml:useGlobalHeight", p.use_global_height)?;
    opt_el(w, "wpml:useGlobalSpeed", p.use_global_speed)?;
    opt_el(w, "wpml:waypointSpeed", p.waypoint_speed)?;
    opt_el(w, "wpml:useGlobalHeadingParam", p.use_global_heading_param)?;
    if let Some(h) = &p.waypoint_heading_param {
        write_heading_param(w, "wpml:waypointHeadingParam", h)?;
    }
    opt_el(w, "wpml:useGlobalTurnParam", p.use_global_turn_param)?;
    if let Some(t) = &p.waypoint_turn_param {
        write_turn_param(w, t)?;
    }
    opt_el(w, "wpml:useStraightLine", p.use_straight_line)?;
    opt_el(w, "wpml:gimbalPitchAngle", p.gimbal_pitch_angle)?;
    for g in &p.action_groups {
        write_action_group(w, g)?;
    }
    end(w, "Placemark")
}

fn write_wayline_placemark(w: &mut XmlWriter, p: &WaylinePlacemark) -> Result<()> {
    start(w, "Placemark")?;
    write_point(w, &p.coordinates)?;
    el(w, "wpml:index", p.index)?;
    el(w, "wpml:executeHeight", p.execute_height)?;
    el(w, "wpml:waypointSpeed", p.waypoint_speed)?;
    write_heading_param(w, "wpml:waypointHeadingParam", &p.waypoint_heading_param)?;
    write_turn_param(w, &p.waypoint_turn_param)?;
    opt_el(w, "wpml:useStraightLine", p.use_straight_line)?;
    for g in &p.action_groups {
        write_action_group(w, g)?;
    }
    end(w, "Placemark")
}

fn write_heading_param(w: &mut XmlWriter, name: &str, h: &HeadingParam) -> Result<()> {
    start(w, name)?;
    el(w, "wpml:waypointHeadingMode", &h.waypoint_heading_mode)?;
    opt_el(w, "wpml:waypointHeadingAngle", h.waypoint_heading_angle)?;
    opt_el(w, "wpml:waypointPoiPoint", h.waypoint_poi_point.as_deref())?;
    opt_el(w, "wpml:waypointHeadingAngleEnable", h.waypoint_heading_angle_enable)?;
    opt_el(w, "wpml:waypointHeadingPathMode", h.waypoint_heading_path_mode.as_deref())?;
    opt_el(w, "wpml:waypointHeadingPoiIndex", h.waypoint_heading_poi_index)?;
    end(w, name)
}

fn write_turn_param(w: &mut XmlWriter, t: &TurnParam) -> Result<()> {
    start(w, "wpml:waypointTurnParam")?;
    el(w, "wpml:waypointTurnMode", &t.waypoint_turn_mode)?;
    opt_el(w, "wpml:waypointTurnDampingDist", t.waypoint_turn_damping_dist)?;
    end(w, "wpml:waypointTurnParam")
}

fn write_action_group(w: &mut XmlWriter, g: &ActionGroup) -> Result<()> {
    start(w, "wpml:actionGroup")?;
    el(w, "wpml:actionGroupId", g.action_group_id)?;
    el(w, "wpml:actionGroupStartIndex", g.action_group_start_index)?;
    el(w, "wpml:actionGroupEndIndex", g.action_group_end_index)?;
    el(w, "wpml:actionGroupMode", &g.action_group_mode)?;

    start(w, "wpml:actionTrigger")?;
    el(w, "wpml:actionTriggerType", &g.action_trigger.action_trigger_type)?;
    opt_el(w, "wpml:actionTriggerParam", g.action_trigger.action_trigger_param)?;
    end(w, "wpml:actionTrigger")?;

    for a in &g.actions {
        start(w, "wpml:action")?;
        el(w, "wpml:actionId", a.action_id)?;
        el(w, "wpml:actionActuatorFunc", &a.action_actuator_func)?;
        write_actuator_param(w, &a.action_actuator_func_param)?;
        end(w, "wpml:action")?;
    }
    end(w, "wpml:actionGroup")
}

fn write_actuator_param(w: &mut XmlWriter, p: &ActuatorFuncParam) -> Result<()> {
    start(w, "wpml:actionActuatorFuncParam")?;
    opt_el(w, "wpml:payloadPositionIndex", p.payload_position_index)?;
    opt_el(w, "wpml:fileSuffix", p.file_suffix.as_deref())?;
    opt_el(w, "wpml:payloadLensIndex", p.payload_lens_index.as_deref())?;
    opt_el(w, "wpml:useGlobalPayloadLensIndex", p.use_global_payload_lens_index)?;
    opt_el(w, "wpml:isPointFocus", p.is_point_focus)?;
    opt_el(w, "wpml:focusX", p.focus_x)?;
    opt_el(w, "wpml:focusY", p.focus_y)?;
    opt_el(w, "wpml:focusRegionWidth", p.focus_region_width)?;
    opt_el(w, "wpml:focusRegionHeight", p.focus_region_height)?;
    opt_el(w, "wpml:isInfiniteFocus", p.is_infinite_focus)?;
    opt_el(w, "wpml:focalLength", p.focal_length)?;
    opt_el(w, "wpml:directoryName", p.directory_name.as_deref())?;
    opt_el(w, "wpml:gimbalHeadingYawBase", p.gimbal_heading_yaw_base.as_deref())?;
    opt_el(w, "wpml:gimbalRotateMode", p.gimbal_rotate_mode.as_deref())?;
    opt_el(w, "wpml:gimbalPitchRotateEnable", p.gimbal_pitch_rotate_enable)?;
    opt_el(w, "wpml:gimbalPitchRotateAngle", p.gimbal_pitch_rotate_angle)?;
    opt_el(w, "wpml:gimbalRollRotateEnable", p.gimbal_roll_rotate_enable)?;
    opt_el(w, "wpml:gimbalRollRotateAngle", p.gimbal_roll_rotate_angle)?;
    opt_el(w, "wpml:gimbalYawRotateEnable", p.gimbal_yaw_rotate_enable)?;
    opt_el(w, "wpml:gimbalYawRotateAngle", p.gimbal_yaw_rotate_angle)?;
    opt_el(w, "wpml:gimbalRotateTimeEnable", p.gimbal_rotate_time_enable)?;
    opt_el(w, "wpml:gimbalRotateTime", p.gimbal_rotate_time)?;
    opt_el(w, "wpml:aircraftHeading", p.aircraft_heading)?;
    opt_el(w, "wpml:aircraftPathMode", p.aircraft_path_mode.as_deref())?;
    opt_el(w, "wpml:hoverTime", p.hover_time)?;
    opt_el(w, "wpml:accurateFrameValid", p.accurate_frame_valid)?;
    opt_el(w, "wpml:targetAngle", p.target_angle)?;
    opt_el(w, "wpml:actionUUID", p.action_uuid.as_deref())?;
    opt_el(w, "wpml:imageWidth", p.image_width)?;
    opt_el(w, "wpml:imageHeight", p.image_height)?;
    opt_el(w, "wpml:AFPos", p.af_pos)?;
    opt_el(w, "wpml:gimbalPort", p.gimbal_port)?;
    opt_el(w, "wpml:orientedCameraType", p.oriented_camera_type)?;
    opt_el(w, "wpml:orientedFilePath", p.oriented_file_path.as_deref())?;
    opt_el(w, "wpml:orientedFileMD5", p.oriented_file_md5.as_deref())?;
    opt_el(w, "wpml:orientedFileSize", p.oriented_file_size)?;
    opt_el(w, "wpml:orientedFileSuffix", p.oriented_file_suffix.as_deref())?;
    opt_el(w, "wpml:orientedPhotoMode", p.oriented_photo_mode.as_deref())?;
    opt_el(w, "wpml:accurateCameraType", p.accurate_camera_type)?;
    opt_el(w, "wpml:accurateFilePath", p.accurate_file_path.as_deref())?;
    opt_el(w, "wpml:accurateFileMD5", p.accurate_file_md5.as_deref())?;
    opt_el(w, "wpml:accurateFileSize", p.accurate_file_size)?;
    opt_el(w, "wpml:accurateFileSuffix", p.accurate_file_suffix.as_deref())?;
    opt_el(w, "wpml:panoShotSubMode", p.pano_shot_sub_mode.as_deref())?;
    opt_el(w, "wpml:recordPointCloudOperate", p.record_point_cloud_operate.as_deref())?;
    opt_el(w, "wpml:smartObliqueCycleMode", p.smart_oblique_cycle_mode.as_deref())?;
    opt_el(w, "wpml:minShootInterval", p.min_shoot_interval)?;
    opt_el(w, "wpml:cameraFocusType", p.camera_focus_type.as_deref())?;
    end(w, "wpml:actionActuatorFuncParam")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    fn template() -> TemplateDocument {
        TemplateDocument {
            author: Some("ops".into()),
            create_time: Some(1),
            update_time: Some(2),
            mission_config: MissionConfig {
                fly_to_wayline_mode: "safely".into(),
                finish_action: "goHome".into(),
                exit_on_rc_lost: "executeLostAction".into(),
                execute_rc_lost_action: Some("goBack".into()),
                take_off_security_height: 20.0,
                global_transitional_speed: 6.0,
                global_rth_height: 100.0,
                ..Default::default()
            },
            folders: vec![TemplateFolder {
                template_type: "waypoint".into(),
                placemarks: vec![TemplatePlacemark::waypoint(0, 116.5, 39.25, 50.0)],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_declaration_and_namespaces() {
        let xml = to_string(marshal_template(&template(), true).unwrap());
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(concat!(
            r#"<kml xmlns="http://www.opengis.net/kml/2.2" "#,
            r#"xmlns:wpml="http://www.dji.com/wpmz/1.0.6">"#,
        )));
        assert!(xml.contains("<wpml:author>ops</wpml:author>"));
        assert!(xml.contains("<wpml:globalRTHHeight>100</wpml:globalRTHHeight>"));
        assert!(xml.contains("<coordinates>116.500000000000000,39.250000000000000</coordinates>"));
    }

    #[test]
    fn test_plain_marshal_keeps_namespaces_as_given() {
        let xml = to_string(marshal(&template(), false).unwrap());
        assert!(xml.contains("<kml><Document>"));

        let mut doc = template();
        doc.xmlns_wpml = Some("http://www.dji.com/wpmz/1.0.2".into());
        let xml = to_string(marshal_template(&doc, false).unwrap());
        assert!(xml.contains(r#"xmlns:wpml="http://www.dji.com/wpmz/1.0.2""#));
        assert!(xml.contains(r#"xmlns="http://www.opengis.net/kml/2.2""#));
    }

    #[test]
    fn test_indent_toggle() {
        let indented = to_string(marshal_template(&template(), true).unwrap());
        let compact = to_string(marshal_template(&template(), false).unwrap());
        assert!(indented.contains("\n  <Document>"));
        assert_eq!(compact.lines().count(), 2);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let xml = to_string(marshal_template(&template(), false).unwrap());
        assert!(!xml.contains("takeOffRefPoint"));
        assert!(!xml.contains("payloadInfo"));
        assert!(!xml.contains("waypointSpeed"));
        assert!(!xml.contains("useStraightLine"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut doc = template();
        doc.author = Some("R&D <ops>".into());
        let xml = to_string(marshal_template(&doc, false).unwrap());
        assert!(xml.contains("<wpml:author>R&amp;D &lt;ops&gt;</wpml:author>"));
    }

    #[test]
    fn test_action_param_elements() {
        let mut doc = WaylinesDocument::default();
        let mut placemark = WaylinePlacemark::waypoint(0, 1.0, 2.0, 50.0, 5.0);
        placemark.action_groups.push(ActionGroup {
            action_group_mode: "sequence".into(),
            action_trigger: ActionTrigger {
                action_trigger_type: "reachPoint".into(),
                action_trigger_param: None,
            },
            actions: vec![WpmlAction {
                action_id: 0,
                action_actuator_func: "orientedShoot".into(),
                action_actuator_func_param: ActuatorFuncParam {
                    af_pos: Some(3),
                    oriented_file_md5: Some("abc".into()),
                    ..Default::default()
                },
            }],
            ..Default::default()
        });
        doc.folders.push(WaylineFolder {
            execute_height_mode: "relativeToStartPoint".into(),
            placemarks: vec![placemark],
            ..Default::default()
        });
        let xml = to_string(marshal_waylines(&doc, false).unwrap());
        assert!(xml.contains("<wpml:AFPos>3</wpml:AFPos>"));
        assert!(xml.contains("<wpml:orientedFileMD5>abc</wpml:orientedFileMD5>"));
        assert!(xml.contains("<wpml:actionActuatorFunc>orientedShoot</wpml:actionActuatorFunc>"));
        assert!(!xml.contains("hoverTime"));
    }
}
