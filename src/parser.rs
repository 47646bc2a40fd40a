use std::str::FromStr;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};

use crate::error::SerializationError;
use crate::wpml_types::*;

type Result<T> = std::result::Result<T, SerializationError>;
type XmlReader<'i> = NsReader<&'i [u8]>;

const WPML_NS_PREFIX: &[u8] = b"http://www.dji.com/wpmz/";
const KML_NS_PREFIX: &[u8] = b"http://www.opengis.net/kml/";

/// Namespace an element resolved to. Elements without a namespace are
/// treated as core KML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Kml,
    Wpml,
    Other,
}

impl Ns {
    fn classify(resolved: &ResolveResult<'_>) -> Self {
        match resolved {
            ResolveResult::Unbound => Ns::Kml,
            ResolveResult::Bound(Namespace(uri)) if uri.starts_with(WPML_NS_PREFIX) => Ns::Wpml,
            ResolveResult::Bound(Namespace(uri)) if uri.starts_with(KML_NS_PREFIX) => Ns::Kml,
            _ => Ns::Other,
        }
    }
}

/// A child element whose start tag has just been read.
struct Child<'i> {
    ns: Ns,
    start: BytesStart<'i>,
    empty: bool,
}

impl Child<'_> {
    fn name(&self) -> String {
        String::from_utf8_lossy(self.start.local_name().as_ref()).into_owned()
    }
}

/// A document tree that can be read back from XML.
pub trait UnmarshalXml: Sized {
    fn unmarshal_from(xml: &[u8]) -> Result<Self>;
}

/// Parse `xml` into `D`, keeping the namespace URIs exactly as found.
pub fn unmarshal<D: UnmarshalXml>(xml: &[u8]) -> Result<D> {
    D::unmarshal_from(xml)
}

/// Parse a `template.kml`, defaulting absent namespace URIs.
pub fn unmarshal_template(xml: &[u8]) -> Result<TemplateDocument> {
    let mut doc: TemplateDocument = unmarshal(xml)?;
    doc.xmlns.get_or_insert_with(|| KML_NAMESPACE.to_string());
    doc.xmlns_wpml.get_or_insert_with(|| WPML_NAMESPACE.to_string());
    Ok(doc)
}

/// Parse a `waylines.wpml`, defaulting absent namespace URIs.
pub fn unmarshal_waylines(xml: &[u8]) -> Result<WaylinesDocument> {
    let mut doc: WaylinesDocument = unmarshal(xml)?;
    doc.xmlns.get_or_insert_with(|| KML_NAMESPACE.to_string());
    doc.xmlns_wpml.get_or_insert_with(|| WPML_NAMESPACE.to_string());
    Ok(doc)
}

impl UnmarshalXml for TemplateDocument {
    fn unmarshal_from(xml: &[u8]) -> Result<Self> {
        let doc = parse_document(xml, parse_template_folder)?;
        Ok(TemplateDocument {
            xmlns: doc.xmlns,
            xmlns_wpml: doc.xmlns_wpml,
            author: doc.author,
            create_time: doc.create_time,
            update_time: doc.update_time,
            mission_config: doc.mission_config,
            folders: doc.folders,
        })
    }
}

impl UnmarshalXml for WaylinesDocument {
    fn unmarshal_from(xml: &[u8]) -> Result<Self> {
        let doc = parse_document(xml, parse_wayline_folder)?;
        Ok(WaylinesDocument {
            xmlns: doc.xmlns,
            xmlns_wpml: doc.xmlns_wpml,
            author: doc.author,
            create_time: doc.create_time,
            update_time: doc.update_time,
            mission_config: doc.mission_config,
            folders: doc.folders,
        })
    }
}

/// Shared shape of both documents; only the folder type differs.
struct ParsedDocument<F> {
    xmlns: Option<String>,
    xmlns_wpml: Option<String>,
    author: Option<String>,
    create_time: Option<i64>,
    update_time: Option<i64>,
    mission_config: MissionConfig,
    folders: Vec<F>,
}

fn parse_document<'i, F>(
    xml: &'i [u8],
    mut parse_folder: impl FnMut(&mut XmlReader<'i>, &Child<'i>) -> Result<F>,
) -> Result<ParsedDocument<F>> {
    let mut reader = NsReader::from_reader(xml);

    let root = loop {
        let (ns, event) = reader.read_resolved_event()?;
        let ns = Ns::classify(&ns);
        match event {
            Event::Start(e) => break Child { ns, start: e, empty: false },
            Event::Empty(e) => break Child { ns, start: e, empty: true },
            Event::Eof => return Err(SerializationError::MissingElement("kml")),
            _ => {}
        }
    };
    if root.start.local_name().as_ref() != b"kml" {
        return Err(SerializationError::UnexpectedRoot {
            expected: "kml",
            found: root.name(),
        });
    }

    let mut doc = ParsedDocument {
        xmlns: None,
        xmlns_wpml: None,
        author: None,
        create_time: None,
        update_time: None,
        mission_config: MissionConfig::default(),
        folders: Vec::new(),
    };
    for attr_result in root.start.attributes() {
        let attr = attr_result?;
        let value = std::str::from_utf8(&attr.value)?.to_string();
        match attr.key.as_ref() {
            b"xmlns" => doc.xmlns = Some(value),
            b"xmlns:wpml" => doc.xmlns_wpml = Some(value),
            _ => {}
        }
    }

    let mut found_document = false;
    if !root.empty {
        while let Some(child) = next_child(&mut reader, &root)? {
            match (child.ns, child.start.local_name().as_ref()) {
                (Ns::Kml, b"Document") if !child.empty => {
                    found_document = true;
                    while let Some(c) = next_child(&mut reader, &child)? {
                        match (c.ns, c.start.local_name().as_ref()) {
                            (Ns::Wpml, b"author") => doc.author = Some(text(&mut reader, &c)?),
                            (Ns::Wpml, b"createTime") => {
                                doc.create_time = Some(number(&mut reader, &c)?)
                            }
                            (Ns::Wpml, b"updateTime") => {
                                doc.update_time = Some(number(&mut reader, &c)?)
                            }
                            (Ns::Wpml, b"missionConfig") => {
                                doc.mission_config = parse_mission_config(&mut reader, &c)?;
                            }
                            (Ns::Kml, b"Folder") => {
                                doc.folders.push(parse_folder(&mut reader, &c)?)
                            }
                            _ => skip(&mut reader, &c)?,
                        }
                    }
                }
                (Ns::Kml, b"Document") => found_document = true,
                _ => skip(&mut reader, &child)?,
            }
        }
    }
    if !found_document {
        return Err(SerializationError::MissingElement("Document"));
    }

    Ok(doc)
}

/// Read up to the next child start tag of `parent`. Returns `None` once the
/// parent's end tag is reached; EOF before that is an error.
fn next_child<'i>(reader: &mut XmlReader<'i>, parent: &Child<'_>) -> Result<Option<Child<'i>>> {
    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let ns = Ns::classify(&ns);
        match event {
            Event::Start(e) => return Ok(Some(Child { ns, start: e, empty: false })),
            Event::Empty(e) => return Ok(Some(Child { ns, start: e, empty: true })),
            Event::End(_) => return Ok(None),
            Event::Eof => return Err(SerializationError::UnclosedElement(parent.name())),
            _ => {}
        }
    }
}

fn skip(reader: &mut XmlReader<'_>, child: &Child<'_>) -> Result<()> {
    if !child.empty {
        reader.read_to_end(child.start.name())?;
    }
    Ok(())
}

/// Trimmed text content of a leaf element.
fn text(reader: &mut XmlReader<'_>, child: &Child<'_>) -> Result<String> {
    if child.empty {
        return Ok(String::new());
    }
    let raw = read_text_owned(reader, &child.start)?;
    Ok(raw.trim().to_string())
}

fn number<T: FromStr>(reader: &mut XmlReader<'_>, child: &Child<'_>) -> Result<T> {
    let value = text(reader, child)?;
    value.parse::<T>().map_err(|_| SerializationError::InvalidNumber {
        element: child.name(),
        value,
    })
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match &*e {
                        b"amp" => text.push('&'),
                        b"lt" => text.push('<'),
                        b"gt" => text.push('>'),
                        b"quot" => text.push('"'),
                        b"apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => {
                return Err(SerializationError::UnclosedElement(
                    String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                ));
            }
            _ => {}
        }
    }

    Ok(text)
}

fn parse_mission_config(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<MissionConfig> {
    let mut c = MissionConfig::default();
    if parent.empty {
        return Ok(c);
    }
    while let Some(child) = next_child(reader, parent)? {
        if child.ns != Ns::Wpml {
            skip(reader, &child)?;
            continue;
        }
        match child.start.local_name().as_ref() {
            b"flyToWaylineMode" => c.fly_to_wayline_mode = text(reader, &child)?,
            b"finishAction" => c.finish_action = text(reader, &child)?,
            b"exitOnRCLost" => c.exit_on_rc_lost = text(reader, &child)?,
            b"executeRCLostAction" => c.execute_rc_lost_action = Some(text(reader, &child)?),
            b"takeOffSecurityHeight" => c.take_off_security_height = number(reader, &child)?,
            b"takeOffRefPoint" => c.take_off_ref_point = Some(text(reader, &child)?),
            b"takeOffRefPointAGLHeight" => {
                c.take_off_ref_point_agl_height = Some(number(reader, &child)?);
            }
            b"globalTransitionalSpeed" => c.global_transitional_speed = number(reader, &child)?,
            b"globalRTHHeight" => c.global_rth_height = number(reader, &child)?,
            b"droneInfo" if !child.empty => {
                while let Some(d) = next_child(reader, &child)? {
                    match (d.ns, d.start.local_name().as_ref()) {
                        (Ns::Wpml, b"droneEnumValue") => {
                            c.drone_info.drone_enum_value = number(reader, &d)?
                        }
                        (Ns::Wpml, b"droneSubEnumValue") => {
                            c.drone_info.drone_sub_enum_value = number(reader, &d)?;
                        }
                        _ => skip(reader, &d)?,
                    }
                }
            }
            b"payloadInfo" if !child.empty => {
                let mut p = PayloadInfo::default();
                while let Some(d) = next_child(reader, &child)? {
                    match (d.ns, d.start.local_name().as_ref()) {
                        (Ns::Wpml, b"payloadEnumValue") => {
                            p.payload_enum_value = number(reader, &d)?
                        }
                        (Ns::Wpml, b"payloadSubEnumValue") => {
                            p.payload_sub_enum_value = number(reader, &d)?
                        }
                        (Ns::Wpml, b"payloadPositionIndex") => {
                            p.payload_position_index = number(reader, &d)?;
                        }
                        _ => skip(reader, &d)?,
                    }
                }
                c.payload_info = Some(p);
            }
            _ => skip(reader, &child)?,
        }
    }
    Ok(c)
}

fn parse_template_folder(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<TemplateFolder> {
    let mut f = TemplateFolder::default();
    if parent.empty {
        return Ok(f);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Kml, b"Placemark") => f.placemarks.push(parse_template_placemark(reader, &child)?),
            (Ns::Wpml, b"templateType") => f.template_type = text(reader, &child)?,
            (Ns::Wpml, b"templateId") => f.template_id = number(reader, &child)?,
            (Ns::Wpml, b"waylineCoordinateSysParam") if !child.empty => {
                while let Some(c) = next_child(reader, &child)? {
                    let param = &mut f.wayline_coordinate_sys_param;
                    match (c.ns, c.start.local_name().as_ref()) {
                        (Ns::Wpml, b"coordinateMode") => param.coordinate_mode = text(reader, &c)?,
                        (Ns::Wpml, b"heightMode") => param.height_mode = text(reader, &c)?,
                        _ => skip(reader, &c)?,
                    }
                }
            }
            (Ns::Wpml, b"autoFlightSpeed") => f.auto_flight_speed = number(reader, &child)?,
            (Ns::Wpml, b"globalHeight") => f.global_height = Some(number(reader, &child)?),
            (Ns::Wpml, b"caliFlightEnable") => f.cali_flight_enable = Some(number(reader, &child)?),
            (Ns::Wpml, b"gimbalPitchMode") => f.gimbal_pitch_mode = Some(text(reader, &child)?),
            (Ns::Wpml, b"globalWaypointHeadingParam") => {
                f.global_waypoint_heading_param = Some(parse_heading_param(reader, &child)?);
            }
            (Ns::Wpml, b"globalWaypointTurnMode") => {
                f.global_waypoint_turn_mode = Some(text(reader, &child)?);
            }
            (Ns::Wpml, b"globalUseStraightLine") => {
                f.global_use_straight_line = Some(number(reader, &child)?);
            }
            (Ns::Wpml, b"payloadParam") => {
                f.payload_param = Some(parse_payload_param(reader, &child)?)
            }
            _ => skip(reader, &child)?,
        }
    }
    Ok(f)
}

fn parse_payload_param(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<PayloadParam> {
    let mut p = PayloadParam::default();
    if parent.empty {
        return Ok(p);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Wpml, b"payloadPositionIndex") => {
                p.payload_position_index = number(reader, &child)?
            }
            (Ns::Wpml, b"focusMode") => p.focus_mode = Some(text(reader, &child)?),
            (Ns::Wpml, b"meteringMode") => p.metering_mode = Some(text(reader, &child)?),
            (Ns::Wpml, b"imageFormat") => p.image_format = Some(text(reader, &child)?),
            _ => skip(reader, &child)?,
        }
    }
    Ok(p)
}

fn parse_wayline_folder(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<WaylineFolder> {
    let mut f = WaylineFolder::default();
    if parent.empty {
        return Ok(f);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Kml, b"Placemark") => f.placemarks.push(parse_wayline_placemark(reader, &child)?),
            (Ns::Wpml, b"templateId") => f.template_id = number(reader, &child)?,
            (Ns::Wpml, b"executeHeightMode") => f.execute_height_mode = text(reader, &child)?,
            (Ns::Wpml, b"waylineId") => f.wayline_id = number(reader, &child)?,
            (Ns::Wpml, b"distance") => f.distance = Some(number(reader, &child)?),
            (Ns::Wpml, b"duration") => f.duration = Some(number(reader, &child)?),
            (Ns::Wpml, b"autoFlightSpeed") => f.auto_flight_speed = number(reader, &child)?,
            _ => skip(reader, &child)?,
        }
    }
    Ok(f)
}

/// Read `<Point><coordinates>` into its raw string.
fn parse_point(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<String> {
    let mut coordinates = String::new();
    if parent.empty {
        return Ok(coordinates);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Kml, b"coordinates") => coordinates = text(reader, &child)?,
            _ => skip(reader, &child)?,
        }
    }
    Ok(coordinates)
}

fn parse_template_placemark(
    reader: &mut XmlReader<'_>,
    parent: &Child<'_>,
) -> Result<TemplatePlacemark> {
    let mut p = TemplatePlacemark::default();
    if parent.empty {
        return Ok(p);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Kml, b"Point") => p.coordinates = parse_point(reader, &child)?,
            (Ns::Wpml, b"index") => p.index = number(reader, &child)?,
            (Ns::Wpml, b"ellipsoidHeight") => p.ellipsoid_height = Some(number(reader, &child)?),
            (Ns::Wpml, b"height") => p.height = Some(number(reader, &child)?),
            (Ns::Wpml, b"useGlobalHeight") => p.use_global_height = Some(number(reader, &child)?),
            (Ns::Wpml, b"useGlobalSpeed") => p.use_global_speed = Some(number(reader, &child)?),
            (Ns::Wpml, b"waypointSpeed") => p.waypoint_speed = Some(number(reader, &child)?),
            (Ns::Wpml, b"useGlobalHeadingParam") => {
                p.use_global_heading_param = Some(number(reader, &child)?);
            }
            (Ns::Wpml, b"waypointHeadingParam") => {
                p.waypoint_heading_param = Some(parse_heading_param(reader, &child)?);
            }
            (Ns::Wpml, b"useGlobalTurnParam") => {
                p.use_global_turn_param = Some(number(reader, &child)?)
            }
            (Ns::Wpml, b"waypointTurnParam") => {
                p.waypoint_turn_param = Some(parse_turn_param(reader, &child)?)
            }
            (Ns::Wpml, b"useStraightLine") => p.use_straight_line = Some(number(reader, &child)?),
            (Ns::Wpml, b"gimbalPitchAngle") => p.gimbal_pitch_angle = Some(number(reader, &child)?),
            (Ns::Wpml, b"actionGroup") => p.action_groups.push(parse_action_group(reader, &child)?),
            _ => skip(reader, &child)?,
        }
    }
    Ok(p)
}

fn parse_wayline_placemark(
    reader: &mut XmlReader<'_>,
    parent: &Child<'_>,
) -> Result<WaylinePlacemark> {
    let mut p = WaylinePlacemark::default();
    if parent.empty {
        return Ok(p);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Kml, b"Point") => p.coordinates = parse_point(reader, &child)?,
            (Ns::Wpml, b"index") => p.index = number(reader, &child)?,
            (Ns::Wpml, b"executeHeight") => p.execute_height = number(reader, &child)?,
            (Ns::Wpml, b"waypointSpeed") => p.waypoint_speed = number(reader, &child)?,
            (Ns::Wpml, b"waypointHeadingParam") => {
                p.waypoint_heading_param = parse_heading_param(reader, &child)?
            }
            (Ns::Wpml, b"waypointTurnParam") => {
                p.waypoint_turn_param = parse_turn_param(reader, &child)?
            }
            (Ns::Wpml, b"useStraightLine") => p.use_straight_line = Some(number(reader, &child)?),
            (Ns::Wpml, b"actionGroup") => p.action_groups.push(parse_action_group(reader, &child)?),
            _ => skip(reader, &child)?,
        }
    }
    Ok(p)
}

fn parse_heading_param(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<HeadingParam> {
    let mut h = HeadingParam::default();
    if parent.empty {
        return Ok(h);
    }
    while let Some(child) = next_child(reader, parent)? {
        if child.ns != Ns::Wpml {
            skip(reader, &child)?;
            continue;
        }
        match child.start.local_name().as_ref() {
            b"waypointHeadingMode" => h.waypoint_heading_mode = text(reader, &child)?,
            b"waypointHeadingAngle" => h.waypoint_heading_angle = Some(number(reader, &child)?),
            b"waypointPoiPoint" => h.waypoint_poi_point = Some(text(reader, &child)?),
            b"waypointHeadingAngleEnable" => {
                h.waypoint_heading_angle_enable = Some(number(reader, &child)?)
            }
            b"waypointHeadingPathMode" => {
                h.waypoint_heading_path_mode = Some(text(reader, &child)?)
            }
            b"waypointHeadingPoiIndex" => {
                h.waypoint_heading_poi_index = Some(number(reader, &child)?)
            }
            _ => skip(reader, &child)?,
        }
    }
    Ok(h)
}

fn parse_turn_param(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<TurnParam> {
    let mut t = TurnParam::default();
    if parent.empty {
        return Ok(t);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Wpml, b"waypointTurnMode") => t.waypoint_turn_mode = text(reader, &child)?,
            (Ns::Wpml, b"waypointTurnDampingDist") => {
                t.waypoint_turn_damping_dist = Some(number(reader, &child)?);
            }
            _ => skip(reader, &child)?,
        }
    }
    Ok(t)
}

fn parse_action_group(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<ActionGroup> {
    let mut g = ActionGroup::default();
    if parent.empty {
        return Ok(g);
    }
    while let Some(child) = next_child(reader, parent)? {
        if child.ns != Ns::Wpml {
            skip(reader, &child)?;
            continue;
        }
        match child.start.local_name().as_ref() {
            b"actionGroupId" => g.action_group_id = number(reader, &child)?,
            b"actionGroupStartIndex" => g.action_group_start_index = number(reader, &child)?,
            b"actionGroupEndIndex" => g.action_group_end_index = number(reader, &child)?,
            b"actionGroupMode" => g.action_group_mode = text(reader, &child)?,
            b"actionTrigger" if !child.empty => {
                while let Some(c) = next_child(reader, &child)? {
                    match (c.ns, c.start.local_name().as_ref()) {
                        (Ns::Wpml, b"actionTriggerType") => {
                            g.action_trigger.action_trigger_type = text(reader, &c)?
                        }
                        (Ns::Wpml, b"actionTriggerParam") => {
                            g.action_trigger.action_trigger_param = Some(number(reader, &c)?);
                        }
                        _ => skip(reader, &c)?,
                    }
                }
            }
            b"action" => g.actions.push(parse_action(reader, &child)?),
            _ => skip(reader, &child)?,
        }
    }
    Ok(g)
}

fn parse_action(reader: &mut XmlReader<'_>, parent: &Child<'_>) -> Result<WpmlAction> {
    let mut a = WpmlAction::default();
    if parent.empty {
        return Ok(a);
    }
    while let Some(child) = next_child(reader, parent)? {
        match (child.ns, child.start.local_name().as_ref()) {
            (Ns::Wpml, b"actionId") => a.action_id = number(reader, &child)?,
            (Ns::Wpml, b"actionActuatorFunc") => a.action_actuator_func = text(reader, &child)?,
            (Ns::Wpml, b"actionActuatorFuncParam") => {
                a.action_actuator_func_param = parse_actuator_param(reader, &child)?;
            }
            _ => skip(reader, &child)?,
        }
    }
    Ok(a)
}

fn parse_actuator_param(
    reader: &mut XmlReader<'_>,
    parent: &Child<'_>,
) -> Result<ActuatorFuncParam> {
    let mut p = ActuatorFuncParam::default();
    if parent.empty {
        return Ok(p);
    }
    while let Some(c) = next_child(reader, parent)? {
        if c.ns != Ns::Wpml {
            skip(reader, &c)?;
            continue;
        }
        match c.start.local_name().as_ref() {
            b"payloadPositionIndex" => p.payload_position_index = Some(number(reader, &c)?),
            b"fileSuffix" => p.file_suffix = Some(text(reader, &c)?),
            b"payloadLensIndex" => p.payload_lens_index = Some(text(reader, &c)?),
            b"useGlobalPayloadLensIndex" => {
                p.use_global_payload_lens_index = Some(number(reader, &c)?)
            }
            b"isPointFocus" => p.is_point_focus = Some(number(reader, &c)?),
            b"focusX" => p.focus_x = Some(number(reader, &c)?),
            b"focusY" => p.focus_y = Some(number(reader, &c)?),
            b"focusRegionWidth" => p.focus_region_width = Some(number(reader, &c)?),
            b"focusRegionHeight" => p.focus_region_height = Some(number(reader, &c)?),
            b"isInfiniteFocus" => p.is_infinite_focus = Some(number(reader, &c)?),
            b"focalLength" => p.focal_length = Some(number(reader, &c)?),
            b"directoryName" => p.directory_name = Some(text(reader, &c)?),
            b"gimbalHeadingYawBase" => p.gimbal_heading_yaw_base = Some(text(reader, &c)?),
            b"gimbalRotateMode" => p.gimbal_rotate_mode = Some(text(reader, &c)?),
            b"gimbalPitchRotateEnable" => p.gimbal_pitch_rotate_enable = Some(number(reader, &c)?),
            b"gimbalPitchRotateAngle" => p.gimbal_pitch_rotate_angle = Some(number(reader, &c)?),
            b"gimbalRollRotateEnable" => p.gimbal_roll_rotate_enable = Some(number(reader, &c)?),
            b"gimbalRollRotateAngle" => p.gimbal_roll_rotate_angle = Some(number(reader, &c)?),
            b"gimbalYawRotateEnable" => p.gimbal_yaw_rotate_enable = Some(number(reader, &c)?),
            b"gimbalYawRotateAngle" => p.gimbal_yaw_rotate_angle = Some(number(reader, &c)?),
            b"gimbalRotateTimeEnable" => p.gimbal_rotate_time_enable = Some(number(reader, &c)?),
            b"gimbalRotateTime" => p.gimbal_rotate_time = Some(number(reader, &c)?),
            b"aircraftHeading" => p.aircraft_heading = Some(number(reader, &c)?),
            b"aircraftPathMode" => p.aircraft_path_mode = Some(text(reader, &c)?),
            b"hoverTime" => p.hover_time = Some(number(reader, &c)?),
            b"accurateFrameValid" => p.accurate_frame_valid = Some(number(reader, &c)?),
            b"targetAngle" => p.target_angle = Some(number(reader, &c)?),
            b"actionUUID" => p.action_uuid = Some(text(reader, &c)?),
            b"imageWidth" => p.image_width = Some(number(reader, &c)?),
            b"imageHeight" => p.image_height = Some(number(reader, &c)?),
            b"AFPos" => p.af_pos = Some(number(reader, &c)?),
            b"gimbalPort" => p.gimbal_port = Some(number(reader, &c)?),
            b"orientedCameraType" => p.oriented_camera_type = Some(number(reader, &c)?),
            b"orientedFilePath" => p.oriented_file_path = Some(text(reader, &c)?),
            b"orientedFileMD5" => p.oriented_file_md5 = Some(text(reader, &c)?),
            b"orientedFileSize" => p.oriented_file_size = Some(number(reader, &c)?),
            b"orientedFileSuffix" => p.oriented_file_suffix = Some(text(reader, &c)?),
            b"orientedPhotoMode" => p.oriented_photo_mode = Some(text(reader, &c)?),
            b"accurateCameraType" => p.accurate_camera_type = Some(number(reader, &c)?),
            b"accurateFilePath" => p.accurate_file_path = Some(text(reader, &c)?),
            b"accurateFileMD5" => p.accurate_file_md5 = Some(text(reader, &c)?),
            b"accurateFileSize" => p.accurate_file_size = Some(number(reader, &c)?),
            b"accurateFileSuffix" => p.accurate_file_suffix = Some(text(reader, &c)?),
            b"panoShotSubMode" => p.pano_shot_sub_mode = Some(text(reader, &c)?),
            b"recordPointCloudOperate" => p.record_point_cloud_operate = Some(text(reader, &c)?),
            b"smartObliqueCycleMode" => p.smart_oblique_cycle_mode = Some(text(reader, &c)?),
            b"minShootInterval" => p.min_shoot_interval = Some(number(reader, &c)?),
            b"cameraFocusType" => p.camera_focus_type = Some(text(reader, &c)?),
            _ => skip(reader, &c)?,
        }
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{marshal, marshal_template, marshal_waylines};

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:wpml="http://www.dji.com/wpmz/1.0.6">
  <Document>
    <wpml:author>fly&amp;co</wpml:author>
    <wpml:createTime>1700000000000</wpml:createTime>
    <wpml:missionConfig>
      <wpml:flyToWaylineMode>safely</wpml:flyToWaylineMode>
      <wpml:finishAction>goHome</wpml:finishAction>
      <wpml:exitOnRCLost>executeLostAction</wpml:exitOnRCLost>
      <wpml:executeRCLostAction>goBack</wpml:executeRCLostAction>
      <wpml:takeOffSecurityHeight>20</wpml:takeOffSecurityHeight>
      <wpml:globalTransitionalSpeed>6</wpml:globalTransitionalSpeed>
      <wpml:globalRTHHeight>120</wpml:globalRTHHeight>
      <wpml:droneInfo>
        <wpml:droneEnumValue>91</wpml:droneEnumValue>
        <wpml:droneSubEnumValue>0</wpml:droneSubEnumValue>
      </wpml:droneInfo>
    </wpml:missionConfig>
    <Folder>
      <wpml:templateType>waypoint</wpml:templateType>
      <wpml:templateId>0</wpml:templateId>
      <wpml:autoFlightSpeed>10</wpml:autoFlightSpeed>
      <Placemark>
        <Point>
          <coordinates>
            116.4074,39.9042
          </coordinates>
        </Point>
        <wpml:index>0</wpml:index>
        <wpml:height>50</wpml:height>
        <wpml:actionGroup>
          <wpml:actionGroupId>0</wpml:actionGroupId>
          <wpml:actionTrigger>
            <wpml:actionTriggerType>reachPoint</wpml:actionTriggerType>
          </wpml:actionTrigger>
          <wpml:action>
            <wpml:actionId>0</wpml:actionId>
            <wpml:actionActuatorFunc>hover</wpml:actionActuatorFunc>
            <wpml:actionActuatorFuncParam>
              <wpml:hoverTime>5</wpml:hoverTime>
            </wpml:actionActuatorFuncParam>
          </wpml:action>
        </wpml:actionGroup>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    #[test]
    fn test_parse_template() {
        let doc = unmarshal_template(TEMPLATE.as_bytes()).unwrap();
        assert_eq!(doc.author.as_deref(), Some("fly&co"));
        assert_eq!(doc.create_time, Some(1_700_000_000_000));
        assert_eq!(doc.update_time, None);
        assert_eq!(doc.mission_config.global_rth_height, 120.0);
        assert_eq!(doc.mission_config.drone_info.drone_enum_value, 91);
        assert_eq!(doc.folders.len(), 1);

        let p = &doc.folders[0].placemarks[0];
        assert_eq!(p.coordinates, "116.4074,39.9042");
        assert_eq!(p.height, Some(50.0));
        let action = &p.action_groups[0].actions[0];
        assert_eq!(action.action_actuator_func, "hover");
        assert_eq!(action.action_actuator_func_param.hover_time, Some(5.0));
    }

    #[test]
    fn test_other_prefix_same_namespace() {
        let xml = concat!(
            r#"<kml xmlns="http://www.opengis.net/kml/2.2" "#,
            r#"xmlns:dji="http://www.dji.com/wpmz/1.0.6">"#,
            "\n<Document><dji:author>ops</dji:author></Document></kml>",
        );
        let doc = unmarshal_template(xml.as_bytes()).unwrap();
        assert_eq!(doc.author.as_deref(), Some("ops"));
        assert_eq!(doc.xmlns_wpml.as_deref(), Some(WPML_NAMESPACE));
    }

    #[test]
    fn test_foreign_namespace_ignored() {
        let xml = r#"<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:x="urn:other">
<Document><x:author>nobody</x:author></Document></kml>"#;
        let doc: TemplateDocument = unmarshal(xml.as_bytes()).unwrap();
        assert_eq!(doc.author, None);
    }

    #[test]
    fn test_namespace_defaults() {
        let xml = "<kml><Document/></kml>";
        let raw: WaylinesDocument = unmarshal(xml.as_bytes()).unwrap();
        assert_eq!(raw.xmlns, None);
        let doc = unmarshal_waylines(xml.as_bytes()).unwrap();
        assert_eq!(doc.xmlns.as_deref(), Some(KML_NAMESPACE));
        assert_eq!(doc.xmlns_wpml.as_deref(), Some(WPML_NAMESPACE));
    }

    #[test]
    fn test_wrong_root() {
        let err = unmarshal_template(b"<gpx><Document/></gpx>").unwrap_err();
        assert!(matches!(err, SerializationError::UnexpectedRoot { expected: "kml", .. }));
    }

    #[test]
    fn test_missing_document() {
        let err = unmarshal_template(b"<kml></kml>").unwrap_err();
        assert!(matches!(err, SerializationError::MissingElement("Document")));
    }

    #[test]
    fn test_invalid_number() {
        let xml = concat!(
            r#"<kml xmlns:wpml="http://www.dji.com/wpmz/1.0.6"><Document>"#,
            "<wpml:createTime>soon</wpml:createTime></Document></kml>",
        );
        let err = unmarshal_template(xml.as_bytes()).unwrap_err();
        match err {
            SerializationError::InvalidNumber { element, value } => {
                assert_eq!(element, "createTime");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_document() {
        let cut =
            br#"<kml xmlns:wpml="http://www.dji.com/wpmz/1.0.6"><Document><wpml:author>trunc"#;
        assert!(matches!(
            unmarshal_template(cut),
            Err(SerializationError::UnclosedElement(ref name)) if name == "author"
        ));

        let cut = TEMPLATE.as_bytes();
        let cut = &cut[..cut.len() / 2];
        assert!(unmarshal_template(cut).is_err());
        assert!(matches!(
            unmarshal_template(b"<kml><Document>"),
            Err(SerializationError::UnclosedElement(ref name)) if name == "Document"
        ));
    }

    #[test]
    fn test_malformed_xml() {
        let err = unmarshal_template(b"<kml><Document></kml>").unwrap_err();
        assert!(matches!(err, SerializationError::Xml(_)));
    }

    #[test]
    fn test_template_round_trip() {
        let doc = unmarshal_template(TEMPLATE.as_bytes()).unwrap();
        let bytes = marshal_template(&doc, true).unwrap();
        assert_eq!(unmarshal_template(&bytes).unwrap(), doc);

        let compact = marshal(&doc, false).unwrap();
        assert_eq!(unmarshal_template(&compact).unwrap(), doc);
    }

    #[test]
    fn test_waylines_round_trip() {
        let mut placemark = WaylinePlacemark::waypoint(3, 116.5, 39.25, 80.0, 7.5);
        placemark.waypoint_heading_param.waypoint_heading_angle = Some(-45.0);
        let doc = WaylinesDocument {
            mission_config: MissionConfig {
                take_off_ref_point: Some("39.25,116.5,0".into()),
                take_off_ref_point_agl_height: Some(0.0),
                payload_info: Some(PayloadInfo {
                    payload_enum_value: 43,
                    payload_sub_enum_value: 0,
                    payload_position_index: 0,
                }),
                ..Default::default()
            },
            folders: vec![WaylineFolder {
                execute_height_mode: "relativeToStartPoint".into(),
                distance: Some(1234.5),
                duration: Some(98.7),
                auto_flight_speed: 10.0,
                placemarks: vec![placemark],
                ..Default::default()
            }],
            ..Default::default()
        };
        let bytes = marshal_waylines(&doc, false).unwrap();
        let back = unmarshal_waylines(&bytes).unwrap();
        assert_eq!(back.folders, doc.folders);
        assert_eq!(back.mission_config, doc.mission_config);
    }
}
