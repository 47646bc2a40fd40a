use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::wpml_types::*;

/// Render the executable waylines of a mission as a GeoJSON FeatureCollection:
/// the route as one LineString, followed by one Point per placemark.
pub fn mission_to_feature_collection(mission: &WpmlMission) -> FeatureCollection {
    let mut features = Vec::new();

    if let Some(doc) = &mission.waylines {
        for folder in &doc.folders {
            features.extend(folder_to_features(folder));
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn folder_to_features(folder: &WaylineFolder) -> Vec<Feature> {
    // Placemarks with unreadable coordinates are left out of the preview.
    let points: Vec<(&WaylinePlacemark, Vec<f64>)> = folder
        .placemarks
        .iter()
        .filter_map(|p| {
            parse_coordinates(&p.coordinates)
                .map(|(lon, lat)| (p, vec![lon, lat, p.execute_height]))
        })
        .collect();

    let mut features = Vec::with_capacity(points.len() + 1);
    if points.len() >= 2 {
        features.push(route_to_feature(folder, &points));
    }
    for (placemark, coords) in points {
        features.push(placemark_to_feature(placemark, coords));
    }
    features
}

fn route_to_feature(folder: &WaylineFolder, points: &[(&WaylinePlacemark, Vec<f64>)]) -> Feature {
    let coords: Vec<Vec<f64>> = points.iter().map(|(_, c)| c.clone()).collect();
    let geometry = Geometry::new(Value::LineString(coords));

    let mut props = Map::new();
    props.insert("wpmlType".to_string(), JsonValue::String("route".to_string()));
    props.insert("waylineId".to_string(), JsonValue::from(folder.wayline_id));
    props.insert(
        "executeHeightMode".to_string(),
        JsonValue::String(folder.execute_height_mode.clone()),
    );
    props.insert("autoFlightSpeed".to_string(), JsonValue::from(folder.auto_flight_speed));
    insert_optional(&mut props, "distance", folder.distance);
    insert_optional(&mut props, "duration", folder.duration);

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn placemark_to_feature(p: &WaylinePlacemark, coords: Vec<f64>) -> Feature {
    let geometry = Geometry::new(Value::Point(coords));

    let actions: Vec<JsonValue> = p
        .action_groups
        .iter()
        .flat_map(|g| &g.actions)
        .map(|a| JsonValue::String(a.action_actuator_func.clone()))
        .collect();

    let mut props = Map::new();
    props.insert("wpmlType".to_string(), JsonValue::String("waypoint".to_string()));
    props.insert("index".to_string(), JsonValue::from(p.index));
    props.insert("executeHeight".to_string(), JsonValue::from(p.execute_height));
    props.insert("waypointSpeed".to_string(), JsonValue::from(p.waypoint_speed));
    props.insert(
        "turnMode".to_string(),
        JsonValue::String(p.waypoint_turn_param.waypoint_turn_mode.clone()),
    );
    props.insert("actions".to_string(), JsonValue::Array(actions));

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn insert_optional(props: &mut Map<String, JsonValue>, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        props.insert(key.to_string(), JsonValue::from(v));
    }
}
