//! JMS markers → physics mass points.

use std::path::Path;

use anyhow::Context;
use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Converted, Diagnostic, FileOutcome};
use crate::error::{Result, TagError};
use crate::jms::{read_jms_file, JmsMarker, JmsModel};
use crate::math::Point3;
use crate::tag::{read_tag_file, write_tag_file};
use crate::tags::physics::{MassPoint, Physics};

/// JMS distances are in hundredths of a world unit.
pub const JMS_SCALE: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConvertOptions {
    /// Recompute per-point mass and density, centre of mass and moments.
    pub compute_mass_distribution: bool,
}

impl Default for PhysicsConvertOptions {
    fn default() -> Self {
        Self {
            compute_mass_distribution: true,
        }
    }
}

fn mass_point_from_marker(marker: &JmsMarker, existing: Option<&MassPoint>) -> Result<MassPoint> {
    let model_node = i16::try_from(marker.parent).map_err(|_| {
        TagError::MalformedInput(format!(
            "marker '{}' has parent node {}, outside the tag's node index range",
            marker.name, marker.parent
        ))
    })?;
    let mut point = match existing {
        Some(existing) => existing.clone(),
        None => MassPoint::new(&marker.name),
    };
    let rotation = marker.rotation.to_matrix();
    point.name = marker.name.as_str().into();
    point.model_node = model_node;
    point.position = Point3(marker.translation / JMS_SCALE);
    point.radius = marker.radius / JMS_SCALE;
    point.forward = Point3(rotation.x);
    point.up = Point3(rotation.z);
    Ok(point)
}

/// Spread the body's mass over its points by relative mass, then derive the
/// centre of mass and the principal moments about it.
pub fn compute_mass_distribution(physics: &mut Physics) {
    let relative_total: f32 = physics.mass_points.iter().map(|p| p.relative_mass.max(0.0)).sum();
    if physics.mass_points.is_empty() || relative_total <= 0.0 {
        return;
    }

    let total_mass = physics.mass;
    let density = physics.density;
    let mut weighted = Vector3::new(0.0, 0.0, 0.0);
    for point in physics.mass_points.iter_mut() {
        point.mass = total_mass * point.relative_mass.max(0.0) / relative_total;
        point.density = density * point.relative_density;
        weighted += point.position.0 * point.mass;
    }
    let center = if total_mass > 0.0 {
        weighted / total_mass
    } else {
        Vector3::new(0.0, 0.0, 0.0)
    };
    physics.center_of_mass = Point3(center);

    let (mut xx, mut yy, mut zz) = (0.0f32, 0.0f32, 0.0f32);
    for point in physics.mass_points.iter() {
        let d = point.position.0 - center;
        // solid sphere about its own centre
        let own = 0.4 * point.mass * point.radius * point.radius;
        xx += point.mass * (d.y * d.y + d.z * d.z) + own;
        yy += point.mass * (d.x * d.x + d.z * d.z) + own;
        zz += point.mass * (d.x * d.x + d.y * d.y) + own;
    }
    physics.xx_moment = xx * physics.moment_scale;
    physics.yy_moment = yy * physics.moment_scale;
    physics.zz_moment = zz * physics.moment_scale;
}

/// Build physics from a JMS model's markers, keeping the tunables of mass
/// points in `existing` whose names match.
pub fn jms_to_physics(
    jms: &JmsModel,
    existing: Option<&Physics>,
    options: &PhysicsConvertOptions,
) -> anyhow::Result<Converted<Physics>> {
    let mut diagnostics = Vec::new();
    let mut physics = existing.cloned().unwrap_or_else(Physics::new);

    let previous = std::mem::take(&mut physics.mass_points);
    let mut mass_points = Vec::with_capacity(jms.markers.len());
    for marker in &jms.markers {
        let matched = previous
            .iter()
            .find(|p| p.name.as_str().eq_ignore_ascii_case(&marker.name));
        if existing.is_some() && matched.is_none() {
            diagnostics.push(Diagnostic::info(format!("new mass point '{}'", marker.name)));
        }
        mass_points.push(mass_point_from_marker(marker, matched)?);
    }
    for dropped in previous
        .iter()
        .filter(|p| !jms.markers.iter().any(|m| m.name.eq_ignore_ascii_case(p.name.as_str())))
    {
        warn!("mass point '{}' has no marker and was removed", dropped.name);
        diagnostics.push(Diagnostic::warning(format!(
            "mass point '{}' has no marker and was removed",
            dropped.name
        )));
    }
    if mass_points.is_empty() {
        diagnostics.push(Diagnostic::warning("model has no markers, physics has no mass points"));
    }
    physics.mass_points = mass_points.into();

    let powered_count = physics.powered_mass_points.len();
    for point in physics.mass_points.iter_mut() {
        let in_range = usize::try_from(point.powered_mass_point).map_or(true, |index| index < powered_count);
        if !in_range {
            diagnostics.push(Diagnostic::warning(format!(
                "mass point '{}' used powered mass point {} of {}, cleared",
                point.name, point.powered_mass_point, powered_count
            )));
            point.powered_mass_point = -1;
        }
    }

    if options.compute_mass_distribution {
        compute_mass_distribution(&mut physics);
    }

    // bounding radius of all mass point spheres about the centre of mass
    let center = physics.center_of_mass.0;
    physics.radius = physics
        .mass_points
        .iter()
        .map(|p| (p.position.0 - center).magnitude() + p.radius)
        .fold(0.0, f32::max);

    Ok(Converted {
        tag: physics,
        diagnostics,
    })
}

pub fn convert_jms_file(source: &Path, destination: &Path, options: &PhysicsConvertOptions) -> anyhow::Result<FileOutcome> {
    let jms = read_jms_file(source).with_context(|| format!("Failed to read JMS {}", source.display()))?;

    let existing = if destination.is_file() {
        Some(
            read_tag_file::<Physics>(destination)
                .with_context(|| format!("Failed to read existing physics {}", destination.display()))?,
        )
    } else {
        None
    };

    let converted = jms_to_physics(&jms, existing.as_ref(), options)?;
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(
        path = %source.display(),
        mass_points = converted.tag.mass_points.len(),
        updated = existing.is_some(),
        "converted jms to physics"
    );
    Ok(FileOutcome::written(converted.diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quaternion;

    fn marker(name: &str, parent: i32, rotation: Quaternion, translation: [f32; 3], radius: f32) -> JmsMarker {
        JmsMarker {
            name: name.to_string(),
            region: 0,
            parent,
            rotation,
            translation: Vector3::new(translation[0], translation[1], translation[2]),
            radius,
        }
    }

    fn wheels() -> JmsModel {
        JmsModel {
            markers: vec![
                marker("front wheel", 1, Quaternion::identity(), [100.0, 0.0, -20.0], 25.0),
                marker("rear wheel", 0, Quaternion::identity(), [-100.0, 0.0, -20.0], 25.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn markers_become_scaled_mass_points() {
        let physics = jms_to_physics(&wheels(), None, &Default::default()).unwrap().tag;
        assert_eq!(physics.mass_points.len(), 2);
        let front = &physics.mass_points[0];
        assert_eq!(front.name.as_str(), "front wheel");
        assert_eq!(front.model_node, 1);
        assert_eq!(front.position, Point3::new(1.0, 0.0, -0.2));
        assert_eq!(front.radius, 0.25);
        assert_eq!(front.forward, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(front.up, Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn orientation_uses_matrix_columns() {
        // 90 degrees about z: forward turns to +y, up stays +z
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let jms = JmsModel {
            markers: vec![marker("turret", 0, Quaternion::new(0.0, 0.0, h, h), [0.0; 3], 10.0)],
            ..Default::default()
        };
        let point = &jms_to_physics(&jms, None, &Default::default()).unwrap().tag.mass_points[0];
        assert!((point.forward.0 - Vector3::new(0.0, 1.0, 0.0)).magnitude() < 1e-6);
        assert!((point.up.0 - Vector3::new(0.0, 0.0, 1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn existing_tunables_survive_an_update() {
        let mut tuned = MassPoint::new("FRONT WHEEL");
        tuned.relative_mass = 3.0;
        tuned.flags = MassPoint::METALLIC;
        tuned.friction_type = 2;
        let mut stale = MassPoint::new("spoiler");
        stale.relative_mass = 9.0;
        let existing = Physics {
            mass: 400.0,
            mass_points: vec![tuned, stale].into(),
            ..Physics::new()
        };

        let converted = jms_to_physics(&wheels(), Some(&existing), &Default::default()).unwrap();
        let physics = converted.tag;
        assert_eq!(physics.mass, 400.0);
        let front = &physics.mass_points[0];
        assert_eq!(front.name.as_str(), "front wheel");
        assert_eq!(front.flags, MassPoint::METALLIC);
        assert_eq!(front.friction_type, 2);
        assert_eq!(front.relative_mass, 3.0);
        // the rear wheel is new and gets defaults
        assert_eq!(physics.mass_points[1].relative_mass, 1.0);

        assert!(converted.diagnostics.iter().any(|d| d.message.contains("spoiler")));
        assert!(converted.diagnostics.iter().any(|d| d.message.contains("rear wheel")));

        // 3:1 split of 400
        assert!((front.mass - 300.0).abs() < 1e-3);
        assert!((physics.mass_points[1].mass - 100.0).abs() < 1e-3);
        assert!((physics.center_of_mass.0.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn moments_of_symmetric_pair() {
        let physics = jms_to_physics(&wheels(), None, &Default::default()).unwrap().tag;
        // two half-unit masses one unit either side of the centre along x
        let own = 2.0 * 0.4 * 0.5 * 0.25 * 0.25;
        assert!((physics.xx_moment - own).abs() < 1e-5);
        assert!((physics.yy_moment - (1.0 + own)).abs() < 1e-5);
        assert!((physics.zz_moment - (1.0 + own)).abs() < 1e-5);
        assert!((physics.radius - 1.25).abs() < 1e-5);
    }

    #[test]
    fn distribution_can_be_left_alone() {
        let options = PhysicsConvertOptions {
            compute_mass_distribution: false,
        };
        let physics = jms_to_physics(&wheels(), None, &options).unwrap().tag;
        assert_eq!(physics.mass_points[0].mass, 0.0);
        assert_eq!(physics.xx_moment, 0.0);
    }

    #[test]
    fn out_of_range_powered_mass_point_is_cleared() {
        let mut tuned = MassPoint::new("front wheel");
        tuned.powered_mass_point = 4;
        let existing = Physics {
            mass_points: vec![tuned].into(),
            ..Physics::new()
        };
        let converted = jms_to_physics(&wheels(), Some(&existing), &Default::default()).unwrap();
        assert_eq!(converted.tag.mass_points[0].powered_mass_point, -1);
    }

    #[test]
    fn marker_parent_past_node_range_is_rejected() {
        let jms = JmsModel {
            markers: vec![marker("hull", 40_000, Quaternion::identity(), [0.0; 3], 10.0)],
            ..Default::default()
        };
        let err = jms_to_physics(&jms, None, &Default::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<TagError>(), Some(TagError::MalformedInput(_))));
        assert!(err.to_string().contains("40000"), "{}", err);
    }

    #[test]
    fn valid_powered_mass_point_is_kept() {
        let mut tuned = MassPoint::new("front wheel");
        tuned.powered_mass_point = 1;
        let existing = Physics {
            mass_points: vec![tuned].into(),
            powered_mass_points: vec![Default::default(); 2].into(),
            ..Physics::new()
        };
        let converted = jms_to_physics(&wheels(), Some(&existing), &Default::default()).unwrap();
        assert_eq!(converted.tag.mass_points[0].powered_mass_point, 1);
        assert!(!converted.diagnostics.iter().any(|d| d.message.contains("powered")));
    }
}
