//! In-process simulation backend for headless tests and demos.
//!
//! [`SimWorld`] is a kinematic tree of prismatic, revolute, and fixed joints
//! with sphere collision geometry on links and spherical obstacles around
//! the robot.  It implements [`KinematicModel`]; [`SimProximity`] answers
//! proximity queries against it, and [`SimRobot`] integrates velocity
//! commands and publishes the resulting joint state into a
//! [`JointStateSlot`].  A shared [`SimProbe`] counts what the controller did
//! so tests can assert on it after the robot has been boxed away.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use motum_hal::sim::{SimRobotDescription, SimWorld};
//!
//! let world = Arc::new(SimWorld::new(SimRobotDescription::planar_arm()).unwrap());
//! assert_eq!(world.description().root_link, "base_link");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use motum_types::{
    Contact, ContactKey, JointLimits, JointSample, JointState, MotumError, ProximityResult,
    Vector3,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::feedback::JointStateSlot;
use crate::frames::{FrameTree, Quaternion, Transform3D};
use crate::model::{ControlledJoint, KinematicModel, ProximityService};
use crate::robot::RobotInterface;

// ────────────────────────────────────────────────────────────────────────────
// Description
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimJointType {
    Prismatic,
    Revolute,
    Fixed,
}

fn default_axis() -> Vector3 {
    Vector3::new(0.0, 0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimJointDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SimJointType,
    pub parent: String,
    pub child: String,
    /// Offset of the child link in the parent link at zero position.
    #[serde(default)]
    pub origin: Vector3,
    #[serde(default = "default_axis")]
    pub axis: Vector3,
    /// Required for prismatic and revolute joints.
    #[serde(default)]
    pub limits: Option<JointLimits>,
    #[serde(default)]
    pub initial_position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimCollisionSphere {
    pub link: String,
    pub radius: f64,
}

fn default_obstacle_link() -> String {
    "body".to_string()
}

/// A sphere in the environment, placed in the robot root frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObstacle {
    pub body: String,
    #[serde(default = "default_obstacle_link")]
    pub link: String,
    pub position: Vector3,
    pub radius: f64,
}

/// A static frame attached to a link or to another static frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    pub name: String,
    pub parent: String,
    #[serde(default)]
    pub translation: Vector3,
    #[serde(default = "default_axis")]
    pub rotation_axis: Vector3,
    #[serde(default)]
    pub rotation_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRobotDescription {
    pub root_link: String,
    #[serde(default)]
    pub joints: Vec<SimJointDescription>,
    #[serde(default)]
    pub collision: Vec<SimCollisionSphere>,
    #[serde(default)]
    pub obstacles: Vec<SimObstacle>,
    /// Link pairs checked for self collision, as `[link_a, link_b]`.
    #[serde(default)]
    pub self_collision_pairs: Vec<[String; 2]>,
    #[serde(default)]
    pub frames: Vec<SimFrame>,
}

impl SimRobotDescription {
    /// Two prismatic joints moving a tool in the x/y plane, a fixed tool tip,
    /// and a `map` frame one metre behind the base.
    pub fn planar_arm() -> Self {
        let limits = JointLimits {
            lower_position: Some(-2.0),
            upper_position: Some(2.0),
            velocity: 1.0,
            acceleration: None,
            jerk: None,
        };
        Self {
            root_link: "base_link".into(),
            joints: vec![
                SimJointDescription {
                    name: "slide_x".into(),
                    kind: SimJointType::Prismatic,
                    parent: "base_link".into(),
                    child: "carriage".into(),
                    origin: Vector3::zero(),
                    axis: Vector3::new(1.0, 0.0, 0.0),
                    limits: Some(limits.clone()),
                    initial_position: 0.0,
                },
                SimJointDescription {
                    name: "slide_y".into(),
                    kind: SimJointType::Prismatic,
                    parent: "carriage".into(),
                    child: "tool".into(),
                    origin: Vector3::new(0.0, 0.0, 0.5),
                    axis: Vector3::new(0.0, 1.0, 0.0),
                    limits: Some(limits),
                    initial_position: 0.0,
                },
                SimJointDescription {
                    name: "tool_tip_joint".into(),
                    kind: SimJointType::Fixed,
                    parent: "tool".into(),
                    child: "tool_tip".into(),
                    origin: Vector3::new(0.0, 0.0, 0.1),
                    axis: default_axis(),
                    limits: None,
                    initial_position: 0.0,
                },
            ],
            collision: vec![
                SimCollisionSphere {
                    link: "carriage".into(),
                    radius: 0.1,
                },
                SimCollisionSphere {
                    link: "tool_tip".into(),
                    radius: 0.05,
                },
            ],
            obstacles: Vec::new(),
            self_collision_pairs: vec![["tool_tip".into(), "carriage".into()]],
            frames: vec![SimFrame {
                name: "map".into(),
                parent: "base_link".into(),
                translation: Vector3::new(-1.0, 0.0, 0.0),
                rotation_axis: default_axis(),
                rotation_angle: 0.0,
            }],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// Kinematic tree built from a [`SimRobotDescription`].
#[derive(Debug, Clone)]
pub struct SimWorld {
    description: SimRobotDescription,
    /// Root first, then children in joint declaration order.
    links: Vec<String>,
    /// `child link → index into description.joints`.
    parent_joint: BTreeMap<String, usize>,
    controlled: Vec<ControlledJoint>,
    radii: BTreeMap<String, f64>,
    frames: FrameTree,
}

impl SimWorld {
    /// # Errors
    ///
    /// [`MotumError::InvalidGoal`] when the description is not a tree, a
    /// movable joint has missing or inconsistent limits, or a frame hangs off
    /// an unknown parent.
    pub fn new(description: SimRobotDescription) -> Result<Self, MotumError> {
        let mut links = vec![description.root_link.clone()];
        let mut parent_joint = BTreeMap::new();
        for (idx, joint) in description.joints.iter().enumerate() {
            if !links.contains(&joint.parent) {
                return Err(MotumError::InvalidGoal(format!(
                    "joint \"{}\" hangs off unknown link \"{}\"",
                    joint.name, joint.parent
                )));
            }
            if links.contains(&joint.child) {
                return Err(MotumError::InvalidGoal(format!(
                    "link \"{}\" has more than one parent",
                    joint.child
                )));
            }
            if joint.kind != SimJointType::Fixed {
                let limits = joint.limits.as_ref().ok_or_else(|| {
                    MotumError::InvalidGoal(format!("movable joint \"{}\" has no limits", joint.name))
                })?;
                limits.check().map_err(|e| {
                    MotumError::InvalidGoal(format!("joint \"{}\" has invalid limits: {e}", joint.name))
                })?;
            }
            links.push(joint.child.clone());
            parent_joint.insert(joint.child.clone(), idx);
        }

        let radii = description
            .collision
            .iter()
            .map(|c| (c.link.clone(), c.radius))
            .collect();

        let mut frames = FrameTree::new();
        for frame in &description.frames {
            if !links.contains(&frame.parent) && !frames.contains(&frame.parent) {
                return Err(MotumError::InvalidGoal(format!(
                    "frame \"{}\" hangs off unknown frame \"{}\"",
                    frame.name, frame.parent
                )));
            }
            frames.set_transform(
                &frame.parent,
                &frame.name,
                Transform3D::new(
                    frame.translation,
                    Quaternion::from_axis_angle(frame.rotation_axis, frame.rotation_angle),
                ),
            );
        }

        let mut world = Self {
            description,
            links,
            parent_joint,
            controlled: Vec::new(),
            radii,
            frames,
        };
        world.controlled = world.build_controlled_joints();
        Ok(world)
    }

    pub fn description(&self) -> &SimRobotDescription {
        &self.description
    }

    /// Joint positions the simulation starts from.
    pub fn initial_sample(&self) -> JointSample {
        JointSample {
            positions: self
                .controlled
                .iter()
                .filter_map(|j| {
                    let desc = self.description.joints.iter().find(|d| d.name == j.name)?;
                    Some((j.name.clone(), desc.initial_position))
                })
                .collect(),
            velocities: BTreeMap::new(),
        }
    }

    fn build_controlled_joints(&self) -> Vec<ControlledJoint> {
        let movable: Vec<&SimJointDescription> = self
            .description
            .joints
            .iter()
            .filter(|j| j.kind != SimJointType::Fixed)
            .collect();
        movable
            .iter()
            .map(|joint| {
                let collision_links = self
                    .description
                    .collision
                    .iter()
                    .filter(|c| self.reduce_to_controlled(&c.link) == joint.child)
                    .map(|c| c.link.clone())
                    .collect();
                let is_leaf = !movable
                    .iter()
                    .any(|other| other.name != joint.name && self.is_ancestor_or_self(&joint.child, &other.child));
                ControlledJoint {
                    name: joint.name.clone(),
                    child_link: joint.child.clone(),
                    limits: joint.limits.clone().unwrap_or(JointLimits {
                        lower_position: None,
                        upper_position: None,
                        velocity: 0.0,
                        acceleration: None,
                        jerk: None,
                    }),
                    collision_links,
                    is_leaf,
                }
            })
            .collect()
    }

    fn is_ancestor_or_self(&self, ancestor: &str, link: &str) -> bool {
        let mut current = link.to_string();
        loop {
            if current == ancestor {
                return true;
            }
            match self.parent_joint.get(&current) {
                Some(&idx) => current = self.description.joints[idx].parent.clone(),
                None => return false,
            }
        }
    }

    /// Pose of a robot link in the root link.
    fn link_pose(&self, link: &str, state: &JointState) -> Option<Transform3D> {
        if !self.links.iter().any(|l| l == link) {
            return None;
        }
        let mut chain = Vec::new();
        let mut current = link.to_string();
        while let Some(&idx) = self.parent_joint.get(&current) {
            chain.push(idx);
            current = self.description.joints[idx].parent.clone();
        }
        let pose = chain.iter().rev().fold(Transform3D::identity(), |acc, &idx| {
            let joint = &self.description.joints[idx];
            let q = match joint.kind {
                SimJointType::Fixed => 0.0,
                _ => state.position(&joint.name).unwrap_or(joint.initial_position),
            };
            let motion = match joint.kind {
                SimJointType::Prismatic => Transform3D::from_translation(joint.axis.scale(q)),
                SimJointType::Revolute => {
                    Transform3D::new(Vector3::zero(), Quaternion::from_axis_angle(joint.axis, q))
                }
                SimJointType::Fixed => Transform3D::identity(),
            };
            acc.compose(Transform3D::from_translation(joint.origin)).compose(motion)
        });
        Some(pose)
    }

    /// Pose of any known frame in the root link.
    fn pose_in_root(&self, frame: &str, state: &JointState) -> Result<Transform3D, MotumError> {
        if let Some(pose) = self.link_pose(frame, state) {
            return Ok(pose);
        }
        // Static frames may hang off moving links.
        for link in &self.links {
            if let Some(offset) = self.frames.lookup(link, frame)
                && let Some(pose) = self.link_pose(link, state)
            {
                return Ok(pose.compose(offset));
            }
        }
        Err(MotumError::InvalidGoal(format!("unknown frame \"{frame}\"")))
    }

    fn link_center(&self, link: &str, state: &JointState) -> Vector3 {
        self.link_pose(link, state)
            .map(|p| p.translation)
            .unwrap_or_default()
    }
}

impl KinematicModel for SimWorld {
    fn root_link(&self) -> &str {
        &self.description.root_link
    }

    fn controlled_joints(&self) -> &[ControlledJoint] {
        &self.controlled
    }

    fn frame_pose(&self, root: &str, frame: &str, state: &JointState) -> Result<Transform3D, MotumError> {
        let root_pose = self.pose_in_root(root, state)?;
        let frame_pose = self.pose_in_root(frame, state)?;
        Ok(root_pose.inverse().compose(frame_pose))
    }

    fn reduce_to_controlled(&self, link: &str) -> String {
        let mut current = link.to_string();
        while let Some(&idx) = self.parent_joint.get(&current) {
            let joint = &self.description.joints[idx];
            if joint.kind != SimJointType::Fixed {
                return current;
            }
            current = joint.parent.clone();
        }
        current
    }

    fn link_order(&self, a: &str, b: &str) -> Ordering {
        let rank = |l: &str| self.links.iter().position(|x| x == l).unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Counters
// ────────────────────────────────────────────────────────────────────────────

/// Counters shared between the simulated components and a test.
#[derive(Debug, Default)]
pub struct SimProbe {
    proximity_queries: AtomicUsize,
    last_query_distance: AtomicU64,
    commands_applied: AtomicUsize,
    stops: AtomicUsize,
}

impl SimProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn proximity_queries(&self) -> usize {
        self.proximity_queries.load(AtomicOrdering::SeqCst)
    }

    pub fn last_query_distance(&self) -> f64 {
        f64::from_bits(self.last_query_distance.load(AtomicOrdering::SeqCst))
    }

    pub fn commands_applied(&self) -> usize {
        self.commands_applied.load(AtomicOrdering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(AtomicOrdering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimProximity
// ────────────────────────────────────────────────────────────────────────────

/// Sphere-sphere proximity queries against a [`SimWorld`].
pub struct SimProximity {
    world: Arc<SimWorld>,
    probe: Arc<SimProbe>,
}

impl SimProximity {
    pub fn new(world: Arc<SimWorld>, probe: Arc<SimProbe>) -> Box<Self> {
        Box::new(Self { world, probe })
    }

    fn contact(center_a: Vector3, radius_a: f64, center_b: Vector3, radius_b: f64) -> Contact {
        let offset = center_a.sub(center_b);
        let normal = offset.normalized().unwrap_or(Vector3::new(1.0, 0.0, 0.0));
        Contact {
            distance: offset.norm() - radius_a - radius_b,
            normal,
            point_on_a: center_a.sub(normal.scale(radius_a)),
            point_on_b: center_b.add(normal.scale(radius_b)),
        }
    }
}

impl ProximityService for SimProximity {
    fn query(&mut self, state: &JointState, max_distance: f64) -> Result<ProximityResult, MotumError> {
        self.probe.proximity_queries.fetch_add(1, AtomicOrdering::SeqCst);
        self.probe
            .last_query_distance
            .store(max_distance.to_bits(), AtomicOrdering::SeqCst);

        let world = &self.world;
        let mut result = ProximityResult::default();
        for sphere in &world.description.collision {
            let center = world.link_center(&sphere.link, state);
            for obstacle in &world.description.obstacles {
                let contact = Self::contact(center, sphere.radius, obstacle.position, obstacle.radius);
                if contact.distance <= max_distance {
                    result.external.insert(
                        ContactKey::new(&sphere.link, &obstacle.body, &obstacle.link),
                        contact,
                    );
                }
            }
        }
        for [a, b] in &world.description.self_collision_pairs {
            let (Some(&ra), Some(&rb)) = (world.radii.get(a), world.radii.get(b)) else {
                continue;
            };
            let contact = Self::contact(world.link_center(a, state), ra, world.link_center(b, state), rb);
            if contact.distance <= max_distance {
                result.self_collision.insert((a.clone(), b.clone()), contact);
            }
        }
        debug!(
            max_distance,
            external = result.external.len(),
            self_collision = result.self_collision.len(),
            "sim proximity query"
        );
        Ok(result)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobot
// ────────────────────────────────────────────────────────────────────────────

/// Integrates velocity commands and publishes the result as joint feedback.
pub struct SimRobot {
    world: Arc<SimWorld>,
    positions: BTreeMap<String, f64>,
    velocities: BTreeMap<String, f64>,
    sample_period: f64,
    feed: Arc<JointStateSlot>,
    probe: Arc<SimProbe>,
}

impl SimRobot {
    /// Create a robot at the world's initial state and publish that state.
    pub fn new(
        world: Arc<SimWorld>,
        feed: Arc<JointStateSlot>,
        sample_period: f64,
        probe: Arc<SimProbe>,
    ) -> Box<Self> {
        let initial = world.initial_sample();
        let robot = Box::new(Self {
            world,
            positions: initial.positions,
            velocities: BTreeMap::new(),
            sample_period,
            feed,
            probe,
        });
        robot.publish();
        robot
    }

    fn publish(&self) {
        self.feed.publish(JointSample {
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
        });
    }
}

impl RobotInterface for SimRobot {
    fn id(&self) -> &str {
        "sim"
    }

    fn send_velocities(&mut self, commands: &BTreeMap<String, f64>) -> Result<(), MotumError> {
        // Reject the whole command before touching any joint.
        let mut accepted = Vec::with_capacity(commands.len());
        for (name, velocity) in commands {
            let joint = self.world.joint(name).ok_or_else(|| MotumError::Hardware {
                component: "sim".into(),
                details: format!("unknown joint \"{name}\""),
            })?;
            if !velocity.is_finite() {
                return Err(MotumError::Hardware {
                    component: name.clone(),
                    details: format!("non-finite velocity {velocity}"),
                });
            }
            accepted.push((name, *velocity, joint.limits.clone()));
        }
        for (name, velocity, limits) in accepted {
            let v = velocity.max(-limits.velocity).min(limits.velocity);
            let q = self.positions.get(name).copied().unwrap_or(0.0) + v * self.sample_period;
            self.positions.insert(name.clone(), limits.clamp_position(q));
            self.velocities.insert(name.clone(), v);
        }
        self.probe.commands_applied.fetch_add(1, AtomicOrdering::SeqCst);
        self.publish();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MotumError> {
        self.velocities.values_mut().for_each(|v| *v = 0.0);
        self.probe.stops.fetch_add(1, AtomicOrdering::SeqCst);
        self.publish();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
