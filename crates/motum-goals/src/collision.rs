//! Collision avoidance constraint synthesis.
//!
//! [`CollisionPolicy::resolve`] turns the ordered directive list of a motion
//! request into a policy once per episode.  [`CollisionSynthesizer`] then
//! applies that policy to every tick's proximity snapshot:
//!
//! - **External**: every controlled joint with collision geometry, and every
//!   end-effector (leaf) joint whether or not it has any, gets a fixed number
//!   of repeller constraints (separately configurable for end-effector
//!   joints).  A leaf joint without geometry is checked at its child link.  Slots without a contact are filled with inert
//!   placeholders so the constraint set has the same names every tick.
//! - **Self**: contacts are keyed by the canonical pair of controlled links
//!   they reduce to, and each pair yields at most one constraint.
//!
//! The largest soft threshold generated becomes the query distance for the
//! next proximity request.

use std::collections::BTreeMap;

use motum_hal::{ControlledJoint, KinematicModel};
use motum_types::{
    Bounds, CollisionAvoidanceConfig, CollisionDirective, CollisionEntry, Constraint, ContactKey,
    Expression, MotumError, ProximityResult, Thresholds, Vector3, WEIGHT_COLLISION_AVOIDANCE,
    WeightClass,
};
use tracing::debug;

pub const EXTERNAL_PREFIX: &str = "ExternalCollisionAvoidance";
pub const SELF_PREFIX: &str = "SelfCollisionAvoidance";

/// Distance beyond which a contact is treated as irrelevant.
const FAR_AWAY: f64 = 50.0;
/// Slack allowed for far-away contacts.
const FAR_AWAY_SLACK: f64 = 1e4;

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum PairRule {
    Allow,
    Avoid(Option<f64>),
}

#[derive(Debug, Clone, PartialEq)]
struct PairDirective {
    robot_link: String,
    body: String,
    rule: PairRule,
}

/// What the directive list asks for, resolved once per episode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollisionPolicy {
    pub external: bool,
    pub self_collision: bool,
    /// Soft-threshold override: the distance of the last `AVOID_ALL`.  An
    /// `AVOID_ALL` without a distance clears an earlier override.
    pub soft_override: Option<f64>,
    pairs: Vec<PairDirective>,
}

impl CollisionPolicy {
    pub fn resolve(entries: &[CollisionEntry]) -> Self {
        let mut soft_override = None;
        let mut pairs = Vec::new();
        for entry in entries {
            match &entry.directive {
                CollisionDirective::AvoidAll => soft_override = entry.min_distance,
                CollisionDirective::AvoidPair { robot_link, body } => pairs.push(PairDirective {
                    robot_link: robot_link.clone(),
                    body: body.clone(),
                    rule: PairRule::Avoid(entry.min_distance),
                }),
                CollisionDirective::AllowPair { robot_link, body } => pairs.push(PairDirective {
                    robot_link: robot_link.clone(),
                    body: body.clone(),
                    rule: PairRule::Allow,
                }),
                CollisionDirective::AllowAll | CollisionDirective::AllowAllSelf => {}
            }
        }
        let last = entries.last().map(|e| &e.directive);
        Self {
            external: !matches!(last, Some(CollisionDirective::AllowAll)),
            self_collision: !matches!(
                last,
                Some(CollisionDirective::AllowAll | CollisionDirective::AllowAllSelf)
            ),
            soft_override,
            pairs,
        }
    }

    /// Last matching per-pair rule for a contact, if any.
    fn pair_rule(&self, key: &ContactKey) -> Option<&PairRule> {
        self.pairs
            .iter()
            .rev()
            .find(|p| p.robot_link == key.robot_link && p.body == key.body)
            .map(|p| &p.rule)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Synthesizer
// ────────────────────────────────────────────────────────────────────────────

/// Constraints produced for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionConstraints {
    pub external: Vec<Constraint>,
    pub self_collision: Vec<Constraint>,
    /// Largest soft threshold among the generated constraints.
    pub max_distance: f64,
}

impl CollisionConstraints {
    pub fn len(&self) -> usize {
        self.external.len() + self.self_collision.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_constraints(self) -> impl Iterator<Item = Constraint> {
        self.external.into_iter().chain(self.self_collision)
    }
}

/// Horizon-dependent quantities shared by every repeller of one tick.
#[derive(Debug, Clone, Copy)]
struct Window {
    qp_limit: f64,
    horizon_time: f64,
}

impl Window {
    fn new(config: &CollisionAvoidanceConfig, sample_period: f64, control_horizon: usize) -> Self {
        let horizon_time = sample_period * control_horizon.max(1) as f64;
        Self {
            qp_limit: config.max_velocity * horizon_time,
            horizon_time,
        }
    }

    /// Bounds for one repeller at `distance` with the given thresholds.
    fn bounds(&self, distance: f64, hard: f64, soft: f64) -> (Bounds, f64) {
        let limit = self.qp_limit;
        let hard = hard.min(soft / 2.0);
        let lower = symmetric_clamp(soft - distance, limit);
        let slack = if distance > hard {
            symmetric_clamp(soft - hard, limit)
        } else {
            lower
        };
        let slack = slack / self.horizon_time;
        let slack = if distance > FAR_AWAY {
            FAR_AWAY_SLACK
        } else {
            slack.max(0.0)
        };
        (
            Bounds::Inequality {
                lower,
                upper: Some(slack),
            },
            slack,
        )
    }
}

/// `value` limited to `±limit`; unlike `f64::clamp` a negative or NaN limit
/// cannot panic.
fn symmetric_clamp(value: f64, limit: f64) -> f64 {
    value.max(-limit).min(limit)
}

fn repeller_weight(contacts: usize, repellers: usize) -> f64 {
    match contacts.min(repellers) {
        0 => 0.0,
        n => WEIGHT_COLLISION_AVOIDANCE / n as f64,
    }
}

fn repeller(
    name: String,
    expression: Expression,
    window: Window,
    distance: f64,
    thresholds: Thresholds,
    weight: f64,
    max_velocity: f64,
) -> Constraint {
    let (bounds, slack) = window.bounds(distance, thresholds.hard, thresholds.soft);
    Constraint {
        name,
        expression,
        bounds,
        weight,
        weight_class: WeightClass::CollisionAvoidance,
        reference_velocity: max_velocity,
        upper_slack_limit: Some(slack),
    }
}

pub struct CollisionSynthesizer {
    policy: CollisionPolicy,
    config: CollisionAvoidanceConfig,
    query_distance: f64,
}

impl CollisionSynthesizer {
    pub fn new(policy: CollisionPolicy, config: CollisionAvoidanceConfig, model: &dyn KinematicModel) -> Self {
        let mut synthesizer = Self {
            policy,
            config,
            query_distance: 0.0,
        };
        synthesizer.query_distance = synthesizer.initial_query_distance(model);
        synthesizer
    }

    pub fn policy(&self) -> &CollisionPolicy {
        &self.policy
    }

    /// Distance to pass to the next proximity query.
    pub fn query_distance(&self) -> f64 {
        self.query_distance
    }

    /// Whether anything will ever be generated.
    pub fn is_enabled(&self) -> bool {
        self.policy.external || self.policy.self_collision
    }

    fn external_thresholds(&self, joint: &ControlledJoint) -> (Thresholds, usize) {
        let configured = self.config.external_for(&joint.name);
        let repellers = if joint.is_leaf {
            self.config.eef_repellers
        } else {
            configured.repellers
        };
        let thresholds = Thresholds {
            hard: configured.hard,
            soft: self.policy.soft_override.unwrap_or(configured.soft),
        };
        (thresholds, repellers)
    }

    /// Exact pair, then the reversed pair, then the per-link minimum.
    pub fn self_thresholds(&self, link_a: &str, link_b: &str) -> Thresholds {
        if let Some(t) = self.config.self_for_pair(link_a, link_b) {
            return t;
        }
        if let Some(t) = self.config.self_for_pair(link_b, link_a) {
            return t;
        }
        let a = self.config.self_for_link(link_a);
        let b = self.config.self_for_link(link_b);
        Thresholds {
            hard: a.hard.min(b.hard),
            soft: a.soft.min(b.soft),
        }
    }

    fn initial_query_distance(&self, model: &dyn KinematicModel) -> f64 {
        let mut distance: f64 = 0.0;
        if self.policy.external {
            for joint in model.controlled_joints().iter().filter(|j| j.is_leaf || !j.collision_links.is_empty()) {
                distance = distance.max(self.external_thresholds(joint).0.soft);
            }
            for pair in &self.policy.pairs {
                if let PairRule::Avoid(Some(d)) = pair.rule {
                    distance = distance.max(d);
                }
            }
        }
        if self.policy.self_collision {
            distance = distance.max(self.config.self_default.soft);
            for t in self.config.self_links.values() {
                distance = distance.max(t.soft);
            }
            for p in &self.config.self_pairs {
                distance = distance.max(p.soft);
            }
        }
        distance
    }

    /// Generate this tick's collision constraints and update the query distance.
    ///
    /// # Errors
    ///
    /// [`MotumError::SelfCollisionViolated`] when a self contact is already
    /// penetrating.
    pub fn synthesize(
        &mut self,
        proximity: &ProximityResult,
        model: &dyn KinematicModel,
        sample_period: f64,
        control_horizon: usize,
    ) -> Result<CollisionConstraints, MotumError> {
        let window = Window::new(&self.config, sample_period, control_horizon);
        let mut out = CollisionConstraints::default();
        if self.policy.external {
            self.external(proximity, model, window, &mut out);
        }
        if self.policy.self_collision {
            self.self_collision(proximity, model, window, &mut out)?;
        }
        debug!(
            external = out.external.len(),
            self_collision = out.self_collision.len(),
            max_distance = out.max_distance,
            "collision constraints synthesized"
        );
        if !out.is_empty() {
            self.query_distance = out.max_distance;
        }
        Ok(out)
    }

    fn external(
        &self,
        proximity: &ProximityResult,
        model: &dyn KinematicModel,
        window: Window,
        out: &mut CollisionConstraints,
    ) {
        let root = model.root_link();
        for joint in model.controlled_joints() {
            let links: &[String] = if !joint.collision_links.is_empty() {
                &joint.collision_links
            } else if joint.is_leaf {
                std::slice::from_ref(&joint.child_link)
            } else {
                continue;
            };
            let Some(first_link) = links.first() else {
                continue;
            };
            let (thresholds, repellers) = self.external_thresholds(joint);

            let mut contacts: Vec<(&ContactKey, &motum_types::Contact, Thresholds)> = Vec::new();
            for link in links {
                for (key, contact) in proximity.external_for_link(link) {
                    let contact_thresholds = match self.policy.pair_rule(key) {
                        Some(PairRule::Allow) => continue,
                        Some(PairRule::Avoid(Some(soft))) => Thresholds {
                            hard: thresholds.hard,
                            soft: *soft,
                        },
                        Some(PairRule::Avoid(None)) | None => thresholds,
                    };
                    contacts.push((key, contact, contact_thresholds));
                }
            }
            contacts.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance).then_with(|| a.0.cmp(b.0)));

            let weight = repeller_weight(contacts.len(), repellers);
            for idx in 0..repellers {
                let name = format!("{EXTERNAL_PREFIX}/{}/{idx}", joint.child_link);
                let (expression, distance, t) = match contacts.get(idx) {
                    Some((key, contact, t)) => (
                        Expression::dot_link_position(root, &key.robot_link, contact.normal),
                        contact.distance,
                        *t,
                    ),
                    None => (
                        Expression::dot_link_position(root, first_link, Vector3::new(0.0, 0.0, 1.0)),
                        self.config.unchecked_distance,
                        thresholds,
                    ),
                };
                out.max_distance = out.max_distance.max(t.soft);
                out.external.push(repeller(
                    name,
                    expression,
                    window,
                    distance,
                    t,
                    weight,
                    self.config.max_velocity,
                ));
            }
        }
    }

    fn self_collision(
        &self,
        proximity: &ProximityResult,
        model: &dyn KinematicModel,
        window: Window,
        out: &mut CollisionConstraints,
    ) -> Result<(), MotumError> {
        let root = model.root_link();

        struct Candidate<'p> {
            link_a: &'p str,
            link_b: &'p str,
            contact: &'p motum_types::Contact,
            flipped: bool,
            count: usize,
        }

        let mut pairs: BTreeMap<(String, String), Candidate<'_>> = BTreeMap::new();
        for ((raw_a, raw_b), contact) in &proximity.self_collision {
            if contact.distance < 0.0 {
                return Err(MotumError::SelfCollisionViolated {
                    link_a: raw_a.clone(),
                    link_b: raw_b.clone(),
                    distance: contact.distance,
                });
            }
            let reduced_a = model.reduce_to_controlled(raw_a);
            let reduced_b = model.reduce_to_controlled(raw_b);
            if reduced_a == reduced_b {
                continue;
            }
            let flipped = model.link_order(&reduced_a, &reduced_b).is_gt();
            let key = if flipped {
                (reduced_b, reduced_a)
            } else {
                (reduced_a, reduced_b)
            };
            let candidate = Candidate {
                link_a: raw_a,
                link_b: raw_b,
                contact,
                flipped,
                count: 1,
            };
            match pairs.get_mut(&key) {
                Some(existing) => {
                    let count = existing.count + 1;
                    if contact.distance < existing.contact.distance {
                        *existing = candidate;
                    }
                    existing.count = count;
                }
                None => {
                    pairs.insert(key, candidate);
                }
            }
        }

        for ((a, b), candidate) in pairs {
            let thresholds = self.self_thresholds(&a, &b);
            // Keep the expression increasing with separation in canonical order.
            let (first, second, normal) = if candidate.flipped {
                (candidate.link_b, candidate.link_a, candidate.contact.normal.scale(-1.0))
            } else {
                (candidate.link_a, candidate.link_b, candidate.contact.normal)
            };
            out.max_distance = out.max_distance.max(thresholds.soft);
            out.self_collision.push(repeller(
                format!("{SELF_PREFIX}/{a}/{b}/0"),
                Expression::dot_link_offset(root, first, second, normal),
                window,
                candidate.contact.distance,
                thresholds,
                repeller_weight(candidate.count, self.config.self_repellers),
                self.config.max_velocity,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motum_hal::{SimRobotDescription, SimWorld};
    use motum_types::{Contact, ExternalThresholds, PairThresholds};

    fn world() -> SimWorld {
        SimWorld::new(SimRobotDescription::planar_arm()).unwrap()
    }

    fn contact(distance: f64) -> Contact {
        Contact {
            distance,
            normal: Vector3::new(1.0, 0.0, 0.0),
            point_on_a: Vector3::zero(),
            point_on_b: Vector3::zero(),
        }
    }

    fn proximity() -> ProximityResult {
        let mut p = ProximityResult::default();
        p.external.insert(ContactKey::new("carriage", "box", "body"), contact(0.03));
        p.external.insert(ContactKey::new("tool_tip", "box", "body"), contact(0.2));
        p.self_collision.insert(("tool_tip".into(), "carriage".into()), contact(0.04));
        p
    }

    fn synth(entries: &[CollisionEntry], config: CollisionAvoidanceConfig) -> CollisionSynthesizer {
        CollisionSynthesizer::new(CollisionPolicy::resolve(entries), config, &world())
    }

    #[test]
    fn allow_all_last_disables_everything() {
        let mut s = synth(
            &[CollisionEntry::avoid_all(0.1), CollisionEntry::allow_all()],
            CollisionAvoidanceConfig::default(),
        );
        assert!(!s.is_enabled());
        let out = s.synthesize(&proximity(), &world(), 0.05, 5).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn avoid_all_alone_generates_both_kinds() {
        let mut s = synth(&[CollisionEntry::avoid_all(0.1)], CollisionAvoidanceConfig::default());
        let out = s.synthesize(&proximity(), &world(), 0.05, 5).unwrap();
        assert!(!out.external.is_empty());
        assert!(!out.self_collision.is_empty());
        // Carriage at 0.03 is inside the 0.1 override and pushed out at the
        // velocity limit; the tool tip at 0.2 is outside it.
        let lowers: Vec<f64> = out
            .external
            .iter()
            .map(|c| match c.bounds {
                Bounds::Inequality { lower, .. } => lower,
                _ => panic!("not an inequality"),
            })
            .collect();
        assert!((lowers[0] - 0.05).abs() < 1e-12);
        assert!(lowers[1] < 0.0);
        assert!(out.max_distance >= 0.1);
        assert_eq!(s.query_distance(), out.max_distance);
    }

    #[test]
    fn empty_directive_list_generates_both_kinds() {
        let policy = CollisionPolicy::resolve(&[]);
        assert!(policy.external && policy.self_collision);
        assert_eq!(policy.soft_override, None);
    }

    #[test]
    fn allow_all_self_keeps_external_only() {
        let policy = CollisionPolicy::resolve(&[CollisionEntry::allow_all_self()]);
        assert!(policy.external);
        assert!(!policy.self_collision);
    }

    #[test]
    fn later_avoid_all_overrides_earlier_distance() {
        let policy = CollisionPolicy::resolve(&[CollisionEntry::avoid_all(0.3), CollisionEntry::avoid_all(0.1)]);
        assert_eq!(policy.soft_override, Some(0.1));
    }

    #[test]
    fn avoid_all_without_distance_clears_the_override() {
        let plain = CollisionEntry {
            directive: CollisionDirective::AvoidAll,
            min_distance: None,
        };
        let policy = CollisionPolicy::resolve(&[CollisionEntry::avoid_all(0.3), plain]);
        assert_eq!(policy.soft_override, None);
    }

    #[test]
    fn leaf_joint_without_geometry_still_gets_repellers() {
        let mut description = SimRobotDescription::planar_arm();
        description.collision.retain(|c| c.link == "carriage");
        description.self_collision_pairs.clear();
        let world = SimWorld::new(description).unwrap();
        let config = CollisionAvoidanceConfig {
            eef_repellers: 2,
            ..CollisionAvoidanceConfig::default()
        };
        let mut s = CollisionSynthesizer::new(CollisionPolicy::resolve(&[]), config, &world);
        let out = s
            .synthesize(&ProximityResult::default(), &world, 0.05, 5)
            .unwrap();
        let names: Vec<&str> = out.external.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ExternalCollisionAvoidance/carriage/0",
                "ExternalCollisionAvoidance/tool/0",
                "ExternalCollisionAvoidance/tool/1",
            ]
        );
    }

    #[test]
    fn repeller_counts_are_fixed_with_placeholders() {
        let config = CollisionAvoidanceConfig {
            external_default: ExternalThresholds {
                hard: 0.0,
                soft: 0.05,
                repellers: 3,
            },
            eef_repellers: 2,
            ..CollisionAvoidanceConfig::default()
        };
        let mut s = synth(&[], config);
        let out = s.synthesize(&proximity(), &world(), 0.05, 5).unwrap();
        let names: Vec<&str> = out.external.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ExternalCollisionAvoidance/carriage/0",
                "ExternalCollisionAvoidance/carriage/1",
                "ExternalCollisionAvoidance/carriage/2",
                "ExternalCollisionAvoidance/tool/0",
                "ExternalCollisionAvoidance/tool/1",
            ]
        );
        // One real contact per joint: full weight, placeholders inert.
        assert_eq!(out.external[0].weight, WEIGHT_COLLISION_AVOIDANCE);
        assert_eq!(
            out.external[1].bounds,
            Bounds::Inequality {
                lower: -0.05,
                upper: Some(FAR_AWAY_SLACK)
            }
        );
    }

    #[test]
    fn repeller_numerics() {
        let window = Window {
            qp_limit: 0.05,
            horizon_time: 0.25,
        };
        // Inside the soft zone: push out, slack of (soft - hard) per second.
        let (bounds, slack) = window.bounds(0.03, 0.0, 0.05);
        let Bounds::Inequality { lower, upper } = bounds else {
            panic!("not an inequality");
        };
        assert!((lower - 0.02).abs() < 1e-12);
        assert!((slack - 0.2).abs() < 1e-12);
        assert_eq!(upper, Some(slack));
        // Hard threshold is capped at half the soft threshold.
        let (_, slack) = window.bounds(0.03, 0.04, 0.05);
        assert!((slack - 0.1).abs() < 1e-12);
        // At or below hard: slack follows the lower bound.
        let (_, slack) = window.bounds(0.01, 0.04, 0.05);
        assert!((slack - 0.16).abs() < 1e-12);
        assert_eq!(repeller_weight(0, 3), 0.0);
        assert_eq!(repeller_weight(5, 2), 25.0);
    }

    #[test]
    fn negative_velocity_limit_does_not_panic() {
        let window = Window {
            qp_limit: -0.05,
            horizon_time: 0.25,
        };
        let (bounds, _) = window.bounds(0.03, 0.0, 0.05);
        assert!(matches!(bounds, Bounds::Inequality { .. }));
        assert_eq!(symmetric_clamp(0.3, 0.1), 0.1);
        assert_eq!(symmetric_clamp(-0.3, 0.1), -0.1);
    }

    #[test]
    fn allow_pair_drops_the_contact() {
        let mut s = synth(
            &[CollisionEntry::avoid_all(0.1), CollisionEntry::allow_pair("carriage", "box")],
            CollisionAvoidanceConfig::default(),
        );
        let out = s.synthesize(&proximity(), &world(), 0.05, 5).unwrap();
        let carriage = &out.external[0];
        assert_eq!(carriage.name, "ExternalCollisionAvoidance/carriage/0");
        assert_eq!(carriage.weight, 0.0);
    }

    #[test]
    fn mirrored_self_pairs_collapse_to_one_canonical_constraint() {
        let mut p = ProximityResult::default();
        p.self_collision.insert(("tool_tip".into(), "carriage".into()), contact(0.04));
        p.self_collision.insert(("carriage".into(), "tool_tip".into()), contact(0.03));
        let mut s = synth(&[CollisionEntry::allow_all()], CollisionAvoidanceConfig::default());
        s.policy.self_collision = true;
        let out = s.synthesize(&p, &world(), 0.05, 5).unwrap();
        assert_eq!(out.self_collision.len(), 1);
        let c = &out.self_collision[0];
        assert_eq!(c.name, "SelfCollisionAvoidance/carriage/tool/0");
        assert_eq!(c.weight, WEIGHT_COLLISION_AVOIDANCE);
        let Bounds::Inequality { lower, .. } = c.bounds else {
            panic!("not an inequality");
        };
        // Nearest contact (0.03) wins.
        assert!((lower - 0.02).abs() < 1e-12);
    }

    #[test]
    fn self_threshold_fallback_order() {
        let mut config = CollisionAvoidanceConfig::default();
        config.self_links.insert("carriage".into(), Thresholds { hard: 0.01, soft: 0.2 });
        config.self_links.insert("tool".into(), Thresholds { hard: 0.02, soft: 0.1 });
        let s = synth(&[], config.clone());
        // Neither order configured: per-link minimum of each threshold.
        assert_eq!(s.self_thresholds("carriage", "tool"), Thresholds { hard: 0.01, soft: 0.1 });

        config.self_pairs.push(PairThresholds {
            link_a: "tool".into(),
            link_b: "carriage".into(),
            hard: 0.0,
            soft: 0.3,
        });
        let s = synth(&[], config.clone());
        // Reversed key found.
        assert_eq!(s.self_thresholds("carriage", "tool"), Thresholds { hard: 0.0, soft: 0.3 });

        config.self_pairs.push(PairThresholds {
            link_a: "carriage".into(),
            link_b: "tool".into(),
            hard: 0.0,
            soft: 0.4,
        });
        let s = synth(&[], config);
        // Exact key beats reversed.
        assert_eq!(s.self_thresholds("carriage", "tool"), Thresholds { hard: 0.0, soft: 0.4 });
    }

    #[test]
    fn penetrating_self_contact_is_fatal() {
        let mut p = ProximityResult::default();
        p.self_collision.insert(("tool_tip".into(), "carriage".into()), contact(-0.01));
        let mut s = synth(&[], CollisionAvoidanceConfig::default());
        assert!(matches!(
            s.synthesize(&p, &world(), 0.05, 5),
            Err(MotumError::SelfCollisionViolated { .. })
        ));
    }

    #[test]
    fn initial_query_distance_covers_override() {
        let s = synth(&[CollisionEntry::avoid_all(0.25)], CollisionAvoidanceConfig::default());
        assert_eq!(s.query_distance(), 0.25);
    }
}
