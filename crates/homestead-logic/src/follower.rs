//! Path following with local steering and stuck recovery.
//!
//! One `PathFollower` drives one agent. Each frame it:
//! 1. Reads the agent position (collider center, else transform origin)
//! 2. Builds a path if it holds none, else falls back to a straight line
//! 3. Skips to the farthest visible waypoint
//! 4. Advances past reached waypoints, completing on the last one
//! 5. Bends the desired direction away from nearby obstacles (±45° max)
//! 6. Picks a facing that does not flicker on diagonals
//! 7. Emits a `MovementCommand`
//! 8. Samples displacement to detect and recover from getting stuck
//!
//! Everything happens inside one `tick`; multi-frame progress lives in the
//! held path and stuck counters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::collision::{ColliderId, ObstacleFilter, ObstacleQuery};
use crate::events::{CancelReason, NavEvent};
use crate::geometry::Vec2;
use crate::planner::PathPlanner;

/// Reference to a moving target (entity bits in the engine).
pub type TargetRef = u64;

/// Repulsion distances are clamped to this to keep inverse-square finite.
const MIN_REPULSION_DISTANCE: f32 = 0.05;

/// Tunables for path following.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerConfig {
    /// Physical radius of the agent.
    pub agent_radius: f32,
    /// Extra clearance added to the radius for visibility and probe queries.
    pub clearance_margin: f32,
    /// Distance at which the final waypoint counts as reached.
    pub stop_distance: f32,
    /// Distance at which intermediate waypoints count as reached.
    pub waypoint_tolerance: f32,
    /// New point destinations closer than this to the current one are ignored.
    pub retarget_threshold: f32,
    /// Moving targets trigger a rebuild when they drift this far from the path end.
    pub repath_distance: f32,
    /// Spacing between line-of-sight samples.
    pub los_sample_spacing: f32,
    pub min_los_samples: usize,
    /// Probe distances ahead of the agent while walking.
    pub walk_lookahead: Vec<f32>,
    /// Probe distances ahead of the agent while running.
    pub run_lookahead: Vec<f32>,
    /// Weight of the summed repulsion when blending with the desired direction.
    pub avoidance_weight: f32,
    /// Steering never deviates more than this from the desired direction.
    pub max_deflection_degrees: f32,
    /// Vertical movement must exceed horizontal by this factor to face up/down.
    pub facing_vertical_bias: f32,
    /// Seconds between stuck samples.
    pub stuck_check_interval: f32,
    /// Minimum displacement per sample window to count as progress.
    pub stuck_min_movement: f32,
    /// Consecutive stuck windows before navigation is cancelled.
    pub max_stuck_retries: u32,
    /// Radius of the obstacle dump logged on stuck cancellation.
    pub diagnostic_radius: f32,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            agent_radius: 0.3,
            clearance_margin: 0.05,
            stop_distance: 0.15,
            waypoint_tolerance: 0.1,
            retarget_threshold: 0.25,
            repath_distance: 1.0,
            los_sample_spacing: 0.3,
            min_los_samples: 3,
            walk_lookahead: vec![0.35, 0.7],
            run_lookahead: vec![0.6, 1.2, 1.8],
            avoidance_weight: 0.6,
            max_deflection_degrees: 45.0,
            facing_vertical_bias: 1.5,
            stuck_check_interval: 0.3,
            stuck_min_movement: 0.05,
            max_stuck_retries: 3,
            diagnostic_radius: 2.0,
        }
    }
}

impl FollowerConfig {
    /// Inflation radius the planner should use so its paths pass the
    /// follower's own visibility test.
    pub fn inflation_radius(&self) -> f32 {
        self.agent_radius + self.clearance_margin
    }
}

/// Ordered waypoints plus a cursor that only moves forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavPath {
    waypoints: Vec<Vec2>,
    cursor: usize,
}

impl NavPath {
    pub fn new(waypoints: Vec<Vec2>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    pub fn waypoints(&self) -> &[Vec2] {
        &self.waypoints
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn current(&self) -> Option<Vec2> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn last(&self) -> Option<Vec2> {
        self.waypoints.last().copied()
    }

    pub fn is_last(&self) -> bool {
        self.cursor + 1 >= self.waypoints.len()
    }

    /// Waypoints from the cursor onwards.
    pub fn remaining(&self) -> &[Vec2] {
        &self.waypoints[self.cursor.min(self.waypoints.len())..]
    }

    /// Move to the next waypoint. Returns false when already on the last one.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Jump forward to `index`; backwards or out-of-range jumps are ignored.
    pub fn skip_to(&mut self, index: usize) {
        if index > self.cursor && index < self.waypoints.len() {
            self.cursor = index;
        }
    }
}

/// Where a navigation request is heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavTarget {
    Point(Vec2),
    /// Re-read every frame; completes within `stop_radius`.
    Moving { target: TargetRef, stop_radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationRequest {
    pub target: NavTarget,
    pub run: bool,
}

/// Live positions of things an agent can follow.
pub trait TargetLocator {
    fn locate(&self, target: TargetRef) -> Option<Vec2>;
}

impl TargetLocator for HashMap<TargetRef, Vec2> {
    fn locate(&self, target: TargetRef) -> Option<Vec2> {
        self.get(&target).copied()
    }
}

/// Locator for worlds without followable targets.
pub struct NoTargets;

impl TargetLocator for NoTargets {
    fn locate(&self, _target: TargetRef) -> Option<Vec2> {
        None
    }
}

/// The agent as seen by the follower this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentBody {
    /// Own collider, excluded from every obstacle query.
    pub collider: Option<ColliderId>,
    /// Transform origin (feet/pivot).
    pub origin: Vec2,
    /// Collision-shape center, when the agent has one.
    pub collider_center: Option<Vec2>,
    pub layer: u8,
}

impl AgentBody {
    pub fn at(position: Vec2) -> Self {
        Self {
            collider: None,
            origin: position,
            collider_center: None,
            layer: 0,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.collider_center.unwrap_or(self.origin)
    }

    pub fn filter(&self) -> ObstacleFilter {
        ObstacleFilter::new(self.collider, Some(self.layer))
    }
}

/// Collaborators the follower reads during a tick.
pub struct NavWorld<'a> {
    pub planner: &'a dyn PathPlanner,
    pub obstacles: &'a dyn ObstacleQuery,
    pub targets: &'a dyn TargetLocator,
}

/// Movement executor contract: whoever owns the agent this tick writes once.
pub trait MovementExecutor {
    fn set_movement_input(&mut self, direction: Vec2, run: bool, facing: Option<Vec2>);
}

/// Output of one follower tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementCommand {
    pub direction: Vec2,
    pub run: bool,
    pub facing: Option<Vec2>,
}

impl MovementCommand {
    pub fn is_idle(&self) -> bool {
        self.direction.is_zero()
    }

    pub fn apply(&self, executor: &mut dyn MovementExecutor) {
        executor.set_movement_input(self.direction, self.run, self.facing);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    Idle,
    Following,
}

/// Drives one agent towards a point or a moving target.
pub struct PathFollower {
    config: FollowerConfig,
    state: FollowerState,
    request: Option<NavigationRequest>,
    path: Option<NavPath>,
    /// Goal the held path was built to, after nearest-walkable substitution.
    path_goal: Option<Vec2>,
    /// Planning failed for this request; walk straight at the target.
    direct_fallback: bool,
    output: MovementCommand,
    stuck_timer: f32,
    stuck_sample: Option<Vec2>,
    stuck_count: u32,
    events: Vec<NavEvent>,
}

impl PathFollower {
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            state: FollowerState::Idle,
            request: None,
            path: None,
            path_goal: None,
            direct_fallback: false,
            output: MovementCommand::default(),
            stuck_timer: 0.0,
            stuck_sample: None,
            stuck_count: 0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn is_following(&self) -> bool {
        self.state == FollowerState::Following
    }

    pub fn request(&self) -> Option<&NavigationRequest> {
        self.request.as_ref()
    }

    pub fn path(&self) -> Option<&NavPath> {
        self.path.as_ref()
    }

    /// Movement output of the most recent tick (zero when idle).
    pub fn output(&self) -> MovementCommand {
        self.output
    }

    pub fn stuck_count(&self) -> u32 {
        self.stuck_count
    }

    pub fn is_direct_fallback(&self) -> bool {
        self.direct_fallback
    }

    /// Take all events raised since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<NavEvent> {
        std::mem::take(&mut self.events)
    }

    /// Head for a fixed point. Ignored (returns false) while already
    /// following a point within `retarget_threshold` of `point`.
    pub fn set_destination(&mut self, point: Vec2, run: bool) -> bool {
        if self.is_following() {
            if let Some(NavigationRequest {
                target: NavTarget::Point(current),
                ..
            }) = self.request
            {
                if current.distance(point) <= self.config.retarget_threshold {
                    if let Some(request) = self.request.as_mut() {
                        request.run = run;
                    }
                    return false;
                }
            }
        }
        self.begin(NavigationRequest {
            target: NavTarget::Point(point),
            run,
        });
        true
    }

    /// Follow a moving target until within `stop_radius` of it. Ignored
    /// while already following the same target with the same radius.
    pub fn follow_target(&mut self, target: TargetRef, stop_radius: f32, run: bool) -> bool {
        if self.is_following() {
            if let Some(NavigationRequest {
                target:
                    NavTarget::Moving {
                        target: current,
                        stop_radius: current_radius,
                    },
                ..
            }) = self.request
            {
                if current == target
                    && (current_radius - stop_radius).abs() <= self.config.retarget_threshold
                {
                    if let Some(request) = self.request.as_mut() {
                        request.run = run;
                    }
                    return false;
                }
            }
        }
        self.begin(NavigationRequest {
            target: NavTarget::Moving {
                target,
                stop_radius,
            },
            run,
        });
        true
    }

    /// Stop immediately: path cleared, output zeroed, state Idle.
    pub fn cancel(&mut self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Advance one frame and return the movement command for the executor.
    pub fn tick(&mut self, dt: f32, agent: &AgentBody, world: &NavWorld<'_>) -> MovementCommand {
        let request = match (self.state, self.request) {
            (FollowerState::Following, Some(request)) => request,
            _ => {
                self.output = MovementCommand::default();
                return self.output;
            }
        };
        let position = agent.position();

        let (target, stop_distance) = match request.target {
            NavTarget::Point(point) => (point, self.config.stop_distance),
            NavTarget::Moving {
                target,
                stop_radius,
            } => match world.targets.locate(target) {
                Some(point) => (point, stop_radius),
                None => {
                    log::debug!("follow target {} disappeared", target);
                    self.cancel_with(CancelReason::TargetLost);
                    return self.output;
                }
            },
        };
        let moving = matches!(request.target, NavTarget::Moving { .. });

        if moving {
            if position.distance(target) <= stop_distance {
                self.complete(position);
                return self.output;
            }
            if let Some(goal) = self.path_goal {
                if goal.distance(target) > self.config.repath_distance {
                    self.invalidate_path();
                }
            }
        }

        if self.path.is_none() && !self.direct_fallback {
            match self.build_path(position, target, agent, world) {
                Some((path, goal)) => {
                    self.path = Some(path);
                    self.path_goal = Some(goal);
                }
                None => {
                    log::debug!(
                        "no path from ({:.2}, {:.2}) to ({:.2}, {:.2}); walking straight",
                        position.x,
                        position.y,
                        target.x,
                        target.y
                    );
                    self.direct_fallback = true;
                    self.path_goal = Some(target);
                }
            }
        }

        let desired = match self.path.take() {
            Some(mut path) => {
                self.shortcut(&mut path, position, agent, world.obstacles);
                match self.advance_along(&mut path, position, stop_distance) {
                    Some(direction) => {
                        self.path = Some(path);
                        direction
                    }
                    None if moving => {
                        // Path end reached but the target moved on; close in directly.
                        self.direct_fallback = true;
                        (target - position).normalize()
                    }
                    None => {
                        self.complete(position);
                        return self.output;
                    }
                }
            }
            None => {
                let to_target = target - position;
                if to_target.length() <= stop_distance {
                    self.complete(position);
                    return self.output;
                }
                to_target.normalize()
            }
        };

        let direction = self.steer(desired, position, request.run, agent, world.obstacles);
        self.output = MovementCommand {
            direction,
            run: request.run,
            facing: facing_for(direction, self.config.facing_vertical_bias),
        };

        self.update_stuck(dt, position, agent, world.obstacles);
        self.output
    }

    /// Plan from `start` to `goal`, substituting the nearest walkable point
    /// for blocked endpoints, then smooth and trim. Returns the path and the
    /// goal it actually leads to.
    pub fn build_path(
        &self,
        start: Vec2,
        goal: Vec2,
        agent: &AgentBody,
        world: &NavWorld<'_>,
    ) -> Option<(NavPath, Vec2)> {
        let planner = world.planner;
        let start_point = if planner.is_walkable(start) {
            start
        } else {
            planner.try_find_nearest_walkable(start)?
        };
        let goal_point = if planner.is_walkable(goal) {
            goal
        } else {
            let substitute = planner.try_find_nearest_walkable(goal)?;
            log::debug!(
                "goal ({:.2}, {:.2}) blocked, using ({:.2}, {:.2})",
                goal.x,
                goal.y,
                substitute.x,
                substitute.y
            );
            substitute
        };

        let mut raw = planner.try_find_path(start_point, goal_point)?;
        if start_point.distance(start) > f32::EPSILON {
            raw.insert(0, start_point);
        }

        let smoothed = self.smooth_path(start, &raw, agent, world.obstacles);
        let trimmed = trim_behind(start, smoothed);
        Some((NavPath::new(trimmed), goal_point))
    }

    /// Greedy visibility smoothing: from `origin` and then from each kept
    /// waypoint, keep only the farthest waypoint still in line of sight.
    pub fn smooth_path(
        &self,
        origin: Vec2,
        waypoints: &[Vec2],
        agent: &AgentBody,
        obstacles: &dyn ObstacleQuery,
    ) -> Vec<Vec2> {
        let mut smoothed = Vec::with_capacity(waypoints.len());
        let mut anchor = origin;
        let mut i = 0;
        while i < waypoints.len() {
            let mut next = i;
            for j in (i + 1..waypoints.len()).rev() {
                if self.line_of_sight(anchor, waypoints[j], agent, obstacles) {
                    next = j;
                    break;
                }
            }
            smoothed.push(waypoints[next]);
            anchor = waypoints[next];
            i = next + 1;
        }
        smoothed
    }

    /// Sample the segment at ~`los_sample_spacing` (at least
    /// `min_los_samples`) and fail on any blocking collider within the agent
    /// radius plus margin.
    pub fn line_of_sight(
        &self,
        from: Vec2,
        to: Vec2,
        agent: &AgentBody,
        obstacles: &dyn ObstacleQuery,
    ) -> bool {
        let filter = agent.filter();
        let radius = self.config.inflation_radius();
        let length = from.distance(to);
        let samples = ((length / self.config.los_sample_spacing).ceil() as usize + 1)
            .max(self.config.min_los_samples.max(2));
        (0..samples).all(|i| {
            let t = i as f32 / (samples - 1) as f32;
            let point = from.lerp(to, t);
            !obstacles
                .overlap_circle(point, radius)
                .iter()
                .any(|c| filter.blocks(c))
        })
    }

    /// Bend `desired` away from obstacles found by lookahead probes.
    pub fn steer(
        &self,
        desired: Vec2,
        position: Vec2,
        run: bool,
        agent: &AgentBody,
        obstacles: &dyn ObstacleQuery,
    ) -> Vec2 {
        if desired.is_zero() {
            return Vec2::ZERO;
        }
        let filter = agent.filter();
        let probe_radius = self.config.inflation_radius();
        let lookahead = if run {
            &self.config.run_lookahead
        } else {
            &self.config.walk_lookahead
        };

        let mut repulsion = Vec2::ZERO;
        for (i, distance) in lookahead.iter().enumerate() {
            let probe = position + desired * *distance;
            // Closer probes matter more
            let sample_weight = 1.0 / (i as f32 + 1.0);
            for collider in obstacles.overlap_circle(probe, probe_radius) {
                if !filter.blocks(&collider) {
                    continue;
                }
                let mut away = probe - collider.shape.closest_point(probe);
                if away.is_zero() {
                    away = probe - collider.shape.center();
                }
                if away.is_zero() {
                    continue;
                }
                let d = away.length().max(MIN_REPULSION_DISTANCE);
                repulsion += away.normalize() * (sample_weight / (d * d));
            }
        }

        if repulsion.is_zero() {
            return desired;
        }
        let blended = (desired + repulsion * self.config.avoidance_weight).normalize();
        if blended.is_zero() {
            return desired;
        }
        clamp_deflection(
            desired,
            blended,
            self.config.max_deflection_degrees.to_radians(),
        )
    }

    fn begin(&mut self, request: NavigationRequest) {
        self.request = Some(request);
        self.state = FollowerState::Following;
        self.invalidate_path();
        self.reset_stuck();
    }

    fn invalidate_path(&mut self) {
        self.path = None;
        self.path_goal = None;
        self.direct_fallback = false;
    }

    fn reset_stuck(&mut self) {
        self.stuck_timer = 0.0;
        self.stuck_sample = None;
        self.stuck_count = 0;
    }

    fn stop(&mut self) {
        self.state = FollowerState::Idle;
        self.request = None;
        self.invalidate_path();
        self.reset_stuck();
        self.output = MovementCommand::default();
    }

    fn complete(&mut self, position: Vec2) {
        self.stop();
        self.events.push(NavEvent::ReachedTarget { position });
    }

    fn cancel_with(&mut self, reason: CancelReason) {
        let was_following = self.is_following();
        self.stop();
        if was_following {
            self.events.push(NavEvent::NavigationCancelled { reason });
        }
    }

    /// Move the cursor to the farthest waypoint visible from `position`.
    fn shortcut(
        &self,
        path: &mut NavPath,
        position: Vec2,
        agent: &AgentBody,
        obstacles: &dyn ObstacleQuery,
    ) {
        if path.is_empty() {
            return;
        }
        let cursor = path.cursor();
        for idx in (cursor + 1..path.len()).rev() {
            if self.line_of_sight(position, path.waypoints()[idx], agent, obstacles) {
                path.skip_to(idx);
                return;
            }
        }
    }

    /// Direction to the current waypoint, advancing past reached ones.
    /// `None` once the last waypoint is reached.
    fn advance_along(&self, path: &mut NavPath, position: Vec2, stop_distance: f32) -> Option<Vec2> {
        loop {
            let waypoint = path.current()?;
            let tolerance = if path.is_last() {
                stop_distance
            } else {
                self.config.waypoint_tolerance
            };
            let to_waypoint = waypoint - position;
            if to_waypoint.length() > tolerance {
                return Some(to_waypoint.normalize());
            }
            if !path.advance() {
                return None;
            }
        }
    }

    fn update_stuck(
        &mut self,
        dt: f32,
        position: Vec2,
        agent: &AgentBody,
        obstacles: &dyn ObstacleQuery,
    ) {
        let sample = *self.stuck_sample.get_or_insert(position);
        self.stuck_timer += dt;
        if self.stuck_timer < self.config.stuck_check_interval {
            return;
        }
        self.stuck_timer = 0.0;
        self.stuck_sample = Some(position);

        if position.distance(sample) >= self.config.stuck_min_movement {
            self.stuck_count = 0;
            return;
        }

        self.stuck_count += 1;
        if self.stuck_count >= self.config.max_stuck_retries {
            self.log_stuck(position, agent, obstacles);
            self.cancel_with(CancelReason::Stuck);
        } else {
            log::debug!(
                "agent barely moved at ({:.2}, {:.2}), rebuilding path (attempt {})",
                position.x,
                position.y,
                self.stuck_count
            );
            self.invalidate_path();
        }
    }

    fn log_stuck(&self, position: Vec2, agent: &AgentBody, obstacles: &dyn ObstacleQuery) {
        let filter = agent.filter();
        let nearby: Vec<String> = obstacles
            .overlap_circle(position, self.config.diagnostic_radius)
            .iter()
            .filter(|c| filter.blocks(c))
            .map(|c| {
                let center = c.shape.center();
                format!("#{} {:?} at ({:.2}, {:.2})", c.id, c.kind, center.x, center.y)
            })
            .collect();
        let path: Vec<String> = self
            .path
            .iter()
            .flat_map(|p| p.remaining().iter())
            .map(|w| format!("({:.2}, {:.2})", w.x, w.y))
            .collect();
        log::warn!(
            "navigation cancelled: stuck at ({:.2}, {:.2}) after {} retries; target={:?} path=[{}] nearby=[{}]",
            position.x,
            position.y,
            self.stuck_count,
            self.request.map(|r| r.target),
            path.join(", "),
            nearby.join("; ")
        );
    }
}

/// Drop leading waypoints that lie behind the agent relative to the path
/// direction, so a mid-travel rebuild does not walk backwards.
fn trim_behind(position: Vec2, mut waypoints: Vec<Vec2>) -> Vec<Vec2> {
    while waypoints.len() > 1 {
        let to_first = waypoints[0] - position;
        let path_direction = waypoints[1] - waypoints[0];
        if to_first.dot(path_direction) < 0.0 {
            waypoints.remove(0);
        } else {
            break;
        }
    }
    waypoints
}

/// Limit the angle between `desired` and `steered` to `max_angle` radians.
pub fn clamp_deflection(desired: Vec2, steered: Vec2, max_angle: f32) -> Vec2 {
    let angle = desired.signed_angle_to(steered);
    if angle.abs() <= max_angle {
        steered
    } else {
        desired.normalize().rotate(max_angle.copysign(angle))
    }
}

/// Facing override for a movement direction: follow the movement when it
/// is mostly horizontal or clearly vertical, snap diagonals to left/right.
pub fn facing_for(direction: Vec2, vertical_bias: f32) -> Option<Vec2> {
    if direction.is_zero() {
        return None;
    }
    let ax = direction.x.abs();
    let ay = direction.y.abs();
    if ax >= ay || ay > ax * vertical_bias {
        Some(direction)
    } else if direction.x < 0.0 {
        Some(Vec2::LEFT)
    } else {
        Some(Vec2::RIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Collider, ColliderKind, ColliderSet, Shape};
    use crate::geometry::Aabb;
    use crate::planner::{GridConfig, GridPlanner};

    struct NoPath;

    impl PathPlanner for NoPath {
        fn is_walkable(&self, _point: Vec2) -> bool {
            true
        }
        fn try_find_path(&self, _start: Vec2, _end: Vec2) -> Option<Vec<Vec2>> {
            None
        }
        fn try_find_nearest_walkable(&self, point: Vec2) -> Option<Vec2> {
            Some(point)
        }
        fn set_agent_radius(&mut self, _radius: f32) {}
    }

    fn wall(id: ColliderId, min: Vec2, max: Vec2) -> Collider {
        Collider {
            id,
            shape: Shape::Box(Aabb::new(min, max)),
            kind: ColliderKind::Obstacle,
            layer: 0,
        }
    }

    fn planner_for(obstacles: &ColliderSet) -> GridPlanner {
        let mut planner = GridPlanner::new(GridConfig {
            cell_size: 0.5,
            width: 20,
            height: 20,
            ..Default::default()
        });
        planner.set_agent_radius(FollowerConfig::default().inflation_radius());
        planner.rebuild(obstacles, &ObstacleFilter::default());
        planner
    }

    fn follower() -> PathFollower {
        PathFollower::new(FollowerConfig::default())
    }

    #[test]
    fn debounce_ignores_nearby_destination() {
        let mut f = follower();
        assert!(f.set_destination(Vec2::new(5.0, 5.0), false));
        assert!(!f.set_destination(Vec2::new(5.1, 5.0), true));
        assert_eq!(f.request().unwrap().target, NavTarget::Point(Vec2::new(5.0, 5.0)));
        assert!(f.request().unwrap().run);
        assert!(f.set_destination(Vec2::new(7.0, 5.0), false));
        assert_eq!(f.request().unwrap().target, NavTarget::Point(Vec2::new(7.0, 5.0)));
    }

    #[test]
    fn new_request_after_idle_is_never_debounced() {
        let mut f = follower();
        f.set_destination(Vec2::new(5.0, 5.0), false);
        f.cancel();
        assert!(f.set_destination(Vec2::new(5.0, 5.0), false));
    }

    #[test]
    fn cancel_zeroes_output_and_reports_once() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        f.set_destination(Vec2::new(8.0, 2.0), false);
        let cmd = f.tick(0.016, &AgentBody::at(Vec2::new(1.0, 2.0)), &world);
        assert!(!cmd.is_idle());

        f.cancel();
        assert_eq!(f.state(), FollowerState::Idle);
        assert!(f.output().is_idle());
        assert!(f.path().is_none());
        f.cancel();
        assert_eq!(
            f.drain_events(),
            vec![NavEvent::NavigationCancelled {
                reason: CancelReason::Requested
            }]
        );
    }

    #[test]
    fn straight_walk_reaches_target() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        let goal = Vec2::new(8.0, 2.0);
        f.set_destination(goal, false);

        let mut pos = Vec2::new(1.0, 2.0);
        for _ in 0..200 {
            let cmd = f.tick(0.05, &AgentBody::at(pos), &world);
            if !f.is_following() {
                break;
            }
            assert!((cmd.direction.length() - 1.0).abs() < 1e-3);
            pos += cmd.direction * 0.1;
        }
        assert!(!f.is_following());
        assert!(pos.distance(goal) <= f.config().stop_distance + 1e-3);
        let events = f.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], NavEvent::ReachedTarget { .. }));
    }

    #[test]
    fn direct_fallback_when_planner_fails() {
        let obstacles = ColliderSet::new();
        let world = NavWorld {
            planner: &NoPath,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        f.set_destination(Vec2::new(4.0, 4.0), true);
        let cmd = f.tick(0.016, &AgentBody::at(Vec2::ZERO), &world);
        assert!(f.path().is_none());
        assert!(f.is_direct_fallback());
        let expected = Vec2::new(1.0, 1.0).normalize();
        assert!(cmd.direction.distance(expected) < 1e-4);
        assert!(cmd.run);
    }

    #[test]
    fn position_prefers_collider_center() {
        let mut body = AgentBody::at(Vec2::new(1.0, 1.0));
        assert_eq!(body.position(), Vec2::new(1.0, 1.0));
        body.collider_center = Some(Vec2::new(1.0, 1.4));
        assert_eq!(body.position(), Vec2::new(1.0, 1.4));
    }

    #[test]
    fn smoothing_shrinks_path_and_keeps_segments_clear() {
        let mut obstacles = ColliderSet::new();
        obstacles.insert(wall(1, Vec2::new(4.8, 0.0), Vec2::new(5.2, 6.0)));
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let f = follower();
        let agent = AgentBody::at(Vec2::new(2.0, 2.0));
        let goal = Vec2::new(8.0, 2.0);

        let raw = planner.try_find_path(agent.position(), goal).unwrap();
        let smoothed = f.smooth_path(agent.position(), &raw, &agent, &obstacles);
        assert!(smoothed.len() <= raw.len());
        assert!(smoothed.len() < raw.len());
        assert_eq!(*smoothed.last().unwrap(), goal);

        let mut from = agent.position();
        for wp in &smoothed {
            assert!(f.line_of_sight(from, *wp, &agent, &obstacles));
            from = *wp;
        }

        let (path, built_goal) = f.build_path(agent.position(), goal, &agent, &world).unwrap();
        assert_eq!(built_goal, goal);
        assert!(path.len() <= raw.len());
    }

    #[test]
    fn line_of_sight_blocked_by_wall_and_not_by_collectible() {
        let mut obstacles = ColliderSet::new();
        obstacles.insert(wall(1, Vec2::new(4.8, 0.0), Vec2::new(5.2, 6.0)));
        obstacles.insert(Collider {
            id: 2,
            shape: Shape::Circle {
                center: Vec2::new(3.0, 8.0),
                radius: 0.3,
            },
            kind: ColliderKind::Collectible,
            layer: 0,
        });
        let f = follower();
        let agent = AgentBody::at(Vec2::new(2.0, 2.0));
        assert!(!f.line_of_sight(Vec2::new(2.0, 2.0), Vec2::new(8.0, 2.0), &agent, &obstacles));
        assert!(f.line_of_sight(Vec2::new(1.0, 8.0), Vec2::new(6.0, 8.0), &agent, &obstacles));
    }

    #[test]
    fn shortcut_skips_to_farthest_visible_waypoint() {
        let obstacles = ColliderSet::new();
        let f = follower();
        let agent = AgentBody::at(Vec2::new(1.0, 1.0));
        let mut path = NavPath::new(vec![
            Vec2::new(2.0, 1.0),
            Vec2::new(3.0, 1.0),
            Vec2::new(4.0, 1.0),
            Vec2::new(5.0, 1.0),
        ]);
        f.shortcut(&mut path, agent.position(), &agent, &obstacles);
        assert_eq!(path.cursor(), 3);
    }

    #[test]
    fn shortcut_respects_obstacles_and_never_moves_back() {
        let mut obstacles = ColliderSet::new();
        obstacles.insert(wall(1, Vec2::new(2.8, 0.0), Vec2::new(3.2, 2.0)));
        let f = follower();
        let agent = AgentBody::at(Vec2::new(1.0, 1.0));
        let mut path = NavPath::new(vec![
            Vec2::new(1.5, 3.0),
            Vec2::new(4.5, 3.0),
            Vec2::new(4.5, 1.0),
        ]);
        f.shortcut(&mut path, agent.position(), &agent, &obstacles);
        assert_eq!(path.cursor(), 0, "corner waypoints hidden behind the wall");

        path.skip_to(2);
        path.skip_to(1);
        assert_eq!(path.cursor(), 2);
    }

    #[test]
    fn trim_drops_waypoints_behind_agent() {
        let trimmed = trim_behind(
            Vec2::new(3.2, 0.0),
            vec![Vec2::new(3.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(5.0, 0.0)],
        );
        assert_eq!(trimmed, vec![Vec2::new(4.0, 0.0), Vec2::new(5.0, 0.0)]);
        let single = trim_behind(Vec2::new(9.0, 0.0), vec![Vec2::new(3.0, 0.0)]);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn stuck_agent_cancels_exactly_once() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        f.set_destination(Vec2::new(8.0, 8.0), false);
        let frozen = AgentBody::at(Vec2::new(1.0, 1.0));

        let mut cancels = 0;
        for _ in 0..40 {
            let cmd = f.tick(0.1, &frozen, &world);
            for e in f.drain_events() {
                if e == (NavEvent::NavigationCancelled {
                    reason: CancelReason::Stuck,
                }) {
                    cancels += 1;
                    assert!(cmd.is_idle());
                }
            }
        }
        assert_eq!(cancels, 1);
        assert!(f.output().is_idle());
        assert_eq!(f.state(), FollowerState::Idle);
    }

    #[test]
    fn progress_resets_stuck_counter() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        f.set_destination(Vec2::new(9.0, 1.0), false);
        let mut pos = Vec2::new(1.0, 1.0);
        // Two stuck windows, then movement
        for _ in 0..6 {
            f.tick(0.1, &AgentBody::at(pos), &world);
        }
        assert_eq!(f.stuck_count(), 2);
        for _ in 0..3 {
            let cmd = f.tick(0.1, &AgentBody::at(pos), &world);
            pos += cmd.direction * 0.2;
        }
        assert_eq!(f.stuck_count(), 0);
        assert!(f.is_following());
    }

    #[test]
    fn steering_bends_away_within_limit() {
        let mut obstacles = ColliderSet::new();
        // Obstacle just right of the straight line ahead
        obstacles.insert(Collider {
            id: 1,
            shape: Shape::Circle {
                center: Vec2::new(1.0, -0.45),
                radius: 0.2,
            },
            kind: ColliderKind::Obstacle,
            layer: 0,
        });
        let f = follower();
        let agent = AgentBody::at(Vec2::ZERO);
        let desired = Vec2::RIGHT;
        let steered = f.steer(desired, Vec2::ZERO, true, &agent, &obstacles);
        assert!(steered.y > 0.0, "should bend away from the obstacle, got {:?}", steered);
        let angle = desired.signed_angle_to(steered).abs();
        assert!(angle <= 45f32.to_radians() + 1e-4);
        assert!((steered.length() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn steering_ignores_own_collider() {
        let mut obstacles = ColliderSet::new();
        obstacles.insert(Collider {
            id: 42,
            shape: Shape::Circle {
                center: Vec2::new(0.5, 0.1),
                radius: 0.3,
            },
            kind: ColliderKind::Obstacle,
            layer: 0,
        });
        let f = follower();
        let mut agent = AgentBody::at(Vec2::ZERO);
        agent.collider = Some(42);
        let steered = f.steer(Vec2::RIGHT, Vec2::ZERO, false, &agent, &obstacles);
        assert_eq!(steered, Vec2::RIGHT);
    }

    #[test]
    fn deflection_clamped_to_45_degrees() {
        let max = 45f32.to_radians();
        let out = clamp_deflection(Vec2::RIGHT, Vec2::new(0.0, 1.0), max);
        assert!((Vec2::RIGHT.signed_angle_to(out) - max).abs() < 1e-4);
        let out = clamp_deflection(Vec2::RIGHT, Vec2::new(-1.0, -0.01).normalize(), max);
        assert!((Vec2::RIGHT.signed_angle_to(out) + max).abs() < 1e-4);
        let small = Vec2::new(1.0, 0.2).normalize();
        assert_eq!(clamp_deflection(Vec2::RIGHT, small, max), small);
    }

    #[test]
    fn facing_snaps_diagonals_to_horizontal() {
        let horizontal = Vec2::new(1.0, 0.5).normalize();
        assert_eq!(facing_for(horizontal, 1.5), Some(horizontal));
        let vertical = Vec2::new(0.3, 1.0).normalize();
        assert_eq!(facing_for(vertical, 1.5), Some(vertical));
        let diagonal = Vec2::new(-0.7, 0.8).normalize();
        assert_eq!(facing_for(diagonal, 1.5), Some(Vec2::LEFT));
        let diagonal = Vec2::new(0.7, -0.9).normalize();
        assert_eq!(facing_for(diagonal, 1.5), Some(Vec2::RIGHT));
        assert_eq!(facing_for(Vec2::ZERO, 1.5), None);
    }

    #[test]
    fn follow_moving_target_until_in_range() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let mut targets: HashMap<TargetRef, Vec2> = HashMap::new();
        targets.insert(9, Vec2::new(6.0, 2.0));
        let mut f = follower();
        assert!(f.follow_target(9, 1.0, false));
        assert!(!f.follow_target(9, 1.0, true));

        let mut pos = Vec2::new(1.0, 2.0);
        for step in 0..200 {
            // Target drifts upwards for a while
            if step < 20 {
                let t = targets.get_mut(&9).unwrap();
                t.y += 0.05;
            }
            let world = NavWorld {
                planner: &planner,
                obstacles: &obstacles,
                targets: &targets,
            };
            let cmd = f.tick(0.05, &AgentBody::at(pos), &world);
            if !f.is_following() {
                break;
            }
            pos += cmd.direction * 0.1;
        }
        assert!(!f.is_following());
        assert!(pos.distance(targets[&9]) <= 1.0 + 1e-3);
        assert!(matches!(
            f.drain_events().as_slice(),
            [NavEvent::ReachedTarget { .. }]
        ));
    }

    #[test]
    fn lost_target_cancels() {
        let obstacles = ColliderSet::new();
        let planner = planner_for(&obstacles);
        let world = NavWorld {
            planner: &planner,
            obstacles: &obstacles,
            targets: &NoTargets,
        };
        let mut f = follower();
        f.follow_target(3, 0.5, false);
        let cmd = f.tick(0.016, &AgentBody::at(Vec2::ZERO), &world);
        assert!(cmd.is_idle());
        assert_eq!(
            f.drain_events(),
            vec![NavEvent::NavigationCancelled {
                reason: CancelReason::TargetLost
            }]
        );
    }

    #[test]
    fn nav_path_cursor_is_monotonic() {
        let mut path = NavPath::new(vec![Vec2::ZERO, Vec2::RIGHT, Vec2::new(2.0, 0.0)]);
        assert!(path.advance());
        path.skip_to(0);
        assert_eq!(path.cursor(), 1);
        assert!(path.advance());
        assert!(!path.advance());
        assert!(path.is_last());
        assert_eq!(path.remaining(), &[Vec2::new(2.0, 0.0)]);
    }
}
