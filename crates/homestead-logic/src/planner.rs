//! Grid path planner: the contract the navigation core consumes, plus an
//! 8-connected A* implementation over an obstacle grid.
//!
//! `GridPlanner` rasterises blocking colliders into cells, inflates them by
//! the agent radius, and answers walkability, shortest-path and
//! nearest-walkable queries. Paths are cached per (start cell, goal cell)
//! until the grid or the inflation radius changes.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::collision::{ObstacleFilter, ObstacleQuery};
use crate::geometry::{Aabb, Vec2};

/// Path planning contract consumed by the path follower.
pub trait PathPlanner {
    /// Whether an agent of the configured radius can stand at `point`.
    fn is_walkable(&self, point: Vec2) -> bool;

    /// Shortest path from `start` to `end`. Waypoints exclude the start and
    /// end exactly at `end`. `None` when no path exists under the current
    /// inflation; never panics.
    fn try_find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>>;

    /// Closest walkable point within a bounded search radius.
    fn try_find_nearest_walkable(&self, point: Vec2) -> Option<Vec2>;

    /// Obstacle inflation radius used by subsequent queries.
    fn set_agent_radius(&mut self, radius: f32);
}

/// Grid dimensions and search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// World position of the grid's bottom-left corner.
    pub origin: Vec2,
    /// World units per cell.
    pub cell_size: f32,
    /// Cells along x.
    pub width: u32,
    /// Cells along y.
    pub height: u32,
    /// A* gives up after expanding this many nodes.
    pub max_expansions: usize,
    /// Ring radius (in cells) for nearest-walkable searches.
    pub nearest_search_radius: u32,
    /// Maximum number of cached paths.
    pub cache_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            cell_size: 0.5,
            width: 128,
            height: 128,
            max_expansions: 20_000,
            nearest_search_radius: 8,
            cache_capacity: 128,
        }
    }
}

const ORTHOGONAL_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

const NEIGHBORS: [(i32, i32, u32); 8] = [
    (1, 0, ORTHOGONAL_COST),
    (-1, 0, ORTHOGONAL_COST),
    (0, 1, ORTHOGONAL_COST),
    (0, -1, ORTHOGONAL_COST),
    (1, 1, DIAGONAL_COST),
    (1, -1, DIAGONAL_COST),
    (-1, 1, DIAGONAL_COST),
    (-1, -1, DIAGONAL_COST),
];

/// A* planner over a uniform obstacle grid.
pub struct GridPlanner {
    config: GridConfig,
    /// Cells touched by a blocking collider.
    raw_blocked: Vec<bool>,
    /// Raw cells grown by the agent radius.
    blocked: Vec<bool>,
    agent_radius: f32,
    /// (start cell, goal cell) → cell path. Simple bounded cache.
    cache: RefCell<HashMap<(usize, usize), Vec<usize>>>,
}

impl GridPlanner {
    /// Fully open grid.
    pub fn new(config: GridConfig) -> Self {
        let n = (config.width * config.height) as usize;
        Self {
            config,
            raw_blocked: vec![false; n],
            blocked: vec![false; n],
            agent_radius: 0.0,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn agent_radius(&self) -> f32 {
        self.agent_radius
    }

    /// Re-rasterise every cell from the obstacle set.
    pub fn rebuild(&mut self, obstacles: &dyn ObstacleQuery, filter: &ObstacleFilter) {
        for y in 0..self.config.height {
            for x in 0..self.config.width {
                let area = self.cell_bounds(x, y);
                let hit = obstacles
                    .overlap_box(area)
                    .iter()
                    .any(|c| filter.blocks(c));
                let idx = self.index(x, y);
                self.raw_blocked[idx] = hit;
            }
        }
        self.recompute_inflation();
    }

    /// Mark a single cell blocked or open (before inflation).
    pub fn set_blocked(&mut self, x: u32, y: u32, blocked: bool) {
        if x < self.config.width && y < self.config.height {
            let idx = self.index(x, y);
            self.raw_blocked[idx] = blocked;
            self.recompute_inflation();
        }
    }

    /// Cell containing a world point, if inside the grid.
    pub fn world_to_cell(&self, point: Vec2) -> Option<(u32, u32)> {
        let local = (point - self.config.origin) * (1.0 / self.config.cell_size);
        if local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let (x, y) = (local.x as u32, local.y as u32);
        if x >= self.config.width || y >= self.config.height {
            return None;
        }
        Some((x, y))
    }

    pub fn cell_center(&self, x: u32, y: u32) -> Vec2 {
        let s = self.config.cell_size;
        self.config.origin + Vec2::new((x as f32 + 0.5) * s, (y as f32 + 0.5) * s)
    }

    pub fn cell_bounds(&self, x: u32, y: u32) -> Aabb {
        let s = self.config.cell_size;
        let min = self.config.origin + Vec2::new(x as f32 * s, y as f32 * s);
        Aabb::new(min, min + Vec2::new(s, s))
    }

    pub fn is_cell_walkable(&self, x: u32, y: u32) -> bool {
        x < self.config.width && y < self.config.height && !self.blocked[self.index(x, y)]
    }

    /// Number of walkable cells after inflation.
    pub fn walkable_count(&self) -> usize {
        self.blocked.iter().filter(|b| !**b).count()
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.borrow().len()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.config.width + x) as usize
    }

    fn coords(&self, idx: usize) -> (u32, u32) {
        let w = self.config.width as usize;
        ((idx % w) as u32, (idx / w) as u32)
    }

    fn recompute_inflation(&mut self) {
        self.blocked.copy_from_slice(&self.raw_blocked);
        let r = self.agent_radius;
        if r > 0.0 {
            let reach = (r / self.config.cell_size).ceil() as i32;
            for idx in 0..self.raw_blocked.len() {
                if !self.raw_blocked[idx] {
                    continue;
                }
                let (bx, by) = self.coords(idx);
                let blocked_box = self.cell_bounds(bx, by);
                for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        let nx = bx as i32 + dx;
                        let ny = by as i32 + dy;
                        if nx < 0
                            || ny < 0
                            || nx >= self.config.width as i32
                            || ny >= self.config.height as i32
                        {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        if blocked_box.distance_to(self.cell_center(nx, ny)) < r {
                            let n = self.index(nx, ny);
                            self.blocked[n] = true;
                        }
                    }
                }
            }
        }
        self.clear_cache();
    }

    fn heuristic(&self, a: usize, b: usize) -> u32 {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        let dx = ax.abs_diff(bx);
        let dy = ay.abs_diff(by);
        ORTHOGONAL_COST * dx.max(dy) + (DIAGONAL_COST - ORTHOGONAL_COST) * dx.min(dy)
    }

    fn find_cells(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let key = (start, goal);
        if let Some(cached) = self.cache.borrow().get(&key) {
            return Some(cached.clone());
        }

        let result = self.astar(start, goal);

        if let Some(ref path) = result {
            let mut cache = self.cache.borrow_mut();
            if cache.len() >= self.config.cache_capacity {
                // Evict an arbitrary entry (HashMap iteration order)
                if let Some(&evict_key) = cache.keys().next() {
                    cache.remove(&evict_key);
                }
            }
            if self.config.cache_capacity > 0 {
                cache.insert(key, path.clone());
            }
        }

        result
    }

    fn astar(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let n = self.blocked.len();
        let mut g_score = vec![u32::MAX; n];
        let mut came_from = vec![usize::MAX; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[start] = 0;
        open.push(Reverse((self.heuristic(start, goal), start)));
        let mut expansions = 0usize;

        while let Some(Reverse((_, current))) = open.pop() {
            if current == goal {
                let mut path = vec![current];
                let mut node = current;
                while came_from[node] != usize::MAX {
                    node = came_from[node];
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }
            if closed[current] {
                continue;
            }
            closed[current] = true;
            expansions += 1;
            if expansions > self.config.max_expansions {
                log::debug!("A* gave up after {} expansions", expansions);
                return None;
            }

            let (cx, cy) = self.coords(current);
            for &(dx, dy, cost) in &NEIGHBORS {
                let nx = cx as i32 + dx;
                let ny = cy as i32 + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if !self.is_cell_walkable(nx, ny) {
                    continue;
                }
                // No corner cutting: both orthogonal neighbours must be open
                if dx != 0
                    && dy != 0
                    && (!self.is_cell_walkable(nx, cy) || !self.is_cell_walkable(cx, ny))
                {
                    continue;
                }
                let next = self.index(nx, ny);
                if closed[next] {
                    continue;
                }
                let tentative = g_score[current].saturating_add(cost);
                if tentative < g_score[next] {
                    g_score[next] = tentative;
                    came_from[next] = current;
                    open.push(Reverse((tentative + self.heuristic(next, goal), next)));
                }
            }
        }

        None
    }

    fn clamp_to_grid(&self, point: Vec2) -> (u32, u32) {
        let local = (point - self.config.origin) * (1.0 / self.config.cell_size);
        let x = local.x.max(0.0) as u32;
        let y = local.y.max(0.0) as u32;
        (
            x.min(self.config.width.saturating_sub(1)),
            y.min(self.config.height.saturating_sub(1)),
        )
    }
}

impl PathPlanner for GridPlanner {
    fn is_walkable(&self, point: Vec2) -> bool {
        match self.world_to_cell(point) {
            Some((x, y)) => self.is_cell_walkable(x, y),
            None => false,
        }
    }

    fn try_find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        let (sx, sy) = self.world_to_cell(start)?;
        let (gx, gy) = self.world_to_cell(end)?;
        if !self.is_cell_walkable(sx, sy) || !self.is_cell_walkable(gx, gy) {
            return None;
        }
        let start_idx = self.index(sx, sy);
        let goal_idx = self.index(gx, gy);
        if start_idx == goal_idx {
            return Some(vec![end]);
        }

        let cells = self.find_cells(start_idx, goal_idx)?;
        let mut waypoints: Vec<Vec2> = cells
            .iter()
            .skip(1)
            .map(|&idx| {
                let (x, y) = self.coords(idx);
                self.cell_center(x, y)
            })
            .collect();
        if let Some(last) = waypoints.last_mut() {
            *last = end;
        }
        Some(waypoints)
    }

    fn try_find_nearest_walkable(&self, point: Vec2) -> Option<Vec2> {
        if self.is_walkable(point) {
            return Some(point);
        }
        let (cx, cy) = self.clamp_to_grid(point);
        if self.is_cell_walkable(cx, cy) {
            return Some(self.cell_center(cx, cy));
        }
        for ring in 1..=self.config.nearest_search_radius as i32 {
            let mut best: Option<(f32, Vec2)> = None;
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let nx = cx as i32 + dx;
                    let ny = cy as i32 + dy;
                    if nx < 0 || ny < 0 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    if !self.is_cell_walkable(nx, ny) {
                        continue;
                    }
                    let center = self.cell_center(nx, ny);
                    let d = center.distance_squared(point);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, center));
                    }
                }
            }
            if let Some((_, center)) = best {
                return Some(center);
            }
        }
        None
    }

    fn set_agent_radius(&mut self, radius: f32) {
        let radius = radius.max(0.0);
        if (radius - self.agent_radius).abs() > f32::EPSILON {
            self.agent_radius = radius;
            self.recompute_inflation();
        }
    }
}
