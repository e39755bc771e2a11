//! Continuous 2D space with a bucketed spatial index.
//!
//! Positions are float points in `[0, width) × [0, height)`. The index
//! is a uniform grid of square buckets updated incrementally on every
//! place, move and remove, so a radius query inspects only the buckets
//! overlapping the query disc.

use flock_core::AgentId;
use indexmap::{IndexMap, IndexSet};

use crate::error::SpaceError;
use crate::space::{Membership, Space};

/// A point in continuous space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Euclidean radius query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusQuery {
    /// Maximum distance, inclusive.
    pub radius: f64,
    /// Whether agents at distance zero (including the querying agent
    /// when it stands at the center) are part of the result.
    pub include_center: bool,
}

impl RadiusQuery {
    /// Agents within `radius`, excluding those exactly at the center.
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            include_center: false,
        }
    }

    /// Same query including agents at the center.
    pub fn with_center(mut self) -> Self {
        self.include_center = true;
        self
    }
}

/// Continuous rectangle with optional wrap-around.
#[derive(Clone, Debug)]
pub struct Continuous2D {
    width: f64,
    height: f64,
    torus: bool,
    bucket: f64,
    cell_w: f64,
    cell_h: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<AgentId>>,
    positions: IndexMap<AgentId, Point>,
}

impl Continuous2D {
    /// A space with the default bucket size.
    pub fn new(width: f64, height: f64, torus: bool) -> Result<Self, SpaceError> {
        let bucket = (width.max(height) / 256.0).max(1.0);
        Self::with_bucket_size(width, height, torus, bucket)
    }

    /// A space whose index buckets have side `bucket`.
    ///
    /// Buckets close to the typical query radius keep queries cheap.
    ///
    /// # Errors
    ///
    /// `EmptySpace` for a non-positive or non-finite extent;
    /// `InvalidQuery` for a non-positive bucket size.
    pub fn with_bucket_size(
        width: f64,
        height: f64,
        torus: bool,
        bucket: f64,
    ) -> Result<Self, SpaceError> {
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(SpaceError::EmptySpace);
        }
        if !(bucket > 0.0 && bucket.is_finite()) {
            return Err(SpaceError::InvalidQuery {
                reason: format!("bucket size must be > 0, got {bucket}"),
            });
        }
        let cols = ((width / bucket).ceil() as usize).max(1);
        let rows = ((height / bucket).ceil() as usize).max(1);
        Ok(Self {
            width,
            height,
            torus,
            bucket,
            cell_w: width / cols as f64,
            cell_h: height / rows as f64,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
            positions: IndexMap::new(),
        })
    }

    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Whether coordinates wrap.
    pub fn torus(&self) -> bool {
        self.torus
    }

    /// Requested side of an index bucket. Actual buckets are shrunk so
    /// that a whole number of them tiles each axis.
    pub fn bucket_size(&self) -> f64 {
        self.bucket
    }

    fn wrap_axis(v: f64, len: f64) -> f64 {
        let w = v.rem_euclid(len);
        if w >= len {
            0.0
        } else {
            w
        }
    }

    /// Canonical form of `p`: wrapped on a torus, checked otherwise.
    pub fn normalize(&self, p: Point) -> Result<Point, SpaceError> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(self.out_of_bounds(p));
        }
        if self.torus {
            return Ok(Point::new(
                Self::wrap_axis(p.x, self.width),
                Self::wrap_axis(p.y, self.height),
            ));
        }
        if (0.0..self.width).contains(&p.x) && (0.0..self.height).contains(&p.y) {
            Ok(p)
        } else {
            Err(self.out_of_bounds(p))
        }
    }

    fn out_of_bounds(&self, p: Point) -> SpaceError {
        SpaceError::out_of_bounds(
            (p.x, p.y),
            format!("[0, {}) x [0, {})", self.width, self.height),
        )
    }

    /// Euclidean distance, taking the short way round on a torus.
    pub fn distance(&self, a: Point, b: Point) -> f64 {
        let mut dx = (a.x - b.x).abs();
        let mut dy = (a.y - b.y).abs();
        if self.torus {
            dx = dx.min(self.width - dx);
            dy = dy.min(self.height - dy);
        }
        dx.hypot(dy)
    }

    /// Displacement from `a` to `b` along the shortest path.
    pub fn heading(&self, a: Point, b: Point) -> (f64, f64) {
        let mut dx = b.x - a.x;
        let mut dy = b.y - a.y;
        if self.torus {
            if dx.abs() > self.width / 2.0 {
                dx -= self.width * dx.signum();
            }
            if dy.abs() > self.height / 2.0 {
                dy -= self.height * dy.signum();
            }
        }
        (dx, dy)
    }

    fn bucket_xy(&self, p: Point) -> (usize, usize) {
        let bx = ((p.x / self.cell_w) as usize).min(self.cols - 1);
        let by = ((p.y / self.cell_h) as usize).min(self.rows - 1);
        (bx, by)
    }

    fn bucket_of(&self, p: Point) -> usize {
        let (bx, by) = self.bucket_xy(p);
        by * self.cols + bx
    }

    /// Bucket indices along one axis covering `[b - span, b + span]`.
    fn axis_range(&self, b: usize, span: usize, len: usize) -> Vec<usize> {
        if self.torus {
            if 2 * span + 1 >= len {
                return (0..len).collect();
            }
            (0..=2 * span)
                .map(|k| (b + len + k - span) % len)
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect()
        } else {
            (b.saturating_sub(span)..=(b + span).min(len - 1)).collect()
        }
    }

    fn query(&self, pos: Point, q: &RadiusQuery) -> Result<Vec<(AgentId, Point)>, SpaceError> {
        if !(q.radius >= 0.0 && q.radius.is_finite()) {
            return Err(SpaceError::InvalidQuery {
                reason: format!("radius must be finite and >= 0, got {}", q.radius),
            });
        }
        let center = self.normalize(pos)?;
        let (bx, by) = self.bucket_xy(center);
        let span_x = ((q.radius / self.cell_w).ceil() as usize).min(self.cols);
        let span_y = ((q.radius / self.cell_h).ceil() as usize).min(self.rows);
        let xs = self.axis_range(bx, span_x, self.cols);
        let ys = self.axis_range(by, span_y, self.rows);
        let mut out = Vec::new();
        for &y in &ys {
            for &x in &xs {
                for &agent in &self.buckets[y * self.cols + x] {
                    let p = self.positions[&agent];
                    let d = self.distance(center, p);
                    if d <= q.radius && (q.include_center || d > 0.0) {
                        out.push((agent, p));
                    }
                }
            }
        }
        out.sort_by_key(|&(a, _)| a);
        Ok(out)
    }

    fn exact(&self, pos: Point) -> Result<Vec<AgentId>, SpaceError> {
        let p = self.normalize(pos)?;
        let mut out: Vec<AgentId> = self.buckets[self.bucket_of(p)]
            .iter()
            .copied()
            .filter(|a| self.positions[a] == p)
            .collect();
        out.sort();
        Ok(out)
    }
}

impl Membership for Continuous2D {
    fn remove(&mut self, agent: AgentId) -> bool {
        match self.positions.swap_remove(&agent) {
            Some(p) => {
                let b = self.bucket_of(p);
                self.buckets[b].retain(|&a| a != agent);
                true
            }
            None => false,
        }
    }

    fn contains(&self, agent: AgentId) -> bool {
        self.positions.contains_key(&agent)
    }

    fn agent_count(&self) -> usize {
        self.positions.len()
    }
}

impl Space for Continuous2D {
    type Pos = Point;
    type Query = RadiusQuery;

    fn place(&mut self, agent: AgentId, pos: Point) -> Result<(), SpaceError> {
        if self.positions.contains_key(&agent) {
            return Err(SpaceError::AlreadyPlaced { agent });
        }
        let p = self.normalize(pos)?;
        let b = self.bucket_of(p);
        self.buckets[b].push(agent);
        self.positions.insert(agent, p);
        Ok(())
    }

    fn move_agent(&mut self, agent: AgentId, pos: Point) -> Result<(), SpaceError> {
        let old = *self
            .positions
            .get(&agent)
            .ok_or(SpaceError::NotPlaced { agent })?;
        let p = self.normalize(pos)?;
        let (from, to) = (self.bucket_of(old), self.bucket_of(p));
        if from != to {
            self.buckets[from].retain(|&a| a != agent);
            self.buckets[to].push(agent);
        }
        self.positions.insert(agent, p);
        Ok(())
    }

    fn position(&self, agent: AgentId) -> Option<Point> {
        self.positions.get(&agent).copied()
    }

    fn contents(&self, pos: Point) -> Result<Vec<AgentId>, SpaceError> {
        self.exact(pos)
    }

    fn is_empty(&self, pos: Point) -> Result<bool, SpaceError> {
        Ok(self.exact(pos)?.is_empty())
    }

    fn neighborhood(&self, pos: Point, query: &RadiusQuery) -> Result<Vec<Point>, SpaceError> {
        Ok(self.query(pos, query)?.into_iter().map(|(_, p)| p).collect())
    }

    fn neighbors(&self, pos: Point, query: &RadiusQuery) -> Result<Vec<AgentId>, SpaceError> {
        Ok(self.query(pos, query)?.into_iter().map(|(a, _)| a).collect())
    }
}
