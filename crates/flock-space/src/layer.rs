//! Dense per-cell scalar fields.
//!
//! A [`PropertyLayer`] is a row-major `width × height` array of one
//! scalar type, addressed by `(x, y)`. Layers are independent of agent
//! positions: they model environmental state such as grass, pheromone
//! or a safety index.
//!
//! Writes are visible immediately. [`StagedLayer`] double-buffers the
//! array for models that want every reader in a tick to see the
//! pre-tick values.

use std::fmt::Debug;

use flock_core::{ConfigError, Value};

use crate::error::SpaceError;

/// Scalar types a layer may hold.
pub trait LayerValue: Copy + PartialEq + Debug + Default + Send + Sync + 'static {
    /// Convert to a reporter value.
    fn to_value(self) -> Value;
}

impl LayerValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

impl LayerValue for i64 {
    fn to_value(self) -> Value {
        Value::Int(self)
    }
}

impl LayerValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

/// An axis-aligned cell rectangle: `x..x + width`, `y..y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Columns covered.
    pub width: u32,
    /// Rows covered.
    pub height: u32,
}

impl Rect {
    /// The square of side `2 * radius + 1` centered on `(x, y)`, clipped
    /// at the origin.
    pub fn around(x: u32, y: u32, radius: u32) -> Self {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        Self {
            x: x0,
            y: y0,
            width: x + radius + 1 - x0,
            height: y + radius + 1 - y0,
        }
    }
}

/// A named dense array of scalars aligned with a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyLayer<T: LayerValue> {
    name: String,
    width: u32,
    height: u32,
    default: T,
    data: Vec<T>,
}

impl<T: LayerValue> PropertyLayer<T> {
    /// A layer filled with `default`.
    ///
    /// # Errors
    ///
    /// [`SpaceError::EmptySpace`] when either dimension is zero.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        default: T,
    ) -> Result<Self, SpaceError> {
        if width == 0 || height == 0 {
            return Err(SpaceError::EmptySpace);
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            default,
            data: vec![default; width as usize * height as usize],
        })
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The value the layer was created with.
    pub fn default_value(&self) -> T {
        self.default
    }

    fn offset(&self, x: i32, y: i32) -> Result<usize, SpaceError> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Err(SpaceError::out_of_bounds(
                (x, y),
                format!("[0, {}) x [0, {})", self.width, self.height),
            ));
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Value at `(x, y)`.
    pub fn get(&self, x: i32, y: i32) -> Result<T, SpaceError> {
        Ok(self.data[self.offset(x, y)?])
    }

    /// Overwrite the value at `(x, y)`.
    pub fn set(&mut self, x: i32, y: i32, value: T) -> Result<(), SpaceError> {
        let i = self.offset(x, y)?;
        self.data[i] = value;
        Ok(())
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Replace every value with `f(value)`.
    pub fn apply(&mut self, mut f: impl FnMut(T) -> T) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Replace every value with `f(x, y, value)`.
    pub fn apply_at(&mut self, mut f: impl FnMut(u32, u32, T) -> T) {
        let w = self.width as usize;
        for (i, v) in self.data.iter_mut().enumerate() {
            *v = f((i % w) as u32, (i / w) as u32, *v);
        }
    }

    /// Swap in a same-shaped row-major array.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ShapeMismatch`] if `width`/`height` differ from the
    /// layer's, or `data` does not hold exactly `width * height` values.
    /// The layer is unchanged on error.
    pub fn replace(&mut self, width: u32, height: u32, data: Vec<T>) -> Result<(), ConfigError> {
        let mismatch = |width, height| ConfigError::ShapeMismatch {
            expected_width: self.width,
            expected_height: self.height,
            width,
            height,
        };
        if width != self.width || height != self.height {
            return Err(mismatch(width, height));
        }
        if data.len() != self.data.len() {
            let rows = (data.len() / self.width as usize) as u32;
            return Err(mismatch(width, rows));
        }
        self.data = data;
        Ok(())
    }

    /// Row-major slice of every value.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Borrowed view of `rect`, clipped to the layer.
    pub fn view(&self, rect: Rect) -> LayerView<'_, T> {
        let x0 = rect.x.min(self.width);
        let y0 = rect.y.min(self.height);
        let x1 = rect.x.saturating_add(rect.width).min(self.width);
        let y1 = rect.y.saturating_add(rect.height).min(self.height);
        LayerView {
            layer: self,
            rect: Rect {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            },
        }
    }

    /// Values at the given cells, in order. Used for masked neighborhood
    /// reads where the cells are not a rectangle (torus wrap, hex disc).
    pub fn select(&self, cells: &[(i32, i32)]) -> Result<Vec<T>, SpaceError> {
        cells.iter().map(|&(x, y)| self.get(x, y)).collect()
    }

    /// Number of cells whose value satisfies `pred`.
    pub fn count_where(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| pred(v)).count()
    }
}

impl PropertyLayer<f64> {
    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Zero-copy rectangular window onto a layer.
#[derive(Clone, Copy, Debug)]
pub struct LayerView<'a, T: LayerValue> {
    layer: &'a PropertyLayer<T>,
    rect: Rect,
}

impl<'a, T: LayerValue> LayerView<'a, T> {
    /// The clipped rectangle this view covers.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Number of cells covered.
    pub fn len(&self) -> usize {
        self.rect.width as usize * self.rect.height as usize
    }

    /// Whether the view covers no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `(dx, dy)` relative to the view's top-left corner.
    pub fn get(&self, dx: u32, dy: u32) -> Option<T> {
        if dx >= self.rect.width || dy >= self.rect.height {
            return None;
        }
        let w = self.layer.width as usize;
        let i = (self.rect.y + dy) as usize * w + (self.rect.x + dx) as usize;
        Some(self.layer.data[i])
    }

    /// Each covered row as a contiguous slice.
    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + 'a {
        let w = self.layer.width as usize;
        let x0 = self.rect.x as usize;
        let x1 = x0 + self.rect.width as usize;
        let data = &self.layer.data;
        (self.rect.y..self.rect.y + self.rect.height).map(move |y| {
            let base = y as usize * w;
            &data[base + x0..base + x1]
        })
    }

    /// Every covered value, row by row.
    pub fn values(&self) -> impl Iterator<Item = T> + 'a {
        self.rows().flat_map(|row| row.iter().copied())
    }
}

/// A double-buffered layer.
///
/// Reads see the committed values; [`stage`](Self::stage) writes go to
/// a shadow buffer that becomes visible on [`commit`](Self::commit).
#[derive(Clone, Debug)]
pub struct StagedLayer<T: LayerValue> {
    current: PropertyLayer<T>,
    next: Vec<T>,
}

impl<T: LayerValue> StagedLayer<T> {
    /// A staged layer filled with `default`.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        default: T,
    ) -> Result<Self, SpaceError> {
        let current = PropertyLayer::new(name, width, height, default)?;
        let next = current.data.clone();
        Ok(Self { current, next })
    }

    /// The committed layer.
    pub fn current(&self) -> &PropertyLayer<T> {
        &self.current
    }

    /// Committed value at `(x, y)`.
    pub fn get(&self, x: i32, y: i32) -> Result<T, SpaceError> {
        self.current.get(x, y)
    }

    /// Value staged for `(x, y)` (the committed value if nothing staged).
    pub fn staged(&self, x: i32, y: i32) -> Result<T, SpaceError> {
        Ok(self.next[self.current.offset(x, y)?])
    }

    /// Write `value` to the shadow buffer.
    pub fn stage(&mut self, x: i32, y: i32, value: T) -> Result<(), SpaceError> {
        let i = self.current.offset(x, y)?;
        self.next[i] = value;
        Ok(())
    }

    /// Publish every staged write at once.
    pub fn commit(&mut self) {
        self.current.data.copy_from_slice(&self.next);
    }

    /// Throw away staged writes.
    pub fn discard(&mut self) {
        self.next.copy_from_slice(&self.current.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grass() -> PropertyLayer<f64> {
        PropertyLayer::new("grass", 4, 3, 0.0).unwrap()
    }

    #[test]
    fn get_set_and_bounds() {
        let mut l = grass();
        l.set(3, 2, 5.0).unwrap();
        assert_eq!(l.get(3, 2).unwrap(), 5.0);
        assert!(matches!(l.get(4, 0), Err(SpaceError::OutOfBounds { .. })));
        assert!(l.set(-1, 0, 1.0).is_err());
    }

    #[test]
    fn apply_and_fill() {
        let mut l = grass();
        l.fill(1.0);
        l.apply(|v| v * 2.0);
        assert_eq!(l.sum(), 24.0);
        l.apply_at(|x, y, _| (x + 10 * y) as f64);
        assert_eq!(l.get(2, 1).unwrap(), 12.0);
    }

    #[test]
    fn replace_checks_shape() {
        let mut l = grass();
        let err = l.replace(3, 4, vec![0.0; 12]).unwrap_err();
        assert!(matches!(err, ConfigError::ShapeMismatch { .. }));
        assert!(l.replace(4, 3, vec![1.0; 11]).is_err());
        l.replace(4, 3, vec![1.0; 12]).unwrap();
        assert_eq!(l.count_where(|v| v == 1.0), 12);
    }

    #[test]
    fn view_is_clipped_and_borrows_rows() {
        let mut l = grass();
        l.apply_at(|x, y, _| (x + 10 * y) as f64);
        let v = l.view(Rect::around(3, 0, 1));
        assert_eq!(
            v.rect(),
            Rect {
                x: 2,
                y: 0,
                width: 2,
                height: 2
            }
        );
        let rows: Vec<&[f64]> = v.rows().collect();
        assert_eq!(rows, vec![&[2.0, 3.0][..], &[12.0, 13.0][..]]);
        assert_eq!(v.get(1, 1), Some(13.0));
        assert_eq!(v.get(2, 0), None);
        assert_eq!(v.values().count(), 4);
    }

    #[test]
    fn staged_writes_invisible_until_commit() {
        let mut s = StagedLayer::new("alive", 2, 2, false).unwrap();
        s.stage(0, 0, true).unwrap();
        assert!(!s.get(0, 0).unwrap());
        assert!(s.staged(0, 0).unwrap());
        s.commit();
        assert!(s.get(0, 0).unwrap());
        s.stage(1, 1, true).unwrap();
        s.discard();
        assert!(!s.staged(1, 1).unwrap());
    }
}
