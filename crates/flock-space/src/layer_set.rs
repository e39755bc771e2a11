//! Named collection of property layers attached to a grid.

use flock_core::{ConfigError, Value};
use indexmap::IndexMap;

use crate::error::SpaceError;
use crate::layer::{LayerValue, PropertyLayer};

/// A layer of any supported scalar type.
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    /// Boolean cells.
    Bool(PropertyLayer<bool>),
    /// Integer cells.
    Int(PropertyLayer<i64>),
    /// Float cells.
    Float(PropertyLayer<f64>),
}

impl Layer {
    /// Layer name.
    pub fn name(&self) -> &str {
        match self {
            Self::Bool(l) => l.name(),
            Self::Int(l) => l.name(),
            Self::Float(l) => l.name(),
        }
    }

    fn shape(&self) -> (u32, u32) {
        match self {
            Self::Bool(l) => (l.width(), l.height()),
            Self::Int(l) => (l.width(), l.height()),
            Self::Float(l) => (l.width(), l.height()),
        }
    }

    /// Value at `(x, y)` as a reporter value.
    pub fn value_at(&self, x: i32, y: i32) -> Result<Value, SpaceError> {
        Ok(match self {
            Self::Bool(l) => l.get(x, y)?.to_value(),
            Self::Int(l) => l.get(x, y)?.to_value(),
            Self::Float(l) => l.get(x, y)?.to_value(),
        })
    }
}

impl From<PropertyLayer<bool>> for Layer {
    fn from(l: PropertyLayer<bool>) -> Self {
        Self::Bool(l)
    }
}

impl From<PropertyLayer<i64>> for Layer {
    fn from(l: PropertyLayer<i64>) -> Self {
        Self::Int(l)
    }
}

impl From<PropertyLayer<f64>> for Layer {
    fn from(l: PropertyLayer<f64>) -> Self {
        Self::Float(l)
    }
}

/// Typed access into a [`Layer`].
pub trait LayerAccess: LayerValue {
    /// Borrow the layer if it holds `Self`.
    fn downcast(layer: &Layer) -> Option<&PropertyLayer<Self>>;
    /// Mutably borrow the layer if it holds `Self`.
    fn downcast_mut(layer: &mut Layer) -> Option<&mut PropertyLayer<Self>>;
}

macro_rules! layer_access {
    ($ty:ty, $variant:ident) => {
        impl LayerAccess for $ty {
            fn downcast(layer: &Layer) -> Option<&PropertyLayer<Self>> {
                match layer {
                    Layer::$variant(l) => Some(l),
                    _ => None,
                }
            }
            fn downcast_mut(layer: &mut Layer) -> Option<&mut PropertyLayer<Self>> {
                match layer {
                    Layer::$variant(l) => Some(l),
                    _ => None,
                }
            }
        }
    };
}

layer_access!(bool, Bool);
layer_access!(i64, Int);
layer_access!(f64, Float);

/// The layers of one grid, in insertion order.
///
/// Every layer matches the grid's shape. The set of layers is frozen
/// for the duration of a tick; layer contents are not.
#[derive(Clone, Debug)]
pub struct LayerSet {
    width: u32,
    height: u32,
    layers: IndexMap<String, Layer>,
    frozen: bool,
}

impl LayerSet {
    /// An empty set for a `width × height` grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: IndexMap::new(),
            frozen: false,
        }
    }

    /// Attach a layer.
    ///
    /// # Errors
    ///
    /// `MutationDuringTick` inside a tick; `Config(DuplicateLayer)` for a
    /// repeated name; `Config(ShapeMismatch)` if the layer's shape differs
    /// from the grid's.
    pub fn add(&mut self, layer: impl Into<Layer>) -> Result<(), SpaceError> {
        if self.frozen {
            return Err(SpaceError::MutationDuringTick { what: "layer set" });
        }
        let layer = layer.into();
        if self.layers.contains_key(layer.name()) {
            return Err(ConfigError::DuplicateLayer {
                name: layer.name().to_string(),
            }
            .into());
        }
        let (width, height) = layer.shape();
        if (width, height) != (self.width, self.height) {
            return Err(ConfigError::ShapeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width,
                height,
            }
            .into());
        }
        self.layers.insert(layer.name().to_string(), layer);
        Ok(())
    }

    /// Create and attach a layer filled with `default`.
    pub fn create<T>(&mut self, name: impl Into<String>, default: T) -> Result<(), SpaceError>
    where
        T: LayerAccess,
        Layer: From<PropertyLayer<T>>,
    {
        let layer = PropertyLayer::new(name, self.width, self.height, default)?;
        self.add(layer)
    }

    /// Detach a layer.
    pub fn remove(&mut self, name: &str) -> Result<Option<Layer>, SpaceError> {
        if self.frozen {
            return Err(SpaceError::MutationDuringTick { what: "layer set" });
        }
        Ok(self.layers.shift_remove(name))
    }

    /// Typed layer by name.
    pub fn get<T: LayerAccess>(&self, name: &str) -> Option<&PropertyLayer<T>> {
        self.layers.get(name).and_then(T::downcast)
    }

    /// Mutable typed layer by name.
    pub fn get_mut<T: LayerAccess>(&mut self, name: &str) -> Option<&mut PropertyLayer<T>> {
        self.layers.get_mut(name).and_then(T::downcast_mut)
    }

    /// Untyped layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Layer names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layers are attached.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }
}
