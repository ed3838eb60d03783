//! Typed destinations and shape-aware binding of extracted matches.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BindError;
use crate::extract::{Match, extract};
use crate::path::PathPattern;

/// Declared shape of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Single value.
    Scalar,
    /// Flat ordered sequence.
    Sequence,
    /// One sequence per generated alias.
    Nested,
}

trait ScalarSlot {
    fn assign(&mut self, found: Match<'_>, path: &PathPattern) -> Result<(), BindError>;
}

/// Matches extracted by one path, kept with that path for error reporting.
type Extracted<'t, 'p> = (&'p PathPattern, Vec<Match<'t>>);

trait SequenceSlot {
    fn append(&mut self, found: &[Extracted<'_, '_>]) -> Result<(), BindError>;
}

trait NestedSlot {
    fn replace(&mut self, rows: &[Extracted<'_, '_>]) -> Result<(), BindError>;
}

struct Cell<'a, T>(&'a mut T);

struct Column<'a, T>(&'a mut Vec<T>);

struct Grid<'a, T>(&'a mut Vec<Vec<T>>);

impl<T: DeserializeOwned + Default> ScalarSlot for Cell<'_, T> {
    fn assign(&mut self, found: Match<'_>, path: &PathPattern) -> Result<(), BindError> {
        *self.0 = decode(found, path)?;
        Ok(())
    }
}

impl<T: DeserializeOwned + Default> SequenceSlot for Column<'_, T> {
    fn append(&mut self, found: &[Extracted<'_, '_>]) -> Result<(), BindError> {
        let mut decoded = Vec::new();
        for (path, matches) in found {
            decoded.extend(decode_all::<T>(matches, path)?);
        }
        self.0.append(&mut decoded);
        Ok(())
    }
}

impl<T: DeserializeOwned + Default> NestedSlot for Grid<'_, T> {
    fn replace(&mut self, rows: &[Extracted<'_, '_>]) -> Result<(), BindError> {
        let decoded = rows
            .iter()
            .map(|(path, matches)| decode_all(matches, path))
            .collect::<Result<Vec<_>, _>>()?;
        *self.0 = decoded;
        Ok(())
    }
}

fn decode_all<T: DeserializeOwned + Default>(
    found: &[Match<'_>],
    path: &PathPattern,
) -> Result<Vec<T>, BindError> {
    found.iter().map(|item| decode(*item, path)).collect()
}

/// Decode one match; missing data and `null` become `T::default()`.
fn decode<T: DeserializeOwned + Default>(
    found: Match<'_>,
    path: &PathPattern,
) -> Result<T, BindError> {
    match found {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_path_to_error::deserialize(value).map_err(|err| BindError::Decode {
            path: path.to_string(),
            field: err.path().to_string(),
            message: err.into_inner().to_string(),
        }),
    }
}

enum Slot<'a> {
    Scalar(Box<dyn ScalarSlot + Send + 'a>),
    Sequence(Box<dyn SequenceSlot + Send + 'a>),
    Nested(Box<dyn NestedSlot + Send + 'a>),
}

/// A borrowed destination together with its element decoder.
///
/// Element types need `Default` because missing data binds to the default
/// value instead of failing, and `Send` so routes can cross await points.
pub struct Target<'a> {
    slot: Slot<'a>,
}

impl<'a> Target<'a> {
    /// Bind the first match into `cell`.
    pub fn scalar<T: DeserializeOwned + Default + Send + 'a>(cell: &'a mut T) -> Self {
        Self {
            slot: Slot::Scalar(Box::new(Cell(cell))),
        }
    }

    /// Append every match to `items`.
    pub fn sequence<T: DeserializeOwned + Default + Send + 'a>(items: &'a mut Vec<T>) -> Self {
        Self {
            slot: Slot::Sequence(Box::new(Column(items))),
        }
    }

    /// Fill one inner sequence per route path.
    pub fn nested<T: DeserializeOwned + Default + Send + 'a>(rows: &'a mut Vec<Vec<T>>) -> Self {
        Self {
            slot: Slot::Nested(Box::new(Grid(rows))),
        }
    }

    /// Declared shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        match self.slot {
            Slot::Scalar(_) => Shape::Scalar,
            Slot::Sequence(_) => Shape::Sequence,
            Slot::Nested(_) => Shape::Nested,
        }
    }
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}

/// A destination paired with the path(s) it reads from.
///
/// Scalar and sequence routes normally carry one path. Nested routes carry
/// one path per outer index.
#[derive(Debug)]
pub struct Route<'a> {
    target: Target<'a>,
    paths: Vec<PathPattern>,
}

impl<'a> Route<'a> {
    /// Route `target` to a single path.
    pub fn new(target: Target<'a>, path: impl Into<PathPattern>) -> Self {
        Self {
            target,
            paths: vec![path.into()],
        }
    }

    /// Route `target` to several paths, one per outer index for nested targets.
    pub fn fanned(target: Target<'a>, paths: Vec<PathPattern>) -> Self {
        Self { target, paths }
    }

    /// Paths in bind order.
    #[must_use]
    pub fn paths(&self) -> &[PathPattern] {
        &self.paths
    }

    /// Shape of the destination.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.target.shape()
    }

    /// Extract from `tree` and populate the destination.
    ///
    /// A scalar takes the first match over all paths, sequences append every
    /// match, and nested destinations are replaced by one row per path. Every
    /// match is decoded before the destination is touched, so a decode
    /// failure leaves it unchanged.
    pub fn bind(self, tree: &Value) -> Result<(), BindError> {
        let Self { target, paths } = self;
        match target.slot {
            Slot::Scalar(mut cell) => {
                let (found, path) = paths
                    .iter()
                    .find_map(|path| extract(tree, path).into_iter().next().map(|m| (m, path)))
                    .unwrap_or((None, paths.first().unwrap_or(&ROOT)));
                cell.assign(found, path)
            }
            Slot::Sequence(mut items) => items.append(&extract_each(tree, &paths)),
            Slot::Nested(mut rows) => rows.replace(&extract_each(tree, &paths)),
        }
    }
}

fn extract_each<'t, 'p>(tree: &'t Value, paths: &'p [PathPattern]) -> Vec<Extracted<'t, 'p>> {
    paths.iter().map(|path| (path, extract(tree, path))).collect()
}

static ROOT: PathPattern = PathPattern::root();

/// Bind every route in order, stopping at the first decode failure.
///
/// Routes bound before the failing one keep their new values; the failing
/// route and those after it are left unchanged.
pub fn bind_all<'a>(
    routes: impl IntoIterator<Item = Route<'a>>,
    tree: &Value,
) -> Result<(), BindError> {
    for route in routes {
        route.bind(tree)?;
    }
    Ok(())
}

/// Drop elements equal to their type's default value.
#[must_use]
pub fn present<T: Default + PartialEq>(items: Vec<T>) -> Vec<T> {
    let zero = T::default();
    items.into_iter().filter(|item| *item != zero).collect()
}
