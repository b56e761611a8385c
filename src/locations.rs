//! Electrode locations and registry alignment
//!
//! A [`LocationRegistry`] is the ordered, duplicate-free set of 3-D points that
//! indexes the rows and columns of a model's accumulator matrices. Two
//! registries are reconciled by [`LocationRegistry::align`], which produces a
//! joint ordering plus an index map for each side.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SupereegError};

/// A single electrode position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Whether every coordinate differs from `other` by at most `tolerance`
    pub fn matches(&self, other: &Location, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    /// Lexicographic (x, y, z) ordering
    pub fn total_cmp(&self, other: &Location) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.z.total_cmp(&other.z))
    }
}

impl From<[f64; 3]> for Location {
    fn from(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Index plan mapping two registries onto a shared ordering
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub joint: LocationRegistry,
    /// `left[i]` is the joint index of the left registry's i-th location
    pub left: Vec<usize>,
    /// `right[j]` is the joint index of the right registry's j-th location
    pub right: Vec<usize>,
}

impl Alignment {
    /// True when both sides already use the joint ordering unchanged
    pub fn is_identity(&self) -> bool {
        let n = self.joint.len();
        self.left.len() == n
            && self.right.len() == n
            && self.left.iter().enumerate().all(|(i, &k)| i == k)
            && self.right.iter().enumerate().all(|(i, &k)| i == k)
    }
}

/// Ordered set of unique electrode locations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationRegistry {
    locations: Vec<Location>,
}

impl LocationRegistry {
    /// Build a registry, keeping the given order.
    ///
    /// Fails with `Alignment` on exact duplicates and `InvalidParameter` on
    /// non-finite coordinates.
    pub fn new(locations: Vec<Location>) -> Result<Self> {
        if let Some(bad) = locations.iter().find(|l| !l.is_finite()) {
            return Err(SupereegError::InvalidParameter(format!(
                "non-finite location {}",
                bad
            )));
        }

        let mut order: Vec<usize> = (0..locations.len()).collect();
        order.sort_by(|&a, &b| locations[a].total_cmp(&locations[b]));
        for pair in order.windows(2) {
            if locations[pair[0]] == locations[pair[1]] {
                return Err(SupereegError::Alignment(format!(
                    "duplicate location {} at indices {} and {}",
                    locations[pair[0]], pair[0], pair[1]
                )));
            }
        }

        Ok(Self { locations })
    }

    pub fn from_coords(coords: &[[f64; 3]]) -> Result<Self> {
        Self::new(coords.iter().copied().map(Location::from).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }

    /// Position of `location` in this registry.
    ///
    /// More than one match within `tolerance` is an `Alignment` error.
    pub fn position(&self, location: &Location, tolerance: f64) -> Result<Option<usize>> {
        let mut found = None;
        for (i, candidate) in self.locations.iter().enumerate() {
            if candidate.matches(location, tolerance) {
                if let Some(prev) = found {
                    return Err(SupereegError::Alignment(format!(
                        "location {} is ambiguous: matches indices {} and {} within tolerance {}",
                        location, prev, i, tolerance
                    )));
                }
                found = Some(i);
            }
        }
        Ok(found)
    }

    pub fn is_sorted(&self) -> bool {
        self.locations
            .windows(2)
            .all(|w| w[0].total_cmp(&w[1]) != Ordering::Greater)
    }

    /// Sorted copy plus the permutation used: `sorted[k] == self[perm[k]]`
    pub fn sorted(&self) -> (Self, Vec<usize>) {
        let mut perm: Vec<usize> = (0..self.locations.len()).collect();
        perm.sort_by(|&a, &b| self.locations[a].total_cmp(&self.locations[b]));
        let locations = perm.iter().map(|&i| self.locations[i]).collect();
        (Self { locations }, perm)
    }

    /// Registry restricted/reordered to `indices`
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut picked = Vec::with_capacity(indices.len());
        for &i in indices {
            let loc = self.locations.get(i).ok_or(SupereegError::Index {
                index: i,
                len: self.locations.len(),
            })?;
            picked.push(*loc);
        }
        Self::new(picked)
    }

    /// Reconcile two registries onto a deterministic joint ordering.
    ///
    /// Locations of `other` that match one of ours within `tolerance` share its
    /// joint slot, represented by the lesser of the two points so that the
    /// result does not depend on operand order; the rest are appended. The
    /// joint registry is then sorted by coordinate tuple.
    pub fn align(&self, other: &LocationRegistry, tolerance: f64) -> Result<Alignment> {
        let mut joint = self.locations.clone();
        let mut claimed = vec![false; self.locations.len()];
        let mut right_raw = Vec::with_capacity(other.len());

        for loc in other.iter() {
            match self.position(loc, tolerance)? {
                Some(i) => {
                    if claimed[i] {
                        return Err(SupereegError::Alignment(format!(
                            "two locations map onto {} within tolerance {}",
                            self.locations[i], tolerance
                        )));
                    }
                    claimed[i] = true;
                    if loc.total_cmp(&joint[i]) == Ordering::Less {
                        joint[i] = *loc;
                    }
                    right_raw.push(i);
                }
                None => {
                    right_raw.push(joint.len());
                    joint.push(*loc);
                }
            }
        }

        let mut order: Vec<usize> = (0..joint.len()).collect();
        order.sort_by(|&a, &b| joint[a].total_cmp(&joint[b]));
        let mut rank = vec![0; joint.len()];
        for (new_pos, &old_pos) in order.iter().enumerate() {
            rank[old_pos] = new_pos;
        }

        let joint = LocationRegistry {
            locations: order.iter().map(|&i| joint[i]).collect(),
        };
        let left = (0..self.len()).map(|i| rank[i]).collect();
        let right = right_raw.into_iter().map(|i| rank[i]).collect();

        Ok(Alignment { joint, left, right })
    }

    /// Joint registry of `self` and `other`
    pub fn union(&self, other: &LocationRegistry, tolerance: f64) -> Result<Self> {
        Ok(self.align(other, tolerance)?.joint)
    }

    /// Same location set, ignoring order
    pub fn is_compatible(&self, other: &LocationRegistry, tolerance: f64) -> bool {
        if self.len() != other.len() {
            return false;
        }
        match self.align(other, tolerance) {
            Ok(alignment) => alignment.joint.len() == self.len(),
            Err(_) => false,
        }
    }
}
