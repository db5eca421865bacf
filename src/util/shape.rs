//! Array shapes.
//!
//! A shape lists the extent of each axis of a channel array in C order
//! (slowest axis first), as recorded in an `.npy` header.

use smallvec::SmallVec;

/// Shape of a multi-dimensional array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Size of each axis. Empty means scalar (rank 0).
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    /// Create an image shape `[height, width]`.
    pub fn image(height: usize, width: usize) -> Self {
        Self { dims: smallvec::smallvec![height, width] }
    }

    /// Create from a slice of sizes.
    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Size of one axis, `None` past the rank.
    pub fn size(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// All axis sizes.
    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements (product of all axes), saturating at `usize::MAX`.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Total number of elements, `None` if the product overflows.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Prepend a new outermost axis.
    pub fn stacked(&self, count: usize) -> Self {
        let mut dims = SmallVec::with_capacity(self.dims.len() + 1);
        dims.push(count);
        dims.extend_from_slice(&self.dims);
        Self { dims }
    }
}

impl From<(usize, usize)> for Shape {
    fn from((h, w): (usize, usize)) -> Self {
        Self::image(h, w)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}
