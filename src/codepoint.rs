//! Positional code-point allocation in the Unicode private-use area.
//!
//! Allocation is purely positional: the k-th glyph of a collection receives
//! `base + k`. Nothing is persisted between builds, so reordering, inserting
//! or removing icons shifts the code points of every icon after the change.
//! Fonts stay compatible across rebuilds only while the input order and the
//! base are unchanged.

use crate::error::AllocationError;

/// Base code point used when a build does not configure one.
pub const DEFAULT_BASE: u32 = 0xE614;

/// Inclusive private-use ranges: the BMP block and the two supplementary planes.
const PRIVATE_USE_RANGES: [(u32, u32); 3] = [
    (0xE000, 0xF8FF),
    (0xF_0000, 0xF_FFFD),
    (0x10_0000, 0x10_FFFD),
];

/// Assigns consecutive private-use code points in input order.
///
/// # Example
///
/// ```
/// use iconfont_builder::CodePointAllocator;
///
/// let allocator = CodePointAllocator::new(0xE614).unwrap();
/// let points = allocator.allocate(2).unwrap();
/// assert_eq!(points, vec!['\u{E614}', '\u{E615}']);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePointAllocator {
    base: u32,
    /// Last code point of the private-use range containing `base`.
    end: u32,
}

impl CodePointAllocator {
    /// Creates an allocator starting at `base`.
    ///
    /// Fails if `base` is outside every private-use range.
    pub fn new(base: u32) -> Result<Self, AllocationError> {
        let (_, end) = PRIVATE_USE_RANGES
            .iter()
            .copied()
            .find(|(start, end)| (*start..=*end).contains(&base))
            .ok_or(AllocationError::NotPrivateUse(base))?;
        Ok(Self { base, end })
    }

    /// Returns the first code point handed out.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Returns how many code points are available from the base.
    pub fn capacity(&self) -> usize {
        (self.end - self.base + 1) as usize
    }

    /// Allocates `count` strictly increasing code points.
    pub fn allocate(&self, count: usize) -> Result<Vec<char>, AllocationError> {
        if count > self.capacity() {
            return Err(AllocationError::RangeExhausted {
                base: self.base,
                requested: count,
                end: self.end,
            });
        }

        (self.base..self.base + count as u32)
            .map(|value| char::from_u32(value).ok_or(AllocationError::NotPrivateUse(value)))
            .collect()
    }

    /// Pairs each item with its code point, preserving input order.
    pub fn assign<'a, T>(&self, items: &'a [T]) -> Result<Vec<(&'a T, char)>, AllocationError> {
        let points = self.allocate(items.len())?;
        Ok(items.iter().zip(points).collect())
    }
}

impl Default for CodePointAllocator {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            end: 0xF8FF,
        }
    }
}
