//! Randomized, finite descriptor sequence.

use super::descriptor::ImageDescriptor;
use rand::Rng;

/// Fisher–Yates shuffle in place: every permutation is equally likely.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Cursor over a shuffled copy of the catalog.
///
/// Yields each descriptor once and cannot be rewound. The call that finds nothing left sets the
/// exhausted flag; from then on the cycler rotates the images it already
/// mounted instead of asking for more.
#[derive(Debug, Clone)]
pub struct DescriptorSequence {
    order: Vec<ImageDescriptor>,
    cursor: usize,
    exhausted: bool,
}

impl DescriptorSequence {
    pub fn new<R: Rng + ?Sized>(mut descriptors: Vec<ImageDescriptor>, rng: &mut R) -> Self {
        shuffle(&mut descriptors, rng);
        Self {
            order: descriptors,
            cursor: 0,
            exhausted: false,
        }
    }

    pub fn next_descriptor(&mut self) -> Option<&ImageDescriptor> {
        match self.order.get(self.cursor) {
            Some(descriptor) => {
                self.cursor += 1;
                Some(descriptor)
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Look up a descriptor by image name.
    pub fn find(&self, name: &str) -> Option<&ImageDescriptor> {
        self.order.iter().find(|d| d.name == name)
    }
}
