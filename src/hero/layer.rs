//! The hero image layer.
//!
//! Only the first image of the layer is visible; prepending an image is
//! the transition. Once the descriptor sequence runs dry the layer is a
//! ring buffer: the oldest image (last) moves back to the front.

use super::descriptor::{CtaColors, ImageDescriptor, ImageStyle, SIZES_ATTR};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPriority {
    High,
    Auto,
}

/// An image element in the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedImage {
    pub name: String,
    /// URL of the loaded variant.
    pub src: String,
    pub width: u32,
    pub srcset: String,
    pub sizes: &'static str,
    pub fetch_priority: FetchPriority,
    pub bytes: usize,
    /// Inline CSS properties.
    pub style: Vec<(&'static str, String)>,
    /// Colors for the call to action while this image is shown.
    pub colors: CtaColors,
}

impl MountedImage {
    pub fn new(
        descriptor: &ImageDescriptor,
        src: &str,
        width: u32,
        bytes: usize,
        style: &ImageStyle,
        first: bool,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            src: src.to_string(),
            width,
            srcset: descriptor.srcset.clone(),
            sizes: SIZES_ATTR,
            fetch_priority: if first {
                FetchPriority::High
            } else {
                FetchPriority::Auto
            },
            bytes,
            style: style.css_properties(),
            colors: style.colors(),
        }
    }

    pub fn apply_style(&mut self, style: &ImageStyle) {
        self.style = style.css_properties();
        self.colors = style.colors();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLayer {
    images: VecDeque<MountedImage>,
}

impl ImageLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(&mut self, image: MountedImage) {
        self.images.push_front(image);
    }

    /// Move the oldest image to the front. No-op with fewer than two.
    pub fn rotate(&mut self) -> bool {
        if self.images.len() < 2 {
            return false;
        }
        self.images.rotate_right(1);
        true
    }

    pub fn visible(&self) -> Option<&MountedImage> {
        self.images.front()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.images.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MountedImage> {
        self.images.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> MountedImage {
        MountedImage {
            name: name.to_string(),
            src: format!("{name}.webp"),
            width: 1280,
            srcset: String::new(),
            sizes: SIZES_ATTR,
            fetch_priority: FetchPriority::Auto,
            bytes: 1,
            style: Vec::new(),
            colors: CtaColors::default(),
        }
    }

    #[test]
    fn prepend_makes_newest_visible() {
        let mut layer = ImageLayer::new();
        layer.prepend(image("a"));
        layer.prepend(image("b"));
        assert_eq!(layer.visible().map(|i| i.name.as_str()), Some("b"));
        assert_eq!(layer.names(), ["b", "a"]);
    }

    #[test]
    fn rotate_moves_oldest_to_front() {
        let mut layer = ImageLayer::new();
        for name in ["a", "b", "c"] {
            layer.prepend(image(name));
        }
        assert_eq!(layer.names(), ["c", "b", "a"]);

        assert!(layer.rotate());
        assert_eq!(layer.names(), ["a", "c", "b"]);
        assert!(layer.rotate());
        assert!(layer.rotate());
        assert_eq!(layer.names(), ["c", "b", "a"]);
    }

    #[test]
    fn rotate_single_image_is_noop() {
        let mut layer = ImageLayer::new();
        layer.prepend(image("a"));
        assert!(!layer.rotate());
        assert_eq!(layer.names(), ["a"]);
    }
}
