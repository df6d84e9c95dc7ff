//! The hero cycler state machine.
//!
//! ```text
//! Idle ──start──▶ FirstImageLoaded ──timer──▶ Cycling ⇄ Paused
//!                                                │         │
//!                         navigate away / unload ▼         ▼
//!                                             Terminated
//! ```
//!
//! Time and page events are fed in through [`HeroCycler::handle`], so
//! timer firing is deterministic: the timer is a due timestamp compared
//! against each [`PageEvent::Tick`].

use super::ImageLoader;
use super::descriptor::{HeroCatalog, ImageDescriptor, Orientation, Viewport};
use super::layer::{ImageLayer, MountedImage};
use super::sequence::DescriptorSequence;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FirstImageLoaded,
    Cycling,
    Paused,
    Terminated,
}

/// Inputs from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Clock advanced to the given millisecond timestamp.
    Tick(u64),
    Visibility { visible: bool, now: u64 },
    /// The page path changed.
    Navigated(String),
    OrientationChanged(Orientation),
    Unload,
}

/// Whether a path is the home route, where the hero lives.
pub fn is_home(path: &str) -> bool {
    matches!(path, "" | "/" | "/index.html")
}

pub struct HeroCycler<L> {
    state: CycleState,
    sequence: DescriptorSequence,
    layer: ImageLayer,
    loader: L,
    viewport: Viewport,
    orientation: Orientation,
    interval_ms: u64,
    /// Due time of the next cycle while the timer runs.
    timer: Option<u64>,
    visible: bool,
    skipped: Vec<String>,
}

impl<L: ImageLoader> HeroCycler<L> {
    pub fn new<R: Rng + ?Sized>(
        descriptors: Vec<ImageDescriptor>,
        loader: L,
        viewport: Viewport,
        interval_ms: u64,
        rng: &mut R,
    ) -> Self {
        Self {
            state: CycleState::Idle,
            sequence: DescriptorSequence::new(descriptors, rng),
            layer: ImageLayer::new(),
            loader,
            orientation: viewport.orientation(),
            viewport,
            interval_ms,
            timer: None,
            visible: true,
            skipped: Vec::new(),
        }
    }

    /// Cycler over a build's catalog, swapping images at its interval.
    pub fn from_catalog<R: Rng + ?Sized>(
        catalog: &HeroCatalog,
        loader: L,
        viewport: Viewport,
        rng: &mut R,
    ) -> Self {
        Self::new(
            catalog.images.clone(),
            loader,
            viewport,
            catalog.settings.interval_ms,
            rng,
        )
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn layer(&self) -> &ImageLayer {
        &self.layer
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn into_loader(self) -> L {
        self.loader
    }

    pub fn is_exhausted(&self) -> bool {
        self.sequence.is_exhausted()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Names of images that failed to load.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Due time of the next cycle, if the timer is running.
    pub fn next_due(&self) -> Option<u64> {
        self.timer
    }

    /// Load the first image and start the timer if the page is visible.
    pub fn start(&mut self, now: u64, visible: bool) {
        if self.state != CycleState::Idle {
            return;
        }
        self.visible = visible;
        if self.get_first_image().is_none() {
            tracing::warn!("no hero image could be loaded");
            return;
        }
        self.state = CycleState::FirstImageLoaded;
        if visible {
            self.start_timer(now);
        } else {
            self.state = CycleState::Paused;
        }
    }

    /// Mount the first loadable descriptor. Failed images are skipped.
    pub fn get_first_image(&mut self) -> Option<&MountedImage> {
        while self.layer.is_empty() {
            let descriptor = self.sequence.next_descriptor()?.clone();
            if let Some(image) = self.load(&descriptor, true) {
                self.layer.prepend(image);
            }
        }
        self.layer.visible()
    }

    /// One timer step: show the next descriptor, or rotate once exhausted.
    pub fn cycle_images(&mut self) {
        if !self.sequence.is_exhausted() {
            if let Some(descriptor) = self.sequence.next_descriptor().cloned() {
                if let Some(image) = self.load(&descriptor, false) {
                    tracing::debug!(image = %image.name, "next hero image");
                    self.layer.prepend(image);
                }
                return;
            }
            tracing::debug!(mounted = self.layer.len(), "hero sequence exhausted");
        }
        self.layer.rotate();
    }

    pub fn handle(&mut self, event: PageEvent) {
        if self.state == CycleState::Terminated {
            return;
        }
        match event {
            PageEvent::Tick(now) => {
                if let Some(due) = self.timer
                    && now >= due
                {
                    self.cycle_images();
                    self.timer = Some(now + self.interval_ms);
                }
            }
            PageEvent::Visibility { visible, now } => {
                self.visible = visible;
                match (visible, self.state) {
                    (false, CycleState::Cycling | CycleState::FirstImageLoaded) => {
                        self.timer = None;
                        self.state = CycleState::Paused;
                    }
                    (true, CycleState::Paused) => self.start_timer(now),
                    _ => {}
                }
            }
            PageEvent::Navigated(path) => {
                if !is_home(&path) {
                    tracing::debug!(path, "left home page, hero stopped");
                    self.terminate();
                }
            }
            PageEvent::OrientationChanged(orientation) => self.restyle(orientation),
            PageEvent::Unload => self.terminate(),
        }
    }

    fn start_timer(&mut self, now: u64) {
        self.timer = Some(now + self.interval_ms);
        self.state = CycleState::Cycling;
    }

    fn terminate(&mut self) {
        self.timer = None;
        self.state = CycleState::Terminated;
    }

    /// Re-apply orientation styles to mounted images. Nothing is fetched.
    fn restyle(&mut self, orientation: Orientation) {
        if orientation == self.orientation {
            return;
        }
        self.orientation = orientation;
        let sequence = &self.sequence;
        for image in self.layer.iter_mut() {
            if let Some(descriptor) = sequence.find(&image.name) {
                image.apply_style(descriptor.style(orientation));
            }
        }
    }

    fn load(&mut self, descriptor: &ImageDescriptor, first: bool) -> Option<MountedImage> {
        let Some((width, url)) = descriptor.optimal_url(self.viewport.width) else {
            tracing::warn!(image = %descriptor.name, "no variant for viewport");
            self.skipped.push(descriptor.name.clone());
            return None;
        };
        match self.loader.load(url) {
            Ok(body) if !body.is_empty() => Some(MountedImage::new(
                descriptor,
                url,
                width,
                body.len(),
                descriptor.style(self.orientation),
                first,
            )),
            Ok(_) => {
                tracing::warn!(image = %descriptor.name, url, "empty image body, skipping");
                self.skipped.push(descriptor.name.clone());
                None
            }
            Err(e) => {
                tracing::warn!(image = %descriptor.name, error = %e, "hero image failed, skipping");
                self.skipped.push(descriptor.name.clone());
                None
            }
        }
    }
}
