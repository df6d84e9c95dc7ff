//! Hero image cycling.
//!
//! The home page shows one large image at a time, drawn from the hero
//! catalog the build writes (`hero.json`). The cycler shuffles the catalog
//! once per page load, loads the variant that fits the viewport through
//! the asset cache, and swaps images on a timer.
//!
//! | Module | Role |
//! |--------|------|
//! | [`descriptor`] | `ImageDescriptor`, styles, width selection, catalog building |
//! | [`sequence`] | Fisher–Yates shuffle and the finite descriptor cursor |
//! | [`layer`] | Mounted images; first child visible, ring-buffer rotation |
//! | [`cycler`] | The `Idle → FirstImageLoaded → Cycling ⇄ Paused → Terminated` machine |

pub mod cycler;
pub mod descriptor;
pub mod layer;
pub mod sequence;

pub use cycler::{CycleState, HeroCycler, PageEvent, is_home};
pub use descriptor::{
    HERO_CATALOG_FILENAME, HeroCatalog, ImageDescriptor, ImageStyle, Orientation, RuntimeSettings,
    Viewport, build_catalog, optimal_width,
};
pub use sequence::{DescriptorSequence, shuffle};

use crate::cache::{AssetCache, CacheError, CacheStore, Fetcher};

/// Time each image stays on screen.
pub const DEFAULT_INTERVAL_MS: u64 = 25_000;

/// Published hero widths, ascending.
pub const WIDTHS: [u32; 4] = [1280, 1920, 2560, 3840];

/// Source of image bytes for the cycler.
pub trait ImageLoader {
    fn load(&mut self, url: &str) -> Result<Vec<u8>, CacheError>;
}

/// Images load through an [`AssetCache`], normally one over the hero image
/// store ([`crate::cache::image_store_name`]), with the same hash checks
/// as every other asset.
impl<S: CacheStore, F: Fetcher> ImageLoader for AssetCache<S, F> {
    fn load(&mut self, url: &str) -> Result<Vec<u8>, CacheError> {
        self.get_asset(url).map(|response| response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::MockFetcher;
    use crate::cache::{CacheRegistry, DiskRegistry, MemoryStore, image_store_name};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    #[test]
    fn cycler_loads_through_asset_cache_once_per_url() {
        let url = "assets/images/hero/lake/lake_1280.1a2b3c4d.webp";
        let descriptor = ImageDescriptor {
            name: "lake".to_string(),
            base_url: "assets/images/hero/lake/lake".to_string(),
            srcset: format!("{url} 1280w"),
            widths: vec![1280],
            urls: BTreeMap::from([(1280, url.to_string())]),
            landscape: ImageStyle::default_landscape(),
            portrait: ImageStyle::default_portrait(),
        };
        let cache = AssetCache::new(MemoryStore::new(), MockFetcher::serving(&[(url, "webp")]));
        let mut rng = StdRng::seed_from_u64(0);

        let mut first = HeroCycler::new(
            vec![descriptor.clone()],
            cache,
            Viewport::new(1024, 768),
            DEFAULT_INTERVAL_MS,
            &mut rng,
        );
        first.start(0, true);
        assert_eq!(first.layer().len(), 1);

        // A second page load reuses the cached body.
        let (store, fetcher) = first.into_loader().into_parts();
        assert_eq!(fetcher.requests(), [url]);
        let mut second = HeroCycler::new(
            vec![descriptor],
            AssetCache::new(store, fetcher),
            Viewport::new(1024, 768),
            DEFAULT_INTERVAL_MS,
            &mut rng,
        );
        second.start(0, true);
        assert_eq!(second.layer().len(), 1);
        assert_eq!(second.loader().fetcher().requests(), [url]);
    }

    #[test]
    fn cycler_fills_the_hero_image_store() {
        let url = "assets/images/hero/lake/lake_1920.1a2b3c4d.webp";
        let tmp = tempfile::TempDir::new().unwrap();
        let catalog = HeroCatalog {
            images: vec![ImageDescriptor {
                name: "lake".to_string(),
                base_url: "assets/images/hero/lake/lake".to_string(),
                srcset: format!("{url} 1920w"),
                widths: vec![1920],
                urls: BTreeMap::from([(1920, url.to_string())]),
                landscape: ImageStyle::default_landscape(),
                portrait: ImageStyle::default_portrait(),
            }],
            settings: RuntimeSettings::default(),
        };
        let registry = DiskRegistry::new(tmp.path());
        let cache = AssetCache::new(
            registry.open(&image_store_name()).unwrap(),
            MockFetcher::serving(&[(url, "webp")]),
        );
        let mut rng = StdRng::seed_from_u64(0);

        let mut cycler =
            HeroCycler::from_catalog(&catalog, cache, Viewport::new(1600, 900), &mut rng);
        cycler.start(0, true);

        let reopened = registry.open(&image_store_name()).unwrap();
        assert_eq!(reopened.keys().unwrap(), [url]);
        assert_eq!(registry.names().unwrap(), ["ImageCacheDB"]);
    }
}
