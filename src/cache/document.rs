//! Assets referenced by a page.
//!
//! An element "currently references" an asset when it is a `<script src>`,
//! a `<link rel="stylesheet" href>` or an `<img src>`. The cache cleaner
//! keeps exactly the entries whose hash appears among those references.

use crate::hashname::extract_hash_from_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeSet, HashSet};

const REFERENCES: &str = "script[src], link[rel~=stylesheet][href], img[src]";

/// Element an asset is referenced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Script,
    Stylesheet,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub url: String,
}

fn reference(element: ElementRef) -> Option<Reference> {
    let element = element.value();
    let (kind, attribute) = match element.name() {
        "script" => (ReferenceKind::Script, "src"),
        "link" => (ReferenceKind::Stylesheet, "href"),
        "img" => (ReferenceKind::Image, "src"),
        _ => return None,
    };
    let url = element.attr(attribute)?.trim();
    (!url.is_empty()).then(|| Reference {
        kind,
        url: url.to_string(),
    })
}

/// Every referenced asset, in document order, deduplicated by URL.
pub fn references(html: &str) -> Vec<Reference> {
    let selector = Selector::parse(REFERENCES).expect("reference selector is valid");
    let document = Html::parse_document(html);
    let mut seen = BTreeSet::new();
    document
        .select(&selector)
        .filter_map(reference)
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

/// URLs of every referenced asset, in document order, deduplicated.
pub fn referenced_urls(html: &str) -> Vec<String> {
    references(html).into_iter().map(|r| r.url).collect()
}

/// Content hashes of every referenced asset that carries one.
pub fn referenced_hashes(html: &str) -> HashSet<String> {
    referenced_urls(html)
        .iter()
        .filter_map(|url| extract_hash_from_url(url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <link rel="stylesheet" href="assets/stylesheets/home.3f9a0c12.css">
  <link rel="preload" href="assets/fonts/inter.1a2b3c4d.woff2" as="font">
  <link href='assets/stylesheets/print.0badf00d.css' rel='stylesheet'>
  <script type="module" src="assets/javascripts/index.be41d7e0.js"></script>
</head>
<body>
  <img src="assets/images/logo.svg?v=deadbeef" alt="">
  <IMG SRC=assets/images/plain.png>
  <script>inline()</script>
</body>
</html>"#;

    #[test]
    fn collects_scripts_stylesheets_and_images() {
        assert_eq!(
            referenced_urls(PAGE),
            [
                "assets/stylesheets/home.3f9a0c12.css",
                "assets/stylesheets/print.0badf00d.css",
                "assets/javascripts/index.be41d7e0.js",
                "assets/images/logo.svg?v=deadbeef",
                "assets/images/plain.png",
            ]
        );
    }

    #[test]
    fn non_stylesheet_links_are_ignored() {
        assert!(!referenced_urls(PAGE).iter().any(|u| u.contains("fonts")));
    }

    #[test]
    fn hashes_from_paths_and_query_parameters() {
        let hashes = referenced_hashes(PAGE);
        let expected: HashSet<String> = ["3f9a0c12", "0badf00d", "be41d7e0", "deadbeef"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(hashes, expected);
    }

    #[test]
    fn angle_bracket_in_attribute_value_keeps_the_url() {
        let html = r#"<img alt="before > after" src="assets/images/logo.1a2b3c4d.svg">"#;
        assert_eq!(referenced_urls(html), ["assets/images/logo.1a2b3c4d.svg"]);
        assert!(referenced_hashes(html).contains("1a2b3c4d"));
    }

    #[test]
    fn tags_in_comments_and_scripts_are_not_references() {
        let html = r#"<!-- <img src="old.00000000.png"> -->
<script>document.write('<img src="inline.11111111.png">')</script>
<img src="live.22222222.png">"#;
        assert_eq!(referenced_urls(html), ["live.22222222.png"]);
    }

    #[test]
    fn entities_in_urls_are_decoded() {
        let html = r#"<img src="assets/images/logo.svg?size=2&amp;v=deadbeef">"#;
        assert_eq!(referenced_urls(html), ["assets/images/logo.svg?size=2&v=deadbeef"]);
        assert!(referenced_hashes(html).contains("deadbeef"));
    }

    #[test]
    fn references_carry_their_element_kind() {
        let kinds: Vec<ReferenceKind> = references(PAGE).into_iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [
                ReferenceKind::Stylesheet,
                ReferenceKind::Stylesheet,
                ReferenceKind::Script,
                ReferenceKind::Image,
                ReferenceKind::Image,
            ]
        );
    }

    #[test]
    fn duplicates_are_reported_once() {
        let html = r#"<img src="a.1a2b3c4d.png"><img src="a.1a2b3c4d.png">"#;
        assert_eq!(referenced_urls(html), ["a.1a2b3c4d.png"]);
    }
}
