use scraper::{ElementRef, Html, Selector};

use super::split_name_and_breed;
use crate::models::Candidate;
use crate::urls;

/// Generic image-link heuristic for sources whose listings are present in
/// the initial HTML: every image with a qualifying filename, its nearest
/// ancestor anchor, and a keyword test on the link or alt text. Permissive
/// by design; false positives are filtered by human review downstream.
pub fn extract_listings(html: &str, base_url: &str, keywords: &[String]) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let img_selector = Selector::parse("img").unwrap();

    let mut results = Vec::new();
    for img in document.select(&img_selector) {
        let Some(src) = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
        else {
            continue;
        };
        let Some(image_url) = urls::resolve(base_url, src) else {
            continue;
        };
        if !urls::has_image_extension(&image_url) {
            continue;
        }

        let Some(link) = nearest_anchor(img) else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(post_url) = urls::resolve(base_url, href) else {
            continue;
        };

        let alt = img.value().attr("alt").unwrap_or("");
        if !is_relevant(&post_url, alt, keywords) {
            continue;
        }

        let (name, breed) = split_name_and_breed(alt);
        let description = link
            .value()
            .attr("title")
            .or_else(|| img.value().attr("title"))
            .unwrap_or("");

        let mut candidate = Candidate::new(post_url, image_url)
            .with_name(name)
            .with_description(description);
        if let Some(breed) = breed {
            candidate = candidate.with_breed(breed);
        }
        results.push(candidate);
    }

    results
}

fn nearest_anchor(img: ElementRef<'_>) -> Option<ElementRef<'_>> {
    img.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
}

fn is_relevant(post_url: &str, alt: &str, keywords: &[String]) -> bool {
    let href = post_url.to_lowercase();
    let alt = alt.to_lowercase();
    keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        href.contains(&keyword) || alt.contains(&keyword)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_keywords;

    const BASE: &str = "https://rescue.example.com/listings";

    fn extract(html: &str) -> Vec<Candidate> {
        extract_listings(html, BASE, &default_keywords())
    }

    #[test]
    fn test_extracts_image_inside_anchor() {
        let html = r#"
            <html><body>
                <a href="/dogs/rex-123">
                    <img src="/photos/rex.jpg" alt="Rex">
                </a>
            </body></html>
        "#;

        let candidates = extract(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].post_url, "https://rescue.example.com/dogs/rex-123");
        assert_eq!(candidates[0].image_url, "https://rescue.example.com/photos/rex.jpg");
        assert_eq!(candidates[0].name, Some("Rex".to_string()));
    }

    #[test]
    fn test_data_src_fallback() {
        let html = r#"
            <a href="https://rescue.example.com/adopt/1">
                <img data-src="https://cdn.example.com/lazy.jpeg" alt="adoptable puppy">
            </a>
        "#;

        let candidates = extract(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].image_url, "https://cdn.example.com/lazy.jpeg");
    }

    #[test]
    fn test_rejects_non_image_filenames() {
        let html = r#"
            <a href="https://rescue.example.com/dogs/1">
                <img src="/assets/spinner.svg" alt="dog photo loading">
            </a>
        "#;

        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_rejects_image_without_ancestor_anchor() {
        let html = r#"<div><img src="/photos/banner.jpg" alt="our dogs"></div>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_rejects_irrelevant_links() {
        let html = r#"
            <a href="https://cdn.example.com/brand/logo-page">
                <img src="/logo.png" alt="site logo">
            </a>
        "#;

        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_keyword_match_on_alt_text() {
        let html = r#"
            <a href="https://rescue.example.com/view/991">
                <img src="/p/991.jpg" alt="Bella the puppy">
            </a>
        "#;

        let candidates = extract(html);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_profile_keyword_is_accepted() {
        // The keyword filter is a loose policy: "profile" links pass even
        // when nothing says "dog". Human review handles the rest.
        let html = r#"
            <a href="https://rescue.example.com/profile/991">
                <img src="/p/991.jpg" alt="">
            </a>
        "#;

        assert_eq!(extract(html).len(), 1);
    }

    #[test]
    fn test_name_breed_splitting() {
        let html = r#"
            <a href="https://rescue.example.com/adopt/7">
                <img src="/p/7.jpg" alt="Buddy - Kelpie x Mixed breed Dog">
            </a>
        "#;

        let candidates = extract(html);
        assert_eq!(candidates[0].name, Some("Buddy".to_string()));
        assert_eq!(candidates[0].breed, Some("Kelpie x Mixed breed".to_string()));
    }

    #[test]
    fn test_description_from_link_title() {
        let html = r#"
            <a href="https://rescue.example.com/adopt/8" title="Sweet senior girl">
                <img src="/p/8.jpg" alt="Daisy the dog">
            </a>
        "#;

        let candidates = extract(html);
        assert_eq!(candidates[0].description, Some("Sweet senior girl".to_string()));
    }

    #[test]
    fn test_custom_keyword_policy() {
        let html = r#"
            <a href="https://rescue.example.com/greyhounds/3">
                <img src="/p/3.jpg" alt="">
            </a>
        "#;

        let keywords = vec!["greyhound".to_string()];
        let candidates = extract_listings(html, BASE, &keywords);
        assert_eq!(candidates.len(), 1);
    }
}
