use url::Url;

/// File extensions accepted as listing photos.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Resolve a possibly-relative href/src against the page it was found on.
///
/// Returns `None` when neither the base nor the href can be parsed into an
/// absolute URL (e.g. `javascript:` fragments on a malformed page).
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Filename portion of an image URL with any query string stripped.
pub fn image_filename(src: &str) -> &str {
    let without_query = src.split('?').next().unwrap_or(src);
    without_query.rsplit('/').next().unwrap_or(without_query)
}

/// Whether the URL's filename carries a known image extension.
pub fn has_image_extension(src: &str) -> bool {
    let filename = image_filename(src).to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| filename.ends_with(&format!(".{ext}")))
}

/// Rewrite a Facebook URL to the mobile host used for scraping.
///
/// Already-mobile URLs are returned unchanged.
pub fn to_mobile_facebook(url: &str) -> String {
    if url.contains("m.facebook.com") {
        return url.to_string();
    }
    if url.contains("www.facebook.com") {
        return url.replace("www.facebook.com", "m.facebook.com");
    }
    if url.contains("facebook.com") {
        return url.replace("facebook.com", "m.facebook.com");
    }
    url.to_string()
}

/// Rewrite a mobile/touch Facebook permalink to the canonical host before it
/// is stored or shown to users.
pub fn to_canonical_facebook(url: &str) -> String {
    url.replace("m.facebook.com", "www.facebook.com")
        .replace("touch.facebook.com", "www.facebook.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_resolve_absolute_passthrough() {
        assert_eq!(
            resolve("https://dogshome.com/adopt/", "https://cdn.dogshome.com/a.jpg"),
            Some("https://cdn.dogshome.com/a.jpg".to_string())
        );
    }

    #[test]
    fn test_resolve_root_relative() {
        assert_eq!(
            resolve("https://dogshome.com/adopt/page", "/images/rex.jpg"),
            Some("https://dogshome.com/images/rex.jpg".to_string())
        );
    }

    #[test]
    fn test_resolve_protocol_relative() {
        assert_eq!(
            resolve("https://dogshome.com/adopt", "//cdn.example.com/rex.jpg"),
            Some("https://cdn.example.com/rex.jpg".to_string())
        );
    }

    #[test]
    fn test_resolve_empty_href() {
        assert_eq!(resolve("https://dogshome.com", ""), None);
    }

    #[test]
    fn test_image_filename_strips_query() {
        assert_eq!(
            image_filename("https://cdn.example.com/photos/rex.jpg?w=300&h=200"),
            "rex.jpg"
        );
    }

    #[rstest]
    #[case("https://x.com/a/rex.jpg", true)]
    #[case("https://x.com/a/rex.JPEG", true)]
    #[case("https://x.com/a/rex.png?size=big", true)]
    #[case("https://x.com/a/rex.webp", true)]
    #[case("https://x.com/a/rex.gif", true)]
    #[case("https://x.com/a/style.css", false)]
    #[case("https://x.com/a/rex.svg", false)]
    fn test_has_image_extension(#[case] src: &str, #[case] expected: bool) {
        assert_eq!(has_image_extension(src), expected);
    }

    #[rstest]
    #[case("https://www.facebook.com/FFARau", "https://m.facebook.com/FFARau")]
    #[case("https://facebook.com/FFARau", "https://m.facebook.com/FFARau")]
    #[case("https://m.facebook.com/FFARau", "https://m.facebook.com/FFARau")]
    #[case(
        "https://m.facebook.com/FFARau/posts/123",
        "https://m.facebook.com/FFARau/posts/123"
    )]
    fn test_to_mobile_facebook(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_mobile_facebook(input), expected);
    }

    #[test]
    fn test_to_canonical_facebook() {
        assert_eq!(
            to_canonical_facebook("https://m.facebook.com/groups/123/permalink/456"),
            "https://www.facebook.com/groups/123/permalink/456"
        );
        assert_eq!(
            to_canonical_facebook("https://touch.facebook.com/story.php?id=9"),
            "https://www.facebook.com/story.php?id=9"
        );
    }
}
