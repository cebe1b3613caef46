//! Extraction of file URLs from an HTML directory index.

use regex::Regex;
use reqwest::Url;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid href pattern")
});

/// Normalises a URL to the canonical form used for listing membership tests.
///
/// Percent-encoding, default ports and dot segments are normalised by the URL parser,
/// query and fragment are dropped. Returns `None` for unparsable input.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.into())
}

/// Collects the absolute URLs of all files linked from a directory listing.
///
/// Anchors are resolved against `directory_url`. Parent and root links, links to
/// sub-directories, links to other hosts and links outside the directory's path are
/// skipped.
pub fn parse_listing(directory_url: &str, html: &str) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    let Ok(directory) = Url::parse(directory_url) else {
        return files;
    };
    let prefix = directory.path().to_string();

    for capture in HREF.captures_iter(html) {
        let href = &capture[1];
        if href == "../" || href == "/" || href.ends_with('/') {
            continue;
        }
        let Ok(mut link) = directory.join(href) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https")
            || link.host_str() != directory.host_str()
            || link.port_or_known_default() != directory.port_or_known_default()
            || !link.path().starts_with(&prefix)
        {
            continue;
        }
        link.set_query(None);
        link.set_fragment(None);
        files.insert(link.into());
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIR: &str = "https://www.ncei.noaa.gov/pub/data/noaa/isd-lite/2020/";

    #[test]
    fn test_extracts_relative_and_absolute_file_links() {
        let html = r#"
            <html><body>
            <a href="../">Parent Directory</a>
            <a href="010010-99999-2020.gz">010010-99999-2020.gz</a>
            <A HREF='010014-99999-2020.gz?x=1#top'>010014</A>
            <a class="f" href="https://www.ncei.noaa.gov/pub/data/noaa/isd-lite/2020/724670-03017-2020.gz">abs</a>
            </body></html>
        "#;
        let files = parse_listing(DIR, html);
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec![
                format!("{DIR}010010-99999-2020.gz"),
                format!("{DIR}010014-99999-2020.gz"),
                format!("{DIR}724670-03017-2020.gz"),
            ]
        );
    }

    #[test]
    fn test_skips_directories_other_hosts_and_other_years() {
        let html = r#"
            <a href="/">root</a>
            <a href="subdir/">subdir</a>
            <a href="https://mirror.example.org/isd-lite/2020/010010-99999-2020.gz">mirror</a>
            <a href="../2019/010010-99999-2019.gz">previous year</a>
            <a href="mailto:someone@example.org">mail</a>
        "#;
        assert!(parse_listing(DIR, html).is_empty());
    }

    #[test]
    fn test_non_html_yields_nothing() {
        assert!(parse_listing(DIR, "plain text, no anchors").is_empty());
        assert!(parse_listing("not a url", "<a href=\"x.gz\">x</a>").is_empty());
    }

    #[test]
    fn test_normalize_url_matches_listing_form() {
        let html = r#"<a href="A00001-00123-2020.gz">f</a>"#;
        let listed = parse_listing(DIR, html);
        let direct = normalize_url(&format!("{DIR}A00001-00123-2020.gz")).unwrap();
        assert!(listed.contains(&direct));
    }
}
