// crates/migration-gate-pipeline/src/stages/crawl.rs
// ============================================================================
// Module: Crawl & Page-Matching Stage
// Description: Bounded BFS discovery per site, plus the cross-site matching
// algorithm that pairs baseline and candidate pages.
// Purpose: Produce the MatchedPage list every later stage diffs against.
// Dependencies: migration-gate-core, scraper, regex, url
// ============================================================================

//! ## Overview
//! Crawl and matching are fatal on failure: without at least the seed page on
//! both sides there is nothing downstream stages can compare. The matcher
//! applies explicit `PageMap` pairs first, then exact normalized-path
//! equality, then exact trimmed/case-insensitive title equality, removing
//! matched pages from further consideration at each step so no page is
//! counted twice.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use futures::FutureExt;
use futures::future::BoxFuture;
use migration_gate_core::BrowserDriver;
use migration_gate_core::CrawlConfig;
use migration_gate_core::MatchReason;
use migration_gate_core::MatchedPage;
use migration_gate_core::PageDescriptor;
use migration_gate_core::PageMap;
use migration_gate_core::StageReport;
use migration_gate_core::Viewport;
use regex::Regex;
use scraper::Html;
use scraper::Selector;
use url::Url;

const NAVIGATION_TIMEOUT_SECS: u64 = 30;
/// Bounds sitemap-index recursion against a malicious or cyclic sitemap.
const SITEMAP_VISIT_LIMIT: usize = 20;

// ============================================================================
// SECTION: URL Normalization & Pattern Matching
// ============================================================================

/// Lowercases the host, drops fragment and query, collapses a trailing slash
/// (except for the root path), and resolves relative to `origin`.
#[must_use]
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.set_query(None);
    if let Some(host) = normalized.host_str() {
        let lowered = host.to_ascii_lowercase();
        let _ = normalized.set_host(Some(&lowered));
    }
    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    normalized
}

fn glob_matches(pattern: &str, path: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let Ok(re) = Regex::new(&format!("^{}$", escaped.join(".*"))) else {
        return false;
    };
    re.is_match(path)
}

fn path_allowed(path: &str, config: &CrawlConfig) -> bool {
    if config.exclude_patterns.iter().any(|p| glob_matches(p, path)) {
        return false;
    }
    if config.include_patterns.is_empty() {
        return true;
    }
    config.include_patterns.iter().any(|p| glob_matches(p, path))
}

fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

// ============================================================================
// SECTION: Sitemap Augmentation
// ============================================================================

/// Fetches `/sitemap.xml` and recursively follows any nested sitemap-index
/// entries, bounded by [`SITEMAP_VISIT_LIMIT`] and a visited-set to guard
/// against cycles.
async fn fetch_sitemap_urls(driver: &dyn BrowserDriver, origin: &Url, viewport: Viewport) -> Vec<Url> {
    let Ok(sitemap_url) = origin.join("/sitemap.xml") else {
        return Vec::new();
    };
    let mut visited = HashSet::new();
    let mut urls = Vec::new();
    fetch_sitemap_recursive(driver, sitemap_url, viewport, &mut visited, &mut urls).await;
    urls
}

fn fetch_sitemap_recursive<'a>(
    driver: &'a dyn BrowserDriver,
    sitemap_url: Url,
    viewport: Viewport,
    visited: &'a mut HashSet<String>,
    urls: &'a mut Vec<Url>,
) -> BoxFuture<'a, ()> {
    async move {
        if visited.len() >= SITEMAP_VISIT_LIMIT || visited.contains(sitemap_url.as_str()) {
            return;
        }
        visited.insert(sitemap_url.to_string());

        let Ok(ctx) = driver.open_context(viewport).await else {
            return;
        };
        let outcome = driver.navigate(ctx, &sitemap_url, NAVIGATION_TIMEOUT_SECS).await;
        let xml = if outcome.is_ok() {
            driver.snapshot_dom(ctx).await.ok().map(|dom| dom.html)
        } else {
            None
        };
        let _ = driver.close_context(ctx).await;

        let Some(xml) = xml else {
            return;
        };

        if is_sitemap_index(&xml) {
            for nested in extract_sitemap_locs(&xml) {
                if visited.len() >= SITEMAP_VISIT_LIMIT {
                    break;
                }
                fetch_sitemap_recursive(driver, nested, viewport, visited, urls).await;
            }
        } else {
            urls.extend(extract_sitemap_locs(&xml));
        }
    }
    .boxed()
}

fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

fn extract_sitemap_locs(xml: &str) -> Vec<Url> {
    let Ok(re) = Regex::new(r"(?s)<loc>\s*([^<]+?)\s*</loc>") else {
        return Vec::new();
    };
    re.captures_iter(xml)
        .filter_map(|caps| Url::parse(caps.get(1)?.as_str().trim()).ok())
        .collect()
}

// ============================================================================
// SECTION: Page Fetch & Link Extraction
// ============================================================================

fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

const METADATA_TAGS: [&str; 4] = ["description", "keywords", "og:title", "og:description"];

fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let Ok(selector) = Selector::parse("meta[name], meta[property]") else {
        return metadata;
    };
    for el in document.select(&selector) {
        let Some(key) = el.value().attr("name").or_else(|| el.value().attr("property")) else {
            continue;
        };
        if !METADATA_TAGS.contains(&key) {
            continue;
        }
        if let Some(content) = el.value().attr("content") {
            metadata.insert(key.to_string(), content.to_string());
        }
    }
    metadata
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .collect()
}

// ============================================================================
// SECTION: Per-Site Crawl
// ============================================================================

/// Crawls one site with a bounded BFS, seeded at `seed` plus any URLs found
/// in `sitemap.xml`.
///
/// # Errors
///
/// Returns a fatal [`StageReport`] only when the seed page itself cannot be
/// fetched; individual frontier failures are skipped and recorded in the
/// returned log lines.
pub async fn crawl_site(
    driver: &dyn BrowserDriver,
    seed: &Url,
    config: &CrawlConfig,
    viewport: Viewport,
) -> StageReport<(Vec<PageDescriptor>, Vec<String>)> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut discovered: Vec<PageDescriptor> = Vec::new();
    let mut log_lines: Vec<String> = Vec::new();

    let normalized_seed = normalize_url(seed);
    let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();
    frontier.push_back((normalized_seed.clone(), 0));

    for sitemap_url in fetch_sitemap_urls(driver, seed, viewport).await {
        if is_same_origin(&sitemap_url, seed) {
            frontier.push_back((normalize_url(&sitemap_url), 0));
        }
    }

    let mut seed_ok = false;
    while let Some((url, depth)) = frontier.pop_front() {
        let key = url.to_string();
        if visited.contains(&key) {
            continue;
        }
        if discovered.len() as u32 >= config.max_pages {
            break;
        }
        if depth > config.depth {
            continue;
        }
        if !path_allowed(url.path(), config) {
            continue;
        }
        visited.insert(key.clone());

        let Ok(ctx) = driver.open_context(viewport).await else {
            log_lines.push(format!("failed to open browser context for {url}"));
            continue;
        };
        let outcome = driver.navigate(ctx, &url, NAVIGATION_TIMEOUT_SECS).await;
        let Ok(outcome) = outcome else {
            log_lines.push(format!("navigation failed for {url}: {:?}", outcome.err()));
            let _ = driver.close_context(ctx).await;
            continue;
        };
        if outcome.status >= 400 {
            log_lines.push(format!("skipped {url}: status {}", outcome.status));
            let _ = driver.close_context(ctx).await;
            continue;
        }
        let Ok(dom) = driver.snapshot_dom(ctx).await else {
            let _ = driver.close_context(ctx).await;
            continue;
        };
        let document = Html::parse_document(&dom.html);
        let title = extract_title(&document);
        let metadata = extract_metadata(&document);
        let links = extract_links(&document, &url);
        if url == normalized_seed {
            seed_ok = true;
        }

        discovered.push(PageDescriptor {
            path: url.path().to_string(),
            url: url.to_string(),
            title,
            status: outcome.status,
            metadata,
            links: links.iter().map(ToString::to_string).collect(),
        });

        for link in &links {
            let same_origin = is_same_origin(link, seed);
            if same_origin || config.follow_external {
                let normalized = normalize_url(link);
                if !visited.contains(&normalized.to_string()) {
                    frontier.push_back((normalized, depth + 1));
                }
            }
        }
        let _ = driver.close_context(ctx).await;
    }

    if !seed_ok && discovered.is_empty() {
        return StageReport::fatal("crawl", format!("unable to fetch seed page {seed}"));
    }

    StageReport::ok((discovered, log_lines))
}

// ============================================================================
// SECTION: Page Matching
// ============================================================================

fn normalized_title(title: &str) -> String {
    title.trim().to_ascii_lowercase()
}

/// Applies the matching algorithm: explicit `PageMap` pairs first, then exact
/// normalized-path equality, then exact trimmed/case-insensitive title
/// equality. Returns the matched pairs plus a log line per unmatched page on
/// either side.
#[must_use]
pub fn match_pages(
    baseline: Vec<PageDescriptor>,
    candidate: Vec<PageDescriptor>,
    page_map: Option<&PageMap>,
) -> (Vec<MatchedPage>, Vec<String>) {
    let mut remaining_baseline = baseline;
    let mut remaining_candidate = candidate;
    let mut matched = Vec::new();

    if let Some(page_map) = page_map {
        for entry in &page_map.entries {
            let baseline_idx = remaining_baseline
                .iter()
                .position(|page| page.path == entry.baseline_path);
            let candidate_idx = remaining_candidate
                .iter()
                .position(|page| page.path == entry.candidate_path);
            if let (Some(b_idx), Some(c_idx)) = (baseline_idx, candidate_idx) {
                let b = remaining_baseline.remove(b_idx);
                let c = remaining_candidate.remove(c_idx);
                matched.push(MatchedPage::new(b, c, MatchReason::Explicit));
            }
        }
    }

    let mut still_unmatched_baseline = Vec::new();
    for baseline_page in remaining_baseline {
        if let Some(pos) = remaining_candidate
            .iter()
            .position(|c| c.path == baseline_page.path)
        {
            let candidate_page = remaining_candidate.remove(pos);
            matched.push(MatchedPage::new(baseline_page, candidate_page, MatchReason::Path));
        } else {
            still_unmatched_baseline.push(baseline_page);
        }
    }
    remaining_baseline = still_unmatched_baseline;

    let mut still_unmatched_baseline = Vec::new();
    for baseline_page in remaining_baseline {
        let wanted = normalized_title(&baseline_page.title);
        if let Some(pos) = remaining_candidate
            .iter()
            .position(|c| normalized_title(&c.title) == wanted && !wanted.is_empty())
        {
            let candidate_page = remaining_candidate.remove(pos);
            matched.push(MatchedPage::new(baseline_page, candidate_page, MatchReason::Title));
        } else {
            still_unmatched_baseline.push(baseline_page);
        }
    }

    let mut log_lines = Vec::new();
    for page in &still_unmatched_baseline {
        log_lines.push(format!("unmatched baseline page: {}", page.path));
    }
    for page in &remaining_candidate {
        log_lines.push(format!("unmatched candidate page: {}", page.path));
    }

    (matched, log_lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    fn page(path: &str, title: &str) -> PageDescriptor {
        PageDescriptor {
            path: path.into(),
            url: format!("https://example.test{path}"),
            title: title.into(),
            status: 200,
            metadata: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    #[test]
    fn extract_metadata_keeps_only_the_bounded_tag_set() {
        let html = r#"<html><head>
            <meta name="description" content="A page">
            <meta name="keywords" content="a, b">
            <meta property="og:title" content="OG Title">
            <meta name="robots" content="noindex">
        </head></html>"#;
        let document = Html::parse_document(html);
        let metadata = extract_metadata(&document);
        assert_eq!(metadata.get("description").map(String::as_str), Some("A page"));
        assert_eq!(metadata.get("og:title").map(String::as_str), Some("OG Title"));
        assert!(!metadata.contains_key("robots"));
    }

    #[test]
    fn sitemap_index_is_detected_by_root_element() {
        assert!(is_sitemap_index("<sitemapindex><sitemap><loc>https://example.test/a.xml</loc></sitemap></sitemapindex>"));
        assert!(!is_sitemap_index("<urlset><url><loc>https://example.test/</loc></url></urlset>"));
    }

    #[tokio::test]
    async fn fetch_sitemap_urls_follows_a_nested_sitemap_index() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let origin = Url::parse(&format!("http://{addr}/")).unwrap();
        let addr_for_body = addr.clone();

        let handle = std::thread::spawn(move || {
            for _ in 0..2 {
                if let Ok(Some(request)) = server.recv_timeout(std::time::Duration::from_secs(2)) {
                    let body = if request.url().ends_with("/sitemap.xml") {
                        format!(
                            "<sitemapindex><sitemap><loc>http://{addr_for_body}/nested-sitemap.xml</loc></sitemap></sitemapindex>"
                        )
                    } else {
                        format!("<urlset><url><loc>http://{addr_for_body}/page-a</loc></url></urlset>")
                    };
                    let _ = request.respond(tiny_http::Response::from_string(body));
                }
            }
        });

        let driver = migration_gate_providers::FetchBrowserDriver::new();
        let urls = fetch_sitemap_urls(&driver, &origin, Viewport::DESKTOP).await;
        handle.join().unwrap();

        assert_eq!(urls.len(), 1);
        assert!(urls[0].as_str().ends_with("/page-a"));
    }

    #[test]
    fn normalize_collapses_trailing_slash_and_lowercases_host() {
        let url = Url::parse("https://EXAMPLE.test/about/?x=1#frag").unwrap();
        let normalized = normalize_url(&url);
        assert_eq!(normalized.host_str(), Some("example.test"));
        assert_eq!(normalized.path(), "/about");
        assert!(normalized.query().is_none());
        assert!(normalized.fragment().is_none());
    }

    #[test]
    fn root_path_is_not_collapsed_to_empty() {
        let url = Url::parse("https://example.test/").unwrap();
        assert_eq!(normalize_url(&url).path(), "/");
    }

    #[test]
    fn exclude_pattern_takes_precedence_over_include() {
        let config = CrawlConfig {
            depth: 1,
            include_patterns: vec!["/blog/*".into()],
            exclude_patterns: vec!["/blog/draft*".into()],
            max_pages: 10,
            follow_external: false,
        };
        assert!(path_allowed("/blog/post", &config));
        assert!(!path_allowed("/blog/draft-1", &config));
        assert!(!path_allowed("/other", &config));
    }

    #[test]
    fn explicit_page_map_pair_is_matched_first() {
        let baseline = vec![page("/p1", "Page One")];
        let candidate = vec![page("/p1", "Page One"), page("/q1", "Different")];
        let page_map = PageMap {
            entries: vec![migration_gate_core::PageMapEntry {
                baseline_path: "/p1".into(),
                candidate_path: "/q1".into(),
                notes: None,
            }],
        };
        let (matched, unmatched) = match_pages(baseline, candidate, Some(&page_map));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].reason, MatchReason::Explicit);
        assert_eq!(matched[0].candidate.path, "/q1");
        assert_eq!(unmatched.len(), 1);
    }

    #[test]
    fn path_match_beats_title_match_when_both_possible() {
        let baseline = vec![page("/a", "Alpha")];
        let candidate = vec![page("/a", "Beta")];
        let (matched, _) = match_pages(baseline, candidate, None);
        assert_eq!(matched[0].reason, MatchReason::Path);
    }

    #[test]
    fn title_match_is_case_insensitive_and_trimmed() {
        let baseline = vec![page("/old", "  Contact Us  ")];
        let candidate = vec![page("/new", "contact us")];
        let (matched, _) = match_pages(baseline, candidate, None);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].reason, MatchReason::Title);
    }

    #[test]
    fn unmatched_pages_are_reported_on_both_sides() {
        let baseline = vec![page("/only-baseline", "Unique Baseline")];
        let candidate = vec![page("/only-candidate", "Unique Candidate")];
        let (matched, unmatched) = match_pages(baseline, candidate, None);
        assert!(matched.is_empty());
        assert_eq!(unmatched.len(), 2);
    }
}
