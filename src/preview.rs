//! Open Graph link previews.
//!
//! Pages are fetched with a desktop browser User-Agent and scanned with
//! regular expressions for the usual `og:*`, `twitter:*` and `<title>` tags.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::feed;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub og_title: String,
    pub og_description: String,
    pub og_image: Option<ImageRef>,
    pub og_video: Option<String>,
    /// Playable link: `og:video`, else the page itself when it is a video.
    pub video: Option<String>,
}

fn meta_pattern(attr: &str, name: &str) -> Regex {
    let pattern = format!(
        r#"(?i)<meta\s+{attr}="{}"\s+content="([^"]+)""#,
        regex::escape(name)
    );
    Regex::new(&pattern).expect("valid meta pattern")
}

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| meta_pattern("property", "og:title"));
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>([^<]+)</title>").expect("valid title pattern"));
static OG_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| meta_pattern("property", "og:description"));
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| meta_pattern("name", "description"));
static OG_IMAGE: LazyLock<Regex> = LazyLock::new(|| meta_pattern("property", "og:image"));
static TWITTER_IMAGE: LazyLock<Regex> = LazyLock::new(|| meta_pattern("name", "twitter:image"));
static OG_VIDEO: LazyLock<Regex> = LazyLock::new(|| meta_pattern("property", "og:video"));
static OG_VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| meta_pattern("property", "og:video:url"));

fn first_match(html: &str, patterns: &[&Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(html).map(|c| decode_entities(c[1].trim())))
        .filter(|s| !s.is_empty())
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Resolve `link` against the page it appeared on.
fn absolutize(page_url: &str, link: &str) -> String {
    if link.starts_with("http") {
        return link.to_string();
    }
    match url::Url::parse(page_url).and_then(|base| base.join(link)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Extract preview fields from a fetched page.
pub fn parse_preview(page_url: &str, html: &str) -> Preview {
    let og_video = first_match(html, &[&*OG_VIDEO_URL, &*OG_VIDEO]).map(|v| absolutize(page_url, &v));
    let video = og_video
        .clone()
        .or_else(|| feed::is_video_link(page_url).then(|| page_url.to_string()));
    Preview {
        og_title: first_match(html, &[&*OG_TITLE, &*TITLE_TAG]).unwrap_or_default(),
        og_description: first_match(html, &[&*OG_DESCRIPTION, &*DESCRIPTION]).unwrap_or_default(),
        og_image: first_match(html, &[&*OG_IMAGE, &*TWITTER_IMAGE]).map(|img| ImageRef {
            url: absolutize(page_url, &img),
        }),
        og_video,
        video,
    }
}

/// Fetch and parse a page.  Blocking; call from `spawn_blocking`.
pub fn fetch_preview(page_url: &str) -> Result<Preview, String> {
    let agent = ureq::AgentBuilder::new()
        .timeout(FETCH_TIMEOUT)
        .user_agent(BROWSER_USER_AGENT)
        .build();
    let html = match agent.get(page_url).call() {
        Ok(resp) => resp
            .into_string()
            .map_err(|e| format!("failed to read {page_url}: {e}"))?,
        Err(ureq::Error::Status(code, _)) => {
            return Err(format!("Failed to fetch URL (status {code})"))
        }
        Err(e) => return Err(format!("Failed to fetch URL: {e}")),
    };
    Ok(parse_preview(page_url, &html))
}

/// Bounded per-URL cache; the oldest entry is evicted first.
#[derive(Debug)]
pub struct PreviewCache {
    capacity: usize,
    entries: HashMap<String, Preview>,
    order: VecDeque<String>,
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl PreviewCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, url: &str) -> Option<&Preview> {
        self.entries.get(url)
    }

    pub fn insert(&mut self, url: String, preview: Preview) {
        if self.entries.insert(url.clone(), preview).is_none() {
            self.order.push_back(url);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>Fallback title</title>
        <meta property="og:title" content="Rust &amp; Friends" />
        <meta name="description" content="A page about things" />
        <meta property="og:image" content="/img/cover.png" />
        </head></html>"#;

    #[test]
    fn og_tags_win_over_fallbacks() {
        let p = parse_preview("https://site.test/articles/1", PAGE);
        assert_eq!(p.og_title, "Rust & Friends");
        assert_eq!(p.og_description, "A page about things");
        assert_eq!(
            p.og_image,
            Some(ImageRef {
                url: "https://site.test/img/cover.png".into()
            })
        );
        assert_eq!(p.video, None);
    }

    #[test]
    fn falls_back_to_title_and_twitter_image() {
        let html = r#"<title>Just a title</title>
            <meta name="twitter:image" content="https://cdn.test/t.jpg">"#;
        let p = parse_preview("https://site.test/", html);
        assert_eq!(p.og_title, "Just a title");
        assert_eq!(p.og_description, "");
        assert_eq!(p.og_image.unwrap().url, "https://cdn.test/t.jpg");
    }

    #[test]
    fn empty_page_yields_empty_preview() {
        let p = parse_preview("https://site.test/", "<html></html>");
        assert_eq!(p, Preview::default());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["ogImage"], serde_json::Value::Null);
        assert_eq!(json["ogTitle"], "");
    }

    #[test]
    fn video_comes_from_og_video_or_the_link_itself() {
        let html = r#"<meta property="og:video:url" content="https://cdn.test/v.mp4">"#;
        let p = parse_preview("https://site.test/watch", html);
        assert_eq!(p.og_video.as_deref(), Some("https://cdn.test/v.mp4"));
        assert_eq!(p.video.as_deref(), Some("https://cdn.test/v.mp4"));

        let p = parse_preview("https://youtu.be/dQw4w9WgXcQ", "");
        assert_eq!(p.og_video, None);
        assert_eq!(p.video.as_deref(), Some("https://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn cache_evicts_oldest() {
        let mut cache = PreviewCache::new(2);
        cache.insert("a".into(), Preview::default());
        cache.insert("b".into(), Preview::default());
        cache.insert("a".into(), Preview::default());
        cache.insert("c".into(), Preview::default());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some() && cache.get("c").is_some());
    }
}
