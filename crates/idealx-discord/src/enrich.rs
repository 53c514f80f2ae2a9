//! URL enrichment for reaction summaries: fetch linked pages, keep readable text.
//!
//! Every failure (timeout, network error, non-success status, non-HTML
//! content) yields no content for that URL. Nothing here is reported to the
//! user.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use idealx_agent::UrlContent;

pub const USER_AGENT: &str = "IdealX-Bot/2.0";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Characters of sanitized text kept per page.
pub const CONTENT_MAX_CHARS: usize = 2000;
/// URLs taken from one message.
pub const MAX_URLS: usize = 3;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>)]+").expect("url pattern is valid"));
static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").expect("script pattern is valid"));
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style.*?</style>").expect("style pattern is valid"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// The first [`MAX_URLS`] http(s) URLs in `text`.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL.find_iter(text)
        .take(MAX_URLS)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn strip_markup(html: &str) -> String {
    let text = SCRIPT.replace_all(html, "");
    let text = STYLE.replace_all(&text, "");
    TAG.replace_all(&text, " ").into_owned()
}

/// Reduce an HTML document to whitespace-collapsed text.
///
/// Markup is stripped again after entity decoding so escaped tags such as
/// `&lt;script&gt;` never surface as raw tags.
pub fn sanitize_html(html: &str) -> String {
    let text = strip_markup(html)
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&");
    let text = strip_markup(&text);
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(CONTENT_MAX_CHARS).collect()
}

#[derive(Clone, Default)]
pub struct UrlEnricher {
    client: reqwest::Client,
}

impl UrlEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch one page. `None` on any failure or when the page is not HTML.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        let resp = match self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "url fetch failed");
                return None;
            }
        };

        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));
        if !is_html || !resp.status().is_success() {
            debug!(url, status = resp.status().as_u16(), is_html, "url skipped");
            return None;
        }

        match resp.text().await {
            Ok(html) => Some(sanitize_html(&html)),
            Err(e) => {
                debug!(url, error = %e, "url body read failed");
                None
            }
        }
    }

    /// Fetch all `urls` concurrently, keeping the successful ones in input order.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<UrlContent> {
        let fetches = urls.iter().map(|url| async move {
            self.fetch(url).await.map(|content| UrlContent {
                url: url.clone(),
                content,
            })
        });
        futures_util::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn extraction_caps_at_three() {
        let text = "a https://one.example b http://two.example/x?y=1 \
                    <https://three.example> (https://four.example) https://five.example";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://one.example",
                "http://two.example/x?y=1",
                "https://three.example",
            ]
        );
    }

    #[test]
    fn sanitize_strips_scripts_styles_and_tags() {
        let html = "<html><head><STYLE>body { color: red }</STYLE>\
                    <script type=\"text/javascript\">alert('x')</script></head>\
                    <body><h1>Title</h1>\n\n<p>Tom &amp; Jerry &lt;3 &quot;hi&quot; it&#039;s</p></body></html>";
        assert_eq!(sanitize_html(html), "Title Tom & Jerry <3 \"hi\" it's");
    }

    #[test]
    fn escaped_tags_do_not_come_back_as_markup() {
        let html = "<p>&lt;script&gt;steal()&lt;/script&gt; &lt;b&gt;bold&lt;/b&gt; &amp;lt;kept&amp;gt;</p>";
        let text = sanitize_html(html);
        assert!(!text.contains("<script"));
        assert!(!text.contains("steal()"));
        assert!(!text.contains("<b>"));
        assert_eq!(text, "bold &lt;kept&gt;");
    }

    #[test]
    fn sanitize_truncates_to_limit() {
        let html = format!("<p>{}</p>", "字".repeat(5000));
        let text = sanitize_html(&html);
        assert_eq!(text.chars().count(), CONTENT_MAX_CHARS);
        assert!(!text.contains('<'));
    }

    #[tokio::test]
    async fn html_pages_are_fetched_and_others_dropped() {
        let server = MockServer::start_async().await;
        let page = server.mock(|when, then| {
            when.method(GET).path("/page").header("user-agent", USER_AGENT);
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<p>Hello <b>world</b></p>");
        });
        server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"a\":1}");
        });
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404)
                .header("content-type", "text/html")
                .body("<p>not found</p>");
        });

        let enricher = UrlEnricher::new();
        let urls = vec![
            server.url("/data"),
            server.url("/page"),
            server.url("/missing"),
        ];
        let contents = enricher.fetch_all(&urls).await;
        page.assert();
        assert_eq!(
            contents,
            vec![UrlContent {
                url: server.url("/page"),
                content: "Hello world".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn unreachable_host_yields_nothing() {
        let enricher = UrlEnricher::new();
        assert!(enricher.fetch("http://127.0.0.1:1/").await.is_none());
    }
}
