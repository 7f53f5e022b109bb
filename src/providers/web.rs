//! 基于 HTTP 的提供方：SearxNG 兼容的 JSON 搜索接口与网页正文阅读
//!
//! HttpReader：可选域名白名单；GET 请求带 User-Agent；HTML 响应用 html2text 提取可读文本，
//! 超过 max_result_chars 时截断并追加 ...[truncated]。
//! 付费墙类状态码与非文本内容视为 ContentUnreadable，其余失败视为 Unavailable。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::core::ProviderError;
use crate::providers::{ContentReader, ReadContent, Reference, SearchOptions, SearchProvider};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

fn build_client(timeout: Duration) -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en;q=0.9,zh-CN;q=0.8"));
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .unwrap_or_default()
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Unavailable(format!("Request failed: {}", e))
    }
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// SearxNG 兼容的搜索提供方：GET {endpoint}/search?q=..&format=json
pub struct SearxSearchProvider {
    client: Client,
    endpoint: String,
}

impl SearxSearchProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

/// 按 score 降序并截到 breadth
fn into_references(response: SearxResponse, breadth: usize) -> Vec<Reference> {
    let mut refs: Vec<Reference> = response
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| Reference::new(r.url, r.title, r.content, r.score))
        .collect();
    refs.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    refs.truncate(breadth);
    refs
}

#[async_trait]
impl SearchProvider for SearxSearchProvider {
    fn name(&self) -> &str {
        "searx"
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Reference>, ProviderError> {
        let page = (options.page + 1).to_string();
        let safe = if options.safe_search { "1" } else { "0" };
        let resp = self
            .client
            .get(format!("{}/search", self.endpoint))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("pageno", page.as_str()),
                ("safesearch", safe),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", resp.status())));
        }
        let body: SearxResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Bad search response: {}", e)))?;
        Ok(into_references(body, options.breadth))
    }
}

/// 网页正文阅读提供方
pub struct HttpReader {
    client: Client,
    /// 为空表示不限制域名
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl HttpReader {
    pub fn new(allowed_domains: Vec<String>, timeout: Duration, max_result_chars: usize) -> Self {
        Self {
            client: build_client(timeout),
            allowed_domains: allowed_domains.into_iter().map(|s| s.to_lowercase()).collect(),
            max_result_chars,
        }
    }

    fn is_allowed(&self, url: &str) -> Result<(), ProviderError> {
        let domain = extract_domain(url)
            .ok_or_else(|| ProviderError::ContentUnreadable(format!("Invalid or missing URL: {url}")))?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            return Ok(());
        }
        Err(ProviderError::ContentUnreadable(format!("Domain not in allowlist: {}", domain)))
    }

    fn truncate(&self, body: String) -> String {
        if body.chars().count() > self.max_result_chars {
            body.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]"
        } else {
            body
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        self.is_allowed(url)?;
        let resp = self.client.get(url).send().await.map_err(transport_error)?;
        let status = resp.status();
        if is_paywall_status(status) {
            return Err(ProviderError::ContentUnreadable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !is_textual(&content_type) {
            return Err(ProviderError::ContentUnreadable(format!(
                "Unsupported content type: {}",
                content_type
            )));
        }
        let mut body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Read body: {}", e)))?;

        if let Some(stripped) = body.strip_prefix('\u{FEFF}') {
            body = stripped.to_string();
        }
        let body = if content_type.contains("html") || looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        };
        if body.trim().is_empty() {
            return Err(ProviderError::ContentUnreadable("Empty body".to_string()));
        }
        Ok(self.truncate(body))
    }
}

#[async_trait]
impl ContentReader for HttpReader {
    fn name(&self) -> &str {
        "http_reader"
    }

    async fn read(&self, reference: &Reference) -> Result<ReadContent, ProviderError> {
        tracing::info!(url = %reference.url, "reading page");
        let text = self.fetch(&reference.url).await?;
        Ok(ReadContent::new(reference.url.clone(), text))
    }
}

fn is_paywall_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 402 | 403 | 451)
}

/// 缺失 content-type 时按文本处理
fn is_textual(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
        || content_type.contains("json")
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!") || s.starts_with("<html") || s.starts_with("<HTML")
        || (s.len() > 20 && s.contains('<') && (s.contains("</") || s.contains("<head") || s.contains("<title")))
}

fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

/// 从 URL 中提取 host（去掉协议、端口与路径）
fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://Docs.rs/tokio"), Some("docs.rs".to_string()));
        assert_eq!(extract_domain("http://localhost:8080/x"), Some("localhost".to_string()));
        assert_eq!(extract_domain("ftp://example.com"), None);
        assert_eq!(extract_domain("https://"), None);
    }

    #[test]
    fn test_allowlist() {
        let open = HttpReader::new(vec![], Duration::from_secs(1), 100);
        assert!(open.is_allowed("https://anything.example").is_ok());

        let closed = HttpReader::new(vec!["en.wikipedia.org".into()], Duration::from_secs(1), 100);
        assert!(closed.is_allowed("https://en.wikipedia.org/wiki/Rust").is_ok());
        assert!(matches!(
            closed.is_allowed("https://evil.example/"),
            Err(ProviderError::ContentUnreadable(_))
        ));
    }

    #[test]
    fn test_truncate_marks_output() {
        let reader = HttpReader::new(vec![], Duration::from_secs(1), 5);
        assert_eq!(reader.truncate("abcdefgh".into()), "abcde\n...[truncated]");
        assert_eq!(reader.truncate("abc".into()), "abc");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<p>Hello</p><p>world</p>"), "Hello world");
    }

    #[test]
    fn test_content_classification() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual(""));
        assert!(!is_textual("application/pdf"));
        assert!(is_paywall_status(StatusCode::PAYMENT_REQUIRED));
        assert!(!is_paywall_status(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_searx_results_ordered_by_score() {
        let body: SearxResponse = serde_json::from_str(
            r#"{"results": [
                {"url": "https://a", "title": "A", "content": "a", "score": 0.2},
                {"url": "https://b", "title": "B", "content": "b", "score": 1.4},
                {"url": "", "title": "empty"},
                {"url": "https://c", "title": "C"}
            ]}"#,
        )
        .unwrap();
        let refs = into_references(body, 2);
        let urls: Vec<_> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
    }
}
