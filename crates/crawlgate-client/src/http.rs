use std::net::IpAddr;
use std::time::Duration;

use crawlgate_core::{AppError, CrawlOptions, CrawlOutput, Crawler};
use reqwest::Client;
use url::Url;

use crate::cleaner::HtmdCleaner;

const USER_AGENT: &str = "crawlgate/0.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Plain HTTP crawler: downloads the page with reqwest, no JavaScript.
///
/// SSRF protection is **enabled** by default. Requests to private/reserved
/// IP ranges are blocked. Use [`allow_private_urls`](Self::allow_private_urls)
/// to turn it off when the caller controls the machine.
///
/// Only connecting is time-limited here. How long a whole crawl may take is
/// decided by the controller's execution deadline, which drops the request.
#[derive(Clone)]
pub struct HttpCrawler {
    client: Client,
    cleaner: HtmdCleaner,
    ssrf_protection: bool,
}

impl HttpCrawler {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            cleaner: HtmdCleaner::new(),
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::CrawlFailed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

impl Crawler for HttpCrawler {
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<CrawlOutput, AppError> {
        let html = self.fetch(url).await?;
        tracing::debug!(url, html_len = html.len(), "Fetched page");
        self.cleaner.render(&html, options)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate a URL to prevent server-side request forgery (SSRF).
///
/// 1. Only allow `http` and `https` schemes.
/// 2. Resolve the hostname via DNS.
/// 3. Reject if any resolved IP is private/reserved.
async fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InvalidUrl("URL has no host".to_string()))?;
    // IPv6 literals come back bracketed.
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::CrawlFailed(format!(
                "SSRF blocked: {host} resolves to private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    if let Some(blocked) = addrs.iter().find(|a| is_private_ip(a.ip())) {
        return Err(AppError::CrawlFailed(format!(
            "SSRF blocked: {host} resolves to private/reserved IP {}",
            blocked.ip()
        )));
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // 169.254.0.0/16, cloud metadata
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // 100.64.0.0/10 (CGN)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFFC0) == 0xFE80 // fe80::/10
                || (v6.segments()[0] & 0xFE00) == 0xFC00 // fc00::/7
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ipv4() {
        for ip in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "100.64.0.1",
        ] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
    }

    #[test]
    fn test_public_ipv4() {
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip("1.1.1.1".parse().unwrap()));
        assert!(!is_private_ip("100.128.0.1".parse().unwrap()));
    }

    #[test]
    fn test_private_ipv6() {
        assert!(is_private_ip("::1".parse().unwrap()));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
        assert!(is_private_ip("fd00::1".parse().unwrap()));
        assert!(is_private_ip("::ffff:169.254.169.254".parse().unwrap()));
        assert!(!is_private_ip("2001:4860:4860::8888".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_private_ip() {
        let err = validate_url("http://127.0.0.1/admin").await.unwrap_err();
        assert!(err.to_string().contains("SSRF blocked"));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_ipv6_loopback() {
        let err = validate_url("http://[::1]:8080/").await.unwrap_err();
        assert!(err.to_string().contains("SSRF blocked"));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_bad_scheme() {
        let err = validate_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_validate_url_rejects_garbage() {
        let err = validate_url("not a url").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
    }

    /// Serves one page after `delay`, on a loopback port.
    async fn slow_server(delay: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let body = "<html><body><p>Slow but complete page body with enough words to keep.</p></body></html>";
                    let reply = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_slow_page_is_cut_by_execution_deadline() {
        use crawlgate_core::{GatewayConfig, JobController};

        let url = slow_server(Duration::from_secs(3)).await;
        let crawler = HttpCrawler::new().unwrap().allow_private_urls();
        let controller = JobController::new(
            crawler,
            GatewayConfig::new(1, Duration::from_secs(1), Duration::from_millis(300)),
        );

        let err = controller
            .submit(&url, CrawlOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExecutionTimeout(_)), "{err}");
    }

    #[tokio::test]
    async fn test_slow_page_within_budget_completes() {
        let url = slow_server(Duration::from_millis(500)).await;
        let crawler = HttpCrawler::new().unwrap().allow_private_urls();

        let output = crawler
            .crawl(&url, &CrawlOptions::default().with_filter_threshold(0.0))
            .await
            .unwrap();

        assert!(output.markdown.contains("Slow but complete"));
    }

    #[tokio::test]
    async fn test_crawl_blocks_private_target() {
        let crawler = HttpCrawler::new().unwrap();
        let err = crawler
            .crawl("http://192.168.0.1/", &CrawlOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SSRF blocked"));
    }
}
