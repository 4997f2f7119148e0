//! Smoke checks against a running crawlgate server.
//!
//! Every check talks to the real endpoints over HTTP, so results depend on
//! the server's configuration and on the public sites it crawls.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const SAMPLE_URL: &str = "https://example.com";
const SECOND_URL: &str = "https://www.iana.org";
const BURST_URLS: &[&str] = &[
    "https://example.com",
    "https://www.iana.org",
    "https://www.w3.org",
    "https://httpbin.org/html",
    "https://httpstat.us/200",
];
const UNRESOLVABLE_URL: &str = "https://this-domain-definitely-does-not-exist-12345.com";

const SHORT_TIMEOUT: Duration = Duration::from_secs(10);
const CRAWL_TIMEOUT: Duration = Duration::from_secs(60);
const BURST_TIMEOUT: Duration = Duration::from_secs(90);

/// Result of one named check.
#[derive(Debug)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

pub struct Checker {
    client: Client,
    base_url: String,
}

struct Reply {
    status: StatusCode,
    body: Value,
}

impl Checker {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run every check in order, printing each result as it lands.
    pub async fn run_all(&self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();

        outcomes.push(self.report("health", self.check_health().await));
        outcomes.push(self.report("crawl example.com", self.check_crawl(SAMPLE_URL).await));
        outcomes.push(self.report("crawl iana.org", self.check_crawl(SECOND_URL).await));
        outcomes.push(self.report("invalid URL rejected", self.check_invalid_url().await));
        outcomes.push(self.report(
            "concurrent requests",
            self.check_concurrent(&[SAMPLE_URL, SECOND_URL]).await,
        ));
        outcomes.push(self.report("include_raw_markdown", self.check_raw_markdown().await));
        outcomes.push(self.report("custom filter_threshold", self.check_custom_threshold().await));
        outcomes.push(self.report("concurrency limiting", self.check_burst().await));
        outcomes.push(self.report("queue timeout", self.check_queue_timeout().await));
        outcomes.push(self.report("slot release after error", self.check_slot_release().await));

        outcomes
    }

    fn report(&self, name: &'static str, result: Result<String>) -> CheckOutcome {
        let outcome = match result {
            Ok(detail) => CheckOutcome {
                name,
                passed: true,
                detail,
            },
            Err(e) => CheckOutcome {
                name,
                passed: false,
                detail: format!("{e:#}"),
            },
        };
        let mark = if outcome.passed { "✓" } else { "✗" };
        println!("  {mark} {}: {}", outcome.name, outcome.detail);
        outcome
    }

    async fn check_health(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(SHORT_TIMEOUT)
            .send()
            .await
            .context("GET /health failed")?;
        let reply = Reply::read(response).await?;

        if reply.status != StatusCode::OK || reply.body["status"] != "ok" {
            bail!("unexpected health reply {}: {}", reply.status, reply.body);
        }
        Ok(format!(
            "ok ({} of {} slots free)",
            reply.body["available_slots"], reply.body["capacity"]
        ))
    }

    async fn check_crawl(&self, url: &str) -> Result<String> {
        let reply = self.post_crawl(json!({ "url": url }), CRAWL_TIMEOUT).await?;
        let markdown = expect_success(&reply)?;
        Ok(format!("{} chars of filtered Markdown", markdown.len()))
    }

    async fn check_invalid_url(&self) -> Result<String> {
        let reply = self
            .post_crawl(json!({ "url": "not-a-valid-url" }), SHORT_TIMEOUT)
            .await?;
        match reply.status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(format!("rejected with {}", reply.status))
            }
            other => bail!("expected 400 or 422, got {other}"),
        }
    }

    async fn check_concurrent(&self, urls: &[&str]) -> Result<String> {
        let replies = self.burst(urls, CRAWL_TIMEOUT).await;
        let ok = count_status(&replies, &[StatusCode::OK]);
        if ok != urls.len() {
            bail!("only {ok}/{} requests succeeded", urls.len());
        }
        Ok(format!("{ok}/{} succeeded", urls.len()))
    }

    async fn check_raw_markdown(&self) -> Result<String> {
        let reply = self
            .post_crawl(
                json!({ "url": SAMPLE_URL, "include_raw_markdown": true }),
                CRAWL_TIMEOUT,
            )
            .await?;
        let markdown = expect_success(&reply)?;
        let Some(raw) = reply.body["raw_markdown"].as_str() else {
            bail!("raw_markdown missing from reply");
        };
        Ok(format!(
            "filtered {} chars, raw {} chars",
            markdown.len(),
            raw.len()
        ))
    }

    async fn check_custom_threshold(&self) -> Result<String> {
        let reply = self
            .post_crawl(
                json!({ "url": SAMPLE_URL, "filter_threshold": 0.1, "min_word_threshold": 1 }),
                CRAWL_TIMEOUT,
            )
            .await?;
        let markdown = expect_success(&reply)?;
        Ok(format!("{} chars with a low threshold", markdown.len()))
    }

    /// More requests than a default gate has slots. Every one must come back
    /// as either a success or an explicit "busy".
    async fn check_burst(&self) -> Result<String> {
        let started = Instant::now();
        let replies = self.burst(BURST_URLS, BURST_TIMEOUT).await;
        let handled = count_status(&replies, &[StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE]);
        let completed = count_status(&replies, &[StatusCode::OK]);

        if handled != BURST_URLS.len() {
            bail!("only {handled}/{} requests were handled", BURST_URLS.len());
        }
        Ok(format!(
            "{completed}/{} completed in {:.1}s",
            BURST_URLS.len(),
            started.elapsed().as_secs_f64()
        ))
    }

    /// Only shows a 503 when the server runs with one slot and a short queue
    /// timeout. Passes either way.
    async fn check_queue_timeout(&self) -> Result<String> {
        let replies = self.burst(&BURST_URLS[..3], Duration::from_secs(20)).await;
        let busy = count_status(&replies, &[StatusCode::SERVICE_UNAVAILABLE]);
        let ok = count_status(&replies, &[StatusCode::OK]);
        if busy > 0 {
            Ok(format!("{ok} completed, {busy} turned away with 503"))
        } else {
            Ok(format!(
                "{ok} completed, no 503 observed (lower CRAWLGATE_QUEUE_TIMEOUT to exercise it)"
            ))
        }
    }

    async fn check_slot_release(&self) -> Result<String> {
        let failed = self
            .post_crawl(json!({ "url": UNRESOLVABLE_URL }), Duration::from_secs(20))
            .await?;
        let reply = self.post_crawl(json!({ "url": SAMPLE_URL }), CRAWL_TIMEOUT).await?;
        if reply.status != StatusCode::OK {
            bail!(
                "request after a failure got {} (first request got {})",
                reply.status,
                failed.status
            );
        }
        Ok(format!(
            "failing URL got {}, next request got {}",
            failed.status, reply.status
        ))
    }

    async fn post_crawl(&self, body: Value, timeout: Duration) -> Result<Reply> {
        let response = self
            .client
            .post(format!("{}/crawl", self.base_url))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .context("POST /crawl failed")?;
        Reply::read(response).await
    }

    async fn burst(&self, urls: &[&str], timeout: Duration) -> Vec<Result<Reply>> {
        join_all(
            urls.iter()
                .map(|url| self.post_crawl(json!({ "url": url }), timeout)),
        )
        .await
    }
}

impl Reply {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .with_context(|| format!("reply with status {status} was not JSON"))?;
        Ok(Self { status, body })
    }
}

fn expect_success(reply: &Reply) -> Result<&str> {
    if reply.status != StatusCode::OK || reply.body["success"] != true {
        bail!(
            "status {}: {}",
            reply.status,
            reply.body["error"].as_str().unwrap_or("no error message")
        );
    }
    reply.body["markdown"]
        .as_str()
        .context("markdown missing from reply")
}

fn count_status(replies: &[Result<Reply>], accepted: &[StatusCode]) -> usize {
    replies
        .iter()
        .filter(|r| matches!(r, Ok(reply) if accepted.contains(&reply.status)))
        .count()
}
