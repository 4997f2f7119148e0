use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "crawlgate",
        version = "0.1.0",
        description = "Crawl web pages into LLM-ready Markdown behind a bounded-concurrency gate."
    ),
    paths(crate::routes::crawl, crate::routes::health),
    components(schemas(
        crate::dto::CrawlRequest,
        crate::dto::CrawlResponse,
        crate::dto::CrawlErrorResponse,
        crate::dto::HealthResponse,
    )),
    tags(
        (name = "crawl", description = "Page crawling"),
        (name = "system", description = "Health and gate status"),
    )
)]
pub struct ApiDoc;
