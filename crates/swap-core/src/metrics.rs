use axum::extract::MatchedPath;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

struct Metrics {
    registry: Registry,
    swap_up: IntGaugeVec,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    auth_success_total: IntCounterVec,
    auth_failure_total: IntCounterVec,
    listings_written_total: IntCounterVec,
    messages_sent_total: IntCounterVec,
    image_uploads_total: IntCounterVec,
}

pub const UPLOAD_RESULT_SUCCESS: &str = "success";
pub const UPLOAD_RESULT_ERROR: &str = "error";

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let swap_up = IntGaugeVec::new(Opts::new("swap_up", "Service health"), &["service"])
            .expect("swap_up metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP request count"),
            &["service", "route", "method", "status"],
        )
        .expect("http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["service", "route", "method", "status"],
        )
        .expect("http_request_duration_seconds metric");

        let auth_success_total = IntCounterVec::new(
            Opts::new("auth_success_total", "Successful logins"),
            &["service"],
        )
        .expect("auth_success_total metric");

        let auth_failure_total = IntCounterVec::new(
            Opts::new("auth_failure_total", "Failed logins and rejected tokens"),
            &["service"],
        )
        .expect("auth_failure_total metric");

        let listings_written_total = IntCounterVec::new(
            Opts::new("listings_written_total", "Listing writes by operation"),
            &["service", "operation"],
        )
        .expect("listings_written_total metric");

        let messages_sent_total = IntCounterVec::new(
            Opts::new("messages_sent_total", "Messages stored in conversations"),
            &["service"],
        )
        .expect("messages_sent_total metric");

        let image_uploads_total = IntCounterVec::new(
            Opts::new("image_uploads_total", "Image host uploads by result"),
            &["service", "result"],
        )
        .expect("image_uploads_total metric");

        for collector in [
            Box::new(swap_up.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(http_requests_total.clone()),
            Box::new(http_request_duration_seconds.clone()),
            Box::new(auth_success_total.clone()),
            Box::new(auth_failure_total.clone()),
            Box::new(listings_written_total.clone()),
            Box::new(messages_sent_total.clone()),
            Box::new(image_uploads_total.clone()),
        ] {
            registry.register(collector).expect("register metric");
        }

        Metrics {
            registry,
            swap_up,
            http_requests_total,
            http_request_duration_seconds,
            auth_success_total,
            auth_failure_total,
            listings_written_total,
            messages_sent_total,
            image_uploads_total,
        }
    })
}

pub fn init(service_name: &'static str) {
    metrics().swap_up.with_label_values(&[service_name]).set(1);
}

pub fn record_http_request(
    service_name: &'static str,
    method: &str,
    route: &str,
    status: u16,
    duration: Duration,
) {
    let status_str = status.to_string();
    let labels = &[service_name, route, method, status_str.as_str()];
    let metrics = metrics();
    metrics.http_requests_total.with_label_values(labels).inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(labels)
        .observe(duration.as_secs_f64());
}

pub fn inc_auth_success(service_name: &'static str) {
    metrics()
        .auth_success_total
        .with_label_values(&[service_name])
        .inc();
}

pub fn inc_auth_failure(service_name: &'static str) {
    metrics()
        .auth_failure_total
        .with_label_values(&[service_name])
        .inc();
}

pub fn inc_listing_written(service_name: &'static str, operation: &'static str) {
    metrics()
        .listings_written_total
        .with_label_values(&[service_name, operation])
        .inc();
}

pub fn inc_message_sent(service_name: &'static str) {
    metrics()
        .messages_sent_total
        .with_label_values(&[service_name])
        .inc();
}

pub fn inc_image_upload(service_name: &'static str, result: &'static str) {
    metrics()
        .image_uploads_total
        .with_label_values(&[service_name, result])
        .inc();
}

pub fn metrics_response(service_name: &'static str) -> impl IntoResponse {
    init(service_name);
    let metrics = metrics();
    let metric_families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            "failed to encode metrics".to_string(),
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    (
        StatusCode::OK,
        headers,
        String::from_utf8_lossy(&buffer).to_string(),
    )
}

#[derive(Clone)]
pub struct MetricsLayer {
    service_name: &'static str,
}

impl MetricsLayer {
    pub fn new(service_name: &'static str) -> Self {
        Self { service_name }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    service_name: &'static str,
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            service_name: self.service_name,
        }
    }
}

impl<S, ReqBody, ResBody> Service<axum::http::Request<ReqBody>> for MetricsService<S>
where
    S: Service<axum::http::Request<ReqBody>, Response = axum::response::Response<ResBody>>
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = axum::response::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: axum::http::Request<ReqBody>) -> Self::Future {
        let service_name = self.service_name;
        let method = request.method().to_string();
        // Route templates keep label cardinality bounded (`/api/posts/:id`).
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());
        let start = Instant::now();
        let fut = self.inner.call(request);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    record_http_request(
                        service_name,
                        &method,
                        &route,
                        response.status().as_u16(),
                        start.elapsed(),
                    );
                    Ok(response)
                }
                Err(err) => {
                    record_http_request(service_name, &method, &route, 500, start.elapsed());
                    Err(err)
                }
            }
        })
    }
}
