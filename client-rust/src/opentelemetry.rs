use crate::{transport::HttpResponse, ClientResult};
use opentelemetry::trace::Status;
use std::time::Instant;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Span wrapping a single API round trip.
pub struct HttpSpan {
    span: Span,
    start_time: Instant,
    status: Option<u16>,
}

impl HttpSpan {
    pub fn new(method: &str, path: &str) -> Self {
        let span = info_span!("artsclub.request", method, path);
        span.set_attribute("http.request.method", method.to_string());
        span.set_attribute("url.path", path.to_string());

        Self {
            span,
            start_time: Instant::now(),
            status: None,
        }
    }

    pub async fn instrument_future<F>(&self, future: F) -> F::Output
    where
        F: std::future::Future,
    {
        future.instrument(self.span.clone()).await
    }

    pub fn on_response(&mut self, response: &HttpResponse) {
        self.status = Some(response.status);
        self.span.set_attribute(
            "http.response.status_code",
            i64::from(response.status),
        );
        if !response.is_success() {
            self.span
                .set_status(Status::error(format!("HTTP {}", response.status)));
        }
    }

    pub fn on_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }

    fn on_end(&mut self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        self.span
            .set_attribute("artsclub.request.duration", elapsed);
        self.span.in_scope(|| {
            tracing::debug!(status = ?self.status, elapsed, "request finished");
        });
    }
}

impl Drop for HttpSpan {
    fn drop(&mut self) {
        self.on_end();
    }
}

pub async fn trace_request<F, Fut>(method: &str, path: &str, f: F) -> ClientResult<HttpResponse>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ClientResult<HttpResponse>>,
{
    let mut span = HttpSpan::new(method, path);
    let result = span.instrument_future(f()).await;

    match &result {
        Ok(response) => span.on_response(response),
        Err(error) => span.on_error(error),
    }

    result
}
