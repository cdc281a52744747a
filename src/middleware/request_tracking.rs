use crate::{counter_inc, histogram_record};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Tags each request with a correlation id, logs its outcome, records request
/// metrics and reports the handling time in `X-Process-Time`.
pub struct RequestTracking;

impl<S, B> Transform<S, ServiceRequest> for RequestTracking
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestTrackingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTrackingMiddleware { service }))
    }
}

pub struct RequestTrackingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestTrackingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let method = req.method().to_string();
        let path = req.path().to_string();

        req.extensions_mut().insert(correlation_id.clone());

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %method,
            path = %path
        );

        let fut = self.service.call(req);

        Box::pin(
            async move {
                info!("Request started");

                let result = fut.await;
                let elapsed = start_time.elapsed();
                let duration_ms = elapsed.as_secs_f64() * 1000.0;

                match result {
                    Ok(mut response) => {
                        let status = response.status().as_u16();
                        if status >= 400 {
                            warn!(status, duration_ms, "Request completed with error");
                        } else {
                            info!(status, duration_ms, "Request completed successfully");
                        }

                        if let Ok(value) = HeaderValue::from_str(&format!("{:0.4} sec", elapsed.as_secs_f64())) {
                            response
                                .headers_mut()
                                .insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
                        }

                        counter_inc!("http_requests_total", "status" => status);
                        histogram_record!("http_request_duration_ms", duration_ms);
                        Ok(response)
                    }
                    Err(error) => {
                        warn!(error = %error, duration_ms, "Request failed with error");
                        counter_inc!("http_requests_total", "status" => "error");
                        Err(error)
                    }
                }
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn responses_carry_process_time_header() {
        let app = test::init_service(
            App::new()
                .wrap(RequestTracking)
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") })),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        let header = resp.headers().get(PROCESS_TIME_HEADER).unwrap().to_str().unwrap();

        assert!(header.ends_with(" sec"));
        assert!(header.trim_end_matches(" sec").parse::<f64>().is_ok());
    }
}
