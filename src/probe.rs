use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Target;
use crate::error::Error;

/// Why a probe failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid response code: {0}")]
    Status(StatusCode),
    #[error("error reading response body: {0}")]
    Body(String),
}

/// Outcome of one timed check. The elapsed time is reported for failures
/// too, so the stats window sees every probe.
#[derive(Debug)]
pub struct ProbeResult {
    pub elapsed: Duration,
    pub outcome: Result<(), ProbeError>,
}

/// Performs one timed check of a target.
///
/// Implementations enforce their own deadline: a check returns within the
/// configured maximum response time, reporting `ProbeError::Timeout` rather
/// than hanging the caller's loop.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn check(&self, target: &Target) -> ProbeResult;
}

/// Production prober: a GET against the target URL with an overall request
/// deadline, optional basic auth, and a full body read. A status of 400 or
/// above is a failure even when the body was read successfully.
pub struct HttpProber {
    client: Client,
    max_response_time: Duration,
}

impl HttpProber {
    pub fn new(max_response_time: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(max_response_time).build()?;
        Ok(Self {
            client,
            max_response_time,
        })
    }

    fn classify_send(&self, err: &reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.max_response_time)
        } else {
            ProbeError::Connect(err.to_string())
        }
    }

    fn classify_body(&self, err: &reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.max_response_time)
        } else {
            ProbeError::Body(err.to_string())
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn check(&self, target: &Target) -> ProbeResult {
        let start = Instant::now();

        let mut request = self.client.get(target.url.clone());
        if let Some(user) = &target.user {
            request = request.basic_auth(user, target.password.as_deref());
        }

        let outcome = match request.send().await {
            Err(err) => Err(self.classify_send(&err)),
            Ok(response) if response.status().as_u16() >= 400 => {
                Err(ProbeError::Status(response.status()))
            }
            Ok(response) => match response.bytes().await {
                Ok(_body) => Ok(()),
                Err(err) => Err(self.classify_body(&err)),
            },
        };

        ProbeResult {
            elapsed: start.elapsed(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target_for(server: &MockServer, route: &str) -> Target {
        Target::new("test-host", &format!("{}{route}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_success_within_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let result = prober.check(&target_for(&server, "/ping")).await;

        assert!(result.outcome.is_ok());
        assert!(result.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_http_500_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let result = prober.check(&target_for(&server, "/ping")).await;

        assert!(matches!(
            result.outcome,
            Err(ProbeError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[tokio::test]
    async fn test_http_404_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let result = prober.check(&target_for(&server, "/ping")).await;

        assert!(matches!(
            result.outcome,
            Err(ProbeError::Status(StatusCode::NOT_FOUND))
        ));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let max = Duration::from_millis(100);
        let prober = HttpProber::new(max).unwrap();
        let result = prober.check(&target_for(&server, "/ping")).await;

        assert!(matches!(result.outcome, Err(ProbeError::Timeout(d)) if d == max));
        assert!(result.elapsed >= max);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Port 9 (discard) is not listening; loopback refuses immediately.
        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let target = Target::new("refused", "http://127.0.0.1:9/ping").unwrap();
        let result = prober.check(&target).await;

        assert!(matches!(result.outcome, Err(ProbeError::Connect(_))));
    }

    #[tokio::test]
    async fn test_basic_auth_header_is_sent() {
        let server = MockServer::start().await;
        // Only a request carrying the expected Authorization header matches;
        // anything else gets wiremock's 404 and fails the probe.
        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let target = target_for(&server, "/auth").with_basic_auth("user", "pass");
        let result = prober.check(&target).await;

        assert!(result.outcome.is_ok());
    }
}
