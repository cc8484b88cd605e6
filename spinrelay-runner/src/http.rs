use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use spinrelay_core::{ExecutorReply, Header, RequestExecutor, forwardable_headers, parse_body_text};

/// Sends captured requests straight from this process.
///
/// Credentials travel in the captured `Cookie` header, so the capture must
/// have been taken with its headers intact.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn header_map(headers: &[Header]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for header in forwardable_headers(headers) {
        let name = HeaderName::from_bytes(header.name.as_bytes());
        let value = HeaderValue::from_str(&header.value);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => log::debug!("dropping unsendable header {}", header.name),
        }
    }
    map
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, url: &str, body: &str, headers: &[Header]) -> ExecutorReply {
        let response = self
            .client
            .post(url)
            .headers(header_map(headers))
            .body(body.to_string())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                return ExecutorReply::Failed {
                    error: err.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => ExecutorReply::Completed {
                status,
                data: parse_body_text(&text),
            },
            Err(err) => ExecutorReply::Failed {
                error: err.to_string(),
            },
        }
    }
}
