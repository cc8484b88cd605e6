use async_trait::async_trait;
use serde_json::{Value, json};
use spinrelay_core::{ExecutorReply, Header, RequestExecutor, forwardable_headers};
use thirtyfour::prelude::*;

/// Runs `fetch` inside the page so the browser attaches the session cookies.
/// The final argument is the WebDriver completion callback.
const PAGE_FETCH_SCRIPT: &str = r"
const [url, body, headers, done] = arguments;
const init = { method: 'POST', body, credentials: 'include', headers: {} };
for (const { name, value } of headers) init.headers[name] = value;
fetch(url, init)
  .then(async (res) => {
    const text = await res.text();
    let data;
    try { data = JSON.parse(text); } catch (_) { data = text; }
    done({ status: res.status, data });
  })
  .catch((err) => done({ error: String((err && err.message) || err) }));
";

/// Request executor backed by a WebDriver session parked on the game page.
#[derive(Debug, Clone)]
pub struct PageFetchBridge {
    driver: WebDriver,
}

impl PageFetchBridge {
    pub const fn new(driver: WebDriver) -> Self {
        Self { driver }
    }

    pub async fn ensure_page_loaded(&self) -> WebDriverResult<bool> {
        let ret = self
            .driver
            .execute("return document.readyState === 'complete'", vec![])
            .await?;
        Ok(ret.json().as_bool().unwrap_or(false))
    }

    pub async fn quit(self) -> WebDriverResult<()> {
        self.driver.quit().await
    }
}

fn script_args(url: &str, body: &str, headers: &[Header]) -> Vec<Value> {
    let headers: Vec<Value> = forwardable_headers(headers)
        .into_iter()
        .map(|h| json!({ "name": h.name, "value": h.value }))
        .collect();
    vec![url.into(), body.into(), Value::Array(headers)]
}

fn reply_from_script(value: &Value) -> ExecutorReply {
    serde_json::from_value(value.clone()).unwrap_or_else(|err| ExecutorReply::Failed {
        error: format!("unexpected page script result: {err}"),
    })
}

#[async_trait]
impl RequestExecutor for PageFetchBridge {
    async fn execute(&self, url: &str, body: &str, headers: &[Header]) -> ExecutorReply {
        match self
            .driver
            .execute_async(PAGE_FETCH_SCRIPT, script_args(url, body, headers))
            .await
        {
            Ok(ret) => reply_from_script(ret.json()),
            Err(err) => ExecutorReply::Failed {
                error: err.to_string(),
            },
        }
    }
}
