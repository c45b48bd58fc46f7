//! Execution of a single step: request, cache, parse, extract, transform.

use futures::FutureExt;
use pulse_host_http::{HttpError, HttpRequest, decode_body};
use pulse_resolver::{Context, apply_transforms, extract, resolve, unwrap_jsonp};
use pulse_template::{ResponseFormat, Step};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{FetchResult, ResponseCache};
use crate::engine::Engine;
use crate::error::EngineError;

impl Engine {
  /// Run one step against `ctx` and return the updated context.
  ///
  /// `prefix` is `<instanceId><targetSuffix>`, the cache namespace of the
  /// target. A step whose `skip_if_set` variable already holds a non-empty
  /// value returns the context untouched.
  pub(crate) async fn run_step(
    &self,
    prefix: &str,
    step: &Step,
    mut ctx: Context,
    cancel: &CancellationToken,
  ) -> Result<Context, EngineError> {
    if let Some(var) = &step.skip_if_set
      && ctx.get(var).is_some_and(|v| !v.is_empty())
    {
      debug!(step = %step.id, var = %var, "variable already set, skipping step");
      return Ok(ctx);
    }

    let text = self.fetch_text(prefix, step, &ctx, cancel).await?;
    apply_response(step, &text, &mut ctx)?;
    Ok(ctx)
  }

  /// Resolve the step's request and return the decoded response text, from
  /// the cache when fresh, otherwise through a coalesced fetch.
  pub(crate) async fn fetch_text(
    &self,
    prefix: &str,
    step: &Step,
    ctx: &Context,
    cancel: &CancellationToken,
  ) -> Result<String, EngineError> {
    let request = HttpRequest {
      method: resolve(&step.method, ctx),
      url: resolve(&step.url, ctx),
      headers: step
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), resolve(v, ctx)))
        .collect(),
      body: resolve(&step.body, ctx),
    };

    let key = ResponseCache::key(prefix, &step.id, &request.url, &request.body);
    if let Some(text) = self.cache().get_fresh(&key, step.cache_minutes) {
      debug!(step = %step.id, key = %key, "cache hit");
      return Ok(text);
    }

    let fetch = self.detached_fetch(request, step.response_encoding.clone());
    match self.cache().fetch(&key, step.cache_minutes, cancel, fetch).await {
      Some(Ok(text)) => Ok(text),
      Some(Err(HttpError::Cancelled)) | None => Err(EngineError::Cancelled),
      Some(Err(source)) => Err(EngineError::Fetch {
        step_id: step.id.clone(),
        source,
      }),
    }
  }

  // The fetch is bound to the engine's shutdown token, never to the caller's:
  // it keeps running after the caller gives up so the cache stays warm.
  fn detached_fetch(
    &self,
    request: HttpRequest,
    encoding: String,
  ) -> futures::future::BoxFuture<'static, FetchResult> {
    let http = self.http().clone();
    let token = self.shutdown_token().child_token();
    let timeout = self.config().request_timeout;

    async move {
      let url = request.url.clone();
      let response = tokio::time::timeout(timeout, http.send(request, token))
        .await
        .map_err(|_| HttpError::Transport {
          url: url.clone(),
          message: format!("timed out after {:?}", timeout),
        })??;

      if !response.is_success() {
        return Err(HttpError::Status {
          url,
          status: response.status,
        });
      }

      Ok(decode_body(&response.body, &encoding))
    }
    .boxed()
  }
}

/// Parse `text` in the step's format, extract fields into `ctx` and run the
/// step's transforms.
///
/// Extraction paths are patterns too (`"{{coin}}.usd"`).
pub(crate) fn apply_response(
  step: &Step,
  text: &str,
  ctx: &mut Context,
) -> Result<(), EngineError> {
  match step.response_format {
    ResponseFormat::Text => {
      for field in step.extract.keys() {
        ctx.insert(field.clone(), text.to_string());
      }
    }
    ResponseFormat::Json | ResponseFormat::Jsonp => {
      let payload = match step.response_format {
        ResponseFormat::Jsonp => unwrap_jsonp(text),
        _ => text,
      };
      let document: Value =
        serde_json::from_str(payload).map_err(|e| EngineError::Parse {
          step_id: step.id.clone(),
          message: e.to_string(),
        })?;

      for (field, path) in &step.extract {
        let value = extract(&document, &resolve(path, ctx));
        ctx.insert(field.clone(), value);
      }
    }
  }

  apply_transforms(&step.process, ctx);
  Ok(())
}
