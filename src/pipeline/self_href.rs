//! Resolution of the `self` resource href

use log::{debug, warn};
use serde_json::Value;

use crate::client::{ApiRequest, RightScaleApi};
use crate::error::{ApiError, ConfigError, Result};
use crate::select;

const ENV_PATH: &str = "/rll/env";
const SELF_HREF_VAR: &str = "RS_SELF_HREF";
const SESSION_INSTANCE_PATH: &str = "/api/session/instance";
const SELF_LINK_SELECTOR: &str = r#":root > .links > *:has(.rel:val("self")) > .href"#;

/// Find the href of the instance this runs on.
///
/// Asks the proxy for a cached `RS_SELF_HREF` first, then falls back to the
/// session instance and caches what it finds.
pub async fn resolve(api: &dyn RightScaleApi) -> Result<String> {
    if !api.uses_proxy() {
        return Err(ConfigError::SelfHrefRequiresProxy.into());
    }

    let env = api.execute(&ApiRequest::get(ENV_PATH)).await?;
    let cached = env
        .data
        .as_ref()
        .and_then(|d| d.get(SELF_HREF_VAR))
        .and_then(Value::as_str)
        .filter(|href| !href.is_empty());
    if let Some(href) = cached {
        debug!("Self href: {}", href);
        return Ok(href.to_string());
    }

    let instance = api.execute(&ApiRequest::get(SESSION_INSTANCE_PATH)).await?;
    let found = match &instance.data {
        Some(data) => select::select(data, SELF_LINK_SELECTOR)?
            .into_iter()
            .find_map(|v| v.as_str().map(str::to_string)),
        None => None,
    };
    let href = found.ok_or_else(|| {
        ApiError::InvalidResponse(format!(
            "extracting self-href from <<{}>>",
            String::from_utf8_lossy(&instance.raw)
        ))
    })?;

    let store = ApiRequest::put(format!("{}/{}", ENV_PATH, SELF_HREF_VAR)).body("text/plain", &href);
    if let Err(err) = api.execute(&store).await {
        warn!("Cannot set {} in RightLink: {}", SELF_HREF_VAR, err);
    }

    debug!("Self href: {}", href);
    Ok(href)
}
