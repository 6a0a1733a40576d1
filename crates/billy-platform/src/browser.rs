//! Page location helpers.

use wasm_bindgen::JsValue;
use web_sys::UrlSearchParams;

/// `origin + pathname` of the current page; where confirmation links
/// should point back to.
pub fn page_url() -> Option<String> {
    let location = gloo_utils::window().location();
    let origin = location.origin().ok()?;
    let path = location.pathname().unwrap_or_default();
    Some(format!("{}{}", origin, path))
}

/// A query-string parameter of the current page.
pub fn query_param(name: &str) -> Option<String> {
    let search = gloo_utils::window().location().search().ok()?;
    UrlSearchParams::new_with_str(&search).ok()?.get(name)
}

/// Sign-up confirmation token carried by the emailed link
/// (`?token_hash=…&type=signup`).
pub fn signup_token() -> Option<String> {
    if query_param("type").as_deref() != Some("signup") {
        return None;
    }
    query_param("token_hash").filter(|t| !t.is_empty())
}

/// Drop the query string so a reload does not replay the token.
pub fn clear_query() {
    let window = gloo_utils::window();
    let path = window.location().pathname().unwrap_or_default();
    let result = window
        .history()
        .and_then(|h| h.replace_state_with_url(&JsValue::NULL, "", Some(&path)));
    if let Err(e) = result {
        log::debug!("Could not clear query string: {:?}", e);
    }
}
