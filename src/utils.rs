use std::time::Duration;

use reqwest::{Client, Url};

// ###################################
// ->   URL utils
// ###################################
/// Percent-encodes a value for use inside a query string (`@` becomes `%40`, space becomes `+`).
pub fn url_encode(v: &str) -> String {
    url::form_urlencoded::byte_serialize(v.as_bytes()).collect()
}

/// Parses a base url for `Url::join`. A path without a trailing slash would have its last
/// segment replaced on join (`/v1.1` + `email` is `/email`), so one is added.
pub fn base_url(v: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(v)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// ###################################
// ->   HTTP utils
// ###################################
/// Builds a `reqwest::Client`, only imposing a timeout when one is configured.
pub fn http_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

// ###################################
// ->   Error format chain
// ###################################
/// Calls `Error::source()` on a chain of errors and tries to write them to a `Formatter`.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current_src = e.source();
    while let Some(cause) = current_src {
        write!(f, "Caused by:\n\t{cause}")?;
        current_src = cause.source();
    }

    Ok(())
}
