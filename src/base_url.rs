/// Joins `url` to `base_url` with exactly one `/` between them.
///
/// Absolute `http://` or `https://` URLs and calls without a base are
/// returned unchanged.
pub fn normalize_url(url: &str, base_url: Option<&str>) -> String {
    let base = match base_url {
        Some(base) if !base.trim().is_empty() => base.trim(),
        _ => return url.to_owned(),
    };
    if is_absolute(url) {
        return url.to_owned();
    }

    let base = base.trim_end_matches('/');
    let relative = url.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (true, false) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}

fn is_absolute(url: &str) -> bool {
    ::url::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}
