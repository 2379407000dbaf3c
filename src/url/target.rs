use chrono::{Local, TimeZone};
use url::Url;

/// Timestamp layout used in file names and post dates
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Resolves a target given as a numeric ID, a user name or a full URL
///
/// # Examples
///
/// ```
/// use profile_trawler::url::target_url;
///
/// let base = "https://www.facebook.com/";
/// assert_eq!(target_url(base, "4"), "https://www.facebook.com/profile.php?id=4");
/// assert_eq!(target_url(base, "zuck"), "https://www.facebook.com/zuck");
/// ```
pub fn target_url(base: &str, target: &str) -> String {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }

    let base = base.trim_end_matches('/');
    if !target.is_empty() && target.chars().all(|c| c.is_ascii_digit()) {
        format!("{}/profile.php?id={}", base, target)
    } else {
        format!("{}/{}", base, target.trim_start_matches('/'))
    }
}

/// Recovers the identifier of a profile URL: its ID or its user name
pub fn target_name(target_url: &str) -> String {
    if let Ok(url) = Url::parse(target_url) {
        if url.path().ends_with("profile.php") {
            if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
                return id.into_owned();
            }
        }
        if let Some(segment) = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        {
            return segment.to_string();
        }
    }
    target_url.to_string()
}

/// Appends a query fragment, with `&` if the URL already has a query
pub fn join_query(base: &str, query: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query)
}

/// Drops the query and fragment, except for `profile.php` URLs whose query is the identity
pub fn strip_query(url: &str) -> String {
    if url.contains("profile.php") {
        return url.to_string();
    }
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Makes a string usable as a single path component
pub fn path_safe(name: &str) -> String {
    name.trim()
        .replace([' ', '/', '\\'], "-")
        .trim_matches('-')
        .to_string()
}

/// Renders a Unix timestamp in local time, `None` if it is out of range
pub fn format_unix_time(seconds: i64) -> Option<String> {
    Local
        .timestamp_opt(seconds, 0)
        .single()
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
}

/// Current local time in [`TIMESTAMP_FORMAT`]
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.facebook.com/";

    #[test]
    fn test_target_url() {
        assert_eq!(
            target_url(BASE, "100004"),
            "https://www.facebook.com/profile.php?id=100004"
        );
        assert_eq!(target_url(BASE, "jane.doe"), "https://www.facebook.com/jane.doe");
        assert_eq!(
            target_url(BASE, " https://www.facebook.com/jane.doe "),
            "https://www.facebook.com/jane.doe"
        );
    }

    #[test]
    fn test_target_name() {
        assert_eq!(
            target_name("https://www.facebook.com/profile.php?id=100004"),
            "100004"
        );
        assert_eq!(target_name("https://www.facebook.com/jane.doe"), "jane.doe");
        assert_eq!(target_name("https://www.facebook.com/jane.doe/"), "jane.doe");
    }

    #[test]
    fn test_join_query() {
        assert_eq!(
            join_query("https://www.facebook.com/jane.doe", "sk=friends"),
            "https://www.facebook.com/jane.doe?sk=friends"
        );
        assert_eq!(
            join_query("https://www.facebook.com/profile.php?id=4", "sk=friends"),
            "https://www.facebook.com/profile.php?id=4&sk=friends"
        );
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://www.facebook.com/jane.doe?fref=pb&hc_location=friends_tab"),
            "https://www.facebook.com/jane.doe"
        );
        assert_eq!(
            strip_query("https://www.facebook.com/profile.php?id=4&fref=pb"),
            "https://www.facebook.com/profile.php?id=4&fref=pb"
        );
    }

    #[test]
    fn test_path_safe() {
        assert_eq!(path_safe("Summer 2016 / Italy"), "Summer-2016---Italy");
        assert_eq!(path_safe(" Profile Pictures "), "Profile-Pictures");
        assert_eq!(path_safe("a\\b"), "a-b");
    }

    #[test]
    fn test_format_unix_time() {
        let formatted = format_unix_time(1_500_000_000).unwrap();
        assert_eq!(formatted.len(), 15);
        assert_eq!(&formatted[8..9], "-");
        assert!(formatted.starts_with("2017071"));
    }
}
