//! ACM version parsing and comparison

/// Parse an ACM version such as `"2.11.3"` or `"v2.12.0-rc1"` into `(major, minor, patch)`.
///
/// A missing patch component defaults to 0. Returns `None` for anything else.
pub fn parse_acm_version(version: &str) -> Option<(u32, u32, u32)> {
    let trimmed = version.trim().trim_start_matches('v');
    let core = trimmed.split(['-', '+']).next()?;
    let mut parts = core.split('.');

    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Whether `version` is greater than or equal to `minimum`.
///
/// Unparsable versions on either side compare as not-ge.
pub fn is_acm_version_ge(version: &str, minimum: &str) -> bool {
    match (parse_acm_version(version), parse_acm_version(minimum)) {
        (Some(v), Some(m)) => v >= m,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2.11.3", Some((2, 11, 3)))]
    #[case("v2.12.0", Some((2, 12, 0)))]
    #[case("2.13", Some((2, 13, 0)))]
    #[case("2.12.0-rc1", Some((2, 12, 0)))]
    #[case("2", None)]
    #[case("2.x.1", None)]
    #[case("1.2.3.4", None)]
    #[case("", None)]
    fn test_parse_acm_version(#[case] input: &str, #[case] expected: Option<(u32, u32, u32)>) {
        assert_eq!(parse_acm_version(input), expected);
    }

    #[rstest]
    #[case("2.12.0", "2.11.0", true)]
    #[case("2.11.0", "2.11.0", true)]
    #[case("2.10.5", "2.11.0", false)]
    #[case("2.9.0", "2.10.0", false)]
    #[case("unknown", "2.11.0", false)]
    #[case("2.11.0", "garbage", false)]
    fn test_is_acm_version_ge(#[case] version: &str, #[case] minimum: &str, #[case] expected: bool) {
        assert_eq!(is_acm_version_ge(version, minimum), expected);
    }
}
