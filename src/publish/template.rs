//! Route parameter templates and duration strings

use std::collections::HashMap;
use std::time::Duration;

/// Substitute positional `args` into a printf-style template
///
/// `%s`, `%d` and `%v` each take the next argument verbatim, `%%` is a
/// literal percent. Verbs beyond the argument list render as nothing and
/// unknown verbs are kept as written.
pub fn render_params(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args = args.iter();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s' | 'd' | 'v') => {
                if let Some(arg) = args.next() {
                    out.push_str(arg);
                }
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Parse a query string into a flat map, keeping the first value of a key
pub fn parse_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    params
}

/// Escape a body for use as a query value (spaces become `+`)
pub fn escape_query(value: &[u8]) -> String {
    url::form_urlencoded::byte_serialize(value).collect()
}

/// Parse durations such as `300ms`, `1.5s` or `1m30s`
///
/// Units are `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`. A bare `0` is zero.
/// Negative values are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut rest = s;
    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_positional_verbs() {
        let rendered = render_params(
            "cmd=%d&subcmd=%s&uid=%v&rid=%s&body=%s",
            &["4", "1", "u1", "r1", "hi+there"],
        );
        assert_eq!(rendered, "cmd=4&subcmd=1&uid=u1&rid=r1&body=hi+there");
    }

    #[test]
    fn test_render_literal_percent_and_missing_args() {
        assert_eq!(render_params("rate=100%%&a=%s&b=%s", &["x"]), "rate=100%&a=x&b=");
        assert_eq!(render_params("keep=%q", &[]), "keep=%q");
        assert_eq!(render_params("tail%", &[]), "tail%");
    }

    #[test]
    fn test_template_may_skip_arguments() {
        // Templates only consume as many values as they have verbs
        assert_eq!(render_params("uid=%s", &["4", "1"]), "uid=4");
    }

    #[test]
    fn test_parse_params_first_value_wins() {
        let params = parse_params("a=1&b=two+words&a=2&c=%26");
        assert_eq!(params["a"], "1");
        assert_eq!(params["b"], "two words");
        assert_eq!(params["c"], "&");
    }

    #[test]
    fn test_escape_round_trips_through_parse() {
        let escaped = escape_query("a b&c=d".as_bytes());
        assert_eq!(escaped, "a+b%26c%3Dd");
        assert_eq!(parse_params(&format!("body={}", escaped))["body"], "a b&c=d");
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("300ms"), Some(Duration::from_millis(300)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("5 minutes"), None);
        assert_eq!(parse_duration("-1s"), None);
    }
}
