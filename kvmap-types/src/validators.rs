//! Built-in validator set.
//!
//! Stored under `is<Name>`. Each predicate receives the stringified value.

use crate::expr::Predicate;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("built-in pattern compiles"));
    };
}

pattern!(EMAIL, r"^[^\s@]+@[^\s@]+\.[^\s@]+$");
pattern!(
    URL,
    r"^(?:(?:https?|ftp)://)?(?:[^\s:@/]+(?::[^\s:@/]*)?@)?(?:localhost|(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}|\d{1,3}(?:\.\d{1,3}){3})(?::\d{1,5})?(?:[/?#]\S*)?$"
);
pattern!(FLOAT, r"^[-+]?(?:[0-9]+)?(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?$");
pattern!(INT, r"^[-+]?(?:0|[1-9][0-9]*)$");
pattern!(NUMERIC, r"^[-+]?[0-9]+$");
pattern!(ALPHA, r"^[A-Za-z]+$");
pattern!(ALPHANUMERIC, r"^[A-Za-z0-9]+$");
pattern!(HEXADECIMAL, r"^[0-9A-Fa-f]+$");
pattern!(HEX_COLOR, r"^#?(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$");
pattern!(
    UUID,
    r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$"
);

const MAX_URL_LENGTH: usize = 2083;

fn matches(re: &'static LazyLock<Regex>) -> Predicate {
    predicate(move |s| re.is_match(s))
}

fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The validators installed by `TypeRegistry::with_builtins`, keyed by the
/// name without the `is` prefix.
pub(crate) fn builtin() -> Vec<(&'static str, Predicate)> {
    vec![
        ("Email", matches(&EMAIL)),
        (
            "Url",
            predicate(|s| s.len() <= MAX_URL_LENGTH && URL.is_match(s)),
        ),
        ("Lowercase", predicate(|s| s == s.to_lowercase())),
        ("Uppercase", predicate(|s| s == s.to_uppercase())),
        (
            "Float",
            predicate(|s| s.chars().any(|c| c.is_ascii_digit()) && FLOAT.is_match(s)),
        ),
        ("Int", matches(&INT)),
        ("Numeric", matches(&NUMERIC)),
        ("Alpha", matches(&ALPHA)),
        ("Alphanumeric", matches(&ALPHANUMERIC)),
        ("Hexadecimal", matches(&HEXADECIMAL)),
        ("HexColor", matches(&HEX_COLOR)),
        ("Uuid", matches(&UUID)),
        ("IPv4", predicate(|s| s.parse::<Ipv4Addr>().is_ok())),
    ]
}
