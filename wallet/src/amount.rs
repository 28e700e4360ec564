//! Token amounts as typed by people, converted to base units and back.

use umbra_protocol::config::BASE_UNITS_PER_TOKEN;

const DECIMALS: usize = 9;

/// Parse `"0.5"`-style token amounts into base units. No floating point is
/// involved; more than nine decimals is an error rather than a rounding.
pub fn parse_tokens(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err("empty amount".into());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("not a token amount: {}", s));
    }
    if frac.len() > DECIMALS {
        return Err(format!("at most {} decimals: {}", DECIMALS, s));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| format!("amount too large: {}", s))?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = DECIMALS)
            .parse()
            .map_err(|_| format!("not a token amount: {}", s))?
    };

    whole
        .checked_mul(BASE_UNITS_PER_TOKEN)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| format!("amount too large: {}", s))
}

/// Render base units as tokens, trimming trailing zeros.
pub fn format_tokens(units: u64) -> String {
    let whole = units / BASE_UNITS_PER_TOKEN;
    let frac = units % BASE_UNITS_PER_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
