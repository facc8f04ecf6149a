//! Display formatting shared by every view.

use chrono::{Local, TimeZone};

const SCALES: [(f64, &str); 4] = [(1e12, "T"), (1e9, "G"), (1e6, "M"), (1e3, "k")];

/// Scales a raw hash count into `"<value> <unit>"`, two decimals.
///
/// Below 1000 the value is rounded to an integer and the unit is empty,
/// so `format_hashes(999.0) == "999 "`. Callers append `"H/s"` themselves.
pub fn format_hashes(n: f64) -> String {
    if !n.is_finite() {
        return "N/A ".to_string();
    }
    for (scale, unit) in SCALES {
        if n >= scale {
            return format!("{} {}", to_fixed(n / scale, 2), unit);
        }
    }
    format!("{} ", js_number(n.round()))
}

/// Renders a float the way a browser prints a bare number.
pub fn js_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e21 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

pub fn round_to(x: f64, decimals: i32) -> f64 {
    let m = 10f64.powi(decimals);
    (x * m).round() / m
}

/// True when `x` lies exactly halfway between two multiples of
/// `10^-decimals`. `x` must be finite and non-negative.
fn is_decimal_tie(x: f64, decimals: i32) -> bool {
    if x == 0.0 {
        return false;
    }
    if decimals < 0 {
        let places = decimals.unsigned_abs();
        if x.fract() != 0.0 || x >= 1e38 || places > 38 {
            return false;
        }
        let unit = 10u128.pow(places);
        return (x as u128) % unit == unit / 2;
    }
    // x = m * 2^e exactly; x * 10^d is a half-integer iff 2 * m * 5^d * 2^d
    // has exactly -e factors of two.
    let bits = x.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);
    let (m, e) = if exp_bits == 0 { (frac, -1074) } else { (frac | (1u64 << 52), exp_bits - 1075) };
    e < 0 && (m.trailing_zeros() as i32 + decimals + 1) == -e
}

/// Smallest double above a positive finite `x`.
fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}

/// Moves an exact tie just past the midpoint so the formatter, which rounds
/// ties to even, rounds it away from zero like a browser does.
fn break_tie(x: f64, decimals: i32) -> f64 {
    let mag = x.abs();
    if mag.is_finite() && is_decimal_tie(mag, decimals) {
        next_up(mag).copysign(x)
    } else {
        x
    }
}

/// `Number.prototype.toFixed`: exact halves round away from zero.
pub fn to_fixed(x: f64, decimals: usize) -> String {
    if !x.is_finite() || x.abs() >= 1e21 {
        return js_number(x);
    }
    format!("{:.*}", decimals, break_tie(x, decimals as i32))
}

/// `Number.prototype.toPrecision`: fixed notation unless the exponent is
/// below -6 or at least `digits`.
pub fn to_precision(x: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if !x.is_finite() {
        return js_number(x);
    }
    if x == 0.0 {
        return if digits == 1 {
            "0".to_string()
        } else {
            format!("0.{}", "0".repeat(digits - 1))
        };
    }

    let magnitude = format!("{:e}", x.abs());
    let order = magnitude.split_once('e').and_then(|(_, e)| e.parse::<i32>().ok()).unwrap_or(0);
    let x = break_tie(x, digits as i32 - 1 - order);

    let sci = format!("{:.*e}", digits - 1, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exp < -6 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{}", mantissa, sign, exp.abs());
    }
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    format!("{:.*}", decimals, x)
}

/// `parseFloat`: parses the longest numeric prefix, ignoring leading
/// whitespace. Returns `None` when no prefix is numeric.
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].replace("Infinity", "inf").parse().ok();
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

pub fn local_datetime(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn local_time(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "N/A".to_string();
    }
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
