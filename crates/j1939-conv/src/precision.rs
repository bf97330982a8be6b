//! Floating point precision handling
//!
//! Avoids ugly values like 13.000000001 by rounding to appropriate precision,
//! and renders report numbers with thousands separators.

/// Determine appropriate decimal places from scale factor
///
/// # Examples
/// - scale 1.0 → 0 decimal places (integers)
/// - scale 0.1 → 1 decimal place
/// - scale 0.125 → 3 decimal places
/// - scale 0.001 → 3 decimal places
pub fn precision_from_scale(scale: f64) -> u8 {
    if scale <= 0.0 {
        return 4; // Safe default
    }

    if scale >= 1.0 {
        return 0;
    }

    // Scale by 10 until we get an integer (or close enough)
    let mut temp = scale;
    let mut precision = 0u8;

    while precision < 6 {
        if (temp - temp.round()).abs() < 1e-9 {
            break;
        }
        temp *= 10.0;
        precision += 1;
    }

    precision
}

/// Round a value to the specified number of decimal places
pub fn round_to_precision(value: f64, precision: u8) -> f64 {
    if precision == 0 {
        value.round()
    } else {
        let factor = 10_f64.powi(precision as i32);
        (value * factor).round() / factor
    }
}

/// Round a value based on the scale factor used to produce it
pub fn round_for_scale(value: f64, scale: f64) -> f64 {
    round_to_precision(value, precision_from_scale(scale))
}

/// Format with a fixed number of decimals and comma thousands separators
///
/// `format_thousands(29120.0, 0)` gives `"29,120"`.
pub fn format_thousands(value: f64, precision: u8) -> String {
    let rounded = round_to_precision(value, precision);
    let text = format!("{:.*}", precision as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}
