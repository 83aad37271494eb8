use rust_decimal::Decimal;

/// Format an amount in pounds with thousands separators: £1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let pence = format!("{:.2}", val.abs());
    let (int_part, dec_part) = pence.split_once('.').unwrap_or((pence.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-£{with_commas}.{dec_part}")
    } else {
        format!("£{with_commas}.{dec_part}")
    }
}

/// 0.754 -> "75%"
pub fn percent(val: f64) -> String {
    format!("{:.0}%", val * 100.0)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(Decimal::new(123456, 2)), "£1,234.56");
        assert_eq!(money(Decimal::new(-50000, 2)), "-£500.00");
        assert_eq!(money(Decimal::ZERO), "£0.00");
        assert_eq!(money(Decimal::new(100000099, 2)), "£1,000,000.99");
        assert_eq!(money(Decimal::new(421, 1)), "£42.10");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.754), "75%");
        assert_eq!(percent(1.0), "100%");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
