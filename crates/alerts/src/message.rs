//! Alert message formatting (Telegram HTML parse mode).

use pricewatch_core::{AlertEvent, Direction};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Two decimals for prices of one dollar and up, up to eight significant
/// decimals below that.
pub fn format_price(price: f64) -> String {
    if price.abs() >= 1.0 {
        return format!("{:.2}", price);
    }
    let formatted = format!("{:.8}", price);
    let trimmed = formatted.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

/// Compact duration, e.g. "2d 3h", "1h 5m", "15m", "45s".
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, hours, minutes, secs) = (
        seconds / 86_400,
        (seconds % 86_400) / 3_600,
        (seconds % 3_600) / 60,
        seconds % 60,
    );

    match (days, hours, minutes) {
        (0, 0, 0) => format!("{}s", secs),
        (0, 0, m) => format!("{}m", m),
        (0, h, 0) => format!("{}h", h),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, 0, _) => format!("{}d", d),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

/// Format alert message for Telegram.
pub fn format_alert_message(event: &AlertEvent) -> String {
    let marker = match event.direction {
        Direction::Up => "📈",
        Direction::Down => "📉",
    };

    format!(
        "{} <b>{}</b> price changed by {:+.2}% from {} to {} USD\n\
         ⏱ over {} samples ({})",
        marker,
        escape_html(event.coin.as_str()),
        event.percent(),
        format_price(event.reference_price),
        format_price(event.current_price),
        event.lookback_samples,
        format_duration(event.window_seconds),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pricewatch_core::CoinKey;

    fn event(coin: &str, reference: f64, current: f64) -> AlertEvent {
        let change = (current - reference) / reference;
        AlertEvent {
            coin: CoinKey::new(coin),
            direction: Direction::from_change(change),
            percent_change: change,
            reference_price: reference,
            current_price: current,
            window_seconds: 900,
            lookback_samples: 3,
        }
    }

    #[test]
    fn test_format_alert_message_up() {
        let message = format_alert_message(&event("bitcoin", 100.0, 106.0));
        assert_eq!(
            message,
            "📈 <b>bitcoin</b> price changed by +6.00% from 100.00 to 106.00 USD\n\
             ⏱ over 3 samples (15m)"
        );
    }

    #[test]
    fn test_format_alert_message_down_small_price() {
        let message = format_alert_message(&event("shiba-inu", 0.00002, 0.000018));
        assert!(message.starts_with("📉 <b>shiba-inu</b> price changed by -10.00%"));
        assert!(message.contains("from 0.00002 to 0.000018 USD"));
    }

    #[test]
    fn test_coin_is_escaped() {
        let message = format_alert_message(&event("<b>&co", 1.0, 2.0));
        assert!(message.contains("<b>&lt;b&gt;&amp;co</b>"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(900), "15m");
        assert_eq!(format_duration(3_600), "1h");
        assert_eq!(format_duration(3_900), "1h 5m");
        assert_eq!(format_duration(2 * 86_400 + 3 * 3_600 + 60), "2d 3h");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(65000.0), "65000.00");
        assert_eq!(format_price(0.5), "0.5");
        assert_eq!(format_price(0.12345678), "0.12345678");
    }
}
