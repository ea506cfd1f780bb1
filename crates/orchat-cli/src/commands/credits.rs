//! /credits output formatting

use orchat_ai::CreditInfo;

/// Render credit usage for the terminal
pub fn format_credits(info: &CreditInfo) -> String {
    let mut output = format!("Key: {}\n", info.label);
    output.push_str(&format!("Usage this month: ${:.4}\n", info.usage_this_month));

    if info.is_unlimited {
        output.push_str("Limit: unlimited\n");
    } else {
        output.push_str(&format!(
            "Limit: ${:.2} ({:.1}% used)\n",
            info.limit,
            info.usage_percentage()
        ));
        if let Some(remaining) = info.remaining() {
            output.push_str(&format!("Remaining: ${:.4}\n", remaining));
        }
    }

    if let Some(rpm) = info.rate_limit_per_minute {
        output.push_str(&format!("Rate limit: {} requests/minute\n", rpm));
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(limit: f64, usage: f64, is_unlimited: bool) -> CreditInfo {
        CreditInfo {
            balance: usage,
            limit,
            usage_this_month: usage,
            label: "personal".into(),
            is_unlimited,
            rate_limit_per_minute: Some(20),
        }
    }

    #[test]
    fn test_limited_key() {
        let text = format_credits(&info(10.0, 2.5, false));
        assert!(text.contains("Key: personal"));
        assert!(text.contains("Limit: $10.00 (25.0% used)"));
        assert!(text.contains("Remaining: $7.5000"));
        assert!(text.ends_with("Rate limit: 20 requests/minute"));
    }

    #[test]
    fn test_unlimited_key() {
        let text = format_credits(&info(0.0, 1.0, true));
        assert!(text.contains("Limit: unlimited"));
        assert!(!text.contains("Remaining"));
    }
}
