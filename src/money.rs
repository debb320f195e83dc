// 💵 Money helpers - dollars text ↔ integer cents

use crate::error::ValidationError;

/// Parse a dollar amount ("12.99", "$1,250.5", "-3") into cents, rounding
/// half away from zero
pub fn to_cents(dollars: &str) -> Result<i64, ValidationError> {
    let cleaned: String = dollars
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    let value = cleaned
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidMoney(dollars.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidMoney(dollars.to_string()));
    }

    // Nudge by a tiny epsilon so 1.005 lands on 101, not 100
    let cents = value * 100.0;
    let cents = cents + cents.signum() * 1e-9;
    Ok(cents.round() as i64)
}

/// Format cents for display: 1299 → "$12.99", -150 → "-$1.50"
pub fn to_display(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
