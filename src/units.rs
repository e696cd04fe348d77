use alloy::primitives::{
    U256,
    utils::{
        format_ether,
        parse_ether,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};

pub const ETHER_DECIMALS: u32 = 18;
const WEI_PER_ETHER: u128 = 10u128.pow(ETHER_DECIMALS);

/// Formats a wei amount as ether with trailing zeros trimmed.
pub fn to_display(wei: u128) -> String {
    let formatted = format_ether(U256::from(wei));
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Formats a wei amount as ether truncated to `places` decimals.
pub fn to_display_fixed(wei: u128, places: u32) -> String {
    let places = places.min(ETHER_DECIMALS);
    let whole = wei / WEI_PER_ETHER;
    if places == 0 {
        return format!("{whole}");
    }
    let fractional = wei % WEI_PER_ETHER;
    let digits = format!("{fractional:018}");
    format!("{whole}.{}", &digits[..places as usize])
}

/// Parses a decimal ether amount into wei.
///
/// Only plain decimal notation is accepted: no sign, no exponent and at
/// most 18 fractional digits.
pub fn to_base_unit(amount: &str) -> Result<u128> {
    let trimmed = amount.trim();
    let (whole, fractional) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let is_decimal = !(whole.is_empty() && fractional.is_empty())
        && whole.chars().chain(fractional.chars()).all(|c| c.is_ascii_digit());
    if !is_decimal {
        return Err(eyre!("'{amount}' is not an ether amount"));
    }
    if fractional.len() > ETHER_DECIMALS as usize {
        return Err(eyre!(
            "'{amount}' has more than {ETHER_DECIMALS} decimal places"
        ));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let fractional = if fractional.is_empty() { "0" } else { fractional };
    let wei = parse_ether(&format!("{whole}.{fractional}"))
        .map_err(|err| eyre!("'{amount}' is not an ether amount: {err}"))?;
    u128::try_from(wei).map_err(|_| eyre!("'{amount}' exceeds the supported range"))
}
