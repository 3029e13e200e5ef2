//! Site access policy applied after the user's status is known.

use serde_json::Value as JsonValue;

use crate::error::AuthError;

/// Site setting that switches local (username/password) login on or off.
pub const ALLOW_LOCAL_LOGIN: &str = "allowLocalLogin";

/// Profile field holding the ban flag.
pub const BANNED_FIELD: &str = "banned";

/// Read a loosely typed setting or field as an integer.
///
/// Numbers truncate toward zero. Strings yield their leading integer after optional whitespace and
/// sign, so `"1.5"` and `"1abc"` read as 1 and `"0x1"` reads as hex. Booleans, null and strings
/// without leading digits have no integer reading.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn int_value(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        JsonValue::String(s) => leading_integer(s),
        _ => None,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, rest) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let end = rest
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(rest.len());
    let magnitude = i64::from_str_radix(&rest[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Local login is disabled only by an explicit 0; a missing or unreadable setting leaves it on.
#[must_use]
pub fn local_login_enabled(setting: Option<&JsonValue>) -> bool {
    setting.and_then(int_value) != Some(0)
}

#[must_use]
pub fn is_banned(flag: Option<&JsonValue>) -> bool {
    flag.and_then(int_value) == Some(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInput {
    pub is_admin: bool,
    pub local_login_enabled: bool,
    pub banned: bool,
}

/// Apply the access rules in order.
///
/// The local-login switch is checked first and only for non-administrators; the ban check applies
/// to everyone. A banned non-administrator therefore sees `LocalLoginDisabled` while local login is
/// off.
///
/// # Errors
///
/// Returns `AuthError::LocalLoginDisabled` or `AuthError::UserBanned`.
pub fn enforce(input: PolicyInput) -> Result<(), AuthError> {
    if !input.is_admin && !input.local_login_enabled {
        return Err(AuthError::LocalLoginDisabled);
    }
    if input.banned {
        return Err(AuthError::UserBanned);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(is_admin: bool, local_login_enabled: bool, banned: bool) -> Result<(), AuthError> {
        enforce(PolicyInput {
            is_admin,
            local_login_enabled,
            banned,
        })
    }

    #[test]
    fn disabled_local_login_is_checked_before_ban() {
        assert!(matches!(outcome(false, false, false), Err(AuthError::LocalLoginDisabled)));
        assert!(matches!(outcome(false, false, true), Err(AuthError::LocalLoginDisabled)));
        assert!(matches!(outcome(false, true, true), Err(AuthError::UserBanned)));
        assert!(matches!(outcome(true, false, true), Err(AuthError::UserBanned)));
        assert!(outcome(true, false, false).is_ok());
        assert!(outcome(false, true, false).is_ok());
    }

    #[test]
    fn setting_values_are_read_as_integers() {
        assert!(!local_login_enabled(Some(&json!(0))));
        assert!(!local_login_enabled(Some(&json!("0"))));
        assert!(!local_login_enabled(Some(&json!(" 0 "))));
        assert!(!local_login_enabled(Some(&json!(0.4))));
        assert!(local_login_enabled(Some(&json!(false))));
        assert!(local_login_enabled(Some(&json!(1))));
        assert!(local_login_enabled(Some(&json!("yes"))));
        assert!(local_login_enabled(None));

        assert!(is_banned(Some(&json!(1))));
        assert!(is_banned(Some(&json!("1"))));
        assert!(is_banned(Some(&json!("1.5"))));
        assert!(is_banned(Some(&json!("1abc"))));
        assert!(is_banned(Some(&json!("0x1"))));
        assert!(!is_banned(Some(&json!(true))));
        assert!(!is_banned(Some(&json!("abc1"))));
        assert!(!is_banned(Some(&json!(0))));
        assert!(!is_banned(Some(&json!(2))));
        assert!(!is_banned(Some(&JsonValue::Null)));
        assert!(!is_banned(None));
    }
}
