//! The adjustment rule set, applied in a fixed named order. Each rule
//! either yields a signed day delta with its name recorded, or does not
//! apply. The recorded sequence makes every effective expiry traceable.

use chrono::NaiveDate;

use patfam_core::cliff::Adjustment;
use patfam_core::config::CliffConfig;
use patfam_core::record::{CanonicalRecord, LegalStatus};

pub const PROSECUTION_DELAY_EXTENSION: &str = "prosecution-delay-extension";
pub const TERMINAL_DISCLAIMER: &str = "terminal-disclaimer";
pub const SUPPLEMENTARY_PROTECTION_CERTIFICATE: &str = "supplementary-protection-certificate";

/// Prosecution beyond this is compensated day-for-day.
const ROUTINE_PROSECUTION_DAYS: i64 = 3 * 365;

/// Day-for-day extension for examination delay beyond the routine
/// three-year window. Requires a grant date.
pub fn prosecution_delay(canonical: &CanonicalRecord) -> Option<Adjustment> {
    let grant = canonical.grant_date?;
    let delay = (grant - canonical.filing_date).num_days() - ROUTINE_PROSECUTION_DAYS;
    if delay <= 0 {
        return None;
    }
    Some(Adjustment {
        rule: PROSECUTION_DELAY_EXTENSION.to_string(),
        days: delay,
    })
}

/// A revoked or lapsed family forfeits whatever term remains: the
/// running expiry is pulled back to the day before the reference date,
/// which classifies the family expired.
pub fn terminal_disclaimer(
    canonical: &CanonicalRecord,
    running_expiry: NaiveDate,
    as_of: NaiveDate,
) -> Option<Adjustment> {
    if !matches!(canonical.legal_status, LegalStatus::Revoked | LegalStatus::Lapsed) {
        return None;
    }
    let remaining = (running_expiry - as_of).num_days();
    if remaining < 0 {
        return None;
    }
    Some(Adjustment {
        rule: TERMINAL_DISCLAIMER.to_string(),
        days: -(remaining + 1),
    })
}

/// Supplementary-protection extension for granted families, from the
/// per-jurisdiction day table in config.
pub fn supplementary_protection(
    canonical: &CanonicalRecord,
    jurisdiction: &str,
    config: &CliffConfig,
) -> Option<Adjustment> {
    if canonical.legal_status != LegalStatus::Granted {
        return None;
    }
    let days = *config.spc_days.get(jurisdiction)?;
    if days == 0 {
        return None;
    }
    Some(Adjustment {
        rule: SUPPLEMENTARY_PROTECTION_CERTIFICATE.to_string(),
        days,
    })
}
