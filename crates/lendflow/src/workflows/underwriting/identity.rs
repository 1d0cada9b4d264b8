//! Borrower identity normalization and liquidity-evidence rules.

use chrono::{DateTime, Duration, Utc};

use super::domain::{BorrowerProfile, EmergencyContact, LiquidityDocument};

/// Attestations older than this must be re-collected.
pub const FRESHNESS_WINDOW_DAYS: i64 = 30;

const EMERGENCY_CONTACT_SLOTS: usize = 3;

pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Case/whitespace-insensitive substring match in either direction.
pub(crate) fn fuzzy_match(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Canonicalize a borrower profile: collapse name whitespace, lowercase the
/// email, pad/truncate emergency contacts to exactly three slots, and drop
/// case-insensitive duplicate guarantors.
pub fn normalize_profile(mut profile: BorrowerProfile) -> BorrowerProfile {
    profile.first_name = profile.first_name.trim().to_string();
    profile.last_name = profile.last_name.trim().to_string();
    profile.email = normalize_email(&profile.email);
    profile.phone = profile
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    profile.mailing_address = profile
        .mailing_address
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|a| !a.is_empty());

    profile
        .emergency_contacts
        .truncate(EMERGENCY_CONTACT_SLOTS);
    while profile.emergency_contacts.len() < EMERGENCY_CONTACT_SLOTS {
        profile.emergency_contacts.push(EmergencyContact::default());
    }

    let mut seen = Vec::new();
    profile.guarantors.retain(|name| {
        let key = normalize_name(name);
        if key.is_empty() || seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    profile
}

/// A proof document is usable only when it actually carries evidence.
pub fn document_usable(doc: &LiquidityDocument) -> bool {
    !doc.evidence_key.trim().is_empty()
}

/// Usable and uploaded within the freshness window of `reference`.
pub fn document_fresh(doc: &LiquidityDocument, reference: DateTime<Utc>) -> bool {
    document_usable(doc) && reference - doc.uploaded_at <= Duration::days(FRESHNESS_WINDOW_DAYS)
}

/// Validate that the name shown on a liquidity statement belongs to the
/// borrowing party. Returns one actionable message per violated rule, so the
/// caller can surface exactly what to fix.
pub fn validate_ownership(
    doc: &LiquidityDocument,
    borrower: &BorrowerProfile,
    llc_name: Option<&str>,
) -> Vec<String> {
    let statement_name = doc.statement_name.trim();
    if statement_name.is_empty() {
        return vec![
            "liquidity document is missing the name shown on the statement".to_string(),
        ];
    }

    if fuzzy_match(statement_name, &borrower.full_name()) {
        return Vec::new();
    }
    if let Some(llc) = llc_name {
        if fuzzy_match(statement_name, llc) {
            return Vec::new();
        }
    }

    // The statement names a third party. It is acceptable only when every
    // guarantor requirement below holds; each miss is reported separately.
    let mut violations = Vec::new();

    if !doc.named_party_is_guarantor {
        violations.push(format!(
            "confirm that {statement_name} is a guarantor on this loan"
        ));
    }
    if !doc.named_party_is_llc_member {
        violations.push(format!(
            "confirm that {statement_name} is a member of the borrowing LLC"
        ));
    }

    let listed = borrower
        .guarantors
        .iter()
        .any(|name| fuzzy_match(name, statement_name));
    if !listed {
        violations.push(format!(
            "add {statement_name} to the guarantor list for this application"
        ));
    }

    let contact_complete = borrower.guarantor_contacts.iter().any(|contact| {
        fuzzy_match(
            &format!("{} {}", contact.first_name, contact.last_name),
            statement_name,
        ) && !contact.first_name.trim().is_empty()
            && !contact.last_name.trim().is_empty()
            && !contact.email.trim().is_empty()
            && !contact.phone.trim().is_empty()
    });
    if !contact_complete {
        violations.push(format!(
            "provide a guarantor contact for {statement_name} with first name, last name, email, and phone"
        ));
    }

    violations
}

/// Apply ownership validation across a document set, skipping unusable
/// entries (those fail completeness checks elsewhere).
pub fn validate_liquidity_documents(
    documents: &[LiquidityDocument],
    borrower: &BorrowerProfile,
    llc_name: Option<&str>,
) -> Vec<String> {
    documents
        .iter()
        .filter(|doc| document_usable(doc))
        .flat_map(|doc| validate_ownership(doc, borrower, llc_name))
        .collect()
}
