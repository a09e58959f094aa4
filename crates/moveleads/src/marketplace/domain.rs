use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier for a submitted move request.
    LeadId
);
string_id!(
    /// Identifier for a removal company account.
    CompanyId
);
string_id!(
    /// Identifier for a lead/company pairing.
    AssignmentId
);
string_id!(LedgerEntryId);
string_id!(PricingRuleId);
string_id!(AuditFlagId);

/// Size of the property being moved, which drives the reveal price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertySize {
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "1_bed")]
    OneBed,
    #[serde(rename = "2_bed")]
    TwoBed,
    #[serde(rename = "3_bed")]
    ThreeBed,
    #[serde(rename = "4_bed")]
    FourBed,
    #[serde(rename = "5_plus_bed")]
    FivePlusBed,
}

impl PropertySize {
    pub const ALL: [PropertySize; 6] = [
        PropertySize::Studio,
        PropertySize::OneBed,
        PropertySize::TwoBed,
        PropertySize::ThreeBed,
        PropertySize::FourBed,
        PropertySize::FivePlusBed,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PropertySize::Studio => "studio",
            PropertySize::OneBed => "1_bed",
            PropertySize::TwoBed => "2_bed",
            PropertySize::ThreeBed => "3_bed",
            PropertySize::FourBed => "4_bed",
            PropertySize::FivePlusBed => "5_plus_bed",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let needle = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|size| size.label() == needle)
    }
}

/// Optional extras the homeowner asked quotes for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFlags {
    #[serde(default)]
    pub packing: bool,
    #[serde(default)]
    pub storage: bool,
    #[serde(default)]
    pub dismantling: bool,
    #[serde(default)]
    pub fragile_items: bool,
}

/// Personally identifiable details for a lead. Only disclosed through a paid reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub marketing_consent: bool,
}

impl ContactDetails {
    pub fn disclosed(&self) -> RevealedContact {
        RevealedContact {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Contact fields handed to a company after it paid for the lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedContact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Already validated intake payload, as handed over by the public form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub from_postcode: String,
    pub to_postcode: String,
    /// `None` means the homeowner has no fixed date.
    #[serde(default)]
    pub move_date: Option<NaiveDate>,
    #[serde(default)]
    pub flexible_dates: bool,
    pub property_size: PropertySize,
    #[serde(default)]
    pub services: ServiceFlags,
    #[serde(default)]
    pub notes: Option<String>,
    pub contact: ContactDetails,
}

/// Lead row as handed to the repository, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub from_postcode: String,
    pub to_postcode: String,
    pub move_date: Option<NaiveDate>,
    pub flexible_dates: bool,
    pub property_size: PropertySize,
    pub services: ServiceFlags,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeadSubmission {
    pub fn into_parts(self, created_at: DateTime<Utc>) -> (NewLead, ContactDetails) {
        let lead = NewLead {
            from_postcode: self.from_postcode,
            to_postcode: self.to_postcode,
            move_date: self.move_date,
            flexible_dates: self.flexible_dates,
            property_size: self.property_size,
            services: self.services,
            notes: self.notes,
            created_at,
        };
        (lead, self.contact)
    }
}

/// Company-visible move request. Carries no contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub from_postcode: String,
    pub to_postcode: String,
    pub move_date: Option<NaiveDate>,
    pub flexible_dates: bool,
    pub property_size: PropertySize,
    pub services: ServiceFlags,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn from_new(id: LeadId, new: NewLead) -> Self {
        Self {
            id,
            from_postcode: new.from_postcode,
            to_postcode: new.to_postcode,
            move_date: new.move_date,
            flexible_dates: new.flexible_dates,
            property_size: new.property_size,
            services: new.services,
            notes: new.notes,
            created_at: new.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl CompanyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CompanyStatus::Pending => "pending",
            CompanyStatus::Approved => "approved",
            CompanyStatus::Rejected => "rejected",
            CompanyStatus::Suspended => "suspended",
        }
    }
}

/// Registration details supplied by the company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub profile: CompanyProfile,
    pub status: CompanyStatus,
    /// Set by the company to stop receiving leads without giving up approval.
    pub paused: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn accepts_leads(&self) -> bool {
        self.status == CompanyStatus::Approved && !self.paused
    }
}

/// One postcode prefix (outward or area code) a company serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostcodeCoverage {
    pub company_id: CompanyId,
    pub prefix: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Revealed,
    Contacted,
    Quoted,
    Won,
    Lost,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Revealed => "revealed",
            AssignmentStatus::Contacted => "contacted",
            AssignmentStatus::Quoted => "quoted",
            AssignmentStatus::Won => "won",
            AssignmentStatus::Lost => "lost",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, AssignmentStatus::Won | AssignmentStatus::Lost)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub lead_id: LeadId,
    pub company_id: CompanyId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadAssignment {
    pub id: AssignmentId,
    pub lead_id: LeadId,
    pub company_id: CompanyId,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    /// `None` until the company has paid for the contact details.
    pub revealed_at: Option<DateTime<Utc>>,
    pub price_at_reveal: Option<Decimal>,
    pub notes: Option<String>,
}

impl LeadAssignment {
    pub fn is_revealed(&self) -> bool {
        self.revealed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Purchase,
    Reveal,
    Refund,
    Adjustment,
}

impl LedgerReason {
    pub const fn label(self) -> &'static str {
        match self {
            LedgerReason::Purchase => "purchase",
            LedgerReason::Reveal => "reveal",
            LedgerReason::Refund => "refund",
            LedgerReason::Adjustment => "adjustment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    StripeSession,
    LeadAssignment,
    Admin,
}

impl ReferenceType {
    pub const fn label(self) -> &'static str {
        match self {
            ReferenceType::StripeSession => "stripe_session",
            ReferenceType::LeadAssignment => "lead_assignment",
            ReferenceType::Admin => "admin",
        }
    }
}

/// Ties a ledger row back to the event that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerReference {
    pub reference_type: ReferenceType,
    pub reference_id: String,
}

impl LedgerReference {
    pub fn stripe_session(session_id: impl Into<String>) -> Self {
        Self {
            reference_type: ReferenceType::StripeSession,
            reference_id: session_id.into(),
        }
    }

    pub fn assignment(assignment_id: &AssignmentId) -> Self {
        Self {
            reference_type: ReferenceType::LeadAssignment,
            reference_id: assignment_id.0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub company_id: CompanyId,
    pub delta: Decimal,
    pub balance_after: Decimal,
    pub reason: LedgerReason,
    pub reference: Option<LedgerReference>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable balance change. `balance_after` is a snapshot, never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub company_id: CompanyId,
    pub delta: Decimal,
    pub balance_after: Decimal,
    pub reason: LedgerReason,
    pub reference: Option<LedgerReference>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(id: LedgerEntryId, new: NewLedgerEntry) -> Self {
        Self {
            id,
            company_id: new.company_id,
            delta: new.delta,
            balance_after: new.balance_after,
            reason: new.reason,
            reference: new.reference,
            description: new.description,
            created_at: new.created_at,
        }
    }
}

/// Matching shortfalls surfaced to the admin audit view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFlagKind {
    NoCoverage,
    NoEligibleCompanies,
    PartialMatch,
}

impl AuditFlagKind {
    pub const fn describe(self) -> &'static str {
        match self {
            AuditFlagKind::NoCoverage => "no postcode coverage matches",
            AuditFlagKind::NoEligibleCompanies => "no approved/active companies with coverage",
            AuditFlagKind::PartialMatch => "lead matched fewer companies than the limit",
        }
    }
}

pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditFlag {
    pub kind: AuditFlagKind,
    pub lead_id: LeadId,
    pub matched: usize,
    pub limit: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFlag {
    pub id: AuditFlagId,
    pub kind: AuditFlagKind,
    pub actor: String,
    pub lead_id: LeadId,
    pub matched: usize,
    pub limit: usize,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl AuditFlag {
    pub fn from_new(id: AuditFlagId, new: NewAuditFlag) -> Self {
        Self {
            id,
            kind: new.kind,
            actor: SYSTEM_ACTOR.to_string(),
            lead_id: new.lead_id,
            matched: new.matched,
            limit: new.limit,
            detail: format!(
                "{}: {} of {} slots filled",
                new.kind.describe(),
                new.matched,
                new.limit
            ),
            created_at: new.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_size_labels_round_trip_through_serde() {
        let encoded = serde_json::to_string(&PropertySize::FivePlusBed).expect("encodes");
        assert_eq!(encoded, "\"5_plus_bed\"");
        let decoded: PropertySize = serde_json::from_str("\"1_bed\"").expect("decodes");
        assert_eq!(decoded, PropertySize::OneBed);
        assert_eq!(PropertySize::from_label(" 3_BED "), Some(PropertySize::ThreeBed));
        assert_eq!(PropertySize::from_label("mansion"), None);
    }

    #[test]
    fn paused_or_unapproved_companies_do_not_accept_leads() {
        let mut company = Company {
            id: CompanyId::from("co-1"),
            profile: CompanyProfile {
                name: "Swift Removals".to_string(),
                email: "ops@swift.example".to_string(),
                phone: None,
                website: None,
            },
            status: CompanyStatus::Approved,
            paused: false,
            created_at: Utc::now(),
        };
        assert!(company.accepts_leads());

        company.paused = true;
        assert!(!company.accepts_leads());

        company.paused = false;
        company.status = CompanyStatus::Suspended;
        assert!(!company.accepts_leads());
    }
}
