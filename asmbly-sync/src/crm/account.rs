//! Account detail parsing
//!
//! `GET /v2/accounts/{id}` returns a deeply nested document where most
//! values are optional. [`AccountDetail::from_json`] requires the individual
//! account and its primary contact, and reads everything else as typed
//! optional fields. Custom fields are matched by name.

use crate::crm::MalformedRecord;
use asmbly_common::time::parse_us_date;
use chrono::NaiveDate;
use serde_json::Value;

const FIELD_OPENPATH_ID: &str = "OpenPathID";
const FIELD_DISCOURSE_ID: &str = "DiscourseID";
const FIELD_FAMILY_SUB_MEMBER: &str = "Family Group Sub Member";
const FIELD_FAMILY_PRIMARY: &str = "FamilyGroupPrimaryMember";
const FIELD_WAIVER_DATE: &str = "WaiverDate";
const FIELD_TOUR_DATE: &str = "FacilityTourDate";
const FIELD_REFERRAL_SOURCE: &str = "Referral Source";

const TYPE_INSTRUCTOR: &str = "Instructor";
const TYPE_STEWARD: &str = "Steward";
const TYPE_SUPER_STEWARD: &str = "Super Steward";
const TYPE_VOLUNTEER: &str = "Volunteer";

/// Primary address of an account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

/// Custom fields the jobs care about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomFields {
    pub openpath_id: Option<String>,
    pub discourse_id: Option<String>,
    pub family_sub_member: bool,
    pub family_primary_member: bool,
    pub waiver_date: Option<NaiveDate>,
    pub facility_tour_date: Option<NaiveDate>,
    pub referral_source: Option<String>,
}

/// Typed view of one individual account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountDetail {
    pub account_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<Address>,
    pub custom: CustomFields,
    /// Individual type names, e.g. `Instructor`
    pub individual_types: Vec<String>,
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AccountDetail {
    pub fn from_json(account_id: i64, value: &Value) -> Result<Self, MalformedRecord> {
        let label = format!("account {}", account_id);

        let individual = value
            .get("individualAccount")
            .filter(|v| v.is_object())
            .ok_or_else(|| MalformedRecord::missing(label.clone(), "individualAccount"))?;
        let contact = individual
            .get("primaryContact")
            .filter(|v| v.is_object())
            .ok_or_else(|| MalformedRecord::missing(label.clone(), "individualAccount.primaryContact"))?;

        let birth_date = match contact.get("dob").filter(|v| v.is_object()) {
            None => None,
            Some(dob) => Some(parse_dob(dob).ok_or_else(|| {
                MalformedRecord::invalid(label.clone(), "primaryContact.dob", dob)
            })?),
        };

        let address = contact
            .get("addresses")
            .and_then(Value::as_array)
            .and_then(|addresses| {
                addresses
                    .iter()
                    .find(|a| a.get("isPrimaryAddress").and_then(Value::as_bool) == Some(true))
            })
            .map(|a| Address {
                line1: text(a.get("addressLine1")),
                city: text(a.get("city")),
                state: text(a.pointer("/stateProvince/code")),
                zip_code: text(a.get("zipCode")),
            });

        let custom = parse_custom_fields(&label, individual.get("accountCustomFields"))?;

        let individual_types = individual
            .get("individualTypes")
            .and_then(Value::as_array)
            .map(|types| types.iter().filter_map(|t| text(t.get("name"))).collect())
            .unwrap_or_default();

        Ok(Self {
            account_id,
            first_name: text(contact.get("firstName")),
            last_name: text(contact.get("lastName")),
            email: text(contact.get("email1")),
            gender: text(contact.pointer("/gender/name")),
            birth_date,
            address,
            custom,
            individual_types,
        })
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.individual_types.iter().any(|t| t == name)
    }

    pub fn is_instructor(&self) -> bool {
        self.has_type(TYPE_INSTRUCTOR)
    }

    pub fn is_steward(&self) -> bool {
        self.has_type(TYPE_STEWARD) || self.has_type(TYPE_SUPER_STEWARD)
    }

    pub fn is_volunteer(&self) -> bool {
        self.has_type(TYPE_VOLUNTEER)
    }

    /// Family plan member, either primary or sub-member
    pub fn is_family_member(&self) -> bool {
        self.custom.family_sub_member || self.custom.family_primary_member
    }

    pub fn zip_code(&self) -> Option<&str> {
        self.address.as_ref().and_then(|a| a.zip_code.as_deref())
    }

    /// Age in whole years on `today`
    pub fn age_on(&self, today: NaiveDate) -> Option<i64> {
        self.birth_date.map(|dob| today.years_since(dob).map(i64::from).unwrap_or(0))
    }
}

fn parse_dob(dob: &Value) -> Option<NaiveDate> {
    let part = |key: &str| -> Option<u32> {
        match dob.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };
    let year = i32::try_from(part("year")?).ok()?;
    NaiveDate::from_ymd_opt(year, part("month")?, part("day")?)
}

fn parse_custom_fields(label: &str, fields: Option<&Value>) -> Result<CustomFields, MalformedRecord> {
    let mut custom = CustomFields::default();
    let Some(fields) = fields.and_then(Value::as_array) else {
        return Ok(custom);
    };

    for field in fields {
        let Some(name) = field.get("name").and_then(Value::as_str) else {
            continue;
        };
        let value = text(field.get("value"));
        let options: Vec<String> = field
            .get("optionValues")
            .and_then(Value::as_array)
            .map(|opts| opts.iter().filter_map(|o| text(o.get("name"))).collect())
            .unwrap_or_default();

        match name {
            FIELD_OPENPATH_ID => custom.openpath_id = value,
            FIELD_DISCOURSE_ID => custom.discourse_id = value,
            FIELD_FAMILY_SUB_MEMBER => {
                custom.family_sub_member = options.iter().any(|o| o == "Yes");
            }
            FIELD_FAMILY_PRIMARY => {
                custom.family_primary_member = options.iter().any(|o| o == "Family Group Primary Member");
            }
            FIELD_WAIVER_DATE => custom.waiver_date = custom_date(label, name, value)?,
            FIELD_TOUR_DATE => custom.facility_tour_date = custom_date(label, name, value)?,
            FIELD_REFERRAL_SOURCE => custom.referral_source = options.into_iter().next(),
            _ => {}
        }
    }

    Ok(custom)
}

fn custom_date(label: &str, name: &str, value: Option<String>) -> Result<Option<NaiveDate>, MalformedRecord> {
    match value {
        None => Ok(None),
        Some(s) => parse_us_date(&s)
            .map(Some)
            .ok_or_else(|| MalformedRecord::invalid(label, name, s)),
    }
}
