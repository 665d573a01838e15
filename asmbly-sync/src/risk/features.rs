//! Risk feature vector
//!
//! Everything the churn-risk model looks at, computed from one account's
//! detail, membership timeline, event registrations and donations.

use crate::crm::{AccountDetail, Donation, EventRegistration};
use crate::membership::MemberTimeline;
use chrono::NaiveDate;

/// Event categories that mark a class as one of the tracked skill classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    WoodshopSafety,
    MetalShopSafety,
    Cnc,
    Lasers,
    Printing3d,
}

impl ClassKind {
    /// Classify a class by category, falling back to the name for metal shop safety
    pub fn of(registration: &EventRegistration) -> Option<ClassKind> {
        match registration.event.category.as_str() {
            "Woodshop Safety" => Some(ClassKind::WoodshopSafety),
            "CNC Router" => Some(ClassKind::Cnc),
            "Laser Cutting" => Some(ClassKind::Lasers),
            "_3D Printing" => Some(ClassKind::Printing3d),
            _ if registration
                .event
                .name
                .to_lowercase()
                .contains("metal shop safety") =>
            {
                Some(ClassKind::MetalShopSafety)
            }
            _ => None,
        }
    }
}

/// Model input for one member
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberFeatures {
    pub has_op_id: bool,
    pub has_discourse_id: bool,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub referral_source: Option<String>,
    pub family_membership: bool,
    pub annual_membership: bool,
    pub waiver_signed: bool,
    pub orientation_attended: bool,
    pub taken_mss: bool,
    pub taken_wss: bool,
    pub taken_cnc: bool,
    pub taken_lasers: bool,
    pub taken_3dp: bool,
    pub teacher: bool,
    pub steward: bool,
    pub num_classes_before_joining: i64,
    pub num_classes_attended: i64,
    pub total_dollars_spent: f64,
}

impl MemberFeatures {
    pub fn build(
        account: &AccountDetail,
        timeline: &MemberTimeline,
        registrations: &[EventRegistration],
        donations: &[Donation],
        today: NaiveDate,
    ) -> Self {
        let mut features = MemberFeatures {
            has_op_id: account.custom.openpath_id.is_some(),
            has_discourse_id: account.custom.discourse_id.is_some(),
            age: account.age_on(today),
            gender: account.gender.clone(),
            referral_source: account.custom.referral_source.clone(),
            family_membership: account.is_family_member(),
            annual_membership: timeline.has_annual(),
            waiver_signed: account.custom.waiver_date.is_some(),
            orientation_attended: account.custom.facility_tour_date.is_some(),
            teacher: account.is_instructor(),
            steward: account.is_steward(),
            num_classes_attended: registrations.len() as i64,
            ..Default::default()
        };

        for registration in registrations {
            match ClassKind::of(registration) {
                Some(ClassKind::WoodshopSafety) => features.taken_wss = true,
                Some(ClassKind::MetalShopSafety) => features.taken_mss = true,
                Some(ClassKind::Cnc) => features.taken_cnc = true,
                Some(ClassKind::Lasers) => features.taken_lasers = true,
                Some(ClassKind::Printing3d) => features.taken_3dp = true,
                None => {}
            }
        }

        features.num_classes_before_joining = match timeline.first_start() {
            None => registrations.len() as i64,
            Some(first) => registrations
                .iter()
                .filter(|r| r.event.start_date.is_some_and(|d| d < first))
                .count() as i64,
        };

        features.total_dollars_spent = timeline.total_fees()
            + registrations.iter().map(|r| r.amount).sum::<f64>()
            + donations.iter().map(|d| d.amount).sum::<f64>();

        features
    }

    /// Numeric features by name; `None` where the value is unknown
    pub fn numeric(&self) -> Vec<(&'static str, Option<f64>)> {
        let flag = |b: bool| Some(if b { 1.0 } else { 0.0 });
        vec![
            ("has_op_id", flag(self.has_op_id)),
            ("has_discourse_id", flag(self.has_discourse_id)),
            ("age", self.age.map(|a| a as f64)),
            ("family_membership", flag(self.family_membership)),
            ("annual_membership", flag(self.annual_membership)),
            ("waiver_signed", flag(self.waiver_signed)),
            ("orientation_attended", flag(self.orientation_attended)),
            ("taken_mss", flag(self.taken_mss)),
            ("taken_wss", flag(self.taken_wss)),
            ("taken_cnc", flag(self.taken_cnc)),
            ("taken_lasers", flag(self.taken_lasers)),
            ("taken_3dp", flag(self.taken_3dp)),
            ("teacher", flag(self.teacher)),
            ("steward", flag(self.steward)),
            (
                "num_classes_before_joining",
                Some(self.num_classes_before_joining as f64),
            ),
            ("num_classes_attended", Some(self.num_classes_attended as f64)),
            ("total_dollars_spent", Some(self.total_dollars_spent)),
        ]
    }

    /// Categorical features by name
    pub fn categorical(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("gender", self.gender.as_deref()),
            ("referral_source", self.referral_source.as_deref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::account::CustomFields;
    use crate::crm::EventInfo;
    use crate::membership::{MembershipPeriod, MembershipStatus, MembershipType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn class(name: &str, category: &str, on: NaiveDate, amount: f64) -> EventRegistration {
        EventRegistration {
            event_id: 1,
            amount,
            event: EventInfo {
                name: name.to_string(),
                start_date: Some(on),
                category: category.to_string(),
            },
        }
    }

    fn period(start: NaiveDate, end: NaiveDate, kind: MembershipType, price: f64) -> MembershipPeriod {
        MembershipPeriod {
            start_date: start,
            end_date: end,
            kind,
            price,
            status: MembershipStatus::Succeeded,
        }
    }

    #[test]
    fn test_class_kinds() {
        let on = date(2024, 1, 1);
        assert_eq!(
            ClassKind::of(&class("Woodshop Safety", "Woodshop Safety", on, 0.0)),
            Some(ClassKind::WoodshopSafety)
        );
        assert_eq!(
            ClassKind::of(&class("Metal Shop Safety", "Metalworking", on, 0.0)),
            Some(ClassKind::MetalShopSafety)
        );
        assert_eq!(
            ClassKind::of(&class("Intro to Resin Printing", "_3D Printing", on, 0.0)),
            Some(ClassKind::Printing3d)
        );
        assert_eq!(ClassKind::of(&class("Sewing 101", "Textiles", on, 0.0)), None);
    }

    #[test]
    fn test_build_features() {
        let account = AccountDetail {
            account_id: 9,
            gender: Some("Male".to_string()),
            birth_date: Some(date(1980, 1, 1)),
            custom: CustomFields {
                openpath_id: Some("123".to_string()),
                waiver_date: Some(date(2023, 12, 1)),
                ..Default::default()
            },
            individual_types: vec!["Steward".to_string()],
            ..Default::default()
        };
        let timeline = MemberTimeline::from_periods(vec![
            period(date(2024, 1, 1), date(2024, 1, 31), MembershipType::Monthly, 95.0),
            period(date(2024, 2, 1), date(2025, 1, 31), MembershipType::Annual, 900.0),
        ]);
        let registrations = vec![
            class("Woodshop Safety", "Woodshop Safety", date(2023, 12, 10), 60.0),
            class("Laser Cutting Basics", "Laser Cutting", date(2024, 3, 2), 45.0),
        ];
        let donations = vec![Donation {
            date: date(2024, 4, 1),
            amount: 20.0,
        }];

        let f = MemberFeatures::build(&account, &timeline, &registrations, &donations, date(2024, 6, 1));

        assert!(f.has_op_id);
        assert!(!f.has_discourse_id);
        assert_eq!(f.age, Some(44));
        assert!(f.annual_membership);
        assert!(f.waiver_signed);
        assert!(!f.orientation_attended);
        assert!(f.taken_wss);
        assert!(f.taken_lasers);
        assert!(!f.taken_cnc);
        assert!(f.steward);
        assert!(!f.teacher);
        assert_eq!(f.num_classes_attended, 2);
        assert_eq!(f.num_classes_before_joining, 1);
        assert_eq!(f.total_dollars_spent, 95.0 + 900.0 + 60.0 + 45.0 + 20.0);
    }

    #[test]
    fn test_classes_before_joining_without_membership() {
        let registrations = vec![
            class("A", "Woodworking", date(2024, 1, 1), 0.0),
            class("B", "Woodworking", date(2024, 2, 1), 0.0),
        ];
        let f = MemberFeatures::build(
            &AccountDetail::default(),
            &MemberTimeline::default(),
            &registrations,
            &[],
            date(2024, 6, 1),
        );

        assert_eq!(f.num_classes_before_joining, 2);
        assert_eq!(f.age, None);
        assert!(f.numeric().contains(&("age", None)));
    }
}
