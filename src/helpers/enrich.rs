use regex::Regex;
use std::sync::LazyLock;

use crate::models::arctic::{Activity, Invoice, Person};

// Alternation order is precedence: "1/2 Day - Kayak" must be tried before "1/2 Day".
static TRIP_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1/2 Day - Kayak|1/2 Day|1/2Day-Premium|3/4-Day|1/4 Day")
        .expect("trip type pattern is valid")
});

static TRIP_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}\s*(AM|PM)").expect("trip time pattern is valid"));

/// First and last name, each independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerName {
    pub first: Option<String>,
    pub last: Option<String>,
}

/// Customer and trip details pulled out of one activity. `None` means the
/// upstream record did not carry the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerRecord {
    pub name: CustomerName,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub trip_type: Option<String>,
    pub trip_time: Option<String>,
}

impl From<Activity> for CustomerRecord {
    fn from(activity: Activity) -> Self {
        let person = activity.person.unwrap_or_default();
        let (trip_type, trip_time) = activity
            .invoice
            .as_ref()
            .map(extract_trip_details)
            .unwrap_or_default();

        let Person {
            namefirst,
            namelast,
            emailaddresses,
            phonenumbers,
        } = person;

        CustomerRecord {
            name: CustomerName {
                first: namefirst,
                last: namelast,
            },
            email: emailaddresses
                .and_then(|list| list.into_iter().next())
                .and_then(|e| e.emailaddress),
            phone: phonenumbers
                .and_then(|list| list.into_iter().next())
                .and_then(|p| p.phonenumber),
            trip_type,
            trip_time,
        }
    }
}

/// Scans every line item of every invoice group. Each field keeps the value
/// from the last item that matched it, so later items override earlier ones.
pub fn extract_trip_details(invoice: &Invoice) -> (Option<String>, Option<String>) {
    let mut trip_type = None;
    let mut trip_time = None;

    let items = invoice
        .groups
        .iter()
        .flatten()
        .flat_map(|group| group.items.iter().flatten());

    for item in items {
        let description = item.description.as_deref().unwrap_or_default();

        if let Some(found) = TRIP_TYPE_RE.find(description) {
            trip_type = Some(found.as_str().to_string());
        }
        if let Some(found) = TRIP_TIME_RE.find(description) {
            trip_time = Some(found.as_str().to_string());
        }
    }

    (trip_type, trip_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::arctic::{InvoiceGroup, InvoiceItem};

    fn invoice(groups: &[&[&str]]) -> Invoice {
        Invoice {
            groups: Some(
                groups
                    .iter()
                    .map(|items| InvoiceGroup {
                        items: Some(
                            items
                                .iter()
                                .map(|d| InvoiceItem {
                                    description: Some(d.to_string()),
                                })
                                .collect(),
                        ),
                    })
                    .collect(),
            ),
        }
    }

    fn activity(json: &str) -> Activity {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn full_record_is_extracted() {
        let record = CustomerRecord::from(activity(
            r#"{
                "person": {
                    "namefirst": "Dana",
                    "namelast": "Reyes",
                    "emailaddresses": [{"emailaddress": "dana@example.com"}, {"emailaddress": "old@example.com"}],
                    "phonenumbers": [{"phonenumber": "555-0101"}]
                },
                "invoice": {"groups": [{"items": [{"description": "1/4 Day Float 10:30 AM"}]}]}
            }"#,
        ));

        assert_eq!(record.name.first.as_deref(), Some("Dana"));
        assert_eq!(record.name.last.as_deref(), Some("Reyes"));
        assert_eq!(record.email.as_deref(), Some("dana@example.com"));
        assert_eq!(record.phone.as_deref(), Some("555-0101"));
        assert_eq!(record.trip_type.as_deref(), Some("1/4 Day"));
        assert_eq!(record.trip_time.as_deref(), Some("10:30 AM"));
    }

    #[test]
    fn missing_sub_fields_never_block_construction() {
        let record = CustomerRecord::from(activity(
            r#"{"person": {"namelast": "Okafor", "emailaddresses": [], "phonenumbers": [{}]}}"#,
        ));
        assert_eq!(
            record,
            CustomerRecord {
                name: CustomerName {
                    first: None,
                    last: Some("Okafor".into()),
                },
                ..Default::default()
            }
        );

        assert_eq!(CustomerRecord::from(activity("{}")), CustomerRecord::default());
    }

    #[test]
    fn last_matching_item_wins() {
        let (trip_type, trip_time) =
            extract_trip_details(&invoice(&[&["1/2 Day - Kayak 9:00AM"], &["1/2 Day 9:00AM"]]));

        assert_eq!(trip_type.as_deref(), Some("1/2 Day"));
        assert_eq!(trip_time.as_deref(), Some("9:00AM"));
    }

    #[test]
    fn fields_are_overwritten_independently() {
        let (trip_type, trip_time) = extract_trip_details(&invoice(&[&[
            "3/4-Day Canyon 8:15 AM",
            "Photos package",
            "Lunch add-on 12:00 PM",
        ]]));

        assert_eq!(trip_type.as_deref(), Some("3/4-Day"));
        assert_eq!(trip_time.as_deref(), Some("12:00 PM"));
    }

    #[test]
    fn alternation_order_decides_overlapping_names() {
        let (trip_type, _) = extract_trip_details(&invoice(&[&["1/2 Day - Kayak Tour"]]));
        assert_eq!(trip_type.as_deref(), Some("1/2 Day - Kayak"));

        let (trip_type, _) = extract_trip_details(&invoice(&[&["1/2Day-Premium"]]));
        assert_eq!(trip_type.as_deref(), Some("1/2Day-Premium"));
    }

    #[test]
    fn time_pattern_is_case_sensitive() {
        let (_, trip_time) = extract_trip_details(&invoice(&[&["starts 9:00 am"]]));
        assert!(trip_time.is_none());

        let (_, trip_time) = extract_trip_details(&invoice(&[&["starts 9:00 am", "or 1:45PM"]]));
        assert_eq!(trip_time.as_deref(), Some("1:45PM"));
    }

    #[test]
    fn empty_invoice_leaves_both_fields_absent() {
        assert_eq!(extract_trip_details(&Invoice::default()), (None, None));
        assert_eq!(extract_trip_details(&invoice(&[&[], &["no match here"]])), (None, None));
    }
}
