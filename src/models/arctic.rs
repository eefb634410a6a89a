use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Response structs for the Arctic reservation API

#[derive(Serialize, Deserialize, Debug)]
pub struct ReservationList {
    #[serde(default)]
    pub entries: Vec<ReservationEntry>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReservationEntry {
    pub activityid: ActivityId,
}

/// Opaque activity key. The API sends it as a number or a string depending
/// on the endpoint, so both are accepted and kept as text.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ActivityId(pub String);

impl<'de> Deserialize<'de> for ActivityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => ActivityId(id.to_string()),
            RawId::Str(id) => ActivityId(id),
        })
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Activity {
    pub person: Option<Person>,
    pub invoice: Option<Invoice>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Person {
    pub namefirst: Option<String>,
    pub namelast: Option<String>,
    pub emailaddresses: Option<Vec<EmailAddress>>,
    pub phonenumbers: Option<Vec<PhoneNumber>>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct EmailAddress {
    pub emailaddress: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PhoneNumber {
    pub phonenumber: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Invoice {
    pub groups: Option<Vec<InvoiceGroup>>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InvoiceGroup {
    pub items: Option<Vec<InvoiceItem>>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InvoiceItem {
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_id_accepts_numbers_and_strings() {
        let list: ReservationList = serde_json::from_str(
            r#"{"entries": [{"activityid": 1042}, {"activityid": "A7"}], "total": 2}"#,
        )
        .unwrap();

        let ids: Vec<String> = list
            .entries
            .into_iter()
            .map(|entry| entry.activityid.to_string())
            .collect();
        assert_eq!(ids, vec!["1042", "A7"]);
    }

    #[test]
    fn missing_entries_is_an_empty_list() {
        let list: ReservationList = serde_json::from_str("{}").unwrap();
        assert!(list.entries.is_empty());
    }

    #[test]
    fn null_sub_fields_decode_as_absent() {
        let activity: Activity = serde_json::from_str(
            r#"{"person": {"namefirst": null, "namelast": "Reyes", "emailaddresses": []},
                "invoice": {"groups": [{"items": null}, {}]}}"#,
        )
        .unwrap();

        let person = activity.person.unwrap();
        assert!(person.namefirst.is_none());
        assert_eq!(person.namelast.as_deref(), Some("Reyes"));
        assert!(person.phonenumbers.is_none());
        assert_eq!(activity.invoice.unwrap().groups.unwrap().len(), 2);
    }
}
