use std::fmt;

use serde::{
    de::{IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

pub const EVENTS_ROUTE: &str = "/api/events";
pub const HEALTHZ_ROUTE: &str = "/healthz";

/// Date layout accepted for new events.
pub const EVENT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Body of `POST /api/events` as the backend reads it.
///
/// Field names match case-insensitively and a repeated field keeps its last
/// value. Missing or `null` fields read as empty strings, so validation can
/// report which one is absent. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewEventRequest {
    pub title: String,
    pub date: String,
    pub location: String,
    pub description: String,
}

impl NewEventRequest {
    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        if key.eq_ignore_ascii_case("title") {
            Some(&mut self.title)
        } else if key.eq_ignore_ascii_case("date") {
            Some(&mut self.date)
        } else if key.eq_ignore_ascii_case("location") {
            Some(&mut self.location)
        } else if key.eq_ignore_ascii_case("description") {
            Some(&mut self.description)
        } else {
            None
        }
    }
}

impl<'de> Deserialize<'de> for NewEventRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RequestVisitor;

        impl<'de> Visitor<'de> for RequestVisitor {
            type Value = NewEventRequest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an event object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut request = NewEventRequest::default();
                while let Some(key) = map.next_key::<String>()? {
                    match request.field_mut(&key) {
                        Some(slot) => {
                            if let Some(value) = map.next_value::<Option<String>>()? {
                                *slot = value;
                            }
                        }
                        None => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(request)
            }
        }

        deserializer.deserialize_map(RequestVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_ignore_case() {
        let request: NewEventRequest = serde_json::from_str(
            r#"{"TITLE":"x","Location":"y","dAtE":"2030-01-01","seats":300}"#,
        )
        .expect("request");
        assert_eq!(request.title, "x");
        assert_eq!(request.location, "y");
        assert_eq!(request.date, "2030-01-01");
        assert_eq!(request.description, "");
    }

    #[test]
    fn repeated_field_keeps_last_value() {
        let request: NewEventRequest =
            serde_json::from_str(r#"{"title":"first","Title":"second","date":null}"#)
                .expect("request");
        assert_eq!(request.title, "second");
        assert_eq!(request.date, "");
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(serde_json::from_str::<NewEventRequest>("[]").is_err());
        assert!(serde_json::from_str::<NewEventRequest>(r#"{"title":7}"#).is_err());
    }
}
