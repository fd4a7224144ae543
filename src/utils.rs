use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rocket::http::{RawStr, Status};
use rocket::request::Request;
use rocket::response::{Responder, Response};
use rocket::serde::json::Json;
use serde::Serializer;
use serde_json::Value;

pub fn try_respond<'r, 'o: 'r>(
    req: &'r Request<'_>,
    json: &Value,
    status: Status,
) -> Result<Response<'o>, Status> {
    Json(json.clone())
        .respond_to(req)
        .and_then(|resp| Response::build_from(resp).status(status).ok())
}

pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = Utc
        .from_utc_datetime(date)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

/// Where anonymous visitors of a protected page are sent.
pub fn login_url(next: &str) -> String {
    format!("/auth/login/?next={}", RawStr::new(next).percent_encode())
}

pub fn media_url(path: &str) -> String {
    format!("/media/{}", path)
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", username)
}

pub fn post_url(username: &str, post_id: i32) -> String {
    format!("/{}/{}/", username, post_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_keeps_the_requested_path() {
        let url = login_url("/new/");
        assert!(url.starts_with("/auth/login/?next="));
        assert!(url.contains("new"));
    }

    #[test]
    fn dates_are_rendered_as_utc_rfc3339() {
        #[derive(serde::Serialize)]
        struct Stamp {
            #[serde(serialize_with = "serialize_date")]
            at: NaiveDateTime,
        }

        let at = chrono::NaiveDate::from_ymd_opt(2020, 5, 17)
            .and_then(|d| d.and_hms_milli_opt(10, 30, 0, 250))
            .unwrap();
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        assert_eq!(json, r#"{"at":"2020-05-17T10:30:00.250Z"}"#);
    }
}
