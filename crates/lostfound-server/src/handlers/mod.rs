//! Route handlers.
//!
//! Reads go through [`lostfound_cache::Cache::get_or_compute`] under the key
//! families below; writes hit the document store first and then run the
//! invalidation cascade for their `(entity, mutation)`.
//!
//! | key family | contents |
//! |---|---|
//! | `items:list:…` | filtered item pages |
//! | `item:{id}` | item detail |
//! | `item:{id}:claims:…` | claims on an item |
//! | `claims:list:…`, `claim:{id}` | claims |
//! | `reports:list:…`, `report:{id}` | reports |
//! | `feedback:list:…`, `feedback:{id}` | feedback |
//! | `users:list:…`, `user:{id}` | users |
//! | `user:{id}:claims:…`, `user:{id}:items:…` | per-user views |

pub mod claims;
pub mod feedback;
pub mod items;
pub mod reports;
pub mod system;
pub mod users;

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::storage::{DEFAULT_PAGE_LIMIT, Page};

/// JSON body extractor whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Query-string extractor whose rejections use the API error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn resolve(&self) -> ApiResult<Page> {
        Page::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
        .map_err(ApiError::bad_request)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}

pub(crate) fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid id '{raw}'")))
}

pub(crate) fn validated(result: Result<(), String>) -> ApiResult<()> {
    result.map_err(ApiError::bad_request)
}

/// Build a cache key from a family prefix and the query parts that shape the
/// payload.
///
/// A present filter renders as `name=value` and an absent one as `name~`, so
/// no value can stand in for "unfiltered". Values are percent-escaped for
/// `%`, the key separators, glob metacharacters and control characters.
pub(crate) fn view_key(prefix: &str, filters: &[(&str, Option<&str>)], page: Page) -> String {
    let mut key = String::from(prefix);
    for (name, value) in filters {
        key.push(':');
        key.push_str(name);
        match value {
            Some(value) => {
                key.push('=');
                push_escaped(&mut key, value);
            }
            None => key.push('~'),
        }
    }
    key.push_str(&format!(":page={}:limit={}", page.page, page.limit));
    key
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        let reserved = matches!(
            c,
            '%' | ':' | '=' | '~' | '|' | '*' | '?' | '[' | ']' | '\\'
        );
        if reserved || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_keys_are_stable() {
        let page = Page::new(2, 10).unwrap();
        assert_eq!(
            view_key("items:list", &[("status", Some("lost")), ("category", None)], page),
            "items:list:status=lost:category~:page=2:limit=10"
        );
        assert_eq!(
            view_key("user:abc:claims", &[], Page::default()),
            "user:abc:claims:page=1:limit=20"
        );
    }

    #[test]
    fn view_keys_distinguish_absent_from_any_value() {
        let page = Page::default();
        let unfiltered = view_key("items:list", &[("status", None), ("category", None)], page);
        for value in ["-", "~", "", "%7E"] {
            let filtered = view_key(
                "items:list",
                &[("status", None), ("category", Some(value))],
                page,
            );
            assert_ne!(filtered, unfiltered, "value {value:?}");
        }
    }

    #[test]
    fn view_key_values_cannot_forge_other_filters() {
        let page = Page::default();
        let forged = view_key(
            "items:list",
            &[("status", Some("lost:category=keys")), ("category", None)],
            page,
        );
        let real = view_key(
            "items:list",
            &[("status", Some("lost")), ("category", Some("keys"))],
            page,
        );
        assert_ne!(forged, real);
        assert_eq!(
            forged,
            "items:list:status=lost%3Acategory%3Dkeys:category~:page=1:limit=20"
        );
    }

    #[test]
    fn view_key_escapes_globs_and_control_characters() {
        let key = view_key("items:list", &[("category", Some("a*\nb%"))], Page::default());
        assert_eq!(key, "items:list:category=a%2A%0Ab%25:page=1:limit=20");
        assert!(!key.contains('*'));
        assert!(!key.contains('\n'));
    }

    #[test]
    fn page_params_defaults_and_bounds() {
        assert_eq!(PageParams::default().resolve().unwrap(), Page::default());
        let bad = PageParams {
            page: Some(0),
            limit: None,
        };
        assert!(bad.resolve().is_err());
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
