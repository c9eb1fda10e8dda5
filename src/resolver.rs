//! Builds the login payload from the extracted form and the profile
//!
//! Precedence, lowest to highest:
//!
//! - hidden fields found in the form
//! - `default_form_fields`, for keys the form lacks. A default replaces a
//!   form value only for keys listed in `query_fields_from_portal_url`, or
//!   for every key when `default_fields_override` is set.
//! - query parameters named in `query_fields_from_portal_url`, read from the
//!   page URL, or from the located portal URL when a later redirect dropped them

use crate::config::PortalProfile;
use crate::models::{ExtractedForm, SubmissionPayload};
use url::Url;

pub fn resolve(
    form: &ExtractedForm,
    profile: &PortalProfile,
    page_url: &Url,
    portal_url: &Url,
) -> SubmissionPayload {
    let forwarded = &profile.query_fields_from_portal_url;
    let mut payload = form.fields.clone();

    for (key, value) in &profile.default_form_fields {
        if profile.default_fields_override
            || forwarded.contains(key)
            || !payload.contains_key(key)
        {
            payload.insert(key.clone(), value.clone());
        }
    }

    for name in forwarded {
        let value = query_value(page_url, name).or_else(|| query_value(portal_url, name));
        if let Some(value) = value {
            payload.insert(name.clone(), value);
        }
    }

    payload
}

/// First occurrence of `name` in the query, percent-decoded
fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
