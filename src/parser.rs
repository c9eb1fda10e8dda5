//! Login form discovery in portal HTML
//!
//! Portal markup is untrusted and often malformed, so the page goes through
//! html5ever (via `scraper`) which never rejects input. The form is chosen by
//! the profile's heuristics, in order:
//!
//! 1. `form_id`: exact `id` match, no fallback when absent
//! 2. `form_action_contains`: case-insensitive substring of `action`
//! 3. `button_text_contains`: case-insensitive substring of a submit control's label

use crate::config::{non_empty, PortalProfile};
use crate::models::{ExtractedForm, FailureReason, FormMethod};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use url::Url;

/// Find the login form in `html` and extract its action, method and fields
pub fn extract_form(
    html: &str,
    page_url: &Url,
    profile: &PortalProfile,
) -> Result<ExtractedForm, FailureReason> {
    let document = Html::parse_document(html);
    let forms: Vec<ElementRef> = elements(document.root_element())
        .filter(|el| el.value().name() == "form")
        .collect();

    tracing::debug!("Portal page has {} form(s)", forms.len());

    let form = select_form(&forms, profile).ok_or(FailureReason::FormNotFound)?;
    let base = document_base(&document, page_url);
    let action = resolve_action(form.value().attr("action"), &base, page_url)?;

    Ok(ExtractedForm {
        action,
        method: FormMethod::from_attr(form.value().attr("method")),
        fields: collect_fields(form),
    })
}

fn elements(root: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    root.descendants().filter_map(ElementRef::wrap)
}

fn select_form<'a>(forms: &[ElementRef<'a>], profile: &PortalProfile) -> Option<ElementRef<'a>> {
    if let Some(id) = non_empty(&profile.form_id) {
        let found = forms.iter().find(|f| f.value().attr("id") == Some(id)).copied();
        if found.is_none() {
            tracing::debug!("No form with id '{}'", id);
        }
        return found;
    }

    let candidates: Vec<ElementRef<'a>> = match non_empty(&profile.form_action_contains) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            forms
                .iter()
                .filter(|f| {
                    f.value()
                        .attr("action")
                        .map(|a| a.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
                .copied()
                .collect()
        }
        None => forms.to_vec(),
    };

    if let [only] = candidates.as_slice() {
        return Some(*only);
    }

    let label = non_empty(&profile.button_text_contains)?;
    let label = normalize(label);
    let pool = if candidates.is_empty() { forms } else { &candidates[..] };

    pool.iter()
        .find(|form| submit_labels(**form).any(|text| normalize(&text).contains(&label)))
        .copied()
}

/// Lowercase and collapse runs of whitespace
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Visible labels of the form's submit controls, in document order
fn submit_labels(form: ElementRef<'_>) -> impl Iterator<Item = String> + '_ {
    elements(form).filter_map(|el| {
        let attrs = el.value();
        let kind = attrs.attr("type").unwrap_or("").trim().to_ascii_lowercase();
        match attrs.name() {
            "button" if kind.is_empty() || kind == "submit" => {
                let text: String = el.text().collect();
                Some(format!("{} {}", text, attrs.attr("value").unwrap_or("")))
            }
            "input" if kind == "submit" || kind == "button" => {
                Some(attrs.attr("value").unwrap_or("").to_string())
            }
            "input" if kind == "image" => Some(attrs.attr("alt").unwrap_or("").to_string()),
            _ => None,
        }
    })
}

/// Base for relative URLs: a `<base href>` if present, else the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    elements(document.root_element())
        .find(|el| el.value().name() == "base")
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve_action(action: Option<&str>, base: &Url, page_url: &Url) -> Result<Url, FailureReason> {
    let action = action.unwrap_or("").trim().trim_end_matches('?');
    if action.is_empty() {
        return Ok(page_url.clone());
    }
    base.join(action).map_err(|e| {
        tracing::warn!("Cannot resolve form action '{}': {}", action, e);
        FailureReason::FormNotFound
    })
}

fn collect_fields(form: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();

    for el in elements(form) {
        let attrs = el.value();
        let name = match attrs.attr("name").map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        match attrs.name() {
            "input" => {
                let kind = attrs.attr("type").unwrap_or("text").trim().to_ascii_lowercase();
                let value = attrs.attr("value").unwrap_or("").to_string();
                match kind.as_str() {
                    "submit" => {}
                    // the checked member of a group wins, else the first one
                    "checkbox" | "radio" if attrs.attr("checked").is_none() => {
                        fields.entry(name).or_insert(value);
                    }
                    _ => {
                        fields.insert(name, value);
                    }
                }
            }
            "select" => {
                let options: Vec<ElementRef> = elements(el)
                    .filter(|o| o.value().name() == "option")
                    .collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                let value = chosen
                    .map(|o| match o.value().attr("value") {
                        Some(v) => v.to_string(),
                        None => o.text().collect::<String>().trim().to_string(),
                    })
                    .unwrap_or_default();
                fields.insert(name, value);
            }
            "textarea" => {
                fields.insert(name, el.text().collect());
            }
            _ => {}
        }
    }

    fields
}
