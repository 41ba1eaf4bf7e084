//! Name-or-number selection of offerings and observed properties.
//!
//! A selector made only of ASCII digits is a 1-based position; anything
//! else must equal a name exactly. Misses are reported as `None`.

use crate::model::Offering;

fn position(selector: &str) -> Option<Option<usize>> {
    if selector.is_empty() || !selector.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // `0` and overflowing numbers select nothing.
    Some(selector.parse::<usize>().ok().and_then(|n| n.checked_sub(1)))
}

pub fn resolve_offering<'a>(selector: &str, offerings: &'a [Offering]) -> Option<&'a Offering> {
    match position(selector) {
        Some(index) => index.and_then(|i| offerings.get(i)),
        None => offerings.iter().find(|o| o.name == selector),
    }
}

pub fn resolve_property<'a>(selector: &str, offering: &'a Offering) -> Option<&'a str> {
    let found = match position(selector) {
        Some(index) => index.and_then(|i| offering.properties.get(i)),
        None => offering.properties.iter().find(|p| *p == selector),
    };
    found.map(String::as_str)
}
