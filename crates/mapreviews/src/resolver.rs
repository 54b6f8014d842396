// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Target resolution: free text and Google Maps links → a navigable URL.
//!
//! Place links that carry an encoded `!1s<hex>:<hex>` block are rewritten to
//! the minimal `?cid=<decimal>` form, which reliably renders the layout with a
//! reviews tab. Other links pass through with share-link parameters removed.
//! Pure: no I/O.

use crate::error::ResolutionError;
use crate::types::{Coordinates, ResolvedPlace, TargetSpec};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const MAPS_BASE: &str = "https://www.google.com/maps";

/// Query parameters appended by share links that can switch Google to the
/// layout without a reviews tab.
const SHARE_PARAMS: &[&str] = &[
    "entry", "g_ep", "g_st", "shorturl", "skid", "coh", "ved", "authuser", "hl",
];

fn cid_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!1s([^:%!/?&#]+)(?::|%3[Aa])([^!/?&#]+)").expect("valid regex")
    })
}

fn data_coordinates() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex")
    })
}

fn viewport_coordinates() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("valid regex"))
}

/// Resolve a target into a [`ResolvedPlace`]. `language` becomes `hl=`.
pub fn resolve(target: &TargetSpec, language: &str) -> Result<ResolvedPlace, ResolutionError> {
    match target {
        TargetSpec::Url(raw) => resolve_url(raw, language),
        TargetSpec::Search(query) => resolve_search(query, language),
    }
}

fn resolve_url(raw: &str, language: &str) -> Result<ResolvedPlace, ResolutionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolutionError::EmptyInput);
    }

    let coordinates = extract_coordinates(raw);

    if let Some(caps) = cid_block().captures(raw) {
        decode_cid(&caps[1])?;
        let cid = decode_cid(&caps[2])?;
        return Ok(ResolvedPlace {
            canonical_url: canonical_url(cid, language),
            cid: Some(cid),
            feature_id: Some(format!("{}:{}", &caps[1], &caps[2])),
            coordinates,
            is_search: false,
        });
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| ResolutionError::InvalidUrl {
        input: raw.to_string(),
        reason: e.to_string(),
    })?;

    strip_share_params(&mut url);
    url.query_pairs_mut().append_pair("hl", language);

    let is_search = url.path().starts_with("/maps/search");
    Ok(ResolvedPlace {
        canonical_url: url.to_string(),
        cid: None,
        feature_id: None,
        coordinates,
        is_search,
    })
}

fn resolve_search(query: &str, language: &str) -> Result<ResolvedPlace, ResolutionError> {
    let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        return Err(ResolutionError::EmptyInput);
    }

    let mut url = Url::parse(MAPS_BASE).map_err(|e| ResolutionError::InvalidUrl {
        input: MAPS_BASE.to_string(),
        reason: e.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|_| ResolutionError::InvalidUrl {
            input: MAPS_BASE.to_string(),
            reason: "cannot be a base".to_string(),
        })?
        .push("search")
        .push(&query);
    url.query_pairs_mut().append_pair("hl", language);

    Ok(ResolvedPlace {
        canonical_url: url.to_string(),
        cid: None,
        feature_id: None,
        coordinates: None,
        is_search: true,
    })
}

/// Decode the hex half of a feature id (`0xc7555f7221569dd6`) into a CID.
pub fn decode_cid(token: &str) -> Result<u64, ResolutionError> {
    let err = || ResolutionError::CidParse {
        token: token.to_string(),
    };
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(err());
    }
    u64::from_str_radix(digits, 16).map_err(|_| err())
}

/// Inverse of [`decode_cid`].
pub fn encode_cid(cid: u64) -> String {
    format!("{cid:#x}")
}

pub fn canonical_url(cid: u64, language: &str) -> String {
    format!("{MAPS_BASE}?cid={cid}&hl={language}")
}

fn extract_coordinates(raw: &str) -> Option<Coordinates> {
    let caps = data_coordinates()
        .captures(raw)
        .or_else(|| viewport_coordinates().captures(raw))?;
    let lat = caps[1].parse().ok()?;
    let lng = caps[2].parse().ok()?;
    Some(Coordinates { lat, lng })
}

fn strip_share_params(url: &mut Url) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !SHARE_PARAMS.contains(&k.as_ref()) && !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut().extend_pairs(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACE: &str = "https://www.google.com/maps/place/X/@0,0,0z/data=!4m6!3m5!1s0x60188b07360bc5cd:0xc7555f7221569dd6!8m2!3d35.64!4d139.74";

    #[test]
    fn test_place_url_to_cid() {
        let place = resolve(&TargetSpec::Url(PLACE.into()), "ja").unwrap();
        assert_eq!(
            place.canonical_url,
            "https://www.google.com/maps?cid=14363491530358300118&hl=ja"
        );
        assert_eq!(place.cid, Some(14363491530358300118));
        assert_eq!(
            place.feature_id.as_deref(),
            Some("0x60188b07360bc5cd:0xc7555f7221569dd6")
        );
        assert_eq!(
            place.coordinates,
            Some(Coordinates {
                lat: 35.64,
                lng: 139.74
            })
        );
        assert!(!place.is_search);
    }

    #[test]
    fn test_percent_encoded_colon() {
        let url = PLACE.replace(':', "%3A").replacen("https%3A", "https:", 1);
        let place = resolve(&TargetSpec::Url(url), "ja").unwrap();
        assert_eq!(place.cid, Some(14363491530358300118));
        assert_eq!(
            place.feature_id.as_deref(),
            Some("0x60188b07360bc5cd:0xc7555f7221569dd6")
        );

        let lower = "https://www.google.com/maps/place/X/data=!1s0x1%3a0xff!8m2";
        let place = resolve(&TargetSpec::Url(lower.into()), "ja").unwrap();
        assert_eq!(place.cid, Some(255));
    }

    #[test]
    fn test_cid_round_trip() {
        for cid in [0u64, 1, 255, 0x60188b07360bc5cd, 14363491530358300118, u64::MAX] {
            let hex = encode_cid(cid);
            assert_eq!(decode_cid(&hex).unwrap(), cid);
            let a = canonical_url(decode_cid(&hex).unwrap(), "ja");
            let b = canonical_url(cid, "ja");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_malformed_hex_is_cid_parse() {
        let url = "https://www.google.com/maps/place/X/data=!1s0x1234:0xZZZZ!8m2";
        let err = resolve(&TargetSpec::Url(url.into()), "ja").unwrap_err();
        assert_eq!(err.reason(), "cid-parse");

        let url = "https://www.google.com/maps/place/X/data=!1sxyz:0x12!8m2";
        let err = resolve(&TargetSpec::Url(url.into()), "ja").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::CidParse {
                token: "xyz".to_string()
            }
        );

        assert!(decode_cid("0x").is_err());
        // 17 hex digits overflow u64
        assert!(decode_cid("0x1ffffffffffffffff").is_err());
    }

    #[test]
    fn test_empty_input() {
        for input in ["", "   ", "\t\n"] {
            assert_eq!(
                resolve(&TargetSpec::Url(input.into()), "ja"),
                Err(ResolutionError::EmptyInput)
            );
            assert_eq!(
                resolve(&TargetSpec::Search(input.into()), "ja"),
                Err(ResolutionError::EmptyInput)
            );
        }
    }

    #[test]
    fn test_share_params_stripped() {
        let url = "https://www.google.com/maps/place/Cafe/@35.6,139.7,17z?entry=ttu&g_ep=abc&utm_source=x&q=keep&hl=en";
        let place = resolve(&TargetSpec::Url(url.into()), "ja").unwrap();
        assert_eq!(
            place.canonical_url,
            "https://www.google.com/maps/place/Cafe/@35.6,139.7,17z?q=keep&hl=ja"
        );
        assert_eq!(place.cid, None);
        assert_eq!(
            place.coordinates,
            Some(Coordinates {
                lat: 35.6,
                lng: 139.7
            })
        );
    }

    #[test]
    fn test_short_link_passes_through() {
        let place = resolve(&TargetSpec::Url("https://maps.app.goo.gl/AbCd".into()), "ja").unwrap();
        assert_eq!(place.canonical_url, "https://maps.app.goo.gl/AbCd?hl=ja");
        assert!(!place.is_search);
    }

    #[test]
    fn test_schemeless_link() {
        let place = resolve(&TargetSpec::Url("maps.app.goo.gl/AbCd".into()), "ja").unwrap();
        assert_eq!(place.canonical_url, "https://maps.app.goo.gl/AbCd?hl=ja");
    }

    #[test]
    fn test_search_query() {
        let place = resolve(&TargetSpec::Search("  Blue  Bottle 清澄白河 ".into()), "ja").unwrap();
        assert!(place.is_search);
        assert_eq!(
            place.canonical_url,
            "https://www.google.com/maps/search/Blue%20Bottle%20%E6%B8%85%E6%BE%84%E7%99%BD%E6%B2%B3?hl=ja"
        );
    }

    #[test]
    fn test_search_url_flagged() {
        let url = "https://www.google.com/maps/search/ramen";
        let place = resolve(&TargetSpec::Url(url.into()), "ja").unwrap();
        assert!(place.is_search);
    }

    #[test]
    fn test_invalid_url() {
        let err = resolve(&TargetSpec::Url("https://".into()), "ja").unwrap_err();
        assert_eq!(err.reason(), "invalid-url");
    }
}
