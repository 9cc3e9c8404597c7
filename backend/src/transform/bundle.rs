//! Kit decomposition for shipping-schedule lines.
//!
//! A kit line's long description names the kit's primary item and, after an
//! `", including "` clause, its components:
//!
//! ```text
//! description := primary_part [ ", including " component ( ", " component )* ]
//! primary_part := primary_code [ "," anything ]
//! component    := [ digit "x" ] name
//! ```
//!
//! Each kit line is replaced by one line per component followed by one line
//! for the primary code. Nothing here fails: text that does not fit the
//! grammar degrades to a single primary line.

use serde::Serialize;

use super::dsl::normalize_spaces;
use crate::models::ScheduleLine;

const INCLUDING: &str = ", including ";
const COMPONENT_SEPARATOR: &str = ", ";

/// Parsed kit description. Never stored; consumed by [`decompose`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleDescriptor {
    pub primary_code: ComponentToken,
    pub components: Vec<ComponentToken>,
}

/// One item named by a kit description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentToken {
    pub name: String,
    /// Leading `<digit>x` multiplier, when present.
    pub multiplier: Option<u32>,
}

impl ComponentToken {
    pub fn quantity_factor(&self) -> f64 {
        f64::from(self.multiplier.unwrap_or(1))
    }
}

impl BundleDescriptor {
    /// Tokens in emission order: components first, then the primary code.
    pub fn tokens(&self) -> impl Iterator<Item = &ComponentToken> {
        self.components.iter().chain(std::iter::once(&self.primary_code))
    }
}

/// Whether an item code follows the kit naming convention.
pub fn is_kit(item_code: &str, kit_prefix: &str) -> bool {
    !kit_prefix.is_empty() && item_code.starts_with(kit_prefix)
}

/// Parse a kit description. `fallback_code` is used when the text names no
/// primary item at all.
pub fn parse_description(description: &str, fallback_code: &str) -> BundleDescriptor {
    let text = normalize_spaces(description);

    let (primary_part, component_part) = match text.split_once(INCLUDING) {
        Some((primary, components)) => (primary, Some(components)),
        None => (text.as_str(), None),
    };

    let primary_raw = primary_part.split(',').next().unwrap_or("");
    let primary_code = match parse_token(primary_raw) {
        Some(token) => token,
        None => parse_token(fallback_code).unwrap_or(ComponentToken {
            name: fallback_code.to_string(),
            multiplier: None,
        }),
    };

    let components = component_part
        .map(|part| part.split(COMPONENT_SEPARATOR).filter_map(parse_token).collect())
        .unwrap_or_default();

    BundleDescriptor {
        primary_code,
        components,
    }
}

/// Parse one component token. Internal whitespace is removed; an empty
/// token yields `None`.
pub fn parse_token(raw: &str) -> Option<ComponentToken> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let mut chars = compact.chars();
    let first = chars.next();
    let second = chars.next();

    match (first.and_then(|c| c.to_digit(10)), second) {
        (Some(multiplier), Some('x')) => Some(ComponentToken {
            // digit and 'x' are one byte each
            name: compact[2..].to_string(),
            multiplier: Some(multiplier),
        }),
        _ => Some(ComponentToken {
            name: compact,
            multiplier: None,
        }),
    }
}

/// Replace every kit line by its decomposition. Non-kit lines pass unchanged.
pub fn decompose(lines: Vec<ScheduleLine>, kit_prefix: &str) -> Vec<ScheduleLine> {
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        if !is_kit(&line.line.item_code, kit_prefix) {
            out.push(line);
            continue;
        }

        let descriptor = parse_description(&line.description, &line.line.item_code);
        for token in descriptor.tokens() {
            let mut derived = line.clone();
            derived.line.item_code = token.name.clone();
            derived.line.qty_supply *= token.quantity_factor();
            out.push(derived);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalOrderLine;

    fn kit_line(model: &str, description: &str, qty: f64) -> ScheduleLine {
        ScheduleLine {
            line: CanonicalOrderLine {
                reference_number: "PO-1".into(),
                item_code: model.into(),
                qty_supply: qty,
                ..Default::default()
            },
            vendor_item_no: String::new(),
            description: description.into(),
        }
    }

    fn codes_and_qty(lines: &[ScheduleLine]) -> Vec<(String, f64)> {
        lines
            .iter()
            .map(|l| (l.line.item_code.clone(), l.line.qty_supply))
            .collect()
    }

    #[test]
    fn test_decompose_kit_with_multiplier() {
        let out = decompose(vec![kit_line("S-ABC", "ABC, including X, 2xY", 1.0)], "S");

        assert_eq!(
            codes_and_qty(&out),
            vec![
                ("X".to_string(), 1.0),
                ("Y".to_string(), 2.0),
                ("ABC".to_string(), 1.0),
            ]
        );
        assert!(out.iter().all(|l| l.line.reference_number == "PO-1"));
    }

    #[test]
    fn test_full_quantity_replicated_per_component() {
        let out = decompose(vec![kit_line("S-ABC", "ABC, including X, 3xY", 4.0)], "S");
        assert_eq!(codes_and_qty(&out)[0], ("X".to_string(), 4.0));
        assert_eq!(codes_and_qty(&out)[1], ("Y".to_string(), 12.0));
    }

    #[test]
    fn test_non_kit_passes_unchanged() {
        let line = kit_line("A100", "A100, including X", 5.0);
        let out = decompose(vec![line.clone()], "S");
        assert_eq!(out, vec![line]);
    }

    #[test]
    fn test_primary_before_first_comma() {
        let d = parse_description("ABC, blue, 220V", "S-ABC");
        assert_eq!(d.primary_code.name, "ABC");
        assert!(d.components.is_empty());
    }

    #[test]
    fn test_no_including_clause_still_emits_primary() {
        let out = decompose(vec![kit_line("S-ABC", "ABC", 2.0)], "S");
        assert_eq!(codes_and_qty(&out), vec![("ABC".to_string(), 2.0)]);
    }

    #[test]
    fn test_including_with_no_components() {
        let d = parse_description("ABC, including ", "S-ABC");
        assert_eq!(d.primary_code.name, "ABC");
        assert!(d.components.is_empty());
    }

    #[test]
    fn test_empty_tokens_skipped() {
        let d = parse_description("ABC, including X, , Y", "S-ABC");
        let names: Vec<_> = d.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y"]);
    }

    #[test]
    fn test_empty_description_uses_model() {
        let out = decompose(vec![kit_line("S-ABC", "", 1.0)], "S");
        assert_eq!(codes_and_qty(&out), vec![("S-ABC".to_string(), 1.0)]);
    }

    #[test]
    fn test_special_spaces_normalized() {
        let d = parse_description("ABC,\u{00A0}including\u{3000}X", "S-ABC");
        assert_eq!(d.components.len(), 1);
        assert_eq!(d.components[0].name, "X");
    }

    #[test]
    fn test_token_spaces_removed() {
        let token = parse_token(" 2 x Cable A ").unwrap();
        assert_eq!(token.name, "CableA");
        assert_eq!(token.multiplier, Some(2));
    }

    #[test]
    fn test_token_without_multiplier() {
        // 'x' must be the second character and the first a digit
        assert_eq!(parse_token("X2").unwrap().multiplier, None);
        assert_eq!(parse_token("ax5").unwrap().multiplier, None);
        assert_eq!(parse_token("12xY").unwrap().name, "12xY");
        assert_eq!(parse_token("2").unwrap().name, "2");
        assert_eq!(parse_token("   "), None);
    }

    #[test]
    fn test_is_kit() {
        assert!(is_kit("S50-KIT", "S"));
        assert!(!is_kit("A100", "S"));
        assert!(!is_kit("S50", ""));
    }
}
