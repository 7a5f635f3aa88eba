/// Picks the response language from an `Accept-Language` header.
///
/// Entries are ranked by their `q` weight (ties keep header order) and
/// compared by primary subtag, so `pt-BR` selects a supported `pt`. Falls
/// back to the first supported language, or `en` when none are configured.
pub fn negotiate_lang(accept_language: Option<&str>, supported: &[String]) -> String {
    let fallback = supported
        .first()
        .cloned()
        .unwrap_or_else(|| "en".to_string());

    let Some(header) = accept_language else {
        return fallback;
    };

    let mut ranked: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let weight = parts
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            let primary = tag.split('-').next().unwrap_or(tag).to_ascii_lowercase();
            Some((primary, weight))
        })
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    // Stable sort keeps header order among equal weights.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .into_iter()
        .find_map(|(primary, _)| {
            supported
                .iter()
                .find(|lang| lang.eq_ignore_ascii_case(&primary))
                .cloned()
        })
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_header_uses_first_supported() {
        assert_eq!(negotiate_lang(None, &langs(&["pt", "en"])), "pt");
    }

    #[test]
    fn test_primary_subtag_matches() {
        assert_eq!(negotiate_lang(Some("pt-BR,en;q=0.8"), &langs(&["en", "pt"])), "pt");
    }

    #[test]
    fn test_weights_are_respected() {
        assert_eq!(
            negotiate_lang(Some("fr;q=0.3, en;q=0.9, pt;q=0.5"), &langs(&["pt", "en"])),
            "en"
        );
    }

    #[test]
    fn test_unsupported_falls_back() {
        assert_eq!(negotiate_lang(Some("de, fr"), &langs(&["en"])), "en");
        assert_eq!(negotiate_lang(Some("de"), &[]), "en");
    }

    #[test]
    fn test_zero_weight_is_ignored() {
        assert_eq!(negotiate_lang(Some("pt;q=0, en"), &langs(&["pt", "en"])), "en");
    }
}
