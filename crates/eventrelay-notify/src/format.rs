//! Display helpers for `snake_case` keys.

/// `"blacksmith_apprentice"` → `"Blacksmith Apprentice"`.
pub fn title_case(key: &str) -> String {
    key.split('_').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// Progression node keys drop their `feature_` / `upgrade_` prefix:
/// `"feature_gamble_mode"` → `"Gamble Mode"`.
pub fn node_name(key: &str) -> String {
    let parts: Vec<&str> = key.split('_').collect();
    let parts = match parts.as_slice() {
        [first, rest @ ..] if !rest.is_empty() && (*first == "feature" || *first == "upgrade") => rest,
        all => all,
    };
    parts.iter().map(|p| capitalize(p)).collect::<Vec<_>>().join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_cases_keys() {
        assert_eq!(title_case("miner"), "Miner");
        assert_eq!(title_case("blacksmith_apprentice"), "Blacksmith Apprentice");
        assert_eq!(title_case("LOUD_key"), "Loud Key");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn node_names_drop_prefix() {
        assert_eq!(node_name("feature_gamble_mode"), "Gamble Mode");
        assert_eq!(node_name("upgrade_luck"), "Luck");
        assert_eq!(node_name("feature"), "Feature");
        assert_eq!(node_name("item_shop"), "Item Shop");
    }
}
