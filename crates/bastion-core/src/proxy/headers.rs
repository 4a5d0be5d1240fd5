use std::collections::{BTreeMap, HashSet};

/// Lower-cased header allow-list.
pub fn allow_list(names: &[String]) -> HashSet<String> {
    names.iter().map(|n| n.trim().to_ascii_lowercase()).collect()
}

/// Keep only allow-listed headers. Names are lower-cased on the way out.
pub fn sanitize(
    headers: &BTreeMap<String, String>,
    allowed: &HashSet<String>,
) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.to_ascii_lowercase();
            allowed.contains(&name).then(|| (name, value.clone()))
        })
        .collect()
}
