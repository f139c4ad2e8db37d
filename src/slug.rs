/// Maximum insert attempts when the unique slug index rejects a candidate.
pub const MAX_SLUG_ATTEMPTS: u64 = 5;

/// Lowercases the title, keeps ASCII letters and digits, and collapses every
/// other run of characters into a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// `base` for suffix 0, otherwise `base-<suffix>`.
pub fn candidate(base: &str, suffix: u64) -> String {
    if suffix == 0 {
        base.to_string()
    } else {
        format!("{base}-{suffix}")
    }
}

/// Whether `slug` is one of the candidates [`candidate`] produces for `base`.
pub fn is_candidate_of(slug: &str, base: &str) -> bool {
    match slug.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest.strip_prefix('-').is_some_and(|n| {
            !n.is_empty() && !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit())
        }),
        None => false,
    }
}
