//! `srcset` / `imagesrcset` candidate lists.

/// Rewrite the URL of every image candidate, keeping its descriptor.
///
/// Candidates are split the way browsers do: the URL runs up to the next
/// whitespace (so commas inside `data:` URLs survive), and a URL ending in
/// a comma has no descriptor.
pub fn rewrite_srcset<F>(value: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut candidates = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
        let (mut url, mut tail) = rest.split_at(url_end);
        let mut descriptor = "";

        if url.ends_with(',') {
            url = url.trim_end_matches(',');
        } else {
            let descriptor_end = tail.find(',').unwrap_or(tail.len());
            descriptor = tail[..descriptor_end].trim();
            tail = &tail[descriptor_end..];
        }
        rest = tail;

        let url = rewrite(url).unwrap_or_else(|| url.to_string());
        if descriptor.is_empty() {
            candidates.push(url);
        } else {
            candidates.push(format!("{} {}", url, descriptor));
        }
    }

    candidates.join(", ")
}
