const SEPARATORS: &[char] = &['/', '\\'];

/// Join a base URL and path segments with exactly one `/` at each join point.
///
/// Blank segments are skipped. Leading separators are stripped from every
/// segment, trailing ones from every segment but the last, so a trailing
/// slash on the final segment survives.
pub fn join_urls<I, S>(root: &str, segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let segments: Vec<S> = segments
        .into_iter()
        .filter(|s| !s.as_ref().trim().is_empty())
        .collect();
    let last = segments.len().saturating_sub(1);

    let mut url = root.trim_end_matches(SEPARATORS).to_string();
    for (i, segment) in segments.iter().enumerate() {
        let mut part = segment.as_ref().trim_start_matches(SEPARATORS);
        if i != last {
            part = part.trim_end_matches(SEPARATORS);
        }
        if part.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(part);
    }
    url
}
