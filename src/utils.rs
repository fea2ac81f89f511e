// utils.rs - Small formatting helpers

/// Make a user supplied name safe to use as a file or folder name
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        _ => cleaned,
    }
}

/// Shorten a prompt for one-line display
pub fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt.to_string();
    }
    let head: String = prompt.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", head.trim_end())
}
