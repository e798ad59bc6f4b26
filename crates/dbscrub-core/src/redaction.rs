/// Redact the password and sensitive query parameters of a connection string.
pub fn redact_connection_string(conn: &str) -> String {
    let (base, query) = match conn.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (conn, None),
    };

    let mut redacted = redact_authority(base);

    if let Some(query) = query {
        let params: Vec<String> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
                _ => pair.to_string(),
            })
            .collect();
        redacted.push('?');
        redacted.push_str(&params.join("&"));
    }

    redacted
}

fn redact_authority(base: &str) -> String {
    let Some(scheme_end) = base.find("://") else {
        return base.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &base[authority_start..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    let Some(at_idx) = authority.rfind('@') else {
        return base.to_string();
    };
    let credentials = &authority[..at_idx];
    let Some((user, _password)) = credentials.split_once(':') else {
        return base.to_string();
    };

    format!(
        "{}{user}:***{}",
        &base[..authority_start],
        &base[authority_start + at_idx..]
    )
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "token" | "api_key" | "apikey"
    )
}
