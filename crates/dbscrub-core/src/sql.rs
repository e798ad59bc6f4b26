/// Maximum identifier length accepted by Postgres (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Truncate a generated identifier so the server stores it verbatim.
///
/// Postgres silently truncates longer names, which would make a recorded
/// undo statement reference an object that does not exist.
pub fn truncate_identifier(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name.to_string();
    }

    let mut end = MAX_IDENTIFIER_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}
