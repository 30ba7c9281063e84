use std::io::{self, Read};

/// Raw text piped on stdin. `None` for an interactive terminal or blank input,
/// so commands can report that no input was given.
pub fn read_piped() -> io::Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let text = buffer.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
