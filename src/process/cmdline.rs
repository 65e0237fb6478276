//! Argument-vector splitting for `/proc/<pid>/cmdline`.

/// Splits raw cmdline bytes into arguments.
///
/// Arguments are NUL-separated and NUL-terminated. Processes that rewrite
/// their own title (setproctitle and friends) often use spaces instead, so
/// when the data does not end in NUL it is split on single spaces. Empty
/// data (zombies, kernel threads) yields no arguments.
pub fn parse_cmdline(data: &[u8]) -> Vec<String> {
    if data.is_empty() {
        return Vec::new();
    }

    let sep = if data.ends_with(b"\0") { b'\0' } else { b' ' };
    let body = data.strip_suffix(&[sep]).unwrap_or(data);

    let mut args: Vec<String> = body
        .split(|&b| b == sep)
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect();
    if args.last().is_some_and(|a| a.is_empty()) {
        args.pop();
    }
    args
}
