//! Parser for `/proc/<pid>/stat`.
//!
//! The record is `pid (comm) state ppid ...`. `comm` is arbitrary bytes and
//! may itself contain spaces and parentheses, so it is taken as everything
//! between the first `(` and the last `)`. The remaining fields are
//! space-separated in a fixed kernel order.

use crate::error::{ProcfsError, Result};

/// Positions of the fields this crate consumes, 0-based, counted in the
/// field list that follows the closing `)` of the name.
///
/// `man 5 proc` numbers fields from 1 and includes pid and comm, so
/// subtract 3 from its numbering to get these offsets. The layout has
/// been stable since Linux 2.6; if a kernel ever shifts it, this table and
/// the fixture in the tests below are the single place to update.
pub mod field {
    pub const STATUS: usize = 0;
    pub const PPID: usize = 1;
    pub const TTY_NR: usize = 4;
    pub const UTIME: usize = 11;
    pub const STIME: usize = 12;
    pub const CUTIME: usize = 13;
    pub const CSTIME: usize = 14;
    pub const STARTTIME: usize = 19;
    pub const PROCESSOR: usize = 36;

    /// Minimum number of post-name fields the record must carry.
    pub const REQUIRED: usize = PROCESSOR + 1;
}

/// Structured view of one stat read. Values are raw: ticks stay ticks and
/// the name stays undecoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub name: Vec<u8>,
    pub status: u8,
    pub ppid: u32,
    pub tty_nr: i64,
    pub utime: u64,
    pub stime: u64,
    pub children_utime: u64,
    pub children_stime: u64,
    pub start_time: u64,
    pub cpu_num: i32,
}

impl StatRecord {
    /// Name decoded as UTF-8, replacing invalid sequences.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Parses the raw bytes of a stat record.
pub fn parse_stat(data: &[u8]) -> Result<StatRecord> {
    let lpar = data
        .iter()
        .position(|&b| b == b'(')
        .ok_or_else(|| ProcfsError::parse("stat record", "missing '('"))?;
    let rpar = data
        .iter()
        .rposition(|&b| b == b')')
        .ok_or_else(|| ProcfsError::parse("stat record", "missing ')'"))?;
    if rpar < lpar {
        return Err(ProcfsError::parse("stat record", "')' precedes '('"));
    }

    let name = data[lpar + 1..rpar].to_vec();
    let fields: Vec<&[u8]> = data[rpar + 1..]
        .split(|b| b.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() < field::REQUIRED {
        return Err(ProcfsError::parse(
            "stat record",
            format!(
                "expected at least {} fields after name, got {}",
                field::REQUIRED,
                fields.len()
            ),
        ));
    }

    let status = match fields[field::STATUS] {
        [c] => *c,
        other => {
            return Err(ProcfsError::parse(
                "stat record",
                format!("bad status field {:?}", String::from_utf8_lossy(other)),
            ))
        }
    };

    Ok(StatRecord {
        name,
        status,
        ppid: num(fields[field::PPID], "ppid")?,
        tty_nr: num(fields[field::TTY_NR], "tty_nr")?,
        utime: num(fields[field::UTIME], "utime")?,
        stime: num(fields[field::STIME], "stime")?,
        children_utime: num(fields[field::CUTIME], "cutime")?,
        children_stime: num(fields[field::CSTIME], "cstime")?,
        start_time: num(fields[field::STARTTIME], "starttime")?,
        cpu_num: num(fields[field::PROCESSOR], "processor")?,
    })
}

fn num<T: std::str::FromStr>(raw: &[u8], what: &str) -> Result<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ProcfsError::parse(
                "stat record",
                format!("bad {what} field {:?}", String::from_utf8_lossy(raw)),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a record whose post-name field N holds the value `100 + N`
    /// (status at position 0 is the letter).
    fn fixture(name: &str) -> Vec<u8> {
        let mut out = format!("1234 ({name}) S");
        for i in 1..=44 {
            out.push_str(&format!(" {}", 100 + i));
        }
        out.push('\n');
        out.into_bytes()
    }

    #[test]
    fn test_field_offsets() {
        let rec = parse_stat(&fixture("cat")).unwrap();
        assert_eq!(rec.status, b'S');
        assert_eq!(rec.ppid, 101);
        assert_eq!(rec.tty_nr, 104);
        assert_eq!(rec.utime, 111);
        assert_eq!(rec.stime, 112);
        assert_eq!(rec.children_utime, 113);
        assert_eq!(rec.children_stime, 114);
        assert_eq!(rec.start_time, 119);
        assert_eq!(rec.cpu_num, 136);
    }

    #[test]
    fn test_name_with_parentheses_and_spaces() {
        let rec = parse_stat(&fixture("my (weird) proc")).unwrap();
        assert_eq!(rec.name, b"my (weird) proc");
        assert_eq!(rec.ppid, 101);
    }

    #[test]
    fn test_name_with_trailing_paren() {
        let rec = parse_stat(&fixture("a) S 1 2 (")).unwrap();
        assert_eq!(rec.name_lossy(), "a) S 1 2 (");
        assert_eq!(rec.status, b'S');
    }

    #[test]
    fn test_parse_is_idempotent() {
        let data = fixture("kworker/0:1");
        assert_eq!(parse_stat(&data).unwrap(), parse_stat(&data).unwrap());
    }

    #[test]
    fn test_real_kernel_line() {
        let line = b"1234 (test_process) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 7 3 20 0 1 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        let rec = parse_stat(line).unwrap();
        assert_eq!(rec.name, b"test_process");
        assert_eq!(rec.ppid, 1);
        assert_eq!(rec.tty_nr, 0);
        assert_eq!(rec.utime, 1000);
        assert_eq!(rec.stime, 500);
        assert_eq!(rec.children_utime, 7);
        assert_eq!(rec.children_stime, 3);
        assert_eq!(rec.start_time, 12345);
        assert_eq!(rec.cpu_num, 3);
    }

    #[test]
    fn test_truncated_record() {
        let err = parse_stat(b"1234 (test) S 1 2 3").unwrap_err();
        assert!(matches!(err, ProcfsError::Parse { .. }));
    }

    #[test]
    fn test_missing_parentheses() {
        assert!(parse_stat(b"1234 test S 1").is_err());
        assert!(parse_stat(b"").is_err());
    }
}
