//! JSON output formatting.

use serde::Serialize;
use std::io::{self, Write};

/// Write any result type as pretty-printed JSON.
pub fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut out, value).map_err(io::Error::other)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Port, Target, Targets};

    #[test]
    fn test_targets_as_json_array() {
        let targets: Targets = vec![Target::new("10.0.0.1", vec![Port::tcp(22)].into())].into();
        let mut buf = Vec::new();
        write_json(&mut buf, &targets).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["initial"], "10.0.0.1");
        assert_eq!(value[0]["status"], "unknown");
        assert!(value[0]["ip"].is_null());
    }
}
