#![no_main]

use libfuzzer_sys::fuzz_target;
use lineagelens_core::{ColumnLineageExtractor, Dialect, SqlAnalyzer};

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let _ = SqlAnalyzer::new(Dialect::Exasol).analyze(sql);
        let _ = ColumnLineageExtractor::new(Dialect::Exasol).extract(sql, "FUZZ.TARGET", None);
    }
});
