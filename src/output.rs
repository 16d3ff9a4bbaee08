//! # Result table persistence and scan summary
//!
//! The scan writes one binary little-endian table, one row per window in
//! scan order, with the fixed column schema of
//! [`EventRecord::COLUMNS`](crate::event::EventRecord::COLUMNS). The file
//! name encodes the prefix, scan start, scan span, and the duration bounds,
//! so concurrent runs over different intervals never collide; an existing
//! file of the same name makes the run refuse to start (checked before any
//! computation).
//!
//! Layout: an 8-byte magic, a format version, the column and row counts,
//! then row-major `f64` values.

use std::fs::File;
use std::io::{BufWriter, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use camino::{Utf8Path, Utf8PathBuf};

use crate::constants::SUMMARY_LLR_THRESHOLD;
use crate::event::EventRecord;
use crate::params::ScanParams;
use crate::scan_errors::ScanError;
use crate::scan::ScanSummary;

/// Magic bytes opening every table file.
pub const TABLE_MAGIC: &[u8; 8] = b"BSEVTTAB";

/// Format version written after the magic.
pub const TABLE_VERSION: u32 = 1;

/// File name encoding prefix, start, span, and the duration bounds
/// (durations in milliseconds to keep the name dot-free).
pub fn output_file_name(params: &ScanParams) -> String {
    format!(
        "{}_{:.0}_{:.0}s_{}ms_{}ms.evt",
        params.prefix,
        params.start,
        params.span(),
        (params.min_duration * 1000.0).round() as u64,
        (params.max_duration * 1000.0).round() as u64,
    )
}

/// Refuse to overwrite an existing output file.
///
/// Runs before any computation; an existing file is a configuration error,
/// not a condition to silently clobber.
pub fn preflight(path: &Utf8Path) -> Result<(), ScanError> {
    if path.exists() {
        return Err(ScanError::OutputFileExists(path.to_string()));
    }
    Ok(())
}

/// Write the event table.
pub fn write_table(path: &Utf8Path, records: &[EventRecord]) -> Result<(), ScanError> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(TABLE_MAGIC)?;
    out.write_u32::<LittleEndian>(TABLE_VERSION)?;
    out.write_u32::<LittleEndian>(EventRecord::COLUMNS.len() as u32)?;
    out.write_u64::<LittleEndian>(records.len() as u64)?;
    for record in records {
        for value in record.to_row() {
            out.write_f64::<LittleEndian>(value)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Print the human-readable end-of-scan summary, plus the thresholded
/// high-significance subset for fast inspection.
pub fn print_summary(summary: &ScanSummary, records: &[EventRecord]) {
    println!("windows scanned      : {}", summary.windows);
    println!("elapsed              : {:.2} s", summary.elapsed.as_secs_f64());
    println!("in good time         : {}", summary.in_good_time);
    println!("with valid response  : {}", summary.valid_response);
    println!("analyzed             : {}", summary.analyzed);

    let mut interesting: Vec<&EventRecord> = records
        .iter()
        .filter(|r| r.analyzable && r.marginal_log_like > SUMMARY_LLR_THRESHOLD)
        .collect();
    interesting.sort_by(|a, b| b.marginal_log_like.total_cmp(&a.marginal_log_like));
    if !interesting.is_empty() {
        println!("high-significance events:");
        for r in interesting {
            println!(
                "  t={:.3} dur={:.3} llr={:.2} ra={:.2} dec={:.2} snr={:.2} spec={}",
                r.center_time,
                r.duration,
                r.marginal_log_like,
                r.best_ra_deg,
                r.best_dec_deg,
                r.optimal_snr,
                r.best_spectrum,
            );
        }
    }
}

#[cfg(test)]
mod output_test {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Read;

    fn params() -> ScanParams {
        ScanParams::builder()
            .start(1000.0)
            .end(1100.0)
            .min_duration(0.512)
            .max_duration(4.096)
            .prefix("followup")
            .build()
            .unwrap()
    }

    #[test]
    fn file_name_encodes_the_scan_shape() {
        assert_eq!(
            output_file_name(&params()),
            "followup_1000_100s_512ms_4096ms.evt"
        );
    }

    #[test]
    fn preflight_refuses_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("x.evt")).unwrap();
        assert!(preflight(&path).is_ok());
        std::fs::write(&path, b"occupied").unwrap();
        assert!(matches!(
            preflight(&path),
            Err(ScanError::OutputFileExists(_))
        ));
    }

    #[test]
    fn table_round_trips_through_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("t.evt")).unwrap();
        let records = vec![
            EventRecord::degraded(10.0, 0.512, true, true),
            EventRecord::degraded(11.0, 1.024, false, false),
        ];
        write_table(&path, &records).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, TABLE_MAGIC);
        assert_eq!(file.read_u32::<LittleEndian>().unwrap(), TABLE_VERSION);
        let ncols = file.read_u32::<LittleEndian>().unwrap() as usize;
        assert_eq!(ncols, EventRecord::COLUMNS.len());
        assert_eq!(file.read_u64::<LittleEndian>().unwrap(), 2);
        let mut values = Vec::new();
        while let Ok(v) = file.read_f64::<LittleEndian>() {
            values.push(v);
        }
        assert_eq!(values.len(), 2 * ncols);
        assert_eq!(values[0], 10.0);
        assert_eq!(values[ncols], 11.0);
    }
}
