//! DBC file parser
//!
//! Parses Vector DBC files with `can-dbc` and extracts the layout of the
//! signals the gauge interface should display.

use crate::control::SignalDef;
use crate::types::{CalError, Result, EXT_MASK};
use std::path::Path;

/// DBC files mark extended message IDs by setting bit 31
const DBC_EXTENDED_FLAG: u32 = 1 << 31;

/// Parse a DBC file
pub fn parse_dbc_file(path: &Path) -> Result<can_dbc::DBC> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        CalError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Latin-1/Windows-1252 files are common; map bytes to chars when not UTF-8
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        CalError::DbcParseError(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    log::info!("Parsed {} messages from {:?}", dbc.messages().len(), path);
    Ok(dbc)
}

/// Parse a DBC file and look up the requested signals
///
/// `requested` pairs a device signal slot with a signal name. The result is
/// in the same order as `requested`.
pub fn load_signals(path: &Path, requested: &[(u8, &str)]) -> Result<Vec<SignalDef>> {
    let dbc = parse_dbc_file(path)?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");
    find_signals(&dbc, source, requested)
}

/// Look up the requested signals in a parsed database
///
/// Every name must occur in exactly one message.
pub fn find_signals(
    dbc: &can_dbc::DBC,
    source: &str,
    requested: &[(u8, &str)],
) -> Result<Vec<SignalDef>> {
    let mut found: Vec<Option<SignalDef>> = vec![None; requested.len()];

    for dbc_msg in dbc.messages() {
        for (slot, &(index, name)) in found.iter_mut().zip(requested) {
            let Some(dbc_sig) = dbc_msg.signals().iter().find(|s| s.name() == name) else {
                continue;
            };
            if slot.is_some() {
                return Err(CalError::DuplicateSignal(format!(
                    "{}: '{}' appears in more than one message",
                    source, name
                )));
            }
            *slot = Some(convert_signal(index, dbc_msg, dbc_sig)?);
        }
    }

    found
        .into_iter()
        .zip(requested)
        .map(|(sig, &(_, name))| {
            sig.ok_or_else(|| CalError::SignalNotFound(format!("{}: no such signal '{}'", source, name)))
        })
        .collect()
}

/// Convert a can-dbc signal to our SignalDef
fn convert_signal(
    index: u8,
    dbc_msg: &can_dbc::Message,
    dbc_sig: &can_dbc::Signal,
) -> Result<SignalDef> {
    let raw_id = dbc_msg.message_id().0;
    let is_extended = raw_id & DBC_EXTENDED_FLAG != 0;

    let is_big_endian = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => false,
        can_dbc::ByteOrder::BigEndian => true,
    };
    let is_signed = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => true,
        can_dbc::ValueType::Unsigned => false,
    };

    let sig = SignalDef::new(
        index,
        raw_id & EXT_MASK,
        is_extended,
        dbc_sig.name().as_str(),
        *dbc_sig.start_bit(),
        *dbc_sig.signal_size(),
        is_big_endian,
        is_signed,
    )?;
    log::debug!("Found signal {}", sig);
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DBC_CONTENT: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    CAT_DEF_
    CAT_
    FILTER
    BA_DEF_DEF_
    EV_DATA_
    ENVVAR_DATA_
    SGTYPE_
    SGTYPE_VAL_
    BA_DEF_SGTYPE_
    BA_SGTYPE_
    SIG_TYPE_REF_
    VAL_TABLE_
    SIG_GROUP_
    SIG_VALTYPE_
    SIGTYPE_VALTYPE_
    BO_TX_BU_
    BA_DEF_REL_
    BA_REL_
    BA_SGTYPE_REL_
    SG_MUL_VAL_

BS_:

BU_: ECU1 GAUGE

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 8|16@0+ (1,0) [0|8000] "rpm" GAUGE
 SG_ EngineTemp : 16|8@1- (1,-40) [-40|215] "C" GAUGE

BO_ 2566844672 VehicleSpeed: 8 ECU1
 SG_ WheelSpeed : 0|12@1+ (0.1,0) [0|400] "km/h" GAUGE

BO_ 512 Duplicate: 8 ECU1
 SG_ OilPressure : 0|8@1+ (1,0) [0|255] "kPa" GAUGE

BO_ 513 DuplicateAgain: 8 ECU1
 SG_ OilPressure : 0|8@1+ (1,0) [0|255] "kPa" GAUGE
"#;

    fn dbc_file() -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(DBC_CONTENT.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_load_signals() {
        let temp_file = dbc_file();
        let sigs = load_signals(
            temp_file.path(),
            &[(0, "EngineSpeed"), (1, "WheelSpeed"), (2, "EngineTemp")],
        )
        .unwrap();

        assert_eq!(sigs.len(), 3);

        let rpm = &sigs[0];
        assert_eq!(rpm.index, 0);
        assert_eq!(rpm.name, "EngineSpeed");
        assert_eq!(rpm.message_id, 0x123);
        assert!(!rpm.is_extended);
        assert_eq!(rpm.start_bit, 8);
        assert_eq!(rpm.size, 16);
        assert!(rpm.is_big_endian);
        assert!(!rpm.is_signed);

        // 2566844672 = 0x80000000 | 0x18FEF100
        let speed = &sigs[1];
        assert_eq!(speed.index, 1);
        assert_eq!(speed.message_id, 0x18FEF100);
        assert!(speed.is_extended);
        assert!(!speed.is_big_endian);

        let temp = &sigs[2];
        assert!(temp.is_signed);
    }

    #[test]
    fn test_missing_signal() {
        let temp_file = dbc_file();
        let err = load_signals(temp_file.path(), &[(0, "EngineSpeed"), (1, "FuelLevel")])
            .unwrap_err();
        assert!(matches!(err, CalError::SignalNotFound(ref msg) if msg.contains("FuelLevel")));
    }

    #[test]
    fn test_duplicate_signal() {
        let temp_file = dbc_file();
        let err = load_signals(temp_file.path(), &[(3, "OilPressure")]).unwrap_err();
        assert!(matches!(err, CalError::DuplicateSignal(_)));
    }

    #[test]
    fn test_missing_file() {
        let result = parse_dbc_file(Path::new("/nonexistent/gauge.dbc"));
        assert!(matches!(result, Err(CalError::DbcParseError(_))));
    }
}
