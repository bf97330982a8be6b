//! Parameter Group Numbers used by the diagnostic exchanges

/// Acknowledgment (ACK/NACK)
pub const ACKNOWLEDGMENT: u32 = 59392;
/// Request PGN
pub const REQUEST: u32 = 59904;
/// Transport protocol data transfer
pub const TP_DT: u32 = 60160;
/// Transport protocol connection management
pub const TP_CM: u32 = 60416;

/// DM5 - Diagnostic Readiness 1
pub const DM5: u32 = 65230;
/// DM24 - SPN Support
pub const DM24: u32 = 64950;
/// DM26 - Diagnostic Readiness 3
pub const DM26: u32 = 64952;

/// Whether a PGN uses PDU1 (destination specific) addressing
pub fn is_pdu1(pgn: u32) -> bool {
    ((pgn >> 8) & 0xFF) < 0xF0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_format() {
        assert!(is_pdu1(REQUEST));
        assert!(is_pdu1(ACKNOWLEDGMENT));
        assert!(!is_pdu1(DM5));
        assert!(!is_pdu1(DM26));
    }
}
